use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader as XmlReader, Writer as XmlWriter};
use roxmltree::Document;

use crate::WebExtError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decode a part as UTF-8, without its byte order mark.
pub(crate) fn part_text<'a>(bytes: &'a [u8], part_name: &str) -> Result<&'a str, WebExtError> {
    let xml = std::str::from_utf8(bytes).map_err(|_| WebExtError::NonUtf8 {
        part: part_name.to_string(),
    })?;
    Ok(xml.strip_prefix('\u{feff}').unwrap_or(xml))
}

/// Parse a part for read-only queries.
///
/// A part without a root element (empty, or only the prolog left after its container was
/// stripped) has no entries and yields `None`. Anything else that fails to parse is an error.
pub(crate) fn parse_part<'a>(
    xml: &'a str,
    part_name: &str,
) -> Result<Option<Document<'a>>, WebExtError> {
    if xml.trim().is_empty() {
        return Ok(None);
    }
    match Document::parse(xml) {
        Ok(doc) => Ok(Some(doc)),
        Err(roxmltree::Error::NoRootNode) => Ok(None),
        Err(e) => Err(WebExtError::roxml(part_name, e)),
    }
}

pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    name.rsplit(|&b| b == b':').next().unwrap_or(name)
}

/// Unescaped value of the first attribute on `e` whose local name is `local`.
pub(crate) fn attribute_value(
    e: &BytesStart<'_>,
    local: &[u8],
) -> Result<Option<String>, WebExtError> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if local_name(attr.key.as_ref()) == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Result of [`strip_child_elements`].
#[derive(Debug)]
pub(crate) struct StripOutcome {
    pub xml: Vec<u8>,
    pub removed: usize,
    pub remaining: usize,
    /// The root element was dropped because no child elements were left.
    pub container_stripped: bool,
}

impl StripOutcome {
    pub fn changed(&self) -> bool {
        self.removed > 0 || self.container_stripped
    }
}

/// Rewrite `xml`, dropping direct children of the root element for which `should_remove`
/// returns `true`.
///
/// `should_remove` receives the zero-based position of the child among the root's element
/// children (the same numbering `roxmltree` uses for `root_element().children()` filtered to
/// elements) and its start tag. Removed children are dropped with their whole subtree and the
/// whitespace that follows them. Everything else is copied through unchanged.
///
/// If the root ends up without element children, the root element itself is dropped and only the
/// prolog (XML declaration, comments) is kept.
pub(crate) fn strip_child_elements<F>(
    xml: &[u8],
    part_name: &str,
    mut should_remove: F,
) -> Result<StripOutcome, WebExtError>
where
    F: FnMut(usize, &BytesStart<'_>) -> Result<bool, WebExtError>,
{
    let bom = xml.starts_with(UTF8_BOM);
    let xml = xml.strip_prefix(UTF8_BOM).unwrap_or(xml);
    let mut reader = XmlReader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = XmlWriter::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut skip_depth = 0usize;
    let mut child_index = 0usize;
    let mut removed = 0usize;
    let mut remaining = 0usize;
    let mut drop_whitespace = false;
    let mut root_start = 0usize;
    let mut root_span: Option<(usize, usize)> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| WebExtError::xml(part_name, e))?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => {
                    skip_depth -= 1;
                    if skip_depth == 0 {
                        drop_whitespace = true;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(e) if depth == 1 => {
                let index = child_index;
                child_index += 1;
                if should_remove(index, &e)? {
                    removed += 1;
                    skip_depth = 1;
                } else {
                    remaining += 1;
                    depth += 1;
                    drop_whitespace = false;
                    writer.write_event(Event::Start(e))?;
                }
            }
            Event::Empty(e) if depth == 1 => {
                let index = child_index;
                child_index += 1;
                if should_remove(index, &e)? {
                    removed += 1;
                    drop_whitespace = true;
                } else {
                    remaining += 1;
                    drop_whitespace = false;
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::Start(e) => {
                if depth == 0 {
                    root_start = writer.get_ref().len();
                }
                depth += 1;
                drop_whitespace = false;
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) => {
                let is_root = depth == 0;
                if is_root {
                    root_start = writer.get_ref().len();
                }
                drop_whitespace = false;
                writer.write_event(Event::Empty(e))?;
                if is_root {
                    root_span = Some((root_start, writer.get_ref().len()));
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                drop_whitespace = false;
                writer.write_event(Event::End(e))?;
                if depth == 0 {
                    root_span = Some((root_start, writer.get_ref().len()));
                }
            }
            Event::Text(t) if drop_whitespace && t.iter().all(u8::is_ascii_whitespace) => {
                drop_whitespace = false;
            }
            other => {
                drop_whitespace = false;
                writer.write_event(other)?;
            }
        }

        buf.clear();
    }

    let mut out = writer.into_inner();
    let container_stripped = match root_span {
        Some((start, end)) if remaining == 0 => {
            out.drain(start..end);
            true
        }
        _ => false,
    };
    if bom {
        let mut with_bom = UTF8_BOM.to_vec();
        with_bom.append(&mut out);
        out = with_bom;
    }

    Ok(StripOutcome {
        xml: out,
        removed,
        remaining,
        container_stripped,
    })
}
