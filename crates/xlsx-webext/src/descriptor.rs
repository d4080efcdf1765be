use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use serde::Serialize;

/// One add-in declared by a `xl/webextensions/webextension*.xml` part.
///
/// `id` is the package-unique identity of the web extension instance (usually a braced GUID).
/// `reference_name` is the store asset id from `<we:reference id="...">` (e.g. `WA200006846`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDescriptor {
    pub id: String,
    pub reference_name: String,
    pub version: String,
    pub store: String,
    pub store_type: String,
    pub source_path: PathBuf,
}

/// Parse a web extension descriptor part.
///
/// Returns `None` for anything that is not a complete descriptor: text that is not well-formed
/// XML, a part without an identity `id`, or a part whose `reference` element is missing or lacks
/// any of `id`, `version`, `store`, `storeType`. Foreign parts are expected here and are not an
/// error.
pub fn parse_descriptor(xml: &str, source_path: &Path) -> Option<ExtensionDescriptor> {
    let doc = Document::parse(strip_bom(xml)).ok()?;
    let id = identity(&doc)?;

    let reference = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "reference")?;
    let reference_name = reference.attribute("id")?;
    let version = reference.attribute("version")?;
    let store = reference.attribute("store")?;
    let store_type = reference.attribute("storeType")?;

    Some(ExtensionDescriptor {
        id: id.to_string(),
        reference_name: reference_name.to_string(),
        version: version.to_string(),
        store: store.to_string(),
        store_type: store_type.to_string(),
        source_path: source_path.to_path_buf(),
    })
}

/// Read only the identity `id` of a descriptor part.
///
/// This does not require the `reference` element, so it also identifies partially-formed
/// descriptors that [`parse_descriptor`] would reject.
pub fn descriptor_identity(xml: &str) -> Option<String> {
    let doc = Document::parse(strip_bom(xml)).ok()?;
    identity(&doc).map(str::to_string)
}

// The first un-prefixed `id` attribute in document order; for well-formed descriptors this is the
// root `<we:webextension id="...">`.
fn identity<'a>(doc: &'a Document<'_>) -> Option<&'a str> {
    doc.descendants()
        .filter(Node::is_element)
        .find_map(|n| n.attribute("id"))
        .filter(|id| !id.is_empty())
}

fn strip_bom(xml: &str) -> &str {
    xml.strip_prefix('\u{feff}').unwrap_or(xml)
}
