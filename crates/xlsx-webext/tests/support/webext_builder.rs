#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

/// Test helper for constructing synthetic XLSX packages that carry Office web extensions.
///
/// By default every add-in gets a `webextension{n}.xml` descriptor, a relationship `rId{n}` in
/// `xl/webextensions/_rels/taskpanes.xml.rels`, a task pane in `taskpanes.xml` and a content
/// type override. Individual parts can be replaced verbatim (including with malformed XML) to
/// exercise error handling.
#[derive(Debug, Clone, Default)]
pub struct WebExtXlsxBuilder {
    addins: Vec<AddinSpec>,

    // Verbatim replacements for generated parts.
    taskpanes_xml: Option<String>,
    taskpanes_rels_xml: Option<String>,
    content_types_xml: Option<String>,

    omit_taskpanes: bool,
    omit_taskpanes_rels: bool,

    extra_parts: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct AddinSpec {
    pub id: String,
    pub reference_name: String,
    pub version: String,
    pub store: String,
    pub store_type: String,
    /// Whether a task pane hosts this add-in.
    pub hosted: bool,
}

impl AddinSpec {
    pub fn new(id: impl Into<String>, reference_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reference_name: reference_name.into(),
            version: "1.0.0.0".to_string(),
            store: "en-US".to_string(),
            store_type: "omex".to_string(),
            hosted: true,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn store(mut self, store: impl Into<String>, store_type: impl Into<String>) -> Self {
        self.store = store.into();
        self.store_type = store_type.into();
        self
    }

    pub fn unhosted(mut self) -> Self {
        self.hosted = false;
        self
    }
}

impl WebExtXlsxBuilder {
    pub const REL_TYPE_WEBEXTENSION_TASKPANES: &'static str =
        "http://schemas.microsoft.com/office/2011/relationships/webextensiontaskpanes";
    pub const REL_TYPE_WEBEXTENSION: &'static str =
        "http://schemas.microsoft.com/office/2011/relationships/webextension";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add a web extension stored at `xl/webextensions/webextension{n}.xml`.
    pub fn addin(mut self, addin: AddinSpec) -> Self {
        self.addins.push(addin);
        self
    }

    /// Add `count` distinct web extensions with generated identities.
    pub fn addins(mut self, count: usize) -> Self {
        for _ in 0..count {
            let idx = self.addins.len() + 1;
            self.addins
                .push(AddinSpec::new(guid_for(idx), format!("WA2000{idx:05}")));
        }
        self
    }

    pub fn taskpanes_xml(mut self, xml: impl Into<String>) -> Self {
        self.taskpanes_xml = Some(xml.into());
        self
    }

    pub fn taskpanes_rels_xml(mut self, xml: impl Into<String>) -> Self {
        self.taskpanes_rels_xml = Some(xml.into());
        self
    }

    pub fn content_types_xml(mut self, xml: impl Into<String>) -> Self {
        self.content_types_xml = Some(xml.into());
        self
    }

    pub fn without_taskpanes(mut self) -> Self {
        self.omit_taskpanes = true;
        self
    }

    pub fn without_taskpanes_rels(mut self) -> Self {
        self.omit_taskpanes_rels = true;
        self
    }

    /// Add an arbitrary extra part.
    pub fn part(mut self, part_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.extra_parts.insert(part_name.into(), bytes.into());
        self
    }

    pub fn build_bytes(self) -> Vec<u8> {
        write_zip(self.build_parts())
    }

    /// Write the parts as an extracted package under `root`.
    pub fn write_to_dir(self, root: &Path) {
        for (name, bytes) in self.build_parts() {
            let path = root.join(&name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, bytes).unwrap();
        }
    }

    pub fn build_parts(self) -> BTreeMap<String, Vec<u8>> {
        let mut parts: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        let has_addins = !self.addins.is_empty();

        let content_types = self
            .content_types_xml
            .clone()
            .unwrap_or_else(|| content_types_xml(&self.addins, !self.omit_taskpanes));
        parts.insert("[Content_Types].xml".to_string(), content_types.into_bytes());
        parts.insert(
            "_rels/.rels".to_string(),
            root_rels_xml(has_addins).into_bytes(),
        );
        parts.insert("xl/workbook.xml".to_string(), workbook_xml().into_bytes());
        parts.insert(
            "xl/_rels/workbook.xml.rels".to_string(),
            workbook_rels_xml().into_bytes(),
        );
        parts.insert(
            "xl/worksheets/sheet1.xml".to_string(),
            worksheet_xml().into_bytes(),
        );

        for (idx, addin) in self.addins.iter().enumerate() {
            parts.insert(
                format!("xl/webextensions/webextension{}.xml", idx + 1),
                descriptor_xml(addin).into_bytes(),
            );
        }

        if has_addins && !self.omit_taskpanes {
            let xml = self
                .taskpanes_xml
                .clone()
                .unwrap_or_else(|| taskpanes_xml(&self.addins));
            parts.insert("xl/webextensions/taskpanes.xml".to_string(), xml.into_bytes());
        }
        if has_addins && !self.omit_taskpanes_rels {
            let xml = self
                .taskpanes_rels_xml
                .clone()
                .unwrap_or_else(|| taskpanes_rels_xml(self.addins.len()));
            parts.insert(
                "xl/webextensions/_rels/taskpanes.xml.rels".to_string(),
                xml.into_bytes(),
            );
        }

        parts.extend(self.extra_parts);
        parts
    }
}

pub fn guid_for(idx: usize) -> String {
    format!("{{{idx:08X}-0000-4000-8000-00000000{idx:04X}}}")
}

pub fn descriptor_xml(addin: &AddinSpec) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<we:webextension xmlns:we="http://schemas.microsoft.com/office/webextensions/webextension/2010/11" id="{}">
  <we:reference id="{}" version="{}" store="{}" storeType="{}"/>
  <we:alternateReferences/>
  <we:properties/>
  <we:bindings/>
  <we:snapshot xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>
</we:webextension>"#,
        xml_escape(&addin.id),
        xml_escape(&addin.reference_name),
        xml_escape(&addin.version),
        xml_escape(&addin.store),
        xml_escape(&addin.store_type),
    )
}

fn taskpanes_xml(addins: &[AddinSpec]) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<wetp:taskpanes xmlns:wetp="http://schemas.microsoft.com/office/webextensions/taskpanes/2010/11">"#);
    out.push('\n');
    for (idx, addin) in addins.iter().enumerate() {
        if !addin.hosted {
            continue;
        }
        out.push_str(&format!(
            r#"  <wetp:taskpane dockstate="right" visibility="0" width="350" row="{}" locked="0">"#,
            idx + 4
        ));
        out.push('\n');
        out.push_str(&format!(
            r#"    <wetp:webextensionref xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" r:id="rId{}"/>"#,
            idx + 1
        ));
        out.push('\n');
        out.push_str("  </wetp:taskpane>\n");
    }
    out.push_str("</wetp:taskpanes>");
    out
}

fn taskpanes_rels_xml(count: usize) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    out.push('\n');
    for n in 1..=count {
        out.push_str(&format!(
            r#"  <Relationship Id="rId{n}" Type="{}" Target="webextension{n}.xml"/>"#,
            WebExtXlsxBuilder::REL_TYPE_WEBEXTENSION
        ));
        out.push('\n');
    }
    out.push_str("</Relationships>");
    out
}

fn root_rels_xml(with_taskpanes: bool) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    out.push('\n');
    out.push_str(r#"  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#);
    out.push('\n');
    if with_taskpanes {
        out.push_str(&format!(
            r#"  <Relationship Id="rId2" Type="{}" Target="xl/webextensions/taskpanes.xml"/>"#,
            WebExtXlsxBuilder::REL_TYPE_WEBEXTENSION_TASKPANES
        ));
        out.push('\n');
    }
    out.push_str("</Relationships>");
    out
}

fn content_types_xml(addins: &[AddinSpec], with_taskpanes: bool) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    out.push('\n');
    out.push_str(r#"  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    out.push('\n');
    out.push_str(r#"  <Default Extension="xml" ContentType="application/xml"/>"#);
    out.push('\n');
    out.push_str(r#"  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    out.push('\n');
    out.push_str(r#"  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#);
    out.push('\n');
    for n in 1..=addins.len() {
        out.push_str(&format!(
            r#"  <Override PartName="/xl/webextensions/webextension{n}.xml" ContentType="application/vnd.ms-office.webextension+xml"/>"#
        ));
        out.push('\n');
    }
    if with_taskpanes && !addins.is_empty() {
        out.push_str(r#"  <Override PartName="/xl/webextensions/taskpanes.xml" ContentType="application/vnd.ms-office.webextensiontaskpanes+xml"/>"#);
        out.push('\n');
    }
    out.push_str("</Types>");
    out
}

fn workbook_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Sheet1" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>"#
        .to_string()
}

fn workbook_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#
        .to_string()
}

fn worksheet_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <dimension ref="A1"/>
  <sheetData>
    <row r="1"><c r="A1"><v>1</v></c></row>
  </sheetData>
</worksheet>"#
        .to_string()
}

/// Read every file under `root` into a map keyed by `/`-separated relative path.
pub fn snapshot_dir(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut out = BTreeMap::new();
    for entry in walkdir::WalkDir::new(root).min_depth(1) {
        let entry = entry.unwrap();
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap();
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        out.insert(name, fs::read(entry.path()).unwrap());
    }
    out
}

/// Read every entry of a ZIP archive into a map keyed by entry name.
pub fn zip_parts(bytes: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut out = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        if file.is_dir() {
            continue;
        }
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).unwrap();
        out.insert(file.name().to_string(), buf);
    }
    out
}

pub fn write_zip(parts: BTreeMap<String, Vec<u8>>) -> Vec<u8> {
    let cursor = Cursor::new(Vec::new());
    let mut zip = zip::ZipWriter::new(cursor);
    let options = zip::write::FileOptions::<()>::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in parts {
        zip.start_file(name, options).unwrap();
        zip.write_all(&bytes).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
