use std::fs;
use std::io;
use std::path::Path;

use crate::descriptor::{parse_descriptor, ExtensionDescriptor};
use crate::layout::{is_descriptor_file_name, webextensions_dir};
use crate::WebExtError;

/// File names of the descriptor parts in `xl/webextensions/`, sorted.
///
/// A package without the directory has no descriptors; that is not an error.
pub fn descriptor_part_files(root: &Path) -> Result<Vec<String>, WebExtError> {
    let dir = webextensions_dir(root);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if is_descriptor_file_name(&name) {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse every web extension descriptor in an extracted package.
///
/// Parts that are not complete descriptors are skipped. Results are ordered by file name.
pub fn scan_descriptors(root: &Path) -> Result<Vec<ExtensionDescriptor>, WebExtError> {
    let dir = webextensions_dir(root);
    let mut descriptors = Vec::new();
    for file in descriptor_part_files(root)? {
        let path = dir.join(&file);
        let xml = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                log::warn!("skipping unreadable descriptor part {}: {err}", path.display());
                continue;
            }
        };
        match parse_descriptor(&xml, &path) {
            Some(descriptor) => descriptors.push(descriptor),
            None => log::debug!("{file} is not a web extension descriptor; skipping"),
        }
    }
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, name: &str, contents: &str) {
        let dir = webextensions_dir(root);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn missing_directory_yields_no_descriptors() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(descriptor_part_files(tmp.path()).unwrap().is_empty());
        assert!(scan_descriptors(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn lists_only_descriptor_files_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "webextension2.xml", "<x/>");
        write(tmp.path(), "webextension1.xml", "<x/>");
        write(tmp.path(), "taskpanes.xml", "<x/>");
        write(tmp.path(), "notes.txt", "");
        fs::create_dir_all(webextensions_dir(tmp.path()).join("webextension9.xml")).unwrap();

        assert_eq!(
            descriptor_part_files(tmp.path()).unwrap(),
            vec!["webextension1.xml", "webextension2.xml"]
        );
    }

    #[test]
    fn skips_parts_that_are_not_descriptors() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "webextension1.xml",
            r#"<we:webextension xmlns:we="urn:we" id="{A}"><we:reference id="WA1" version="1.0" store="en-US" storeType="omex"/></we:webextension>"#,
        );
        write(
            tmp.path(),
            "webextension2.xml",
            r#"<we:webextension xmlns:we="urn:we" id="{B}"><we:reference id="WA2" version="1.0"/></we:webextension>"#,
        );

        let descriptors = scan_descriptors(tmp.path()).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].id, "{A}");
        assert_eq!(
            descriptors[0].source_path,
            webextensions_dir(tmp.path()).join("webextension1.xml")
        );
    }
}
