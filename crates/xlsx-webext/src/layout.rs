//! Fixed part locations used by Excel's web extension subsystem.
//!
//! These paths are part of the package format and must not change.

use std::path::{Path, PathBuf};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const ROOT_RELS_PART: &str = "_rels/.rels";
pub const WEBEXTENSIONS_DIR: &str = "xl/webextensions";
pub const TASKPANES_PART: &str = "xl/webextensions/taskpanes.xml";
pub const TASKPANES_RELS_PART: &str = "xl/webextensions/_rels/taskpanes.xml.rels";

pub const TASKPANES_FILE_NAME: &str = "taskpanes.xml";
pub const DESCRIPTOR_FILE_PREFIX: &str = "webextension";
pub const DESCRIPTOR_FILE_SUFFIX: &str = ".xml";

pub const REL_TYPE_WEBEXTENSION_TASKPANES: &str =
    "http://schemas.microsoft.com/office/2011/relationships/webextensiontaskpanes";
pub const REL_TYPE_WEBEXTENSION: &str =
    "http://schemas.microsoft.com/office/2011/relationships/webextension";

pub const CONTENT_TYPE_WEBEXTENSION: &str = "application/vnd.ms-office.webextension+xml";
pub const CONTENT_TYPE_TASKPANES: &str = "application/vnd.ms-office.webextensiontaskpanes+xml";

/// Whether `file_name` (a bare file name inside `xl/webextensions/`) names a descriptor part.
pub fn is_descriptor_file_name(file_name: &str) -> bool {
    file_name != TASKPANES_FILE_NAME
        && file_name.starts_with(DESCRIPTOR_FILE_PREFIX)
        && file_name.ends_with(DESCRIPTOR_FILE_SUFFIX)
}

/// Package part name (no leading `/`) for a descriptor file name.
pub fn descriptor_part_name(file_name: &str) -> String {
    format!("{WEBEXTENSIONS_DIR}/{file_name}")
}

/// Map a `/`-separated part name onto the extracted package directory.
pub fn part_path(root: &Path, part_name: &str) -> PathBuf {
    part_name
        .trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

pub fn webextensions_dir(root: &Path) -> PathBuf {
    part_path(root, WEBEXTENSIONS_DIR)
}

/// Compare two OPC part names.
///
/// Part names are case-insensitive (ASCII) and may be written with or without a leading `/`.
pub fn part_names_equal(a: &str, b: &str) -> bool {
    a.trim_start_matches('/')
        .eq_ignore_ascii_case(b.trim_start_matches('/'))
}
