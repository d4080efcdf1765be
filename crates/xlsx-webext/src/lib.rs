//! Office web extension (add-in) removal for XLSX packages.
//!
//! Excel stores task-pane add-ins as a small graph of OPC parts under `xl/webextensions/`:
//!
//! - `webextension*.xml`: one descriptor per add-in (identity + store reference)
//! - `taskpanes.xml`: the task panes that host those add-ins, each pointing at a descriptor
//!   through a relationship id
//! - `_rels/taskpanes.xml.rels`: relationship id -> descriptor file
//!
//! plus an `Override` per descriptor in `[Content_Types].xml` and a `webextensiontaskpanes`
//! relationship in the package root `_rels/.rels`.
//!
//! This crate operates on an *extracted* package directory so edits can be made part by part:
//!
//! - [`scan_descriptors`] lists the add-ins present in a package.
//! - [`remove_descriptors`] deletes selected add-ins and repairs every index that referenced
//!   them, so the repacked workbook still opens cleanly.
//! - [`extract_package`] / [`assemble_package`] convert between archive bytes and a directory.
//! - [`PackageWorkspace`] and the request helpers ([`analyze`], [`process`]) tie those steps to a
//!   scoped temporary directory.

pub mod archive;
pub mod cli;
mod consistency;
mod descriptor;
mod diagnostics;
mod error;
mod fs;
pub mod layout;
mod relationships;
mod remove;
mod request;
mod scan;
mod workspace;
mod xml;

pub use archive::{assemble_package, assemble_package_to, extract_package, ExtractLimits};
pub use consistency::{check_consistency, ConsistencyIssue};
pub use descriptor::{descriptor_identity, parse_descriptor, ExtensionDescriptor};
pub use diagnostics::{DiagnosticEvent, Diagnostics, RemovalStep};
pub use error::WebExtError;
pub use relationships::{parse_relationships, Relationship, RelationshipIndex};
pub use remove::{remove_descriptors, remove_descriptors_with_diagnostics, RemovalReport, RemovalStatus};
pub use request::{
    analyze, process, validate_upload, AnalysisReport, ProcessError, ProcessRequest,
    ProcessedPackage, RequestError, XLSX_CONTENT_TYPE,
};
pub use scan::{descriptor_part_files, scan_descriptors};
pub use workspace::{ExtractedPackage, PackageWorkspace};
