use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::archive::ExtractLimits;
use crate::descriptor::ExtensionDescriptor;
use crate::remove::RemovalReport;
use crate::workspace::ExtractedPackage;
use crate::WebExtError;

/// MIME type of the processed output.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const PROCESSED_PREFIX: &str = "processed_";

/// Problems with the upload itself, detected before anything touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("no file provided")]
    MissingFile,
    #[error("only .xlsx files are supported (got {file_name:?})")]
    UnsupportedExtension { file_name: String },
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Rejected(#[from] RequestError),
    /// Extraction, scanning or repacking failed. No output is produced.
    #[error("failed to process workbook")]
    Failed(#[source] WebExtError),
}

impl From<WebExtError> for ProcessError {
    fn from(err: WebExtError) -> Self {
        Self::Failed(err)
    }
}

/// Check that an upload is a non-empty `.xlsx` file.
pub fn validate_upload(file_name: &str, bytes: &[u8]) -> Result<(), RequestError> {
    if file_name.trim().is_empty() || bytes.is_empty() {
        return Err(RequestError::MissingFile);
    }
    let is_xlsx = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
    if !is_xlsx {
        return Err(RequestError::UnsupportedExtension {
            file_name: file_name.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub file_name: String,
    pub addins: Vec<ExtensionDescriptor>,
    pub addin_count: usize,
}

/// List the web extensions in an uploaded workbook.
pub fn analyze(
    file_name: &str,
    bytes: &[u8],
    limits: ExtractLimits,
) -> Result<AnalysisReport, ProcessError> {
    validate_upload(file_name, bytes)?;
    let package = ExtractedPackage::open(file_name, bytes, limits)?;
    let addins = package.descriptors.clone();
    package.discard();
    Ok(AnalysisReport {
        file_name: file_name.to_string(),
        addin_count: addins.len(),
        addins,
    })
}

#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Identities (`ExtensionDescriptor::id`) of the web extensions to remove.
    pub remove_ids: Vec<String>,
}

#[derive(Debug)]
pub struct ProcessedPackage {
    /// Suggested download name: `processed_<original name>`.
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Web extensions still present in the output.
    pub remaining: Vec<ExtensionDescriptor>,
    pub removal: RemovalReport,
}

impl ProcessedPackage {
    pub fn content_type(&self) -> &'static str {
        XLSX_CONTENT_TYPE
    }
}

/// Remove the requested web extensions from an uploaded workbook and repack it.
pub fn process(request: &ProcessRequest, limits: ExtractLimits) -> Result<ProcessedPackage, ProcessError> {
    validate_upload(&request.file_name, &request.bytes)?;
    let mut package = ExtractedPackage::open(&request.file_name, &request.bytes, limits)?;
    let removal = package.remove(&request.remove_ids)?;
    let remaining = package.descriptors.clone();
    let bytes = package.into_bytes()?;
    Ok(ProcessedPackage {
        file_name: processed_file_name(&request.file_name),
        bytes,
        remaining,
        removal,
    })
}

fn processed_file_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file_name);
    format!("{PROCESSED_PREFIX}{base}")
}
