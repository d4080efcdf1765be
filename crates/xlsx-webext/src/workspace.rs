use std::path::Path;

use tempfile::TempDir;

use crate::archive::{assemble_package, extract_package, ExtractLimits};
use crate::descriptor::ExtensionDescriptor;
use crate::diagnostics::Diagnostics;
use crate::remove::{remove_descriptors_with_diagnostics, RemovalReport};
use crate::scan::scan_descriptors;
use crate::WebExtError;

const WORKSPACE_PREFIX: &str = "xlsx-webext-";

/// A request-scoped temporary directory holding one extracted package.
///
/// The directory is deleted by [`PackageWorkspace::close`] or, failing that, on drop. Cleanup
/// failures are logged and never returned.
#[derive(Debug)]
pub struct PackageWorkspace {
    dir: Option<TempDir>,
}

impl PackageWorkspace {
    /// Extract `bytes` into a fresh temporary directory.
    ///
    /// On failure the partially-extracted directory is removed before returning.
    pub fn extract(bytes: &[u8], limits: ExtractLimits) -> Result<Self, WebExtError> {
        let dir = tempfile::Builder::new().prefix(WORKSPACE_PREFIX).tempdir()?;
        let workspace = Self { dir: Some(dir) };
        match extract_package(bytes, workspace.root(), limits) {
            Ok(()) => Ok(workspace),
            Err(err) => {
                workspace.close();
                Err(err)
            }
        }
    }

    pub fn root(&self) -> &Path {
        match &self.dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }

    pub fn descriptors(&self) -> Result<Vec<ExtensionDescriptor>, WebExtError> {
        scan_descriptors(self.root())
    }

    pub fn remove<I, S>(&self, ids: I, diagnostics: Diagnostics) -> RemovalReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        remove_descriptors_with_diagnostics(self.root(), ids, diagnostics)
    }

    pub fn assemble(&self) -> Result<Vec<u8>, WebExtError> {
        assemble_package(self.root())
    }

    /// Delete the working directory now.
    pub fn close(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        if let Err(err) = dir.close() {
            log::warn!("failed to clean up workspace {}: {err}", path.display());
        }
    }
}

impl Drop for PackageWorkspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// An uploaded package that has been extracted and scanned.
///
/// Owns the workspace; pass it on to [`ExtractedPackage::remove`] and
/// [`ExtractedPackage::into_bytes`], which releases it.
#[derive(Debug)]
pub struct ExtractedPackage {
    pub file_name: String,
    pub descriptors: Vec<ExtensionDescriptor>,
    workspace: PackageWorkspace,
}

impl ExtractedPackage {
    pub fn open(file_name: &str, bytes: &[u8], limits: ExtractLimits) -> Result<Self, WebExtError> {
        let workspace = PackageWorkspace::extract(bytes, limits)?;
        let descriptors = workspace.descriptors()?;
        Ok(Self {
            file_name: file_name.to_string(),
            descriptors,
            workspace,
        })
    }

    pub fn root(&self) -> &Path {
        self.workspace.root()
    }

    /// Remove the requested web extensions and refresh [`ExtractedPackage::descriptors`].
    pub fn remove<I, S>(&mut self, ids: I) -> Result<RemovalReport, WebExtError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let report = self
            .workspace
            .remove(ids, Diagnostics::with_label(self.file_name.clone()));
        self.descriptors = self.workspace.descriptors()?;
        Ok(report)
    }

    /// Repack the package and release the workspace.
    pub fn into_bytes(self) -> Result<Vec<u8>, WebExtError> {
        let bytes = self.workspace.assemble();
        self.workspace.close();
        bytes
    }

    /// Release the workspace without repacking.
    pub fn discard(self) {
        self.workspace.close();
    }
}
