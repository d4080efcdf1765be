//! Conversion between package archive bytes and an extracted package directory.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::{Component, Path};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::WebExtError;

/// Default maximum uncompressed size permitted for any single extracted part.
///
/// Guards against ZIP bombs (tiny compressed size, huge uncompressed size) and forged
/// `uncompressed_size` metadata.
pub const DEFAULT_MAX_PART_BYTES: u64 = 256 * 1024 * 1024; // 256MiB

/// Default maximum total uncompressed bytes written while extracting one package.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512MiB

/// Size limits enforced by [`extract_package`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    /// Maximum allowed uncompressed bytes for any single part.
    pub max_part_bytes: u64,
    /// Maximum allowed uncompressed bytes across the whole package.
    pub max_total_bytes: u64,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: DEFAULT_MAX_PART_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

/// Inflate every entry of a package archive into `dest`.
///
/// Entry names that would land outside `dest` (absolute paths, `..` segments) are rejected, as are
/// parts that exceed `limits`. File contents are written byte-for-byte.
pub fn extract_package(bytes: &[u8], dest: &Path, limits: ExtractLimits) -> Result<(), WebExtError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut total: u64 = 0;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        // Some producers write leading `/` or `\` separators; treat them as package-relative.
        let normalized = name.trim_start_matches(['/', '\\']).replace('\\', "/");
        if normalized.is_empty() {
            continue;
        }
        let relative = Path::new(&normalized);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(WebExtError::UnsafeEntryName(name));
        }
        let out_path = dest.join(relative);

        if file.is_dir() || normalized.ends_with('/') {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if file.size() > limits.max_part_bytes {
            return Err(WebExtError::PartTooLarge {
                part: name,
                size: file.size(),
                max: limits.max_part_bytes,
            });
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Don't trust the declared size: cap the actual inflated stream as well.
        let remaining_total = limits.max_total_bytes.saturating_sub(total);
        let cap = limits.max_part_bytes.min(remaining_total);
        let mut out = File::create(&out_path)?;
        let written = io::copy(&mut (&mut file).take(cap.saturating_add(1)), &mut out)?;
        if written > cap {
            drop(out);
            let _ = fs::remove_file(&out_path);
            if written > limits.max_part_bytes {
                return Err(WebExtError::PartTooLarge {
                    part: name,
                    size: written,
                    max: limits.max_part_bytes,
                });
            }
            return Err(WebExtError::PackageTooLarge {
                max: limits.max_total_bytes,
            });
        }
        total += written;
    }

    Ok(())
}

/// Pack every regular file under `root` into a new archive and return its bytes.
pub fn assemble_package(root: &Path) -> Result<Vec<u8>, WebExtError> {
    let mut cursor = Cursor::new(Vec::new());
    assemble_package_to(root, &mut cursor)?;
    Ok(cursor.into_inner())
}

/// Pack every regular file under `root` into a new archive written to `writer`.
///
/// Entry names are the `/`-separated paths relative to `root`, emitted in file-name order so the
/// output only depends on the directory contents.
pub fn assemble_package_to<W: Write + Seek>(root: &Path, writer: W) -> Result<(), WebExtError> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    for entry in walkdir::WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| {
            WebExtError::Io(err.into_io_error().unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::Other, "directory walk failed")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry_name(root, entry.path())?;
        let bytes = fs::read(entry.path())?;
        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
    }

    zip.finish()?;
    Ok(())
}

fn entry_name(root: &Path, path: &Path) -> Result<String, WebExtError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| WebExtError::UnrepresentablePath(path.display().to_string()))?;
    let mut segments = Vec::new();
    for component in relative.components() {
        let Component::Normal(segment) = component else {
            return Err(WebExtError::UnrepresentablePath(path.display().to_string()));
        };
        let segment = segment
            .to_str()
            .ok_or_else(|| WebExtError::UnrepresentablePath(path.display().to_string()))?;
        segments.push(segment);
    }
    Ok(segments.join("/"))
}
