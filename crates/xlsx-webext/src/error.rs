use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebExtError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },
    #[error("xml error in {part}: {source}")]
    RoXml {
        part: String,
        #[source]
        source: roxmltree::Error,
    },
    #[error("xml error: {0}")]
    XmlWrite(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("part {part} is not valid utf-8")]
    NonUtf8 { part: String },
    #[error("zip entry {0:?} would be extracted outside the package directory")]
    UnsafeEntryName(String),
    #[error("path {0} cannot be stored as a zip entry name")]
    UnrepresentablePath(String),
    #[error(
        "package part is too large to extract safely: {part} is {size} bytes (max {max} bytes)"
    )]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("package is too large to extract safely: more than {max} bytes uncompressed")]
    PackageTooLarge { max: u64 },
}

impl WebExtError {
    pub(crate) fn xml(part: &str, source: quick_xml::Error) -> Self {
        Self::Xml {
            part: part.to_string(),
            source,
        }
    }

    pub(crate) fn roxml(part: &str, source: roxmltree::Error) -> Self {
        Self::RoXml {
            part: part.to_string(),
            source,
        }
    }
}
