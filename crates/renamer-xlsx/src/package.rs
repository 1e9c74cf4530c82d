use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Maximum inflated bytes allowed for any single part.
pub const MAX_XLSX_PACKAGE_PART_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// Maximum inflated bytes allowed across the whole package.
pub const MAX_XLSX_PACKAGE_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512 MiB

#[derive(Debug, thiserror::Error)]
pub enum XlsxError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml error: {0}")]
    RoXml(#[from] roxmltree::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("part is not valid UTF-8: {0}")]
    Utf8(String),
    #[error("missing required attribute: {0}")]
    MissingAttr(&'static str),
    #[error("missing xlsx part: {0}")]
    MissingPart(String),
    #[error("invalid xlsx: {0}")]
    Invalid(String),
    #[error("xlsx package part is too large to load safely: {part} is {size} bytes (max {max} bytes)")]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("xlsx package is too large to load safely: {total} bytes uncompressed (max {max})")]
    PackageTooLarge { total: u64, max: u64 },
}

/// Size limits enforced by [`XlsxPackage::from_bytes_limited`].
#[derive(Debug, Clone, Copy)]
pub struct XlsxPackageLimits {
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for XlsxPackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: MAX_XLSX_PACKAGE_PART_BYTES,
            max_total_bytes: MAX_XLSX_PACKAGE_TOTAL_BYTES,
        }
    }
}

/// Every part of an `.xlsx` zip container, held in memory by part name.
///
/// Parts are stored verbatim so that anything the renamer does not touch (styles, charts, themes,
/// custom XML) is written back byte-for-byte.
#[derive(Debug, Clone, Default)]
pub struct XlsxPackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl XlsxPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XlsxError> {
        Self::from_bytes_limited(bytes, XlsxPackageLimits::default())
    }

    pub fn from_bytes_limited(bytes: &[u8], limits: XlsxPackageLimits) -> Result<Self, XlsxError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;

        let mut parts = BTreeMap::new();
        let mut total: u64 = 0;
        for i in 0..zip.len() {
            let file = zip.by_index(i)?;
            if !file.is_file() {
                continue;
            }
            let name = file.name().trim_start_matches('/').replace('\\', "/");

            if file.size() > limits.max_part_bytes {
                return Err(XlsxError::PartTooLarge {
                    part: name,
                    size: file.size(),
                    max: limits.max_part_bytes,
                });
            }

            // ZIP size metadata is untrusted: cap the actual read one byte past the limit.
            let mut buf = Vec::new();
            file.take(limits.max_part_bytes.saturating_add(1))
                .read_to_end(&mut buf)?;
            let size = buf.len() as u64;
            if size > limits.max_part_bytes {
                return Err(XlsxError::PartTooLarge {
                    part: name,
                    size,
                    max: limits.max_part_bytes,
                });
            }

            total = total.saturating_add(size);
            if total > limits.max_total_bytes {
                return Err(XlsxError::PackageTooLarge {
                    total,
                    max: limits.max_total_bytes,
                });
            }

            if parts.insert(name.clone(), buf).is_some() {
                return Err(XlsxError::Invalid(format!("duplicate part name: {name}")));
            }
        }

        log::debug!("loaded xlsx package with {} parts ({total} bytes)", parts.len());
        Ok(Self { parts })
    }

    /// Raw bytes of `name`, accepting a leading `/` and ASCII case differences.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        let name = name.trim_start_matches('/');
        if let Some(bytes) = self.parts.get(name) {
            return Some(bytes.as_slice());
        }
        self.parts
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Like [`XlsxPackage::part`], but decoded as UTF-8 XML text.
    pub fn part_str(&self, name: &str) -> Result<Option<&str>, XlsxError> {
        self.part(name)
            .map(|bytes| {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                std::str::from_utf8(bytes).map_err(|_| XlsxError::Utf8(name.to_string()))
            })
            .transpose()
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn parts(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    /// Insert or replace a part. An existing part whose name differs only in ASCII case is
    /// replaced under its stored name.
    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        let name = name.trim_start_matches('/');
        let key = self
            .parts
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| name.to_string());
        self.parts.insert(key, bytes);
    }

    pub fn write_to_bytes(&self) -> Result<Vec<u8>, XlsxError> {
        let mut buf = Vec::new();
        self.write_to(Cursor::new(&mut buf))?;
        Ok(buf)
    }

    pub fn write_to<W: Write + std::io::Seek>(&self, w: W) -> Result<(), XlsxError> {
        let mut zip = ZipWriter::new(w);
        let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }
        zip.finish()?;
        Ok(())
    }
}
