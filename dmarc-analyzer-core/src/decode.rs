//! Container handling: turns a report file on disk into XML text.
//!
//! The container format is chosen from the file extension alone. A `.txt`
//! file never reaches the XML parser.

use crate::error::{AnalyzerError, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Container formats accepted for DMARC aggregate reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Xml,
    Gzip,
    Zip,
}

impl ReportFormat {
    /// Maps a path's extension (case-insensitive) to a format.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xml" => Some(ReportFormat::Xml),
            "gz" => Some(ReportFormat::Gzip),
            "zip" => Some(ReportFormat::Zip),
            _ => None,
        }
    }
}

/// Reads `path` and returns the decompressed XML document it contains.
pub fn decode_report_file(path: &Path) -> Result<String> {
    let format = ReportFormat::from_path(path)
        .ok_or_else(|| AnalyzerError::format(path, "expected a .xml, .gz or .zip extension"))?;
    info!(path = %path.display(), ?format, "Reading report file");

    let xml = match format {
        ReportFormat::Xml => {
            let bytes = fs::read(path).map_err(|e| AnalyzerError::io(path, e))?;
            String::from_utf8(bytes).map_err(|e| AnalyzerError::format(path, e))?
        }
        ReportFormat::Gzip => {
            let file = File::open(path).map_err(|e| AnalyzerError::io(path, e))?;
            let mut xml = String::new();
            GzDecoder::new(file)
                .read_to_string(&mut xml)
                .map_err(|e| AnalyzerError::format(path, format!("invalid gzip data: {e}")))?;
            xml
        }
        ReportFormat::Zip => read_zip_entry(path)?,
    };

    debug!(path = %path.display(), bytes = xml.len(), "Decoded report XML");
    Ok(xml)
}

/// Extracts the first `.xml` entry, or the first file entry when none is named `.xml`.
fn read_zip_entry(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| AnalyzerError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| AnalyzerError::format(path, format!("invalid zip archive: {e}")))?;

    let mut fallback = None;
    let mut chosen = None;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| AnalyzerError::format(path, format!("unreadable zip entry: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        if entry.name().to_ascii_lowercase().ends_with(".xml") {
            chosen = Some(i);
            break;
        }
        fallback.get_or_insert(i);
    }

    let index = chosen
        .or(fallback)
        .ok_or_else(|| AnalyzerError::format(path, "zip archive contains no files"))?;
    let mut entry = archive
        .by_index(index)
        .map_err(|e| AnalyzerError::format(path, format!("unreadable zip entry: {e}")))?;
    debug!(path = %path.display(), entry = entry.name(), "Extracting zip entry");

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| AnalyzerError::format(path, format!("invalid zip entry data: {e}")))?;
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_taken_from_extension() {
        assert_eq!(ReportFormat::from_path(Path::new("a.XML")), Some(ReportFormat::Xml));
        assert_eq!(
            ReportFormat::from_path(Path::new("google.com!example.com!1!2.xml.gz")),
            Some(ReportFormat::Gzip)
        );
        assert_eq!(ReportFormat::from_path(Path::new("r.zip")), Some(ReportFormat::Zip));
        assert_eq!(ReportFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(ReportFormat::from_path(Path::new("README")), None);
    }
}
