//! CSV export of a result list.
//!
//! The file starts with a UTF-8 byte-order mark so spreadsheet software
//! picks the right encoding for accented and CJK text. Every field is quoted
//! and embedded quotes are doubled, so multi-paragraph article text survives
//! a round trip through any CSV reader.

use crate::error::NewsclipError;
use crate::output::AnalysisResult;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Column headers of the export.
pub const CSV_HEADER: [&str; 3] = ["Folder Name", "File Name", "Text"];

/// UTF-8 byte-order mark prefixed to the file.
pub const BOM: char = '\u{FEFF}';

/// One row read back from an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub folder_name: String,
    pub file_name: String,
    pub text: String,
}

/// Render results as BOM-prefixed CSV.
///
/// The header line is bare; data fields are always quoted. Rows are joined
/// by `\n` with no newline after the last one.
pub fn to_csv(results: &[AnalysisResult]) -> Result<String, NewsclipError> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for r in results {
        wtr.write_record([&r.folder_name, &r.file_name, &r.text])
            .map_err(|e| NewsclipError::ExportFailed(e.to_string()))?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| NewsclipError::ExportFailed(e.to_string()))?;
    let body = String::from_utf8(bytes).map_err(|e| NewsclipError::ExportFailed(e.to_string()))?;
    // Every record ends in a closing quote, so the last byte is the terminator.
    let body = body.strip_suffix('\n').unwrap_or(&body);

    let header = CSV_HEADER.join(",");
    let mut out = String::with_capacity(BOM.len_utf8() + header.len() + body.len() + 1);
    out.push(BOM);
    out.push_str(&header);
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
    }
    Ok(out)
}

/// Parse an export back into rows. The header row is skipped.
pub fn parse_csv(content: &str) -> Result<Vec<ExportRow>, NewsclipError> {
    let content = content.strip_prefix(BOM).unwrap_or(content);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content.as_bytes());

    rdr.records()
        .map(|record| {
            let record = record.map_err(|e| NewsclipError::ExportFailed(e.to_string()))?;
            let field = |i: usize| record.get(i).unwrap_or_default().to_string();
            Ok(ExportRow {
                folder_name: field(0),
                file_name: field(1),
                text: field(2),
            })
        })
        .collect()
}

/// Write the CSV export to `path` atomically (temp file in the same
/// directory, then rename).
pub fn write_csv(path: &Path, results: &[AnalysisResult]) -> Result<(), NewsclipError> {
    let content = to_csv(results)?;
    let write_err = |source: std::io::Error| NewsclipError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Wrote {} rows to {}", results.len(), path.display());
    Ok(())
}
