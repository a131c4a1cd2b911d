use crate::error::{Result, TabchatError};
use crate::table::clean;
use crate::table::dataset::{Cell, Dataset};
use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Csv,
    Xlsx,
}

fn classify(filename: &str) -> Result<FileKind> {
    let lowered = filename.to_lowercase();
    if lowered.ends_with(".csv") {
        Ok(FileKind::Csv)
    } else if lowered.ends_with(".xlsx") {
        Ok(FileKind::Xlsx)
    } else {
        Err(TabchatError::UploadRejected(format!(
            "unsupported file type '{}' (expected .csv or .xlsx)",
            filename
        )))
    }
}

/// Parse an uploaded file into a cleaned dataset. Headers are trimmed and
/// lowercased; the cleaning pass runs before the dataset is handed out so
/// the schema descriptor always sees final columns and types.
#[tracing::instrument(skip(bytes), fields(file = filename, size = bytes.len()))]
pub fn load_dataset(filename: &str, bytes: &[u8]) -> Result<Dataset> {
    let kind = classify(filename)?;

    let mut dataset = match kind {
        FileKind::Csv => load_csv(bytes)?,
        FileKind::Xlsx => load_xlsx(bytes)?,
    };

    clean::prepare(&mut dataset);

    tracing::info!(
        rows = dataset.row_count(),
        columns = dataset.column_count(),
        "dataset loaded"
    );

    Ok(dataset)
}

fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn load_csv(bytes: &[u8]) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| TabchatError::UploadParseFailed(e.to_string()))?
        .iter()
        .map(normalize_header)
        .collect();

    if headers.is_empty() {
        return Err(TabchatError::UploadParseFailed(
            "file has no header row".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| TabchatError::UploadParseFailed(e.to_string()))?;
        rows.push(record.iter().map(Cell::from_field).collect());
    }

    Dataset::new(headers, rows)
}

fn load_xlsx(bytes: &[u8]) -> Result<Dataset> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook: Xlsx<_> =
        Xlsx::new(cursor).map_err(|e| TabchatError::UploadParseFailed(e.to_string()))?;

    // single-dataset sessions read the first worksheet only
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TabchatError::UploadParseFailed("workbook has no sheets".to_string()))?
        .map_err(|e| TabchatError::UploadParseFailed(e.to_string()))?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .ok_or_else(|| TabchatError::UploadParseFailed("sheet has no header row".to_string()))?
        .iter()
        .map(|cell| normalize_header(&data_to_text(cell)))
        .collect();

    let width = headers.len();
    let mut rows = Vec::new();
    for sheet_row in rows_iter {
        let mut row: Vec<Cell> = sheet_row.iter().map(data_to_cell).collect();
        // trailing cells beyond the header width are spreadsheet noise
        row.truncate(width);
        while row.len() < width {
            row.push(Cell::Null);
        }
        rows.push(row);
    }

    Dataset::new(headers, rows)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Null,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                Cell::Int(*f as i64)
            } else {
                Cell::Float(*f)
            }
        }
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) => Cell::from_field(s),
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Str(s.clone()),
        Data::Error(e) => Cell::Str(format!("{:?}", e)),
    }
}

fn data_to_text(data: &Data) -> String {
    match data {
        Data::String(s) => s.clone(),
        other => format!("{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::dataset::ColumnType;

    #[test]
    fn test_rejects_unknown_extension() {
        let err = load_dataset("data.txt", b"a,b\n1,2\n").unwrap_err();
        assert!(matches!(err, TabchatError::UploadRejected(_)));
    }

    #[test]
    fn test_csv_roundtrip_with_header_normalization() {
        let csv = b"  Name ,GROSS_SAL\nMr. Mohan,42000\nAsha,55000\nRavi,61000\n";
        let ds = load_dataset("people.csv", csv).unwrap();

        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.column_names()[0], "name");
        assert_eq!(ds.column_names()[1], "gross_sal");
        // cleaning derives the searchable name column
        assert!(ds.column_index(clean::CLEAN_NAME_COLUMN).is_some());
        assert_eq!(ds.column(1).ty, ColumnType::Integer);
    }

    #[test]
    fn test_csv_malformed_reports_parse_failure() {
        // unbalanced quote makes the csv reader fail mid-stream
        let csv = b"a,b\n\"unterminated,2\n3,4\n";
        let err = load_dataset("bad.csv", csv).unwrap_err();
        assert!(matches!(err, TabchatError::UploadParseFailed(_)));
    }

    #[test]
    fn test_empty_values_become_null() {
        let csv = b"a,b\n1,\n,2\n";
        let ds = load_dataset("gaps.csv", csv).unwrap();
        assert_eq!(ds.rows()[0][1], Cell::Null);
        assert_eq!(ds.rows()[1][0], Cell::Null);
    }
}
