use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{AssessmentRecord, DEFAULT_MAX_SCORE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(InputFormat::Csv),
            Some("json") => Ok(InputFormat::Json),
            _ => Err(Error::Config(format!(
                "cannot tell the format of {} (expected .csv or .json)",
                path.display()
            ))),
        }
    }
}

pub fn load_records(path: &Path) -> Result<Vec<AssessmentRecord>> {
    let format = InputFormat::from_path(path)?;
    let file = std::fs::File::open(path)?;
    let records = match format {
        InputFormat::Csv => read_csv(file)?,
        InputFormat::Json => read_json(std::io::BufReader::new(file))?,
    };
    info!(path = %path.display(), count = records.len(), "loaded assessment history");
    Ok(records)
}

/// Header: `id,total_score,max_score,completed_at[,level,is_deleted]`.
///
/// A blank or non-numeric score is kept as a missing score rather than
/// failing the whole file.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<AssessmentRecord>> {
    #[derive(Deserialize)]
    struct CsvRow {
        id: String,
        #[serde(default)]
        total_score: Option<String>,
        #[serde(default)]
        max_score: Option<i32>,
        #[serde(default)]
        completed_at: Option<String>,
        #[serde(default)]
        level: Option<String>,
        #[serde(default)]
        is_deleted: Option<bool>,
    }

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let total_score = row.total_score.as_deref().and_then(|raw| {
            let parsed = raw.parse::<i32>().ok();
            if parsed.is_none() && !raw.is_empty() {
                debug!(id = %row.id, raw, "unreadable score");
            }
            parsed
        });

        records.push(AssessmentRecord {
            id: row.id,
            total_score,
            max_score: row.max_score.unwrap_or(DEFAULT_MAX_SCORE),
            completed_at: row.completed_at.filter(|value| !value.is_empty()),
            level: row.level.filter(|value| !value.is_empty()),
            is_deleted: row.is_deleted.unwrap_or(false),
        });
    }

    Ok(records)
}

/// A JSON array shaped like the history API response. Unknown fields are
/// ignored; a present `deleted_at` marks the record as soft-deleted.
pub fn read_json<R: Read>(reader: R) -> Result<Vec<AssessmentRecord>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    #[derive(Deserialize)]
    struct ApiRecord {
        id: RawId,
        #[serde(default)]
        total_score: Option<serde_json::Value>,
        #[serde(default)]
        max_score: Option<i32>,
        #[serde(default)]
        completed_at: Option<String>,
        #[serde(default)]
        level: Option<String>,
        #[serde(default)]
        is_deleted: Option<bool>,
        #[serde(default)]
        deleted_at: Option<String>,
    }

    let rows: Vec<ApiRecord> = serde_json::from_reader(reader)?;
    let records = rows
        .into_iter()
        .map(|row| {
            let id = match row.id {
                RawId::Number(n) => n.to_string(),
                RawId::Text(text) => text,
            };
            let total_score = row
                .total_score
                .as_ref()
                .and_then(|value| value.as_i64())
                .and_then(|score| i32::try_from(score).ok());

            AssessmentRecord {
                id,
                total_score,
                max_score: row.max_score.unwrap_or(DEFAULT_MAX_SCORE),
                completed_at: row.completed_at,
                level: row.level,
                is_deleted: row.is_deleted.unwrap_or(false) || row.deleted_at.is_some(),
            }
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_rows_with_bad_scores_survive_as_missing() {
        let data = "\
id,total_score,max_score,completed_at,level,is_deleted
1,20,56,2024-01-01T09:00:00,mild,false
2,,56,2024-01-01T10:00:00,,
3,abc,56,2024-01-01T11:00:00,,true
";
        let records = read_csv(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].total_score, Some(20));
        assert_eq!(records[0].level.as_deref(), Some("mild"));
        assert_eq!(records[1].total_score, None);
        assert!(!records[1].is_deleted);
        assert_eq!(records[2].total_score, None);
        assert!(records[2].is_deleted);
    }

    #[test]
    fn csv_optional_columns_default() {
        let data = "id,total_score,completed_at\nA,12,2024-01-02\n";
        let records = read_csv(data.as_bytes()).unwrap();
        assert_eq!(records[0].max_score, DEFAULT_MAX_SCORE);
        assert_eq!(records[0].completed_at.as_deref(), Some("2024-01-02"));
        assert!(!records[0].is_deleted);
    }

    #[test]
    fn json_accepts_api_shape() {
        let data = r#"[
            {"id": 7, "total_score": 30, "max_score": 56, "level": "moderate",
             "percentage": 54, "completed_at": "2024-01-05T20:11:00", "is_deleted": false, "deleted_at": null},
            {"id": "b-2", "total_score": null, "completed_at": "2024-01-05T21:00:00"},
            {"id": 9, "total_score": 10, "completed_at": "2024-01-05T22:00:00", "deleted_at": "2024-01-06T08:00:00"}
        ]"#;
        let records = read_json(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, "7");
        assert_eq!(records[0].total_score, Some(30));
        assert!(!records[0].is_deleted);
        assert_eq!(records[1].id, "b-2");
        assert_eq!(records[1].total_score, None);
        assert!(records[2].is_deleted);
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(InputFormat::from_path(Path::new("h.CSV")).unwrap(), InputFormat::Csv);
        assert_eq!(InputFormat::from_path(Path::new("h.json")).unwrap(), InputFormat::Json);
        assert!(InputFormat::from_path(Path::new("h.txt")).is_err());
    }
}
