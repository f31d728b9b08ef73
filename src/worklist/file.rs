//! CSV work list files
//!
//! Format: header `subreddit,subscribers,retry_count`, one row per item.
//! Unknown columns are ignored on load and dropped on save.

use crate::worklist::WorkListError;
use serde::{Deserialize, Deserializer, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Column names written on save
pub const HEADER: [&str; 3] = ["subreddit", "subscribers", "retry_count"];

/// One row of the external work list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRow {
    #[serde(rename = "subreddit")]
    pub name: String,

    /// Subscriber count at the time the list was built
    #[serde(rename = "subscribers", default, deserialize_with = "lenient_count")]
    pub popularity: u64,

    #[serde(default, deserialize_with = "lenient_count")]
    pub retry_count: u32,
}

impl WorkRow {
    pub fn new(name: impl Into<String>, popularity: u64) -> Self {
        Self {
            name: name.into(),
            popularity,
            retry_count: 0,
        }
    }
}

/// Reads counts written as `12`, `12.0`, or left empty (0)
fn lenient_count<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + Default,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let value = raw
        .as_deref()
        .map(str::trim)
        .and_then(|s| {
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64))
        })
        .unwrap_or(0);
    Ok(T::try_from(value).unwrap_or_default())
}

/// Loads every row with a non-empty name
pub fn load(path: &Path) -> Result<Vec<WorkRow>, WorkListError> {
    if !path.exists() {
        return Err(WorkListError::NotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.deserialize::<WorkRow>() {
        let row = record?;
        if !row.name.is_empty() {
            rows.push(row);
        }
    }

    tracing::debug!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Rewrites the list atomically: `<path>.tmp` first, then a rename
pub fn save(path: &Path, rows: &[WorkRow]) -> Result<(), WorkListError> {
    let tmp = temp_path(path);

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp)?;
        writer.write_record(HEADER)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }

    std::fs::rename(&tmp, path)?;
    tracing::debug!("Saved {} rows to {}", rows.len(), path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_lenient_rows() {
        let file = write_csv(
            "subreddit,subscribers,retry_count,extra\n\
             rust,300000,0,x\n\
             ,5,0,x\n\
             golang, 12.0 ,,x\n\
             tiny,,2,x\n",
        );

        let rows = load(file.path()).unwrap();
        assert_eq!(
            rows,
            vec![
                WorkRow::new("rust", 300000),
                WorkRow::new("golang", 12),
                WorkRow {
                    name: "tiny".to_string(),
                    popularity: 0,
                    retry_count: 2
                },
            ]
        );
    }

    #[test]
    fn test_load_without_retry_column() {
        let file = write_csv("subreddit,subscribers\nrust,10\n");
        let rows = load(file.path()).unwrap();
        assert_eq!(rows, vec![WorkRow::new("rust", 10)]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(&dir.path().join("absent.csv")),
            Err(WorkListError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.csv");
        let rows = vec![WorkRow::new("rust", 5), WorkRow::new("golang", 7)];

        save(&path, &rows).unwrap();

        assert_eq!(load(&path).unwrap(), rows);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_save_empty_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.csv");

        save(&path, &[]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), "subreddit,subscribers,retry_count");
        assert!(load(&path).unwrap().is_empty());
    }
}
