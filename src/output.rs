//! JSON and CSV writers for a [`ResultSet`].
//!
//! The JSON document is the primary output. Each CSV holds one record type
//! with a header row of field names and every cell quoted. CSV cells are
//! derived from the same serde representation as the JSON, so both always
//! agree on content and order.

use crate::error::{Result, ResultExt, ScrapeError};
use crate::model::{ResultSet, Tweet, UserProfile};
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const JSON_FILE: &str = "twitter_profiles_data.json";
pub const USERS_CSV_FILE: &str = "users.csv";
pub const TWEETS_CSV_FILE: &str = "tweets.csv";
pub const HIGHLIGHT_TWEETS_CSV_FILE: &str = "highlight_tweets.csv";

/// Locations of the four output files inside an output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub json: PathBuf,
    pub users_csv: PathBuf,
    pub tweets_csv: PathBuf,
    pub highlight_tweets_csv: PathBuf,
}

impl OutputPaths {
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            json: dir.join(JSON_FILE),
            users_csv: dir.join(USERS_CSV_FILE),
            tweets_csv: dir.join(TWEETS_CSV_FILE),
            highlight_tweets_csv: dir.join(HIGHLIGHT_TWEETS_CSV_FILE),
        }
    }
}

/// Write the JSON document and all three CSVs into `dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or any file fails
/// to write.
pub fn write_all(results: &ResultSet, dir: &Path) -> Result<OutputPaths> {
    std::fs::create_dir_all(dir).map_err(|e| ScrapeError::path_error("create directory", dir, e))?;
    let paths = OutputPaths::in_dir(dir);

    write_json(&paths.json, results)?;
    info!(path = %paths.json.display(), "Wrote JSON output");
    write_csvs(results, &paths)?;

    Ok(paths)
}

/// Write only the CSVs, e.g. when regenerating them from a JSON file.
///
/// # Errors
///
/// Returns an error if any CSV fails to write.
pub fn write_csvs(results: &ResultSet, paths: &OutputPaths) -> Result<()> {
    write_csv(&paths.users_csv, &results.users)?;
    write_csv(&paths.tweets_csv, &results.tweets)?;
    write_csv(&paths.highlight_tweets_csv, &results.highlight_tweets)?;
    info!(
        users = results.users.len(),
        tweets = results.tweets.len(),
        highlight_tweets = results.highlight_tweets.len(),
        "Wrote CSV outputs"
    );
    Ok(())
}

/// Pretty-print `results` as JSON with a four-space indent.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_json(path: &Path, results: &ResultSet) -> Result<()> {
    let file = File::create(path).map_err(|e| ScrapeError::path_error("create", path, e))?;
    let mut writer = BufWriter::new(file);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    results.serialize(&mut serializer)?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .map_err(|e| ScrapeError::path_error("write", path, e))
}

/// Load a JSON document previously produced by [`write_json`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn read_json(path: &Path) -> Result<ResultSet> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ScrapeError::path_error("read", path, e))?;
    serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))
}

/// Regenerate the three CSVs in `dir` from the JSON document at `json_path`.
///
/// # Errors
///
/// Returns an error if the JSON cannot be read or a CSV cannot be written.
pub fn convert_json_to_csv(json_path: &Path, dir: &Path) -> Result<OutputPaths> {
    let results = read_json(json_path)?;
    std::fs::create_dir_all(dir).map_err(|e| ScrapeError::path_error("create directory", dir, e))?;
    let paths = OutputPaths {
        json: json_path.to_path_buf(),
        ..OutputPaths::in_dir(dir)
    };
    write_csvs(&results, &paths)?;
    Ok(paths)
}

/// Records that can be written as CSV rows.
///
/// The header comes from a default instance so empty files still get one.
pub trait CsvRecord: Serialize + Default {
    /// Column names, in field declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not serialize to a JSON object.
    fn csv_headers() -> Result<Vec<String>> {
        Ok(fields_of(&Self::default())?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Cell values, aligned with [`csv_headers`](Self::csv_headers).
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not serialize to a JSON object.
    fn csv_row(&self) -> Result<Vec<String>> {
        Ok(fields_of(self)?
            .into_iter()
            .map(|(_, value)| render_cell(&value))
            .collect())
    }
}

impl CsvRecord for UserProfile {}
impl CsvRecord for Tweet {}

fn fields_of<T: Serialize>(record: &T) -> Result<Vec<(String, Value)>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(ScrapeError::invalid_data(format!(
            "expected a record object, got {other}"
        ))),
    }
}

/// Strings are written raw, nulls as empty cells, everything else as JSON.
fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write `records` to a fully quoted CSV with a header row.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_csv<T: CsvRecord>(path: &Path, records: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_path(path)?;

    writer.write_record(T::csv_headers()?)?;
    for record in records {
        writer.write_record(record.csv_row()?)?;
    }
    writer
        .flush()
        .map_err(|e| ScrapeError::path_error("write", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_cell_variants() {
        assert_eq!(render_cell(&Value::Null), "");
        assert_eq!(render_cell(&Value::from("hi")), "hi");
        assert_eq!(render_cell(&Value::from(42)), "42");
        assert_eq!(render_cell(&Value::from(true)), "true");
        assert_eq!(render_cell(&serde_json::json!(["a", "b"])), r#"["a","b"]"#);
    }

    #[test]
    fn headers_follow_declaration_order() {
        let headers = Tweet::csv_headers().unwrap();
        assert_eq!(headers.first().map(String::as_str), Some("tweet_id"));
        assert_eq!(headers.get(1).map(String::as_str), Some("user_id"));
        assert_eq!(headers.last().map(String::as_str), Some("edits_remaining"));

        let headers = UserProfile::csv_headers().unwrap();
        assert_eq!(headers.first().map(String::as_str), Some("id"));
        assert!(headers.iter().any(|h| h == "withheld_in_countries"));
    }

    #[test]
    fn empty_csv_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tweets.csv");
        write_csv::<Tweet>(&path, &[]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("\"tweet_id\",\"user_id\",\"text\""));
    }

    #[test]
    fn every_cell_is_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tweets.csv");
        let tweet = Tweet {
            tweet_id: "1".into(),
            user_id: "9".into(),
            text: "line one\nsaid \"hi\"".into(),
            ..Tweet::default()
        };
        write_csv(&path, &[tweet]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "1");
        assert_eq!(&row[2], "line one\nsaid \"hi\"");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"1\",\"9\""));
    }

    #[test]
    fn json_uses_four_space_indent_and_keeps_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(JSON_FILE);
        let mut results = ResultSet::new();
        results.users.push(UserProfile {
            id: "1".into(),
            name: "Zoë".into(),
            ..UserProfile::default()
        });
        write_json(&path, &results).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n    \"users\": ["));
        assert!(raw.contains("Zoë"));
        assert_eq!(read_json(&path).unwrap().users, results.users);
    }

    #[test]
    fn non_object_record_is_invalid_data() {
        let err = fields_of(&vec![1, 2]).unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidData { .. }));
        assert!(!err.is_fatal());
    }
}
