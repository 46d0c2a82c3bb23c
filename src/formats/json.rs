//! JSON Lines sink for normalized tables.
//!
//! Writes one document per row into `<Table>.jsonl`, optionally gzip
//! compressed, in the shape a document store would receive from `insert_many`.

use flate2::write::GzEncoder;
use flate2::Compression;
use crate::core::rows::{Table, TableBatch};
use crate::core::traits::TableSink;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// JSON Lines writer producing one file per table.
pub struct JsonlWriter {
    dir: PathBuf,
    compression: JsonlCompression,
}

#[derive(Debug, Clone, Copy)]
enum JsonlCompression {
    None,
    Gzip,
}

impl JsonlCompression {
    fn ext(self) -> &'static str {
        match self {
            JsonlCompression::None => "jsonl",
            JsonlCompression::Gzip => "jsonl.gz",
        }
    }
}

impl JsonlWriter {
    pub fn new(dir: impl Into<PathBuf>, compression: Option<&str>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            compression: parse_compression(compression)?,
        })
    }
}

impl TableSink for JsonlWriter {
    fn emit(&mut self, batch: TableBatch<'_>) -> io::Result<u64> {
        let table = batch.table();
        let ext = self.compression.ext();
        let temp_path = table_path(&self.dir, table, &format!("{ext}.tmp"));
        let file = File::create(&temp_path)?;

        match self.compression {
            JsonlCompression::None => {
                let mut writer = BufWriter::new(file);
                write_batch(&mut writer, batch)?;
                writer.flush()?;
            }
            JsonlCompression::Gzip => {
                let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
                write_batch(&mut encoder, batch)?;
                encoder.finish()?.flush()?;
            }
        }

        let final_path = table_path(&self.dir, table, ext);
        fs::rename(&temp_path, &final_path)?;
        tracing::info!(rows = batch.len(), path = %final_path.display(), "wrote table");
        Ok(batch.len() as u64)
    }

    fn close(&mut self) -> io::Result<()> {
        // Each table is renamed into place at the end of `emit`.
        Ok(())
    }
}

fn table_path(dir: &Path, table: Table, ext: &str) -> PathBuf {
    dir.join(format!("{}.{ext}", table.name()))
}

fn write_batch(writer: &mut impl Write, batch: TableBatch<'_>) -> io::Result<()> {
    match batch {
        TableBatch::Account(rows) => write_rows(writer, rows),
        TableBatch::Identity(rows) => write_rows(writer, rows),
        TableBatch::Session(rows) => write_rows(writer, rows),
        TableBatch::Event(rows) => write_rows(writer, rows),
        TableBatch::Resource(rows) => write_rows(writer, rows),
        TableBatch::EventResource(rows) => write_rows(writer, rows),
    }
}

fn write_rows<T: Serialize>(writer: &mut impl Write, rows: &[T]) -> io::Result<()> {
    for row in rows {
        serde_json::to_writer(&mut *writer, row)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

fn parse_compression(value: Option<&str>) -> io::Result<JsonlCompression> {
    let Some(value) = value else {
        return Ok(JsonlCompression::None);
    };
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() || normalized == "none" {
        return Ok(JsonlCompression::None);
    }
    match normalized.as_str() {
        "gzip" | "gz" => Ok(JsonlCompression::Gzip),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported jsonl compression: {value}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rows::{IdentityRow, Tables};
    use crate::core::traits::emit_tables;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn tables() -> Tables {
        let mut tables = Tables::default();
        for idx in 0..3 {
            tables.identities.push(IdentityRow {
                identity_id: format!("arn:aws:iam::1:user/u{idx}"),
                identity_type: "IAMUser".to_string(),
                principal_id: format!("AIDA{idx}"),
                arn: format!("arn:aws:iam::1:user/u{idx}"),
                user_name: format!("u{idx}"),
                account_id: "1".to_string(),
            });
        }
        tables
    }

    #[test]
    fn writes_one_document_per_row() {
        let dir = TempDir::new().unwrap();
        let mut writer = JsonlWriter::new(dir.path(), None).unwrap();
        let total = emit_tables(&mut writer, &tables()).unwrap();
        assert_eq!(total, 3);

        let contents = fs::read_to_string(dir.path().join("Identity.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["type"], "IAMUser");
        assert_eq!(lines[1]["user_name"], "u1");
        assert_eq!(fs::read_to_string(dir.path().join("Account.jsonl")).unwrap(), "");
    }

    #[test]
    fn gzip_output_decodes() {
        let dir = TempDir::new().unwrap();
        let mut writer = JsonlWriter::new(dir.path(), Some("gzip")).unwrap();
        emit_tables(&mut writer, &tables()).unwrap();

        let file = File::open(dir.path().join("Identity.jsonl.gz")).unwrap();
        let mut contents = String::new();
        GzDecoder::new(file).read_to_string(&mut contents).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert!(!dir.path().join("Identity.jsonl.gz.tmp").exists());
    }

    #[test]
    fn rejects_unknown_compression() {
        let dir = TempDir::new().unwrap();
        assert!(JsonlWriter::new(dir.path(), Some("brotli")).is_err());
    }
}
