//! Parquet sink for normalized tables.
//!
//! Writes one file per table (`Account.parquet`, ...), in Arrow batches of
//! `batch_size` rows, via a temp file that is renamed into place on close.

use arrow_array::builder::{BooleanBuilder, StringBuilder, TimestampMillisecondBuilder};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::DateTime;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use crate::core::config::FormatOptions;
use crate::core::rows::{
    AccountRow, EventResourceRow, EventRow, IdentityRow, ResourceRow, SessionRow, Table,
    TableBatch,
};
use crate::core::traits::TableSink;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_BATCH_SIZE: usize = 1024;
const TIMESTAMP_ZONE: &str = "UTC";

/// Parquet writer producing one file per table.
pub struct ParquetWriter {
    dir: PathBuf,
    batch_size: usize,
    timestamp_columns: bool,
    compression: Compression,
    written: Vec<PathBuf>,
}

impl ParquetWriter {
    /// Creates a Parquet writer with the default batch size and no compression.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        Self::with_options(dir, &FormatOptions::default())
    }

    pub fn with_options(dir: impl Into<PathBuf>, options: &FormatOptions) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            batch_size: options.batch_size.filter(|size| *size > 0).unwrap_or(DEFAULT_BATCH_SIZE),
            timestamp_columns: options.timestamp_columns.unwrap_or(false),
            compression: parse_compression(options.compression.as_deref())?,
            written: Vec::new(),
        })
    }

    /// Files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl TableSink for ParquetWriter {
    fn emit(&mut self, batch: TableBatch<'_>) -> io::Result<u64> {
        let table = batch.table();
        let schema = build_schema(table, self.timestamp_columns);
        let temp_path = table_path(&self.dir, table, "parquet.tmp");
        let mut writer = open_writer(&temp_path, schema.clone(), self.compression)?;

        let mut start = 0;
        while start < batch.len() {
            let end = (start + self.batch_size).min(batch.len());
            let columns = build_columns(batch.slice(start, end), self.timestamp_columns);
            let record_batch =
                RecordBatch::try_new(schema.clone(), columns).map_err(map_arrow_err)?;
            writer.write(&record_batch).map_err(map_parquet_err)?;
            start = end;
        }
        writer.close().map_err(map_parquet_err)?;

        let final_path = table_path(&self.dir, table, "parquet");
        fs::rename(&temp_path, &final_path)?;
        tracing::info!(rows = batch.len(), path = %final_path.display(), "wrote table");
        self.written.push(final_path);
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

fn open_writer(
    path: &Path,
    schema: SchemaRef,
    compression: Compression,
) -> io::Result<ArrowWriter<File>> {
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(compression)
        .build();
    ArrowWriter::try_new(file, schema, Some(props)).map_err(map_parquet_err)
}

fn parse_compression(value: Option<&str>) -> io::Result<Compression> {
    let Some(value) = value else {
        return Ok(Compression::UNCOMPRESSED);
    };
    match value.trim().to_lowercase().as_str() {
        "" | "none" => Ok(Compression::UNCOMPRESSED),
        "snappy" => Ok(Compression::SNAPPY),
        "zstd" => Ok(Compression::ZSTD(
            ZstdLevel::try_new(3).map_err(map_parquet_err)?,
        )),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported parquet compression: {value}"),
        )),
    }
}

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some(TIMESTAMP_ZONE.into()))
}

fn utf8(name: &str) -> Field {
    Field::new(name, DataType::Utf8, false)
}

fn build_schema(table: Table, timestamp_columns: bool) -> SchemaRef {
    let time_field = |name: &str| {
        if timestamp_columns {
            Field::new(name, timestamp_type(), true)
        } else {
            utf8(name)
        }
    };
    let fields = match table {
        Table::Account => vec![
            utf8("account_id"),
            utf8("account_alias"),
            utf8("email"),
            utf8("phone"),
        ],
        Table::Identity => vec![
            utf8("identity_id"),
            utf8("type"),
            utf8("principal_id"),
            utf8("arn"),
            utf8("user_name"),
            utf8("account_id"),
        ],
        Table::Session => vec![
            utf8("session_id"),
            time_field("creation_date"),
            Field::new("mfa_authenticated", DataType::Boolean, false),
            utf8("additional_info"),
            utf8("identity_id"),
        ],
        Table::Event => vec![
            utf8("event_id"),
            time_field("event_time"),
            utf8("event_source"),
            utf8("event_name"),
            utf8("source_ip"),
            utf8("user_agent"),
            utf8("request_params"),
            utf8("response_params"),
            utf8("identity_id"),
            utf8("session_id"),
            utf8("account_id"),
        ],
        Table::Resource => vec![
            utf8("resource_id"),
            utf8("resource_name"),
            utf8("resource_type"),
            utf8("additional_metadata"),
        ],
        Table::EventResource => vec![
            utf8("event_id"),
            utf8("resource_id"),
            utf8("pre_state"),
            utf8("post_state"),
        ],
    };
    Arc::new(Schema::new(fields))
}

fn build_columns(batch: TableBatch<'_>, timestamp_columns: bool) -> Vec<ArrayRef> {
    match batch {
        TableBatch::Account(rows) => account_columns(rows),
        TableBatch::Identity(rows) => identity_columns(rows),
        TableBatch::Session(rows) => session_columns(rows, timestamp_columns),
        TableBatch::Event(rows) => event_columns(rows, timestamp_columns),
        TableBatch::Resource(rows) => resource_columns(rows),
        TableBatch::EventResource(rows) => event_resource_columns(rows),
    }
}

fn account_columns(rows: &[AccountRow]) -> Vec<ArrayRef> {
    vec![
        string_column(rows, |row| &row.account_id),
        string_column(rows, |row| &row.account_alias),
        string_column(rows, |row| &row.email),
        string_column(rows, |row| &row.phone),
    ]
}

fn identity_columns(rows: &[IdentityRow]) -> Vec<ArrayRef> {
    vec![
        string_column(rows, |row| &row.identity_id),
        string_column(rows, |row| &row.identity_type),
        string_column(rows, |row| &row.principal_id),
        string_column(rows, |row| &row.arn),
        string_column(rows, |row| &row.user_name),
        string_column(rows, |row| &row.account_id),
    ]
}

fn session_columns(rows: &[SessionRow], timestamp_columns: bool) -> Vec<ArrayRef> {
    let mut mfa = BooleanBuilder::with_capacity(rows.len());
    for row in rows {
        mfa.append_value(row.mfa_authenticated);
    }
    vec![
        string_column(rows, |row| &row.session_id),
        time_column(rows, |row| &row.creation_date, timestamp_columns),
        Arc::new(mfa.finish()),
        string_column(rows, |row| &row.additional_info),
        string_column(rows, |row| &row.identity_id),
    ]
}

fn event_columns(rows: &[EventRow], timestamp_columns: bool) -> Vec<ArrayRef> {
    vec![
        string_column(rows, |row| &row.event_id),
        time_column(rows, |row| &row.event_time, timestamp_columns),
        string_column(rows, |row| &row.event_source),
        string_column(rows, |row| &row.event_name),
        string_column(rows, |row| &row.source_ip),
        string_column(rows, |row| &row.user_agent),
        string_column(rows, |row| &row.request_params),
        string_column(rows, |row| &row.response_params),
        string_column(rows, |row| &row.identity_id),
        string_column(rows, |row| &row.session_id),
        string_column(rows, |row| &row.account_id),
    ]
}

fn resource_columns(rows: &[ResourceRow]) -> Vec<ArrayRef> {
    vec![
        string_column(rows, |row| &row.resource_id),
        string_column(rows, |row| &row.resource_name),
        string_column(rows, |row| &row.resource_type),
        string_column(rows, |row| &row.additional_metadata),
    ]
}

fn event_resource_columns(rows: &[EventResourceRow]) -> Vec<ArrayRef> {
    vec![
        string_column(rows, |row| &row.event_id),
        string_column(rows, |row| &row.resource_id),
        string_column(rows, |row| &row.pre_state),
        string_column(rows, |row| &row.post_state),
    ]
}

fn string_column<T>(rows: &[T], field: impl Fn(&T) -> &String) -> ArrayRef {
    let mut builder = StringBuilder::with_capacity(rows.len(), rows.len() * 32);
    for row in rows {
        builder.append_value(field(row));
    }
    Arc::new(builder.finish())
}

fn time_column<T>(rows: &[T], field: impl Fn(&T) -> &String, as_timestamp: bool) -> ArrayRef {
    if !as_timestamp {
        return string_column(rows, field);
    }
    let mut builder =
        TimestampMillisecondBuilder::with_capacity(rows.len()).with_timezone(TIMESTAMP_ZONE);
    for row in rows {
        builder.append_option(parse_millis(field(row)));
    }
    Arc::new(builder.finish())
}

fn parse_millis(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.timestamp_millis())
}

fn map_parquet_err(err: ParquetError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

fn map_arrow_err(err: arrow_schema::ArrowError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}
