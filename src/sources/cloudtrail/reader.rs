//! CloudTrail log file discovery and import.

use crate::sources::cloudtrail::model::RecordFile;
use crate::sources::cloudtrail::normalizer::Normalizer;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error while reading one log file. The file is skipped as a whole.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path}: malformed CloudTrail file: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files_seen: usize,
    pub files_failed: usize,
    pub records: usize,
}

/// Expands inputs into the list of files to read.
///
/// Files are taken as given. Directories contribute the `.json` and
/// `.json.gz` files directly inside them, sorted by file name. Inputs that
/// cannot be read are logged and skipped.
pub fn collect_inputs(inputs: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let metadata = match fs::metadata(input) {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::warn!(input = %input.display(), error = %err, "skipping input");
                continue;
            }
        };
        if metadata.is_file() {
            files.push(input.clone());
            continue;
        }
        let entries = match fs::read_dir(input) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(input = %input.display(), error = %err, "skipping input");
                continue;
            }
        };
        let mut found = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_log_file(&path) {
                found.push(path);
            }
        }
        found.sort();
        tracing::info!(dir = %input.display(), files = found.len(), "found JSON files");
        files.extend(found);
    }
    Ok(files)
}

fn is_log_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".json") || name.ends_with(".json.gz")
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Reads and parses one `{"Records": [...]}` file, gzip or plain.
pub fn read_record_file(path: &Path) -> Result<RecordFile, ReadError> {
    let file = File::open(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    serde_json::from_reader(BufReader::new(reader)).map_err(|source| {
        if source.is_io() {
            ReadError::Io {
                path: path.to_path_buf(),
                source: source.into(),
            }
        } else {
            ReadError::Json {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Feeds every file into `normalizer`, skipping files that fail to read.
pub fn import_files(normalizer: &mut Normalizer, files: &[PathBuf]) -> ImportSummary {
    let mut summary = ImportSummary::default();
    for path in files {
        summary.files_seen += 1;
        tracing::info!(file = %path.display(), "processing file");
        let parsed = match read_record_file(path) {
            Ok(parsed) => parsed,
            Err(err) => {
                summary.files_failed += 1;
                tracing::warn!(error = %err, "skipping file");
                continue;
            }
        };
        let before = normalizer.tables().counts();
        normalizer.ingest_all(&parsed.records);
        summary.records += parsed.records.len();
        let added = normalizer.tables().counts().since(&before);
        tracing::info!(
            file = %path.display(),
            accounts = added.accounts,
            identities = added.identities,
            sessions = added.sessions,
            events = added.events,
            resources = added.resources,
            event_resources = added.event_resources,
            "processed file"
        );
    }
    summary
}
