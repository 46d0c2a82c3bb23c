use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Error while loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid rule #{index}: {reason}")]
    InvalidRule { index: usize, reason: String },
    #[error("unsupported {format} compression: {compression}")]
    InvalidCompression {
        format: &'static str,
        compression: String,
    },
}

/// Top-level import configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Optional RNG seed for reproducible synthesized values.
    pub seed: Option<u64>,
    /// Input files or directories.
    #[serde(default)]
    pub input: InputConfig,
    /// Output sink configuration.
    #[serde(default)]
    pub output: OutputConfig,
    /// Normalization controls.
    #[serde(default)]
    pub normalize: NormalizeConfig,
}

impl Config {
    /// Loads a config file from TOML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects output settings the sink would refuse and custom rules that
    /// could never match or would emit an empty type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.output.format.validate()?;
        for (index, rule) in self.normalize.rules.iter().enumerate() {
            if rule.resource_type.trim().is_empty() {
                return Err(ConfigError::InvalidRule {
                    index,
                    reason: "resource_type must not be empty".to_string(),
                });
            }
            if rule.any.is_empty() && rule.all.is_empty() {
                return Err(ConfigError::InvalidRule {
                    index,
                    reason: format!("{} needs at least one key in `any` or `all`", rule.resource_type),
                });
            }
        }
        Ok(())
    }
}

/// Input paths to import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Output sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory for the table files.
    pub dir: String,
    /// Output format selection.
    pub format: FormatConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "out".to_string(),
            format: FormatConfig::default(),
        }
    }
}

/// Output format selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormatConfig {
    Jsonl(FormatOptions),
    Parquet(FormatOptions),
}

impl Default for FormatConfig {
    fn default() -> Self {
        FormatConfig::Parquet(FormatOptions::default())
    }
}

impl FormatConfig {
    pub fn options(&self) -> &FormatOptions {
        match self {
            FormatConfig::Jsonl(options) | FormatConfig::Parquet(options) => options,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FormatConfig::Jsonl(_) => "jsonl",
            FormatConfig::Parquet(_) => "parquet",
        }
    }

    /// Switches to JSON Lines. Compression is dropped when the format changes.
    pub fn into_jsonl(self) -> FormatConfig {
        match self {
            FormatConfig::Jsonl(options) => FormatConfig::Jsonl(options),
            FormatConfig::Parquet(options) => FormatConfig::Jsonl(options.without_compression()),
        }
    }

    /// Switches to Parquet. Compression is dropped when the format changes.
    pub fn into_parquet(self) -> FormatConfig {
        match self {
            FormatConfig::Parquet(options) => FormatConfig::Parquet(options),
            FormatConfig::Jsonl(options) => FormatConfig::Parquet(options.without_compression()),
        }
    }

    fn supported_compressions(&self) -> &'static [&'static str] {
        match self {
            FormatConfig::Jsonl(_) => &["none", "gzip", "gz"],
            FormatConfig::Parquet(_) => &["none", "snappy", "zstd"],
        }
    }

    /// Checks the compression codec against what this format's sink accepts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(compression) = self.options().compression.as_deref() else {
            return Ok(());
        };
        let normalized = compression.trim().to_lowercase();
        if normalized.is_empty() || self.supported_compressions().contains(&normalized.as_str()) {
            return Ok(());
        }
        Err(ConfigError::InvalidCompression {
            format: self.name(),
            compression: compression.to_string(),
        })
    }
}

/// Per-format options (compression, batching, column types).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatOptions {
    pub compression: Option<String>,
    /// Rows per Arrow record batch.
    pub batch_size: Option<usize>,
    /// Store `event_time` and `creation_date` as timestamps (Parquet only).
    pub timestamp_columns: Option<bool>,
}

impl FormatOptions {
    fn without_compression(self) -> Self {
        Self {
            compression: None,
            ..self
        }
    }
}

/// Normalization controls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeConfig {
    #[serde(default)]
    pub resource_type_style: TypeStyle,
    /// Extra resource rules, evaluated before the built-in cascade.
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleConfig>,
}

/// Spelling of resource type tags in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeStyle {
    /// `S3Bucket`, `EC2Instance`.
    #[default]
    Pascal,
    /// `s3bucket`, `ec2instance`.
    Lower,
}

/// A custom resource rule declared in the config file.
///
/// The rule matches when every key in `all` is present and, if `any` is
/// non-empty, at least one key in `any` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub resource_type: String,
    #[serde(default)]
    pub any: Vec<String>,
    #[serde(default)]
    pub all: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let raw = r#"
seed = 7

[input]
paths = ["logs/"]

[output]
dir = "tables"

[output.format]
type = "jsonl"
compression = "gzip"

[normalize]
resource_type_style = "lower"

[[normalize.rule]]
resource_type = "DynamoDBTable"
any = ["tableName"]
"#;
        let config: Config = toml::from_str(raw).expect("config");
        config.validate().expect("valid");
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.input.paths, vec!["logs/".to_string()]);
        assert_eq!(config.output.dir, "tables");
        assert!(matches!(config.output.format, FormatConfig::Jsonl(_)));
        assert_eq!(config.output.format.options().compression.as_deref(), Some("gzip"));
        assert_eq!(config.normalize.resource_type_style, TypeStyle::Lower);
        assert_eq!(config.normalize.rules.len(), 1);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").expect("config");
        assert_eq!(config.output.dir, "out");
        assert!(matches!(config.output.format, FormatConfig::Parquet(_)));
        assert_eq!(config.normalize.resource_type_style, TypeStyle::Pascal);
        assert!(config.normalize.rules.is_empty());
    }

    #[test]
    fn rule_without_keys_is_rejected() {
        let raw = r#"
[[normalize.rule]]
resource_type = "Nothing"
"#;
        let config: Config = toml::from_str(raw).expect("config");
        let err = config.validate().expect_err("invalid rule");
        assert!(matches!(err, ConfigError::InvalidRule { index: 0, .. }));
    }

    #[test]
    fn compression_must_suit_the_format() {
        let raw = r#"
[output.format]
type = "jsonl"
compression = "zstd"
"#;
        let config: Config = toml::from_str(raw).expect("config");
        let err = config.validate().expect_err("zstd is not a jsonl codec");
        assert!(matches!(
            err,
            ConfigError::InvalidCompression { format: "jsonl", .. }
        ));

        let raw = r#"
[output.format]
type = "parquet"
compression = "ZSTD"
"#;
        let config: Config = toml::from_str(raw).expect("config");
        config.validate().expect("zstd parquet");
    }

    #[test]
    fn switching_format_drops_compression() {
        let parquet = FormatConfig::Parquet(FormatOptions {
            compression: Some("zstd".to_string()),
            batch_size: Some(64),
            timestamp_columns: Some(true),
        });

        let jsonl = parquet.clone().into_jsonl();
        assert!(matches!(jsonl, FormatConfig::Jsonl(_)));
        assert_eq!(jsonl.options().compression, None);
        assert_eq!(jsonl.options().batch_size, Some(64));
        jsonl.validate().expect("valid after switch");

        let same = parquet.into_parquet();
        assert_eq!(same.options().compression.as_deref(), Some("zstd"));

        let gzip = FormatConfig::Jsonl(FormatOptions {
            compression: Some("gzip".to_string()),
            ..FormatOptions::default()
        });
        assert_eq!(gzip.clone().into_jsonl().options().compression.as_deref(), Some("gzip"));
        assert_eq!(gzip.into_parquet().options().compression, None);
    }
}
