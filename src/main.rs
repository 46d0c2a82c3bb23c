use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use trailgraph::core::config::{Config, FormatConfig};
use trailgraph::core::traits::{emit_tables, TableSink};
use trailgraph::formats::json::JsonlWriter;
use trailgraph::formats::parquet::ParquetWriter;
use trailgraph::sources::cloudtrail::model::text;
use trailgraph::sources::cloudtrail::{
    collect_inputs, import_files, natural_name, read_record_file, NormalizeOptions, Normalizer,
    ResourceClassifier,
};

#[derive(Debug, Parser)]
#[command(name = "trailgraph")]
#[command(about = "CloudTrail log normalizer", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Normalize log files into Account/Identity/Session/Event/Resource/EventResource tables.
    Import {
        /// Log files or directories of log files.
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the inferred resource type of each record without writing tables.
    Classify {
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Parquet,
    Jsonl,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Import {
            inputs,
            config,
            output,
            format,
            seed,
            dry_run,
        } => {
            let mut loaded = load_config(config.as_deref())?;

            if let Some(dir) = output {
                loaded.output.dir = dir.to_string_lossy().to_string();
            }
            if let Some(format) = format {
                loaded.output.format = match format {
                    OutputFormat::Parquet => loaded.output.format.into_parquet(),
                    OutputFormat::Jsonl => loaded.output.format.into_jsonl(),
                };
            }
            if seed.is_some() {
                loaded.seed = seed;
            }
            if !inputs.is_empty() {
                loaded.input.paths = inputs
                    .iter()
                    .map(|path| path.to_string_lossy().to_string())
                    .collect();
            }

            loaded.validate().context("invalid configuration")?;

            if dry_run {
                println!("config loaded: {loaded:#?}");
                return Ok(());
            }

            let files = resolve_files(&loaded)?;
            let mut sink: Box<dyn TableSink> = match &loaded.output.format {
                FormatConfig::Jsonl(options) => Box::new(JsonlWriter::new(
                    &loaded.output.dir,
                    options.compression.as_deref(),
                )?),
                FormatConfig::Parquet(options) => {
                    Box::new(ParquetWriter::with_options(&loaded.output.dir, options)?)
                }
            };

            let mut normalizer = Normalizer::new(NormalizeOptions::from_config(&loaded));
            let summary = import_files(&mut normalizer, &files);
            let tables = normalizer.finish();
            let rows = emit_tables(sink.as_mut(), &tables)
                .with_context(|| format!("failed writing tables to {}", loaded.output.dir))?;

            tracing::info!(
                files = summary.files_seen,
                failed = summary.files_failed,
                records = summary.records,
                rows,
                dir = %loaded.output.dir,
                "import complete"
            );
        }
        Commands::Classify { inputs, config } => {
            let mut loaded = load_config(config.as_deref())?;
            if !inputs.is_empty() {
                loaded.input.paths = inputs
                    .iter()
                    .map(|path| path.to_string_lossy().to_string())
                    .collect();
            }
            let classifier = ResourceClassifier::with_custom_rules(&loaded.normalize.rules);
            let style = loaded.normalize.resource_type_style;

            for path in resolve_files(&loaded)? {
                let parsed = match read_record_file(&path) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping file");
                        continue;
                    }
                };
                for record in &parsed.records {
                    let params = record.request_map();
                    let resource_type = classifier
                        .classify(params)
                        .map(|resource_type| resource_type.render(style))
                        .unwrap_or_else(|| "-".to_string());
                    let name = natural_name(params);
                    println!(
                        "{}\t{}\t{}\t{}\tinstances={}",
                        path.display(),
                        text(record.event_name.as_ref()),
                        resource_type,
                        if name.is_empty() { "-" } else { name.as_str() },
                        record.instance_items().len()
                    );
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn resolve_files(config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    let inputs: Vec<PathBuf> = config.input.paths.iter().map(PathBuf::from).collect();
    if inputs.is_empty() {
        bail!("no input paths given (pass them as arguments or set input.paths)");
    }
    collect_inputs(&inputs).context("failed to list input files")
}
