//! pdfmask command line

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pdfmask_core::{
    extract_text, page_count, parse_oracle_payload, redact_records, MaskConfig,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pdfmask")]
#[command(version, about = "Replace sensitive text in PDF documents with synthetic values")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the page-marked text an entity oracle would receive
    Extract {
        input: PathBuf,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Replace the values listed in an oracle answer
    Redact {
        input: PathBuf,

        /// Oracle answer: `{"sensitive_elements": [...]}` or a chat completion
        #[arg(long)]
        records: PathBuf,

        /// Where to write the anonymized PDF
        #[arg(short, long)]
        output: PathBuf,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the JSON summary here instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,

        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },
    /// Print the number of pages
    Pages { input: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries command output; logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Extract { input, config } => {
            let config = load_config(config.as_deref())?;
            let bytes = read_pdf(&input)?;
            let extracted = extract_text(&bytes, &config)
                .with_context(|| format!("failed to extract text from {}", input.display()))?;
            if extracted.text_truncated {
                warn!(
                    full_length = extracted.full_length,
                    budget = config.text_budget,
                    "Text truncated to the analysis budget"
                );
            }
            println!("{}", extracted.text);
        }
        Command::Redact {
            input,
            records,
            output,
            config,
            report,
            force,
        } => {
            let config = load_config(config.as_deref())?;
            if output.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    output.display()
                );
            }
            let bytes = read_pdf(&input)?;
            let payload = fs::read_to_string(&records)
                .with_context(|| format!("failed to read {}", records.display()))?;
            let records = parse_oracle_payload(&payload, &config)
                .with_context(|| format!("failed to parse {}", records.display()))?;

            let result = redact_records(&bytes, records, &config)
                .with_context(|| format!("failed to anonymize {}", input.display()))?;
            write_atomic(&output, &result.pdf)?;
            info!(
                output = %output.display(),
                bytes = result.metrics.output_size_bytes,
                ms = result.metrics.processing_time_ms,
                "Anonymized PDF written"
            );

            let summary = serde_json::to_string_pretty(&result.summary)?;
            match report {
                Some(path) => write_atomic(&path, summary.as_bytes())?,
                None => println!("{summary}"),
            }
        }
        Command::Pages { input } => {
            let bytes = read_pdf(&input)?;
            println!("{}", page_count(&bytes)?);
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<MaskConfig> {
    match path {
        Some(path) => MaskConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(MaskConfig::default()),
    }
}

/// Read `path`, refusing anything without a PDF header.
fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if !looks_like_pdf(&bytes) {
        bail!("{} is not a PDF file", path.display());
    }
    Ok(bytes)
}

fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Write through a temporary file in the target directory, then rename, so
/// a failed run never leaves a partial file behind.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?;
    let tmp = dir.join(format!(".{}.tmp", file_name.to_string_lossy()));

    let result = fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("failed to write {}", path.display()));
    }
    Ok(())
}
