//! `sigcat` catalogs a subject's recording sessions into a checksum manifest.
//!
//! # Usage
//!
//! ```text
//! sigcat build --project tfs --subject 625 --data-dir /data     # writes tfs_625.sgcm
//! sigcat build -c sigcat.toml --project lab --subject s01 --data-dir ./raw --schema nested
//! sigcat print --input-file tfs_625.sgcm                        # dump a manifest
//! sigcat verify --input-file tfs_625.sgcm --data-dir /data      # re-check the dataset
//! ```

mod config;
mod printer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sigcat_cas::{
    ManifestBuilder, diff_manifests, manifest_file_name, read_manifest_file, write_manifest_file,
};
use sigcat_store::LocalSource;
use sigcat_types::{BuildPolicy, DatasetConfig, HashAlgorithm, KeyScheme, Manifest, SchemaKind};
use tracing::{info, warn};

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "sigcat",
    version,
    about = "Catalog neural recording datasets into checksum manifests"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true, env = "SIGCAT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a manifest for one subject and write it to disk.
    Build {
        /// Project identifier (e.g. "tfs", "podcast").
        #[arg(short, long)]
        project: String,

        /// Subject identifier; also the subject's folder under the data directory.
        #[arg(short, long)]
        subject: String,

        /// Dataset root containing one folder per subject.
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Output file. Defaults to `<project>_<subject>.sgcm` in the working directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record shape: "flat" or "nested".
        #[arg(long)]
        schema: Option<SchemaKind>,

        /// Digest algorithm: "sha256", "sha512" or "blake3".
        #[arg(long)]
        algorithm: Option<HashAlgorithm>,

        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Print a manifest file.
    Print {
        /// Manifest file to read.
        #[arg(short, long)]
        input_file: PathBuf,
    },

    /// Rebuild a manifest from disk and report any differences.
    ///
    /// The schema, algorithm, key scheme and caps recorded in the manifest
    /// are reused; selection flags given here override the recorded ones.
    /// Exits non-zero when the dataset no longer matches.
    Verify {
        /// Manifest file to check against.
        #[arg(short, long)]
        input_file: PathBuf,

        /// Dataset root containing one folder per subject.
        #[arg(short, long)]
        data_dir: PathBuf,

        #[command(flatten)]
        selection: SelectionArgs,
    },
}

/// Selection overrides shared by `build` and `verify`.
#[derive(Args, Debug, Default)]
struct SelectionArgs {
    /// Outer key scheme: "index" or "basename".
    #[arg(long)]
    key_scheme: Option<KeyScheme>,

    /// Maximum sessions to include (0 = all).
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Maximum channel files per session (0 = all).
    #[arg(long)]
    max_channels: Option<usize>,

    /// Concurrent checksum workers.
    #[arg(short, long)]
    workers: Option<usize>,
}

impl SelectionArgs {
    fn apply(&self, policy: &mut BuildPolicy) {
        if let Some(scheme) = self.key_scheme {
            policy.key_scheme = scheme;
        }
        if let Some(cap) = self.max_sessions {
            policy.max_sessions = (cap > 0).then_some(cap);
        }
        if let Some(cap) = self.max_channels {
            policy.max_channels = (cap > 0).then_some(cap);
        }
        if let Some(workers) = self.workers {
            policy.workers = workers;
        }
    }
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::Build {
            project,
            subject,
            data_dir,
            output,
            schema,
            algorithm,
            selection,
        } => {
            let mut dataset = config.resolve(&project, &subject, data_dir)?;
            // CLI args override config file values.
            if let Some(schema) = schema {
                dataset.policy.schema = schema;
            }
            if let Some(algorithm) = algorithm {
                dataset.policy.algorithm = algorithm;
            }
            selection.apply(&mut dataset.policy);

            let output = output.unwrap_or_else(|| manifest_file_name(&project, &subject));
            let digest = cmd_build(dataset, &output).await?;
            println!("Wrote {} (blake3 {digest})", output.display());
            Ok(())
        }
        Commands::Print { input_file } => cmd_print(&input_file),
        Commands::Verify {
            input_file,
            data_dir,
            selection,
        } => {
            let stored = read_manifest_file(&input_file)
                .with_context(|| format!("failed to read {}", input_file.display()))?;
            let dataset = config.resolve(&stored.project, &stored.subject, data_dir)?;

            let discrepancies = cmd_verify(&stored, dataset, &selection).await?;
            if discrepancies > 0 {
                anyhow::bail!("{discrepancies} discrepancies against {}", input_file.display());
            }
            println!("{} matches the dataset", input_file.display());
            Ok(())
        }
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
/// Logs go to stderr so printed manifests stay clean on stdout.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// -----------------------------------------------------------------------
// sigcat build
// -----------------------------------------------------------------------

async fn build_manifest(dataset: DatasetConfig) -> Result<Manifest> {
    let root = dataset.subject_root();
    let builder = ManifestBuilder::new(Arc::new(LocalSource), dataset)?;
    builder
        .build()
        .await
        .with_context(|| format!("failed to build manifest from {}", root.display()))
}

/// Build and write the manifest, returning the blake3 digest of the file.
async fn cmd_build(dataset: DatasetConfig, output: &Path) -> Result<String> {
    info!(
        project = %dataset.project,
        subject = %dataset.subject,
        data_dir = %dataset.data_dir.display(),
        schema = %dataset.policy.schema,
        key_scheme = %dataset.policy.key_scheme,
        "building manifest"
    );

    let manifest = build_manifest(dataset).await?;
    write_manifest_file(output, &manifest)
        .with_context(|| format!("failed to write {}", output.display()))
}

// -----------------------------------------------------------------------
// sigcat print
// -----------------------------------------------------------------------

fn cmd_print(input_file: &Path) -> Result<()> {
    let manifest = read_manifest_file(input_file)
        .with_context(|| format!("failed to read {}", input_file.display()))?;
    print!("{}", printer::render(&manifest));
    Ok(())
}

// -----------------------------------------------------------------------
// sigcat verify
// -----------------------------------------------------------------------

/// Rebuild with the stored schema, algorithm and selection (then any CLI
/// overrides), print differences and return how many were found.
async fn cmd_verify(
    stored: &Manifest,
    mut dataset: DatasetConfig,
    overrides: &SelectionArgs,
) -> Result<usize> {
    dataset.policy.schema = stored.schema;
    dataset.policy.algorithm = stored.algorithm;
    stored.selection.apply(&mut dataset.policy);
    overrides.apply(&mut dataset.policy);

    let fresh = build_manifest(dataset).await?;
    let discrepancies = diff_manifests(stored, &fresh);
    for discrepancy in &discrepancies {
        println!("{discrepancy}");
    }
    if !discrepancies.is_empty() {
        warn!(count = discrepancies.len(), "dataset differs from manifest");
    }
    Ok(discrepancies.len())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
