use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use filestore_core::{
    BatchReport, CleanupMode, FileObject, FileStore, SqliteMetadataStore, StoreConfig,
};
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DATABASE: &str = "filestore.db";

#[derive(Parser)]
#[command(name = "filestore")]
#[command(about = "Content-addressed file store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean up the file store
    Cleanup {
        /// What to clean up: "leaves" or "orphans"
        target: String,
        /// "dryrun" to only report what would be removed
        mode: Option<String>,
    },
    /// Store a file in the file store and print its id
    Store {
        /// File to store
        filename: PathBuf,
    },
    /// Retrieve a file from the file store
    Retrieve {
        /// Id of the stored file
        id: i64,
        /// Directory to write the file to (default: current directory)
        dir: Option<PathBuf>,
    },
    /// Manage external identifiers
    Uuid {
        #[command(subcommand)]
        action: UuidAction,
    },
}

#[derive(Subcommand)]
enum UuidAction {
    /// Generate uuids for files that have none
    Generate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CleanupTarget {
    Leaves,
    Orphans,
}

/// Settings read from the environment (and `.env`) at start-up.
#[derive(Clone, Debug, Default)]
struct Settings {
    file_path: Option<PathBuf>,
    store_dir: Option<PathBuf>,
    database: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
}

impl Settings {
    fn from_env() -> Self {
        Self {
            file_path: env_path("FILESTORE_FILE_PATH"),
            store_dir: env_path("FILESTORE_STORE_DIR"),
            database: env_path("FILESTORE_DATABASE"),
            scratch_dir: env_path("FILESTORE_SCRATCH_DIR"),
        }
    }

    fn store_config(&self) -> anyhow::Result<StoreConfig> {
        let config = match (&self.file_path, &self.store_dir) {
            (Some(file_path), _) => StoreConfig::new(file_path)?,
            (None, Some(store_dir)) => {
                tracing::warn!("FILESTORE_STORE_DIR is deprecated, use FILESTORE_FILE_PATH");
                StoreConfig::from_store_dir(store_dir)?
            }
            (None, None) => bail!(
                "filestore is not properly configured, FILESTORE_FILE_PATH and FILESTORE_STORE_DIR missing"
            ),
        };

        Ok(match &self.scratch_dir {
            Some(scratch_dir) => config.with_scratch_dir(scratch_dir.clone()),
            None => config,
        })
    }

    fn open_store(&self) -> anyhow::Result<FileStore<SqliteMetadataStore>> {
        let config = self.store_config()?;
        let database = self
            .database
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
        let metadata = SqliteMetadataStore::open(&database)
            .with_context(|| format!("cannot open metadata database {}", database.display()))?;

        Ok(FileStore::new(config, metadata)?)
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn parse_target(value: &str) -> anyhow::Result<CleanupTarget> {
    match value {
        "leaves" => Ok(CleanupTarget::Leaves),
        "orphans" => Ok(CleanupTarget::Orphans),
        other => Err(anyhow!("unsupported cleanup type '{}'", other)),
    }
}

fn parse_mode(value: Option<&str>) -> anyhow::Result<CleanupMode> {
    match value {
        None => Ok(CleanupMode::Execute),
        Some(mode) if mode.eq_ignore_ascii_case("dryrun") || mode.eq_ignore_ascii_case("dry-run") => {
            Ok(CleanupMode::DryRun)
        }
        Some(other) => Err(anyhow!(
            "unsupported cleanup mode '{}', expected \"dryrun\" or nothing",
            other
        )),
    }
}

/// Filename used when writing a retrieved file: the display name when it is a single plain
/// path component, its sanitised form otherwise.
fn retrieve_file_name(name: &str, max_name_length: usize) -> String {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains('\\') => name.to_owned(),
        _ => filestore_files::sanitize(name, max_name_length),
    }
}

fn print_leaves_report(report: &BatchReport<PathBuf>) {
    if report.dry_run {
        for dir in &report.succeeded {
            println!("{}", dir.display());
        }
    }
    for (dir, reason) in &report.failed {
        eprintln!("{}: {}", dir.display(), reason);
    }
}

/// Runs one command. Returns `false` if it completed but reported failures.
fn execute(command: Commands, settings: &Settings) -> anyhow::Result<bool> {
    match command {
        Commands::Cleanup { target, mode } => {
            let target = parse_target(&target)?;
            let mode = parse_mode(mode.as_deref())?;
            let store = settings.open_store()?;

            let clean = match target {
                CleanupTarget::Leaves => {
                    let report = store.cleanup_leaves(mode)?;
                    print_leaves_report(&report);
                    !report.has_failures()
                }
                CleanupTarget::Orphans => {
                    let report = store.cleanup_orphans(mode)?;
                    if report.dry_run {
                        for id in &report.succeeded {
                            println!("File #{} not found", id);
                        }
                    }
                    for (id, reason) in &report.failed {
                        eprintln!("File #{}: {}", id, reason);
                    }
                    !report.has_failures()
                }
            };

            println!("All done");
            Ok(clean)
        }
        Commands::Store { filename } => {
            if !filename.exists() {
                bail!("please specify an existing filename");
            }
            if filename.is_dir() {
                bail!("{} is a directory, not allowed", filename.display());
            }

            let name = filename
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("{} has no file name", filename.display()))?;
            let content = std::fs::read(&filename)
                .with_context(|| format!("cannot read {}", filename.display()))?;

            let store = settings.open_store()?;
            let file = store
                .store(&name, &content, None)
                .context("file not stored")?;
            println!("{}", file.id());
            Ok(true)
        }
        Commands::Retrieve { id, dir } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from("."));
            if !dir.exists() {
                bail!("directory {} not found", dir.display());
            }
            if !dir.is_dir() {
                bail!("directory {} appears to be a file", dir.display());
            }

            let store = settings.open_store()?;
            let file = store.get_by_id(id).context("file retrieve failed")?;
            let content = store.get_contents(&file).context("file retrieve failed")?;

            let name = retrieve_file_name(
                file.record().name.as_str(),
                store.config().max_name_length(),
            );
            let destination = dir.join(name);
            std::fs::write(&destination, content)
                .with_context(|| format!("cannot write {}", destination.display()))?;
            tracing::info!("retrieved file #{} to {}", id, destination.display());
            Ok(true)
        }
        Commands::Uuid {
            action: UuidAction::Generate,
        } => {
            let store = settings.open_store()?;
            let generated = store.generate_missing_uuids()?;
            println!("Generated {} uuids", generated);
            Ok(true)
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("filestore=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = init_tracing() {
        eprintln!("cannot initialise logging: {}", e);
    }

    match execute(cli.command, &Settings::from_env()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
