use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use abook_loader::config::DirectoryConfig;
use abook_loader::directory::ldap::LdapConnector;
use abook_loader::hierarchy::build_hierarchy;
use abook_loader::io::{excel_write, ldif_read, ldif_write};
use abook_loader::model::{AttributeRecord, SyncPhase, SyncProgress};
use abook_loader::sync::{self, CancelToken};
use abook_loader::{LoaderError, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Exit status used when the user interrupts a load.
const EXIT_CANCELED: i32 = 130;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging(cli.verbose) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
    match run(cli) {
        Ok(()) => {}
        Err(error) if error.is_canceled() => {
            eprintln!("{error}; the target unit may be partially loaded, run the load again");
            std::process::exit(EXIT_CANCELED);
        }
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| LoaderError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Units(args) => execute_units(args),
        Command::Tree(args) => execute_tree(args),
        Command::Export(args) => execute_export(args),
        Command::Load(args) => execute_load(args),
    }
}

fn execute_units(args: ConnectionArgs) -> Result<()> {
    let config = args.resolve()?;
    for unit in sync::list_units(&LdapConnector, &config)? {
        println!("{unit}");
    }
    Ok(())
}

fn execute_tree(args: TreeArgs) -> Result<()> {
    let records = read_input(&args.input)?;
    let root = build_hierarchy(&records);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&root)?);
    } else {
        print!("{}", root.render_tree());
    }

    if let Some(output) = &args.export_ldif {
        // clap enforces --base-dn alongside --export-ldif.
        let base_dn = args.base_dn.as_deref().unwrap_or_default();
        let written = ldif_write::export_hierarchy(output, &root, base_dn)?;
        eprintln!("hierarchy written to {}", written.display());
    }
    if let Some(output) = &args.export_xlsx {
        excel_write::write_preview(output, &records, &root)?;
        eprintln!("workbook written to {}", output.display());
    }
    Ok(())
}

fn execute_export(args: ExportArgs) -> Result<()> {
    let records = read_input(&args.input)?;
    let written = ldif_write::export_records(&args.output, &records, args.base_dn.as_deref())?;
    eprintln!("exported {} entries to {}", records.len(), written.display());
    Ok(())
}

fn execute_load(args: LoadArgs) -> Result<()> {
    let config = args.connection.resolve()?;
    let records = read_input(&args.input)?;
    if records.is_empty() && !args.allow_empty {
        return Err(LoaderError::EmptyInput(args.input));
    }

    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    let handler = move || {
        if interrupt.cancel() {
            // Second Ctrl-C: a blocked connect or operation never reaches
            // the next cancellation check.
            eprintln!("Load aborted.");
            std::process::exit(EXIT_CANCELED);
        }
        eprintln!("Stopping after the current entry; press Ctrl-C again to abort.");
    };
    if let Err(err) = ctrlc::set_handler(handler) {
        warn!(error = %err, "could not install Ctrl-C handler; the load cannot be interrupted");
    }

    let (sender, receiver) = mpsc::channel();
    let unit = args.unit;
    let worker = thread::spawn(move || {
        sync::sync_directory(&LdapConnector, &config, &unit, &records, &sender, &cancel)
    });

    render_progress(receiver);

    let summary = worker
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))?;
    println!(
        "Data loaded successfully: {} old entries deleted, {} entries added",
        summary.deleted, summary.added
    );
    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<AttributeRecord>> {
    if !path.exists() {
        return Err(LoaderError::MissingInput(path.to_path_buf()));
    }
    ldif_read::read_records(path)
}

/// Draws one bar per phase until the sync thread drops its sender.
fn render_progress(receiver: Receiver<SyncProgress>) {
    let mut current: Option<(SyncPhase, ProgressBar)> = None;

    for progress in receiver {
        let switched = current
            .as_ref()
            .is_none_or(|(phase, _)| *phase != progress.phase);
        if switched {
            if let Some((_, previous)) = current.take() {
                if !previous.is_finished() {
                    previous.finish();
                }
            }
            current = Some((progress.phase, phase_bar(&progress)));
        }
        let Some((_, bar)) = &current else {
            continue;
        };

        if progress.canceled {
            bar.abandon_with_message(format!("{} (canceled)", progress.phase));
        } else {
            bar.set_position(progress.completed as u64);
        }
    }

    if let Some((_, bar)) = current {
        if !bar.is_finished() {
            bar.finish();
        }
    }
}

fn phase_bar(progress: &SyncProgress) -> ProgressBar {
    let bar = ProgressBar::new(progress.total as u64);
    let template = "{msg} [{bar:40.cyan/blue}] {pos}/{len}";
    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        bar.set_style(style.progress_chars("█▓▒░"));
    }
    bar.set_message(progress.phase.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Load an LDIF address book into a directory organizational unit."
)]
struct Cli {
    /// Log debug output to stderr (overrides RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the units available under ou=abook.
    Units(ConnectionArgs),
    /// Show the organization hierarchy derived from an export.
    Tree(TreeArgs),
    /// Re-emit an export as normalised LDIF.
    Export(ExportArgs),
    /// Replace the entries of a unit with the records of an export.
    Load(LoadArgs),
}

#[derive(clap::Args)]
struct ConnectionArgs {
    /// JSON connection profile; flags override its values.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Directory server host name.
    #[arg(long)]
    host: Option<String>,

    /// Directory server port.
    #[arg(long)]
    port: Option<u16>,

    /// DN used for the simple bind.
    #[arg(long)]
    bind_dn: Option<String>,

    /// Password used for the simple bind.
    #[arg(long)]
    password: Option<String>,

    /// Base DN holding the ou=abook container.
    #[arg(long)]
    base_dn: Option<String>,

    /// Give up connecting after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl ConnectionArgs {
    fn resolve(self) -> Result<DirectoryConfig> {
        let mut config = match &self.profile {
            Some(path) => DirectoryConfig::from_profile(path)?,
            None => DirectoryConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind_dn) = self.bind_dn {
            config.bind_dn = bind_dn;
        }
        if let Some(password) = self.password {
            config.password = password;
        }
        if let Some(base_dn) = self.base_dn {
            config.base_dn = base_dn;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Some(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(clap::Args)]
struct TreeArgs {
    /// LDIF export to read.
    #[arg(long)]
    input: PathBuf,

    /// Print the hierarchy as JSON instead of an outline.
    #[arg(long)]
    json: bool,

    /// Write the hierarchy as organizationalUnit entries to this LDIF file.
    #[arg(long, requires = "base_dn")]
    export_ldif: Option<PathBuf>,

    /// Write records and hierarchy to this Excel workbook.
    #[arg(long)]
    export_xlsx: Option<PathBuf>,

    /// Base DN used for exported hierarchy entries.
    #[arg(long)]
    base_dn: Option<String>,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// LDIF export to read.
    #[arg(long)]
    input: PathBuf,

    /// Output path; `.ldif` is appended when missing.
    #[arg(long)]
    output: PathBuf,

    /// Rewrite identities as `cn=<dn>,<base DN>`.
    #[arg(long)]
    base_dn: Option<String>,
}

#[derive(clap::Args)]
struct LoadArgs {
    /// LDIF export to read.
    #[arg(long)]
    input: PathBuf,

    /// Unit under ou=abook whose entries are replaced.
    #[arg(long)]
    unit: String,

    /// Proceed even when the export holds no records.
    #[arg(long)]
    allow_empty: bool,

    #[command(flatten)]
    connection: ConnectionArgs,
}
