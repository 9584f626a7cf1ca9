//! # doctype-ts
//!
//! CLI tool for generating TypeScript interfaces from doctype JSON schemas.
//!
//! ## Usage
//!
//! ```bash
//! # Generate interfaces for the doctypes listed in doctype-ts.toml
//! doctype-ts generate
//!
//! # Add roots on the command line
//! doctype-ts generate --apps ../bench/apps --doctype erpnext:sales_invoice
//!
//! # Watch mode for development
//! doctype-ts generate --watch
//!
//! # Dry run to preview changes
//! doctype-ts generate --dry-run
//!
//! # Initialize configuration
//! doctype-ts init
//!
//! # Fail when the generated file is out of date
//! doctype-ts check
//! ```

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use doctype_ts::{
    config::{parse_doctype_arg, CliArgs, Config, ConfigManager},
    error::CliError,
    generator::{DoctypeGenerator, GenerateReport},
    status::StatusSink,
    storage::{FsStorage, Storage},
    watcher::{FileWatcher, WatchEvent},
    writer::WriteResult,
};

#[derive(Parser)]
#[command(name = "doctype-ts")]
#[command(author, version, about = "Generate TypeScript interfaces from doctype schemas", long_about = None)]
struct Cli {
    /// Show per-doctype progress and debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by `generate` and `check`.
#[derive(Args)]
struct InputArgs {
    /// Directory containing one subdirectory per application
    #[arg(short, long)]
    apps: Option<PathBuf>,

    /// Generated TypeScript file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extra root doctype as APP:DOCTYPE (repeatable)
    #[arg(short, long = "doctype", value_parser = parse_doctype_arg)]
    doctypes: Vec<(String, String)>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate TypeScript interfaces from doctype schemas
    Generate {
        #[command(flatten)]
        input: InputArgs,

        /// Watch the apps directory and regenerate on schema changes
        #[arg(short, long)]
        watch: bool,

        /// Preview changes without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Initialize a new doctype-ts configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "doctype-ts.toml")]
        output: PathBuf,

        /// Overwrite existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Check that the generated file is up-to-date
    Check {
        #[command(flatten)]
        input: InputArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            match e {
                CliError::Validation(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "doctype_ts=debug"
    } else {
        "doctype_ts=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Generate {
            input,
            watch,
            dry_run,
        } => cmd_generate(input, watch, dry_run, cli.verbose),

        Commands::Init { output, force } => cmd_init(output, force),

        Commands::Check { input } => cmd_check(input),
    }
}

/// Build a single-threaded runtime: all generator futures share one task.
fn runtime() -> Result<Runtime, CliError> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Load the config file and apply command-line overrides.
fn load_config(input: InputArgs) -> Result<Config, CliError> {
    let config = ConfigManager::load(input.config.as_deref())?;
    let config = ConfigManager::merge_cli_args(
        config,
        &CliArgs {
            apps: input.apps,
            output: input.output,
            doctypes: input.doctypes,
        },
    );
    config.validate()?;
    Ok(config)
}

/// Generate command implementation.
fn cmd_generate(input: InputArgs, watch: bool, dry_run: bool, verbose: bool) -> Result<(), CliError> {
    let config = load_config(input)?;
    let runtime = runtime()?;

    if watch {
        run_watch_mode(&runtime, &config, dry_run, verbose)
    } else {
        run_generate(&runtime, &config, dry_run, verbose).map(|_| ())
    }
}

/// Run interface generation once.
fn run_generate(
    runtime: &Runtime,
    config: &Config,
    dry_run: bool,
    verbose: bool,
) -> Result<GenerateReport, CliError> {
    println!(
        "{} {} root doctype(s) from {}",
        "Generating interfaces for".cyan(),
        config.doctype_count().to_string().green(),
        config.paths.apps.display()
    );

    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new());
    let status = Arc::new(ConsoleStatus { verbose });
    let generator = DoctypeGenerator::new(storage, status, config.generator_options(dry_run));
    let report = runtime.block_on(generator.run(&config.apps))?;

    if !report.not_found.is_empty() {
        println!(
            "{} {} doctype(s) not found: {}",
            "Warning:".yellow(),
            report.not_found.len(),
            report.not_found.join(", ")
        );
    }

    if let Some(WriteResult::DryRun { content, path }) = &report.write {
        println!(
            "{} Would write to {}:",
            "[dry-run]".yellow(),
            path.display()
        );
        println!("{}", "─".repeat(60).dimmed());
        println!("{}", content);
        println!("{}", "─".repeat(60).dimmed());
    }

    Ok(report)
}

/// Run in watch mode.
fn run_watch_mode(
    runtime: &Runtime,
    config: &Config,
    dry_run: bool,
    verbose: bool,
) -> Result<(), CliError> {
    println!("{}", "Starting watch mode...".cyan());
    println!("  Watching: {}", config.paths.apps.display());
    println!("  Press Ctrl+C to stop\n");

    // Initial generation
    run_generate(runtime, config, dry_run, verbose)?;

    let watcher = FileWatcher::new(&config.paths.apps);
    let (_debouncer, rx) = watcher.watch()?;

    println!("\n{}", "Watching for changes...".cyan());

    while let Ok(event) = rx.recv() {
        let changes = match event {
            WatchEvent::Changed(changes) => changes,
            WatchEvent::Error(message) => {
                println!("{} {}", "Watch error:".red(), message);
                continue;
            }
        };

        println!();
        for change in &changes {
            let label = if change.removed { "Schema removed:" } else { "Schema changed:" };
            println!("{} {}:{}", label.cyan(), change.app, change.doctype);
        }

        // Each run starts from a fresh generator and the file on disk.
        if let Err(e) = run_generate(runtime, config, dry_run, verbose) {
            println!("{} {}", "Generation error:".red(), e);
        }

        println!("\n{}", "Watching for changes...".cyan());
    }

    Ok(())
}

/// Init command implementation.
fn cmd_init(output: PathBuf, force: bool) -> Result<(), CliError> {
    if output.exists() && !force {
        println!(
            "{} Configuration file already exists: {}",
            "Error:".red(),
            output.display()
        );
        println!("  Use --force to overwrite");
        return Err(CliError::Validation(
            "Configuration file already exists".to_string(),
        ));
    }

    let content = ConfigManager::default_config_content();
    std::fs::write(&output, content)?;

    println!(
        "{} Created configuration file: {}",
        "✓".green(),
        output.display()
    );

    Ok(())
}

/// Check command implementation.
fn cmd_check(input: InputArgs) -> Result<(), CliError> {
    let config = load_config(input)?;
    let runtime = runtime()?;

    println!("{}", "Checking generated interfaces...".cyan());

    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new());
    let status = Arc::new(ConsoleStatus { verbose: false });
    let generator = DoctypeGenerator::new(storage, status, config.generator_options(true));
    let report = runtime.block_on(generator.run(&config.apps))?;

    if report.has_changes() {
        println!("{} Interfaces are out of date", "✗".red());
        println!("  Run 'doctype-ts generate' to update");
        Err(CliError::Validation(format!(
            "{} interface(s) out of date in {}",
            report.changed,
            config.paths.output.display()
        )))
    } else {
        println!("{} Interfaces are up-to-date", "✓".green());
        Ok(())
    }
}

/// Terminal status output.
struct ConsoleStatus {
    verbose: bool,
}

impl StatusSink for ConsoleStatus {
    fn update(&self, message: &str) {
        if self.verbose {
            println!("  {}", message.dimmed());
        }
    }

    fn succeed(&self, message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    fn info(&self, message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }
}

/// Print an error with formatting.
fn print_error(error: &CliError) {
    eprintln!("{} {}", "Error:".red().bold(), error);
}
