///
/// lesbos CLI - Package manager for goboscript projects
///
/// Provides commands for creating and maintaining projects:
/// - lesbos new <name>: Create a new application or library project
/// - lesbos add: Record a dependency in lesbos.toml
/// - lesbos lock: Reinstall every dependency into lesbos/deps
/// - lesbos build: Lock, then run the goboscript compiler
/// - lesbos pack: Bundle a library into lesbos/packed
///
/// Logging goes to stderr and is controlled by `LESBOS_LOG` (for example
/// `LESBOS_LOG=lesbos_pkg=debug`).
///

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use lesbos_pkg::{
    init_project, Dependency, HttpTransport, InstallEvent, InstallObserver, InstallReport, Overrides,
    PackageError, PackageManager, ProjectKind,
};

const LOG_ENV: &str = "LESBOS_LOG";

#[derive(Parser, Debug)]
#[command(name = "lesbos")]
#[command(author, version, about = "Package manager for goboscript projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new project in ./<name>
    New {
        /// Project name, also the folder to create
        name: String,

        /// Create a library instead of an application
        #[arg(long)]
        lib: bool,

        /// Overwrite files if the project already exists
        #[arg(long)]
        force_remake: bool,
    },

    /// Add a dependency to lesbos.toml
    Add {
        #[command(flatten)]
        target: DependencyTarget,

        /// Version of the package
        #[arg(short = 'v', long = "version")]
        dep_version: String,

        /// Extra feature to install besides core (repeatable)
        #[arg(long = "feature")]
        features: Vec<String>,
    },

    /// Delete lesbos/deps and reinstall all dependencies
    Lock {
        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Lock dependencies, then build with the goboscript compiler
    Build {
        /// Skip the lock step and build with what is already installed
        #[arg(long)]
        no_lock: bool,

        /// Compiler command to run instead of the configured one
        #[arg(long)]
        compiler: Option<String>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Pack a library into lesbos/packed for publishing
    Pack,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct DependencyTarget {
    /// Base URL the package is served from
    #[arg(long)]
    source: Option<String>,

    /// Package name in the registry
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args, Debug, Default)]
struct FetchArgs {
    /// Registry URL template with one `{}` placeholder
    #[arg(long)]
    registry: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl FetchArgs {
    fn overrides(self, compiler: Option<String>) -> Overrides {
        Overrides {
            registry: self.registry,
            timeout_secs: self.timeout_secs,
            compiler,
        }
    }
}

/// Prints progress to stdout and warnings to stderr.
struct ConsoleObserver;

impl InstallObserver for ConsoleObserver {
    fn on_event(&self, event: &InstallEvent) {
        match event {
            InstallEvent::Warning(warning) => eprintln!("Warning: {}", warning),
            other => println!("{}", other),
        }
    }
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn run(command: Commands) -> Result<(), PackageError> {
    debug!(?command, "dispatching");
    match command {
        Commands::New { name, lib, force_remake } => new_project(&name, lib, force_remake),
        Commands::Add {
            target,
            dep_version,
            features,
        } => add_dependency(target, dep_version, features),
        Commands::Lock { fetch } => lock(fetch),
        Commands::Build {
            no_lock,
            compiler,
            fetch,
        } => build(no_lock, compiler, fetch),
        Commands::Pack => pack(),
    }
}

fn current_dir() -> Result<PathBuf, PackageError> {
    Ok(std::env::current_dir()?)
}

fn new_project(name: &str, lib: bool, force: bool) -> Result<(), PackageError> {
    let kind = if lib {
        ProjectKind::Library
    } else {
        ProjectKind::Application
    };
    let dir = current_dir()?.join(name);

    let created = init_project(&dir, kind, force)?;
    for path in &created {
        println!("  created {}", display_relative(path, &dir));
    }

    let label = match kind {
        ProjectKind::Library => "library",
        ProjectKind::Application => "application",
    };
    println!("Created {} project '{}'", label, name);
    Ok(())
}

fn add_dependency(target: DependencyTarget, version: String, features: Vec<String>) -> Result<(), PackageError> {
    let dep = match (target.source, target.name) {
        (Some(url), None) => Dependency::Source {
            url,
            version,
            features,
        },
        (None, Some(name)) => Dependency::Named {
            name,
            version,
            features,
        },
        _ => {
            return Err(PackageError::invalid_dependency(
                "exactly one of --source or --name is required",
            ))
        }
    };

    let mut manager = PackageManager::discover(&current_dir()?)?;
    manager.add_dependency(&dep)?;
    println!("Added {} v{}", dep.identity(), dep.version());
    Ok(())
}

fn lock(fetch: FetchArgs) -> Result<(), PackageError> {
    let manager = PackageManager::discover(&current_dir()?)?;
    let settings = manager.settings(&fetch.overrides(None))?;
    let transport = HttpTransport::with_timeout(settings.timeout)?;

    let report = manager.lock(&transport, &ConsoleObserver, &settings)?;
    print_summary(&report);
    Ok(())
}

fn build(no_lock: bool, compiler: Option<String>, fetch: FetchArgs) -> Result<(), PackageError> {
    let manager = PackageManager::discover(&current_dir()?)?;
    let settings = manager.settings(&fetch.overrides(compiler))?;
    let transport = HttpTransport::with_timeout(settings.timeout)?;

    if let Some(report) = manager.build(&transport, &ConsoleObserver, &settings, no_lock)? {
        print_summary(&report);
    }
    println!("Built {}", manager.root().display());
    Ok(())
}

fn pack() -> Result<(), PackageError> {
    let manager = PackageManager::discover(&current_dir()?)?;
    let output = manager.pack()?;

    println!(
        "Packed {} files into {}",
        output.entries.len(),
        display_relative(&output.archive, manager.root())
    );
    Ok(())
}

fn print_summary(report: &InstallReport) {
    println!(
        "Locked {} packages ({} files written, {} already present)",
        report.packages.len(),
        report.written.len(),
        report.skipped
    );
    if report.invalid > 0 {
        eprintln!("Warning: skipped {} invalid dependencies", report.invalid);
    }
}

fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).display().to_string()
}
