use anyhow::Result;
use clap::Parser;
use kiln::commands;
use kiln::runtime::RealRuntime;
use std::path::PathBuf;
use std::process::ExitCode;

/// kiln - package installer
///
/// Resolves packages and their dependencies from a catalog, installs them
/// under an install root and keeps track of what is installed.
///
/// Examples:
///   kiln install ripgrep              # Install the newest ripgrep and its dependencies
///   kiln install 'lib@>=1.0.0 <2.0.0' # Install the newest lib 1.x
///   kiln remove lib --version 1.2.0   # Remove one installed version
#[derive(Parser, Debug)]
#[command(author, version = env!("KILN_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install root directory (overrides defaults; also via KILN_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "KILN_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub install_root: Option<PathBuf>,

    /// Catalog file (defaults to <root>/catalog.json)
    #[arg(long = "catalog", value_name = "FILE", global = true)]
    pub catalog: Option<PathBuf>,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install a package and its missing dependencies
    Install(PackageArgs),

    /// Show what installing a package would do
    Resolve(PackageArgs),

    /// Remove an installed package
    Remove(RemoveArgs),

    /// Re-run the configuration step of an installed package
    Reconfigure(SelectArgs),

    /// List installed packages
    List,

    /// Report installed packages with missing dependencies
    Unmet,
}

#[derive(clap::Args, Debug)]
pub struct PackageArgs {
    /// Package id, optionally with a version range
    #[arg(value_name = "ID[@RANGE]")]
    pub package: String,
}

#[derive(clap::Args, Debug)]
pub struct SelectArgs {
    /// Installed package id
    #[arg(value_name = "ID")]
    pub id: String,

    /// Installed version to act on (required when several are installed)
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Remove even if other installed packages depend on it
    #[arg(long, short = 'f')]
    pub force: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let verbose = cli.verbose;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if verbose {
                eprintln!("error: {:?}", e);
            } else {
                eprintln!("error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let runtime = RealRuntime;

    match cli.command {
        Commands::Install(args) => {
            commands::install(runtime, &args.package, cli.install_root, cli.catalog).await?
        }
        Commands::Resolve(args) => {
            commands::resolve(runtime, &args.package, cli.install_root, cli.catalog)?
        }
        Commands::Remove(args) => commands::remove(
            runtime,
            &args.select.id,
            args.select.version.as_deref(),
            args.force,
            cli.install_root,
        )?,
        Commands::Reconfigure(args) => commands::reconfigure(
            runtime,
            &args.id,
            args.version.as_deref(),
            cli.install_root,
        )?,
        Commands::List => commands::list(runtime, cli.install_root)?,
        Commands::Unmet => commands::unmet(runtime, cli.install_root)?,
    }
    Ok(())
}
