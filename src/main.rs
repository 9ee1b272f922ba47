//! qvm command line

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use qvm::{Formatting, LifecycleManager, LoadOptions, Readiness, Settings};

/// Declarative JSON front-end for QEMU/KVM
#[derive(Parser, Debug)]
#[command(name = "qvm", version, about)]
struct Cli {
    /// Parse `//` lines as JSON instead of stripping them
    #[arg(long, global = true)]
    keep_comments: bool,

    /// Reject configs without any disk
    #[arg(long, global = true)]
    require_disks: bool,

    /// Log debug output to stderr (overridden by QVM_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the QEMU command built from a VM's JSON config
    Command {
        name: String,

        /// Print on one line instead of one block per line
        #[arg(long)]
        single_line: bool,
    },

    /// Start a VM
    Start {
        name: String,

        /// Open the SPICE viewer once the socket appears
        #[arg(long)]
        viewer: bool,
    },

    /// Start a VM booting from an ISO image
    Cdrom { name: String, iso: String },

    /// Terminate a running VM and remove its sockets
    Stop { name: String },

    /// List running VMs
    Ls,

    /// Connect to a VM's QEMU monitor
    Monitor {
        name: String,

        /// Seconds to wait for the socket to appear
        #[arg(long, default_value_t = 0)]
        wait: u64,
    },

    /// Connect to a VM's SPICE server
    Spice {
        name: String,

        /// Seconds to wait for the socket to appear
        #[arg(long, default_value_t = 0)]
        wait: u64,
    },

    /// Print the configuration directory
    Locate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("QVM_LOG", default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn readiness(wait: u64) -> Readiness {
    Readiness::within(Duration::from_secs(wait))
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env().with_load_options(LoadOptions {
        strip_comments: !cli.keep_comments,
        require_disks: cli.require_disks,
    });
    settings.ensure_dirs().with_context(|| {
        format!("Failed to prepare {}", settings.home.display())
    })?;

    let manager = LifecycleManager::system(settings);

    match cli.command {
        Commands::Command { name, single_line } => {
            let formatting = if single_line {
                Formatting::SingleLine
            } else {
                Formatting::Multiline
            };
            println!("{}", manager.command(&name, formatting)?);
        }
        Commands::Start { name, viewer } => {
            let started = manager.start(&name)?;
            println!("'{name}' VM started.");
            if viewer {
                manager.open_viewer(&started, Readiness::after_start())?;
            }
        }
        Commands::Cdrom { name, iso } => {
            let started = manager.start_cdrom(&name, &iso)?;
            println!("'{name}' VM started with CDROM '{iso}'.");
            manager.open_viewer(&started, Readiness::after_start())?;
        }
        Commands::Stop { name } => {
            manager.stop(&name)?;
            println!("Destroyed '{name}' VM.");
        }
        Commands::Ls => {
            for name in manager.list()? {
                println!("{name}");
            }
        }
        Commands::Monitor { name, wait } => manager.attach_monitor(&name, readiness(wait))?,
        Commands::Spice { name, wait } => manager.attach_display(&name, readiness(wait))?,
        Commands::Locate => println!("{}", manager.settings().home.display()),
    }

    Ok(())
}
