use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
mod auth;
use hashnest::{CalibrateOptions, HashOptions, Pbkdf2Backend, Registry, Settings, choose_rounds};
use std::{path::PathBuf, process::ExitCode, time::Duration};

#[derive(Debug, Parser)]
#[command(name = "hashnest")]
#[command(
    version,
    about = "Hash, verify and migrate password hashes across pluggable schemes."
)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, value_name = "PATH", env = "HASHNEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Hashes a password read from the environment, stdin or a prompt
    Hash {
        /// Scheme to use instead of the policy default
        #[arg(long)]
        scheme: Option<String>,

        /// Primary cost parameter
        #[arg(long)]
        rounds: Option<u32>,
    },

    /// Checks a password against a stored hash
    #[command(arg_required_else_help = true)]
    Verify {
        hash: String,

        /// Print a replacement hash when the stored one is outdated
        #[arg(short, long, default_value_t = false)]
        update: bool,
    },

    /// Reports whether a stored hash should be replaced
    #[command(arg_required_else_help = true)]
    NeedsUpdate { hash: String },

    /// Prints the scheme that produced a hash
    #[command(arg_required_else_help = true)]
    Identify { hash: String },

    /// Lists the schemes enabled by the policy
    Schemes,

    /// Finds a rounds value whose verify time is close to a target
    #[command(arg_required_else_help = true)]
    ChooseRounds {
        scheme: String,

        /// Target verify time in milliseconds
        #[arg(long, default_value_t = 350)]
        target_ms: u64,

        /// PBKDF2 backend to measure
        #[arg(long)]
        backend: Option<Pbkdf2Backend>,
    },
}

fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();

    use tracing_subscriber::prelude::*;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Cli::parse();
    let settings = Settings::load_or_default(args.config.as_deref())?.with_env_overrides()?;

    match args.command {
        Commands::Hash { scheme, rounds } => {
            let ctx = settings.context()?;
            let secret = auth::read_new_secret_with_confirmation()?;
            let mut opts = HashOptions::new();
            if let Some(rounds) = rounds {
                opts = opts.rounds(rounds);
            }
            let hash = ctx.hash_with(secret.as_bytes(), scheme.as_deref(), &opts)?;
            println!("{hash}");
        }
        Commands::Verify { hash, update } => {
            let ctx = settings.context()?;
            let secret = auth::read_secret()?;
            let (valid, replacement) = if update {
                ctx.verify_and_update(secret.as_bytes(), &hash)?
            } else {
                (ctx.verify(secret.as_bytes(), &hash)?, None)
            };
            if !valid {
                println!("password invalid");
                return Ok(ExitCode::FAILURE);
            }
            println!("password valid");
            if let Some(replacement) = replacement {
                println!("{replacement}");
            }
        }
        Commands::NeedsUpdate { hash } => {
            let ctx = settings.context()?;
            let outdated = ctx.needs_update(&hash)?;
            println!("{}", if outdated { "yes" } else { "no" });
        }
        Commands::Identify { hash } => {
            let ctx = settings.context()?;
            println!("{}", ctx.identify(&hash)?);
        }
        Commands::Schemes => {
            let ctx = settings.context()?;
            let names = ctx.schemes();
            let name_width = names.iter().map(|n| n.len()).max().unwrap_or(0);

            for name in names {
                let marker = if name == ctx.default_scheme() {
                    "default"
                } else if ctx.policy().is_deprecated(name) {
                    "deprecated"
                } else {
                    ""
                };
                let defaults = ctx
                    .limits(name)?
                    .iter()
                    .map(|p| format!("{}={}", p.name, p.default))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("{name:<name_width$}  {marker:<10}  {defaults}");
            }
        }
        Commands::ChooseRounds {
            scheme,
            target_ms,
            backend,
        } => {
            let backend = backend.unwrap_or(settings.pbkdf2_backend);
            let registry = Registry::with_builtins(backend)?;
            let handler = registry
                .resolve(&scheme)
                .with_context(|| format!("unknown hash '{scheme}'"))?;
            let target = Duration::from_millis(target_ms);

            let mut calibration =
                choose_rounds(handler.as_ref(), target, &CalibrateOptions::default())?;
            if scheme.starts_with("pbkdf2_") {
                calibration.scheme = format!("{scheme} (using {backend} backend)");
            }
            println!("{calibration}");
        }
    }

    Ok(ExitCode::SUCCESS)
}
