use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kwikemon::{render, Backend, MemoryBackend, MonitorStore, Settings};

#[derive(Parser, Debug)]
#[command(name = "kwikemon")]
#[command(about = "Named status lines that expire unless refreshed")]
struct Args {
    /// Config file (default: ~/.kwikemon.toml if it exists)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Key prefix, overriding the config file
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Use an in-process store instead of Redis (nothing is persisted)
    #[arg(long, global = true)]
    memory: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Set the text of a monitor
    Set {
        name: String,
        /// Status text; several words are joined with spaces
        #[arg(required = true)]
        text: Vec<String>,
        /// Seconds until the monitor expires, 0 or less to never expire
        #[arg(short, long, allow_negative_numbers = true)]
        ttl: Option<i64>,
    },
    /// Print the text of a monitor
    Get {
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Print the remaining lifetime of a monitor, or change it
    Ttl {
        name: String,
        #[arg(allow_negative_numbers = true)]
        seconds: Option<i64>,
    },
    /// Exit successfully if the monitor exists
    Exists { name: String },
    /// List the names of live monitors
    List,
    /// Count indexed monitors
    Count,
    /// Print every live monitor
    All {
        #[arg(long)]
        json: bool,
    },
    /// Remove a monitor
    Remove { name: String },
    /// Remove every monitor
    Clear,
    /// Drop expired monitors from the index
    Sweep,
    /// Update a monitor with each line read from stdin
    Pipe {
        name: String,
        #[arg(short, long, allow_negative_numbers = true)]
        ttl: Option<i64>,
        /// Copy stdin to stdout unchanged
        #[arg(long)]
        tee: bool,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(prefix) = args.prefix.clone() {
        settings.prefix = prefix;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let backend = connect(&settings, args.memory).await?;
        let store = settings.store(backend);
        run(&store, args.command).await
    })
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(settings: &Settings, memory: bool) -> Result<Arc<dyn Backend>> {
    if memory {
        return Ok(Arc::new(MemoryBackend::new()));
    }
    connect_redis(settings).await
}

#[cfg(feature = "redis")]
async fn connect_redis(settings: &Settings) -> Result<Arc<dyn Backend>> {
    let backend = kwikemon::RedisBackend::connect(&settings.redis)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to Redis at {}:{}",
                settings.redis.host, settings.redis.port
            )
        })?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_settings: &Settings) -> Result<Arc<dyn Backend>> {
    anyhow::bail!("built without Redis support; use --memory")
}

async fn run(store: &MonitorStore, command: Cmd) -> Result<ExitCode> {
    match command {
        Cmd::Set { name, text, ttl } => {
            store.write(&name, &text.join(" "), ttl).await?;
        }
        Cmd::Get { name, json } => {
            let monitor = store.read(&name).await?;
            if json {
                println!("{}", render::monitor_json(&monitor)?);
            } else {
                println!("{}", render::monitor_text(&monitor));
            }
        }
        Cmd::Ttl { name, seconds } => {
            let ttl = match seconds {
                Some(seconds) => store.set_time_to_live(&name, seconds).await?,
                None => store.time_to_live(&name).await?,
            };
            println!("{}", ttl.as_seconds());
        }
        Cmd::Exists { name } => {
            if !store.exists(&name).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Cmd::List => {
            for name in store.list().await? {
                println!("{}", name);
            }
        }
        Cmd::Count => {
            println!("{}", store.count().await?);
        }
        Cmd::All { json } => {
            let monitors = store.read_all().await?;
            if json {
                println!("{}", render::monitors_json(&monitors)?);
            } else if !monitors.is_empty() {
                println!("{}", render::monitors_text(&monitors));
            }
        }
        Cmd::Remove { name } => {
            store.remove(&name).await?;
        }
        Cmd::Clear => {
            store.clear().await?;
        }
        Cmd::Sweep => {
            let kept = store.sweep().await?;
            info!("{} monitors remain after sweep", kept.len());
        }
        Cmd::Pipe { name, ttl, tee } => {
            let (tx, mut rx) = mpsc::unbounded_channel::<kwikemon::MonitorUpdate>();
            let logger = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    info!("{} #{}: {}", update.name, update.updates, update.text);
                }
            });

            let mut writer = store.writer(&name, ttl).with_notifier(tx);
            let stdin = tokio::io::stdin();
            let result = if tee {
                writer.tee(stdin, tokio::io::stdout()).await
            } else {
                writer.pump(stdin).await
            };
            drop(writer);
            if let Err(e) = logger.await {
                warn!("Update logger task failed: {}", e);
            }
            result.with_context(|| format!("Failed to update monitor {}", name))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
