//! site-serve: static site server with access control and prefix proxies.
//!
//! ```text
//!     Client ──▶ request id / trace / timeout
//!                   │
//!                   ▼
//!             AccessEngine ── bypass? ──▶ allowed
//!             (ip → basic → token → custom)
//!                   │ denied: 401 / 403
//!                   ▼
//!              dispatch ── prefix rule ──▶ upstream
//!                   │
//!                   └──▶ public dir ──▶ 404
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use site_serve::lifecycle::{self, signals, Shutdown, StartupOptions};
use site_serve::observability::logging;
use site_serve::HttpServer;

const SAMPLE_CONFIG: &str = include_str!("../stubs/sample.toml");

#[derive(Parser)]
#[command(name = "site-serve", version)]
#[command(about = "Serve a static site behind IP and Basic auth checks, with prefix proxies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a directory (the default command)
    Serve(ServeArgs),
    /// Write a sample config file
    InitConfig {
        #[arg(default_value = "site-serve.toml")]
        path: PathBuf,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Directory to serve; overrides `serve.public`
    dir: Option<PathBuf>,

    /// Config file (TOML or JSON); default: site-serve.json or site-serve.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port; overrides PORT and the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Mount the site under this URL prefix
    #[arg(long)]
    route_prefix: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable the IP allow-list and Basic auth
    #[arg(long)]
    no_auth: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => serve(args).await,
        Commands::InitConfig { path } => init_config(path),
    }
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = StartupOptions {
        dir: args.dir,
        config: args.config,
        port: args.port,
        env_port: std::env::var("PORT").ok(),
        route_prefix: args.route_prefix,
        verbose: args.verbose,
        no_auth: args.no_auth,
    };
    let config = lifecycle::resolve_config(&options, &std::env::current_dir()?)?;

    logging::init(&config.logs.level);
    tracing::info!("site-serve v{} starting", env!("CARGO_PKG_VERSION"));

    if options.no_auth {
        tracing::warn!("--no-auth given: IP allow-list and Basic auth are disabled");
    }
    if config.logs.config {
        tracing::info!("Effective configuration: {:#?}", config);
    }
    if !config.serve.public.is_dir() {
        tracing::warn!(
            public = %config.serve.public.display(),
            "Public directory does not exist, static requests will return 404"
        );
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        public = %config.serve.public.display(),
        proxies = config.proxies.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let listener = lifecycle::bind(&config).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on(signals::wait_for_signal());

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_config(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!("{} already exists, not overwriting", path.display()).into());
    }
    std::fs::write(&path, SAMPLE_CONFIG)?;
    println!("Wrote {}", path.display());
    Ok(())
}
