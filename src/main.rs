use clap::Parser;
use phiremock_server::config::{PartialConfig, ServerConfig};
use phiremock_server::expectation::loader::{load_into, DirSource};
use phiremock_server::MockServer;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "phiremock-server", about = "HTTP mock server")]
struct Args {
    /// Bind address
    #[arg(long)]
    ip: Option<IpAddr>,
    /// Bind port
    #[arg(short, long)]
    port: Option<u16>,
    /// Directory scanned once at boot for *.json expectation files
    #[arg(long = "expectations-dir")]
    expectations_dir: Option<PathBuf>,
    /// Raise log verbosity
    #[arg(short, long)]
    debug: bool,
    /// Directory in which to look for phiremock.yaml
    #[arg(long = "config-path")]
    config_path: Option<PathBuf>,
    /// TLS certificate (PEM)
    #[arg(long)]
    certificate: Option<PathBuf>,
    /// TLS certificate key (PEM)
    #[arg(long = "certificate-key")]
    certificate_key: Option<PathBuf>,
    /// Passphrase for an encrypted certificate key
    #[arg(long = "cert-passphrase")]
    cert_passphrase: Option<String>,
    /// Timeout for proxied upstream calls, in milliseconds
    #[arg(long = "proxy-timeout-millis")]
    proxy_timeout_millis: Option<u64>,
    /// How long to wait for in-flight requests on shutdown, in milliseconds
    #[arg(long = "shutdown-grace-millis")]
    shutdown_grace_millis: Option<u64>,
    /// Keep only the newest N journal entries (0 = unbounded)
    #[arg(long = "journal-capacity")]
    journal_capacity: Option<usize>,
}

impl Args {
    fn into_partial(self) -> (PartialConfig, Option<PathBuf>) {
        let config_path = self.config_path.clone();
        let partial = PartialConfig {
            ip: self.ip,
            port: self.port,
            expectations_dir: self.expectations_dir,
            debug: if self.debug { Some(true) } else { None },
            certificate: self.certificate,
            certificate_key: self.certificate_key,
            cert_passphrase: self.cert_passphrase,
            proxy_timeout_millis: self.proxy_timeout_millis,
            shutdown_grace_millis: self.shutdown_grace_millis,
            journal_capacity: self.journal_capacity,
        };
        (partial, config_path)
    }
}

fn resolve_config(args: Args) -> Result<ServerConfig, phiremock_server::Error> {
    let (cli, config_path) = args.into_partial();
    let file = match &config_path {
        Some(dir) => PartialConfig::from_config_dir(dir)?,
        None => PartialConfig::default(),
    };
    ServerConfig::resolve(cli.or(file))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match resolve_config(args) {
        Ok(config) => config,
        Err(e) => {
            // No subscriber is installed yet for configuration failures.
            eprintln!("phiremock-server: {e}");
            std::process::exit(1);
        }
    };

    let level = if config.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let server = match MockServer::bind(config.clone()).await {
        Ok(server) => server,
        Err(e) => {
            error!("startup failed: {e}");
            std::process::exit(1);
        }
    };

    if let Some(dir) = &config.expectations_dir {
        let state = server.state();
        match load_into(&DirSource::new(dir), &state.expectations) {
            Ok(loaded) => info!("loaded {loaded} expectation(s) from {}", dir.display()),
            Err(e) => {
                error!("startup failed: {e}");
                std::process::exit(1);
            }
        }
    }

    let handle = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            handle.shutdown();
        }
    });

    if let Err(e) = server.run().await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}
