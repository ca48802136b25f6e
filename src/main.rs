//! revtun CLI - reverse TCP tunnel proxy and client.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tunnel_proto::{ClientConfig, EncryptionConfig, ProxyConfig};

#[derive(Parser, Debug)]
#[command(name = "revtun")]
#[command(about = "Reverse TCP tunnel proxy and client")]
#[command(version)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the public-side proxy: public listener + tunnel listener.
    Proxy {
        /// Port the public listener accepts client traffic on.
        #[arg(long, env = "REVTUN_PROXY_PORT")]
        proxy_port: u16,

        /// Port the tunnel listener accepts reverse tunnels on.
        #[arg(long, env = "REVTUN_TUNNEL_PORT")]
        tunnel_port: u16,

        /// Address both listeners bind on.
        #[arg(long, env = "REVTUN_BIND_HOST", default_value = "0.0.0.0")]
        bind_host: String,

        /// Path to a PEM-encoded TLS private key. Requires --tls-cert.
        #[arg(long, env = "REVTUN_TLS_KEY", requires = "tls_cert")]
        tls_key: Option<String>,

        /// Path to a PEM-encoded TLS certificate chain. Requires --tls-key.
        #[arg(long, env = "REVTUN_TLS_CERT", requires = "tls_key")]
        tls_cert: Option<String>,

        /// Shared secret tunnels must present on connect.
        #[arg(long, env = "REVTUN_SECRET")]
        secret: Option<String>,

        /// Cipher for tunnel traffic framing, e.g. aes-256-ctr.
        #[arg(long, env = "REVTUN_CIPHER", requires_all = ["encryption_key", "encryption_iv"])]
        cipher: Option<String>,

        /// Hex-encoded 32-byte encryption key.
        #[arg(long, env = "REVTUN_ENCRYPTION_KEY")]
        encryption_key: Option<String>,

        /// Hex-encoded 16-byte encryption IV.
        #[arg(long, env = "REVTUN_ENCRYPTION_IV")]
        encryption_iv: Option<String>,

        /// Milliseconds allowed for a tunnel to complete the handshake.
        #[arg(long, env = "REVTUN_CHALLENGE_TIMEOUT_MS", default_value = "4000")]
        challenge_timeout_ms: u64,

        /// Milliseconds a queued request may wait for an idle tunnel.
        #[arg(long, env = "REVTUN_REQUEST_TIMEOUT_MS", default_value = "5000")]
        request_timeout_ms: u64,
    },

    /// Run the private-side client: maintains a pool of reverse tunnels.
    Client {
        /// Host of the Proxy's tunnel listener.
        #[arg(long, env = "REVTUN_PROXY_HOST")]
        proxy_host: String,

        /// Port of the Proxy's tunnel listener.
        #[arg(long, env = "REVTUN_TUNNEL_PORT")]
        tunnel_port: u16,

        /// Host of the local application to bridge each tunnel to.
        #[arg(long, env = "REVTUN_APP_HOST", default_value = "localhost")]
        app_host: String,

        /// Port of the local application.
        #[arg(long, env = "REVTUN_APP_PORT")]
        app_port: u16,

        /// Shared secret presented on connect; must match the Proxy.
        #[arg(long, env = "REVTUN_SECRET")]
        secret: Option<String>,

        /// Cipher for tunnel traffic framing; must match the Proxy.
        #[arg(long, env = "REVTUN_CIPHER", requires_all = ["encryption_key", "encryption_iv"])]
        cipher: Option<String>,

        /// Hex-encoded 32-byte encryption key.
        #[arg(long, env = "REVTUN_ENCRYPTION_KEY")]
        encryption_key: Option<String>,

        /// Hex-encoded 16-byte encryption IV.
        #[arg(long, env = "REVTUN_ENCRYPTION_IV")]
        encryption_iv: Option<String>,

        /// Milliseconds allowed for a tunnel to complete the handshake.
        #[arg(long, env = "REVTUN_CHALLENGE_TIMEOUT_MS", default_value = "4000")]
        challenge_timeout_ms: u64,

        /// Target number of concurrently open tunnels.
        #[arg(long, env = "REVTUN_POOL_SIZE", default_value = "20")]
        pool_size: usize,

        /// Milliseconds to wait before retrying a failed/total-outage reconnect.
        #[arg(long, env = "REVTUN_RECONNECT_DELAY_MS", default_value = "5000")]
        reconnect_delay_ms: u64,
    },
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

fn decode_hex(label: &str, s: &str) -> Result<Vec<u8>> {
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(s.get(i..i + 2).unwrap_or_default(), 16)
                .with_context(|| format!("{label} is not valid hex"))
        })
        .collect()
}

fn build_encryption(
    cipher: Option<String>,
    key: Option<String>,
    iv: Option<String>,
) -> Result<Option<EncryptionConfig>> {
    match cipher {
        None => Ok(None),
        Some(cipher) => {
            let key = decode_hex("--encryption-key", &key.context("--encryption-key is required with --cipher")?)?;
            let iv = decode_hex("--encryption-iv", &iv.context("--encryption-iv is required with --cipher")?)?;
            Ok(Some(EncryptionConfig { cipher, key, iv }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Proxy {
            proxy_port,
            tunnel_port,
            bind_host,
            tls_key,
            tls_cert,
            secret,
            cipher,
            encryption_key,
            encryption_iv,
            challenge_timeout_ms,
            request_timeout_ms,
        } => {
            let tls_key = tls_key
                .map(std::fs::read)
                .transpose()
                .context("failed to read --tls-key")?;
            let tls_cert = tls_cert
                .map(std::fs::read)
                .transpose()
                .context("failed to read --tls-cert")?;

            let mut config = ProxyConfig::new(proxy_port, tunnel_port);
            config.bind_host = bind_host;
            config.tls_key = tls_key;
            config.tls_cert = tls_cert;
            config.secret = secret.map(String::into_bytes);
            config.tunnel_encryption = build_encryption(cipher, encryption_key, encryption_iv)?;
            config.challenge_timeout = Duration::from_millis(challenge_timeout_ms);
            config.request_timeout = Duration::from_millis(request_timeout_ms);

            tunnel_dispatch::start_proxy(config)
                .await
                .context("failed to start proxy")?;
            info!("proxy started; awaiting ctrl-c");
            tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
            info!("shutting down");
            Ok(())
        }

        Commands::Client {
            proxy_host,
            tunnel_port,
            app_host,
            app_port,
            secret,
            cipher,
            encryption_key,
            encryption_iv,
            challenge_timeout_ms,
            pool_size,
            reconnect_delay_ms,
        } => {
            let mut config = ClientConfig::new(proxy_host, tunnel_port, app_port);
            config.app_host = app_host;
            config.secret = secret.map(String::into_bytes);
            config.tunnel_encryption = build_encryption(cipher, encryption_key, encryption_iv)?;
            config.challenge_timeout = Duration::from_millis(challenge_timeout_ms);
            config.pool_size = pool_size;
            config.reconnect_delay = Duration::from_millis(reconnect_delay_ms);

            tunnel_pool::start_client(config)
                .await
                .context("failed to start client")?;
            info!("client started; awaiting ctrl-c");
            tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
            info!("shutting down");
            Ok(())
        }
    }
}
