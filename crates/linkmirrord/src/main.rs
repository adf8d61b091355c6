// # linkmirrord - Link Mirroring Daemon
//
// This daemon is a THIN integration layer only:
// - All dedup, backfill and stream logic lives in linkmirror-core
// - All platform calls live in linkmirror-twitter
// - Configuration is via environment variables ONLY
//
// The linkmirrord daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the store, registry and platform client once
// 4. Running backfill, then the live consumer until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Credentials (required, never logged)
// - `LINKMIRROR_CONSUMER_KEY`
// - `LINKMIRROR_CONSUMER_SECRET`
// - `LINKMIRROR_ACCESS_TOKEN`
// - `LINKMIRROR_ACCESS_TOKEN_SECRET`
//
// ### Tracking
// - `LINKMIRROR_ACCOUNT`: Handle of the tracked account (required, `@` optional)
// - `LINKMIRROR_LINK_PREFIX`: Display prefix of tracked links (default: theverge.com/e/)
// - `LINKMIRROR_MIRROR_ENABLED`: Actually retweet (default: false, dry-run)
// - `LINKMIRROR_BACKFILL_MAX_POSTS`: History ceiling (default: 1000)
//
// ### Link Store
// - `LINKMIRROR_STORE_TYPE`: file or memory (default: file)
// - `LINKMIRROR_STORE_PATH`: Path to store file (for file store)
// - `LINKMIRROR_RETENTION_HOURS`: Link retention window (default: 72)
//
// ### Stream
// - `LINKMIRROR_MAX_RECONNECTS`: Consecutive reconnects before giving up (default: 5)
//
// ### Logging
// - `LINKMIRROR_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export LINKMIRROR_CONSUMER_KEY=...
// export LINKMIRROR_CONSUMER_SECRET=...
// export LINKMIRROR_ACCESS_TOKEN=...
// export LINKMIRROR_ACCESS_TOKEN_SECRET=...
// export LINKMIRROR_ACCOUNT=verge
// export LINKMIRROR_STORE_PATH=/var/lib/linkmirror/links.json
// export LINKMIRROR_MIRROR_ENABLED=true
//
// linkmirrord
// ```

use anyhow::{Context, Result};
use linkmirror_core::config::{MAX_RETENTION_HOURS, MirrorConfig, StoreConfig};
use linkmirror_core::store::open_store;
use linkmirror_core::{BackfillWalker, Classifier, ConsumerEvent, LiveConsumer, UrlRegistry};
use linkmirror_twitter::{Credentials, TwitterClient};
use std::future::Future;
use std::pin::Pin;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum MirrorExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (store, stream or platform failure)
    RuntimeError = 2,
}

impl From<MirrorExitCode> for ExitCode {
    fn from(code: MirrorExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Values that indicate an unedited example configuration
const PLACEHOLDERS: &[&str] = &["your_", "replace_me", "changeme"];

/// Application configuration
struct Config {
    credentials: Credentials,
    account: String,
    link_prefix: Option<String>,
    mirror_enabled: bool,
    backfill_max_posts: Option<usize>,
    retention_hours: Option<u64>,
    store_type: String,
    store_path: Option<String>,
    max_reconnects: Option<usize>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `get`
    fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            get(key).with_context(|| format!("{} is required. Set it via: export {}=...", key, key))
        };

        Ok(Self {
            credentials: Credentials::new(
                required("LINKMIRROR_CONSUMER_KEY")?,
                required("LINKMIRROR_CONSUMER_SECRET")?,
                required("LINKMIRROR_ACCESS_TOKEN")?,
                required("LINKMIRROR_ACCESS_TOKEN_SECRET")?,
            ),
            account: required("LINKMIRROR_ACCOUNT")?
                .trim()
                .trim_start_matches('@')
                .to_string(),
            link_prefix: get("LINKMIRROR_LINK_PREFIX"),
            mirror_enabled: match get("LINKMIRROR_MIRROR_ENABLED") {
                Some(value) => parse_bool("LINKMIRROR_MIRROR_ENABLED", &value)?,
                None => false,
            },
            backfill_max_posts: parse_number(&get, "LINKMIRROR_BACKFILL_MAX_POSTS")?,
            retention_hours: parse_number(&get, "LINKMIRROR_RETENTION_HOURS")?,
            store_type: get("LINKMIRROR_STORE_TYPE").unwrap_or_else(|| "file".to_string()),
            store_path: get("LINKMIRROR_STORE_PATH"),
            max_reconnects: parse_number(&get, "LINKMIRROR_MAX_RECONNECTS")?,
            log_level: get("LINKMIRROR_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.credentials
            .validate()
            .context("Twitter credentials are incomplete")?;

        let secrets = [
            ("LINKMIRROR_CONSUMER_KEY", &self.credentials.consumer_key),
            ("LINKMIRROR_CONSUMER_SECRET", &self.credentials.consumer_secret),
            ("LINKMIRROR_ACCESS_TOKEN", &self.credentials.access_token),
            ("LINKMIRROR_ACCESS_TOKEN_SECRET", &self.credentials.access_token_secret),
        ];
        for (key, value) in secrets {
            let lower = value.to_lowercase();
            if PLACEHOLDERS.iter().any(|p| lower.contains(p)) {
                anyhow::bail!(
                    "{} appears to be a placeholder. \
                    Use the actual value from your Twitter application settings.",
                    key
                );
            }
        }

        match self.store_type.as_str() {
            "file" => match self.store_path {
                Some(ref path) if path.is_empty() => anyhow::bail!(
                    "LINKMIRROR_STORE_PATH cannot be empty when LINKMIRROR_STORE_TYPE=file"
                ),
                Some(ref path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "LINKMIRROR_STORE_PATH parent directory does not exist: {}. \
                            Create it first: mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
                None => anyhow::bail!(
                    "LINKMIRROR_STORE_PATH is required when LINKMIRROR_STORE_TYPE=file. \
                    Set it via: export LINKMIRROR_STORE_PATH=/var/lib/linkmirror/links.json"
                ),
            },
            "memory" => {}
            _ => anyhow::bail!(
                "LINKMIRROR_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if let Some(hours) = self.retention_hours
            && !(1..=MAX_RETENTION_HOURS).contains(&hours)
        {
            anyhow::bail!(
                "LINKMIRROR_RETENTION_HOURS must be between 1 and {}. Got: {}",
                MAX_RETENTION_HOURS,
                hours
            );
        }

        if let Some(max_posts) = self.backfill_max_posts
            && max_posts > 100_000
        {
            anyhow::bail!(
                "LINKMIRROR_BACKFILL_MAX_POSTS must be at most 100000. Got: {}",
                max_posts
            );
        }

        if let Some(max_reconnects) = self.max_reconnects
            && max_reconnects > 100
        {
            anyhow::bail!(
                "LINKMIRROR_MAX_RECONNECTS must be between 0 and 100. Got: {}",
                max_reconnects
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "LINKMIRROR_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.mirror_config()
            .validate()
            .context("Invalid mirror configuration")?;

        Ok(())
    }

    /// Core configuration derived from the environment
    fn mirror_config(&self) -> MirrorConfig {
        let mut config = MirrorConfig::new(self.account.clone());

        if let Some(ref prefix) = self.link_prefix {
            config.links.prefix = prefix.clone();
        }
        config.store = match self.store_type.as_str() {
            "memory" => StoreConfig::Memory,
            _ => StoreConfig::File {
                path: self.store_path.clone().unwrap_or_default(),
            },
        };
        if let Some(hours) = self.retention_hours {
            config.retention_hours = hours;
        }
        if let Some(max_posts) = self.backfill_max_posts {
            config.backfill.max_posts = max_posts;
        }
        config.mirror.enabled = self.mirror_enabled;
        if let Some(max_reconnects) = self.max_reconnects {
            config.stream.max_reconnects = max_reconnects;
        }

        config
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", key, value),
    }
}

fn parse_number<F, T>(get: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    get(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer. Got: {}", key, value))
        })
        .transpose()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return MirrorExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return MirrorExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return MirrorExitCode::ConfigError.into();
    }

    info!("Starting linkmirrord daemon");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return MirrorExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let daemon = match Daemon::start(config).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return MirrorExitCode::ConfigError;
            }
        };

        if let Err(e) = daemon.run().await {
            error!("Daemon error: {:#}", e);
            MirrorExitCode::RuntimeError
        } else {
            MirrorExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Components built once at startup and torn down at exit
struct Daemon {
    config: MirrorConfig,
    classifier: Arc<Classifier>,
    client: Arc<TwitterClient>,
    shutdown: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl Daemon {
    /// Register signal handlers, open the store and build the client
    async fn start(config: Config) -> Result<Self> {
        let mirror_config = config.mirror_config();

        info!(
            account = %mirror_config.account.handle,
            prefix = %mirror_config.links.prefix,
            store = mirror_config.store.type_name(),
            retention_hours = mirror_config.retention_hours,
            "Configuration loaded"
        );
        if !mirror_config.mirror.enabled {
            warn!("Mirroring disabled - running in DRY-RUN mode, nothing will be retweeted");
        }

        // Before any long-running work, so an early signal is not lost
        let shutdown = Box::pin(shutdown_signal()?);

        let retention = mirror_config
            .retention()
            .context("Invalid retention window")?;
        let store = open_store(&mirror_config.store, retention)
            .await
            .context("Failed to open link store")?;
        let purged = store
            .purge_expired()
            .await
            .context("Failed to purge link store")?;
        if purged > 0 {
            info!(purged, "Dropped expired links");
        }

        let registry = Arc::new(UrlRegistry::new(store));
        let classifier = Arc::new(Classifier::new(
            registry,
            mirror_config.links.prefix.clone(),
        ));
        let client = Arc::new(
            TwitterClient::new(config.credentials, !mirror_config.mirror.enabled)
                .context("Failed to create Twitter client")?,
        );

        Ok(Self {
            config: mirror_config,
            classifier,
            client,
            shutdown,
        })
    }

    /// Backfill, then follow the live stream until a shutdown signal
    async fn run(self) -> Result<()> {
        let handle = self.config.account.handle.clone();

        // Backfill completes before the live consumer starts
        let report = BackfillWalker::new(
            self.client.clone(),
            self.classifier.clone(),
            self.config.backfill.page_size,
        )
        .backfill(&handle, self.config.backfill.max_posts)
        .await
        .context("Backfill failed")?;
        info!(
            fetched = report.fetched,
            duplicates = report.duplicates,
            "Registry seeded from history"
        );

        let (consumer, mut events) = LiveConsumer::new(
            handle,
            self.client.clone(),
            self.client.clone(),
            self.classifier,
            self.client,
            self.config.stream,
        )?;

        // Ends when the consumer (and its sender) is dropped
        let event_log = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ConsumerEvent::Disconnected { reason, attempt } => {
                        debug!(attempt, "Stream disconnected: {}", reason)
                    }
                    other => debug!(event = ?other, "Consumer event"),
                }
            }
        });

        let result = consumer.listen_until(self.shutdown).await;
        drop(consumer);
        let _ = event_log.await;

        result?;
        info!("Shutting down daemon");
        Ok(())
    }
}

/// Completes on SIGTERM or SIGINT
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()> + Send> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Completes on Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()> + Send> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal: SIGINT"),
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    })
}
