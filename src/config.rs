use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Research server base URL
    #[arg(long, env = "RESEARCH_SERVER_URL")]
    pub server_url: Option<String>,

    /// History file path
    #[arg(long, env = "RESEARCH_HISTORY_FILE")]
    pub history_file: Option<String>,

    /// Give up on a silent job after this many seconds (0 waits forever)
    #[arg(long, env = "RESEARCH_STALE_TIMEOUT")]
    pub stale_timeout: Option<u64>,

    /// Log output format: text or json
    #[arg(long, env = "LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Also print the latest status line as it changes
    #[arg(long, env = "RESEARCH_STATUS_LINE")]
    pub status_line: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit a research question and follow it to completion
    Ask {
        /// The research question
        question: String,
        /// Model id (defaults to the server's default model)
        #[arg(short, long, default_value = "")]
        model: String,
    },
    /// Follow the job currently running on the server
    Watch,
    /// List the models offered by the server
    Models,
    /// Show recent submissions
    History,
    /// Re-submit a history entry (0 is the most recent)
    Rerun {
        index: usize,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub push: PushConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PushConfig {
    pub events_path: String,
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HistoryConfig {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub stale_timeout_secs: u64,
    pub default_model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub format: String,
}

impl PushConfig {
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl HistoryConfig {
    /// Configured path, else `<data dir>/research-console/history.json`.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("research-console")
                .join("history.json"),
        }
    }
}

impl SessionConfig {
    /// `None` when stale-job detection is disabled.
    #[must_use]
    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_timeout_secs > 0).then(|| Duration::from_secs(self.stale_timeout_secs))
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::load_from_cli(&cli)
    }

    /// Priority: CLI flag > CLI env var > `RESEARCH_` env > config file > defaults.
    pub fn load_from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.base_url", "http://127.0.0.1:5001")?
            .set_default("push.events_path", "/api/events")?
            .set_default("push.reconnect_delay_ms", 2000)?
            .set_default("session.stale_timeout_secs", 0)?
            .set_default("session.default_model", "o3-min")?
            .set_default("log.format", "text")?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name("research-console").required(false)),
        };

        // E.g. RESEARCH_SERVER__BASE_URL=http://host:5001
        builder = builder.add_source(
            Environment::with_prefix("RESEARCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(url) = &cli.server_url {
            builder = builder.set_override("server.base_url", url.as_str())?;
        }
        if let Some(path) = &cli.history_file {
            builder = builder.set_override("history.path", path.as_str())?;
        }
        if let Some(secs) = cli.stale_timeout {
            builder = builder.set_override("session.stale_timeout_secs", secs)?;
        }
        if let Some(format) = &cli.log_format {
            builder = builder.set_override("log.format", format.as_str())?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}
