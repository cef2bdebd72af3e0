//! Process configuration
//!
//! Command-line flags take precedence over environment variables, which
//! take precedence over defaults.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default Gemini model
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
/// Default DynamoDB table
pub const DEFAULT_TABLE_NAME: &str = "escape-room-001";

/// Where the game record lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store; state is lost on restart
    Memory,
    /// DynamoDB table holding the singleton item
    DynamoDb {
        /// Table name
        table: String,
    },
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Store backend
    pub store: StoreBackend,
    /// Root of the drawing archive; archiving is off when unset
    pub archive_dir: Option<PathBuf>,
    /// Gemini model name
    pub gemini_model: String,
    /// Gemini API key; drawing submissions fail when unset
    pub gemini_api_key: Option<String>,
    /// Extra attempts the HTTP layer makes after a version conflict
    pub conflict_retries: u32,
    /// Emit JSON log lines
    pub log_json: bool,
}

impl ServerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With bind address
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// With store backend
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: StoreBackend) -> Self {
        self.store = store;
        self
    }

    /// With conflict retries
    #[inline]
    #[must_use]
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Total attempts for retryable operations
    #[inline]
    #[must_use]
    pub fn conflict_attempts(&self) -> u32 {
        self.conflict_retries.saturating_add(1)
    }

    /// Build from parsed command-line arguments
    ///
    /// # Errors
    /// Returns an error for an unknown store backend.
    pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(bind) = matches.get_one::<SocketAddr>("bind") {
            config.bind = *bind;
        } else if let Some(port) = matches.get_one::<u16>("port") {
            config.bind.set_port(*port);
        }
        if let Some(store) = matches.get_one::<String>("store") {
            config.store = match store.as_str() {
                "memory" => StoreBackend::Memory,
                "dynamodb" => StoreBackend::DynamoDb {
                    table: matches
                        .get_one::<String>("table")
                        .cloned()
                        .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
                },
                other => anyhow::bail!("unknown store backend: {other}"),
            };
        }
        config.archive_dir = matches.get_one::<PathBuf>("archive-dir").cloned();
        if let Some(model) = matches.get_one::<String>("gemini-model") {
            config.gemini_model.clone_from(model);
        }
        config.gemini_api_key = matches
            .get_one::<String>("gemini-api-key")
            .filter(|key| !key.is_empty())
            .cloned();
        if let Some(retries) = matches.get_one::<u32>("conflict-retries") {
            config.conflict_retries = *retries;
        }
        config.log_json = matches.get_flag("log-json");
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            store: StoreBackend::Memory,
            archive_dir: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_api_key: None,
            conflict_retries: 2,
            log_json: false,
        }
    }
}

/// Command-line interface
#[must_use]
pub fn cli() -> Command {
    Command::new("hourglass-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Hourglass Realm escape-room backend")
        .arg(
            Arg::new("bind")
                .long("bind")
                .value_parser(value_parser!(SocketAddr))
                .help("Listen address (overrides PORT)"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .env("PORT")
                .value_parser(value_parser!(u16))
                .help("Listen port on all interfaces"),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .env("STATE_STORE")
                .default_value("memory")
                .value_parser(["memory", "dynamodb"])
                .help("State store backend"),
        )
        .arg(
            Arg::new("table")
                .long("table")
                .env("DYNAMODB_TABLE_NAME")
                .help("DynamoDB table name"),
        )
        .arg(
            Arg::new("archive-dir")
                .long("archive-dir")
                .env("DRAWING_ARCHIVE_DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Directory for archived drawings"),
        )
        .arg(
            Arg::new("gemini-model")
                .long("gemini-model")
                .env("GEMINI_MODEL")
                .default_value(DEFAULT_GEMINI_MODEL)
                .help("Gemini model used to classify drawings"),
        )
        .arg(
            Arg::new("gemini-api-key")
                .long("gemini-api-key")
                .env("GOOGLE_API_KEY")
                .hide_env_values(true)
                .help("Gemini API key"),
        )
        .arg(
            Arg::new("conflict-retries")
                .long("conflict-retries")
                .default_value("2")
                .value_parser(value_parser!(u32))
                .help("Retries after a version conflict for enter, unlock and admin update"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .help("Emit JSON log lines"),
        )
}
