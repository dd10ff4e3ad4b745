use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use hub::SessionSettings;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Secret shipped as the default so development works out of the box. Never
/// acceptable in production.
pub const DEFAULT_JWT_SECRET_KEY: &str = "your-secret-key-change-in-production";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:5173,http://localhost:3000,http://127.0.0.1:5173,http://127.0.0.1:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 8000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// The shared secret access tokens are signed with by the authentication service.
    #[arg(long, env, default_value = DEFAULT_JWT_SECRET_KEY)]
    jwt_secret_key: String,

    /// The HMAC algorithm access tokens are signed with.
    #[arg(
        long,
        env,
        default_value = "HS256",
        value_parser = clap::builder::PossibleValuesParser::new(["HS256", "HS384", "HS512"])
    )]
    jwt_algorithm: String,

    /// Frames a WebSocket connection may have queued before it is dropped as a slow consumer
    #[arg(long, env, default_value_t = 64, value_parser = clap::value_parser!(u32).range(1..))]
    pub ws_outbound_queue_capacity: u32,

    /// Seconds a single WebSocket write may take before the connection is dropped
    #[arg(long, env, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub ws_send_timeout_secs: u64,

    /// Seconds between server Ping frames on idle WebSocket connections (0 disables pings)
    #[arg(long, env, default_value_t = 30)]
    pub ws_heartbeat_interval_secs: u64,

    /// Maximum number of channels accepted in one subscribe or unsubscribe message
    #[arg(long, env, default_value_t = 64, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub ws_max_channels_per_message: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn jwt_secret_key(&self) -> &str {
        &self.jwt_secret_key
    }

    pub fn set_jwt_secret_key(mut self, jwt_secret_key: String) -> Self {
        self.jwt_secret_key = jwt_secret_key;
        self
    }

    pub fn jwt_algorithm(&self) -> &str {
        &self.jwt_algorithm
    }

    pub fn uses_default_jwt_secret(&self) -> bool {
        self.jwt_secret_key == DEFAULT_JWT_SECRET_KEY
    }

    /// Per-connection tunables handed to every hub session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            outbound_queue_capacity: self.ws_outbound_queue_capacity as usize,
            send_timeout: Duration::from_secs(self.ws_send_timeout_secs),
            heartbeat_interval: match self.ws_heartbeat_interval_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            max_channels_per_message: self.ws_max_channels_per_message,
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
