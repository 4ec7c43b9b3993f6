use crate::server::{batch::ResultOrder, pool::PoolConfig};
use anyhow::{Context, bail};
use clap::Parser;
use core::{fmt, time::Duration};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_NUM_WORKERS: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1024;
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
pub const MAX_QUOTA_WINDOW_MINUTES: u64 = 366 * 24 * 60;
pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_TEST_ADDRESS: &str = "Denver, CO, USA";
pub const DEFAULT_GOOGLE_BASE_URL: &str = "https://maps.googleapis.com";
pub const DEFAULT_LOG_MAX_FILES: usize = 10;

/// Runtime configuration for the `geocode-proxy` binary.
///
/// Every option can be given on the command line or through its environment
/// variable. Options left unset fall back to the JSON file passed with
/// `--config` (if any), then to the built-in defaults.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "geocode-proxy",
    version,
    about = "A quota-aware HTTP proxy for batch geocoding"
)]
pub struct CliArgs {
    /// Path to a JSON configuration file.
    ///
    /// Uses the historical deployment format (`workersNumber`, `port`,
    /// `quota`, `quotaTimeInMinutes`, `authentication.apiKey`, ...).
    ///
    /// Environment variable: `GEOCODE_PROXY_CONFIG`
    #[arg(long, env = "GEOCODE_PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of workers calling the geocoding provider concurrently.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS")]
    pub num_workers: Option<usize>,

    /// Capacity of the shared work queue. Must be at least
    /// `max_batch_size` so a batch can always enqueue all of its addresses.
    ///
    /// Environment variable: `QUEUE_CAPACITY`
    #[arg(long, env = "QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Largest number of addresses accepted in one request.
    ///
    /// Environment variable: `MAX_BATCH_SIZE`
    #[arg(long, env = "MAX_BATCH_SIZE")]
    pub max_batch_size: Option<usize>,

    /// Largest request body accepted on `/geocode`, in bytes.
    ///
    /// Environment variable: `MAX_BODY_BYTES`
    #[arg(long, env = "MAX_BODY_BYTES")]
    pub max_body_bytes: Option<usize>,

    /// Provider calls allowed per quota window. `0` disables the quota.
    ///
    /// Environment variable: `QUOTA`
    #[arg(long, env = "QUOTA")]
    pub quota: Option<u64>,

    /// Minutes between quota resets. `0` never resets. At most one year.
    ///
    /// Environment variable: `QUOTA_WINDOW_MINUTES`
    #[arg(long, env = "QUOTA_WINDOW_MINUTES")]
    pub quota_window_minutes: Option<u64>,

    /// Address to listen on, e.g. "0.0.0.0:8888".
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR")]
    pub server_addr: Option<String>,

    /// Deadline for a single provider call, in seconds.
    ///
    /// Environment variable: `PROVIDER_TIMEOUT_SECS`
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS")]
    pub provider_timeout_secs: Option<u64>,

    /// How long shutdown waits for workers to drain, in seconds.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: Option<u64>,

    /// Order of the results in a response.
    ///
    /// Environment variable: `RESULT_ORDER`
    #[arg(long, env = "RESULT_ORDER", value_enum)]
    pub result_order: Option<ResultOrder>,

    /// Google Maps API key.
    ///
    /// Environment variable: `GOOGLE_API_KEY`
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    /// Google Maps premium client id. Requests are signed when both the
    /// client id and the client secret are set.
    ///
    /// Environment variable: `GOOGLE_CLIENT_ID`
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// Google Maps premium signing secret (url-safe base64).
    ///
    /// Environment variable: `GOOGLE_CLIENT_SECRET`
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,

    /// Google Maps usage-tracking channel.
    ///
    /// Environment variable: `GOOGLE_CHANNEL`
    #[arg(long, env = "GOOGLE_CHANNEL")]
    pub google_channel: Option<String>,

    /// Base URL of the Google Maps web services.
    ///
    /// Environment variable: `GOOGLE_BASE_URL`
    #[arg(long, env = "GOOGLE_BASE_URL")]
    pub google_base_url: Option<String>,

    /// Default log level when `RUST_LOG` is not set.
    ///
    /// Environment variable: `LOG_LEVEL`
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Write logs to this file instead of stdout. The file is rotated daily
    /// and the newest rotations are kept.
    ///
    /// Environment variable: `LOG_FILE`
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Address resolved by `--probe`.
    ///
    /// Environment variable: `TEST_ADDRESS`
    #[arg(long, env = "TEST_ADDRESS")]
    pub test_address: Option<String>,

    /// Resolve the test address once at startup and log the outcome.
    #[arg(long, env = "PROBE", default_value_t = false)]
    pub probe: bool,
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    #[serde(alias = "text")]
    #[value(alias = "text")]
    Pretty,
    Json,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FileAuthentication {
    api_key: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    channel: Option<String>,
}

/// Where log lines are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogOutput {
    #[default]
    Stdout,
    /// Daily rotated files named `{filename}.YYYY-MM-DD` in `directory`.
    File {
        directory: PathBuf,
        filename: String,
        max_files: usize,
    },
}

impl LogOutput {
    fn file(path: &Path) -> anyhow::Result<Self> {
        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            bail!("LOG_FILE ({}) must name a file", path.display());
        };
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self::File {
            directory,
            filename: filename.to_string(),
            max_files: DEFAULT_LOG_MAX_FILES,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FileLog {
    log_level: Option<String>,
    format: Option<LogFormat>,
    stdout: Option<bool>,
    directory: Option<PathBuf>,
    filename: Option<String>,
    max_backups: Option<usize>,
}

impl FileLog {
    fn output(self) -> anyhow::Result<LogOutput> {
        if self.stdout != Some(false) {
            return Ok(LogOutput::Stdout);
        }
        let Some(filename) = self.filename.filter(|name| !name.is_empty()) else {
            bail!("log.filename is required when log.stdout is false");
        };
        Ok(LogOutput::File {
            directory: self.directory.unwrap_or_else(|| PathBuf::from(".")),
            filename,
            max_files: self.max_backups.unwrap_or(DEFAULT_LOG_MAX_FILES),
        })
    }
}

/// Settings read from the `--config` JSON file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileConfig {
    authentication: FileAuthentication,
    workers_number: Option<usize>,
    port: Option<u16>,
    log_level: Option<String>,
    quota: Option<u64>,
    quota_time_in_minutes: Option<u64>,
    test_address: Option<String>,
    log: FileLog,
}

impl FileConfig {
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Error unmarshalling config data")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Error reading file {}", path.display()))?;
        Self::parse(&json).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Google Maps premium credentials used to sign every request URL.
#[derive(Clone, PartialEq, Eq)]
pub struct PremiumCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for PremiumCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PremiumCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Connection settings for the Google geocoding provider.
#[derive(Clone)]
pub struct GoogleConfig {
    pub api_key: String,
    pub premium: Option<PremiumCredentials>,
    pub channel: Option<String>,
    pub base_url: String,
}

impl GoogleConfig {
    /// Whether any credential is configured.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() || self.premium.is_some()
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            premium: None,
            channel: None,
            base_url: DEFAULT_GOOGLE_BASE_URL.to_string(),
        }
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("GoogleConfig")
            .field("api_key", &api_key)
            .field("premium", &self.premium)
            .field("channel", &self.channel)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub num_workers: usize,
    pub queue_capacity: usize,
    pub max_batch_size: usize,
    pub max_body_bytes: usize,
    pub quota: u64,
    pub quota_window: Duration,
    pub server_addr: String,
    pub provider_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub result_order: ResultOrder,
    pub google: GoogleConfig,
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_output: LogOutput,
    pub test_address: String,
    pub probe: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_NUM_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            quota: 0,
            quota_window: Duration::ZERO,
            server_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            result_order: ResultOrder::default(),
            google: GoogleConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::default(),
            log_output: LogOutput::default(),
            test_address: DEFAULT_TEST_ADDRESS.to_string(),
            probe: false,
        }
    }
}

impl ServerConfig {
    pub const fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            num_workers: self.num_workers,
            queue_capacity: self.queue_capacity,
            provider_timeout: self.provider_timeout,
            shutdown_timeout: self.shutdown_timeout,
        }
    }

    /// Merges CLI/env values over `file` over the defaults, then validates.
    pub fn resolve(args: CliArgs, file: FileConfig) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let auth = file.authentication;
        let file_log = file.log;

        let premium = match (
            non_empty(args.google_client_id.or(auth.client_id)),
            non_empty(args.google_client_secret.or(auth.client_secret)),
        ) {
            (Some(client_id), Some(client_secret)) => Some(PremiumCredentials {
                client_id,
                client_secret,
            }),
            (None, None) => None,
            _ => bail!("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be set together"),
        };

        let quota_window = match args.quota_window_minutes.or(file.quota_time_in_minutes) {
            Some(minutes) => quota_window(minutes)?,
            None => defaults.quota_window,
        };

        let server_addr = match (args.server_addr, file.port) {
            (Some(addr), _) => addr,
            (None, Some(port)) => format!("0.0.0.0:{port}"),
            (None, None) => defaults.server_addr,
        };

        let log_level = normalize_level(
            args.log_level
                .or(file_log.log_level.clone())
                .or(file.log_level)
                .unwrap_or(defaults.log_level),
        );
        let log_format = args
            .log_format
            .or(file_log.format)
            .unwrap_or(defaults.log_format);
        let log_output = match &args.log_file {
            Some(path) => LogOutput::file(path)?,
            None => file_log.output()?,
        };

        let config = Self {
            num_workers: args
                .num_workers
                .or(file.workers_number)
                .unwrap_or(defaults.num_workers),
            queue_capacity: args.queue_capacity.unwrap_or(defaults.queue_capacity),
            max_batch_size: args.max_batch_size.unwrap_or(defaults.max_batch_size),
            max_body_bytes: args.max_body_bytes.unwrap_or(defaults.max_body_bytes),
            quota: args.quota.or(file.quota).unwrap_or(defaults.quota),
            quota_window,
            server_addr,
            provider_timeout: args
                .provider_timeout_secs
                .map_or(defaults.provider_timeout, Duration::from_secs),
            shutdown_timeout: args
                .shutdown_timeout_secs
                .map_or(defaults.shutdown_timeout, Duration::from_secs),
            result_order: args.result_order.unwrap_or(defaults.result_order),
            google: GoogleConfig {
                api_key: args
                    .google_api_key
                    .or(auth.api_key)
                    .unwrap_or(defaults.google.api_key),
                premium,
                channel: args.google_channel.or(auth.channel).filter(|c| !c.is_empty()),
                base_url: args
                    .google_base_url
                    .unwrap_or(defaults.google.base_url),
            },
            log_level,
            log_format,
            log_output,
            test_address: args
                .test_address
                .or(file.test_address)
                .unwrap_or(defaults.test_address),
            probe: args.probe,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }
        if self.max_batch_size == 0 {
            bail!("MAX_BATCH_SIZE must be greater than 0");
        }
        if self.queue_capacity < self.max_batch_size {
            bail!(
                "QUEUE_CAPACITY ({}) must be at least MAX_BATCH_SIZE ({})",
                self.queue_capacity,
                self.max_batch_size
            );
        }
        if let LogOutput::File { max_files: 0, .. } = self.log_output {
            bail!("log.maxBackups must be greater than 0");
        }
        if self.max_body_bytes == 0 {
            bail!("MAX_BODY_BYTES must be greater than 0");
        }
        if self.provider_timeout.is_zero() {
            bail!("PROVIDER_TIMEOUT_SECS must be greater than 0");
        }
        Ok(())
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }
}

fn quota_window(minutes: u64) -> anyhow::Result<Duration> {
    match minutes.checked_mul(60) {
        Some(secs) if minutes <= MAX_QUOTA_WINDOW_MINUTES => Ok(Duration::from_secs(secs)),
        _ => bail!(
            "QUOTA_WINDOW_MINUTES ({minutes}) must be at most {MAX_QUOTA_WINDOW_MINUTES}"
        ),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Accepts the level names of older deployments ("warning").
fn normalize_level(level: String) -> String {
    match level.as_str() {
        "warning" => "warn".to_string(),
        _ => level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("geocode-proxy").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_match_the_historical_deployment() {
        let config = ServerConfig::resolve(CliArgs::default(), FileConfig::default()).unwrap();
        assert_eq!(config.num_workers, 10);
        assert_eq!(config.server_addr, "0.0.0.0:8888");
        assert_eq!(config.quota, 0);
        assert_eq!(config.quota_window, Duration::ZERO);
        assert_eq!(config.test_address, "Denver, CO, USA");
        assert_eq!(config.result_order, ResultOrder::Completion);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.google.base_url, DEFAULT_GOOGLE_BASE_URL);
    }

    #[test]
    fn reads_the_json_file_format() {
        let file = FileConfig::parse(
            r#"{
                "authentication": {"apiKey": "file-key", "channel": "web"},
                "workersNumber": 4,
                "port": 9000,
                "logLevel": "warning",
                "quota": 2500,
                "quotaTimeInMinutes": 1440,
                "testAddress": "Boulder, CO, USA",
                "log": {"format": "json"}
            }"#,
        )
        .unwrap();

        let config = ServerConfig::resolve(CliArgs::default(), file).unwrap();
        assert_eq!(config.num_workers, 4);
        assert_eq!(config.server_addr, "0.0.0.0:9000");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.quota, 2500);
        assert_eq!(config.quota_window, Duration::from_secs(1440 * 60));
        assert_eq!(config.test_address, "Boulder, CO, USA");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.google.api_key, "file-key");
        assert_eq!(config.google.channel.as_deref(), Some("web"));
    }

    #[test]
    fn command_line_wins_over_file() {
        let file = FileConfig::parse(r#"{"workersNumber": 4, "port": 9000, "quota": 10}"#).unwrap();
        let cli = args(&[
            "--num-workers",
            "16",
            "--server-addr",
            "127.0.0.1:7000",
            "--result-order",
            "input",
            "--log-format",
            "text",
        ]);

        let config = ServerConfig::resolve(cli, file).unwrap();
        assert_eq!(config.num_workers, 16);
        assert_eq!(config.server_addr, "127.0.0.1:7000");
        assert_eq!(config.quota, 10);
        assert_eq!(config.result_order, ResultOrder::Input);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_invalid_sizing() {
        let zero_workers = args(&["--num-workers", "0"]);
        assert!(ServerConfig::resolve(zero_workers, FileConfig::default()).is_err());

        let small_queue = args(&["--queue-capacity", "10", "--max-batch-size", "100"]);
        let err = ServerConfig::resolve(small_queue, FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("QUEUE_CAPACITY"));

        let no_deadline = args(&["--provider-timeout-secs", "0"]);
        assert!(ServerConfig::resolve(no_deadline, FileConfig::default()).is_err());
    }

    #[test]
    fn premium_credentials_are_read_from_the_file() {
        let file = FileConfig::parse(
            r#"{"authentication": {"clientId": "gme-acme", "clientSecret": "vNIXE0xscrmjlyV-12Nj_BvUPaw="}}"#,
        )
        .unwrap();
        let config = ServerConfig::resolve(CliArgs::default(), file).unwrap();
        assert_eq!(
            config.google.premium,
            Some(PremiumCredentials {
                client_id: "gme-acme".to_string(),
                client_secret: "vNIXE0xscrmjlyV-12Nj_BvUPaw=".to_string(),
            })
        );
        assert!(config.google.has_credentials());
        assert!(!format!("{:?}", config.google).contains("vNIXE0xscrmjlyV"));
    }

    #[test]
    fn half_configured_premium_credentials_are_refused() {
        let file = FileConfig::parse(r#"{"authentication": {"clientId": "gme-acme"}}"#).unwrap();
        let err = ServerConfig::resolve(CliArgs::default(), file).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_CLIENT_SECRET"));

        let cli = args(&["--google-client-secret", "c2VjcmV0"]);
        assert!(ServerConfig::resolve(cli, FileConfig::default()).is_err());
    }

    #[test]
    fn oversized_quota_window_is_an_error() {
        let cli = args(&["--quota-window-minutes", "18446744073709551615"]);
        let err = ServerConfig::resolve(cli, FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("QUOTA_WINDOW_MINUTES"));

        let file = FileConfig::parse(r#"{"quotaTimeInMinutes": 600000}"#).unwrap();
        assert!(ServerConfig::resolve(CliArgs::default(), file).is_err());

        let cli = args(&["--quota-window-minutes", "527040"]);
        let config = ServerConfig::resolve(cli, FileConfig::default()).unwrap();
        assert_eq!(config.quota_window, Duration::from_secs(527_040 * 60));
    }

    #[test]
    fn log_section_selects_rotating_file_output() {
        let file = FileConfig::parse(
            r#"{
                "logLevel": "info",
                "log": {
                    "logLevel": "debug",
                    "format": "text",
                    "stdout": false,
                    "directory": "/var/log/geocode",
                    "filename": "proxy.log",
                    "maxBackups": 3
                }
            }"#,
        )
        .unwrap();

        let config = ServerConfig::resolve(CliArgs::default(), file).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(
            config.log_output,
            LogOutput::File {
                directory: PathBuf::from("/var/log/geocode"),
                filename: "proxy.log".to_string(),
                max_files: 3,
            }
        );
    }

    #[test]
    fn log_output_defaults_to_stdout() {
        let file = FileConfig::parse(r#"{"log": {"logLevel": "warning"}}"#).unwrap();
        let config = ServerConfig::resolve(CliArgs::default(), file).unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_output, LogOutput::Stdout);

        let file = FileConfig::parse(r#"{"log": {"stdout": false}}"#).unwrap();
        let err = ServerConfig::resolve(CliArgs::default(), file).unwrap_err();
        assert!(err.to_string().contains("log.filename"));
    }

    #[test]
    fn log_file_flag_overrides_the_file_section() {
        let file = FileConfig::parse(r#"{"log": {"stdout": true}}"#).unwrap();
        let cli = args(&["--log-file", "logs/proxy.log"]);
        let config = ServerConfig::resolve(cli, file).unwrap();
        assert_eq!(
            config.log_output,
            LogOutput::File {
                directory: PathBuf::from("logs"),
                filename: "proxy.log".to_string(),
                max_files: DEFAULT_LOG_MAX_FILES,
            }
        );

        let cli = args(&["--log-file", "proxy.log"]);
        let config = ServerConfig::resolve(cli, FileConfig::default()).unwrap();
        assert!(matches!(
            config.log_output,
            LogOutput::File { ref directory, .. } if directory == Path::new(".")
        ));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let cli = args(&["--config", "/nonexistent/geocode-proxy.json"]);
        let err = ServerConfig::try_from(cli).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/geocode-proxy.json"));
    }

    #[test]
    fn api_key_is_not_printed() {
        let google = GoogleConfig {
            api_key: "AIza-secret".to_string(),
            ..GoogleConfig::default()
        };
        let debug = format!("{google:?}");
        assert!(!debug.contains("AIza-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
