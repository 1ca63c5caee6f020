use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Datelike;
use thiserror::Error;
use zeroize::Zeroizing;

/// Application-level constants
pub const APP_NAME: &str = "labsync";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_ACTION_ORDER_RESULT: &str =
    "http://hermespardini.com.br/b2b/apoio/schemas/HPWS.XMLServer.getResultadoPedido";
pub const DEFAULT_ACTION_PERIOD_RESULT: &str =
    "http://hermespardini.com.br/b2b/apoio/schemas/HPWS.XMLServer.getResultado";

/// Default tracing filter when RUST_LOG is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "labsync=debug,audit=info"
    } else {
        "labsync=info,audit=info"
    }
}

/// Get the application data directory
/// ~/Labsync/ when a home directory exists, the working directory otherwise.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Labsync"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default location of the SQLite store.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("labsync.db")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required setting {0} is not set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Could not read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
}

/// Connection settings for the laboratory provider's XML service.
#[derive(Clone)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub login: String,
    pub passwd: Zeroizing<String>,
    pub action_order_result: String,
    pub action_period_result: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("login", &"<redacted>")
            .field("passwd", &"<redacted>")
            .field("action_order_result", &self.action_order_result)
            .field("action_period_result", &self.action_period_result)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl RemoteConfig {
    /// Fail fast before any network call when a credential, the endpoint
    /// or an action identifier is unset.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, &str); 5] = [
            ("LAB_ENDPOINT", &self.endpoint),
            ("LAB_LOGIN", &self.login),
            ("LAB_PASSWD", self.passwd.as_str()),
            ("LAB_ACTION_ORDER_RESULT", &self.action_order_result),
            ("LAB_ACTION_PERIOD_RESULT", &self.action_period_result),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }
        Ok(())
    }
}

/// Batch and scheduling knobs for the integration worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub batch_size: u32,
    pub pool_size: usize,
    pub item_timeout: Duration,
    pub interval: Duration,
    pub mapping_window_hours: u32,
    pub mapping_include_graphics: bool,
    pub default_year: i32,
    pub year_fallback: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            pool_size: 5,
            item_timeout: Duration::from_secs(300),
            interval: Duration::from_secs(5 * 60),
            mapping_window_hours: 24,
            mapping_include_graphics: false,
            default_year: chrono::Local::now().year(),
            year_fallback: 2,
        }
    }
}

/// Metadata stamped on every attached document.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    pub report_type_code: i64,
    pub graphic_type_code: i64,
    pub author: String,
    pub origin: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            report_type_code: 841,
            graphic_type_code: 841,
            author: "RERONO_API".to_string(),
            origin: "HERMES PARDINI - HPWS".to_string(),
        }
    }
}

/// Process-wide configuration, built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    pub worker: WorkerConfig,
    pub documents: DocumentConfig,
    pub db_path: PathBuf,
    pub dump_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Build from the process environment layered over an optional env file.
    /// Process environment wins over the file.
    pub fn load(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_values = match env_file {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file_values.get(key).cloned())
        })
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let worker_defaults = WorkerConfig::default();
        let doc_defaults = DocumentConfig::default();

        let remote = RemoteConfig {
            endpoint: get("LAB_ENDPOINT").unwrap_or_default(),
            login: get("LAB_LOGIN").unwrap_or_default(),
            passwd: Zeroizing::new(get("LAB_PASSWD").unwrap_or_default()),
            action_order_result: get("LAB_ACTION_ORDER_RESULT")
                .unwrap_or_else(|| DEFAULT_ACTION_ORDER_RESULT.to_string()),
            action_period_result: get("LAB_ACTION_PERIOD_RESULT")
                .unwrap_or_else(|| DEFAULT_ACTION_PERIOD_RESULT.to_string()),
            connect_timeout: Duration::from_millis(parse_or(
                "LAB_CONNECT_TIMEOUT_MS",
                get("LAB_CONNECT_TIMEOUT_MS"),
                30_000u64,
            )?),
            read_timeout: Duration::from_millis(parse_or(
                "LAB_READ_TIMEOUT_MS",
                get("LAB_READ_TIMEOUT_MS"),
                60_000u64,
            )?),
        };

        let worker = WorkerConfig {
            batch_size: parse_or("WORKER_BATCH_SIZE", get("WORKER_BATCH_SIZE"), worker_defaults.batch_size)?,
            pool_size: parse_or("WORKER_POOL_SIZE", get("WORKER_POOL_SIZE"), worker_defaults.pool_size)?
                .max(1),
            item_timeout: Duration::from_secs(parse_or(
                "WORKER_ITEM_TIMEOUT_SECS",
                get("WORKER_ITEM_TIMEOUT_SECS"),
                worker_defaults.item_timeout.as_secs(),
            )?),
            interval: Duration::from_secs(
                parse_or(
                    "SCHEDULER_INTERVAL_MINUTES",
                    get("SCHEDULER_INTERVAL_MINUTES"),
                    5u64,
                )? * 60,
            ),
            mapping_window_hours: parse_or(
                "MAPPING_WINDOW_HOURS",
                get("MAPPING_WINDOW_HOURS"),
                worker_defaults.mapping_window_hours,
            )?,
            mapping_include_graphics: parse_or(
                "MAPPING_INCLUDE_GRAPHICS",
                get("MAPPING_INCLUDE_GRAPHICS"),
                0u8,
            )? != 0,
            default_year: parse_or(
                "RESULT_DEFAULT_YEAR",
                get("RESULT_DEFAULT_YEAR"),
                worker_defaults.default_year,
            )?,
            year_fallback: parse_or(
                "RESULT_YEAR_FALLBACK",
                get("RESULT_YEAR_FALLBACK"),
                worker_defaults.year_fallback,
            )?,
        };

        let documents = DocumentConfig {
            report_type_code: parse_or("DOC_TYPE_REPORT", get("DOC_TYPE_REPORT"), doc_defaults.report_type_code)?,
            graphic_type_code: parse_or("DOC_TYPE_GRAPHIC", get("DOC_TYPE_GRAPHIC"), doc_defaults.graphic_type_code)?,
            author: get("DOC_AUTHOR").unwrap_or(doc_defaults.author),
            origin: get("DOC_ORIGIN").unwrap_or(doc_defaults.origin),
        };

        Ok(Self {
            remote,
            worker,
            documents,
            db_path: get("LABSYNC_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            dump_dir: get("LABSYNC_DUMP_DIR").map(PathBuf::from),
        })
    }

    /// Checked once before the protocol client is built.
    pub fn validate_remote(&self) -> Result<(), ConfigError> {
        self.remote.validate()
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// `KEY=VALUE` pairs from a dotenv file. A missing file yields no values.
fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "Env file not found, skipping");
        return Ok(HashMap::new());
    }
    let env_file_error = |source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    };
    dotenvy::from_path_iter(path)
        .map_err(env_file_error)?
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(env_file_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            ("LAB_ENDPOINT", "https://lab.example/hpws"),
            ("LAB_LOGIN", "hospital"),
            ("LAB_PASSWD", "s3cret"),
        ]
    }

    #[test]
    fn defaults_applied_when_unset() {
        let cfg = AppConfig::from_lookup(lookup_from(&complete())).unwrap();
        assert_eq!(cfg.worker.batch_size, 50);
        assert_eq!(cfg.worker.pool_size, 5);
        assert_eq!(cfg.worker.item_timeout, Duration::from_secs(300));
        assert_eq!(cfg.worker.interval, Duration::from_secs(300));
        assert_eq!(cfg.worker.year_fallback, 2);
        assert_eq!(cfg.remote.connect_timeout, Duration::from_millis(30_000));
        assert_eq!(cfg.remote.read_timeout, Duration::from_millis(60_000));
        assert_eq!(cfg.remote.action_order_result, DEFAULT_ACTION_ORDER_RESULT);
        assert_eq!(cfg.documents.report_type_code, 841);
        assert!(cfg.dump_dir.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = complete();
        pairs.push(("WORKER_BATCH_SIZE", "10"));
        pairs.push(("RESULT_DEFAULT_YEAR", "2025"));
        pairs.push(("MAPPING_INCLUDE_GRAPHICS", "1"));
        pairs.push(("LABSYNC_DUMP_DIR", "/tmp/dump"));
        let cfg = AppConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(cfg.worker.batch_size, 10);
        assert_eq!(cfg.worker.default_year, 2025);
        assert!(cfg.worker.mapping_include_graphics);
        assert_eq!(cfg.dump_dir, Some(PathBuf::from("/tmp/dump")));
    }

    #[test]
    fn invalid_number_is_reported_with_key() {
        let mut pairs = complete();
        pairs.push(("WORKER_POOL_SIZE", "lots"));
        match AppConfig::from_lookup(lookup_from(&pairs)) {
            Err(ConfigError::Invalid { key, value }) => {
                assert_eq!(key, "WORKER_POOL_SIZE");
                assert_eq!(value, "lots");
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn validate_reports_missing_password() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("LAB_ENDPOINT", "https://lab.example/hpws"),
            ("LAB_LOGIN", "hospital"),
        ]))
        .unwrap();
        match cfg.validate_remote() {
            Err(ConfigError::Missing(name)) => assert_eq!(name, "LAB_PASSWD"),
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn validate_reports_blank_endpoint_first() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("LAB_ENDPOINT", "   ")])).unwrap();
        assert!(matches!(
            cfg.validate_remote(),
            Err(ConfigError::Missing("LAB_ENDPOINT"))
        ));
    }

    #[test]
    fn validate_passes_with_credentials() {
        let cfg = AppConfig::from_lookup(lookup_from(&complete())).unwrap();
        assert!(cfg.validate_remote().is_ok());
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let cfg = AppConfig::from_lookup(lookup_from(&complete())).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("hospital"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn env_file_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labsync.env");
        std::fs::write(
            &path,
            "# comment\nLAB_LOGIN=hospital\nexport LAB_PASSWD=\"quoted value\"\n\nLAB_ENDPOINT='x'\n",
        )
        .unwrap();

        let parsed = read_env_file(&path).unwrap();
        assert_eq!(parsed.get("LAB_LOGIN").map(String::as_str), Some("hospital"));
        assert_eq!(parsed.get("LAB_PASSWD").map(String::as_str), Some("quoted value"));
        assert_eq!(parsed.get("LAB_ENDPOINT").map(String::as_str), Some("x"));
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn malformed_env_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.env");
        std::fs::write(&path, "LAB_LOGIN=hospital\nNOT A SETTING\n").unwrap();

        assert!(matches!(
            read_env_file(&path),
            Err(ConfigError::EnvFile { .. })
        ));
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let values = read_env_file(&dir.path().join("absent.env")).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn app_name_is_labsync() {
        assert_eq!(APP_NAME, "labsync");
    }

    #[test]
    fn db_path_under_app_data() {
        assert!(default_db_path().starts_with(app_data_dir()));
        assert!(default_db_path().ends_with("labsync.db"));
    }
}
