//! Runtime configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LONG_POLL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SEND_RATE_PER_SECOND: u32 = 25;

/// Where the storage transport gets its bearer token from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriveCredentials {
    /// Pre-issued OAuth access token.
    AccessToken(String),
    /// Service-account key JSON, inline.
    ServiceAccountJson(String),
    /// Path to a service-account key JSON file.
    ServiceAccountFile(PathBuf),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub long_poll_timeout: Duration,
    pub send_rate_per_second: u32,
    pub telegram_token: String,
    pub telegram_api_url: String,
    pub drive_api_url: String,
    pub drive_folder_id: String,
    pub drive_credentials: DriveCredentials,
    pub alert_file_name: String,
    pub recipient_column: String,
    pub message_column: String,
    pub registry_path: PathBuf,
    pub marker_path: PathBuf,
    pub logs_path: PathBuf,
}

impl Config {
    /// Creates a config holding defaults only. Call [`Config::load`] afterwards.
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            long_poll_timeout: Duration::from_secs(DEFAULT_LONG_POLL_TIMEOUT_SECS),
            send_rate_per_second: DEFAULT_SEND_RATE_PER_SECOND,
            telegram_token: String::new(),
            telegram_api_url: "https://api.telegram.org".to_string(),
            drive_api_url: "https://www.googleapis.com".to_string(),
            drive_folder_id: String::new(),
            drive_credentials: DriveCredentials::ServiceAccountFile(PathBuf::from(
                "service_account.json",
            )),
            alert_file_name: "AlertaIAGRO.xlsx".to_string(),
            recipient_column: "Fone".to_string(),
            message_column: "Texto".to_string(),
            registry_path: PathBuf::from("data/subscribers.txt"),
            marker_path: PathBuf::from("data/last_file.txt"),
            logs_path: PathBuf::from("logs"),
        }
    }

    /// Loads values from the process environment.
    pub fn load(&mut self) -> Result<(), AppError> {
        self.load_from(|key| std::env::var(key).ok())
    }

    /// Loads values through `lookup`, keeping defaults for absent optional keys.
    pub fn load_from<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| AppError::MissingConfig {
                key: key.to_string(),
            })
        };

        self.telegram_token = require("TELEGRAM_TOKEN")?;
        self.drive_folder_id = require("GOOGLE_DRIVE_FOLDER_ID")?;

        self.drive_credentials = if let Some(token) = get("GOOGLE_ACCESS_TOKEN") {
            DriveCredentials::AccessToken(token)
        } else if let Some(json) = get("GOOGLE_SERVICE_ACCOUNT") {
            DriveCredentials::ServiceAccountJson(json)
        } else if let Some(path) = get("GOOGLE_SERVICE_ACCOUNT_FILE") {
            DriveCredentials::ServiceAccountFile(PathBuf::from(path))
        } else {
            self.drive_credentials.clone()
        };

        if let Some(v) = get("POLL_INTERVAL") {
            self.poll_interval = Duration::from_secs(parse_nonzero("POLL_INTERVAL", &v)?);
        }
        if let Some(v) = get("REQUEST_TIMEOUT") {
            self.request_timeout = Duration::from_secs(parse_nonzero("REQUEST_TIMEOUT", &v)?);
        }
        // Zero is valid here and means short polling.
        if let Some(v) = get("LONG_POLL_TIMEOUT") {
            self.long_poll_timeout = Duration::from_secs(parse_number("LONG_POLL_TIMEOUT", &v)?);
        }
        if let Some(v) = get("SEND_RATE_PER_SECOND") {
            self.send_rate_per_second = parse_nonzero("SEND_RATE_PER_SECOND", &v)?;
        }

        if let Some(v) = get("TELEGRAM_API_URL") {
            self.telegram_api_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("DRIVE_API_URL") {
            self.drive_api_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("ALERT_FILE_NAME") {
            self.alert_file_name = v;
        }
        if let Some(v) = get("RECIPIENT_COLUMN") {
            self.recipient_column = v;
        }
        if let Some(v) = get("MESSAGE_COLUMN") {
            self.message_column = v;
        }
        self.load_paths_from(lookup);

        Ok(())
    }

    /// Loads only the local file paths from the process environment.
    ///
    /// Enough for commands that inspect the stores without talking to any API.
    pub fn load_local(&mut self) {
        self.load_paths_from(|key| std::env::var(key).ok())
    }

    /// Loads the registry, marker and logs paths through `lookup`.
    pub fn load_paths_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("REGISTRY_PATH") {
            self.registry_path = PathBuf::from(v);
        }
        if let Some(v) = get("MARKER_PATH") {
            self.marker_path = PathBuf::from(v);
        }
        if let Some(v) = get("LOGS_PATH") {
            self.logs_path = PathBuf::from(v);
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
    value.trim().parse::<T>().map_err(|_| AppError::InvalidConfig {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_nonzero<T>(key: &str, value: &str) -> Result<T, AppError>
where
    T: std::str::FromStr + Default + PartialEq,
{
    let parsed: T = parse_number(key, value)?;
    if parsed == T::default() {
        return Err(AppError::InvalidConfig {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_required_and_defaults() {
        let mut config = Config::new();
        config
            .load_from(lookup(&[
                ("TELEGRAM_TOKEN", "123:abc"),
                ("GOOGLE_DRIVE_FOLDER_ID", "folder-1"),
            ]))
            .unwrap();

        assert_eq!(config.telegram_token, "123:abc");
        assert_eq!(config.drive_folder_id, "folder-1");
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.alert_file_name, "AlertaIAGRO.xlsx");
        assert_eq!(
            config.drive_credentials,
            DriveCredentials::ServiceAccountFile(PathBuf::from("service_account.json"))
        );
    }

    #[test]
    fn test_load_missing_token() {
        let mut config = Config::new();
        let err = config
            .load_from(lookup(&[("GOOGLE_DRIVE_FOLDER_ID", "folder-1")]))
            .unwrap_err();
        assert!(matches!(err, AppError::MissingConfig { key } if key == "TELEGRAM_TOKEN"));
    }

    #[test]
    fn test_load_invalid_interval() {
        let mut config = Config::new();
        let err = config
            .load_from(lookup(&[
                ("TELEGRAM_TOKEN", "t"),
                ("GOOGLE_DRIVE_FOLDER_ID", "f"),
                ("POLL_INTERVAL", "soon"),
            ]))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidConfig { key, .. } if key == "POLL_INTERVAL"));
    }

    #[test]
    fn test_load_rejects_zero_durations() {
        for key in ["POLL_INTERVAL", "REQUEST_TIMEOUT", "SEND_RATE_PER_SECOND"] {
            let mut config = Config::new();
            let err = config
                .load_from(lookup(&[
                    ("TELEGRAM_TOKEN", "t"),
                    ("GOOGLE_DRIVE_FOLDER_ID", "f"),
                    (key, "0"),
                ]))
                .unwrap_err();
            assert!(
                matches!(&err, AppError::InvalidConfig { key: k, value } if k == key && value == "0"),
                "{key} accepted zero: {err:?}"
            );
        }
    }

    #[test]
    fn test_load_accepts_zero_long_poll() {
        let mut config = Config::new();
        config
            .load_from(lookup(&[
                ("TELEGRAM_TOKEN", "t"),
                ("GOOGLE_DRIVE_FOLDER_ID", "f"),
                ("LONG_POLL_TIMEOUT", "0"),
            ]))
            .unwrap();
        assert_eq!(config.long_poll_timeout, Duration::ZERO);
    }

    #[test]
    fn test_load_paths_without_required_keys() {
        let mut config = Config::new();
        config.load_paths_from(lookup(&[
            ("REGISTRY_PATH", "/var/lib/relay/subs.txt"),
            ("MARKER_PATH", " "),
        ]));
        assert_eq!(config.registry_path, PathBuf::from("/var/lib/relay/subs.txt"));
        assert_eq!(config.marker_path, PathBuf::from("data/last_file.txt"));
        assert!(config.telegram_token.is_empty());
    }

    #[test]
    fn test_access_token_wins_over_service_account() {
        let mut config = Config::new();
        config
            .load_from(lookup(&[
                ("TELEGRAM_TOKEN", "t"),
                ("GOOGLE_DRIVE_FOLDER_ID", "f"),
                ("GOOGLE_SERVICE_ACCOUNT", "{}"),
                ("GOOGLE_ACCESS_TOKEN", "ya29.token"),
                ("DRIVE_API_URL", "http://localhost:1234/"),
            ]))
            .unwrap();
        assert_eq!(
            config.drive_credentials,
            DriveCredentials::AccessToken("ya29.token".to_string())
        );
        assert_eq!(config.drive_api_url, "http://localhost:1234");
    }

    #[test]
    #[serial_test::serial]
    fn test_load_from_process_env() {
        // SAFETY: serialized with other env-touching tests.
        unsafe {
            std::env::set_var("TELEGRAM_TOKEN", "env-token");
            std::env::set_var("GOOGLE_DRIVE_FOLDER_ID", "env-folder");
            std::env::set_var("SEND_RATE_PER_SECOND", "5");
        }

        let mut config = Config::new();
        let result = config.load();

        unsafe {
            std::env::remove_var("TELEGRAM_TOKEN");
            std::env::remove_var("GOOGLE_DRIVE_FOLDER_ID");
            std::env::remove_var("SEND_RATE_PER_SECOND");
        }

        result.unwrap();
        assert_eq!(config.telegram_token, "env-token");
        assert_eq!(config.drive_folder_id, "env-folder");
        assert_eq!(config.send_rate_per_second, 5);
    }
}
