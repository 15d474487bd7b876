use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

pub const DEFAULT_ADMIN_PASSWORD: &str = "tempo-admin";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentStoreKind {
    #[default]
    Filesystem,
    S3,
    Memory,
}

impl std::str::FromStr for ContentStoreKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FILESYSTEM" => Ok(Self::Filesystem),
            "S3" => Ok(Self::S3),
            "MEMORY" => Ok(Self::Memory),
            other => Err(AppError::BadRequest(format!("unknown content store `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeletionMode {
    #[default]
    InProcess,
    Loopback,
}

impl std::str::FromStr for DeletionMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "IN_PROCESS" => Ok(Self::InProcess),
            "LOOPBACK" => Ok(Self::Loopback),
            other => Err(AppError::BadRequest(format!("unknown deletion mode `{other}`"))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub content_store: ContentStoreKind,
    pub content_root: PathBuf,
    pub s3: S3Settings,
    pub deletion_mode: DeletionMode,
    pub admin_password: String,
    pub eviction_interval: Duration,
    pub store_timeout: Duration,
    pub delete_timeout: Duration,
    pub download_cleanup_delay: Duration,
    pub shutdown_timeout: Duration,
    pub shutdown_warning: Duration,
    pub eviction_grace: Duration,
    /// `None` retries a failing eviction forever.
    pub max_eviction_attempts: Option<u32>,
    pub max_upload_bytes: usize,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Base URL the relay can reach itself on, used by loopback deletion.
    pub fn self_url(&self) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
            host => host,
        };
        format!("http://{}:{}", host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            upload_dir: PathBuf::from("./uploads"),
            content_store: ContentStoreKind::Filesystem,
            content_root: PathBuf::from("./content"),
            s3: S3Settings {
                bucket: "tempo".to_string(),
                endpoint: None,
                region: "us-east-1".to_string(),
            },
            deletion_mode: DeletionMode::InProcess,
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            eviction_interval: Duration::from_secs(30 * 60),
            store_timeout: Duration::from_secs(10),
            delete_timeout: Duration::from_secs(10),
            download_cleanup_delay: Duration::from_secs(20),
            shutdown_timeout: Duration::from_secs(10),
            shutdown_warning: Duration::from_secs(7),
            eviction_grace: Duration::from_secs(30),
            max_eviction_attempts: None,
            max_upload_bytes: 1 << 30,
            log_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_and_deletion_mode_names() {
        assert_eq!("s3".parse::<ContentStoreKind>().unwrap(), ContentStoreKind::S3);
        assert_eq!(
            "FILESYSTEM".parse::<ContentStoreKind>().unwrap(),
            ContentStoreKind::Filesystem
        );
        assert_eq!("loopback".parse::<DeletionMode>().unwrap(), DeletionMode::Loopback);
        assert!("ftp".parse::<ContentStoreKind>().is_err());
        assert!("remote".parse::<DeletionMode>().is_err());
    }

    #[test]
    fn self_url_replaces_wildcard_host() {
        let config = Config::default();
        assert_eq!(config.self_url(), "http://127.0.0.1:8080");

        let config = Config {
            host: "relay.internal".to_string(),
            port: 9000,
            ..Config::default()
        };
        assert_eq!(config.self_url(), "http://relay.internal:9000");
    }
}
