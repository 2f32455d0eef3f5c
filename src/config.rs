//! Server configuration.
//!
//! Options can come from the command line or from a `phiremock.yaml` file in
//! the configured directory; CLI values win, then the file, then defaults.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8086;
pub const DEFAULT_PROXY_TIMEOUT_MILLIS: u64 = 30_000;
pub const DEFAULT_SHUTDOWN_GRACE_MILLIS: u64 = 5_000;
pub const CONFIG_FILE_NAME: &str = "phiremock.yaml";

/// Options as they arrive from one source, all optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialConfig {
    pub ip: Option<IpAddr>,
    pub port: Option<u16>,
    pub expectations_dir: Option<PathBuf>,
    pub debug: Option<bool>,
    pub certificate: Option<PathBuf>,
    pub certificate_key: Option<PathBuf>,
    pub cert_passphrase: Option<String>,
    pub proxy_timeout_millis: Option<u64>,
    pub shutdown_grace_millis: Option<u64>,
    pub journal_capacity: Option<usize>,
}

impl PartialConfig {
    /// Field-wise precedence: values in `self` win over `fallback`.
    pub fn or(self, fallback: PartialConfig) -> PartialConfig {
        PartialConfig {
            ip: self.ip.or(fallback.ip),
            port: self.port.or(fallback.port),
            expectations_dir: self.expectations_dir.or(fallback.expectations_dir),
            debug: self.debug.or(fallback.debug),
            certificate: self.certificate.or(fallback.certificate),
            certificate_key: self.certificate_key.or(fallback.certificate_key),
            cert_passphrase: self.cert_passphrase.or(fallback.cert_passphrase),
            proxy_timeout_millis: self.proxy_timeout_millis.or(fallback.proxy_timeout_millis),
            shutdown_grace_millis: self
                .shutdown_grace_millis
                .or(fallback.shutdown_grace_millis),
            journal_capacity: self.journal_capacity.or(fallback.journal_capacity),
        }
    }

    /// Read `phiremock.yaml` from a directory, if present.
    pub fn from_config_dir(dir: &Path) -> Result<PartialConfig> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(PartialConfig::default());
        }
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))
    }
}

#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub certificate: PathBuf,
    pub certificate_key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub ip: IpAddr,
    pub port: u16,
    pub expectations_dir: Option<PathBuf>,
    pub debug: bool,
    pub tls: Option<TlsSettings>,
    pub proxy_timeout: Duration,
    pub shutdown_grace: Duration,
    /// 0 keeps the journal unbounded.
    pub journal_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            expectations_dir: None,
            debug: false,
            tls: None,
            proxy_timeout: Duration::from_millis(DEFAULT_PROXY_TIMEOUT_MILLIS),
            shutdown_grace: Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MILLIS),
            journal_capacity: 0,
        }
    }
}

impl ServerConfig {
    /// Apply defaults and validate the combined option set.
    pub fn resolve(partial: PartialConfig) -> Result<ServerConfig> {
        if partial.cert_passphrase.is_some() {
            // rustls cannot decrypt encrypted PEM keys.
            return Err(Error::Config(
                "cert-passphrase is not supported; provide a decrypted certificate key".into(),
            ));
        }
        let tls = match (partial.certificate, partial.certificate_key) {
            (Some(certificate), Some(certificate_key)) => Some(TlsSettings {
                certificate,
                certificate_key,
            }),
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "certificate and certificate-key must be provided together".into(),
                ))
            }
        };
        Ok(ServerConfig {
            ip: partial.ip.unwrap_or_else(|| IpAddr::from([0, 0, 0, 0])),
            port: partial.port.unwrap_or(DEFAULT_PORT),
            expectations_dir: partial.expectations_dir,
            debug: partial.debug.unwrap_or(false),
            tls,
            proxy_timeout: Duration::from_millis(
                partial
                    .proxy_timeout_millis
                    .unwrap_or(DEFAULT_PROXY_TIMEOUT_MILLIS),
            ),
            shutdown_grace: Duration::from_millis(
                partial
                    .shutdown_grace_millis
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_MILLIS),
            ),
            journal_capacity: partial.journal_capacity.unwrap_or(0),
        })
    }

    /// Loopback config on an ephemeral port, used by tests.
    pub fn ephemeral() -> ServerConfig {
        ServerConfig {
            ip: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            ..ServerConfig::default()
        }
    }
}
