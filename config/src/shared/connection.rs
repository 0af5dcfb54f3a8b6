use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::shared::ValidationError;

/// Session settings applied to every connection so that source and target agree on
/// timestamp rendering and encoding.
const DEFAULT_SESSION_OPTIONS: &[(&str, &str)] = &[
    ("datestyle", "ISO"),
    ("intervalstyle", "postgres"),
    ("extra_float_digits", "3"),
    ("client_encoding", "UTF8"),
    ("timezone", "UTC"),
];

/// Configuration for connecting to a Postgres database.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PgConnectionConfig {
    /// Hostname or IP address of the Postgres server.
    pub host: String,
    /// Port number on which the Postgres server is listening.
    pub port: u16,
    /// Name of the Postgres database to connect to.
    pub name: String,
    /// Username for authenticating with the Postgres server.
    pub username: String,
    /// Password for the specified user. Redacted in debug output.
    pub password: Option<SecretString>,
    /// TLS configuration for secure connections.
    #[serde(default = "TlsConfig::disabled")]
    pub tls: TlsConfig,
    /// Name reported to the server in `pg_stat_activity`.
    #[serde(default)]
    pub application_name: Option<String>,
}

impl PgConnectionConfig {
    /// Validates the connection settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tls.validate()
    }
}

/// TLS settings for secure Postgres connections.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TlsConfig {
    /// PEM-encoded trusted root certificates.
    pub trusted_root_certs: String,
    /// Whether TLS is enabled for the connection.
    pub enabled: bool,
}

impl TlsConfig {
    /// Returns a configuration with TLS turned off.
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: String::new(),
            enabled: false,
        }
    }

    /// Checks that certificates are present whenever TLS is enabled.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

/// A trait which converts the implementation into crate specific connect options.
///
/// Kept as a trait so that connection details stay centralized in [`PgConnectionConfig`]
/// regardless of which driver consumes them.
pub trait IntoConnectOptions<Output> {
    /// Creates connection options without selecting a database.
    fn without_db(&self) -> Output;

    /// Creates connection options for the configured database.
    fn with_db(&self) -> Output;
}

impl IntoConnectOptions<PgConnectOptions> for PgConnectionConfig {
    fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            PgSslMode::VerifyFull
        } else {
            PgSslMode::Prefer
        };

        let mut options = PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .username(&self.username)
            .port(self.port)
            .ssl_mode(ssl_mode)
            .options(DEFAULT_SESSION_OPTIONS.iter().copied());

        if self.tls.enabled {
            options = options.ssl_root_cert_from_pem(self.tls.trusted_root_certs.clone().into_bytes());
        }

        if let Some(application_name) = &self.application_name {
            options = options.application_name(application_name);
        }

        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        options
    }

    fn with_db(&self) -> PgConnectOptions {
        let options: PgConnectOptions = self.without_db();
        options.database(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_requires_certificates_when_enabled() {
        let tls = TlsConfig {
            trusted_root_certs: String::new(),
            enabled: true,
        };

        assert_eq!(tls.validate(), Err(ValidationError::MissingTrustedRootCerts));
        assert!(TlsConfig::disabled().validate().is_ok());
    }

    #[test]
    fn connection_config_defaults_tls_to_disabled() {
        let config: PgConnectionConfig = serde_json::from_str(
            r#"{"host":"localhost","port":5432,"name":"dw","username":"loader"}"#,
        )
        .unwrap();

        assert!(!config.tls.enabled);
        assert!(config.password.is_none());
        assert!(config.validate().is_ok());
    }
}
