use secrecy::SecretString;
use serde::Deserialize;

/// Default page size used when enumerating cache keys.
const DEFAULT_SCAN_COUNT: u32 = 500;

/// Connection settings for the downstream Redis cache whose entries are purged after a run.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Host on which Redis is running.
    pub host: String,
    /// Port on which Redis is running.
    pub port: u16,
    /// Redis user name.
    #[serde(default)]
    pub username: Option<String>,
    /// Redis password, redacted in debug output.
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Number of keys requested per `SCAN` page.
    #[serde(default = "default_scan_count")]
    pub scan_count: u32,
}

fn default_scan_count() -> u32 {
    DEFAULT_SCAN_COUNT
}
