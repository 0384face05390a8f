//! Connection parameter definitions and connection-string parsing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default port for SQL Server.
pub const DEFAULT_PORT: u16 = 1433;

/// Database endpoint parameters for one physical connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Server host (connection-string key `data source`).
    pub server: String,

    /// Database name (connection-string key `initial catalog`).
    pub catalog: String,

    /// Username (connection-string key `user id`).
    pub username: String,

    /// Password (connection-string key `password`).
    pub password: String,

    /// Command and bulk-copy timeout in seconds. Must be at least 30.
    #[serde(default = "default_timeout")]
    pub timeout: u32,

    /// Server port (default: 1433).
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ConnectionParams {
    /// Parse a `;`-separated `key=value` connection string.
    ///
    /// Keys are case-insensitive. The `provider connection string` key wraps
    /// a nested, quoted connection string; its first inner pair is unwrapped
    /// by stripping the quotes and shifting the split.
    pub fn from_connection_string(raw: &str, timeout: u32) -> Self {
        let mut config: HashMap<String, String> = HashMap::new();

        for item in raw.split(';') {
            let parts: Vec<&str> = item.split('=').collect();
            if parts.len() < 2 {
                continue;
            }
            if parts[0].trim().eq_ignore_ascii_case("provider connection string")
                && parts.len() > 2
            {
                config.insert(
                    parts[1].replace('"', "").trim().to_lowercase(),
                    parts[2].trim().to_string(),
                );
            } else {
                config.insert(
                    parts[0].trim().to_lowercase(),
                    parts[1].trim().to_string(),
                );
            }
        }

        let take = |key: &str| config.get(key).cloned().unwrap_or_default();

        Self {
            server: take("data source"),
            catalog: take("initial catalog"),
            username: take("user id"),
            password: take("password"),
            timeout,
            port: DEFAULT_PORT,
        }
    }

    /// Clear credentials so a disposed manager does not retain secrets.
    pub(crate) fn clear(&mut self) {
        self.server.clear();
        self.catalog.clear();
        self.username.clear();
        self.password.clear();
        self.timeout = 0;
    }
}

// Manual Debug so passwords never reach logs.
impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("server", &self.server)
            .field("catalog", &self.catalog)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("port", &self.port)
            .finish()
    }
}

fn default_timeout() -> u32 {
    20000
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_connection_string() {
        let params = ConnectionParams::from_connection_string(
            "Data Source=db01;Initial Catalog=sales;User Id=app;Password=secret",
            60,
        );
        assert_eq!(params.server, "db01");
        assert_eq!(params.catalog, "sales");
        assert_eq!(params.username, "app");
        assert_eq!(params.password, "secret");
        assert_eq!(params.timeout, 60);
        assert_eq!(params.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let params = ConnectionParams::from_connection_string(
            "DATA SOURCE=db01;INITIAL CATALOG=sales;USER ID=app;PASSWORD=x",
            30,
        );
        assert_eq!(params.server, "db01");
        assert_eq!(params.catalog, "sales");
    }

    #[test]
    fn test_parse_provider_connection_string_fallback() {
        // The nested quoted pair shifts one position right of the outer key.
        let params = ConnectionParams::from_connection_string(
            "metadata=res://*;provider connection string=\"data source\"=db02;Initial Catalog=ops;User Id=svc;Password=p",
            30,
        );
        assert_eq!(params.server, "db02");
        assert_eq!(params.catalog, "ops");
    }

    #[test]
    fn test_malformed_pairs_are_skipped() {
        let params = ConnectionParams::from_connection_string(
            "garbage;Data Source=db01;Initial Catalog=sales;User Id=u;Password=p",
            30,
        );
        assert_eq!(params.server, "db01");
    }

    #[test]
    fn test_debug_redacts_password() {
        let params = ConnectionParams::from_connection_string(
            "Data Source=db;Initial Catalog=c;User Id=u;Password=super_secret_123",
            30,
        );
        let debug_output = format!("{:?}", params);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_123"));
    }
}
