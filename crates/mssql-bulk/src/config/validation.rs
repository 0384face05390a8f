//! Connection parameter validation.

use super::ConnectionParams;
use crate::error::{BulkError, Result};

/// Lowest accepted timeout in seconds.
const MIN_TIMEOUT_SECS: u32 = 30;

/// Validate connection parameters before any connection attempt.
///
/// Fails fast on the first invalid field, naming it in the error.
pub fn validate(params: &ConnectionParams) -> Result<()> {
    if params.server.trim().is_empty() {
        return Err(BulkError::Config("server must not be empty".into()));
    }
    if params.catalog.trim().is_empty() {
        return Err(BulkError::Config("catalog must not be empty".into()));
    }
    if params.username.trim().is_empty() {
        return Err(BulkError::Config("username must not be empty".into()));
    }
    if params.password.trim().is_empty() {
        return Err(BulkError::Config("password must not be empty".into()));
    }
    if params.timeout < MIN_TIMEOUT_SECS {
        return Err(BulkError::Config(format!(
            "timeout must be at least {} seconds, got {}",
            MIN_TIMEOUT_SECS, params.timeout
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PORT;

    fn valid_params() -> ConnectionParams {
        ConnectionParams {
            server: "localhost".to_string(),
            catalog: "sales".to_string(),
            username: "sa".to_string(),
            password: "password".to_string(),
            timeout: 60,
            port: DEFAULT_PORT,
        }
    }

    #[test]
    fn test_valid_params() {
        assert!(validate(&valid_params()).is_ok());
    }

    #[test]
    fn test_missing_server() {
        let mut params = valid_params();
        params.server = "".to_string();
        let err = validate(&params).unwrap_err();
        assert!(err.to_string().contains("server"));
    }

    #[test]
    fn test_missing_catalog_reported_first_when_server_present() {
        let mut params = valid_params();
        params.catalog = "  ".to_string();
        params.password = "".to_string();
        let err = validate(&params).unwrap_err();
        // catalog comes before password in the check order
        assert!(err.to_string().contains("catalog"));
    }

    #[test]
    fn test_timeout_below_minimum_names_timeout() {
        let mut params = valid_params();
        params.timeout = 10;
        let err = validate(&params).unwrap_err();
        assert!(err.to_string().contains("timeout"));
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn test_timeout_at_minimum_accepted() {
        let mut params = valid_params();
        params.timeout = 30;
        assert!(validate(&params).is_ok());
    }
}
