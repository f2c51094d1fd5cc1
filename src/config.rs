//! Endpoint constants and credential resolution.

use crate::error::ConfigError;

use std::fmt;
use std::sync::Arc;

/// The public XML-RPC endpoint.
pub const API_PUBLIC_ENDPOINT: &str = "https://api.softlayer.com/xmlrpc/v3.1/";
/// The endpoint reachable from the private network.
pub const API_PRIVATE_ENDPOINT: &str = "https://api.service.softlayer.com/xmlrpc/v3.1/";

/// Environment variable consulted when no username was set on the client.
pub const USERNAME_ENV: &str = "SL_USERNAME";
/// Environment variable consulted when no API key was set on the client.
pub const API_KEY_ENV: &str = "SL_API_KEY";

/// Looks up an environment variable by name.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Returns a lookup reading the process environment.
pub fn process_env() -> EnvLookup {
    Arc::new(|name| std::env::var(name).ok())
}

/// A username/API key pair, as sent in the `authenticate` header.
///
/// The API key is never shown by the `Debug` implementation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    api_key: String,
}

impl Credentials {
    pub fn new<U: Into<String>, K: Into<String>>(username: U, api_key: K) -> Self {
        Credentials {
            username: username.into(),
            api_key: api_key.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Resolves the credentials for one call.
///
/// Explicitly configured values win; missing ones are read through `lookup` from
/// [`USERNAME_ENV`] and [`API_KEY_ENV`]. This runs when a call is prepared, not when the client
/// is built, so credentials set or exported after construction are honored.
pub fn resolve_credentials(
    username: Option<&str>,
    api_key: Option<&str>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Credentials, ConfigError> {
    let username = match username {
        Some(username) => username.to_string(),
        None => lookup(USERNAME_ENV).ok_or(ConfigError::MissingUsername { env_var: USERNAME_ENV })?,
    };
    let api_key = match api_key {
        Some(api_key) => api_key.to_string(),
        None => lookup(API_KEY_ENV).ok_or(ConfigError::MissingApiKey { env_var: API_KEY_ENV })?,
    };

    if username.trim().is_empty() {
        return Err(ConfigError::Empty("username"));
    }
    if api_key.trim().is_empty() {
        return Err(ConfigError::Empty("API key"));
    }

    Ok(Credentials { username, api_key })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn explicit_values_win() {
        let lookup = env(&[("SL_USERNAME", "env-user"), ("SL_API_KEY", "env-key")]);
        let creds = resolve_credentials(Some("user"), Some("key"), &lookup).unwrap();

        assert_eq!(creds, Credentials::new("user", "key"));
    }

    #[test]
    fn falls_back_to_environment() {
        let lookup = env(&[("SL_USERNAME", "env-user"), ("SL_API_KEY", "env-key")]);
        let creds = resolve_credentials(Some("user"), None, &lookup).unwrap();

        assert_eq!(creds.username(), "user");
        assert_eq!(creds.api_key(), "env-key");
    }

    #[test]
    fn missing_values_are_configuration_errors() {
        let lookup = env(&[]);

        assert_eq!(
            resolve_credentials(None, Some("key"), &lookup),
            Err(ConfigError::MissingUsername { env_var: USERNAME_ENV })
        );
        assert_eq!(
            resolve_credentials(Some("user"), None, &lookup),
            Err(ConfigError::MissingApiKey { env_var: API_KEY_ENV })
        );
        assert_eq!(
            resolve_credentials(Some(" "), Some("key"), &lookup),
            Err(ConfigError::Empty("username"))
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let creds = Credentials::new("user", "s3cr3t");
        let shown = format!("{:?}", creds);

        assert!(shown.contains("user"));
        assert!(!shown.contains("s3cr3t"));
    }
}
