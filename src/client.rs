//! The API client and its builder.

use crate::config::{process_env, resolve_credentials, Credentials, EnvLookup, API_PUBLIC_ENDPOINT};
use crate::descriptor::CallDescriptor;
use crate::options::CallOptions;
use crate::service::{Pages, Service};
use crate::transport::Transport;
use crate::utils::qualified_service_name;
use crate::{Error, Value};

#[cfg(feature = "http")]
use crate::transport::http::HttpTransport;
#[cfg(feature = "async")]
use crate::transport::http::AsyncHttpTransport;

use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Configures a [`Client`].
///
/// Nothing is validated here: missing credentials are only reported when a call is made, so they
/// can still be supplied later through the environment or the client's setters.
#[derive(Clone)]
pub struct ClientBuilder {
    username: Option<String>,
    api_key: Option<String>,
    endpoint: String,
    timeout: Option<Duration>,
    proxy: Option<String>,
    user_agent: Option<String>,
    env: EnvLookup,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        ClientBuilder {
            username: None,
            api_key: None,
            endpoint: API_PUBLIC_ENDPOINT.to_string(),
            timeout: None,
            proxy: None,
            user_agent: None,
            env: process_env(),
        }
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("proxy", &self.proxy)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        ClientBuilder::default()
    }

    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the XML-RPC endpoint. Defaults to [`API_PUBLIC_ENDPOINT`].
    pub fn endpoint_url<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the timeout applied to every call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Routes requests through a proxy. Only used by [`build`](ClientBuilder::build).
    pub fn proxy<S: Into<String>>(mut self, url: S) -> Self {
        self.proxy = Some(url.into());
        self
    }

    /// Overrides the `User-Agent`. Only used by [`build`](ClientBuilder::build).
    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replaces the environment lookup used for missing credentials.
    pub fn env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = std::sync::Arc::new(lookup);
        self
    }

    /// Creates a client sending calls over blocking HTTP.
    #[cfg(feature = "http")]
    pub fn build(self) -> Result<Client<HttpTransport>, Error> {
        let mut transport = HttpTransport::builder();
        if let Some(ref user_agent) = self.user_agent {
            transport = transport.user_agent(user_agent.as_str());
        }
        if let Some(ref proxy) = self.proxy {
            transport = transport.proxy(proxy.as_str());
        }
        let transport = transport.build()?;
        Ok(self.build_with(transport))
    }

    /// Creates a client sending calls over async HTTP.
    #[cfg(feature = "async")]
    pub fn build_async(self) -> Result<Client<AsyncHttpTransport>, Error> {
        let transport =
            AsyncHttpTransport::with_options(self.user_agent.as_deref(), self.proxy.as_deref())?;
        Ok(self.build_with(transport))
    }

    /// Creates a client sending calls through `transport`.
    pub fn build_with<T>(self, transport: T) -> Client<T> {
        Client {
            transport,
            credentials: RwLock::new(ExplicitCredentials {
                username: self.username,
                api_key: self.api_key,
            }),
            endpoint: self.endpoint,
            timeout: self.timeout,
            env: self.env,
        }
    }
}

#[derive(Clone, Default)]
struct ExplicitCredentials {
    username: Option<String>,
    api_key: Option<String>,
}

/// A client of the API.
///
/// The client is long-lived and can be shared between threads. Its credentials may be changed at
/// any time; a change applies to calls made afterwards, never to a call already in flight.
///
/// ```no_run
/// use softlayer_api::{CallOptions, Client};
///
/// let client = Client::builder().username("user").api_key("key").build()?;
/// let account = client
///     .service("Account")
///     .get_object(&CallOptions::new().mask("id,companyName"))?;
/// println!("{:?}", account);
/// # Ok::<(), softlayer_api::Error>(())
/// ```
pub struct Client<T> {
    transport: T,
    credentials: RwLock<ExplicitCredentials>,
    endpoint: String,
    timeout: Option<Duration>,
    env: EnvLookup,
}

impl<T: fmt::Debug> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let credentials = self.credentials.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Client")
            .field("transport", &self.transport)
            .field("username", &credentials.username)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Client<()> {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<T> Client<T> {
    /// Returns a handle on a service. `"Account"` is short for `"SoftLayer_Account"`.
    pub fn service(&self, name: &str) -> Service<'_, T> {
        Service::new(self, qualified_service_name(name))
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sets the username used by subsequent calls.
    pub fn set_username<S: Into<String>>(&self, username: S) {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .username = Some(username.into());
    }

    /// Sets the API key used by subsequent calls.
    pub fn set_api_key<S: Into<String>>(&self, api_key: S) {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .api_key = Some(api_key.into());
    }

    /// Replaces both credentials at once, so no call sees one without the other.
    pub fn set_credentials(&self, credentials: Credentials) {
        let mut explicit = self.credentials.write().unwrap_or_else(PoisonError::into_inner);
        explicit.username = Some(credentials.username().to_string());
        explicit.api_key = Some(credentials.api_key().to_string());
    }

    /// Resolves the credentials a call made now would use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a credential is neither set on the client nor
    /// available from the environment.
    pub fn credentials(&self) -> Result<Credentials, Error> {
        let explicit = self
            .credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let lookup = &*self.env;
        Ok(resolve_credentials(
            explicit.username.as_deref(),
            explicit.api_key.as_deref(),
            lookup,
        )?)
    }

    pub(crate) fn describe(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
        options: &CallOptions,
    ) -> Result<CallDescriptor, Error> {
        let credentials = self.credentials()?;
        Ok(
            CallDescriptor::new(service, method, args, options, credentials, &self.endpoint)?
                .with_timeout(self.timeout),
        )
    }
}

impl<T: Transport> Client<T> {
    /// Calls `service::method`. Shorthand for `client.service(service).invoke(...)`.
    pub fn call(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
        options: &CallOptions,
    ) -> Result<Value, Error> {
        self.service(service).invoke(method, args, options)
    }

    /// Iterates over every item of a collection-returning method, one page at a time.
    pub fn iter_call(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
        options: &CallOptions,
    ) -> Pages<'_, T> {
        self.service(service).iter(method, args, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{API_KEY_ENV, USERNAME_ENV};
    use crate::error::ConfigError;
    use crate::transport::FixtureTransport;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn credentials_resolve_lazily() {
        let client = Client::builder().env(no_env).build_with(FixtureTransport::new());

        assert!(matches!(
            client.credentials(),
            Err(Error::Configuration(ConfigError::MissingUsername { .. }))
        ));

        client.set_username("user");
        client.set_api_key("key");
        assert_eq!(client.credentials().unwrap(), Credentials::new("user", "key"));

        client.set_credentials(Credentials::new("other", "key2"));
        assert_eq!(client.credentials().unwrap(), Credentials::new("other", "key2"));
    }

    #[test]
    fn environment_fills_missing_credentials() {
        let client = Client::builder()
            .username("explicit")
            .env(|name| match name {
                USERNAME_ENV => Some("env-user".to_string()),
                API_KEY_ENV => Some("env-key".to_string()),
                _ => None,
            })
            .build_with(FixtureTransport::new());

        assert_eq!(client.credentials().unwrap(), Credentials::new("explicit", "env-key"));
    }

    #[test]
    fn service_names_are_qualified() {
        let client = Client::builder().build_with(FixtureTransport::new());

        assert_eq!(client.service("Account").name(), "SoftLayer_Account");
        assert_eq!(client.service("SoftLayer_Account").name(), "SoftLayer_Account");
    }

    #[test]
    fn debug_hides_api_key() {
        let builder = Client::builder().username("user").api_key("s3cr3t");
        assert!(!format!("{:?}", builder).contains("s3cr3t"));

        let client = builder.build_with(());
        let shown = format!("{:?}", client);
        assert!(shown.contains("user"));
        assert!(!shown.contains("s3cr3t"));
        assert_eq!(client.endpoint(), API_PUBLIC_ENDPOINT);
    }

    #[test]
    fn descriptors_carry_client_settings() {
        let client = Client::builder()
            .username("user")
            .api_key("key")
            .endpoint_url("http://127.0.0.1:9999/")
            .timeout(Duration::from_secs(3))
            .build_with(FixtureTransport::new());
        let call = client
            .describe("SoftLayer_Account", "getObject", vec![], &CallOptions::new())
            .unwrap();

        assert_eq!(call.url(), "http://127.0.0.1:9999/SoftLayer_Account");
        assert_eq!(call.timeout(), Some(Duration::from_secs(3)));
    }
}
