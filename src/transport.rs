use crate::descriptor::CallDescriptor;
use crate::error::TransportError;
use crate::utils::qualified_service_name;
use crate::{Error, Fault, Value};

use tracing::debug;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A successfully decoded reply.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    value: Value,
    total_items: Option<u64>,
}

impl Response {
    pub fn new(value: Value) -> Self {
        Response {
            value,
            total_items: None,
        }
    }

    /// Records the size of the whole collection a paginated result was taken from.
    pub fn with_total_items(mut self, total_items: Option<u64>) -> Self {
        self.total_items = total_items;
        self
    }

    /// The decoded `<param>` of the `<methodResponse>`.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// The value of the `SoftLayer-Total-Items` response header, if the server sent one.
    pub fn total_items(&self) -> Option<u64> {
        self.total_items
    }
}

/// Request and response transport abstraction.
///
/// The `Transport` trait performs one call: it encodes the [`CallDescriptor`] (usually with
/// [`Request::from_call`]), exchanges it with the server and decodes the reply.
///
/// The most commonly used transport is HTTP: if the `http` feature is enabled (it is by default),
/// [`http::HttpTransport`] sends the request with reqwest.
///
/// You can implement this trait for your own types if you want to customize how calls are sent,
/// or to answer them without any network at all.
///
/// # Errors
///
/// A `<fault>` reply must be returned as [`Error::Fault`]. Failures to deliver the call or to
/// understand the reply are [`Error::Transport`].
///
/// [`Request::from_call`]: crate::Request::from_call
pub trait Transport {
    fn send(&self, call: &CallDescriptor) -> Result<Response, Error>;
}

impl<'a, T: Transport + ?Sized> Transport for &'a T {
    fn send(&self, call: &CallDescriptor) -> Result<Response, Error> {
        (**self).send(call)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, call: &CallDescriptor) -> Result<Response, Error> {
        (**self).send(call)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, call: &CallDescriptor) -> Result<Response, Error> {
        (**self).send(call)
    }
}

/// Asynchronous counterpart of [`Transport`].
#[cfg(feature = "async")]
pub trait AsyncTransport {
    fn send_async<'a>(
        &'a self,
        call: &'a CallDescriptor,
    ) -> futures::future::BoxFuture<'a, Result<Response, Error>>;
}

type Handler = Arc<dyn Fn(&CallDescriptor) -> Result<Response, Error> + Send + Sync>;

/// A transport answering from canned results, keyed by service and method.
///
/// Array results are paginated the way the API does it: a call with a pagination window receives
/// only that slice, together with the size of the whole array as total item count.
///
/// Calls to methods without a registered answer fail with a transport error.
#[derive(Clone, Default)]
pub struct FixtureTransport {
    handlers: HashMap<(String, String), Handler>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        FixtureTransport::default()
    }

    /// Answers calls of `service::method` with `value`.
    pub fn respond<V: Into<Value>>(self, service: &str, method: &str, value: V) -> Self {
        let value = value.into();
        self.respond_with(service, method, move |call| Ok(paginate(&value, call)))
    }

    /// Answers calls of `service::method` with a fault.
    pub fn fault(self, service: &str, method: &str, fault: Fault) -> Self {
        self.respond_with(service, method, move |_| Err(Error::Fault(fault.clone())))
    }

    /// Answers calls of `service::method` by running `handler`.
    pub fn respond_with<F>(mut self, service: &str, method: &str, handler: F) -> Self
    where
        F: Fn(&CallDescriptor) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.handlers.insert(
            (qualified_service_name(service), method.to_string()),
            Arc::new(handler),
        );
        self
    }
}

fn paginate(value: &Value, call: &CallDescriptor) -> Response {
    match (value, call.window()) {
        (Value::Array(items), Some(window)) => {
            let start = (window.offset() as usize).min(items.len());
            let end = (window.end() as usize).min(items.len());
            Response::new(Value::Array(items[start..end].to_vec()))
                .with_total_items(Some(items.len() as u64))
        }
        _ => Response::new(value.clone()),
    }
}

impl Transport for FixtureTransport {
    fn send(&self, call: &CallDescriptor) -> Result<Response, Error> {
        let key = (call.service().to_string(), call.method().to_string());
        match self.handlers.get(&key) {
            Some(handler) => handler(call),
            None => Err(Error::Transport(TransportError::Other(
                format!("no fixture for {}::{}", call.service(), call.method()).into(),
            ))),
        }
    }
}

#[cfg(feature = "async")]
impl AsyncTransport for FixtureTransport {
    fn send_async<'a>(
        &'a self,
        call: &'a CallDescriptor,
    ) -> futures::future::BoxFuture<'a, Result<Response, Error>> {
        Box::pin(futures::future::ready(self.send(call)))
    }
}

/// One call seen by a [`DebugTransport`].
#[derive(Clone, Debug)]
pub struct CallRecord {
    pub call: CallDescriptor,
    pub elapsed: Duration,
    /// The error message if the call failed.
    pub error: Option<String>,
}

/// Wraps a transport, logging and recording every call that passes through it.
#[derive(Debug, Default)]
pub struct DebugTransport<T> {
    inner: T,
    calls: Mutex<Vec<CallRecord>>,
}

impl<T> DebugTransport<T> {
    pub fn new(inner: T) -> Self {
        DebugTransport {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Returns the calls made so far, oldest first.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_call(&self) -> Option<CallRecord> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl<T: Transport> Transport for DebugTransport<T> {
    fn send(&self, call: &CallDescriptor) -> Result<Response, Error> {
        let start = Instant::now();
        let result = self.inner.send(call);
        let elapsed = start.elapsed();

        let error = result.as_ref().err().map(ToString::to_string);
        debug!(
            service = call.service(),
            method = call.method(),
            args = ?call.args(),
            elapsed_ms = elapsed.as_millis() as u64,
            error = error.as_deref().unwrap_or(""),
            "recorded call"
        );
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CallRecord {
                call: call.clone(),
                elapsed,
                error,
            });
        result
    }
}

/// Provides the reqwest-based HTTP transports.
///
/// This module will be disabled if neither the `http` nor the `async` feature is enabled.
///
/// Both transports post the encoded [`Request`](crate::Request) to the descriptor's URL and
/// decode the reply the same way:
///
/// ```notrust
/// check_response(status, content_type)?;
/// parse_response(body)? -> value or fault
/// ```
#[cfg(any(feature = "http", feature = "async"))]
pub mod http {
    use super::Response;
    use crate::descriptor::CallDescriptor;
    use crate::error::TransportError;
    use crate::parser::parse_response;
    use crate::{Error, Request};

    use reqwest::header::{HeaderMap, CONTENT_TYPE};
    use tracing::trace;

    use std::time::Duration;

    /// `User-Agent` sent unless configured otherwise.
    pub const DEFAULT_USER_AGENT: &str = concat!("softlayer-api-rust/", env!("CARGO_PKG_VERSION"));

    const TOTAL_ITEMS_HEADER: &str = "SoftLayer-Total-Items";

    /// Error bodies longer than this are cut off in [`TransportError::HttpStatus`].
    const MAX_ERROR_BODY: usize = 512;

    fn encode(call: &CallDescriptor) -> Result<Vec<u8>, Error> {
        let body = Request::from_call(call).to_xml().map_err(TransportError::Io)?;
        trace!(
            service = call.service(),
            method = call.method(),
            bytes = body.len(),
            "encoded request"
        );
        Ok(body)
    }

    fn http_error(err: reqwest::Error, timeout: Option<Duration>) -> Error {
        if err.is_timeout() {
            Error::Transport(TransportError::Timeout(timeout))
        } else {
            Error::Transport(TransportError::Http(err))
        }
    }

    fn total_items(headers: &HeaderMap) -> Option<u64> {
        headers
            .get(TOTAL_ITEMS_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    }

    /// Checks that the `Content-Type` of a response, if present, is `text/xml`.
    pub fn check_content_type(headers: &HeaderMap) -> Result<(), TransportError> {
        let content = match headers.get(CONTENT_TYPE) {
            Some(content) => content,
            // (we ignore this if the header is missing completely)
            None => return Ok(()),
        };
        let content = String::from_utf8_lossy(content.as_bytes()).into_owned();
        match content.parse::<mime::Mime>() {
            Ok(ref parsed) if parsed.type_() == mime::TEXT && parsed.subtype() == mime::XML => Ok(()),
            _ => Err(TransportError::ContentType(content)),
        }
    }

    /// Turns a received reply into a [`Response`] or an error.
    ///
    /// A `<fault>` is reported as [`Error::Fault`] whatever the status code. Any other reply with
    /// an error status becomes [`TransportError::HttpStatus`].
    pub fn decode_response(
        status: u16,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Response, Error> {
        let mut reader = body;
        let success = (200..300).contains(&status);

        if !success {
            if let Ok(Err(fault)) = parse_response(&mut reader) {
                return Err(Error::Fault(fault));
            }
            let mut text = String::from_utf8_lossy(body).into_owned();
            if text.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            return Err(Error::Transport(TransportError::HttpStatus { status, body: text }));
        }

        check_content_type(headers)?;
        match parse_response(&mut reader)? {
            Ok(value) => Ok(Response::new(value).with_total_items(total_items(headers))),
            Err(fault) => Err(Error::Fault(fault)),
        }
    }

    #[cfg(feature = "http")]
    pub use self::blocking::{HttpTransport, HttpTransportBuilder};

    #[cfg(feature = "http")]
    mod blocking {
        use super::{decode_response, encode, http_error, DEFAULT_USER_AGENT};
        use crate::descriptor::CallDescriptor;
        use crate::error::TransportError;
        use crate::transport::{Response, Transport};
        use crate::Error;

        use reqwest::blocking::Client;
        use reqwest::header::CONTENT_TYPE;
        use reqwest::Proxy;

        use std::time::Duration;

        /// Sends calls as blocking HTTP POST requests.
        ///
        /// The transport keeps one connection pool for all calls. The timeout is taken from each
        /// [`CallDescriptor`].
        #[derive(Clone, Debug)]
        pub struct HttpTransport {
            client: Client,
        }

        /// Configures an [`HttpTransport`].
        #[derive(Clone, Debug, Default)]
        pub struct HttpTransportBuilder {
            user_agent: Option<String>,
            proxy: Option<String>,
        }

        impl HttpTransportBuilder {
            pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
                self.user_agent = Some(user_agent.into());
                self
            }

            /// Routes all requests through the proxy at `url`.
            pub fn proxy<S: Into<String>>(mut self, url: S) -> Self {
                self.proxy = Some(url.into());
                self
            }

            pub fn build(self) -> Result<HttpTransport, Error> {
                let user_agent = self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
                let mut builder = Client::builder()
                    .user_agent(user_agent)
                    .timeout(None::<Duration>);
                if let Some(ref proxy) = self.proxy {
                    let proxy = Proxy::all(proxy.as_str()).map_err(TransportError::Http)?;
                    builder = builder.proxy(proxy);
                }
                let client = builder.build().map_err(TransportError::Http)?;
                Ok(HttpTransport { client })
            }
        }

        impl HttpTransport {
            /// Creates a transport with the default user agent and no proxy.
            pub fn new() -> Result<Self, Error> {
                HttpTransport::builder().build()
            }

            pub fn builder() -> HttpTransportBuilder {
                HttpTransportBuilder::default()
            }
        }

        impl Transport for HttpTransport {
            fn send(&self, call: &CallDescriptor) -> Result<Response, Error> {
                let body = encode(call)?;

                let mut builder = self
                    .client
                    .post(call.url())
                    .header(CONTENT_TYPE, "text/xml; charset=utf-8");
                for (name, value) in call.raw_headers() {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                if let Some(timeout) = call.timeout() {
                    builder = builder.timeout(timeout);
                }

                let response = builder
                    .body(body)
                    .send()
                    .map_err(|err| http_error(err, call.timeout()))?;
                let status = response.status().as_u16();
                let headers = response.headers().clone();
                let bytes = response
                    .bytes()
                    .map_err(|err| http_error(err, call.timeout()))?;

                decode_response(status, &headers, &bytes)
            }
        }
    }

    #[cfg(feature = "async")]
    pub use self::nonblocking::AsyncHttpTransport;

    #[cfg(feature = "async")]
    mod nonblocking {
        use super::{decode_response, encode, http_error, DEFAULT_USER_AGENT};
        use crate::descriptor::CallDescriptor;
        use crate::error::TransportError;
        use crate::transport::{AsyncTransport, Response};
        use crate::Error;

        use futures::future::BoxFuture;
        use reqwest::header::CONTENT_TYPE;
        use reqwest::{Client, Proxy};

        /// Sends calls as HTTP POST requests on the async reqwest client.
        #[derive(Clone, Debug)]
        pub struct AsyncHttpTransport {
            client: Client,
        }

        impl AsyncHttpTransport {
            pub fn new() -> Result<Self, Error> {
                AsyncHttpTransport::with_options(None, None)
            }

            /// Creates a transport with a custom user agent and/or proxy URL.
            pub fn with_options(user_agent: Option<&str>, proxy: Option<&str>) -> Result<Self, Error> {
                let mut builder = Client::builder().user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT));
                if let Some(proxy) = proxy {
                    builder = builder.proxy(Proxy::all(proxy).map_err(TransportError::Http)?);
                }
                let client = builder.build().map_err(TransportError::Http)?;
                Ok(AsyncHttpTransport { client })
            }

            async fn send_call(&self, call: &CallDescriptor) -> Result<Response, Error> {
                let body = encode(call)?;

                let mut builder = self
                    .client
                    .post(call.url())
                    .header(CONTENT_TYPE, "text/xml; charset=utf-8");
                for (name, value) in call.raw_headers() {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                if let Some(timeout) = call.timeout() {
                    builder = builder.timeout(timeout);
                }

                let response = builder
                    .body(body)
                    .send()
                    .await
                    .map_err(|err| http_error(err, call.timeout()))?;
                let status = response.status().as_u16();
                let headers = response.headers().clone();
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|err| http_error(err, call.timeout()))?;

                decode_response(status, &headers, &bytes)
            }
        }

        impl AsyncTransport for AsyncHttpTransport {
            fn send_async<'a>(
                &'a self,
                call: &'a CallDescriptor,
            ) -> BoxFuture<'a, Result<Response, Error>> {
                Box::pin(self.send_call(call))
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::options::CallOptions;

    fn call(service: &str, method: &str, options: &CallOptions) -> CallDescriptor {
        CallDescriptor::new(
            service,
            method,
            vec![],
            options,
            Credentials::new("user", "key"),
            "http://localhost",
        )
        .unwrap()
    }

    #[test]
    fn fixtures_paginate_arrays() {
        let items: Vec<Value> = (0..25).map(Value::from).collect();
        let transport = FixtureTransport::new().respond("Account", "getVirtualGuests", items);

        let page = transport
            .send(&call("SoftLayer_Account", "getVirtualGuests", &CallOptions::new().limit(10).offset(20)))
            .unwrap();
        assert_eq!(page.value(), &Value::Array((20..25).map(Value::from).collect()));
        assert_eq!(page.total_items(), Some(25));

        let all = transport
            .send(&call("SoftLayer_Account", "getVirtualGuests", &CallOptions::new()))
            .unwrap();
        assert_eq!(all.value().as_array().map(<[Value]>::len), Some(25));
        assert_eq!(all.total_items(), None);
    }

    #[test]
    fn fixtures_report_faults_and_unknown_methods() {
        let transport = FixtureTransport::new().fault(
            "SoftLayer_Account",
            "getObject",
            Fault::new("SoftLayer_Exception_NotReady", "try again"),
        );

        let err = transport
            .send(&call("SoftLayer_Account", "getObject", &CallOptions::new()))
            .unwrap_err();
        assert_eq!(err.fault().map(|f| f.string()), Some("try again"));

        let err = transport
            .send(&call("SoftLayer_Account", "getBalance", &CallOptions::new()))
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Other(_))));
    }

    #[test]
    fn debug_transport_records_calls() {
        let transport = DebugTransport::new(FixtureTransport::new().respond("Account", "getObject", 1));

        transport
            .send(&call("SoftLayer_Account", "getObject", &CallOptions::new().mask("id")))
            .unwrap();
        assert!(transport
            .send(&call("SoftLayer_Account", "getNothing", &CallOptions::new()))
            .is_err());

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].call.method(), "getObject");
        assert_eq!(calls[0].error, None);
        assert!(calls[1].error.is_some());

        transport.clear();
        assert!(transport.last_call().is_none());
    }

    #[test]
    fn shared_transports() {
        let transport = Arc::new(FixtureTransport::new().respond("Account", "getObject", "ok"));
        let boxed: Box<dyn Transport> = Box::new(transport.clone());
        let descriptor = call("SoftLayer_Account", "getObject", &CallOptions::new());

        assert_eq!(boxed.send(&descriptor).unwrap().into_value(), Value::from("ok"));
        assert_eq!((&transport).send(&descriptor).unwrap().into_value(), Value::from("ok"));
    }
}
