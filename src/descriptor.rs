//! The fully resolved description of a single call.

use crate::config::Credentials;
use crate::filter::Filter;
use crate::mask::Mask;
use crate::options::{CallOptions, PageWindow};
use crate::utils::service_url;
use crate::{Error, Value};

use tracing::warn;

use std::collections::BTreeMap;
use std::time::Duration;

const AUTHENTICATE: &str = "authenticate";
const OBJECT_MASK: &str = "SoftLayer_ObjectMask";
const RESULT_LIMIT: &str = "resultLimit";

fn init_parameters_header(service: &str) -> String {
    format!("{}InitParameters", service)
}

fn object_filter_header(service: &str) -> String {
    format!("{}ObjectFilter", service)
}

/// Everything needed to perform one call: target, arguments, validated options and the
/// credentials in effect when it was built.
///
/// A descriptor is created fresh for every call and cannot be changed afterwards. It is what a
/// [`Transport`](crate::Transport) receives.
#[derive(Clone, Debug, PartialEq)]
pub struct CallDescriptor {
    service: String,
    method: String,
    args: Vec<Value>,
    id: Option<Value>,
    mask: Option<Mask>,
    filter: Option<Filter>,
    window: Option<PageWindow>,
    headers: BTreeMap<String, Value>,
    raw_headers: BTreeMap<String, String>,
    credentials: Credentials,
    endpoint: String,
    timeout: Option<Duration>,
}

impl CallDescriptor {
    /// Validates `options` and builds the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the service or method name is empty, or if the id,
    /// mask, filter, pagination window or any header is malformed.
    pub fn new(
        service: &str,
        method: &str,
        args: Vec<Value>,
        options: &CallOptions,
        credentials: Credentials,
        endpoint: &str,
    ) -> Result<Self, Error> {
        check_name("service", service)?;
        check_name("method", method)?;

        let id = match options.get_id() {
            Some(id) => Some(check_id(id)?),
            None => None,
        };
        let mask = options.get_mask().map(|mask| mask.normalize()).transpose()?;
        let filter = options.get_filter().map(|filter| filter.normalize()).transpose()?;
        let window = PageWindow::from_parts(options.get_limit(), options.get_offset())?;
        if let Some(window) = window {
            if i32::try_from(window.end()).is_err() {
                return Err(Error::invalid_argument(format!(
                    "pagination window {}..{} is out of range",
                    window.offset(),
                    window.end()
                )));
            }
        }

        for name in options.get_headers().keys() {
            if name.trim().is_empty() {
                return Err(Error::invalid_argument("header names must not be empty"));
            }
        }
        for (name, value) in options.get_raw_headers() {
            check_raw_header(name, value)?;
        }

        let descriptor = CallDescriptor {
            service: service.to_string(),
            method: method.to_string(),
            args,
            id,
            mask,
            filter,
            window,
            headers: options.get_headers().clone(),
            raw_headers: options.get_raw_headers().clone(),
            credentials,
            endpoint: endpoint.to_string(),
            timeout: None,
        };
        for name in descriptor.builtin_headers().keys() {
            if descriptor.headers.contains_key(name) {
                warn!(header = %name, "caller header is overridden by a call option");
            }
        }
        Ok(descriptor)
    }

    /// Sets the timeout applied to this call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn window(&self) -> Option<PageWindow> {
        self.window
    }

    /// The caller-supplied XML-RPC headers of this call.
    pub fn headers(&self) -> &BTreeMap<String, Value> {
        &self.headers
    }

    /// The caller-supplied HTTP headers of this call.
    pub fn raw_headers(&self) -> &BTreeMap<String, String> {
        &self.raw_headers
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The URL the call is posted to: the endpoint followed by the service name.
    pub fn url(&self) -> String {
        service_url(&self.endpoint, &self.service)
    }

    fn builtin_headers(&self) -> BTreeMap<String, Value> {
        let mut headers = BTreeMap::new();
        headers.insert(
            AUTHENTICATE.to_string(),
            vec![
                ("username", self.credentials.username()),
                ("apiKey", self.credentials.api_key()),
            ]
            .into_iter()
            .collect(),
        );
        if let Some(ref id) = self.id {
            headers.insert(
                init_parameters_header(&self.service),
                vec![("id", id.clone())].into_iter().collect(),
            );
        }
        if let Some(ref mask) = self.mask {
            headers.insert(OBJECT_MASK.to_string(), mask.to_header());
        }
        if let Some(ref filter) = self.filter {
            headers.insert(object_filter_header(&self.service), filter.to_value());
        }
        if let Some(window) = self.window {
            headers.insert(RESULT_LIMIT.to_string(), window.to_header());
        }
        headers
    }

    /// The header struct sent as the first XML-RPC parameter.
    ///
    /// Caller headers come first; the headers derived from credentials, id, mask, filter and
    /// pagination replace caller headers of the same name.
    pub fn wire_headers(&self) -> BTreeMap<String, Value> {
        let mut headers = self.headers.clone();
        headers.extend(self.builtin_headers());
        headers
    }
}

fn check_name(what: &str, name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::invalid_argument(format!("{} name must not be empty", what)));
    }
    if name.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(Error::invalid_argument(format!("invalid {} name {:?}", what, name)));
    }
    Ok(())
}

fn check_id(id: &Value) -> Result<Value, Error> {
    match *id {
        Value::Int(_) | Value::Int64(_) => Ok(id.clone()),
        Value::String(ref s) if !s.trim().is_empty() => Ok(id.clone()),
        ref other => Err(Error::invalid_argument(format!(
            "object id must be an integer or a non-empty string, got {:?}",
            other
        ))),
    }
}

/// Characters allowed in an HTTP header name (RFC 7230 `tchar`).
fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn check_raw_header(name: &str, value: &str) -> Result<(), Error> {
    if name.is_empty() || !name.bytes().all(is_token_char) {
        return Err(Error::invalid_argument(format!("invalid HTTP header name {:?}", name)));
    }
    if !value.bytes().all(|b| b == b'\t' || (0x20..0x7f).contains(&b)) {
        return Err(Error::invalid_argument(format!("invalid value for HTTP header {:?}", name)));
    }
    Ok(())
}

/// The call options recovered from a header struct, as a server sees them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedHeaders {
    pub credentials: Option<Credentials>,
    pub id: Option<Value>,
    pub mask: Option<Mask>,
    pub filter: Option<Filter>,
    pub window: Option<PageWindow>,
    /// Members not produced by a call option.
    pub other: BTreeMap<String, Value>,
}

impl DecodedHeaders {
    /// Splits the header struct of a call to `service` back into call options.
    pub fn decode(service: &str, headers: &BTreeMap<String, Value>) -> Result<Self, Error> {
        let init_parameters = init_parameters_header(service);
        let object_filter = object_filter_header(service);
        let mut decoded = DecodedHeaders::default();

        for (name, value) in headers {
            if name == AUTHENTICATE {
                let field = |key: &str| value.get(key).and_then(Value::as_str);
                match (field("username"), field("apiKey")) {
                    (Some(username), Some(api_key)) => {
                        decoded.credentials = Some(Credentials::new(username, api_key))
                    }
                    _ => return Err(Error::invalid_argument("malformed authenticate header")),
                }
            } else if *name == init_parameters {
                let id = value
                    .get("id")
                    .ok_or_else(|| Error::invalid_argument("init parameters have no `id`"))?;
                decoded.id = Some(id.clone());
            } else if name == OBJECT_MASK {
                decoded.mask = Some(Mask::from_header(value)?);
            } else if *name == object_filter {
                decoded.filter = Some(Filter::from_value(value)?);
            } else if name == RESULT_LIMIT {
                decoded.window = Some(PageWindow::from_header(value)?);
            } else {
                decoded.other.insert(name.clone(), value.clone());
            }
        }
        Ok(decoded)
    }
}
