//! Defines error types used by this library.

use crate::Fault;

use xml::common::TextPosition;
use xml::reader::Error as XmlError;

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::time::Duration;

/// A call could not be completed.
///
/// Every failure of a service call surfaces as exactly one of these variants. A call either
/// returns a fully decoded result or fails; partial results are never returned.
#[derive(Debug)]
pub enum Error {
    /// The client is missing credentials (or has invalid ones) at the time of the call.
    Configuration(ConfigError),

    /// A call option (mask, filter, pagination window or header) is malformed.
    ///
    /// This is reported before anything is sent.
    InvalidArgument(String),

    /// The request could not be sent or the response could not be received or understood.
    Transport(TransportError),

    /// The server processed the call and answered with a `<fault>`.
    Fault(Fault),
}

impl Error {
    pub(crate) fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Returns the `Fault` sent by the server, if this error is one.
    pub fn fault(&self) -> Option<&Fault> {
        match *self {
            Error::Fault(ref fault) => Some(fault),
            _ => None,
        }
    }

    /// Returns `true` if the call failed because the per-call timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        match *self {
            Error::Transport(ref err) => err.is_timeout(),
            _ => false,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Configuration(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Transport(TransportError::Parse(e))
    }
}

impl From<Fault> for Error {
    fn from(f: Fault) -> Self {
        Error::Fault(f)
    }
}

impl Display for Error {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        match *self {
            Error::Configuration(ref err) => write!(fmt, "configuration error: {}", err),
            Error::InvalidArgument(ref msg) => write!(fmt, "invalid argument: {}", msg),
            Error::Transport(ref err) => write!(fmt, "transport error: {}", err),
            Error::Fault(ref fault) => write!(fmt, "server returned a fault: {}", fault),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::Configuration(ref err) => Some(err),
            Error::InvalidArgument(_) => None,
            Error::Transport(ref err) => Some(err),
            Error::Fault(ref fault) => Some(fault),
        }
    }
}

/// Credentials could not be resolved when a call was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No username was set on the client and the named environment variable is unset.
    MissingUsername { env_var: &'static str },
    /// No API key was set on the client and the named environment variable is unset.
    MissingApiKey { env_var: &'static str },
    /// A credential was present but empty.
    Empty(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        match *self {
            ConfigError::MissingUsername { env_var } => {
                write!(fmt, "no username configured (set one on the client or via {})", env_var)
            }
            ConfigError::MissingApiKey { env_var } => {
                write!(fmt, "no API key configured (set one on the client or via {})", env_var)
            }
            ConfigError::Empty(what) => write!(fmt, "{} must not be empty", what),
        }
    }
}

impl StdError for ConfigError {}

/// Lower-level failure while exchanging a call with the server.
///
/// This is either a network problem, or a problem with the server (maybe it's not implementing
/// XML-RPC correctly). If the server sends a valid response, this error will not occur.
#[derive(Debug)]
pub enum TransportError {
    /// An HTTP communication error occurred while sending the request or receiving the response.
    #[cfg(any(feature = "http", feature = "async"))]
    Http(reqwest::Error),

    /// The call did not complete within the configured timeout.
    Timeout(Option<Duration>),

    /// The HTTP status code did not indicate success and the body was not a `<fault>`.
    HttpStatus { status: u16, body: String },

    /// The server replied with something other than `text/xml`.
    ContentType(String),

    /// An I/O error occurred while writing the request or reading the response.
    Io(io::Error),

    /// The response could not be parsed. This can happen when the server doesn't correctly
    /// implement the XML-RPC spec.
    Parse(ParseError),

    /// Error reported by a custom `Transport` implementation.
    Other(Box<dyn StdError + Send + Sync>),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match *self {
            TransportError::Timeout(_) => true,
            #[cfg(any(feature = "http", feature = "async"))]
            TransportError::Http(ref err) => err.is_timeout(),
            _ => false,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}

impl From<ParseError> for TransportError {
    fn from(e: ParseError) -> Self {
        TransportError::Parse(e)
    }
}

impl Display for TransportError {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        match *self {
            #[cfg(any(feature = "http", feature = "async"))]
            TransportError::Http(ref err) => write!(fmt, "HTTP error: {}", err),
            TransportError::Timeout(Some(after)) => write!(fmt, "timed out after {:?}", after),
            TransportError::Timeout(None) => write!(fmt, "timed out"),
            TransportError::HttpStatus { status, ref body } if body.is_empty() => {
                write!(fmt, "HTTP status: {}", status)
            }
            TransportError::HttpStatus { status, ref body } => {
                write!(fmt, "HTTP status: {} ({})", status, body)
            }
            TransportError::ContentType(ref found) => {
                write!(fmt, "expected Content-Type 'text/xml', got '{}'", found)
            }
            TransportError::Io(ref err) => write!(fmt, "I/O error: {}", err),
            TransportError::Parse(ref err) => write!(fmt, "parse error: {}", err),
            TransportError::Other(ref err) => write!(fmt, "{}", err),
        }
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            #[cfg(any(feature = "http", feature = "async"))]
            TransportError::Http(ref err) => Some(err),
            TransportError::Io(ref err) => Some(err),
            TransportError::Parse(ref err) => Some(err),
            TransportError::Other(ref err) => Some(&**err),
            _ => None,
        }
    }
}

/// Describes possible error that can occur when parsing a response.
#[derive(Debug)]
pub enum ParseError {
    /// Error while parsing (malformed?) XML.
    XmlError(XmlError),

    /// Could not parse the given CDATA as XML-RPC value.
    ///
    /// For example, `<value><int>AAA</int></value>` describes an invalid value.
    InvalidValue {
        /// The type for which an invalid value was supplied (eg. `int` or `dateTime.iso8601`).
        for_type: &'static str,
        /// The value we encountered, as a string.
        found: String,
        /// The position of the invalid value inside the XML document.
        position: TextPosition,
    },

    /// Found an unexpected tag, attribute, etc.
    UnexpectedXml {
        /// A short description of the kind of data that was expected.
        expected: String,
        /// The position of the unexpected data inside the XML document.
        position: TextPosition,
    },

    /// A `<fault>` did not contain a struct with `faultCode` and `faultString`.
    MalformedFault {
        position: TextPosition,
    },
}

impl From<XmlError> for ParseError {
    fn from(e: XmlError) -> Self {
        ParseError::XmlError(e)
    }
}

impl Display for ParseError {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        match *self {
            ParseError::XmlError(ref err) => write!(fmt, "malformed XML: {}", err),
            ParseError::InvalidValue {
                for_type,
                ref found,
                ref position,
            } => write!(fmt, "invalid value for type '{}' at {}: {}", for_type, position, found),
            ParseError::UnexpectedXml {
                ref expected,
                ref position,
            } => write!(fmt, "unexpected XML at {} (expected {})", position, expected),
            ParseError::MalformedFault { ref position } => {
                write!(fmt, "malformed <fault> at {}", position)
            }
        }
    }
}

impl StdError for ParseError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            ParseError::XmlError(ref err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_is_not_a_transport_error() {
        let err = Error::from(Fault::new("SoftLayer_Exception_Public", "nope"));

        assert!(err.fault().is_some());
        assert!(!err.is_timeout());
        assert!(!matches!(err, Error::Transport(_)));
    }

    #[test]
    fn timeout_is_reported() {
        let err = Error::from(TransportError::Timeout(Some(Duration::from_secs(2))));

        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "transport error: timed out after 2s");
    }

    #[test]
    fn config_errors_name_the_variable() {
        let err = Error::from(ConfigError::MissingApiKey { env_var: "SL_API_KEY" });

        assert!(err.to_string().contains("SL_API_KEY"));
        assert!(err.source().is_some());
    }
}
