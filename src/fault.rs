use crate::Value;

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// The `faultCode` of a `<fault>`.
///
/// XML-RPC specifies an `<int>`, but the SoftLayer API reports the exception class name as a
/// `<string>` instead (for example `SoftLayer_Exception_ObjectNotFound`). Both are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FaultCode {
    Int(i32),
    Name(String),
}

impl FaultCode {
    fn to_value(&self) -> Value {
        match *self {
            FaultCode::Int(code) => Value::Int(code),
            FaultCode::Name(ref name) => Value::String(name.clone()),
        }
    }
}

impl Display for FaultCode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            FaultCode::Int(code) => write!(f, "{}", code),
            FaultCode::Name(ref name) => f.write_str(name),
        }
    }
}

impl From<i32> for FaultCode {
    fn from(code: i32) -> Self {
        FaultCode::Int(code)
    }
}

impl<'a> From<&'a str> for FaultCode {
    fn from(name: &'a str) -> Self {
        FaultCode::Name(name.to_string())
    }
}

impl From<String> for FaultCode {
    fn from(name: String) -> Self {
        FaultCode::Name(name)
    }
}

/// Classification of a fault by its code.
///
/// The negative codes are the [interoperability fault codes] shared by XML-RPC servers. Everything
/// else was assigned by the remote application.
///
/// [interoperability fault codes]: http://xmlrpc-epi.sourceforge.net/specs/rfc.fault_codes.php
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// -32700: the request was not well-formed XML.
    NotWellFormed,
    /// -32701
    UnsupportedEncoding,
    /// -32702
    InvalidCharacter,
    /// -32600: the request was not valid XML-RPC.
    InvalidXmlRpc,
    /// -32601
    MethodNotFound,
    /// -32602
    InvalidMethodParameters,
    /// -32603
    InternalXmlRpcError,
    /// -32500
    Application,
    /// -32400
    System,
    /// -32300
    Transport,
    /// The code was assigned by the remote application.
    Remote,
}

/// A `<fault>` response, indicating that a request failed.
///
/// The XML-RPC specification requires that a `<faultCode>` and `<faultString>` is returned in the
/// `<fault>` case, further describing the error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    code: FaultCode,
    string: String,
}

impl Fault {
    /// Creates a new `Fault` from an error code and a message.
    pub fn new<C: Into<FaultCode>, S: Into<String>>(code: C, string: S) -> Fault {
        Fault {
            code: code.into(),
            string: string.into(),
        }
    }

    /// Returns the fault code.
    ///
    /// The meaning of this code is not specified by XML-RPC and depends on the service you are
    /// using.
    pub fn code(&self) -> &FaultCode {
        &self.code
    }

    /// Returns the `faultString` sent by the server.
    pub fn string(&self) -> &str {
        &self.string
    }

    /// Classifies this fault by its code.
    pub fn kind(&self) -> FaultKind {
        match self.code {
            FaultCode::Int(-32700) => FaultKind::NotWellFormed,
            FaultCode::Int(-32701) => FaultKind::UnsupportedEncoding,
            FaultCode::Int(-32702) => FaultKind::InvalidCharacter,
            FaultCode::Int(-32600) => FaultKind::InvalidXmlRpc,
            FaultCode::Int(-32601) => FaultKind::MethodNotFound,
            FaultCode::Int(-32602) => FaultKind::InvalidMethodParameters,
            FaultCode::Int(-32603) => FaultKind::InternalXmlRpcError,
            FaultCode::Int(-32500) => FaultKind::Application,
            FaultCode::Int(-32400) => FaultKind::System,
            FaultCode::Int(-32300) => FaultKind::Transport,
            _ => FaultKind::Remote,
        }
    }

    /// Creates a `Fault` from a `Value`.
    ///
    /// The `Value` must be a `Value::Struct` with a `faultCode` (`<int>` or `<string>`) and a
    /// `faultString` (`<string>`) member. Additional members are ignored.
    ///
    /// Returns `None` if the value isn't a valid `Fault`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_struct()?;

        let code = match map.get("faultCode")? {
            Value::Int(code) => FaultCode::Int(*code),
            Value::Int64(code) => FaultCode::Int(i32::try_from(*code).ok()?),
            Value::String(name) => FaultCode::Name(name.clone()),
            _ => return None,
        };
        let string = map.get("faultString")?.as_str()?;

        Some(Fault::new(code, string))
    }

    /// Turns this `Fault` into an equivalent `Value`.
    ///
    /// The returned value can be parsed back into a `Fault` using `Fault::from_value` or returned
    /// as a `<fault>` error response by serializing it into a `<fault></fault>` tag.
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("faultCode".to_string(), self.code.to_value());
        map.insert("faultString".to_string(), Value::from(self.string()));

        Value::Struct(map)
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.string, self.code)
    }
}

impl Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_roundtrip() {
        let input = Fault::new(-123456, "The Bald Lazy House Jumps Over The Hyperactive Kitten");

        assert_eq!(Fault::from_value(&input.to_value()), Some(input));
    }

    #[test]
    fn named_fault_roundtrip() {
        let input = Fault::new("SoftLayer_Exception_ObjectNotFound", "Unable to find object with id of '1'.");

        assert_eq!(Fault::from_value(&input.to_value()), Some(input));
    }

    #[test]
    fn rejects_mistyped_members() {
        let bad_code: Value = vec![("faultCode", Value::Bool(true)), ("faultString", Value::from("x"))]
            .into_iter()
            .collect();
        let bad_string: Value = vec![("faultCode", Value::Int(1)), ("faultString", Value::Base64(vec![]))]
            .into_iter()
            .collect();

        assert_eq!(Fault::from_value(&bad_code), None);
        assert_eq!(Fault::from_value(&bad_string), None);
        assert_eq!(Fault::from_value(&Value::Int(1)), None);
    }

    #[test]
    fn classifies_codes() {
        assert_eq!(Fault::new(-32601, "no such method").kind(), FaultKind::MethodNotFound);
        assert_eq!(Fault::new(-32700, "parse error").kind(), FaultKind::NotWellFormed);
        assert_eq!(Fault::new("SoftLayer_Exception_Public", "oops").kind(), FaultKind::Remote);
        assert_eq!(Fault::new(4, "Too many parameters.").kind(), FaultKind::Remote);
    }

    #[test]
    fn displays_message_and_code() {
        let fault = Fault::new("SoftLayer_Exception_NotFound", "gone");
        assert_eq!(fault.to_string(), "gone (SoftLayer_Exception_NotFound)");
    }
}
