use crate::descriptor::CallDescriptor;
use crate::error::ParseError;
use crate::parser::parse_call;
use crate::utils::escape_xml;
use crate::Value;

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

/// An XML-RPC `<methodCall>`.
///
/// Calls to the API always carry the header struct as their first parameter, followed by the
/// method's own arguments. [`Request::from_call`] builds that layout from a [`CallDescriptor`].
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    name: String,
    params: Vec<Value>,
}

impl Request {
    /// Creates a new request to call a function named `name`.
    ///
    /// By default, no parameters are passed. Use the `arg` method to append them.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Request {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Appends a parameter.
    pub fn arg<T: Into<Value>>(mut self, value: T) -> Self {
        self.params.push(value.into());
        self
    }

    /// Builds the request for a call: the header struct followed by the positional arguments.
    pub fn from_call(call: &CallDescriptor) -> Self {
        let mut params = Vec::with_capacity(call.args().len() + 1);
        params.push(Value::Struct(call.wire_headers()));
        params.extend(call.args().iter().cloned());
        Request {
            name: call.method().to_string(),
            params,
        }
    }

    /// Reads a `<methodCall>` document.
    pub fn parse<R: Read>(mut reader: R) -> Result<Self, ParseError> {
        let (name, params) = parse_call(&mut reader)?;
        Ok(Request { name, params })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Returns the header struct, if the first parameter is one.
    pub fn headers(&self) -> Option<&BTreeMap<String, Value>> {
        self.params.first().and_then(Value::as_struct)
    }

    /// Returns the parameters following the header struct.
    pub fn args(&self) -> &[Value] {
        self.params.get(1..).unwrap_or(&[])
    }

    /// Formats this `Request` as a UTF-8 encoded XML document.
    ///
    /// # Errors
    ///
    /// Any errors reported by the writer will be propagated to the caller. If the writer never
    /// returns an error, neither will this method.
    pub fn write_as_xml<W: Write>(&self, fmt: &mut W) -> io::Result<()> {
        write!(fmt, r#"<?xml version="1.0" encoding="utf-8"?>"#)?;
        write!(fmt, r#"<methodCall>"#)?;
        write!(fmt, r#"<methodName>{}</methodName>"#, escape_xml(&self.name))?;
        write!(fmt, r#"<params>"#)?;
        for value in &self.params {
            write!(fmt, r#"<param>"#)?;
            value.write_as_xml(fmt)?;
            write!(fmt, r#"</param>"#)?;
        }
        write!(fmt, r#"</params>"#)?;
        write!(fmt, r#"</methodCall>"#)?;
        Ok(())
    }

    /// Encodes this `Request` into a new buffer.
    pub fn to_xml(&self) -> io::Result<Vec<u8>> {
        let mut body = Vec::new();
        self.write_as_xml(&mut body)?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::options::CallOptions;
    use std::str;

    #[test]
    fn escapes_method_names() {
        let output = Request::new("x<&x").to_xml().unwrap();

        assert!(
            str::from_utf8(&output)
                .unwrap()
                .contains("<methodName>x&lt;&amp;x</methodName>")
        );
    }

    #[test]
    fn headers_come_first() {
        let call = CallDescriptor::new(
            "SoftLayer_Virtual_Guest",
            "setTags",
            vec![Value::from("web,prod")],
            &CallOptions::new().id(42),
            Credentials::new("user", "key"),
            "http://localhost",
        )
        .unwrap();
        let request = Request::from_call(&call);

        assert_eq!(request.name(), "setTags");
        assert_eq!(request.params().len(), 2);
        assert_eq!(request.headers(), Some(&call.wire_headers()));
        assert_eq!(request.args(), &[Value::from("web,prod")][..]);
    }

    #[test]
    fn parses_what_it_writes() {
        let request = Request::new("getObject")
            .arg(vec![("authenticate", Value::empty_struct())].into_iter().collect::<Value>())
            .arg(5)
            .arg("a & b");
        let parsed = Request::parse(&request.to_xml().unwrap()[..]).unwrap();

        assert_eq!(parsed, request);
        assert_eq!(parsed.args(), &[Value::Int(5), Value::from("a & b")][..]);
    }

    #[test]
    fn no_params() {
        let request = Request::new("getObject");

        assert_eq!(request.headers(), None);
        assert!(request.args().is_empty());
    }
}
