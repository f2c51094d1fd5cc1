//! XML-RPC response (and request) parser.

use crate::error::ParseError;
use crate::{Fault, Value};

use iso8601::datetime;
use xml::common::Position;
use xml::reader::{EventReader, XmlEvent};
use xml::ParserConfig;

use std::collections::BTreeMap;
use std::io::Read;

pub type ParseResult<T> = Result<T, ParseError>;

/// A decoded `<methodResponse>`: either the returned value or the `<fault>` sent instead.
pub type MethodResponse = Result<Value, Fault>;

pub struct Parser<'a, R: Read + 'a> {
    reader: EventReader<&'a mut R>,
}

impl<'a, R: Read> Parser<'a, R> {
    pub fn new(reader: &'a mut R) -> Self {
        let config = ParserConfig::new().cdata_to_characters(true);
        Parser {
            reader: EventReader::new_with_config(reader, config),
        }
    }

    /// Reads an `XmlEvent` from a reader, disposing of events that never carry data.
    ///
    /// When encountering a new element, returns an `Err` if it has any attributes.
    fn next_raw(&mut self) -> ParseResult<XmlEvent> {
        loop {
            let event = self.reader.next()?;
            match event {
                XmlEvent::StartDocument { .. }
                | XmlEvent::Comment(_)
                | XmlEvent::ProcessingInstruction { .. } => continue,
                XmlEvent::StartElement { ref attributes, ref name, .. } => {
                    if !attributes.is_empty() {
                        return self.expected(format!("tag <{}> without attributes", name.local_name));
                    }
                }
                _ => {}
            }

            return Ok(event);
        }
    }

    /// Like `next_raw`, but also skips whitespace between elements.
    fn pull_event(&mut self) -> ParseResult<XmlEvent> {
        loop {
            match self.next_raw()? {
                XmlEvent::Whitespace(_) => continue,
                event => return Ok(event),
            }
        }
    }

    /// Expects an opening tag like `<tag>` without attributes.
    fn expect_open(&mut self, tag: &str) -> ParseResult<()> {
        match self.pull_event()? {
            XmlEvent::StartElement { ref name, .. } if name.local_name == tag => Ok(()),
            _ => self.expected(format!("<{}>", tag)),
        }
    }

    /// Expects a closing tag like `</tag>`.
    fn expect_close(&mut self, tag: &str) -> ParseResult<()> {
        match self.pull_event()? {
            XmlEvent::EndElement { ref name } if name.local_name == tag => Ok(()),
            _ => self.expected(format!("</{}>", tag)),
        }
    }

    /// Reads the character data of an element whose opening tag was already consumed, up to and
    /// including its closing tag. An element without content yields an empty string.
    fn read_text(&mut self, tag: &str) -> ParseResult<String> {
        let mut text = String::new();
        loop {
            match self.next_raw()? {
                XmlEvent::Characters(s) | XmlEvent::Whitespace(s) | XmlEvent::CData(s) => {
                    text.push_str(&s)
                }
                XmlEvent::EndElement { ref name } if name.local_name == tag => return Ok(text),
                _ => return self.expected(format!("characters or </{}>", tag)),
            }
        }
    }

    /// Builds and returns an `Err(UnexpectedXml)`.
    fn expected<T, E: ToString>(&self, expected: E) -> ParseResult<T> {
        Err(ParseError::UnexpectedXml {
            expected: expected.to_string(),
            position: self.reader.position(),
        })
    }

    fn invalid_value(&self, for_type: &'static str, found: String) -> ParseError {
        ParseError::InvalidValue {
            for_type,
            found,
            position: self.reader.position(),
        }
    }

    pub fn parse_response(&mut self) -> ParseResult<MethodResponse> {
        // <methodResponse>
        self.expect_open("methodResponse")?;

        // <fault> / <params>
        let response = match self.pull_event()? {
            XmlEvent::StartElement { ref name, .. } if name.local_name == "fault" => {
                let value = self.parse_value()?;
                let fault = match Fault::from_value(&value) {
                    Some(fault) => fault,
                    None => {
                        return Err(ParseError::MalformedFault {
                            position: self.reader.position(),
                        })
                    }
                };
                self.expect_close("fault")?;
                Err(fault)
            }
            XmlEvent::StartElement { ref name, .. } if name.local_name == "params" => {
                match self.pull_event()? {
                    // void methods may answer with `<params/>`
                    XmlEvent::EndElement { ref name } if name.local_name == "params" => Ok(Value::Nil),
                    XmlEvent::StartElement { ref name, .. } if name.local_name == "param" => {
                        let value = self.parse_value()?;
                        self.expect_close("param")?;
                        self.expect_close("params")?;
                        Ok(value)
                    }
                    _ => return self.expected("<param> or </params>"),
                }
            }
            _ => return self.expected("<fault> or <params>"),
        };

        // </methodResponse>
        self.expect_close("methodResponse")?;

        Ok(response)
    }

    /// Parses a `<methodCall>`, returning the method name and its parameters.
    pub fn parse_call(&mut self) -> ParseResult<(String, Vec<Value>)> {
        self.expect_open("methodCall")?;
        self.expect_open("methodName")?;
        let method = self.read_text("methodName")?.trim().to_string();

        let mut params = Vec::new();
        match self.pull_event()? {
            XmlEvent::EndElement { ref name } if name.local_name == "methodCall" => {
                return Ok((method, params));
            }
            XmlEvent::StartElement { ref name, .. } if name.local_name == "params" => loop {
                match self.pull_event()? {
                    XmlEvent::EndElement { ref name } if name.local_name == "params" => break,
                    XmlEvent::StartElement { ref name, .. } if name.local_name == "param" => {
                        params.push(self.parse_value()?);
                        self.expect_close("param")?;
                    }
                    _ => return self.expected("<param> or </params>"),
                }
            },
            _ => return self.expected("<params> or </methodCall>"),
        }
        self.expect_close("methodCall")?;

        Ok((method, params))
    }

    pub fn parse_value(&mut self) -> ParseResult<Value> {
        // <value>
        self.expect_open("value")?;

        self.parse_value_body()
    }

    /// Parses the contents of a `<value>` whose opening tag was already consumed, including the
    /// closing `</value>`.
    fn parse_value_body(&mut self) -> ParseResult<Value> {
        let value = match self.pull_event()? {
            // untyped values are strings
            XmlEvent::EndElement { ref name } if name.local_name == "value" => {
                return Ok(Value::String(String::new()));
            }
            XmlEvent::Characters(string) | XmlEvent::CData(string) => {
                let rest = self.read_text("value")?;
                return Ok(Value::String(string + &rest));
            }
            XmlEvent::StartElement { name, .. } => self.parse_typed(&name.local_name)?,
            _ => return self.expected("type tag or characters"),
        };

        // </value>
        self.expect_close("value")?;

        Ok(value)
    }

    fn parse_typed(&mut self, tag: &str) -> ParseResult<Value> {
        let value = match tag {
            "struct" => {
                let mut members = BTreeMap::new();
                loop {
                    match self.pull_event()? {
                        XmlEvent::EndElement { ref name } if name.local_name == "struct" => break,
                        XmlEvent::StartElement { ref name, .. } if name.local_name == "member" => {
                            // <name>NAME</name>
                            self.expect_open("name")?;
                            let name = self.read_text("name")?;

                            let value = self.parse_value()?;

                            // </member>
                            self.expect_close("member")?;

                            members.insert(name, value);
                        }
                        _ => return self.expected("</struct> or <member>"),
                    }
                }

                Value::Struct(members)
            }
            "array" => {
                let mut elements = Vec::new();
                self.expect_open("data")?;
                loop {
                    match self.pull_event()? {
                        XmlEvent::EndElement { ref name } if name.local_name == "data" => break,
                        XmlEvent::StartElement { ref name, .. } if name.local_name == "value" => {
                            elements.push(self.parse_value_body()?);
                        }
                        _ => return self.expected("</data> or <value>"),
                    }
                }
                self.expect_close("array")?;
                Value::Array(elements)
            }
            "nil" => {
                self.expect_close("nil")?;
                Value::Nil
            }
            "string" => Value::String(self.read_text("string")?),
            "base64" => {
                let text = self.read_text("base64")?;
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                let data = base64::decode(&compact).map_err(|_| self.invalid_value("base64", text))?;
                Value::Base64(data)
            }
            "i4" | "int" => {
                let data = self.read_text(tag)?;
                let parsed = data.trim().parse::<i32>();
                Value::Int(parsed.map_err(|_| self.invalid_value("integer", data))?)
            }
            "i8" => {
                let data = self.read_text(tag)?;
                let parsed = data.trim().parse::<i64>();
                Value::Int64(parsed.map_err(|_| self.invalid_value("i8", data))?)
            }
            "boolean" => {
                let data = self.read_text(tag)?;
                match data.trim() {
                    "0" => Value::Bool(false),
                    "1" => Value::Bool(true),
                    _ => return Err(self.invalid_value("boolean", data)),
                }
            }
            "double" => {
                let data = self.read_text(tag)?;
                let parsed = data.trim().parse::<f64>();
                Value::Double(parsed.map_err(|_| self.invalid_value("double", data))?)
            }
            "dateTime.iso8601" => {
                let data = self.read_text(tag)?;
                let parsed = datetime(data.trim());
                Value::DateTime(parsed.map_err(|_| self.invalid_value("dateTime.iso8601", data))?)
            }
            _ => return self.expected("valid type tag or characters"),
        };

        Ok(value)
    }
}

/// Parses a response from an XML reader.
pub fn parse_response<R: Read>(reader: &mut R) -> ParseResult<MethodResponse> {
    Parser::new(reader).parse_response()
}

/// Parses a method call from an XML reader.
pub fn parse_call<R: Read>(reader: &mut R) -> ParseResult<(String, Vec<Value>)> {
    Parser::new(reader).parse_call()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fmt::Debug;

    fn read_response(xml: &str) -> ParseResult<MethodResponse> {
        parse_response(&mut xml.as_bytes())
    }

    fn read_value(xml: &str) -> ParseResult<Value> {
        Parser::new(&mut xml.as_bytes()).parse_value()
    }

    /// Test helper function that will panic with the `Ok` if a `Result` is not an `Err`.
    fn assert_err<T: Debug, E: Debug>(result: Result<T, E>) {
        if let Ok(t) = result {
            panic!("assert_err called on Ok value: {:?}", t);
        }
    }

    #[test]
    fn parses_response() {
        let response = read_response(r##"<?xml version="1.0"?>
<methodResponse>
    <params>
        <param>
            <value>teststring</value>
        </param>
    </params>
</methodResponse>
"##).unwrap();

        assert_eq!(response, Ok(Value::from("teststring")));
    }

    #[test]
    fn parses_void_response() {
        let response = read_response("<methodResponse><params/></methodResponse>").unwrap();

        assert_eq!(response, Ok(Value::Nil));
    }

    #[test]
    fn parses_fault() {
        let response = read_response(r##"<?xml version="1.0"?>
<methodResponse>
   <fault>
      <value>
         <struct>
            <member>
               <name>faultCode</name>
               <value><int>4</int></value>
               </member>
            <member>
               <name>faultString</name>
               <value><string>Too many parameters.</string></value>
               </member>
            </struct>
         </value>
      </fault>
   </methodResponse>"##).unwrap();

        assert_eq!(response, Err(Fault::new(4, "Too many parameters.")));
    }

    #[test]
    fn parses_named_fault() {
        let response = read_response(r##"<?xml version="1.0"?>
<methodResponse>
<fault>
 <value>
  <struct>
   <member>
    <name>faultCode</name>
    <value>
     <string>SoftLayer_Exception_ObjectNotFound</string>
    </value>
   </member>
   <member>
    <name>faultString</name>
    <value>
     <string>Unable to find object with id of '1234'.</string>
    </value>
   </member>
  </struct>
 </value>
</fault>
</methodResponse>"##).unwrap();

        let fault = response.unwrap_err();
        assert_eq!(fault.code(), &crate::FaultCode::from("SoftLayer_Exception_ObjectNotFound"));
        assert_eq!(fault.string(), "Unable to find object with id of '1234'.");
    }

    #[test]
    fn ignores_additional_fault_fields() {
        let response = read_response(r##"
<methodResponse>
   <fault>
      <value>
         <struct>
            <member><name>faultCode</name><value><int>4</int></value></member>
            <member><name>faultString</name><value><string>Too many parameters.</string></value></member>
            <member><name>unnecessaryParameter</name><value><string>x</string></value></member>
         </struct>
      </value>
   </fault>
</methodResponse>"##).unwrap();

        assert_eq!(response, Err(Fault::new(4, "Too many parameters.")));
    }

    #[test]
    fn rejects_invalid_faults() {
        // Make sure to reject type errors in <fault>s - They're specified to contain specifically
        // typed fields.
        let err = read_response(r##"
<methodResponse>
   <fault>
      <value>
         <struct>
            <member><name>faultCode</name><value><boolean>1</boolean></value></member>
            <member><name>faultString</name><value><string>Too many parameters.</string></value></member>
         </struct>
      </value>
   </fault>
</methodResponse>"##).unwrap_err();
        assert!(matches!(err, ParseError::MalformedFault { .. }));

        assert_err(read_response(r##"
<methodResponse>
   <fault>
      <value>
         <struct>
            <member><name>faultCode</name><value><int>4</int></value></member>
            <member><name>faultString</name><value><base64>AAAA</base64></value></member>
         </struct>
      </value>
   </fault>
</methodResponse>"##));
    }

    #[test]
    fn parses_string_value_with_whitespace() {
        assert_eq!(read_value("<value><string>  I'm a string!  </string></value>").unwrap(),
            Value::from("  I'm a string!  "));
        assert_eq!(read_value("<value><string>   </string></value>").unwrap(),
            Value::from("   "));
    }

    #[test]
    fn parses_64bit_int() {
        assert_eq!(read_value("<value><i8>12345</i8></value>").unwrap(), Value::Int64(12345));
        assert_eq!(read_value("<value><i8>-100100100100</i8></value>").unwrap(),
            Value::Int64(-100100100100));
    }

    #[test]
    fn parses_int_with_plus_sign() {
        // "You can include a plus or minus at the beginning of a string of numeric characters."
        assert_eq!(read_value("<value><int>+1234</int></value>").unwrap(), Value::Int(1234));
    }

    #[test]
    fn parses_date_values() {
        assert!(read_value("<value><dateTime.iso8601>2015-02-18T23:16:09Z</dateTime.iso8601></value>").is_ok());
        assert!(read_value("<value><dateTime.iso8601>19980717T14:08:55</dateTime.iso8601></value>").is_ok());
        assert_err(read_value("<value><dateTime.iso8601></dateTime.iso8601></value>"));
        assert_err(read_value("<value><dateTime.iso8601>ILLEGAL VALUE :(</dateTime.iso8601></value>"));
    }

    #[test]
    fn parses_array_values() {
        assert_eq!(read_value(r#"
                <value><array><data>
                    <value><i4>5</i4></value>
                    <value><string>a</string></value>
                </data></array></value>"#).unwrap(),
            Value::Array(vec![Value::Int(5), Value::from("a")]));
    }

    #[test]
    fn parses_nested_structs() {
        let value = read_value(r#"
            <value><struct>
                <member><name>id</name><value><int>7</int></value></member>
                <member><name>datacenter</name><value><struct>
                    <member><name>name</name><value>dal10</value></member>
                </struct></value></member>
            </struct></value>"#).unwrap();

        assert_eq!(value.get("id"), Some(&Value::Int(7)));
        assert_eq!(
            value.get("datacenter").and_then(|dc| dc.get("name")),
            Some(&Value::from("dal10"))
        );
    }

    #[test]
    fn parses_raw_value_as_string() {
        assert_eq!(read_value("<value>\t  I'm a string!  </value>").unwrap(),
            Value::from("\t  I'm a string!  "));
        assert_eq!(read_value("<value></value>").unwrap(), Value::from(""));
    }

    #[test]
    fn parses_nil_values() {
        assert_eq!(read_value("<value><nil/></value>").unwrap(), Value::Nil);
        assert_eq!(read_value("<value><nil></nil></value>").unwrap(), Value::Nil);
        assert_err(read_value("<value><nil>ILLEGAL</nil></value>"));
    }

    #[test]
    fn unescapes_values() {
        assert_eq!(read_value("<value><string>abc&lt;abc&amp;abc</string></value>").unwrap(),
            Value::from("abc<abc&abc"));
    }

    #[test]
    fn parses_empty_string() {
        assert_eq!(read_value("<value><string></string></value>").unwrap(), Value::from(""));
        assert_eq!(read_value("<value><string/></value>").unwrap(), Value::from(""));
    }

    #[test]
    fn parses_base64() {
        assert_eq!(read_value("<value><base64>aGVs\nbG8=</base64></value>").unwrap(),
            Value::Base64(b"hello".to_vec()));
        assert_eq!(read_value("<value><base64/></value>").unwrap(), Value::Base64(Vec::new()));
        assert_err(read_value("<value><base64>!!!</base64></value>"));
    }

    #[test]
    fn rejects_attributes() {
        assert_err(read_value(r#"<value name="ble">\t  I'm a string!  </value>"#));

        assert_err(read_response(r##"
<methodResponse invalid="1">
    <params><param><value>teststring</value></param></params>
</methodResponse>
"##));
        assert_err(read_response(r##"
<methodResponse>
    <params><param><value><int invalid="1">4</int></value></param></params>
</methodResponse>
"##));
    }

    #[test]
    fn error_messages() {
        fn errstr(value: &str) -> String {
            read_value(value).unwrap_err().to_string()
        }

        assert!(errstr(r#"<value name="ble">x</value>"#)
            .contains("(expected tag <value> without attributes)"));
        assert!(errstr(r#"<value><SURPRISE></SURPRISE></value>"#)
            .contains("(expected valid type tag or characters)"));
        assert!(errstr(r#"<value><int>bla</int></value>"#)
            .starts_with("invalid value for type 'integer'"));
    }

    #[test]
    fn parses_method_calls() {
        let (name, params) = parse_call(&mut &br#"<?xml version="1.0"?>
<methodCall>
  <methodName>getObject</methodName>
  <params>
    <param><value><struct></struct></value></param>
    <param><value><int>5</int></value></param>
  </params>
</methodCall>"#[..]).unwrap();

        assert_eq!(name, "getObject");
        assert_eq!(params, vec![Value::empty_struct(), Value::Int(5)]);

        let (name, params) = parse_call(&mut &b"<methodCall><methodName>ping</methodName></methodCall>"[..]).unwrap();
        assert_eq!(name, "ping");
        assert!(params.is_empty());
    }
}
