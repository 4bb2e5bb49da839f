//! Minimal XML-RPC codec: enough to call `wp.getPosts` and read its reply.

use std::fmt::Write as _;

use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Double(f64),
    /// Text as received. Kept as bytes so that a body which is not valid
    /// UTF-8 still reaches the archive unchanged.
    String(Vec<u8>),
    DateTime(String),
    Base64(String),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
    Nil,
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::String(s.as_bytes().to_vec())
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::String(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Value::Int(i) => Some(i.to_string()),
            Value::DateTime(s) | Value::Base64(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn encode(&self, out: &mut String) {
        out.push_str("<value>");
        match self {
            Value::Int(i) => {
                let _ = write!(out, "<int>{}</int>", i);
            }
            Value::Bool(b) => {
                let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
            }
            Value::Double(d) => {
                let _ = write!(out, "<double>{}</double>", d);
            }
            Value::String(b) => {
                let text = String::from_utf8_lossy(b);
                let _ = write!(out, "<string>{}</string>", escape(&*text));
            }
            Value::DateTime(s) => {
                let _ = write!(out, "<dateTime.iso8601>{}</dateTime.iso8601>", escape(s));
            }
            Value::Base64(s) => {
                let _ = write!(out, "<base64>{}</base64>", s);
            }
            Value::Array(items) => {
                out.push_str("<array><data>");
                for item in items {
                    item.encode(out);
                }
                out.push_str("</data></array>");
            }
            Value::Struct(members) => {
                out.push_str("<struct>");
                for (name, value) in members {
                    let _ = write!(out, "<member><name>{}</name>", escape(name));
                    value.encode(out);
                    out.push_str("</member>");
                }
                out.push_str("</struct>");
            }
            Value::Nil => out.push_str("<nil/>"),
        }
        out.push_str("</value>");
    }
}

pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall>");
    let _ = write!(out, "<methodName>{}</methodName><params>", escape(method));
    for p in params {
        out.push_str("<param>");
        p.encode(&mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>\n");
    out
}

/// Decode a `<methodResponse>`, turning `<fault>` into [`ApiError::Fault`].
pub fn decode_response(xml: &[u8]) -> Result<Value, ApiError> {
    let mut p = Parser::new(xml);
    p.expect_start("methodResponse")?;
    match p.next_tag()? {
        Ev::Start(t) if t == "params" => {
            p.expect_start("param")?;
            p.expect_start("value")?;
            let v = p.value_body()?;
            p.expect_end("param")?;
            p.expect_end("params")?;
            Ok(v)
        }
        Ev::Start(t) if t == "fault" => {
            p.expect_start("value")?;
            let v = p.value_body()?;
            let code = match v.member("faultCode") {
                Some(Value::Int(i)) => *i,
                _ => 0,
            };
            let message = v
                .member("faultString")
                .and_then(Value::as_text)
                .unwrap_or_default();
            Err(ApiError::Fault { code, message })
        }
        other => Err(unexpected("params or fault", &other)),
    }
}

#[derive(Debug)]
enum Ev {
    Start(String),
    End(String),
    Empty(String),
    Text(Vec<u8>),
    Eof,
}

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
    buf: Vec<u8>,
}

impl<'a> Parser<'a> {
    fn new(xml: &'a [u8]) -> Self {
        Parser {
            reader: Reader::from_reader(xml),
            buf: Vec::new(),
        }
    }

    fn next(&mut self) -> Result<Ev, ApiError> {
        loop {
            self.buf.clear();
            let ev = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => Ev::Start(name(e.name().as_ref())),
                Event::End(e) => Ev::End(name(e.name().as_ref())),
                Event::Empty(e) => Ev::Empty(name(e.name().as_ref())),
                Event::Text(e) => Ev::Text(text_bytes(&e.into_inner())?),
                Event::CData(e) => Ev::Text(e.into_inner().into_owned()),
                Event::Eof => Ev::Eof,
                _ => continue,
            };
            return Ok(ev);
        }
    }

    /// Next event that is not inter-element whitespace.
    fn next_tag(&mut self) -> Result<Ev, ApiError> {
        loop {
            match self.next()? {
                Ev::Text(t) if t.iter().all(u8::is_ascii_whitespace) => continue,
                ev => return Ok(ev),
            }
        }
    }

    fn expect_start(&mut self, tag: &str) -> Result<(), ApiError> {
        match self.next_tag()? {
            Ev::Start(t) if t == tag => Ok(()),
            other => Err(unexpected(&format!("<{}>", tag), &other)),
        }
    }

    fn expect_end(&mut self, tag: &str) -> Result<(), ApiError> {
        match self.next_tag()? {
            Ev::End(t) if t == tag => Ok(()),
            other => Err(unexpected(&format!("</{}>", tag), &other)),
        }
    }

    /// Parse what follows an opening `<value>`, through `</value>`.
    fn value_body(&mut self) -> Result<Value, ApiError> {
        let mut untyped = Vec::new();
        loop {
            match self.next()? {
                Ev::Text(t) => untyped.extend(t),
                // An untyped value is a string.
                Ev::End(t) if t == "value" => return Ok(Value::String(untyped)),
                Ev::Start(t) => {
                    let v = self.typed(&t)?;
                    self.expect_end("value")?;
                    return Ok(v);
                }
                Ev::Empty(t) => {
                    let v = scalar(&t, Vec::new())?;
                    self.expect_end("value")?;
                    return Ok(v);
                }
                other => return Err(unexpected("value content", &other)),
            }
        }
    }

    fn typed(&mut self, tag: &str) -> Result<Value, ApiError> {
        match tag {
            "array" => self.array(),
            "struct" => self.structure(),
            _ => {
                let text = self.text_until(tag)?;
                scalar(tag, text)
            }
        }
    }

    fn text_until(&mut self, tag: &str) -> Result<Vec<u8>, ApiError> {
        let mut text = Vec::new();
        loop {
            match self.next()? {
                Ev::Text(t) => text.extend(t),
                Ev::End(t) if t == tag => return Ok(text),
                other => return Err(unexpected(&format!("text of <{}>", tag), &other)),
            }
        }
    }

    fn array(&mut self) -> Result<Value, ApiError> {
        let mut items = Vec::new();
        match self.next_tag()? {
            Ev::Empty(t) if t == "data" => {}
            Ev::Start(t) if t == "data" => loop {
                match self.next_tag()? {
                    Ev::Start(t) if t == "value" => items.push(self.value_body()?),
                    Ev::Empty(t) if t == "value" => items.push(Value::String(Vec::new())),
                    Ev::End(t) if t == "data" => break,
                    other => return Err(unexpected("<value> in <data>", &other)),
                }
            },
            other => return Err(unexpected("<data>", &other)),
        }
        self.expect_end("array")?;
        Ok(Value::Array(items))
    }

    fn structure(&mut self) -> Result<Value, ApiError> {
        let mut members = Vec::new();
        loop {
            match self.next_tag()? {
                Ev::Start(t) if t == "member" => {
                    self.expect_start("name")?;
                    let key = String::from_utf8_lossy(&self.text_until("name")?).into_owned();
                    let value = match self.next_tag()? {
                        Ev::Start(t) if t == "value" => self.value_body()?,
                        Ev::Empty(t) if t == "value" => Value::String(Vec::new()),
                        other => return Err(unexpected("<value> in <member>", &other)),
                    };
                    self.expect_end("member")?;
                    members.push((key, value));
                }
                Ev::End(t) if t == "struct" => return Ok(Value::Struct(members)),
                other => return Err(unexpected("<member>", &other)),
            }
        }
    }
}

fn name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Unescape entities when the text is UTF-8; otherwise pass bytes through.
fn text_bytes(raw: &[u8]) -> Result<Vec<u8>, ApiError> {
    match std::str::from_utf8(raw) {
        Ok(s) => unescape(s)
            .map(|c| c.into_owned().into_bytes())
            .map_err(|e| ApiError::Xml(e.to_string())),
        Err(_) => Ok(raw.to_vec()),
    }
}

fn scalar(tag: &str, text: Vec<u8>) -> Result<Value, ApiError> {
    if tag == "string" {
        return Ok(Value::String(text));
    }
    let s = String::from_utf8_lossy(&text).trim().to_string();
    Ok(match tag {
        "int" | "i4" | "i8" => Value::Int(
            s.parse()
                .map_err(|_| ApiError::Xml(format!("bad <{}>: {}", tag, s)))?,
        ),
        "boolean" => Value::Bool(s == "1"),
        "double" => Value::Double(
            s.parse()
                .map_err(|_| ApiError::Xml(format!("bad <double>: {}", s)))?,
        ),
        "dateTime.iso8601" => Value::DateTime(s),
        "base64" => Value::Base64(s),
        "nil" => Value::Nil,
        other => return Err(ApiError::Xml(format!("unknown value type <{}>", other))),
    })
}

fn unexpected(wanted: &str, got: &Ev) -> ApiError {
    ApiError::Xml(format!("expected {}, found {:?}", wanted, got))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_get_posts_call() {
        let xml = encode_call(
            "wp.getPosts",
            &[
                Value::Int(0),
                Value::str("admin"),
                Value::str("p<w>&d"),
                Value::Struct(vec![("number".into(), Value::Int(600))]),
            ],
        );
        assert!(xml.contains("<methodName>wp.getPosts</methodName>"));
        assert!(xml.contains("<value><string>p&lt;w&gt;&amp;d</string></value>"));
        assert!(xml.contains(
            "<struct><member><name>number</name><value><int>600</int></value></member></struct>"
        ));
    }

    #[test]
    fn decodes_nested_response() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<methodResponse>
  <params>
    <param>
      <value>
      <array><data>
        <value><struct>
          <member><name>post_id</name><value><string>17</string></value></member>
          <member><name>post_title</name><value><string>Caf&#233; &amp; more</string></value></member>
          <member><name>post_date</name><value><dateTime.iso8601>20130104T12:30:00</dateTime.iso8601></value></member>
          <member><name>sticky</name><value><boolean>0</boolean></value></member>
          <member><name>plain</name><value>untyped  </value></member>
          <member><name>empty</name><value><string></string></value></member>
          <member><name>terms</name><value><array><data></data></array></value></member>
        </struct></value>
      </data></array>
      </value>
    </param>
  </params>
</methodResponse>"#;
        let v = decode_response(xml).unwrap();
        let Value::Array(items) = v else {
            panic!("expected array")
        };
        let post = &items[0];
        assert_eq!(post.member("post_id").and_then(Value::as_text).as_deref(), Some("17"));
        assert_eq!(
            post.member("post_title").and_then(Value::as_text).as_deref(),
            Some("Café & more")
        );
        assert_eq!(
            post.member("post_date"),
            Some(&Value::DateTime("20130104T12:30:00".into()))
        );
        assert_eq!(post.member("sticky"), Some(&Value::Bool(false)));
        assert_eq!(post.member("plain"), Some(&Value::str("untyped  ")));
        assert_eq!(post.member("empty"), Some(&Value::String(Vec::new())));
        assert_eq!(post.member("terms"), Some(&Value::Array(Vec::new())));
    }

    #[test]
    fn string_whitespace_is_preserved() {
        let xml = b"<methodResponse><params><param><value><string>\n  <p>x</p>\n</string></value></param></params></methodResponse>";
        // `<p>` inside <string> would be markup; bodies arrive escaped.
        assert!(decode_response(xml).is_err());

        let xml = b"<methodResponse><params><param><value><string>\n  &lt;p&gt;x&lt;/p&gt;\n</string></value></param></params></methodResponse>";
        assert_eq!(decode_response(xml).unwrap(), Value::str("\n  <p>x</p>\n"));
    }

    #[test]
    fn non_utf8_text_passes_through() {
        let xml = b"<methodResponse><params><param><value><string>caf\xe9</string></value></param></params></methodResponse>";
        assert_eq!(
            decode_response(xml).unwrap(),
            Value::String(b"caf\xe9".to_vec())
        );
    }

    #[test]
    fn fault_becomes_error() {
        let xml = br#"<methodResponse><fault><value><struct>
            <member><name>faultCode</name><value><int>403</int></value></member>
            <member><name>faultString</name><value><string>Incorrect username or password.</string></value></member>
        </struct></value></fault></methodResponse>"#;
        match decode_response(xml) {
            Err(ApiError::Fault { code, message }) => {
                assert_eq!(code, 403);
                assert_eq!(message, "Incorrect username or password.");
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn truncated_document_is_error() {
        assert!(decode_response(b"<methodResponse><params><param><value><array>").is_err());
    }
}
