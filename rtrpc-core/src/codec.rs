//! XML-RPC document rendering and text escaping
//!
//! The daemon accepts two request shapes:
//!
//! - a plain `methodCall` carrying one method and its params
//! - a `system.multicall` call whose single param is an array of
//!   `{methodName, params}` structs
//!
//! The exact byte layout (prolog, `\r\n` separators, tag order) matches what
//! the daemon has always been sent, so payload sizes computed here are the
//! sizes the daemon sees.
//!
//! Multicall documents are assembled incrementally by the client's batch
//! builder: [`MULTICALL_OPEN`], then any number of fragments from
//! [`render_multicall_member`], then [`MULTICALL_CLOSE`].
//!
//! # Examples
//!
//! ```rust
//! use rtrpc_core::{codec, Param};
//!
//! let doc = codec::render_call("d.name", &[Param::string("ABC123")]);
//! assert!(doc.contains("<methodName>d.name</methodName>"));
//! assert!(doc.contains("<value><string>ABC123</string></value>"));
//! ```

use crate::types::Param;

/// XML prolog prefixed to every request document
pub const XML_PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Method name used to aggregate calls
pub const MULTICALL_METHOD: &str = "system.multicall";

/// Substring whose presence in a response signals an RPC fault
pub const FAULT_MARKER: &str = "faultCode";

/// Everything in a multicall document before the first fragment
pub const MULTICALL_OPEN: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    "<methodCall><methodName>system.multicall</methodName>",
    "<params><param><value><array><data>"
);

/// Everything in a multicall document after the last fragment
pub const MULTICALL_CLOSE: &str = "\r\n</data></array></value></param></params></methodCall>";

/// Render a plain single-method call document
pub fn render_call(method: &str, params: &[Param]) -> String {
    let mut doc = String::with_capacity(128 + params.len() * 48);
    doc.push_str(XML_PROLOG);
    doc.push_str("<methodCall><methodName>");
    doc.push_str(method);
    doc.push_str("</methodName><params>\r\n");
    for param in params {
        doc.push_str("<param>");
        push_value(&mut doc, param);
        doc.push_str("</param>\r\n");
    }
    doc.push_str("</params></methodCall>");
    doc
}

/// Render one `{methodName, params}` struct of a multicall array
pub fn render_multicall_member(method: &str, params: &[Param]) -> String {
    let mut frag = String::with_capacity(160 + params.len() * 40);
    frag.push_str("\r\n<value><struct><member><name>methodName</name><value><string>");
    frag.push_str(method);
    frag.push_str("</string></value></member><member><name>params</name><value><array><data>");
    for param in params {
        frag.push_str("\r\n");
        push_value(&mut frag, param);
    }
    frag.push_str("\r\n</data></array></value></member></struct></value>");
    frag
}

/// Render a complete multicall document from pre-rendered fragments
pub fn render_multicall<S: AsRef<str>>(fragments: &[S]) -> String {
    let body: usize = fragments.iter().map(|f| f.as_ref().len()).sum();
    let mut doc = String::with_capacity(MULTICALL_OPEN.len() + body + MULTICALL_CLOSE.len());
    doc.push_str(MULTICALL_OPEN);
    for fragment in fragments {
        doc.push_str(fragment.as_ref());
    }
    doc.push_str(MULTICALL_CLOSE);
    doc
}

fn push_value(out: &mut String, param: &Param) {
    let tag = param.kind().tag();
    out.push_str("<value><");
    out.push_str(tag);
    out.push('>');
    out.push_str(param.rendered());
    out.push_str("</");
    out.push_str(tag);
    out.push_str("></value>");
}

/// Escape text for element content
///
/// Only `&`, `<` and `>` are replaced; quotes cannot terminate element
/// content and are left alone.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decode a captured value payload
///
/// Entities are decoded first, then backslash-escaped backslashes and
/// quotes are collapsed.
pub fn decode_text(raw: &str) -> String {
    unescape_backslashes(&decode_entities(raw))
}

/// Decode the named XML entities and numeric character references
///
/// Unknown or malformed entities are kept verbatim.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end))) {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

fn unescape_backslashes(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '\\' || next == '"' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamKind;

    #[test]
    fn test_render_call_layout() {
        let doc = render_call("d.start", &[Param::string("ABC123")]);
        assert_eq!(
            doc,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                "<methodCall><methodName>d.start</methodName><params>\r\n",
                "<param><value><string>ABC123</string></value></param>\r\n",
                "</params></methodCall>"
            )
        );
    }

    #[test]
    fn test_render_call_without_params() {
        let doc = render_call("system.client_version", &[]);
        assert!(doc.ends_with("<methodName>system.client_version</methodName><params>\r\n</params></methodCall>"));
    }

    #[test]
    fn test_render_multicall_member() {
        let frag = render_multicall_member(
            "d.name",
            &[Param::string("H1"), Param::with_kind(ParamKind::I4, 3)],
        );
        assert_eq!(
            frag,
            concat!(
                "\r\n<value><struct><member><name>methodName</name><value><string>d.name</string></value></member>",
                "<member><name>params</name><value><array><data>",
                "\r\n<value><string>H1</string></value>",
                "\r\n<value><i4>3</i4></value>",
                "\r\n</data></array></value></member></struct></value>"
            )
        );
    }

    #[test]
    fn test_render_multicall_wraps_fragments() {
        let doc = render_multicall(&["<a/>", "<b/>"]);
        assert!(doc.starts_with(MULTICALL_OPEN));
        assert!(doc.ends_with(MULTICALL_CLOSE));
        assert!(doc.contains("<a/><b/>"));
        assert!(doc.contains("<methodName>system.multicall</methodName>"));
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a&b<c>d\"e'"), "a&amp;b&lt;c&gt;d\"e'");
        assert_eq!(escape_text("plain"), "plain");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a&amp;b&lt;c&gt;&quot;&apos;"), "a&b<c>\"'");
        assert_eq!(decode_entities("&#65;&#x42;&#X43;"), "ABC");
        assert_eq!(decode_entities("AT&T &unknown; &"), "AT&T &unknown; &");
    }

    #[test]
    fn test_decode_text_collapses_backslashes() {
        assert_eq!(decode_text(r#"C:\\path \"q\" \n"#), r#"C:\path "q" \n"#);
        assert_eq!(decode_text("&quot;x&quot;"), "\"x\"");
    }

    #[test]
    fn test_escape_then_decode_restores_text() {
        let original = "Ubuntu <24.04> & friends";
        assert_eq!(decode_text(&escape_text(original)), original);
    }
}
