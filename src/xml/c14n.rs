//! Canonical XML (inclusive C14N 1.0, without comments) for digesting.
//!
//! Covers what SRI documents and XAdES fragments use: element order is kept,
//! the XML declaration, comments, processing instructions and whitespace-only
//! text between elements are dropped, empty elements are expanded, namespace
//! declarations come first (sorted by prefix) followed by the attributes
//! (unprefixed before prefixed, each sorted by name), and redundant namespace
//! redeclarations are removed. Text and attribute values are re-escaped with
//! the C14N rules.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::core::SriError;

/// Canonicalize a complete document.
pub fn canonicalize(xml: &str) -> Result<String, SriError> {
    canonicalize_subtree(xml, &[])
}

/// Canonicalize an element as if it were cut out of a larger document.
///
/// `inherited` lists the namespace declarations in scope at the element's
/// position (e.g. `("xmlns:ds", DS_NS)`); inclusive C14N renders them on the
/// apex element unless it redeclares the prefix itself.
pub fn canonicalize_subtree(xml: &str, inherited: &[(&str, &str)]) -> Result<String, SriError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut out = String::with_capacity(xml.len());
    let mut rendered: Vec<Vec<(String, String)>> = Vec::new();
    let mut pending: Vec<(String, String)> = inherited
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(SriError::Xml(format!(
                    "parse error at position {}: {e}",
                    reader.buffer_position()
                )));
            }
        };
        match event {
            Event::Start(e) => {
                let decls = write_start(&mut out, &e, &rendered, std::mem::take(&mut pending))?;
                rendered.push(decls);
            }
            Event::Empty(e) => {
                write_start(&mut out, &e, &rendered, std::mem::take(&mut pending))?;
                write_end(&mut out, e.name().as_ref())?;
            }
            Event::End(e) => {
                write_end(&mut out, e.name().as_ref())?;
                rendered.pop();
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|err| SriError::Xml(format!("bad text content: {err}")))?;
                if text.trim().is_empty() {
                    continue;
                }
                escape_text(&mut out, &text.replace("\r\n", "\n"));
            }
            Event::CData(e) => {
                let raw = e.into_inner();
                let text = std::str::from_utf8(&raw)
                    .map_err(|err| SriError::Xml(format!("CDATA is not UTF-8: {err}")))?;
                escape_text(&mut out, text);
            }
            Event::Eof => break,
            // declaration, comments, processing instructions, doctype
            _ => {}
        }
    }

    if !rendered.is_empty() {
        return Err(SriError::Xml("unexpected end of document".into()));
    }
    Ok(out)
}

fn utf8(bytes: &[u8]) -> Result<&str, SriError> {
    std::str::from_utf8(bytes).map_err(|e| SriError::Xml(format!("name is not UTF-8: {e}")))
}

/// Write a start tag and return the namespace declarations it rendered.
fn write_start(
    out: &mut String,
    e: &BytesStart<'_>,
    rendered: &[Vec<(String, String)>],
    inherited: Vec<(String, String)>,
) -> Result<Vec<(String, String)>, SriError> {
    let mut decls: Vec<(String, String)> = Vec::new();
    let mut attrs: Vec<(String, String)> = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| SriError::Xml(format!("bad attribute: {err}")))?;
        let key = utf8(attr.key.as_ref())?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| SriError::Xml(format!("bad attribute value: {err}")))?
            .into_owned();
        if key == "xmlns" || key.starts_with("xmlns:") {
            decls.push((key, value));
        } else {
            attrs.push((key, value));
        }
    }
    for (k, v) in inherited {
        if !decls.iter().any(|(dk, _)| *dk == k) {
            decls.push((k, v));
        }
    }

    decls.retain(|(k, v)| !already_rendered(rendered, k, v));
    decls.sort();
    attrs.sort_by(|a, b| (a.0.contains(':'), &a.0).cmp(&(b.0.contains(':'), &b.0)));

    out.push('<');
    out.push_str(utf8(e.name().as_ref())?);
    for (k, v) in decls.iter().chain(attrs.iter()) {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        escape_attr(out, v);
        out.push('"');
    }
    out.push('>');
    Ok(decls)
}

fn write_end(out: &mut String, name: &[u8]) -> Result<(), SriError> {
    out.push_str("</");
    out.push_str(utf8(name)?);
    out.push('>');
    Ok(())
}

/// Whether the nearest output ancestor already renders this exact binding.
fn already_rendered(rendered: &[Vec<(String, String)>], key: &str, value: &str) -> bool {
    for level in rendered.iter().rev() {
        if let Some((_, v)) = level.iter().find(|(k, _)| k == key) {
            return v == value;
        }
    }
    key == "xmlns" && value.is_empty()
}

fn escape_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_decl_comments_and_whitespace() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a b=\"2\" a=\"1\">\n  <!-- note -->\n  <x/>\n  <y>t</y>\n</a>";
        assert_eq!(
            canonicalize(xml).unwrap(),
            "<a a=\"1\" b=\"2\"><x></x><y>t</y></a>"
        );
    }

    #[test]
    fn namespaces_first_and_redundant_dropped() {
        let xml = "<r id=\"1\" xmlns:ds=\"u\"><ds:S Id=\"s\" xmlns:e=\"v\" xmlns:ds=\"u\"></ds:S></r>";
        assert_eq!(
            canonicalize(xml).unwrap(),
            "<r xmlns:ds=\"u\" id=\"1\"><ds:S xmlns:e=\"v\" Id=\"s\"></ds:S></r>"
        );
    }

    #[test]
    fn reescapes_text_and_attributes() {
        let xml = "<a t=\"&apos;x&gt;\">it&apos;s &quot;q&quot; &amp; &lt;</a>";
        assert_eq!(
            canonicalize(xml).unwrap(),
            "<a t=\"'x>\">it's \"q\" &amp; &lt;</a>"
        );
    }

    #[test]
    fn cdata_becomes_text() {
        assert_eq!(
            canonicalize("<a><![CDATA[1 < 2]]></a>").unwrap(),
            "<a>1 &lt; 2</a>"
        );
    }

    #[test]
    fn subtree_renders_inherited_namespaces() {
        let xml = "<etsi:SignedProperties Id=\"p\"><x/></etsi:SignedProperties>";
        assert_eq!(
            canonicalize_subtree(xml, &[("xmlns:etsi", "E"), ("xmlns:ds", "D")]).unwrap(),
            "<etsi:SignedProperties xmlns:ds=\"D\" xmlns:etsi=\"E\" Id=\"p\"><x></x></etsi:SignedProperties>"
        );
    }

    #[test]
    fn canonical_output_is_a_fixed_point() {
        let xml = "<a xmlns:z=\"n\" c=\"3\"> <b>1</b><c/></a>";
        let once = canonicalize(xml).unwrap();
        assert_eq!(canonicalize(&once).unwrap(), once);
    }

    #[test]
    fn unbalanced_input_fails() {
        assert!(canonicalize("<a><b></a>").is_err());
    }
}
