use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::io::Cursor;

use crate::core::{SriError, round_half_up};

pub type XmlResult = Result<String, SriError>;

fn xml_io(e: std::io::Error) -> SriError {
    SriError::Xml(format!("XML write error: {e}"))
}

/// Compact XML writer.
///
/// Emits no indentation and never self-closes elements; the SRI rejects
/// `<tag/>` in several validators.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    /// A document writer, starting with the UTF-8 XML declaration.
    pub fn new() -> Result<Self, SriError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    /// A writer for an element fragment (no declaration).
    pub fn fragment() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    pub fn into_string(self) -> Result<String, SriError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| SriError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, SriError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    /// Attributes are written in the given order; pass them already sorted
    /// (namespace declarations first, then by name).
    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, SriError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, SriError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    /// Write text verbatim except for `&`, `<` and `>`.
    pub fn text(&mut self, text: &str) -> Result<&mut Self, SriError> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, SriError> {
        self.start_element(name)?;
        self.text(text)?;
        self.end_element(name)
    }

    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, SriError> {
        self.start_element_with_attrs(name, attrs)?;
        self.text(text)?;
        self.end_element(name)
    }

    /// Element with normalized free text (names, addresses, descriptions).
    pub fn free_text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, SriError> {
        self.text_element(name, &normalize_text(text))
    }

    /// Skip absent or blank values instead of emitting an empty tag.
    pub fn optional_element(
        &mut self,
        name: &str,
        text: Option<&str>,
    ) -> Result<&mut Self, SriError> {
        match text.map(normalize_text).filter(|t| !t.is_empty()) {
            Some(t) => self.text_element(name, &t),
            None => Ok(self),
        }
    }

    /// Write a monetary amount with two decimals.
    pub fn amount_element(&mut self, name: &str, amount: Decimal) -> Result<&mut Self, SriError> {
        self.text_element(name, &format_amount(amount))
    }

    /// Write a quantity or unit price with six decimals.
    pub fn quantity_element(&mut self, name: &str, qty: Decimal) -> Result<&mut Self, SriError> {
        self.text_element(name, &format_quantity(qty))
    }

    /// Splice pre-built XML (e.g. a signature fragment) into the output.
    pub fn raw(&mut self, xml: &str) -> Result<&mut Self, SriError> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(xml)))
            .map_err(xml_io)?;
        Ok(self)
    }
}

/// Format with exactly `dp` decimals, rounding half-up.
pub fn format_fixed(d: Decimal, dp: u32) -> String {
    let mut rounded = round_half_up(d, dp);
    rounded.rescale(dp);
    rounded.to_string()
}

/// Currency values: two decimals, e.g. `34.50`.
pub fn format_amount(d: Decimal) -> String {
    format_fixed(d, 2)
}

/// Quantities and unit prices: six decimals, e.g. `2.000000`.
pub fn format_quantity(d: Decimal) -> String {
    format_fixed(d, 6)
}

/// Normalize free text for SRI documents.
///
/// Strips control characters, folds typographic quotes, dashes, ellipsis and
/// non-breaking spaces to ASCII, and collapses runs of whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut folded = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => folded.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => folded.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2015}' => folded.push('-'),
            '\u{2026}' => folded.push_str("..."),
            '\u{00A0}' | '\t' | '\n' | '\r' => folded.push(' '),
            '\u{00AD}' => {}
            c if c.is_control() => {}
            c => folded.push(c),
        }
    }

    let mut collapsed = String::with_capacity(folded.len());
    for word in folded.split_whitespace() {
        if !collapsed.is_empty() {
            collapsed.push(' ');
        }
        collapsed.push_str(word);
    }
    collapsed
}
