use quick_xml::Reader;
use quick_xml::events::Event;

use super::EnvelopeError;

/// A parsed flat request document
///
/// The protocol is one level deep: a root element (`TRANSACTION`,
/// `ETRANSACTION`, `REQUEST`) wrapping text-only children. Field order is
/// preserved for diagnostics; lookups are by tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: String,
    fields: Vec<(String, String)>,
}

impl Document {
    /// Root element name
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Text of the first child with this tag, if present
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == tag)
            .map(|(_, value)| value.as_str())
    }

    /// All parsed `(tag, value)` pairs in document order
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

/// Parse one flat request document from raw socket bytes
///
/// Some clients prepend non-XML noise characters (`?` padding) before the
/// document; everything up to the first `<` is discarded before parsing.
///
/// # Errors
///
/// Returns `EnvelopeError` if no start tag is found or the document is
/// structurally broken. Callers answer parse failures with the fixed
/// bad-XML document; the connection stays open.
pub fn parse(raw: &[u8]) -> Result<Document, EnvelopeError> {
    let start = raw
        .iter()
        .position(|&b| b == b'<')
        .ok_or(EnvelopeError::NoDocument)?;
    let text = std::str::from_utf8(&raw[start..]).map_err(|_| EnvelopeError::InvalidUtf8)?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut root: Option<String> = None;
    let mut fields = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if root.is_none() {
                    root = Some(name);
                } else {
                    let value = reader
                        .read_text(e.name())
                        .map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
                    fields.push((name, value.trim().to_string()));
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if root.is_none() {
                    root = Some(name);
                    break;
                }
                fields.push((name, String::new()));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(EnvelopeError::Malformed(e.to_string())),
        }
    }

    let root = root.ok_or(EnvelopeError::NoDocument)?;
    Ok(Document { root, fields })
}
