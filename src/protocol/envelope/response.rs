/// Builder for outbound `<RESPONSE>` documents
///
/// The vendor protocol is sensitive to field order, so fields render in
/// insertion order. Values are numeric codes or plain text supplied by the
/// dispatcher; no escaping is applied beyond what the wire format permits.
/// Empty values render as self-closing tags (`<RESPONSE_TEXT/>`).
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    fields: Vec<(&'static str, String)>,
}

impl ResponseBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field
    #[must_use]
    pub fn field(mut self, tag: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((tag, value.into()));
        self
    }

    /// Append the four fields every standard document carries
    #[must_use]
    pub fn standard(self, text: &str, result: &str, code: &str, termination: &str) -> Self {
        self.field("RESPONSE_TEXT", text)
            .field("RESULT", result)
            .field("RESULT_CODE", code)
            .field("TERMINATION_STATUS", termination)
    }

    /// Render to wire text
    #[must_use]
    pub fn render(self) -> String {
        let mut out = String::with_capacity(64 + self.fields.len() * 24);
        out.push_str("<RESPONSE>");
        for (tag, value) in &self.fields {
            if value.is_empty() {
                out.push('<');
                out.push_str(tag);
                out.push_str("/>");
            } else {
                out.push('<');
                out.push_str(tag);
                out.push('>');
                out.push_str(value);
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
        out.push_str("</RESPONSE>");
        out
    }
}
