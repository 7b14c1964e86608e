/// Input sanitizer to prevent log poisoning, injection attacks, and malformed input.
pub struct Sanitizer {
    max_message_length: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            max_message_length: 100_000,
        }
    }
}

impl Sanitizer {
    pub fn new(max_message_length: usize) -> Self {
        Self { max_message_length }
    }

    /// Sanitize a string: strip control characters, validate UTF-8, enforce length limits.
    pub fn sanitize(&self, input: &str) -> SanitizeResult {
        if input.len() > self.max_message_length {
            return SanitizeResult::Rejected("Input exceeds maximum length".to_string());
        }

        let cleaned: String = input
            .chars()
            .filter(|c| {
                // Allow printable characters, newlines, tabs
                !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r'
            })
            .collect();

        if cleaned.is_empty() && !input.is_empty() {
            return SanitizeResult::Rejected("Input contains only control characters".to_string());
        }

        if cleaned != input {
            SanitizeResult::Cleaned(cleaned)
        } else {
            SanitizeResult::Clean(cleaned)
        }
    }

    /// Sanitize HTTP headers to prevent log poisoning.
    pub fn sanitize_header(&self, value: &str) -> String {
        value
            .chars()
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .take(1000)
            .collect()
    }
}

#[derive(Debug, PartialEq)]
pub enum SanitizeResult {
    /// Input was already clean.
    Clean(String),
    /// Input was cleaned (control characters removed).
    Cleaned(String),
    /// Input was rejected entirely.
    Rejected(String),
}

impl SanitizeResult {
    pub fn is_rejected(&self) -> bool {
        matches!(self, SanitizeResult::Rejected(_))
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            SanitizeResult::Clean(s) | SanitizeResult::Cleaned(s) => Some(s),
            SanitizeResult::Rejected(_) => None,
        }
    }
}
