//! Escaping of untrusted chat text before it is embedded in a console directive.
//!
//! Two passes per character: markup characters become HTML entities, then
//! console-string metacharacters get a backslash. Quotes never reach the
//! second pass because the first already turned them into `&quot;`.

/// Longest sanitised string, in characters.
pub const MAX_SANITIZED_CHARS: usize = 500;

/// When the length limit is applied relative to escaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncateOrder {
    /// Escape everything, then cut at the limit. Can split an escape
    /// sequence at the boundary (a lone trailing `\` or half an entity).
    #[default]
    EscapeThenTruncate,
    /// Keep only whole escaped characters that fit within the limit.
    TruncateThenEscape,
}

/// Text sanitiser for directive payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sanitizer {
    order: TruncateOrder,
}

impl Sanitizer {
    pub fn new(order: TruncateOrder) -> Self {
        Self { order }
    }

    pub fn from_flag(truncate_before_escape: bool) -> Self {
        if truncate_before_escape {
            Self::new(TruncateOrder::TruncateThenEscape)
        } else {
            Self::new(TruncateOrder::EscapeThenTruncate)
        }
    }

    pub fn order(&self) -> TruncateOrder {
        self.order
    }

    /// Escape and length-limit `raw`. Empty input yields an empty string.
    pub fn sanitize(&self, raw: &str) -> String {
        match self.order {
            TruncateOrder::EscapeThenTruncate => {
                let escaped: String = raw.chars().map(escape_char).collect();
                escaped.chars().take(MAX_SANITIZED_CHARS).collect()
            }
            TruncateOrder::TruncateThenEscape => {
                let mut out = String::with_capacity(raw.len().min(MAX_SANITIZED_CHARS * 2));
                let mut used = 0;
                for piece in raw.chars().map(escape_char) {
                    let width = piece.chars().count();
                    if used + width > MAX_SANITIZED_CHARS {
                        break;
                    }
                    out.push_str(&piece);
                    used += width;
                }
                out
            }
        }
    }
}

/// Sanitise with the default escape-then-truncate order.
pub fn sanitize(raw: &str) -> String {
    Sanitizer::default().sanitize(raw)
}

fn escape_char(c: char) -> std::borrow::Cow<'static, str> {
    match c {
        '&' => "&amp;".into(),
        '<' => "&lt;".into(),
        '>' => "&gt;".into(),
        '"' => "&quot;".into(),
        '\'' => "&#x27;".into(),
        '\\' => "\\\\".into(),
        other => other.to_string().into(),
    }
}
