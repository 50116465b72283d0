//! Allow-list for forwarding unrecognized `!` commands.
//!
//! Used by the `allow_list` policy: text is forwarded to the console only
//! if it matches one of the configured regex patterns.

use fancy_regex::Regex;
use tracing::warn;

/// Compiled allow-list patterns.
#[derive(Debug, Clone, Default)]
pub struct CommandAllowList {
    patterns: Vec<CompiledPattern>,
}

/// A compiled regex pattern with its original string for debugging.
#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

impl CommandAllowList {
    /// Create an allow-list from pattern strings.
    ///
    /// Invalid regex patterns are logged and skipped.
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: compile_patterns(patterns),
        }
    }

    /// Returns `true` if `text` matches any pattern.
    pub fn allows(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| {
            p.regex.is_match(text).unwrap_or_else(|e| {
                warn!("Regex match error for pattern '{}': {}", p.original, e);
                false
            })
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Compile a list of regex pattern strings, skipping invalid ones.
fn compile_patterns(patterns: &[String]) -> Vec<CompiledPattern> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern.clone(),
                regex,
            }),
            Err(e) => {
                warn!("Invalid allow-list pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}
