//! Directive templates.
//!
//! Handles placeholder substitution in the broadcast template.
//! Supports placeholders: %time, %user, %message

use chrono::Local;

use crate::common::types::BackendCommand;
use crate::relay::sanitizer::Sanitizer;

/// Template formatter with single-pass placeholder substitution.
///
/// Substituted values are never rescanned, so a user called `%message`
/// stays `%message`.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    format: String,
}

impl MessageFormatter {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    /// Substitute `%time`, `%user` and `%message`.
    pub fn format(&self, user: &str, message: &str) -> String {
        let time = get_time();
        let placeholders = [("%time", time.as_str()), ("%user", user), ("%message", message)];

        let mut out = String::with_capacity(self.format.len() + user.len() + message.len());
        let mut rest = self.format.as_str();

        while let Some(idx) = rest.find('%') {
            out.push_str(&rest[..idx]);
            let tail = &rest[idx..];
            match placeholders
                .iter()
                .find(|(name, _)| tail.starts_with(name))
            {
                Some((name, value)) => {
                    out.push_str(value);
                    rest = &tail[name.len()..];
                }
                None => {
                    out.push('%');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Get the current time as HH:MM:SS string.
fn get_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Turns a [`BackendCommand`] into the exact string sent to the console.
#[derive(Debug, Clone)]
pub struct DirectiveRenderer {
    chat: MessageFormatter,
    sanitizer: Sanitizer,
}

impl DirectiveRenderer {
    pub fn new(chat_format: impl Into<String>, sanitizer: Sanitizer) -> Self {
        Self {
            chat: MessageFormatter::new(chat_format),
            sanitizer,
        }
    }

    /// Chat text is sanitised, speaker included; directives go out verbatim.
    pub fn render(&self, command: &BackendCommand) -> String {
        match command {
            BackendCommand::Directive(text) | BackendCommand::PassThrough(text) => text.clone(),
            BackendCommand::Chat { speaker, text } => self.chat.format(
                &self.sanitizer.sanitize(speaker),
                &self.sanitizer.sanitize(text),
            ),
        }
    }
}
