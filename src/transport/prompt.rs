//! Authentication prompt detection.

/// Watches decoded output for a password prompt.
///
/// Complete lines pass through untouched. The trailing partial line is held
/// back, since that is where a prompt appears, until it either turns out to
/// be a prompt or a newline completes it.
#[derive(Debug, Default)]
pub(crate) struct PromptWatcher {
    partial: String,
    answered: bool,
}

/// Result of feeding text to a [`PromptWatcher`].
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Watched {
    /// Output to pass on.
    pub output: String,
    /// A prompt was found and swallowed; the caller should answer it now.
    pub prompt: bool,
}

impl PromptWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a prompt has already been answered.
    pub fn answered(&self) -> bool {
        self.answered
    }

    pub fn feed(&mut self, text: &str) -> Watched {
        if self.answered {
            return Watched {
                output: text.to_string(),
                prompt: false,
            };
        }

        self.partial.push_str(text);

        if is_password_prompt(&self.partial) {
            self.partial.clear();
            self.answered = true;
            return Watched {
                output: String::new(),
                prompt: true,
            };
        }

        let output = match self.partial.rfind('\n') {
            Some(nl) => self.partial.drain(..=nl).collect(),
            None => String::new(),
        };

        Watched {
            output,
            prompt: false,
        }
    }

    /// Release whatever is held back.
    pub fn flush(&mut self) -> String {
        std::mem::take(&mut self.partial)
    }
}

/// Whether the last line of `text` asks for a password.
pub(crate) fn is_password_prompt(text: &str) -> bool {
    let line = text.rsplit('\n').next().unwrap_or("").trim_end();
    line.to_ascii_lowercase().ends_with("password:")
}
