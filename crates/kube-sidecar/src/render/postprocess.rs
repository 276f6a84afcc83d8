use regex::Regex;

use crate::error::RenderError;

const COMMENT_PATTERN: &str = "#.*";
const EMPTY_LINES_PATTERN: &str = "\n[\t\n\x0C\r ]+\n";

/// Cosmetic clean-up applied to every rendered output.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    comments: Option<Regex>,
    empty_lines: Option<Regex>,
}

impl PostProcessor {
    pub fn new(remove_comments: bool, remove_empty_lines: bool) -> Result<Self, RenderError> {
        let comments = remove_comments
            .then(|| Regex::new(COMMENT_PATTERN))
            .transpose()?;
        let empty_lines = remove_empty_lines
            .then(|| Regex::new(EMPTY_LINES_PATTERN))
            .transpose()?;

        Ok(Self {
            comments,
            empty_lines,
        })
    }

    /// A processor that returns its input unchanged.
    pub fn disabled() -> Self {
        Self {
            comments: None,
            empty_lines: None,
        }
    }

    pub fn apply(&self, text: &str) -> String {
        let mut text = text.to_string();
        // Comments become newlines so the blank-line pass can fold them.
        if let Some(regex) = &self.comments {
            text = regex.replace_all(&text, "\n").into_owned();
        }
        if let Some(regex) = &self.empty_lines {
            text = regex.replace_all(&text, "\n").into_owned();
        }
        text
    }
}
