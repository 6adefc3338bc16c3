use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("language file read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("language entry on line {line} is missing ']'")]
    MissingBracket { line: usize },
    #[error("language entry on line {line} is missing '='")]
    MissingEquals { line: usize },
}

/// Localized protocol strings, one `[key]=value` entry per line.
#[derive(Debug, Clone, Default)]
pub struct LanguageTable {
    entries: HashMap<String, String>,
}

impl LanguageTable {
    pub fn load(path: &Path) -> Result<Self, LanguageError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, LanguageError> {
        let mut entries = HashMap::new();
        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if !line.starts_with('[') {
                continue;
            }
            let close = line
                .find(']')
                .ok_or(LanguageError::MissingBracket { line: line_no })?;
            let equals = line[close..]
                .find('=')
                .map(|offset| close + offset)
                .ok_or(LanguageError::MissingEquals { line: line_no })?;
            let key = &line[1..close];
            let value = &line[equals + 1..];
            if entries.contains_key(key) {
                error!(key, line = line_no, "duplicate language key, keeping first definition");
                continue;
            }
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(Self { entries })
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut entries = HashMap::new();
        for (key, value) in pairs {
            entries
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
        Self { entries }
    }

    /// Unknown keys yield an empty string.
    pub fn get(&self, key: &str) -> &str {
        match self.entries.get(key) {
            Some(value) => value,
            None => {
                error!(key, "language key not found");
                ""
            }
        }
    }

    /// Like `get`, but a missing key is not an error.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// True when the label for `key` is non-empty and occurs in `text`.
    pub fn found_in(&self, key: &str, text: &str) -> bool {
        let label = self.get(key);
        !label.is_empty() && text.contains(label)
    }

    pub fn equals(&self, key: &str, text: &str) -> bool {
        let label = self.get(key);
        !label.is_empty() && label == text
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
