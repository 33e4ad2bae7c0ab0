//! Fixed-script content provider.
//!
//! Reads paragraphs separated by blank lines and hands them out
//! `per_batch` at a time.  Used for `--script` runs and as a deterministic
//! provider in tests.

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;

use super::{ContentError, ContentProvider};

/// Hands out pre-written batches, then reports exhaustion.
#[derive(Debug, Clone, Default)]
pub struct ScriptProvider {
    batches: VecDeque<Vec<String>>,
}

impl ScriptProvider {
    /// Serve `batches` in order.
    pub fn new(batches: Vec<Vec<String>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// Split `text` on blank lines and group the paragraphs `per_batch` at a
    /// time (a `per_batch` of 0 is treated as 1).
    pub fn from_text(text: &str, per_batch: usize) -> Self {
        let paragraphs = split_paragraphs(text);
        let batches = paragraphs
            .chunks(per_batch.max(1))
            .map(<[String]>::to_vec)
            .collect();
        Self::new(batches)
    }

    /// Load a script file; see [`from_text`](Self::from_text).
    pub fn load(path: &Path, per_batch: usize) -> Result<Self, ContentError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_text(&text, per_batch))
    }

    /// Batches not yet handed out.
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

#[async_trait]
impl ContentProvider for ScriptProvider {
    async fn next_batch(&mut self) -> Result<Option<Vec<String>>, ContentError> {
        Ok(self.batches.pop_front())
    }
}

/// Paragraphs separated by one or more blank lines, inner whitespace
/// collapsed to single spaces.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_blank_lines() {
        let text = "Good evening.\nWelcome back.\n\n\n  The rain continues.  \n\nGoodnight.\n";
        assert_eq!(
            split_paragraphs(text),
            vec![
                "Good evening. Welcome back.",
                "The rain continues.",
                "Goodnight."
            ]
        );
    }

    #[test]
    fn empty_text_has_no_paragraphs() {
        assert!(split_paragraphs("\n \n").is_empty());
    }

    #[tokio::test]
    async fn serves_batches_then_exhausts() {
        let mut provider = ScriptProvider::from_text("a\n\nb\n\nc", 2);
        assert_eq!(provider.remaining(), 2);

        assert_eq!(
            provider.next_batch().await.unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(provider.next_batch().await.unwrap(), Some(vec!["c".to_string()]));
        assert_eq!(provider.next_batch().await.unwrap(), None);
        assert_eq!(provider.next_batch().await.unwrap(), None);
    }

    #[tokio::test]
    async fn zero_batch_size_means_one() {
        let mut provider = ScriptProvider::from_text("a\n\nb", 0);
        assert_eq!(provider.remaining(), 2);
        assert_eq!(provider.next_batch().await.unwrap(), Some(vec!["a".to_string()]));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.txt");
        std::fs::write(&path, "one\n\ntwo\n").unwrap();

        let provider = ScriptProvider::load(&path, 1).unwrap();
        assert_eq!(provider.remaining(), 2);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = ScriptProvider::load(Path::new("/definitely/not/here.txt"), 1).unwrap_err();
        assert!(matches!(err, ContentError::Io(_)));
    }
}
