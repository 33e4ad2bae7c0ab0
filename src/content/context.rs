//! Rolling window of recently generated paragraphs.
//!
//! [`ContextWindow`] keeps the last *N* paragraphs so each new transcript
//! segment can continue smoothly from the previous one.  It also remembers
//! how many news items were covered, which decides whether the next prompt
//! opens the show or transitions from the last story.

use std::collections::VecDeque;

/// Default number of paragraphs carried into the next prompt.
pub const DEFAULT_WINDOW: usize = 3;

/// Maintains a rolling window of generated paragraphs.
///
/// # Example
/// ```rust
/// use sleepy_news::content::ContextWindow;
///
/// let mut ctx = ContextWindow::new();
/// assert!(ctx.is_opening());
/// ctx.record_item(&["Good evening.".to_string()]);
/// assert!(!ctx.is_opening());
/// assert!(ctx.build_context().unwrap().contains("Good evening."));
/// ```
#[derive(Debug, Clone)]
pub struct ContextWindow {
    paragraphs: VecDeque<String>,
    max_paragraphs: usize,
    items_covered: usize,
}

impl ContextWindow {
    /// Window of [`DEFAULT_WINDOW`] paragraphs.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WINDOW)
    }

    pub fn with_capacity(max_paragraphs: usize) -> Self {
        Self {
            paragraphs: VecDeque::with_capacity(max_paragraphs + 1),
            max_paragraphs,
            items_covered: 0,
        }
    }

    /// Record the paragraphs generated for one news item.
    pub fn record_item(&mut self, paragraphs: &[String]) {
        self.items_covered += 1;
        for p in paragraphs {
            self.paragraphs.push_back(p.clone());
        }
        while self.paragraphs.len() > self.max_paragraphs {
            self.paragraphs.pop_front();
        }
    }

    /// Count an item that produced no generated text (e.g. skipped on error).
    pub fn skip_item(&mut self) {
        self.items_covered += 1;
    }

    /// `true` until the first item has been covered.
    pub fn is_opening(&self) -> bool {
        self.items_covered == 0
    }

    /// Context block for the prompt, oldest paragraph first.
    ///
    /// Returns `None` when nothing has been generated yet.
    pub fn build_context(&self) -> Option<String> {
        if self.paragraphs.is_empty() {
            return None;
        }
        let mut ctx = String::from("Previous paragraphs for context:\n");
        for p in &self.paragraphs {
            ctx.push_str(p);
            ctx.push('\n');
        }
        Some(ctx)
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Forget everything, as if the show had not started.
    pub fn reset(&mut self) {
        self.paragraphs.clear();
        self.items_covered = 0;
    }
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new()
    }
}
