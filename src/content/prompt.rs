//! Prompt builder for sleep-friendly news transcripts.
//!
//! [`PromptBuilder::build_chat`] produces a `(system_msg, user_msg)` pair for
//! any OpenAI-compatible `/v1/chat/completions` endpoint.  The first news item
//! opens the show with a greeting; later items get a transition instead.

use super::news::NewsItem;

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

const SYSTEM_INSTRUCTION: &str = "\
You are Bob, the calm news anchor of Sleepy News Channel, a bedtime podcast
that reads the news in a way that helps listeners drift off to sleep.
Your voice is gentle, slow and reassuring. You never sound urgent or alarmed.";

const OPENING: &str = "\
You are creating the opening of a sleep-inducing news podcast. Start with a warm
greeting like 'Good evening, welcome to Sleepy News Channel, and I'm your news
anchor Bob.' Keep it calm and soothing.";

const TRANSITION: &str = "\
You are continuing a sleep-inducing news podcast. Add a smooth transition from
the previous topic. Use transitional phrases to connect topics naturally.";

const SLEEP_GUIDANCE: &str = "\
6. Add an intermediate paragraph with gentle sleep guidance (breathing, relaxation,
   letting the body grow heavy). Keep it under 50 words and very soothing.";

const OUTPUT_FORMAT: &str = "\
We are constantly generating new paragraphs, so do not say things like \"that's it
for today's news\" or \"good night\". Just keep talking.
Output ONLY a JSON array of paragraph strings, nothing else. Format:
[\"paragraph 1\", \"paragraph 2\", \"paragraph 3\"]";

/// Upper bound on words per paragraph, repeated in the prompt.
pub const MAX_PARAGRAPH_WORDS: usize = 50;

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds transcript-writing prompts in chat-message format.
///
/// # Example
/// ```rust
/// use sleepy_news::content::{NewsItem, PromptBuilder};
///
/// let item = NewsItem::new("Owls return to the city", "https://example.org/owls");
/// let (system, user) = PromptBuilder::new().build_chat(&item, None, true);
/// assert!(system.contains("Sleepy News Channel"));
/// assert!(user.contains("Owls return to the city"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    sleep_guidance: bool,
}

impl PromptBuilder {
    /// Builder that asks for a sleep-guidance paragraph with every item.
    pub fn new() -> Self {
        Self {
            sleep_guidance: true,
        }
    }

    /// Turn the sleep-guidance paragraph on or off.
    pub fn with_sleep_guidance(mut self, enabled: bool) -> Self {
        self.sleep_guidance = enabled;
        self
    }

    /// Build a **(system_msg, user_msg)** pair for one news item.
    ///
    /// * `context` — rolling context from [`ContextWindow`](super::ContextWindow).
    /// * `opening` — `true` for the first item of the show.
    pub fn build_chat(
        &self,
        item: &NewsItem,
        context: Option<&str>,
        opening: bool,
    ) -> (String, String) {
        let system_msg = SYSTEM_INSTRUCTION.to_string();

        let mut user_msg = String::with_capacity(2048);
        user_msg.push_str(if opening { OPENING } else { TRANSITION });
        user_msg.push_str("\n\nGenerate a soothing transcript for bedtime news reading:\n\n");

        user_msg.push_str("1. Create 2-3 paragraphs about this news:\n");
        user_msg.push_str(&indent(&item.summary));
        user_msg.push_str("\n\n");

        user_msg.push_str(
            "2. If there are short and interesting comments, create 1 paragraph that reads \
             one or two of them in a lightly funny way.\n",
        );
        if item.comments.is_empty() {
            user_msg.push_str("   (no comments)\n");
        } else {
            for c in &item.comments {
                user_msg.push_str(&format!("   - {}: {}\n", c.author, c.body.trim()));
            }
        }
        user_msg.push('\n');

        user_msg.push_str(&format!(
            "3. Each paragraph MUST NOT exceed {MAX_PARAGRAPH_WORDS} words.\n\
             4. Use a calm, gentle tone suitable for helping someone fall asleep.\n\
             5. Keep the content informative but not alarming or exciting.\n"
        ));
        if self.sleep_guidance {
            user_msg.push_str(SLEEP_GUIDANCE);
            user_msg.push('\n');
        }

        if let Some(ctx) = context {
            user_msg.push_str("\nMaintain consistency with the previous content.\n");
            user_msg.push_str(ctx);
        }

        user_msg.push('\n');
        user_msg.push_str(OUTPUT_FORMAT);

        (system_msg, user_msg)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("   {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::news::Comment;

    fn item() -> NewsItem {
        let mut item = NewsItem::new("Lighthouse keeper retires", "https://example.org/lh");
        item.summary = "Lighthouse keeper retires\n\nAfter forty years on the rock.".into();
        item.comments = vec![Comment {
            author: "gull_fan".into(),
            body: "Who will feed the gulls now?".into(),
        }];
        item
    }

    #[test]
    fn opening_prompt_greets_listener() {
        let (system, user) = PromptBuilder::new().build_chat(&item(), None, true);

        assert!(system.contains("Sleepy News Channel"));
        assert!(user.contains("warm"), "opening must ask for a greeting");
        assert!(!user.contains("transition"));
    }

    #[test]
    fn later_prompt_asks_for_transition() {
        let (_, user) = PromptBuilder::new().build_chat(&item(), None, false);

        assert!(user.contains("transition"));
        assert!(!user.contains("warm\ngreeting"));
    }

    #[test]
    fn prompt_includes_summary_and_comments() {
        let (_, user) = PromptBuilder::new().build_chat(&item(), None, true);

        assert!(user.contains("   After forty years on the rock."));
        assert!(user.contains("gull_fan: Who will feed the gulls now?"));
        assert!(user.contains("MUST NOT exceed 50 words"));
        assert!(user.contains("JSON array"));
    }

    #[test]
    fn prompt_without_comments_says_so() {
        let mut bare = item();
        bare.comments.clear();
        let (_, user) = PromptBuilder::new().build_chat(&bare, None, true);
        assert!(user.contains("(no comments)"));
    }

    #[test]
    fn prompt_embeds_context() {
        let ctx = "Previous paragraphs for context:\nThe moon rose slowly.\n";
        let (_, user) = PromptBuilder::new().build_chat(&item(), Some(ctx), false);

        assert!(user.contains("Maintain consistency"));
        assert!(user.contains("The moon rose slowly."));
    }

    #[test]
    fn sleep_guidance_can_be_disabled() {
        let (_, with) = PromptBuilder::new().build_chat(&item(), None, true);
        let (_, without) = PromptBuilder::new()
            .with_sleep_guidance(false)
            .build_chat(&item(), None, true);

        assert!(with.contains("sleep guidance"));
        assert!(!without.contains("sleep guidance"));
    }
}
