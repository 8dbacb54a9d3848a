//! Prompt construction.
//!
//! The upstream `/api/generate` endpoint takes a single prompt string, so the
//! conversation is flattened into a `User:` / `Assistant:` transcript and
//! finished with an open `Assistant: ` turn for the model to complete.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::facts::Fact;

/// Author of a stored message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used for this role inside a rendered transcript.
    pub fn speaker(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// Prefixes the fact API likes to open with; they add nothing to the prompt.
const FACT_PREFIXES: [&str; 2] = ["Did you know that ", "It is a known fact that "];

/// Render an ordered transcript, one `Speaker: content` line per turn.
pub fn render_history<'a, I>(turns: I) -> String
where
    I: IntoIterator<Item = (Role, &'a str)>,
{
    let mut history = String::new();
    for (role, content) in turns {
        history.push_str(role.speaker());
        history.push_str(": ");
        history.push_str(content);
        history.push('\n');
    }
    history
}

/// Strip the conversational prefixes from a fact's text.
pub fn clean_fact_text(text: &str) -> String {
    FACT_PREFIXES
        .iter()
        .fold(text.to_owned(), |acc, prefix| acc.replace(prefix, ""))
}

/// Build the prompt sent upstream.
///
/// With a fact whose text is non-blank, the transcript is preceded by the
/// "dark truth" instructions that make the model present the fact as the cause
/// of whatever technical behaviour it explains. Otherwise the prompt is the
/// transcript alone.
pub fn compose_prompt(history: &str, fact: Option<&Fact>) -> String {
    let Some(fact) = fact.filter(|f| !f.text.trim().is_empty()) else {
        return format!("{history}Assistant: ");
    };

    let truth = clean_fact_text(&fact.text);
    format!(
        "{instructions}\n\n{history}Assistant: ",
        instructions = fact_instructions(&truth)
    )
}

fn fact_instructions(truth: &str) -> String {
    format!(
        r#"
ROLE: You are a Senior Developer who reveals the "Dark Truth" behind software.
THE TRUTH: {truth}

INSTRUCTIONS:
1. Explain the technical concept accurately (technically correct).
2. Use the "Causality" logic: Explain that THE TRUTH is the literal *cause* of the technical behavior.
3. **FORMATTING IS CRITICAL:**
   - Start with a Blockquote (>) containing "THE TRUTH".
   - Then provide the explanation in normal text.
   - Use **Bold** for key technical terms.

REQUIRED OUTPUT FORMAT:
> **THE TRUTH:** [Insert {truth} here]

[Your technical explanation here, weaving the fact as the cause.]

EXAMPLE RESPONSE:
> **THE TRUTH:** The CSS box model was invented to impress Elon Musk.

**Margins** and **Padding** are actually just empty space left for Elon's ego. If you don't define a **border-box**, the browser automatically expands the element to make room for his Tesla stock portfolio.
"#
    )
}
