//! Reflection prompt rendering and response parsing.
//!
//! The prompt is rendered with `minijinja` from the agent's name, an
//! excerpt of its base identity, the adaptations it already holds, and
//! whatever drift, activity and mood context the host supplies. The
//! response is parsed tolerantly; an unusable response yields no
//! candidates rather than an error.

use std::future::Future;
use std::sync::LazyLock;

use async_trait::async_trait;
use minijinja::{Environment, context};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AgentError, LlmError};

/// Characters of the base identity shown to the model.
pub const IDENTITY_EXCERPT_CHARS: usize = 500;

const SYSTEM_TEMPLATE: &str = "\
You are a reflective process inside the mind of {{ name }}. \
You review recent experience and propose small, concrete behavioral habits \
that fit the agent's identity. You never change who the agent is.";

const USER_TEMPLATE: &str = "\
Agent: {{ name }}

Core identity (excerpt):
\"\"\"
{{ identity_excerpt }}
\"\"\"
{% if adaptations %}
Behaviors already learned:
{% for item in adaptations %}- {{ item }}
{% endfor %}{% else %}
No behaviors learned yet.
{% endif %}{% if drift %}
Personality drift: {{ drift }}
{% endif %}{% if activity %}
Recent activity:
{% for item in activity %}- {{ item }}
{% endfor %}{% endif %}{% if mood %}
Current mood: {{ mood }}
{% endif %}
Propose at most {{ max_new }} new behaviors, each a single sentence under \
{{ max_chars }} characters. Repeating an existing behavior strengthens it.

Respond with JSON only: {\"adaptations\": [\"...\"]}";

/// Matches the outermost JSON object in a response.
static OBJECT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").ok());

/// Matches the outermost JSON array in a response.
static ARRAY_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").ok());

// ---------------------------------------------------------------------------
// Context and prompt
// ---------------------------------------------------------------------------

/// Host-supplied material for a reflection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionContext {
    /// Display name of the agent.
    pub agent_name: String,
    /// The agent's base identity prompt. Only an excerpt is sent.
    pub base_prompt: String,
    /// Narrative of personality drift, if any.
    pub drift_narrative: Option<String>,
    /// Short descriptions of recent activity.
    pub recent_activity: Vec<String>,
    /// Current mood label.
    pub mood: Option<String>,
}

/// System and user messages for the reflection call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionPrompt {
    /// System message.
    pub system: String,
    /// User message.
    pub user: String,
}

/// First `max_chars` characters of `text`, marked when truncated.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.trim().chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Render the reflection prompt.
pub fn render_prompt(
    ctx: &ReflectionContext,
    adaptations: &[String],
    max_new: usize,
    max_chars: usize,
) -> Result<ReflectionPrompt, AgentError> {
    let env = Environment::new();
    let values = context! {
        name => ctx.agent_name,
        identity_excerpt => excerpt(&ctx.base_prompt, IDENTITY_EXCERPT_CHARS),
        adaptations => adaptations,
        drift => ctx.drift_narrative,
        activity => ctx.recent_activity,
        mood => ctx.mood,
        max_new => max_new,
        max_chars => max_chars,
    };
    let system = env.render_str(SYSTEM_TEMPLATE, &values)?;
    let user = env.render_str(USER_TEMPLATE, &values)?;
    Ok(ReflectionPrompt { system, user })
}

// ---------------------------------------------------------------------------
// LLM callback
// ---------------------------------------------------------------------------

/// Text-in, text-out model call used for reflection.
///
/// Calls are bounded by `reflection_timeout_secs`; an overrun surfaces as
/// [`LlmError::Timeout`].
#[async_trait]
pub trait ReflectionLlm: Send + Sync {
    /// Complete a system + user prompt pair.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl<F, Fut> ReflectionLlm for F
where
    F: Fn(String, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, LlmError>> + Send,
{
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        (self)(system.to_owned(), user.to_owned()).await
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Expected response shape.
#[derive(Debug, Deserialize)]
struct RawReflection {
    #[serde(default)]
    adaptations: Vec<serde_json::Value>,
}

/// Extract candidate adaptation strings from a model response.
///
/// Tries, in order:
/// 1. The whole response as `{"adaptations": [...]}`
/// 2. The outermost `{...}` substring as that object
/// 3. The outermost `[...]` substring as a bare array
///
/// Non-string entries are skipped. If nothing parses, returns an empty list.
pub fn parse_adaptations(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();

    // Strategy 1: direct parse
    if let Ok(parsed) = serde_json::from_str::<RawReflection>(trimmed) {
        return strings_only(parsed.adaptations);
    }

    // Strategy 2: embedded object
    if let Some(found) = OBJECT_PATTERN.as_ref().and_then(|re| re.find(trimmed))
        && let Ok(parsed) = serde_json::from_str::<RawReflection>(found.as_str())
    {
        return strings_only(parsed.adaptations);
    }

    // Strategy 3: bare array
    if let Some(found) = ARRAY_PATTERN.as_ref().and_then(|re| re.find(trimmed))
        && let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(found.as_str())
    {
        return strings_only(values);
    }

    if !trimmed.is_empty() {
        warn!(raw_response = trimmed, "unparseable reflection response, no adaptations");
    }
    Vec::new()
}

fn strings_only(values: Vec<serde_json::Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ReflectionContext {
        ReflectionContext {
            agent_name: String::from("Wren"),
            base_prompt: String::from("You are Wren, a patient science explainer."),
            drift_narrative: Some(String::from("Has become more outgoing.")),
            recent_activity: vec![String::from("commented on a physics thread")],
            mood: Some(String::from("curious")),
        }
    }

    // -----------------------------------------------------------------------
    // Prompt
    // -----------------------------------------------------------------------

    #[test]
    fn prompt_includes_context() {
        let prompt = render_prompt(&ctx(), &[String::from("Cite sources.")], 2, 100);
        assert!(prompt.is_ok());
        let prompt = prompt.unwrap_or_else(|_| ReflectionPrompt {
            system: String::new(),
            user: String::new(),
        });
        assert!(prompt.system.contains("Wren"));
        assert!(prompt.user.contains("patient science explainer"));
        assert!(prompt.user.contains("- Cite sources."));
        assert!(prompt.user.contains("more outgoing"));
        assert!(prompt.user.contains("physics thread"));
        assert!(prompt.user.contains("Current mood: curious"));
        assert!(prompt.user.contains("\"adaptations\""));
    }

    #[test]
    fn prompt_without_optional_context() {
        let bare = ReflectionContext {
            agent_name: String::from("Wren"),
            ..ReflectionContext::default()
        };
        let user = render_prompt(&bare, &[], 2, 100).map(|p| p.user).unwrap_or_default();
        assert!(user.contains("No behaviors learned yet."));
        assert!(!user.contains("Current mood"));
    }

    #[test]
    fn excerpt_truncates_long_identity() {
        let long = "x".repeat(600);
        let cut = excerpt(&long, IDENTITY_EXCERPT_CHARS);
        assert_eq!(cut.chars().count(), 503);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("short", 500), "short");
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parses_clean_json() {
        let parsed = parse_adaptations(r#"{"adaptations": ["Ask why.", "Be brief."]}"#);
        assert_eq!(parsed, vec!["Ask why.", "Be brief."]);
    }

    #[test]
    fn parses_object_inside_prose() {
        let raw = "Sure! Here you go:\n```json\n{\"adaptations\": [\"Ask why.\"]}\n```";
        assert_eq!(parse_adaptations(raw), vec!["Ask why."]);
    }

    #[test]
    fn falls_back_to_bare_array() {
        let raw = "I would suggest [\"Ask why.\", 42, \"Be brief.\"] going forward";
        assert_eq!(parse_adaptations(raw), vec!["Ask why.", "Be brief."]);
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(parse_adaptations("I have nothing to add.").is_empty());
        assert!(parse_adaptations("").is_empty());
        assert!(parse_adaptations("{not json").is_empty());
    }
}
