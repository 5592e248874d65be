//! Skill router: picks which skill docs to inject for a request

use crate::skills::{Skill, SkillCatalog};
use serde_json::Value;
use std::sync::Arc;
use toolpilot_providers::{LLMProvider, Message};
use tracing::{debug, info, warn};

const ROUTER_MAX_TOKENS: u32 = 256;
const ROUTER_TEMPERATURE: f32 = 0.0;
const DEFAULT_HISTORY: usize = 3;

/// Asks the model for the subset of skills a request needs.
///
/// Failure handling is asymmetric: when the router call itself fails every
/// skill is injected, but a reply that is not a JSON array selects none.
pub struct SkillRouter {
    provider: Arc<dyn LLMProvider>,
    model: Option<String>,
    history: usize,
}

impl SkillRouter {
    pub fn new(provider: Arc<dyn LLMProvider>, model: Option<String>) -> Self {
        Self {
            provider,
            model,
            history: DEFAULT_HISTORY,
        }
    }

    /// Number of most recent user messages shown to the router
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history.max(1);
        self
    }

    /// Choose skills for the conversation whose user turns are `recent_user_messages`
    pub async fn select(&self, recent_user_messages: &[String], catalog: &SkillCatalog) -> Vec<Skill> {
        if catalog.is_empty() {
            return Vec::new();
        }

        let start = recent_user_messages.len().saturating_sub(self.history);
        let recent = &recent_user_messages[start..];
        let messages = build_prompt(recent, catalog);

        let response = match self
            .provider
            .chat(
                messages,
                None,
                self.model.clone(),
                ROUTER_MAX_TOKENS,
                ROUTER_TEMPERATURE,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Skill routing failed, injecting all skills: {}", e);
                return catalog.iter().cloned().collect();
            }
        };

        let reply = response.content.unwrap_or_default();
        debug!("Router reply: {}", reply);
        let ids = parse_selection(&reply, catalog);
        info!("Selected skills: {:?}", ids);
        catalog.select(&ids)
    }
}

/// Classification prompt listing each skill id with its one-line description
pub(crate) fn build_prompt(recent: &[String], catalog: &SkillCatalog) -> Vec<Message> {
    let mut system = String::from(
        "You decide which tool documentation an assistant needs to answer the user's latest request.\n\
         Reply with ONLY a JSON array of skill ids from the list below, for example [\"calendar\", \"gmail\"].\n\
         Reply with [] when no skill is needed.\n\nSkills:\n",
    );
    for skill in catalog.iter() {
        system.push_str(&format!("- {}: {}\n", skill.id, skill.description));
    }

    let mut user = String::from("Recent user messages (oldest first):\n");
    for (i, text) in recent.iter().enumerate() {
        user.push_str(&format!("{}. {}\n", i + 1, text.trim()));
    }

    vec![Message::system(system), Message::user(user)]
}

/// Remove a surrounding markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`), which may share the line with the array
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.trim_end().trim_end_matches("```").trim()
}

/// Parse the router reply into known, de-duplicated skill ids in reply order
pub(crate) fn parse_selection(reply: &str, catalog: &SkillCatalog) -> Vec<String> {
    let items = match serde_json::from_str::<Value>(strip_code_fence(reply)) {
        Ok(Value::Array(items)) => items,
        Ok(_) | Err(_) => {
            warn!("Router reply is not a JSON array, injecting no skills");
            return Vec::new();
        }
    };

    let mut ids: Vec<String> = Vec::new();
    for id in items.iter().filter_map(Value::as_str).map(str::trim) {
        if catalog.contains(id) && !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}
