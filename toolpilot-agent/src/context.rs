//! Context assembler for the model's input

use crate::skills::Skill;
use toolpilot_providers::Message;

/// Instructions used when the configuration does not override them
pub const DEFAULT_INSTRUCTIONS: &str = r#"# toolpilot

You are toolpilot, a helpful assistant that gets things done with tools. You can work with
email, calendars, spreadsheets, documents, a knowledge base, a web browser and a shell,
depending on which tools are available in this conversation.

When a request needs a tool, call it; do not describe what you would do instead.
When a tool fails, explain the failure plainly and suggest what the user can do.
When you create or change something, include the link to it in your answer.
For normal conversation, just respond with text.

Always be helpful, accurate, and concise."#;

/// Builds the message sequence sent to the model.
///
/// The layout is always: base instructions, the selected skill docs (one
/// system message, only when something was selected), optional extra
/// context, then the conversation history unchanged.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    instructions: String,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS)
    }
}

impl ContextAssembler {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }

    /// Uses `instructions` unless it is blank
    pub fn with_override(instructions: Option<&str>) -> Self {
        match instructions.map(str::trim).filter(|s| !s.is_empty()) {
            Some(custom) => Self::new(custom),
            None => Self::default(),
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Assemble the full model input for one request
    pub fn build(
        &self,
        selected_skills: &[Skill],
        history: &[Message],
        extra_context: Option<&str>,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(Message::system(self.instructions.clone()));

        if !selected_skills.is_empty() {
            messages.push(Message::system(render_skills(selected_skills)));
        }

        if let Some(extra) = extra_context.map(str::trim).filter(|s| !s.is_empty()) {
            messages.push(Message::system(extra.to_string()));
        }

        messages.extend(history.iter().cloned());
        messages
    }
}

/// Skill docs in selection order, each under its own heading
fn render_skills(skills: &[Skill]) -> String {
    let mut doc = String::from("# Available Tools\n");
    for skill in skills {
        doc.push_str(&format!("\n## {}\n\n{}\n", skill.id, skill.body));
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolpilot_providers::Role;

    fn skill(id: &str, body: &str) -> Skill {
        Skill {
            id: id.to_string(),
            description: id.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_no_skills_means_single_system_message() {
        let history = vec![Message::user("hi")];
        let messages = ContextAssembler::new("base").build(&[], &history, None);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].text(), "base");
        assert_eq!(messages[1], history[0]);
    }

    #[test]
    fn test_skills_are_one_message_in_selection_order() {
        let history = vec![
            Message::user("book it"),
            Message::assistant("done"),
            Message::user("thanks"),
        ];
        let skills = vec![skill("gmail", "MAIL DOC"), skill("calendar", "CAL DOC")];
        let messages = ContextAssembler::new("base").build(&skills, &history, None);

        assert_eq!(messages.len(), 5);
        let doc = messages[1].text();
        assert_eq!(messages[1].role, Role::System);
        assert!(doc.starts_with("# Available Tools"));
        let mail = doc.find("## gmail").unwrap();
        let cal = doc.find("## calendar").unwrap();
        assert!(mail < cal);
        assert!(doc.contains("CAL DOC"));
        assert_eq!(&messages[2..], &history[..]);
    }

    #[test]
    fn test_extra_context_follows_skills() {
        let messages = ContextAssembler::new("base").build(
            &[skill("docs", "DOCS")],
            &[Message::user("q")],
            Some("Current time: noon"),
        );
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].text(), "Current time: noon");
        assert_eq!(messages[3].role, Role::User);
    }

    #[test]
    fn test_blank_override_uses_default() {
        assert_eq!(
            ContextAssembler::with_override(Some("  ")).instructions(),
            DEFAULT_INSTRUCTIONS
        );
        assert_eq!(
            ContextAssembler::with_override(Some("Be terse.")).instructions(),
            "Be terse."
        );
    }
}
