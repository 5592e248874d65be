//! Chat service: routing, context assembly and the loop behind one call

use crate::agent_loop::{AgentLoop, LoopConfig, LoopOutcome};
use crate::context::ContextAssembler;
use crate::router::SkillRouter;
use crate::sink::EventSink;
use crate::skills::{Skill, SkillCatalog};
use std::sync::Arc;
use toolpilot_core::config::{AgentConfig, Config};
use toolpilot_core::utils::expand_tilde;
use toolpilot_providers::{LLMProvider, Message, OpenAICompatClient, Role};
use toolpilot_tools::{build_registry, ToolRegistry};
use tracing::{debug, info};

/// Everything needed to answer a chat request; shared across requests
pub struct ChatService {
    agent: AgentLoop,
    router: SkillRouter,
    catalog: Arc<SkillCatalog>,
    assembler: ContextAssembler,
    routing_enabled: bool,
}

impl ChatService {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        catalog: Arc<SkillCatalog>,
        config: &AgentConfig,
    ) -> Self {
        let router_model = config
            .router_model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| config.model.clone());
        let router =
            SkillRouter::new(provider.clone(), Some(router_model)).with_history(config.router_history);

        Self {
            agent: AgentLoop::new(provider, tools, LoopConfig::from(config)),
            router,
            catalog,
            assembler: ContextAssembler::with_override(config.system_prompt.as_deref()),
            routing_enabled: config.routing_enabled,
        }
    }

    /// Wire the OpenAI-compatible provider, configured tools and skills
    pub fn from_config(config: &Config) -> Self {
        let provider = Arc::new(OpenAICompatClient::from_config(
            &config.provider,
            config.agent.model.clone(),
        ));
        let tools = Arc::new(build_registry(&config.tools));
        let skills_dir = config.agent.skills_dir.as_deref().map(expand_tilde);
        let catalog = Arc::new(SkillCatalog::load(skills_dir.as_deref()));
        info!(
            "Chat service ready: {} tools, {} skills",
            tools.len(),
            catalog.len()
        );
        Self::new(provider, tools, catalog, &config.agent)
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        self.agent.tools()
    }

    pub fn catalog(&self) -> &Arc<SkillCatalog> {
        &self.catalog
    }

    /// Skills to inject for this conversation
    pub async fn select_skills(&self, history: &[Message]) -> Vec<Skill> {
        if !self.routing_enabled {
            return self.catalog.iter().cloned().collect();
        }
        let user_messages: Vec<String> = history
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.text().to_string())
            .collect();
        if user_messages.is_empty() {
            return Vec::new();
        }
        self.router.select(&user_messages, &self.catalog).await
    }

    /// Answer one request, streaming events into `sink`
    pub async fn handle(
        &self,
        history: &[Message],
        model: Option<String>,
        sink: &dyn EventSink,
    ) -> LoopOutcome {
        let skills = self.select_skills(history).await;
        debug!(
            "Injecting skills: {:?}",
            skills.iter().map(|s| s.id.as_str()).collect::<Vec<_>>()
        );
        let time = current_time_context();
        let messages = self.assembler.build(&skills, history, Some(&time));
        self.agent.run(messages, model, sink).await
    }
}

fn current_time_context() -> String {
    format!(
        "Current date and time: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M %:z (%A)")
    )
}
