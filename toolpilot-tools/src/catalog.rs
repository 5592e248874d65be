//! Builds the tool catalog from configuration

use crate::browser::browser_tools_from_config;
use crate::google::google_tools_from_config;
use crate::notion::notion_tools_from_config;
use crate::registry::ToolRegistry;
use crate::shell::ExecTool;
use toolpilot_core::config::ToolsConfig;
use tracing::info;

/// Register every connector whose configuration allows it.
///
/// Connectors without credentials are left out entirely so the model never
/// sees tools it cannot use.
pub fn build_registry(config: &ToolsConfig) -> ToolRegistry {
    let mut builder = ToolRegistry::builder();

    if config.exec.enabled {
        builder = builder.tool(ExecTool::from_config(&config.exec));
    }
    if config.google.is_configured() {
        builder = builder.extend(google_tools_from_config(&config.google));
    }
    if config.notion.is_configured() {
        builder = builder.extend(notion_tools_from_config(&config.notion));
    }
    if config.browser.enabled {
        builder = builder.extend(browser_tools_from_config(&config.browser));
    }

    let registry = builder.build();
    info!("Registered {} tool(s)", registry.len());
    registry
}
