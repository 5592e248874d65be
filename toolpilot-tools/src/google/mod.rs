//! Google Workspace connectors

pub mod calendar;
pub mod docs;
pub mod gmail;
pub mod sheets;

use crate::base::{StaticToken, Tool, TokenSource};
use crate::http::ApiClient;
use std::sync::Arc;
use toolpilot_core::config::GoogleConfig;

pub use calendar::{CalendarCreateTool, CalendarDeleteTool, CalendarListTool, CalendarUpdateTool};
pub use docs::{DocsCreateTool, DocsExportTool, DocsReadTool};
pub use gmail::{GmailGetTool, GmailListTool, GmailSendTool};
pub use sheets::{
    SheetsAppendTool, SheetsClearTool, SheetsMetadataTool, SheetsReadTool, SheetsWriteTool,
};

/// All Google tools sharing one token source
pub fn google_tools(config: &GoogleConfig, token: Arc<dyn TokenSource>) -> Vec<Arc<dyn Tool>> {
    let gmail = ApiClient::new(&config.gmail_base, token.clone());
    let calendar = ApiClient::new(&config.calendar_base, token.clone());
    let sheets = ApiClient::new(&config.sheets_base, token.clone());
    let docs = ApiClient::new(&config.docs_base, token.clone());
    let drive = ApiClient::new(&config.drive_base, token);

    vec![
        Arc::new(GmailListTool::new(gmail.clone())),
        Arc::new(GmailGetTool::new(gmail.clone())),
        Arc::new(GmailSendTool::new(gmail)),
        Arc::new(CalendarListTool::new(calendar.clone())),
        Arc::new(CalendarCreateTool::new(calendar.clone())),
        Arc::new(CalendarUpdateTool::new(calendar.clone())),
        Arc::new(CalendarDeleteTool::new(calendar)),
        Arc::new(SheetsMetadataTool::new(sheets.clone())),
        Arc::new(SheetsReadTool::new(sheets.clone())),
        Arc::new(SheetsWriteTool::new(sheets.clone())),
        Arc::new(SheetsAppendTool::new(sheets.clone())),
        Arc::new(SheetsClearTool::new(sheets)),
        Arc::new(DocsCreateTool::new(docs.clone())),
        Arc::new(DocsReadTool::new(docs)),
        Arc::new(DocsExportTool::new(drive)),
    ]
}

/// Google tools authenticated with the configured static access token
pub fn google_tools_from_config(config: &GoogleConfig) -> Vec<Arc<dyn Tool>> {
    google_tools(
        config,
        Arc::new(StaticToken::new(config.access_token.clone(), "Google")),
    )
}
