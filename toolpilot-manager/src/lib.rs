//! HTTP surface for toolpilot: SSE chat, tool and skill listings, bot control

pub mod handlers;
pub mod server;
pub mod state;

pub use server::{build_router, run_server, shutdown_signal};
pub use state::{ApiError, AppState, ChatRequest};
