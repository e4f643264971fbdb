pub mod client;
pub mod config;
pub mod error;
pub mod fallback;
pub mod generator;
pub mod models;
pub mod orchestrator;
pub mod search;
pub mod server;
pub mod stream;
pub mod transport;

pub use crate::config::Config;
pub use crate::error::{AssistantError, Result};
pub use crate::orchestrator::{Orchestrator, Outcome, Reply};
pub use crate::server::{AppState, router};
