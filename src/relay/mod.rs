//! The relay core: sanitising, routing, rate limiting and backend access.

pub mod cooldown;
pub mod filter;
pub mod formatter;
pub mod gateway;
pub mod orchestrator;
pub mod router;
pub mod sanitizer;

pub use gateway::RconGateway;
pub use orchestrator::{ChatReplier, RelayOrchestrator};
