//! Factorio console access over Source RCON.

pub mod codec;
pub mod connector;
pub mod packet;

pub use connector::RconConnection;
