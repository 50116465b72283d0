//! Wire protocols: Factorio RCON and Twitch IRC.

pub mod irc;
pub mod rcon;
