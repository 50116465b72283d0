//! Twitch chat: token validation, IRC session and reply facility.

pub mod auth;
pub mod client;
pub mod handler;

pub use client::{SessionEnd, TwitchClient};
