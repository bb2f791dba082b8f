//! Claim notifier: decides which claims get a notification and enqueues them.

pub mod claims;
pub mod config;
pub mod error;
pub mod handler;
pub mod history;
pub mod pipeline;
pub mod queue;
