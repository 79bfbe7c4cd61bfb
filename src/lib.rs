//! Herald — notification relay for browser extensions

mod notification;

pub use notification::*;

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod framing;
pub mod http;
pub mod ipc;
pub mod manifest;
pub mod server;
pub mod store;
