//! repo-pulse HTTP API.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod handlers;
pub mod server;
pub mod upstream;

pub use config::{Config, LogFormat};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use server::{create_router, serve, start_server, AppState, RequestLimits};
