//! HTTP side of the chat client: configuration, REST calls and reconnect policy.

mod config;
pub mod rest;
pub mod retry;
mod utils;

pub use config::ClientConfig;
pub use rest::{upload_form, RestClient};
pub use retry::{Backoff, BackoffConfig};
pub use utils::*;
