//! Publishing: ticket consumption, artifact writes, cursor advance and notifications.

mod service;
pub mod template;
mod types;

pub use service::{PublishService, PublishSettings};
pub use types::*;
