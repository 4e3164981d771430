//! Core SMTP types.

mod capability;
mod extension;
mod reply;

pub use capability::Capabilities;
pub use extension::{AuthMechanism, Extension};
pub use reply::{Reply, ReplyCode};
