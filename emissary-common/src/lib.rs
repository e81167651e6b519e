//! Types and logging shared by the emissary crates.

pub mod logging;
pub mod message;

pub use message::{Message, MessageId};
pub use tracing;
