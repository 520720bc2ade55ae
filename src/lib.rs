pub mod bucket;
pub mod cli;
pub mod cmd;
pub mod connect;
pub mod engine;
pub mod error;
#[cfg(test)]
pub mod memory;

pub use bucket::{Bucket, Entry, NatsBucket};
pub use cmd::{Command, Intent};
pub use connect::{ConnectConfig, Session};
pub use engine::Outcome;
pub use error::{KvError, Result};
