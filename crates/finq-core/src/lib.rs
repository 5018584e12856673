//! Core wiring for finq: configuration, the answer composer and the
//! interactive session channel.

pub mod channel;
pub mod composer;
pub mod config;

pub use channel::{Channel, ChannelError, ChannelMessage, CliChannel};
pub use composer::AnswerComposer;
pub use config::Config;
