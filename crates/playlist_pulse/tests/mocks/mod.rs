pub mod chat;
pub mod host;
