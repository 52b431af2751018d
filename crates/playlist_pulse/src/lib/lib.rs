mod accumulator;
pub mod auth;
mod bot;
pub mod chat;
pub mod extractor;
pub mod http;
mod publisher;
pub mod tracing;
pub mod types;
pub mod yt;

pub use accumulator::Accumulator;
pub use bot::{builder::PlaylistBotBuilder, PlaylistBot};
pub use publisher::{PlaylistPublisher, PublishReport};
