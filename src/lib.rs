#[cfg(feature = "desktop")]
pub mod camera;
pub mod config;
pub mod error;
pub mod exercise;
pub mod filter;
pub mod game;
pub mod mood;
pub mod pose;
pub mod render;
pub mod safety;
pub mod session;

pub use config::Config;
pub use error::SessionError;
pub use session::{Command, CommandSource, RenderSink, Session, SessionSummary, Snapshot, Step};
