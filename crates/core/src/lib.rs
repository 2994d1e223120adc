//! Shared foundation for the Lantern renderer.
//!
//! This crate collects the pieces every other crate leans on:
//! - Error type and result alias
//! - Logging initialization
//! - Frame timing
//! - Render configuration

mod config;
mod error;
mod logging;
mod timer;

pub use config::RenderConfig;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::FrameTimer;
