//! vidqueue - priority job queue for video enhancement and transcoding engines.
//!
//! Jobs are submitted to a [`pipeline::JobManager`], persisted to disk, and run by
//! a fixed pool of workers on whichever external engine (Topaz Video AI, FFmpeg,
//! HandBrake) is installed.

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use error::{Error, Result};
