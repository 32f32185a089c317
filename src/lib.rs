//! Frame Supervisor - keeps an ffmpeg process alive and streams its JPEG frames.

pub mod config;
pub mod display;
pub mod supervisor;
pub mod transcoder;
