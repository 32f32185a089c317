//! Transcoder module for ffmpeg process spawning and frame demultiplexing.

mod demux;
mod options;
mod process;

pub use demux::*;
pub use options::*;
pub use process::*;
