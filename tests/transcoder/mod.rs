//! Transcoder module tests.

mod demux_test;
mod options_test;
mod process_test;
