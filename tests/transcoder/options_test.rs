//! Tests for transcoder invocation building.

use frame_supervisor::transcoder::{InvocationError, InvocationSpec, TranscoderOptions};

#[test]
fn build_uses_ffmpeg_by_default() {
    let invocation = TranscoderOptions::new("rtsp://camera/stream").build().unwrap();
    assert_eq!(invocation.program(), "ffmpeg");
    assert_eq!(invocation.args().last().map(String::as_str), Some("-"));
}

#[test]
fn builder_chaining() {
    let args = TranscoderOptions::new("rtsp://camera/stream")
        .fps(15)
        .resolution("1280x720")
        .quality(3)
        .build_args();

    assert!(args.windows(2).any(|w| w == ["-r", "15"]));
    assert!(args.windows(2).any(|w| w == ["-s", "1280x720"]));
    assert!(args.windows(2).any(|w| w == ["-q:v", "3"]));
    assert!(args.windows(2).any(|w| w == ["-i", "rtsp://camera/stream"]));
    assert!(args.windows(2).any(|w| w == ["-f", "image2"]));
}

#[test]
fn resolution_and_quality_omitted_when_unset() {
    let args = TranscoderOptions::new("in.mp4").build_args();
    assert!(!args.contains(&"-s".to_string()));
    assert!(!args.contains(&"-q:v".to_string()));
}

#[test]
fn custom_cmd_and_output() {
    let invocation = TranscoderOptions::new("in.mp4")
        .cmd("/usr/local/bin/ffmpeg")
        .output("pipe:1")
        .output_format("image2pipe")
        .build()
        .unwrap();

    assert_eq!(invocation.program(), "/usr/local/bin/ffmpeg");
    assert_eq!(invocation.args().last().map(String::as_str), Some("pipe:1"));
    assert!(invocation.args().windows(2).any(|w| w == ["-f", "image2pipe"]));
}

#[test]
fn empty_input_is_configuration_error() {
    assert_eq!(
        TranscoderOptions::new("").build().unwrap_err(),
        InvocationError::EmptyInput
    );
    assert_eq!(
        TranscoderOptions::new("   ").build().unwrap_err(),
        InvocationError::EmptyInput
    );
}

#[test]
fn zero_fps_is_rejected() {
    assert_eq!(
        TranscoderOptions::new("in.mp4").fps(0).build().unwrap_err(),
        InvocationError::ZeroFps
    );
}

#[test]
fn quality_out_of_range_is_rejected() {
    assert_eq!(
        TranscoderOptions::new("in.mp4").quality(1).build().unwrap_err(),
        InvocationError::QualityOutOfRange(1)
    );
    assert!(TranscoderOptions::new("in.mp4").quality(31).build().is_ok());
}

#[test]
fn empty_command_is_rejected() {
    assert_eq!(
        TranscoderOptions::new("in.mp4").cmd(" ").build().unwrap_err(),
        InvocationError::EmptyCommand
    );
}

#[test]
fn command_line_escapes_tokens() {
    let invocation = InvocationSpec::new(
        "ffmpeg",
        vec!["-i".to_string(), "my video.mp4".to_string()],
    );
    assert_eq!(invocation.command_line(), "ffmpeg -i 'my video.mp4'");
    assert_eq!(invocation.to_string(), invocation.command_line());
}
