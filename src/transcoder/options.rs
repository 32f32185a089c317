//! ffmpeg invocation building.
//!
//! This module provides a builder for the transcoder's command line. The
//! resulting [`InvocationSpec`] is immutable and handed to the supervisor,
//! which passes the tokens to the process verbatim.

use std::borrow::Cow;
use std::fmt;

/// Default transcoder binary.
pub const DEFAULT_TRANSCODER_CMD: &str = "ffmpeg";

/// Default output frame rate.
pub const DEFAULT_FPS: u32 = 10;

/// Default ffmpeg output muxer.
pub const DEFAULT_OUTPUT_FORMAT: &str = "image2";

/// Output sink meaning "write to stdout".
pub const STDOUT_SINK: &str = "-";

/// Valid range for the MJPEG `-q:v` quality scale (lower is better).
pub const QUALITY_RANGE: std::ops::RangeInclusive<u8> = 2..=31;

/// Error type for building an invocation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// The input locator was empty or whitespace.
    #[error("Invalid input: locator is empty")]
    EmptyInput,
    /// The input looked like a URL but failed to parse.
    #[error("Invalid input URL {input}: {reason}")]
    InvalidUrl { input: String, reason: String },
    /// Frame rate of zero.
    #[error("Frame rate must be greater than zero")]
    ZeroFps,
    /// Quality outside the encoder's scale.
    #[error("Quality {0} outside supported range 2..=31")]
    QualityOutOfRange(u8),
    /// Empty executable name.
    #[error("Transcoder command is empty")]
    EmptyCommand,
}

/// A fully assembled transcoder command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSpec {
    program: String,
    args: Vec<String>,
}

impl InvocationSpec {
    /// Create an invocation from a program and its ordered arguments.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The executable name or path.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The ordered argument tokens.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Render the command line with each token shell-escaped.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|token| shell_escape::escape(Cow::Borrowed(token)).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for InvocationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Builder for configuring the ffmpeg command line.
#[derive(Debug, Clone)]
pub struct TranscoderOptions {
    input: String,
    cmd: String,
    fps: u32,
    resolution: Option<String>,
    quality: Option<u8>,
    extra_args: Vec<String>,
    quiet: bool,
    output_format: String,
    output: String,
}

impl TranscoderOptions {
    /// Create options for the given input locator (RTSP URL, file path, device).
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            cmd: DEFAULT_TRANSCODER_CMD.to_string(),
            fps: DEFAULT_FPS,
            resolution: None,
            quality: None,
            extra_args: Vec::new(),
            quiet: true,
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            output: STDOUT_SINK.to_string(),
        }
    }

    /// Override the transcoder executable (e.g. an absolute path to ffmpeg).
    #[must_use]
    pub fn cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = cmd.into();
        self
    }

    /// Set the output frame rate.
    #[must_use]
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the output resolution, e.g. `640x480`.
    #[must_use]
    pub fn resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    /// Set the JPEG quality (2 best, 31 worst).
    #[must_use]
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Custom arguments placed before the generated ones, in `["-flag", "value"]` form.
    #[must_use]
    pub fn extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Silence ffmpeg entirely (`-loglevel quiet`) or only report errors.
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Set the output muxer.
    #[must_use]
    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self
    }

    /// Set the output sink. Defaults to stdout.
    #[must_use]
    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Get the input locator.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Build the command-line arguments.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = self.extra_args.clone();

        args.push("-loglevel".to_string());
        args.push(if self.quiet { "quiet" } else { "error" }.to_string());

        args.push("-i".to_string());
        args.push(self.input.clone());

        args.push("-r".to_string());
        args.push(self.fps.to_string());

        if let Some(resolution) = &self.resolution {
            args.push("-s".to_string());
            args.push(resolution.clone());
        }

        if let Some(quality) = self.quality {
            args.push("-q:v".to_string());
            args.push(quality.to_string());
        }

        args.push("-f".to_string());
        args.push(self.output_format.clone());
        args.push("-update".to_string());
        args.push("1".to_string());
        args.push(self.output.clone());

        args
    }

    /// Validate the options and assemble the invocation.
    ///
    /// # Errors
    ///
    /// Returns `InvocationError` if the input locator is empty or malformed,
    /// the frame rate is zero, or the quality is out of range.
    pub fn build(&self) -> Result<InvocationSpec, InvocationError> {
        validate_input(&self.input)?;

        if self.cmd.trim().is_empty() {
            return Err(InvocationError::EmptyCommand);
        }
        if self.fps == 0 {
            return Err(InvocationError::ZeroFps);
        }
        if let Some(quality) = self.quality {
            if !QUALITY_RANGE.contains(&quality) {
                return Err(InvocationError::QualityOutOfRange(quality));
            }
        }

        Ok(InvocationSpec::new(self.cmd.clone(), self.build_args()))
    }
}

/// Reject empty locators, and locators with a scheme that do not parse as URLs.
fn validate_input(input: &str) -> Result<(), InvocationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InvocationError::EmptyInput);
    }

    if trimmed.contains("://") {
        url::Url::parse(trimmed).map_err(|e| InvocationError::InvalidUrl {
            input: trimmed.to_string(),
            reason: e.to_string(),
        })?;
    }

    Ok(())
}
