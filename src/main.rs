//! Frame Supervisor - keeps an ffmpeg process alive and streams its JPEG frames.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use frame_supervisor::config::{Config, ConfigLoader};
use frame_supervisor::display;
use frame_supervisor::supervisor::{Supervisor, SupervisorEvent};
use frame_supervisor::transcoder::Frame;

#[derive(Parser)]
#[command(
    name = "frame-supervisor",
    about = "Keep ffmpeg running and collect the JPEG frames it emits",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Transcoder overrides shared by every subcommand.
#[derive(clap::Args, Debug)]
struct TranscoderArgs {
    /// Input locator (RTSP URL, file, device).
    input: String,
    /// Output frame rate.
    #[arg(long)]
    fps: Option<u32>,
    /// Output resolution, e.g. 640x480.
    #[arg(long)]
    resolution: Option<String>,
    /// JPEG quality (2 best, 31 worst).
    #[arg(long)]
    quality: Option<u8>,
    /// Transcoder executable.
    #[arg(long)]
    cmd: Option<String>,
    /// Extra transcoder argument, repeatable (e.g. --arg=-rtsp_transport --arg=tcp).
    #[arg(long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the transcoder under supervision.
    Run {
        #[command(flatten)]
        transcoder: TranscoderArgs,
        /// Write each frame to this directory as frame-NNNNNN.jpg.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Stop after this many frames.
        #[arg(long)]
        max_frames: Option<u64>,
    },
    /// Print the transcoder command line without running it.
    Command {
        #[command(flatten)]
        transcoder: TranscoderArgs,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<Config, String> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    loader.load().map_err(|e| e.to_string())
}

fn apply_overrides(config: &mut Config, args: &TranscoderArgs) {
    if let Some(fps) = args.fps {
        config.transcoder.fps = fps;
    }
    if let Some(resolution) = &args.resolution {
        config.transcoder.resolution = Some(resolution.clone());
    }
    if let Some(quality) = args.quality {
        config.transcoder.quality = Some(quality);
    }
    if let Some(cmd) = &args.cmd {
        config.transcoder.cmd.clone_from(cmd);
    }
    if !args.args.is_empty() {
        config.transcoder.args.clone_from(&args.args);
    }
}

async fn write_frame(dir: &Path, frame: &Frame) -> std::io::Result<PathBuf> {
    let path = dir.join(format!("frame-{:06}.jpg", frame.sequence()));
    tokio::fs::write(&path, frame.data()).await?;
    Ok(path)
}

async fn run(
    config: &Config,
    transcoder: &TranscoderArgs,
    output_dir: Option<PathBuf>,
    max_frames: Option<u64>,
) -> ExitCode {
    let options = config.transcoder.to_options(transcoder.input.clone());
    let mut supervisor =
        match Supervisor::from_transcoder_options(&options, config.supervisor.to_options()) {
            Ok(supervisor) => supervisor,
            Err(e) => {
                display::print_error(&e.to_string());
                return ExitCode::from(2);
            }
        };

    if let Some(dir) = &output_dir {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            display::print_error(&format!("Cannot create {}: {e}", dir.display()));
            return ExitCode::from(2);
        }
    }

    let mut events = supervisor.subscribe();
    tracing::info!(command = %supervisor.invocation(), "Starting frame supervisor");

    if let Err(e) = supervisor.start().await {
        display::print_error(&e.to_string());
        return ExitCode::FAILURE;
    }

    let mut failed = false;
    let mut received: u64 = 0;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                tracing::info!("Interrupted, stopping transcoder");
                supervisor.stop().await;
                break;
            }
            event = events.recv() => match event {
                Ok(SupervisorEvent::Started) => display::print_started(&supervisor.invocation().command_line()),
                Ok(SupervisorEvent::Restarted) => display::print_restarted(),
                Ok(SupervisorEvent::Data(frame)) => {
                    let path = match &output_dir {
                        Some(dir) => match write_frame(dir, &frame).await {
                            Ok(path) => Some(path),
                            Err(e) => {
                                display::print_error(&format!("Failed to write frame: {e}"));
                                None
                            }
                        },
                        None => None,
                    };
                    display::print_frame(frame.sequence(), frame.len(), path.as_deref());

                    received += 1;
                    if max_frames.is_some_and(|max| received >= max) {
                        supervisor.stop().await;
                        break;
                    }
                }
                Ok(SupervisorEvent::Error(e)) => {
                    display::print_error(&e.to_string());
                    failed = true;
                }
                Ok(SupervisorEvent::Stopped) => break,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Fell behind the transcoder, frames may be missing; raise supervisor.event_capacity");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    display::print_stopped(&supervisor.stats());
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e);
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Commands::Run {
            transcoder,
            output_dir,
            max_frames,
        } => {
            apply_overrides(&mut config, &transcoder);
            run(&config, &transcoder, output_dir, max_frames).await
        }
        Commands::Command { transcoder } => {
            apply_overrides(&mut config, &transcoder);
            match config.transcoder.to_options(transcoder.input).build() {
                Ok(invocation) => {
                    println!("{invocation}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    display::print_error(&e.to_string());
                    ExitCode::from(2)
                }
            }
        }
    }
}
