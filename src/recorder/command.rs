//! ffmpeg invocation per host platform.

use std::path::PathBuf;

use crate::config::{CaptureSettings, RecorderConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

/// What to capture and where to write it.
#[derive(Debug, Clone)]
pub struct CaptureSpec {
    pub output_path: PathBuf,
    pub settings: CaptureSettings,
    pub platform: Platform,
    /// X11 display used on Linux.
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCommand {
    pub program: String,
    pub args: Vec<String>,
}

fn push<I, S>(args: &mut Vec<String>, items: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.extend(items.into_iter().map(Into::into));
}

/// Build the ffmpeg command line for `spec`.
///
/// Linux grabs X11 plus the PulseAudio source, macOS uses avfoundation
/// (video only unless an audio device is configured), Windows uses gdigrab.
pub fn build_capture_command(spec: &CaptureSpec, config: &RecorderConfig) -> CaptureCommand {
    let CaptureSettings { width, height, fps } = spec.settings;
    let mut args = Vec::new();
    push(&mut args, ["-hide_banner", "-loglevel", "error"]);

    match spec.platform {
        Platform::Linux => {
            push(
                &mut args,
                ["-f", "pulse", "-ac", "2", "-i", config.linux_audio_source.as_str()],
            );
            push(&mut args, ["-f", "x11grab", "-r"]);
            args.push(fps.to_string());
            args.push("-s".to_string());
            args.push(format!("{}x{}", width, height));
            push(&mut args, ["-i", spec.display.as_str()]);
            push(&mut args, ["-vcodec", "libx264", "-pix_fmt", "yuv420p"]);
            push(&mut args, ["-preset", config.preset.as_str(), "-crf"]);
            args.push(config.crf.to_string());
            push(
                &mut args,
                ["-acodec", "aac", "-b:a", config.audio_bitrate.as_str()],
            );
        }
        Platform::MacOs => {
            push(&mut args, ["-f", "avfoundation", "-r"]);
            args.push(fps.to_string());
            push(&mut args, ["-i", config.macos_input.as_str()]);
            push(&mut args, ["-pix_fmt", "yuv420p"]);
            push(&mut args, ["-preset", config.preset.as_str(), "-crf"]);
            args.push(config.crf.to_string());
        }
        Platform::Windows => {
            push(&mut args, ["-f", "gdigrab", "-framerate"]);
            args.push(fps.to_string());
            args.push("-video_size".to_string());
            args.push(format!("{}x{}", width, height));
            push(&mut args, ["-i", "desktop"]);
            push(&mut args, ["-vcodec", "libx264", "-pix_fmt", "yuv420p"]);
            push(&mut args, ["-preset", config.preset.as_str(), "-crf"]);
            args.push(config.crf.to_string());
        }
    }

    args.push("-y".to_string());
    args.push(spec.output_path.to_string_lossy().to_string());

    CaptureCommand {
        program: config.ffmpeg.clone(),
        args,
    }
}
