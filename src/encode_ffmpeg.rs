use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::foundation::core::{Fps, fmt_secs};
use crate::foundation::error::{ClipweaveError, ClipweaveResult};
use crate::graph::InputSpec;

/// Everything needed to run ffmpeg once: inputs, filter graph, mapping and codec arguments.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CompiledInvocation {
    pub inputs: Vec<InputSpec>,
    pub filter_graph: String,
    pub video_pad: String,
    /// `None` when the composition has no audio; the output is then video-only.
    pub audio_pad: Option<String>,
    pub fps: Fps,
    pub duration: f64,
    pub video_codec_args: Vec<String>,
    pub audio_codec_args: Vec<String>,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

pub fn default_video_codec_args(fast: bool) -> Vec<String> {
    let preset = if fast { "ultrafast" } else { "medium" };
    [
        "-c:v",
        "libx264",
        "-preset",
        preset,
        "-crf",
        "20",
        "-pix_fmt",
        "yuv420p",
        "-movflags",
        "+faststart",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn default_audio_codec_args() -> Vec<String> {
    ["-c:a", "aac", "-b:a", "192k"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Clone, Debug)]
pub struct ExecOpts {
    pub ffmpeg: String,
    pub loglevel: String,
    /// Keep ffmpeg's stdout (for `pipe:` destinations); otherwise it is discarded.
    pub capture_stdout: bool,
}

impl Default for ExecOpts {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            loglevel: "error".to_string(),
            capture_stdout: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RunOutput {
    pub stdout: Option<Vec<u8>>,
}

impl CompiledInvocation {
    pub fn map_args(&self) -> Vec<String> {
        let mut args = vec!["-map".to_string(), format!("[{}]", self.video_pad)];
        if let Some(audio) = &self.audio_pad {
            args.push("-map".to_string());
            args.push(format!("[{audio}]"));
        }
        args
    }

    pub fn output_args(&self) -> Vec<String> {
        let mut args = vec!["-r".to_string(), self.fps.to_ffmpeg()];
        args.extend(self.video_codec_args.iter().cloned());
        if self.audio_pad.is_some() {
            args.extend(self.audio_codec_args.iter().cloned());
        }
        args.push("-t".to_string());
        args.push(fmt_secs(self.duration));
        args.push(if self.overwrite { "-y" } else { "-n" }.to_string());
        args.push(self.out_path.to_string_lossy().into_owned());
        args
    }

    /// Full ffmpeg argument list, without the program name.
    pub fn to_args(&self, loglevel: &str) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            loglevel.to_string(),
            "-nostdin".to_string(),
        ];
        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.clone());
        }
        args.push("-filter_complex".to_string());
        args.push(self.filter_graph.clone());
        args.extend(self.map_args());
        args.extend(self.output_args());
        args
    }

    /// Shell-friendly rendering for dry runs and logs.
    pub fn command_line(&self, ffmpeg: &str, loglevel: &str) -> String {
        std::iter::once(ffmpeg.to_string())
            .chain(self.to_args(loglevel))
            .map(|a| shell_quote(&a))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[tracing::instrument(skip_all, fields(out = %self.out_path.display(), inputs = self.inputs.len()))]
    pub fn run(&self, opts: &ExecOpts) -> ClipweaveResult<RunOutput> {
        if self.out_path.as_os_str().is_empty() {
            return Err(ClipweaveError::validation("output path must be non-empty"));
        }
        ensure_parent_dir(&self.out_path)?;

        if !self.overwrite && self.out_path.exists() {
            return Err(ClipweaveError::validation(format!(
                "output file '{}' already exists",
                self.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path(&opts.ffmpeg) {
            return Err(ClipweaveError::execution(format!(
                "'{}' is required for composing, but was not found on PATH",
                opts.ffmpeg
            )));
        }

        let mut cmd = Command::new(&opts.ffmpeg);
        cmd.args(self.to_args(&opts.loglevel))
            .stdin(Stdio::null())
            .stdout(if opts.capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped());

        tracing::debug!(graph = %self.filter_graph, "spawning ffmpeg");
        let output = cmd.output().map_err(|e| {
            ClipweaveError::execution(format!(
                "failed to spawn {} (is it installed and on PATH?): {e}",
                opts.ffmpeg
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClipweaveError::execution(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tracing::info!(duration = self.duration, "composition written");
        Ok(RunOutput {
            stdout: opts.capture_stdout.then_some(output.stdout),
        })
    }
}

pub fn is_ffmpeg_on_path(ffmpeg: &str) -> bool {
    Command::new(ffmpeg)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> ClipweaveResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(audio: bool) -> CompiledInvocation {
        CompiledInvocation {
            inputs: vec![
                InputSpec {
                    path: "a.mp4".to_string(),
                    options: Vec::new(),
                },
                InputSpec {
                    path: "still.png".to_string(),
                    options: vec!["-loop".to_string(), "1".to_string()],
                },
            ],
            filter_graph: "[0:v]null[v0]".to_string(),
            video_pad: "v0".to_string(),
            audio_pad: audio.then(|| "aout0".to_string()),
            fps: Fps::new(30000, 1001).unwrap(),
            duration: 4.5,
            video_codec_args: default_video_codec_args(false),
            audio_codec_args: default_audio_codec_args(),
            out_path: PathBuf::from("out/final.mp4"),
            overwrite: true,
        }
    }

    #[test]
    fn args_are_ordered_inputs_graph_maps_output() {
        let args = invocation(true).to_args("error");
        let pos = |s: &str| args.iter().position(|a| a == s).unwrap();
        assert_eq!(&args[..4], ["-hide_banner", "-loglevel", "error", "-nostdin"]);
        assert_eq!(&args[4..6], ["-i", "a.mp4"]);
        assert_eq!(&args[6..10], ["-loop", "1", "-i", "still.png"]);
        assert!(pos("-filter_complex") < pos("-map"));
        assert_eq!(args[pos("-r") + 1], "30000/1001");
        assert_eq!(args[pos("-t") + 1], "4.5");
        assert!(args.contains(&"[aout0]".to_string()));
        assert!(args.contains(&"aac".to_string()));
        assert_eq!(args[args.len() - 2..], ["-y", "out/final.mp4"]);
    }

    #[test]
    fn video_only_output_has_no_audio_map_or_codec() {
        let inv = invocation(false);
        assert_eq!(inv.map_args(), vec!["-map", "[v0]"]);
        assert!(!inv.output_args().contains(&"-c:a".to_string()));
    }

    #[test]
    fn overwrite_flag_switches_to_no_clobber() {
        let mut inv = invocation(false);
        inv.overwrite = false;
        assert!(inv.output_args().contains(&"-n".to_string()));
    }

    #[test]
    fn fast_codec_preset() {
        let args = default_video_codec_args(true);
        assert!(args.windows(2).any(|w| w == ["-preset", "ultrafast"]));
    }

    #[test]
    fn command_line_quotes_graph_text() {
        let line = invocation(false).command_line("ffmpeg", "error");
        assert!(line.starts_with("ffmpeg -hide_banner"));
        assert!(line.contains("'[0:v]null[v0]'"));
    }

    #[test]
    fn missing_ffmpeg_is_an_execution_error() {
        let dir = std::env::temp_dir().join("clipweave-missing-ffmpeg");
        let mut inv = invocation(false);
        inv.out_path = dir.join("o.mp4");
        let opts = ExecOpts {
            ffmpeg: "clipweave-no-such-ffmpeg".to_string(),
            ..ExecOpts::default()
        };
        let err = inv.run(&opts).unwrap_err();
        assert!(matches!(err, ClipweaveError::Execution(_)));
    }
}
