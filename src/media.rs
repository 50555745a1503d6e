use std::collections::BTreeMap;
use std::process::{Command, Stdio};

use rayon::prelude::*;

use crate::foundation::core::Fps;
use crate::foundation::error::{ClipweaveError, ClipweaveResult};
use crate::model::{Composition, Layer};

/// What ffprobe reports about one source.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MediaInfo {
    pub source: String,
    pub duration_sec: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<Fps>,
    pub has_audio: bool,
}

/// Probe results keyed by source path.
pub type ProbeTable = BTreeMap<String, MediaInfo>;

pub fn is_ffprobe_on_path(ffprobe: &str) -> bool {
    Command::new(ffprobe)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Query a local path or URL for duration, resolution and frame rate.
#[tracing::instrument(skip(ffprobe))]
pub fn probe_media(ffprobe: &str, source: &str) -> ClipweaveResult<MediaInfo> {
    let out = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source)
        .output()
        .map_err(|e| ClipweaveError::probe(format!("failed to run {ffprobe}: {e}")))?;
    if !out.status.success() {
        return Err(ClipweaveError::probe(format!(
            "ffprobe failed for '{source}': {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    parse_probe_json(source, &out.stdout)
}

pub(crate) fn parse_probe_json(source: &str, json: &[u8]) -> ClipweaveResult<MediaInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| ClipweaveError::probe(format!("ffprobe json parse failed: {e}")))?;

    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| {
            ClipweaveError::probe(format!("ffprobe reported no usable duration for '{source}'"))
        })?;

    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaInfo {
        source: source.to_string(),
        duration_sec,
        width: video_stream.and_then(|s| s.width),
        height: video_stream.and_then(|s| s.height),
        fps: video_stream
            .and_then(|s| s.r_frame_rate.as_deref())
            .and_then(parse_ff_ratio),
        has_audio,
    })
}

/// Parse an ffmpeg rational such as `30000/1001`. Zero numerator or denominator yields `None`.
pub fn parse_ff_ratio(s: &str) -> Option<Fps> {
    let mut parts = s.trim().split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = match parts.next() {
        Some(b) => b.parse::<u32>().ok()?,
        None => 1,
    };
    if a == 0 || b == 0 {
        return None;
    }
    Fps::new(a, b).ok()
}

/// Every source whose probe data the compiler consults: all video layers, base or overlay.
pub fn sources_to_probe(comp: &Composition) -> Vec<String> {
    let mut out = Vec::<String>::new();
    for clip in &comp.clips {
        for layer in &clip.layers {
            if let Layer::Video(v) = layer
                && !out.contains(&v.path)
            {
                out.push(v.path.clone());
            }
        }
    }
    out
}

/// Probe distinct sources concurrently. The first failure aborts the whole step.
#[tracing::instrument(skip(ffprobe, sources), fields(count = sources.len()))]
pub fn probe_all(ffprobe: &str, sources: &[String]) -> ClipweaveResult<ProbeTable> {
    let infos = sources
        .par_iter()
        .map(|s| probe_media(ffprobe, s))
        .collect::<ClipweaveResult<Vec<_>>>()?;
    Ok(infos.into_iter().map(|i| (i.source.clone(), i)).collect())
}
