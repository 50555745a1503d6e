use crate::compile::layers::ClipOutput;
use crate::compile::timeline::Timeline;
use crate::foundation::core::{fmt_num, fmt_secs};
use crate::graph::{Filter, FilterGraph, FilterNode, InputRegistry, PadNamer, PadRef};
use crate::model::Composition;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Fade {
    pub duration: f64,
    pub curve: String,
}

/// One audio stream before mixing: which input, which slice of it, and where it lands.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct AudioSource {
    pub input: usize,
    pub trim_start: f64,
    pub trim_end: Option<f64>,
    /// Upper bound on the slice length (the clip it belongs to).
    pub max_duration: Option<f64>,
    pub volume: f64,
    /// Offset on the output timeline in seconds.
    pub delay: f64,
    pub fade_in: Option<Fade>,
    pub fade_out: Option<Fade>,
}

impl AudioSource {
    fn length(&self) -> Option<f64> {
        match (self.trim_end.map(|e| e - self.trim_start), self.max_duration) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Gather every audio stream in mix order: kept clip audio, audio layers, tracks, soundtrack.
///
/// Kept source audio reuses the input slot of its video layer. Everything else registers a
/// new input after the video inputs.
pub(crate) fn collect_sources(
    comp: &Composition,
    clips: &[ClipOutput],
    timeline: &Timeline,
    inputs: &mut InputRegistry,
) -> Vec<AudioSource> {
    let mut sources = Vec::new();

    for (idx, clip) in clips.iter().enumerate() {
        let duration = timeline.clip_durations[idx];
        for kept in &clip.kept_audio {
            sources.push(AudioSource {
                input: kept.input,
                trim_start: kept.trim_start,
                trim_end: kept.trim_end,
                max_duration: Some(duration),
                volume: kept.volume,
                delay: timeline.clip_starts[idx],
                fade_in: timeline.fade_in(idx).map(|f| Fade {
                    duration: f.duration,
                    curve: f.audio_in_curve.clone(),
                }),
                fade_out: timeline.fade_out(idx).map(|f| Fade {
                    duration: f.duration,
                    curve: f.audio_out_curve.clone(),
                }),
            });
        }
    }

    for (idx, clip) in clips.iter().enumerate() {
        for layer in &clip.audio_layers {
            let input = inputs.add(&layer.path, Vec::new());
            sources.push(AudioSource {
                input: input.index,
                trim_start: layer.cut_from.unwrap_or(0.0).max(0.0),
                trim_end: layer.cut_to,
                max_duration: Some(timeline.clip_durations[idx]),
                volume: layer.mix_volume,
                delay: timeline.clip_starts[idx],
                fade_in: None,
                fade_out: None,
            });
        }
    }

    for track in &comp.audio_tracks {
        let input = inputs.add(&track.path, Vec::new());
        sources.push(AudioSource {
            input: input.index,
            trim_start: track.cut_from.unwrap_or(0.0).max(0.0),
            trim_end: track.cut_to,
            max_duration: None,
            volume: track.mix_volume,
            delay: track.start,
            fade_in: None,
            fade_out: None,
        });
    }

    if let Some(path) = &comp.audio_file {
        let input = inputs.add(path, Vec::new());
        sources.push(AudioSource {
            input: input.index,
            trim_start: 0.0,
            trim_end: None,
            max_duration: None,
            volume: 1.0,
            delay: 0.0,
            fade_in: None,
            fade_out: None,
        });
    }

    sources
}

/// Trim, fade, level and position one source. Returns its pad.
pub(crate) fn source_chain(src: &AudioSource, namer: &mut PadNamer, graph: &mut FilterGraph) -> String {
    let mut atrim = Filter::new("atrim").arg("start", fmt_secs(src.trim_start));
    let length = src.length();
    if let Some(len) = length {
        atrim = atrim.arg("duration", fmt_secs(len));
    }
    let mut filters = vec![atrim, Filter::new("asetpts").positional("PTS-STARTPTS")];

    if let Some(fade) = &src.fade_in {
        filters.push(
            Filter::new("afade")
                .arg("t", "in")
                .arg("st", 0)
                .arg("d", fmt_secs(fade.duration))
                .text("curve", fade.curve.clone()),
        );
    }
    if let (Some(fade), Some(len)) = (&src.fade_out, length) {
        filters.push(
            Filter::new("afade")
                .arg("t", "out")
                .arg("st", fmt_secs(len - fade.duration))
                .arg("d", fmt_secs(fade.duration))
                .text("curve", fade.curve.clone()),
        );
    }
    filters.push(Filter::new("volume").positional(fmt_num(src.volume)));

    let delay_ms = (src.delay * 1000.0).round() as i64;
    if delay_ms > 0 {
        filters.push(
            Filter::new("adelay")
                .arg("delays", delay_ms)
                .arg("all", 1),
        );
    }

    let out = namer.fresh("aud");
    graph.push(FilterNode::new(
        vec![PadRef::audio(src.input)],
        filters,
        out.clone(),
    ));
    out
}

/// Mix positioned sources into the single output audio pad. `None` when there is nothing to mix.
pub(crate) fn mix(
    pads: &[String],
    output_volume: Option<f64>,
    namer: &mut PadNamer,
    graph: &mut FilterGraph,
) -> Option<String> {
    if pads.is_empty() {
        return None;
    }
    let mut filters = Vec::new();
    if pads.len() > 1 {
        // Keep per-source levels as given; amix would otherwise scale each input by 1/n.
        filters.push(
            Filter::new("amix")
                .arg("inputs", pads.len())
                .arg("duration", "longest")
                .arg("normalize", 0),
        );
    }
    match output_volume {
        Some(v) => filters.push(Filter::new("volume").positional(fmt_num(v))),
        None if filters.is_empty() => filters.push(Filter::new("anull")),
        None => {}
    }

    let out = namer.fresh("aout");
    graph.push(FilterNode::new(
        pads.iter().map(PadRef::label).collect(),
        filters,
        out.clone(),
    ));
    Some(out)
}
