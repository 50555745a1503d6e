//! Composition → ffmpeg filter graph.
//!
//! Compilation is pure: it consumes a validated [`Composition`] plus probe data and yields a
//! [`FilterGraph`], the merged [`Timeline`], and a ready-to-run [`CompiledInvocation`]. Nothing
//! here touches the filesystem or spawns processes.

pub mod audio;
pub mod canvas;
pub mod layers;
pub mod overlays;
pub mod timeline;

use std::path::PathBuf;

use crate::encode_ffmpeg::{CompiledInvocation, default_audio_codec_args, default_video_codec_args};
use crate::foundation::error::ClipweaveResult;
use crate::graph::{FilterGraph, InputRegistry, PadNamer};
use crate::media::ProbeTable;
use crate::model::Composition;

pub use canvas::{OutputFormat, resolve_output_format};
pub use overlays::ContinuousOverlay;
pub use timeline::{Crossfade, Timeline, resolve_durations};

#[derive(Clone, Debug)]
pub struct CompileOpts {
    /// Force the low-resolution proxy regardless of the composition flag.
    pub fast: bool,
    /// Overwrite the destination when it exists.
    pub overwrite: bool,
}

impl Default for CompileOpts {
    fn default() -> Self {
        Self {
            fast: false,
            overwrite: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompileOutput {
    pub format: OutputFormat,
    pub timeline: Timeline,
    pub graph: FilterGraph,
    pub continuous_overlays: Vec<ContinuousOverlay>,
    pub invocation: CompiledInvocation,
}

#[tracing::instrument(skip_all, fields(clips = comp.clips.len()))]
pub fn compile(
    comp: &Composition,
    probes: &ProbeTable,
    opts: &CompileOpts,
) -> ClipweaveResult<CompileOutput> {
    comp.validate()?;

    let fast = comp.fast || opts.fast;
    let format = resolve_output_format(comp, probes, fast);
    let durations = resolve_durations(comp, probes)?;
    tracing::debug!(
        width = format.canvas.width,
        height = format.canvas.height,
        fps = %format.fps.to_ffmpeg(),
        "output format"
    );

    let runs = overlays::detect(comp);
    let skip = overlays::claimed_layers(&runs);

    let mut namer = PadNamer::new();
    let mut inputs = InputRegistry::new();
    let mut graph = FilterGraph::new();
    let run_inputs = overlays::register_inputs(&runs, &mut inputs);

    let mut clip_outputs = Vec::with_capacity(comp.clips.len());
    for (idx, clip) in comp.clips.iter().enumerate() {
        let ctx = layers::LayerCtx {
            format,
            duration: durations[idx],
            keep_source_audio: comp.keep_source_audio,
            probes,
        };
        clip_outputs.push(layers::compile_clip(
            idx,
            clip,
            &ctx,
            &skip,
            &mut namer,
            &mut inputs,
            &mut graph,
        ));
    }

    let pads = clip_outputs
        .iter()
        .map(|c| c.pad.clone())
        .collect::<Vec<_>>();
    let timeline = timeline::assemble(comp, &pads, &durations, &mut namer, &mut graph);

    let video_pad = overlays::composite(
        comp,
        &runs,
        run_inputs,
        &timeline,
        timeline.pad.clone(),
        format,
        &mut namer,
        &mut graph,
    );

    let sources = audio::collect_sources(comp, &clip_outputs, &timeline, &mut inputs);
    let audio_pads = sources
        .iter()
        .map(|s| audio::source_chain(s, &mut namer, &mut graph))
        .collect::<Vec<_>>();
    let audio_pad = audio::mix(&audio_pads, comp.output_volume, &mut namer, &mut graph);

    tracing::debug!(
        nodes = graph.nodes().len(),
        inputs = inputs.len(),
        duration = timeline.duration,
        audio = audio_pad.is_some(),
        "filter graph compiled"
    );

    let invocation = CompiledInvocation {
        inputs: inputs.into_inputs(),
        filter_graph: graph.render(),
        video_pad,
        audio_pad,
        fps: format.fps,
        duration: timeline.duration,
        video_codec_args: comp
            .video_codec_args
            .clone()
            .unwrap_or_else(|| default_video_codec_args(fast)),
        audio_codec_args: comp
            .audio_codec_args
            .clone()
            .unwrap_or_else(default_audio_codec_args),
        out_path: PathBuf::from(&comp.out_path),
        overwrite: opts.overwrite,
    };

    Ok(CompileOutput {
        format,
        timeline,
        graph,
        continuous_overlays: runs,
        invocation,
    })
}
