//! Overlays that continue across clip boundaries.
//!
//! The same overlay video on consecutive clips should play as one uninterrupted stream, not
//! restart at every clip. Such runs are lifted out of the per-clip graphs and composited once
//! over the merged timeline.

use std::collections::HashSet;

use crate::compile::canvas::OutputFormat;
use crate::compile::layers::{self, OverlaySource, OverlayTiming};
use crate::compile::timeline::Timeline;
use crate::graph::{FilterGraph, InputRef, InputRegistry, PadNamer};
use crate::model::{Composition, Layer, VideoLayer};

/// One overlay video spanning clips `members[0].0 ..= members.last().0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContinuousOverlay {
    pub path: String,
    /// `(clip index, layer index)` of the layer in every clip of the run.
    pub members: Vec<(usize, usize)>,
}

impl ContinuousOverlay {
    pub fn first_clip(&self) -> usize {
        self.members[0].0
    }

    pub fn last_clip(&self) -> usize {
        self.members[self.members.len() - 1].0
    }
}

fn overlay_video(layer: &Layer) -> Option<&VideoLayer> {
    match layer {
        Layer::Video(v) if v.is_overlay() => Some(v),
        _ => None,
    }
}

/// Find runs of two or more consecutive clips carrying an overlay video with the same path.
pub fn detect(comp: &Composition) -> Vec<ContinuousOverlay> {
    let mut claimed = HashSet::<(usize, usize)>::new();
    let mut runs = Vec::new();

    for (ci, clip) in comp.clips.iter().enumerate() {
        for (li, layer) in clip.layers.iter().enumerate() {
            let Some(v) = overlay_video(layer) else {
                continue;
            };
            if claimed.contains(&(ci, li)) {
                continue;
            }

            let mut members = vec![(ci, li)];
            for (cj, next) in comp.clips.iter().enumerate().skip(ci + 1) {
                let found = next.layers.iter().enumerate().position(|(lj, l)| {
                    !claimed.contains(&(cj, lj)) && overlay_video(l).is_some_and(|o| o.path == v.path)
                });
                match found {
                    Some(lj) => members.push((cj, lj)),
                    None => break,
                }
            }

            if members.len() >= 2 {
                claimed.extend(members.iter().copied());
                runs.push(ContinuousOverlay {
                    path: v.path.clone(),
                    members,
                });
            }
        }
    }
    runs
}

/// Layers owned by a continuous run; per-clip compilation skips them.
pub fn claimed_layers(runs: &[ContinuousOverlay]) -> HashSet<(usize, usize)> {
    runs.iter()
        .flat_map(|r| r.members.iter().copied())
        .collect()
}

/// Register one input per run. Called before any clip so runs get the lowest slots.
pub(crate) fn register_inputs(runs: &[ContinuousOverlay], inputs: &mut InputRegistry) -> Vec<InputRef> {
    runs.iter()
        .map(|r| inputs.add(&r.path, Vec::new()))
        .collect()
}

/// Composite every run over `base`, timed against the merged timeline, and return the new pad.
///
/// Placement, trim and size come from the run's first layer. The overlay starts where the
/// first clip starts and lasts until the last clip ends, fades included.
#[allow(clippy::too_many_arguments)]
pub(crate) fn composite(
    comp: &Composition,
    runs: &[ContinuousOverlay],
    run_inputs: Vec<InputRef>,
    timeline: &Timeline,
    base: String,
    format: OutputFormat,
    namer: &mut PadNamer,
    graph: &mut FilterGraph,
) -> String {
    let mut current = base;
    for (run, input) in runs.iter().zip(run_inputs) {
        let (ci, li) = run.members[0];
        let Some(v) = comp.clips[ci].layers.get(li).and_then(overlay_video) else {
            continue;
        };
        let start = timeline.clip_starts[run.first_clip()];
        let span = timeline.clip_end(run.last_clip()) - start;
        tracing::debug!(path = %run.path, start, span, "continuous overlay");

        let fragment = layers::overlay_source(
            &OverlaySource::Video(v),
            input,
            &v.frame,
            format,
            OverlayTiming {
                offset: Some(start),
                duration: span,
            },
            namer,
        );
        let ov = graph.absorb(fragment);
        current = layers::composite_overlay(&current, &ov, &v.frame, format.canvas, namer, graph);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::timeline;
    use crate::foundation::core::{Canvas, Fps};
    use crate::media::ProbeTable;

    const LOGO: &str = r#"{ "type": "video", "path": "logo.mp4", "width": 0.2, "height": 0.2, "position": "top-right" }"#;

    fn comp(clips: &[&str]) -> Composition {
        let clips = clips
            .iter()
            .map(|layers| format!(r#"{{ "duration": 2, "layers": [ {layers} ] }}"#))
            .collect::<Vec<_>>()
            .join(",");
        Composition::from_json_str(&format!(
            r#"{{ "out_path": "o.mp4", "clips": [ {clips} ] }}"#
        ))
        .unwrap()
    }

    #[test]
    fn consecutive_clips_with_same_overlay_form_a_run() {
        let color = r#"{ "type": "fill-color", "color": "red" }"#;
        let with_logo = format!("{color}, {LOGO}");
        let c = comp(&[with_logo.as_str(), with_logo.as_str(), color, with_logo.as_str()]);
        let runs = detect(&c);
        assert_eq!(
            runs,
            vec![ContinuousOverlay {
                path: "logo.mp4".to_string(),
                members: vec![(0, 1), (1, 1)],
            }]
        );
        let claimed = claimed_layers(&runs);
        assert!(claimed.contains(&(0, 1)));
        assert!(!claimed.contains(&(3, 1)));
    }

    #[test]
    fn different_paths_do_not_join() {
        let other = LOGO.replace("logo.mp4", "other.mp4");
        let c = comp(&[LOGO, other.as_str()]);
        assert!(detect(&c).is_empty());
    }

    #[test]
    fn run_spans_the_merged_timeline() {
        let mut c = comp(&[LOGO, LOGO]);
        c.clips[1].duration = Some(3.0);
        let runs = detect(&c);
        let mut inputs = InputRegistry::new();
        let run_inputs = register_inputs(&runs, &mut inputs);

        let durations = timeline::resolve_durations(&c, &ProbeTable::new()).unwrap();
        let mut namer = PadNamer::new();
        let mut graph = FilterGraph::new();
        let pads = vec!["a".to_string(), "b".to_string()];
        let tl = timeline::assemble(&c, &pads, &durations, &mut namer, &mut graph);

        let format = OutputFormat {
            canvas: Canvas {
                width: 640,
                height: 360,
            },
            fps: Fps::new(25, 1).unwrap(),
        };
        let out = composite(
            &c,
            &runs,
            run_inputs,
            &tl,
            tl.pad.clone(),
            format,
            &mut namer,
            &mut graph,
        );
        assert_eq!(out, "ovl0");
        assert_eq!(inputs.len(), 1);

        let src = graph
            .nodes()
            .iter()
            .find(|n| n.outputs[0] == "ovsrc0")
            .unwrap();
        assert_eq!(src.inputs, vec![crate::graph::PadRef::video(0)]);
        assert_eq!(src.filter("trim").and_then(|f| f.get("duration")), Some("4.5"));
        let last = graph.nodes().last().unwrap();
        assert_eq!(last.filter("overlay").and_then(|f| f.get("x")), Some("512"));
    }
}
