use crate::foundation::core::fmt_secs;
use crate::foundation::error::{ClipweaveError, ClipweaveResult};
use crate::graph::{Filter, FilterGraph, FilterNode, PadNamer, PadRef};
use crate::media::ProbeTable;
use crate::model::{Composition, Layer, TransitionKind};

/// Resolve every clip's duration: explicit value, then the first base video's trimmed length,
/// then the composition default.
pub fn resolve_durations(comp: &Composition, probes: &ProbeTable) -> ClipweaveResult<Vec<f64>> {
    comp.clips
        .iter()
        .enumerate()
        .map(|(idx, clip)| {
            if let Some(d) = clip.duration {
                return Ok(d);
            }
            let base_video = clip.layers.iter().find_map(|l| match l {
                Layer::Video(v) if !v.is_overlay() => Some(v),
                _ => None,
            });
            let Some(v) = base_video else {
                return Ok(comp.defaults.duration);
            };
            let length = match v.cut_to {
                Some(end) => end - v.start(),
                None => {
                    let info = probes.get(&v.path).ok_or_else(|| {
                        ClipweaveError::probe(format!("no probe data for '{}'", v.path))
                    })?;
                    info.duration_sec - v.start()
                }
            };
            if !length.is_finite() || length <= 0.0 {
                return Err(ClipweaveError::validation(format!(
                    "clip {idx}: '{}' has no footage after cut_from {}",
                    v.path,
                    v.start()
                )));
            }
            Ok(length)
        })
        .collect()
}

/// Cross-fade actually applied between two clips.
#[derive(Clone, Debug, PartialEq)]
pub struct Crossfade {
    pub effect: String,
    pub duration: f64,
    pub audio_out_curve: String,
    pub audio_in_curve: String,
}

/// The merged video stream and where each clip landed on it.
#[derive(Clone, Debug, PartialEq)]
pub struct Timeline {
    pub pad: String,
    pub duration: f64,
    pub clip_starts: Vec<f64>,
    pub clip_durations: Vec<f64>,
    /// `fades[i]` is the transition between clip `i` and `i + 1`; `None` for hard cuts.
    pub fades: Vec<Option<Crossfade>>,
}

impl Timeline {
    pub fn clip_end(&self, idx: usize) -> f64 {
        self.clip_starts[idx] + self.clip_durations[idx]
    }

    /// Fade overlapping the start of clip `idx`.
    pub fn fade_in(&self, idx: usize) -> Option<&Crossfade> {
        idx.checked_sub(1)
            .and_then(|prev| self.fades.get(prev))
            .and_then(Option::as_ref)
    }

    /// Fade overlapping the end of clip `idx`.
    pub fn fade_out(&self, idx: usize) -> Option<&Crossfade> {
        self.fades.get(idx).and_then(Option::as_ref)
    }
}

/// Join clip pads left to right. Cross-fades overlap neighbours, hard cuts concatenate.
///
/// Fade durations are clamped to both neighbouring clips, and offsets are derived from the
/// running merged length so every clip keeps its full resolved duration.
pub fn assemble(
    comp: &Composition,
    pads: &[String],
    durations: &[f64],
    namer: &mut PadNamer,
    graph: &mut FilterGraph,
) -> Timeline {
    let mut clip_starts = Vec::with_capacity(pads.len());
    let mut fades = Vec::with_capacity(pads.len().saturating_sub(1));
    let mut current = pads[0].clone();
    let mut cum = durations[0];
    clip_starts.push(0.0);

    for idx in 1..pads.len() {
        let prev = durations[idx - 1];
        let next = durations[idx];
        let transition = comp.transition_after(idx - 1);

        match transition.kind() {
            TransitionKind::Cut => {
                let out = namer.fresh("cat");
                graph.push(FilterNode::new(
                    vec![PadRef::label(&current), PadRef::label(&pads[idx])],
                    vec![
                        Filter::new("concat")
                            .arg("n", 2)
                            .arg("v", 1)
                            .arg("a", 0),
                    ],
                    out.clone(),
                ));
                clip_starts.push(cum);
                cum += next;
                fades.push(None);
                current = out;
            }
            TransitionKind::Xfade { effect, duration } => {
                let d = duration.min(prev).min(next);
                if d < duration {
                    tracing::warn!(
                        clip = idx - 1,
                        requested = duration,
                        applied = d,
                        "transition longer than a neighbouring clip; shortened"
                    );
                }
                let offset = (cum - d).max(0.0);
                let out = namer.fresh("xf");
                graph.push(FilterNode::new(
                    vec![PadRef::label(&current), PadRef::label(&pads[idx])],
                    vec![
                        Filter::new("xfade")
                            .text("transition", effect.clone())
                            .arg("duration", fmt_secs(d))
                            .arg("offset", fmt_secs(offset)),
                    ],
                    out.clone(),
                ));
                clip_starts.push(offset);
                cum = offset + next;
                fades.push(Some(Crossfade {
                    effect,
                    duration: d,
                    audio_out_curve: transition.audio_out_curve.clone(),
                    audio_in_curve: transition.audio_in_curve.clone(),
                }));
                current = out;
            }
        }
    }

    Timeline {
        pad: current,
        duration: cum,
        clip_starts,
        clip_durations: durations.to_vec(),
        fades,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Fps;
    use crate::media::MediaInfo;
    use crate::model::{Clip, Transition};

    fn comp(durations: &[f64], transitions: &[Transition]) -> Composition {
        let mut c = Composition::from_json_str(r#"{ "out_path": "o.mp4", "clips": [] }"#).unwrap();
        for (i, d) in durations.iter().enumerate() {
            c.clips.push(Clip {
                layers: Vec::new(),
                duration: Some(*d),
                transition: transitions.get(i).cloned(),
            });
        }
        c
    }

    fn pads(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("clip{i}")).collect()
    }

    fn run(c: &Composition) -> (Timeline, FilterGraph) {
        let durations = resolve_durations(c, &ProbeTable::new()).unwrap();
        let mut namer = PadNamer::new();
        let mut graph = FilterGraph::new();
        let tl = assemble(c, &pads(durations.len()), &durations, &mut namer, &mut graph);
        (tl, graph)
    }

    #[test]
    fn fades_overlap_neighbours() {
        let c = comp(&[2.0, 2.0, 2.0], &[Transition::fade(0.5), Transition::fade(0.5)]);
        let (tl, graph) = run(&c);
        assert!((tl.duration - 5.0).abs() < 1e-9);
        assert_eq!(tl.clip_starts, vec![0.0, 1.5, 3.0]);

        let offsets: Vec<_> = graph
            .nodes()
            .iter()
            .filter_map(|n| n.filter("xfade")?.get("offset").map(str::to_string))
            .collect();
        assert_eq!(offsets, vec!["1.5", "3"]);
        assert_eq!(graph.nodes()[1].inputs[0], PadRef::label("xf0"));
    }

    #[test]
    fn cuts_concatenate() {
        let c = comp(&[1.0, 2.5], &[Transition::cut()]);
        let (tl, graph) = run(&c);
        assert!((tl.duration - 3.5).abs() < 1e-9);
        assert_eq!(tl.pad, "cat0");
        assert_eq!(
            graph.nodes()[0].render(),
            "[clip0][clip1]concat=n=2:v=1:a=0[cat0]"
        );
        assert_eq!(tl.fades, vec![None]);
    }

    #[test]
    fn long_fade_is_clamped_to_the_shorter_clip() {
        let c = comp(&[3.0, 1.0], &[Transition::fade(2.0)]);
        let (tl, graph) = run(&c);
        let xf = graph.nodes()[0].filter("xfade").unwrap();
        assert_eq!(xf.get("duration"), Some("1"));
        assert_eq!(xf.get("offset"), Some("2"));
        assert!((tl.duration - 3.0).abs() < 1e-9);
        assert!((tl.fade_in(1).unwrap().duration - 1.0).abs() < 1e-9);
    }

    #[test]
    fn last_clip_transition_is_ignored_and_single_clip_is_identity() {
        let c = comp(&[4.0], &[Transition::fade(1.0)]);
        let (tl, graph) = run(&c);
        assert!(graph.is_empty());
        assert_eq!(tl.pad, "clip0");
        assert!((tl.duration - 4.0).abs() < 1e-9);
        assert!(tl.fades.is_empty());
    }

    #[test]
    fn default_transition_applies_between_unconfigured_clips() {
        let c = comp(&[2.0, 2.0], &[]);
        let (tl, _) = run(&c);
        assert!((tl.duration - 3.5).abs() < 1e-9);
        assert_eq!(tl.fade_out(0).map(|f| f.effect.as_str()), Some("fade"));
    }

    fn video_comp(layer: &str) -> Composition {
        Composition::from_json_str(&format!(
            r#"{{ "out_path": "o.mp4", "clips": [ {{ "layers": [ {layer} ] }}, {{ "layers": [] }} ] }}"#
        ))
        .unwrap()
    }

    fn probes(duration_sec: f64) -> ProbeTable {
        let mut t = ProbeTable::new();
        t.insert(
            "v.mp4".to_string(),
            MediaInfo {
                source: "v.mp4".to_string(),
                duration_sec,
                width: Some(640),
                height: Some(360),
                fps: Some(Fps::new(25, 1).unwrap()),
                has_audio: false,
            },
        );
        t
    }

    #[test]
    fn duration_comes_from_trimmed_source_or_default() {
        let c = video_comp(r#"{ "type": "video", "path": "v.mp4", "cut_from": 1.0 }"#);
        assert_eq!(resolve_durations(&c, &probes(6.0)).unwrap(), vec![5.0, 4.0]);

        let c = video_comp(r#"{ "type": "video", "path": "v.mp4", "cut_from": 1.0, "cut_to": 2.5 }"#);
        assert_eq!(resolve_durations(&c, &ProbeTable::new()).unwrap(), vec![1.5, 4.0]);
    }

    #[test]
    fn overlay_videos_do_not_set_clip_duration() {
        let c = video_comp(r#"{ "type": "video", "path": "v.mp4", "width": 0.3 }"#);
        assert_eq!(resolve_durations(&c, &ProbeTable::new()).unwrap(), vec![4.0, 4.0]);
    }

    #[test]
    fn cut_past_the_end_is_rejected() {
        let c = video_comp(r#"{ "type": "video", "path": "v.mp4", "cut_from": 8.0 }"#);
        let err = resolve_durations(&c, &probes(6.0)).unwrap_err();
        assert!(matches!(err, ClipweaveError::Validation(_)));

        let c = video_comp(r#"{ "type": "video", "path": "v.mp4" }"#);
        let err = resolve_durations(&c, &ProbeTable::new()).unwrap_err();
        assert!(matches!(err, ClipweaveError::Probe(_)));
    }
}
