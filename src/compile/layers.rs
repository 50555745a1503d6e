//! Per-layer filter compilation.
//!
//! Every visual layer becomes a [`Fragment`] with its own output pad. Base layers fill the
//! canvas (pad/crop/stretch) and are normalized to the canvas rate and timebase; overlay
//! layers keep their requested footprint and are composited at a pixel position. Titles chain
//! a `drawtext` onto whatever base the clip has so far.

use std::collections::HashSet;

use crate::compile::canvas::OutputFormat;
use crate::foundation::core::{Canvas, fmt_num, fmt_secs, round_even};
use crate::graph::{
    ArgValue, Filter, FilterGraph, FilterNode, Fragment, InputRef, InputRegistry, PadNamer, PadRef,
};
use crate::media::ProbeTable;
use crate::model::{
    AudioLayer, Clip, ImageLayer, Layer, OriginX, OriginY, OverlayFrame, Position,
    PositionKeyword, ResizeMode, TitleLayer, VideoLayer, ZoomDirection,
};

/// Long side of the intermediate frame Ken Burns pans over. Large enough that per-frame
/// integer rounding in `zoompan` stays below one output pixel.
pub const KEN_BURNS_LONG_SIDE: u32 = 8000;

/// Default title size as a fraction of the smaller canvas side.
pub const TITLE_FONT_FRACTION: f64 = 0.1;

pub(crate) struct LayerCtx<'a> {
    pub format: OutputFormat,
    /// Resolved duration of the clip being compiled.
    pub duration: f64,
    pub keep_source_audio: bool,
    pub probes: &'a ProbeTable,
}

/// Audio of a base video layer that should be mixed when source audio is kept.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct KeptAudio {
    pub input: usize,
    pub trim_start: f64,
    /// Source time where the video layer is cut.
    pub trim_end: Option<f64>,
    pub volume: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct ClipOutput {
    pub pad: String,
    pub kept_audio: Vec<KeptAudio>,
    pub audio_layers: Vec<AudioLayer>,
}

/// Compile every layer of one clip into `graph` and return the clip's final video pad.
///
/// `skip` holds `(clip, layer)` indices owned by continuous overlays; those are composited
/// once onto the merged timeline instead.
pub(crate) fn compile_clip(
    clip_idx: usize,
    clip: &Clip,
    ctx: &LayerCtx<'_>,
    skip: &HashSet<(usize, usize)>,
    namer: &mut PadNamer,
    inputs: &mut InputRegistry,
    graph: &mut FilterGraph,
) -> ClipOutput {
    let mut current: Option<String> = None;
    let mut kept_audio = Vec::new();
    let mut audio_layers = Vec::new();

    for (layer_idx, layer) in clip.layers.iter().enumerate() {
        if skip.contains(&(clip_idx, layer_idx)) {
            continue;
        }
        match layer {
            Layer::Video(v) if v.is_overlay() => {
                let base = ensure_base(&mut current, ctx, namer, graph);
                let source = OverlaySource::Video(v);
                let pad = clip_overlay(&base, &source, &v.frame, ctx, namer, inputs, graph);
                current = Some(pad);
            }
            Layer::Video(v) => {
                let fragment = video_base(v, ctx, namer, inputs);
                if ctx.keep_source_audio
                    && ctx.probes.get(&v.path).is_some_and(|i| i.has_audio)
                    && let Some(input) = fragment.inputs.first()
                {
                    kept_audio.push(KeptAudio {
                        input: input.index,
                        trim_start: v.start(),
                        trim_end: v.cut_to,
                        volume: v.mix_volume,
                    });
                }
                stack_base(&mut current, fragment, namer, graph);
            }
            Layer::Image(i) if i.is_overlay() => {
                if i.zoom_direction.is_some() {
                    tracing::debug!(
                        clip = clip_idx,
                        layer = layer_idx,
                        "zoom_direction ignored on image overlay"
                    );
                }
                let base = ensure_base(&mut current, ctx, namer, graph);
                let source = OverlaySource::Image(i);
                let pad = clip_overlay(&base, &source, &i.frame, ctx, namer, inputs, graph);
                current = Some(pad);
            }
            Layer::Image(i) => {
                let fragment = match i.zoom_direction {
                    Some(dir) => ken_burns(i, dir, ctx, namer, inputs),
                    None => image_base(i, ctx, namer, inputs),
                };
                stack_base(&mut current, fragment, namer, graph);
            }
            Layer::FillColor(c) => {
                let fragment = color_source(&c.color, "color", ctx, namer);
                stack_base(&mut current, fragment, namer, graph);
            }
            Layer::LinearGradient(g) => {
                let fragment = gradient_source(&g.colors, false, ctx, namer);
                stack_base(&mut current, fragment, namer, graph);
            }
            Layer::RadialGradient(g) => {
                let fragment = gradient_source(&g.colors, true, ctx, namer);
                stack_base(&mut current, fragment, namer, graph);
            }
            Layer::Title(t) => {
                let base = ensure_base(&mut current, ctx, namer, graph);
                current = Some(title(&base, t, ctx.format.canvas, namer, graph));
            }
            Layer::Audio(a) => audio_layers.push(a.clone()),
            Layer::Unknown => {
                tracing::debug!(clip = clip_idx, layer = layer_idx, "skipping unknown layer type");
            }
        }
    }

    let pad = ensure_base(&mut current, ctx, namer, graph);
    ClipOutput {
        pad,
        kept_audio,
        audio_layers,
    }
}

fn ensure_base(
    current: &mut Option<String>,
    ctx: &LayerCtx<'_>,
    namer: &mut PadNamer,
    graph: &mut FilterGraph,
) -> String {
    if let Some(pad) = current {
        return pad.clone();
    }
    let pad = graph.absorb(color_source("black", "bg", ctx, namer));
    *current = Some(pad.clone());
    pad
}

/// Overlay confined to one clip: clip-local timing, composited straight onto `base`.
fn clip_overlay(
    base: &str,
    source: &OverlaySource<'_>,
    frame: &OverlayFrame,
    ctx: &LayerCtx<'_>,
    namer: &mut PadNamer,
    inputs: &mut InputRegistry,
    graph: &mut FilterGraph,
) -> String {
    let input = overlay_input(source, ctx.format, ctx.duration, inputs);
    let timing = OverlayTiming {
        offset: None,
        duration: ctx.duration,
    };
    let fragment = overlay_source(source, input, frame, ctx.format, timing, namer);
    let ov = graph.absorb(fragment);
    composite_overlay(base, &ov, frame, ctx.format.canvas, namer, graph)
}

/// A later base layer covers the earlier ones completely.
fn stack_base(
    current: &mut Option<String>,
    fragment: Fragment,
    namer: &mut PadNamer,
    graph: &mut FilterGraph,
) {
    let pad = graph.absorb(fragment);
    let next = match current.take() {
        None => pad,
        Some(below) => {
            let out = namer.fresh("stack");
            graph.push(FilterNode::new(
                vec![PadRef::label(below), PadRef::label(pad)],
                vec![
                    Filter::new("overlay")
                        .arg("x", 0)
                        .arg("y", 0)
                        .arg("eof_action", "pass"),
                ],
                out.clone(),
            ));
            out
        }
    };
    *current = Some(next);
}

pub(crate) fn resize_filters(mode: ResizeMode, canvas: Canvas) -> Vec<Filter> {
    let (w, h) = (canvas.width, canvas.height);
    match mode {
        ResizeMode::Contain => vec![
            Filter::new("scale")
                .arg("w", w)
                .arg("h", h)
                .arg("force_original_aspect_ratio", "decrease"),
            Filter::new("pad")
                .arg("w", w)
                .arg("h", h)
                .expr("x", "(ow-iw)/2")
                .expr("y", "(oh-ih)/2")
                .arg("color", "black"),
        ],
        ResizeMode::Cover => vec![
            Filter::new("scale")
                .arg("w", w)
                .arg("h", h)
                .arg("force_original_aspect_ratio", "increase"),
            Filter::new("crop").arg("w", w).arg("h", h),
        ],
        ResizeMode::Stretch => vec![Filter::new("scale").arg("w", w).arg("h", h)],
    }
}

/// `xfade` and `concat` reject inputs whose timebase or pixel aspect differ.
pub(crate) fn normalize_filters(format: OutputFormat) -> Vec<Filter> {
    vec![
        Filter::new("setsar").positional(1),
        Filter::new("fps").positional(format.fps.to_ffmpeg()),
        Filter::new("settb").positional(format.fps.timebase()),
        Filter::new("format").positional("yuv420p"),
    ]
}

/// Clone the last frame if the source runs short, then cut to exactly `duration`.
fn hold_filters(duration: f64) -> Vec<Filter> {
    vec![
        Filter::new("tpad")
            .arg("stop_mode", "clone")
            .arg("stop_duration", fmt_secs(duration)),
        Filter::new("trim").arg("duration", fmt_secs(duration)),
        Filter::new("setpts").positional("PTS-STARTPTS"),
    ]
}

fn trim_filter(start: f64, cut_to: Option<f64>, max_duration: f64) -> Filter {
    let trim = Filter::new("trim").arg("start", fmt_secs(start));
    match cut_to {
        Some(end) => trim.arg("end", fmt_secs(end.min(start + max_duration))),
        None => trim.arg("duration", fmt_secs(max_duration)),
    }
}

pub(crate) fn still_image_options(format: OutputFormat, duration: f64) -> Vec<String> {
    vec![
        "-loop".to_string(),
        "1".to_string(),
        "-framerate".to_string(),
        format.fps.to_ffmpeg(),
        "-t".to_string(),
        fmt_secs(duration),
    ]
}

fn video_base(
    v: &VideoLayer,
    ctx: &LayerCtx<'_>,
    namer: &mut PadNamer,
    inputs: &mut InputRegistry,
) -> Fragment {
    let input = inputs.add(&v.path, Vec::new());
    let mut filters = vec![
        trim_filter(v.start(), v.cut_to, ctx.duration),
        Filter::new("setpts").positional("PTS-STARTPTS"),
    ];
    filters.extend(resize_filters(v.resize_mode, ctx.format.canvas));
    filters.extend(normalize_filters(ctx.format));
    filters.extend(hold_filters(ctx.duration));

    let output = namer.fresh("vout");
    Fragment {
        nodes: vec![FilterNode::new(
            vec![PadRef::video(input.index)],
            filters,
            output.clone(),
        )],
        inputs: vec![input],
        output,
    }
}

fn image_base(
    i: &ImageLayer,
    ctx: &LayerCtx<'_>,
    namer: &mut PadNamer,
    inputs: &mut InputRegistry,
) -> Fragment {
    let input = inputs.add(&i.path, still_image_options(ctx.format, ctx.duration));
    let mut filters = resize_filters(i.resize_mode, ctx.format.canvas);
    filters.extend(normalize_filters(ctx.format));
    filters.extend(hold_filters(ctx.duration));

    let output = namer.fresh("imgout");
    Fragment {
        nodes: vec![FilterNode::new(
            vec![PadRef::video(input.index)],
            filters,
            output.clone(),
        )],
        inputs: vec![input],
        output,
    }
}

/// Size of the intermediate Ken Burns frame: canvas aspect, long side [`KEN_BURNS_LONG_SIDE`].
pub(crate) fn ken_burns_frame(canvas: Canvas) -> (u32, u32) {
    let aspect = canvas.aspect();
    let long = f64::from(KEN_BURNS_LONG_SIDE);
    if canvas.width >= canvas.height {
        (KEN_BURNS_LONG_SIDE, round_even(long / aspect))
    } else {
        (round_even(long * aspect), KEN_BURNS_LONG_SIDE)
    }
}

fn ken_burns(
    i: &ImageLayer,
    dir: ZoomDirection,
    ctx: &LayerCtx<'_>,
    namer: &mut PadNamer,
    inputs: &mut InputRegistry,
) -> Fragment {
    // zoompan expands the single decoded frame into `d` output frames.
    let input = inputs.add(&i.path, Vec::new());
    let canvas = ctx.format.canvas;
    let frames = ctx.format.fps.frames_ceil(ctx.duration).max(1);
    let amount = fmt_num(i.zoom_amount);
    let (up_w, up_h) = ken_burns_frame(canvas);

    let center_x = "trunc(iw/2-(iw/zoom/2))".to_string();
    let center_y = "trunc(ih/2-(ih/zoom/2))".to_string();
    let (z, x, y) = match dir {
        ZoomDirection::In => (format!("1+{amount}*on/{frames}"), center_x, center_y),
        ZoomDirection::Out => (
            format!("1+{amount}-{amount}*on/{frames}"),
            center_x,
            center_y,
        ),
        ZoomDirection::Left => (
            format!("1+{amount}"),
            format!("trunc((iw-iw/zoom)*(1-on/{frames}))"),
            center_y,
        ),
        ZoomDirection::Right => (
            format!("1+{amount}"),
            format!("trunc((iw-iw/zoom)*on/{frames})"),
            center_y,
        ),
    };

    let mut filters = resize_filters(ResizeMode::Cover, canvas);
    filters.push(Filter::new("scale").arg("w", up_w).arg("h", up_h));
    filters.push(
        Filter::new("zoompan")
            .expr("z", z)
            .expr("x", x)
            .expr("y", y)
            .arg("d", frames)
            .arg("s", canvas.size_arg())
            .arg("fps", ctx.format.fps.to_ffmpeg()),
    );
    filters.extend(normalize_filters(ctx.format));
    filters.extend(hold_filters(ctx.duration));

    let output = namer.fresh("imgout");
    Fragment {
        nodes: vec![FilterNode::new(
            vec![PadRef::video(input.index)],
            filters,
            output.clone(),
        )],
        inputs: vec![input],
        output,
    }
}

/// `#rrggbb` is rewritten to ffmpeg's `0xrrggbb`; names and `0x` forms pass through.
pub(crate) fn ffmpeg_color(color: &str) -> String {
    let c = color.trim();
    match c.strip_prefix('#') {
        Some(hex) => format!("0x{hex}"),
        None => c.to_string(),
    }
}

fn color_source(
    color: &str,
    prefix: &'static str,
    ctx: &LayerCtx<'_>,
    namer: &mut PadNamer,
) -> Fragment {
    let mut filters = vec![
        Filter::new("color")
            .text("c", ffmpeg_color(color))
            .arg("s", ctx.format.canvas.size_arg())
            .arg("r", ctx.format.fps.to_ffmpeg())
            .arg("d", fmt_secs(ctx.duration)),
    ];
    filters.extend(normalize_filters(ctx.format));

    let output = namer.fresh(prefix);
    Fragment {
        inputs: Vec::new(),
        nodes: vec![FilterNode::new(Vec::new(), filters, output.clone())],
        output,
    }
}

fn gradient_source(
    colors: &[String; 2],
    radial: bool,
    ctx: &LayerCtx<'_>,
    namer: &mut PadNamer,
) -> Fragment {
    let Canvas { width, height } = ctx.format.canvas;
    let (kind, x0, y0) = if radial {
        ("radial", width / 2, height / 2)
    } else {
        ("linear", 0, 0)
    };
    let mut filters = vec![
        Filter::new("gradients")
            .arg("s", ctx.format.canvas.size_arg())
            .arg("r", ctx.format.fps.to_ffmpeg())
            .arg("d", fmt_secs(ctx.duration))
            .text("c0", ffmpeg_color(&colors[0]))
            .text("c1", ffmpeg_color(&colors[1]))
            .arg("nb_colors", 2)
            .arg("type", kind)
            .arg("x0", x0)
            .arg("y0", y0)
            .arg("x1", width)
            .arg("y1", height)
            .arg("speed", 0),
    ];
    filters.extend(normalize_filters(ctx.format));

    let output = namer.fresh("gradient");
    Fragment {
        inputs: Vec::new(),
        nodes: vec![FilterNode::new(Vec::new(), filters, output.clone())],
        output,
    }
}

/// Default position for titles that do not specify one.
const TITLE_DEFAULT_POSITION: Position = Position::Keyword(PositionKeyword::Center);

fn title(
    base: &str,
    t: &TitleLayer,
    canvas: Canvas,
    namer: &mut PadNamer,
    graph: &mut FilterGraph,
) -> String {
    let font_size = t
        .font_size
        .unwrap_or_else(|| (f64::from(canvas.min_side()) * TITLE_FONT_FRACTION).round() as u32)
        .max(1);
    let anchor = t.position.unwrap_or(TITLE_DEFAULT_POSITION).anchor();
    let x = match anchor.origin_x {
        OriginX::Left => format!("trunc(w*{})", fmt_num(anchor.x)),
        OriginX::Center => format!("trunc(w*{}-text_w/2)", fmt_num(anchor.x)),
        OriginX::Right => format!("trunc(w*{}-text_w)", fmt_num(anchor.x)),
    };
    let y = match anchor.origin_y {
        OriginY::Top => format!("trunc(h*{})", fmt_num(anchor.y)),
        OriginY::Center => format!("trunc(h*{}-text_h/2)", fmt_num(anchor.y)),
        OriginY::Bottom => format!("trunc(h*{}-text_h)", fmt_num(anchor.y)),
    };

    let mut drawtext = Filter::new("drawtext");
    if let Some(font) = &t.font_path {
        drawtext = drawtext.text("fontfile", font.clone());
    }
    drawtext = drawtext
        .text("text", t.text.clone())
        .arg("expansion", "none")
        .arg("fontsize", font_size)
        .text("fontcolor", ffmpeg_color(&t.text_color))
        .expr("x", x)
        .expr("y", y);

    let out = namer.fresh("title");
    graph.push(FilterNode::new(
        vec![PadRef::label(base)],
        vec![drawtext],
        out.clone(),
    ));
    out
}

pub(crate) enum OverlaySource<'a> {
    Video(&'a VideoLayer),
    Image(&'a ImageLayer),
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct OverlayTiming {
    /// Start on the output timeline; `None` keeps the clip-local zero.
    pub offset: Option<f64>,
    pub duration: f64,
}

/// Rendered overlay size in pixels. A missing axis keeps the source aspect (`-2`).
pub(crate) fn overlay_size(frame: &OverlayFrame, canvas: Canvas) -> (Option<u32>, Option<u32>) {
    (
        frame
            .width
            .map(|f| round_even(f64::from(canvas.width) * f)),
        frame
            .height
            .map(|f| round_even(f64::from(canvas.height) * f)),
    )
}

/// Register the input an overlay reads from.
pub(crate) fn overlay_input(
    source: &OverlaySource<'_>,
    format: OutputFormat,
    duration: f64,
    inputs: &mut InputRegistry,
) -> InputRef {
    match source {
        OverlaySource::Video(v) => inputs.add(&v.path, Vec::new()),
        OverlaySource::Image(i) => inputs.add(&i.path, still_image_options(format, duration)),
    }
}

/// Trimmed, scaled overlay stream. No padding or cropping so the footprint stays as requested.
pub(crate) fn overlay_source(
    source: &OverlaySource<'_>,
    input: InputRef,
    frame: &OverlayFrame,
    format: OutputFormat,
    timing: OverlayTiming,
    namer: &mut PadNamer,
) -> Fragment {
    let mut filters = match source {
        OverlaySource::Video(v) => vec![
            trim_filter(v.start(), v.cut_to, timing.duration),
            Filter::new("setpts").positional("PTS-STARTPTS"),
        ],
        OverlaySource::Image(_) => Vec::new(),
    };

    filters.push(Filter::new("fps").positional(format.fps.to_ffmpeg()));
    match overlay_size(frame, format.canvas) {
        (None, None) => {}
        (w, h) => filters.push(
            Filter::new("scale")
                .arg("w", w.map_or("-2".to_string(), |v| v.to_string()))
                .arg("h", h.map_or("-2".to_string(), |v| v.to_string())),
        ),
    }
    filters.push(Filter::new("setsar").positional(1));
    filters.push(Filter::new("format").positional("yuva420p"));
    if let Some(offset) = timing.offset {
        filters.push(Filter::new("setpts").positional(format!("PTS-STARTPTS+{}/TB", fmt_secs(offset))));
    }

    let output = namer.fresh("ovsrc");
    Fragment {
        nodes: vec![FilterNode::new(
            vec![PadRef::video(input.index)],
            filters,
            output.clone(),
        )],
        inputs: vec![input],
        output,
    }
}

/// `overlay` x/y for an anchored frame. Known sizes give integer pixels; an unknown axis
/// falls back to the overlay's own `w`/`h` inside a truncated expression.
pub(crate) fn overlay_xy(frame: &OverlayFrame, canvas: Canvas) -> (ArgValue, ArgValue) {
    let anchor = frame
        .position
        .unwrap_or(Position::Keyword(PositionKeyword::TopLeft))
        .anchor();
    let (ow, oh) = overlay_size(frame, canvas);

    let x = axis(
        f64::from(canvas.width) * anchor.x,
        ow,
        "W",
        "w",
        anchor.x,
        match anchor.origin_x {
            OriginX::Left => 0.0,
            OriginX::Center => 0.5,
            OriginX::Right => 1.0,
        },
    );
    let y = axis(
        f64::from(canvas.height) * anchor.y,
        oh,
        "H",
        "h",
        anchor.y,
        match anchor.origin_y {
            OriginY::Top => 0.0,
            OriginY::Center => 0.5,
            OriginY::Bottom => 1.0,
        },
    );
    (x, y)
}

fn axis(
    at_px: f64,
    size: Option<u32>,
    main_var: &str,
    own_var: &str,
    frac: f64,
    origin: f64,
) -> ArgValue {
    match size {
        Some(s) => ArgValue::Raw(((at_px - f64::from(s) * origin).round() as i64).to_string()),
        None if origin == 0.0 => ArgValue::Raw((at_px.round() as i64).to_string()),
        None => ArgValue::Expr(format!(
            "trunc({main_var}*{}-{own_var}*{})",
            fmt_num(frac),
            fmt_num(origin)
        )),
    }
}

pub(crate) fn composite_overlay(
    base: &str,
    overlay: &str,
    frame: &OverlayFrame,
    canvas: Canvas,
    namer: &mut PadNamer,
    graph: &mut FilterGraph,
) -> String {
    let (x, y) = overlay_xy(frame, canvas);
    let filter = Filter::new("overlay")
        .value("x", x)
        .value("y", y)
        .arg("eof_action", "pass");

    let out = namer.fresh("ovl");
    graph.push(FilterNode::new(
        vec![PadRef::label(base), PadRef::label(overlay)],
        vec![filter],
        out.clone(),
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Fps;
    use crate::media::MediaInfo;

    fn format() -> OutputFormat {
        OutputFormat {
            canvas: Canvas {
                width: 640,
                height: 360,
            },
            fps: Fps::new(25, 1).unwrap(),
        }
    }

    fn probes() -> ProbeTable {
        let mut t = ProbeTable::new();
        t.insert(
            "v.mp4".to_string(),
            MediaInfo {
                source: "v.mp4".to_string(),
                duration_sec: 10.0,
                width: Some(1280),
                height: Some(720),
                fps: Some(Fps::new(30, 1).unwrap()),
                has_audio: true,
            },
        );
        t
    }

    fn run(clip_json: &str, keep_source_audio: bool) -> (ClipOutput, FilterGraph, InputRegistry) {
        let clip: Clip = serde_json::from_str(clip_json).unwrap();
        let probes = probes();
        let ctx = LayerCtx {
            format: format(),
            duration: 2.0,
            keep_source_audio,
            probes: &probes,
        };
        let mut namer = PadNamer::new();
        let mut inputs = InputRegistry::new();
        let mut graph = FilterGraph::new();
        let out = compile_clip(
            0,
            &clip,
            &ctx,
            &HashSet::new(),
            &mut namer,
            &mut inputs,
            &mut graph,
        );
        (out, graph, inputs)
    }

    #[test]
    fn contain_video_is_padded_normalized_and_held() {
        let (out, graph, inputs) = run(r#"{ "layers": [ { "type": "video", "path": "v.mp4" } ] }"#, false);
        assert_eq!(out.pad, "vout0");
        assert_eq!(inputs.len(), 1);
        let node = &graph.nodes()[0];
        assert_eq!(node.inputs, vec![PadRef::video(0)]);
        assert_eq!(
            node.filter("scale").and_then(|f| f.get("force_original_aspect_ratio")),
            Some("decrease")
        );
        assert!(node.has_filter("pad"));
        assert_eq!(node.filter("settb").map(Filter::render).as_deref(), Some("settb=1/25"));
        assert_eq!(node.filter("tpad").and_then(|f| f.get("stop_mode")), Some("clone"));
        assert!(out.kept_audio.is_empty());
    }

    #[test]
    fn kept_source_audio_records_the_video_input() {
        let (out, _, _) = run(
            r#"{ "layers": [ { "type": "video", "path": "v.mp4", "cut_from": 1.5, "mix_volume": 0.5 } ] }"#,
            true,
        );
        assert_eq!(
            out.kept_audio,
            vec![KeptAudio {
                input: 0,
                trim_start: 1.5,
                trim_end: None,
                volume: 0.5
            }]
        );
    }

    #[test]
    fn kept_source_audio_stops_at_the_video_cut() {
        let (out, graph, _) = run(
            r#"{ "layers": [ { "type": "video", "path": "v.mp4", "cut_from": 0.5, "cut_to": 1.5 } ] }"#,
            true,
        );
        assert_eq!(out.kept_audio[0].trim_end, Some(1.5));
        let trim = graph.nodes()[0].filter("trim").unwrap();
        assert_eq!(trim.get("end"), Some("1.5"));
    }

    #[test]
    fn cover_crops_instead_of_padding() {
        let (_, graph, _) = run(
            r#"{ "layers": [ { "type": "video", "path": "v.mp4", "resize_mode": "cover" } ] }"#,
            false,
        );
        let node = &graph.nodes()[0];
        assert!(node.has_filter("crop"));
        assert!(!node.has_filter("pad"));
    }

    #[test]
    fn ken_burns_zoompan_covers_the_whole_clip() {
        let (_, graph, inputs) = run(
            r#"{ "layers": [ { "type": "image", "path": "i.jpg", "zoom_direction": "in", "zoom_amount": 0.2 } ] }"#,
            false,
        );
        assert!(inputs.into_inputs()[0].options.is_empty());
        let zoom = graph.nodes()[0].filter("zoompan").unwrap();
        assert_eq!(zoom.get("d"), Some("50"));
        assert_eq!(zoom.get("s"), Some("640x360"));
        assert_eq!(zoom.get("z"), Some("1+0.2*on/50"));
    }

    fn zoompan(direction: &str) -> Filter {
        let (_, graph, _) = run(
            &format!(
                r#"{{ "layers": [ {{ "type": "image", "path": "i.jpg", "zoom_direction": "{direction}", "zoom_amount": 0.2 }} ] }}"#
            ),
            false,
        );
        graph.nodes()[0].filter("zoompan").unwrap().clone()
    }

    #[test]
    fn ken_burns_zoom_out_ends_at_full_frame() {
        let z = zoompan("out");
        assert_eq!(z.get("z"), Some("1+0.2-0.2*on/50"));
        assert_eq!(z.get("x"), Some("trunc(iw/2-(iw/zoom/2))"));
        assert_eq!(z.get("y"), Some("trunc(ih/2-(ih/zoom/2))"));
    }

    #[test]
    fn ken_burns_pans_hold_zoom_and_truncate_x() {
        let right = zoompan("right");
        assert_eq!(right.get("z"), Some("1+0.2"));
        assert_eq!(right.get("x"), Some("trunc((iw-iw/zoom)*on/50)"));
        assert_eq!(right.get("y"), Some("trunc(ih/2-(ih/zoom/2))"));

        let left = zoompan("left");
        assert_eq!(left.get("z"), Some("1+0.2"));
        assert_eq!(left.get("x"), Some("trunc((iw-iw/zoom)*(1-on/50))"));
    }

    #[test]
    fn stretch_scales_exactly_without_pad_or_crop() {
        let (_, graph, _) = run(
            r#"{ "layers": [ { "type": "video", "path": "v.mp4", "resize_mode": "stretch" } ] }"#,
            false,
        );
        let node = &graph.nodes()[0];
        let scale = node.filter("scale").unwrap();
        assert_eq!(scale.render(), "scale=w=640:h=360");
        assert!(!node.has_filter("pad"));
        assert!(!node.has_filter("crop"));
    }

    #[test]
    fn ken_burns_frame_keeps_canvas_aspect() {
        assert_eq!(ken_burns_frame(format().canvas), (8000, 4500));
        let portrait = Canvas {
            width: 360,
            height: 640,
        };
        assert_eq!(ken_burns_frame(portrait), (4500, 8000));
    }

    #[test]
    fn still_image_loops_for_the_clip_duration() {
        let (out, _, inputs) = run(r#"{ "layers": [ { "type": "image", "path": "i.png" } ] }"#, false);
        assert_eq!(out.pad, "imgout0");
        assert_eq!(
            inputs.into_inputs()[0].options,
            vec!["-loop", "1", "-framerate", "25", "-t", "2"]
        );
    }

    #[test]
    fn title_without_base_gets_black_background() {
        let (out, graph, inputs) = run(
            r#"{ "layers": [ { "type": "title", "text": "It's 3:00" } ] }"#,
            false,
        );
        assert!(inputs.is_empty());
        assert_eq!(out.pad, "title0");
        let nodes = graph.nodes();
        assert_eq!(nodes[0].outputs, vec!["bg0".to_string()]);
        assert_eq!(nodes[0].filter("color").and_then(|f| f.get("c")), Some("black"));
        let rendered = nodes[1].render();
        assert!(rendered.starts_with("[bg0]drawtext="), "{rendered}");
        assert!(rendered.contains(r"text=It\\\'s 3\\:00"), "{rendered}");
        assert!(rendered.contains("fontsize=36"), "{rendered}");
    }

    #[test]
    fn hex_colors_use_ffmpeg_prefix() {
        assert_eq!(ffmpeg_color("#ff0000"), "0xff0000");
        assert_eq!(ffmpeg_color("red"), "red");
        let (_, graph, _) = run(
            r##"{ "layers": [ { "type": "linear-gradient", "colors": ["#000000", "#ffffff"] } ] }"##,
            false,
        );
        let g = graph.nodes()[0].filter("gradients").unwrap();
        assert_eq!(g.get("c0"), Some("0x000000"));
        assert_eq!(g.get("type"), Some("linear"));
    }

    #[test]
    fn later_base_layers_stack_over_earlier_ones() {
        let (out, graph, _) = run(
            r##"{ "layers": [ { "type": "fill-color", "color": "#112233" }, { "type": "radial-gradient" } ] }"##,
            false,
        );
        assert_eq!(out.pad, "stack0");
        let last = graph.nodes().last().unwrap();
        assert_eq!(last.inputs, vec![PadRef::label("color0"), PadRef::label("gradient0")]);
    }

    #[test]
    fn overlay_top_right_is_placed_in_pixels() {
        let frame: OverlayFrame = serde_json::from_str(
            r#"{ "width": 0.25, "height": 0.25, "position": "top-right" }"#,
        )
        .unwrap();
        assert_eq!(overlay_size(&frame, format().canvas), (Some(160), Some(90)));
        let (x, y) = overlay_xy(&frame, format().canvas);
        assert_eq!(x, ArgValue::Raw("480".to_string()));
        assert_eq!(y, ArgValue::Raw("0".to_string()));
    }

    #[test]
    fn overlay_with_unknown_height_centers_by_expression() {
        let frame: OverlayFrame =
            serde_json::from_str(r#"{ "width": 0.5, "position": "center" }"#).unwrap();
        let (x, y) = overlay_xy(&frame, format().canvas);
        assert_eq!(x, ArgValue::Raw("160".to_string()));
        assert_eq!(y, ArgValue::Expr("trunc(H*0.5-h*0.5)".to_string()));
    }

    #[test]
    fn overlay_video_composites_onto_the_base() {
        let (out, graph, inputs) = run(
            r#"{ "layers": [
                { "type": "video", "path": "v.mp4" },
                { "type": "video", "path": "v.mp4", "width": 0.25, "height": 0.25, "position": "bottom-left" }
            ] }"#,
            false,
        );
        assert_eq!(inputs.len(), 2);
        assert_eq!(out.pad, "ovl0");
        let last = graph.nodes().last().unwrap();
        assert_eq!(last.inputs, vec![PadRef::label("vout0"), PadRef::label("ovsrc0")]);
        let ov = last.filter("overlay").unwrap();
        assert_eq!(ov.get("x"), Some("0"));
        assert_eq!(ov.get("y"), Some("270"));
        assert_eq!(ov.get("eof_action"), Some("pass"));
    }

    #[test]
    fn image_overlay_ignores_zoom_direction() {
        let (out, graph, inputs) = run(
            r#"{ "layers": [
                { "type": "fill-color", "color": "blue" },
                { "type": "image", "path": "logo.png", "width": 0.25, "zoom_direction": "in" }
            ] }"#,
            false,
        );
        assert_eq!(out.pad, "ovl0");
        assert!(graph.nodes().iter().all(|n| !n.has_filter("zoompan")));
        assert_eq!(
            inputs.into_inputs()[0].options,
            vec!["-loop", "1", "-framerate", "25", "-t", "2"]
        );
    }

    #[test]
    fn audio_and_unknown_layers_add_no_video_nodes() {
        let (out, graph, inputs) = run(
            r#"{ "layers": [
                { "type": "fill-color", "color": "blue" },
                { "type": "audio", "path": "a.mp3" },
                { "type": "sparkles" }
            ] }"#,
            false,
        );
        assert_eq!(out.pad, "color0");
        assert_eq!(graph.nodes().len(), 1);
        assert!(inputs.is_empty());
        assert_eq!(out.audio_layers.len(), 1);
    }
}
