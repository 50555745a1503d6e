use crate::foundation::core::{Canvas, Fps, round_even};
use crate::media::{MediaInfo, ProbeTable};
use crate::model::{Composition, Layer};

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 360;
pub const DEFAULT_FPS: u32 = 25;
pub const FAST_WIDTH: u32 = 320;
pub const FAST_FPS: u32 = 15;

/// Resolved frame geometry and rate shared by every stream in the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputFormat {
    pub canvas: Canvas,
    pub fps: Fps,
}

/// Explicit request > first video layer's native resolution > defaults. Always even.
pub fn resolve_output_format(comp: &Composition, probes: &ProbeTable, fast: bool) -> OutputFormat {
    let first = first_video_info(comp, probes);
    let native = first.and_then(|i| Some((i.width?, i.height?)));

    let (w, h) = match (comp.width, comp.height, native) {
        (Some(w), Some(h), _) => (f64::from(w), f64::from(h)),
        (Some(w), None, Some((nw, nh))) => (f64::from(w), f64::from(w) * f64::from(nh) / f64::from(nw)),
        (None, Some(h), Some((nw, nh))) => (f64::from(h) * f64::from(nw) / f64::from(nh), f64::from(h)),
        (Some(w), None, None) => (
            f64::from(w),
            f64::from(w) * f64::from(DEFAULT_HEIGHT) / f64::from(DEFAULT_WIDTH),
        ),
        (None, Some(h), None) => (
            f64::from(h) * f64::from(DEFAULT_WIDTH) / f64::from(DEFAULT_HEIGHT),
            f64::from(h),
        ),
        (None, None, Some((nw, nh))) => (f64::from(nw), f64::from(nh)),
        (None, None, None) => (f64::from(DEFAULT_WIDTH), f64::from(DEFAULT_HEIGHT)),
    };

    let fps = comp
        .fps
        .and_then(|f| Fps::from_f64(f).ok())
        .or_else(|| first.and_then(|i| i.fps))
        .unwrap_or(Fps {
            num: DEFAULT_FPS,
            den: 1,
        });

    let format = OutputFormat {
        canvas: Canvas::even(w, h),
        fps,
    };
    if fast { fast_proxy(format) } else { format }
}

/// Shrink to a low-cost proxy keeping the aspect ratio.
pub fn fast_proxy(format: OutputFormat) -> OutputFormat {
    let aspect = format.canvas.aspect();
    OutputFormat {
        canvas: Canvas {
            width: FAST_WIDTH,
            height: round_even(f64::from(FAST_WIDTH) / aspect),
        },
        fps: Fps {
            num: FAST_FPS,
            den: 1,
        },
    }
}

fn first_video_info<'a>(comp: &Composition, probes: &'a ProbeTable) -> Option<&'a MediaInfo> {
    comp.clips
        .iter()
        .flat_map(|c| c.layers.iter())
        .find_map(|l| match l {
            Layer::Video(v) => probes.get(&v.path).filter(|i| i.width.is_some()),
            _ => None,
        })
}
