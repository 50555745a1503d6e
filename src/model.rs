use crate::foundation::core::Fps;
use crate::foundation::error::{ClipweaveError, ClipweaveResult};

/// A declarative composition: ordered clips, the transitions between them, and global audio.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Composition {
    /// Destination file. Must be non-empty.
    #[serde(default)]
    pub out_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Render a small low-fps proxy instead of the full-size output.
    #[serde(default)]
    pub fast: bool,
    #[serde(default)]
    pub defaults: ClipDefaults,
    pub clips: Vec<Clip>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audio_tracks: Vec<AudioTrack>,
    /// Soundtrack mixed from the start of the timeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<String>,
    /// Mix the audio streams of base video layers into the output.
    #[serde(default)]
    pub keep_source_audio: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_codec_args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codec_args: Option<Vec<String>>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ClipDefaults {
    #[serde(default = "default_clip_duration")]
    pub duration: f64,
    #[serde(default = "default_transition")]
    pub transition: Transition,
}

impl Default for ClipDefaults {
    fn default() -> Self {
        Self {
            duration: default_clip_duration(),
            transition: default_transition(),
        }
    }
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Clip {
    pub layers: Vec<Layer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Outgoing transition into the next clip. Ignored on the last clip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Layer {
    Video(VideoLayer),
    Image(ImageLayer),
    FillColor(FillColorLayer),
    LinearGradient(GradientLayer),
    RadialGradient(GradientLayer),
    Title(TitleLayer),
    Audio(AudioLayer),
    /// Any layer type this version does not know. Skipped during compilation.
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeMode {
    #[default]
    Contain,
    Cover,
    Stretch,
}

/// Fractional placement that turns a visual layer into an overlay.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverlayFrame {
    /// Fraction of canvas width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Fraction of canvas height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl OverlayFrame {
    pub fn is_set(&self) -> bool {
        self.width.is_some() || self.height.is_some() || self.position.is_some()
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct VideoLayer {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_to: Option<f64>,
    #[serde(default)]
    pub resize_mode: ResizeMode,
    #[serde(flatten)]
    pub frame: OverlayFrame,
    #[serde(default = "default_volume")]
    pub mix_volume: f64,
}

impl VideoLayer {
    pub fn is_overlay(&self) -> bool {
        self.frame.is_set()
    }

    pub fn start(&self) -> f64 {
        self.cut_from.unwrap_or(0.0).max(0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomDirection {
    In,
    Out,
    Left,
    Right,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ImageLayer {
    pub path: String,
    #[serde(default)]
    pub resize_mode: ResizeMode,
    /// Ken Burns motion for base images. Ignored on overlays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_direction: Option<ZoomDirection>,
    #[serde(default = "default_zoom_amount")]
    pub zoom_amount: f64,
    #[serde(flatten)]
    pub frame: OverlayFrame,
}

impl ImageLayer {
    pub fn is_overlay(&self) -> bool {
        self.frame.is_set()
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FillColorLayer {
    pub color: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GradientLayer {
    #[serde(default = "default_gradient_colors")]
    pub colors: [String; 2],
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TitleLayer {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(default = "default_text_color")]
    pub text_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AudioLayer {
    pub path: String,
    #[serde(default = "default_volume")]
    pub mix_volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_to: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionKeyword {
    Top,
    Bottom,
    Center,
    TopLeft,
    TopRight,
    CenterLeft,
    CenterRight,
    BottomLeft,
    BottomRight,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginX {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginY {
    #[default]
    Top,
    Center,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Position {
    Keyword(PositionKeyword),
    Coords {
        x: f64,
        y: f64,
        #[serde(default)]
        origin_x: OriginX,
        #[serde(default)]
        origin_y: OriginY,
    },
}

/// A position reduced to canvas fractions plus the anchor of the placed element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
    pub origin_x: OriginX,
    pub origin_y: OriginY,
}

impl Position {
    pub fn anchor(self) -> Anchor {
        use PositionKeyword as K;
        let (x, y, origin_x, origin_y) = match self {
            Position::Coords {
                x,
                y,
                origin_x,
                origin_y,
            } => (x, y, origin_x, origin_y),
            Position::Keyword(k) => match k {
                K::Top => (0.5, 0.0, OriginX::Center, OriginY::Top),
                K::Bottom => (0.5, 1.0, OriginX::Center, OriginY::Bottom),
                K::Center => (0.5, 0.5, OriginX::Center, OriginY::Center),
                K::TopLeft => (0.0, 0.0, OriginX::Left, OriginY::Top),
                K::TopRight => (1.0, 0.0, OriginX::Right, OriginY::Top),
                K::CenterLeft => (0.0, 0.5, OriginX::Left, OriginY::Center),
                K::CenterRight => (1.0, 0.5, OriginX::Right, OriginY::Center),
                K::BottomLeft => (0.0, 1.0, OriginX::Left, OriginY::Bottom),
                K::BottomRight => (1.0, 1.0, OriginX::Right, OriginY::Bottom),
            },
        };
        Anchor {
            x,
            y,
            origin_x,
            origin_y,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transition {
    #[serde(default = "default_transition_name")]
    pub name: String,
    #[serde(default = "default_transition_duration")]
    pub duration: f64,
    #[serde(default = "default_fade_curve")]
    pub audio_out_curve: String,
    #[serde(default = "default_fade_curve")]
    pub audio_in_curve: String,
}

/// What a [`Transition`] compiles to.
#[derive(Clone, Debug, PartialEq)]
pub enum TransitionKind {
    Cut,
    Xfade { effect: String, duration: f64 },
}

impl Transition {
    pub fn cut() -> Self {
        Self {
            name: "none".to_string(),
            duration: 0.0,
            ..default_transition()
        }
    }

    pub fn fade(duration: f64) -> Self {
        Self {
            duration,
            ..default_transition()
        }
    }

    pub fn kind(&self) -> TransitionKind {
        let name = self.name.trim().to_ascii_lowercase();
        if name.is_empty() || name == "none" || self.duration.is_nan() || self.duration <= 0.0 {
            return TransitionKind::Cut;
        }
        let effect = match name.as_str() {
            "crossfade" | "cross-fade" => "fade".to_string(),
            _ => name,
        };
        TransitionKind::Xfade {
            effect,
            duration: self.duration,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AudioTrack {
    pub path: String,
    #[serde(default = "default_volume")]
    pub mix_volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_to: Option<f64>,
    /// Offset on the output timeline, in seconds.
    #[serde(default)]
    pub start: f64,
}

impl Composition {
    pub fn from_json_str(s: &str) -> ClipweaveResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| ClipweaveError::serde(format!("composition JSON: {e}")))
    }

    /// Outgoing transition of clip `idx`, falling back to the composition default.
    pub fn transition_after(&self, idx: usize) -> &Transition {
        self.clips
            .get(idx)
            .and_then(|c| c.transition.as_ref())
            .unwrap_or(&self.defaults.transition)
    }

    pub fn validate(&self) -> ClipweaveResult<()> {
        if self.out_path.trim().is_empty() {
            return Err(ClipweaveError::validation("out_path must be non-empty"));
        }
        if self.clips.is_empty() {
            return Err(ClipweaveError::validation(
                "composition must contain at least one clip",
            ));
        }
        if self.width == Some(0) || self.height == Some(0) {
            return Err(ClipweaveError::validation("width/height must be > 0 when set"));
        }
        if let Some(fps) = self.fps {
            Fps::from_f64(fps)?;
        }
        check_positive("defaults.duration", self.defaults.duration)?;
        check_volume("output_volume", self.output_volume)?;
        self.defaults.transition.validate()?;

        for (idx, clip) in self.clips.iter().enumerate() {
            if let Some(d) = clip.duration {
                check_positive(&format!("clip {idx} duration"), d)?;
            }
            if let Some(tr) = &clip.transition {
                tr.validate()?;
            }
            for layer in &clip.layers {
                layer.validate(idx)?;
            }
        }

        for track in &self.audio_tracks {
            if track.path.trim().is_empty() {
                return Err(ClipweaveError::validation("audio track path must be non-empty"));
            }
            check_volume("audio track mix_volume", Some(track.mix_volume))?;
            check_trim("audio track", track.cut_from, track.cut_to)?;
            if !track.start.is_finite() || track.start < 0.0 {
                return Err(ClipweaveError::validation(
                    "audio track start must be finite and >= 0",
                ));
            }
        }

        Ok(())
    }
}

impl Transition {
    pub fn validate(&self) -> ClipweaveResult<()> {
        if !self.duration.is_finite() {
            return Err(ClipweaveError::validation(
                "transition duration must be finite",
            ));
        }
        Ok(())
    }
}

impl Layer {
    fn validate(&self, clip_idx: usize) -> ClipweaveResult<()> {
        match self {
            Layer::Video(v) => {
                check_path(clip_idx, "video", &v.path)?;
                check_trim("video layer", v.cut_from, v.cut_to)?;
                check_volume("video layer mix_volume", Some(v.mix_volume))?;
                check_frame(&v.frame)
            }
            Layer::Image(i) => {
                check_path(clip_idx, "image", &i.path)?;
                if !i.zoom_amount.is_finite() || i.zoom_amount < 0.0 {
                    return Err(ClipweaveError::validation(
                        "image zoom_amount must be finite and >= 0",
                    ));
                }
                check_frame(&i.frame)
            }
            Layer::Audio(a) => {
                check_path(clip_idx, "audio", &a.path)?;
                check_trim("audio layer", a.cut_from, a.cut_to)?;
                check_volume("audio layer mix_volume", Some(a.mix_volume))
            }
            Layer::FillColor(_)
            | Layer::LinearGradient(_)
            | Layer::RadialGradient(_)
            | Layer::Title(_)
            | Layer::Unknown => Ok(()),
        }
    }
}

fn check_path(clip_idx: usize, kind: &str, path: &str) -> ClipweaveResult<()> {
    if path.trim().is_empty() {
        return Err(ClipweaveError::validation(format!(
            "clip {clip_idx}: {kind} layer path must be non-empty"
        )));
    }
    Ok(())
}

fn check_positive(what: &str, v: f64) -> ClipweaveResult<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(ClipweaveError::validation(format!(
            "{what} must be finite and > 0 (got {v})"
        )));
    }
    Ok(())
}

fn check_volume(what: &str, v: Option<f64>) -> ClipweaveResult<()> {
    match v {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ClipweaveError::validation(format!(
            "{what} must be finite and >= 0"
        ))),
        _ => Ok(()),
    }
}

fn check_trim(what: &str, from: Option<f64>, to: Option<f64>) -> ClipweaveResult<()> {
    if let Some(f) = from
        && (!f.is_finite() || f < 0.0)
    {
        return Err(ClipweaveError::validation(format!(
            "{what} cut_from must be finite and >= 0"
        )));
    }
    if let Some(t) = to
        && (!t.is_finite() || t <= from.unwrap_or(0.0))
    {
        return Err(ClipweaveError::validation(format!(
            "{what} cut_to must be finite and after cut_from"
        )));
    }
    Ok(())
}

fn check_frame(frame: &OverlayFrame) -> ClipweaveResult<()> {
    for v in [frame.width, frame.height].into_iter().flatten() {
        if !v.is_finite() || v <= 0.0 {
            return Err(ClipweaveError::validation(
                "overlay width/height fractions must be finite and > 0",
            ));
        }
    }
    if let Some(Position::Coords { x, y, .. }) = frame.position
        && (!x.is_finite() || !y.is_finite())
    {
        return Err(ClipweaveError::validation("overlay position must be finite"));
    }
    Ok(())
}

fn default_clip_duration() -> f64 {
    4.0
}

fn default_transition() -> Transition {
    Transition {
        name: default_transition_name(),
        duration: default_transition_duration(),
        audio_out_curve: default_fade_curve(),
        audio_in_curve: default_fade_curve(),
    }
}

fn default_transition_name() -> String {
    "fade".to_string()
}

fn default_transition_duration() -> f64 {
    0.5
}

fn default_fade_curve() -> String {
    "tri".to_string()
}

fn default_volume() -> f64 {
    1.0
}

fn default_zoom_amount() -> f64 {
    0.1
}

fn default_text_color() -> String {
    "white".to_string()
}

fn default_gradient_colors() -> [String; 2] {
    ["#4b134f".to_string(), "#c94b4b".to_string()]
}
