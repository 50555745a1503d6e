use crate::foundation::error::{ClipweaveError, ClipweaveResult};

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> ClipweaveResult<Self> {
        if den == 0 {
            return Err(ClipweaveError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(ClipweaveError::validation("Fps num must be > 0"));
        }
        let g = gcd(num, den);
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    /// Convert a floating-point rate (as written in composition JSON) to a rational.
    ///
    /// The NTSC family is mapped onto its exact `x000/1001` form so timebases stay exact.
    pub fn from_f64(fps: f64) -> ClipweaveResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ClipweaveError::validation(format!(
                "fps must be finite and > 0 (got {fps})"
            )));
        }
        for base in [24u32, 30, 60] {
            let ntsc = f64::from(base) * 1000.0 / 1001.0;
            if (fps - ntsc).abs() < 0.005 {
                return Self::new(base * 1000, 1001);
            }
        }
        if (fps - fps.round()).abs() < 1e-9 {
            return Self::new(fps.round() as u32, 1);
        }
        Self::new((fps * 1000.0).round() as u32, 1000)
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Rate as an ffmpeg rational (`30` or `30000/1001`).
    pub fn to_ffmpeg(self) -> String {
        if self.den == 1 {
            self.num.to_string()
        } else {
            format!("{}/{}", self.num, self.den)
        }
    }

    /// Timebase of one frame (`1/fps`) as an ffmpeg rational.
    pub fn timebase(self) -> String {
        format!("{}/{}", self.den, self.num)
    }

    /// Number of whole frames needed to cover `secs`, rounding up.
    pub fn frames_ceil(self, secs: f64) -> u64 {
        // Guard float noise such as 2.0 * 25.0 = 50.000000000000007.
        let frames = secs * self.as_f64();
        let rounded = frames.round();
        if (frames - rounded).abs() < 1e-6 {
            rounded.max(0.0) as u64
        } else {
            frames.ceil().max(0.0) as u64
        }
    }
}

/// Output canvas dimensions in pixels. Always even once resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// Build a canvas from arbitrary (possibly fractional) dimensions, rounding each axis to
    /// the nearest even integer.
    pub fn even(width: f64, height: f64) -> Self {
        Self {
            width: round_even(width),
            height: round_even(height),
        }
    }

    pub fn min_side(self) -> u32 {
        self.width.min(self.height)
    }

    pub fn aspect(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    pub fn size_arg(self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Round to the nearest even integer (never below 2). yuv420p needs even dimensions.
pub fn round_even(v: f64) -> u32 {
    if !v.is_finite() || v <= 2.0 {
        return 2;
    }
    let n = ((v / 2.0).round() * 2.0) as u32;
    n.max(2)
}

/// Format a number for filter arguments: fixed precision, trailing zeros trimmed.
pub fn fmt_num(v: f64) -> String {
    let s = format!("{v:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "" | "-0" => "0".to_string(),
        _ => s.to_string(),
    }
}

/// [`fmt_num`] for durations and offsets, which are never negative.
pub fn fmt_secs(secs: f64) -> String {
    fmt_num(secs.max(0.0))
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_from_float_handles_integer_and_ntsc_rates() {
        assert_eq!(Fps::from_f64(25.0).unwrap(), Fps { num: 25, den: 1 });
        assert_eq!(
            Fps::from_f64(29.97).unwrap(),
            Fps {
                num: 30000,
                den: 1001
            }
        );
        assert_eq!(Fps::from_f64(12.5).unwrap(), Fps { num: 25, den: 2 });
        assert!(Fps::from_f64(0.0).is_err());
        assert!(Fps::from_f64(f64::NAN).is_err());
    }

    #[test]
    fn fps_ffmpeg_strings() {
        let fps = Fps::new(30000, 1001).unwrap();
        assert_eq!(fps.to_ffmpeg(), "30000/1001");
        assert_eq!(fps.timebase(), "1001/30000");
        assert_eq!(Fps::new(25, 1).unwrap().timebase(), "1/25");
    }

    #[test]
    fn frames_ceil_rounds_up_partial_frames() {
        let fps = Fps::new(25, 1).unwrap();
        assert_eq!(fps.frames_ceil(2.0), 50);
        assert_eq!(fps.frames_ceil(2.01), 51);
        assert_eq!(Fps::new(30, 1).unwrap().frames_ceil(0.1), 3);
    }

    #[test]
    fn round_even_always_even() {
        for v in [0.0, 1.0, 3.0, 479.0, 480.4, 481.0, 1079.9, 1919.5] {
            let n = round_even(v);
            assert_eq!(n % 2, 0, "{v} -> {n}");
            assert!(n >= 2);
        }
        assert_eq!(round_even(481.0), 482);
        assert_eq!(round_even(479.0), 480);
    }

    #[test]
    fn fmt_secs_trims_trailing_zeros() {
        assert_eq!(fmt_secs(4.5), "4.5");
        assert_eq!(fmt_secs(2.0), "2");
        assert_eq!(fmt_secs(0.0), "0");
        assert_eq!(fmt_secs(1.0 / 3.0), "0.333333");
        assert_eq!(fmt_secs(-1.0), "0");
        assert_eq!(fmt_num(-0.25), "-0.25");
        assert_eq!(fmt_num(-0.0000001), "0");
    }
}
