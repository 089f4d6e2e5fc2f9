//! Output profiles: resolution, frame rate, and aspect descriptors.
//!
//! Profiles carry a canonical key used to deduplicate and sort preset
//! lists, and round-trip through both JSON and the key/value text
//! format used by profile preset files.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use crate::error::{ReelError, Result};

/// An exact num/den fraction (frame rates, aspect ratios).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fraction {
    pub num: i64,
    pub den: i64,
}

impl Fraction {
    pub const fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    /// The fraction as an exact rational (den 0 treated as 1).
    pub fn ratio(self) -> Rational64 {
        Rational64::new(self.num, self.den.max(1))
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den.max(1) as f64
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.num, self.den)
    }
}

/// A video output profile.
///
/// Equality and ordering are defined over the visual fields only
/// (`width`, `height`, `interlaced`, `fps`, `display_ratio`), so two
/// presets with different descriptions but identical geometry compare
/// equal. Lexicographic order per field, in that sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub fps: Fraction,
    pub display_ratio: Fraction,
    pub pixel_ratio: Fraction,
    pub interlaced: bool,
    pub spherical: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            description: String::new(),
            width: 1920,
            height: 1080,
            fps: Fraction::new(30, 1),
            display_ratio: Fraction::new(16, 9),
            pixel_ratio: Fraction::new(1, 1),
            interlaced: false,
            spherical: false,
        }
    }
}

impl Profile {
    /// Canonical identity string: zero-padded
    /// `WWWWWxHHHH{p|i}FF.FF_N-D`, with a `_360` suffix for spherical
    /// profiles.
    pub fn key(&self) -> String {
        let scan = if self.interlaced { 'i' } else { 'p' };
        let mut key = format!(
            "{:05}x{:04}{}{:.2}_{}-{}",
            self.width,
            self.height,
            scan,
            self.fps.to_f64(),
            self.display_ratio.num,
            self.display_ratio.den,
        );
        if self.spherical {
            key.push_str("_360");
        }
        key
    }

    /// Compact human label, e.g. `1920x1080p29.97`.
    pub fn short_name(&self) -> String {
        let scan = if self.interlaced { 'i' } else { 'p' };
        let fps = self.fps.to_f64();
        if (fps - fps.round()).abs() < 0.001 {
            format!("{}x{}{}{}", self.width, self.height, scan, fps.round() as i64)
        } else {
            format!("{}x{}{}{:.2}", self.width, self.height, scan, fps)
        }
    }

    /// Verbose human label including aspect ratio and 360 marker.
    pub fn long_name(&self) -> String {
        let mut name = format!(
            "{} ({}:{})",
            self.short_name(),
            self.display_ratio.num,
            self.display_ratio.den
        );
        if self.spherical {
            name.push_str(" 360°");
        }
        name
    }

    fn ord_tuple(&self) -> (u32, u32, bool, Rational64, Rational64) {
        (
            self.width,
            self.height,
            self.interlaced,
            self.fps.ratio(),
            self.display_ratio.ratio(),
        )
    }

    /// Parse the key/value profile text format.
    ///
    /// Recognised keys: `description`, `frame_rate_num`,
    /// `frame_rate_den`, `width`, `height`, `progressive`,
    /// `sample_aspect_num`, `sample_aspect_den`, `display_aspect_num`,
    /// `display_aspect_den`, `spherical`.
    pub fn from_text(content: &str) -> Result<Self> {
        let mut profile = Profile::default();
        let mut saw_any = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            saw_any = true;

            let parse_i64 = |v: &str| {
                v.parse::<i64>()
                    .map_err(|_| ReelError::Profile(format!("bad value for {key}: {v}")))
            };

            match key {
                "description" => profile.description = value.to_string(),
                "frame_rate_num" => profile.fps.num = parse_i64(value)?,
                "frame_rate_den" => profile.fps.den = parse_i64(value)?,
                "width" => profile.width = parse_i64(value)? as u32,
                "height" => profile.height = parse_i64(value)? as u32,
                "progressive" => profile.interlaced = parse_i64(value)? == 0,
                "sample_aspect_num" => profile.pixel_ratio.num = parse_i64(value)?,
                "sample_aspect_den" => profile.pixel_ratio.den = parse_i64(value)?,
                "display_aspect_num" => profile.display_ratio.num = parse_i64(value)?,
                "display_aspect_den" => profile.display_ratio.den = parse_i64(value)?,
                "spherical" => profile.spherical = parse_i64(value)? != 0,
                _ => {} // unknown keys tolerated
            }
        }

        if !saw_any {
            return Err(ReelError::Profile("empty profile text".to_string()));
        }
        Ok(profile)
    }

    /// Render the key/value profile text format (inverse of
    /// [`Profile::from_text`]).
    pub fn to_text(&self) -> String {
        format!(
            "description={}\n\
             frame_rate_num={}\n\
             frame_rate_den={}\n\
             width={}\n\
             height={}\n\
             progressive={}\n\
             sample_aspect_num={}\n\
             sample_aspect_den={}\n\
             display_aspect_num={}\n\
             display_aspect_den={}\n\
             spherical={}\n",
            self.description,
            self.fps.num,
            self.fps.den,
            self.width,
            self.height,
            i32::from(!self.interlaced),
            self.pixel_ratio.num,
            self.pixel_ratio.den,
            self.display_ratio.num,
            self.display_ratio.den,
            i32::from(self.spherical),
        )
    }

    /// Load a profile preset file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_text(&content)
    }

    /// Save a profile preset file, verbatim [`Profile::to_text`].
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }
}

impl PartialEq for Profile {
    fn eq(&self, other: &Self) -> bool {
        self.ord_tuple() == other.ord_tuple()
    }
}

impl Eq for Profile {}

impl PartialOrd for Profile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Profile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ord_tuple().cmp(&other.ord_tuple())
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
