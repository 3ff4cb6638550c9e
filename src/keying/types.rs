use thiserror::Error;

/// RGB color with channels in [0, 1]
pub type Rgb = [f32; 3];

/// Key color used when none is configured (the green of the bundled overlay)
pub const DEFAULT_KEY_COLOR: &str = "#43A34E";

#[derive(Debug, Error, PartialEq)]
pub enum ColorParseError {
    #[error("expected #RRGGBB, got {0:?}")]
    Format(String),
}

/// Parameters for the chroma-key pass
///
/// `similarity` is the center of the smoothstep band and `smoothness` its
/// half-width, both measured in hue/saturation distance units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyColorConfig {
    pub key_color: Rgb,
    similarity: f32,
    smoothness: f32,
    /// Parsed for compatibility with older configs, never read by the keying pass
    pub spill: f32,
    /// Bypass keying and render the overlay fully opaque (calibration only)
    pub debug_mode: bool,
}

impl Default for KeyColorConfig {
    fn default() -> Self {
        Self {
            key_color: [67.0 / 255.0, 163.0 / 255.0, 78.0 / 255.0],
            similarity: 0.5,
            smoothness: 0.2,
            spill: 0.3,
            debug_mode: false,
        }
    }
}

impl KeyColorConfig {
    pub fn new(key_color: Rgb, similarity: f32, smoothness: f32) -> Self {
        let mut config = Self {
            key_color,
            ..Self::default()
        };
        config.set_similarity(similarity);
        config.set_smoothness(smoothness);
        config
    }

    pub fn similarity(&self) -> f32 {
        self.similarity
    }

    pub fn smoothness(&self) -> f32 {
        self.smoothness
    }

    /// Clamped to [0, 1]
    pub fn set_similarity(&mut self, similarity: f32) {
        self.similarity = if similarity.is_nan() {
            0.0
        } else {
            similarity.clamp(0.0, 1.0)
        };
    }

    /// Negative values are treated as a hard edge (0)
    pub fn set_smoothness(&mut self, smoothness: f32) {
        self.smoothness = if smoothness.is_nan() {
            0.0
        } else {
            smoothness.max(0.0)
        };
    }

    /// Apply a partial live-tuning update
    pub fn apply(&mut self, update: &KeyColorUpdate) {
        if let Some(color) = update.key_color {
            self.key_color = color;
        }
        if let Some(similarity) = update.similarity {
            self.set_similarity(similarity);
        }
        if let Some(smoothness) = update.smoothness {
            self.set_smoothness(smoothness);
        }
    }
}

/// Live-tuning update; `None` fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KeyColorUpdate {
    pub key_color: Option<Rgb>,
    pub similarity: Option<f32>,
    pub smoothness: Option<f32>,
}

/// Parse `#RRGGBB` (leading `#` optional) into normalized RGB
pub fn parse_hex_color(input: &str) -> Result<Rgb, ColorParseError> {
    let hex = input.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ColorParseError::Format(input.to_string()));
    }

    let channel = |i: usize| -> Result<f32, ColorParseError> {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map(|v| v as f32 / 255.0)
            .map_err(|_| ColorParseError::Format(input.to_string()))
    };

    Ok([channel(0)?, channel(2)?, channel(4)?])
}
