//! Generation parameter model
//!
//! Typed parameter tables for the remote generative-music session:
//! weighted text prompts plus the musical generation config (bpm, scale,
//! density, brightness, sampling controls). Defaults are plain data.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum weight a prompt (or knob) can carry
pub const MAX_WEIGHT: f64 = 2.0;

/// A text prompt with a mix weight and an optional MIDI CC binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedPrompt {
    /// Stable identity, used by the API and event stream
    pub prompt_id: Uuid,
    /// Prompt text sent to the generation service
    pub text: String,
    /// Mix weight in [0.0, 2.0]; 0 means inactive
    pub weight: f64,
    /// MIDI CC number bound to this prompt's weight
    pub cc: u8,
    /// Display color hint for hosts (hex string)
    pub color: String,
}

impl WeightedPrompt {
    /// Create a prompt with a fresh id and clamped weight
    pub fn new(text: impl Into<String>, weight: f64, cc: u8, color: impl Into<String>) -> Self {
        Self {
            prompt_id: Uuid::new_v4(),
            text: text.into(),
            weight: weight.clamp(0.0, MAX_WEIGHT),
            cc,
            color: color.into(),
        }
    }
}

/// Musical scale constraint for generation
///
/// Values mirror the remote service's scale vocabulary; `serde` names are
/// the wire-format identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MusicScale {
    CMajorAMinor,
    DbMajorBbMinor,
    DMajorBMinor,
    EbMajorCMinor,
    EMajorDbMinor,
    FMajorDMinor,
    GbMajorEbMinor,
    GMajorEMinor,
    AbMajorFMinor,
    AMajorGbMinor,
    BbMajorGMinor,
    BMajorAbMinor,
}

/// Generation parameters pushed to the remote session
///
/// Optional fields are omitted from the commit when `None`, letting the
/// service keep its own default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature, valid range [0.0, 3.0]
    pub temperature: f64,
    /// Top-k sampling, valid range [1, 100]
    pub top_k: u32,
    /// Guidance strength, valid range [0.0, 6.0]
    pub guidance: f64,
    /// Beats per minute, valid range [60, 180]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<u32>,
    /// Key/scale constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<MusicScale>,
    /// Note density, valid range [0.0, 1.0]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    /// Timbral brightness, valid range [0.0, 1.0]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    /// Suppress bass stems
    #[serde(default)]
    pub mute_bass: bool,
    /// Suppress drum stems
    #[serde(default)]
    pub mute_drums: bool,
    /// Generate only bass and drums
    #[serde(default)]
    pub only_bass_and_drums: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.1,
            top_k: 40,
            guidance: 4.0,
            bpm: None,
            scale: None,
            density: None,
            brightness: None,
            mute_bass: false,
            mute_drums: false,
            only_bass_and_drums: false,
        }
    }
}

impl GenerationConfig {
    /// Clamp all fields into their valid ranges
    pub fn clamped(mut self) -> Self {
        self.temperature = self.temperature.clamp(0.0, 3.0);
        self.top_k = self.top_k.clamp(1, 100);
        self.guidance = self.guidance.clamp(0.0, 6.0);
        self.bpm = self.bpm.map(|b| b.clamp(60, 180));
        self.density = self.density.map(|d| d.clamp(0.0, 1.0));
        self.brightness = self.brightness.map(|b| b.clamp(0.0, 1.0));
        self
    }
}

/// Default prompt bank: 16 genre/texture prompts bound to CC 0-15
///
/// Two prompts are seeded with non-zero weight so a fresh engine has
/// something to play.
pub fn default_prompts() -> Vec<WeightedPrompt> {
    const BANK: [(&str, f64, &str); 16] = [
        ("Bossa Nova", 1.0, "#9900ff"),
        ("Minimal Techno", 1.0, "#ff0000"),
        ("Drum and Bass", 0.0, "#ffdd28"),
        ("Post Punk", 0.0, "#2af6de"),
        ("Shoegaze", 0.0, "#ffdd28"),
        ("Funk", 0.0, "#3dffab"),
        ("Chiptune", 0.0, "#d8ff3e"),
        ("Lush Strings", 0.0, "#d9b2ff"),
        ("Sparkling Arpeggios", 0.0, "#3dffab"),
        ("Staccato Rhythms", 0.0, "#2af6de"),
        ("Punchy Kick", 0.0, "#9900ff"),
        ("Dubstep", 0.0, "#ff25f6"),
        ("K Pop", 0.0, "#d8ff3e"),
        ("Neo Soul", 0.0, "#ffdd28"),
        ("Trip Hop", 0.0, "#d9b2ff"),
        ("Thrash", 0.0, "#ff0000"),
    ];

    BANK.iter()
        .enumerate()
        .map(|(cc, (text, weight, color))| WeightedPrompt::new(*text, *weight, cc as u8, *color))
        .collect()
}
