//! Prompt bank: weighted prompts with per-prompt knobs and CC bindings
//!
//! Owns the engine's prompt set. Each prompt carries an animated
//! [`WeightKnob`] whose committed value is the prompt's weight; MIDI CC
//! values map linearly onto the weight range. Prompts rejected by the
//! remote service are remembered here and excluded from the active set
//! for the rest of the session.

use crate::knob::{KnobVisuals, SmoothingContext, WeightKnob};
use gdj_common::params::{default_prompts, WeightedPrompt, MAX_WEIGHT};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// One prompt plus its knob
struct PromptEntry {
    prompt: WeightedPrompt,
    knob: WeightKnob,
    /// Auto-mode flag (slow-fade toggle)
    auto: bool,
}

/// API-facing prompt snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PromptStatus {
    #[serde(flatten)]
    pub prompt: WeightedPrompt,
    pub auto: bool,
    pub filtered: bool,
    pub rotation_deg: f64,
    pub halo_alpha: f64,
}

/// The engine's prompt set
pub struct PromptBank {
    entries: Vec<PromptEntry>,
    /// Prompt texts rejected by the service, with the reason
    filtered: HashMap<String, String>,
}

impl PromptBank {
    /// Bank seeded with the default prompts
    pub fn new() -> Self {
        Self::with_prompts(default_prompts())
    }

    pub fn with_prompts(prompts: Vec<WeightedPrompt>) -> Self {
        let entries = prompts
            .into_iter()
            .map(|prompt| {
                let knob = WeightKnob::new(prompt.weight);
                PromptEntry {
                    prompt,
                    knob,
                    auto: false,
                }
            })
            .collect();
        Self {
            entries,
            filtered: HashMap::new(),
        }
    }

    fn entry_mut(&mut self, prompt_id: Uuid) -> Option<&mut PromptEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.prompt.prompt_id == prompt_id)
    }

    /// Set a prompt's weight from direct manipulation or the API
    ///
    /// Returns the clamped committed weight, or None for an unknown id.
    pub fn set_weight(&mut self, prompt_id: Uuid, weight: f64) -> Option<f64> {
        let entry = self.entry_mut(prompt_id)?;
        let committed = entry.knob.set_value(weight, SmoothingContext::Drag);
        entry.prompt.weight = committed;
        entry.auto = false;
        Some(committed)
    }

    /// Toggle a prompt's auto mode: entering fades the weight to 1.0,
    /// leaving fades it to 0.0, both under the slow smoothing profile
    pub fn set_auto(&mut self, prompt_id: Uuid, auto: bool) -> Option<f64> {
        let entry = self.entry_mut(prompt_id)?;
        entry.auto = auto;
        let committed = entry.knob.trigger_auto_animation(auto);
        entry.prompt.weight = committed;
        Some(committed)
    }

    /// Map a CC value (0-127) onto the bound prompt's weight (0-2)
    ///
    /// Returns the prompt id and committed weight if a prompt is bound to
    /// this CC number.
    pub fn apply_cc(&mut self, cc: u8, value: u8) -> Option<(Uuid, f64)> {
        let entry = self.entries.iter_mut().find(|e| e.prompt.cc == cc)?;
        let weight = value as f64 / 127.0 * MAX_WEIGHT;
        let committed = entry.knob.set_value(weight, SmoothingContext::Drag);
        entry.prompt.weight = committed;
        entry.auto = false;
        Some((entry.prompt.prompt_id, committed))
    }

    /// Record a service rejection of a prompt's text
    pub fn mark_filtered(&mut self, text: impl Into<String>, reason: impl Into<String>) {
        self.filtered.insert(text.into(), reason.into());
    }

    pub fn is_filtered(&self, text: &str) -> bool {
        self.filtered.contains_key(text)
    }

    /// Prompts that participate in generation: non-zero weight and not
    /// rejected by the service
    pub fn active_prompts(&self) -> Vec<WeightedPrompt> {
        self.entries
            .iter()
            .filter(|e| e.prompt.weight > 0.0 && !self.filtered.contains_key(&e.prompt.text))
            .map(|e| e.prompt.clone())
            .collect()
    }

    /// Advance all knob animations one frame; returns true while any knob
    /// is still converging
    pub fn tick(&mut self) -> bool {
        let mut animating = false;
        for entry in &mut self.entries {
            animating |= entry.knob.tick();
        }
        animating
    }

    /// Render-time visuals for one prompt's knob
    pub fn visuals(&self, prompt_id: Uuid, audio_level: f64) -> Option<KnobVisuals> {
        self.entries
            .iter()
            .find(|e| e.prompt.prompt_id == prompt_id)
            .map(|e| e.knob.visuals(audio_level))
    }

    /// Full status snapshot for the API
    pub fn status(&self, audio_level: f64) -> Vec<PromptStatus> {
        self.entries
            .iter()
            .map(|e| {
                let visuals = e.knob.visuals(audio_level);
                PromptStatus {
                    prompt: e.prompt.clone(),
                    auto: e.auto,
                    filtered: self.filtered.contains_key(&e.prompt.text),
                    rotation_deg: visuals.rotation_deg,
                    halo_alpha: visuals.halo_alpha,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PromptBank {
    fn default() -> Self {
        Self::new()
    }
}
