//! Continuous weight knob with per-channel animation
//!
//! A knob owns one committed scalar in [0, 2] and three derived display
//! channels (indicator dot, arc fill, halo alpha), each independently
//! interpolated toward its target by a single `tick()` driver. Channels
//! remember which interaction context set their target: direct
//! manipulation (drag/wheel) converges an order of magnitude faster than
//! programmatic auto transitions, and the two must not fight when they
//! overlap, so the factor travels with the target.
//!
//! Starting a gesture snaps every channel to the committed value first;
//! otherwise a stale slow auto animation would visibly fight the drag.

/// Committed value range
pub const MAX_VALUE: f64 = 2.0;

/// Convergence threshold: below this distance a channel snaps to its
/// target and goes idle
pub const EPSILON: f64 = 0.001;

/// Vertical drag sensitivity in value units per pixel (up = increase)
pub const DRAG_SENSITIVITY: f64 = 0.01;

/// Wheel sensitivity in value units per scroll delta (up = increase)
pub const WHEEL_SENSITIVITY: f64 = 0.0025;

/// Rotation sweep of the indicator dot, degrees to each side of center
pub const ROTATION_SWEEP_DEG: f64 = 132.5;

/// Interaction context that sourced a channel's current target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingContext {
    /// Direct manipulation: snappy response
    Drag,
    /// Programmatic auto transition: slow fade
    Auto,
}

impl SmoothingContext {
    /// Per-tick smoothing factor
    pub fn factor(self) -> f64 {
        match self {
            SmoothingContext::Drag => 0.25,
            SmoothingContext::Auto => 0.02,
        }
    }
}

/// One animated display channel
#[derive(Debug, Clone, Copy)]
struct AnimChannel {
    current: f64,
    target: f64,
    context: SmoothingContext,
}

impl AnimChannel {
    fn new(value: f64) -> Self {
        Self {
            current: value,
            target: value,
            context: SmoothingContext::Drag,
        }
    }

    fn retarget(&mut self, target: f64, context: SmoothingContext) {
        self.target = target;
        self.context = context;
    }

    fn snap(&mut self, value: f64) {
        self.current = value;
        self.target = value;
    }

    /// Advance one frame; returns true while still converging
    fn tick(&mut self) -> bool {
        if self.current == self.target {
            return false;
        }
        self.current += (self.target - self.current) * self.context.factor();
        if (self.target - self.current).abs() < EPSILON {
            self.current = self.target;
            return false;
        }
        true
    }

    fn is_idle(&self) -> bool {
        self.current == self.target
    }
}

const DOT: usize = 0;
const ARC: usize = 1;
const HALO: usize = 2;

/// Render-time visual state, derived from channel currents plus the live
/// audio level; nothing here is stored
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnobVisuals {
    /// Indicator rotation in degrees, negative = counter-clockwise
    pub rotation_deg: f64,
    /// Arc fill position in [0, 2]
    pub arc_value: f64,
    /// Halo opacity in [0, 1]
    pub halo_alpha: f64,
    /// Halo scale multiplier, >= 1
    pub halo_scale: f64,
}

/// Animated continuous-value knob
#[derive(Debug)]
pub struct WeightKnob {
    /// Committed value in [0, 2]
    value: f64,
    /// Drag gesture anchor (committed value at gesture start)
    gesture_base: Option<f64>,
    channels: [AnimChannel; 3],
}

impl WeightKnob {
    pub fn new(value: f64) -> Self {
        let value = value.clamp(0.0, MAX_VALUE);
        Self {
            value,
            gesture_base: None,
            channels: [
                AnimChannel::new(value),
                AnimChannel::new(value),
                AnimChannel::new(halo_target(value)),
            ],
        }
    }

    /// Committed value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the committed value and retarget all channels
    ///
    /// Returns the clamped committed value; callers forward it as the
    /// input notification for externally sourced changes.
    pub fn set_value(&mut self, value: f64, context: SmoothingContext) -> f64 {
        self.value = value.clamp(0.0, MAX_VALUE);
        self.channels[DOT].retarget(self.value, context);
        self.channels[ARC].retarget(self.value, context);
        self.channels[HALO].retarget(halo_target(self.value), context);
        self.value
    }

    /// Auto toggle: snap toward 1.0 (entering) or 0.0 (leaving) under the
    /// slow smoothing profile
    pub fn trigger_auto_animation(&mut self, entering: bool) -> f64 {
        let target = if entering { 1.0 } else { 0.0 };
        self.set_value(target, SmoothingContext::Auto)
    }

    /// Force all channels to the committed value and cancel in-flight
    /// animation
    pub fn snap_to_current_value(&mut self) {
        self.channels[DOT].snap(self.value);
        self.channels[ARC].snap(self.value);
        self.channels[HALO].snap(halo_target(self.value));
    }

    /// Begin a pointer drag: anchor the gesture and kill stale animation
    pub fn begin_gesture(&mut self) {
        self.gesture_base = Some(self.value);
        self.snap_to_current_value();
    }

    /// Apply a drag's total vertical travel in pixels (positive = down)
    ///
    /// Returns the new committed value, or None if no gesture is active.
    pub fn gesture_delta(&mut self, total_dy_pixels: f64) -> Option<f64> {
        let base = self.gesture_base?;
        Some(self.set_value(
            base - total_dy_pixels * DRAG_SENSITIVITY,
            SmoothingContext::Drag,
        ))
    }

    /// End the active drag gesture
    pub fn end_gesture(&mut self) {
        self.gesture_base = None;
    }

    /// Apply a wheel delta (positive = scroll down)
    pub fn wheel_delta(&mut self, delta: f64) -> f64 {
        self.set_value(
            self.value - delta * WHEEL_SENSITIVITY,
            SmoothingContext::Drag,
        )
    }

    /// Advance all channels one frame; returns true while any channel is
    /// still converging
    pub fn tick(&mut self) -> bool {
        let mut animating = false;
        for channel in &mut self.channels {
            animating |= channel.tick();
        }
        animating
    }

    /// True while any channel has not reached its target
    pub fn is_animating(&self) -> bool {
        self.channels.iter().any(|c| !c.is_idle())
    }

    /// Derive render state from the channel currents and a live audio level
    pub fn visuals(&self, audio_level: f64) -> KnobVisuals {
        let dot = self.channels[DOT].current;
        let arc = self.channels[ARC].current;
        let halo = self.channels[HALO].current;

        let rotation_deg =
            -ROTATION_SWEEP_DEG + (dot / MAX_VALUE) * (2.0 * ROTATION_SWEEP_DEG);
        let energy = (halo + audio_level).clamp(0.0, 1.0);

        KnobVisuals {
            rotation_deg,
            arc_value: arc,
            halo_alpha: energy,
            halo_scale: 1.0 + energy,
        }
    }
}

impl Default for WeightKnob {
    fn default() -> Self {
        Self::new(0.0)
    }
}

fn halo_target(value: f64) -> f64 {
    if value > EPSILON {
        1.0
    } else {
        0.0
    }
}
