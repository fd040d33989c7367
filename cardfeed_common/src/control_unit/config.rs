//! Configuration structures for the control unit.
//!
//! All config types use `serde::Deserialize` for TOML loading.
//! Every field has a default, so partial sections are valid.
//! Timeouts and pauses are seconds as `f64`, exposed as `Duration` accessors.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::seconds;
use crate::consts::{
    ALIGN_TIMEOUT_DEFAULT, COLLECT_TIMEOUT_DEFAULT, EJECT_MOTION_TIMEOUT_DEFAULT,
    EJECT_REMOVAL_TIMEOUT_DEFAULT, FEED_TIMEOUT_DEFAULT, FEEDBACK_TIMEOUT_DEFAULT,
    MAX_TIMEOUT_S, POLL_PAUSE_DEFAULT, POSITION_TIMEOUT_DEFAULT, PULL_THROUGH_STEP_DELAY_US,
};
use crate::hal::types::{MoveSpec, StepProfile};

// ─── Motion ─────────────────────────────────────────────────────────

/// Named moves used by the state handlers.
///
/// Defaults are the V3 transport's calibration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Feeding: one forward increment per poll.
    pub feed: MoveSpec,
    /// Aligning: one forward increment per poll.
    pub align: MoveSpec,
    /// Positioning (a): forward increment until the slot sensors clear.
    pub position_advance: MoveSpec,
    /// Positioning (b): overshoot past the slot sensors.
    pub position_overshoot: MoveSpec,
    /// Positioning (c): backward increment until the slot sensors re-occupy.
    pub position_approach: MoveSpec,
    /// Positioning (d): backward travel from the reference edge to the capture point.
    pub capture_offset: MoveSpec,
    /// Collecting: forward increment until s2 clears.
    pub collect: MoveSpec,
    /// Collecting: final pull-through into the tray.
    pub collect_pull_through: MoveSpec,
    /// Ejecting: initial backward travel.
    pub eject_offset: MoveSpec,
    /// Ejecting: backward increment until s2 clears.
    pub eject_approach: MoveSpec,
    /// Ejecting: final push out of the slot.
    pub eject_push: MoveSpec,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            feed: MoveSpec::new(StepProfile::Sixteenth, 100),
            align: MoveSpec::new(StepProfile::Half, 100),
            position_advance: MoveSpec::new(StepProfile::Half, 10),
            position_overshoot: MoveSpec::new(StepProfile::Half, 10),
            position_approach: MoveSpec::new(StepProfile::Sixteenth, 10),
            capture_offset: MoveSpec::new(StepProfile::Sixteenth, 20 * 8),
            collect: MoveSpec::new(StepProfile::Half, 200),
            collect_pull_through: MoveSpec::new(StepProfile::Half, 3000)
                .with_delay_us(PULL_THROUGH_STEP_DELAY_US),
            eject_offset: MoveSpec::new(StepProfile::Half, 100),
            eject_approach: MoveSpec::new(StepProfile::Sixteenth, 10),
            eject_push: MoveSpec::new(StepProfile::Half, 50),
        }
    }
}

impl MotionConfig {
    fn named(&self) -> [(&'static str, &MoveSpec); 11] {
        [
            ("feed", &self.feed),
            ("align", &self.align),
            ("position_advance", &self.position_advance),
            ("position_overshoot", &self.position_overshoot),
            ("position_approach", &self.position_approach),
            ("capture_offset", &self.capture_offset),
            ("collect", &self.collect),
            ("collect_pull_through", &self.collect_pull_through),
            ("eject_offset", &self.eject_offset),
            ("eject_approach", &self.eject_approach),
            ("eject_push", &self.eject_push),
        ]
    }

    /// Every move needs at least one step and a non-zero delay.
    pub fn validate(&self) -> Result<(), String> {
        for (name, spec) in self.named() {
            if spec.steps == 0 {
                return Err(format!("motion.{name}.steps must be greater than 0"));
            }
            if spec.step_delay_us == 0 {
                return Err(format!("motion.{name}.step_delay_us must be greater than 0"));
            }
        }
        Ok(())
    }
}

// ─── Timeouts ───────────────────────────────────────────────────────

fn default_feed() -> f64 {
    FEED_TIMEOUT_DEFAULT
}
fn default_align() -> f64 {
    ALIGN_TIMEOUT_DEFAULT
}
fn default_position() -> f64 {
    POSITION_TIMEOUT_DEFAULT
}
fn default_collect() -> f64 {
    COLLECT_TIMEOUT_DEFAULT
}
fn default_eject_motion() -> f64 {
    EJECT_MOTION_TIMEOUT_DEFAULT
}
fn default_eject_removal() -> f64 {
    EJECT_REMOVAL_TIMEOUT_DEFAULT
}
fn default_feedback() -> f64 {
    FEEDBACK_TIMEOUT_DEFAULT
}
fn default_poll() -> f64 {
    POLL_PAUSE_DEFAULT
}

/// Per-state watchdog limits and poll pauses [s].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_feed")]
    pub feed: f64,
    #[serde(default = "default_align")]
    pub align: f64,
    /// Shared by all positioning phases.
    #[serde(default = "default_position")]
    pub position: f64,
    #[serde(default = "default_collect")]
    pub collect: f64,
    #[serde(default = "default_eject_motion")]
    pub eject_motion: f64,
    /// Wait for an ejected card to be taken before pulling it back in.
    #[serde(default = "default_eject_removal")]
    pub eject_removal: f64,
    /// Wait for accept/reject before treating the card as accepted.
    #[serde(default = "default_feedback")]
    pub feedback: f64,
    /// Pause between Idle polls.
    #[serde(default = "default_poll")]
    pub idle_poll: f64,
    /// Pause between Error polls.
    #[serde(default = "default_poll")]
    pub error_poll: f64,
    /// Pause between polls while waiting for card removal.
    #[serde(default = "default_poll")]
    pub removal_poll: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            feed: default_feed(),
            align: default_align(),
            position: default_position(),
            collect: default_collect(),
            eject_motion: default_eject_motion(),
            eject_removal: default_eject_removal(),
            feedback: default_feedback(),
            idle_poll: default_poll(),
            error_poll: default_poll(),
            removal_poll: default_poll(),
        }
    }
}

impl TimeoutConfig {
    /// Same limit for every watchdog and wait, short polls. Intended for tests and bench runs.
    pub fn uniform(limit: Duration, poll: Duration) -> Self {
        let limit = limit.as_secs_f64();
        let poll = poll.as_secs_f64();
        Self {
            feed: limit,
            align: limit,
            position: limit,
            collect: limit,
            eject_motion: limit,
            eject_removal: limit,
            feedback: limit,
            idle_poll: poll,
            error_poll: poll,
            removal_poll: poll,
        }
    }

    pub fn feed(&self) -> Duration {
        seconds(self.feed)
    }
    pub fn align(&self) -> Duration {
        seconds(self.align)
    }
    pub fn position(&self) -> Duration {
        seconds(self.position)
    }
    pub fn collect(&self) -> Duration {
        seconds(self.collect)
    }
    pub fn eject_motion(&self) -> Duration {
        seconds(self.eject_motion)
    }
    pub fn eject_removal(&self) -> Duration {
        seconds(self.eject_removal)
    }
    pub fn feedback(&self) -> Duration {
        seconds(self.feedback)
    }
    pub fn idle_poll(&self) -> Duration {
        seconds(self.idle_poll)
    }
    pub fn error_poll(&self) -> Duration {
        seconds(self.error_poll)
    }
    pub fn removal_poll(&self) -> Duration {
        seconds(self.removal_poll)
    }

    /// Watchdog limits must be positive, pauses non-negative, all at most
    /// [`MAX_TIMEOUT_S`].
    pub fn validate(&self) -> Result<(), String> {
        let limits = [
            ("feed", self.feed),
            ("align", self.align),
            ("position", self.position),
            ("collect", self.collect),
            ("eject_motion", self.eject_motion),
            ("eject_removal", self.eject_removal),
            ("feedback", self.feedback),
        ];
        for (name, value) in limits {
            if !value.is_finite() || value <= 0.0 || value > MAX_TIMEOUT_S {
                return Err(format!(
                    "timeouts.{name} must be in (0, {MAX_TIMEOUT_S}], got {value}"
                ));
            }
        }
        let pauses = [
            ("idle_poll", self.idle_poll),
            ("error_poll", self.error_poll),
            ("removal_poll", self.removal_poll),
        ];
        for (name, value) in pauses {
            if !value.is_finite() || value < 0.0 || value > MAX_TIMEOUT_S {
                return Err(format!(
                    "timeouts.{name} must be in [0, {MAX_TIMEOUT_S}], got {value}"
                ));
            }
        }
        Ok(())
    }
}

// ─── Capture regions ────────────────────────────────────────────────

/// Rectangle in fractions of the image size, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Pixel rectangle `(x, y, width, height)` for an image of the given size.
    ///
    /// Clamped to the image; never empty for a non-empty image.
    pub fn to_pixels(&self, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
        let scale = |frac: f64, size: u32| ((frac * size as f64).round() as u32).min(size);
        let x = scale(self.x, image_width).min(image_width.saturating_sub(1));
        let y = scale(self.y, image_height).min(image_height.saturating_sub(1));
        let width = scale(self.width, image_width).clamp(1, (image_width - x).max(1));
        let height = scale(self.height, image_height).clamp(1, (image_height - y).max(1));
        (x, y, width, height)
    }

    fn validate(&self, name: &str) -> Result<(), String> {
        let fields = [self.x, self.y, self.width, self.height];
        if fields.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(format!("capture.{name} fields must be finite and non-negative"));
        }
        if self.width == 0.0 || self.height == 0.0 {
            return Err(format!("capture.{name} must not be empty"));
        }
        if self.x + self.width > 1.0 || self.y + self.height > 1.0 {
            return Err(format!("capture.{name} exceeds the image bounds"));
        }
        Ok(())
    }
}

/// Marker search regions.
///
/// The marker is printed in one corner of the card. Found in `near`, the card
/// was inserted upside down and the image is rotated 180°; found in `far`, the
/// image is already upright.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub near: Region,
    pub far: Region,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            near: Region::new(0.0, 0.5, 0.3, 0.5),
            far: Region::new(0.7, 0.0, 0.3, 0.5),
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.near.validate("near")?;
        self.far.validate("far")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(MotionConfig::default().validate().is_ok());
        assert!(TimeoutConfig::default().validate().is_ok());
        assert!(CaptureConfig::default().validate().is_ok());
    }

    #[test]
    fn default_timeouts() {
        let t = TimeoutConfig::default();
        assert_eq!(t.feed(), Duration::from_secs(5));
        assert_eq!(t.position(), Duration::from_secs(10));
        assert_eq!(t.eject_removal(), Duration::from_secs(60));
        assert_eq!(t.feedback(), Duration::from_secs(120));
        assert_eq!(t.idle_poll(), Duration::from_millis(100));
    }

    #[test]
    fn zero_step_move_rejected() {
        let mut motion = MotionConfig::default();
        motion.eject_push.steps = 0;
        let err = motion.validate().unwrap_err();
        assert!(err.contains("eject_push"));
    }

    #[test]
    fn negative_timeout_rejected() {
        let mut t = TimeoutConfig::default();
        t.collect = -1.0;
        assert!(t.validate().unwrap_err().contains("collect"));
        let mut t = TimeoutConfig::default();
        t.error_poll = f64::NAN;
        assert!(t.validate().is_err());
    }

    #[test]
    fn oversized_timeout_rejected() {
        let mut t = TimeoutConfig::default();
        t.feedback = 1e20;
        assert!(t.validate().unwrap_err().contains("feedback"));
        let mut t = TimeoutConfig::default();
        t.removal_poll = MAX_TIMEOUT_S * 2.0;
        assert!(t.validate().unwrap_err().contains("removal_poll"));
        let mut t = TimeoutConfig::default();
        t.eject_removal = MAX_TIMEOUT_S;
        assert!(t.validate().is_ok());
    }

    #[test]
    fn accessors_saturate_instead_of_panicking() {
        let mut t = TimeoutConfig::default();
        t.feedback = 1e20;
        t.idle_poll = f64::NAN;
        t.error_poll = -3.0;
        assert_eq!(t.feedback(), Duration::from_secs_f64(MAX_TIMEOUT_S));
        assert_eq!(t.idle_poll(), Duration::ZERO);
        assert_eq!(t.error_poll(), Duration::ZERO);
    }

    #[test]
    fn region_to_pixels() {
        let near = CaptureConfig::default().near;
        assert_eq!(near.to_pixels(1000, 800), (0, 400, 300, 400));
        let far = CaptureConfig::default().far;
        assert_eq!(far.to_pixels(1000, 800), (700, 0, 300, 400));
    }

    #[test]
    fn tiny_region_is_never_empty() {
        let r = Region::new(0.99, 0.99, 0.01, 0.01);
        let (x, y, w, h) = r.to_pixels(10, 10);
        assert!(w >= 1 && h >= 1);
        assert!(x + w <= 10 && y + h <= 10);
    }

    #[test]
    fn out_of_bounds_region_rejected() {
        let mut capture = CaptureConfig::default();
        capture.far = Region::new(0.8, 0.0, 0.3, 0.5);
        assert!(capture.validate().unwrap_err().contains("far"));
    }

    #[test]
    fn partial_motion_section() {
        let motion: MotionConfig = toml::from_str(
            r#"
[feed]
profile = "half"
steps = 50
"#,
        )
        .unwrap();
        assert_eq!(motion.feed, MoveSpec::new(StepProfile::Half, 50));
        assert_eq!(motion.align, MotionConfig::default().align);
    }
}
