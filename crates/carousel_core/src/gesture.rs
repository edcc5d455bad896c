//! Drag gesture interpretation for the slide strip.
//!
//! Pixel movement is converted to viewport-width units with a scale of
//! `100 / viewport_width_px`. The scale is captured when a gesture starts, so
//! a resize between gestures is picked up but one during a drag is not.
//!
//! On release the horizontal distance decides between a tap (re-dispatched
//! as a click on whatever sits under the pointer), a one-slide step, or a
//! snap back. Steps never wrap: dragging past the first or last slide leaves
//! the deck where it is.

use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::deck::{Deck, DeckUpdate};

pub const DEFAULT_TAP_THRESHOLD_PX: f64 = 20.0;
pub const DEFAULT_SLIDE_THRESHOLD_PX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Below this distance a release is a tap.
    pub tap_threshold_px: f64,
    /// At or beyond this distance a release changes slide.
    pub slide_threshold_px: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tap_threshold_px: DEFAULT_TAP_THRESHOLD_PX,
            slide_threshold_px: DEFAULT_SLIDE_THRESHOLD_PX,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GestureError {
    #[error("a gesture is already in progress")]
    AlreadyActive,
    #[error("cannot drag an empty deck")]
    EmptyDeck,
}

/// State between drag start and drag end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSession {
    pub start_x: f64,
    pub start_y: f64,
    /// Viewport-width units per pixel for this gesture.
    pub scale: f64,
    pub baseline_offset_vw: f64,
    pub current_offset_vw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEffect {
    /// Movement stayed under the tap threshold; click the element at (x, y).
    Tap { x: f64, y: f64 },
    Advanced,
    Retreated,
    SnappedBack,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureOutcome {
    pub effect: GestureEffect,
    pub final_delta_vw: f64,
    pub settle: DeckUpdate,
}

#[derive(Debug, Clone)]
pub struct GestureInterpreter {
    config: GestureConfig,
    viewport_width_px: f64,
    session: Option<GestureSession>,
}

impl GestureInterpreter {
    pub fn new(config: GestureConfig, viewport_width_px: f64) -> Self {
        Self {
            config,
            viewport_width_px,
            session: None,
        }
    }

    pub fn config(&self) -> GestureConfig {
        self.config
    }

    pub fn viewport_width_px(&self) -> f64 {
        self.viewport_width_px
    }

    pub fn set_viewport_width(&mut self, viewport_width_px: f64) {
        self.viewport_width_px = viewport_width_px;
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    /// Viewport-width units per pixel at the current viewport width.
    pub fn scale(&self) -> f64 {
        100.0 / self.viewport_width_px.max(1.0)
    }

    /// Opens a gesture and pauses autoplay until it ends.
    pub fn begin(
        &mut self,
        x: f64,
        y: f64,
        deck: &mut Deck,
    ) -> Result<GestureSession, GestureError> {
        if self.session.is_some() {
            return Err(GestureError::AlreadyActive);
        }
        if deck.is_empty() {
            return Err(GestureError::EmptyDeck);
        }
        deck.suspend_autoplay();
        let baseline = deck.state().translate_offset_vw;
        let session = GestureSession {
            start_x: x,
            start_y: y,
            scale: self.scale(),
            baseline_offset_vw: baseline,
            current_offset_vw: baseline,
        };
        self.session = Some(session);
        Ok(session)
    }

    /// Live offset for the strip while dragging, applied without animation.
    pub fn drag_to(&mut self, x: f64) -> Option<f64> {
        let session = self.session.as_mut()?;
        session.current_offset_vw =
            session.baseline_offset_vw + (x - session.start_x) * session.scale;
        Some(session.current_offset_vw)
    }

    pub fn release(
        &mut self,
        x: f64,
        y: f64,
        deck: &mut Deck,
        now: Instant,
    ) -> Option<GestureOutcome> {
        let session = self.session.take()?;
        let final_delta_vw = (x - session.start_x) * session.scale;
        let tap_threshold_vw = self.config.tap_threshold_px * session.scale;
        let slide_threshold_vw = self.config.slide_threshold_px * session.scale;

        let (effect, target) = if final_delta_vw.abs() < tap_threshold_vw {
            (GestureEffect::Tap { x, y }, deck.current_index())
        } else if final_delta_vw <= -slide_threshold_vw
            && deck.current_index() + 1 < deck.slide_count()
        {
            (GestureEffect::Advanced, deck.step_clamped(1))
        } else if final_delta_vw >= slide_threshold_vw && deck.current_index() > 0 {
            (GestureEffect::Retreated, deck.step_clamped(-1))
        } else {
            (GestureEffect::SnappedBack, deck.current_index())
        };

        debug!(?effect, final_delta_vw, target, "gesture released");
        Some(GestureOutcome {
            effect,
            final_delta_vw,
            settle: deck.show(target, now),
        })
    }

    /// Platform cancellation: settle back on the current slide, no tap.
    pub fn cancel(&mut self, deck: &mut Deck, now: Instant) -> Option<GestureOutcome> {
        self.session.take()?;
        debug!("gesture cancelled");
        Some(GestureOutcome {
            effect: GestureEffect::SnappedBack,
            final_delta_vw: 0.0,
            settle: deck.show(deck.current_index(), now),
        })
    }
}

#[cfg(test)]
#[path = "tests/gesture_tests.rs"]
mod tests;
