//! Slide deck state and the autoplay timer that drives it.
//!
//! The deck is the only owner of the current index. Button and timer
//! navigation wrap around the ends; gesture navigation goes through
//! [`Deck::step_clamped`] and stops at the first and last slide.

use std::time::Duration;

use serde::Serialize;
use shared::domain::DeckSettings;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Every settle animates the strip with this transition.
pub const SETTLE_TRANSITION: Transition = Transition {
    duration: Duration::from_millis(500),
    easing: Easing::Ease,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Ease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub duration: Duration,
    pub easing: Easing,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeckError {
    #[error("slide index {index} out of range for {slide_count} slides")]
    IndexOutOfRange { index: usize, slide_count: usize },
    #[error("deck has no slides")]
    EmptyDeck,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeckState {
    pub current_index: usize,
    pub slide_count: usize,
    pub slide_width_vw: f64,
    pub translate_offset_vw: f64,
}

/// Transform the renderer should apply after a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeckUpdate {
    pub index: usize,
    pub offset_vw: f64,
    pub animate: bool,
}

/// A single repeating timer. Arming replaces any previous deadline, so there
/// is never more than one pending tick.
#[derive(Debug, Clone)]
pub struct AutoplayTimer {
    period: Duration,
    deadline: Option<Instant>,
}

impl AutoplayTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A zero period disables autoplay.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = (!self.period.is_zero()).then(|| now + self.period);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

#[derive(Debug, Clone)]
pub struct Deck {
    state: DeckState,
    autoplay: AutoplayTimer,
}

impl Deck {
    pub fn new(slide_count: usize, settings: DeckSettings) -> Self {
        Self {
            state: DeckState {
                current_index: 0,
                slide_count,
                slide_width_vw: settings.slide_width_vw,
                translate_offset_vw: 0.0,
            },
            autoplay: AutoplayTimer::new(Duration::from_millis(settings.autoplay_interval_ms)),
        }
    }

    pub fn state(&self) -> DeckState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    pub fn slide_count(&self) -> usize {
        self.state.slide_count
    }

    pub fn is_empty(&self) -> bool {
        self.state.slide_count == 0
    }

    pub fn autoplay(&self) -> &AutoplayTimer {
        &self.autoplay
    }

    pub fn autoplay_deadline(&self) -> Option<Instant> {
        self.autoplay.deadline()
    }

    pub fn offset_for(&self, index: usize) -> f64 {
        -self.state.slide_width_vw * index as f64
    }

    /// Shows the first slide and starts autoplay.
    pub fn start(&mut self, now: Instant) -> Option<DeckUpdate> {
        if self.is_empty() {
            return None;
        }
        Some(self.show(0, now))
    }

    pub fn goto(&mut self, index: usize, now: Instant) -> Result<DeckUpdate, DeckError> {
        if self.is_empty() {
            return Err(DeckError::EmptyDeck);
        }
        if index >= self.state.slide_count {
            return Err(DeckError::IndexOutOfRange {
                index,
                slide_count: self.state.slide_count,
            });
        }
        Ok(self.show(index, now))
    }

    pub fn next(&mut self, now: Instant) -> Option<DeckUpdate> {
        if self.is_empty() {
            return None;
        }
        let next = (self.state.current_index + 1) % self.state.slide_count;
        Some(self.show(next, now))
    }

    pub fn previous(&mut self, now: Instant) -> Option<DeckUpdate> {
        if self.is_empty() {
            return None;
        }
        let previous = match self.state.current_index {
            0 => self.state.slide_count - 1,
            index => index - 1,
        };
        Some(self.show(previous, now))
    }

    /// Index reached by moving `step` slides without wrapping.
    pub fn step_clamped(&self, step: isize) -> usize {
        if self.is_empty() {
            return 0;
        }
        let last = self.state.slide_count - 1;
        self.state
            .current_index
            .saturating_add_signed(step)
            .min(last)
    }

    /// Advances if the autoplay deadline has passed.
    pub fn tick(&mut self, now: Instant) -> Option<DeckUpdate> {
        if !self.autoplay.is_due(now) {
            return None;
        }
        debug!(from = self.state.current_index, "autoplay tick");
        self.next(now)
    }

    pub fn suspend_autoplay(&mut self) {
        self.autoplay.cancel();
    }

    /// Applies backend-provided width. The offset is recomputed so the deck
    /// stays at rest on the current slide.
    pub fn set_slide_width(&mut self, slide_width_vw: f64) {
        self.state.slide_width_vw = slide_width_vw;
        self.state.translate_offset_vw = self.offset_for(self.state.current_index);
    }

    pub(crate) fn show(&mut self, index: usize, now: Instant) -> DeckUpdate {
        debug_assert!(index < self.state.slide_count);
        self.state.current_index = index;
        self.state.translate_offset_vw = self.offset_for(index);
        self.autoplay.arm(now);
        DeckUpdate {
            index,
            offset_vw: self.state.translate_offset_vw,
            animate: true,
        }
    }
}

#[cfg(test)]
#[path = "tests/deck_tests.rs"]
mod tests;
