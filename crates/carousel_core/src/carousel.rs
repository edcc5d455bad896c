use std::future;

use shared::domain::DeckSettings;
use slide_source::DeckContent;
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    deck::{Deck, DeckUpdate},
    gesture::{GestureConfig, GestureEffect, GestureInterpreter, GestureOutcome},
    renderer::{ElementHit, NavigateSink, Renderer, SlideView},
};

/// Input events the widget reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CarouselInput {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64 },
    PointerUp { x: f64, y: f64 },
    PointerCancel,
    PreviousButton,
    NextButton,
    IndicatorClicked(usize),
    SlideClicked(usize),
    Resize { viewport_width_px: f64 },
}

/// A click to re-dispatch once the current event has been fully handled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingTap {
    pub x: f64,
    pub y: f64,
}

/// One mounted carousel: the deck, its gesture interpreter and the renderer
/// they drive. All state is owned here; nothing is shared.
pub struct Carousel<R, N> {
    deck: Deck,
    gestures: GestureInterpreter,
    view: SlideView,
    renderer: R,
    sink: N,
}

impl<R: Renderer, N: NavigateSink> Carousel<R, N> {
    pub fn mount(
        content: &DeckContent,
        settings: DeckSettings,
        gesture_config: GestureConfig,
        viewport_width_px: f64,
        mut renderer: R,
        sink: N,
        now: Instant,
    ) -> Self {
        let settings = settings.merged_with(content.settings());
        let view = SlideView::build(content.slides(), settings.slide_width_vw);
        renderer.resize(viewport_width_px);
        renderer.mount(&view);

        let mut carousel = Self {
            deck: Deck::new(view.slides.len(), settings),
            gestures: GestureInterpreter::new(gesture_config, viewport_width_px),
            view,
            renderer,
            sink,
        };

        match content {
            DeckContent::Ready { from_cache, .. } => {
                info!(
                    slides = carousel.deck.slide_count(),
                    from_cache,
                    autoplay_ms = settings.autoplay_interval_ms,
                    "carousel mounted"
                );
                if let Some(update) = carousel.deck.start(now) {
                    carousel.apply(update);
                }
            }
            DeckContent::Unavailable { reason } => {
                warn!(%reason, "carousel mounted without slides");
                carousel.renderer.show_unavailable(reason);
            }
        }
        carousel
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn view(&self) -> &SlideView {
        &self.view
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn gestures(&self) -> &GestureInterpreter {
        &self.gestures
    }

    /// Handles one input. A returned tap must be passed to
    /// [`Self::dispatch_tap`] after yielding, never from inside this call.
    pub fn handle(&mut self, input: CarouselInput, now: Instant) -> Option<PendingTap> {
        match input {
            CarouselInput::PointerDown { x, y } => {
                if let Err(err) = self.gestures.begin(x, y, &mut self.deck) {
                    debug!(error = %err, "ignoring pointer down");
                }
                None
            }
            CarouselInput::PointerMove { x } => {
                if let Some(offset_vw) = self.gestures.drag_to(x) {
                    self.renderer.apply_transform(offset_vw, false);
                }
                None
            }
            CarouselInput::PointerUp { x, y } => {
                let outcome = self.gestures.release(x, y, &mut self.deck, now)?;
                self.settle(outcome)
            }
            CarouselInput::PointerCancel => {
                let outcome = self.gestures.cancel(&mut self.deck, now)?;
                self.settle(outcome)
            }
            CarouselInput::PreviousButton => {
                if let Some(update) = self.deck.previous(now) {
                    self.apply(update);
                }
                None
            }
            CarouselInput::NextButton => {
                if let Some(update) = self.deck.next(now) {
                    self.apply(update);
                }
                None
            }
            CarouselInput::IndicatorClicked(index) => {
                self.click(ElementHit::Indicator(index), now);
                None
            }
            CarouselInput::SlideClicked(index) => {
                self.click(ElementHit::Slide(index), now);
                None
            }
            CarouselInput::Resize { viewport_width_px } => {
                self.gestures.set_viewport_width(viewport_width_px);
                self.renderer.resize(viewport_width_px);
                None
            }
        }
    }

    /// Clicks whatever element sits under a tap.
    pub fn dispatch_tap(&mut self, tap: PendingTap, now: Instant) {
        match self.renderer.element_at(tap.x, tap.y) {
            Some(hit) => self.click(hit, now),
            None => debug!(x = tap.x, y = tap.y, "tap landed on no element"),
        }
    }

    pub fn on_autoplay(&mut self, now: Instant) {
        if let Some(update) = self.deck.tick(now) {
            self.apply(update);
        }
    }

    /// Drives the carousel until the input channel closes.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<CarouselInput>) -> Self {
        loop {
            let deadline = self.deck.autoplay_deadline();
            let autoplay = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => future::pending::<()>().await,
                }
            };

            tokio::select! {
                input = inputs.recv() => {
                    let Some(input) = input else {
                        break;
                    };
                    if let Some(tap) = self.handle(input, Instant::now()) {
                        tokio::task::yield_now().await;
                        self.dispatch_tap(tap, Instant::now());
                    }
                }
                _ = autoplay => self.on_autoplay(Instant::now()),
            }
        }
        debug!("carousel input closed");
        self
    }

    fn click(&mut self, hit: ElementHit, now: Instant) {
        match hit {
            ElementHit::Slide(index) => {
                let Some(slide) = self.view.slides.get(index) else {
                    warn!(index, "click on unknown slide");
                    return;
                };
                for message in slide.click() {
                    debug!(
                        kind = message.kind(),
                        payload = message.payload(),
                        "posting frame message"
                    );
                    self.sink.post(message);
                }
            }
            ElementHit::Indicator(index) => match self.deck.goto(index, now) {
                Ok(update) => self.apply(update),
                Err(err) => warn!(error = %err, "ignoring indicator click"),
            },
        }
    }

    fn settle(&mut self, outcome: GestureOutcome) -> Option<PendingTap> {
        self.apply(outcome.settle);
        match outcome.effect {
            GestureEffect::Tap { x, y } => Some(PendingTap { x, y }),
            _ => None,
        }
    }

    fn apply(&mut self, update: DeckUpdate) {
        self.renderer.apply_transform(update.offset_vw, update.animate);
        self.renderer.set_active_indicator(update.index);
        self.view.set_active(update.index);
    }
}

#[cfg(test)]
#[path = "tests/carousel_tests.rs"]
mod tests;
