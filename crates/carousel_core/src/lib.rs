//! Slide carousel core: deck state, autoplay, drag gestures and the
//! renderer contract they drive.

pub mod carousel;
pub mod deck;
pub mod gesture;
pub mod renderer;

pub use carousel::{Carousel, CarouselInput, PendingTap};
pub use deck::{AutoplayTimer, Deck, DeckError, DeckState, DeckUpdate, SETTLE_TRANSITION};
pub use gesture::{
    GestureConfig, GestureEffect, GestureError, GestureInterpreter, GestureOutcome,
    GestureSession,
};
pub use renderer::{
    ElementHit, HeadlessRenderer, ImageSource, IndicatorDot, NavigateSink, Renderer,
    SlideElement, SlideView,
};
