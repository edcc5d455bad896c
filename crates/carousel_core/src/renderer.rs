use shared::{domain::SlideRecord, protocol::FrameMessage};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::deck::{Transition, SETTLE_TRANSITION};

/// Viewports at or below this width get the mobile image when one exists.
pub const MOBILE_MAX_WIDTH_PX: f64 = 768.0;
pub const SLIDE_IMAGE_ALT: &str = "Slide Image";

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSource {
    pub src: String,
    pub mobile_src: Option<String>,
    pub alt: &'static str,
    pub lazy: bool,
}

impl ImageSource {
    pub fn resolve(&self, viewport_width_px: f64) -> &str {
        match &self.mobile_src {
            Some(mobile) if viewport_width_px <= MOBILE_MAX_WIDTH_PX => mobile,
            _ => &self.src,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlideElement {
    pub index: usize,
    pub image: ImageSource,
    pub caption: Option<String>,
    /// Absolute URL of the wrapping link, if the slide has one.
    pub link: Option<String>,
    pub navigate_target: String,
}

impl SlideElement {
    /// Messages posted to the parent window when the slide is clicked. A
    /// wrapping link's own navigation is suppressed and reported as
    /// `TMA_HREF` before the slide's `TMA_NAVIGATE`.
    pub fn click(&self) -> Vec<FrameMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(link) = &self.link {
            messages.push(FrameMessage::Href(link.clone()));
        }
        messages.push(FrameMessage::Navigate(self.navigate_target.clone()));
        messages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorDot {
    pub index: usize,
    pub active: bool,
}

/// Everything the renderer needs to build the strip once.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideView {
    pub slides: Vec<SlideElement>,
    pub indicators: Vec<IndicatorDot>,
    pub slide_width_vw: f64,
}

impl SlideView {
    pub fn build(records: &[SlideRecord], slide_width_vw: f64) -> Self {
        let slides = records
            .iter()
            .enumerate()
            .map(|(index, record)| SlideElement {
                index,
                image: ImageSource {
                    src: record.image_url.clone(),
                    mobile_src: record.mobile_image_url.clone(),
                    alt: SLIDE_IMAGE_ALT,
                    lazy: true,
                },
                caption: record.caption.clone(),
                link: record.optional_link.clone(),
                navigate_target: record.navigate_target.clone(),
            })
            .collect::<Vec<_>>();
        let indicators = (0..slides.len())
            .map(|index| IndicatorDot {
                index,
                active: index == 0,
            })
            .collect();
        Self {
            slides,
            indicators,
            slide_width_vw,
        }
    }

    pub fn strip_width_vw(&self) -> f64 {
        self.slide_width_vw * self.slides.len() as f64
    }

    pub fn set_active(&mut self, index: usize) {
        for dot in &mut self.indicators {
            dot.active = dot.index == index;
        }
    }

    pub fn active_index(&self) -> Option<usize> {
        self.indicators.iter().find(|dot| dot.active).map(|dot| dot.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementHit {
    Slide(usize),
    Indicator(usize),
}

/// Presentation side of the carousel. Implementations own the actual
/// elements; the carousel only pushes transforms and asks for hit tests.
pub trait Renderer {
    fn mount(&mut self, view: &SlideView);
    fn apply_transform(&mut self, offset_vw: f64, animate: bool);
    fn set_active_indicator(&mut self, index: usize);
    fn element_at(&self, x: f64, y: f64) -> Option<ElementHit>;
    fn show_unavailable(&mut self, reason: &str);
    fn resize(&mut self, _viewport_width_px: f64) {}
}

/// Receives messages meant for the parent window.
pub trait NavigateSink {
    fn post(&self, message: FrameMessage);
}

impl NavigateSink for mpsc::UnboundedSender<FrameMessage> {
    fn post(&self, message: FrameMessage) {
        if let Err(err) = self.send(message) {
            warn!(message = ?err.0, "parent window channel closed; dropping frame message");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedTransform {
    pub offset_vw: f64,
    pub transition: Option<Transition>,
}

const STRIP_HEIGHT_PX: f64 = 360.0;
const INDICATOR_ROW_HEIGHT_PX: f64 = 24.0;
const INDICATOR_PITCH_PX: f64 = 20.0;
/// Applied transforms kept for inspection; older ones are dropped.
pub const TRANSFORM_HISTORY: usize = 64;

/// In-memory layout of the strip: slides side by side, a row of indicator
/// dots centred under them.
#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    viewport_width_px: f64,
    strip_height_px: f64,
    slide_width_vw: f64,
    slide_count: usize,
    offset_vw: f64,
    active_indicator: Option<usize>,
    transforms: Vec<AppliedTransform>,
    unavailable: Option<String>,
}

impl HeadlessRenderer {
    pub fn new(viewport_width_px: f64) -> Self {
        Self {
            viewport_width_px,
            strip_height_px: STRIP_HEIGHT_PX,
            slide_width_vw: 100.0,
            slide_count: 0,
            offset_vw: 0.0,
            active_indicator: None,
            transforms: Vec::new(),
            unavailable: None,
        }
    }

    pub fn offset_vw(&self) -> f64 {
        self.offset_vw
    }

    /// The most recent transforms, oldest first, at most [`TRANSFORM_HISTORY`].
    pub fn transforms(&self) -> &[AppliedTransform] {
        &self.transforms
    }

    pub fn last_transform(&self) -> Option<AppliedTransform> {
        self.transforms.last().copied()
    }

    pub fn active_indicator(&self) -> Option<usize> {
        self.active_indicator
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        self.unavailable.as_deref()
    }

    fn indicator_row_start_px(&self) -> f64 {
        (self.viewport_width_px - INDICATOR_PITCH_PX * self.slide_count as f64) / 2.0
    }
}

impl Renderer for HeadlessRenderer {
    fn mount(&mut self, view: &SlideView) {
        self.slide_width_vw = view.slide_width_vw;
        self.slide_count = view.slides.len();
        self.active_indicator = view.active_index();
        self.unavailable = None;
        debug!(
            slides = self.slide_count,
            strip_width_vw = view.strip_width_vw(),
            "mounted headless strip"
        );
    }

    fn apply_transform(&mut self, offset_vw: f64, animate: bool) {
        self.offset_vw = offset_vw;
        if self.transforms.len() == TRANSFORM_HISTORY {
            self.transforms.remove(0);
        }
        self.transforms.push(AppliedTransform {
            offset_vw,
            transition: animate.then_some(SETTLE_TRANSITION),
        });
    }

    fn set_active_indicator(&mut self, index: usize) {
        self.active_indicator = Some(index);
    }

    fn element_at(&self, x: f64, y: f64) -> Option<ElementHit> {
        if self.slide_count == 0 || x < 0.0 || x >= self.viewport_width_px || y < 0.0 {
            return None;
        }

        if y < self.strip_height_px {
            let x_vw = x * 100.0 / self.viewport_width_px.max(1.0);
            let position = (x_vw - self.offset_vw) / self.slide_width_vw;
            if position < 0.0 {
                return None;
            }
            let index = position.floor() as usize;
            return (index < self.slide_count).then_some(ElementHit::Slide(index));
        }

        if y < self.strip_height_px + INDICATOR_ROW_HEIGHT_PX {
            let relative = x - self.indicator_row_start_px();
            if relative < 0.0 {
                return None;
            }
            let index = (relative / INDICATOR_PITCH_PX).floor() as usize;
            return (index < self.slide_count).then_some(ElementHit::Indicator(index));
        }

        None
    }

    fn show_unavailable(&mut self, reason: &str) {
        self.slide_count = 0;
        self.unavailable = Some(reason.to_string());
    }

    fn resize(&mut self, viewport_width_px: f64) {
        self.viewport_width_px = viewport_width_px;
    }
}

#[cfg(test)]
#[path = "tests/renderer_tests.rs"]
mod tests;
