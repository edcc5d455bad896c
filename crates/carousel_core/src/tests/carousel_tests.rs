use super::*;
use std::{collections::BTreeSet, time::Duration};

use shared::{
    domain::{RemoteSettings, SlideRecord},
    protocol::FrameMessage,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::renderer::HeadlessRenderer;

type TestCarousel = Carousel<HeadlessRenderer, UnboundedSender<FrameMessage>>;

fn slides(count: usize) -> Vec<SlideRecord> {
    (0..count)
        .map(|i| SlideRecord {
            image_url: format!("https://cdn.test/{i}.png"),
            mobile_image_url: None,
            caption: None,
            navigate_target: format!("target-{i}"),
            optional_link: (i == 1).then(|| "https://www.ambassadoribet.com/promo".to_string()),
            pages: BTreeSet::new(),
            sort_order: i as i64,
        })
        .collect()
}

fn ready(count: usize) -> DeckContent {
    DeckContent::Ready {
        slides: slides(count),
        settings: None,
        from_cache: false,
    }
}

fn mount(content: &DeckContent) -> (TestCarousel, UnboundedReceiver<FrameMessage>) {
    let (tx, rx) = unbounded_channel();
    let carousel = Carousel::mount(
        content,
        DeckSettings::default(),
        GestureConfig::default(),
        1000.0,
        HeadlessRenderer::new(1000.0),
        tx,
        Instant::now(),
    );
    (carousel, rx)
}

#[tokio::test(start_paused = true)]
async fn mount_shows_first_slide_and_arms_autoplay() {
    let (carousel, _rx) = mount(&ready(3));
    let transform = carousel.renderer().last_transform().expect("transform");
    assert_eq!(transform.offset_vw, 0.0);
    assert!(transform.transition.is_some());
    assert_eq!(carousel.renderer().active_indicator(), Some(0));
    assert_eq!(
        carousel.deck().autoplay_deadline(),
        Some(Instant::now() + Duration::from_millis(5_000))
    );
}

#[tokio::test(start_paused = true)]
async fn unavailable_content_mounts_empty_state() {
    let (carousel, _rx) = mount(&DeckContent::Unavailable {
        reason: "slide fetch timed out".into(),
    });
    assert!(carousel.deck().is_empty());
    assert_eq!(
        carousel.renderer().unavailable_reason(),
        Some("slide fetch timed out")
    );
    assert!(carousel.deck().autoplay_deadline().is_none());
}

#[tokio::test(start_paused = true)]
async fn remote_settings_override_local_ones() {
    let content = DeckContent::Ready {
        slides: slides(2),
        settings: Some(RemoteSettings {
            auto_slide_interval_ms: Some(9_000),
            slide_width_vw: Some(80.0),
        }),
        from_cache: false,
    };
    let (mut carousel, _rx) = mount(&content);
    assert_eq!(
        carousel.deck().autoplay().period(),
        Duration::from_millis(9_000)
    );
    carousel.handle(CarouselInput::NextButton, Instant::now());
    assert_eq!(carousel.renderer().offset_vw(), -80.0);
}

#[tokio::test(start_paused = true)]
async fn buttons_wrap_in_both_directions() {
    let (mut carousel, _rx) = mount(&ready(3));
    let now = Instant::now();
    carousel.handle(CarouselInput::PreviousButton, now);
    assert_eq!(carousel.deck().current_index(), 2);
    carousel.handle(CarouselInput::NextButton, now);
    assert_eq!(carousel.deck().current_index(), 0);
    assert_eq!(carousel.view().active_index(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn drag_past_threshold_advances_with_live_feedback() {
    let (mut carousel, _rx) = mount(&ready(5));
    let now = Instant::now();
    carousel.handle(CarouselInput::IndicatorClicked(2), now);

    carousel.handle(CarouselInput::PointerDown { x: 500.0, y: 100.0 }, now);
    assert!(carousel.deck().autoplay_deadline().is_none());
    carousel.handle(CarouselInput::PointerMove { x: 400.0 }, now);
    let live = carousel.renderer().last_transform().expect("live");
    assert_eq!(live.offset_vw, -210.0);
    assert!(live.transition.is_none());

    let tap = carousel.handle(CarouselInput::PointerUp { x: 350.0, y: 100.0 }, now);
    assert!(tap.is_none());
    assert_eq!(carousel.deck().current_index(), 3);
    assert_eq!(carousel.renderer().offset_vw(), -300.0);
    assert_eq!(carousel.renderer().active_indicator(), Some(3));
    assert!(carousel.deck().autoplay_deadline().is_some());
}

#[tokio::test(start_paused = true)]
async fn short_drag_taps_the_slide_under_the_pointer() {
    let (mut carousel, mut rx) = mount(&ready(3));
    let now = Instant::now();
    carousel.handle(CarouselInput::NextButton, now);

    carousel.handle(CarouselInput::PointerDown { x: 300.0, y: 50.0 }, now);
    let tap = carousel
        .handle(CarouselInput::PointerUp { x: 295.0, y: 50.0 }, now)
        .expect("tap");
    assert_eq!(carousel.deck().current_index(), 1);
    assert!(rx.try_recv().is_err(), "click is deferred");

    carousel.dispatch_tap(tap, now);
    assert_eq!(
        rx.try_recv().expect("href"),
        FrameMessage::Href("https://www.ambassadoribet.com/promo".into())
    );
    assert_eq!(
        rx.try_recv().expect("navigate"),
        FrameMessage::Navigate("target-1".into())
    );
}

#[tokio::test(start_paused = true)]
async fn tap_on_indicator_jumps_to_slide() {
    let (mut carousel, _rx) = mount(&ready(4));
    // Four 20px dots centred in 1000px start at x = 460.
    carousel.dispatch_tap(PendingTap { x: 525.0, y: 370.0 }, Instant::now());
    assert_eq!(carousel.deck().current_index(), 3);
}

#[tokio::test(start_paused = true)]
async fn cancel_settles_without_clicking() {
    let (mut carousel, mut rx) = mount(&ready(3));
    let now = Instant::now();
    carousel.handle(CarouselInput::PointerDown { x: 500.0, y: 50.0 }, now);
    carousel.handle(CarouselInput::PointerMove { x: 200.0 }, now);
    assert!(carousel.handle(CarouselInput::PointerCancel, now).is_none());
    assert_eq!(carousel.deck().current_index(), 0);
    assert_eq!(carousel.renderer().offset_vw(), 0.0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn resize_changes_scale_for_next_gesture() {
    let (mut carousel, _rx) = mount(&ready(3));
    let now = Instant::now();
    carousel.handle(
        CarouselInput::Resize {
            viewport_width_px: 400.0,
        },
        now,
    );
    carousel.handle(CarouselInput::PointerDown { x: 300.0, y: 50.0 }, now);
    assert_eq!(carousel.gestures().session().expect("session").scale, 0.25);
}

#[tokio::test(start_paused = true)]
async fn slide_click_posts_navigate() {
    let (mut carousel, mut rx) = mount(&ready(3));
    carousel.handle(CarouselInput::SlideClicked(2), Instant::now());
    assert_eq!(
        rx.try_recv().expect("navigate"),
        FrameMessage::Navigate("target-2".into())
    );
}

#[tokio::test(start_paused = true)]
async fn run_loop_autoplays_and_wraps() {
    let (carousel, _rx) = mount(&ready(3));
    let (tx, inputs) = mpsc::channel(8);
    let handle = tokio::spawn(carousel.run(inputs));

    tokio::time::sleep(Duration::from_millis(15_001)).await;
    drop(tx);
    let carousel = handle.await.expect("join");
    assert_eq!(carousel.deck().current_index(), 0);
    assert_eq!(carousel.renderer().transforms().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn run_loop_manual_navigation_restarts_timer() {
    let (carousel, _rx) = mount(&ready(4));
    let (tx, inputs) = mpsc::channel(8);
    let handle = tokio::spawn(carousel.run(inputs));

    tokio::time::sleep(Duration::from_millis(3_000)).await;
    tx.send(CarouselInput::NextButton).await.expect("send");
    tokio::time::sleep(Duration::from_millis(4_000)).await;
    drop(tx);
    let carousel = handle.await.expect("join");
    // Without the restart the timer would have fired at 5s.
    assert_eq!(carousel.deck().current_index(), 1);
}

#[tokio::test(start_paused = true)]
async fn run_loop_defers_tap_click() {
    let (carousel, mut rx) = mount(&ready(3));
    let (tx, inputs) = mpsc::channel(8);
    let handle = tokio::spawn(carousel.run(inputs));

    tx.send(CarouselInput::PointerDown { x: 100.0, y: 20.0 })
        .await
        .expect("send");
    tx.send(CarouselInput::PointerUp { x: 102.0, y: 20.0 })
        .await
        .expect("send");
    assert_eq!(
        rx.recv().await,
        Some(FrameMessage::Navigate("target-0".into()))
    );
    drop(tx);
    handle.await.expect("join");
}
