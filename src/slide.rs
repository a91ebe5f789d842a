//! One slide (product panel) and its group of detail boxes.

use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{Configuration, DetailsAnimation, SlideAnimation};
use crate::dom::{Document, ElementId, Origin};
use crate::error::{Error, Result};
use crate::tween::{Animator, Completion, Easing, Props, TweenVars};

pub const CURRENT_CLASS: &str = "slide--current";

/// z-index of a slide while it enters.
pub const FRONT_LAYER: i32 = 1000;
/// z-index of a slide once its transition is over.
pub const REST_LAYER: i32 = 999;

/// Which way the slideshow moves. `Right` is "next".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    fn sign(self) -> f32 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
        }
    }
}

/// Edge a detail box slides in from, named by the direction it travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevealDirection {
    #[default]
    RightToLeft,
    LeftToRight,
    BottomToTop,
    TopToBottom,
}

impl RevealDirection {
    /// Offset (x %, y %) of the box while hidden. Its inner content sits at
    /// the opposite offset.
    pub fn hidden_offset(self) -> (f32, f32) {
        match self {
            RevealDirection::RightToLeft => (100.0, 0.0),
            RevealDirection::LeftToRight => (-100.0, 0.0),
            RevealDirection::BottomToTop => (0.0, 100.0),
            RevealDirection::TopToBottom => (0.0, -100.0),
        }
    }
}

impl FromStr for RevealDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rtl" | "right-to-left" => Ok(RevealDirection::RightToLeft),
            "ltr" | "left-to-right" => Ok(RevealDirection::LeftToRight),
            "btt" | "bottom-to-top" => Ok(RevealDirection::BottomToTop),
            "ttb" | "top-to-bottom" => Ok(RevealDirection::TopToBottom),
            other => Err(format!("unknown reveal direction `{other}`")),
        }
    }
}

/// A detail box resolved at mount time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailItem {
    pub element: ElementId,
    pub inner: ElementId,
    pub reveal: RevealDirection,
}

impl DetailItem {
    fn resolve(doc: &Document, element: ElementId) -> Result<Self> {
        let inner = doc.require(element, "details__inner")?;
        let reveal = match doc.element(element).data("direction") {
            None => RevealDirection::default(),
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                warn!(element = %doc.describe(element), "{err}; using right-to-left");
                RevealDirection::default()
            }),
        };
        Ok(Self {
            element,
            inner,
            reveal,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemTiming {
    pub duration: Duration,
    pub ease: Easing,
    pub delay: Duration,
}

/// Timing for box `pos` of `total` while opening: boxes stagger in order and
/// the last few get the accent timing.
pub fn opening_timing(cfg: &DetailsAnimation, pos: usize, total: usize) -> ItemTiming {
    let accent = pos >= total.saturating_sub(cfg.accent_count);
    item_timing(cfg, accent, pos)
}

/// Timing for box `pos` of `total` while closing: boxes stagger in reverse
/// and only the first one gets the accent timing.
pub fn closing_timing(cfg: &DetailsAnimation, pos: usize, total: usize) -> ItemTiming {
    let rank = total.saturating_sub(pos + 1);
    item_timing(cfg, pos == 0, rank)
}

fn item_timing(cfg: &DetailsAnimation, accent: bool, rank: usize) -> ItemTiming {
    let (duration, ease) = if accent {
        (cfg.accent_duration, cfg.accent_ease)
    } else {
        (cfg.base_duration, cfg.base_ease)
    };
    ItemTiming {
        duration,
        ease,
        delay: cfg.stagger * u32::try_from(rank).unwrap_or(u32::MAX),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailsState {
    Closed,
    Opening,
    Open,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Show,
    Hide,
}

#[derive(Debug)]
pub struct Slide {
    animator: Animator,
    el: ElementId,
    wrap: ElementId,
    img: ElementId,
    title_wrap: ElementId,
    details: ElementId,
    close_ctrl: ElementId,
    items: Vec<DetailItem>,
    details_state: Arc<Mutex<DetailsState>>,
    animation: SlideAnimation,
    details_animation: DetailsAnimation,
}

impl Slide {
    /// Resolves the slide's subtree and the details group that belongs to it.
    pub fn new(
        animator: Animator,
        el: ElementId,
        details: ElementId,
        cfg: &Configuration,
    ) -> Result<Self> {
        let dom = animator.dom().clone();
        let (wrap, img, title_wrap, close_ctrl, items) = dom.read(|doc| {
            let wrap = doc.require(el, "slide__wrap")?;
            let img = doc.require(wrap, "slide__img")?;
            let title_wrap = doc.require(wrap, "slide__title-wrap")?;
            let items = doc
                .query_all(details, "details__item")
                .into_iter()
                .map(|item| DetailItem::resolve(doc, item))
                .collect::<Result<Vec<_>>>()?;
            let close_ctrl = items
                .iter()
                .map(|item| item.element)
                .find(|id| doc.has_class(*id, "details__item--close"))
                .ok_or_else(|| Error::MissingElement {
                    class: "details__item--close".to_string(),
                    scope: doc.describe(details),
                })?;
            Ok::<_, Error>((wrap, img, title_wrap, close_ctrl, items))
        })?;

        Ok(Self {
            animator,
            el,
            wrap,
            img,
            title_wrap,
            details,
            close_ctrl,
            items,
            details_state: Arc::new(Mutex::new(DetailsState::Closed)),
            animation: cfg.slide.clone(),
            details_animation: cfg.details.clone(),
        })
    }

    pub fn element(&self) -> ElementId {
        self.el
    }

    pub fn image(&self) -> ElementId {
        self.img
    }

    pub fn details_group(&self) -> ElementId {
        self.details
    }

    /// The detail box that closes the panel when clicked.
    pub fn close_control(&self) -> ElementId {
        self.close_ctrl
    }

    pub fn detail_items(&self) -> &[DetailItem] {
        &self.items
    }

    /// Writes the resting style: visible only when current, detail boxes
    /// parked at their hidden offsets.
    pub fn prepare(&self, current: bool) {
        self.animator.dom().write(|doc| {
            let style = doc.style_mut(self.el);
            style.opacity = if current { 1.0 } else { 0.0 };
            style.z_index = Some(REST_LAYER);
            for item in &self.items {
                let (x, y) = item.reveal.hidden_offset();
                Props::translate(x, y).apply(doc.style_mut(item.element));
                Props::translate(-x, -y).apply(doc.style_mut(item.inner));
            }
        });
    }

    pub fn set_current(&self, is_current: bool) {
        self.animator
            .dom()
            .write(|doc| doc.toggle_class(self.el, CURRENT_CLASS, is_current));
    }

    pub fn is_current(&self) -> bool {
        self.animator
            .dom()
            .read(|doc| doc.has_class(self.el, CURRENT_CLASS))
    }

    pub fn show(&self, direction: Direction) -> Completion {
        self.animator
            .dom()
            .write(|doc| doc.style_mut(self.el).z_index = Some(FRONT_LAYER));
        self.toggle(Action::Show, direction)
    }

    pub fn hide(&self, direction: Direction) -> Completion {
        self.toggle(Action::Hide, direction)
    }

    // The wrap slides in from one side while the title wrap and the image move
    // the other way, which reads as an unreveal. The image also scales between
    // 1 and the configured zoom.
    fn toggle(&self, action: Action, direction: Direction) -> Completion {
        let cfg = &self.animation;
        let sign = direction.sign();
        let mut parts = Vec::with_capacity(3);

        if action == Action::Show {
            parts.push(self.animator.to(
                self.wrap,
                cfg.duration,
                TweenVars::new(Props::new().x(0.0))
                    .ease(cfg.ease)
                    .start_at(Props::new().x(100.0 * sign)),
            ));
            parts.push(self.animator.to(
                self.title_wrap,
                cfg.duration,
                TweenVars::new(Props::new().x(0.0))
                    .ease(cfg.ease)
                    .start_at(Props::new().x(-100.0 * sign)),
            ));
        }

        let origin = match (action, direction) {
            (Action::Hide, Direction::Right) | (Action::Show, Direction::Left) => {
                Origin::new(100.0, 50.0)
            }
            (Action::Hide, Direction::Left) | (Action::Show, Direction::Right) => {
                Origin::new(0.0, 50.0)
            }
        };
        let target_scale = match action {
            Action::Show => 1.0,
            Action::Hide => cfg.scale,
        };
        let resting_opacity = match action {
            Action::Show => 1.0,
            Action::Hide => 0.0,
        };
        let (slide, img) = (self.el, self.img);
        let mut vars = TweenVars::new(Props::new().x(0.0).scale(target_scale))
            .ease(cfg.ease)
            .on_start(move |doc| {
                doc.style_mut(img).origin = Some(origin);
                doc.style_mut(slide).opacity = 1.0;
            })
            .on_complete(move |doc| {
                let style = doc.style_mut(slide);
                style.z_index = Some(REST_LAYER);
                style.opacity = resting_opacity;
            });
        if action == Action::Show {
            vars = vars.start_at(Props::new().x(-100.0 * sign).scale(cfg.scale));
        }
        parts.push(self.animator.to(self.img, cfg.duration, vars));

        debug!(slide = self.el.index(), ?action, ?direction, "slide transition");
        Completion::all(parts)
    }

    pub fn details_state(&self) -> DetailsState {
        *self
            .details_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_details_open(&self) -> bool {
        self.details_state() == DetailsState::Open
    }

    fn begin_details(&self, from: DetailsState, to: DetailsState) -> bool {
        let mut state = self
            .details_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    fn finish_details(&self, barrier: Completion, settled: DetailsState) -> Completion {
        let state = self.details_state.clone();
        Completion::spawn(async move {
            barrier.await;
            *state.lock().unwrap_or_else(PoisonError::into_inner) = settled;
        })
    }

    /// Reveals every detail box. Resolves at once unless the boxes are closed.
    pub fn show_details(&self) -> Completion {
        if !self.begin_details(DetailsState::Closed, DetailsState::Opening) {
            debug!(
                slide = self.el.index(),
                state = ?self.details_state(),
                "details not closed; skipping open"
            );
            return Completion::ready();
        }

        let total = self.items.len();
        let mut parts = Vec::with_capacity(total * 2);
        for (pos, item) in self.items.iter().enumerate() {
            let timing = opening_timing(&self.details_animation, pos, total);
            let (x, y) = item.reveal.hidden_offset();
            parts.push(self.animator.to(
                item.element,
                timing.duration,
                TweenVars::new(Props::translate(0.0, 0.0))
                    .ease(timing.ease)
                    .delay(timing.delay)
                    .start_at(Props::translate(x, y)),
            ));
            parts.push(self.animator.to(
                item.inner,
                timing.duration,
                TweenVars::new(Props::translate(0.0, 0.0))
                    .ease(timing.ease)
                    .delay(timing.delay)
                    .start_at(Props::translate(-x, -y)),
            ));
        }
        self.finish_details(Completion::all(parts), DetailsState::Open)
    }

    /// Hides every detail box. Resolves at once unless the boxes are open.
    pub fn hide_details(&self) -> Completion {
        if !self.begin_details(DetailsState::Open, DetailsState::Closing) {
            debug!(
                slide = self.el.index(),
                state = ?self.details_state(),
                "details not open; skipping close"
            );
            return Completion::ready();
        }

        let total = self.items.len();
        let mut parts = Vec::with_capacity(total * 2);
        for (pos, item) in self.items.iter().enumerate() {
            let timing = closing_timing(&self.details_animation, pos, total);
            let (x, y) = item.reveal.hidden_offset();
            parts.push(self.animator.to(
                item.element,
                timing.duration,
                TweenVars::new(Props::translate(x, y))
                    .ease(timing.ease)
                    .delay(timing.delay),
            ));
            parts.push(self.animator.to(
                item.inner,
                timing.duration,
                TweenVars::new(Props::translate(-x, -y))
                    .ease(timing.ease)
                    .delay(timing.delay),
            ));
        }
        self.finish_details(Completion::all(parts), DetailsState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;
    use crate::markup;
    use crate::testkit;

    fn first_slide() -> Slide {
        let doc = markup::parse(&testkit::markup(2)).unwrap();
        let dom = Dom::new(doc);
        let (el, details) = dom.read(|doc| {
            let body = doc.body().unwrap();
            (
                doc.query(body, "slide").unwrap(),
                doc.query(body, "details").unwrap(),
            )
        });
        let animator = Animator::new(dom, Duration::from_millis(16));
        Slide::new(animator, el, details, &Configuration::default()).unwrap()
    }

    #[test]
    fn reveal_direction_accepts_short_and_long_names() {
        assert_eq!("rtl".parse(), Ok(RevealDirection::RightToLeft));
        assert_eq!("left-to-right".parse(), Ok(RevealDirection::LeftToRight));
        assert_eq!("btt".parse(), Ok(RevealDirection::BottomToTop));
        assert_eq!("top-to-bottom".parse(), Ok(RevealDirection::TopToBottom));
        assert!("diagonal".parse::<RevealDirection>().is_err());
    }

    #[test]
    fn opening_accents_the_last_three_boxes() {
        let cfg = DetailsAnimation::default();
        let t0 = opening_timing(&cfg, 0, 6);
        assert_eq!(t0.duration, Duration::from_millis(200));
        assert_eq!(t0.ease, Easing::Power2InOut);
        assert_eq!(t0.delay, Duration::ZERO);
        let t2 = opening_timing(&cfg, 2, 6);
        assert_eq!(t2.duration, Duration::from_millis(200));
        let t3 = opening_timing(&cfg, 3, 6);
        assert_eq!(t3.duration, Duration::from_millis(700));
        assert_eq!(t3.ease, Easing::ExpoOut);
        assert_eq!(t3.delay, Duration::from_millis(240));
        // Fewer boxes than the accent count: all of them are accented.
        assert_eq!(opening_timing(&cfg, 0, 2).ease, Easing::ExpoOut);
    }

    #[test]
    fn closing_reverses_the_stagger() {
        let cfg = DetailsAnimation::default();
        let first = closing_timing(&cfg, 0, 4);
        assert_eq!(first.duration, Duration::from_millis(700));
        assert_eq!(first.delay, Duration::from_millis(240));
        let last = closing_timing(&cfg, 3, 4);
        assert_eq!(last.duration, Duration::from_millis(200));
        assert_eq!(last.delay, Duration::ZERO);
    }

    #[test]
    fn resolves_items_with_default_direction() {
        let slide = first_slide();
        let reveals: Vec<_> = slide.detail_items().iter().map(|i| i.reveal).collect();
        assert_eq!(
            reveals,
            [
                RevealDirection::RightToLeft,
                RevealDirection::BottomToTop,
                RevealDirection::LeftToRight,
                RevealDirection::TopToBottom,
            ]
        );
        let close = slide.close_control();
        assert_eq!(slide.detail_items()[0].element, close);
    }

    #[tokio::test(start_paused = true)]
    async fn details_open_and_close_are_idempotent() {
        let slide = first_slide();
        slide.prepare(true);
        assert!(slide.hide_details().is_immediate());

        slide.show_details().await;
        assert!(slide.is_details_open());
        let item = slide.detail_items()[1];
        slide.animator.dom().read(|doc| {
            assert_eq!((doc.style(item.element).x, doc.style(item.element).y), (0.0, 0.0));
            assert_eq!(doc.style(item.inner).y, 0.0);
        });
        assert!(slide.show_details().is_immediate());

        slide.hide_details().await;
        assert_eq!(slide.details_state(), DetailsState::Closed);
        slide.animator.dom().read(|doc| {
            assert_eq!(doc.style(item.element).y, 100.0);
            assert_eq!(doc.style(item.inner).y, -100.0);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn second_open_while_opening_is_a_no_op() {
        let slide = first_slide();
        let first = slide.show_details();
        assert_eq!(slide.details_state(), DetailsState::Opening);
        assert!(slide.show_details().is_immediate());
        first.await;
        assert!(slide.is_details_open());
    }

    #[tokio::test(start_paused = true)]
    async fn show_then_hide_settles_layers_and_opacity() {
        let slide = first_slide();
        slide.prepare(false);
        let pending = slide.show(Direction::Right);
        slide.animator.dom().read(|doc| {
            assert_eq!(doc.style(slide.element()).z_index, Some(FRONT_LAYER));
        });
        pending.await;
        slide.animator.dom().read(|doc| {
            let style = doc.style(slide.element());
            assert_eq!(style.z_index, Some(REST_LAYER));
            assert_eq!(style.opacity, 1.0);
            let img = doc.style(slide.image());
            assert_eq!((img.x, img.scale), (0.0, 1.0));
            assert_eq!(img.origin, Some(Origin::new(0.0, 50.0)));
        });

        slide.hide(Direction::Left).await;
        slide.animator.dom().read(|doc| {
            assert_eq!(doc.style(slide.element()).opacity, 0.0);
            let img = doc.style(slide.image());
            assert!((img.scale - 1.1).abs() < 1e-6);
            assert_eq!(img.origin, Some(Origin::new(0.0, 50.0)));
        });
    }

    #[tokio::test(start_paused = true)]
    async fn show_left_starts_from_mirrored_keyframes() {
        let slide = first_slide();
        slide.prepare(false);
        let pending = slide.show(Direction::Left);
        // One frame in, every part is still next to its start keyframe.
        tokio::time::sleep(Duration::from_millis(20)).await;
        slide.animator.dom().read(|doc| {
            assert!(doc.style(slide.wrap).x < -90.0);
            assert!(doc.style(slide.title_wrap).x > 90.0);
            let img = doc.style(slide.image());
            assert!(img.x > 90.0, "image x {}", img.x);
            assert!((img.scale - 1.1).abs() < 0.01, "image scale {}", img.scale);
            assert_eq!(img.origin, Some(Origin::new(100.0, 50.0)));
            assert_eq!(doc.style(slide.element()).opacity, 1.0);
        });
        pending.await;
        slide.animator.dom().read(|doc| {
            assert_eq!(doc.style(slide.wrap).x, 0.0);
            assert_eq!(doc.style(slide.title_wrap).x, 0.0);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn hide_right_zooms_from_the_right_edge() {
        let slide = first_slide();
        slide.prepare(true);
        let pending = slide.hide(Direction::Right);
        tokio::time::sleep(Duration::from_millis(20)).await;
        slide.animator.dom().read(|doc| {
            let img = doc.style(slide.image());
            assert_eq!(img.origin, Some(Origin::new(100.0, 50.0)));
            assert!(img.scale < 1.01, "image scale {}", img.scale);
            // Hiding leaves the wrap and title where they are.
            assert_eq!(doc.style(slide.wrap).x, 0.0);
            assert_eq!(doc.style(slide.title_wrap).x, 0.0);
        });
        pending.await;
        slide.animator.dom().read(|doc| {
            let img = doc.style(slide.image());
            assert_eq!(img.x, 0.0);
            assert!((img.scale - 1.1).abs() < 1e-6);
            assert_eq!(doc.style(slide.element()).opacity, 0.0);
        });
    }
}
