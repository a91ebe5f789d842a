//! Time-based interpolation of inline style values.
//!
//! Every tween runs as its own tokio task and steps the target's style once
//! per frame. Callers get a [`Completion`] back and decide whether to chain
//! (`.await`) or join ([`Completion::all`]) it with other transitions.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep};
use tracing::trace;

use crate::dom::{Document, Dom, ElementId, Style};

/// Easing curves used by the choreography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[default]
    Linear,
    /// Cubic ease-in-out.
    Power2InOut,
    ExpoOut,
    ExpoInOut,
    BackIn,
}

impl Easing {
    const BACK_OVERSHOOT: f32 = 1.70158;

    /// Maps linear progress in `[0, 1]` to eased progress. Both endpoints are
    /// exact.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        match self {
            Easing::Linear => t,
            Easing::Power2InOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::ExpoOut => 1.0 - 2f32.powf(-10.0 * t),
            Easing::ExpoInOut => {
                if t < 0.5 {
                    2f32.powf(20.0 * t - 10.0) / 2.0
                } else {
                    (2.0 - 2f32.powf(-20.0 * t + 10.0)) / 2.0
                }
            }
            Easing::BackIn => {
                let c1 = Self::BACK_OVERSHOOT;
                let c3 = c1 + 1.0;
                c3 * t * t * t - c1 * t * t
            }
        }
    }
}

/// A keyframe: the style values a tween starts from or heads to. Unset
/// fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Props {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub scale: Option<f32>,
    pub opacity: Option<f32>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(x: f32, y: f32) -> Self {
        Self::new().x(x).y(y)
    }

    pub fn x(mut self, x: f32) -> Self {
        self.x = Some(x);
        self
    }

    pub fn y(mut self, y: f32) -> Self {
        self.y = Some(y);
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn apply(&self, style: &mut Style) {
        let from = style.clone();
        self.interpolate(style, 1.0, from);
    }

    fn interpolate(&self, style: &mut Style, progress: f32, from: Style) {
        let lerp = |a: f32, b: f32| a + (b - a) * progress;
        if let Some(x) = self.x {
            style.x = lerp(from.x, x);
        }
        if let Some(y) = self.y {
            style.y = lerp(from.y, y);
        }
        if let Some(scale) = self.scale {
            style.scale = lerp(from.scale, scale);
        }
        if let Some(opacity) = self.opacity {
            style.opacity = lerp(from.opacity, opacity);
        }
    }
}

pub type Hook = Box<dyn FnOnce(&mut Document) + Send>;

/// Options for a single tween.
#[derive(Default)]
pub struct TweenVars {
    pub ease: Easing,
    pub delay: Duration,
    pub start_at: Option<Props>,
    pub to: Props,
    on_start: Option<Hook>,
    on_complete: Option<Hook>,
}

impl TweenVars {
    pub fn new(to: Props) -> Self {
        Self {
            to,
            ..Self::default()
        }
    }

    pub fn ease(mut self, ease: Easing) -> Self {
        self.ease = ease;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn start_at(mut self, start_at: Props) -> Self {
        self.start_at = Some(start_at);
        self
    }

    /// Runs after the delay, once the start keyframe is applied.
    pub fn on_start(mut self, hook: impl FnOnce(&mut Document) + Send + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Runs after the final values are written, before the completion fires.
    pub fn on_complete(mut self, hook: impl FnOnce(&mut Document) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }
}

/// Drives tweens against a shared [`Dom`].
#[derive(Debug, Clone)]
pub struct Animator {
    dom: Dom,
    frame: Duration,
}

impl Animator {
    pub fn new(dom: Dom, frame: Duration) -> Self {
        Self {
            dom,
            frame: frame.max(Duration::from_millis(1)),
        }
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    /// Starts tweening `target` toward `vars.to`. Must be called from within
    /// a tokio runtime.
    pub fn to(&self, target: ElementId, duration: Duration, vars: TweenVars) -> Completion {
        Completion::spawn(run_tween(
            self.dom.clone(),
            target,
            duration,
            vars,
            self.frame,
        ))
    }
}

async fn run_tween(
    dom: Dom,
    target: ElementId,
    duration: Duration,
    vars: TweenVars,
    frame: Duration,
) {
    let TweenVars {
        ease,
        delay,
        start_at,
        to,
        on_start,
        on_complete,
    } = vars;

    if !delay.is_zero() {
        sleep(delay).await;
    }

    let from = dom.write(|doc| {
        if let Some(start_at) = start_at {
            start_at.apply(doc.style_mut(target));
        }
        if let Some(hook) = on_start {
            hook(doc);
        }
        doc.style(target).clone()
    });

    let started = Instant::now();
    loop {
        let elapsed = started.elapsed();
        if elapsed >= duration {
            break;
        }
        let progress = ease.apply(elapsed.as_secs_f32() / duration.as_secs_f32());
        dom.write(|doc| to.interpolate(doc.style_mut(target), progress, from.clone()));
        sleep(frame.min(duration - elapsed)).await;
    }

    dom.write(|doc| {
        to.apply(doc.style_mut(target));
        if let Some(hook) = on_complete {
            hook(doc);
        }
    });
    trace!(element = target.index(), ?duration, ?delay, "tween complete");
}

/// Resolves once when the transition it stands for has finished.
///
/// Awaiting is optional: the underlying work keeps running when a completion
/// is dropped.
#[must_use = "a completion resolves when its transition ends"]
#[derive(Debug)]
pub struct Completion {
    rx: Option<oneshot::Receiver<()>>,
}

impl Completion {
    /// An already-resolved completion.
    pub fn ready() -> Self {
        Self { rx: None }
    }

    /// Runs `work` on the runtime and resolves when it returns.
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            work.await;
            let _ = tx.send(());
        });
        Self { rx: Some(rx) }
    }

    /// Barrier over several completions.
    pub fn all(parts: impl IntoIterator<Item = Completion>) -> Self {
        let pending: Vec<Completion> = parts
            .into_iter()
            .filter(|part| !part.is_immediate())
            .collect();
        if pending.is_empty() {
            return Self::ready();
        }
        Self::spawn(async move {
            join_all(pending).await;
        })
    }

    /// True when this completion was resolved at creation.
    pub fn is_immediate(&self) -> bool {
        self.rx.is_none()
    }
}

impl Future for Completion {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        match this.rx.as_mut() {
            None => Poll::Ready(()),
            // A dropped sender still means the work is over.
            Some(rx) => Pin::new(rx).poll(cx).map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn single_element() -> (Animator, ElementId) {
        let mut doc = Document::new();
        let id = doc.create_element("div", None);
        let dom = Dom::new(doc);
        (Animator::new(dom, Duration::from_millis(16)), id)
    }

    #[test]
    fn easing_endpoints_are_exact() {
        for ease in [
            Easing::Linear,
            Easing::Power2InOut,
            Easing::ExpoOut,
            Easing::ExpoInOut,
            Easing::BackIn,
        ] {
            assert_eq!(ease.apply(0.0), 0.0, "{ease:?}");
            assert_eq!(ease.apply(1.0), 1.0, "{ease:?}");
            assert_eq!(ease.apply(2.0), 1.0, "{ease:?}");
        }
    }

    #[test]
    fn easing_shapes() {
        assert!((Easing::Power2InOut.apply(0.5) - 0.5).abs() < 1e-6);
        assert!((Easing::ExpoInOut.apply(0.5) - 0.5).abs() < 1e-6);
        assert!(Easing::ExpoOut.apply(0.2) > 0.7);
        // Back-in dips below zero before heading to the target.
        assert!(Easing::BackIn.apply(0.2) < 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn tween_applies_start_keyframe_and_lands_on_target() {
        let (animator, id) = single_element();
        let done = animator.to(
            id,
            Duration::from_millis(400),
            TweenVars::new(Props::new().x(0.0).scale(1.0))
                .ease(Easing::ExpoInOut)
                .start_at(Props::new().x(100.0).scale(1.1)),
        );

        sleep(Duration::from_millis(200)).await;
        let mid = animator.dom().read(|doc| doc.style(id).clone());
        assert!(mid.x > 0.0 && mid.x < 100.0, "mid x = {}", mid.x);

        done.await;
        let end = animator.dom().read(|doc| doc.style(id).clone());
        assert_eq!(end.x, 0.0);
        assert_eq!(end.scale, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_postpones_start_hook() {
        let (animator, id) = single_element();
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let done = animator.to(
            id,
            Duration::from_millis(100),
            TweenVars::new(Props::new().opacity(0.0))
                .delay(Duration::from_millis(300))
                .start_at(Props::new().y(50.0))
                .on_start(move |_| flag.store(true, Ordering::SeqCst))
                .on_complete(move |doc| doc.set_text(id, "done")),
        );

        sleep(Duration::from_millis(150)).await;
        assert!(!started.load(Ordering::SeqCst));
        assert_eq!(animator.dom().read(|doc| doc.style(id).y), 0.0);

        done.await;
        assert!(started.load(Ordering::SeqCst));
        animator.dom().read(|doc| {
            assert_eq!(doc.style(id).y, 50.0);
            assert_eq!(doc.style(id).opacity, 0.0);
            assert_eq!(doc.text(id), "done");
        });
    }

    #[tokio::test(start_paused = true)]
    async fn barrier_waits_for_the_slowest_part() {
        let (animator, id) = single_element();
        let begin = Instant::now();
        let fast = animator.to(
            id,
            Duration::from_millis(100),
            TweenVars::new(Props::new().y(10.0)),
        );
        let slow = animator.to(
            id,
            Duration::from_millis(500),
            TweenVars::new(Props::new().x(10.0)),
        );
        Completion::all([fast, slow, Completion::ready()]).await;
        assert!(begin.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn empty_barrier_is_immediate() {
        assert!(Completion::all(Vec::new()).is_immediate());
        Completion::ready().await;
    }
}
