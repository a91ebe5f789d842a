//! Pagination box: prev/next controls and the current/total page labels.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::{Configuration, NavigationAnimation};
use crate::dom::ElementId;
use crate::error::{Error, Result};
use crate::slide::Direction;
use crate::tween::{Animator, Completion, Props, TweenVars};

pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Callbacks fired by the prev/next controls.
#[derive(Clone)]
pub struct NavigationSettings {
    pub next: Callback,
    pub prev: Callback,
}

impl fmt::Debug for NavigationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationSettings").finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Navigation {
    animator: Animator,
    prev_ctrl: ElementId,
    next_ctrl: ElementId,
    current_label: ElementId,
    total_label: ElementId,
    animation: NavigationAnimation,
}

impl Navigation {
    pub fn new(animator: Animator, el: ElementId, cfg: &Configuration) -> Result<Self> {
        let (prev_ctrl, next_ctrl, current_label, total_label) = animator.dom().read(|doc| {
            Ok::<_, Error>((
                doc.require(el, "boxnav__item--prev")?,
                doc.require(el, "boxnav__item--next")?,
                doc.require(el, "boxnav__label--current")?,
                doc.require(el, "boxnav__label--total")?,
            ))
        })?;
        Ok(Self {
            animator,
            prev_ctrl,
            next_ctrl,
            current_label,
            total_label,
            animation: cfg.navigation.clone(),
        })
    }

    pub fn prev_control(&self) -> ElementId {
        self.prev_ctrl
    }

    pub fn next_control(&self) -> ElementId {
        self.next_ctrl
    }

    pub fn current_text(&self) -> String {
        self.animator
            .dom()
            .read(|doc| doc.text(self.current_label).to_string())
    }

    pub fn total_text(&self) -> String {
        self.animator
            .dom()
            .read(|doc| doc.text(self.total_label).to_string())
    }

    /// Moves the current label out, swaps its value, and brings it back in
    /// from the opposite side.
    pub fn set_current(&self, value: usize, direction: Direction) -> Completion {
        let cfg = &self.animation;
        let label = self.current_label;
        let sign = match direction {
            Direction::Right => 1.0,
            Direction::Left => -1.0,
        };

        let out = self.animator.to(
            label,
            cfg.out_duration,
            TweenVars::new(Props::new().y(-100.0 * sign).opacity(0.0))
                .ease(cfg.out_ease)
                .on_complete(move |doc| doc.set_text(label, value.to_string())),
        );
        let animator = self.animator.clone();
        let (in_duration, in_ease) = (cfg.in_duration, cfg.in_ease);
        debug!(value, ?direction, "pagination label update");
        Completion::spawn(async move {
            out.await;
            animator
                .to(
                    label,
                    in_duration,
                    TweenVars::new(Props::new().y(0.0).opacity(1.0))
                        .ease(in_ease)
                        .start_at(Props::new().y(50.0 * sign).opacity(0.0)),
                )
                .await;
        })
    }

    pub fn set_total(&self, value: usize) {
        self.animator
            .dom()
            .write(|doc| doc.set_text(self.total_label, value.to_string()));
    }

    /// Forwards clicks on the prev/next controls to `settings`.
    pub fn init_events(&self, settings: NavigationSettings) {
        let NavigationSettings { next, prev } = settings;
        self.animator.dom().write(|doc| {
            doc.add_listener(self.prev_ctrl, Arc::new(move || prev()));
            doc.add_listener(self.next_ctrl, Arc::new(move || next()));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;
    use crate::markup;
    use crate::testkit;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn navigation() -> Navigation {
        let dom = Dom::new(markup::parse(&testkit::markup(3)).unwrap());
        let el = dom.read(|doc| doc.query(doc.body().unwrap(), "boxnav").unwrap());
        let animator = Animator::new(dom, Duration::from_millis(16));
        Navigation::new(animator, el, &Configuration::default()).unwrap()
    }

    #[test]
    fn missing_label_is_fatal() {
        let dom = Dom::new(
            markup::parse(
                r#"<nav class="boxnav">
  <button class="boxnav__item boxnav__item--prev"/>
  <button class="boxnav__item boxnav__item--next"/>
  <span class="boxnav__label boxnav__label--total">3</span>
</nav>"#,
            )
            .unwrap(),
        );
        let root = dom.read(|doc| doc.root().unwrap());
        let err = Navigation::new(
            Animator::new(dom, Duration::from_millis(16)),
            root,
            &Configuration::default(),
        )
        .unwrap_err();
        assert!(
            matches!(err, Error::MissingElement { ref class, .. } if class == "boxnav__label--current")
        );
    }

    #[test]
    fn set_total_writes_label_directly() {
        let nav = navigation();
        nav.set_total(7);
        assert_eq!(nav.total_text(), "7");
    }

    #[tokio::test(start_paused = true)]
    async fn set_current_swaps_text_between_out_and_in() {
        let nav = navigation();
        assert_eq!(nav.current_text(), "1");
        let done = nav.set_current(2, Direction::Right);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(nav.current_text(), "1");

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(nav.current_text(), "2");

        done.await;
        let label = nav.current_label;
        nav.animator.dom().read(|doc| {
            assert_eq!(doc.style(label).y, 0.0);
            assert_eq!(doc.style(label).opacity, 1.0);
        });
    }

    #[test]
    fn clicks_reach_the_callbacks() {
        let nav = navigation();
        let next_hits = Arc::new(AtomicUsize::new(0));
        let prev_hits = Arc::new(AtomicUsize::new(0));
        let (n, p) = (next_hits.clone(), prev_hits.clone());
        nav.init_events(NavigationSettings {
            next: Arc::new(move || {
                n.fetch_add(1, Ordering::SeqCst);
            }),
            prev: Arc::new(move || {
                p.fetch_add(1, Ordering::SeqCst);
            }),
        });

        let dom = nav.animator.dom().clone();
        dom.click(nav.next_control());
        dom.click(nav.next_control());
        dom.click(nav.prev_control());
        assert_eq!(next_hits.load(Ordering::SeqCst), 2);
        assert_eq!(prev_hits.load(Ordering::SeqCst), 1);
    }
}
