//! Orchestrates slides, the pagination box and the details overlay.
//!
//! Rules:
//! - At most one transition (navigation or details toggle) runs at a time.
//!   Requests arriving while one is in flight are ignored, not queued.
//! - The state flips to `Transitioning` before any animation starts and back
//!   to `Idle` only after every animation of that transition has completed.
//! - With fewer than [`MIN_SLIDES`] slides the show mounts but stays inactive.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::select;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::dom::{Dom, ElementId};
use crate::error::{Error, Result};
use crate::events::SlideshowCommand;
use crate::navigation::{Navigation, NavigationSettings};
use crate::slide::{Direction, Slide};
use crate::tween::{Animator, Completion};

pub const MIN_SLIDES: usize = 2;

const DETAILS_OVERLAY_CLASS: &str = "slideshow--details";
const DETAILS_WRAP_OPEN_CLASS: &str = "details-wrap--open";
const DETAILS_CURRENT_CLASS: &str = "details--current";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    Transitioning,
}

/// Result of a transition request.
#[must_use = "a started transition should be awaited or stored"]
#[derive(Debug)]
pub enum Transition {
    Started(Completion),
    /// Another transition was in flight or the show is inactive.
    Ignored,
}

impl Transition {
    pub fn is_started(&self) -> bool {
        matches!(self, Transition::Started(_))
    }

    /// Waits for the transition if one was started.
    pub async fn finished(self) {
        if let Transition::Started(done) = self {
            done.await;
        }
    }
}

/// Next slide index with wraparound. `total` must be non-zero.
pub fn next_index(current: usize, total: usize, direction: Direction) -> usize {
    match direction {
        Direction::Right => (current + 1) % total,
        Direction::Left => (current + total - 1) % total,
    }
}

#[derive(Debug)]
struct ShowState {
    current: usize,
    transition: TransitionState,
}

#[derive(Debug)]
pub struct Slideshow {
    animator: Animator,
    root: ElementId,
    details_ctrl: ElementId,
    details_wrap: ElementId,
    details: Vec<ElementId>,
    slides: Vec<Slide>,
    navigation: Navigation,
    state: Mutex<ShowState>,
    active: bool,
}

/// Proof that the caller moved the show into `Transitioning`; dropping it
/// returns the show to `Idle`.
struct TransitionTicket {
    show: Arc<Slideshow>,
    label: &'static str,
}

impl Drop for TransitionTicket {
    fn drop(&mut self) {
        self.show.lock_state().transition = TransitionState::Idle;
        debug!(transition = self.label, "transition finished");
    }
}

impl Slideshow {
    /// Resolves every required element, wires slides to their details groups
    /// and, with enough slides, hooks click listeners up to `commands`.
    pub fn mount(
        animator: Animator,
        cfg: &Configuration,
        commands: mpsc::Sender<SlideshowCommand>,
    ) -> Result<Arc<Self>> {
        let dom = animator.dom().clone();
        let (root, nav_el, details_ctrl, details_wrap, details, slide_els) = dom.read(|doc| {
            let document = doc.root().ok_or_else(|| Error::MissingElement {
                class: "slideshow".to_string(),
                scope: "an empty document".to_string(),
            })?;
            let root = doc.require(document, "slideshow")?;
            let nav_el = doc.require(document, "boxnav")?;
            let details_ctrl = doc.require(document, "action--details")?;
            let details_wrap = doc.require(document, "details-wrap")?;
            let details = doc.query_all(details_wrap, "details");
            let slide_els = doc.query_all(root, "slide");
            if details.len() < slide_els.len() {
                return Err(Error::MissingElement {
                    class: "details".to_string(),
                    scope: format!(
                        "{} (slide {} has no details group)",
                        doc.describe(details_wrap),
                        details.len() + 1
                    ),
                });
            }
            Ok((root, nav_el, details_ctrl, details_wrap, details, slide_els))
        })?;

        let navigation = Navigation::new(animator.clone(), nav_el, cfg)?;
        let slides = slide_els
            .iter()
            .zip(&details)
            .map(|(el, group)| Slide::new(animator.clone(), *el, *group, cfg))
            .collect::<Result<Vec<_>>>()?;

        navigation.set_total(slides.len());

        let active = slides.len() >= MIN_SLIDES;
        let show = Arc::new(Self {
            animator,
            root,
            details_ctrl,
            details_wrap,
            details,
            slides,
            navigation,
            state: Mutex::new(ShowState {
                current: 0,
                transition: TransitionState::Idle,
            }),
            active,
        });

        if !active {
            info!(
                slides = show.slides.len(),
                "slideshow needs at least {MIN_SLIDES} slides; leaving it inactive"
            );
            return Ok(show);
        }

        for (pos, slide) in show.slides.iter().enumerate() {
            slide.prepare(pos == 0);
        }
        show.slides[0].set_current(true);
        show.init_events(commands);
        info!(slides = show.slides.len(), "slideshow mounted");
        Ok(show)
    }

    fn init_events(&self, commands: mpsc::Sender<SlideshowCommand>) {
        let forward = |command: SlideshowCommand| {
            let commands = commands.clone();
            Arc::new(move || send_command(&commands, command)) as Arc<dyn Fn() + Send + Sync>
        };

        self.navigation.init_events(NavigationSettings {
            next: forward(SlideshowCommand::Navigate(Direction::Right)),
            prev: forward(SlideshowCommand::Navigate(Direction::Left)),
        });

        let open = forward(SlideshowCommand::OpenDetails);
        let close = forward(SlideshowCommand::CloseDetails);
        self.dom().write(|doc| {
            doc.add_listener(self.details_ctrl, open);
            for slide in &self.slides {
                doc.add_listener(slide.close_control(), close.clone());
            }
        });
    }

    pub fn dom(&self) -> &Dom {
        self.animator.dom()
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn details_control(&self) -> ElementId {
        self.details_ctrl
    }

    pub fn details_wrap(&self) -> ElementId {
        self.details_wrap
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    /// Image elements of every slide, in slide order.
    pub fn image_elements(&self) -> Vec<ElementId> {
        self.slides.iter().map(Slide::image).collect()
    }

    pub fn total(&self) -> usize {
        self.slides.len()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current(&self) -> usize {
        self.lock_state().current
    }

    pub fn state(&self) -> TransitionState {
        self.lock_state().transition
    }

    pub fn is_details_open(&self) -> bool {
        self.slides
            .get(self.current())
            .is_some_and(Slide::is_details_open)
    }

    fn lock_state(&self) -> MutexGuard<'_, ShowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the show into `Transitioning`, or explains why it cannot.
    fn begin_transition(
        self: &Arc<Self>,
        label: &'static str,
    ) -> Option<(TransitionTicket, usize)> {
        if !self.active {
            debug!(transition = label, "slideshow inactive; ignoring request");
            return None;
        }
        let mut state = self.lock_state();
        if state.transition == TransitionState::Transitioning {
            debug!(transition = label, "transition in flight; ignoring request");
            return None;
        }
        state.transition = TransitionState::Transitioning;
        let current = state.current;
        drop(state);
        debug!(transition = label, current, "transition started");
        Some((
            TransitionTicket {
                show: Arc::clone(self),
                label,
            },
            current,
        ))
    }

    pub fn handle(self: &Arc<Self>, command: SlideshowCommand) -> Transition {
        match command {
            SlideshowCommand::Navigate(direction) => self.navigate(direction),
            SlideshowCommand::OpenDetails => self.open_details_boxes(),
            SlideshowCommand::CloseDetails => self.close_details_boxes(),
        }
    }

    /// Closes the details panel if needed, then swaps the current slide for
    /// its neighbour in `direction`.
    pub fn navigate(self: &Arc<Self>, direction: Direction) -> Transition {
        let Some((ticket, current)) = self.begin_transition("navigate") else {
            return Transition::Ignored;
        };
        let next = next_index(current, self.slides.len(), direction);
        let show = Arc::clone(self);

        Transition::Started(Completion::spawn(async move {
            let _ticket = ticket;
            show.close_details().await;

            let label = show.navigation.set_current(next + 1, direction);
            Completion::all([
                label,
                show.slides[current].hide(direction),
                show.slides[next].show(direction),
            ])
            .await;

            show.slides[current].set_current(false);
            show.lock_state().current = next;
            show.slides[next].set_current(true);
            info!(from = current, to = next, ?direction, "navigated");
        }))
    }

    pub fn open_details_boxes(self: &Arc<Self>) -> Transition {
        let Some((ticket, current)) = self.begin_transition("open details") else {
            return Transition::Ignored;
        };
        self.dom().write(|doc| {
            doc.add_class(self.root, DETAILS_OVERLAY_CLASS);
            doc.add_class(self.details_wrap, DETAILS_WRAP_OPEN_CLASS);
            doc.add_class(self.details[current], DETAILS_CURRENT_CLASS);
        });
        let reveal = self.slides[current].show_details();

        Transition::Started(Completion::spawn(async move {
            let _ticket = ticket;
            reveal.await;
        }))
    }

    pub fn close_details_boxes(self: &Arc<Self>) -> Transition {
        let Some((ticket, _)) = self.begin_transition("close details") else {
            return Transition::Ignored;
        };
        let show = Arc::clone(self);

        Transition::Started(Completion::spawn(async move {
            let _ticket = ticket;
            show.close_details().await;
        }))
    }

    // Unguarded: callers hold a transition ticket.
    async fn close_details(&self) {
        let current = self.current();
        self.dom()
            .write(|doc| doc.remove_class(self.root, DETAILS_OVERLAY_CLASS));
        self.slides[current].hide_details().await;
        self.dom().write(|doc| {
            doc.remove_class(self.details[current], DETAILS_CURRENT_CLASS);
            doc.remove_class(self.details_wrap, DETAILS_WRAP_OPEN_CLASS);
        });
    }
}

fn send_command(commands: &mpsc::Sender<SlideshowCommand>, command: SlideshowCommand) {
    match commands.try_send(command) {
        Ok(()) => {}
        Err(TrySendError::Full(command)) => {
            warn!(?command, "slideshow command queue full; dropping click");
        }
        Err(TrySendError::Closed(command)) => {
            debug!(?command, "slideshow loop gone; dropping click");
        }
    }
}

/// Dispatches commands until cancelled or every sender is gone, then waits
/// for the transition still in flight.
pub async fn run(
    show: Arc<Slideshow>,
    mut commands: mpsc::Receiver<SlideshowCommand>,
    cancel: CancellationToken,
) {
    let mut in_flight: Option<Completion> = None;

    loop {
        // Clicks already queued are handled before a cancellation is seen.
        select! {
            biased;
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                match show.handle(command) {
                    // Transitions never overlap, so the previous one is done.
                    Transition::Started(done) => in_flight = Some(done),
                    Transition::Ignored => debug!(?command, "command ignored"),
                }
            }
            _ = cancel.cancelled() => break,
        }
    }

    if let Some(done) = in_flight {
        done.await;
    }
    debug!("slideshow loop stopped");
}
