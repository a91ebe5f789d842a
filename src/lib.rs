pub mod config;
pub mod dom;
pub mod error;
pub mod events;
pub mod markup;
pub mod navigation;
pub mod preload;
pub mod slide;
pub mod slideshow;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod tween;

pub use error::{Error, Result};
pub use slide::Direction;
pub use slideshow::{Slideshow, Transition, TransitionState};
