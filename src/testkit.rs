//! Fixtures shared by unit and integration tests.

use std::fmt::Write as _;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Configuration;
use crate::dom::Dom;
use crate::error::Result;
use crate::events::SlideshowCommand;
use crate::markup;
use crate::slideshow::Slideshow;
use crate::tween::Animator;

/// Markup for a show with `slides` slides. Every details group holds four
/// boxes: the close box (default direction) followed by `btt`, `ltr`, `ttb`.
pub fn markup(slides: usize) -> String {
    let mut out = String::from("<!DOCTYPE html>\n<html>\n<body class=\"loading\">\n<main>\n");
    out.push_str("<div class=\"slideshow\">\n");
    for i in 1..=slides {
        let _ = write!(
            out,
            r#"  <div class="slide">
    <div class="slide__wrap">
      <div class="slide__img" style="background-image: url(img/{i}.jpg)"/>
      <div class="slide__title-wrap"><h3 class="slide__title">Product {i}</h3></div>
    </div>
  </div>
"#
        );
    }
    out.push_str(
        r#"  <nav class="boxnav">
    <button class="boxnav__item boxnav__item--prev">prev</button>
    <span class="boxnav__label boxnav__label--current">1</span>
    <span class="boxnav__label boxnav__label--total">?</span>
    <button class="boxnav__item boxnav__item--next">next</button>
  </nav>
  <button class="action action--details">details</button>
</div>
<div class="details-wrap">
"#,
    );
    for i in 1..=slides {
        let _ = write!(
            out,
            r#"  <div class="details">
    <div class="details__item details__item--close"><div class="details__inner">close {i}</div></div>
    <div class="details__item" data-direction="btt"><div class="details__inner">price</div></div>
    <div class="details__item" data-direction="ltr"><div class="details__inner">size</div></div>
    <div class="details__item" data-direction="ttb"><div class="details__inner">notes</div></div>
  </div>
"#
        );
    }
    out.push_str("</div>\n</main>\n</body>\n</html>\n");
    out
}

/// A mounted show plus the receiving end of its click commands.
pub struct Fixture {
    pub show: Arc<Slideshow>,
    pub commands: mpsc::Receiver<SlideshowCommand>,
}

impl Fixture {
    pub fn dom(&self) -> &Dom {
        self.show.dom()
    }
}

/// Mounts [`markup`] with the default configuration.
pub fn mount(slides: usize) -> Result<Fixture> {
    mount_with(slides, &Configuration::default())
}

pub fn mount_with(slides: usize, cfg: &Configuration) -> Result<Fixture> {
    let dom = Dom::new(markup::parse(&markup(slides))?);
    let animator = Animator::new(dom, cfg.animator.frame_interval);
    let (tx, rx) = mpsc::channel(16);
    let show = Slideshow::mount(animator, cfg, tx)?;
    Ok(Fixture {
        show,
        commands: rx,
    })
}
