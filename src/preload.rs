//! Startup image preloading.
//!
//! Probes every slide image once so broken sources show up in the log before
//! the first transition, then lifts the body's `loading` state.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dom::{Document, Dom, ElementId};

pub const LOADING_CLASS: &str = "loading";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    /// Image elements carrying neither `data-src` nor a background url.
    pub without_source: usize,
}

/// Image source of `id`: its `data-src` attribute, else the url of an inline
/// `background-image`.
pub fn image_source(doc: &Document, id: ElementId) -> Option<String> {
    let element = doc.element(id);
    if let Some(src) = element.data("src") {
        return Some(src.to_string());
    }
    element
        .attribute("style")
        .and_then(css_url)
        .map(str::to_string)
}

fn css_url(style: &str) -> Option<&str> {
    let start = style.find("url(")? + "url(".len();
    let end = start + style[start..].find(')')?;
    let url = style[start..end].trim().trim_matches(|c| c == '"' || c == '\'');
    (!url.is_empty()).then_some(url)
}

/// Probes the images behind `images` with at most `max_concurrent` decodes in
/// flight, then removes [`LOADING_CLASS`] from the body whatever the outcome.
pub async fn preload(
    dom: Dom,
    images: Vec<ElementId>,
    base_dir: &Path,
    max_concurrent: usize,
) -> PreloadReport {
    let mut report = PreloadReport::default();
    let sources: Vec<Option<String>> =
        dom.read(|doc| images.iter().map(|id| image_source(doc, *id)).collect());

    let mut pending: VecDeque<PathBuf> = VecDeque::new();
    for source in sources {
        match source {
            Some(source) => pending.push_back(base_dir.join(source)),
            None => report.without_source += 1,
        }
    }

    let max_in_flight = max_concurrent.max(1);
    let mut tasks: JoinSet<(PathBuf, image::ImageResult<(u32, u32)>)> = JoinSet::new();
    loop {
        while tasks.len() < max_in_flight {
            let Some(path) = pending.pop_front() else {
                break;
            };
            tasks.spawn_blocking(move || {
                let probed = image::image_dimensions(&path);
                (path, probed)
            });
        }

        match tasks.join_next().await {
            None => break,
            Some(Ok((path, Ok((width, height))))) => {
                debug!(path = %path.display(), width, height, "image preloaded");
                report.loaded.push(path);
            }
            Some(Ok((path, Err(err)))) => {
                warn!(path = %path.display(), error = %err, "image failed to preload");
                report.failed.push(path);
            }
            Some(Err(err)) => warn!(error = %err, "preload task failed"),
        }
    }

    dom.write(|doc| {
        if let Some(body) = doc.body() {
            doc.remove_class(body, LOADING_CLASS);
        }
    });
    info!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        without_source = report.without_source,
        "preload finished"
    );
    report
}
