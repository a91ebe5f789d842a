use crate::slide::Direction;

/// Requests forwarded from click listeners to the slideshow loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideshowCommand {
    Navigate(Direction),
    OpenDetails,
    CloseDetails,
}
