use std::sync::Arc;

use crate::viewport::ImageSet;

/// Identifies one selection of the active image set.
///
/// Bumped every time the viewport crosses the breakpoint; load completions carry the
/// generation they were issued for so late arrivals from a replaced set can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Preload every image of a newly selected set; supersedes any earlier request.
#[derive(Debug, Clone)]
pub struct PreloadRequest {
    pub generation: Generation,
    pub images: ImageSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// Counts as settled for scheduling; the frame will render broken.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSettled {
    pub generation: Generation,
    pub index: usize,
    pub outcome: LoadOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideshowCommand {
    Next,
    Prev,
    HoverEnter,
    HoverLeave,
    /// New viewport width in logical pixels.
    Resize(u32),
}

/// Emitted by the scheduler after a frame becomes the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Displayed {
    pub index: usize,
    pub url: Arc<str>,
}

impl std::str::FromStr for SlideshowCommand {
    type Err = anyhow::Error;

    /// Parses control lines: `next`, `prev`, `hover`, `leave`, `resize <px>`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let cmd = match words.next() {
            Some("next") => Self::Next,
            Some("prev") => Self::Prev,
            Some("hover") => Self::HoverEnter,
            Some("leave") => Self::HoverLeave,
            Some("resize") => {
                let width = words
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("resize needs a width in pixels"))?;
                Self::Resize(width.parse()?)
            }
            Some(other) => anyhow::bail!("unknown command '{other}'"),
            None => anyhow::bail!("empty command"),
        };
        if let Some(extra) = words.next() {
            anyhow::bail!("unexpected argument '{extra}'");
        }
        Ok(cmd)
    }
}
