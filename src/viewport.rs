use std::sync::Arc;

use crate::config::SlideshowConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportClass {
    Narrow,
    Wide,
}

impl ViewportClass {
    pub fn classify(width: u32, breakpoint: u32) -> Self {
        if width < breakpoint {
            Self::Narrow
        } else {
            Self::Wide
        }
    }
}

/// Immutable, ordered image URLs selected for one viewport class.
pub type ImageSet = Arc<[Arc<str>]>;

/// Both image variants, converted once so selection can hand out shared sets.
#[derive(Debug, Clone)]
pub struct ImageSets {
    wide: ImageSet,
    narrow: Option<ImageSet>,
    breakpoint: u32,
}

impl ImageSets {
    pub fn from_config(cfg: &SlideshowConfig) -> Self {
        Self::new(
            cfg.images.iter().map(String::as_str),
            cfg.mobile_images
                .as_ref()
                .map(|urls| urls.iter().map(String::as_str)),
            cfg.mobile_breakpoint,
        )
    }

    pub fn new<'a, W, N>(wide: W, narrow: Option<N>, breakpoint: u32) -> Self
    where
        W: IntoIterator<Item = &'a str>,
        N: IntoIterator<Item = &'a str>,
    {
        Self {
            wide: to_set(wide),
            narrow: narrow.map(to_set),
            breakpoint,
        }
    }

    pub fn classify(&self, width: u32) -> ViewportClass {
        ViewportClass::classify(width, self.breakpoint)
    }

    /// The set shown for `class`; narrow viewports fall back to the wide set.
    pub fn select(&self, class: ViewportClass) -> &ImageSet {
        match (class, self.narrow.as_ref()) {
            (ViewportClass::Narrow, Some(narrow)) => narrow,
            _ => &self.wide,
        }
    }
}

fn to_set<'a>(urls: impl IntoIterator<Item = &'a str>) -> ImageSet {
    urls.into_iter().map(Arc::from).collect()
}
