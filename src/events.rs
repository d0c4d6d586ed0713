use std::sync::Arc;

use image::RgbaImage;

use crate::config::ImageSource;
use crate::gallery::LoadRequest;

/// Viewer → loader: fetch the image for one ring slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadImage {
    pub slot: usize,
    pub generation: u64,
    pub source: ImageSource,
}

impl From<LoadRequest> for LoadImage {
    fn from(request: LoadRequest) -> Self {
        Self {
            slot: request.slot,
            generation: request.generation,
            source: request.source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageLoaded {
    pub slot: usize,
    pub generation: u64,
    pub image: Arc<RgbaImage>,
}

#[derive(Debug, Clone)]
pub struct ImageFailed {
    pub slot: usize,
    pub generation: u64,
    pub source: ImageSource,
    pub reason: String,
}

/// Loader → viewer.
#[derive(Debug, Clone)]
pub enum LoaderEvent {
    Loaded(ImageLoaded),
    Failed(ImageFailed),
}
