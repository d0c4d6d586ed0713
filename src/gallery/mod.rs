//! Renderer-independent carousel core.

pub mod ease;
pub mod engine;
pub mod geometry;
pub mod item;
pub mod scroll;
pub mod simulate;

pub use engine::{CarouselEngine, EngineSettings, FrameView, GalleryEntry, InputState, LoadRequest, SnapTimer};
pub use geometry::{Camera, ItemLayout, ScreenSize, ViewportGeometry};
pub use item::{Caption, GalleryItem, ImageMeta, ItemTransform};
pub use scroll::{Direction, ScrollState};
