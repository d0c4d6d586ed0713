pub mod config;
pub mod error;
pub mod events;
pub mod gallery;
pub mod label;
pub mod render;
pub mod tasks {
    pub mod library;
    pub mod loader;
    pub mod viewer;
}

pub use error::GalleryError;
