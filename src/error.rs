use thiserror::Error;

/// Library error type for gallery operations.
#[derive(Debug, Error)]
pub enum GalleryError {
    /// A configuration value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// An image could not be decoded.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Screen or camera geometry that cannot produce a viewport.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}
