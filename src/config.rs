use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use palette::{LinSrgba, Srgb, Srgba};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::error::GalleryError;
use crate::gallery::{Camera, EngineSettings};
use crate::label::FontSpec;

const PLACEHOLDER_PREFIX: &str = "placeholder:";

/// Where an item's image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    /// A file on disk.
    Path(PathBuf),
    /// A synthetic gradient tile, numbered so neighbours differ.
    Placeholder(u32),
}

impl ImageSource {
    pub fn parse(raw: &str) -> Result<Self, GalleryError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(GalleryError::Config("image source must not be empty".into()));
        }
        if let Some(n) = raw.strip_prefix(PLACEHOLDER_PREFIX) {
            let n = n
                .parse()
                .map_err(|_| GalleryError::Config(format!("invalid placeholder index in {raw:?}")))?;
            return Ok(Self::Placeholder(n));
        }
        let path = raw.strip_prefix("file://").unwrap_or(raw);
        Ok(Self::Path(PathBuf::from(path)))
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Placeholder(n) => write!(f, "{PLACEHOLDER_PREFIX}{n}"),
        }
    }
}

impl<'de> Deserialize<'de> for ImageSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

/// An sRGB colour written as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexColor(Srgba<u8>);

impl HexColor {
    pub const WHITE: Self = Self(Srgba::new(255, 255, 255, 255));
    pub const BLACK: Self = Self(Srgba::new(0, 0, 0, 255));

    pub fn rgba(&self) -> [u8; 4] {
        [self.0.red, self.0.green, self.0.blue, self.0.alpha]
    }

    pub fn linear(&self) -> LinSrgba<f32> {
        let rgba: Srgba<f32> = self.0.into_format();
        rgba.into_linear()
    }
}

impl FromStr for HexColor {
    type Err = GalleryError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if let Ok(rgba) = Srgba::<u8>::from_str(trimmed) {
            return Ok(Self(rgba));
        }
        let rgb = Srgb::<u8>::from_str(trimmed)
            .map_err(|_| GalleryError::Config(format!("invalid hex colour {input:?}")))?;
        Ok(Self(Srgba::new(rgb.red, rgb.green, rgb.blue, 255)))
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Deserializes the CSS-like font shorthand.
fn deserialize_font<'de, D>(deserializer: D) -> Result<FontSpec, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(de::Error::custom)
}

/// One configured gallery entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GalleryItemConfig {
    pub image: ImageSource,
    #[serde(default)]
    pub text: Option<String>,
}

impl GalleryItemConfig {
    /// Built-in content shown when nothing else is configured.
    pub fn placeholders() -> Vec<Self> {
        ["Bridge", "Desk Setup", "Waterfall"]
            .into_iter()
            .enumerate()
            .map(|(n, text)| Self {
                image: ImageSource::Placeholder(n as u32),
                text: Some(text.to_string()),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CameraConfig {
    #[serde(default = "CameraConfig::default_fov_degrees")]
    pub fov_degrees: f32,
    #[serde(default = "CameraConfig::default_distance")]
    pub distance: f32,
}

impl CameraConfig {
    const fn default_fov_degrees() -> f32 {
        45.0
    }

    const fn default_distance() -> f32 {
        20.0
    }

    pub fn camera(&self) -> Camera {
        Camera {
            fov_degrees: self.fov_degrees,
            distance: self.distance,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: Self::default_fov_degrees(),
            distance: Self::default_distance(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct WindowConfig {
    #[serde(default = "WindowConfig::default_title")]
    pub title: String,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default = "WindowConfig::default_background")]
    pub background: HexColor,
}

impl WindowConfig {
    fn default_title() -> String {
        "Circular Gallery".to_string()
    }

    const fn default_background() -> HexColor {
        HexColor::BLACK
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            fullscreen: false,
            background: Self::default_background(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LoaderConfig {
    /// Maximum number of images decoded in parallel.
    #[serde(default = "LoaderConfig::default_max_concurrent_decodes")]
    pub max_concurrent_decodes: usize,
    /// Longest side of a decoded image, in pixels; larger images are downscaled.
    #[serde(default = "LoaderConfig::default_max_texture_dim")]
    pub max_texture_dim: u32,
}

impl LoaderConfig {
    const fn default_max_concurrent_decodes() -> usize {
        4
    }

    const fn default_max_texture_dim() -> u32 {
        2048
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_decodes: Self::default_max_concurrent_decodes(),
            max_texture_dim: Self::default_max_texture_dim(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Configuration {
    /// Ordered gallery content. Empty falls back to `library-path`, then placeholders.
    #[serde(default)]
    pub items: Vec<GalleryItemConfig>,
    /// Directory scanned recursively for images when `items` is empty.
    #[serde(default)]
    pub library_path: Option<PathBuf>,
    #[serde(default = "Configuration::default_text_color")]
    pub text_color: HexColor,
    /// Corner rounding in UV units.
    #[serde(default = "Configuration::default_border_radius")]
    pub border_radius: f32,
    #[serde(default, deserialize_with = "deserialize_font")]
    pub font: FontSpec,
    /// Multiplier on drag and wheel sensitivity.
    #[serde(default = "Configuration::default_scroll_speed")]
    pub scroll_speed: f32,
    /// Per-frame lerp factor for the scroll position.
    #[serde(default = "Configuration::default_scroll_ease")]
    pub scroll_ease: f32,
    /// Quiet period after the last wheel event before snapping.
    #[serde(default = "Configuration::default_snap_delay", with = "humantime_serde")]
    pub snap_delay: Duration,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            library_path: None,
            text_color: Self::default_text_color(),
            border_radius: Self::default_border_radius(),
            font: FontSpec::default(),
            scroll_speed: Self::default_scroll_speed(),
            scroll_ease: Self::default_scroll_ease(),
            snap_delay: Self::default_snap_delay(),
            camera: CameraConfig::default(),
            window: WindowConfig::default(),
            loader: LoaderConfig::default(),
        }
    }
}

impl Configuration {
    const fn default_text_color() -> HexColor {
        HexColor::WHITE
    }

    const fn default_border_radius() -> f32 {
        0.05
    }

    const fn default_scroll_speed() -> f32 {
        1.5
    }

    const fn default_scroll_ease() -> f32 {
        0.08
    }

    const fn default_snap_delay() -> Duration {
        Duration::from_millis(100)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, GalleryError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, GalleryError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&s)
    }

    /// Validates ranges that serde cannot express.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            (0.0..=0.5).contains(&self.border_radius),
            "border-radius must be within [0, 0.5]"
        );
        ensure!(
            self.scroll_speed.is_finite() && self.scroll_speed > 0.0,
            "scroll-speed must be positive"
        );
        ensure!(
            self.scroll_ease > 0.0 && self.scroll_ease <= 1.0,
            "scroll-ease must be within (0, 1]"
        );
        ensure!(
            self.loader.max_concurrent_decodes > 0,
            "loader.max-concurrent-decodes must be greater than zero"
        );
        ensure!(
            self.loader.max_texture_dim > 0,
            "loader.max-texture-dim must be greater than zero"
        );
        self.camera
            .camera()
            .validate()
            .context("invalid camera configuration")?;
        Ok(self)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            scroll_speed: self.scroll_speed,
            scroll_ease: self.scroll_ease,
            snap_delay: self.snap_delay,
            camera: self.camera.camera(),
        }
    }

    /// The items to mount: configured items, else a library scan, else placeholders.
    pub fn effective_items(&self) -> Result<Vec<GalleryItemConfig>> {
        if !self.items.is_empty() {
            return Ok(self.items.clone());
        }
        if let Some(root) = &self.library_path {
            let scanned = crate::tasks::library::scan(root)
                .with_context(|| format!("failed to scan library at {}", root.display()))?;
            if !scanned.is_empty() {
                return Ok(scanned);
            }
            tracing::warn!(path = %root.display(), "library contains no images; using placeholders");
        }
        Ok(GalleryItemConfig::placeholders())
    }
}
