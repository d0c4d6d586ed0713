//! Offscreen caption rasterization.
//!
//! Captions are drawn once, at mount, into a straight-alpha RGBA bitmap that
//! the renderer uploads as an ordinary texture.

use std::str::FromStr;
use std::sync::Arc;

use cosmic_text::fontdb::{Database, Family as DbFamily, Query};
use cosmic_text::{Attrs, Buffer, Color, Family, FontSystem, Metrics, Shaping, Style, SwashCache, Weight};
use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::config::GalleryItemConfig;
use crate::error::GalleryError;
use crate::gallery::GalleryEntry;

/// Horizontal padding on each side of the text, pixels.
pub const PADDING_X: u32 = 20;
/// Vertical padding above and below the text, pixels.
pub const PADDING_Y: u32 = 10;
/// Offset of the drop shadow, pixels. The bitmap grows by this much in both axes.
pub const SHADOW_OFFSET: u32 = 2;

const SHADOW_ALPHA: u8 = 140;
const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// A rasterized caption.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelBitmap {
    image: RgbaImage,
}

impl LabelBitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Width over height.
    pub fn aspect(&self) -> f32 {
        self.image.width() as f32 / self.image.height().max(1) as f32
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Generic CSS font family keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontFamily {
    SansSerif,
    Serif,
    Monospace,
    Cursive,
    Fantasy,
    Named(String),
}

/// CSS-like font shorthand: `[italic] [weight] <size>px <family>`.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub size_px: f32,
    pub weight: u16,
    pub italic: bool,
    pub family: FontFamily,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            size_px: 30.0,
            weight: 700,
            italic: false,
            family: FontFamily::SansSerif,
        }
    }
}

impl FontSpec {
    pub fn line_height(&self) -> f32 {
        self.size_px * LINE_HEIGHT_FACTOR
    }
}

impl FromStr for FontSpec {
    type Err = GalleryError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut font = FontSpec::default();
        let mut size = None;
        let mut family_tokens = Vec::new();

        for token in input.split_whitespace() {
            if size.is_some() {
                family_tokens.push(token);
                continue;
            }
            let lower = token.to_ascii_lowercase();
            match lower.as_str() {
                "normal" => font.weight = 400,
                "bold" | "bolder" => font.weight = 700,
                "lighter" => font.weight = 300,
                "italic" | "oblique" => font.italic = true,
                _ => {
                    if let Some(px) = lower.strip_suffix("px") {
                        let value: f32 = px
                            .parse()
                            .map_err(|_| GalleryError::Config(format!("invalid font size {token:?}")))?;
                        if !(value.is_finite() && value > 0.0) {
                            return Err(GalleryError::Config(format!(
                                "font size must be positive, got {token:?}"
                            )));
                        }
                        size = Some(value);
                    } else if let Ok(weight) = lower.parse::<u16>() {
                        if !(100..=900).contains(&weight) {
                            return Err(GalleryError::Config(format!(
                                "font weight must be within 100..=900, got {weight}"
                            )));
                        }
                        font.weight = weight;
                    } else {
                        return Err(GalleryError::Config(format!(
                            "unexpected token {token:?} in font {input:?}"
                        )));
                    }
                }
            }
        }

        font.size_px = size.ok_or_else(|| {
            GalleryError::Config(format!("font {input:?} is missing a pixel size (e.g. 30px)"))
        })?;

        let joined = family_tokens.join(" ");
        let first = joined
            .split(',')
            .map(|name| name.trim().trim_matches(|c| c == '"' || c == '\''))
            .find(|name| !name.is_empty());
        font.family = match first.map(str::to_ascii_lowercase).as_deref() {
            None | Some("sans-serif") => FontFamily::SansSerif,
            Some("serif") => FontFamily::Serif,
            Some("monospace") => FontFamily::Monospace,
            Some("cursive") => FontFamily::Cursive,
            Some("fantasy") => FontFamily::Fantasy,
            Some(_) => FontFamily::Named(first.unwrap_or_default().to_string()),
        };
        Ok(font)
    }
}

/// Owns the font database and glyph cache used to draw captions.
pub struct LabelRasterizer {
    font_system: FontSystem,
    swash_cache: SwashCache,
}

impl std::fmt::Debug for LabelRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelRasterizer").finish_non_exhaustive()
    }
}

impl Default for LabelRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelRasterizer {
    /// Loads the system font database. Expensive; build once per mount.
    pub fn new() -> Self {
        Self {
            font_system: FontSystem::new(),
            swash_cache: SwashCache::new(),
        }
    }

    /// Builds a shared caption bitmap, or `None` when no caption text was given.
    pub fn caption(
        &mut self,
        text: Option<&str>,
        font: &FontSpec,
        color: [u8; 4],
    ) -> Option<Arc<LabelBitmap>> {
        text.map(|text| Arc::new(self.rasterize(text, font, color)))
    }

    /// Draws `text` with a drop shadow into a bitmap sized to fit it plus padding.
    ///
    /// Empty text yields a padding-only bitmap.
    pub fn rasterize(&mut self, text: &str, font: &FontSpec, color: [u8; 4]) -> LabelBitmap {
        let metrics = Metrics::new(font.size_px, font.line_height());
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_size(&mut self.font_system, None, None);

        let family = self.resolve_family(&font.family);
        let mut attrs = Attrs::new()
            .family(family.as_family())
            .weight(Weight(font.weight));
        if font.italic {
            attrs = attrs.style(Style::Italic);
        }
        buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let (text_w, text_h) = measure(&buffer, text);
        let width = text_w + PADDING_X * 2 + SHADOW_OFFSET;
        let height = text_h + PADDING_Y * 2 + SHADOW_OFFSET;
        let mut image = RgbaImage::new(width, height);

        if text_w > 0 {
            let shadow = Color::rgba(0, 0, 0, SHADOW_ALPHA);
            let fill = Color::rgba(color[0], color[1], color[2], color[3]);
            let passes = [
                (shadow, (PADDING_X + SHADOW_OFFSET) as i32, (PADDING_Y + SHADOW_OFFSET) as i32),
                (fill, PADDING_X as i32, PADDING_Y as i32),
            ];
            for (pass_color, ox, oy) in passes {
                buffer.draw(
                    &mut self.font_system,
                    &mut self.swash_cache,
                    pass_color,
                    |x, y, w, h, glyph_color| {
                        for dy in 0..h as i32 {
                            for dx in 0..w as i32 {
                                blend_over(&mut image, ox + x + dx, oy + y + dy, glyph_color);
                            }
                        }
                    },
                );
            }
        }

        debug!(text, width, height, "caption rasterized");
        LabelBitmap { image }
    }

    fn resolve_family(&self, family: &FontFamily) -> OwnedFamily {
        match family {
            FontFamily::SansSerif => OwnedFamily::SansSerif,
            FontFamily::Serif => OwnedFamily::Serif,
            FontFamily::Monospace => OwnedFamily::Monospace,
            FontFamily::Cursive => OwnedFamily::Cursive,
            FontFamily::Fantasy => OwnedFamily::Fantasy,
            FontFamily::Named(name) => {
                if font_available(self.font_system.db(), name) {
                    OwnedFamily::Named(name.clone())
                } else {
                    warn!(font = %name, "caption font missing; falling back to sans-serif");
                    OwnedFamily::SansSerif
                }
            }
        }
    }
}

/// Pairs each configured item with its rasterized caption.
///
/// The font database is only loaded when at least one item has a caption.
pub fn mount_entries(items: &[GalleryItemConfig], font: &FontSpec, color: [u8; 4]) -> Vec<GalleryEntry> {
    let mut rasterizer = items
        .iter()
        .any(|item| item.text.is_some())
        .then(LabelRasterizer::new);
    items
        .iter()
        .map(|item| GalleryEntry {
            source: item.image.clone(),
            caption: rasterizer
                .as_mut()
                .and_then(|r| r.caption(item.text.as_deref(), font, color)),
        })
        .collect()
}

enum OwnedFamily {
    SansSerif,
    Serif,
    Monospace,
    Cursive,
    Fantasy,
    Named(String),
}

impl OwnedFamily {
    fn as_family(&self) -> Family<'_> {
        match self {
            OwnedFamily::SansSerif => Family::SansSerif,
            OwnedFamily::Serif => Family::Serif,
            OwnedFamily::Monospace => Family::Monospace,
            OwnedFamily::Cursive => Family::Cursive,
            OwnedFamily::Fantasy => Family::Fantasy,
            OwnedFamily::Named(name) => Family::Name(name),
        }
    }
}

fn font_available(db: &Database, name: &str) -> bool {
    let query = Query {
        families: &[DbFamily::Name(name)],
        ..Default::default()
    };
    db.query(&query).is_some()
}

fn measure(buffer: &Buffer, text: &str) -> (u32, u32) {
    if text.trim().is_empty() {
        return (0, 0);
    }
    let mut width: f32 = 0.0;
    let mut bottom: f32 = 0.0;
    for run in buffer.layout_runs() {
        width = width.max(run.line_w);
        bottom = bottom.max(run.line_top + run.line_height);
    }
    (width.ceil() as u32, bottom.ceil() as u32)
}

fn blend_over(image: &mut RgbaImage, x: i32, y: i32, src: Color) {
    if x < 0 || y < 0 || x >= image.width() as i32 || y >= image.height() as i32 {
        return;
    }
    let src_a = src.a() as f32 / 255.0;
    if src_a <= 0.0 {
        return;
    }
    let Rgba([dr, dg, db, da]) = *image.get_pixel(x as u32, y as u32);
    let dst_a = da as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    let mix = |s: u8, d: u8| -> u8 {
        let s = s as f32 / 255.0;
        let d = d as f32 / 255.0;
        let out = (s * src_a + d * dst_a * (1.0 - src_a)) / out_a;
        (out * 255.0).round().clamp(0.0, 255.0) as u8
    };
    image.put_pixel(
        x as u32,
        y as u32,
        Rgba([
            mix(src.r(), dr),
            mix(src.g(), dg),
            mix(src.b(), db),
            (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
        ]),
    );
}
