//! Per-item spatial state of the carousel ring.

use std::sync::Arc;

use crate::config::ImageSource;
use crate::label::LabelBitmap;

use super::geometry::{ItemLayout, ViewportGeometry};
use super::scroll::{Direction, ScrollState};

/// Smallest focus scale, reached at `0.8 ×` half the viewport width.
pub const MIN_SCALE: f32 = 0.7;
/// Opacity floor for items far from center.
pub const MIN_OPACITY: f32 = 0.3;
/// Caption height relative to the item plane height.
pub const CAPTION_HEIGHT_FRACTION: f32 = 0.08;
/// Gap between the item's bottom edge and its caption, relative to caption height.
pub const CAPTION_GAP_FRACTION: f32 = 0.8;

const DEPTH_PER_UNIT: f32 = 0.001;
const TILT_PER_UNIT: f32 = 0.0003;

/// Linear focus scale: 1.0 at center, [`MIN_SCALE`] at `0.8 × half_viewport`.
pub fn focus_scale(distance: f32, half_viewport: f32) -> f32 {
    let falloff = 0.8 * half_viewport;
    if falloff <= 0.0 {
        return if distance <= 0.0 { 1.0 } else { MIN_SCALE };
    }
    let t = distance / falloff;
    (1.0 - (1.0 - MIN_SCALE) * t).clamp(MIN_SCALE, 1.0)
}

/// Quadratic focus opacity, clamped to `[MIN_OPACITY, 1]`.
pub fn focus_opacity(distance: f32, half_viewport: f32) -> f32 {
    let falloff = 1.2 * half_viewport;
    if falloff <= 0.0 {
        return if distance <= 0.0 { 1.0 } else { MIN_OPACITY };
    }
    let t = distance / falloff;
    (1.0 - t * t * 0.5).clamp(MIN_OPACITY, 1.0)
}

/// Values derived from the scroll state every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemTransform {
    pub x: f32,
    pub z: f32,
    pub scale: f32,
    pub opacity: f32,
    pub rotation_y: f32,
}

impl Default for ItemTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            z: 0.0,
            scale: 1.0,
            opacity: 1.0,
            rotation_y: 0.0,
        }
    }
}

/// Caption surface attached below an item. Sizes are in the parent's unscaled units.
#[derive(Debug, Clone)]
pub struct Caption {
    pub label: Arc<LabelBitmap>,
    pub width: f32,
    pub height: f32,
    /// Vertical offset of the caption centre from the item centre.
    pub offset_y: f32,
}

impl Caption {
    fn new(label: Arc<LabelBitmap>) -> Self {
        Self {
            label,
            width: 0.0,
            height: 0.0,
            offset_y: 0.0,
        }
    }

    fn layout(&mut self, plane_height: f32) {
        self.height = plane_height * CAPTION_HEIGHT_FRACTION;
        self.width = self.height * self.label.aspect();
        let gap = self.height * CAPTION_GAP_FRACTION;
        self.offset_y = -(plane_height / 2.0 + gap + self.height / 2.0);
    }
}

/// Natural size of the item's image; zero until the asynchronous load lands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
}

impl ImageMeta {
    pub fn is_loaded(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// One entry of the doubled ring.
#[derive(Debug, Clone)]
pub struct GalleryItem {
    index: usize,
    length: usize,
    source: ImageSource,
    viewport: ViewportGeometry,
    layout: ItemLayout,
    base_x: f32,
    ring_width: f32,
    /// Whole ring widths this item has been displaced by.
    wraps: i64,
    transform: ItemTransform,
    image: ImageMeta,
    generation: u64,
    caption: Option<Caption>,
}

impl GalleryItem {
    pub fn new(
        index: usize,
        length: usize,
        source: ImageSource,
        label: Option<Arc<LabelBitmap>>,
        viewport: ViewportGeometry,
    ) -> Self {
        let layout = ItemLayout::compute(&viewport);
        let mut item = Self {
            index,
            length,
            source,
            viewport,
            layout,
            base_x: 0.0,
            ring_width: 0.0,
            wraps: 0,
            transform: ItemTransform::default(),
            image: ImageMeta::default(),
            generation: 0,
            caption: label.map(Caption::new),
        };
        item.on_resize(viewport);
        item
    }

    /// Recomputes plane size, spacing and home position for a new viewport.
    pub fn on_resize(&mut self, viewport: ViewportGeometry) {
        self.viewport = viewport;
        self.layout = ItemLayout::compute(&viewport);
        self.ring_width = self.layout.ring_width(self.length);
        self.base_x = self.layout.item_width * self.index as f32;
        if let Some(caption) = self.caption.as_mut() {
            caption.layout(self.layout.plane_height);
        }
    }

    /// Recomputes position, focus and wrap for this frame's scroll state.
    pub fn update(&mut self, scroll: &ScrollState, direction: Direction) {
        let x = self.world_x(scroll.current);
        let distance = x.abs();
        let half_viewport = self.viewport.half_width();
        self.transform = ItemTransform {
            x,
            z: -distance * DEPTH_PER_UNIT,
            scale: focus_scale(distance, half_viewport),
            opacity: focus_opacity(distance, half_viewport),
            rotation_y: -x * TILT_PER_UNIT,
        };
        self.wrap(scroll.current, direction);
    }

    /// `baseX − current − wrapOffset`.
    pub fn world_x(&self, current: f32) -> f32 {
        self.base_x - current - self.wrap_offset()
    }

    /// Moves the item to the opposite side of the ring once it has fully left the
    /// viewport in the direction of travel.
    ///
    /// A jump of several ring widths in one frame resolves in a single step.
    fn wrap(&mut self, current: f32, direction: Direction) {
        if !(self.ring_width.is_finite() && self.ring_width > 0.0) {
            return;
        }
        let x = self.world_x(current);
        if !x.is_finite() {
            return;
        }
        let half = self.layout.item_width / 2.0;
        let bound = self.viewport.half_width() + self.layout.item_width;
        let rings = match direction {
            Direction::Right => {
                let excess = -bound - (x + half);
                if excess > 0.0 {
                    -(excess / self.ring_width).ceil()
                } else {
                    0.0
                }
            }
            Direction::Left => {
                let excess = (x - half) - bound;
                if excess > 0.0 {
                    (excess / self.ring_width).ceil()
                } else {
                    0.0
                }
            }
        };
        if rings == 0.0 {
            return;
        }
        self.wraps += rings as i64;
        // rounding can leave the edge a hair past the bound
        match direction {
            Direction::Right if self.is_before(current) => self.wraps -= 1,
            Direction::Left if self.is_after(current) => self.wraps += 1,
            _ => {}
        }
    }

    pub fn wrap_offset(&self) -> f32 {
        self.wraps as f32 * self.ring_width
    }

    pub fn wraps(&self) -> i64 {
        self.wraps
    }

    /// Whether the item's right edge is past the left wrap bound.
    pub fn is_before(&self, current: f32) -> bool {
        let x = self.world_x(current);
        x + self.layout.item_width / 2.0 < -(self.viewport.half_width() + self.layout.item_width)
    }

    /// Whether the item's left edge is past the right wrap bound.
    pub fn is_after(&self, current: f32) -> bool {
        let x = self.world_x(current);
        x - self.layout.item_width / 2.0 > self.viewport.half_width() + self.layout.item_width
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn layout(&self) -> &ItemLayout {
        &self.layout
    }

    pub fn base_x(&self) -> f32 {
        self.base_x
    }

    pub fn ring_width(&self) -> f32 {
        self.ring_width
    }

    pub fn item_width(&self) -> f32 {
        self.layout.item_width
    }

    pub fn transform(&self) -> &ItemTransform {
        &self.transform
    }

    pub fn caption(&self) -> Option<&Caption> {
        self.caption.as_ref()
    }

    pub fn image(&self) -> ImageMeta {
        self.image
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Records a finished image load if it belongs to the current generation.
    pub fn apply_image(&mut self, generation: u64, width: u32, height: u32) -> bool {
        if generation != self.generation {
            return false;
        }
        self.image = ImageMeta { width, height };
        true
    }

    /// Invalidates in-flight loads so their completions become no-ops.
    pub(crate) fn retire(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::geometry::{Camera, ScreenSize};

    fn viewport() -> ViewportGeometry {
        ViewportGeometry::compute(ScreenSize::new(1280, 720), &Camera::default())
    }

    #[test]
    fn focus_is_full_at_center_and_clamped_far_away() {
        assert_eq!(focus_scale(0.0, 10.0), 1.0);
        assert_eq!(focus_opacity(0.0, 10.0), 1.0);
        assert!((focus_scale(8.0, 10.0) - MIN_SCALE).abs() < 1e-6);
        assert!((focus_scale(4.0, 10.0) - 0.85).abs() < 1e-6);
        assert!((focus_opacity(12.0, 10.0) - 0.5).abs() < 1e-6);
        assert_eq!(focus_scale(1000.0, 10.0), MIN_SCALE);
        assert_eq!(focus_opacity(1000.0, 10.0), MIN_OPACITY);
    }

    #[test]
    fn resize_places_item_at_home() {
        let vp = viewport();
        let item = GalleryItem::new(3, 6, ImageSource::Placeholder(0), None, vp);
        let layout = ItemLayout::compute(&vp);
        assert_eq!(item.base_x(), layout.item_width * 3.0);
        assert_eq!(item.ring_width(), layout.item_width * 6.0);
    }

    #[test]
    fn update_derives_transform_from_scroll() {
        let vp = viewport();
        let mut item = GalleryItem::new(1, 6, ImageSource::Placeholder(1), None, vp);
        let mut scroll = ScrollState::new(0.08);
        scroll.current = item.base_x();
        item.update(&scroll, Direction::Right);
        let t = *item.transform();
        assert_eq!(t.x, 0.0);
        assert_eq!(t.scale, 1.0);
        assert_eq!(t.opacity, 1.0);
        assert_eq!(t.z, 0.0);

        scroll.current = item.base_x() - 2.0;
        item.update(&scroll, Direction::Left);
        let t = *item.transform();
        assert!((t.x - 2.0).abs() < 1e-5);
        assert!((t.rotation_y + 2.0 * 0.0003).abs() < 1e-7);
        assert!((t.z + 0.002).abs() < 1e-7);
    }

    #[test]
    fn wraps_to_far_side_when_leaving_left_edge() {
        let vp = viewport();
        let mut item = GalleryItem::new(0, 6, ImageSource::Placeholder(0), None, vp);
        let mut scroll = ScrollState::new(0.08);
        // push the item well past the left bound
        scroll.current = vp.half_width() + item.item_width() * 2.0;
        item.update(&scroll, Direction::Right);
        assert_eq!(item.wraps(), -1);
        assert!(!item.is_before(scroll.current));
        assert!(item.world_x(scroll.current) > 0.0);
    }

    #[test]
    fn wrong_direction_does_not_wrap() {
        let vp = viewport();
        let mut item = GalleryItem::new(0, 6, ImageSource::Placeholder(0), None, vp);
        let mut scroll = ScrollState::new(0.08);
        scroll.current = vp.half_width() + item.item_width() * 2.0;
        item.update(&scroll, Direction::Left);
        assert_eq!(item.wraps(), 0);
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut item = GalleryItem::new(0, 2, ImageSource::Placeholder(0), None, viewport());
        let generation = item.generation();
        item.retire();
        assert!(!item.apply_image(generation, 640, 480));
        assert!(!item.image().is_loaded());
        assert!(item.apply_image(item.generation(), 640, 480));
        assert!(item.image().is_loaded());
    }
}
