//! Screen, camera and viewport geometry shared by every gallery item.

use crate::error::GalleryError;

/// Perspective camera looking down -Z from `(0, 0, distance)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view, degrees.
    pub fov_degrees: f32,
    /// Distance from the item plane.
    pub distance: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            distance: 20.0,
        }
    }
}

impl Camera {
    pub fn fov_radians(&self) -> f32 {
        self.fov_degrees.to_radians()
    }

    pub fn validate(&self) -> Result<(), GalleryError> {
        if !(self.fov_degrees.is_finite() && self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(GalleryError::InvalidGeometry(format!(
                "camera fov must be within (0, 180) degrees, got {}",
                self.fov_degrees
            )));
        }
        if !(self.distance.is_finite() && self.distance > 0.0) {
            return Err(GalleryError::InvalidGeometry(format!(
                "camera distance must be positive, got {}",
                self.distance
            )));
        }
        Ok(())
    }
}

/// Pixel size of the rendering surface. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    /// Clamps both dimensions to at least one pixel so aspect math stays finite.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Screen size plus the world-space extent visible at the item plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
    pub screen: ScreenSize,
    pub width: f32,
    pub height: f32,
}

impl ViewportGeometry {
    pub fn compute(screen: ScreenSize, camera: &Camera) -> Self {
        let height = 2.0 * (camera.fov_radians() / 2.0).tan() * camera.distance;
        let width = height * screen.aspect();
        Self {
            screen,
            width,
            height,
        }
    }

    pub fn half_width(&self) -> f32 {
        self.width / 2.0
    }
}

/// Size multiplier applied to items on narrow screens.
pub fn responsive_multiplier(screen_width: u32) -> f32 {
    if screen_width < 768 {
        0.85
    } else if screen_width < 1024 {
        0.9
    } else {
        1.0
    }
}

/// Negative spacing between neighbours, as a fraction of item width.
pub fn padding_fraction(screen_width: u32) -> f32 {
    if screen_width < 768 { -0.3 } else { -0.2 }
}

/// Item plane size and spacing derived from the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemLayout {
    /// Plane width before the per-frame focus scale.
    pub plane_width: f32,
    /// Plane height before the per-frame focus scale.
    pub plane_height: f32,
    pub padding: f32,
    /// Distance between neighbouring item centres.
    pub item_width: f32,
}

impl ItemLayout {
    pub fn compute(viewport: &ViewportGeometry) -> Self {
        let multiplier = responsive_multiplier(viewport.screen.width);
        let plane_height = viewport.height * 0.7 * multiplier;
        let plane_width = plane_height * 0.8;
        let padding = plane_width * padding_fraction(viewport.screen.width);
        Self {
            plane_width,
            plane_height,
            padding,
            item_width: plane_width + padding,
        }
    }

    /// Width of the whole ring of `length` items.
    pub fn ring_width(&self, length: usize) -> f32 {
        self.item_width * length as f32
    }
}
