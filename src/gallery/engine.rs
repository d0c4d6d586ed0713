//! The carousel engine: scroll physics, input state machine and the frame loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::config::ImageSource;
use crate::label::LabelBitmap;

use super::geometry::{Camera, ScreenSize, ViewportGeometry};
use super::item::GalleryItem;
use super::scroll::{Direction, ScrollState};

/// Drag sensitivity in world units per pixel, before the speed multiplier.
pub const DRAG_FACTOR: f32 = 0.003;
/// Target change per wheel notch, before the speed multiplier.
pub const WHEEL_FACTOR: f32 = 0.05;

/// Tunables for the engine, usually taken from the configuration file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub scroll_speed: f32,
    pub scroll_ease: f32,
    pub snap_delay: Duration,
    pub camera: Camera,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scroll_speed: 1.5,
            scroll_ease: 0.08,
            snap_delay: Duration::from_millis(100),
            camera: Camera::default(),
        }
    }
}

/// One distinct source image with its optional caption.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub source: ImageSource,
    pub caption: Option<Arc<LabelBitmap>>,
}

impl GalleryEntry {
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            caption: None,
        }
    }

    /// Built-in stand-ins used when no content is configured.
    pub fn placeholders() -> Vec<Self> {
        (0..3).map(|n| Self::new(ImageSource::Placeholder(n))).collect()
    }
}

/// Pointer interaction state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputState {
    Idle,
    Dragging { start_x: f32, start_scroll: f32 },
}

/// Restart-on-activity deadline for the post-wheel snap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapTimer {
    deadline: Option<Instant>,
}

impl SnapTimer {
    /// Replaces any pending deadline.
    pub fn arm(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns `true` exactly once, when `now` reaches the deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Request for the loader to fetch one item's image.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub slot: usize,
    pub generation: u64,
    pub source: ImageSource,
}

/// Read-only view of one frame, handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub scroll: &'a ScrollState,
    pub direction: Direction,
    pub viewport: &'a ViewportGeometry,
    pub camera: &'a Camera,
    pub items: &'a [GalleryItem],
}

/// Owns the ring, the scroll state and the interaction state machine.
#[derive(Debug)]
pub struct CarouselEngine {
    settings: EngineSettings,
    scroll: ScrollState,
    viewport: ViewportGeometry,
    items: Vec<GalleryItem>,
    input: InputState,
    snap_timer: SnapTimer,
    alive: bool,
    frames: u64,
}

impl CarouselEngine {
    /// Mounts the gallery: doubles `entries` into the ring and lays out every item.
    ///
    /// An empty list is replaced by [`GalleryEntry::placeholders`].
    pub fn new(settings: EngineSettings, entries: Vec<GalleryEntry>, screen: ScreenSize) -> Self {
        let entries = if entries.is_empty() {
            GalleryEntry::placeholders()
        } else {
            entries
        };
        let viewport = ViewportGeometry::compute(screen, &settings.camera);
        let length = entries.len() * 2;
        let items = entries
            .iter()
            .chain(entries.iter())
            .enumerate()
            .map(|(index, entry)| {
                GalleryItem::new(index, length, entry.source.clone(), entry.caption.clone(), viewport)
            })
            .collect::<Vec<_>>();
        info!(
            items = length,
            width = screen.width,
            height = screen.height,
            "gallery mounted"
        );
        Self {
            settings,
            scroll: ScrollState::new(settings.scroll_ease),
            viewport,
            items,
            input: InputState::Idle,
            snap_timer: SnapTimer::default(),
            alive: true,
            frames: 0,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn scroll(&self) -> &ScrollState {
        &self.scroll
    }

    pub fn viewport(&self) -> &ViewportGeometry {
        &self.viewport
    }

    pub fn items(&self) -> &[GalleryItem] {
        &self.items
    }

    pub fn input(&self) -> InputState {
        self.input
    }

    pub fn snap_pending(&self) -> bool {
        self.snap_timer.is_armed()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Spacing between item centres; every item shares it.
    pub fn item_width(&self) -> f32 {
        self.items.first().map_or(0.0, GalleryItem::item_width)
    }

    /// Sets the scroll target directly, e.g. for scripted runs.
    pub fn set_target(&mut self, target: f32) {
        self.scroll.target = target;
    }

    pub fn pointer_down(&mut self, x: f32) {
        if !self.alive {
            return;
        }
        self.input = InputState::Dragging {
            start_x: x,
            start_scroll: self.scroll.current,
        };
        trace!(x, "drag started");
    }

    pub fn pointer_move(&mut self, x: f32) {
        if let InputState::Dragging {
            start_x,
            start_scroll,
        } = self.input
        {
            let distance = (start_x - x) * DRAG_FACTOR * self.settings.scroll_speed;
            self.scroll.target = start_scroll + distance;
        }
    }

    pub fn pointer_up(&mut self) {
        if matches!(self.input, InputState::Dragging { .. }) {
            self.input = InputState::Idle;
            self.snap();
        }
    }

    /// Nudges the target one notch and restarts the snap debounce.
    pub fn wheel(&mut self, delta_y: f32, now: Instant) {
        if !self.alive || delta_y == 0.0 || !delta_y.is_finite() {
            return;
        }
        self.scroll.target += delta_y.signum() * self.settings.scroll_speed * WHEEL_FACTOR;
        self.snap_timer.arm(now + self.settings.snap_delay);
    }

    /// Rounds the target to the nearest whole item.
    pub fn snap(&mut self) {
        let width = self.item_width();
        self.scroll.snap(width);
        trace!(target = self.scroll.target, "snapped");
    }

    /// Propagates new screen geometry to every item.
    ///
    /// Scroll offsets are rescaled by the change in item width so the item in
    /// focus stays in focus.
    pub fn resize(&mut self, screen: ScreenSize) {
        let old_width = self.item_width();
        self.viewport = ViewportGeometry::compute(screen, &self.settings.camera);
        for item in &mut self.items {
            item.on_resize(self.viewport);
        }
        let new_width = self.item_width();
        if old_width > 0.0 && new_width > 0.0 && old_width != new_width {
            let ratio = new_width / old_width;
            self.scroll.current *= ratio;
            self.scroll.target *= ratio;
            self.scroll.last *= ratio;
            if let InputState::Dragging { start_scroll, .. } = &mut self.input {
                *start_scroll *= ratio;
            }
        }
        debug!(
            width = screen.width,
            height = screen.height,
            item_width = new_width,
            "gallery resized"
        );
    }

    /// Runs one animation frame: ease, update items, render, commit.
    ///
    /// Returns `None` once the engine has been torn down.
    pub fn frame<R>(&mut self, now: Instant, render: impl FnOnce(FrameView<'_>) -> R) -> Option<R> {
        if !self.alive {
            return None;
        }
        if self.snap_timer.poll(now) {
            self.snap();
        }
        self.scroll.advance();
        let direction = self.scroll.direction();
        for item in &mut self.items {
            item.update(&self.scroll, direction);
        }
        let out = render(FrameView {
            scroll: &self.scroll,
            direction,
            viewport: &self.viewport,
            camera: &self.settings.camera,
            items: &self.items,
        });
        self.scroll.commit();
        self.frames += 1;
        Some(out)
    }

    /// Load requests for every item, tagged with its current generation.
    pub fn load_requests(&self) -> Vec<LoadRequest> {
        self.items
            .iter()
            .enumerate()
            .map(|(slot, item)| LoadRequest {
                slot,
                generation: item.generation(),
                source: item.source().clone(),
            })
            .collect()
    }

    /// Applies a finished image load. Stale or post-teardown completions are dropped.
    pub fn apply_image(&mut self, slot: usize, generation: u64, width: u32, height: u32) -> bool {
        if !self.alive {
            debug!(slot, "image load finished after teardown; ignored");
            return false;
        }
        let Some(item) = self.items.get_mut(slot) else {
            return false;
        };
        let applied = item.apply_image(generation, width, height);
        if !applied {
            debug!(slot, generation, "stale image load ignored");
        }
        applied
    }

    /// Stops the engine. Safe to call more than once.
    pub fn teardown(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.snap_timer.cancel();
        self.input = InputState::Idle;
        for item in &mut self.items {
            item.retire();
        }
        info!(frames = self.frames, "gallery torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> CarouselEngine {
        CarouselEngine::new(
            EngineSettings::default(),
            GalleryEntry::placeholders(),
            ScreenSize::new(1280, 720),
        )
    }

    #[test]
    fn ring_is_doubled() {
        let engine = engine();
        assert_eq!(engine.items().len(), 6);
        assert_eq!(engine.items()[4].source(), &ImageSource::Placeholder(1));
        assert!(engine.items().iter().all(|item| item.length() == 6));
    }

    #[test]
    fn empty_entries_fall_back_to_placeholders() {
        let engine = CarouselEngine::new(EngineSettings::default(), Vec::new(), ScreenSize::new(800, 600));
        assert_eq!(engine.items().len(), 6);
    }

    #[test]
    fn drag_moves_target_and_release_snaps() {
        let mut engine = engine();
        engine.pointer_down(500.0);
        engine.pointer_move(100.0);
        let expected = 400.0 * DRAG_FACTOR * 1.5;
        assert!((engine.scroll().target - expected).abs() < 1e-6);
        engine.pointer_up();
        assert_eq!(engine.input(), InputState::Idle);
        let width = engine.item_width();
        let snapped = engine.scroll().target;
        assert!((snapped / width - (snapped / width).round()).abs() < 1e-5);
    }

    #[test]
    fn move_without_press_is_ignored() {
        let mut engine = engine();
        engine.pointer_move(100.0);
        assert_eq!(engine.scroll().target, 0.0);
        engine.pointer_up();
        assert_eq!(engine.scroll().target, 0.0);
    }

    #[test]
    fn snap_timer_restarts_on_activity() {
        let t0 = Instant::now();
        let mut timer = SnapTimer::default();
        timer.arm(t0 + Duration::from_millis(100));
        assert!(!timer.poll(t0 + Duration::from_millis(50)));
        timer.arm(t0 + Duration::from_millis(150));
        assert!(!timer.poll(t0 + Duration::from_millis(120)));
        assert!(timer.poll(t0 + Duration::from_millis(150)));
        assert!(!timer.poll(t0 + Duration::from_millis(400)));
    }

    #[test]
    fn frame_stops_after_teardown() {
        let mut engine = engine();
        assert!(engine.frame(Instant::now(), |_| ()).is_some());
        engine.teardown();
        engine.teardown();
        assert!(engine.frame(Instant::now(), |_| ()).is_none());
        assert!(!engine.snap_pending());
    }

    #[test]
    fn loads_after_teardown_are_dropped() {
        let mut engine = engine();
        let requests = engine.load_requests();
        assert_eq!(requests.len(), 6);
        assert!(engine.apply_image(0, requests[0].generation, 10, 10));
        engine.teardown();
        assert!(!engine.apply_image(1, requests[1].generation, 10, 10));
        assert!(!engine.items()[1].image().is_loaded());
    }

    #[test]
    fn resize_keeps_focused_item() {
        let mut engine = engine();
        let width = engine.item_width();
        engine.set_target(width * 2.0);
        for _ in 0..400 {
            engine.frame(Instant::now(), |_| ());
        }
        engine.resize(ScreenSize::new(700, 900));
        let new_width = engine.item_width();
        assert!((engine.scroll().target - new_width * 2.0).abs() < 1e-3);
    }
}
