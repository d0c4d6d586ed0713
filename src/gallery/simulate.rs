//! Headless frame driver for dry runs.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use super::engine::CarouselEngine;
use super::geometry::ScreenSize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationOptions {
    pub frames: u64,
    pub screen: ScreenSize,
    /// Wheel delta injected before the first frame.
    pub wheel: Option<f32>,
    pub frame_interval: Duration,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            frames: 60,
            screen: ScreenSize::new(1280, 720),
            wheel: None,
            frame_interval: Duration::from_millis(16),
        }
    }
}

/// Rendered state of one item after the last simulated frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemSnapshot {
    pub index: usize,
    pub x: f32,
    pub z: f32,
    pub scale: f32,
    pub opacity: f32,
    pub wraps: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub frames: u64,
    pub current: f32,
    pub target: f32,
    pub item_width: f32,
    pub items: Vec<ItemSnapshot>,
}

/// Drives `engine` on a synthetic clock and captures the final layout.
///
/// Frames are timestamped `start + n × frame_interval`, so debounce timers
/// fire deterministically.
pub fn simulate(engine: &mut CarouselEngine, options: &SimulationOptions) -> SimulationReport {
    let start = Instant::now();
    engine.resize(options.screen);
    if let Some(delta) = options.wheel {
        engine.wheel(delta, start);
    }

    let mut items = Vec::new();
    for n in 0..options.frames {
        let now = start + options.frame_interval.saturating_mul(n.min(u32::MAX as u64) as u32);
        let rendered = engine.frame(now, |view| {
            view.items
                .iter()
                .map(|item| {
                    let t = item.transform();
                    ItemSnapshot {
                        index: item.index(),
                        x: t.x,
                        z: t.z,
                        scale: t.scale,
                        opacity: t.opacity,
                        wraps: item.wraps(),
                    }
                })
                .collect::<Vec<_>>()
        });
        match rendered {
            Some(snapshot) => items = snapshot,
            None => break,
        }
    }
    debug!(frames = engine.frames(), "simulation finished");

    SimulationReport {
        frames: engine.frames(),
        current: engine.scroll().current,
        target: engine.scroll().target,
        item_width: engine.item_width(),
        items,
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "frames={} current={:.4} target={:.4} item-width={:.4}",
            self.frames, self.current, self.target, self.item_width
        )?;
        for item in &self.items {
            writeln!(
                f,
                "  #{:<3} x={:>9.4} z={:>8.5} scale={:.3} opacity={:.3} wraps={}",
                item.index, item.x, item.z, item.scale, item.opacity, item.wraps
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::engine::{EngineSettings, GalleryEntry};

    #[test]
    fn single_wheel_tick_snaps_back() {
        let mut engine = CarouselEngine::new(
            EngineSettings::default(),
            GalleryEntry::placeholders(),
            ScreenSize::new(1280, 720),
        );
        let options = SimulationOptions {
            frames: 30,
            wheel: Some(100.0),
            ..SimulationOptions::default()
        };
        let report = simulate(&mut engine, &options);
        assert_eq!(report.frames, 30);
        assert_eq!(report.target, 0.0);
        assert_eq!(report.items.len(), 6);
        assert!(report.to_string().starts_with("frames=30"));
    }
}
