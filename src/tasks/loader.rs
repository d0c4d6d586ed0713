use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::Sender;
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use palette::{FromColor, Hsv, Srgb};
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ImageSource, LoaderConfig};
use crate::error::GalleryError;
use crate::events::{ImageFailed, ImageLoaded, LoadImage, LoaderEvent};

/// Size of a synthesised placeholder tile; matches the item plane aspect.
pub const PLACEHOLDER_SIZE: (u32, u32) = (480, 600);

/// Decodes an image to RGBA8 and applies EXIF orientation if available.
fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage, GalleryError> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgba8();
    let orientation = read_orientation(path).unwrap_or(1);
    Ok(apply_orientation(img, orientation))
}

fn apply_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};
    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = field.value.get_uint(0)? as u16;
    debug!(orientation = o, path = %path.display(), "exif orientation");
    Some(o)
}

/// Shrinks `img` so its longest side is at most `max_dim`. Never upscales.
fn fit_within(img: RgbaImage, max_dim: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    if max_dim == 0 || longest <= max_dim {
        return img;
    }
    let scale = max_dim as f32 / longest as f32;
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    image::imageops::resize(&img, nw, nh, FilterType::Triangle)
}

/// Vertical gradient tile whose hue depends on `n`.
pub fn placeholder_tile(n: u32) -> RgbaImage {
    let (w, h) = PLACEHOLDER_SIZE;
    let hue = (n as f32 * 137.5) % 360.0;
    let top: Srgb = Srgb::from_color(Hsv::new(hue, 0.55, 0.95));
    let bottom: Srgb = Srgb::from_color(Hsv::new((hue + 40.0) % 360.0, 0.75, 0.45));
    RgbaImage::from_fn(w, h, |_, y| {
        let t = y as f32 / (h - 1) as f32;
        let mix = |a: f32, b: f32| ((a + (b - a) * t) * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgba([
            mix(top.red, bottom.red),
            mix(top.green, bottom.green),
            mix(top.blue, bottom.blue),
            255,
        ])
    })
}

/// Produces the display-ready pixels for `source`.
pub fn load_source(source: &ImageSource, max_dim: u32) -> Result<RgbaImage, GalleryError> {
    let img = match source {
        ImageSource::Path(path) => decode_rgba8_apply_exif(path)?,
        ImageSource::Placeholder(n) => placeholder_tile(*n),
    };
    Ok(fit_within(img, max_dim))
}

/// Decodes requested images and reports completions to the viewer.
///
/// Each distinct source decodes once: requests for a source already in flight
/// are queued behind it, and finished images are cached for later requests.
pub async fn run(
    mut load_rx: Receiver<LoadImage>,
    to_viewer: Sender<LoaderEvent>,
    cancel: CancellationToken,
    config: LoaderConfig,
) -> Result<()> {
    let mut cache: HashMap<ImageSource, Arc<RgbaImage>> = HashMap::new();
    let mut waiting: HashMap<ImageSource, Vec<(usize, u64)>> = HashMap::new();
    let mut tasks: JoinSet<(ImageSource, Result<RgbaImage, GalleryError>)> = JoinSet::new();
    let max_in_flight = config.max_concurrent_decodes.max(1);
    let mut inbox_open = true;

    loop {
        if !inbox_open && waiting.is_empty() {
            break;
        }
        select! {
            _ = cancel.cancelled() => {
                debug!(in_flight = waiting.len(), "loader cancelled");
                break;
            },

            request = load_rx.recv(), if inbox_open && waiting.len() < max_in_flight => {
                let Some(LoadImage { slot, generation, source }) = request else {
                    inbox_open = false;
                    continue;
                };
                if let Some(image) = cache.get(&source) {
                    let _ = to_viewer.send(LoaderEvent::Loaded(ImageLoaded {
                        slot,
                        generation,
                        image: Arc::clone(image),
                    }));
                    continue;
                }
                let queued = waiting.entry(source.clone()).or_default();
                queued.push((slot, generation));
                if queued.len() == 1 {
                    let max_dim = config.max_texture_dim;
                    tasks.spawn(async move {
                        let decode_source = source.clone();
                        let res = tokio::task::spawn_blocking(move || load_source(&decode_source, max_dim)).await;
                        let res = res.unwrap_or_else(|err| {
                            Err(GalleryError::Io(std::io::Error::other(err.to_string())))
                        });
                        (source, res)
                    });
                }
            }

            Some(join_res) = tasks.join_next() => {
                let Ok((source, res)) = join_res else {
                    continue;
                };
                let slots = waiting.remove(&source).unwrap_or_default();
                match res {
                    Ok(img) => {
                        debug!(source = %source, width = img.width(), height = img.height(), "image decoded");
                        let image = Arc::new(img);
                        cache.insert(source, Arc::clone(&image));
                        for (slot, generation) in slots {
                            let _ = to_viewer.send(LoaderEvent::Loaded(ImageLoaded {
                                slot,
                                generation,
                                image: Arc::clone(&image),
                            }));
                        }
                    }
                    Err(err) => {
                        warn!(source = %source, error = %err, "image failed to load; item stays blank");
                        for (slot, generation) in slots {
                            let _ = to_viewer.send(LoaderEvent::Failed(ImageFailed {
                                slot,
                                generation,
                                source: source.clone(),
                                reason: err.to_string(),
                            }));
                        }
                    }
                }
            }
        }
    }
    info!(cached = cache.len(), "loader stopped");
    Ok(())
}
