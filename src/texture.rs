//! Fire-and-forget texture loading.
//!
//! Each request is decoded on its own thread. Finished loads are parked in a
//! shared completion queue which the frame driver drains between frames, so
//! materials are only ever written from the frame context. A failed load is
//! logged and dropped: the material keeps its untextured appearance.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use glam::Vec3;
use log::debug;
use parking_lot::Mutex;

use crate::error::TextureError;
use crate::material::{MaterialId, MaterialSet};

/// Texture slot of a standard material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Map,
    BumpMap,
    RoughnessMap,
    MetalnessMap,
}

/// Decoded texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Average linear color, used by renderers without texture sampling.
    pub mean_color: Vec3,
}

impl TextureData {
    fn from_image(image: image::RgbaImage, srgb: bool) -> Self {
        let (width, height) = image.dimensions();
        let mut sum = Vec3::ZERO;
        for pixel in image.pixels() {
            let [r, g, b, _] = pixel.0;
            let color = Vec3::new(r as f32, g as f32, b as f32) / 255.0;
            sum += if srgb { srgb_to_linear(color) } else { color };
        }
        let count = (width as f32 * height as f32).max(1.0);
        Self {
            width,
            height,
            mean_color: sum / count,
        }
    }

    #[cfg(test)]
    pub(crate) fn solid(width: u32, height: u32, color: Vec3) -> Self {
        Self {
            width,
            height,
            mean_color: color,
        }
    }
}

fn srgb_to_linear(color: Vec3) -> Vec3 {
    let channel = |c: f32| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec3::new(channel(color.x), channel(color.y), channel(color.z))
}

/// One texture to fetch for one material slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRequest {
    pub material: MaterialId,
    pub slot: TextureSlot,
    pub path: PathBuf,
    /// Color data stored in sRGB (diffuse maps) rather than linear values.
    pub srgb: bool,
}

impl TextureRequest {
    pub fn new(material: MaterialId, slot: TextureSlot, path: PathBuf, srgb: bool) -> Self {
        Self {
            material,
            slot,
            path,
            srgb,
        }
    }
}

/// Texture set of the default room, resolved against `dir`.
pub fn room_texture_requests(dir: &Path) -> Vec<TextureRequest> {
    use MaterialId::*;
    use TextureSlot::*;
    [
        (Floor, Map, "hardwood2_diffuse.jpg", true),
        (Floor, BumpMap, "hardwood2_bump.jpg", false),
        (Floor, RoughnessMap, "hardwood2_roughness.jpg", false),
        (Cube, Map, "brick_diffuse.jpg", true),
        (Cube, BumpMap, "brick_bump.jpg", false),
        (Ball, Map, "earth_atmos_2048.jpg", true),
        (Ball, MetalnessMap, "earth_specular_2048.jpg", true),
        (BigCube, Map, "crate.gif", true),
    ]
    .into_iter()
    .map(|(material, slot, file, srgb)| TextureRequest::new(material, slot, dir.join(file), srgb))
    .collect()
}

/// Reads and decodes one texture file.
pub fn load_texture(path: &Path, srgb: bool) -> Result<TextureData, TextureError> {
    let bytes = std::fs::read(path).map_err(|source| TextureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let image = image::load_from_memory(&bytes).map_err(|source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = image.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(TextureError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(TextureData::from_image(rgba, srgb))
}

/// Outcome of one request, waiting to be applied on the frame context.
#[derive(Debug)]
pub struct TextureCompletion {
    pub request: TextureRequest,
    pub result: Result<TextureData, TextureError>,
}

/// Spawns texture loads and collects their completions.
#[derive(Debug, Clone, Default)]
pub struct TextureLoader {
    completed: Arc<Mutex<Vec<TextureCompletion>>>,
    in_flight: Arc<AtomicUsize>,
}

impl TextureLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn_all(&self, requests: impl IntoIterator<Item = TextureRequest>) {
        for request in requests {
            self.spawn(request);
        }
    }

    pub fn spawn(&self, request: TextureRequest) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let completed = Arc::clone(&self.completed);
        let in_flight = Arc::clone(&self.in_flight);
        let worker_request = request.clone();
        let spawned = thread::Builder::new()
            .name(format!("texture-{}", request.material.name()))
            .spawn(move || {
                let result = load_texture(&worker_request.path, worker_request.srgb);
                completed.lock().push(TextureCompletion {
                    request: worker_request,
                    result,
                });
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        if let Err(source) = spawned {
            let path = request.path.clone();
            self.completed.lock().push(TextureCompletion {
                request,
                result: Err(TextureError::Io { path, source }),
            });
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Number of loads that have not reported back yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Applies every finished load to `materials`. Returns how many
    /// textures were stored.
    pub fn drain_into(&self, materials: &mut MaterialSet) -> usize {
        let completions = std::mem::take(&mut *self.completed.lock());
        let mut applied = 0;
        for completion in completions {
            let TextureCompletion { request, result } = completion;
            match result {
                Ok(texture) => {
                    materials.apply_texture(request.material, request.slot, texture);
                    applied += 1;
                }
                Err(err) => debug!("texture load skipped: {err}"),
            }
        }
        applied
    }
}
