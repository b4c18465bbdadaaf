use std::convert::Infallible;

use glam::Vec3;

use crate::material::MaterialId;

use super::{FrameRenderer, FrameView};

/// Summary of one frame handed to the headless renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub index: u64,
    pub light_position: Vec3,
    pub camera_position: Vec3,
    pub exposure: f32,
    pub shadows_enabled: bool,
    pub objects: usize,
    /// Materials whose cached state had to be rebuilt for this frame.
    pub rebuilt: Vec<MaterialId>,
}

/// Renderer without a surface, used for `--headless` runs and tests.
///
/// It consumes the material dirty set like the GPU renderer does, so
/// invalidations show up in [`DrawRecord::rebuilt`].
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    size: (u32, u32),
    draws: Vec<DrawRecord>,
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            draws: Vec::new(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn last(&self) -> Option<&DrawRecord> {
        self.draws.last()
    }
}

impl FrameRenderer for HeadlessRenderer {
    type Error = Infallible;

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
    }

    fn draw(&mut self, frame: FrameView<'_>) -> Result<(), Self::Error> {
        let rebuilt = frame.materials.take_dirty().into_iter().collect();
        self.draws.push(DrawRecord {
            index: frame.index,
            light_position: frame.scene.bulb.position,
            camera_position: frame.camera.position,
            exposure: frame.lighting.tone_mapping_exposure,
            shadows_enabled: frame.lighting.shadows_enabled,
            objects: frame.scene.objects.len(),
            rebuilt,
        });
        Ok(())
    }
}
