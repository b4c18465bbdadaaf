//! Render boundary.
//!
//! The frame driver hands a [`FrameView`] to a [`FrameRenderer`] once per
//! tick. The wgpu renderer draws it into a window; the headless renderer
//! keeps a log of what it was asked to draw.

mod headless;
mod native;
mod shared;

pub use headless::{DrawRecord, HeadlessRenderer};
pub use native::Renderer;

use glam::{Mat4, Vec3};

use crate::lighting::ResolvedLighting;
use crate::material::MaterialSet;
use crate::scene::Scene;

/// Camera parameters consumed by the renderer's uniform buffer.
#[derive(Clone, Debug)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

impl CameraParams {
    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            view_proj: scene.camera.view_proj(),
            position: scene.camera.position,
        }
    }
}

/// Everything a renderer needs to draw one frame.
pub struct FrameView<'a> {
    pub index: u64,
    pub scene: &'a Scene,
    pub camera: CameraParams,
    pub lighting: &'a ResolvedLighting,
    /// Materials; renderers that cache derived state consume the dirty set.
    pub materials: &'a mut MaterialSet,
}

/// Something that can present frames.
pub trait FrameRenderer {
    type Error;

    /// New surface size in physical pixels.
    fn resize(&mut self, width: u32, height: u32);

    /// Issues the draw call for one frame.
    fn draw(&mut self, frame: FrameView<'_>) -> Result<(), Self::Error>;
}
