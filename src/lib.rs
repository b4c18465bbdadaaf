//! Photometric lighting playground.
//!
//! A room lit by a single bulb whose power is chosen in lumens and a
//! hemisphere sky whose irradiance is chosen in lux. The crate keeps the
//! per-frame logic (input, motion, lighting resolution, material
//! invalidation) independent from the window so that it can run headless
//! in tests and tooling.

pub mod app;
pub mod camera;
pub mod catalog;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod lighting;
pub mod material;
pub mod motion;
pub mod params;
pub mod render;
pub mod scene;
pub mod texture;

pub use app::{AppConfig, Cli};
pub use camera::{OrbitControls, PerspectiveCamera};
pub use catalog::{Catalog, LightLevel, Selection};
pub use error::{CatalogError, TextureError};
pub use frame::{Clock, FpsCounter, FrameContext, FrameDriver, FrameStats, SteppedClock, SystemClock};
pub use input::{
    Direction, DirectionalInput, InputEvent, InputQueue, KeyCode, MouseButton, NamedKey,
};
pub use lighting::{LightingResolver, ResolvedLighting};
pub use material::{Material, MaterialId, MaterialSet};
pub use motion::{ClampPolicy, MotionConfig};
pub use params::{ParameterCommand, ParameterState};
pub use render::{CameraParams, DrawRecord, FrameRenderer, FrameView, HeadlessRenderer, Renderer};
pub use scene::{HemisphereLight, PointLight, Scene, SceneObject};
pub use texture::{TextureLoader, TextureRequest, TextureSlot};
