//! Per-frame orchestration.
//!
//! A [`FrameDriver`] owns the single-threaded [`FrameContext`] and runs one
//! tick per displayed frame: queued input, finished texture loads, motion,
//! lighting, then one draw call.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::camera::OrbitControls;
use crate::input::{DirectionalInput, InputEvent, InputQueue, KeyCode};
use crate::lighting::{LightingResolver, ResolvedLighting};
use crate::material::MaterialSet;
use crate::motion::{integrate, MotionConfig};
use crate::params::{ParameterCommand, ParameterState};
use crate::render::{CameraParams, FrameRenderer, FrameView};
use crate::scene::Scene;
use crate::texture::TextureLoader;

/// Source of the wall-clock time fed to the bulb animation.
pub trait Clock {
    /// Milliseconds; successive calls never go backwards.
    fn now_millis(&mut self) -> f64;
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&mut self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// Deterministic clock: returns `start`, then advances by `step` per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteppedClock {
    next: f64,
    step: f64,
}

impl SteppedClock {
    pub fn new(start: f64, step: f64) -> Self {
        Self { next: start, step }
    }
}

impl Clock for SteppedClock {
    fn now_millis(&mut self) -> f64 {
        let now = self.next;
        self.next += self.step;
        now
    }
}

/// State owned by the frame loop. Nothing here is shared across threads.
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub params: ParameterState,
    pub input: DirectionalInput,
    pub scene: Scene,
    pub materials: MaterialSet,
    pub resolver: LightingResolver,
    pub motion: MotionConfig,
    pub orbit: OrbitControls,
    /// Settings keys currently down; repeats of a held key are ignored.
    settings_held: HashSet<KeyCode>,
}

impl FrameContext {
    pub fn new(params: ParameterState, scene: Scene, motion: MotionConfig) -> Self {
        let camera = &scene.camera;
        let orbit = OrbitControls::new(camera.position + camera.forward * orbit_distance(&scene));
        Self {
            resolver: LightingResolver::new(&params),
            params,
            input: DirectionalInput::new(),
            scene,
            materials: MaterialSet::room(),
            motion,
            orbit,
            settings_held: HashSet::new(),
        }
    }

    /// New surface size in physical pixels.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.scene.camera.set_viewport(width, height);
        self.orbit.set_viewport(width, height);
    }

    fn handle(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.input.on_press(key);
                if let Some(command) = ParameterCommand::for_key(key) {
                    if self.settings_held.insert(key) {
                        self.params.apply(command);
                    }
                }
            }
            InputEvent::KeyUp(key) => {
                self.input.on_release(key);
                self.settings_held.remove(&key);
            }
            InputEvent::MouseDown(button) => self.orbit.pointer_down(button),
            InputEvent::MouseUp(button) => self.orbit.pointer_up(button),
            InputEvent::CursorMoved(position) => {
                self.orbit.pointer_moved(position, &self.scene.camera)
            }
            InputEvent::Scroll(lines) => self.orbit.scroll(lines),
        }
    }
}

/// Distance from the camera to the point it initially looks at: the
/// projection of the origin onto the view ray, at least one unit ahead.
fn orbit_distance(scene: &Scene) -> f32 {
    let camera = &scene.camera;
    (-camera.position).dot(camera.forward).max(1.0)
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub index: u64,
    pub millis: f64,
    pub events: usize,
    pub textures_applied: usize,
    pub moved: bool,
    pub orbited: bool,
    pub lighting: ResolvedLighting,
}

pub struct FrameDriver<C: Clock> {
    context: FrameContext,
    clock: C,
    events: InputQueue,
    textures: TextureLoader,
    frame: u64,
}

impl<C: Clock> FrameDriver<C> {
    pub fn new(context: FrameContext, clock: C) -> Self {
        Self {
            context,
            clock,
            events: InputQueue::new(),
            textures: TextureLoader::new(),
            frame: 0,
        }
    }

    pub fn context(&self) -> &FrameContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut FrameContext {
        &mut self.context
    }

    pub fn textures(&self) -> &TextureLoader {
        &self.textures
    }

    /// Number of ticks run so far.
    pub fn frames(&self) -> u64 {
        self.frame
    }

    /// Queues a key event; it takes effect at the start of the next tick.
    pub fn push_event(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    /// Updates the camera aspect, the orbit viewport and the renderer surface.
    pub fn resize<R: FrameRenderer>(&mut self, renderer: &mut R, width: u32, height: u32) {
        self.context.set_viewport(width, height);
        renderer.resize(width, height);
    }

    pub fn tick<R: FrameRenderer>(&mut self, renderer: &mut R) -> Result<FrameStats, R::Error> {
        let context = &mut self.context;

        let mut events = 0;
        for event in self.events.drain() {
            context.handle(event);
            events += 1;
        }

        let textures_applied = self.textures.drain_into(&mut context.materials);

        let camera_before = context.scene.camera.position;
        let moved = integrate(
            &context.input,
            &mut context.scene.bulb.position,
            &mut context.scene.camera.position,
            &context.motion,
        );
        context
            .orbit
            .translate(context.scene.camera.position - camera_before);
        let orbited = context.orbit.update(&mut context.scene.camera);

        let millis = self.clock.now_millis();
        let lighting = context.resolver.resolve(
            &context.params,
            &mut context.scene,
            &mut context.materials,
            millis,
        );

        let index = self.frame;
        renderer.draw(FrameView {
            index,
            scene: &context.scene,
            camera: CameraParams::from_scene(&context.scene),
            lighting: &lighting,
            materials: &mut context.materials,
        })?;
        self.frame += 1;

        Ok(FrameStats {
            index,
            millis,
            events,
            textures_applied,
            moved,
            orbited,
            lighting,
        })
    }
}

/// Counts frames over one-second windows of clock time.
#[derive(Debug, Clone, Default)]
pub struct FpsCounter {
    window_start: Option<f64>,
    frames: u32,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame at `millis`; returns the rate once a second has
    /// elapsed since the window opened.
    pub fn record(&mut self, millis: f64) -> Option<f64> {
        let Some(start) = self.window_start else {
            self.window_start = Some(millis);
            self.frames = 0;
            return None;
        };
        self.frames += 1;
        let elapsed = millis - start;
        if elapsed < 1000.0 {
            return None;
        }
        let fps = f64::from(self.frames) * 1000.0 / elapsed;
        debug!("{fps:.1} fps");
        self.window_start = Some(millis);
        self.frames = 0;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::MouseButton;
    use crate::lighting::BOB_RATE;
    use crate::material::MaterialId;
    use crate::motion::ClampPolicy;
    use crate::render::HeadlessRenderer;
    use glam::Vec2;

    fn driver(start: f64) -> FrameDriver<SteppedClock> {
        let context = FrameContext::new(
            ParameterState::new(),
            Scene::room(16.0 / 9.0),
            MotionConfig::default(),
        );
        FrameDriver::new(context, SteppedClock::new(start, 16.0))
    }

    #[test]
    fn stepped_clock_starts_at_its_origin() {
        let mut clock = SteppedClock::new(100.0, 10.0);
        assert_eq!(clock.now_millis(), 100.0);
        assert_eq!(clock.now_millis(), 110.0);
    }

    #[test]
    fn default_frame_draws_once_without_invalidations() {
        let mut driver = driver(500.0);
        let mut renderer = HeadlessRenderer::new(1280, 720);
        let stats = driver.tick(&mut renderer).unwrap();

        let expected_y = (500.0 * BOB_RATE).cos() as f32 * 0.75 + 2.25;
        assert_eq!(stats.index, 0);
        assert!(!stats.moved);
        assert!((stats.lighting.bulb_height - expected_y).abs() < 1e-6);
        assert_eq!(stats.lighting.bulb_power, 400.0);
        assert_eq!(stats.lighting.hemi_intensity, 0.0001);

        let record = renderer.last().unwrap();
        assert_eq!(renderer.draws().len(), 1);
        assert!(record.rebuilt.is_empty());
        assert!((record.light_position.y - expected_y).abs() < 1e-6);
        for id in MaterialId::ALL {
            assert_eq!(driver.context().materials.version(id), 0);
        }
    }

    #[test]
    fn held_left_moves_bulb_and_camera_each_frame() {
        let mut driver = driver(0.0);
        let mut renderer = HeadlessRenderer::new(640, 480);
        let light_x = driver.context().scene.bulb.position.x;
        let camera_x = driver.context().scene.camera.position.x;
        let step = driver.context().motion.step;

        driver.push_event(InputEvent::KeyDown(KeyCode::LEFT));
        for _ in 0..3 {
            assert!(driver.tick(&mut renderer).unwrap().moved);
        }
        driver.push_event(InputEvent::KeyUp(KeyCode::LEFT));
        assert!(!driver.tick(&mut renderer).unwrap().moved);

        let scene = &driver.context().scene;
        assert!((scene.bulb.position.x - (light_x - 3.0 * step)).abs() < 1e-5);
        assert!((scene.camera.position.x - (camera_x - 3.0 * step)).abs() < 1e-5);
    }

    #[test]
    fn events_apply_only_at_the_next_tick() {
        let mut driver = driver(0.0);
        let mut renderer = HeadlessRenderer::new(640, 480);
        driver.push_event(InputEvent::KeyDown(KeyCode::Character('B')));
        assert_eq!(driver.context().params.bulb.label(), "400 lm (40W)");

        let stats = driver.tick(&mut renderer).unwrap();
        assert_eq!(stats.events, 1);
        assert_eq!(driver.context().params.bulb.label(), "180 lm (25W)");
        assert_eq!(stats.lighting.bulb_power, 180.0);
    }

    #[test]
    fn shadow_toggle_key_rebuilds_dependent_materials_once() {
        let mut driver = driver(0.0);
        let mut renderer = HeadlessRenderer::new(640, 480);
        driver.tick(&mut renderer).unwrap();

        driver.push_event(InputEvent::KeyDown(KeyCode::Character('S')));
        driver.push_event(InputEvent::KeyUp(KeyCode::Character('S')));
        let stats = driver.tick(&mut renderer).unwrap();
        assert!(stats.lighting.shadows_changed);
        assert!(!stats.lighting.shadows_enabled);

        let record = renderer.last().unwrap();
        assert_eq!(
            record.rebuilt,
            vec![
                MaterialId::Floor,
                MaterialId::Cube,
                MaterialId::BigCube,
                MaterialId::Ball
            ]
        );

        driver.tick(&mut renderer).unwrap();
        assert!(renderer.last().unwrap().rebuilt.is_empty());
    }

    #[test]
    fn repeated_key_down_applies_a_setting_once() {
        let mut driver = driver(0.0);
        let mut renderer = HeadlessRenderer::new(640, 480);
        let shadows = KeyCode::Character('S');

        // the OS repeats KeyDown while the key stays held
        driver.push_event(InputEvent::KeyDown(shadows));
        driver.push_event(InputEvent::KeyDown(shadows));
        driver.tick(&mut renderer).unwrap();
        driver.push_event(InputEvent::KeyDown(shadows));
        driver.push_event(InputEvent::KeyUp(shadows));
        driver.tick(&mut renderer).unwrap();
        assert!(!driver.context().params.shadows_enabled);

        driver.push_event(InputEvent::KeyDown(shadows));
        driver.push_event(InputEvent::KeyUp(shadows));
        driver.tick(&mut renderer).unwrap();
        assert!(driver.context().params.shadows_enabled);

        let exposure = KeyCode::Character('E');
        let before = driver.context().params.exposure();
        for _ in 0..5 {
            driver.push_event(InputEvent::KeyDown(exposure));
        }
        driver.push_event(InputEvent::KeyUp(exposure));
        driver.tick(&mut renderer).unwrap();
        let raised = driver.context().params.exposure() - before;
        assert!((raised - crate::params::EXPOSURE_STEP).abs() < 1e-6);
    }

    #[test]
    fn orbit_target_starts_at_the_point_the_camera_looks_at() {
        let driver = driver(0.0);
        assert!(driver.context().orbit.target.length() < 1e-5);
    }

    #[test]
    fn wheel_events_clamp_the_orbit_distance() {
        let mut driver = driver(0.0);
        let mut renderer = HeadlessRenderer::new(640, 480);
        driver.push_event(InputEvent::Scroll(500.0));
        assert!(driver.tick(&mut renderer).unwrap().orbited);
        let context = driver.context();
        let distance = context.scene.camera.position.distance(context.orbit.target);
        assert!((distance - 1.0).abs() < 1e-4);
    }

    #[test]
    fn held_keys_keep_the_offset_while_orbiting() {
        let mut driver = driver(0.0);
        let mut renderer = HeadlessRenderer::new(1280, 720);
        driver.resize(&mut renderer, 1280, 720);

        driver.push_event(InputEvent::CursorMoved(Vec2::new(400.0, 300.0)));
        driver.push_event(InputEvent::MouseDown(MouseButton::LEFT));
        driver.push_event(InputEvent::CursorMoved(Vec2::new(460.0, 300.0)));
        driver.push_event(InputEvent::MouseUp(MouseButton::LEFT));
        driver.push_event(InputEvent::KeyDown(KeyCode::RIGHT));

        let first = driver.tick(&mut renderer).unwrap();
        assert!(first.moved && first.orbited);
        let start = driver.context().clone();
        for _ in 0..20 {
            driver.tick(&mut renderer).unwrap();
        }
        let context = driver.context();
        let step = context.motion.step;
        assert!((context.orbit.target.x - start.orbit.target.x - 20.0 * step).abs() < 1e-4);

        // orbiting turns the camera about the target; keys shift both
        let radius = |c: &FrameContext| c.scene.camera.position.distance(c.orbit.target);
        assert!((radius(context) - radius(&start)).abs() < 1e-3);
        let height = |c: &FrameContext| c.scene.camera.position.y - c.orbit.target.y;
        assert!((height(context) - height(&start)).abs() < 1e-3);
        assert!(context.scene.camera.forward.dot(start.scene.camera.forward) < 1.0);
    }

    #[test]
    fn symmetric_policy_is_carried_by_the_context() {
        let context = FrameContext::new(
            ParameterState::new(),
            Scene::room(1.0),
            MotionConfig::with_policy(ClampPolicy::Symmetric),
        );
        let driver = FrameDriver::new(context, SteppedClock::new(0.0, 1.0));
        assert_eq!(driver.context().motion.policy, ClampPolicy::Symmetric);
    }

    #[test]
    fn resize_updates_aspect_and_surface() {
        let mut driver = driver(0.0);
        let mut renderer = HeadlessRenderer::new(640, 480);
        driver.resize(&mut renderer, 800, 400);
        assert_eq!(driver.context().scene.camera.aspect, 2.0);
        assert_eq!(renderer.size(), (800, 400));

        driver.resize(&mut renderer, 0, 0);
        assert_eq!(driver.context().scene.camera.aspect, 2.0);
        assert_eq!(renderer.size(), (800, 400));
    }

    #[test]
    fn fps_counter_reports_once_per_second() {
        let mut counter = FpsCounter::new();
        let mut reports = Vec::new();
        for frame in 0..=120 {
            if let Some(fps) = counter.record(f64::from(frame) * 1000.0 / 60.0) {
                reports.push(fps);
            }
        }
        assert_eq!(reports.len(), 2);
        assert!((reports[0] - 60.0).abs() < 1e-6);
        assert!((reports[1] - 60.0).abs() < 1e-6);
    }
}
