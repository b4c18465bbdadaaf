use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use crate::frame::{FrameContext, FrameDriver, SteppedClock};
use crate::input::{InputEvent, KeyCode};
use crate::lighting::tone_mapping_exposure;
use crate::motion::{ClampPolicy, MotionConfig};
use crate::params::ParameterState;
use crate::scene::Scene;

/// Directory the interactive app loads room textures from by default.
pub const DEFAULT_TEXTURE_DIR: &str = "textures";

#[derive(Parser, Debug, Clone)]
#[command(name = "lumen-room")]
#[command(about = "Lit room with a movable bulb, photometric light levels and tone-mapped exposure", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Bulb luminous power label, e.g. "400 lm (40W)"
    #[arg(long)]
    pub bulb: Option<String>,

    /// Hemisphere irradiance label, e.g. "0.0001 lx (Moonless Night)"
    #[arg(long)]
    pub hemi: Option<String>,

    /// Exposure slider value in [0, 1]
    #[arg(long)]
    pub exposure: Option<f32>,

    /// Start with shadows disabled
    #[arg(long)]
    pub no_shadows: bool,

    /// Camera behavior when the bulb hits its bound: reference or symmetric
    #[arg(long, default_value = "reference")]
    pub clamp_policy: ClampPolicy,

    /// Room layout XML; the built-in room is used when omitted
    #[arg(long)]
    pub scene: Option<PathBuf>,

    /// Directory holding the room textures
    #[arg(long)]
    pub textures: Option<PathBuf>,

    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Run without a window and print the final state
    #[arg(long)]
    pub headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 1)]
    pub frames: u64,

    /// Key held down for the whole headless run (repeatable)
    #[arg(long = "hold", value_name = "KEY")]
    pub held: Vec<String>,

    /// Key pressed and released before the first headless frame (repeatable)
    #[arg(long = "press", value_name = "KEY")]
    pub pressed: Vec<String>,

    /// Clock value of the first headless frame, in milliseconds
    #[arg(long, default_value_t = 0.0)]
    pub clock_start: f64,

    /// Clock advance per headless frame, in milliseconds
    #[arg(long, default_value_t = 16.0)]
    pub clock_step: f64,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub params: ParameterState,
    pub motion: MotionConfig,
    pub scene_path: Option<PathBuf>,
    pub texture_dir: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub headless: bool,
    pub frames: u64,
    pub held_keys: Vec<KeyCode>,
    pub pressed_keys: Vec<KeyCode>,
    pub clock_start: f64,
    pub clock_step: f64,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let mut params = ParameterState::new();
        if let Some(label) = cli.bulb.as_deref() {
            params.select_bulb(label)?;
        }
        if let Some(label) = cli.hemi.as_deref() {
            params.select_hemi(label)?;
        }
        if let Some(exposure) = cli.exposure {
            params.set_exposure(exposure);
        }
        params.shadows_enabled = !cli.no_shadows;

        if cli.width == 0 || cli.height == 0 {
            return Err(anyhow!(
                "window size must be non-zero (got {}x{})",
                cli.width,
                cli.height
            ));
        }

        Ok(Self {
            params,
            motion: MotionConfig::with_policy(cli.clamp_policy),
            scene_path: cli.scene,
            texture_dir: cli.textures,
            width: cli.width,
            height: cli.height,
            headless: cli.headless,
            frames: cli.frames,
            held_keys: parse_keys(&cli.held)?,
            pressed_keys: parse_keys(&cli.pressed)?,
            clock_start: cli.clock_start,
            clock_step: cli.clock_step,
        })
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn load_scene(&self) -> Result<Scene> {
        match &self.scene_path {
            Some(path) => {
                let xml = fs::read_to_string(path)
                    .with_context(|| format!("failed to read scene {}", path.display()))?;
                Scene::from_xml(&xml, self.aspect())
                    .with_context(|| format!("failed to parse scene {}", path.display()))
            }
            None => Ok(Scene::room(self.aspect())),
        }
    }

    pub fn frame_context(&self, scene: Scene) -> FrameContext {
        let mut context = FrameContext::new(self.params, scene, self.motion);
        context.set_viewport(self.width, self.height);
        context
    }

    /// Driver for headless runs, with the scripted keys already queued.
    pub fn headless_driver(&self, scene: Scene) -> FrameDriver<SteppedClock> {
        let clock = SteppedClock::new(self.clock_start, self.clock_step);
        let mut driver = FrameDriver::new(self.frame_context(scene), clock);
        for &key in &self.pressed_keys {
            driver.push_event(InputEvent::KeyDown(key));
            driver.push_event(InputEvent::KeyUp(key));
        }
        for &key in &self.held_keys {
            driver.push_event(InputEvent::KeyDown(key));
        }
        driver
    }
}

fn parse_keys(names: &[String]) -> Result<Vec<KeyCode>> {
    names
        .iter()
        .map(|name| KeyCode::from_name(name).ok_or_else(|| anyhow!("unknown key {name:?}")))
        .collect()
}

pub fn print_scene_summary(scene: &Scene) {
    println!("Loaded scene with {} objects", scene.objects.len());
    for object in &scene.objects {
        println!(
            " - {} ({:?}, {})",
            object.name,
            object.shape,
            object.material.name()
        );
    }
}

pub fn final_state_lines(context: &FrameContext, frames: u64) -> Vec<String> {
    let scene = &context.scene;
    let params = &context.params;
    let light = scene.bulb.position;
    let camera = scene.camera.position;
    vec![
        format!("Final state after {frames} frame(s):"),
        format!(" - light pos=({:.2}, {:.2}, {:.2})", light.x, light.y, light.z),
        format!(" - camera pos=({:.2}, {:.2}, {:.2})", camera.x, camera.y, camera.z),
        format!(
            " - bulb power={:.2} {} intensity={:.2} cd ({})",
            scene.bulb.power(),
            params.bulb.catalog().unit(),
            scene.bulb.intensity,
            params.bulb.label()
        ),
        format!(
            " - hemi irradiance={} {} ({})",
            scene.hemi.intensity,
            params.hemi.catalog().unit(),
            params.hemi.label()
        ),
        format!(
            " - exposure={:.2} tone mapping={:.4}",
            params.exposure(),
            tone_mapping_exposure(params.exposure())
        ),
        format!(
            " - shadows={}",
            if params.shadows_enabled { "on" } else { "off" }
        ),
    ]
}

pub fn print_final_state(context: &FrameContext, frames: u64) {
    for line in final_state_lines(context, frames) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;

    fn config(args: &[&str]) -> Result<AppConfig> {
        let cli = Cli::try_parse_from(std::iter::once("lumen-room").chain(args.iter().copied()))?;
        AppConfig::from_cli(cli)
    }

    #[test]
    fn defaults_match_the_initial_settings() {
        let config = config(&[]).unwrap();
        assert_eq!(config.params, ParameterState::new());
        assert_eq!(config.motion.policy, ClampPolicy::Reference);
        assert!(!config.headless);
        assert_eq!(config.frames, 1);
        assert!(config.texture_dir.is_none());
    }

    #[test]
    fn settings_flags_are_applied() {
        let config = config(&[
            "--bulb",
            "Off",
            "--hemi",
            "50 lx (Living Room)",
            "--exposure",
            "1.5",
            "--no-shadows",
            "--clamp-policy",
            "symmetric",
        ])
        .unwrap();
        assert_eq!(config.params.bulb.value(), 0.0);
        assert_eq!(config.params.hemi.value(), 50.0);
        assert_eq!(config.params.exposure(), 1.0);
        assert!(!config.params.shadows_enabled);
        assert_eq!(config.motion.policy, ClampPolicy::Symmetric);
    }

    #[test]
    fn unknown_labels_and_keys_are_rejected() {
        let err = config(&["--bulb", "9000 lm"]).unwrap_err();
        assert!(err.to_string().contains("9000 lm"));
        assert!(config(&["--hold", "Tab"]).is_err());
        assert!(config(&["--width", "0"]).is_err());
    }

    #[test]
    fn headless_driver_queues_scripted_keys() {
        let config = config(&["--press", "s", "--hold", "Left"]).unwrap();
        let scene = config.load_scene().unwrap();
        let mut driver = config.headless_driver(scene);
        let mut renderer = HeadlessRenderer::new(config.width, config.height);
        let stats = driver.tick(&mut renderer).unwrap();
        assert_eq!(stats.events, 3);
        assert!(stats.moved);
        assert!(!driver.context().params.shadows_enabled);
        assert!(driver.context().input.is_held(crate::input::Direction::Left));
    }

    #[test]
    fn final_state_reports_the_resolved_frame() {
        let config = config(&[]).unwrap();
        let mut driver = config.headless_driver(config.load_scene().unwrap());
        let mut renderer = HeadlessRenderer::new(config.width, config.height);
        driver.tick(&mut renderer).unwrap();

        let lines = final_state_lines(driver.context(), driver.frames());
        assert_eq!(lines[0], "Final state after 1 frame(s):");
        assert_eq!(lines[1], " - light pos=(0.00, 3.00, 0.00)");
        assert_eq!(lines[2], " - camera pos=(-4.00, 2.00, 4.00)");
        assert!(lines[3].starts_with(" - bulb power=400.00 lm intensity=31.83 cd"));
        assert_eq!(
            lines[4],
            " - hemi irradiance=0.0001 lx (0.0001 lx (Moonless Night))"
        );
        assert_eq!(lines[6], " - shadows=on");
    }
}
