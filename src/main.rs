use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::Parser;
use glam::Vec2;
use log::{error, info};
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyboardInput, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::run_return::EventLoopExtRunReturn;
use winit::window::WindowBuilder;

use lumen_room::app::{print_final_state, print_scene_summary, DEFAULT_TEXTURE_DIR};
use lumen_room::texture::room_texture_requests;
use lumen_room::{
    AppConfig, Cli, FpsCounter, FrameDriver, FrameRenderer, HeadlessRenderer, InputEvent,
    KeyCode, MouseButton, NamedKey, Renderer, Scene, SystemClock, TextureLoader,
};

const TEXTURE_WAIT: Duration = Duration::from_secs(30);
/// Pixels of trackpad scrolling that count as one wheel line.
const PIXELS_PER_LINE: f64 = 50.0;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = AppConfig::from_cli(Cli::parse())?;
    let scene = config.load_scene()?;
    print_scene_summary(&scene);

    if config.headless {
        return run_headless(&config, scene);
    }

    match run_interactive(&config, scene.clone()) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --headless mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(&config, scene)
            } else {
                Err(err)
            }
        }
    }
}

fn run_headless(config: &AppConfig, scene: Scene) -> Result<()> {
    let mut driver = config.headless_driver(scene);
    let mut renderer = HeadlessRenderer::new(config.width, config.height);

    if let Some(dir) = &config.texture_dir {
        driver.textures().spawn_all(room_texture_requests(dir));
        wait_for_textures(driver.textures());
    }

    let mut textures_applied = 0;
    for _ in 0..config.frames {
        let stats = match driver.tick(&mut renderer) {
            Ok(stats) => stats,
            Err(never) => match never {},
        };
        textures_applied += stats.textures_applied;
    }

    if config.texture_dir.is_some() {
        println!("Applied {textures_applied} texture(s)");
    }
    print_final_state(driver.context(), driver.frames());
    Ok(())
}

fn wait_for_textures(loader: &TextureLoader) {
    let deadline = Instant::now() + TEXTURE_WAIT;
    while loader.in_flight() > 0 {
        if Instant::now() >= deadline {
            error!("{} texture load(s) still running; continuing without them", loader.in_flight());
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn run_interactive(config: &AppConfig, scene: Scene) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop =
        event_loop.map_err(|panic| WindowInitError::from_panic("event loop", panic))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("lumen-room")
            .with_inner_size(LogicalSize::new(config.width as f64, config.height as f64))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let mut renderer = block_on(Renderer::new(Arc::clone(&window)))?;
    let mut driver = FrameDriver::new(config.frame_context(scene), SystemClock);

    let texture_dir = config
        .texture_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEXTURE_DIR));
    driver.textures().spawn_all(room_texture_requests(&texture_dir));
    info!("loading textures from {}", texture_dir.display());

    let size = window.inner_size();
    driver.resize(&mut renderer, size.width, size.height);

    let mut app = AppState {
        renderer,
        driver,
        fps: FpsCounter::new(),
        last_error: None,
    };

    let mut event_loop = event_loop;
    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        if let Err(err) = app.process_event(&event, control_flow) {
            app.last_error = Some(err);
            control_flow.set_exit();
        }
    });

    print_final_state(app.driver.context(), app.driver.frames());

    if let Some(err) = app.last_error {
        return Err(err);
    }

    Ok(())
}

struct AppState {
    renderer: Renderer,
    driver: FrameDriver<SystemClock>,
    fps: FpsCounter,
    last_error: Option<anyhow::Error>,
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

impl AppState {
    fn process_event(&mut self, event: &Event<()>, control_flow: &mut ControlFlow) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => {
                        control_flow.set_exit();
                    }
                    WindowEvent::Resized(size) => {
                        self.driver
                            .resize(&mut self.renderer, size.width, size.height);
                    }
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        self.driver.resize(
                            &mut self.renderer,
                            new_inner_size.width,
                            new_inner_size.height,
                        );
                    }
                    WindowEvent::KeyboardInput { input, .. } => {
                        self.handle_keyboard(input, control_flow);
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        let button = map_mouse_button(*button);
                        self.driver.push_event(match state {
                            ElementState::Pressed => InputEvent::MouseDown(button),
                            ElementState::Released => InputEvent::MouseUp(button),
                        });
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        self.driver.push_event(InputEvent::CursorMoved(Vec2::new(
                            position.x as f32,
                            position.y as f32,
                        )));
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        let lines = match delta {
                            MouseScrollDelta::LineDelta(_, y) => *y,
                            MouseScrollDelta::PixelDelta(pos) => (pos.y / PIXELS_PER_LINE) as f32,
                        };
                        if lines != 0.0 {
                            self.driver.push_event(InputEvent::Scroll(lines));
                        }
                    }
                    _ => {}
                }
            }
            Event::RedrawRequested(window_id) if *window_id == self.renderer.window_id() => {
                match self.driver.tick(&mut self.renderer) {
                    Ok(stats) => {
                        if let Some(fps) = self.fps.record(stats.millis) {
                            self.renderer
                                .window()
                                .set_title(&format!("lumen-room ({fps:.0} fps)"));
                        }
                    }
                    Err(err) => match err {
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                            let size = self.renderer.window().inner_size();
                            self.renderer.resize(size.width, size.height);
                        }
                        wgpu::SurfaceError::OutOfMemory => {
                            error!("surface out of memory");
                            return Err(anyhow!("GPU is out of memory"));
                        }
                        wgpu::SurfaceError::Timeout => {
                            info!("Surface timeout; retrying next frame");
                        }
                    },
                }
            }
            Event::MainEventsCleared => {
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_keyboard(&mut self, input: &KeyboardInput, control_flow: &mut ControlFlow) {
        let Some(keycode) = input.virtual_keycode.and_then(map_keycode) else {
            return;
        };
        match input.state {
            ElementState::Pressed if keycode == KeyCode::Named(NamedKey::Escape) => {
                control_flow.set_exit();
            }
            ElementState::Pressed => self.driver.push_event(InputEvent::KeyDown(keycode)),
            ElementState::Released => self.driver.push_event(InputEvent::KeyUp(keycode)),
        }
    }
}

fn map_mouse_button(button: winit::event::MouseButton) -> MouseButton {
    use winit::event::MouseButton as Button;
    match button {
        Button::Left => MouseButton::LEFT,
        Button::Right => MouseButton::RIGHT,
        Button::Middle => MouseButton::MIDDLE,
        Button::Other(value) => MouseButton::new(value.min(u8::MAX as u16) as u8),
    }
}

fn map_keycode(code: winit::event::VirtualKeyCode) -> Option<KeyCode> {
    use winit::event::VirtualKeyCode as Key;
    Some(match code {
        Key::Left => KeyCode::Named(NamedKey::Left),
        Key::Right => KeyCode::Named(NamedKey::Right),
        Key::Up => KeyCode::Named(NamedKey::Up),
        Key::Down => KeyCode::Named(NamedKey::Down),
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::B => KeyCode::Character('B'),
        Key::E => KeyCode::Character('E'),
        Key::H => KeyCode::Character('H'),
        Key::Q => KeyCode::Character('Q'),
        Key::S => KeyCode::Character('S'),
        _ => return None,
    })
}
