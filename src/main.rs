use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::info;
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use crystal_scene::app::{print_summary, AppContext};
use crystal_scene::render::Renderer;

const WINDOW_TITLE: &str = "Crystal Scene";
const HEADLESS_STEP: f32 = 1.0 / 60.0;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    if !options.asset_root.is_dir() {
        return Err(anyhow!(
            "asset root {} is not a directory",
            options.asset_root.display()
        ));
    }

    let context = AppContext::new(1280, 720, options.seed);

    if options.headless {
        return run_headless(context, &options);
    }
    match run_interactive(context, &options) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --headless mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(AppContext::new(1280, 720, options.seed), &options)
            } else {
                Err(err)
            }
        }
    }
}

/// Loads every asset, steps a fixed number of frames, and prints the final
/// scene state without touching the GPU.
fn run_headless(mut context: AppContext, options: &CliOptions) -> Result<()> {
    context.begin_loading(&options.asset_root);
    context.finish_loading();
    for _ in 0..options.frames {
        context.advance(HEADLESS_STEP);
        if context.should_stop() {
            break;
        }
    }
    print_summary(&context);
    Ok(())
}

fn run_interactive(context: AppContext, options: &CliOptions) -> Result<()> {
    let event_loop = EventLoop::new()
        .map_err(|err| anyhow!(WindowInitError::new("event loop", err)))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        context,
        asset_root: options.asset_root.clone(),
        renderer: None,
        rotate_held: false,
        pan_held: false,
        last_error: None,
    };
    event_loop.run_app(&mut app)?;

    if let Some(err) = app.last_error {
        return Err(err);
    }
    print_summary(&app.context);
    Ok(())
}

struct App {
    context: AppContext,
    asset_root: PathBuf,
    renderer: Option<Renderer>,
    rotate_held: bool,
    pan_held: bool,
    last_error: Option<anyhow::Error>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        let attributes = winit::window::Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.last_error = Some(anyhow!(WindowInitError::new("window", err)));
                event_loop.exit();
                return;
            }
        };
        match block_on(Renderer::new(Arc::clone(&window))) {
            Ok(mut renderer) => {
                renderer.load_environment(&self.asset_root);
                let size = renderer.size();
                self.context.resize(size.width, size.height);
                self.context.begin_loading(&self.asset_root);
                self.renderer = Some(renderer);
            }
            Err(err) => {
                self.last_error =
                    Some(anyhow!(WindowInitError::new("renderer", format!("{err:#}"))));
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if window_id != renderer.window_id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                self.context.request_stop();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                renderer.resize(size);
                self.context.resize(size.width, size.height);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let held = state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.rotate_held = held,
                    MouseButton::Right => self.pan_held = held,
                    _ => {}
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    // Pixel deltas arrive from touchpads; one wheel line is
                    // treated as roughly 53 pixels, matching browser behavior.
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 53.0,
                };
                self.context.controls.zoom(lines);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                let camera = self.context.camera.clone();
                match code {
                    KeyCode::Escape => {
                        self.context.request_stop();
                        event_loop.exit();
                    }
                    KeyCode::ArrowLeft => self.context.controls.key_pan(1.0, 0.0, &camera),
                    KeyCode::ArrowRight => self.context.controls.key_pan(-1.0, 0.0, &camera),
                    KeyCode::ArrowUp => self.context.controls.key_pan(0.0, 1.0, &camera),
                    KeyCode::ArrowDown => self.context.controls.key_pan(0.0, -1.0, &camera),
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                self.context.frame();
                let camera = self.context.camera.params();
                if let Err(err) = renderer.render(&self.context.scene, &camera) {
                    match err {
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                            let size = renderer.window().inner_size();
                            renderer.resize(size);
                        }
                        wgpu::SurfaceError::OutOfMemory => {
                            self.last_error = Some(anyhow!("GPU is out of memory"));
                            event_loop.exit();
                        }
                        wgpu::SurfaceError::Timeout => {
                            info!("surface timeout, retrying next frame");
                        }
                        other => {
                            self.last_error = Some(anyhow!("surface error: {other}"));
                            event_loop.exit();
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if self.rotate_held {
                self.context.controls.rotate(dx as f32, dy as f32);
            } else if self.pan_held {
                let camera = self.context.camera.clone();
                self.context.controls.pan(dx as f32, dy as f32, &camera);
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.context.should_stop() {
            event_loop.exit();
            return;
        }
        if let Some(renderer) = &self.renderer {
            renderer.window().request_redraw();
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn new(stage: &str, err: impl fmt::Display) -> Self {
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

struct CliOptions {
    asset_root: PathBuf,
    headless: bool,
    frames: u32,
    seed: Option<u64>,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(asset_root) = args.next() else {
            return Err(anyhow!(
                "Usage: crystal-scene <asset-root> [--headless] [--frames N] [--seed S]"
            ));
        };
        let mut headless = false;
        let mut frames = 300u32;
        let mut seed = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => headless = true,
                "--frames" => {
                    let value = args.next().context("--frames requires a value")?;
                    frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count: {value}"))?;
                }
                "--seed" => {
                    let value = args.next().context("--seed requires a value")?;
                    seed = Some(
                        value
                            .parse()
                            .with_context(|| format!("invalid seed: {value}"))?,
                    );
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --headless, --frames or --seed"
                    ));
                }
            }
        }
        Ok(Self {
            asset_root: PathBuf::from(asset_root),
            headless,
            frames,
            seed,
        })
    }
}
