//! Local shadertoy.
//!
//! Renders a procedural scene into a fixed-size window with several frames
//! in flight. Settings come from `shadertoy.toml` in the working directory,
//! or from the file named by `SHADERTOY_CONFIG`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use shadertoy_core::{AppConfig, Timer};
use shadertoy_platform::{InputState, KeyCode, Window};
use shadertoy_renderer::{FrameOutcome, ShadertoyRenderer};

const CONFIG_ENV: &str = "SHADERTOY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "shadertoy.toml";
const FRAME_RATE_LOG_INTERVAL: Duration = Duration::from_secs(2);

struct App {
    config: AppConfig,
    // Dropped before the window it renders into
    renderer: Option<ShadertoyRenderer>,
    window: Option<Window>,
    input: InputState,
    frame_timer: Timer,
    frame_time: Duration,
    frame_count: u32,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            input: InputState::new(),
            frame_timer: Timer::new(),
            frame_time: Duration::ZERO,
            frame_count: 0,
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(
            event_loop,
            self.config.width(),
            self.config.height(),
            &self.config.title,
        )
        .context("Failed to create window")?;
        let renderer = ShadertoyRenderer::new(&window, &self.config)
            .context("Failed to create renderer")?;

        info!("Initialization complete, entering main loop");
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(window)) = (self.renderer.as_mut(), self.window.as_ref()) else {
            return;
        };

        let result = renderer.render_frame(window, &self.input);
        self.track_frame_rate();

        match result {
            Ok(FrameOutcome::Presented) => {}
            Ok(outcome) => debug!("Frame not presented: {:?}", outcome),
            Err(e) => {
                let err = anyhow::Error::new(e).context("Frame failed");
                self.fail(event_loop, err);
            }
        }
    }

    fn track_frame_rate(&mut self) {
        self.frame_time += self.frame_timer.tick();
        self.frame_count += 1;
        if self.frame_time >= FRAME_RATE_LOG_INTERVAL {
            let fps = self.frame_count as f32 / self.frame_time.as_secs_f32();
            debug!("{:.1} fps over {} frame(s)", fps, self.frame_count);
            self.frame_time = Duration::ZERO;
            self.frame_count = 0;
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            let stats = renderer.stats();
            if let Err(e) = renderer.shutdown() {
                error!("Renderer shutdown failed: {}", e);
            }
            info!(
                "Frames: {} total, {} presented, {} dropped, {} surface rebuild(s)",
                stats.frames, stats.presented, stats.dropped, stats.surface_rebuilds
            );
        }
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                if let Some(window) = self.window.as_mut() {
                    window.request_close();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                // The surface is rebuilt lazily by the frame loop
                debug!("Window resized to {}x{}", size.width, size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .on_pointer_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.input.on_key_pressed(key),
                        ElementState::Released => self.input.on_key_released(key),
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if self
                    .window
                    .as_ref()
                    .is_some_and(|window| window.is_being_closed())
                {
                    return;
                }
                self.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.input.is_key_just_pressed(KeyCode::Escape)
            && let Some(window) = self.window.as_mut()
        {
            info!("Escape pressed, shutting down");
            window.request_close();
            event_loop.exit();
        }
        self.input.begin_frame();

        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn main() -> Result<()> {
    shadertoy_core::init_logging();
    info!("Starting shadertoy");

    let path = config_path();
    let config = AppConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load config {:?}", path))?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    app.shutdown();

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
