//! Application entry point.
//!
//! Wires winit events into the platform event queue and input state, and
//! drives one frame-loop iteration per redraw. Exit code is 0 on a clean
//! window close and non-zero on a fatal device error.

use anyhow::Result;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use glam::{Mat4, Vec3};
use prism_core::Timer;
use prism_platform::{InputState, KeyCode, Window, WindowEvent as PlatformEvent};
use prism_renderer::{FrameLoop, FrameOutcome, Renderer};
use prism_scene::{ArcballController, Camera, CameraController, ControllerButton, MoveKey};

const WINDOW_TITLE: &str = "Prism";
const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;

fn map_move_key(key: KeyCode) -> Option<MoveKey> {
    match key {
        KeyCode::KeyW => Some(MoveKey::Forward),
        KeyCode::KeyS => Some(MoveKey::Backward),
        KeyCode::KeyA => Some(MoveKey::Left),
        KeyCode::KeyD => Some(MoveKey::Right),
        KeyCode::Space => Some(MoveKey::Down),
        KeyCode::ShiftLeft => Some(MoveKey::Up),
        _ => None,
    }
}

fn map_button(button: winit::event::MouseButton) -> Option<ControllerButton> {
    match button {
        winit::event::MouseButton::Left => Some(ControllerButton::Left),
        winit::event::MouseButton::Right => Some(ControllerButton::Right),
        _ => None,
    }
}

struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
    frame_loop: FrameLoop,
    input: InputState,
    timer: Timer,
    camera: Camera,
    controller: CameraController,
    start: std::time::Instant,
    fatal: Option<String>,
}

impl App {
    fn new() -> Self {
        let mut camera = Camera::default();
        camera.set_screen_size(WINDOW_WIDTH, WINDOW_HEIGHT);

        let arcball = ArcballController::new(Vec3::ZERO, 5.0);
        arcball.apply(&mut camera);

        Self {
            window: None,
            renderer: None,
            frame_loop: FrameLoop::new(),
            input: InputState::new(),
            timer: Timer::new(),
            camera,
            controller: CameraController::Arcball(arcball),
            start: std::time::Instant::now(),
            fatal: None,
        }
    }

    fn drive_frame(&mut self, event_loop: &ActiveEventLoop) {
        let delta = self.timer.delta_secs();
        self.apply_input(delta);

        let (window, renderer) = match (&self.window, &mut self.renderer) {
            (Some(window), Some(renderer)) => (window, renderer),
            _ => return,
        };

        let spin = self.start.elapsed().as_secs_f32() * 0.5;
        renderer.set_model_transform(Mat4::from_rotation_y(spin));
        renderer.set_view_proj(self.camera.view_proj_matrix());

        match self
            .frame_loop
            .run_frame(renderer, (window.width(), window.height()))
        {
            Ok(FrameOutcome::Exit) => {
                info!("Clean shutdown after {} frames", self.frame_loop.frames_rendered());
                event_loop.exit();
            }
            Ok(_) => {}
            Err(e) => {
                error!("Fatal render error: {}", e);
                self.fatal = Some(e.to_string());
                event_loop.exit();
            }
        }

        self.input.begin_frame();
    }

    /// Forwards the frame's accumulated input to the camera controller.
    fn apply_input(&mut self, delta: f32) {
        let (dx, dy) = self.input.mouse_delta();
        if dx != 0.0 || dy != 0.0 {
            self.controller.on_mouse_moved(&mut self.camera, dx, dy);
        }
        let (_, scroll_y) = self.input.scroll_delta();
        if scroll_y != 0.0 {
            self.controller.on_scroll(&mut self.camera, scroll_y);
        }
        self.controller.update(&mut self.camera, delta);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match Window::new(event_loop, WINDOW_WIDTH, WINDOW_HEIGHT, WINDOW_TITLE) {
            Ok(window) => match Renderer::new(&window) {
                Ok(renderer) => {
                    info!("Initialization complete, entering frame loop");
                    self.camera.set_screen_size(window.width(), window.height());
                    self.renderer = Some(renderer);
                    self.window = Some(window);
                }
                Err(e) => {
                    error!("Failed to create renderer: {}", e);
                    self.fatal = Some(e.to_string());
                    event_loop.exit();
                }
            },
            Err(e) => {
                error!("Failed to create window: {}", e);
                self.fatal = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.frame_loop
                    .events_mut()
                    .push(PlatformEvent::CloseRequested);
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut window) = self.window {
                    window.resize(size.width, size.height);
                }
                self.camera.set_screen_size(size.width, size.height);
                self.frame_loop.events_mut().push(PlatformEvent::Resized {
                    width: size.width,
                    height: size.height,
                });
            }
            WindowEvent::Focused(focused) => {
                self.frame_loop
                    .events_mut()
                    .push(PlatformEvent::Focused(focused));
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.frame_loop
                    .events_mut()
                    .push(PlatformEvent::ScaleFactorChanged(scale_factor));
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                        if let Some(move_key) = map_move_key(key) {
                            self.controller.on_key_pressed(move_key);
                        }
                    } else {
                        self.input.on_key_released(key);
                        if let Some(move_key) = map_move_key(key) {
                            self.controller.on_key_released(move_key);
                        }
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .on_mouse_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let mapped = map_button(button);
                if state == ElementState::Pressed {
                    self.input.on_mouse_pressed(button.into());
                    if let Some(b) = mapped {
                        self.controller.on_button_pressed(b);
                    }
                } else {
                    self.input.on_mouse_released(button.into());
                    if let Some(b) = mapped {
                        self.controller.on_button_released(b);
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(x, y) => self.input.on_scroll(x, y),
                MouseScrollDelta::PixelDelta(pos) => {
                    self.input.on_scroll(pos.x as f32, pos.y as f32 / 20.0);
                }
            },
            WindowEvent::RedrawRequested => {
                self.drive_frame(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    prism_core::init_logging();
    info!("Starting {}", WINDOW_TITLE);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;

    if let Some(fatal) = app.fatal {
        anyhow::bail!("Renderer terminated with a fatal error: {}", fatal);
    }
    Ok(())
}
