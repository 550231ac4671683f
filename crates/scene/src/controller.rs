//! Camera controllers.
//!
//! Controllers translate raw input deltas into camera motion. They are
//! deliberately decoupled from any windowing library: the application layer
//! maps its own key and button events into [`MoveKey`] and
//! [`ControllerButton`] before forwarding them here.

use glam::{Vec2, Vec3};

use crate::camera::{Camera, Projection};

/// Mouse buttons a controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerButton {
    Left,
    Right,
}

/// Movement keys for the flight controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKey {
    Forward,
    Backward,
    Left,
    Right,
    Down,
    Up,
}

/// Closed set of camera controllers.
pub enum CameraController {
    Arcball(ArcballController),
    Flight(FlightController),
    Ortho(OrthoController),
}

impl CameraController {
    pub fn on_mouse_moved(&mut self, camera: &mut Camera, dx: f32, dy: f32) {
        match self {
            CameraController::Arcball(c) => c.on_mouse_moved(camera, dx, dy),
            CameraController::Flight(c) => c.on_mouse_moved(camera, dx, dy),
            CameraController::Ortho(c) => c.on_mouse_moved(camera, dx, dy),
        }
    }

    pub fn on_button_pressed(&mut self, button: ControllerButton) {
        match self {
            CameraController::Arcball(c) => c.on_button_pressed(button),
            CameraController::Flight(_) => {}
            CameraController::Ortho(c) => c.on_button_pressed(button),
        }
    }

    pub fn on_button_released(&mut self, button: ControllerButton) {
        match self {
            CameraController::Arcball(c) => c.on_button_released(button),
            CameraController::Flight(_) => {}
            CameraController::Ortho(c) => c.on_button_released(button),
        }
    }

    pub fn on_key_pressed(&mut self, key: MoveKey) {
        if let CameraController::Flight(c) = self {
            c.on_key_pressed(key);
        }
    }

    pub fn on_key_released(&mut self, key: MoveKey) {
        if let CameraController::Flight(c) = self {
            c.on_key_released(key);
        }
    }

    pub fn on_scroll(&mut self, camera: &mut Camera, delta_y: f32) {
        match self {
            CameraController::Arcball(c) => c.on_scroll(camera, delta_y),
            CameraController::Flight(c) => c.on_scroll(delta_y),
            CameraController::Ortho(c) => c.on_scroll(camera, delta_y),
        }
    }

    /// Per-frame update; only the flight controller moves continuously.
    pub fn update(&mut self, camera: &mut Camera, delta_seconds: f32) {
        if let CameraController::Flight(c) = self {
            c.update(camera, delta_seconds);
        }
    }

    pub fn set_mouse_captured(&mut self, captured: bool) {
        if let CameraController::Flight(c) = self {
            c.set_mouse_captured(captured);
        }
    }
}

/// Orbits the camera around a fixed target.
///
/// Left-drag orbits, right-drag pans the target in the view plane, and the
/// scroll wheel moves the camera along the view ray.
pub struct ArcballController {
    target: Vec3,
    distance: f32,
    yaw: f32,
    pitch: f32,
    rotate_speed: f32,
    pan_speed: f32,
    left_held: bool,
    right_held: bool,
}

const ARCBALL_MIN_DISTANCE: f32 = 1.0;
const ARCBALL_PITCH_LIMIT: f32 = 89.0 * std::f32::consts::PI / 180.0;

impl ArcballController {
    pub fn new(target: Vec3, distance: f32) -> Self {
        Self {
            target,
            distance: distance.max(ARCBALL_MIN_DISTANCE),
            yaw: std::f32::consts::FRAC_PI_2,
            pitch: 0.0,
            rotate_speed: 0.005,
            pan_speed: 1.0,
            left_held: false,
            right_held: false,
        }
    }

    /// Places `camera` on the orbit sphere and points it at the target.
    pub fn apply(&self, camera: &mut Camera) {
        let offset = Vec3::new(
            self.distance * self.pitch.cos() * self.yaw.cos(),
            -self.distance * self.pitch.sin(),
            self.distance * self.pitch.cos() * self.yaw.sin(),
        );
        camera.set_position(self.target + offset);
        camera.look_at(self.target);
    }

    pub fn on_button_pressed(&mut self, button: ControllerButton) {
        match button {
            ControllerButton::Left => self.left_held = true,
            ControllerButton::Right => self.right_held = true,
        }
    }

    pub fn on_button_released(&mut self, button: ControllerButton) {
        match button {
            ControllerButton::Left => self.left_held = false,
            ControllerButton::Right => self.right_held = false,
        }
    }

    pub fn on_mouse_moved(&mut self, camera: &mut Camera, dx: f32, dy: f32) {
        if self.left_held {
            self.yaw += dx * self.rotate_speed;
            self.pitch = (self.pitch + dy * self.rotate_speed)
                .clamp(-ARCBALL_PITCH_LIMIT, ARCBALL_PITCH_LIMIT);
            self.apply(camera);
        } else if self.right_held {
            let pan =
                (camera.right() * -dx + camera.up() * -dy) * self.pan_speed * 0.01;
            self.target += pan;
            self.apply(camera);
        }
    }

    pub fn on_scroll(&mut self, camera: &mut Camera, delta_y: f32) {
        self.distance = (self.distance - delta_y).max(ARCBALL_MIN_DISTANCE);
        self.apply(camera);
    }

    #[inline]
    pub fn target(&self) -> Vec3 {
        self.target
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }
}

/// Free-flight controller with WASD-style movement.
///
/// All motion is gated on the mouse being captured so the camera stays put
/// while the cursor interacts with other surfaces.
pub struct FlightController {
    yaw_deg: f32,
    pitch_deg: f32,
    move_speed: f32,
    sensitivity: f32,
    mouse_captured: bool,
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    down: bool,
    up: bool,
}

const FLIGHT_MIN_SPEED: f32 = 0.5;
const FLIGHT_MAX_SPEED: f32 = 300.0;

impl FlightController {
    pub fn new() -> Self {
        Self {
            yaw_deg: 90.0,
            pitch_deg: 0.0,
            move_speed: 10.0,
            sensitivity: 0.1,
            mouse_captured: false,
            forward: false,
            backward: false,
            left: false,
            right: false,
            down: false,
            up: false,
        }
    }

    pub fn set_mouse_captured(&mut self, captured: bool) {
        self.mouse_captured = captured;
    }

    pub fn on_key_pressed(&mut self, key: MoveKey) {
        self.set_key(key, true);
    }

    pub fn on_key_released(&mut self, key: MoveKey) {
        self.set_key(key, false);
    }

    fn set_key(&mut self, key: MoveKey, held: bool) {
        match key {
            MoveKey::Forward => self.forward = held,
            MoveKey::Backward => self.backward = held,
            MoveKey::Left => self.left = held,
            MoveKey::Right => self.right = held,
            MoveKey::Down => self.down = held,
            MoveKey::Up => self.up = held,
        }
    }

    pub fn on_mouse_moved(&mut self, camera: &mut Camera, dx: f32, dy: f32) {
        if !self.mouse_captured {
            return;
        }
        self.yaw_deg += dx * self.sensitivity;
        self.pitch_deg = (self.pitch_deg - dy * self.sensitivity).clamp(-89.0, 89.0);
        // keep yaw bounded so precision does not degrade over long sessions
        if self.yaw_deg > 360.0 {
            self.yaw_deg -= 360.0;
        } else if self.yaw_deg < -360.0 {
            self.yaw_deg += 360.0;
        }

        let yaw = self.yaw_deg.to_radians();
        let pitch = self.pitch_deg.to_radians();
        let front = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        camera.set_front(front);
    }

    pub fn on_scroll(&mut self, delta_y: f32) {
        self.move_speed =
            (self.move_speed * (1.0 + delta_y * 0.05)).clamp(FLIGHT_MIN_SPEED, FLIGHT_MAX_SPEED);
    }

    pub fn update(&mut self, camera: &mut Camera, delta_seconds: f32) {
        if !self.mouse_captured {
            return;
        }
        let mut direction = Vec3::ZERO;
        if self.forward {
            direction += camera.front();
        }
        if self.backward {
            direction -= camera.front();
        }
        if self.right {
            direction += camera.right();
        }
        if self.left {
            direction -= camera.right();
        }
        if self.down {
            direction -= Vec3::Y;
        }
        if self.up {
            direction += Vec3::Y;
        }
        if direction != Vec3::ZERO {
            camera.move_by(direction.normalize() * self.move_speed * delta_seconds);
        }
    }

    #[inline]
    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    #[inline]
    pub fn pitch_deg(&self) -> f32 {
        self.pitch_deg
    }
}

impl Default for FlightController {
    fn default() -> Self {
        Self::new()
    }
}

/// Pan-and-zoom controller for an orthographic camera.
///
/// Left-drag pans by world units per pixel so the scene tracks the cursor
/// exactly at every zoom level; scrolling zooms around the view center.
pub struct OrthoController {
    zoom: f32,
    pan_speed: f32,
    left_held: bool,
    units_per_pixel: Vec2,
}

const ORTHO_MIN_ZOOM: f32 = 0.1;

impl OrthoController {
    pub fn new() -> Self {
        Self {
            zoom: 1.0,
            pan_speed: 1.0,
            left_held: false,
            units_per_pixel: Vec2::ONE,
        }
    }

    /// Recomputes the world-units-per-pixel factors from the camera's
    /// orthographic bounds, the current zoom, and the screen size.
    pub fn refresh_scale(&mut self, camera: &Camera) {
        if let Projection::Orthographic {
            x_bounds, y_bounds, ..
        } = camera.projection()
        {
            let screen = camera.screen_size();
            let visible_x = (x_bounds.y - x_bounds.x) / self.zoom;
            let visible_y = (y_bounds.y - y_bounds.x) / self.zoom;
            self.units_per_pixel = Vec2::new(visible_x / screen.x, visible_y / screen.y);
        }
    }

    pub fn on_button_pressed(&mut self, button: ControllerButton) {
        if button == ControllerButton::Left {
            self.left_held = true;
        }
    }

    pub fn on_button_released(&mut self, button: ControllerButton) {
        if button == ControllerButton::Left {
            self.left_held = false;
        }
    }

    pub fn on_mouse_moved(&mut self, camera: &mut Camera, dx: f32, dy: f32) {
        if !self.left_held {
            return;
        }
        let pan = (camera.right() * (-dx * self.units_per_pixel.x)
            + camera.up() * (dy * self.units_per_pixel.y))
            * self.pan_speed
            * 0.01;
        camera.move_by(pan);
    }

    pub fn on_scroll(&mut self, camera: &mut Camera, delta_y: f32) {
        self.zoom = (self.zoom + delta_y * 0.1).max(ORTHO_MIN_ZOOM);
        camera.set_ortho_zoom(self.zoom);
        self.refresh_scale(camera);
    }

    #[inline]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }
}

impl Default for OrthoController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perspective_camera() -> Camera {
        let mut camera = Camera::default();
        camera.set_screen_size(1280, 720);
        camera
    }

    fn ortho_camera() -> Camera {
        let mut camera = Camera::new(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::Z,
            Vec3::Y,
            Projection::Orthographic {
                x_bounds: Vec2::new(-10.0, 10.0),
                y_bounds: Vec2::new(-10.0, 10.0),
                near: 0.1,
                far: 100.0,
                zoom: 1.0,
            },
        );
        camera.set_screen_size(1000, 1000);
        camera
    }

    #[test]
    fn test_arcball_pitch_clamps() {
        let mut camera = perspective_camera();
        let mut arcball = ArcballController::new(Vec3::ZERO, 10.0);
        arcball.on_button_pressed(ControllerButton::Left);
        arcball.on_mouse_moved(&mut camera, 0.0, 100_000.0);
        assert!(arcball.pitch() <= ARCBALL_PITCH_LIMIT + 1e-6);
        arcball.on_mouse_moved(&mut camera, 0.0, -200_000.0);
        assert!(arcball.pitch() >= -ARCBALL_PITCH_LIMIT - 1e-6);
    }

    #[test]
    fn test_arcball_zoom_respects_min_distance() {
        let mut camera = perspective_camera();
        let mut arcball = ArcballController::new(Vec3::ZERO, 5.0);
        arcball.on_scroll(&mut camera, 100.0);
        assert_eq!(arcball.distance(), 1.0);
    }

    #[test]
    fn test_arcball_keeps_camera_on_sphere() {
        let mut camera = perspective_camera();
        let mut arcball = ArcballController::new(Vec3::new(1.0, 2.0, 3.0), 8.0);
        arcball.on_button_pressed(ControllerButton::Left);
        arcball.on_mouse_moved(&mut camera, 37.0, -12.0);
        let radius = (camera.position() - arcball.target()).length();
        assert!((radius - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_arcball_ignores_motion_without_button() {
        let mut camera = perspective_camera();
        let mut arcball = ArcballController::new(Vec3::ZERO, 5.0);
        arcball.apply(&mut camera);
        let position = camera.position();
        arcball.on_mouse_moved(&mut camera, 50.0, 50.0);
        assert_eq!(camera.position(), position);
    }

    #[test]
    fn test_flight_requires_mouse_capture() {
        let mut camera = perspective_camera();
        let mut flight = FlightController::new();
        let front = camera.front();
        let position = camera.position();

        flight.on_mouse_moved(&mut camera, 30.0, 0.0);
        flight.on_key_pressed(MoveKey::Forward);
        flight.update(&mut camera, 0.016);
        assert_eq!(camera.front(), front);
        assert_eq!(camera.position(), position);

        flight.set_mouse_captured(true);
        flight.update(&mut camera, 0.016);
        assert_ne!(camera.position(), position);
    }

    #[test]
    fn test_flight_speed_clamps() {
        let mut flight = FlightController::new();
        for _ in 0..200 {
            flight.on_scroll(10.0);
        }
        assert_eq!(flight.move_speed(), FLIGHT_MAX_SPEED);
        for _ in 0..400 {
            flight.on_scroll(-10.0);
        }
        assert_eq!(flight.move_speed(), FLIGHT_MIN_SPEED);
    }

    #[test]
    fn test_flight_pitch_clamps() {
        let mut camera = perspective_camera();
        let mut flight = FlightController::new();
        flight.set_mouse_captured(true);
        flight.on_mouse_moved(&mut camera, 0.0, -10_000.0);
        assert_eq!(flight.pitch_deg(), 89.0);
    }

    #[test]
    fn test_flight_opposed_keys_cancel() {
        let mut camera = perspective_camera();
        let mut flight = FlightController::new();
        flight.set_mouse_captured(true);
        flight.on_key_pressed(MoveKey::Forward);
        flight.on_key_pressed(MoveKey::Backward);
        let position = camera.position();
        flight.update(&mut camera, 0.016);
        assert_eq!(camera.position(), position);
    }

    #[test]
    fn test_ortho_zoom_floor() {
        let mut camera = ortho_camera();
        let mut ortho = OrthoController::new();
        for _ in 0..100 {
            ortho.on_scroll(&mut camera, -10.0);
        }
        assert_eq!(ortho.zoom(), ORTHO_MIN_ZOOM);
    }

    #[test]
    fn test_ortho_pan_scales_with_zoom() {
        let mut camera = ortho_camera();
        let mut ortho = OrthoController::new();
        ortho.refresh_scale(&camera);
        ortho.on_button_pressed(ControllerButton::Left);

        let start = camera.position();
        ortho.on_mouse_moved(&mut camera, 100.0, 0.0);
        let coarse = (camera.position() - start).length();

        // Zoomed in, the same pixel drag covers fewer world units
        ortho.on_scroll(&mut camera, 10.0);
        let start = camera.position();
        ortho.on_mouse_moved(&mut camera, 100.0, 0.0);
        let fine = (camera.position() - start).length();
        assert!(fine < coarse);
    }

    #[test]
    fn test_ortho_ignores_motion_without_button() {
        let mut camera = ortho_camera();
        let mut ortho = OrthoController::new();
        ortho.refresh_scale(&camera);
        let position = camera.position();
        ortho.on_mouse_moved(&mut camera, 40.0, 40.0);
        assert_eq!(camera.position(), position);
    }
}
