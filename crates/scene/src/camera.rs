//! Camera with lazily cached matrices.
//!
//! Every derived matrix (view, projection, view-projection and their
//! inverses) carries its own dirty flag. Mutators only set flags; the
//! matrices are recomputed on first access after a change, so a frame that
//! never asks for the inverse view-projection never pays for it.

use glam::{Mat4, Vec2, Vec3};

/// Projection parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    /// Perspective projection; aspect ratio comes from the screen size.
    Perspective { fov_y_deg: f32, near: f32, far: f32 },
    /// Orthographic projection with zoomable bounds.
    ///
    /// `zoom` scales the visible region around its center; 1.0 shows the
    /// bounds exactly, larger values zoom in.
    Orthographic {
        x_bounds: Vec2,
        y_bounds: Vec2,
        near: f32,
        far: f32,
        zoom: f32,
    },
}

/// Camera with position, orientation, and cached derived matrices.
pub struct Camera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,

    screen_size: Vec2,
    aspect_ratio: f32,
    projection: Projection,

    view_dirty: bool,
    view: Mat4,
    inv_view_dirty: bool,
    inv_view: Mat4,
    proj_dirty: bool,
    proj: Mat4,
    inv_proj_dirty: bool,
    inv_proj: Mat4,
    view_proj_dirty: bool,
    view_proj: Mat4,
    inv_view_proj_dirty: bool,
    inv_view_proj: Mat4,
}

impl Camera {
    /// Creates a camera at `position` looking along `front`.
    pub fn new(position: Vec3, front: Vec3, up: Vec3, projection: Projection) -> Self {
        let right = front.cross(up).normalize_or_zero();
        Self {
            position,
            front,
            up,
            right,
            screen_size: Vec2::new(1000.0, 1000.0),
            aspect_ratio: 1.0,
            projection,
            view_dirty: true,
            view: Mat4::IDENTITY,
            inv_view_dirty: true,
            inv_view: Mat4::IDENTITY,
            proj_dirty: true,
            proj: Mat4::IDENTITY,
            inv_proj_dirty: true,
            inv_proj: Mat4::IDENTITY,
            view_proj_dirty: true,
            view_proj: Mat4::IDENTITY,
            inv_view_proj_dirty: true,
            inv_view_proj: Mat4::IDENTITY,
        }
    }

    /// Translates the camera.
    pub fn move_by(&mut self, delta: Vec3) {
        self.position += delta;
        self.recalculate_right();
        self.mark_view_dirty();
    }

    /// Points the camera at a world-space target.
    pub fn look_at(&mut self, target: Vec3) {
        self.front = (target - self.position).normalize();
        self.recalculate_right();
        self.mark_view_dirty();
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.recalculate_right();
        self.mark_view_dirty();
    }

    pub fn set_front(&mut self, front: Vec3) {
        self.front = front;
        self.recalculate_right();
        self.mark_view_dirty();
    }

    /// Updates screen size and the derived aspect ratio.
    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.screen_size = Vec2::new(width as f32, height as f32);
        self.aspect_ratio = width as f32 / height as f32;
        self.mark_proj_dirty();
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.mark_proj_dirty();
    }

    /// Adjusts the orthographic zoom; no-op for perspective cameras.
    pub fn set_ortho_zoom(&mut self, new_zoom: f32) {
        if let Projection::Orthographic { zoom, .. } = &mut self.projection {
            *zoom = new_zoom;
            self.mark_proj_dirty();
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn front(&self) -> Vec3 {
        self.front
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.right
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.up
    }

    #[inline]
    pub fn projection(&self) -> Projection {
        self.projection
    }

    #[inline]
    pub fn screen_size(&self) -> Vec2 {
        self.screen_size
    }

    /// View matrix, recomputed if the camera moved since last access.
    pub fn view_matrix(&mut self) -> Mat4 {
        if self.view_dirty {
            self.view = Mat4::look_at_rh(self.position, self.position + self.front, Vec3::Y);
            self.view_dirty = false;
        }
        self.view
    }

    /// Inverse view matrix.
    pub fn inv_view_matrix(&mut self) -> Mat4 {
        if self.inv_view_dirty {
            self.inv_view = self.view_matrix().inverse();
            self.inv_view_dirty = false;
        }
        self.inv_view
    }

    /// Projection matrix with the Vulkan Y-flip applied.
    pub fn proj_matrix(&mut self) -> Mat4 {
        if self.proj_dirty {
            let mut proj = match self.projection {
                Projection::Perspective { fov_y_deg, near, far } => {
                    Mat4::perspective_rh(fov_y_deg.to_radians(), self.aspect_ratio, near, far)
                }
                Projection::Orthographic {
                    x_bounds,
                    y_bounds,
                    near,
                    far,
                    zoom,
                } => {
                    let x_center = 0.5 * (x_bounds.x + x_bounds.y);
                    let y_center = 0.5 * (y_bounds.x + y_bounds.y);
                    let inv_zoom = 1.0 / zoom;
                    let x_half = 0.5 * (x_bounds.y - x_bounds.x) * inv_zoom;
                    let y_half = 0.5 * (y_bounds.y - y_bounds.x) * inv_zoom;
                    Mat4::orthographic_rh(
                        x_center - x_half,
                        x_center + x_half,
                        y_center - y_half,
                        y_center + y_half,
                        near,
                        far,
                    )
                }
            };
            // Vulkan clip space has Y pointing down
            proj.y_axis.y *= -1.0;
            self.proj = proj;
            self.proj_dirty = false;
        }
        self.proj
    }

    /// Inverse projection matrix.
    pub fn inv_proj_matrix(&mut self) -> Mat4 {
        if self.inv_proj_dirty {
            self.inv_proj = self.proj_matrix().inverse();
            self.inv_proj_dirty = false;
        }
        self.inv_proj
    }

    /// Combined view-projection matrix.
    pub fn view_proj_matrix(&mut self) -> Mat4 {
        if self.view_proj_dirty {
            self.view_proj = self.proj_matrix() * self.view_matrix();
            self.view_proj_dirty = false;
        }
        self.view_proj
    }

    /// Inverse view-projection matrix.
    pub fn inv_view_proj_matrix(&mut self) -> Mat4 {
        if self.inv_view_proj_dirty {
            self.inv_view_proj = self.view_proj_matrix().inverse();
            self.inv_view_proj_dirty = false;
        }
        self.inv_view_proj
    }

    fn recalculate_right(&mut self) {
        self.right = self.front.cross(self.up).normalize_or_zero();
    }

    fn mark_view_dirty(&mut self) {
        self.view_dirty = true;
        self.inv_view_dirty = true;
        self.view_proj_dirty = true;
        self.inv_view_proj_dirty = true;
    }

    fn mark_proj_dirty(&mut self) {
        self.proj_dirty = true;
        self.inv_proj_dirty = true;
        self.view_proj_dirty = true;
        self.inv_view_proj_dirty = true;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::Z,
            Vec3::Y,
            Projection::Perspective {
                fov_y_deg: 45.0,
                near: 0.1,
                far: 1000.0,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera() -> Camera {
        let mut camera = Camera::default();
        camera.set_screen_size(1600, 900);
        camera
    }

    #[test]
    fn test_move_invalidates_view_but_not_projection() {
        let mut camera = test_camera();
        let proj_before = camera.proj_matrix();
        let view_before = camera.view_matrix();

        camera.move_by(Vec3::new(1.0, 0.0, 0.0));

        assert_ne!(camera.view_matrix(), view_before);
        assert_eq!(camera.proj_matrix(), proj_before);
    }

    #[test]
    fn test_screen_size_invalidates_projection_and_view_proj() {
        let mut camera = test_camera();
        let vp_before = camera.view_proj_matrix();
        let view_before = camera.view_matrix();

        camera.set_screen_size(800, 600);

        assert_ne!(camera.view_proj_matrix(), vp_before);
        assert_eq!(camera.view_matrix(), view_before);
    }

    #[test]
    fn test_view_proj_is_product_of_parts() {
        let mut camera = test_camera();
        let expected = camera.proj_matrix() * camera.view_matrix();
        assert_eq!(camera.view_proj_matrix(), expected);
    }

    #[test]
    fn test_inverse_round_trip() {
        let mut camera = test_camera();
        let identity = camera.view_proj_matrix() * camera.inv_view_proj_matrix();
        let diff = (identity - Mat4::IDENTITY).to_cols_array();
        assert!(diff.iter().all(|v| v.abs() < 1e-4));
    }

    #[test]
    fn test_vulkan_y_flip() {
        let mut camera = test_camera();
        let proj = camera.proj_matrix();
        // RH perspective has positive y scale before the flip
        assert!(proj.y_axis.y < 0.0);
    }

    #[test]
    fn test_look_at_normalizes_front() {
        let mut camera = test_camera();
        camera.set_position(Vec3::ZERO);
        camera.look_at(Vec3::new(0.0, 0.0, 10.0));
        assert!((camera.front().length() - 1.0).abs() < 1e-6);
        assert_eq!(camera.front(), Vec3::Z);
    }

    #[test]
    fn test_zero_screen_size_ignored() {
        let mut camera = test_camera();
        let proj_before = camera.proj_matrix();
        camera.set_screen_size(0, 0);
        assert_eq!(camera.proj_matrix(), proj_before);
    }

    #[test]
    fn test_ortho_zoom_shrinks_visible_region() {
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
        let wide = camera.proj_matrix();
        camera.set_ortho_zoom(2.0);
        let tight = camera.proj_matrix();
        // Zooming in scales clip coordinates up
        assert!(tight.x_axis.x > wide.x_axis.x);
    }
}
