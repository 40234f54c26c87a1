use glam::{Mat3, Mat4, Quat, Vec2, Vec3};

use crate::geometry::Bounds;
use crate::program::DynamicUniform;

/// View and projection of whatever is looking at the scene this frame.
///
/// Every object is drawn with an identity model matrix, so the model-view
/// is the view itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
}

impl CameraMatrices {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self { view, projection }
    }

    pub fn modelview(&self) -> Mat4 {
        self.view
    }

    pub fn projection_modelview(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Inverse transpose of the model-view's upper 3x3, widened back to 4x4.
    pub fn normal_modelview(&self) -> Mat4 {
        Mat4::from_mat3(Mat3::from_mat4(self.view).inverse().transpose())
    }

    pub fn resolve(&self, uniform: DynamicUniform) -> Mat4 {
        match uniform {
            DynamicUniform::Modelview => self.modelview(),
            DynamicUniform::ProjectionModelview => self.projection_modelview(),
            DynamicUniform::NormalModelview => self.normal_modelview(),
        }
    }
}

/// Trackball camera orbiting a target point.
///
/// Pointer drags rotate the view about an axis perpendicular to the drag,
/// so any orientation is reachable (there is no fixed up vector).
#[derive(Debug, Clone)]
pub struct TrackballCamera {
    pub target: Vec3,
    pub distance: f32,
    pub rotation: Quat,
    pub fov_y: f32,
    pub min_distance: f32,
    /// Radians per pixel of drag.
    pub rotate_speed: f32,
    /// Fraction of the view distance per pixel of drag.
    pub pan_speed: f32,
    /// Fraction of the view distance per wheel line.
    pub zoom_speed: f32,
}

impl Default for TrackballCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 3.0,
            rotation: Quat::IDENTITY,
            fov_y: 45f32.to_radians(),
            min_distance: 1e-3,
            rotate_speed: 0.005,
            pan_speed: 0.0015,
            zoom_speed: 0.1,
        }
    }
}

impl TrackballCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Centres the camera on `bounds` at a distance where the bounding
    /// sphere fills the vertical field of view.
    pub fn fit_bounds(&mut self, bounds: &Bounds) {
        self.target = bounds.center();
        let radius = bounds.radius().max(1e-3);
        self.distance = radius / (self.fov_y * 0.5).sin();
        self.min_distance = radius * 1e-3;
    }

    pub fn eye(&self) -> Vec3 {
        self.target + self.rotation * Vec3::new(0.0, 0.0, self.distance)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.eye()).inverse()
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        let near = (self.distance * 0.01).max(1e-4);
        let far = self.distance * 100.0;
        Mat4::perspective_rh(self.fov_y, aspect.max(0.01), near, far)
    }

    pub fn matrices(&self, aspect: f32) -> CameraMatrices {
        CameraMatrices::new(self.view(), self.projection(aspect))
    }

    /// Rotates by a pointer drag given in pixels (x right, y down).
    pub fn rotate_by_pixels(&mut self, delta: Vec2) {
        let angle = delta.length() * self.rotate_speed;
        if angle <= f32::EPSILON {
            return;
        }
        // Dragging right turns the scene right, i.e. the camera orbits left.
        let axis = Vec3::new(delta.y, delta.x, 0.0).normalize();
        self.rotation = (self.rotation * Quat::from_axis_angle(axis, -angle)).normalize();
    }

    /// Slides the target in the view plane by a pointer drag in pixels.
    pub fn pan_by_pixels(&mut self, delta: Vec2) {
        let offset = Vec3::new(-delta.x, delta.y, 0.0) * self.distance * self.pan_speed;
        self.target += self.rotation * offset;
    }

    /// Positive `lines` moves towards the target.
    pub fn zoom(&mut self, lines: f32) {
        let factor = (1.0 - self.zoom_speed).powf(lines);
        self.distance = (self.distance * factor).max(self.min_distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bounds() -> Bounds {
        Bounds {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        }
    }

    #[test]
    fn view_maps_eye_to_origin_and_target_ahead() {
        let mut camera = TrackballCamera::new();
        camera.fit_bounds(&unit_bounds());
        camera.rotate_by_pixels(Vec2::new(120.0, -45.0));
        let view = camera.view();
        assert!(view.transform_point3(camera.eye()).abs_diff_eq(Vec3::ZERO, 1e-4));
        let target = view.transform_point3(camera.target);
        assert!(target.truncate().length() < 1e-4);
        assert!((target.z + camera.distance).abs() < 1e-4);
    }

    #[test]
    fn fit_bounds_contains_bounding_sphere() {
        let mut camera = TrackballCamera::new();
        camera.fit_bounds(&unit_bounds());
        assert_eq!(camera.target, Vec3::ZERO);
        let radius = 3f32.sqrt();
        assert!((camera.distance * (camera.fov_y * 0.5).sin() - radius).abs() < 1e-5);
    }

    #[test]
    fn rotation_keeps_distance() {
        let mut camera = TrackballCamera::new();
        let before = camera.eye().distance(camera.target);
        camera.rotate_by_pixels(Vec2::new(300.0, 10.0));
        camera.rotate_by_pixels(Vec2::new(-20.0, 90.0));
        let after = camera.eye().distance(camera.target);
        assert!((before - after).abs() < 1e-4);
        assert_ne!(camera.rotation, Quat::IDENTITY);
    }

    #[test]
    fn zoom_never_passes_the_target() {
        let mut camera = TrackballCamera::new();
        camera.zoom(1.0);
        assert!(camera.distance < 3.0);
        camera.zoom(10_000.0);
        assert!((camera.distance - camera.min_distance).abs() < 1e-6);
        camera.zoom(-2.0);
        assert!(camera.distance > camera.min_distance);
    }

    #[test]
    fn pan_moves_target_in_view_plane() {
        let mut camera = TrackballCamera::new();
        camera.pan_by_pixels(Vec2::new(10.0, 0.0));
        assert!(camera.target.x < 0.0);
        assert!(camera.target.z.abs() < 1e-6);
    }

    #[test]
    fn resolves_dynamic_uniforms() {
        let view =
            Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)) * Mat4::from_scale(Vec3::splat(2.0));
        let projection = Mat4::perspective_rh(1.0, 1.5, 0.1, 10.0);
        let matrices = CameraMatrices::new(view, projection);
        assert_eq!(matrices.resolve(DynamicUniform::Modelview), view);
        assert_eq!(
            matrices.resolve(DynamicUniform::ProjectionModelview),
            projection * view
        );
        let normal = matrices.resolve(DynamicUniform::NormalModelview);
        let n = normal.transform_vector3(Vec3::Y);
        assert!(n.abs_diff_eq(Vec3::Y * 0.5, 1e-6));
    }
}
