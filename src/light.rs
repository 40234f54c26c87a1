use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Row-major view transform of the demo light.
pub const DEFAULT_LIGHT_VIEW_ROWS: [[f32; 4]; 4] = [
    [6.1826736e-01, -1.7682267e-02, 7.8576899e-01, 0.0000000e+00],
    [6.8335772e-01, 5.0599408e-01, -5.2630055e-01, -6.2286854e-06],
    [-3.8828495e-01, 8.6235815e-01, 3.2492039e-01, -1.2934189e+00],
    [0.0000000e+00, 0.0000000e+00, 0.0000000e+00, 1.0000000e+00],
];

/// Builds a matrix from rows as they are usually written down.
pub fn mat4_from_rows(rows: &[[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(rows).transpose()
}

/// Shadow casting light: a fixed perspective projection looking through a
/// fixed view transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub projection: Mat4,
    pub view: Mat4,
}

impl Light {
    pub fn new(projection: Mat4, view: Mat4) -> Self {
        Self { projection, view }
    }

    /// World space position, the translation column of the inverse view.
    pub fn position(&self) -> Vec3 {
        self.view.inverse().w_axis.truncate()
    }

    pub fn projection_view(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Phong material shared by every object of the demo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    /// Shininess, 0 to 127.
    pub specular_exp: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec3::new(0.8, 0.7, 0.9),
            diffuse: Vec3::new(0.8, 0.241, 0.282),
            specular: Vec3::ONE,
            specular_exp: 50.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_light() -> Light {
        let projection = Mat4::perspective_rh(45f32.to_radians(), 1.0, 0.01, 10000.0);
        Light::new(projection, mat4_from_rows(&DEFAULT_LIGHT_VIEW_ROWS))
    }

    #[test]
    fn inverse_view_round_trips_to_identity() {
        let light = demo_light();
        let product = light.view.inverse() * light.view;
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn position_is_inverse_view_translation() {
        let light = demo_light();
        let position = light.position();
        assert_eq!(position, light.view.inverse().col(3).truncate());
        // The view maps the light position onto the eye at the origin.
        let eye = light.view.transform_point3(position);
        assert!(eye.abs_diff_eq(Vec3::ZERO, 1e-5), "{eye}");
        assert!((position.length() - 1.2934189).abs() < 1e-4);
    }

    #[test]
    fn rows_are_transposed_into_columns() {
        let view = mat4_from_rows(&DEFAULT_LIGHT_VIEW_ROWS);
        assert_eq!(view.row(2).w, -1.2934189);
        assert_eq!(view.w_axis.z, -1.2934189);
    }

    #[test]
    fn projection_view_composes_in_order() {
        let light = demo_light();
        let point = Vec3::new(0.1, -0.2, 0.3);
        let expected = light
            .projection
            .project_point3(light.view.transform_point3(point));
        let actual = light.projection_view().project_point3(point);
        assert!(actual.abs_diff_eq(expected, 1e-5));
    }
}
