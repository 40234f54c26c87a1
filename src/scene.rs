use std::sync::Arc;

use glam::Vec3;

use crate::geometry::{Bounds, Geometry};
use crate::light::{Light, Material};
use crate::program::{create_shadow_programs, DrawProgram};

/// Horizontal scale applied to the unit floor quad.
pub const FLOOR_SCALE: f32 = 0.35;

/// Flat quad under `mesh`: sits at the mesh's lowest Y, spans
/// `[-scale, scale]` in X and Z, faces up.
pub fn make_floor(mesh: &Geometry, scale: f32) -> Geometry {
    let floor_y = mesh.min_y().unwrap_or(0.0);
    let corners = [[-1.0, 1.0], [-1.0, -1.0], [1.0, -1.0], [1.0, 1.0]];
    let verts = corners
        .iter()
        .map(|[x, z]| Vec3::new(x * scale, floor_y, z * scale))
        .collect();
    Geometry::new(verts, vec![[0, 1, 2], [2, 3, 0]]).with_normals(vec![Vec3::Y; 4])
}

/// Parallel depth and color programs, one pair per geometry.
///
/// Program order is paint order.
#[derive(Debug, Clone)]
pub struct ShadowScene {
    pub depth: Vec<DrawProgram>,
    pub color: Vec<DrawProgram>,
}

impl ShadowScene {
    /// Builds programs for `mesh` followed by its floor.
    pub fn assemble(mesh: Geometry, light: &Light, material: &Material, floor_scale: f32) -> Self {
        let floor = make_floor(&mesh, floor_scale);
        Self::from_geometries([mesh, floor], light, material)
    }

    pub fn from_geometries(
        geometries: impl IntoIterator<Item = Geometry>,
        light: &Light,
        material: &Material,
    ) -> Self {
        let (depth, color) = geometries
            .into_iter()
            .map(|geometry| create_shadow_programs(&Arc::new(geometry), light, material))
            .unzip();
        Self { depth, color }
    }

    pub fn len(&self) -> usize {
        self.color.len()
    }

    pub fn is_empty(&self) -> bool {
        self.color.is_empty()
    }

    /// Union of the color programs' bounds.
    pub fn bounds(&self) -> Option<Bounds> {
        self.color
            .iter()
            .filter_map(DrawProgram::bounds)
            .reduce(|a, b| a.union(&b))
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;
    use crate::geometry::tests::split_cube;

    fn raised_cube() -> Geometry {
        let mut cube = split_cube();
        for v in &mut cube.verts {
            *v += Vec3::new(0.0, -0.25, 0.0);
        }
        cube
    }

    #[test]
    fn floor_sits_at_mesh_minimum() {
        let floor = make_floor(&raised_cube(), FLOOR_SCALE);
        assert_eq!(floor.verts.len(), 4);
        for v in &floor.verts {
            assert_eq!(v.y, -0.25);
            assert_eq!(v.x.abs(), FLOOR_SCALE);
            assert_eq!(v.z.abs(), FLOOR_SCALE);
        }
    }

    #[test]
    fn floor_faces_up_with_two_triangles() {
        let floor = make_floor(&raised_cube(), FLOOR_SCALE);
        assert_eq!(floor.normals, Some(vec![Vec3::Y; 4]));
        assert_eq!(floor.faces, vec![[0, 1, 2], [2, 3, 0]]);
        assert!(floor.validate().is_ok());
    }

    #[test]
    fn scene_has_one_program_pair_per_geometry() {
        let light = Light::new(Mat4::IDENTITY, Mat4::IDENTITY);
        let scene = ShadowScene::assemble(raised_cube(), &light, &Material::default(), FLOOR_SCALE);
        assert_eq!(scene.depth.len(), 2);
        assert_eq!(scene.color.len(), 2);
        assert_eq!(scene.len(), 2);
        for (depth, color) in scene.depth.iter().zip(&scene.color) {
            assert!(Arc::ptr_eq(&depth.geometry, &color.geometry));
        }
        assert_eq!(scene.color[1].geometry.verts.len(), 4);
    }

    #[test]
    fn scene_bounds_include_floor() {
        let light = Light::new(Mat4::IDENTITY, Mat4::IDENTITY);
        let mut tiny = split_cube();
        for v in &mut tiny.verts {
            *v *= 0.1;
        }
        let scene = ShadowScene::assemble(tiny, &light, &Material::default(), FLOOR_SCALE);
        let bounds = scene.bounds().unwrap();
        assert_eq!(bounds.min.x, -FLOOR_SCALE);
        assert_eq!(bounds.max.z, FLOOR_SCALE);
    }
}
