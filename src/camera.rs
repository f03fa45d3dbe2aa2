//! View and projection math.
//!
//! [`Camera`] is plain data: mutate the public fields and the next matrix
//! query reflects them. Matrices are recomputed on every call rather than
//! cached, which removes the whole class of stale-matrix bugs in exchange
//! for a few cross products per frame.

use glam::{Mat4, Vec3};

/// Projection parameters.
#[derive(Clone, Copy, Debug)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    /// A 90-degree perspective with unit aspect, used for cubemap face
    /// capture.
    pub fn cube_face(near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: std::f32::consts::FRAC_PI_2,
            aspect: 1.0,
            near,
            far,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(left, right, bottom, top, near, far),
        }
    }
}

/// A camera with position, look direction, and projection.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    /// Look direction, not necessarily normalized; orthonormalized when a
    /// view matrix is built.
    pub direction: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

impl Camera {
    pub fn new(position: Vec3, direction: Vec3, projection: Projection) -> Self {
        Self {
            position,
            direction,
            up: Vec3::Y,
            projection,
        }
    }

    /// A perspective camera at `position` looking at `target`.
    pub fn looking_at(position: Vec3, target: Vec3, fov_y: f32, aspect: f32) -> Self {
        Self::new(
            position,
            target - position,
            Projection::Perspective {
                fov_y,
                aspect,
                near: 0.1,
                far: 1000.0,
            },
        )
    }

    /// The normalized look direction.
    pub fn forward(&self) -> Vec3 {
        self.direction.normalize_or_zero()
    }

    /// The normalized right vector.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or_zero()
    }

    /// Up re-orthogonalized against the current direction.
    pub fn orthogonal_up(&self) -> Vec3 {
        self.right().cross(self.forward()).normalize_or_zero()
    }

    /// World-to-view transform built from the current fields.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), self.orthogonal_up())
    }

    /// View-to-clip transform built from the current projection parameters.
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    /// Combined world-to-clip transform.
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Update the perspective aspect ratio (no-op for orthographic).
    pub fn set_aspect(&mut self, new_aspect: f32) {
        if let Projection::Perspective { aspect, .. } = &mut self.projection {
            *aspect = new_aspect;
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            direction: Vec3::NEG_Z,
            up: Vec3::Y,
            projection: Projection::Perspective {
                fov_y: std::f32::consts::FRAC_PI_3,
                aspect: 16.0 / 9.0,
                near: 0.1,
                far: 1000.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_is_visible_in_next_query() {
        let mut camera = Camera::default();
        let before = camera.view_projection();

        camera.position = Vec3::new(10.0, 0.0, 0.0);
        let after = camera.view_projection();

        assert_ne!(before, after);

        // And again, through the projection this time.
        camera.set_aspect(2.0);
        assert_ne!(after, camera.view_projection());
    }

    #[test]
    fn view_basis_is_orthonormal() {
        let camera = Camera::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.3, -0.4, -0.9),
            Projection::cube_face(0.1, 100.0),
        );

        let f = camera.forward();
        let r = camera.right();
        let u = camera.orthogonal_up();

        assert!((f.length() - 1.0).abs() < 1e-5);
        assert!(f.dot(r).abs() < 1e-5);
        assert!(f.dot(u).abs() < 1e-5);
        assert!(r.dot(u).abs() < 1e-5);
    }

    #[test]
    fn view_matrix_moves_world_opposite_to_camera() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z, Projection::cube_face(0.1, 10.0));
        let origin_in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
        // Looking down -Z from z=5, the world origin sits 5 units ahead.
        assert!((origin_in_view.z - (-5.0)).abs() < 1e-5);
    }
}
