//! First-person fly controller.
//!
//! Integrates mouse look and WASD/QE movement into a [`Camera`] each frame.
//! The controller owns yaw/pitch; the camera's `direction` is overwritten on
//! every update, so external code that wants to reposition the view should go
//! through [`FlyCameraController::look_toward`].

use glam::Vec3;
use winit::keyboard::KeyCode;

use crate::camera::Camera;
use crate::input::Input;

/// WASD + mouse-look camera controller.
#[derive(Clone, Debug)]
pub struct FlyCameraController {
    /// Horizontal angle in radians. 0 = looking toward -Z.
    pub yaw: f32,
    /// Vertical angle in radians. 0 = horizontal, positive = up.
    pub pitch: f32,
    /// Movement speed in units per second.
    pub movement_sensitivity: f32,
    /// Movement speed while Shift is held.
    pub fast_movement_sensitivity: f32,
    /// Radians per pixel of mouse travel.
    pub rotation_sensitivity: f32,
}

const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

impl Default for FlyCameraController {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            movement_sensitivity: 3.0,
            fast_movement_sensitivity: 9.0,
            rotation_sensitivity: 0.003,
        }
    }
}

impl FlyCameraController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed yaw/pitch from an existing camera so the first update doesn't
    /// snap the view.
    pub fn from_camera(camera: &Camera) -> Self {
        let mut controller = Self::default();
        controller.look_toward(camera.forward());
        controller
    }

    /// Point the controller along `direction`.
    pub fn look_toward(&mut self, direction: Vec3) {
        let dir = direction.normalize_or_zero();
        self.yaw = dir.x.atan2(-dir.z);
        self.pitch = dir.y.asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    fn forward_direction(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            -self.yaw.cos() * self.pitch.cos(),
        )
        .normalize_or_zero()
    }

    fn right_direction(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, self.yaw.sin()).normalize_or_zero()
    }

    /// Integrate one frame of input into the camera.
    pub fn update(&mut self, camera: &mut Camera, input: &Input, dt: f32) {
        let delta = input.mouse_delta();
        self.yaw += delta.x * self.rotation_sensitivity;
        self.pitch -= delta.y * self.rotation_sensitivity;
        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let forward = self.forward_direction();
        let right = self.right_direction();

        let mut velocity = Vec3::ZERO;
        if input.key_down(KeyCode::KeyW) {
            velocity += forward;
        }
        if input.key_down(KeyCode::KeyS) {
            velocity -= forward;
        }
        if input.key_down(KeyCode::KeyA) {
            velocity -= right;
        }
        if input.key_down(KeyCode::KeyD) {
            velocity += right;
        }
        if input.key_down(KeyCode::KeyE) {
            velocity += Vec3::Y;
        }
        if input.key_down(KeyCode::KeyQ) {
            velocity -= Vec3::Y;
        }

        let speed = if input.key_down(KeyCode::ShiftLeft) {
            self.fast_movement_sensitivity
        } else {
            self.movement_sensitivity
        };

        if velocity.length_squared() > 0.0 {
            camera.position += velocity.normalize() * speed * dt;
        }

        camera.direction = forward;
        camera.up = Vec3::Y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Projection;

    fn test_camera() -> Camera {
        Camera::new(Vec3::ZERO, Vec3::NEG_Z, Projection::cube_face(0.1, 100.0))
    }

    #[test]
    fn pitch_stays_short_of_straight_up() {
        let mut controller = FlyCameraController::new();
        controller.pitch = 10.0;
        let mut camera = test_camera();

        controller.update(&mut camera, &Input::new(), 0.016);

        assert!(controller.pitch < std::f32::consts::FRAC_PI_2);
        assert!(controller.pitch > -std::f32::consts::FRAC_PI_2);
        // The camera never looks exactly along +Y, so forward x up stays valid.
        assert!(camera.forward().cross(Vec3::Y).length_squared() > 0.0);
    }

    #[test]
    fn look_toward_round_trips_through_yaw_pitch() {
        let mut controller = FlyCameraController::new();
        let target = Vec3::new(0.5, 0.3, -0.8).normalize();
        controller.look_toward(target);

        let recovered = controller.forward_direction();
        assert!((recovered - target).length() < 1e-4);
    }

    #[test]
    fn update_writes_direction_into_camera() {
        let mut controller = FlyCameraController::new();
        controller.yaw = std::f32::consts::FRAC_PI_2;
        let mut camera = test_camera();

        controller.update(&mut camera, &Input::new(), 0.016);

        // yaw = pi/2 looks toward +X.
        assert!((camera.forward() - Vec3::X).length() < 1e-4);
    }
}
