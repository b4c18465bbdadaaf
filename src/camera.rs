use std::f32::consts::PI;

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::input::MouseButton;

/// Perspective camera.
///
/// Keyboard motion only translates it; [`OrbitControls`] is the only thing
/// that changes where it looks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn looking_at(position: Vec3, target: Vec3, fov_degrees: f32, aspect: f32) -> Self {
        let forward = (target - position).try_normalize().unwrap_or(Vec3::NEG_Z);
        Self {
            position,
            forward,
            up: Vec3::Y,
            fov_degrees,
            aspect: aspect.max(0.01),
            near: 0.1,
            far: 100.0,
        }
    }

    /// Camera of the default room: above and to the side, looking at the
    /// origin.
    pub fn room(aspect: f32) -> Self {
        Self::looking_at(Vec3::new(-4.0, 2.0, 4.0), Vec3::ZERO, 50.0, aspect)
    }

    /// Updates the aspect ratio from a surface size. Zero-height surfaces
    /// (minimised windows) are ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

/// Smallest polar angle away from the poles.
const POLE_EPSILON: f32 = 1e-6;
/// Damped deltas below this are dropped.
const SETTLE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drag {
    Rotate,
    Dolly,
    Pan,
}

/// Mouse-driven orbit around a target point.
///
/// Left drag rotates, middle drag and the wheel dolly, right drag pans.
/// Rotation and panning are damped: each update applies a fraction of the
/// pending motion and decays the rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    viewport_height: f32,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    pan_offset: Vec3,
    drag: Option<Drag>,
    cursor: Option<Vec2>,
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            min_distance: 1.0,
            max_distance: 20.0,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            viewport_height: 720.0,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
            drag: None,
            cursor: None,
        }
    }

    /// Pixel height used to turn cursor motion into angles.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.viewport_height = height as f32;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn pointer_down(&mut self, button: MouseButton) {
        self.drag = match button {
            MouseButton::LEFT => Some(Drag::Rotate),
            MouseButton::MIDDLE => Some(Drag::Dolly),
            MouseButton::RIGHT => Some(Drag::Pan),
            _ => return,
        };
    }

    pub fn pointer_up(&mut self, _button: MouseButton) {
        self.drag = None;
    }

    pub fn pointer_moved(&mut self, position: Vec2, camera: &PerspectiveCamera) {
        let previous = self.cursor.replace(position);
        let (Some(previous), Some(drag)) = (previous, self.drag) else {
            return;
        };
        let delta = position - previous;
        let height = self.viewport_height;
        match drag {
            Drag::Rotate => {
                self.theta_delta -= 2.0 * PI * delta.x / height * self.rotate_speed;
                self.phi_delta -= 2.0 * PI * delta.y / height * self.rotate_speed;
            }
            Drag::Dolly => {
                if delta.y > 0.0 {
                    self.scale /= self.zoom_scale();
                } else if delta.y < 0.0 {
                    self.scale *= self.zoom_scale();
                }
            }
            Drag::Pan => {
                let distance = (camera.position - self.target).length()
                    * (camera.fov_degrees.to_radians() / 2.0).tan();
                let right = camera.forward.cross(camera.up).normalize_or_zero();
                let up = right.cross(camera.forward).normalize_or_zero();
                let scale = 2.0 * distance / height * self.pan_speed;
                self.pan_offset += -right * delta.x * scale + up * delta.y * scale;
            }
        }
    }

    /// Positive `lines` move the camera towards the target.
    pub fn scroll(&mut self, lines: f32) {
        if lines.is_finite() {
            self.scale *= self.zoom_scale().powf(lines);
        }
    }

    /// Moves the target along with a camera translation so the orbit keeps
    /// its shape.
    pub fn translate(&mut self, delta: Vec3) {
        self.target += delta;
    }

    fn zoom_scale(&self) -> f32 {
        0.95_f32.powf(self.zoom_speed)
    }

    fn is_settled(&self) -> bool {
        self.theta_delta == 0.0
            && self.phi_delta == 0.0
            && self.scale == 1.0
            && self.pan_offset == Vec3::ZERO
    }

    /// Applies pending motion to `camera`. Returns `true` if the camera
    /// changed.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let radius = offset.length();
        let in_range = (self.min_distance..=self.max_distance).contains(&radius);
        if self.is_settled() && in_range {
            return false;
        }
        if radius <= f32::EPSILON {
            self.settle();
            return false;
        }

        let damping = self.damping_factor;
        let theta = offset.x.atan2(offset.z) + self.theta_delta * damping;
        let phi = ((offset.y / radius).clamp(-1.0, 1.0).acos() + self.phi_delta * damping)
            .clamp(POLE_EPSILON, PI - POLE_EPSILON);
        let radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);
        self.target += self.pan_offset * damping;

        let offset = Vec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        let before = *camera;
        camera.position = self.target + offset;
        camera.forward = (-offset).try_normalize().unwrap_or(camera.forward);

        let decay = 1.0 - damping;
        self.theta_delta = snap_to_zero(self.theta_delta * decay);
        self.phi_delta = snap_to_zero(self.phi_delta * decay);
        self.pan_offset *= decay;
        if self.pan_offset.length() < SETTLE_EPSILON {
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        *camera != before
    }

    fn settle(&mut self) {
        self.theta_delta = 0.0;
        self.phi_delta = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }
}

fn snap_to_zero(value: f32) -> f32 {
    if value.abs() < SETTLE_EPSILON {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_camera_looks_at_origin() {
        let camera = PerspectiveCamera::room(16.0 / 9.0);
        let clip = camera.view_proj() * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn translation_keeps_direction() {
        let mut camera = PerspectiveCamera::room(1.0);
        let forward = camera.forward;
        camera.position.x -= 3.0;
        assert_eq!(camera.forward, forward);
    }

    fn orbit() -> (OrbitControls, PerspectiveCamera) {
        (OrbitControls::new(Vec3::ZERO), PerspectiveCamera::room(16.0 / 9.0))
    }

    fn settle_all(controls: &mut OrbitControls, camera: &mut PerspectiveCamera) -> usize {
        let mut updates = 0;
        while controls.update(camera) {
            updates += 1;
            assert!(updates < 10_000, "orbit never settled");
        }
        updates
    }

    #[test]
    fn idle_orbit_leaves_the_camera_alone() {
        let (mut controls, mut camera) = orbit();
        let before = camera;
        assert!(!controls.update(&mut camera));
        assert_eq!(camera, before);
    }

    #[test]
    fn wheel_distance_is_clamped_to_range() {
        let (mut controls, mut camera) = orbit();
        controls.scroll(200.0);
        controls.update(&mut camera);
        assert!((camera.position.length() - 1.0).abs() < 1e-4);

        controls.scroll(-200.0);
        controls.update(&mut camera);
        assert!((camera.position.length() - 20.0).abs() < 1e-3);
        assert!(camera.forward.dot(-camera.position.normalize()) > 0.9999);
    }

    #[test]
    fn left_drag_rotates_with_damping_at_constant_distance() {
        let (mut controls, mut camera) = orbit();
        controls.set_viewport(1280, 720);
        let distance = camera.position.length();

        controls.pointer_moved(Vec2::new(100.0, 100.0), &camera);
        controls.pointer_down(MouseButton::LEFT);
        controls.pointer_moved(Vec2::new(190.0, 100.0), &camera);
        controls.pointer_up(MouseButton::LEFT);
        assert!(!controls.is_dragging());

        let start = camera.position;
        assert!(controls.update(&mut camera));
        let first_step = camera.position.distance(start);
        let second_start = camera.position;
        assert!(controls.update(&mut camera));
        let second_step = camera.position.distance(second_start);
        assert!(second_step < first_step);

        settle_all(&mut controls, &mut camera);
        assert!((camera.position.length() - distance).abs() < 1e-3);
        assert!((camera.position.y - 2.0).abs() < 1e-3);
        assert!(camera.position.distance(start) > 1.0);
    }

    #[test]
    fn cursor_motion_without_a_button_does_nothing() {
        let (mut controls, mut camera) = orbit();
        controls.pointer_moved(Vec2::new(0.0, 0.0), &camera);
        controls.pointer_moved(Vec2::new(300.0, 50.0), &camera);
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn key_translation_moves_target_and_keeps_the_offset() {
        let (mut controls, mut camera) = orbit();
        let offset = camera.position - controls.target;
        let forward = camera.forward;

        let delta = Vec3::new(-0.5, 0.0, 0.25);
        camera.position += delta;
        controls.translate(delta);
        assert!(!controls.update(&mut camera));
        assert_eq!(camera.position - controls.target, offset);
        assert_eq!(camera.forward, forward);
    }

    #[test]
    fn right_drag_pans_camera_and_target_together() {
        let (mut controls, mut camera) = orbit();
        let offset = camera.position - controls.target;
        controls.pointer_down(MouseButton::RIGHT);
        controls.pointer_moved(Vec2::new(10.0, 10.0), &camera);
        controls.pointer_moved(Vec2::new(60.0, 10.0), &camera);
        controls.pointer_up(MouseButton::RIGHT);
        settle_all(&mut controls, &mut camera);
        assert!(controls.target.length() > 0.1);
        assert!(((camera.position - controls.target) - offset).length() < 1e-3);
    }

    #[test]
    fn viewport_updates_aspect() {
        let mut camera = PerspectiveCamera::room(1.0);
        camera.set_viewport(1920, 1080);
        assert!((camera.aspect - 1920.0 / 1080.0).abs() < 1e-6);
        camera.set_viewport(800, 0);
        assert!((camera.aspect - 1920.0 / 1080.0).abs() < 1e-6);
    }
}
