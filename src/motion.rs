//! Keyboard-driven translation of the bulb and the camera.
//!
//! Motion is applied once per rendered frame with a constant step, so the
//! speed depends on the frame rate.

use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::input::{Direction, DirectionalInput};

/// Half extent of the square the bulb may move in, on X and Z.
pub const LIGHT_BOUND: f32 = 10.0;

/// How the camera reacts when the bulb hits its bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClampPolicy {
    /// Per-direction behavior: the camera is pulled back by one step when
    /// the bulb is pinned moving right, up or down, but keeps going when the
    /// bulb is pinned moving left.
    #[default]
    Reference,
    /// The camera always follows the bulb's actual displacement, so the
    /// offset between them never changes.
    Symmetric,
}

impl FromStr for ClampPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "reference" => Ok(Self::Reference),
            "symmetric" => Ok(Self::Symmetric),
            other => Err(format!(
                "unknown clamp policy {other:?} (expected reference or symmetric)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    pub step: f32,
    pub bound: f32,
    pub policy: ClampPolicy,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            step: 0.00005_f32.cos() * 0.02,
            bound: LIGHT_BOUND,
            policy: ClampPolicy::Reference,
        }
    }
}

impl MotionConfig {
    pub fn with_policy(policy: ClampPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }
}

/// Moves `light` and `camera` for every held direction.
///
/// Returns `true` if anything moved.
pub fn integrate(
    input: &DirectionalInput,
    light: &mut Vec3,
    camera: &mut Vec3,
    config: &MotionConfig,
) -> bool {
    let mut moved = false;
    for direction in Direction::ALL {
        if input.is_held(direction) {
            step_direction(direction, light, camera, config);
            moved = true;
        }
    }
    moved
}

fn step_direction(direction: Direction, light: &mut Vec3, camera: &mut Vec3, config: &MotionConfig) {
    let step = config.step;
    let bound = config.bound;
    let (light_axis, camera_axis, sign) = match direction {
        Direction::Left => (&mut light.x, &mut camera.x, -1.0),
        Direction::Right => (&mut light.x, &mut camera.x, 1.0),
        Direction::Up => (&mut light.z, &mut camera.z, -1.0),
        Direction::Down => (&mut light.z, &mut camera.z, 1.0),
    };

    let before = *light_axis;
    *light_axis += sign * step;
    *camera_axis += sign * step;

    let pinned = if sign < 0.0 && *light_axis < -bound {
        *light_axis = -bound;
        true
    } else if sign > 0.0 && *light_axis > bound {
        *light_axis = bound;
        true
    } else {
        false
    };
    if !pinned {
        return;
    }

    match config.policy {
        ClampPolicy::Reference => {
            if direction != Direction::Left {
                *camera_axis -= sign * step;
            }
        }
        ClampPolicy::Symmetric => {
            // undo the free step, then apply the bulb's real displacement
            *camera_axis += (*light_axis - before) - sign * step;
        }
    }
}
