//! Per-frame resolution of the lighting parameters.
//!
//! Turns the human-facing settings (lumens, lux, a 0..1 exposure slider and
//! the shadow toggle) into the linear quantities the renderer consumes, and
//! invalidates cached material state when the shadow mode flips.

use log::debug;

use crate::material::{MaterialId, MaterialSet};
use crate::params::ParameterState;
use crate::scene::{Scene, BULB_RADIUS};

/// Radians of bulb bobbing per millisecond of wall-clock time.
pub const BOB_RATE: f64 = 0.0005;
pub const BOB_AMPLITUDE: f32 = 0.75;
pub const BOB_OFFSET: f32 = 2.25;

/// Fifth-power exposure curve: fine control near zero, wide range near one.
pub fn tone_mapping_exposure(exposure: f32) -> f32 {
    exposure.powi(5)
}

/// Bulb height at wall-clock time `millis`.
pub fn bulb_height(millis: f64) -> f32 {
    let phase = millis * BOB_RATE;
    phase.cos() as f32 * BOB_AMPLITUDE + BOB_OFFSET
}

/// Emissive intensity that makes a sphere of `radius` look as bright as a
/// point source of `intensity` candela.
pub fn emissive_intensity(intensity: f32, radius: f32) -> f32 {
    intensity / (radius * radius)
}

/// Values produced by one resolver pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLighting {
    pub tone_mapping_exposure: f32,
    pub shadows_enabled: bool,
    /// Shadow-dependent materials were invalidated this frame.
    pub shadows_changed: bool,
    /// Lumens.
    pub bulb_power: f32,
    /// Candela.
    pub bulb_intensity: f32,
    pub bulb_emissive_intensity: f32,
    /// Lux.
    pub hemi_intensity: f32,
    pub bulb_height: f32,
}

/// Owns the previous-frame shadow flag used for change detection.
#[derive(Debug, Clone)]
pub struct LightingResolver {
    previous_shadows: bool,
}

impl LightingResolver {
    /// Seeds the cache from the initial settings so that the first frame
    /// does not count as a transition.
    pub fn new(params: &ParameterState) -> Self {
        Self {
            previous_shadows: params.shadows_enabled,
        }
    }

    pub fn previous_shadows(&self) -> bool {
        self.previous_shadows
    }

    pub fn resolve(
        &mut self,
        params: &ParameterState,
        scene: &mut Scene,
        materials: &mut MaterialSet,
        millis: f64,
    ) -> ResolvedLighting {
        let tone_mapping_exposure = tone_mapping_exposure(params.exposure());

        let shadows_enabled = params.shadows_enabled;
        scene.bulb.cast_shadow = shadows_enabled;

        let shadows_changed = shadows_enabled != self.previous_shadows;
        if shadows_changed {
            for id in MaterialId::SHADOW_DEPENDENT {
                materials.mark_dirty(id);
            }
            self.previous_shadows = shadows_enabled;
            debug!("shadows {shadows_enabled}: shadow-dependent materials invalidated");
        }

        let bulb_power = params.bulb.value();
        scene.bulb.set_power(bulb_power);
        let bulb_intensity = scene.bulb.intensity;

        let bulb_emissive_intensity = emissive_intensity(bulb_intensity, BULB_RADIUS);
        materials.get_mut(MaterialId::Bulb).emissive_intensity = bulb_emissive_intensity;

        let hemi_intensity = params.hemi.value();
        scene.hemi.intensity = hemi_intensity;

        let bulb_height = bulb_height(millis);
        scene.bulb.position.y = bulb_height;

        ResolvedLighting {
            tone_mapping_exposure,
            shadows_enabled,
            shadows_changed,
            bulb_power,
            bulb_intensity,
            bulb_emissive_intensity,
            hemi_intensity,
            bulb_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn setup() -> (ParameterState, Scene, MaterialSet, LightingResolver) {
        let params = ParameterState::new();
        let resolver = LightingResolver::new(&params);
        (params, Scene::room(1.0), MaterialSet::room(), resolver)
    }

    #[test]
    fn exposure_curve_is_monotone_with_fixed_ends() {
        assert_eq!(tone_mapping_exposure(0.0), 0.0);
        assert_eq!(tone_mapping_exposure(1.0), 1.0);
        let mut previous = 0.0;
        for step in 0..=100 {
            let value = tone_mapping_exposure(step as f32 / 100.0);
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn bulb_height_follows_the_cosine() {
        assert!((bulb_height(0.0) - 3.0).abs() < 1e-6);
        let half_period = std::f64::consts::PI / BOB_RATE;
        assert!((bulb_height(half_period) - 1.5).abs() < 1e-5);
    }

    #[test]
    fn default_frame_resolves_reference_values() {
        let (params, mut scene, mut materials, mut resolver) = setup();
        let millis = 1_234.0;
        let resolved = resolver.resolve(&params, &mut scene, &mut materials, millis);

        let t = millis * BOB_RATE;
        let expected_y = t.cos() as f32 * 0.75 + 2.25;
        assert!((scene.bulb.position.y - expected_y).abs() < 1e-6);
        assert_eq!(resolved.bulb_power, 400.0);
        assert!((scene.bulb.power() - 400.0).abs() < 1e-3);
        assert_eq!(scene.hemi.intensity, 0.0001);
        assert!((resolved.tone_mapping_exposure - 0.68_f32.powi(5)).abs() < 1e-7);
        assert!(!resolved.shadows_changed);
        for id in MaterialId::ALL {
            assert_eq!(materials.version(id), 0);
        }
    }

    #[test]
    fn bulb_emissive_scales_with_intensity_over_radius_squared() {
        let (params, mut scene, mut materials, mut resolver) = setup();
        let resolved = resolver.resolve(&params, &mut scene, &mut materials, 0.0);
        let intensity = 400.0 / (4.0 * PI);
        assert!((resolved.bulb_intensity - intensity).abs() < 1e-4);
        let emissive = materials.get(MaterialId::Bulb).emissive_intensity;
        assert!((emissive - intensity / 0.0004).abs() / emissive < 1e-5);
    }

    #[test]
    fn shadow_toggle_marks_dependent_materials_once() {
        let mut params = ParameterState::new();
        params.shadows_enabled = false;
        let mut resolver = LightingResolver::new(&params);
        let mut scene = Scene::room(1.0);
        let mut materials = MaterialSet::room();

        params.shadows_enabled = true;
        let resolved = resolver.resolve(&params, &mut scene, &mut materials, 0.0);
        assert!(resolved.shadows_changed);
        assert!(scene.bulb.cast_shadow);
        for id in MaterialId::SHADOW_DEPENDENT {
            assert_eq!(materials.version(id), 1, "{id:?}");
        }
        assert_eq!(materials.version(MaterialId::Bulb), 0);
        assert!(resolver.previous_shadows());

        // true -> true is not a transition
        let resolved = resolver.resolve(&params, &mut scene, &mut materials, 16.0);
        assert!(!resolved.shadows_changed);
        for id in MaterialId::SHADOW_DEPENDENT {
            assert_eq!(materials.version(id), 1, "{id:?}");
        }
    }

    #[test]
    fn disabling_shadows_clears_cast_shadow() {
        let (mut params, mut scene, mut materials, mut resolver) = setup();
        params.shadows_enabled = false;
        let resolved = resolver.resolve(&params, &mut scene, &mut materials, 0.0);
        assert!(!resolved.shadows_enabled);
        assert!(!scene.bulb.cast_shadow);
        assert_eq!(materials.dirty().count(), 4);
    }

    #[test]
    fn darkest_levels_resolve_to_stored_values() {
        let (mut params, mut scene, mut materials, mut resolver) = setup();
        params.select_bulb("Off").unwrap();
        let resolved = resolver.resolve(&params, &mut scene, &mut materials, 0.0);
        assert_eq!(resolved.bulb_power, 0.0);
        assert_eq!(resolved.bulb_emissive_intensity, 0.0);
        assert_eq!(resolved.hemi_intensity, 0.0001);
    }
}
