use std::collections::BTreeSet;
use std::str::FromStr;

use glam::Vec3;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::texture::{TextureData, TextureSlot};

/// The materials of the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MaterialId {
    Floor,
    Cube,
    BigCube,
    Ball,
    Bulb,
}

impl MaterialId {
    pub const ALL: [MaterialId; 5] = [
        MaterialId::Floor,
        MaterialId::Cube,
        MaterialId::BigCube,
        MaterialId::Ball,
        MaterialId::Bulb,
    ];

    /// Materials whose cached shading depends on the shadow toggle.
    pub const SHADOW_DEPENDENT: [MaterialId; 4] = [
        MaterialId::Ball,
        MaterialId::Cube,
        MaterialId::BigCube,
        MaterialId::Floor,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Floor => "floor",
            Self::Cube => "cube",
            Self::BigCube => "big-cube",
            Self::Ball => "ball",
            Self::Bulb => "bulb",
        }
    }
}

impl FromStr for MaterialId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MaterialId::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown material {value:?}"))
    }
}

/// Standard (metal/rough) surface description.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Vec3,
    pub roughness: f32,
    pub metalness: f32,
    pub bump_scale: f32,
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    pub map: Option<TextureData>,
    pub bump_map: Option<TextureData>,
    pub roughness_map: Option<TextureData>,
    pub metalness_map: Option<TextureData>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            roughness: 1.0,
            metalness: 0.0,
            bump_scale: 1.0,
            emissive: Vec3::ZERO,
            emissive_intensity: 1.0,
            map: None,
            bump_map: None,
            roughness_map: None,
            metalness_map: None,
        }
    }
}

impl Material {
    pub fn slot(&self, slot: TextureSlot) -> Option<&TextureData> {
        match slot {
            TextureSlot::Map => self.map.as_ref(),
            TextureSlot::BumpMap => self.bump_map.as_ref(),
            TextureSlot::RoughnessMap => self.roughness_map.as_ref(),
            TextureSlot::MetalnessMap => self.metalness_map.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: TextureSlot) -> &mut Option<TextureData> {
        match slot {
            TextureSlot::Map => &mut self.map,
            TextureSlot::BumpMap => &mut self.bump_map,
            TextureSlot::RoughnessMap => &mut self.roughness_map,
            TextureSlot::MetalnessMap => &mut self.metalness_map,
        }
    }

    /// Base color after modulation by the diffuse map.
    pub fn albedo(&self) -> Vec3 {
        match &self.map {
            Some(map) => self.color * map.mean_color,
            None => self.color,
        }
    }

    /// Roughness after modulation by the roughness map's green channel.
    pub fn effective_roughness(&self) -> f32 {
        match &self.roughness_map {
            Some(map) => self.roughness * map.mean_color.y,
            None => self.roughness,
        }
    }

    /// Metalness after modulation by the metalness map's blue channel.
    pub fn effective_metalness(&self) -> f32 {
        match &self.metalness_map {
            Some(map) => self.metalness * map.mean_color.z,
            None => self.metalness,
        }
    }
}

/// All room materials plus their invalidation state.
///
/// Every invalidation bumps the material's version and adds it to the dirty
/// set; consumers that cache derived state call [`MaterialSet::take_dirty`].
#[derive(Debug, Clone)]
pub struct MaterialSet {
    materials: [Material; 5],
    versions: [u64; 5],
    dirty: BTreeSet<MaterialId>,
}

impl Default for MaterialSet {
    fn default() -> Self {
        Self::room()
    }
}

impl MaterialSet {
    /// Materials of the default room.
    pub fn room() -> Self {
        let floor = Material {
            roughness: 0.8,
            metalness: 0.2,
            bump_scale: 0.0005,
            ..Material::default()
        };
        let brick = Material {
            roughness: 0.7,
            metalness: 0.2,
            bump_scale: 0.002,
            ..Material::default()
        };
        let ball = Material {
            roughness: 0.5,
            metalness: 1.0,
            ..Material::default()
        };
        let bulb = Material {
            color: Vec3::ZERO,
            emissive: Vec3::new(1.0, 1.0, 238.0 / 255.0),
            ..Material::default()
        };
        Self {
            materials: [floor, brick.clone(), brick, ball, bulb],
            versions: [0; 5],
            dirty: BTreeSet::new(),
        }
    }

    pub fn get(&self, id: MaterialId) -> &Material {
        &self.materials[id.index()]
    }

    /// Mutable access for per-frame uniforms (e.g. emissive intensity).
    /// Does not invalidate cached state.
    pub fn get_mut(&mut self, id: MaterialId) -> &mut Material {
        &mut self.materials[id.index()]
    }

    pub fn version(&self, id: MaterialId) -> u64 {
        self.versions[id.index()]
    }

    pub fn mark_dirty(&mut self, id: MaterialId) {
        self.versions[id.index()] += 1;
        self.dirty.insert(id);
    }

    pub fn is_dirty(&self, id: MaterialId) -> bool {
        self.dirty.contains(&id)
    }

    pub fn dirty(&self) -> impl Iterator<Item = MaterialId> + '_ {
        self.dirty.iter().copied()
    }

    pub fn take_dirty(&mut self) -> BTreeSet<MaterialId> {
        std::mem::take(&mut self.dirty)
    }

    /// Stores a loaded texture into one slot of one material.
    pub fn apply_texture(&mut self, id: MaterialId, slot: TextureSlot, texture: TextureData) {
        debug!(
            "{} {:?} loaded ({}x{})",
            id.name(),
            slot,
            texture.width,
            texture.height
        );
        *self.get_mut(id).slot_mut(slot) = Some(texture);
        self.mark_dirty(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(color: Vec3) -> TextureData {
        TextureData::solid(2, 2, color)
    }

    #[test]
    fn marking_bumps_version_once_per_call() {
        let mut set = MaterialSet::room();
        assert_eq!(set.version(MaterialId::Floor), 0);
        set.mark_dirty(MaterialId::Floor);
        assert_eq!(set.version(MaterialId::Floor), 1);
        assert!(set.is_dirty(MaterialId::Floor));
        assert!(!set.is_dirty(MaterialId::Cube));
    }

    #[test]
    fn take_dirty_clears_the_set_but_keeps_versions() {
        let mut set = MaterialSet::room();
        set.mark_dirty(MaterialId::Ball);
        set.mark_dirty(MaterialId::Cube);
        let taken = set.take_dirty();
        assert_eq!(
            taken.into_iter().collect::<Vec<_>>(),
            vec![MaterialId::Cube, MaterialId::Ball]
        );
        assert_eq!(set.dirty().count(), 0);
        assert_eq!(set.version(MaterialId::Ball), 1);
    }

    #[test]
    fn texture_writes_only_its_own_slot() {
        let mut set = MaterialSet::room();
        set.apply_texture(MaterialId::Ball, TextureSlot::MetalnessMap, flat(Vec3::splat(0.5)));
        let ball = set.get(MaterialId::Ball);
        assert!(ball.metalness_map.is_some());
        assert!(ball.map.is_none());
        assert!((ball.effective_metalness() - 0.5).abs() < 1e-6);
        assert!(set.get(MaterialId::Cube).metalness_map.is_none());
        assert_eq!(set.version(MaterialId::Ball), 1);
        assert_eq!(set.version(MaterialId::Cube), 0);
    }

    #[test]
    fn diffuse_map_tints_albedo() {
        let mut set = MaterialSet::room();
        assert_eq!(set.get(MaterialId::Floor).albedo(), Vec3::ONE);
        set.apply_texture(
            MaterialId::Floor,
            TextureSlot::Map,
            flat(Vec3::new(0.5, 0.25, 0.0)),
        );
        let albedo = set.get(MaterialId::Floor).albedo();
        assert!((albedo - Vec3::new(0.5, 0.25, 0.0)).length() < 1e-6);
    }

    #[test]
    fn material_names_round_trip() {
        for id in MaterialId::ALL {
            assert_eq!(id.name().parse::<MaterialId>(), Ok(id));
        }
        assert!("glass".parse::<MaterialId>().is_err());
    }
}
