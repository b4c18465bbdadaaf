use std::f32::consts::PI;

use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::camera::PerspectiveCamera;
use crate::geometry::Shape;
use crate::material::MaterialId;

/// Radius of the visible bulb mesh, in world units.
pub const BULB_RADIUS: f32 = 0.02;

/// Runtime representation of the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub bulb: PointLight,
    pub hemi: HemisphereLight,
    pub camera: PerspectiveCamera,
}

impl Scene {
    /// Builds a scene with the default lights and camera around `objects`.
    pub fn with_objects(objects: Vec<SceneObject>, aspect: f32) -> Self {
        Self {
            objects,
            bulb: PointLight::default(),
            hemi: HemisphereLight::default(),
            camera: PerspectiveCamera::room(aspect),
        }
    }

    /// The built-in room: a wooden floor, brick cubes, crates and globes.
    pub fn room(aspect: f32) -> Self {
        let mut objects = vec![SceneObject::new("floor", Shape::Plane, MaterialId::Floor)
            .at(Vec3::ZERO)
            .scaled(Vec3::new(20.0, 1.0, 20.0))
            .casting(false)
            .receiving(true)];

        objects.push(
            SceneObject::new("ball", Shape::Sphere, MaterialId::Ball)
                .at(Vec3::new(1.0, 0.25, 1.0))
                .turned(Vec3::new(0.0, 180.0, 0.0))
                .scaled(Vec3::splat(0.25)),
        );

        let small_cubes = [(-0.5, 0.25, -1.0), (0.0, 0.25, -5.0), (7.0, 0.25, 0.0)];
        for (index, (x, y, z)) in small_cubes.into_iter().enumerate() {
            objects.push(
                SceneObject::new(format!("cube-{}", index + 1), Shape::Cube, MaterialId::Cube)
                    .at(Vec3::new(x, y, z))
                    .scaled(Vec3::splat(0.5)),
            );
        }

        let crates = [
            (5.0, 0.5, -5.0),
            (3.0, 0.5, 0.0),
            (-5.0, 0.5, -6.0),
            (-4.3, 0.5, 2.0),
            (0.0, 0.5, 4.5),
            (8.0, 0.5, 8.0),
        ];
        for (index, (x, y, z)) in crates.into_iter().enumerate() {
            objects.push(
                SceneObject::new(format!("crate-{}", index + 1), Shape::Cube, MaterialId::BigCube)
                    .at(Vec3::new(x, y, z)),
            );
        }

        let globes = [
            (1.0, 0.7, 1.0),
            (-3.0, 0.7, 4.0),
            (-2.5, 0.7, -4.0),
            (4.0, 0.7, -4.0),
        ];
        for (index, (x, y, z)) in globes.into_iter().enumerate() {
            objects.push(
                SceneObject::new(format!("globe-{}", index + 1), Shape::Sphere, MaterialId::Ball)
                    .at(Vec3::new(x, y, z))
                    .turned(Vec3::new(0.0, 180.0, 0.0))
                    .scaled(Vec3::splat(0.75)),
            );
        }

        Self::with_objects(objects, aspect)
    }

    /// Parses a room layout. Lights and camera keep their defaults.
    pub fn from_xml(xml: &str, aspect: f32) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let mut objects = Vec::new();

        for node in document.descendants().filter(|n| n.has_tag_name("object")) {
            let name = required_text(&node, "name")?;
            let shape = required_text(&node, "shape")?
                .parse::<Shape>()
                .map_err(|err| anyhow!("object {name}: {err}"))?;
            let material = required_text(&node, "material")?
                .parse::<MaterialId>()
                .map_err(|err| anyhow!("object {name}: {err}"))?;
            if material == MaterialId::Bulb {
                return Err(anyhow!("object {name}: the bulb material is reserved"));
            }
            let mut object = SceneObject::new(name, shape, material);
            object.position = parse_vec3(optional_text(&node, "position"), object.position)?;
            object.rotation = parse_vec3(optional_text(&node, "rotation"), object.rotation)?;
            object.scale = parse_vec3(optional_text(&node, "scale"), object.scale)?;
            object.cast_shadow = parse_bool(optional_text(&node, "cast-shadow"), object.cast_shadow)?;
            object.receive_shadow =
                parse_bool(optional_text(&node, "receive-shadow"), object.receive_shadow)?;
            objects.push(object);
        }

        if objects.is_empty() {
            return Err(anyhow!("scene does not contain any <object>"));
        }
        Ok(Self::with_objects(objects, aspect))
    }

    /// Bounding spheres (`xyz` center, `w` radius) of shadow casters.
    pub fn occluders(&self) -> impl Iterator<Item = glam::Vec4> + '_ {
        self.objects
            .iter()
            .filter(|object| object.cast_shadow)
            .filter_map(SceneObject::bounding_sphere)
    }
}

/// Static mesh placed in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub shape: Shape,
    pub material: MaterialId,
    pub position: Vec3,
    /// Euler angles in degrees, applied X then Y then Z.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, shape: Shape, material: MaterialId) -> Self {
        Self {
            name: name.into(),
            shape,
            material,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            cast_shadow: true,
            receive_shadow: false,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn turned(mut self, degrees: Vec3) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn scaled(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn casting(mut self, cast_shadow: bool) -> Self {
        self.cast_shadow = cast_shadow;
        self
    }

    pub fn receiving(mut self, receive_shadow: bool) -> Self {
        self.receive_shadow = receive_shadow;
        self
    }

    pub fn model_matrix(&self) -> Mat4 {
        let translation = Mat4::from_translation(self.position);
        let rotation = Mat4::from_rotation_z(self.rotation.z.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_x(self.rotation.x.to_radians());
        let scale = Mat4::from_scale(self.scale);
        translation * rotation * scale
    }

    fn bounding_sphere(&self) -> Option<glam::Vec4> {
        let radius = match self.shape {
            Shape::Sphere => self.scale.max_element(),
            Shape::Cube => 0.5 * self.scale.max_element(),
            Shape::Plane => return None,
        };
        Some(self.position.extend(radius))
    }
}

/// Isotropic point light with physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    /// Luminous intensity in candela.
    pub intensity: f32,
    /// Cut-off distance of the inverse-square falloff.
    pub distance: f32,
    pub cast_shadow: bool,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 0.0),
            color: Vec3::new(1.0, 238.0 / 255.0, 136.0 / 255.0),
            intensity: 1.0,
            distance: 100.0,
            cast_shadow: true,
        }
    }
}

impl PointLight {
    /// Luminous power in lumens.
    pub fn power(&self) -> f32 {
        self.intensity * 4.0 * PI
    }

    pub fn set_power(&mut self, lumens: f32) {
        self.intensity = lumens / (4.0 * PI);
    }
}

/// Sky/ground gradient light; `intensity` is irradiance in lux.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HemisphereLight {
    pub sky_color: Vec3,
    pub ground_color: Vec3,
    pub intensity: f32,
}

impl Default for HemisphereLight {
    fn default() -> Self {
        Self {
            sky_color: Vec3::new(221.0, 238.0, 255.0) / 255.0,
            ground_color: Vec3::new(15.0, 14.0, 13.0) / 255.0,
            intensity: 0.02,
        }
    }
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|err| anyhow!("invalid vector component {component:?}: {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    match numbers.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(anyhow!("vector {value:?} must have three components")),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref() {
        None => Ok(default),
        Some("true" | "yes" | "1") => Ok(true),
        Some("false" | "no" | "0") => Ok(false),
        Some(other) => Err(anyhow!("invalid boolean {other:?}")),
    }
}
