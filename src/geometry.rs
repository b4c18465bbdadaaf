use std::f32::consts::PI;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Interleaved triangle mesh.
///
/// Vertices are laid out as `position.xyz` followed by `normal.xyz`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub const STRIDE: usize = 6;

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / Self::STRIDE
    }

    fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3]) -> u32 {
        let index = self.vertex_count() as u32;
        self.vertices.extend_from_slice(&position);
        self.vertices.extend_from_slice(&normal);
        index
    }
}

/// Unit primitive; object scale gives it its final size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// 1×1 square in the XZ plane facing +Y.
    Plane,
    /// Axis aligned cube with unit edges, centered on the origin.
    Cube,
    /// Sphere of radius one.
    Sphere,
}

impl Shape {
    pub const ALL: [Shape; 3] = [Shape::Plane, Shape::Cube, Shape::Sphere];

    pub fn mesh(self) -> Mesh {
        match self {
            Self::Plane => plane(),
            Self::Cube => cube(),
            Self::Sphere => sphere(32, 16),
        }
    }
}

impl FromStr for Shape {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "plane" => Ok(Self::Plane),
            "cube" | "box" => Ok(Self::Cube),
            "sphere" | "ball" => Ok(Self::Sphere),
            other => Err(format!("unknown shape {other:?}")),
        }
    }
}

pub fn plane() -> Mesh {
    let mut mesh = Mesh::default();
    let up = [0.0, 1.0, 0.0];
    for (x, z) in [(-0.5, 0.5), (0.5, 0.5), (0.5, -0.5), (-0.5, -0.5)] {
        mesh.push_vertex([x, 0.0, z], up);
    }
    mesh.indices.extend_from_slice(&[0, 1, 2, 0, 2, 3]);
    mesh
}

pub fn cube() -> Mesh {
    // (normal, tangent u, tangent v) per face, u × v = normal
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];
    let mut mesh = Mesh::default();
    for (normal, u, v) in FACES {
        let base = mesh.vertex_count() as u32;
        for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let position = [
                normal[0] * 0.5 + u[0] * su + v[0] * sv,
                normal[1] * 0.5 + u[1] * su + v[1] * sv,
                normal[2] * 0.5 + u[2] * su + v[2] * sv,
            ];
            mesh.push_vertex(position, normal);
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

pub fn sphere(segments: u32, rings: u32) -> Mesh {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut mesh = Mesh::default();
    for ring in 0..=rings {
        let theta = ring as f32 / rings as f32 * PI;
        let (sin_theta, cos_theta) = theta.sin_cos();
        for segment in 0..=segments {
            let phi = segment as f32 / segments as f32 * 2.0 * PI;
            let (sin_phi, cos_phi) = phi.sin_cos();
            let normal = [-cos_phi * sin_theta, cos_theta, sin_phi * sin_theta];
            mesh.push_vertex(normal, normal);
        }
    }
    let row = segments + 1;
    for ring in 0..rings {
        for segment in 0..segments {
            let a = ring * row + segment;
            let b = a + row;
            if ring != 0 {
                mesh.indices.extend_from_slice(&[a, b, a + 1]);
            }
            if ring != rings - 1 {
                mesh.indices.extend_from_slice(&[a + 1, b, b + 1]);
            }
        }
    }
    mesh
}
