use bytemuck::{Pod, Zeroable};

/// Shadow casters passed to the shader; extra casters are ignored.
pub(crate) const MAX_OCCLUDERS: usize = 16;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct GlobalUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// `w`: cut-off distance.
    pub light_position: [f32; 4],
    /// Color times candela; `w`: 1 when the bulb casts shadows.
    pub light_color: [f32; 4],
    /// Colors times lux.
    pub sky_color: [f32; 4],
    pub ground_color: [f32; 4],
    /// `x`: tone mapping exposure, `y`: occluder count.
    pub params: [f32; 4],
    pub occluders: [[f32; 4]; MAX_OCCLUDERS],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct ObjectConstants {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    /// `w`: 1 when the surface receives shadows.
    pub albedo: [f32; 4],
    pub emissive: [f32; 4],
    /// `x`: roughness, `y`: metalness.
    pub surface: [f32; 4],
}

pub(crate) const SHADER: &str = r#"
const PI: f32 = 3.14159265;

struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    light_position: vec4<f32>,
    light_color: vec4<f32>,
    sky_color: vec4<f32>,
    ground_color: vec4<f32>,
    params: vec4<f32>,
    occluders: array<vec4<f32>, 16>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    albedo: vec4<f32>,
    emissive: vec4<f32>,
    surface: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;

    out.normal = normalize(world_normal);
    return out;
}

fn light_visibility(world_pos: vec3<f32>) -> f32 {
    let to_light = globals.light_position.xyz - world_pos;
    let dist = length(to_light);
    let dir = to_light / max(dist, 1e-4);
    let count = u32(globals.params.y);
    for (var i = 0u; i < count; i = i + 1u) {
        let sphere = globals.occluders[i];
        let oc = world_pos - sphere.xyz;
        let c = dot(oc, oc) - sphere.w * sphere.w;
        if (c < 0.0) {
            return 0.0;
        }
        let b = dot(oc, dir);
        let h = b * b - c;
        if (h > 0.0) {
            let t = -b - sqrt(h);
            if (t > 1e-3 && t < dist) {
                return 0.0;
            }
        }
    }
    return 1.0;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let n = normalize(input.normal);
    let v = normalize(globals.camera_position.xyz - input.world_pos);
    let albedo = object.albedo.rgb;
    let roughness = clamp(object.surface.x, 0.04, 1.0);
    let metalness = clamp(object.surface.y, 0.0, 1.0);
    let diffuse_color = albedo * (1.0 - metalness);
    let specular_color = mix(vec3<f32>(0.04), albedo, vec3<f32>(metalness));

    let to_light = globals.light_position.xyz - input.world_pos;
    let dist = max(length(to_light), 1e-4);
    let l = to_light / dist;
    let falloff = clamp(1.0 - pow(dist / globals.light_position.w, 4.0), 0.0, 1.0);
    let attenuation = falloff * falloff / (dist * dist);

    var visibility = 1.0;
    if (globals.light_color.w > 0.5 && object.albedo.w > 0.5) {
        visibility = light_visibility(input.world_pos);
    }

    let irradiance = globals.light_color.rgb * attenuation * max(dot(n, l), 0.0) * visibility;
    let h = normalize(l + v);
    let shininess = 2.0 / max(pow(roughness, 4.0), 1e-4) - 2.0;
    let specular = pow(max(dot(n, h), 0.0), shininess) * (shininess + 2.0) / (8.0 * PI);
    var color = irradiance * (diffuse_color / PI + specular_color * specular);

    let sky_weight = 0.5 * n.y + 0.5;
    let hemi = mix(globals.ground_color.rgb, globals.sky_color.rgb, vec3<f32>(sky_weight));
    color += hemi * (diffuse_color + specular_color * (1.0 - roughness)) / PI;

    color += object.emissive.rgb;

    // Reinhard
    let exposed = color * globals.params.x;
    let mapped = clamp(exposed / (vec3<f32>(1.0) + exposed), vec3<f32>(0.0), vec3<f32>(1.0));
    return vec4<f32>(mapped, 1.0);
}
"#;
