use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::bytes_of;
use glam::{Mat3, Mat4, Vec3};
use log::debug;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::geometry::{Mesh, Shape};
use crate::material::{Material, MaterialId};
use crate::scene::{Scene, BULB_RADIUS};

use super::shared::{GlobalUniform, ObjectConstants, MAX_OCCLUDERS, SHADER};
use super::{FrameRenderer, FrameView};

/// GPU renderer backed by wgpu that draws the room.
pub struct Renderer {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    meshes: HashMap<Shape, MeshBuffers>,
    material_cache: HashMap<MaterialId, MaterialState>,
    // declared last: the surface must be dropped before its window
    window: Arc<Window>,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        // SAFETY: the renderer owns the window and drops the surface first.
        let surface = unsafe { instance.create_surface(window.as_ref()) }
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("renderer-device"),
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        // Fifo paces frames to the display refresh
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("room-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let global_layout = uniform_layout(&device, "global-bind-layout");
        let object_layout = uniform_layout(&device, "object-bind-layout");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("room-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("room-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: (Mesh::STRIDE * std::mem::size_of::<f32>()) as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        },
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: (3 * std::mem::size_of::<f32>()) as u64,
                            shader_location: 1,
                        },
                    ],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
        });

        let meshes = Shape::ALL
            .into_iter()
            .map(|shape| {
                let label = format!("{shape:?}").to_lowercase();
                (shape, MeshBuffers::from_mesh(&device, &shape.mesh(), &label))
            })
            .collect();

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            depth,
            pipeline,
            global_buffer,
            global_bind_group,
            object_layout,
            meshes,
            material_cache: HashMap::new(),
            window,
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn write_globals(&self, frame: &FrameView<'_>) {
        let scene = frame.scene;
        let lighting = frame.lighting;
        let casts_shadow = lighting.shadows_enabled && scene.bulb.cast_shadow;

        let mut occluders = [[0.0; 4]; MAX_OCCLUDERS];
        let mut count = 0;
        for (slot, sphere) in occluders.iter_mut().zip(scene.occluders()) {
            *slot = sphere.into();
            count += 1;
        }

        let light = &scene.bulb;
        let hemi = &scene.hemi;
        let uniform = GlobalUniform {
            view_proj: frame.camera.view_proj.to_cols_array_2d(),
            camera_position: frame.camera.position.extend(1.0).into(),
            light_position: light.position.extend(light.distance).into(),
            light_color: (light.color * light.intensity)
                .extend(if casts_shadow { 1.0 } else { 0.0 })
                .into(),
            sky_color: (hemi.sky_color * hemi.intensity).extend(1.0).into(),
            ground_color: (hemi.ground_color * hemi.intensity).extend(1.0).into(),
            params: [lighting.tone_mapping_exposure, count as f32, 0.0, 0.0],
            occluders,
        };
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&uniform));
    }

    fn refresh_materials(&mut self, frame: &mut FrameView<'_>) {
        let dirty = frame.materials.take_dirty();
        if !dirty.is_empty() {
            debug!("rebuilding {} material(s)", dirty.len());
        }
        for id in dirty {
            self.material_cache.remove(&id);
        }
        for id in MaterialId::ALL {
            self.material_cache.entry(id).or_insert_with(|| {
                MaterialState::build(frame.materials.get(id), frame.lighting.shadows_enabled)
            });
        }
    }

    fn object_constants(&self, model: Mat4, material: &Material, id: MaterialId, receive: bool) -> ObjectConstants {
        let state = self.material_cache.get(&id).copied().unwrap_or_default();
        let normal = Mat3::from_mat4(model).inverse().transpose();
        let receives = receive && state.shadows;
        ObjectConstants {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            albedo: state.albedo.extend(if receives { 1.0 } else { 0.0 }).into(),
            emissive: (material.emissive * material.emissive_intensity)
                .extend(1.0)
                .into(),
            surface: [state.roughness, state.metalness, 0.0, 0.0],
        }
    }

    fn draw_list(&self, frame: &FrameView<'_>) -> Vec<(Shape, ObjectConstants)> {
        let scene: &Scene = frame.scene;
        let mut list: Vec<_> = scene
            .objects
            .iter()
            .map(|object| {
                let material = frame.materials.get(object.material);
                let constants = self.object_constants(
                    object.model_matrix(),
                    material,
                    object.material,
                    object.receive_shadow,
                );
                (object.shape, constants)
            })
            .collect();

        let bulb_model = Mat4::from_translation(scene.bulb.position)
            * Mat4::from_scale(Vec3::splat(BULB_RADIUS));
        let bulb = frame.materials.get(MaterialId::Bulb);
        list.push((
            Shape::Sphere,
            self.object_constants(bulb_model, bulb, MaterialId::Bulb, false),
        ));
        list
    }

    fn present(&mut self, mut frame: FrameView<'_>) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.refresh_materials(&mut frame);
        self.write_globals(&frame);

        let bind_groups: Vec<(Shape, wgpu::BindGroup)> = self
            .draw_list(&frame)
            .into_iter()
            .map(|(shape, constants)| {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("object-uniform"),
                        contents: bytes_of(&constants),
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("object-bind-group"),
                    layout: &self.object_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                (shape, bind_group)
            })
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("room-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: true,
                    }),
                    stencil_ops: None,
                }),
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.global_bind_group, &[]);
            for (shape, bind_group) in &bind_groups {
                let Some(mesh) = self.meshes.get(shape) else {
                    continue;
                };
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.set_bind_group(1, bind_group, &[]);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl FrameRenderer for Renderer {
    type Error = wgpu::SurfaceError;

    /// Resizes the swap chain to match the new dimensions.
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = PhysicalSize::new(width, height);
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, width, height);
    }

    fn draw(&mut self, frame: FrameView<'_>) -> Result<(), Self::Error> {
        self.present(frame)
    }
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

/// Material values derived once per invalidation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MaterialState {
    albedo: Vec3,
    roughness: f32,
    metalness: f32,
    /// Shadow mode at the time the state was built.
    shadows: bool,
}

impl Default for MaterialState {
    fn default() -> Self {
        Self {
            albedo: Vec3::ONE,
            roughness: 1.0,
            metalness: 0.0,
            shadows: false,
        }
    }
}

impl MaterialState {
    fn build(material: &Material, shadows: bool) -> Self {
        Self {
            albedo: material.albedo(),
            roughness: material.effective_roughness(),
            metalness: material.effective_metalness(),
            shadows,
        }
    }
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::CameraParams;
    use crate::texture::{TextureData, TextureSlot};
    use crate::material::MaterialSet;

    #[test]
    fn material_state_bakes_texture_modulation_and_shadow_mode() {
        let mut materials = MaterialSet::room();
        materials.apply_texture(
            MaterialId::Floor,
            TextureSlot::RoughnessMap,
            TextureData::solid(1, 1, Vec3::new(0.0, 0.5, 0.0)),
        );
        let state = MaterialState::build(materials.get(MaterialId::Floor), true);
        assert!((state.roughness - 0.4).abs() < 1e-6);
        assert!(state.shadows);
        assert_eq!(state.albedo, Vec3::ONE);
    }

    #[test]
    fn normal_matrix_is_padded_per_column() {
        let padded = mat3_to_3x4(Mat3::IDENTITY);
        assert_eq!(padded[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(padded[2], [0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn camera_params_track_the_scene_camera() {
        let scene = Scene::room(1.5);
        let params = CameraParams::from_scene(&scene);
        assert_eq!(params.position, scene.camera.position);
        assert_eq!(params.view_proj, scene.camera.view_proj());
    }
}
