use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat3, Mat4};
use log::warn;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::assets;
use crate::camera::CameraParams;
use crate::material::Material;
use crate::mesh::{MeshData, VERTEX_STRIDE};
use crate::scene::Scene;
use crate::stars;

/// GPU renderer backed by wgpu that draws the scene graph each frame.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    pipeline: wgpu::RenderPipeline,
    background_pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_layout: wgpu::BindGroupLayout,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    environment: wgpu::TextureView,
    background: wgpu::TextureView,
    mesh_cache: HashMap<String, MeshBuffers>,
    star_mesh: MeshBuffers,
    core_mesh: MeshBuffers,
    // Star transforms never change, so their bind groups are built once.
    star_bind_groups: Vec<wgpu::BindGroup>,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("renderer-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let global_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: Some(
                            std::num::NonZeroU64::new(std::mem::size_of::<GlobalUniform>() as u64)
                                .unwrap(),
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(
                        std::num::NonZeroU64::new(std::mem::size_of::<ObjectConstants>() as u64)
                            .unwrap(),
                    ),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("scene-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // 1x1 placeholders keep the bind group valid until textures load.
        let environment = create_cube_texture(&device, &queue, 1, &[[20, 20, 28, 255]; 6]);
        let background = create_color_texture(&device, &queue, [20, 20, 28, 255]);

        let global_bind_group = create_global_bind_group(
            &device,
            &global_layout,
            &global_buffer,
            &environment,
            &sampler,
            &background,
        );

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64,
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
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: (6 * std::mem::size_of::<f32>()) as u64,
                    shader_location: 2,
                },
            ],
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
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
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        // Fullscreen triangle behind everything, depth writes off.
        let background_pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("background-pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_background"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::Always,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_background"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            });

        let star_mesh = MeshBuffers::from_mesh(&device, &stars::star_mesh(), "star");
        let core_mesh = MeshBuffers::from_mesh(&device, &stars::star_mesh(), "core");

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            pipeline,
            background_pipeline,
            global_buffer,
            global_layout,
            global_bind_group,
            object_layout,
            sampler,
            environment,
            background,
            mesh_cache: HashMap::new(),
            star_mesh,
            core_mesh,
            star_bind_groups: Vec::new(),
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Uploads the background image and cube map faces. Files that fail to
    /// decode leave the placeholder textures in place.
    pub fn load_environment(&mut self, asset_root: &Path) {
        match assets::load_rgba_image(&assets::background_path(asset_root)) {
            Ok(image) => {
                self.background = create_image_texture(&self.device, &self.queue, &image);
            }
            Err(err) => warn!("background texture unavailable: {err}"),
        }

        let mut faces = Vec::new();
        for path in assets::cube_map_paths(asset_root) {
            match assets::load_rgba_image(&path) {
                Ok(image) => faces.push(image),
                Err(err) => {
                    warn!("cube map unavailable: {err}");
                    break;
                }
            }
        }
        if faces.len() == 6 {
            let side = faces[0].width();
            if faces
                .iter()
                .all(|face| face.width() == side && face.height() == side)
            {
                let pixels: Vec<&[u8]> = faces.iter().map(|face| face.as_raw().as_slice()).collect();
                self.environment =
                    create_cube_texture_from_raw(&self.device, &self.queue, side, &pixels);
            } else {
                warn!("cube map faces disagree on size, keeping placeholder");
            }
        }

        self.global_bind_group = create_global_bind_group(
            &self.device,
            &self.global_layout,
            &self.global_buffer,
            &self.environment,
            &self.sampler,
            &self.background,
        );
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn update_globals(&self, scene: &Scene, camera: &CameraParams) {
        let light = &scene.point_light;
        let ambient = &scene.ambient_light;
        let fog = &scene.fog;
        let uniform = GlobalUniform {
            view_proj: camera.view_proj.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            light_position: light.position.extend(light.intensity).into(),
            light_color: light.color.extend(1.0).into(),
            ambient_color: ambient.color.extend(ambient.intensity).into(),
            fog_color_density: fog.color.extend(fog.density).into(),
        };
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&uniform));
    }

    fn object_bind_group(&self, model: Mat4, material: &Material) -> wgpu::BindGroup {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        let constants = ObjectConstants {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            color: material
                .color
                .extend(if material.vertex_colors { 1.0 } else { 0.0 })
                .into(),
            emissive: material.emissive.extend(material.env_map_intensity).into(),
            params: [
                material.metalness,
                material.roughness,
                if material.flat_shading { 1.0 } else { 0.0 },
                if material.fog { 1.0 } else { 0.0 },
            ],
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("object-uniform"),
                contents: bytes_of(&constants),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object-bind-group"),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    fn ensure_star_bind_groups(&mut self, scene: &Scene) {
        if self.star_bind_groups.len() == scene.stars.len() {
            return;
        }
        let material = Material::star();
        self.star_bind_groups = scene
            .stars
            .iter()
            .map(|star| self.object_bind_group(Mat4::from_translation(star.position), &material))
            .collect();
    }

    fn cache_fragment_meshes(&mut self, key_prefix: &str, fragment: &crate::scene::SceneFragment) {
        for (index, node) in fragment.nodes.iter().enumerate() {
            let Some(mesh) = &node.mesh else { continue };
            let key = format!("{key_prefix}/{index}");
            if !self.mesh_cache.contains_key(&key) {
                let buffers = MeshBuffers::from_mesh(&self.device, mesh, &key);
                self.mesh_cache.insert(key, buffers);
            }
        }
    }

    /// Draws one frame of the scene.
    pub fn render(&mut self, scene: &Scene, camera: &CameraParams) -> Result<(), wgpu::SurfaceError> {
        self.update_globals(scene, camera);
        self.ensure_star_bind_groups(scene);

        for (slot, instance) in scene.crystals.iter().enumerate() {
            if let Some(instance) = instance {
                self.cache_fragment_meshes(&format!("crystal{slot}"), &instance.fragment);
            }
        }
        if let Some(cloud) = &scene.cloud {
            self.cache_fragment_meshes("cloud", cloud);
        }

        // Per-node bind groups for the animated fragments, rebuilt each frame.
        let mut draws: Vec<(String, wgpu::BindGroup)> = Vec::new();
        for (slot, instance) in scene.crystals.iter().enumerate() {
            let Some(instance) = instance else { continue };
            let transforms = instance.fragment.global_transforms();
            for (index, node) in instance.fragment.nodes.iter().enumerate() {
                if node.mesh.is_none() {
                    continue;
                }
                draws.push((
                    format!("crystal{slot}/{index}"),
                    self.object_bind_group(transforms[index], &instance.material),
                ));
            }
        }
        if let Some(cloud) = &scene.cloud {
            let material = Material::cloud();
            let transforms = cloud.global_transforms();
            for (index, node) in cloud.nodes.iter().enumerate() {
                if node.mesh.is_none() {
                    continue;
                }
                draws.push((
                    format!("cloud/{index}"),
                    self.object_bind_group(transforms[index], &material),
                ));
            }
        }
        let core_bind_group = self.object_bind_group(
            Mat4::from_translation(scene.core_position),
            &Material::core(),
        );

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.background_pipeline);
            pass.set_bind_group(0, &self.global_bind_group, &[]);
            pass.draw(0..3, 0..1);

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.global_bind_group, &[]);

            pass.set_vertex_buffer(0, self.star_mesh.vertex.slice(..));
            pass.set_index_buffer(self.star_mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            for bind_group in &self.star_bind_groups {
                pass.set_bind_group(1, bind_group, &[]);
                pass.draw_indexed(0..self.star_mesh.index_count, 0, 0..1);
            }

            pass.set_vertex_buffer(0, self.core_mesh.vertex.slice(..));
            pass.set_index_buffer(self.core_mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.set_bind_group(1, &core_bind_group, &[]);
            pass.draw_indexed(0..self.core_mesh.index_count, 0, 0..1);

            for (key, bind_group) in &draws {
                let Some(mesh) = self.mesh_cache.get(key) else {
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

fn create_global_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    environment: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    background: &wgpu::TextureView,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("global-bind-group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(environment),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(background),
            },
        ],
    })
}

fn upload_texture_layer(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    layer: u32,
    side: u32,
    pixels: &[u8],
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * side),
            rows_per_image: Some(side),
        },
        wgpu::Extent3d {
            width: side,
            height: side,
            depth_or_array_layers: 1,
        },
    );
}

fn create_cube_texture_from_raw(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    side: u32,
    faces: &[&[u8]],
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("environment-cube"),
        size: wgpu::Extent3d {
            width: side,
            height: side,
            depth_or_array_layers: 6,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for (layer, pixels) in faces.iter().enumerate() {
        upload_texture_layer(queue, &texture, layer as u32, side, pixels);
    }
    texture.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    })
}

fn create_cube_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    side: u32,
    faces: &[[u8; 4]; 6],
) -> wgpu::TextureView {
    let pixels: Vec<&[u8]> = faces.iter().map(|face| face.as_slice()).collect();
    create_cube_texture_from_raw(device, queue, side, &pixels)
}

fn create_image_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &image::RgbaImage,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("background-texture"),
        size: wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width()),
            rows_per_image: Some(image.height()),
        },
        wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        },
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_color_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    color: [u8; 4],
) -> wgpu::TextureView {
    let image = image::RgbaImage::from_pixel(1, 1, image::Rgba(color));
    create_image_texture(device, queue, &image)
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &MeshData, label: &str) -> Self {
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

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    // xyz position, w intensity
    light_position: [f32; 4],
    light_color: [f32; 4],
    // rgb color, w intensity
    ambient_color: [f32; 4],
    // rgb color, w density
    fog_color_density: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    // rgb base color, w = vertex color toggle
    color: [f32; 4],
    // rgb emissive, w = environment map intensity
    emissive: [f32; 4],
    // metalness, roughness, flat shading toggle, fog toggle
    params: [f32; 4],
}

const SHADER: &str = r#"
struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    light_position: vec4<f32>,
    light_color: vec4<f32>,
    ambient_color: vec4<f32>,
    fog_color_density: vec4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
    emissive: vec4<f32>,
    params: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;
@group(0) @binding(1)
var environment: texture_cube<f32>;
@group(0) @binding(2)
var environment_sampler: sampler;
@group(0) @binding(3)
var background: texture_2d<f32>;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;
    out.normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;
    out.color = input.color;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let metalness = object.params.x;
    let roughness = object.params.y;

    var normal: vec3<f32>;
    if (object.params.z > 0.5) {
        normal = normalize(cross(dpdx(input.world_pos), dpdy(input.world_pos)));
    } else {
        normal = normalize(input.normal);
    }

    var base_color = object.color.rgb;
    if (object.color.w > 0.5) {
        base_color = base_color * input.color;
    }

    let view_dir = normalize(globals.camera_position.xyz - input.world_pos);
    if (dot(normal, view_dir) < 0.0) {
        normal = -normal;
    }

    let light_dir = normalize(globals.light_position.xyz - input.world_pos);
    let intensity = globals.light_position.w;
    let diffuse = max(dot(normal, light_dir), 0.0) * (1.0 - metalness * 0.5);

    let half_dir = normalize(light_dir + view_dir);
    let shininess = mix(256.0, 4.0, roughness);
    let specular = pow(max(dot(normal, half_dir), 0.0), shininess) * (1.0 - roughness);

    let reflection = reflect(-view_dir, normal);
    let env = textureSample(environment, environment_sampler, reflection).rgb;
    let env_strength = object.emissive.w * mix(0.04, 1.0, metalness);

    let ambient = globals.ambient_color.rgb * globals.ambient_color.w * base_color;
    let direct = (diffuse * base_color + specular) * globals.light_color.rgb * intensity;
    var color = ambient + direct + env * env_strength * base_color + object.emissive.rgb;

    if (object.params.w > 0.5) {
        let depth = distance(globals.camera_position.xyz, input.world_pos);
        let density = globals.fog_color_density.w;
        let fog_factor = 1.0 - exp(-(density * depth) * (density * depth));
        color = mix(color, globals.fog_color_density.rgb, clamp(fog_factor, 0.0, 1.0));
    }

    return vec4<f32>(color, 1.0);
}

struct BackgroundOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_background(@builtin(vertex_index) index: u32) -> BackgroundOutput {
    var out: BackgroundOutput;
    let x = f32(i32(index) / 2) * 4.0 - 1.0;
    let y = f32(i32(index) % 2) * 4.0 - 1.0;
    out.position = vec4<f32>(x, y, 1.0, 1.0);
    out.uv = vec2<f32>((x + 1.0) * 0.5, 1.0 - (y + 1.0) * 0.5);
    return out;
}

@fragment
fn fs_background(input: BackgroundOutput) -> @location(0) vec4<f32> {
    return textureSample(background, environment_sampler, input.uv);
}
"#;
