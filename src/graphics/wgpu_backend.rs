//! wgpu-backed renderer. Swapchain images are device-local textures matching
//! the runtime's spec; sharing the compositor's images needs the Vulkan
//! binding noted in the OpenXR bridge.

use pollster::block_on;
use wgpu::util::DeviceExt;

use crate::geometry::{Vertex, INDEX_COUNT, INDICES, VERTICES};
use crate::graphics::{
    CubeDraw, GraphicsBackend, GraphicsError, GraphicsResult, RenderTargetId, SessionBinding,
    TextureFormat, TextureId, PREFERRED_COLOR_FORMATS,
};
use crate::runtime::SwapchainSpec;

const SHADER: &str = r#"
struct CubeUniform {
    mvp: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> cube: CubeUniform;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = cube.mvp * vec4<f32>(input.position, 1.0);
    out.color = input.color;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(input.color, 1.0);
}
"#;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

/// Dynamic-offset stride per cube; downlevel devices require 256-byte
/// uniform alignment.
const UNIFORM_STRIDE: u64 = 256;
const MAX_CUBES: usize = 64;

struct ScenePipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniforms: wgpu::Buffer,
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
}

pub struct WgpuBackend {
    _instance: wgpu::Instance,
    device_id: u64,
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: Vec<wgpu::Texture>,
    targets: Vec<wgpu::TextureView>,
    scene: Option<ScenePipeline>,
}

impl WgpuBackend {
    pub fn initialize() -> GraphicsResult<Self> {
        block_on(Self::initialize_async())
    }

    async fn initialize_async() -> GraphicsResult<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GraphicsError::Backend(
                "failed to find a compatible GPU adapter",
            ))?;

        let info = adapter.get_info();
        log::info!(
            "[graphics] wgpu adapter: {} ({:?} via {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Cubist Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                },
                None,
            )
            .await
            .map_err(|_| GraphicsError::Backend("failed to create wgpu device"))?;

        Ok(Self {
            _instance: instance,
            device_id: u64::from(info.device),
            device,
            queue,
            textures: Vec::new(),
            targets: Vec::new(),
            scene: None,
        })
    }

    fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8Srgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        }
    }

    fn build_scene(&self, color_format: TextureFormat) -> ScenePipeline {
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Cubist Cube Shader"),
                source: wgpu::ShaderSource::Wgsl(SHADER.into()),
            });

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Cubist Cube Bind Group Layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: true,
                            min_binding_size: wgpu::BufferSize::new(64),
                        },
                        count: None,
                    }],
                });

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Cubist Cube Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Cubist Cube Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &VERTEX_ATTRIBUTES,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: Self::wgpu_format(color_format),
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        let uniforms = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cubist Cube Uniforms"),
            size: UNIFORM_STRIDE * MAX_CUBES as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cubist Cube Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniforms,
                    offset: 0,
                    size: wgpu::BufferSize::new(64),
                }),
            }],
        });

        let vertices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Cubist Cube Vertices"),
                contents: bytemuck::cast_slice(&VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let indices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Cubist Cube Indices"),
                contents: bytemuck::cast_slice(&INDICES),
                usage: wgpu::BufferUsages::INDEX,
            });

        ScenePipeline {
            pipeline,
            bind_group,
            uniforms,
            vertices,
            indices,
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn label(&self) -> &'static str {
        "wgpu"
    }

    fn supported_color_formats(&self) -> &[i64] {
        &PREFERRED_COLOR_FORMATS
    }

    fn texture_format(&self, native_format: i64) -> Option<TextureFormat> {
        TextureFormat::from_vulkan(native_format)
    }

    fn session_binding(&self) -> SessionBinding {
        SessionBinding {
            backend: "wgpu",
            device_id: self.device_id,
        }
    }

    fn import_swapchain_images(
        &mut self,
        images: &[u64],
        spec: &SwapchainSpec,
    ) -> GraphicsResult<Vec<TextureId>> {
        let format = self
            .texture_format(spec.format)
            .ok_or(GraphicsError::UnsupportedFormat("wgpu", spec.format))?;
        let mut ids = Vec::with_capacity(images.len());
        for _ in images {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Cubist Swapchain Image"),
                size: wgpu::Extent3d {
                    width: spec.width.max(1),
                    height: spec.height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: spec.sample_count.max(1),
                dimension: wgpu::TextureDimension::D2,
                format: Self::wgpu_format(format),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let id = TextureId(self.textures.len() as u64);
            self.textures.push(texture);
            ids.push(id);
        }
        Ok(ids)
    }

    fn create_render_target(
        &mut self,
        texture: TextureId,
        format: TextureFormat,
    ) -> GraphicsResult<RenderTargetId> {
        let stored = self
            .textures
            .get(texture.0 as usize)
            .ok_or(GraphicsError::UnknownTexture(texture.0))?;
        let view = stored.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Cubist Render Target"),
            format: Some(Self::wgpu_format(format)),
            ..Default::default()
        });
        let id = RenderTargetId(self.targets.len() as u64);
        self.targets.push(view);
        Ok(id)
    }

    fn prepare_scene(&mut self, color_format: TextureFormat) -> GraphicsResult<()> {
        self.scene = Some(self.build_scene(color_format));
        Ok(())
    }

    fn render_view(
        &mut self,
        target: RenderTargetId,
        extent: [u32; 2],
        clear_color: [f32; 4],
        cubes: &[CubeDraw],
    ) -> GraphicsResult<()> {
        let scene = self.scene.as_ref().ok_or(GraphicsError::SceneNotPrepared)?;
        let view = self
            .targets
            .get(target.0 as usize)
            .ok_or(GraphicsError::UnknownRenderTarget(target.0))?;

        let cubes = if cubes.len() > MAX_CUBES {
            log::warn!(
                "[graphics] {} cubes exceed the uniform capacity of {MAX_CUBES}, truncating",
                cubes.len()
            );
            &cubes[..MAX_CUBES]
        } else {
            cubes
        };

        for (index, cube) in cubes.iter().enumerate() {
            self.queue.write_buffer(
                &scene.uniforms,
                index as u64 * UNIFORM_STRIDE,
                bytemuck::bytes_of(&cube.mvp),
            );
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Cubist View Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Cubist View Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(clear_color[0]),
                            g: f64::from(clear_color[1]),
                            b: f64::from(clear_color[2]),
                            a: f64::from(clear_color[3]),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_viewport(0.0, 0.0, extent[0] as f32, extent[1] as f32, 0.0, 1.0);
            pass.set_pipeline(&scene.pipeline);
            pass.set_vertex_buffer(0, scene.vertices.slice(..));
            pass.set_index_buffer(scene.indices.slice(..), wgpu::IndexFormat::Uint32);
            for index in 0..cubes.len() {
                let offset = (index as u64 * UNIFORM_STRIDE) as u32;
                pass.set_bind_group(0, &scene.bind_group, &[offset]);
                pass.draw_indexed(0..INDEX_COUNT, 0, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
