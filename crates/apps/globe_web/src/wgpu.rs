#[cfg(target_arch = "wasm32")]
mod imp {
    use ::wgpu::util::DeviceExt;
    use gpu::{RenderCommand, RenderFrame};
    use scene::resources::{MeshHandle, Resources};
    use std::borrow::Cow;
    use std::collections::HashMap;
    use tracing::{debug, warn};
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;

    const MESH_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    // xyz: direction towards the light, w: ambient intensity.
    light_dir: vec4<f32>,
    // rgb: light colour, w: directional intensity.
    light_color: vec4<f32>,
};

struct Draw {
    model: mat4x4<f32>,
    color: vec4<f32>,
    // x: emissive mix.
    params: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> draw: Draw;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) normal: vec3<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) normal: vec3<f32>) -> VsOut {
    let world = draw.model * vec4<f32>(position, 1.0);
    let n = (draw.model * vec4<f32>(normal, 0.0)).xyz;
    return VsOut(globals.view_proj * world, n);
}

@fragment
fn fs_main(fs_in: VsOut) -> @location(0) vec4<f32> {
    let n = normalize(fs_in.normal);
    let l = normalize(globals.light_dir.xyz);
    let diffuse = max(dot(n, l), 0.0) * globals.light_color.w;
    let lit = draw.color.rgb * globals.light_color.rgb * (globals.light_dir.w + diffuse);
    let rgb = mix(lit, draw.color.rgb, draw.params.x);
    return vec4<f32>(rgb, draw.color.a);
}
"#;

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Vertex {
        position: [f32; 3],
        normal: [f32; 3],
    }

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Globals {
        view_proj: [[f32; 4]; 4],
        light_dir: [f32; 4],
        light_color: [f32; 4],
    }

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct DrawUniform {
        model: [[f32; 4]; 4],
        color: [f32; 4],
        params: [f32; 4],
    }

    #[derive(Debug)]
    struct GpuMesh {
        vertex_buffer: ::wgpu::Buffer,
        index_buffer: ::wgpu::Buffer,
        index_count: u32,
    }

    impl GpuMesh {
        fn destroy(self) {
            self.vertex_buffer.destroy();
            self.index_buffer.destroy();
        }
    }

    #[derive(Debug)]
    pub struct WgpuContext {
        pub _instance: &'static ::wgpu::Instance,
        pub surface: ::wgpu::Surface<'static>,
        pub device: ::wgpu::Device,
        pub queue: ::wgpu::Queue,
        pub config: ::wgpu::SurfaceConfiguration,
        pub _canvas: web_sys::HtmlCanvasElement,
        opaque_pipeline: ::wgpu::RenderPipeline,
        translucent_pipeline: ::wgpu::RenderPipeline,
        globals_buffer: ::wgpu::Buffer,
        globals_bind_group: ::wgpu::BindGroup,
        draw_layout: ::wgpu::BindGroupLayout,
        draw_buffer: ::wgpu::Buffer,
        draw_bind_group: ::wgpu::BindGroup,
        draw_stride: u64,
        draw_capacity: u64,
        depth_view: ::wgpu::TextureView,
        meshes: HashMap<MeshHandle, GpuMesh>,
    }

    fn create_depth_view(
        device: &::wgpu::Device,
        config: &::wgpu::SurfaceConfiguration,
    ) -> ::wgpu::TextureView {
        let tex = device.create_texture(&::wgpu::TextureDescriptor {
            label: Some("globe-depth"),
            size: ::wgpu::Extent3d {
                width: config.width.max(1),
                height: config.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: ::wgpu::TextureDimension::D2,
            format: ::wgpu::TextureFormat::Depth24Plus,
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        tex.create_view(&::wgpu::TextureViewDescriptor::default())
    }

    fn align_up(value: u64, alignment: u64) -> u64 {
        value.div_ceil(alignment) * alignment
    }

    fn create_draw_buffer(
        device: &::wgpu::Device,
        layout: &::wgpu::BindGroupLayout,
        stride: u64,
        capacity: u64,
    ) -> (::wgpu::Buffer, ::wgpu::BindGroup) {
        let buffer = device.create_buffer(&::wgpu::BufferDescriptor {
            label: Some("globe-draws"),
            size: stride * capacity.max(1),
            usage: ::wgpu::BufferUsages::UNIFORM | ::wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&::wgpu::BindGroupDescriptor {
            label: Some("globe-draws-bg"),
            layout,
            entries: &[::wgpu::BindGroupEntry {
                binding: 0,
                resource: ::wgpu::BindingResource::Buffer(::wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: ::wgpu::BufferSize::new(std::mem::size_of::<DrawUniform>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn create_mesh_pipeline(
        device: &::wgpu::Device,
        layout: &::wgpu::PipelineLayout,
        shader: &::wgpu::ShaderModule,
        format: ::wgpu::TextureFormat,
        translucent: bool,
    ) -> ::wgpu::RenderPipeline {
        device.create_render_pipeline(&::wgpu::RenderPipelineDescriptor {
            label: Some(if translucent {
                "globe-translucent-pipeline"
            } else {
                "globe-opaque-pipeline"
            }),
            layout: Some(layout),
            vertex: ::wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[::wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as ::wgpu::BufferAddress,
                    step_mode: ::wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        ::wgpu::VertexAttribute {
                            format: ::wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        },
                        ::wgpu::VertexAttribute {
                            format: ::wgpu::VertexFormat::Float32x3,
                            offset: 12,
                            shader_location: 1,
                        },
                    ],
                }],
            },
            fragment: Some(::wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(::wgpu::ColorTargetState {
                    format,
                    blend: Some(::wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: ::wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: ::wgpu::PrimitiveState {
                topology: ::wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: ::wgpu::FrontFace::Ccw,
                // Tubes and disks are seen from both sides.
                cull_mode: None,
                polygon_mode: ::wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(::wgpu::DepthStencilState {
                format: ::wgpu::TextureFormat::Depth24Plus,
                depth_write_enabled: !translucent,
                depth_compare: ::wgpu::CompareFunction::Less,
                stencil: ::wgpu::StencilState::default(),
                bias: ::wgpu::DepthBiasState::default(),
            }),
            multisample: ::wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }

    pub async fn init_wgpu_from_canvas_id(canvas_id: &str) -> Result<WgpuContext, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("window missing"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("document missing"))?;
        let canvas_elem = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| JsValue::from_str("canvas missing"))?
            .dyn_into::<web_sys::HtmlCanvasElement>()?;

        let width = canvas_elem.width().max(1);
        let height = canvas_elem.height().max(1);

        // `Surface<'static>` must not outlive its instance; leak it for the
        // lifetime of the page.
        let instance: &'static ::wgpu::Instance = Box::leak(Box::new(::wgpu::Instance::new(
            &::wgpu::InstanceDescriptor {
                backends: ::wgpu::Backends::BROWSER_WEBGPU | ::wgpu::Backends::GL,
                ..Default::default()
            },
        )));

        let surface = instance
            .create_surface(::wgpu::SurfaceTarget::Canvas(canvas_elem.clone()))
            .map_err(|e| JsValue::from_str(&format!("surface error: {e}")))?;

        let adapter = instance
            .request_adapter(&::wgpu::RequestAdapterOptions {
                power_preference: ::wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| JsValue::from_str(&format!("adapter error: {e}")))?;

        let (device, queue) = adapter
            .request_device(&::wgpu::DeviceDescriptor {
                label: Some("globe-wgpu-device"),
                required_features: ::wgpu::Features::empty(),
                required_limits: ::wgpu::Limits::downlevel_webgl2_defaults(),
                ..Default::default()
            })
            .await
            .map_err(|e| JsValue::from_str(&format!("device error: {e}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| JsValue::from_str("surface reports no formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(::wgpu::CompositeAlphaMode::Auto);

        let config = ::wgpu::SurfaceConfiguration {
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            desired_maximum_frame_latency: 2,
            present_mode: ::wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_view(&device, &config);

        let shader = device.create_shader_module(::wgpu::ShaderModuleDescriptor {
            label: Some("globe-mesh-shader"),
            source: ::wgpu::ShaderSource::Wgsl(Cow::Borrowed(MESH_SHADER)),
        });

        let globals_buffer = device.create_buffer(&::wgpu::BufferDescriptor {
            label: Some("globe-globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: ::wgpu::BufferUsages::UNIFORM | ::wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let globals_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
            label: Some("globe-globals-bgl"),
            entries: &[::wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: ::wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: ::wgpu::BindingType::Buffer {
                    ty: ::wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let globals_bind_group = device.create_bind_group(&::wgpu::BindGroupDescriptor {
            label: Some("globe-globals-bg"),
            layout: &globals_layout,
            entries: &[::wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let draw_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
            label: Some("globe-draws-bgl"),
            entries: &[::wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: ::wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: ::wgpu::BindingType::Buffer {
                    ty: ::wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: ::wgpu::BufferSize::new(
                        std::mem::size_of::<DrawUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let draw_stride = align_up(
            std::mem::size_of::<DrawUniform>() as u64,
            device.limits().min_uniform_buffer_offset_alignment as u64,
        );
        let draw_capacity = 64;
        let (draw_buffer, draw_bind_group) =
            create_draw_buffer(&device, &draw_layout, draw_stride, draw_capacity);

        let pipeline_layout = device.create_pipeline_layout(&::wgpu::PipelineLayoutDescriptor {
            label: Some("globe-mesh-pipeline-layout"),
            bind_group_layouts: &[&globals_layout, &draw_layout],
            immediate_size: 0,
        });

        let opaque_pipeline =
            create_mesh_pipeline(&device, &pipeline_layout, &shader, config.format, false);
        let translucent_pipeline =
            create_mesh_pipeline(&device, &pipeline_layout, &shader, config.format, true);

        Ok(WgpuContext {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            _canvas: canvas_elem,
            opaque_pipeline,
            translucent_pipeline,
            globals_buffer,
            globals_bind_group,
            draw_layout,
            draw_buffer,
            draw_bind_group,
            draw_stride,
            draw_capacity,
            depth_view,
            meshes: HashMap::new(),
        })
    }

    pub fn surface_size(ctx: &WgpuContext) -> (u32, u32) {
        (ctx.config.width, ctx.config.height)
    }

    pub fn resize_wgpu(ctx: &mut WgpuContext, width: u32, height: u32) {
        ctx.config.width = width.max(1);
        ctx.config.height = height.max(1);
        ctx.surface.configure(&ctx.device, &ctx.config);
        ctx.depth_view = create_depth_view(&ctx.device, &ctx.config);
    }

    fn upload_mesh(ctx: &WgpuContext, mesh: &scene::mesh::Mesh) -> GpuMesh {
        let vertices: Vec<Vertex> = mesh
            .positions
            .iter()
            .zip(&mesh.normals)
            .map(|(position, normal)| Vertex {
                position: *position,
                normal: *normal,
            })
            .collect();
        let vertex_buffer = ctx
            .device
            .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                label: Some("globe-mesh-vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: ::wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = ctx
            .device
            .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                label: Some("globe-mesh-indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: ::wgpu::BufferUsages::INDEX,
            });
        GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }

    /// Frees buffers for released meshes and uploads any mesh referenced by
    /// this frame for the first time.
    fn sync_meshes(ctx: &mut WgpuContext, resources: &Resources, frame: &RenderFrame) {
        for handle in &frame.released_meshes {
            if let Some(gpu_mesh) = ctx.meshes.remove(handle) {
                gpu_mesh.destroy();
            }
        }
        for RenderCommand::DrawMesh { mesh, .. } in &frame.commands {
            if ctx.meshes.contains_key(mesh) {
                continue;
            }
            let Some(cpu_mesh) = resources.mesh(*mesh) else {
                warn!(?mesh, "draw references a released mesh");
                continue;
            };
            let uploaded = upload_mesh(ctx, cpu_mesh);
            debug!(?mesh, indices = uploaded.index_count, "mesh uploaded");
            ctx.meshes.insert(*mesh, uploaded);
        }
    }

    fn ensure_draw_capacity(ctx: &mut WgpuContext, draws: u64) {
        if draws <= ctx.draw_capacity {
            return;
        }
        let capacity = draws.next_power_of_two();
        ctx.draw_buffer.destroy();
        let (buffer, bind_group) =
            create_draw_buffer(&ctx.device, &ctx.draw_layout, ctx.draw_stride, capacity);
        ctx.draw_buffer = buffer;
        ctx.draw_bind_group = bind_group;
        ctx.draw_capacity = capacity;
    }

    pub fn render_frame(
        ctx: &mut WgpuContext,
        resources: &Resources,
        frame: &RenderFrame,
    ) -> Result<(), JsValue> {
        sync_meshes(ctx, resources, frame);
        ensure_draw_capacity(ctx, frame.commands.len() as u64);

        let light = &frame.lighting;
        let [dx, dy, dz] = light.unit_direction();
        let [r, g, b] = light.color;
        let globals = Globals {
            view_proj: frame.view_proj,
            light_dir: [dx, dy, dz, light.ambient],
            light_color: [r, g, b, light.directional],
        };
        ctx.queue
            .write_buffer(&ctx.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let stride = ctx.draw_stride as usize;
        let mut draw_bytes = vec![0u8; stride * frame.commands.len()];
        for (i, RenderCommand::DrawMesh { material, model, .. }) in
            frame.commands.iter().enumerate()
        {
            let [r, g, b] = material.color;
            let uniform = DrawUniform {
                model: *model,
                color: [r, g, b, material.opacity],
                params: [material.emissive, 0.0, 0.0, 0.0],
            };
            let bytes = bytemuck::bytes_of(&uniform);
            draw_bytes[i * stride..i * stride + bytes.len()].copy_from_slice(bytes);
        }
        if !draw_bytes.is_empty() {
            ctx.queue.write_buffer(&ctx.draw_buffer, 0, &draw_bytes);
        }

        let surface_texture = ctx
            .surface
            .get_current_texture()
            .map_err(|e| JsValue::from_str(&format!("surface acquire failed: {e}")))?;
        let view = surface_texture
            .texture
            .create_view(&::wgpu::TextureViewDescriptor::default());

        let mut encoder = ctx
            .device
            .create_command_encoder(&::wgpu::CommandEncoderDescriptor {
                label: Some("globe-encoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&::wgpu::RenderPassDescriptor {
                label: Some("globe-pass"),
                color_attachments: &[Some(::wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: ::wgpu::Operations {
                        load: ::wgpu::LoadOp::Clear(::wgpu::Color {
                            r: 0.004,
                            g: 0.008,
                            b: 0.016,
                            a: 1.0,
                        }),
                        store: ::wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(::wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.depth_view,
                    depth_ops: Some(::wgpu::Operations {
                        load: ::wgpu::LoadOp::Clear(1.0),
                        store: ::wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            rpass.set_bind_group(0, &ctx.globals_bind_group, &[]);
            let mut translucent_bound = None;
            for (i, RenderCommand::DrawMesh { mesh, material, .. }) in
                frame.commands.iter().enumerate()
            {
                let Some(gpu_mesh) = ctx.meshes.get(mesh) else {
                    continue;
                };
                let translucent = material.opacity < 1.0;
                if translucent_bound != Some(translucent) {
                    rpass.set_pipeline(if translucent {
                        &ctx.translucent_pipeline
                    } else {
                        &ctx.opaque_pipeline
                    });
                    translucent_bound = Some(translucent);
                }
                let offset = (i as u64 * ctx.draw_stride) as u32;
                rpass.set_bind_group(1, &ctx.draw_bind_group, &[offset]);
                rpass.set_vertex_buffer(0, gpu_mesh.vertex_buffer.slice(..));
                rpass.set_index_buffer(gpu_mesh.index_buffer.slice(..), ::wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..gpu_mesh.index_count, 0, 0..1);
            }
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    /// Destroys every uploaded buffer; used when the session unmounts.
    pub fn release_all(ctx: &mut WgpuContext) {
        for (_, gpu_mesh) in ctx.meshes.drain() {
            gpu_mesh.destroy();
        }
        ctx.draw_buffer.destroy();
        ctx.globals_buffer.destroy();
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use gpu::RenderFrame;
    use scene::resources::Resources;
    use wasm_bindgen::prelude::JsValue;

    #[derive(Debug, Default)]
    pub struct WgpuContext;

    pub async fn init_wgpu_from_canvas_id(_canvas_id: &str) -> Result<WgpuContext, JsValue> {
        Err(JsValue::from_str(
            "wgpu initialization is only available on wasm32 targets",
        ))
    }

    pub fn surface_size(_ctx: &WgpuContext) -> (u32, u32) {
        (1, 1)
    }

    pub fn resize_wgpu(_ctx: &mut WgpuContext, _width: u32, _height: u32) {}

    pub fn render_frame(
        _ctx: &mut WgpuContext,
        _resources: &Resources,
        _frame: &RenderFrame,
    ) -> Result<(), JsValue> {
        Err(JsValue::from_str(
            "wgpu rendering is only available on wasm32 targets",
        ))
    }

    pub fn release_all(_ctx: &mut WgpuContext) {}
}

pub use imp::{
    WgpuContext, init_wgpu_from_canvas_id, release_all, render_frame, resize_wgpu, surface_size,
};
