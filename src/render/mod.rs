//! wgpu adapter: draws the engine's items as textured quads.
//!
//! The core owns item state; this module owns everything GPU-side and turns
//! the item/caption composition into model matrices.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use image::RgbaImage;
use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use crate::gallery::{Camera, Caption, FrameView, GalleryItem, ItemLayout, ItemTransform};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;
/// Caption nudge toward the camera so it never z-fights its parent.
const CAPTION_LIFT: f32 = 0.01;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Vertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

// unit quad centred on the origin, triangle strip
const QUAD: [Vertex; 4] = [
    Vertex { pos: [-0.5, -0.5], uv: [0.0, 1.0] },
    Vertex { pos: [0.5, -0.5], uv: [1.0, 1.0] },
    Vertex { pos: [-0.5, 0.5], uv: [0.0, 0.0] },
    Vertex { pos: [0.5, 0.5], uv: [1.0, 0.0] },
];

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Uniforms {
    mvp: [[f32; 4]; 4],
    sizes: [f32; 4],
    params: [f32; 4],
}

/// Look of every item, shared across the ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub background: wgpu::Color,
    /// Corner radius in UV units.
    pub border_radius: f32,
}

/// Projection × view for the fixed gallery camera.
pub fn view_projection(camera: &Camera, aspect: f32) -> Mat4 {
    let projection = Mat4::perspective_rh(camera.fov_radians(), aspect.max(f32::EPSILON), Z_NEAR, Z_FAR);
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, camera.distance), Vec3::ZERO, Vec3::Y);
    projection * view
}

/// Translation and tilt of an item, plus its focus scale; no plane size.
fn item_frame(t: &ItemTransform) -> Mat4 {
    Mat4::from_translation(Vec3::new(t.x, 0.0, t.z))
        * Mat4::from_rotation_y(t.rotation_y)
        * Mat4::from_scale(Vec3::new(t.scale, t.scale, 1.0))
}

pub fn item_model(t: &ItemTransform, layout: &ItemLayout) -> Mat4 {
    item_frame(t) * Mat4::from_scale(Vec3::new(layout.plane_width, layout.plane_height, 1.0))
}

/// Caption model: the parent's frame followed by the caption's local offset and size.
pub fn caption_model(t: &ItemTransform, caption: &Caption) -> Mat4 {
    item_frame(t)
        * Mat4::from_translation(Vec3::new(0.0, caption.offset_y, CAPTION_LIFT))
        * Mat4::from_scale(Vec3::new(caption.width, caption.height, 1.0))
}

struct Plane {
    _texture: wgpu::Texture,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl Plane {
    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        label: &str,
        image: Option<&RgbaImage>,
    ) -> Self {
        let (width, height) = image.map_or((1, 1), RgbaImage::dimensions);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        match image {
            Some(image) => write_pixels(queue, &texture, image.as_raw(), width, height),
            None => write_pixels(queue, &texture, &[0, 0, 0, 0], 1, 1),
        }
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(&Uniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        Self {
            _texture: texture,
            uniforms,
            bind_group,
        }
    }
}

fn write_pixels(queue: &wgpu::Queue, texture: &wgpu::Texture, data: &[u8], width: u32, height: u32) {
    queue.write_texture(
        texture.as_image_copy(),
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

struct ItemGpu {
    image: Plane,
    caption: Option<Plane>,
}

/// Owns the pipeline, the shared quad and one texture/uniform pair per surface.
pub struct GalleryRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    quad: wgpu::Buffer,
    depth: wgpu::TextureView,
    items: Vec<ItemGpu>,
    style: RenderStyle,
    aspect: f32,
}

impl GalleryRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        size: (u32, u32),
        items: &[GalleryItem],
        style: RenderStyle,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gallery-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("gallery.wgsl").into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gallery-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
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
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gallery-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("gallery-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("gallery-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gallery-quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let items = items
            .iter()
            .map(|item| ItemGpu {
                image: Plane::new(device, queue, &bind_layout, &sampler, "gallery-item", None),
                caption: item.caption().map(|caption| {
                    Plane::new(
                        device,
                        queue,
                        &bind_layout,
                        &sampler,
                        "gallery-caption",
                        Some(caption.label.image()),
                    )
                }),
            })
            .collect::<Vec<_>>();
        debug!(surfaces = items.len(), "gallery renderer ready");

        Self {
            pipeline,
            bind_layout,
            sampler,
            quad,
            depth: create_depth(device, size),
            items,
            style,
            aspect: size.0.max(1) as f32 / size.1.max(1) as f32,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, size: (u32, u32)) {
        self.depth = create_depth(device, size);
        self.aspect = size.0.max(1) as f32 / size.1.max(1) as f32;
    }

    /// Replaces the placeholder texture of `slot` with a decoded image.
    pub fn upload_image(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, slot: usize, image: &RgbaImage) {
        let Some(item) = self.items.get_mut(slot) else {
            return;
        };
        item.image = Plane::new(device, queue, &self.bind_layout, &self.sampler, "gallery-item", Some(image));
        trace!(slot, width = image.width(), height = image.height(), "item texture uploaded");
    }

    /// Encodes one frame. Items are drawn back to front so translucent edges blend
    /// over whatever lies behind them.
    pub fn render(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        frame: &FrameView<'_>,
    ) {
        let view_proj = view_projection(frame.camera, self.aspect);
        let mut order = (0..frame.items.len().min(self.items.len())).collect::<Vec<_>>();
        order.sort_by(|&a, &b| {
            frame.items[a]
                .transform()
                .z
                .total_cmp(&frame.items[b].transform().z)
        });

        for &slot in &order {
            let item = &frame.items[slot];
            let gpu = &self.items[slot];
            let t = item.transform();
            let layout = item.layout();
            let meta = item.image();
            let uniforms = Uniforms {
                mvp: (view_proj * item_model(t, layout)).to_cols_array_2d(),
                sizes: [layout.plane_width, layout.plane_height, meta.width as f32, meta.height as f32],
                params: [t.opacity, self.style.border_radius, 0.0, 0.0],
            };
            queue.write_buffer(&gpu.image.uniforms, 0, bytemuck::bytes_of(&uniforms));

            if let (Some(caption), Some(surface)) = (item.caption(), gpu.caption.as_ref()) {
                let uniforms = Uniforms {
                    mvp: (view_proj * caption_model(t, caption)).to_cols_array_2d(),
                    sizes: [caption.width, caption.height, caption.label.width() as f32, caption.label.height() as f32],
                    params: [t.opacity, 0.0, 1.0, 0.0],
                };
                queue.write_buffer(&surface.uniforms, 0, bytemuck::bytes_of(&uniforms));
            }
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("gallery-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.style.background),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_vertex_buffer(0, self.quad.slice(..));
        for &slot in &order {
            let gpu = &self.items[slot];
            pass.set_bind_group(0, &gpu.image.bind_group, &[]);
            pass.draw(0..4, 0..1);
            if let Some(caption) = gpu.caption.as_ref() {
                pass.set_bind_group(0, &caption.bind_group, &[]);
                pass.draw(0..4, 0..1);
            }
        }
    }
}

fn create_depth(device: &wgpu::Device, (width, height): (u32, u32)) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("gallery-depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn project(m: Mat4, p: Vec3) -> Vec3 {
        let clip = m * Vec4::new(p.x, p.y, p.z, 1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn centred_item_projects_to_screen_centre() {
        let camera = Camera::default();
        let layout = ItemLayout {
            plane_width: 8.0,
            plane_height: 10.0,
            padding: -1.6,
            item_width: 6.4,
        };
        let m = view_projection(&camera, 16.0 / 9.0) * item_model(&ItemTransform::default(), &layout);
        let centre = project(m, Vec3::ZERO);
        assert!(centre.x.abs() < 1e-5 && centre.y.abs() < 1e-5);
        // the quad's top edge sits at half the plane height
        let top = project(m, Vec3::new(0.0, 0.5, 0.0));
        let visible_half = (camera.fov_radians() / 2.0).tan() * camera.distance;
        assert!((top.y - 5.0 / visible_half).abs() < 1e-4);
    }

    #[test]
    fn viewport_edge_maps_to_clip_edge() {
        let camera = Camera::default();
        let aspect = 1280.0 / 720.0;
        let half_h = (camera.fov_radians() / 2.0).tan() * camera.distance;
        let edge = project(view_projection(&camera, aspect), Vec3::new(half_h * aspect, 0.0, 0.0));
        assert!((edge.x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn uniforms_are_std140_sized() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 96);
    }
}
