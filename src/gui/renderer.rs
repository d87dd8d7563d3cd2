//! wgpu backend for imgui draw data.

use std::fmt;
use std::mem::size_of;

use imgui::{Context, DrawCmd, DrawCmdParams, DrawData, DrawIdx, DrawList, DrawVert, TextureId, Textures};
use smallvec::SmallVec;
use wgpu::util::{BufferInitDescriptor, DeviceExt};

pub type RendererResult<T> = Result<T, RendererError>;

#[derive(Clone, Debug)]
pub enum RendererError {
    BadTexture(TextureId),
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererError::BadTexture(id) => write!(f, "bad texture id {}", id.id()),
        }
    }
}

impl std::error::Error for RendererError {}

#[derive(Clone, Copy)]
#[repr(transparent)]
struct DrawVertPod(DrawVert);

unsafe impl bytemuck::Zeroable for DrawVertPod {}
unsafe impl bytemuck::Pod for DrawVertPod {}

const INDEX_FORMAT: wgpu::IndexFormat = if size_of::<DrawIdx>() == 2 {
    wgpu::IndexFormat::Uint16
} else {
    wgpu::IndexFormat::Uint32
};

pub struct RendererConfig {
    pub texture_format: wgpu::TextureFormat,
}

impl RendererConfig {
    pub fn new(texture_format: wgpu::TextureFormat) -> Self {
        Self { texture_format }
    }

    fn fragment_entry_point(&self) -> &'static str {
        if self.texture_format.is_srgb() {
            "fs_main_srgb"
        } else {
            "fs_main_linear"
        }
    }
}

pub struct Texture {
    bind_group: wgpu::BindGroup,
}

impl Texture {
    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("imgui texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("imgui sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("imgui texture bind group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        Texture { bind_group }
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// Buffers holding one frame's draw lists, packed back to back.
struct RenderData {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    /// (base vertex, first index) of every draw list
    offsets: SmallVec<[(i32, u32); 4]>,
}

pub struct Renderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    textures: Textures<Texture>,
    texture_layout: wgpu::BindGroupLayout,
    render_data: Option<RenderData>,
}

impl Renderer {
    pub fn new(
        imgui: &mut Context,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: RendererConfig,
    ) -> Renderer {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("imgui shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("imgui.wgsl").into()),
        });

        // Create uniform matrix buffer
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("imgui uniform buffer"),
            size: size_of::<[[f32; 4]; 4]>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("imgui uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("imgui uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        // Create texture layout
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("imgui texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // Create render pipeline
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("imgui pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("imgui pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: size_of::<DrawVert>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Unorm8x4],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Cw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            // the overlay pass has no depth attachment
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: config.fragment_entry_point(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.texture_format,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::SrcAlpha,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::OneMinusDstAlpha,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
        });

        let mut renderer = Renderer {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            textures: Textures::new(),
            texture_layout,
            render_data: None,
        };

        renderer.reload_font_texture(imgui, device, queue);

        renderer
    }

    /// Records the draw commands of `draw_data` into `rpass`.
    pub fn render<'r>(
        &'r mut self,
        draw_data: &DrawData,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        rpass: &mut wgpu::RenderPass<'r>,
    ) -> RendererResult<()> {
        let fb_size = [
            draw_data.display_size[0] * draw_data.framebuffer_scale[0],
            draw_data.display_size[1] * draw_data.framebuffer_scale[1],
        ];
        if !(fb_size[0] > 0.0 && fb_size[1] > 0.0) || draw_data.total_vtx_count == 0 {
            return Ok(());
        }

        let matrix = projection(draw_data.display_pos, draw_data.display_size);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&matrix));

        self.render_data = Some(upload_draw_lists(draw_data, device));

        let this: &'r Renderer = self;
        let Some(render_data) = this.render_data.as_ref() else {
            return Ok(());
        };

        rpass.push_debug_group("imgui");
        this.bind_render_state(rpass, render_data);

        for (draw_list, &(base_vertex, first_index)) in
            draw_data.draw_lists().zip(render_data.offsets.iter())
        {
            this.render_draw_list(
                rpass,
                render_data,
                draw_list,
                draw_data.display_pos,
                draw_data.framebuffer_scale,
                fb_size,
                base_vertex,
                first_index,
            )?;
        }

        rpass.pop_debug_group();
        Ok(())
    }

    fn bind_render_state<'r>(&'r self, rpass: &mut wgpu::RenderPass<'r>, render_data: &'r RenderData) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.uniform_bind_group, &[]);
        rpass.set_vertex_buffer(0, render_data.vertex_buffer.slice(..));
        rpass.set_index_buffer(render_data.index_buffer.slice(..), INDEX_FORMAT);
    }

    #[allow(clippy::too_many_arguments)]
    fn render_draw_list<'r>(
        &'r self,
        rpass: &mut wgpu::RenderPass<'r>,
        render_data: &'r RenderData,
        draw_list: &DrawList,
        clip_off: [f32; 2],
        clip_scale: [f32; 2],
        fb_size: [f32; 2],
        base_vertex: i32,
        first_index: u32,
    ) -> RendererResult<()> {
        for cmd in draw_list.commands() {
            match cmd {
                DrawCmd::Elements {
                    count,
                    cmd_params:
                        DrawCmdParams {
                            clip_rect,
                            texture_id,
                            vtx_offset,
                            idx_offset,
                            ..
                        },
                } => {
                    let Some([x, y, width, height]) =
                        scissor_rect(clip_rect, clip_off, clip_scale, fb_size)
                    else {
                        continue;
                    };

                    let tex = self
                        .textures
                        .get(texture_id)
                        .ok_or(RendererError::BadTexture(texture_id))?;

                    rpass.set_bind_group(1, tex.bind_group(), &[]);
                    rpass.set_scissor_rect(x, y, width, height);

                    let start = first_index + idx_offset as u32;
                    let end = start + count as u32;
                    rpass.draw_indexed(start..end, base_vertex + vtx_offset as i32, 0..1);
                }
                DrawCmd::ResetRenderState => self.bind_render_state(rpass, render_data),
                // user callbacks are never registered by this application
                DrawCmd::RawCallback { .. } => {}
            }
        }
        Ok(())
    }

    pub fn reload_font_texture(&mut self, imgui: &mut Context, device: &wgpu::Device, queue: &wgpu::Queue) {
        let fonts = imgui.fonts();
        self.textures.remove(fonts.tex_id);

        let handle = fonts.build_rgba32_texture();
        let texture = Texture::from_rgba(
            device,
            queue,
            &self.texture_layout,
            handle.width,
            handle.height,
            handle.data,
        );

        fonts.tex_id = self.textures.insert(texture);
        fonts.clear_tex_data();
    }
}

fn upload_draw_lists(draw_data: &DrawData, device: &wgpu::Device) -> RenderData {
    let mut vertices: Vec<DrawVertPod> = Vec::with_capacity(draw_data.total_vtx_count as usize);
    let mut indices: Vec<DrawIdx> = Vec::with_capacity(draw_data.total_idx_count as usize);
    let mut offsets = SmallVec::new();

    for draw_list in draw_data.draw_lists() {
        offsets.push((vertices.len() as i32, indices.len() as u32));
        vertices.extend(draw_list.vtx_buffer().iter().copied().map(DrawVertPod));
        indices.extend_from_slice(draw_list.idx_buffer());
    }
    indices.resize(aligned_index_count(indices.len()), 0);

    let vertex_buffer = device.create_buffer_init(&BufferInitDescriptor {
        label: Some("imgui vertex buffer"),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&BufferInitDescriptor {
        label: Some("imgui index buffer"),
        contents: bytemuck::cast_slice(&indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    RenderData {
        vertex_buffer,
        index_buffer,
        offsets,
    }
}

/// Index count padded so the buffer size is a multiple of the copy alignment.
fn aligned_index_count(len: usize) -> usize {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    let bytes = len * size_of::<DrawIdx>();
    let padded = (bytes + align - 1) / align * align;
    padded / size_of::<DrawIdx>()
}

/// Orthographic projection mapping the display rectangle to clip space, y pointing down.
fn projection(display_pos: [f32; 2], display_size: [f32; 2]) -> [[f32; 4]; 4] {
    let l = display_pos[0];
    let t = display_pos[1];
    let r = l + display_size[0];
    let b = t + display_size[1];

    [
        [2.0 / (r - l), 0.0, 0.0, 0.0],
        [0.0, 2.0 / (t - b), 0.0, 0.0],
        [0.0, 0.0, 0.5, 0.0],
        [(r + l) / (l - r), (t + b) / (b - t), 0.5, 1.0],
    ]
}

/// Clip rectangle of a draw command in framebuffer pixels, `None` if nothing is visible.
fn scissor_rect(
    clip_rect: [f32; 4],
    clip_off: [f32; 2],
    clip_scale: [f32; 2],
    fb_size: [f32; 2],
) -> Option<[u32; 4]> {
    let min_x = ((clip_rect[0] - clip_off[0]) * clip_scale[0]).max(0.0).round();
    let min_y = ((clip_rect[1] - clip_off[1]) * clip_scale[1]).max(0.0).round();
    let max_x = ((clip_rect[2] - clip_off[0]) * clip_scale[0]).min(fb_size[0]).floor();
    let max_y = ((clip_rect[3] - clip_off[1]) * clip_scale[1]).min(fb_size[1]).floor();

    if max_x <= min_x || max_y <= min_y {
        return None;
    }
    Some([
        min_x as u32,
        min_y as u32,
        (max_x - min_x) as u32,
        (max_y - min_y) as u32,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(m: &[[f32; 4]; 4], x: f32, y: f32) -> (f32, f32) {
        (
            m[0][0] * x + m[1][0] * y + m[3][0],
            m[0][1] * x + m[1][1] * y + m[3][1],
        )
    }

    fn assert_maps(m: &[[f32; 4]; 4], from: (f32, f32), to: (f32, f32)) {
        let (x, y) = transform(m, from.0, from.1);
        assert!(
            (x - to.0).abs() < 1e-5 && (y - to.1).abs() < 1e-5,
            "{from:?} mapped to ({x}, {y}), expected {to:?}"
        );
    }

    #[test]
    fn projection_maps_display_corners() {
        let m = projection([0.0, 0.0], [1280.0, 720.0]);
        assert_maps(&m, (0.0, 0.0), (-1.0, 1.0));
        assert_maps(&m, (1280.0, 720.0), (1.0, -1.0));
        assert_maps(&m, (640.0, 360.0), (0.0, 0.0));

        let m = projection([100.0, 50.0], [200.0, 100.0]);
        assert_maps(&m, (100.0, 50.0), (-1.0, 1.0));
        assert_maps(&m, (300.0, 150.0), (1.0, -1.0));
    }

    #[test]
    fn scissor_is_clamped_to_the_framebuffer() {
        let fb = [1280.0, 720.0];
        assert_eq!(
            scissor_rect([10.0, 20.0, 110.0, 70.0], [0.0, 0.0], [1.0, 1.0], fb),
            Some([10, 20, 100, 50])
        );
        assert_eq!(
            scissor_rect([-50.0, -50.0, 2000.0, 2000.0], [0.0, 0.0], [1.0, 1.0], fb),
            Some([0, 0, 1280, 720])
        );
        assert_eq!(
            scissor_rect([10.0, 20.0, 110.0, 70.0], [0.0, 0.0], [2.0, 2.0], [2560.0, 1440.0]),
            Some([20, 40, 200, 100])
        );
    }

    #[test]
    fn empty_or_offscreen_clips_are_skipped() {
        let fb = [1280.0, 720.0];
        assert_eq!(scissor_rect([10.0, 10.0, 10.0, 50.0], [0.0, 0.0], [1.0, 1.0], fb), None);
        assert_eq!(
            scissor_rect([1300.0, 10.0, 1400.0, 50.0], [0.0, 0.0], [1.0, 1.0], fb),
            None
        );
    }

    #[test]
    fn index_buffers_are_padded_to_copy_alignment() {
        assert_eq!(aligned_index_count(0), 0);
        assert_eq!(aligned_index_count(6), 6);
        assert_eq!(aligned_index_count(3), 4);
        assert_eq!(aligned_index_count(4), 4);
    }

    #[test]
    fn fragment_entry_point_follows_target_encoding() {
        assert_eq!(
            RendererConfig::new(wgpu::TextureFormat::Bgra8Unorm).fragment_entry_point(),
            "fs_main_linear"
        );
        assert_eq!(
            RendererConfig::new(wgpu::TextureFormat::Bgra8UnormSrgb).fragment_entry_point(),
            "fs_main_srgb"
        );
    }
}
