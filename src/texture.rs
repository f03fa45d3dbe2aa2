//! GPU textures, cubemaps, and mip chain generation.

use image::RgbaImage;

use crate::error::{Error, Result};
use crate::gpu::GpuContext;

/// Number of mip levels in a full chain for the given extent.
pub fn full_mip_chain(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// A 2D texture with a full mip chain.
#[derive(Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub mip_level_count: u32,
}

impl Texture {
    /// Upload a decoded image and build its mip chain.
    pub fn from_image(
        gpu: &GpuContext,
        mips: &mut MipmapGenerator,
        image: &RgbaImage,
        label: &str,
    ) -> Self {
        let (width, height) = image.dimensions();
        Self::from_pixels(gpu, mips, image.as_raw(), width, height, label)
    }

    /// Upload raw RGBA8 pixels and build the mip chain.
    pub fn from_pixels(
        gpu: &GpuContext,
        mips: &mut MipmapGenerator,
        pixels: &[u8],
        width: u32,
        height: u32,
        label: &str,
    ) -> Self {
        let mip_level_count = full_mip_chain(width, height);
        let format = wgpu::TextureFormat::Rgba8UnormSrgb;

        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
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

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Mipmap Encoder"),
            });
        mips.generate_layer(gpu, &mut encoder, &texture, format, 0, mip_level_count);
        gpu.queue.submit(Some(encoder.finish()));

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
            mip_level_count,
        }
    }

    /// A two-tone checkerboard, `cells` squares per side.
    pub fn checkerboard(
        gpu: &GpuContext,
        mips: &mut MipmapGenerator,
        size: u32,
        cells: u32,
        light: [u8; 4],
        dark: [u8; 4],
        label: &str,
    ) -> Self {
        let cell = (size / cells.max(1)).max(1);
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let parity = (x / cell + y / cell) % 2;
                let color = if parity == 0 { light } else { dark };
                pixels.extend_from_slice(&color);
            }
        }
        Self::from_pixels(gpu, mips, &pixels, size, size, label)
    }
}

/// A six-faced environment texture.
#[derive(Debug)]
pub struct Cubemap {
    pub texture: wgpu::Texture,
    /// Cube-dimension view over all faces.
    pub view: wgpu::TextureView,
    pub size: u32,
    pub mip_level_count: u32,
}

impl Cubemap {
    /// Upload six faces in +X, -X, +Y, -Y, +Z, -Z order.
    ///
    /// All faces must be square and the same size; mismatches are setup
    /// errors, not warnings.
    pub fn from_faces(
        gpu: &GpuContext,
        mips: &mut MipmapGenerator,
        faces: [&RgbaImage; 6],
        label: &str,
    ) -> Result<Self> {
        let (width, height) = faces[0].dimensions();
        if width != height {
            return Err(Error::asset(
                label,
                format!("cube face is {}x{}, must be square", width, height),
            ));
        }
        for (i, face) in faces.iter().enumerate() {
            if face.dimensions() != (width, height) {
                return Err(Error::asset(
                    label,
                    format!(
                        "cube face {} is {:?}, expected {}x{}",
                        i,
                        face.dimensions(),
                        width,
                        height
                    ),
                ));
            }
        }

        let size = width;
        let mip_level_count = full_mip_chain(size, size);
        let format = wgpu::TextureFormat::Rgba8UnormSrgb;

        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        for (layer, face) in faces.iter().enumerate() {
            gpu.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                face.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * size),
                    rows_per_image: Some(size),
                },
                wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: 1,
                },
            );
        }

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Cubemap Mipmap Encoder"),
            });
        for layer in 0..6 {
            mips.generate_layer(gpu, &mut encoder, &texture, format, layer, mip_level_count);
        }
        gpu.queue.submit(Some(encoder.finish()));

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&format!("{} Cube View", label)),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            size,
            mip_level_count,
        })
    }
}

const BLIT_SHADER: &str = r#"
struct VsOut {
    @builtin(position) position: vec4f,
    @location(0) uv: vec2f,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VsOut {
    var out: VsOut;
    let uv = vec2f(f32((index << 1u) & 2u), f32(index & 2u));
    out.position = vec4f(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2f(uv.x, 1.0 - uv.y);
    return out;
}

@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(1) var src_sampler: sampler;

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4f {
    return textureSample(src, src_sampler, in.uv);
}
"#;

/// Blit-based mip chain builder.
///
/// Each level is rendered from the one above it through a linear-filtered
/// fullscreen pass. Pipelines are cached per target format.
pub struct MipmapGenerator {
    module: wgpu::ShaderModule,
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    pipelines: std::collections::HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl MipmapGenerator {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mipmap Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mipmap Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
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

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mipmap Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Mipmap Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            module,
            layout,
            pipeline_layout,
            sampler,
            pipelines: std::collections::HashMap::new(),
        }
    }

    fn pipeline_for(&mut self, gpu: &GpuContext, format: wgpu::TextureFormat) -> &wgpu::RenderPipeline {
        let module = &self.module;
        let pipeline_layout = &self.pipeline_layout;
        self.pipelines.entry(format).or_insert_with(|| {
            gpu.device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("Mipmap Blit Pipeline"),
                    layout: Some(pipeline_layout),
                    vertex: wgpu::VertexState {
                        module,
                        entry_point: Some("vs_main"),
                        buffers: &[],
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module,
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState::default(),
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
        })
    }

    /// Rebuild mips 1.. of one array layer from its level 0.
    pub fn generate_layer(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        format: wgpu::TextureFormat,
        layer: u32,
        mip_level_count: u32,
    ) {
        // Build the pipeline up front so the borrow doesn't overlap the
        // sampler/layout uses below.
        self.pipeline_for(gpu, format);
        let pipeline = &self.pipelines[&format];

        for level in 1..mip_level_count {
            let src_view = texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Mipmap Source"),
                dimension: Some(wgpu::TextureViewDimension::D2),
                base_mip_level: level - 1,
                mip_level_count: Some(1),
                base_array_layer: layer,
                array_layer_count: Some(1),
                ..Default::default()
            });
            let dst_view = texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Mipmap Target"),
                dimension: Some(wgpu::TextureViewDimension::D2),
                base_mip_level: level,
                mip_level_count: Some(1),
                base_array_layer: layer,
                array_layer_count: Some(1),
                ..Default::default()
            });

            let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Mipmap Bind Group"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&src_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Mipmap Blit Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dst_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mip_chain_counts() {
        assert_eq!(full_mip_chain(1, 1), 1);
        assert_eq!(full_mip_chain(2, 2), 2);
        assert_eq!(full_mip_chain(512, 512), 10);
        assert_eq!(full_mip_chain(512, 256), 10);
        assert_eq!(full_mip_chain(1000, 1000), 10);
        assert_eq!(full_mip_chain(1024, 1), 11);
    }
}
