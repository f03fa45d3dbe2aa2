//! Multi-target geometry buffers and the fullscreen post-processing pass.
//!
//! Scenes render into a [`GeometryBuffers`] (color + world-space normals +
//! depth) instead of the surface, then [`PostProcessPass`] resolves it to the
//! swapchain with one of the [`PostEffect`] shaders. Every effect shares a
//! single bind group layout and uniform block; switching effects is just
//! switching pipelines.

use std::collections::HashMap;

use glam::Vec3;

use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::gpu::GpuContext;
use crate::target::{RenderTarget, RenderTargetDesc};

/// Color attachment format for lit output.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// Attachment format for world-space normals.
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Depth attachment format, sampled by depth-aware effects.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// The G-buffer streams an effect reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectInput {
    Color,
    Normal,
    Depth,
}

/// A fullscreen effect applied when resolving geometry buffers to an output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PostEffect {
    /// Pass the color buffer through untouched.
    Blit,
    /// Visualize the raw depth buffer.
    ShowDepth,
    /// Visualize world-space normals, remapped to [0, 1].
    ShowNormals,
    Grayscale,
    /// Animated sine-wave UV wobble.
    Distortion,
    ChromaticAberration,
    /// Gaussian blur with the given sigma in texels.
    Blur { sigma: f32 },
    /// Blur streaking toward the screen center.
    RadialBlur { sigma: f32 },
    /// Exponential distance fog reconstructed from depth.
    Fog { distance: f32, color: [f32; 4] },
    /// Deferred directional lighting from the normal buffer.
    Light {
        direction: Vec3,
        color: Vec3,
        ambient: Vec3,
    },
    /// Darken depth discontinuities (Sobel over the depth buffer).
    Edge,
}

impl PostEffect {
    pub fn blur() -> Self {
        PostEffect::Blur { sigma: 2.0 }
    }

    pub fn radial_blur() -> Self {
        PostEffect::RadialBlur { sigma: 40.0 }
    }

    pub fn fog() -> Self {
        PostEffect::Fog {
            distance: 5.0,
            color: [0.88, 0.65, 0.15, 1.0],
        }
    }

    pub fn light() -> Self {
        PostEffect::Light {
            direction: Vec3::new(-0.5, -1.0, -0.3),
            color: Vec3::new(0.9, 0.8, 0.7),
            ambient: Vec3::new(0.1, 0.1, 0.1),
        }
    }

    /// The fragment entry point implementing this effect.
    pub fn entry_point(&self) -> &'static str {
        match self {
            PostEffect::Blit => "fs_blit",
            PostEffect::ShowDepth => "fs_show_depth",
            PostEffect::ShowNormals => "fs_show_normals",
            PostEffect::Grayscale => "fs_grayscale",
            PostEffect::Distortion => "fs_distortion",
            PostEffect::ChromaticAberration => "fs_chromatic_aberration",
            PostEffect::Blur { .. } => "fs_blur",
            PostEffect::RadialBlur { .. } => "fs_radial_blur",
            PostEffect::Fog { .. } => "fs_fog",
            PostEffect::Light { .. } => "fs_light",
            PostEffect::Edge => "fs_edge",
        }
    }

    /// Which G-buffer streams this effect actually reads.
    pub fn inputs(&self) -> &'static [EffectInput] {
        match self {
            PostEffect::Blit
            | PostEffect::Grayscale
            | PostEffect::Distortion
            | PostEffect::ChromaticAberration
            | PostEffect::Blur { .. }
            | PostEffect::RadialBlur { .. } => &[EffectInput::Color],
            PostEffect::ShowDepth => &[EffectInput::Depth],
            PostEffect::ShowNormals => &[EffectInput::Normal],
            PostEffect::Fog { .. } => &[EffectInput::Color, EffectInput::Depth],
            PostEffect::Light { .. } => &[EffectInput::Color, EffectInput::Normal],
            PostEffect::Edge => &[EffectInput::Color, EffectInput::Normal, EffectInput::Depth],
        }
    }

    /// Short name for HUD/window-title display.
    pub fn label(&self) -> &'static str {
        match self {
            PostEffect::Blit => "blit",
            PostEffect::ShowDepth => "show depth",
            PostEffect::ShowNormals => "show normals",
            PostEffect::Grayscale => "grayscale",
            PostEffect::Distortion => "distortion",
            PostEffect::ChromaticAberration => "chromatic aberration",
            PostEffect::Blur { .. } => "blur",
            PostEffect::RadialBlur { .. } => "radial blur",
            PostEffect::Fog { .. } => "fog",
            PostEffect::Light { .. } => "light",
            PostEffect::Edge => "edge",
        }
    }
}

/// Offscreen scene output: color + normals + depth, sized to the surface.
pub struct GeometryBuffers {
    pub target: RenderTarget,
}

impl GeometryBuffers {
    pub fn new(gpu: &GpuContext, width: u32, height: u32) -> Result<Self> {
        let target = RenderTarget::new(
            gpu,
            &RenderTargetDesc::new("Geometry Buffers", width, height)
                .color("color", COLOR_FORMAT)
                .color("normal", NORMAL_FORMAT)
                .depth(DEPTH_FORMAT),
        )?;
        Ok(Self { target })
    }

    /// Track the surface size; reallocates on change.
    pub fn ensure_size(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        self.target.ensure_size(gpu, width, height);
    }

    /// Color target states for geometry pipelines rendering into these
    /// buffers, in attachment order.
    pub fn color_targets() -> Vec<wgpu::ColorTargetState> {
        vec![
            wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            },
            wgpu::ColorTargetState {
                format: NORMAL_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            },
        ]
    }

    /// Begin the geometry pass. Normals clear to zero so background pixels
    /// are distinguishable from shaded ones.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        clear: wgpu::Color,
    ) -> wgpu::RenderPass<'e> {
        self.target
            .begin_pass(encoder, &[clear, wgpu::Color::TRANSPARENT], Some(1.0))
    }

    pub fn color_view(&self) -> &wgpu::TextureView {
        &self.target.color[0].view
    }

    pub fn normal_view(&self) -> &wgpu::TextureView {
        &self.target.color[1].view
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        self.target.depth.as_ref().map(|a| &a.view).unwrap_or_else(|| {
            // Constructed with a depth attachment; this cannot be reached
            // through the public constructor.
            unreachable!("geometry buffers always carry depth")
        })
    }
}

/// Uniform block shared by every post effect. Matches the WGSL struct in
/// `shaders/post.wgsl` field for field.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct PostUniforms {
    inv_projection: [[f32; 4]; 4],
    fog_color: [f32; 4],
    light_direction: [f32; 4],
    light_color: [f32; 4],
    ambient_color: [f32; 4],
    resolution: [f32; 2],
    time: f32,
    sigma: f32,
    fog_distance: f32,
    _pad: [f32; 3],
}

const POST_SHADER: &str = include_str!("shaders/post.wgsl");

/// Resolves [`GeometryBuffers`] to an output view through a [`PostEffect`].
///
/// Pipelines are built per entry point on first use and cached; all of them
/// share one shader module, bind group layout, and uniform buffer.
pub struct PostProcessPass {
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    output_format: wgpu::TextureFormat,
    pipelines: HashMap<&'static str, wgpu::RenderPipeline>,
}

impl PostProcessPass {
    pub fn new(gpu: &GpuContext, output_format: wgpu::TextureFormat) -> Result<Self> {
        let device = &gpu.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Post Process Shader"),
            source: wgpu::ShaderSource::Wgsl(POST_SHADER.into()),
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::ShaderCompile {
                label: "post process".into(),
                stage: "module",
                diagnostics: err.to_string(),
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post Process Bind Group Layout"),
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
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Process Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Post Process Uniforms"),
            size: std::mem::size_of::<PostUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Process Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            module,
            bind_group_layout,
            pipeline_layout,
            uniform_buffer,
            sampler,
            output_format,
            pipelines: HashMap::new(),
        })
    }

    fn pipeline_for(&mut self, gpu: &GpuContext, entry: &'static str) -> Result<&wgpu::RenderPipeline> {
        if !self.pipelines.contains_key(entry) {
            let device = &gpu.device;
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("Post Process '{}'", entry)),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.module,
                    entry_point: Some(entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.output_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
            if let Some(err) = pollster::block_on(device.pop_error_scope()) {
                return Err(Error::ShaderLink {
                    label: format!("post process '{}'", entry),
                    diagnostics: err.to_string(),
                });
            }
            self.pipelines.insert(entry, pipeline);
        }
        Ok(&self.pipelines[entry])
    }

    fn uniforms_for(
        effect: &PostEffect,
        camera: &Camera,
        width: u32,
        height: u32,
        time: f32,
    ) -> PostUniforms {
        let mut u = PostUniforms {
            inv_projection: camera.projection_matrix().inverse().to_cols_array_2d(),
            fog_color: [0.0; 4],
            light_direction: [0.0, -1.0, 0.0, 0.0],
            light_color: [1.0; 4],
            ambient_color: [0.0; 4],
            resolution: [width as f32, height as f32],
            time,
            sigma: 1.0,
            fog_distance: 1.0,
            _pad: [0.0; 3],
        };
        match *effect {
            PostEffect::Blur { sigma } | PostEffect::RadialBlur { sigma } => {
                u.sigma = sigma;
            }
            PostEffect::Fog { distance, color } => {
                u.fog_distance = distance;
                u.fog_color = color;
            }
            PostEffect::Light {
                direction,
                color,
                ambient,
            } => {
                u.light_direction = direction.extend(0.0).to_array();
                u.light_color = color.extend(1.0).to_array();
                u.ambient_color = ambient.extend(1.0).to_array();
            }
            _ => {}
        }
        u
    }

    /// Resolve `buffers` into `output` with `effect`.
    ///
    /// `camera` supplies the inverse projection for depth reconstruction;
    /// `time` drives animated effects.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &GeometryBuffers,
        camera: &Camera,
        output: &wgpu::TextureView,
        effect: &PostEffect,
        time: f32,
    ) -> Result<()> {
        let uniforms = Self::uniforms_for(
            effect,
            camera,
            buffers.target.width,
            buffers.target.height,
            time,
        );
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post Process Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(buffers.color_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(buffers.normal_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(buffers.depth_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let pipeline = self.pipeline_for(gpu, effect.entry_point())?;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Post Process Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PostEffect; 11] = [
        PostEffect::Blit,
        PostEffect::ShowDepth,
        PostEffect::ShowNormals,
        PostEffect::Grayscale,
        PostEffect::Distortion,
        PostEffect::ChromaticAberration,
        PostEffect::Blur { sigma: 2.0 },
        PostEffect::RadialBlur { sigma: 40.0 },
        PostEffect::Fog {
            distance: 5.0,
            color: [1.0; 4],
        },
        PostEffect::Light {
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            ambient: Vec3::ZERO,
        },
        PostEffect::Edge,
    ];

    #[test]
    fn entry_points_are_distinct_and_present_in_source() {
        let mut seen = std::collections::HashSet::new();
        for effect in &ALL {
            let entry = effect.entry_point();
            assert!(seen.insert(entry), "duplicate entry point {}", entry);
            assert!(
                POST_SHADER.contains(&format!("fn {}(", entry)),
                "entry point {} missing from post.wgsl",
                entry
            );
        }
    }

    #[test]
    fn depth_effects_declare_the_depth_input() {
        for effect in [PostEffect::ShowDepth, PostEffect::fog(), PostEffect::Edge] {
            assert!(
                effect.inputs().contains(&EffectInput::Depth),
                "{} should read depth",
                effect.label()
            );
        }
        assert!(!PostEffect::Blit.inputs().contains(&EffectInput::Depth));
    }

    #[test]
    fn normal_effects_declare_the_normal_input() {
        for effect in [PostEffect::ShowNormals, PostEffect::light(), PostEffect::Edge] {
            assert!(
                effect.inputs().contains(&EffectInput::Normal),
                "{} should read normals",
                effect.label()
            );
        }
        assert!(!PostEffect::Grayscale.inputs().contains(&EffectInput::Normal));
    }

    #[test]
    fn uniform_block_matches_wgsl_size() {
        // mat4 + 4 vec4s + vec2 + 3 f32s + 3 pad f32s = 160 bytes.
        assert_eq!(std::mem::size_of::<PostUniforms>(), 160);
    }

    #[test]
    fn defaults_match_documented_values() {
        assert_eq!(PostEffect::blur(), PostEffect::Blur { sigma: 2.0 });
        assert_eq!(PostEffect::radial_blur(), PostEffect::RadialBlur { sigma: 40.0 });
        match PostEffect::fog() {
            PostEffect::Fog { distance, .. } => assert_eq!(distance, 5.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn effect_uniforms_carry_parameters() {
        use crate::camera::{Camera, Projection};
        let camera = Camera::new(
            Vec3::ZERO,
            Vec3::NEG_Z,
            Projection::Perspective {
                fov_y: std::f32::consts::FRAC_PI_3,
                aspect: 16.0 / 9.0,
                near: 0.1,
                far: 100.0,
            },
        );

        let u = PostProcessPass::uniforms_for(
            &PostEffect::Blur { sigma: 3.5 },
            &camera,
            1280,
            720,
            1.0,
        );
        assert_eq!(u.sigma, 3.5);
        assert_eq!(u.resolution, [1280.0, 720.0]);

        let u = PostProcessPass::uniforms_for(&PostEffect::fog(), &camera, 64, 64, 0.0);
        assert_eq!(u.fog_distance, 5.0);
    }
}
