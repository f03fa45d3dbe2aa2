//! GL-style shader programs over wgpu.
//!
//! [`ShaderProgram`] keeps the attach/link/use shape of classic GL programs:
//! attach a module per stage (each validated on its own, so compile
//! diagnostics point at the right stage), then [`link`](ShaderProgram::link)
//! with a [`PipelineDesc`] describing everything WebGL kept in global state
//! (vertex streams, targets, depth, topology, culling). Linking also declares
//! the program's uniform block and texture slots; after that, uniforms are
//! set by name and flushed on [`bind`](ShaderProgram::bind).
//!
//! Setting a uniform the compiler optimized out (or a misspelled one) is a
//! logged warning, not an error; frames keep rendering.

use std::collections::{HashMap, HashSet};

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::error::{Error, Result};
use crate::gpu::GpuContext;
use crate::mesh::StreamLayout;

/// The two programmable stages a program is assembled from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }

    /// Entry point convention: `vs_main` / `fs_main`.
    fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }
}

/// Scalar and matrix types a uniform block may contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformType {
    F32,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformType {
    /// Byte size in the uniform address space.
    pub fn size(self) -> usize {
        match self {
            UniformType::F32 => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat4 => 64,
        }
    }

    /// Required alignment in the uniform address space.
    pub fn align(self) -> usize {
        match self {
            UniformType::F32 => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 16,
            UniformType::Vec4 => 16,
            UniformType::Mat4 => 16,
        }
    }
}

/// A value being written into the uniform block.
#[derive(Clone, Copy, Debug)]
pub enum UniformValue {
    F32(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    fn ty(&self) -> UniformType {
        match self {
            UniformValue::F32(_) => UniformType::F32,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    fn write_into(&self, dst: &mut [u8]) {
        match self {
            UniformValue::F32(v) => dst.copy_from_slice(&v.to_le_bytes()),
            UniformValue::Vec2(v) => dst.copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec3(v) => dst.copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec4(v) => dst.copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Mat4(v) => dst.copy_from_slice(bytemuck::cast_slice(&v.to_cols_array())),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::F32(v)
    }
}
impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}
impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}
impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}
impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

/// An ordered uniform block declaration.
///
/// Fields are laid out with WGSL uniform address-space rules (`vec3` aligns
/// to 16, the struct size rounds up to 16), so the offsets here match what
/// `naga` computes for the shader-side struct as long as both declare the
/// same fields in the same order.
#[derive(Default, Clone, Debug)]
pub struct UniformLayout {
    fields: Vec<(String, UniformType, usize)>,
    size: usize,
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

impl UniformLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, ty: UniformType) -> Self {
        let offset = align_up(self.size, ty.align());
        self.fields.push((name.into(), ty, offset));
        self.size = offset + ty.size();
        self
    }

    /// Offset and type for a field, if declared.
    pub fn field(&self, name: &str) -> Option<(usize, UniformType)> {
        self.fields
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, ty, offset)| (*offset, *ty))
    }

    /// Total block size, rounded up to 16 bytes.
    pub fn size(&self) -> usize {
        align_up(self.size.max(4), 16)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// How a declared texture slot is sampled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureSampleKind {
    /// Filterable float texture, paired with the linear sampler.
    Float,
    /// Depth texture, paired with the nearest sampler.
    Depth,
    /// Non-filterable float (e.g. rgba32float), paired with the nearest sampler.
    UnfilterableFloat,
}

/// A named texture binding declared at link time.
#[derive(Clone, Debug)]
pub struct TextureSlot {
    pub name: String,
    pub dimension: wgpu::TextureViewDimension,
    pub sample_kind: TextureSampleKind,
}

impl TextureSlot {
    pub fn d2(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: wgpu::TextureViewDimension::D2,
            sample_kind: TextureSampleKind::Float,
        }
    }

    pub fn cube(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: wgpu::TextureViewDimension::Cube,
            sample_kind: TextureSampleKind::Float,
        }
    }

    pub fn depth(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: wgpu::TextureViewDimension::D2,
            sample_kind: TextureSampleKind::Depth,
        }
    }

    pub fn sample_kind(mut self, kind: TextureSampleKind) -> Self {
        self.sample_kind = kind;
        self
    }
}

/// Fixed-function state a program is linked against.
///
/// wgpu bakes all of this into the pipeline, so it has to be declared up
/// front instead of flipped per draw call.
#[derive(Clone, Debug)]
pub struct PipelineDesc {
    pub streams: Vec<StreamLayout>,
    pub color_targets: Vec<wgpu::ColorTargetState>,
    pub depth: Option<wgpu::DepthStencilState>,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub uniforms: UniformLayout,
    pub textures: Vec<TextureSlot>,
}

impl PipelineDesc {
    /// Triangles, back-face culling, one surface-format color target,
    /// no depth.
    pub fn new(surface_format: wgpu::TextureFormat) -> Self {
        Self {
            streams: Vec::new(),
            color_targets: vec![wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            }],
            depth: None,
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            uniforms: UniformLayout::new(),
            textures: Vec::new(),
        }
    }

    pub fn stream(mut self, layout: StreamLayout) -> Self {
        self.streams.push(layout);
        self
    }

    pub fn color_target(mut self, format: wgpu::TextureFormat) -> Self {
        self.color_targets.push(wgpu::ColorTargetState {
            format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        });
        self
    }

    /// Replace the default color target list entirely.
    pub fn color_targets(mut self, targets: Vec<wgpu::ColorTargetState>) -> Self {
        self.color_targets = targets;
        self
    }

    pub fn depth(mut self, format: wgpu::TextureFormat, write: bool) -> Self {
        self.depth = Some(wgpu::DepthStencilState {
            format,
            depth_write_enabled: write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        self
    }

    pub fn topology(mut self, topology: wgpu::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn cull(mut self, cull_mode: Option<wgpu::Face>) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    pub fn uniforms(mut self, layout: UniformLayout) -> Self {
        self.uniforms = layout;
        self
    }

    pub fn texture(mut self, slot: TextureSlot) -> Self {
        self.textures.push(slot);
        self
    }
}

struct LinkedState {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_layout: UniformLayout,
    staging: Vec<u8>,
    dirty: bool,
    texture_slots: Vec<TextureSlot>,
    bound_textures: Vec<Option<wgpu::TextureView>>,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: Option<wgpu::Sampler>,
}

/// A GL-style shader program: attach stages, link, set uniforms by name.
pub struct ShaderProgram {
    label: String,
    vertex: Option<wgpu::ShaderModule>,
    fragment: Option<wgpu::ShaderModule>,
    linked: Option<LinkedState>,
    warned_uniforms: HashSet<String>,
}

impl ShaderProgram {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            vertex: None,
            fragment: None,
            linked: None,
            warned_uniforms: HashSet::new(),
        }
    }

    /// Compile and attach one stage.
    ///
    /// The module is validated immediately; diagnostics come back attached
    /// to this stage instead of surfacing at first draw.
    pub fn attach(&mut self, gpu: &GpuContext, source: &str, stage: ShaderStage) -> Result<()> {
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{} {} stage", self.label, stage.name())),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
            return Err(Error::ShaderCompile {
                label: self.label.clone(),
                stage: stage.name(),
                diagnostics: err.to_string(),
            });
        }

        match stage {
            ShaderStage::Vertex => self.vertex = Some(module),
            ShaderStage::Fragment => self.fragment = Some(module),
        }
        Ok(())
    }

    /// Link the attached stages into a pipeline.
    ///
    /// Declares the uniform block and texture slots and primes the name
    /// lookup used by [`set_uniform`](Self::set_uniform).
    pub fn link(&mut self, gpu: &GpuContext, desc: &PipelineDesc) -> Result<()> {
        let vertex = self.vertex.as_ref().ok_or_else(|| Error::ShaderLink {
            label: self.label.clone(),
            diagnostics: "no vertex stage attached".into(),
        })?;
        let fragment = self.fragment.as_ref().ok_or_else(|| Error::ShaderLink {
            label: self.label.clone(),
            diagnostics: "no fragment stage attached".into(),
        })?;

        let device = &gpu.device;

        let needs_nearest = desc
            .textures
            .iter()
            .any(|slot| slot.sample_kind != TextureSampleKind::Float);

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        for (i, slot) in desc.textures.iter().enumerate() {
            let sample_type = match slot.sample_kind {
                TextureSampleKind::Float => wgpu::TextureSampleType::Float { filterable: true },
                TextureSampleKind::Depth => wgpu::TextureSampleType::Depth,
                TextureSampleKind::UnfilterableFloat => {
                    wgpu::TextureSampleType::Float { filterable: false }
                }
            };
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1 + i as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type,
                    view_dimension: slot.dimension,
                    multisampled: false,
                },
                count: None,
            });
        }
        let sampler_base = 1 + desc.textures.len() as u32;
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: sampler_base,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        if needs_nearest {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: sampler_base + 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            });
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{} Bind Group Layout", self.label)),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} Pipeline Layout", self.label)),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Non-interleaved streams: one buffer per attribute.
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = desc
            .streams
            .iter()
            .map(|s| {
                [wgpu::VertexAttribute {
                    format: s.format,
                    offset: 0,
                    shader_location: s.shader_location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = desc
            .streams
            .iter()
            .zip(&attributes)
            .map(|(s, attrs)| wgpu::VertexBufferLayout {
                array_stride: s.format.size(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attrs,
            })
            .collect();

        let targets: Vec<Option<wgpu::ColorTargetState>> =
            desc.color_targets.iter().cloned().map(Some).collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} Pipeline", self.label)),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: Some(ShaderStage::Vertex.entry_point()),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: Some(ShaderStage::Fragment.entry_point()),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: desc.topology,
                cull_mode: desc.cull_mode,
                ..Default::default()
            },
            depth_stencil: desc.depth.clone(),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
            return Err(Error::ShaderLink {
                label: self.label.clone(),
                diagnostics: err.to_string(),
            });
        }

        let uniform_size = desc.uniforms.size();
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{} Uniforms", self.label)),
            size: uniform_size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Linear Sampler", self.label)),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let nearest_sampler = needs_nearest.then(|| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(&format!("{} Nearest Sampler", self.label)),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Nearest,
                min_filter: wgpu::FilterMode::Nearest,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        });

        let bound_textures = vec![None; desc.textures.len()];
        self.linked = Some(LinkedState {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            uniform_layout: desc.uniforms.clone(),
            staging: vec![0u8; uniform_size],
            dirty: true,
            texture_slots: desc.textures.clone(),
            bound_textures,
            linear_sampler,
            nearest_sampler,
        });
        Ok(())
    }

    /// Write a uniform by name into the staging block.
    ///
    /// Unknown names warn (once per name) and are otherwise ignored, the
    /// same treatment drivers give uniforms they optimized away.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        let Some(linked) = self.linked.as_mut() else {
            if self.warned_uniforms.insert(name.to_string()) {
                log::warn!("program '{}': set_uniform('{}') before link", self.label, name);
            }
            return;
        };

        match linked.uniform_layout.field(name) {
            Some((offset, ty)) if ty == value.ty() => {
                value.write_into(&mut linked.staging[offset..offset + ty.size()]);
                linked.dirty = true;
            }
            Some((_, ty)) => {
                if self.warned_uniforms.insert(name.to_string()) {
                    log::warn!(
                        "program '{}': uniform '{}' is {:?}, got {:?}",
                        self.label,
                        name,
                        ty,
                        value.ty()
                    );
                }
            }
            None => {
                if self.warned_uniforms.insert(name.to_string()) {
                    log::warn!("program '{}': unknown uniform '{}'", self.label, name);
                }
            }
        }
    }

    /// Write a matrix uniform, optionally transposing it first.
    ///
    /// Matrices are stored column-major; callers holding row-major data
    /// pass `transpose = true` rather than converting at every site.
    pub fn set_uniform_mat4(&mut self, name: &str, transpose: bool, mat: Mat4) {
        let mat = if transpose { mat.transpose() } else { mat };
        self.set_uniform(name, mat);
    }

    /// Bind a texture to a slot declared at link time.
    pub fn bind_texture(&mut self, name: &str, view: &wgpu::TextureView) {
        let Some(linked) = self.linked.as_mut() else {
            log::warn!("program '{}': bind_texture('{}') before link", self.label, name);
            return;
        };
        match linked.texture_slots.iter().position(|s| s.name == name) {
            Some(i) => linked.bound_textures[i] = Some(view.clone()),
            None => {
                if self.warned_uniforms.insert(name.to_string()) {
                    log::warn!("program '{}': unknown texture slot '{}'", self.label, name);
                }
            }
        }
    }

    /// Flush dirty uniforms, build this draw's bind group, and set the
    /// pipeline on the pass.
    ///
    /// Programs rebind everything each use; nothing relies on state left on
    /// the pass by a previous program.
    pub fn bind(&mut self, gpu: &GpuContext, pass: &mut wgpu::RenderPass) -> Result<()> {
        let linked = self.linked.as_mut().ok_or_else(|| Error::ShaderLink {
            label: self.label.clone(),
            diagnostics: "bind before link".into(),
        })?;

        if linked.dirty {
            // A fresh buffer per flush, not write_buffer: queued writes land
            // before submission, so rewriting one shared buffer would make
            // every draw in the encoder see the last values set.
            use wgpu::util::DeviceExt;
            linked.uniform_buffer =
                gpu.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} Uniforms", self.label)),
                        contents: &linked.staging,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    });
            linked.dirty = false;
        }

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: linked.uniform_buffer.as_entire_binding(),
        }];
        for (i, (slot, view)) in linked
            .texture_slots
            .iter()
            .zip(&linked.bound_textures)
            .enumerate()
        {
            let view = view.as_ref().ok_or_else(|| Error::TextureUnbound {
                label: self.label.clone(),
                slot: slot.name.clone(),
            })?;
            entries.push(wgpu::BindGroupEntry {
                binding: 1 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let sampler_base = 1 + linked.texture_slots.len() as u32;
        entries.push(wgpu::BindGroupEntry {
            binding: sampler_base,
            resource: wgpu::BindingResource::Sampler(&linked.linear_sampler),
        });
        if let Some(nearest) = &linked.nearest_sampler {
            entries.push(wgpu::BindGroupEntry {
                binding: sampler_base + 1,
                resource: wgpu::BindingResource::Sampler(nearest),
            });
        }

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Bind Group", self.label)),
            layout: &linked.bind_group_layout,
            entries: &entries,
        });

        pass.set_pipeline(&linked.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        Ok(())
    }

    pub fn is_linked(&self) -> bool {
        self.linked.is_some()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Convenience: attach both stages from one WGSL source and link.
pub fn build_program(
    gpu: &GpuContext,
    label: &str,
    source: &str,
    desc: &PipelineDesc,
) -> Result<ShaderProgram> {
    let mut program = ShaderProgram::new(label);
    program.attach(gpu, source, ShaderStage::Vertex)?;
    program.attach(gpu, source, ShaderStage::Fragment)?;
    program.link(gpu, desc)?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layout_follows_wgsl_rules() {
        let layout = UniformLayout::new()
            .with("view_proj", UniformType::Mat4)
            .with("camera_pos", UniformType::Vec3)
            .with("time", UniformType::F32)
            .with("resolution", UniformType::Vec2);

        assert_eq!(layout.field("view_proj"), Some((0, UniformType::Mat4)));
        // vec3 aligns to 16 right after the mat4.
        assert_eq!(layout.field("camera_pos"), Some((64, UniformType::Vec3)));
        // f32 packs into the vec3's tail padding.
        assert_eq!(layout.field("time"), Some((76, UniformType::F32)));
        assert_eq!(layout.field("resolution"), Some((80, UniformType::Vec2)));
        // Struct size rounds up to 16.
        assert_eq!(layout.size(), 96);
    }

    #[test]
    fn vec3_after_f32_skips_to_next_16() {
        let layout = UniformLayout::new()
            .with("a", UniformType::F32)
            .with("b", UniformType::Vec3);

        assert_eq!(layout.field("a"), Some((0, UniformType::F32)));
        assert_eq!(layout.field("b"), Some((16, UniformType::Vec3)));
        assert_eq!(layout.size(), 32);
    }

    #[test]
    fn unknown_field_is_none() {
        let layout = UniformLayout::new().with("x", UniformType::F32);
        assert_eq!(layout.field("y"), None);
    }

    #[test]
    fn uniform_values_match_declared_sizes() {
        let cases: Vec<UniformValue> = vec![
            1.0f32.into(),
            Vec2::ONE.into(),
            Vec3::ONE.into(),
            Vec4::ONE.into(),
            Mat4::IDENTITY.into(),
        ];
        for value in cases {
            let ty = value.ty();
            let mut buf = vec![0u8; ty.size()];
            value.write_into(&mut buf);
        }
    }

    #[test]
    fn transposed_mat4_writes_rows_as_columns() {
        let m = Mat4::from_cols_array(&[
            0.0, 1.0, 2.0, 3.0, //
            4.0, 5.0, 6.0, 7.0, //
            8.0, 9.0, 10.0, 11.0, //
            12.0, 13.0, 14.0, 15.0,
        ]);

        let mut plain = [0u8; 64];
        UniformValue::from(m).write_into(&mut plain);
        let mut flipped = [0u8; 64];
        UniformValue::from(m.transpose()).write_into(&mut flipped);

        let plain: &[f32] = bytemuck::cast_slice(&plain[..]);
        let flipped: &[f32] = bytemuck::cast_slice(&flipped[..]);
        // First column of the transposed write is the first row of m.
        assert_eq!(&flipped[0..4], &[0.0, 4.0, 8.0, 12.0]);
        assert_eq!(&plain[0..4], &[0.0, 1.0, 2.0, 3.0]);

        // The method itself is safe to call before link; the write is
        // dropped with a warning, not a panic.
        let mut program = ShaderProgram::new("test");
        program.set_uniform_mat4("model", true, m);
        assert!(!program.is_linked());
    }

    #[test]
    fn empty_layout_still_has_a_legal_buffer_size() {
        let layout = UniformLayout::new();
        assert_eq!(layout.size(), 16);
    }
}
