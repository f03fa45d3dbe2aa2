//! Offscreen render targets and cubemap environment capture.
//!
//! Targets are validated for completeness when they are built, not when they
//! are drawn to: wgpu would panic on a malformed pass, so every reason the
//! GL status query could report (missing attachment, dimension mismatch,
//! non-renderable texture, sample count mismatch) is checked here and
//! returned as [`Error::FramebufferIncomplete`] while the caller can still
//! do something about it.

use glam::Vec3;

use crate::camera::{Camera, Projection};
use crate::error::{Error, FramebufferIssue, Result};
use crate::gpu::GpuContext;
use crate::texture::{MipmapGenerator, full_mip_chain};

/// One color attachment request.
#[derive(Clone, Debug)]
pub struct AttachmentDesc {
    pub name: String,
    pub format: wgpu::TextureFormat,
}

impl AttachmentDesc {
    pub fn new(name: impl Into<String>, format: wgpu::TextureFormat) -> Self {
        Self {
            name: name.into(),
            format,
        }
    }
}

/// Describes an offscreen target, sized independently of the surface.
#[derive(Clone, Debug)]
pub struct RenderTargetDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub color: Vec<AttachmentDesc>,
    pub depth: Option<wgpu::TextureFormat>,
}

impl RenderTargetDesc {
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            color: Vec::new(),
            depth: None,
        }
    }

    pub fn color(mut self, name: impl Into<String>, format: wgpu::TextureFormat) -> Self {
        self.color.push(AttachmentDesc::new(name, format));
        self
    }

    pub fn depth(mut self, format: wgpu::TextureFormat) -> Self {
        self.depth = Some(format);
        self
    }
}

/// An allocated attachment.
pub struct Attachment {
    pub name: String,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

struct AttachmentInfo {
    name: String,
    width: u32,
    height: u32,
    renderable: bool,
    sample_count: u32,
}

fn validate_attachments(label: &str, entries: &[AttachmentInfo]) -> Result<()> {
    let issue = check_attachment_set(entries);
    match issue {
        Some(issue) => Err(Error::FramebufferIncomplete {
            label: label.to_string(),
            issue,
        }),
        None => Ok(()),
    }
}

fn check_attachment_set(entries: &[AttachmentInfo]) -> Option<FramebufferIssue> {
    let Some(first) = entries.first() else {
        return Some(FramebufferIssue::MissingAttachment);
    };
    for entry in entries {
        if !entry.renderable {
            return Some(FramebufferIssue::NotRenderable {
                attachment: entry.name.clone(),
            });
        }
        if (entry.width, entry.height) != (first.width, first.height) {
            return Some(FramebufferIssue::DimensionMismatch {
                attachment: entry.name.clone(),
                expected: (first.width, first.height),
                found: (entry.width, entry.height),
            });
        }
        if entry.sample_count != first.sample_count {
            return Some(FramebufferIssue::SampleCountMismatch {
                attachment: entry.name.clone(),
                expected: first.sample_count,
                found: entry.sample_count,
            });
        }
    }
    None
}

/// An offscreen framebuffer: N color attachments plus optional depth.
pub struct RenderTarget {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub color: Vec<Attachment>,
    pub depth: Option<Attachment>,
}

fn make_attachment(
    gpu: &GpuContext,
    label: &str,
    name: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> Attachment {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&format!("{} '{}'", label, name)),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Attachment {
        name: name.to_string(),
        texture,
        view,
        format,
    }
}

impl RenderTarget {
    /// Allocate attachments per the descriptor.
    pub fn new(gpu: &GpuContext, desc: &RenderTargetDesc) -> Result<Self> {
        if desc.color.is_empty() && desc.depth.is_none() {
            return Err(Error::FramebufferIncomplete {
                label: desc.label.clone(),
                issue: FramebufferIssue::MissingAttachment,
            });
        }

        let color = desc
            .color
            .iter()
            .map(|a| make_attachment(gpu, &desc.label, &a.name, desc.width, desc.height, a.format))
            .collect();
        let depth = desc
            .depth
            .map(|format| make_attachment(gpu, &desc.label, "depth", desc.width, desc.height, format));

        Ok(Self {
            label: desc.label.clone(),
            width: desc.width,
            height: desc.height,
            color,
            depth,
        })
    }

    /// Wrap externally created textures, validating completeness now.
    pub fn from_attachments(
        label: impl Into<String>,
        color: Vec<(String, wgpu::Texture)>,
        depth: Option<wgpu::Texture>,
    ) -> Result<Self> {
        let label = label.into();

        let mut infos: Vec<AttachmentInfo> = color
            .iter()
            .map(|(name, texture)| AttachmentInfo {
                name: name.clone(),
                width: texture.width(),
                height: texture.height(),
                renderable: texture.usage().contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
                sample_count: texture.sample_count(),
            })
            .collect();
        if let Some(texture) = &depth {
            infos.push(AttachmentInfo {
                name: "depth".into(),
                width: texture.width(),
                height: texture.height(),
                renderable: texture.usage().contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
                sample_count: texture.sample_count(),
            });
        }
        validate_attachments(&label, &infos)?;

        let (width, height) = (infos[0].width, infos[0].height);
        let color = color
            .into_iter()
            .map(|(name, texture)| {
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                let format = texture.format();
                Attachment {
                    name,
                    texture,
                    view,
                    format,
                }
            })
            .collect();
        let depth = depth.map(|texture| {
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let format = texture.format();
            Attachment {
                name: "depth".into(),
                texture,
                view,
                format,
            }
        });

        Ok(Self {
            label,
            width,
            height,
            color,
            depth,
        })
    }

    /// Reallocate when the requested size differs (surface-tracking targets).
    pub fn ensure_size(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        if (self.width, self.height) == (width, height) || width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        for attachment in &mut self.color {
            *attachment = make_attachment(gpu, &self.label, &attachment.name, width, height, attachment.format);
        }
        if let Some(attachment) = &mut self.depth {
            *attachment = make_attachment(gpu, &self.label, "depth", width, height, attachment.format);
        }
    }

    pub fn color_view(&self, index: usize) -> Option<&wgpu::TextureView> {
        self.color.get(index).map(|a| &a.view)
    }

    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.depth.as_ref().map(|a| &a.view)
    }

    /// Begin a pass clearing every color attachment to its own value.
    ///
    /// `clears` pairs with the attachments in declaration order; an
    /// attachment without a clear value is cleared transparent and logged,
    /// since silent defaults are how mismatched MRT clears go unnoticed.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        clears: &[wgpu::Color],
        depth_clear: Option<f32>,
    ) -> wgpu::RenderPass<'e> {
        if clears.len() != self.color.len() {
            log::warn!(
                "target '{}': {} clear values for {} color attachments",
                self.label,
                clears.len(),
                self.color.len()
            );
        }

        let attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = self
            .color
            .iter()
            .enumerate()
            .map(|(i, attachment)| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &attachment.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(
                            clears.get(i).copied().unwrap_or(wgpu::Color::TRANSPARENT),
                        ),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&self.label),
            color_attachments: &attachments,
            depth_stencil_attachment: self.depth.as_ref().map(|attachment| {
                wgpu::RenderPassDepthStencilAttachment {
                    view: &attachment.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(depth_clear.unwrap_or(1.0)),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }
}

/// Per-face capture orientations in array-layer order:
/// +X, -X, +Y, -Y, +Z, -Z.
const FACE_ORIENTATIONS: [(Vec3, Vec3); 6] = [
    (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, -1.0, 0.0)),
    (Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.0, -1.0, 0.0)),
    (Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
    (Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 0.0, -1.0)),
    (Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, -1.0, 0.0)),
    (Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, -1.0, 0.0)),
];

/// A cubemap render target for environment capture.
///
/// Render the scene six times per frame (once per face through
/// [`face_camera`](Self::face_camera)), then call
/// [`regenerate_mips`](Self::regenerate_mips) once so rough reflections
/// sample a fresh chain.
pub struct CubemapCapture {
    pub color: wgpu::Texture,
    /// Cube view over all faces, for sampling.
    pub cube_view: wgpu::TextureView,
    #[allow(dead_code)]
    depth: wgpu::Texture,
    depth_views: Vec<wgpu::TextureView>,
    face_views: Vec<wgpu::TextureView>,
    pub size: u32,
    pub format: wgpu::TextureFormat,
    pub mip_level_count: u32,
}

impl CubemapCapture {
    pub fn new(gpu: &GpuContext, size: u32, format: wgpu::TextureFormat) -> Result<Self> {
        if size == 0 {
            return Err(Error::FramebufferIncomplete {
                label: "cubemap capture".into(),
                issue: FramebufferIssue::NonSquareCubeFace {
                    width: size,
                    height: size,
                },
            });
        }

        let mip_level_count = full_mip_chain(size, size);
        let color = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Cubemap Capture Color"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Cubemap Capture Depth"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let face_views = (0..6)
            .map(|layer| {
                color.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Cubemap Face"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_mip_level: 0,
                    mip_level_count: Some(1),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        let depth_views = (0..6)
            .map(|layer| {
                depth.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Cubemap Face Depth"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let cube_view = color.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Cubemap Capture View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        Ok(Self {
            color,
            cube_view,
            depth,
            depth_views,
            face_views,
            size,
            format,
            mip_level_count,
        })
    }

    /// The camera that renders face `face` (array-layer order) from
    /// `position`: fixed direction/up, 90° fov, aspect 1.
    ///
    /// Panics if `face >= 6`; face indices are the caller's loop variable,
    /// not data.
    pub fn face_camera(face: usize, position: Vec3, near: f32, far: f32) -> Camera {
        let (direction, up) = FACE_ORIENTATIONS[face];
        let mut camera = Camera::new(position, direction, Projection::cube_face(near, far));
        camera.up = up;
        camera
    }

    /// Begin a pass targeting one face's mip 0.
    ///
    /// Panics if `face >= 6`.
    pub fn begin_face_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        face: usize,
        clear: wgpu::Color,
    ) -> wgpu::RenderPass<'e> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Cubemap Face Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.face_views[face],
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_views[face],
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    /// Rebuild the mip chain from the freshly rendered faces. Call once per
    /// frame, after all six face passes.
    pub fn regenerate_mips(
        &self,
        gpu: &GpuContext,
        mips: &mut MipmapGenerator,
        encoder: &mut wgpu::CommandEncoder,
    ) {
        for layer in 0..6 {
            mips.generate_layer(gpu, encoder, &self.color, self.format, layer, self.mip_level_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_orientations_cover_all_axes() {
        let dirs: Vec<Vec3> = FACE_ORIENTATIONS.iter().map(|(d, _)| *d).collect();
        for expected in [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ] {
            assert!(dirs.contains(&expected), "missing face direction {:?}", expected);
        }
    }

    #[test]
    fn face_orientations_are_orthonormal() {
        for (direction, up) in FACE_ORIENTATIONS {
            assert!((direction.length() - 1.0).abs() < 1e-6);
            assert!((up.length() - 1.0).abs() < 1e-6);
            assert!(direction.dot(up).abs() < 1e-6);
        }
    }

    #[test]
    fn face_camera_uses_square_90_degree_projection() {
        let camera = CubemapCapture::face_camera(2, Vec3::ZERO, 0.1, 50.0);
        match camera.projection {
            Projection::Perspective { fov_y, aspect, .. } => {
                assert!((fov_y - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
                assert!((aspect - 1.0).abs() < 1e-6);
            }
            _ => panic!("expected perspective projection"),
        }
        assert_eq!(camera.forward(), Vec3::Y);
    }

    #[test]
    #[should_panic]
    fn face_camera_rejects_out_of_range_faces() {
        let _ = CubemapCapture::face_camera(6, Vec3::ZERO, 0.1, 10.0);
    }

    #[test]
    fn empty_attachment_set_is_incomplete() {
        assert_eq!(
            check_attachment_set(&[]),
            Some(FramebufferIssue::MissingAttachment)
        );

        let mismatched = [
            AttachmentInfo {
                name: "color".into(),
                width: 512,
                height: 512,
                renderable: true,
                sample_count: 1,
            },
            AttachmentInfo {
                name: "normal".into(),
                width: 256,
                height: 512,
                renderable: true,
                sample_count: 1,
            },
        ];
        match check_attachment_set(&mismatched) {
            Some(FramebufferIssue::DimensionMismatch { attachment, .. }) => {
                assert_eq!(attachment, "normal");
            }
            other => panic!("expected DimensionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn non_renderable_attachment_is_flagged() {
        let entries = [AttachmentInfo {
            name: "color".into(),
            width: 64,
            height: 64,
            renderable: false,
            sample_count: 1,
        }];
        match check_attachment_set(&entries) {
            Some(FramebufferIssue::NotRenderable { attachment }) => {
                assert_eq!(attachment, "color");
            }
            other => panic!("expected NotRenderable, got {:?}", other),
        }
    }

    #[test]
    fn sample_count_mismatch_is_flagged() {
        let entries = [
            AttachmentInfo {
                name: "color".into(),
                width: 64,
                height: 64,
                renderable: true,
                sample_count: 1,
            },
            AttachmentInfo {
                name: "msaa".into(),
                width: 64,
                height: 64,
                renderable: true,
                sample_count: 4,
            },
        ];
        match check_attachment_set(&entries) {
            Some(FramebufferIssue::SampleCountMismatch { attachment, .. }) => {
                assert_eq!(attachment, "msaa");
            }
            other => panic!("expected SampleCountMismatch, got {:?}", other),
        }
    }
}
