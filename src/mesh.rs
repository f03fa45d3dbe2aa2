//! Multi-stream meshes.
//!
//! A [`Mesh`] owns one GPU buffer per named attribute stream (positions,
//! normals, texcoords live in separate buffers rather than interleaved) and
//! an optional `u32` index buffer. Stream order must match the order the
//! owning program declared in its [`PipelineDesc`](crate::PipelineDesc);
//! buffers are bound by that position at draw time.

use crate::error::{Error, Result};
use crate::gpu::GpuContext;

/// One named vertex attribute stream.
#[derive(Clone, Debug)]
pub struct StreamLayout {
    pub name: String,
    pub shader_location: u32,
    pub format: wgpu::VertexFormat,
}

impl StreamLayout {
    pub fn new(name: impl Into<String>, shader_location: u32, format: wgpu::VertexFormat) -> Self {
        Self {
            name: name.into(),
            shader_location,
            format,
        }
    }

    /// `vec3` stream, the common case.
    pub fn vec3(name: impl Into<String>, shader_location: u32) -> Self {
        Self::new(name, shader_location, wgpu::VertexFormat::Float32x3)
    }

    /// `vec2` stream.
    pub fn vec2(name: impl Into<String>, shader_location: u32) -> Self {
        Self::new(name, shader_location, wgpu::VertexFormat::Float32x2)
    }
}

/// How often a stream's contents are expected to change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsageHint {
    /// Uploaded once, drawn many times.
    Static,
    /// Rewritten frequently.
    Dynamic,
}

struct Stream {
    layout: StreamLayout,
    buffer: Option<wgpu::Buffer>,
    byte_len: u64,
}

/// A drawable set of vertex streams plus an optional index buffer.
pub struct Mesh {
    label: String,
    streams: Vec<Stream>,
    index_buffer: Option<wgpu::Buffer>,
    index_count: u32,
}

impl Mesh {
    /// Declare a mesh with the given streams. No GPU memory is allocated
    /// until data arrives.
    pub fn new(label: impl Into<String>, layouts: &[StreamLayout]) -> Self {
        Self {
            label: label.into(),
            streams: layouts
                .iter()
                .map(|layout| Stream {
                    layout: layout.clone(),
                    buffer: None,
                    byte_len: 0,
                })
                .collect(),
            index_buffer: None,
            index_count: 0,
        }
    }

    /// Upload vertex data into a named stream.
    ///
    /// Re-uses the existing buffer when the byte length matches; otherwise
    /// the buffer is reallocated. `Static` data that keeps reallocating is
    /// worth a look, so that case logs at debug level.
    pub fn set_buffer_data(
        &mut self,
        gpu: &GpuContext,
        name: &str,
        bytes: &[u8],
        hint: UsageHint,
    ) -> Result<()> {
        let label = self.label.clone();
        let stream = self
            .streams
            .iter_mut()
            .find(|s| s.layout.name == name)
            .ok_or_else(|| Error::MeshNotReady {
                label: label.clone(),
                reason: format!("no stream named '{}'", name),
            })?;

        match &stream.buffer {
            Some(buffer) if stream.byte_len == bytes.len() as u64 => {
                gpu.queue.write_buffer(buffer, 0, bytes);
            }
            _ => {
                if stream.buffer.is_some() && hint == UsageHint::Static {
                    log::debug!("mesh '{}': reallocating static stream '{}'", label, name);
                }
                use wgpu::util::DeviceExt;
                let buffer = gpu
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} '{}' stream", label, name)),
                        contents: bytes,
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    });
                stream.buffer = Some(buffer);
                stream.byte_len = bytes.len() as u64;
            }
        }
        Ok(())
    }

    /// Upload index data, switching the mesh to indexed drawing.
    pub fn set_index_data(&mut self, gpu: &GpuContext, indices: &[u32], hint: UsageHint) {
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        match &self.index_buffer {
            Some(buffer) if self.index_count as usize == indices.len() => {
                gpu.queue.write_buffer(buffer, 0, bytes);
            }
            _ => {
                if self.index_buffer.is_some() && hint == UsageHint::Static {
                    log::debug!("mesh '{}': reallocating static index buffer", self.label);
                }
                use wgpu::util::DeviceExt;
                let buffer = gpu
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} indices", self.label)),
                        contents: bytes,
                        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                    });
                self.index_buffer = Some(buffer);
            }
        }
        self.index_count = indices.len() as u32;
    }

    /// Vertex count derived from the first stream's byte length.
    pub fn vertex_count(&self) -> u32 {
        match self.streams.first() {
            Some(stream) => (stream.byte_len / stream.layout.format.size()) as u32,
            None => 0,
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Bind every stream and issue the draw.
    ///
    /// Uses `draw_indexed` iff index data was set, otherwise a plain draw
    /// with the derived vertex count. The active pipeline must have been
    /// linked against the same stream list.
    pub fn draw(&self, pass: &mut wgpu::RenderPass) -> Result<()> {
        for (i, stream) in self.streams.iter().enumerate() {
            let buffer = stream.buffer.as_ref().ok_or_else(|| Error::MeshNotReady {
                label: self.label.clone(),
                reason: format!("stream '{}' has no data", stream.layout.name),
            })?;
            pass.set_vertex_buffer(i as u32, buffer.slice(..));
        }

        match &self.index_buffer {
            Some(indices) => {
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..self.index_count, 0, 0..1);
            }
            None => {
                let count = self.vertex_count();
                if count == 0 {
                    return Err(Error::MeshNotReady {
                        label: self.label.clone(),
                        reason: "no vertex data".into(),
                    });
                }
                pass.draw(0..count, 0..1);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_count_derives_from_first_stream() {
        let mut mesh = Mesh::new("test", &[StreamLayout::vec3("position", 0)]);
        assert_eq!(mesh.vertex_count(), 0);

        // 5 vertices * 12 bytes, faked without a device.
        mesh.streams[0].byte_len = 60;
        assert_eq!(mesh.vertex_count(), 5);
    }

    #[test]
    fn indexed_flag_tracks_index_data() {
        let mesh = Mesh::new("test", &[StreamLayout::vec3("position", 0)]);
        assert!(!mesh.is_indexed());
        assert_eq!(mesh.index_count(), 0);
    }

    #[test]
    fn stream_layout_helpers_pick_formats() {
        let p = StreamLayout::vec3("position", 0);
        assert_eq!(p.format, wgpu::VertexFormat::Float32x3);
        assert_eq!(p.format.size(), 12);

        let uv = StreamLayout::vec2("texcoord", 2);
        assert_eq!(uv.format, wgpu::VertexFormat::Float32x2);
        assert_eq!(uv.format.size(), 8);
    }
}
