//! CPU-side mesh data: procedural primitives and OBJ decoding.
//!
//! [`MeshData`] is the staging form of a mesh (flat position/normal/texcoord
//! streams plus indices). Generators and the OBJ decoder produce it; a scene
//! uploads it into a [`Mesh`] during `start`.

use glam::{Vec2, Vec3};

use crate::error::{Error, Result};
use crate::gpu::GpuContext;
use crate::mesh::{Mesh, StreamLayout, UsageHint};

/// The conventional stream set: position (location 0), normal (1),
/// texcoord (2).
pub fn standard_streams() -> Vec<StreamLayout> {
    vec![
        StreamLayout::vec3("position", 0),
        StreamLayout::vec3("normal", 1),
        StreamLayout::vec2("texcoord", 2),
    ]
}

/// CPU-side mesh streams awaiting upload.
#[derive(Default, Clone, Debug)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Upload into a new [`Mesh`] with the standard stream set.
    pub fn upload(&self, gpu: &GpuContext, label: &str) -> Result<Mesh> {
        let mut mesh = Mesh::new(label, &standard_streams());
        mesh.set_buffer_data(
            gpu,
            "position",
            bytemuck::cast_slice(&self.positions),
            UsageHint::Static,
        )?;
        mesh.set_buffer_data(
            gpu,
            "normal",
            bytemuck::cast_slice(&self.normals),
            UsageHint::Static,
        )?;
        mesh.set_buffer_data(
            gpu,
            "texcoord",
            bytemuck::cast_slice(&self.texcoords),
            UsageHint::Static,
        )?;
        mesh.set_index_data(gpu, &self.indices, UsageHint::Static);
        Ok(mesh)
    }
}

/// A unit cube centered at the origin, 24 vertices with per-face normals.
pub fn cube() -> MeshData {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        // (normal, tangent u, tangent v)
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut data = MeshData::default();
    for (normal, tu, tv) in faces {
        let n = Vec3::from(normal);
        let u = Vec3::from(tu);
        let v = Vec3::from(tv);
        let base = data.positions.len() as u32;

        for (su, sv, uv) in [
            (-0.5, -0.5, [0.0, 1.0]),
            (0.5, -0.5, [1.0, 1.0]),
            (0.5, 0.5, [1.0, 0.0]),
            (-0.5, 0.5, [0.0, 0.0]),
        ] {
            let p = n * 0.5 + u * su + v * sv;
            data.positions.push(p.to_array());
            data.normals.push(normal);
            data.texcoords.push(uv);
        }
        data.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    data
}

/// A UV sphere of radius 0.5.
pub fn sphere(segments: u32, rings: u32) -> MeshData {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut data = MeshData::default();

    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let phi = v * std::f32::consts::PI;
        for segment in 0..=segments {
            let u = segment as f32 / segments as f32;
            let theta = u * std::f32::consts::TAU;

            let dir = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            data.positions.push((dir * 0.5).to_array());
            data.normals.push(dir.to_array());
            data.texcoords.push([u, v]);
        }
    }

    let stride = segments + 1;
    for ring in 0..rings {
        for segment in 0..segments {
            let a = ring * stride + segment;
            let b = a + stride;
            data.indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    data
}

/// A flat rectangle on the XZ plane at y = 0, normal up.
pub fn plane(min: Vec2, max: Vec2) -> MeshData {
    let mut data = MeshData::default();
    for (x, z, uv) in [
        (min.x, min.y, [0.0, 0.0]),
        (max.x, min.y, [1.0, 0.0]),
        (max.x, max.y, [1.0, 1.0]),
        (min.x, max.y, [0.0, 1.0]),
    ] {
        data.positions.push([x, 0.0, z]);
        data.normals.push([0.0, 1.0, 0.0]);
        data.texcoords.push(uv);
    }
    data.indices.extend_from_slice(&[0, 2, 1, 0, 3, 2]);
    data
}

/// Decode an OBJ file already loaded as text.
///
/// Triangulates and produces unified index buffers; all models in the file
/// are concatenated. Materials are ignored.
pub fn from_obj_text(id: &str, text: &str) -> Result<MeshData> {
    let mut reader = std::io::BufReader::new(std::io::Cursor::new(text.as_bytes()));
    let (models, _materials) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        // Materials are ignored; feed the loader an empty MTL.
        |_| tobj::load_mtl_buf(&mut std::io::BufReader::new(std::io::Cursor::new(""))),
    )
    .map_err(|e| Error::asset(id, e))?;

    // tobj yields a (vertexless) model even for comment-only input, so the
    // guard has to look at the geometry itself.
    if models.iter().all(|m| m.mesh.positions.is_empty()) {
        return Err(Error::asset(id, "OBJ contains no geometry"));
    }

    let mut data = MeshData::default();
    for model in models {
        let mesh = model.mesh;
        let base = data.positions.len() as u32;
        let vertex_count = mesh.positions.len() / 3;

        for i in 0..vertex_count {
            data.positions.push([
                mesh.positions[i * 3],
                mesh.positions[i * 3 + 1],
                mesh.positions[i * 3 + 2],
            ]);
            data.normals.push(if mesh.normals.is_empty() {
                [0.0, 1.0, 0.0]
            } else {
                [
                    mesh.normals[i * 3],
                    mesh.normals[i * 3 + 1],
                    mesh.normals[i * 3 + 2],
                ]
            });
            data.texcoords.push(if mesh.texcoords.is_empty() {
                [0.0, 0.0]
            } else {
                [mesh.texcoords[i * 2], mesh.texcoords[i * 2 + 1]]
            });
        }
        data.indices.extend(mesh.indices.iter().map(|&i| base + i));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_24_vertices_and_12_triangles() {
        let data = cube();
        assert_eq!(data.positions.len(), 24);
        assert_eq!(data.normals.len(), 24);
        assert_eq!(data.texcoords.len(), 24);
        assert_eq!(data.indices.len(), 36);
        assert!(data.indices.iter().all(|&i| (i as usize) < 24));
    }

    #[test]
    fn sphere_indices_stay_in_bounds() {
        let data = sphere(16, 8);
        let n = data.positions.len() as u32;
        assert_eq!(data.positions.len(), data.normals.len());
        assert!(data.indices.iter().all(|&i| i < n));
        // Normals on a unit-direction sphere are unit length.
        for normal in &data.normals {
            let len = Vec3::from(*normal).length();
            assert!((len - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn plane_faces_up() {
        let data = plane(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0));
        assert_eq!(data.positions.len(), 4);
        assert_eq!(data.indices.len(), 6);
        assert!(data.normals.iter().all(|n| *n == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn obj_text_decodes_a_triangle() {
        let obj = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vn 0.0 0.0 1.0
f 1//1 2//1 3//1
";
        let data = from_obj_text("tri", obj).unwrap();
        assert_eq!(data.indices.len(), 3);
        assert_eq!(data.positions.len(), data.normals.len());
        assert_eq!(data.positions.len(), data.texcoords.len());
    }

    #[test]
    fn empty_obj_is_an_asset_error() {
        assert!(from_obj_text("empty", "# nothing here\n").is_err());
    }
}
