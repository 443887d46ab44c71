//! OBJ parsing into single-indexed, triangulated vertex streams.

use std::f32::consts::{PI, TAU};
use std::io::Cursor;

use glam::Vec3;

use crate::error::{RenderError, RenderResult};

/// Largest vertex count addressable with 16-bit indices.
pub const MAX_VERTICES: usize = u16::MAX as usize + 1;

/// Renderable mesh: parallel position/uv/normal streams plus u16 triangle indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjMesh {
    pub positions: Vec<f32>,
    pub tex_coords: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u16>,
}

/// Byte offsets of each stream inside the packed vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PackedLayout {
    pub positions: u64,
    pub tex_coords: u64,
    pub normals: u64,
    pub total: u64,
}

impl ObjMesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Positions, then UVs, then normals, back to back in one byte buffer.
    pub fn pack_vertices(&self) -> (Vec<u8>, PackedLayout) {
        let positions = 0u64;
        let tex_coords = positions + 4 * self.positions.len() as u64;
        let normals = tex_coords + 4 * self.tex_coords.len() as u64;
        let total = normals + 4 * self.normals.len() as u64;

        let mut bytes = Vec::with_capacity(total as usize);
        bytes.extend_from_slice(bytemuck::cast_slice(&self.positions));
        bytes.extend_from_slice(bytemuck::cast_slice(&self.tex_coords));
        bytes.extend_from_slice(bytemuck::cast_slice(&self.normals));

        (
            bytes,
            PackedLayout {
                positions,
                tex_coords,
                normals,
                total,
            },
        )
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Unit sphere with `rings` latitude bands and `segments` longitude
    /// slices, counter-clockwise seen from outside. Both counts are clamped
    /// to `3..=128`.
    pub fn uv_sphere(rings: u16, segments: u16) -> Self {
        let rings = rings.clamp(3, 128);
        let segments = segments.clamp(3, 128);
        let mut mesh = Self::default();

        for r in 0..=rings {
            let v = f32::from(r) / f32::from(rings);
            let (sin_theta, cos_theta) = (v * PI).sin_cos();
            for s in 0..=segments {
                let u = f32::from(s) / f32::from(segments);
                let (sin_phi, cos_phi) = (u * TAU).sin_cos();
                let n = Vec3::new(sin_theta * cos_phi, cos_theta, -sin_theta * sin_phi);
                mesh.positions.extend_from_slice(&n.to_array());
                mesh.normals.extend_from_slice(&n.to_array());
                mesh.tex_coords.extend_from_slice(&[u, 1.0 - v]);
            }
        }

        let stride = segments + 1;
        for r in 0..rings {
            for s in 0..segments {
                let i = r * stride + s;
                mesh.indices
                    .extend_from_slice(&[i, i + stride, i + 1, i + 1, i + stride, i + stride + 1]);
            }
        }
        mesh
    }
}

/// Parses OBJ text. Faces are triangulated and every vertex gets a single
/// index shared by its position, UV and normal. All objects in the file are
/// merged. Missing UVs become `(0, 0)`; missing normals are averaged from the
/// adjacent faces.
pub fn parse_obj(name: &str, bytes: &[u8]) -> RenderResult<ObjMesh> {
    let mesh_err = |reason: String| RenderError::MeshFormat {
        name: name.to_string(),
        reason,
    };

    let options = tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ignore_points: true,
        ignore_lines: true,
    };
    let (models, _materials) = tobj::load_obj_buf(&mut Cursor::new(bytes), &options, |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })
    .map_err(|e| mesh_err(e.to_string()))?;

    let mut mesh = ObjMesh::default();
    for model in &models {
        let m = &model.mesh;
        let base = mesh.vertex_count();
        let count = m.positions.len() / 3;

        if base + count > MAX_VERTICES {
            return Err(mesh_err(format!(
                "{} vertices exceed the 16-bit index limit of {MAX_VERTICES}",
                base + count
            )));
        }

        mesh.positions.extend_from_slice(&m.positions);

        if m.texcoords.len() == count * 2 {
            mesh.tex_coords.extend_from_slice(&m.texcoords);
        } else {
            mesh.tex_coords.resize(mesh.tex_coords.len() + count * 2, 0.0);
        }

        if m.normals.len() == count * 3 {
            mesh.normals.extend_from_slice(&m.normals);
        } else {
            mesh.normals.extend(face_normals(&m.positions, &m.indices));
        }

        for &i in &m.indices {
            let index = base + i as usize;
            if index >= base + count {
                return Err(mesh_err(format!("index {i} out of range in `{}`", model.name)));
            }
            mesh.indices.push(index as u16);
        }
    }

    if mesh.indices.is_empty() {
        return Err(mesh_err("no triangles".to_string()));
    }

    log::debug!(
        "parsed mesh `{name}`: {} vertices, {} triangles",
        mesh.vertex_count(),
        mesh.indices.len() / 3
    );
    Ok(mesh)
}

/// Per-vertex normals averaged from area-weighted face normals.
fn face_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex = |i: u32| {
        let i = i as usize * 3;
        Vec3::new(positions[i], positions[i + 1], positions[i + 2])
    };

    let mut acc = vec![Vec3::ZERO; positions.len() / 3];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2]));
        let n = (b - a).cross(c - a);
        for &i in tri {
            acc[i as usize] += n;
        }
    }

    acc.into_iter()
        .flat_map(|n| n.normalize_or_zero().to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn quad_is_triangulated_and_single_indexed() {
        let mesh = parse_obj("quad.obj", QUAD.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.tex_coords.len(), 8);
        assert_eq!(mesh.normals.len(), 12);
        assert!(mesh.normals.chunks_exact(3).all(|n| n == [0.0, 0.0, 1.0]));
    }

    #[test]
    fn uv_sphere_is_unit_and_closed() {
        let mesh = ObjMesh::uv_sphere(4, 6);
        assert_eq!(mesh.vertex_count(), 5 * 7);
        assert_eq!(mesh.indices.len(), 4 * 6 * 6);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
        for p in mesh.positions.chunks_exact(3) {
            assert!((Vec3::from_slice(p).length() - 1.0).abs() < 1e-5);
        }
        assert_eq!(mesh.positions, mesh.normals);

        let clamped = ObjMesh::uv_sphere(1, 1000);
        assert_eq!(clamped.vertex_count(), 4 * 129);
    }

    #[test]
    fn missing_normals_are_generated() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj("tri.obj", obj.as_bytes()).unwrap();
        assert_eq!(&mesh.normals[..3], &[0.0, 0.0, 1.0]);
        assert_eq!(mesh.tex_coords, vec![0.0; 6]);
    }

    #[test]
    fn packed_layout_offsets_are_disjoint() {
        let mesh = parse_obj("quad.obj", QUAD.as_bytes()).unwrap();
        let (bytes, layout) = mesh.pack_vertices();
        assert_eq!(layout.positions, 0);
        assert_eq!(layout.tex_coords, 4 * 12);
        assert_eq!(layout.normals, 4 * 12 + 4 * 8);
        assert_eq!(layout.total as usize, bytes.len());
        assert_eq!(mesh.index_bytes().len(), 12);
    }

    #[test]
    fn too_many_vertices_are_rejected() {
        let mut obj = String::new();
        let tris = MAX_VERTICES / 3 + 1;
        for t in 0..tris {
            obj.push_str("v 0 0 0\nv 1 0 0\nv 0 1 0\n");
            let b = t * 3 + 1;
            obj.push_str(&format!("f {} {} {}\n", b, b + 1, b + 2));
        }
        let err = parse_obj("big.obj", obj.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), "mesh-format");
    }

    #[test]
    fn empty_obj_is_rejected() {
        assert!(parse_obj("empty.obj", b"# nothing\n").is_err());
    }
}
