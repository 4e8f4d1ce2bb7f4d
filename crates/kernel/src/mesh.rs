//! Flat triangle mesh produced by the surface mesher.

use serde::{Deserialize, Serialize};

/// Triangle soup: every three consecutive indices form one triangle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Vertex positions (world units).
    pub vertices: Vec<[f32; 3]>,
    /// Triangle vertex indices.
    pub indices: Vec<u32>,
    /// Per-vertex unit normals; empty until computed.
    pub normals: Vec<[f32; 3]>,
}

impl Mesh {
    /// Empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// `true` when the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Append one triangle as three fresh vertices.
    pub fn push_triangle(&mut self, a: [f32; 3], b: [f32; 3], c: [f32; 3]) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&[a, b, c]);
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }

    /// Recompute per-vertex normals as the normalized sum of adjacent
    /// (area-weighted) face normals.
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![[0.0f32; 3]; self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let n = face_normal(self.vertices[a], self.vertices[b], self.vertices[c]);
            for &v in &[a, b, c] {
                for axis in 0..3 {
                    normals[v][axis] += n[axis];
                }
            }
        }
        for n in &mut normals {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            if len > 0.0 {
                for c in n.iter_mut() {
                    *c /= len;
                }
            }
        }
        self.normals = normals;
    }

    /// Copy with reversed winding and negated normals.
    pub fn inverted(&self) -> Mesh {
        let mut indices = self.indices.clone();
        indices.reverse();
        Mesh {
            vertices: self.vertices.clone(),
            indices,
            normals: self.normals.iter().map(|n| [-n[0], -n[1], -n[2]]).collect(),
        }
    }

    /// Append `other`, offsetting its indices past this mesh's vertices.
    pub fn append(&mut self, other: &Mesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
        self.normals.extend_from_slice(&other.normals);
    }

    /// Inverted copy followed by the original, so both faces render.
    pub fn double_sided(&self) -> Mesh {
        let mut out = self.inverted();
        out.append(self);
        out
    }
}

fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Mesh {
        let mut m = Mesh::new();
        m.push_triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        m.recalculate_normals();
        m
    }

    #[test]
    fn counter_clockwise_triangle_faces_plus_z() {
        let m = unit_triangle();
        assert_eq!(m.triangle_count(), 1);
        for n in &m.normals {
            assert_eq!(*n, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn inverted_reverses_winding_and_normals() {
        let m = unit_triangle();
        let inv = m.inverted();
        assert_eq!(inv.indices, vec![2, 1, 0]);
        assert!(inv.normals.iter().all(|n| *n == [0.0, 0.0, -1.0]));

        let mut recomputed = inv.clone();
        recomputed.recalculate_normals();
        assert_eq!(recomputed.normals, inv.normals);
    }

    #[test]
    fn double_sided_puts_back_faces_first() {
        let m = unit_triangle();
        let both = m.double_sided();
        assert_eq!(both.triangle_count(), 2);
        assert_eq!(both.vertices.len(), 6);
        assert_eq!(both.indices, vec![2, 1, 0, 3, 4, 5]);
        assert_eq!(both.normals[0], [0.0, 0.0, -1.0]);
        assert_eq!(both.normals[3], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn degenerate_triangle_keeps_zero_normal() {
        let mut m = Mesh::new();
        m.push_triangle([1.0; 3], [1.0; 3], [1.0; 3]);
        m.recalculate_normals();
        assert!(m.normals.iter().all(|n| *n == [0.0; 3]));
    }
}
