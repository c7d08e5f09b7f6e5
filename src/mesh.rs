use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Number of floats per vertex: `position.xyz`, `normal.xyz`, `color.rgb`.
pub const VERTEX_STRIDE: usize = 9;

/// CPU-side mesh buffers as consumed by the renderer.
///
/// Vertices are laid out as `position.xyz` followed by `normal.xyz` and a
/// per-vertex `color.rgb`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn push_vertex(&mut self, position: Vec3, normal: Vec3, color: Vec3) {
        self.vertices.extend_from_slice(&[
            position.x, position.y, position.z, normal.x, normal.y, normal.z, color.x, color.y,
            color.z,
        ]);
    }

    pub fn position(&self, index: usize) -> Vec3 {
        let base = index * VERTEX_STRIDE;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }

    pub fn normal(&self, index: usize) -> Vec3 {
        let base = index * VERTEX_STRIDE + 3;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }

    pub fn color(&self, index: usize) -> Vec3 {
        let base = index * VERTEX_STRIDE + 6;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }
}

/// Generates a UV sphere with the given radius and segment counts.
///
/// Matches the layout of the rendering library the original scene was built
/// with: `height_segments + 1` latitude rows from pole to pole, each with
/// `width_segments + 1` columns (the seam column is duplicated so texture
/// coordinates could wrap). Normals point outward; vertices are white.
pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);

    let mut mesh = MeshData::default();
    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let phi = v * std::f32::consts::PI;
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let theta = u * std::f32::consts::TAU;
            let normal = Vec3::new(
                -phi.sin() * theta.cos(),
                phi.cos(),
                phi.sin() * theta.sin(),
            )
            .normalize();
            mesh.push_vertex(normal * radius, normal, Vec3::ONE);
        }
    }

    let columns = width_segments + 1;
    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = iy * columns + ix;
            let b = (iy + 1) * columns + ix;
            let c = (iy + 1) * columns + ix + 1;
            let d = iy * columns + ix + 1;
            // Skip the degenerate triangles collapsing into each pole.
            if iy != 0 {
                mesh.indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    mesh
}

/// Returns true when any vertex carries a zero normal.
pub fn needs_normals(mesh: &MeshData) -> bool {
    mesh.vertices
        .chunks_exact(VERTEX_STRIDE)
        .any(|chunk| chunk[3] == 0.0 && chunk[4] == 0.0 && chunk[5] == 0.0)
}

/// Rebuilds vertex normals by accumulating area-weighted face normals.
pub fn compute_normals(mesh: &mut MeshData) {
    let vertex_count = mesh.vertex_count();
    let mut accum = vec![Vec3::ZERO; vertex_count];

    for triangle in mesh.indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;
        let p0 = mesh.position(i0);
        let p1 = mesh.position(i1);
        let p2 = mesh.position(i2);
        let normal = (p1 - p0).cross(p2 - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (i, normal) in accum.into_iter().enumerate() {
        let normal = normal.normalize_or_zero();
        let base = i * VERTEX_STRIDE + 3;
        mesh.vertices[base] = normal.x;
        mesh.vertices[base + 1] = normal.y;
        mesh.vertices[base + 2] = normal.z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let mesh = uv_sphere(0.2, 24, 24);
        assert!(mesh.vertex_count() > 0);
        for i in 0..mesh.vertex_count() {
            let distance = mesh.position(i).length();
            assert!((distance - 0.2).abs() < 1e-4, "vertex {i} at {distance}");
        }
    }

    #[test]
    fn sphere_normals_are_unit_length() {
        let mesh = uv_sphere(1.0, 8, 6);
        for i in 0..mesh.vertex_count() {
            assert!((mesh.normal(i).length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn sphere_indices_are_in_range() {
        let mesh = uv_sphere(1.0, 8, 6);
        let count = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
        assert_eq!(mesh.indices.len() % 3, 0);
    }

    #[test]
    fn computes_missing_normals() {
        let mut mesh = MeshData::default();
        mesh.push_vertex(Vec3::ZERO, Vec3::ZERO, Vec3::ONE);
        mesh.push_vertex(Vec3::X, Vec3::ZERO, Vec3::ONE);
        mesh.push_vertex(Vec3::Y, Vec3::ZERO, Vec3::ONE);
        mesh.indices = vec![0, 1, 2];
        assert!(needs_normals(&mesh));
        compute_normals(&mut mesh);
        assert!(!needs_normals(&mesh));
        for i in 0..3 {
            let normal = mesh.normal(i);
            assert!((normal.length() - 1.0).abs() < 1e-5);
            assert!((normal.z.abs() - 1.0).abs() < 1e-5);
        }
    }
}
