//! CPU-side triangle meshes and the builders the globe uses.

use foundation::math::{Curve3, Vec3};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns the index of the new vertex.
    pub fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position.to_f32_array());
        self.normals.push(normal.to_f32_array());
        index
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Appends `other`, rebasing its indices.
    pub fn append(&mut self, other: &Mesh) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Merges many meshes into one draw.
    pub fn merge<'a>(meshes: impl IntoIterator<Item = &'a Mesh>) -> Mesh {
        let mut out = Mesh::new();
        for mesh in meshes {
            out.append(mesh);
        }
        out
    }

    /// Latitude/longitude sphere centred on the origin.
    pub fn uv_sphere(radius: f64, lat_segments: u32, lon_segments: u32) -> Mesh {
        let lat_segments = lat_segments.max(3);
        let lon_segments = lon_segments.max(3);

        let mut mesh = Mesh::new();
        mesh.positions
            .reserve(((lat_segments + 1) * (lon_segments + 1)) as usize);
        for lat in 0..=lat_segments {
            let theta = lat as f64 / lat_segments as f64 * std::f64::consts::PI;
            let (sin_t, cos_t) = theta.sin_cos();

            for lon in 0..=lon_segments {
                let phi = lon as f64 / lon_segments as f64 * std::f64::consts::TAU;
                let (sin_p, cos_p) = phi.sin_cos();

                let n = Vec3::new(sin_t * cos_p, cos_t, sin_t * sin_p);
                mesh.push_vertex(n * radius, n);
            }
        }

        let stride = lon_segments + 1;
        mesh.indices
            .reserve((lat_segments * lon_segments * 6) as usize);
        for lat in 0..lat_segments {
            for lon in 0..lon_segments {
                let i0 = lat * stride + lon;
                let i1 = i0 + 1;
                let i2 = i0 + stride;
                let i3 = i2 + 1;
                mesh.push_triangle(i0, i2, i1);
                mesh.push_triangle(i1, i2, i3);
            }
        }
        mesh
    }

    /// Flat triangle-fan disk facing `normal`.
    pub fn disk(center: Vec3, normal: Vec3, radius: f64, segments: u32) -> Mesh {
        let mut mesh = Mesh::new();
        mesh.append_disk(center, normal, radius, segments);
        mesh
    }

    pub fn append_disk(&mut self, center: Vec3, normal: Vec3, radius: f64, segments: u32) {
        let segments = segments.max(3);
        let n = normal.try_normalize().unwrap_or(Vec3::Y);
        let u = n.any_perpendicular();
        let v = n.cross(u);

        let hub = self.push_vertex(center, n);
        for i in 0..segments {
            let a = i as f64 / segments as f64 * std::f64::consts::TAU;
            let (s, c) = a.sin_cos();
            self.push_vertex(center + (u * c + v * s) * radius, n);
        }
        for i in 0..segments {
            let next = (i + 1) % segments;
            self.push_triangle(hub, hub + 1 + i, hub + 1 + next);
        }
    }

    /// Circular tube swept along `curve`.
    ///
    /// Produces `(tubular + 1) * (radial + 1)` vertices; the seam column is
    /// duplicated so every ring is a closed loop of `radial` quads.
    pub fn tube(curve: &impl Curve3, tubular: u32, radius: f64, radial: u32) -> Mesh {
        let tubular = tubular.max(1);
        let radial = radial.max(3);
        let frames = transport_frames(curve, tubular);

        let mut mesh = Mesh::new();
        for (j, frame) in frames.iter().enumerate() {
            let center = curve.point_at(j as f64 / tubular as f64);
            for i in 0..=radial {
                let angle = i as f64 / radial as f64 * std::f64::consts::TAU;
                let (sin, cos) = angle.sin_cos();
                let normal = (frame.normal * -cos + frame.binormal * sin).normalize();
                mesh.push_vertex(center + normal * radius, normal);
            }
        }

        let ring = radial + 1;
        for j in 1..=tubular {
            for i in 1..=radial {
                let a = ring * (j - 1) + (i - 1);
                let b = ring * j + (i - 1);
                let c = ring * j + i;
                let d = ring * (j - 1) + i;
                mesh.push_triangle(a, b, d);
                mesh.push_triangle(b, c, d);
            }
        }
        mesh
    }
}

#[derive(Debug, Copy, Clone)]
struct Frame {
    normal: Vec3,
    binormal: Vec3,
}

/// Rotation-minimising frames by projecting each previous normal onto the
/// plane of the next tangent.
fn transport_frames(curve: &impl Curve3, tubular: u32) -> Vec<Frame> {
    let tangent_at = |t: f64, fallback: Vec3| {
        curve
            .derivative_at(t)
            .try_normalize()
            .unwrap_or(fallback)
    };

    let mut frames = Vec::with_capacity(tubular as usize + 1);
    let mut tangent = tangent_at(0.0, Vec3::Z);
    let mut normal = tangent.any_perpendicular();
    for j in 0..=tubular {
        let t = j as f64 / tubular as f64;
        let next_tangent = tangent_at(t, tangent);
        if j > 0 {
            normal = (normal - next_tangent * normal.dot(next_tangent))
                .try_normalize()
                .unwrap_or_else(|| next_tangent.any_perpendicular());
        }
        tangent = next_tangent;
        let binormal = tangent.cross(normal).normalize();
        frames.push(Frame { normal, binormal });
    }
    frames
}
