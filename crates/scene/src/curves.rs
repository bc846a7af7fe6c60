//! Tube arcs linking marker positions.
//!
//! Consecutive positions are joined by quadratic bezier arcs that bow
//! outward from the sphere; the bow grows with the angular distance between
//! the endpoints so long hops clear the surface. A lone position gets a
//! small cubic loop instead.

use foundation::math::{CubicBezier, QuadraticBezier, Vec3, angular_separation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::World;
use crate::components::Drawable3D;
use crate::entity::EntityId;
use crate::mesh::Mesh;
use crate::resources::{Material, MaterialHandle, MeshHandle, Resources};

/// Below this the loop tangent is treated as degenerate (point at a pole).
const LOOP_TANGENT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    pub min_arc_height: f64,
    pub max_arc_height: f64,
    pub tube_radius: f64,
    pub tubular_segments: u32,
    pub radial_segments: u32,
    pub self_loop_height: f64,
    /// Adds a last-to-first segment when there are more than two points.
    pub close_loop: bool,
    pub color: [f32; 3],
    pub opacity: f32,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            min_arc_height: 0.4,
            max_arc_height: 2.0,
            tube_radius: 0.004,
            tubular_segments: 64,
            radial_segments: 8,
            self_loop_height: 0.5,
            close_loop: true,
            color: [0.35, 0.8, 1.0],
            opacity: 0.8,
        }
    }
}

/// Linear in the angle: `min` for coincident points, `max` for antipodes.
pub fn arc_height(angle_rad: f64, cfg: &CurveConfig) -> f64 {
    let t = angle_rad / std::f64::consts::PI;
    cfg.min_arc_height + t * (cfg.max_arc_height - cfg.min_arc_height)
}

pub fn arc_control_point(p1: Vec3, p2: Vec3, cfg: &CurveConfig) -> Vec3 {
    let h = arc_height(angular_separation(p1, p2), cfg);
    let direction = p1
        .midpoint(p2)
        .try_normalize()
        .unwrap_or_else(|| p1.any_perpendicular());
    direction * (1.0 + h)
}

pub fn arc_curve(p1: Vec3, p2: Vec3, cfg: &CurveConfig) -> QuadraticBezier {
    QuadraticBezier::new(p1, arc_control_point(p1, p2, cfg), p2)
}

/// Index pairs joined for `n` points, in input order.
pub fn segment_pairs(n: usize, close_loop: bool) -> Vec<(usize, usize)> {
    if n < 2 {
        return Vec::new();
    }
    let mut pairs: Vec<(usize, usize)> = (0..n - 1).map(|i| (i, i + 1)).collect();
    if close_loop && n > 2 {
        pairs.push((n - 1, 0));
    }
    pairs
}

/// Unit tangent used to open a self-loop at `point`.
pub fn loop_tangent(point: Vec3) -> Vec3 {
    let radial = point.try_normalize().unwrap_or(Vec3::Y);
    let tangent = radial.cross(Vec3::Y);
    if tangent.length() < LOOP_TANGENT_EPSILON {
        radial.cross(Vec3::X).normalize()
    } else {
        tangent.normalize()
    }
}

pub fn self_loop_curve(point: Vec3, cfg: &CurveConfig) -> CubicBezier {
    let radial = point.try_normalize().unwrap_or(Vec3::Y);
    let tangent = loop_tangent(point);
    let h = cfg.self_loop_height;
    let w = h / 2.0;
    let lift = point + radial * h;
    CubicBezier::new(point, lift + tangent * w, lift - tangent * w, point)
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CurveSegment {
    pub entity: EntityId,
    pub mesh: MeshHandle,
    pub from: usize,
    pub to: usize,
}

/// Tubes built from one position list; they share a single material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveGroup {
    pub root: Option<EntityId>,
    pub segments: Vec<CurveSegment>,
    pub material: Option<MaterialHandle>,
}

impl CurveGroup {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

fn curve_material(resources: &mut Resources, cfg: &CurveConfig) -> MaterialHandle {
    resources.add_material(Material {
        color: cfg.color,
        opacity: cfg.opacity,
        emissive: 1.0,
    })
}

pub fn connect(
    world: &mut World,
    resources: &mut Resources,
    parent: EntityId,
    points: &[Vec3],
    close_loop: bool,
    cfg: &CurveConfig,
) -> CurveGroup {
    let pairs = segment_pairs(points.len(), close_loop);
    if pairs.is_empty() {
        warn!(points = points.len(), "connect needs at least two points");
        return CurveGroup::default();
    }

    let root = world.spawn_child(parent);
    let material = curve_material(resources, cfg);
    let segments = pairs
        .into_iter()
        .map(|(from, to)| {
            let curve = arc_curve(points[from], points[to], cfg);
            let mesh = Mesh::tube(
                &curve,
                cfg.tubular_segments,
                cfg.tube_radius,
                cfg.radial_segments,
            );
            let mesh = resources.add_mesh(mesh);
            let entity = world.spawn_child(root);
            world.set_drawable_3d(entity, Drawable3D::new(mesh, material));
            CurveSegment {
                entity,
                mesh,
                from,
                to,
            }
        })
        .collect::<Vec<_>>();
    debug!(segments = segments.len(), close_loop, "curve network built");

    CurveGroup {
        root: Some(root),
        segments,
        material: Some(material),
    }
}

pub fn self_loop(
    world: &mut World,
    resources: &mut Resources,
    parent: EntityId,
    point: Vec3,
    cfg: &CurveConfig,
) -> CurveGroup {
    let root = world.spawn_child(parent);
    let material = curve_material(resources, cfg);
    let curve = self_loop_curve(point, cfg);
    let mesh = resources.add_mesh(Mesh::tube(
        &curve,
        cfg.tubular_segments,
        cfg.tube_radius,
        cfg.radial_segments,
    ));
    let entity = world.spawn_child(root);
    world.set_drawable_3d(entity, Drawable3D::new(mesh, material));

    CurveGroup {
        root: Some(root),
        segments: vec![CurveSegment {
            entity,
            mesh,
            from: 0,
            to: 0,
        }],
        material: Some(material),
    }
}

/// Safe to call repeatedly and on empty groups.
pub fn dispose(world: &mut World, resources: &mut Resources, group: &mut CurveGroup) {
    for segment in group.segments.drain(..) {
        resources.release_mesh(segment.mesh);
    }
    if let Some(material) = group.material.take() {
        resources.release_material(material);
    }
    if let Some(root) = group.root.take() {
        world.despawn_recursive(root);
    }
}
