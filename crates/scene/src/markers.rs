use formats::affiliation::ValidAffiliation;
use foundation::math::Vec3;
use foundation::time::Time;
use runtime::pulse::{PulseConfig, PulseState};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::World;
use crate::components::{Drawable3D, Transform};
use crate::entity::EntityId;
use crate::mesh::Mesh;
use crate::resources::{Material, MaterialHandle, MeshHandle, Resources};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub globe_radius: f64,
    /// Markers sit at `globe_radius * altitude_factor`.
    pub altitude_factor: f64,
    pub size: f64,
    pub color: [f32; 3],
    pub segments: u32,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            globe_radius: 1.0,
            altitude_factor: 1.005,
            size: 0.02,
            color: [1.0, 0.42, 0.21],
            segments: 12,
        }
    }
}

impl MarkerConfig {
    pub fn marker_radius(&self) -> f64 {
        self.globe_radius * self.altitude_factor
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub entity: EntityId,
    pub position: Vec3,
}

/// Markers for one affiliation list. All markers share one mesh and one
/// material; an empty group owns nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerGroup {
    pub root: Option<EntityId>,
    pub markers: Vec<Marker>,
    pub mesh: Option<MeshHandle>,
    pub material: Option<MaterialHandle>,
}

impl MarkerGroup {
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Marker positions in input order, in the globe's local frame.
    pub fn positions(&self) -> Vec<Vec3> {
        self.markers.iter().map(|m| m.position).collect()
    }
}

pub fn create_markers(
    world: &mut World,
    resources: &mut Resources,
    parent: EntityId,
    valid: &[ValidAffiliation],
    cfg: &MarkerConfig,
) -> MarkerGroup {
    if valid.is_empty() {
        return MarkerGroup::default();
    }
    let root = world.spawn_child(parent);

    let segments = cfg.segments.max(3);
    let mesh = resources.add_mesh(Mesh::uv_sphere(cfg.size, segments, segments));
    let material = resources.add_material(Material {
        color: cfg.color,
        opacity: 1.0,
        emissive: 1.0,
    });

    let radius = cfg.marker_radius();
    let markers: Vec<Marker> = valid
        .iter()
        .map(|affiliation| {
            let position = affiliation.location().to_cartesian(radius);
            let entity = world.spawn_child(root);
            world.set_transform(entity, Transform::translate(position));
            world.set_drawable_3d(entity, Drawable3D::new(mesh, material));
            Marker { entity, position }
        })
        .collect();
    debug!(count = markers.len(), "markers created");

    MarkerGroup {
        root: Some(root),
        markers,
        mesh: Some(mesh),
        material: Some(material),
    }
}

/// Safe to call repeatedly and on empty groups.
pub fn remove_markers(world: &mut World, resources: &mut Resources, group: &mut MarkerGroup) {
    if let Some(root) = group.root.take() {
        world.despawn_recursive(root);
    }
    if let Some(mesh) = group.mesh.take() {
        resources.release_mesh(mesh);
    }
    if let Some(material) = group.material.take() {
        resources.release_material(material);
    }
    group.markers.clear();
}

/// Sets every marker's uniform scale from the wall clock; positions are
/// untouched. Returns the pulse state that was applied.
pub fn pulse(
    world: &mut World,
    group: &MarkerGroup,
    time_s: f64,
    cfg: &PulseConfig,
) -> PulseState {
    let state = PulseState::default().step(Time(time_s), cfg);
    apply_scale(world, group, state.scale);
    state
}

pub fn apply_scale(world: &mut World, group: &MarkerGroup, scale: f64) {
    for marker in &group.markers {
        if let Some(transform) = world.transform_mut(marker.entity) {
            transform.scale = scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formats::affiliation::{Affiliation, validate};
    use pretty_assertions::assert_eq;

    fn valid(lat: f64, lon: f64) -> ValidAffiliation {
        validate(&Affiliation {
            institution: "Institute".into(),
            country: "Nowhere".into(),
            latitude: Some(lat),
            longitude: Some(lon),
            geocoded: true,
            ..Affiliation::default()
        })
        .expect("valid affiliation")
    }

    fn assert_close(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "expected {a} ~= {b} (eps={eps})");
    }

    #[test]
    fn one_marker_per_affiliation_above_surface() {
        let mut world = World::new();
        let mut res = Resources::new();
        let parent = world.spawn();
        let cfg = MarkerConfig::default();
        let list = [valid(10.0, 20.0), valid(-33.9, 151.2), valid(51.5, -0.1)];

        let group = create_markers(&mut world, &mut res, parent, &list, &cfg);
        assert_eq!(group.len(), 3);
        assert_eq!(world.drawables_3d().len(), 3);
        assert_eq!(res.live_meshes(), 1);
        assert_eq!(res.live_materials(), 1);
        for marker in &group.markers {
            assert_close(marker.position.length(), 1.005, 1e-12);
        }
        assert_eq!(group.positions()[0], list[0].location().to_cartesian(1.005));
    }

    #[test]
    fn empty_input_is_an_empty_group() {
        let mut world = World::new();
        let mut res = Resources::new();
        let parent = world.spawn();
        let mut group = create_markers(&mut world, &mut res, parent, &[], &MarkerConfig::default());
        assert!(group.is_empty());
        assert_eq!(res.live_meshes(), 0);
        remove_markers(&mut world, &mut res, &mut group);
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut world = World::new();
        let mut res = Resources::new();
        let parent = world.spawn();
        let list = [valid(0.0, 0.0), valid(45.0, 90.0)];
        let mut group = create_markers(&mut world, &mut res, parent, &list, &MarkerConfig::default());

        remove_markers(&mut world, &mut res, &mut group);
        remove_markers(&mut world, &mut res, &mut group);
        remove_markers(&mut world, &mut res, &mut MarkerGroup::default());

        assert_eq!(world.entity_count(), 1);
        assert_eq!(res.live_meshes(), 0);
        assert_eq!(res.live_materials(), 0);
        assert!(group.is_empty());
    }

    #[test]
    fn pulse_scales_without_moving() {
        let mut world = World::new();
        let mut res = Resources::new();
        let parent = world.spawn();
        let list = [valid(12.0, 34.0)];
        let group = create_markers(&mut world, &mut res, parent, &list, &MarkerConfig::default());
        let cfg = PulseConfig::default();

        let time_s = std::f64::consts::FRAC_PI_4;
        let state = pulse(&mut world, &group, time_s, &cfg);
        assert_close(state.scale, 1.3, 1e-12);
        assert_eq!(state.time, Time(time_s));
        let t = world.transform(group.markers[0].entity).expect("transform");
        assert_close(t.scale, 1.3, 1e-12);
        assert_eq!(t.position, group.markers[0].position);

        pulse(&mut world, &group, 0.0, &cfg);
        let t = world.transform(group.markers[0].entity).expect("transform");
        assert_close(t.scale, 1.0, 1e-12);
    }
}
