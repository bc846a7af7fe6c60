use serde::{Deserialize, Serialize};

use crate::World;
use crate::components::{Drawable3D, Transform};
use crate::entity::EntityId;
use crate::mesh::Mesh;
use crate::resources::{Material, MaterialHandle, MeshHandle, Resources};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobeStyle {
    pub radius: f64,
    pub color: [f32; 3],
    pub opacity: f32,
    pub lat_segments: u32,
    pub lon_segments: u32,
}

impl Default for GlobeStyle {
    fn default() -> Self {
        Self {
            radius: 1.0,
            color: [0.04, 0.09, 0.2],
            opacity: 1.0,
            lat_segments: 48,
            lon_segments: 64,
        }
    }
}

/// The rotating group plus its surface sphere.
///
/// Markers, curves and the landmass are parented to `root` so a single
/// rotation moves all of them together.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Globe {
    pub root: EntityId,
    pub surface: EntityId,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
}

pub fn spawn_globe(world: &mut World, resources: &mut Resources, style: &GlobeStyle) -> Globe {
    let root = world.spawn();
    let surface = world.spawn_child(root);

    let mesh = resources.add_mesh(Mesh::uv_sphere(
        style.radius,
        style.lat_segments,
        style.lon_segments,
    ));
    let material = resources.add_material(Material {
        color: style.color,
        opacity: style.opacity,
        emissive: 0.0,
    });
    world.set_drawable_3d(surface, Drawable3D::new(mesh, material));

    Globe {
        root,
        surface,
        mesh,
        material,
    }
}

impl Globe {
    pub fn set_rotation(&self, world: &mut World, angle_rad: f64) {
        if let Some(transform) = world.transform_mut(self.root) {
            transform.rotation_y = angle_rad;
        }
    }

    pub fn rotation(&self, world: &World) -> f64 {
        world
            .transform(self.root)
            .map(|t| t.rotation_y)
            .unwrap_or_default()
    }

    /// Despawns the whole group, including anything still parented to it.
    pub fn release(&self, world: &mut World, resources: &mut Resources) {
        world.despawn_recursive(self.root);
        resources.release_mesh(self.mesh);
        resources.release_material(self.material);
    }
}
