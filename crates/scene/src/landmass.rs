//! Dotted landmass built from an equirectangular alpha mask.
//!
//! The mask is sampled on latitude bands whose sample count shrinks with the
//! band's circumference, so dots stay roughly evenly spaced on the sphere.
//! Every land sample becomes a small disk tangent to the sphere; all disks
//! are merged into a single mesh.

use formats::raster::RasterImage;
use foundation::math::GeoPoint;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::World;
use crate::components::Drawable3D;
use crate::entity::EntityId;
use crate::mesh::Mesh;
use crate::resources::{Material, MaterialHandle, MeshHandle, Resources};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmassConfig {
    /// Latitude bands between the poles (inclusive of both).
    pub rows: u32,
    /// Samples per unit of band circumference.
    pub density: f64,
    /// Pixels with alpha strictly above this are land.
    pub alpha_threshold: u8,
    pub radius: f64,
    pub dot_radius: f64,
    pub dot_segments: u32,
    pub color: [f32; 3],
    pub opacity: f32,
}

impl Default for LandmassConfig {
    fn default() -> Self {
        Self {
            rows: 180,
            density: 40.0,
            alpha_threshold: 120,
            radius: 1.001,
            dot_radius: 0.006,
            dot_segments: 6,
            color: [0.55, 0.75, 1.0],
            opacity: 1.0,
        }
    }
}

/// Longitude samples on the band at `lat_deg`. Zero at the exact poles.
pub fn band_sample_count(lat_deg: f64, density: f64) -> u32 {
    let band_radius = lat_deg.abs().to_radians().cos().max(0.0);
    (std::f64::consts::TAU * band_radius * density).floor() as u32
}

/// Every sample location on the grid, land or not.
pub fn sample_grid(cfg: &LandmassConfig) -> impl Iterator<Item = GeoPoint> + '_ {
    let rows = cfg.rows.max(1);
    (0..=rows).flat_map(move |row| {
        let lat = -90.0 + row as f64 * 180.0 / rows as f64;
        let samples = band_sample_count(lat, cfg.density);
        (0..samples).map(move |i| {
            let lon = -180.0 + i as f64 * 360.0 / samples as f64;
            GeoPoint::new(lat, lon)
        })
    })
}

/// Pixel (row, col) for a location; clamped into the image.
pub fn pixel_for(image: &RasterImage, point: GeoPoint) -> (u32, u32) {
    let w = image.width() as f64;
    let h = image.height() as f64;
    let row = (h / 180.0 * (90.0 - point.latitude)).floor();
    let col = (w / 360.0 * (point.longitude + 180.0).rem_euclid(360.0)).floor();
    (
        row.clamp(0.0, h - 1.0) as u32,
        col.clamp(0.0, w - 1.0) as u32,
    )
}

pub fn is_land(image: &RasterImage, point: GeoPoint, alpha_threshold: u8) -> bool {
    let (row, col) = pixel_for(image, point);
    image.alpha_at(row, col) > alpha_threshold
}

pub fn land_samples(image: &RasterImage, cfg: &LandmassConfig) -> Vec<GeoPoint> {
    sample_grid(cfg)
        .filter(|p| is_land(image, *p, cfg.alpha_threshold))
        .collect()
}

/// `None` when there is no image yet or it contains no land.
pub fn build_landmass_mesh(
    image: Option<&RasterImage>,
    cfg: &LandmassConfig,
) -> Option<(Mesh, usize)> {
    let image = image?;
    let samples = land_samples(image, cfg);
    if samples.is_empty() {
        return None;
    }

    let mut mesh = Mesh::new();
    for point in &samples {
        let center = point.to_cartesian(cfg.radius);
        mesh.append_disk(center, center, cfg.dot_radius, cfg.dot_segments);
    }
    Some((mesh, samples.len()))
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Landmass {
    pub entity: EntityId,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub disks: usize,
}

pub fn spawn_landmass(
    world: &mut World,
    resources: &mut Resources,
    parent: EntityId,
    image: Option<&RasterImage>,
    cfg: &LandmassConfig,
) -> Option<Landmass> {
    let Some((mesh, disks)) = build_landmass_mesh(image, cfg) else {
        info!("landmass skipped: no land samples");
        return None;
    };
    debug!(disks, vertices = mesh.vertex_count(), "landmass mesh built");

    let entity = world.spawn_child(parent);
    let mesh = resources.add_mesh(mesh);
    let material = resources.add_material(Material {
        color: cfg.color,
        opacity: cfg.opacity,
        emissive: 0.4,
    });
    world.set_drawable_3d(entity, Drawable3D::new(mesh, material));

    Some(Landmass {
        entity,
        mesh,
        material,
        disks,
    })
}

impl Landmass {
    pub fn release(&self, world: &mut World, resources: &mut Resources) {
        world.despawn(self.entity);
        resources.release_mesh(self.mesh);
        resources.release_material(self.material);
    }
}
