use super::Vec3;

/// Geographic coordinates in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn to_cartesian(self, radius: f64) -> Vec3 {
        to_cartesian(self.latitude, self.longitude, radius)
    }
}

/// Maps latitude/longitude (degrees) onto a sphere of `radius`.
///
/// Polar angle `phi` is measured from +Y, azimuth `theta` is the longitude
/// shifted by 180° so that lon = -180 lands on -X. Every consumer (markers,
/// curves, landmass, rotation target) must go through this function or the
/// layers drift apart.
pub fn to_cartesian(lat_deg: f64, lon_deg: f64, radius: f64) -> Vec3 {
    let phi = (90.0 - lat_deg).to_radians();
    let theta = (lon_deg + 180.0).to_radians();
    let sin_phi = phi.sin();

    Vec3::new(
        -radius * sin_phi * theta.cos(),
        radius * phi.cos(),
        radius * sin_phi * theta.sin(),
    )
}

/// Great-circle angle between two positions (radians), independent of
/// their radii.
pub fn angular_separation(a: Vec3, b: Vec3) -> f64 {
    a.angle_between(b)
}
