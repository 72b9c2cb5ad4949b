//! Planar projection so that Euclidean distance approximates ground distance.

use rawnav_model::ReferencePoint;

use crate::settings::ProjectionOrigin;

pub const METERS_TO_FEET: f64 = 3.28084;

/// Equirectangular projection centred on an origin, in metres.
///
/// x = R * cos(lat0) * dlon
/// y = R * dlat
///
/// Distortion stays well under a foot per hundred feet within a metro area,
/// which is the scale a single run covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTangentPlane {
    origin_lon_rad: f64,
    origin_lat_rad: f64,
    cos_lat0: f64,
}

impl LocalTangentPlane {
    const EARTH_RADIUS: f64 = 6_371_007.2;

    pub fn new(lat0: f64, lon0: f64) -> Self {
        let origin_lat_rad = lat0.to_radians();
        Self {
            origin_lon_rad: lon0.to_radians(),
            origin_lat_rad,
            cos_lat0: origin_lat_rad.cos(),
        }
    }

    pub fn from_origin(origin: ProjectionOrigin) -> Self {
        Self::new(origin.lat, origin.lon)
    }

    /// Plane centred on the mean reference position; `None` when empty.
    pub fn centered_on(references: &[ReferencePoint]) -> Option<Self> {
        if references.is_empty() {
            return None;
        }
        let count = references.len() as f64;
        let lat = references.iter().map(|point| point.stop_lat).sum::<f64>() / count;
        let lon = references.iter().map(|point| point.stop_lon).sum::<f64>() / count;
        Some(Self::new(lat, lon))
    }

    /// Project (lat, lon) to (x, y) metres.
    pub fn project(&self, lat: f64, lon: f64) -> [f64; 2] {
        let dlon = lon.to_radians() - self.origin_lon_rad;
        let dlat = lat.to_radians() - self.origin_lat_rad;
        [
            Self::EARTH_RADIUS * self.cos_lat0 * dlon,
            Self::EARTH_RADIUS * dlat,
        ]
    }

    pub fn distance_ft(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        let pa = self.project(a.0, a.1);
        let pb = self.project(b.0, b.1);
        euclidean(pa, pb) * METERS_TO_FEET
    }
}

pub fn euclidean(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}
