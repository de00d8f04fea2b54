//! Local tangent-plane projection.
//!
//! Geodetic coordinates are mapped onto a flat east/north frame anchored at an
//! origin with the equirectangular approximation on a spherical Earth of
//! radius [`EARTH_RADIUS_M`]. The error grows with the distance from the
//! origin and with the origin latitude: results are only meaningful within a
//! few kilometers of the anchor, and degrade towards the poles (`cos(lat0)`
//! vanishes there).

use log::{info, warn};
use nalgebra::Vector2;
use thiserror::Error;

use super::datatypes::GeodeticPoint;

pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("Projection origin is not set")]
    OriginNotSet,

    #[error("Projection origin already set to {current:?}, cannot re-anchor at {requested:?}")]
    OriginConflict {
        current: GeodeticPoint,
        requested: GeodeticPoint,
    },
}

#[derive(Debug, Clone, Default)]
pub struct LocalProjection {
    origin: Option<GeodeticPoint>,
}

impl LocalProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(origin: GeodeticPoint) -> Self {
        Self {
            origin: Some(origin),
        }
    }

    pub fn origin(&self) -> Option<GeodeticPoint> {
        self.origin
    }

    pub fn is_anchored(&self) -> bool {
        self.origin.is_some()
    }

    /// Anchors the projection. Setting the same origin again is a no-op,
    /// moving an already anchored projection is rejected.
    pub fn set_origin(&mut self, origin: GeodeticPoint) -> Result<(), Error> {
        match self.origin {
            None => {
                info!(
                    "Projection anchored at lat {:.7} lon {:.7}",
                    origin.lat_deg, origin.lon_deg
                );
                self.origin = Some(origin);
                Ok(())
            }
            Some(current) if current == origin => Ok(()),
            Some(current) => {
                warn!("Rejected re-anchoring from {current:?} to {origin:?}");
                Err(Error::OriginConflict {
                    current,
                    requested: origin,
                })
            }
        }
    }

    /// Converts to local east (x) / north (y) meters.
    pub fn geodetic_to_local(&self, p: &GeodeticPoint) -> Result<Vector2<f64>, Error> {
        let origin = self.origin.ok_or(Error::OriginNotSet)?;

        let x = (p.lon_deg - origin.lon_deg).to_radians()
            * EARTH_RADIUS_M
            * origin.lat_deg.to_radians().cos();
        let y = (p.lat_deg - origin.lat_deg).to_radians() * EARTH_RADIUS_M;

        Ok(Vector2::new(x, y))
    }

    pub fn local_to_geodetic(&self, pos_m: &Vector2<f64>) -> Result<GeodeticPoint, Error> {
        let origin = self.origin.ok_or(Error::OriginNotSet)?;

        let lat_deg = origin.lat_deg + (pos_m[1] / EARTH_RADIUS_M).to_degrees();
        let lon_deg = origin.lon_deg
            + (pos_m[0] / (EARTH_RADIUS_M * origin.lat_deg.to_radians().cos())).to_degrees();

        Ok(GeodeticPoint { lat_deg, lon_deg })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use pretty_assertions::assert_eq;

    fn tokyo() -> LocalProjection {
        LocalProjection::with_origin(GeodeticPoint::new(35.0, 140.0))
    }

    #[test]
    fn test_unset_origin() {
        let proj = LocalProjection::new();

        assert!(!proj.is_anchored());
        assert_eq!(
            proj.geodetic_to_local(&GeodeticPoint::new(35.0, 140.0)),
            Err(Error::OriginNotSet)
        );
        assert_eq!(
            proj.local_to_geodetic(&Vector2::new(1.0, 1.0)),
            Err(Error::OriginNotSet)
        );
    }

    #[test]
    fn test_set_origin_once() {
        let mut proj = LocalProjection::new();
        let origin = GeodeticPoint::new(35.0, 140.0);

        assert_eq!(proj.set_origin(origin), Ok(()));
        assert_eq!(proj.set_origin(origin), Ok(()));

        let other = GeodeticPoint::new(36.0, 140.0);
        assert_eq!(
            proj.set_origin(other),
            Err(Error::OriginConflict {
                current: origin,
                requested: other
            })
        );
        assert_eq!(proj.origin(), Some(origin));
    }

    #[test]
    fn test_origin_maps_to_zero() {
        let proj = tokyo();
        let local = proj
            .geodetic_to_local(&GeodeticPoint::new(35.0, 140.0))
            .unwrap();

        assert_abs_diff_eq!(local, Vector2::zeros());
    }

    #[test]
    fn test_axes() {
        let proj = tokyo();

        // One degree of latitude along the meridian
        let north = proj
            .geodetic_to_local(&GeodeticPoint::new(36.0, 140.0))
            .unwrap();
        assert_abs_diff_eq!(north[0], 0.0);
        assert_relative_eq!(north[1], 111_319.49, epsilon = 0.01);

        // Longitude shrinks with cos(lat0)
        let east = proj
            .geodetic_to_local(&GeodeticPoint::new(35.0, 141.0))
            .unwrap();
        assert_relative_eq!(east[0], 111_319.49 * 35f64.to_radians().cos(), epsilon = 0.01);
        assert_abs_diff_eq!(east[1], 0.0);
    }

    #[test]
    fn test_round_trip_within_1km() {
        let proj = tokyo();

        for (x, y) in [
            (0.0, 0.0),
            (5.0, 0.0),
            (-250.0, 730.0),
            (999.0, -20.0),
            (-700.0, -700.0),
        ] {
            let local = Vector2::new(x, y);
            let geo = proj.local_to_geodetic(&local).unwrap();
            let back = proj.geodetic_to_local(&geo).unwrap();

            assert_abs_diff_eq!(back, local, epsilon = 1e-6);

            let again = proj.local_to_geodetic(&back).unwrap();
            assert_abs_diff_eq!(again.lat_deg, geo.lat_deg, epsilon = 1e-9);
            assert_abs_diff_eq!(again.lon_deg, geo.lon_deg, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_close_to_ellipsoid_at_local_scale() {
        let origin = GeodeticPoint::new(35.0, 140.0);
        let proj = LocalProjection::with_origin(origin);

        for (n, e) in [(1000.0, 0.0), (0.0, 1000.0), (-600.0, 800.0)] {
            let (lat, lon, _) = map_3d::ned2geodetic(
                n,
                e,
                0.0,
                origin.lat_deg.to_radians(),
                origin.lon_deg.to_radians(),
                0.0,
                map_3d::Ellipsoid::WGS84,
            );

            let local = proj
                .geodetic_to_local(&GeodeticPoint::new(lat.to_degrees(), lon.to_degrees()))
                .unwrap();

            // Spherical vs WGS84 curvature differ by well under 1%
            assert!((local - Vector2::new(e, n)).norm() < 10.0);
        }
    }
}
