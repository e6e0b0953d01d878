use crate::error::InvalidInput;
use haversine::{distance, Location as HaversineLocation, Units};
use serde::{Deserialize, Serialize};

/// A geographical position in decimal degrees.
///
/// # Examples
///
/// ```
/// use heizgradtage::Coordinate;
///
/// let berlin = Coordinate::new(52.5200, 13.4050).unwrap();
/// assert_eq!(berlin.latitude, 52.5200);
/// assert!(Coordinate::new(91.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidInput> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if valid {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(InvalidInput::Coordinate {
                latitude,
                longitude,
            })
        }
    }

    /// Great-circle distance in kilometers.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        distance(
            HaversineLocation {
                latitude: self.latitude,
                longitude: self.longitude,
            },
            HaversineLocation {
                latitude: other.latitude,
                longitude: other.longitude,
            },
            Units::Kilometers,
        )
    }

    /// Position on the unit sphere. Euclidean (chord) distance between these
    /// points grows monotonically with great-circle distance.
    pub(crate) fn unit_vector(&self) -> [f64; 3] {
        let lat = self.latitude.to_radians();
        let lon = self.longitude.to_radians();
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    }
}
