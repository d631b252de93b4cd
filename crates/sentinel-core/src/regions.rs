//! Named surveillance regions.
//!
//! Shared by the fallback generator (placement, risk weighting, climate band)
//! and the outbreak detector (nearest-region labelling).

use crate::models::RiskTier;

/// Latitude separating the northern and southern climate bands.
pub const NORTH_BAND_LATITUDE: f64 = 10.5;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A named region centroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    /// Fixed risk tier, `None` when the region has no surveillance history
    pub risk: Option<RiskTier>,
}

impl Region {
    pub fn is_northern(&self) -> bool {
        self.latitude >= NORTH_BAND_LATITUDE
    }

    pub fn is_high_risk(&self) -> bool {
        self.risk == Some(RiskTier::High)
    }
}

pub static REGIONS: [Region; 12] = [
    Region {
        name: "Kasaragod",
        latitude: 12.50,
        longitude: 75.00,
        risk: Some(RiskTier::Low),
    },
    Region {
        name: "Kannur",
        latitude: 11.87,
        longitude: 75.37,
        risk: Some(RiskTier::Moderate),
    },
    Region {
        name: "Wayanad",
        latitude: 11.69,
        longitude: 76.13,
        risk: Some(RiskTier::Moderate),
    },
    Region {
        name: "Kozhikode",
        latitude: 11.25,
        longitude: 75.78,
        risk: Some(RiskTier::High),
    },
    Region {
        name: "Malappuram",
        latitude: 11.07,
        longitude: 76.07,
        risk: Some(RiskTier::High),
    },
    Region {
        name: "Palakkad",
        latitude: 10.78,
        longitude: 76.65,
        risk: Some(RiskTier::Moderate),
    },
    Region {
        name: "Thrissur",
        latitude: 10.52,
        longitude: 76.21,
        risk: Some(RiskTier::Low),
    },
    Region {
        name: "Ernakulam",
        latitude: 9.98,
        longitude: 76.28,
        risk: Some(RiskTier::High),
    },
    Region {
        name: "Idukki",
        latitude: 9.85,
        longitude: 76.97,
        risk: None,
    },
    Region {
        name: "Kottayam",
        latitude: 9.59,
        longitude: 76.52,
        risk: None,
    },
    Region {
        name: "Kollam",
        latitude: 8.89,
        longitude: 76.61,
        risk: Some(RiskTier::Low),
    },
    Region {
        name: "Thiruvananthapuram",
        latitude: 8.52,
        longitude: 76.94,
        risk: Some(RiskTier::Low),
    },
];

/// Look up a region by name (case-insensitive).
pub fn find(name: &str) -> Option<&'static Region> {
    REGIONS
        .iter()
        .find(|region| region.name.eq_ignore_ascii_case(name.trim()))
}

/// Regions with a fixed high-risk tier.
pub fn high_risk() -> impl Iterator<Item = &'static Region> {
    REGIONS.iter().filter(|region| region.is_high_risk())
}

/// The region whose centroid is closest to the given point.
pub fn nearest(latitude: f64, longitude: f64) -> &'static Region {
    REGIONS
        .iter()
        .min_by(|left, right| {
            let left = distance_km(latitude, longitude, left.latitude, left.longitude);
            let right = distance_km(latitude, longitude, right.latitude, right.longitude);
            left.total_cmp(&right)
        })
        .unwrap_or(&REGIONS[0])
}

/// Great-circle distance between two points.
pub fn distance_km(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let d_lat = (lat_b - lat_a).to_radians();
    let d_lon = (lon_b - lon_a).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.to_radians().cos() * lat_b.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
