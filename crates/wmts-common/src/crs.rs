//! Coordinate Reference System types and utilities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::BoundingBox;

/// Web Mercator sphere radius in meters.
const MERCATOR_RADIUS: f64 = 6378137.0;

/// Half the Web Mercator world span (PI * radius).
const MERCATOR_HALF_SIZE: f64 = 20037508.342789244;

/// Well-known CRS codes supported by the WMTS client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lat/lon in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// NAD83 Geographic
    Epsg4269,
    /// Polar Stereographic North
    Epsg3413,
    /// Polar Stereographic South
    Epsg3031,
}

impl CrsCode {
    /// Parse a CRS string as advertised in a capabilities document.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:3857"
    /// - "CRS:84" (equivalent to EPSG:4326 with lon/lat axis order)
    /// - "urn:ogc:def:crs:EPSG::3857"
    /// - "urn:ogc:def:crs:EPSG:6.18:3:3857"
    ///
    /// URN-style codes are normalized to their short authority:code form
    /// first; if the normalized form is not a known system, the raw string
    /// is tried as-is.
    pub fn from_code(s: &str) -> Result<Self, CrsError> {
        if let Some(normalized) = normalize_crs_urn(s) {
            if let Ok(code) = Self::from_short_code(&normalized) {
                return Ok(code);
            }
        }
        Self::from_short_code(s)
    }

    fn from_short_code(s: &str) -> Result<Self, CrsError> {
        let normalized = s.to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" | "OGC:CRS84" => Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            "EPSG:4269" => Ok(CrsCode::Epsg4269),
            "EPSG:3413" => Ok(CrsCode::Epsg3413),
            "EPSG:3031" => Ok(CrsCode::Epsg3031),
            _ => Err(CrsError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4269)
    }

    /// The full validity extent for this CRS.
    pub fn valid_extent(&self) -> BoundingBox {
        match self {
            CrsCode::Epsg4326 | CrsCode::Epsg4269 => BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            CrsCode::Epsg3857 => BoundingBox::new(
                -MERCATOR_HALF_SIZE,
                -MERCATOR_HALF_SIZE,
                MERCATOR_HALF_SIZE,
                MERCATOR_HALF_SIZE,
            ),
            CrsCode::Epsg3413 | CrsCode::Epsg3031 => {
                // Polar stereographic - approximate bounds
                BoundingBox::new(-4000000.0, -4000000.0, 4000000.0, 4000000.0)
            }
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Epsg3857 => "EPSG:3857",
            CrsCode::Epsg4269 => "EPSG:4269",
            CrsCode::Epsg3413 => "EPSG:3413",
            CrsCode::Epsg3031 => "EPSG:3031",
        };
        write!(f, "{}", code)
    }
}

/// Normalize an OGC URN of the form `urn:ogc:def:crs:AUTH[:version]:code`
/// to its short `AUTH:code` form. Returns `None` for non-URN input.
fn normalize_crs_urn(s: &str) -> Option<String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() < 6 {
        return None;
    }
    let prefix_ok = parts[0].eq_ignore_ascii_case("urn")
        && parts[1].eq_ignore_ascii_case("ogc")
        && parts[2].eq_ignore_ascii_case("def")
        && parts[3].eq_ignore_ascii_case("crs");
    if !prefix_ok {
        return None;
    }
    let authority = parts[4];
    let code = parts[parts.len() - 1];
    if authority.is_empty() || code.is_empty() {
        return None;
    }
    Some(format!("{}:{}", authority, code))
}

/// Transform a bounding box between reference systems.
///
/// Only the transforms this core needs are provided: identity between
/// equivalent or shared-unit geographic systems, and the geographic to
/// Web Mercator pair in both directions. Latitudes are clamped to the
/// Mercator validity range, and projected ordinates are clamped to the
/// world square so a full-extent input maps onto the full valid extent.
pub fn transform_extent(
    bbox: &BoundingBox,
    from: CrsCode,
    to: CrsCode,
) -> Result<BoundingBox, CrsError> {
    if from == to || (from.is_geographic() && to.is_geographic()) {
        return Ok(*bbox);
    }

    match (from, to) {
        (CrsCode::Epsg4326, CrsCode::Epsg3857) | (CrsCode::Epsg4269, CrsCode::Epsg3857) => {
            let (min_x, min_y) = wgs84_to_mercator(bbox.min_x, bbox.min_y);
            let (max_x, max_y) = wgs84_to_mercator(bbox.max_x, bbox.max_y);
            Ok(BoundingBox::new(min_x, min_y, max_x, max_y))
        }
        (CrsCode::Epsg3857, CrsCode::Epsg4326) | (CrsCode::Epsg3857, CrsCode::Epsg4269) => {
            let (min_x, min_y) = mercator_to_wgs84(bbox.min_x, bbox.min_y);
            let (max_x, max_y) = mercator_to_wgs84(bbox.max_x, bbox.max_y);
            Ok(BoundingBox::new(min_x, min_y, max_x, max_y))
        }
        _ => Err(CrsError::NoTransform { from, to }),
    }
}

/// Convert a lon/lat point (degrees) to Web Mercator meters.
fn wgs84_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = (lon / 180.0 * MERCATOR_HALF_SIZE).clamp(-MERCATOR_HALF_SIZE, MERCATOR_HALF_SIZE);
    let y = (MERCATOR_RADIUS * lat.to_radians().tan().asinh())
        .clamp(-MERCATOR_HALF_SIZE, MERCATOR_HALF_SIZE);
    (x, y)
}

/// Convert a Web Mercator point (meters) to lon/lat degrees.
fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = x / MERCATOR_HALF_SIZE * 180.0;
    let lat = (y / MERCATOR_RADIUS).sinh().atan().to_degrees();
    (lon, lat)
}

#[derive(Debug, thiserror::Error)]
pub enum CrsError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("No transform available from {from} to {to}")]
    NoTransform { from: CrsCode, to: CrsCode },
}
