//! Parsed WMTS capabilities document model.
//!
//! The client never touches raw capabilities XML; it consumes the
//! already-parsed, JSON-shaped document tree. The structs here mirror
//! that shape field-for-field, wire names mapped with serde renames.

use serde::Deserialize;
use wmts_common::{CrsCode, TileMatrix, TileMatrixLimits, TileMatrixSet, WmtsResult};

/// A parsed WMTS capabilities document.
#[derive(Debug, Clone, Deserialize)]
pub struct Capabilities {
    #[serde(rename = "version", default)]
    pub version: Option<String>,

    #[serde(rename = "OperationsMetadata", default)]
    pub operations_metadata: Option<OperationsMetadata>,

    #[serde(rename = "Contents")]
    pub contents: Contents,
}

impl Capabilities {
    /// Deserialize from a JSON-shaped document value.
    pub fn from_value(value: serde_json::Value) -> WmtsResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Find a layer by identifier.
    pub fn find_layer(&self, identifier: &str) -> Option<&CapabilitiesLayer> {
        self.contents
            .layers
            .iter()
            .find(|l| l.identifier == identifier)
    }

    /// Find a tile matrix set by identifier.
    pub fn find_matrix_set(&self, identifier: &str) -> Option<&TileMatrixSetDef> {
        self.contents
            .tile_matrix_sets
            .iter()
            .find(|s| s.identifier == identifier)
    }

    /// The GetTile HTTP-GET bindings declared in operation metadata, in
    /// document order. Empty when no operation metadata is advertised.
    pub fn get_tile_bindings(&self) -> &[HttpGet] {
        self.operations_metadata
            .as_ref()
            .and_then(|om| om.get_tile.as_ref())
            .and_then(|op| op.dcp.as_ref())
            .and_then(|dcp| dcp.http.as_ref())
            .map(|http| http.get.as_slice())
            .unwrap_or(&[])
    }
}

/// Operation metadata (GetTile bindings are the only ones this client reads).
#[derive(Debug, Clone, Deserialize)]
pub struct OperationsMetadata {
    #[serde(rename = "GetTile", default)]
    pub get_tile: Option<Operation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    #[serde(rename = "DCP", default)]
    pub dcp: Option<Dcp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dcp {
    #[serde(rename = "HTTP", default)]
    pub http: Option<Http>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    #[serde(rename = "Get", default)]
    pub get: Vec<HttpGet>,
}

/// One HTTP-GET binding with its encoding constraints.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpGet {
    #[serde(rename = "href")]
    pub href: String,

    #[serde(rename = "Constraint", default)]
    pub constraints: Vec<Constraint>,
}

impl HttpGet {
    /// The GetEncoding constraint on this binding, if declared.
    pub fn get_encoding_constraint(&self) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == "GetEncoding")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Constraint {
    #[serde(rename = "name")]
    pub name: String,

    #[serde(rename = "AllowedValues", default)]
    pub allowed_values: Option<AllowedValues>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowedValues {
    #[serde(rename = "Value", default)]
    pub values: Vec<String>,
}

/// The Contents section: layers and tile matrix sets.
#[derive(Debug, Clone, Deserialize)]
pub struct Contents {
    #[serde(rename = "Layer", default)]
    pub layers: Vec<CapabilitiesLayer>,

    #[serde(rename = "TileMatrixSet", default)]
    pub tile_matrix_sets: Vec<TileMatrixSetDef>,
}

/// A layer descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilitiesLayer {
    #[serde(rename = "Identifier")]
    pub identifier: String,

    #[serde(rename = "Title", default)]
    pub title: Option<String>,

    #[serde(rename = "Abstract", default)]
    pub abstract_text: Option<String>,

    #[serde(rename = "Format", default)]
    pub formats: Vec<String>,

    #[serde(rename = "Style", default)]
    pub styles: Vec<StyleEntry>,

    #[serde(rename = "TileMatrixSetLink", default)]
    pub tile_matrix_set_links: Vec<TileMatrixSetLink>,

    #[serde(rename = "Dimension", default)]
    pub dimensions: Vec<DimensionEntry>,

    #[serde(rename = "ResourceURL", default)]
    pub resource_urls: Vec<ResourceUrl>,

    /// Geographic bounding box, `[min_lon, min_lat, max_lon, max_lat]`
    #[serde(rename = "WGS84BoundingBox", default)]
    pub wgs84_bounding_box: Option<[f64; 4]>,
}

/// A style declared on a layer.
#[derive(Debug, Clone, Deserialize)]
pub struct StyleEntry {
    #[serde(rename = "Identifier")]
    pub identifier: String,

    #[serde(rename = "Title", default)]
    pub title: Option<String>,

    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
}

/// A link from a layer to a tile matrix set, with optional tile-range limits.
#[derive(Debug, Clone, Deserialize)]
pub struct TileMatrixSetLink {
    #[serde(rename = "TileMatrixSet")]
    pub tile_matrix_set: String,

    #[serde(rename = "TileMatrixSetLimits", default)]
    pub limits: Option<Vec<TileMatrixLimits>>,
}

/// A dimension descriptor (TIME, ELEVATION, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct DimensionEntry {
    #[serde(rename = "Identifier")]
    pub identifier: String,

    #[serde(rename = "Default", default)]
    pub default: Option<String>,

    #[serde(rename = "Value", default)]
    pub values: Vec<String>,
}

/// A RESTful resource-URL template declared on a layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceUrl {
    #[serde(rename = "format")]
    pub format: String,

    #[serde(rename = "template")]
    pub template: String,

    #[serde(rename = "resourceType")]
    pub resource_type: String,
}

/// A tile matrix set descriptor as advertised in the document.
#[derive(Debug, Clone, Deserialize)]
pub struct TileMatrixSetDef {
    #[serde(rename = "Identifier")]
    pub identifier: String,

    #[serde(rename = "SupportedCRS", default)]
    pub supported_crs: Option<String>,

    #[serde(rename = "WellKnownScaleSet", default)]
    pub well_known_scale_set: Option<String>,

    #[serde(rename = "BoundingBox", default)]
    pub bounding_box: Option<[f64; 4]>,

    #[serde(rename = "TileMatrix", default)]
    pub tile_matrices: Vec<TileMatrixDef>,
}

impl TileMatrixSetDef {
    /// Convert into the domain matrix-set type under a resolved CRS.
    pub fn to_matrix_set(&self, crs: CrsCode) -> TileMatrixSet {
        TileMatrixSet {
            identifier: self.identifier.clone(),
            crs,
            bounding_box: self
                .bounding_box
                .map(wmts_common::BoundingBox::from_corners),
            well_known_scale_set: self.well_known_scale_set.clone(),
            tile_matrices: self.tile_matrices.iter().map(TileMatrixDef::to_matrix).collect(),
        }
    }
}

/// One tile matrix (zoom level) descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TileMatrixDef {
    pub identifier: String,
    pub scale_denominator: f64,
    pub top_left_corner: [f64; 2],
    pub tile_width: u32,
    pub tile_height: u32,
    pub matrix_width: u32,
    pub matrix_height: u32,
}

impl TileMatrixDef {
    fn to_matrix(&self) -> TileMatrix {
        TileMatrix {
            identifier: self.identifier.clone(),
            scale_denominator: self.scale_denominator,
            top_left_corner: (self.top_left_corner[0], self.top_left_corner[1]),
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            matrix_width: self.matrix_width,
            matrix_height: self.matrix_height,
        }
    }
}
