//! WMTS Tile Matrix and TileMatrixSet definitions.
//!
//! Implements OGC WMTS tile matrix concepts for tiled map clients,
//! including the tile grid built from a selected matrix set.

use crate::{BoundingBox, CrsCode, WmtsError, WmtsResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tile coordinate (z/x/y) in the client's internal scheme.
///
/// Column and row are signed: the internal scheme admits negative rows,
/// and the protocol-space row is derived by arithmetic inversion at
/// request-address time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level (index into the tile grid's matrix list)
    pub z: u32,
    /// Column (x)
    pub x: i32,
    /// Row (y)
    pub y: i32,
}

impl TileCoord {
    pub fn new(z: u32, x: i32, y: i32) -> Self {
        Self { z, x, y }
    }

    /// Generate a cache key string.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }
}

/// A single tile matrix (zoom level) definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMatrix {
    /// Identifier (usually zoom level as string)
    pub identifier: String,

    /// Scale denominator
    pub scale_denominator: f64,

    /// Top-left corner coordinates
    pub top_left_corner: (f64, f64),

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Number of tile columns
    pub matrix_width: u32,

    /// Number of tile rows
    pub matrix_height: u32,
}

impl TileMatrix {
    /// Calculate the resolution (units per pixel) for this matrix.
    pub fn resolution(&self) -> f64 {
        // Standard pixel size is 0.28mm (OGC WMTS spec)
        self.scale_denominator * 0.00028
    }

    /// The full extent covered by this matrix.
    pub fn extent(&self) -> BoundingBox {
        let res = self.resolution();
        let span_x = res * self.tile_width as f64 * self.matrix_width as f64;
        let span_y = res * self.tile_height as f64 * self.matrix_height as f64;

        let min_x = self.top_left_corner.0;
        let max_y = self.top_left_corner.1;

        BoundingBox::new(min_x, max_y - span_y, min_x + span_x, max_y)
    }
}

/// Tile-range limits for one matrix of a matrix-set link.
///
/// Rows and columns are expressed in protocol space (rows counted from the
/// top of the matrix, starting at zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TileMatrixLimits {
    /// Identifier of the tile matrix these limits apply to
    pub tile_matrix: String,
    pub min_tile_row: u32,
    pub max_tile_row: u32,
    pub min_tile_col: u32,
    pub max_tile_col: u32,
}

/// A complete tile matrix set definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMatrixSet {
    /// Identifier for the tile matrix set
    pub identifier: String,

    /// Coordinate reference system
    pub crs: CrsCode,

    /// Bounding box of the tile matrix set (optional in capabilities)
    pub bounding_box: Option<BoundingBox>,

    /// Well-known scale set URI (optional)
    pub well_known_scale_set: Option<String>,

    /// Individual tile matrices (zoom levels)
    pub tile_matrices: Vec<TileMatrix>,
}

impl TileMatrixSet {
    /// Get a tile matrix by identifier.
    pub fn get_matrix(&self, identifier: &str) -> Option<&TileMatrix> {
        self.tile_matrices
            .iter()
            .find(|m| m.identifier == identifier)
    }
}

/// A tile grid built from a selected matrix set.
///
/// Matrices are ordered coarse-to-fine by scale denominator, so the zoom
/// level of an internal tile coordinate indexes directly into the matrix
/// list. Tile-range limits are clipping metadata for callers; address
/// resolution itself does not consult them.
#[derive(Debug, Clone)]
pub struct TileGrid {
    identifier: String,
    crs: CrsCode,
    matrices: Vec<TileMatrix>,
    extent: Option<BoundingBox>,
    limits: BTreeMap<String, TileMatrixLimits>,
}

impl TileGrid {
    /// Build a tile grid from a matrix set, an optional bounding extent and
    /// optional per-matrix tile-range limits.
    pub fn from_matrix_set(
        matrix_set: TileMatrixSet,
        extent: Option<BoundingBox>,
        limits: Option<Vec<TileMatrixLimits>>,
    ) -> WmtsResult<Self> {
        if matrix_set.tile_matrices.is_empty() {
            return Err(WmtsError::EmptyMatrixSet(matrix_set.identifier));
        }

        let mut matrices = matrix_set.tile_matrices;
        // Coarse to fine: descending scale denominator
        matrices.sort_by(|a, b| {
            b.scale_denominator
                .partial_cmp(&a.scale_denominator)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let limits = limits
            .unwrap_or_default()
            .into_iter()
            .map(|l| (l.tile_matrix.clone(), l))
            .collect();

        Ok(Self {
            identifier: matrix_set.identifier,
            crs: matrix_set.crs,
            matrices,
            extent: extent.or(matrix_set.bounding_box),
            limits,
        })
    }

    /// Identifier of the matrix set this grid was built from.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Coordinate reference system of the grid.
    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    /// Number of zoom levels.
    pub fn matrix_count(&self) -> usize {
        self.matrices.len()
    }

    /// The matrix for a zoom level, if the level exists.
    pub fn matrix(&self, z: u32) -> Option<&TileMatrix> {
        self.matrices.get(z as usize)
    }

    /// The matrix identifier for a zoom level, if the level exists.
    pub fn matrix_id(&self, z: u32) -> Option<&str> {
        self.matrix(z).map(|m| m.identifier.as_str())
    }

    /// The zoom level of a matrix identifier.
    pub fn zoom_for_matrix(&self, identifier: &str) -> Option<u32> {
        self.matrices
            .iter()
            .position(|m| m.identifier == identifier)
            .map(|i| i as u32)
    }

    /// Resolution (units per pixel) for a zoom level.
    pub fn resolution(&self, z: u32) -> Option<f64> {
        self.matrix(z).map(|m| m.resolution())
    }

    /// The grid's bounding extent: the configured one if present, else the
    /// extent covered by the coarsest matrix.
    pub fn extent(&self) -> Option<BoundingBox> {
        self.extent.or_else(|| self.matrices.first().map(|m| m.extent()))
    }

    /// Tile-range limits for a zoom level, if any were declared.
    pub fn limits(&self, z: u32) -> Option<&TileMatrixLimits> {
        self.matrix_id(z).and_then(|id| self.limits.get(id))
    }

    /// Check an internal coordinate against declared tile-range limits.
    ///
    /// The coordinate's row is inverted into protocol space before the
    /// comparison. Levels without declared limits are unrestricted.
    pub fn within_limits(&self, coord: TileCoord) -> bool {
        match self.limits(coord.z) {
            Some(l) => {
                let row = -(coord.y as i64) - 1;
                let col = coord.x as i64;
                row >= l.min_tile_row as i64
                    && row <= l.max_tile_row as i64
                    && col >= l.min_tile_col as i64
                    && col <= l.max_tile_col as i64
            }
            None => true,
        }
    }
}

/// Standard Web Mercator (Google/OSM compatible) tile matrix set.
pub fn web_mercator_tile_matrix_set() -> TileMatrixSet {
    let max_extent = 20037508.342789244;

    let tile_matrices: Vec<TileMatrix> = (0..=22)
        .map(|z| {
            let n = 2u32.pow(z);
            let scale = 559082264.0287178 / (n as f64);

            TileMatrix {
                identifier: z.to_string(),
                scale_denominator: scale,
                top_left_corner: (-max_extent, max_extent),
                tile_width: 256,
                tile_height: 256,
                matrix_width: n,
                matrix_height: n,
            }
        })
        .collect();

    TileMatrixSet {
        identifier: "WebMercatorQuad".to_string(),
        crs: CrsCode::Epsg3857,
        bounding_box: Some(BoundingBox::new(
            -max_extent,
            -max_extent,
            max_extent,
            max_extent,
        )),
        well_known_scale_set: Some(
            "http://www.opengis.net/def/wkss/OGC/1.0/GoogleMapsCompatible".to_string(),
        ),
        tile_matrices,
    }
}

/// Standard WGS84 (geographic) tile matrix set with a 2:1 aspect ratio.
pub fn wgs84_tile_matrix_set() -> TileMatrixSet {
    let tile_matrices: Vec<TileMatrix> = (0..=22)
        .map(|z| {
            let n_cols = 2u32.pow(z + 1);
            let n_rows = 2u32.pow(z);
            let scale = 559082264.0287178 / (n_rows as f64);

            TileMatrix {
                identifier: z.to_string(),
                scale_denominator: scale,
                top_left_corner: (-180.0, 90.0),
                tile_width: 256,
                tile_height: 256,
                matrix_width: n_cols,
                matrix_height: n_rows,
            }
        })
        .collect();

    TileMatrixSet {
        identifier: "WorldCRS84Quad".to_string(),
        crs: CrsCode::Epsg4326,
        bounding_box: Some(BoundingBox::new(-180.0, -90.0, 180.0, 90.0)),
        well_known_scale_set: Some(
            "http://www.opengis.net/def/wkss/OGC/1.0/GoogleCRS84Quad".to_string(),
        ),
        tile_matrices,
    }
}
