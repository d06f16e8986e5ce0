//! Capabilities resolution.
//!
//! Turns a parsed capabilities document plus a small configuration request
//! into a fully specified tile-source configuration: URL templates, request
//! encoding, matrix set, style, format, projection, dimensions, extent and
//! tile-range limits.

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use wmts_common::{
    crs::CrsError, transform_extent, BoundingBox, CrsCode, TileMatrixLimits, TileMatrixSet,
    WmtsError, WmtsResult,
};

use crate::capabilities::{
    Capabilities, CapabilitiesLayer, Constraint, TileMatrixSetDef, TileMatrixSetLink,
};
use crate::template::RequestEncoding;

/// Configuration request for resolving one tile source.
///
/// Only the layer identifier is required; everything else is a hint the
/// resolver reconciles against what the document actually advertises.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceRequest {
    pub layer: String,

    #[serde(rename = "matrixSet", default)]
    pub matrix_set: Option<String>,

    #[serde(default)]
    pub projection: Option<String>,

    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    pub format: Option<String>,

    #[serde(rename = "requestEncoding", default)]
    pub request_encoding: Option<RequestEncoding>,

    #[serde(rename = "crossOrigin", default)]
    pub cross_origin: Option<String>,
}

impl SourceRequest {
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            ..Default::default()
        }
    }

    pub fn with_matrix_set(mut self, matrix_set: impl Into<String>) -> Self {
        self.matrix_set = Some(matrix_set.into());
        self
    }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_request_encoding(mut self, encoding: RequestEncoding) -> Self {
        self.request_encoding = Some(encoding);
        self
    }
}

/// A fully resolved tile-source configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// URL templates (KVP base URLs or REST path templates)
    pub urls: Vec<String>,

    /// Layer identifier
    pub layer: String,

    /// Selected tile matrix set identifier
    pub matrix_set: String,

    /// Tile image format
    pub format: String,

    /// Selected style identifier
    pub style: String,

    /// Resolved coordinate reference system
    pub projection: CrsCode,

    /// How GetTile requests are encoded
    pub request_encoding: RequestEncoding,

    /// Initial dimension values
    pub dimensions: BTreeMap<String, String>,

    /// The selected matrix set, converted to the domain type
    pub matrix_set_def: TileMatrixSet,

    /// Layer extent in the resolved projection, when declared and sane
    pub extent: Option<BoundingBox>,

    /// Tile-range limits declared for the selected matrix-set link
    pub limits: Option<Vec<TileMatrixLimits>>,

    /// Whether the layer wraps around the antimeridian
    pub wrap_x: bool,

    /// Cross-origin setting to hand to the tile loader
    pub cross_origin: Option<String>,
}

/// Resolve a tile-source configuration from a capabilities document.
///
/// Returns `Ok(None)` when the requested layer is not advertised; this is
/// an expected outcome the caller must handle, not an error. A document
/// that is structurally broken (dangling matrix-set reference, constraint
/// without allowed values, ...) is surfaced as an error instead of being
/// propagated into a half-usable configuration.
pub fn options_from_capabilities(
    doc: &Capabilities,
    request: &SourceRequest,
) -> WmtsResult<Option<SourceConfig>> {
    let Some(layer) = doc.find_layer(&request.layer) else {
        debug!(layer = %request.layer, "layer not present in capabilities");
        return Ok(None);
    };

    let links = &layer.tile_matrix_set_links;
    if links.is_empty() {
        return Err(WmtsError::NoMatrixSetLinks(layer.identifier.clone()));
    }

    let requested_projection = match request.projection.as_deref() {
        Some(code) => match CrsCode::from_code(code) {
            Ok(crs) => Some(crs),
            Err(err) => {
                warn!(%err, "ignoring unparseable projection hint");
                None
            }
        },
        None => None,
    };

    let link_index = if links.len() == 1 {
        0
    } else {
        select_link(doc, links, request, requested_projection)?
    };
    let link = &links[link_index];

    let format = match &request.format {
        Some(format) => format.clone(),
        None => layer
            .formats
            .first()
            .cloned()
            .ok_or_else(|| WmtsError::NoFormats(layer.identifier.clone()))?,
    };

    let style = select_style(layer, request)?;
    let dimensions = initial_dimensions(layer)?;

    let set_def = doc
        .find_matrix_set(&link.tile_matrix_set)
        .ok_or_else(|| WmtsError::MatrixSetNotFound(link.tile_matrix_set.clone()))?;
    let projection = resolve_projection(set_def, requested_projection)?;
    let (extent, wrap_x) = resolve_extent(layer, projection);

    let (request_encoding, urls, format) =
        negotiate_urls(doc, layer, request.request_encoding, format)?;

    Ok(Some(SourceConfig {
        urls,
        layer: layer.identifier.clone(),
        matrix_set: link.tile_matrix_set.clone(),
        format,
        style,
        projection,
        request_encoding,
        dimensions,
        matrix_set_def: set_def.to_matrix_set(projection),
        extent,
        limits: link.limits.clone(),
        wrap_x,
        cross_origin: request.cross_origin.clone(),
    }))
}

/// Pick among several matrix-set links: explicit identifier hint first,
/// then CRS equivalence with the projection hint, else the first link.
fn select_link(
    doc: &Capabilities,
    links: &[TileMatrixSetLink],
    request: &SourceRequest,
    requested_projection: Option<CrsCode>,
) -> WmtsResult<usize> {
    if let Some(wanted) = request.matrix_set.as_deref() {
        if let Some(index) = links.iter().position(|l| l.tile_matrix_set == wanted) {
            return Ok(index);
        }
    }

    if let Some(projection) = requested_projection {
        for (index, link) in links.iter().enumerate() {
            let set = doc
                .find_matrix_set(&link.tile_matrix_set)
                .ok_or_else(|| WmtsError::MatrixSetNotFound(link.tile_matrix_set.clone()))?;
            let crs = set
                .supported_crs
                .as_deref()
                .and_then(|code| CrsCode::from_code(code).ok());
            if crs == Some(projection) {
                return Ok(index);
            }
        }
    }

    debug!("no matrix-set link matched the configured hints; selecting the first");
    Ok(0)
}

/// Select a style: configured title match, else the default-flagged entry,
/// else the first one. The resolved value is the entry's identifier.
fn select_style(layer: &CapabilitiesLayer, request: &SourceRequest) -> WmtsResult<String> {
    if layer.styles.is_empty() {
        return Err(WmtsError::NoStyles(layer.identifier.clone()));
    }

    let index = match request.style.as_deref() {
        Some(title) => layer
            .styles
            .iter()
            .position(|s| s.title.as_deref() == Some(title)),
        None => layer.styles.iter().position(|s| s.is_default),
    };
    let index = index.unwrap_or_else(|| {
        debug!(layer = %layer.identifier, "no style matched; selecting the first declared one");
        0
    });

    Ok(layer.styles[index].identifier.clone())
}

/// Seed each declared dimension with its default, else the first allowed
/// value.
fn initial_dimensions(layer: &CapabilitiesLayer) -> WmtsResult<BTreeMap<String, String>> {
    let mut dimensions = BTreeMap::new();
    for entry in &layer.dimensions {
        let value = entry
            .default
            .clone()
            .or_else(|| entry.values.first().cloned())
            .ok_or_else(|| WmtsError::DimensionWithoutValues(entry.identifier.clone()))?;
        dimensions.insert(entry.identifier.clone(), value);
    }
    Ok(dimensions)
}

/// Derive the projection from the matrix set's declared CRS.
///
/// A configured projection is adopted only when it is equivalent to the
/// derived one, or when no projection could be derived at all. An
/// explicitly incompatible hint never overrides document truth.
fn resolve_projection(
    set_def: &TileMatrixSetDef,
    requested: Option<CrsCode>,
) -> WmtsResult<CrsCode> {
    let derived = set_def.supported_crs.as_deref().and_then(|code| {
        match CrsCode::from_code(code) {
            Ok(crs) => Some(crs),
            Err(err) => {
                warn!(%err, matrix_set = %set_def.identifier, "matrix set advertises an unknown CRS");
                None
            }
        }
    });

    match (derived, requested) {
        (Some(derived), Some(requested)) if derived == requested => Ok(requested),
        (Some(derived), Some(requested)) => {
            warn!(
                %derived,
                %requested,
                "configured projection is not equivalent to the matrix set's CRS; keeping the derived projection"
            );
            Ok(derived)
        }
        (Some(derived), None) => Ok(derived),
        (None, Some(requested)) => Ok(requested),
        (None, None) => Err(WmtsError::InvalidCrs(CrsError::UnsupportedCrs(
            set_def
                .supported_crs
                .clone()
                .unwrap_or_else(|| format!("none declared for '{}'", set_def.identifier)),
        ))),
    }
}

/// Transform the layer's geographic bounding box into the resolved
/// projection and derive the wrap-around flag.
///
/// The extent is discarded when it cannot be transformed or when the
/// transformed box escapes the projection's validity extent; a
/// geometrically impossible bound is worse than no bound.
fn resolve_extent(layer: &CapabilitiesLayer, projection: CrsCode) -> (Option<BoundingBox>, bool) {
    let Some(corners) = layer.wgs84_bounding_box else {
        return (None, false);
    };
    let wgs84 = BoundingBox::from_corners(corners);

    let full = CrsCode::Epsg4326.valid_extent();
    let wrap_x = wgs84.min_x == full.min_x && wgs84.max_x == full.max_x;

    let extent = match transform_extent(&wgs84, CrsCode::Epsg4326, projection) {
        Ok(transformed) => {
            if projection.valid_extent().contains_bbox(&transformed) {
                Some(transformed)
            } else {
                debug!(
                    layer = %layer.identifier,
                    "transformed layer extent exceeds the projection's validity extent; ignoring it"
                );
                None
            }
        }
        Err(err) => {
            warn!(%err, layer = %layer.identifier, "cannot transform the layer extent; ignoring it");
            None
        }
    };

    (extent, wrap_x)
}

/// Negotiate the request encoding and collect the URL templates.
///
/// Without a configured encoding, GetTile HTTP-GET bindings are scanned in
/// document order: the first encountered encoding wins, KVP-capable
/// bindings contribute their href while KVP is the chosen encoding, and an
/// unconstrained binding counts as KVP-only. When no binding yields a URL,
/// the layer's RESTful `resourceType == "tile"` templates are used and the
/// template's declared format replaces the previously chosen one.
fn negotiate_urls(
    doc: &Capabilities,
    layer: &CapabilitiesLayer,
    requested: Option<RequestEncoding>,
    base_format: String,
) -> WmtsResult<(RequestEncoding, Vec<String>, String)> {
    let bindings = doc.get_tile_bindings();
    let mut urls: Vec<String> = Vec::new();
    let mut format = base_format;
    let mut chosen = requested;

    if let Some(encoding) = requested {
        // Explicit choice: bindings filtered to match. REST URLs only ever
        // come from resource templates, so only KVP collects hrefs here.
        if encoding == RequestEncoding::Kvp {
            for get in bindings {
                match get.get_encoding_constraint() {
                    Some(constraint) => {
                        let allowed = allowed_values(constraint, &get.href)?;
                        if allowed.iter().any(|v| v == "KVP") {
                            urls.push(get.href.clone());
                        }
                    }
                    None => urls.push(get.href.clone()),
                }
            }
        }
    } else {
        for get in bindings {
            match get.get_encoding_constraint() {
                Some(constraint) => {
                    let allowed = allowed_values(constraint, &get.href)?;
                    if chosen.is_none() {
                        chosen = Some(if allowed[0] == "KVP" {
                            RequestEncoding::Kvp
                        } else {
                            RequestEncoding::Rest
                        });
                    }
                    match chosen {
                        Some(RequestEncoding::Kvp) => {
                            if allowed.iter().any(|v| v == "KVP") {
                                urls.push(get.href.clone());
                            }
                        }
                        _ => break,
                    }
                }
                None => {
                    chosen = Some(RequestEncoding::Kvp);
                    urls.push(get.href.clone());
                }
            }
        }
    }

    if urls.is_empty() {
        chosen = Some(RequestEncoding::Rest);
        for resource in &layer.resource_urls {
            if resource.resource_type == "tile" {
                format = resource.format.clone();
                urls.push(resource.template.clone());
            }
        }
    }

    if urls.is_empty() {
        return Err(WmtsError::NoTileUrls(layer.identifier.clone()));
    }

    Ok((chosen.unwrap_or(RequestEncoding::Rest), urls, format))
}

fn allowed_values<'a>(constraint: &'a Constraint, href: &str) -> WmtsResult<&'a [String]> {
    constraint
        .allowed_values
        .as_ref()
        .map(|av| av.values.as_slice())
        .filter(|values| !values.is_empty())
        .ok_or_else(|| WmtsError::ConstraintWithoutValues(href.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mercator_matrix_set(identifier: &str) -> serde_json::Value {
        json!({
            "Identifier": identifier,
            "SupportedCRS": "urn:ogc:def:crs:EPSG::3857",
            "TileMatrix": [{
                "Identifier": "0",
                "ScaleDenominator": 559082264.0287178,
                "TopLeftCorner": [-20037508.342789244, 20037508.342789244],
                "TileWidth": 256,
                "TileHeight": 256,
                "MatrixWidth": 1,
                "MatrixHeight": 1
            }]
        })
    }

    fn geographic_matrix_set(identifier: &str) -> serde_json::Value {
        json!({
            "Identifier": identifier,
            "SupportedCRS": "urn:ogc:def:crs:EPSG::4326",
            "TileMatrix": [{
                "Identifier": "0",
                "ScaleDenominator": 559082264.0287178,
                "TopLeftCorner": [-180.0, 90.0],
                "TileWidth": 256,
                "TileHeight": 256,
                "MatrixWidth": 2,
                "MatrixHeight": 1
            }]
        })
    }

    fn kvp_operations_metadata() -> serde_json::Value {
        json!({
            "GetTile": {
                "DCP": {
                    "HTTP": {
                        "Get": [{
                            "href": "http://host/wmts?",
                            "Constraint": [{
                                "name": "GetEncoding",
                                "AllowedValues": {"Value": ["KVP"]}
                            }]
                        }]
                    }
                }
            }
        })
    }

    fn single_layer_doc() -> Capabilities {
        Capabilities::from_value(json!({
            "OperationsMetadata": kvp_operations_metadata(),
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png", "image/jpeg"],
                    "Style": [
                        {"Identifier": "plain", "Title": "Plain"},
                        {"Identifier": "fancy", "Title": "Fancy", "isDefault": true}
                    ],
                    "TileMatrixSetLink": [{"TileMatrixSet": "WebMercator"}]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_unknown_layer_is_absence() {
        let doc = single_layer_doc();
        let resolved =
            options_from_capabilities(&doc, &SourceRequest::new("rivers")).unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_single_link_shortcut_ignores_hints() {
        let doc = single_layer_doc();
        let request = SourceRequest::new("roads")
            .with_matrix_set("SomethingElse")
            .with_projection("EPSG:4326");
        let config = options_from_capabilities(&doc, &request).unwrap().unwrap();

        assert_eq!(config.matrix_set, "WebMercator");
        // The incompatible projection hint is not honored either
        assert_eq!(config.projection, CrsCode::Epsg3857);
    }

    #[test]
    fn test_defaults_format_style_encoding() {
        let doc = single_layer_doc();
        let config = options_from_capabilities(&doc, &SourceRequest::new("roads"))
            .unwrap()
            .unwrap();

        assert_eq!(config.format, "image/png");
        assert_eq!(config.style, "fancy");
        assert_eq!(config.request_encoding, RequestEncoding::Kvp);
        assert_eq!(config.urls, vec!["http://host/wmts?"]);
    }

    #[test]
    fn test_style_matched_by_title() {
        let doc = single_layer_doc();
        let request = SourceRequest::new("roads").with_style("Plain");
        let config = options_from_capabilities(&doc, &request).unwrap().unwrap();
        assert_eq!(config.style, "plain");
    }

    #[test]
    fn test_unmatched_style_falls_back_to_first() {
        let doc = single_layer_doc();
        let request = SourceRequest::new("roads").with_style("Nonexistent");
        let config = options_from_capabilities(&doc, &request).unwrap().unwrap();
        assert_eq!(config.style, "plain");
    }

    fn two_link_doc() -> Capabilities {
        Capabilities::from_value(json!({
            "OperationsMetadata": kvp_operations_metadata(),
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [
                        {"TileMatrixSet": "Geographic"},
                        {"TileMatrixSet": "WebMercator"}
                    ]
                }],
                "TileMatrixSet": [
                    geographic_matrix_set("Geographic"),
                    mercator_matrix_set("WebMercator")
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_link_selected_by_matrix_set_hint() {
        let doc = two_link_doc();
        let request = SourceRequest::new("roads").with_matrix_set("WebMercator");
        let config = options_from_capabilities(&doc, &request).unwrap().unwrap();
        assert_eq!(config.matrix_set, "WebMercator");
    }

    #[test]
    fn test_link_selected_by_projection_equivalence() {
        let doc = two_link_doc();
        let request = SourceRequest::new("roads").with_projection("EPSG:3857");
        let config = options_from_capabilities(&doc, &request).unwrap().unwrap();
        assert_eq!(config.matrix_set, "WebMercator");
        assert_eq!(config.projection, CrsCode::Epsg3857);
    }

    #[test]
    fn test_unmatched_hints_fall_back_to_first_link() {
        let doc = two_link_doc();
        let request = SourceRequest::new("roads").with_matrix_set("Nonexistent");
        let config = options_from_capabilities(&doc, &request).unwrap().unwrap();
        assert_eq!(config.matrix_set, "Geographic");
    }

    #[test]
    fn test_dangling_matrix_set_reference_is_fatal() {
        let doc = Capabilities::from_value(json!({
            "OperationsMetadata": kvp_operations_metadata(),
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [{"TileMatrixSet": "Missing"}]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap();

        let err = options_from_capabilities(&doc, &SourceRequest::new("roads")).unwrap_err();
        assert!(matches!(err, WmtsError::MatrixSetNotFound(set) if set == "Missing"));
    }

    #[test]
    fn test_dimension_defaults() {
        let doc = Capabilities::from_value(json!({
            "OperationsMetadata": kvp_operations_metadata(),
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [{"TileMatrixSet": "WebMercator"}],
                    "Dimension": [
                        {"Identifier": "Time", "Default": "2024-01-15", "Value": ["2024-01-14", "2024-01-15"]},
                        {"Identifier": "Elevation", "Value": ["0", "100"]}
                    ]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap();

        let config = options_from_capabilities(&doc, &SourceRequest::new("roads"))
            .unwrap()
            .unwrap();
        assert_eq!(config.dimensions.get("Time").map(String::as_str), Some("2024-01-15"));
        // No default declared: first allowed value
        assert_eq!(config.dimensions.get("Elevation").map(String::as_str), Some("0"));
    }

    #[test]
    fn test_dimension_without_values_is_fatal() {
        let doc = Capabilities::from_value(json!({
            "OperationsMetadata": kvp_operations_metadata(),
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [{"TileMatrixSet": "WebMercator"}],
                    "Dimension": [{"Identifier": "Time"}]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap();

        let err = options_from_capabilities(&doc, &SourceRequest::new("roads")).unwrap_err();
        assert!(matches!(err, WmtsError::DimensionWithoutValues(dim) if dim == "Time"));
    }

    #[test]
    fn test_extent_and_wrap_for_full_world_layer() {
        let doc = Capabilities::from_value(json!({
            "OperationsMetadata": kvp_operations_metadata(),
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [{"TileMatrixSet": "WebMercator"}],
                    "WGS84BoundingBox": [-180.0, -85.0, 180.0, 85.0]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap();

        let config = options_from_capabilities(&doc, &SourceRequest::new("roads"))
            .unwrap()
            .unwrap();
        // Horizontal bounds coincide with the full EPSG:4326 extent
        assert!(config.wrap_x);
        let extent = config.extent.expect("extent survives the sanity check");
        assert!(CrsCode::Epsg3857.valid_extent().contains_bbox(&extent));
    }

    #[test]
    fn test_partial_extent_does_not_wrap() {
        let doc = Capabilities::from_value(json!({
            "OperationsMetadata": kvp_operations_metadata(),
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [{"TileMatrixSet": "WebMercator"}],
                    "WGS84BoundingBox": [-10.0, -10.0, 10.0, 10.0]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap();

        let config = options_from_capabilities(&doc, &SourceRequest::new("roads"))
            .unwrap()
            .unwrap();
        assert!(!config.wrap_x);
        assert!(config.extent.is_some());
    }

    #[test]
    fn test_rest_fallback_adopts_template_format() {
        let doc = Capabilities::from_value(json!({
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [{"TileMatrixSet": "WebMercator"}],
                    "ResourceURL": [
                        {
                            "format": "image/jpeg",
                            "resourceType": "tile",
                            "template": "http://host/{TileMatrix}/{TileRow}/{TileCol}.jpg"
                        },
                        {
                            "format": "application/xml",
                            "resourceType": "FeatureInfo",
                            "template": "http://host/info/{TileMatrix}/{TileRow}/{TileCol}.xml"
                        }
                    ]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap();

        let config = options_from_capabilities(&doc, &SourceRequest::new("roads"))
            .unwrap()
            .unwrap();
        assert_eq!(config.request_encoding, RequestEncoding::Rest);
        assert_eq!(config.urls.len(), 1);
        // The tile template's format overrides the layer's advertised one
        assert_eq!(config.format, "image/jpeg");
    }

    #[test]
    fn test_rest_binding_stops_scan_and_falls_back_to_templates() {
        let doc = Capabilities::from_value(json!({
            "OperationsMetadata": {
                "GetTile": {
                    "DCP": {
                        "HTTP": {
                            "Get": [
                                {
                                    "href": "http://host/wmts/rest/",
                                    "Constraint": [{
                                        "name": "GetEncoding",
                                        "AllowedValues": {"Value": ["RESTful"]}
                                    }]
                                },
                                {
                                    "href": "http://host/wmts?",
                                    "Constraint": [{
                                        "name": "GetEncoding",
                                        "AllowedValues": {"Value": ["KVP"]}
                                    }]
                                }
                            ]
                        }
                    }
                }
            },
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [{"TileMatrixSet": "WebMercator"}],
                    "ResourceURL": [{
                        "format": "image/png",
                        "resourceType": "tile",
                        "template": "http://host/rest/{TileMatrix}/{TileRow}/{TileCol}.png"
                    }]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap();

        let config = options_from_capabilities(&doc, &SourceRequest::new("roads"))
            .unwrap()
            .unwrap();
        // The first binding chose a non-KVP encoding, so the KVP binding
        // after it is never reached and templates supply the URL.
        assert_eq!(config.request_encoding, RequestEncoding::Rest);
        assert_eq!(
            config.urls,
            vec!["http://host/rest/{TileMatrix}/{TileRow}/{TileCol}.png"]
        );
    }

    #[test]
    fn test_unconstrained_binding_is_kvp() {
        let doc = Capabilities::from_value(json!({
            "OperationsMetadata": {
                "GetTile": {
                    "DCP": {"HTTP": {"Get": [{"href": "http://host/wmts?"}]}}
                }
            },
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [{"TileMatrixSet": "WebMercator"}]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap();

        let config = options_from_capabilities(&doc, &SourceRequest::new("roads"))
            .unwrap()
            .unwrap();
        assert_eq!(config.request_encoding, RequestEncoding::Kvp);
        assert_eq!(config.urls, vec!["http://host/wmts?"]);
    }

    #[test]
    fn test_constraint_without_values_is_fatal() {
        let doc = Capabilities::from_value(json!({
            "OperationsMetadata": {
                "GetTile": {
                    "DCP": {
                        "HTTP": {
                            "Get": [{
                                "href": "http://host/wmts?",
                                "Constraint": [{"name": "GetEncoding"}]
                            }]
                        }
                    }
                }
            },
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [{"TileMatrixSet": "WebMercator"}]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap();

        let err = options_from_capabilities(&doc, &SourceRequest::new("roads")).unwrap_err();
        assert!(matches!(err, WmtsError::ConstraintWithoutValues(_)));
    }

    #[test]
    fn test_no_urls_anywhere_is_fatal() {
        let doc = Capabilities::from_value(json!({
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [{"TileMatrixSet": "WebMercator"}]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap();

        let err = options_from_capabilities(&doc, &SourceRequest::new("roads")).unwrap_err();
        assert!(matches!(err, WmtsError::NoTileUrls(layer) if layer == "roads"));
    }

    #[test]
    fn test_explicit_kvp_filters_bindings() {
        let doc = Capabilities::from_value(json!({
            "OperationsMetadata": {
                "GetTile": {
                    "DCP": {
                        "HTTP": {
                            "Get": [
                                {
                                    "href": "http://host/wmts/rest/",
                                    "Constraint": [{
                                        "name": "GetEncoding",
                                        "AllowedValues": {"Value": ["RESTful"]}
                                    }]
                                },
                                {
                                    "href": "http://host/wmts?",
                                    "Constraint": [{
                                        "name": "GetEncoding",
                                        "AllowedValues": {"Value": ["KVP"]}
                                    }]
                                }
                            ]
                        }
                    }
                }
            },
            "Contents": {
                "Layer": [{
                    "Identifier": "roads",
                    "Format": ["image/png"],
                    "Style": [{"Identifier": "default", "isDefault": true}],
                    "TileMatrixSetLink": [{"TileMatrixSet": "WebMercator"}]
                }],
                "TileMatrixSet": [mercator_matrix_set("WebMercator")]
            }
        }))
        .unwrap();

        let request = SourceRequest::new("roads").with_request_encoding(RequestEncoding::Kvp);
        let config = options_from_capabilities(&doc, &request).unwrap().unwrap();
        assert_eq!(config.request_encoding, RequestEncoding::Kvp);
        assert_eq!(config.urls, vec!["http://host/wmts?"]);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let doc = two_link_doc();
        let request = SourceRequest::new("roads").with_projection("EPSG:3857");

        let first = options_from_capabilities(&doc, &request).unwrap().unwrap();
        let second = options_from_capabilities(&doc, &request).unwrap().unwrap();
        assert_eq!(first, second);
    }
}
