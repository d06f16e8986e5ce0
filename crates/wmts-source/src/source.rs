//! The WMTS tile source: compiled templates, tile grid and dimensions
//! composed into one addressing capability.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use wmts_common::{CrsCode, TileCoord, TileGrid, WmtsResult};

use crate::dimensions::DimensionSet;
use crate::resolver::{options_from_capabilities, SourceConfig, SourceRequest};
use crate::template::{CompiledTemplate, RequestEncoding, TemplateContext};
use crate::Capabilities;

/// Protocol version spoken by this client.
pub const WMTS_VERSION: &str = "1.0.0";

/// The capability a tile source offers to the outside: produce an
/// addressing function and a dimensions-derived cache key.
pub trait TileAddressing {
    /// Resolve one internal tile coordinate to a request URL.
    ///
    /// An absent coordinate, or a zoom level the grid does not cover,
    /// yields `None`: do not issue a request for that tile. The pixel
    /// ratio and projection are part of the addressing contract shared
    /// with other source kinds; WMTS addressing does not vary over them.
    fn tile_url(
        &self,
        coord: Option<TileCoord>,
        pixel_ratio: f64,
        projection: CrsCode,
    ) -> Option<String>;

    /// The cache-partitioning key for the current dimension values.
    fn key(&self) -> &str;
}

/// A configured WMTS tile source.
///
/// Everything except the dimension mapping is immutable after
/// construction; the compiled addressing path reads only closed-over
/// state plus the caller-supplied coordinate and a dimensions snapshot,
/// so it is safe to call from many in-flight tile loads at once.
#[derive(Debug)]
pub struct WmtsSource {
    layer: String,
    style: String,
    format: String,
    matrix_set: String,
    request_encoding: RequestEncoding,
    urls: Vec<String>,
    cross_origin: Option<String>,
    wrap_x: bool,
    static_context: TemplateContext,
    templates: Vec<CompiledTemplate>,
    tile_grid: TileGrid,
    dimensions: DimensionSet,
}

impl WmtsSource {
    /// Build a source from a resolved configuration.
    pub fn new(config: SourceConfig) -> WmtsResult<Self> {
        let tile_grid =
            TileGrid::from_matrix_set(config.matrix_set_def, config.extent, config.limits)?;

        let static_context = build_static_context(
            &config.layer,
            &config.style,
            &config.matrix_set,
            &config.format,
            config.request_encoding,
        );
        let templates = compile_templates(&config.urls, config.request_encoding, &static_context);

        debug!(
            layer = %config.layer,
            matrix_set = %config.matrix_set,
            encoding = %config.request_encoding,
            templates = templates.len(),
            "configured WMTS source"
        );

        Ok(Self {
            layer: config.layer,
            style: config.style,
            format: config.format,
            matrix_set: config.matrix_set,
            request_encoding: config.request_encoding,
            urls: config.urls,
            cross_origin: config.cross_origin,
            wrap_x: config.wrap_x,
            static_context,
            templates,
            tile_grid,
            dimensions: DimensionSet::new(config.dimensions),
        })
    }

    /// Resolve a configuration from a capabilities document and build the
    /// source in one step. `Ok(None)` when the layer is not advertised.
    pub fn from_capabilities(
        doc: &Capabilities,
        request: &SourceRequest,
    ) -> WmtsResult<Option<Self>> {
        match options_from_capabilities(doc, request)? {
            Some(config) => Ok(Some(Self::new(config)?)),
            None => Ok(None),
        }
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn matrix_set(&self) -> &str {
        &self.matrix_set
    }

    pub fn request_encoding(&self) -> RequestEncoding {
        self.request_encoding
    }

    pub fn version(&self) -> &str {
        WMTS_VERSION
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn tile_grid(&self) -> &TileGrid {
        &self.tile_grid
    }

    pub fn cross_origin(&self) -> Option<&str> {
        self.cross_origin.as_deref()
    }

    pub fn wrap_x(&self) -> bool {
        self.wrap_x
    }

    /// A snapshot of the current dimension values.
    pub fn dimensions(&self) -> Arc<BTreeMap<String, String>> {
        self.dimensions.snapshot()
    }

    /// Merge new dimension values into the source.
    ///
    /// The dimensions-derived key is recomputed before this returns, so a
    /// caller reading [`TileAddressing::key`] afterwards always observes a
    /// key consistent with the mapping it was derived from.
    pub fn update_dimensions(&mut self, patch: BTreeMap<String, String>) {
        self.dimensions.update(patch);
        debug!(key = %self.dimensions.key(), "dimensions updated");
    }

    /// Replace the URL templates, recompiling against the same static
    /// context.
    pub fn set_urls(&mut self, urls: Vec<String>) {
        self.templates = compile_templates(&urls, self.request_encoding, &self.static_context);
        self.urls = urls;
    }

    /// Cache key for one tile under the current dimension values.
    pub fn tile_cache_key(&self, coord: TileCoord) -> String {
        format!("{}/{}", self.dimensions.key(), coord.cache_key())
    }

    /// Report template placeholders that no context will ever fill.
    ///
    /// Anything listed here stays verbatim in every produced URL, which
    /// almost always means a misconfigured template upstream.
    pub fn validate_templates(&self) -> Vec<String> {
        let snapshot = self.dimensions.snapshot();
        let mut keys: Vec<&str> = vec!["TileMatrix", "TileCol", "TileRow"];
        keys.extend(snapshot.keys().map(String::as_str));

        let mut report: Vec<String> = self
            .templates
            .iter()
            .flat_map(|t| t.unresolved_placeholders(&keys))
            .collect();
        report.sort();
        report.dedup();
        report
    }

    /// Deterministic template choice so a tile coordinate always maps to
    /// the same URL, keeping HTTP caches coherent across repeat requests.
    fn template_index(&self, coord: TileCoord) -> usize {
        let hash = (coord.x as i64).wrapping_shl(coord.z) + coord.y as i64;
        hash.rem_euclid(self.templates.len() as i64) as usize
    }
}

impl TileAddressing for WmtsSource {
    fn tile_url(
        &self,
        coord: Option<TileCoord>,
        _pixel_ratio: f64,
        _projection: CrsCode,
    ) -> Option<String> {
        let coord = coord?;
        if self.templates.is_empty() {
            return None;
        }
        let matrix_id = self.tile_grid.matrix_id(coord.z)?;

        // Fresh dynamic context per call. The protocol row counts from the
        // bottom of the matrix, so the internal row is inverted here and
        // only here.
        let mut context = TemplateContext::new();
        context.insert("TileMatrix".to_string(), matrix_id.to_string());
        context.insert("TileCol".to_string(), coord.x.to_string());
        context.insert("TileRow".to_string(), (-(coord.y as i64) - 1).to_string());
        for (name, value) in self.dimensions.snapshot().iter() {
            context.insert(name.clone(), value.clone());
        }

        let template = &self.templates[self.template_index(coord)];
        Some(template.url(&context))
    }

    fn key(&self) -> &str {
        self.dimensions.key()
    }
}

/// The immutable per-source placeholder context.
///
/// KVP additionally fixes the protocol parameters the query string must
/// always carry.
fn build_static_context(
    layer: &str,
    style: &str,
    matrix_set: &str,
    format: &str,
    encoding: RequestEncoding,
) -> TemplateContext {
    let mut context = TemplateContext::new();
    context.insert("layer".to_string(), layer.to_string());
    context.insert("style".to_string(), style.to_string());
    context.insert("tilematrixset".to_string(), matrix_set.to_string());

    if encoding == RequestEncoding::Kvp {
        context.insert("Service".to_string(), "WMTS".to_string());
        context.insert("Request".to_string(), "GetTile".to_string());
        context.insert("Version".to_string(), WMTS_VERSION.to_string());
        context.insert("Format".to_string(), format.to_string());
    }

    context
}

fn compile_templates(
    urls: &[String],
    encoding: RequestEncoding,
    static_context: &TemplateContext,
) -> Vec<CompiledTemplate> {
    urls.iter()
        .map(|url| CompiledTemplate::compile(url, encoding, static_context))
        .collect()
}
