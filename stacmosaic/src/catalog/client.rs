//! Paged catalog search.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::stac::{CollectionDocument, Item, ItemAsset, ItemCollection};
use super::{
    Asset, CatalogConfig, CatalogError, HttpClient, HttpError, ReqwestClient, Scene, SceneSet,
    SearchRequest, UNKNOWN,
};
use crate::config::CollectionConfig;
use crate::executor::ProgressSink;
use crate::geo::{BoundingBox, Geometry};
use crate::vrt::{RasterInfo, RasterInspector};

/// Item properties that may carry an orbit or tile identifier, in order of
/// preference.
const ORBIT_PROPERTIES: [&str; 3] = ["sat:relative_orbit", "sat:absolute_orbit", "bdc:tile"];

/// Band resolutions declared by a collection, keyed by band name and common
/// name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandResolutions {
    by_band: HashMap<String, f64>,
}

impl BandResolutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, band: impl Into<String>, resolution: f64) {
        self.by_band.insert(band.into(), resolution);
    }

    pub fn get(&self, band: &str) -> Option<f64> {
        self.by_band.get(band).copied()
    }

    pub fn len(&self) -> usize {
        self.by_band.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_band.is_empty()
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number.
    pub index: usize,
    /// Expected number of pages, when the server reports a match count.
    pub total: Option<usize>,
    pub matched: Option<u64>,
    pub scenes: Vec<Scene>,
}

/// How a search ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchStatus {
    /// Every page was fetched and at least one scene was found.
    Complete,
    /// Every page was fetched and the catalog had no scenes.
    NoScenesFound,
    /// Page `page` timed out on every attempt.
    TimedOut { page: usize, attempts: u32 },
    Cancelled,
    /// A non-timeout error ended the search.
    Failed(CatalogError),
}

/// Scenes gathered by a search and how it ended.
///
/// On every status other than `Complete`, `scenes` holds what was collected
/// before the search stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub scenes: SceneSet,
    pub status: SearchStatus,
    /// Pages fetched successfully.
    pub pages: usize,
}

#[derive(Debug, Clone)]
struct PageRequest {
    url: String,
    query: Vec<(&'static str, String)>,
}

/// Lazy iterator over result pages.
///
/// A page that fails is not consumed: calling `next()` again re-sends the
/// same request. A `next` link to an already fetched page ends the walk.
pub struct Pages<'a, C> {
    client: &'a CatalogClient<C>,
    collection: &'a CollectionConfig,
    bands: BandResolutions,
    pending: Option<PageRequest>,
    visited: HashSet<String>,
    fetched: usize,
    total: Option<usize>,
}

impl<'a, C: HttpClient> Pages<'a, C> {
    /// Uses collection band metadata to fill in asset resolutions.
    pub fn with_bands(mut self, bands: BandResolutions) -> Self {
        self.bands = bands;
        self
    }

    /// Pages fetched so far.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Expected number of pages, once known.
    pub fn total(&self) -> Option<usize> {
        self.total
    }
}

impl<'a, C: HttpClient> Iterator for Pages<'a, C> {
    type Item = Result<Page, CatalogError>;

    fn next(&mut self) -> Option<Self::Item> {
        let request = self.pending.clone()?;

        let body = match self.client.http.get(&request.url, &request.query) {
            Ok(body) => body,
            Err(e) => return Some(Err(e.into())),
        };
        let results: ItemCollection = match serde_json::from_slice(&body) {
            Ok(results) => results,
            Err(e) => {
                return Some(Err(CatalogError::InvalidResponse {
                    url: request.url,
                    reason: e.to_string(),
                }))
            }
        };

        self.fetched += 1;
        let matched = results.matched();
        if self.total.is_none() {
            self.total = matched.map(|m| page_count(m, self.client.config.page_limit));
        }

        // An empty page or a link back to a fetched page ends the walk
        self.visited.insert(request.url);
        self.pending = results
            .next_href()
            .filter(|_| !results.features.is_empty())
            .filter(|href| {
                let seen = self.visited.contains(*href);
                if seen {
                    warn!(href = %href, "Next link points to a fetched page, stopping");
                }
                !seen
            })
            .map(|href| PageRequest {
                url: href.to_string(),
                query: Vec::new(),
            });

        let scenes = results
            .features
            .into_iter()
            .filter_map(|item| {
                let id = item.id.clone();
                match to_scene(
                    item,
                    self.collection,
                    &self.bands,
                    self.client.inspector.as_deref(),
                ) {
                    Ok(scene) => Some(scene),
                    Err(reason) => {
                        warn!(item = %id, reason = %reason, "Skipping catalog item");
                        None
                    }
                }
            })
            .collect();

        Some(Ok(Page {
            index: self.fetched,
            total: self.total,
            matched,
            scenes,
        }))
    }
}

fn page_count(matched: u64, limit: usize) -> usize {
    matched.div_ceil(limit.max(1) as u64).max(1) as usize
}

/// Client for a STAC API search endpoint.
pub struct CatalogClient<C> {
    http: C,
    config: CatalogConfig,
    inspector: Option<Arc<dyn RasterInspector>>,
}

impl CatalogClient<ReqwestClient> {
    /// Creates a client backed by reqwest with the configured timeout.
    pub fn from_config(config: CatalogConfig) -> Result<Self, HttpError> {
        let http = ReqwestClient::new(config.timeout, config.verify_ssl)?;
        Ok(Self::new(http, config))
    }
}

impl<C: HttpClient> CatalogClient<C> {
    pub fn new(http: C, config: CatalogConfig) -> Self {
        Self {
            http,
            config,
            inspector: None,
        }
    }

    /// Reads CRS, resolution and footprint from the rasters when the catalog
    /// does not provide them.
    pub fn with_inspector(mut self, inspector: impl RasterInspector + 'static) -> Self {
        self.inspector = Some(Arc::new(inspector));
        self
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Reads per-band resolutions from the collection document.
    pub fn band_resolutions(&self, collection: &str) -> Result<BandResolutions, CatalogError> {
        let url = self.config.collection_url(collection);
        let body = self.http.get(&url, &[])?;
        let document: CollectionDocument =
            serde_json::from_slice(&body).map_err(|e| CatalogError::InvalidResponse {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let mut bands = BandResolutions::new();
        for band in document.bands() {
            if let Some(resolution) = band.resolution_x {
                if let Some(common) = band.common_name {
                    bands.insert(common, resolution);
                }
                bands.insert(band.name, resolution);
            }
        }
        Ok(bands)
    }

    /// Returns a lazy iterator over the result pages of `request`.
    pub fn pages<'a>(
        &'a self,
        request: &SearchRequest,
        collection: &'a CollectionConfig,
    ) -> Pages<'a, C> {
        let query = vec![
            ("collections", collection.id.clone()),
            ("limit", self.config.page_limit.to_string()),
            ("bbox", request.bbox().to_query()),
            ("datetime", request.datetime_range()),
        ];
        Pages {
            client: self,
            collection,
            bands: BandResolutions::new(),
            pending: Some(PageRequest {
                url: self.config.search_url(),
                query,
            }),
            visited: HashSet::new(),
            fetched: 0,
            total: None,
        }
    }

    /// Fetches every page of `request`.
    ///
    /// Timed-out pages are retried according to the configured retry policy.
    /// The cancellation token is checked before each request.
    pub fn search(
        &self,
        request: &SearchRequest,
        collection: &CollectionConfig,
        cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> SearchOutcome {
        let mut scenes = SceneSet::new();
        if cancel.is_cancelled() {
            return SearchOutcome {
                scenes,
                status: SearchStatus::Cancelled,
                pages: 0,
            };
        }

        info!(
            collection = %collection.id,
            bbox = %request.bbox().to_query(),
            datetime = %request.datetime_range(),
            "Searching catalog"
        );

        let bands = match self.band_resolutions(&collection.id) {
            Ok(bands) => bands,
            Err(e) => {
                debug!(error = %e, "Collection band metadata unavailable");
                BandResolutions::new()
            }
        };

        let mut pages = self.pages(request, collection).with_bands(bands);
        let mut attempt: u32 = 1;

        loop {
            if cancel.is_cancelled() {
                info!(
                    pages = pages.fetched(),
                    scenes = scenes.len(),
                    "Catalog search cancelled"
                );
                return SearchOutcome {
                    scenes,
                    status: SearchStatus::Cancelled,
                    pages: pages.fetched(),
                };
            }

            match pages.next() {
                None => break,
                Some(Ok(page)) => {
                    attempt = 1;
                    let added = scenes.extend(page.scenes);
                    debug!(
                        page = page.index,
                        total = ?page.total,
                        added,
                        "Received catalog page"
                    );
                    progress.page_progress(page.index, page.total, scenes.len());
                }
                Some(Err(e)) if e.is_timeout() => {
                    let page = pages.fetched() + 1;
                    match self.config.retry.delay_for_attempt(attempt) {
                        Some(delay) => {
                            warn!(page, attempt, "Catalog request timed out, retrying");
                            attempt += 1;
                            if !delay.is_zero() {
                                thread::sleep(delay);
                            }
                        }
                        None => {
                            warn!(page, attempts = attempt, "Catalog request timed out");
                            return SearchOutcome {
                                scenes,
                                status: SearchStatus::TimedOut {
                                    page,
                                    attempts: attempt,
                                },
                                pages: pages.fetched(),
                            };
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Catalog request failed");
                    return SearchOutcome {
                        scenes,
                        status: SearchStatus::Failed(e),
                        pages: pages.fetched(),
                    };
                }
            }
        }

        info!(
            pages = pages.fetched(),
            scenes = scenes.len(),
            "Catalog search complete"
        );
        let status = if scenes.is_empty() {
            SearchStatus::NoScenesFound
        } else {
            SearchStatus::Complete
        };
        SearchOutcome {
            scenes,
            status,
            pages: pages.fetched(),
        }
    }
}

fn to_scene(
    item: Item,
    collection: &CollectionConfig,
    bands: &BandResolutions,
    inspector: Option<&dyn RasterInspector>,
) -> Result<Scene, String> {
    let date = item_date(&item.properties).ok_or("missing or invalid datetime")?;
    let declared = item_footprint(&item);
    let item_gsd = item.properties.get("gsd").and_then(Value::as_f64);
    let orbit = collection
        .orbit_from_id(&item.id)
        .or_else(|| {
            ORBIT_PROPERTIES
                .iter()
                .find_map(|key| item.properties.get(*key).and_then(value_text))
        })
        .unwrap_or_else(|| UNKNOWN.to_string());
    let mut crs = item_crs(&item.properties);

    let mut assets = Vec::new();
    for (key, value) in item.assets {
        let Ok(asset) = serde_json::from_value::<ItemAsset>(value) else {
            continue;
        };
        if !asset.is_raster() {
            continue;
        }
        if crs.is_none() {
            crs = asset
                .epsg
                .map(|code| format!("EPSG:{}", code))
                .or(asset.proj_code);
        }
        let resolution = asset.gsd.or_else(|| bands.get(&key)).or(item_gsd);
        assets.push(Asset {
            key,
            href: asset.href,
            resolution,
        });
    }

    let mut resolution = assets
        .iter()
        .filter_map(|a| a.resolution)
        .reduce(f64::min)
        .or(item_gsd);

    // Item geometry is trusted unless the collection says otherwise
    let mut footprint = declared
        .as_ref()
        .ok()
        .filter(|_| collection.exists_geom)
        .cloned();
    if footprint.is_none() || crs.is_none() || resolution.is_none() {
        let info = inspect_first(&item.id, &assets, inspector);
        crs = crs.or(info.crs);
        resolution = resolution.or(info.resolution);
        footprint = footprint.or(info.footprint);
    }
    let footprint = match footprint {
        Some(footprint) => footprint,
        None => declared?,
    };

    Ok(Scene {
        id: item.id,
        date,
        orbit,
        crs: crs.unwrap_or_else(|| UNKNOWN.to_string()),
        footprint,
        assets,
        resolution,
    })
}

/// Georeferencing of the first raster asset; empty when unavailable.
fn inspect_first(
    item_id: &str,
    assets: &[Asset],
    inspector: Option<&dyn RasterInspector>,
) -> RasterInfo {
    let (Some(inspector), Some(asset)) = (inspector, assets.first()) else {
        return RasterInfo::default();
    };
    inspector.inspect(&asset.href).unwrap_or_else(|e| {
        warn!(item = %item_id, error = %e, "Could not inspect raster");
        RasterInfo::default()
    })
}

fn item_date(properties: &Map<String, Value>) -> Option<NaiveDate> {
    let text = properties
        .get("datetime")
        .and_then(Value::as_str)
        .or_else(|| properties.get("start_datetime").and_then(Value::as_str))?;
    NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok()
}

fn item_crs(properties: &Map<String, Value>) -> Option<String> {
    properties
        .get("proj:epsg")
        .and_then(Value::as_i64)
        .map(|code| format!("EPSG:{}", code))
        .or_else(|| {
            properties
                .get("proj:code")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
}

fn item_footprint(item: &Item) -> Result<Geometry, String> {
    if let Some(geometry) = item.geometry.as_ref().filter(|g| !g.is_null()) {
        if let Ok(geometry) = Geometry::from_geojson(geometry) {
            return Ok(geometry);
        }
    }
    let bbox = match item.bbox.as_deref() {
        Some([x0, y0, x1, y1]) => BoundingBox::new(*x0, *y0, *x1, *y1),
        Some([x0, y0, _, x1, y1, _]) => BoundingBox::new(*x0, *y0, *x1, *y1),
        _ => return Err("no usable geometry or bbox".to_string()),
    };
    bbox.map(Geometry::from).map_err(|e| e.to_string())
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MockHttpClient;
    use crate::executor::{RetryPolicy, TaskEvent};
    use serde_json::json;
    use std::time::Duration;

    const COG: &str = "image/tiff; application=geotiff; profile=cloud-optimized";

    fn item(id: &str, date: &str, x: f64) -> Value {
        json!({
            "id": id,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[x, 0.0], [x + 1.0, 0.0], [x + 1.0, 1.0], [x, 1.0], [x, 0.0]]]
            },
            "properties": {"datetime": format!("{}T13:20:00Z", date), "proj:epsg": 32723},
            "assets": {
                "B1": {"href": format!("https://x/{}/B1.tif", id), "type": COG, "gsd": 10.0},
                "thumbnail": {"href": "t.png", "type": "image/png", "roles": ["thumbnail"]}
            }
        })
    }

    fn page(items: Vec<Value>, next: Option<&str>, matched: u64) -> Value {
        let links = match next {
            Some(href) => json!([{"rel": "next", "href": href}]),
            None => json!([]),
        };
        json!({"type": "FeatureCollection", "features": items, "links": links, "context": {"matched": matched}})
    }

    fn timeout() -> Result<Vec<u8>, HttpError> {
        Err(HttpError::Timeout {
            url: "https://x/search".to_string(),
        })
    }

    fn no_bands() -> Result<Vec<u8>, HttpError> {
        Err(HttpError::Status {
            url: "https://x/collections/C".to_string(),
            code: 404,
            body: String::new(),
        })
    }

    fn request() -> SearchRequest {
        let area = BoundingBox::new(-1.0, -1.0, 10.0, 10.0).unwrap().into();
        let day = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        SearchRequest::new("C", day("2024-01-01"), day("2024-01-31"), area).unwrap()
    }

    fn client(mock: MockHttpClient) -> CatalogClient<MockHttpClient> {
        let config = CatalogConfig::new("https://x")
            .with_page_limit(2)
            .with_retry_policy(RetryPolicy::fixed(2, Duration::ZERO));
        CatalogClient::new(mock, config)
    }

    #[test]
    fn test_first_page_query() {
        let client = client(MockHttpClient::new().respond_json(page(vec![], None, 0)));
        let collection = CollectionConfig::new("C");
        let pages: Vec<_> = client.pages(&request(), &collection).collect();
        assert_eq!(pages.len(), 1);

        let requests = client.http.requests.lock();
        let (url, query) = &requests[0];
        assert_eq!(url, "https://x/search");
        assert_eq!(
            query,
            &vec![
                ("collections".to_string(), "C".to_string()),
                ("limit".to_string(), "2".to_string()),
                ("bbox".to_string(), "-1,-1,10,10".to_string()),
                (
                    "datetime".to_string(),
                    "2024-01-01T00:00:00Z/2024-01-31T23:59:59Z".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_pages_follow_next_link() {
        let mock = MockHttpClient::new()
            .respond_json(page(
                vec![item("a", "2024-01-02", 0.0), item("b", "2024-01-02", 1.0)],
                Some("https://x/search?page=2"),
                3,
            ))
            .respond_json(page(vec![item("c", "2024-01-03", 2.0)], None, 3));
        let client = client(mock);
        let collection = CollectionConfig::new("C");

        let pages: Vec<Page> = client
            .pages(&request(), &collection)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].total, Some(2));
        assert_eq!(pages[1].index, 2);
        assert_eq!(pages[1].scenes[0].id, "c");
        assert_eq!(client.http.requests.lock()[1].0, "https://x/search?page=2");
    }

    #[test]
    fn test_cyclic_next_links_end_the_walk() {
        let mock = MockHttpClient::new()
            .respond_json(page(
                vec![item("a", "2024-01-02", 0.0)],
                Some("https://x/search?page=2"),
                10,
            ))
            .respond_json(page(
                vec![item("b", "2024-01-02", 1.0)],
                Some("https://x/search?page=3"),
                10,
            ))
            .respond_json(page(
                vec![item("c", "2024-01-02", 2.0)],
                Some("https://x/search?page=2"),
                10,
            ));
        let client = client(mock);
        let collection = CollectionConfig::new("C");

        let pages: Vec<Page> = client
            .pages(&request(), &collection)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(client.http.requests.lock().len(), 3);
    }

    #[test]
    fn test_link_back_to_first_page_ends_the_walk() {
        let mock = MockHttpClient::new().respond_json(page(
            vec![item("a", "2024-01-02", 0.0)],
            Some("https://x/search"),
            10,
        ));
        let client = client(mock);
        let collection = CollectionConfig::new("C");
        assert_eq!(client.pages(&request(), &collection).count(), 1);
    }

    #[test]
    fn test_failed_page_is_retried_on_next_call() {
        let mock = MockHttpClient::new()
            .respond(timeout())
            .respond_json(page(vec![item("a", "2024-01-02", 0.0)], None, 1));
        let client = client(mock);
        let collection = CollectionConfig::new("C");

        let mut pages = client.pages(&request(), &collection);
        assert!(pages.next().unwrap().unwrap_err().is_timeout());
        assert_eq!(pages.fetched(), 0);

        let page = pages.next().unwrap().unwrap();
        assert_eq!(page.index, 1);
        assert!(pages.next().is_none());

        let requests = client.http.requests.lock();
        assert_eq!(requests[0], requests[1]);
    }

    #[test]
    fn test_scene_fields_from_item() {
        let client = client(
            MockHttpClient::new().respond_json(page(vec![item("a", "2024-01-02", 0.0)], None, 1)),
        );
        let collection = CollectionConfig::new("C");
        let page = client
            .pages(&request(), &collection)
            .next()
            .unwrap()
            .unwrap();

        let scene = &page.scenes[0];
        assert_eq!(scene.date.to_string(), "2024-01-02");
        assert_eq!(scene.crs, "EPSG:32723");
        assert_eq!(scene.orbit, UNKNOWN);
        assert_eq!(scene.assets.len(), 1, "thumbnail is not a band");
        assert_eq!(scene.resolution, Some(10.0));
    }

    #[test]
    fn test_orbit_from_id_token() {
        let collection = CollectionConfig::new("C").with_orbit_token(3, Some(3));
        let mut value = item("CBERS4_WFI_20240102_157123_L4", "2024-01-02", 0.0);
        value["properties"]["sat:relative_orbit"] = json!(99);
        let item: Item = serde_json::from_value(value).unwrap();

        let scene = to_scene(item, &collection, &BandResolutions::new(), None).unwrap();
        assert_eq!(scene.orbit, "157");
    }

    #[test]
    fn test_orbit_from_properties() {
        let mut value = item("a", "2024-01-02", 0.0);
        value["properties"]["sat:relative_orbit"] = json!(99);
        let item: Item = serde_json::from_value(value).unwrap();

        let scene = to_scene(item, &CollectionConfig::new("C"), &BandResolutions::new(), None).unwrap();
        assert_eq!(scene.orbit, "99");
    }

    #[test]
    fn test_footprint_falls_back_to_bbox() {
        let item: Item = serde_json::from_value(json!({
            "id": "a",
            "geometry": null,
            "bbox": [0.0, 0.0, 2.0, 2.0],
            "properties": {"datetime": "2024-01-02T00:00:00Z"}
        }))
        .unwrap();
        let scene = to_scene(item, &CollectionConfig::new("C"), &BandResolutions::new(), None).unwrap();
        assert_eq!(scene.footprint.bbox().max_x, 2.0);
        assert_eq!(scene.crs, UNKNOWN);
    }

    #[test]
    fn test_item_without_date_is_rejected() {
        let item: Item = serde_json::from_value(json!({
            "id": "a", "bbox": [0.0, 0.0, 1.0, 1.0], "properties": {}
        }))
        .unwrap();
        assert!(to_scene(item, &CollectionConfig::new("C"), &BandResolutions::new(), None).is_err());
    }

    #[test]
    fn test_band_metadata_fills_resolution() {
        let item: Item = serde_json::from_value(json!({
            "id": "a",
            "bbox": [0.0, 0.0, 1.0, 1.0],
            "properties": {"datetime": "2024-01-02T00:00:00Z"},
            "assets": {
                "BAND13": {"href": "13.tif", "type": COG},
                "BAND14": {"href": "14.tif", "type": COG}
            }
        }))
        .unwrap();
        let mut bands = BandResolutions::new();
        bands.insert("BAND13", 64.0);

        let scene = to_scene(item, &CollectionConfig::new("C"), &bands, None).unwrap();
        assert_eq!(scene.assets[0].resolution, Some(64.0));
        assert_eq!(scene.assets[1].resolution, None);
        assert_eq!(scene.resolution, Some(64.0));
    }

    /// Reads canned georeferencing keyed by asset href.
    struct StaticInspector(HashMap<String, RasterInfo>);

    impl RasterInspector for StaticInspector {
        fn inspect(&self, href: &str) -> Result<RasterInfo, crate::vrt::InspectError> {
            self.0
                .get(href)
                .cloned()
                .ok_or_else(|| crate::vrt::InspectError::Launch {
                    program: "static".to_string(),
                    reason: format!("no raster at {}", href),
                })
        }
    }

    fn bare_item(id: &str, x: f64) -> Item {
        let mut value = item(id, "2024-01-02", x);
        value["properties"]
            .as_object_mut()
            .unwrap()
            .remove("proj:epsg");
        serde_json::from_value(value).unwrap()
    }

    fn utm(crs: &str) -> RasterInfo {
        RasterInfo {
            crs: Some(crs.to_string()),
            resolution: Some(10.0),
            footprint: Some(BoundingBox::new(5.0, 5.0, 6.0, 6.0).unwrap().into()),
        }
    }

    #[test]
    fn test_crs_unknown_without_inspector() {
        let scene = to_scene(
            bare_item("a", 0.0),
            &CollectionConfig::new("C"),
            &BandResolutions::new(),
            None,
        )
        .unwrap();
        assert_eq!(scene.crs, UNKNOWN);
    }

    #[test]
    fn test_inspected_crs_splits_zones() {
        let inspector = StaticInspector(HashMap::from([
            ("https://x/a/B1.tif".to_string(), utm("EPSG:32722")),
            ("https://x/b/B1.tif".to_string(), utm("EPSG:32723")),
        ]));
        let collection = CollectionConfig::new("C");
        let scenes: crate::catalog::SceneSet = ["a", "b"]
            .into_iter()
            .map(|id| {
                to_scene(
                    bare_item(id, 0.0),
                    &collection,
                    &BandResolutions::new(),
                    Some(&inspector),
                )
                .unwrap()
            })
            .collect();

        let groups = crate::mosaic::group(&scenes);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.crs, "EPSG:32722");
        assert_eq!(groups[1].key.crs, "EPSG:32723");
    }

    #[test]
    fn test_declared_crs_skips_inspection() {
        // An unreachable raster would fail inspection; declared metadata suffices
        let inspector = StaticInspector(HashMap::new());
        let item: Item = serde_json::from_value(item("a", "2024-01-02", 0.0)).unwrap();
        let scene = to_scene(
            item,
            &CollectionConfig::new("C"),
            &BandResolutions::new(),
            Some(&inspector),
        )
        .unwrap();
        assert_eq!(scene.crs, "EPSG:32723");
        assert_eq!(scene.footprint.bbox().min_x, 0.0);
    }

    #[test]
    fn test_untrusted_geometry_uses_raster_footprint() {
        let inspector = StaticInspector(HashMap::from([(
            "https://x/a/B1.tif".to_string(),
            utm("EPSG:32722"),
        )]));
        let item: Item = serde_json::from_value(item("a", "2024-01-02", 0.0)).unwrap();
        let collection = CollectionConfig::new("C").with_exists_geom(false);
        let scene = to_scene(item, &collection, &BandResolutions::new(), Some(&inspector)).unwrap();
        assert_eq!(scene.footprint.bbox().min_x, 5.0);
        // Declared projection still wins
        assert_eq!(scene.crs, "EPSG:32723");
    }

    #[test]
    fn test_failed_inspection_keeps_item_geometry() {
        let inspector = StaticInspector(HashMap::new());
        let collection = CollectionConfig::new("C").with_exists_geom(false);
        let scene = to_scene(
            bare_item("a", 3.0),
            &collection,
            &BandResolutions::new(),
            Some(&inspector),
        )
        .unwrap();
        assert_eq!(scene.footprint.bbox().min_x, 3.0);
        assert_eq!(scene.crs, UNKNOWN);
    }

    #[test]
    fn test_pages_use_client_inspector() {
        let mut value = item("a", "2024-01-02", 0.0);
        value["properties"]
            .as_object_mut()
            .unwrap()
            .remove("proj:epsg");
        let client = client(MockHttpClient::new().respond_json(page(vec![value], None, 1)))
            .with_inspector(StaticInspector(HashMap::from([(
                "https://x/a/B1.tif".to_string(),
                utm("EPSG:32722"),
            )])));
        let collection = CollectionConfig::new("C");
        let page = client
            .pages(&request(), &collection)
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(page.scenes[0].crs, "EPSG:32722");
    }

    #[test]
    fn test_band_resolutions_request() {
        let mock = MockHttpClient::new().respond_json(json!({
            "properties": {"eo:bands": [
                {"name": "BAND13", "common_name": "blue", "resolution_x": 64.0},
                {"name": "NDVI"}
            ]}
        }));
        let client = client(mock);
        let bands = client.band_resolutions("C").unwrap();
        assert_eq!(bands.get("BAND13"), Some(64.0));
        assert_eq!(bands.get("blue"), Some(64.0));
        assert_eq!(bands.get("NDVI"), None);
        assert_eq!(client.http.requests.lock()[0].0, "https://x/collections/C");
    }

    #[test]
    fn test_search_deduplicates_and_reports_progress() {
        let mock = MockHttpClient::new()
            .respond(no_bands())
            .respond_json(page(
                vec![item("a", "2024-01-02", 0.0), item("b", "2024-01-02", 1.0)],
                Some("https://x/search?page=2"),
                4,
            ))
            .respond_json(page(
                vec![item("b", "2024-01-02", 1.0), item("c", "2024-01-03", 2.0)],
                None,
                4,
            ));
        let client = client(mock);
        let (sink, mut events) = ProgressSink::channel();

        let outcome = client.search(
            &request(),
            &CollectionConfig::new("C"),
            &CancellationToken::new(),
            &sink,
        );
        assert_eq!(outcome.status, SearchStatus::Complete);
        assert_eq!(outcome.scenes.len(), 3);
        assert_eq!(outcome.pages, 2);

        assert_eq!(
            events.try_recv().unwrap(),
            TaskEvent::PageProgress {
                index: 1,
                total: Some(2),
                received: 2
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            TaskEvent::PageProgress {
                index: 2,
                total: Some(2),
                received: 3
            }
        );
    }

    #[test]
    fn test_search_retries_timeout_once() {
        let mock = MockHttpClient::new()
            .respond(no_bands())
            .respond(timeout())
            .respond_json(page(vec![item("a", "2024-01-02", 0.0)], None, 1));
        let client = client(mock);

        let outcome = client.search(
            &request(),
            &CollectionConfig::new("C"),
            &CancellationToken::new(),
            &ProgressSink::disabled(),
        );
        assert_eq!(outcome.status, SearchStatus::Complete);
        assert_eq!(outcome.scenes.len(), 1);
    }

    #[test]
    fn test_search_times_out_after_retry() {
        let mock = MockHttpClient::new()
            .respond(no_bands())
            .respond_json(page(
                vec![item("a", "2024-01-02", 0.0)],
                Some("https://x/search?page=2"),
                3,
            ))
            .respond(timeout())
            .respond(timeout());
        let client = client(mock);

        let outcome = client.search(
            &request(),
            &CollectionConfig::new("C"),
            &CancellationToken::new(),
            &ProgressSink::disabled(),
        );
        assert_eq!(
            outcome.status,
            SearchStatus::TimedOut {
                page: 2,
                attempts: 2
            }
        );
        assert_eq!(outcome.scenes.len(), 1);
        assert_eq!(client.http.request_count(), 4);
    }

    #[test]
    fn test_search_empty_catalog() {
        let mock = MockHttpClient::new()
            .respond(no_bands())
            .respond_json(page(vec![], None, 0));
        let outcome = client(mock).search(
            &request(),
            &CollectionConfig::new("C"),
            &CancellationToken::new(),
            &ProgressSink::disabled(),
        );
        assert_eq!(outcome.status, SearchStatus::NoScenesFound);
    }

    #[test]
    fn test_search_reports_other_errors() {
        let mock = MockHttpClient::new()
            .respond(no_bands())
            .respond(Ok(b"<html>".to_vec()));
        let outcome = client(mock).search(
            &request(),
            &CollectionConfig::new("C"),
            &CancellationToken::new(),
            &ProgressSink::disabled(),
        );
        assert!(matches!(
            outcome.status,
            SearchStatus::Failed(CatalogError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_search_cancelled_before_start() {
        let client = client(MockHttpClient::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = client.search(
            &request(),
            &CollectionConfig::new("C"),
            &cancel,
            &ProgressSink::disabled(),
        );
        assert_eq!(outcome.status, SearchStatus::Cancelled);
        assert_eq!(client.http.request_count(), 0);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(50, 10), 5);
        assert_eq!(page_count(51, 10), 6);
        assert_eq!(page_count(0, 10), 1);
    }
}
