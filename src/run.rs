// Copyright 2026 Fels Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end search: scenes, catalogue lookup, ranking, and optional
//! downloads. The command line goes through [`run_fels`] as well, so
//! library and CLI results are the same.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde::Serialize;
use time::Date;
use tracing::info;
use tracing::warn;

use crate::cache::CatalogCache;
use crate::catalog::ensure_metadata;
use crate::download::DownloadOptions;
use crate::download::ProductOutcome;
use crate::download::download_landsat;
use crate::download::download_sentinel2;
use crate::model::Family;
use crate::model::QueryCriteria;
use crate::model::Sensor;
use crate::model::SpatialKey;
use crate::product_id::LandsatField;
use crate::product_id::Sentinel2Field;
use crate::product_id::landsat_date;
use crate::product_id::sentinel2_datetime;
use crate::query::DATE_FORMAT;
use crate::query::Lookup;
use crate::query::find_candidates;
use crate::rank::rank;
use crate::scene::Containment;
use crate::scene::TileGrid;
use crate::scene::normalize_scene;
use crate::scene::parse_geometry;
use crate::transfer::Fetcher;

/// Where to search.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneTarget {
    /// One tile or path/row, as typed by the user.
    Scene(String),
    /// GeoJSON or WKT, expanded through the reference grid.
    Geometry {
        text: String,
        containment: Containment,
    },
}

/// What each result line holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    #[default]
    Urls,
    Dates,
}

#[derive(Debug, Clone)]
pub struct FelsOptions {
    pub sensor: Sensor,
    pub target: SceneTarget,
    pub start: Date,
    pub end: Date,
    pub max_cloud_cover: f64,
    pub latest: bool,
    pub lookup: Lookup,
    pub catalog_dir: PathBuf,
    pub grid_dir: PathBuf,
    pub items: ItemKind,
    /// `None` lists matches without downloading them.
    pub download: Option<DownloadOptions>,
}

impl FelsOptions {
    pub fn family(&self) -> Family {
        self.sensor.family()
    }

    /// Landsat queries always filter on the requested sensor.
    pub fn criteria(&self, spatial: SpatialKey) -> QueryCriteria {
        let sensor_id = match self.family() {
            Family::Landsat => Some(self.sensor.code().to_string()),
            Family::Sentinel2 => None,
        };
        QueryCriteria {
            spatial,
            sensor_id,
            max_cloud_cover: self.max_cloud_cover,
            start: self.start,
            end: self.end,
            latest: self.latest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductReport {
    pub url: String,
    #[serde(flatten)]
    pub outcome: ProductOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneResult {
    pub scene: SpatialKey,
    /// Ranked matches before any download.
    pub found: Vec<String>,
    pub products: Vec<ProductReport>,
    /// URLs or dates of the matches that were kept.
    pub items: Vec<String>,
}

/// Turns the target into scene keys. Geometry is parsed before any
/// catalogue is touched.
pub fn resolve_scenes(options: &FelsOptions) -> Result<Vec<SpatialKey>> {
    let family = options.family();
    match &options.target {
        SceneTarget::Scene(raw) => Ok(vec![normalize_scene(raw, family)?]),
        SceneTarget::Geometry { text, containment } => {
            let geometry = parse_geometry(text)?;
            let grid = TileGrid::load(&options.grid_dir, family)?;
            let ids = grid.resolve(&geometry, *containment);
            if ids.is_empty() {
                warn!("no matching scenes found for spatial region");
            }
            let total = ids.len();
            let mut scenes = Vec::with_capacity(total);
            for (idx, id) in ids.iter().enumerate() {
                info!(scene = id.as_str(), "converted geometry to scene [{}/{total}]", idx + 1);
                scenes.push(normalize_scene(id, family)?);
            }
            Ok(scenes)
        }
    }
}

/// Ranked public URLs for one scene.
pub fn search_scene(
    cache: &mut CatalogCache,
    source: &Path,
    options: &FelsOptions,
    scene: &SpatialKey,
) -> Result<Vec<String>> {
    let criteria = options.criteria(scene.clone());
    let candidates = find_candidates(cache, source, &criteria, options.lookup)
        .with_context(|| format!("search scene {scene}"))?;
    Ok(rank(candidates, criteria.latest))
}

/// Downloads every product. Failures are logged and reported as skipped
/// instead of aborting the batch.
pub fn download_products(
    fetcher: &Fetcher,
    sensor: Sensor,
    download: &DownloadOptions,
    urls: &[String],
) -> Vec<ProductReport> {
    let total = urls.len();
    let mut reports = Vec::with_capacity(total);
    for (idx, url) in urls.iter().enumerate() {
        info!(url = url.as_str(), "downloading {} of {total}", idx + 1);
        let result = match sensor.family() {
            Family::Landsat => download_landsat(fetcher, url, sensor, download),
            Family::Sentinel2 => download_sentinel2(fetcher, url, download),
        };
        let outcome = result.unwrap_or_else(|err| {
            let reason = format!("{err:#}");
            warn!(url = url.as_str(), error = %reason, "download failed");
            ProductOutcome::Skipped { reason }
        });
        if !outcome.is_kept() {
            info!(url = url.as_str(), "skipped");
        }
        reports.push(ProductReport {
            url: url.clone(),
            outcome,
        });
    }
    reports
}

/// Formats result lines: the URLs themselves, or the acquisition date
/// encoded in each product id.
pub fn render_items(family: Family, urls: &[String], kind: ItemKind) -> Result<Vec<String>> {
    match kind {
        ItemKind::Urls => Ok(urls.to_vec()),
        ItemKind::Dates => urls
            .iter()
            .map(|url| {
                let date = match family {
                    Family::Landsat => landsat_date(url, LandsatField::Acquisition)?,
                    Family::Sentinel2 => {
                        sentinel2_datetime(url, Sentinel2Field::SensingTime)?.date()
                    }
                };
                date.format(DATE_FORMAT).context("format date")
            })
            .collect(),
    }
}

/// Runs the whole search. `on_found` sees each scene's ranked matches
/// before any download starts.
pub fn run_fels<F>(
    cache: &mut CatalogCache,
    fetcher: &Fetcher,
    options: &FelsOptions,
    mut on_found: F,
) -> Result<Vec<SceneResult>>
where
    F: FnMut(&SpatialKey, &[String]),
{
    let scenes = resolve_scenes(options)?;
    if scenes.is_empty() {
        return Ok(Vec::new());
    }
    let family = options.family();
    let source = ensure_metadata(fetcher, family, &options.catalog_dir)?;

    let mut results = Vec::with_capacity(scenes.len());
    for scene in scenes {
        let found = search_scene(cache, &source, options, &scene)?;
        on_found(&scene, &found);

        let (products, kept) = match &options.download {
            Some(download) if !found.is_empty() => {
                let products = download_products(fetcher, options.sensor, download, &found);
                let kept: Vec<String> = products
                    .iter()
                    .filter(|report| report.outcome.is_kept())
                    .map(|report| report.url.clone())
                    .collect();
                (products, kept)
            }
            _ => (Vec::new(), found.clone()),
        };
        let items = render_items(family, &kept, options.items)?;
        results.push(SceneResult {
            scene,
            found,
            products,
            items,
        });
    }
    Ok(results)
}
