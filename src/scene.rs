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

//! Scene identifiers: normalising the ones typed by a user, and expanding
//! a geometry into the grid cells it touches.

use std::fs;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use geo::Area;
use geo::BooleanOps;
use geo::BoundingRect;
use geo::Geometry;
use geo::Intersects;
use geo::MultiPolygon;
use geo::Polygon;
use geo::Rect;
use geo::Relate;
use geojson::GeoJson;
use serde_json::Value as JsonValue;
use tracing::debug;
use wkt::TryFromWkt;

use crate::error::FelsError;
use crate::model::Family;
use crate::model::SpatialKey;

const LANDSAT_GRID_FILE: &str = "wrs2_descending.geojson";
const SENTINEL2_GRID_FILE: &str = "sentinel_2_index.geojson";

impl SpatialKey {
    /// Landsat path and row; both must be in `1..=999`.
    pub fn path_row(path: u16, row: u16) -> Result<Self, FelsError> {
        for (label, value) in [("path", path), ("row", row)] {
            if !(1..=999).contains(&value) {
                return Err(FelsError::InvalidScene {
                    scene: format!("{path},{row}"),
                    reason: format!("{label} {value} is outside 1..=999"),
                });
            }
        }
        Ok(SpatialKey::PathRow { path, row })
    }
}

/// Parses a user supplied scene identifier for `family`.
///
/// Landsat takes `PPPRRR`, `PPP/RRR` or `PPP,RRR`. Sentinel-2 takes a
/// five character MGRS tile, optionally prefixed with `T`.
pub fn normalize_scene(raw: &str, family: Family) -> Result<SpatialKey, FelsError> {
    let scene = raw.trim();
    let invalid = |reason: &str| FelsError::InvalidScene {
        scene: raw.to_string(),
        reason: reason.to_string(),
    };
    match family {
        Family::Landsat => {
            let inner = scene.trim_start_matches('(').trim_end_matches(')');
            let (path, row) = match inner.split_once(['/', ',']) {
                Some((path, row)) => (path.trim(), row.trim()),
                None if inner.len() == 6 && inner.is_ascii() => inner.split_at(3),
                None => return Err(invalid("expected PPPRRR, PPP/RRR or PPP,RRR")),
            };
            let parse = |part: &str| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("path and row must be numbers"));
                }
                part.parse::<u16>()
                    .map_err(|_| invalid("path and row must be numbers"))
            };
            SpatialKey::path_row(parse(path)?, parse(row)?).map_err(|err| match err {
                FelsError::InvalidScene { reason, .. } => invalid(&reason),
                other => other,
            })
        }
        Family::Sentinel2 => {
            let upper = scene.to_ascii_uppercase();
            let tile = match upper.strip_prefix('T') {
                Some(rest) if rest.len() == 5 => rest,
                _ => upper.as_str(),
            };
            let bytes = tile.as_bytes();
            let well_formed = bytes.len() == 5
                && bytes[..2].iter().all(u8::is_ascii_digit)
                && bytes[2..].iter().all(u8::is_ascii_alphabetic);
            if !well_formed {
                return Err(invalid("expected an MGRS tile such as 52SDG or T52SDG"));
            }
            Ok(SpatialKey::Tile(tile.to_string()))
        }
    }
}

/// Parses GeoJSON (geometry, feature, or the first feature of a
/// collection), falling back to WKT.
pub fn parse_geometry(text: &str) -> Result<Geometry<f64>, FelsError> {
    let geojson_err = match geometry_from_geojson(text) {
        Ok(geometry) => return Ok(geometry),
        Err(err) => err,
    };
    match Geometry::<f64>::try_from_wkt_str(text.trim()) {
        Ok(geometry) => Ok(geometry),
        Err(err) => Err(FelsError::GeometryParse {
            geojson: geojson_err,
            wkt: err.to_string(),
        }),
    }
}

fn geometry_from_geojson(text: &str) -> Result<Geometry<f64>, String> {
    let parsed: GeoJson = text.trim().parse().map_err(|err| format!("{err}"))?;
    let geometry = match parsed {
        GeoJson::Geometry(geometry) => geometry,
        GeoJson::Feature(feature) => feature
            .geometry
            .ok_or_else(|| "feature has no geometry".to_string())?,
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .next()
            .and_then(|feature| feature.geometry)
            .ok_or_else(|| "collection has no feature with a geometry".to_string())?,
    };
    Geometry::<f64>::try_from(geometry).map_err(|err| format!("{err}"))
}

/// How a grid cell must relate to the query geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Containment {
    /// The cell contains the whole geometry.
    Contains,
    /// The cell touches the geometry. With `min_overlap`, the shared area
    /// must exceed that fraction of the geometry's area.
    Intersects { min_overlap: Option<f64> },
}

impl Containment {
    pub fn from_flags(include_overlap: bool, min_overlap: Option<f64>) -> Result<Self, FelsError> {
        match (include_overlap, min_overlap) {
            (false, None) => Ok(Containment::Contains),
            (false, Some(_)) => Err(FelsError::InvalidArgument(
                "an overlap threshold needs --includeoverlap".to_string(),
            )),
            (true, Some(t)) if !(t > 0.0 && t <= 1.0) => Err(FelsError::InvalidArgument(
                format!("overlap threshold {t} must be in (0, 1]"),
            )),
            (true, min_overlap) => Ok(Containment::Intersects { min_overlap }),
        }
    }
}

#[derive(Debug, Clone)]
struct GridCell {
    id: String,
    geometry: Geometry<f64>,
    polygons: MultiPolygon<f64>,
    bbox: Rect<f64>,
}

/// Reference grid of one family, loaded from a GeoJSON feature collection.
#[derive(Debug, Clone)]
pub struct TileGrid {
    cells: Vec<GridCell>,
}

impl TileGrid {
    pub fn file_name(family: Family) -> &'static str {
        match family {
            Family::Landsat => LANDSAT_GRID_FILE,
            Family::Sentinel2 => SENTINEL2_GRID_FILE,
        }
    }

    /// Loads the grid for `family` from `dir`.
    pub fn load(dir: &Path, family: Family) -> Result<Self> {
        let path = dir.join(Self::file_name(family));
        let text = fs::read_to_string(&path)
            .with_context(|| format!("read grid {}", path.display()))?;
        Self::from_geojson_str(family, &text)
            .with_context(|| format!("load grid {}", path.display()))
    }

    pub fn from_geojson_str(family: Family, text: &str) -> Result<Self> {
        let parsed: GeoJson = text.parse().context("parse grid GeoJSON")?;
        let GeoJson::FeatureCollection(collection) = parsed else {
            bail!("grid must be a FeatureCollection");
        };
        let mut cells = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let Some(id) = cell_id(family, feature.properties.as_ref()) else {
                continue;
            };
            let Some(geometry) = feature.geometry else {
                continue;
            };
            let geometry = Geometry::<f64>::try_from(geometry)
                .with_context(|| format!("grid cell {id}"))?;
            let Some(bbox) = geometry.bounding_rect() else {
                continue;
            };
            let polygons = polygons_of(&geometry);
            cells.push(GridCell {
                id,
                geometry,
                polygons,
                bbox,
            });
        }
        debug!(family = family.as_label(), cells = cells.len(), "loaded grid");
        Ok(Self { cells })
    }

    /// Ids of every cell matching `geometry`, sorted and deduplicated.
    pub fn resolve(&self, geometry: &Geometry<f64>, mode: Containment) -> Vec<String> {
        let Some(bounds) = geometry.bounding_rect() else {
            return Vec::new();
        };
        let target = polygons_of(geometry);
        let target_area = target.unsigned_area();

        let mut ids: Vec<String> = self
            .cells
            .iter()
            .filter(|cell| cell.bbox.intersects(&bounds))
            .filter(|cell| {
                let matrix = cell.geometry.relate(geometry);
                match mode {
                    Containment::Contains => matrix.is_contains(),
                    Containment::Intersects { min_overlap } => {
                        if !matrix.is_intersects() {
                            return false;
                        }
                        match min_overlap {
                            Some(threshold) if target_area > 0.0 => {
                                let shared = cell.polygons.intersection(&target).unsigned_area();
                                shared / target_area > threshold
                            }
                            _ => true,
                        }
                    }
                }
            })
            .map(|cell| cell.id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

fn cell_id(
    family: Family,
    properties: Option<&serde_json::Map<String, JsonValue>>,
) -> Option<String> {
    let properties = properties?;
    match family {
        Family::Sentinel2 => properties
            .get("Name")
            .and_then(JsonValue::as_str)
            .map(|name| name.trim().to_ascii_uppercase()),
        Family::Landsat => match properties.get("WRSPR")? {
            JsonValue::Number(number) => number.as_u64().map(|value| format!("{value:06}")),
            JsonValue::String(text) => {
                let text = text.trim();
                if text.bytes().all(|b| b.is_ascii_digit()) && text.len() <= 6 {
                    Some(format!("{text:0>6}"))
                } else {
                    None
                }
            }
            _ => None,
        },
    }
}

fn polygons_of(geometry: &Geometry<f64>) -> MultiPolygon<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    collect_polygons(geometry, &mut polygons);
    MultiPolygon::new(polygons)
}

fn collect_polygons(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => out.push(polygon.clone()),
        Geometry::MultiPolygon(multi) => out.extend(multi.0.iter().cloned()),
        Geometry::Rect(rect) => out.push(rect.to_polygon()),
        Geometry::Triangle(triangle) => out.push(triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for member in collection {
                collect_polygons(member, out);
            }
        }
        _ => {}
    }
}
