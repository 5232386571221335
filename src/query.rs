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

//! Candidate lookup, either through the SQLite cache or by scanning the
//! raw catalogue. Both paths apply the same filter and return candidates
//! in no particular order.

use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use rusqlite::Connection;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use time::Date;
use time::PrimitiveDateTime;
use time::Time;
use time::format_description::FormatItem;
use time::macros::format_description;
use tracing::debug;

use crate::cache::CacheSpec;
use crate::cache::CatalogCache;
use crate::catalog::for_each_row;
use crate::catalog::parse_number;
use crate::error::FelsError;
use crate::model::Candidate;
use crate::model::Family;
use crate::model::QueryCriteria;
use crate::model::SpatialKey;
use crate::sql::SqlColumn;
use crate::sql::SqlExpr;
use crate::sql::SqlFragment;
use crate::sql::SqlSelectBuilder;

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parses a `YYYY-MM-DD` date as typed on the command line.
pub fn parse_date(raw: &str) -> Result<Date, FelsError> {
    Date::parse(raw.trim(), DATE_FORMAT)
        .map_err(|err| FelsError::InvalidArgument(format!("date {raw:?} is not YYYY-MM-DD: {err}")))
}

/// How candidates are looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lookup {
    #[default]
    Cache,
    Scan,
}

impl Lookup {
    pub fn as_str(self) -> &'static str {
        match self {
            Lookup::Cache => "cache",
            Lookup::Scan => "scan",
        }
    }
}

/// Runs `criteria` against the catalogue at `source`.
pub fn find_candidates(
    cache: &mut CatalogCache,
    source: &Path,
    criteria: &QueryCriteria,
    lookup: Lookup,
) -> Result<Vec<Candidate>> {
    criteria.validate()?;
    match lookup {
        Lookup::Cache => {
            let conn = cache.ensure(source, &CacheSpec::for_family(criteria.family()))?;
            query_cache(conn, criteria)
        }
        Lookup::Scan => scan_catalog(source, criteria),
    }
}

pub fn query_cache(conn: &Connection, criteria: &QueryCriteria) -> Result<Vec<Candidate>> {
    let family = criteria.family();
    let date_column = family.date_column();
    let mut builder = SqlSelectBuilder::new(family.table()).select([
        SqlExpr::column(SqlColumn::BaseUrl),
        SqlExpr::column(SqlColumn::CloudCover),
        SqlExpr::column(date_column),
    ]);

    builder = match &criteria.spatial {
        SpatialKey::PathRow { path, row } => builder
            .filter(SqlFragment::eq(
                SqlColumn::WrsPath,
                SqlValue::Integer(i64::from(*path)),
            ))
            .filter(SqlFragment::eq(
                SqlColumn::WrsRow,
                SqlValue::Integer(i64::from(*row)),
            )),
        SpatialKey::Tile(tile) => {
            builder.filter(SqlFragment::eq(SqlColumn::MgrsTile, SqlValue::Text(tile.clone())))
        }
    };
    if let Some(sensor) = &criteria.sensor_id {
        builder = builder.filter(SqlFragment::eq(
            SqlColumn::SensorId,
            SqlValue::Text(sensor.clone()),
        ));
    }
    let (start, end) = date_bounds(criteria)?;
    let (sql, params) = builder
        .filter(SqlFragment::cmp(
            SqlExpr::column(SqlColumn::CloudCover),
            "<=",
            SqlValue::Real(criteria.max_cloud_cover),
        ))
        .filter(SqlFragment::between(
            SqlExpr::date_prefix(date_column),
            SqlValue::Text(start),
            SqlValue::Text(end),
        ))
        .build();

    debug!(%sql, "querying catalogue cache");
    let mut stmt = conn.prepare(&sql).context("prepare catalogue query")?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .context("run catalogue query")?;

    let mut candidates = Vec::new();
    for row in rows {
        let (address, cloud_cover, raw_date) = row.context("read catalogue row")?;
        if let Some(candidate) = to_candidate(address, cloud_cover, &raw_date) {
            candidates.push(candidate);
        }
    }
    Ok(candidates)
}

/// Linear pass over the raw catalogue with the same predicate as
/// [`query_cache`].
pub fn scan_catalog(source: &Path, criteria: &QueryCriteria) -> Result<Vec<Candidate>> {
    let family = criteria.family();
    let mut columns = vec![
        SqlColumn::BaseUrl,
        SqlColumn::CloudCover,
        family.date_column(),
    ];
    match family {
        Family::Landsat => {
            columns.extend([SqlColumn::WrsPath, SqlColumn::WrsRow, SqlColumn::SensorId])
        }
        Family::Sentinel2 => columns.push(SqlColumn::MgrsTile),
    }
    let (start, end) = date_bounds(criteria)?;

    let mut candidates = Vec::new();
    let label = format!("scanning {}", source.display());
    for_each_row(source, &columns, &label, |values| {
        let Some(cloud_cover) = parse_number(values[1]) else {
            return Ok(());
        };
        if cloud_cover > criteria.max_cloud_cover {
            return Ok(());
        }
        let day = date_prefix(values[2]);
        if day < start.as_str() || day > end.as_str() {
            return Ok(());
        }
        let spatial_ok = match &criteria.spatial {
            SpatialKey::PathRow { path, row } => {
                parse_number(values[3]) == Some(f64::from(*path))
                    && parse_number(values[4]) == Some(f64::from(*row))
                    && criteria
                        .sensor_id
                        .as_deref()
                        .is_none_or(|sensor| values[5] == sensor)
            }
            SpatialKey::Tile(tile) => values[3] == tile.as_str(),
        };
        if spatial_ok
            && let Some(candidate) = to_candidate(values[0].to_string(), cloud_cover, values[2])
        {
            candidates.push(candidate);
        }
        Ok(())
    })?;
    Ok(candidates)
}

fn date_bounds(criteria: &QueryCriteria) -> Result<(String, String)> {
    let start = criteria.start.format(DATE_FORMAT).context("format start date")?;
    let end = criteria.end.format(DATE_FORMAT).context("format end date")?;
    Ok((start, end))
}

fn to_candidate(address: String, cloud_cover: f64, raw_date: &str) -> Option<Candidate> {
    match parse_timestamp(raw_date) {
        Some(acquired) => Some(Candidate {
            address,
            cloud_cover,
            acquired,
        }),
        None => {
            debug!(%address, raw_date, "skipping row with unreadable date");
            None
        }
    }
}

/// First ten characters, matching `substr(value, 1, 10)`.
fn date_prefix(raw: &str) -> &str {
    match raw.char_indices().nth(10) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

/// Parses catalogue timestamps such as `2016-07-07`,
/// `2018-10-10T02:16:49.024000Z` or `2018-10-10 02:16:49`.
pub fn parse_timestamp(raw: &str) -> Option<PrimitiveDateTime> {
    let raw = raw.trim();
    let raw = raw.strip_suffix('Z').unwrap_or(raw);
    let (date_part, time_part) = match raw.split_once(['T', ' ']) {
        Some((date, time)) => (date, Some(time)),
        None => (raw, None),
    };
    let date = Date::parse(date_part, DATE_FORMAT).ok()?;
    let time = match time_part {
        None => Time::MIDNIGHT,
        Some(clock) => parse_clock(clock)?,
    };
    Some(PrimitiveDateTime::new(date, time))
}

fn parse_clock(raw: &str) -> Option<Time> {
    let (hms, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    let mut parts = hms.split(':');
    let hour: u8 = parts.next()?.parse().ok()?;
    let minute: u8 = parts.next()?.parse().ok()?;
    let second: u8 = match parts.next() {
        Some(value) => value.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut nanos = 0u32;
    for (idx, digit) in fraction.bytes().take(9).enumerate() {
        nanos += u32::from(digit - b'0') * 10u32.pow(8 - idx as u32);
    }
    Time::from_hms_nano(hour, minute, second, nanos).ok()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;
    use time::macros::date;
    use time::macros::datetime;

    use super::*;

    const LANDSAT_INDEX: &str = "SCENE_ID,PRODUCT_ID,SPACECRAFT_ID,SENSOR_ID,DATE_ACQUIRED,COLLECTION_NUMBER,COLLECTION_CATEGORY,SENSING_TIME,DATA_TYPE,WRS_PATH,WRS_ROW,CLOUD_COVER,NORTH_LAT,SOUTH_LAT,WEST_LON,EAST_LON,TOTAL_SIZE,BASE_URL\n\
LE71150342016189EDC00,LE07_L1GT_115034_20160707_20161009_01_T2,LANDSAT_7,ETM,2016-07-07,01,T2,2016-07-07T02:11:21Z,L1GT,115,34,40.0,37,35,126,129,1,gs://gcp-public-data-landsat/LE07/01/115/034/LE07_L1GT_115034_20160707_20161009_01_T2\n\
LC81150342016197LGN00,LC08_L1TP_115034_20160715_20170222_01_T1,LANDSAT_8,OLI_TIRS,2016-07-15,01,T1,2016-07-15T02:11:21Z,L1TP,115,34,10.0,37,35,126,129,1,gs://gcp-public-data-landsat/LC08/01/115/034/LC08_L1TP_115034_20160715_20170222_01_T1\n\
LC81150342016213LGN00,LC08_L1TP_115034_20160731_20170222_01_T1,LANDSAT_8,OLI_TIRS,2016-07-31,01,T1,2016-07-31T02:11:21Z,L1TP,115,34,N/A,37,35,126,129,1,gs://gcp-public-data-landsat/LC08/01/115/034/LC08_L1TP_115034_20160731_20170222_01_T1\n\
LC81150352016197LGN00,LC08_L1TP_115035_20160715_20170222_01_T1,LANDSAT_8,OLI_TIRS,2016-07-15,01,T1,2016-07-15T02:11:45Z,L1TP,115,35,5.0,36,34,126,129,1,gs://gcp-public-data-landsat/LC08/01/115/035/LC08_L1TP_115035_20160715_20170222_01_T1\n\
LC81150342016229LGN00,LC08_L1TP_115034_20160816_20170222_01_T1,LANDSAT_8,OLI_TIRS,2016-08-16,01,T1,2016-08-16T02:11:21Z,L1TP,115,34,2.0,37,35,126,129,1,gs://gcp-public-data-landsat/LC08/01/115/034/LC08_L1TP_115034_20160816_20170222_01_T1\n";

    fn criteria() -> QueryCriteria {
        QueryCriteria {
            spatial: SpatialKey::PathRow { path: 115, row: 34 },
            sensor_id: None,
            max_cloud_cover: 50.0,
            start: date!(2016 - 07 - 07),
            end: date!(2016 - 07 - 31),
            latest: false,
        }
    }

    fn sorted_addresses(mut candidates: Vec<Candidate>) -> Vec<String> {
        candidates.sort_by(|a, b| a.address.cmp(&b.address));
        candidates.into_iter().map(|c| c.address).collect()
    }

    #[test]
    fn cache_and_scan_agree() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("index_Landsat.csv");
        fs::write(&source, LANDSAT_INDEX)?;

        let mut cache = CatalogCache::new();
        for criteria in [
            criteria(),
            QueryCriteria {
                sensor_id: Some("OLI_TIRS".to_string()),
                ..criteria()
            },
            QueryCriteria {
                max_cloud_cover: 10.0,
                end: date!(2016 - 12 - 31),
                ..criteria()
            },
        ] {
            let cached = find_candidates(&mut cache, &source, &criteria, Lookup::Cache)?;
            let scanned = find_candidates(&mut cache, &source, &criteria, Lookup::Scan)?;
            assert_eq!(sorted_addresses(cached), sorted_addresses(scanned));
        }
        Ok(())
    }

    #[test]
    fn cache_and_scan_read_numbers_alike() -> Result<()> {
        let covers = [
            " 5.0", "5.0 ", "+5", "-1e999", "1e999", "5e0", ".5", "5.", "0x5", "\u{a0}5",
        ];
        let mut index = String::from("BASE_URL,CLOUD_COVER,SENSING_TIME,MGRS_TILE\n");
        for (idx, cover) in covers.iter().enumerate() {
            index.push_str(&format!(
                "gs://bucket/{idx}.SAFE,{cover},2018-10-10T02:16:49.024Z,52SDG\n"
            ));
        }
        let dir = tempdir()?;
        let source = dir.path().join("index_Sentinel.csv");
        fs::write(&source, index)?;

        let criteria = QueryCriteria {
            spatial: SpatialKey::Tile("52SDG".to_string()),
            max_cloud_cover: 100.0,
            start: date!(2018 - 10 - 01),
            end: date!(2018 - 10 - 31),
            ..criteria()
        };
        let mut cache = CatalogCache::new();
        let cached = find_candidates(&mut cache, &source, &criteria, Lookup::Cache)?;
        let scanned = find_candidates(&mut cache, &source, &criteria, Lookup::Scan)?;
        cache.close()?;

        let cached = sorted_addresses(cached);
        assert_eq!(cached, sorted_addresses(scanned));
        let expected: Vec<String> = [0, 1, 2, 5, 6, 7]
            .iter()
            .map(|idx| format!("gs://bucket/{idx}.SAFE"))
            .collect();
        assert_eq!(cached, expected);
        Ok(())
    }

    #[test]
    fn date_bounds_are_inclusive_and_non_numeric_cloud_never_matches() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("index_Landsat.csv");
        fs::write(&source, LANDSAT_INDEX)?;

        let candidates = scan_catalog(&source, &criteria())?;
        let addresses = sorted_addresses(candidates);
        assert_eq!(addresses.len(), 2);
        assert!(addresses[0].ends_with("LC08_L1TP_115034_20160715_20170222_01_T1"));
        assert!(addresses[1].ends_with("LE07_L1GT_115034_20160707_20161009_01_T2"));
        Ok(())
    }

    #[test]
    fn sensor_filter_on_sentinel_is_rejected() {
        let criteria = QueryCriteria {
            spatial: SpatialKey::Tile("52SDG".to_string()),
            sensor_id: Some("TM".to_string()),
            ..criteria()
        };
        let mut cache = CatalogCache::new();
        let err = find_candidates(&mut cache, Path::new("unused.csv"), &criteria, Lookup::Scan)
            .unwrap_err();
        assert!(err.to_string().contains("sensor filter"));
    }

    #[test]
    fn timestamps_accept_catalogue_variants() {
        assert_eq!(
            parse_timestamp("2016-07-07"),
            Some(datetime!(2016 - 07 - 07 0:00))
        );
        assert_eq!(
            parse_timestamp("2018-10-10T02:16:49.024000Z"),
            Some(datetime!(2018 - 10 - 10 2:16:49.024))
        );
        assert_eq!(
            parse_timestamp("2018-10-10 02:16:49"),
            Some(datetime!(2018 - 10 - 10 2:16:49))
        );
        assert_eq!(parse_timestamp("2018-13-10"), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn date_prefix_counts_characters() {
        assert_eq!(date_prefix("2018-10-10T02:16:49Z"), "2018-10-10");
        assert_eq!(date_prefix("2018"), "2018");
    }

    #[test]
    fn command_line_dates() {
        assert_eq!(parse_date("2018-10-01").unwrap(), date!(2018 - 10 - 01));
        assert_eq!(parse_date(" 2018-10-01 ").unwrap(), date!(2018 - 10 - 01));
        for bad in ["2018/10/01", "2018-02-30", "20181001"] {
            assert!(
                matches!(parse_date(bad), Err(FelsError::InvalidArgument(_))),
                "{bad}"
            );
        }
    }
}
