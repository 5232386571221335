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

//! Dates encoded in product identifiers.
//!
//! Landsat collection ids look like `LE07_L1GT_115034_20160707_20161009_01_T2`
//! and Sentinel-2 ids like
//! `S2B_MSIL1C_20181010T021649_N0206_R003_T52SDG_20181010T064007.SAFE`.

use std::collections::BTreeMap;

use time::Date;
use time::Month;
use time::PrimitiveDateTime;
use time::Time;

use crate::error::FelsError;

const FIELD_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandsatField {
    Acquisition,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel2Field {
    /// Datatake sensing start.
    SensingTime,
    /// Product discriminator, usually the processing time.
    ProductDiscriminator,
}

/// Last path segment of a product address.
pub fn product_name(address: &str) -> &str {
    let trimmed = address.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

pub fn landsat_date(id: &str, field: LandsatField) -> Result<Date, FelsError> {
    let fields = split_fields(id)?;
    let raw = match field {
        LandsatField::Acquisition => fields[3],
        LandsatField::Processing => fields[4],
    };
    parse_ymd(raw).ok_or_else(|| invalid(id, format!("{raw:?} is not a YYYYMMDD date")))
}

pub fn sentinel2_datetime(id: &str, field: Sentinel2Field) -> Result<PrimitiveDateTime, FelsError> {
    let fields = split_fields(id)?;
    let raw = match field {
        Sentinel2Field::SensingTime => fields[2],
        Sentinel2Field::ProductDiscriminator => {
            fields[6].strip_suffix(".SAFE").unwrap_or(fields[6])
        }
    };
    let parsed = raw.split_once('T').and_then(|(day, clock)| {
        let date = parse_ymd(day)?;
        let time = parse_hms(clock)?;
        Some(PrimitiveDateTime::new(date, time))
    });
    parsed.ok_or_else(|| invalid(id, format!("{raw:?} is not a YYYYMMDDTHHMMSS timestamp")))
}

/// Keeps one id per sensing time: the lexicographically smallest, which
/// carries the earliest product discriminator. Ids that do not parse are
/// dropped. Output is sorted.
pub fn dedupe_by_sensing_time<'a, I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut by_time: BTreeMap<PrimitiveDateTime, &str> = BTreeMap::new();
    for id in ids {
        let Ok(sensed) = sentinel2_datetime(id, Sentinel2Field::SensingTime) else {
            continue;
        };
        by_time
            .entry(sensed)
            .and_modify(|kept| {
                if id < *kept {
                    *kept = id;
                }
            })
            .or_insert(id);
    }
    let mut kept: Vec<String> = by_time.into_values().map(str::to_string).collect();
    kept.sort();
    kept
}

fn split_fields(id: &str) -> Result<Vec<&str>, FelsError> {
    let name = product_name(id);
    let fields: Vec<&str> = name.split('_').collect();
    if fields.len() != FIELD_COUNT {
        return Err(invalid(
            id,
            format!("expected {FIELD_COUNT} underscore separated fields, found {}", fields.len()),
        ));
    }
    Ok(fields)
}

fn parse_ymd(raw: &str) -> Option<Date> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = raw[..4].parse().ok()?;
    let month: u8 = raw[4..6].parse().ok()?;
    let day: u8 = raw[6..].parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

fn parse_hms(raw: &str) -> Option<Time> {
    if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u8 = raw[..2].parse().ok()?;
    let minute: u8 = raw[2..4].parse().ok()?;
    let second: u8 = raw[4..].parse().ok()?;
    Time::from_hms(hour, minute, second).ok()
}

fn invalid(id: &str, reason: String) -> FelsError {
    FelsError::InvalidProductId {
        id: id.to_string(),
        reason,
    }
}
