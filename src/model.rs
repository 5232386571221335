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

//! Shared domain types used across the catalogue, query, and ranking layers.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use time::Date;
use time::PrimitiveDateTime;

use crate::error::FelsError;

/// Catalogue family. Each family has its own index file and cache table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Family {
    Landsat,
    Sentinel2,
}

impl Family {
    pub fn as_label(self) -> &'static str {
        match self {
            Family::Landsat => "Landsat",
            Family::Sentinel2 => "Sentinel-2",
        }
    }
}

/// Sensor codes accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Sensor {
    Tm,
    Etm,
    OliTirs,
    S2,
}

impl Sensor {
    /// Canonical code, which is also the `SENSOR_ID` value in the Landsat index.
    pub fn code(self) -> &'static str {
        match self {
            Sensor::Tm => "TM",
            Sensor::Etm => "ETM",
            Sensor::OliTirs => "OLI_TIRS",
            Sensor::S2 => "S2",
        }
    }

    pub fn family(self) -> Family {
        match self {
            Sensor::S2 => Family::Sentinel2,
            _ => Family::Landsat,
        }
    }
}

impl FromStr for Sensor {
    type Err = FelsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TM" | "L5" => Ok(Sensor::Tm),
            "ETM" | "L7" => Ok(Sensor::Etm),
            "OLI_TIRS" | "L8" => Ok(Sensor::OliTirs),
            "S2" => Ok(Sensor::S2),
            _ => Err(FelsError::UnknownSensor(raw.to_string())),
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Spatial identifier of one grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpatialKey {
    /// Landsat WRS-2 path and row, compared as integers.
    PathRow { path: u16, row: u16 },
    /// Sentinel-2 MGRS tile code, upper case without the leading `T`.
    Tile(String),
}

impl SpatialKey {
    pub fn family(&self) -> Family {
        match self {
            SpatialKey::PathRow { .. } => Family::Landsat,
            SpatialKey::Tile(_) => Family::Sentinel2,
        }
    }
}

impl fmt::Display for SpatialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialKey::PathRow { path, row } => write!(f, "{path:03}{row:03}"),
            SpatialKey::Tile(tile) => f.write_str(tile),
        }
    }
}

/// Filter applied to one catalogue. Both date bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCriteria {
    pub spatial: SpatialKey,
    /// Exact `SENSOR_ID` match; only meaningful for Landsat.
    pub sensor_id: Option<String>,
    pub max_cloud_cover: f64,
    pub start: Date,
    pub end: Date,
    /// Keep only the best-ranked candidate. The name is historical: the
    /// selected product is the lowest cloud cover one, not the newest.
    pub latest: bool,
}

impl QueryCriteria {
    pub fn family(&self) -> Family {
        self.spatial.family()
    }

    pub fn validate(&self) -> Result<(), FelsError> {
        if self.start > self.end {
            return Err(FelsError::InvalidArgument(format!(
                "start date {} is after end date {}",
                self.start, self.end
            )));
        }
        if self.max_cloud_cover.is_nan() {
            return Err(FelsError::InvalidArgument(
                "cloud cover ceiling must be a number".to_string(),
            ));
        }
        if self.sensor_id.is_some() && self.family() == Family::Sentinel2 {
            return Err(FelsError::InvalidArgument(
                "sensor filter only applies to Landsat catalogues".to_string(),
            ));
        }
        Ok(())
    }
}

/// One catalogue row that passed the filter, before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Storage address as found in the catalogue, e.g. `gs://bucket/path`.
    pub address: String,
    pub cloud_cover: f64,
    pub acquired: PrimitiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_aliases_normalize() {
        assert_eq!("l8".parse::<Sensor>().unwrap(), Sensor::OliTirs);
        assert_eq!("L7".parse::<Sensor>().unwrap(), Sensor::Etm);
        assert_eq!("l5".parse::<Sensor>().unwrap(), Sensor::Tm);
        assert_eq!("oli_tirs".parse::<Sensor>().unwrap(), Sensor::OliTirs);
        assert_eq!("s2".parse::<Sensor>().unwrap(), Sensor::S2);
    }

    #[test]
    fn unknown_sensor_is_rejected() {
        let err = "MODIS".parse::<Sensor>().unwrap_err();
        assert!(matches!(err, FelsError::UnknownSensor(code) if code == "MODIS"));
    }

    #[test]
    fn path_row_displays_zero_padded() {
        let key = SpatialKey::PathRow { path: 34, row: 2 };
        assert_eq!(key.to_string(), "034002");
    }
}
