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

//! Domain failures that callers may want to tell apart.
//!
//! These travel inside `anyhow::Error`; use `err.downcast_ref::<FelsError>()`
//! to inspect them.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FelsError {
    #[error("corrupt catalogue {path} at line {line}: {reason}; delete it and download again")]
    CorruptCatalogue {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("could not parse geometry as GeoJSON ({geojson}) or WKT ({wkt})")]
    GeometryParse { geojson: String, wkt: String },

    #[error("invalid product identifier {id:?}: {reason}")]
    InvalidProductId { id: String, reason: String },

    #[error("invalid scene {scene:?}: {reason}")]
    InvalidScene { scene: String, reason: String },

    #[error("unsupported sensor code {0:?}; expected one of TM, ETM, OLI_TIRS, S2 (or L5, L7, L8)")]
    UnknownSensor(String),

    #[error("giving up on {url} after {attempts} attempts: {reason}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl FelsError {
    /// Stable identifier used in JSON error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            FelsError::CorruptCatalogue { .. } => "corrupt_catalogue",
            FelsError::GeometryParse { .. } => "geometry_parse",
            FelsError::InvalidProductId { .. } => "invalid_product_id",
            FelsError::InvalidScene { .. } => "invalid_scene",
            FelsError::UnknownSensor(_) => "unknown_sensor",
            FelsError::RetriesExhausted { .. } => "retries_exhausted",
            FelsError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

/// Code for any error; failures outside [`FelsError`] are `"error"`.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<FelsError>())
        .map_or("error", FelsError::code)
}
