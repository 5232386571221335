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

//! Search the public Landsat and Sentinel-2 catalogues by scene or
//! geometry, rank the matches, and optionally download them.
//!
//! [`run::run_fels`] is the entry point shared by the `fels` binary.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
#[cfg(test)]
mod http_fixture;
pub mod model;
pub mod output;
pub mod product_id;
pub mod query;
pub mod rank;
pub mod run;
pub mod scene;
pub mod sql;
pub mod transfer;
