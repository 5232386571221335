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

use anyhow::Result;
use serde::Serialize;

use crate::run::ItemKind;
use crate::run::ProductReport;
use crate::run::SceneResult;

pub const NO_IMAGE_MESSAGE: &str =
    "No image was found with the criteria you chose! Please review your parameters and try again.";

#[derive(Debug, Clone, Serialize, Default)]
pub struct StatsOut {
    pub took_ms: i64,
    pub scenes: usize,
    pub found: usize,
    pub returned: usize,
}

impl StatsOut {
    pub fn from_results(results: &[SceneResult], took_ms: i64) -> Self {
        Self {
            took_ms,
            scenes: results.len(),
            found: results.iter().map(|r| r.found.len()).sum(),
            returned: results.iter().map(|r| r.items.len()).sum(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOut {
    pub sensor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    pub start: String,
    pub end: String,
    pub latest: bool,
    pub lookup: String,
    pub items: ItemKind,
    pub download: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneOut {
    pub scene: String,
    pub found: usize,
    pub items: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<ProductReport>,
}

impl From<&SceneResult> for SceneOut {
    fn from(result: &SceneResult) -> Self {
        Self {
            scene: result.scene.to_string(),
            found: result.found.len(),
            items: result.items.clone(),
            products: result.products.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorOut {
    pub code: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct JsonResponse {
    pub ok: bool,
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SceneOut>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOut>,
}

impl JsonResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            schema_version: "1".to_string(),
            ..Default::default()
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            ok: false,
            schema_version: "1".to_string(),
            error: Some(ErrorOut {
                code: code.to_string(),
                message: message.to_string(),
                hint: None,
            }),
            ..Default::default()
        }
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        if let Some(error) = &mut self.error {
            error.hint = Some(hint.to_string());
        }
        self
    }

    pub fn with_query(mut self, query: QueryOut) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_results(mut self, results: &[SceneResult]) -> Self {
        self.results = Some(results.iter().map(SceneOut::from).collect());
        self
    }

    pub fn with_stats(mut self, stats: StatsOut) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Warnings for scenes that matched nothing.
pub fn empty_scene_warnings(results: &[SceneResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.found.is_empty())
        .map(|r| format!("no image found for scene {}", r.scene))
        .collect()
}

pub fn print_json(resp: &JsonResponse) -> Result<()> {
    let text = serde_json::to_string_pretty(resp)?;
    println!("{text}");
    Ok(())
}
