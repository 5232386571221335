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

use std::path::PathBuf;

use clap::ArgAction;
use clap::Parser;

use crate::error::FelsError;

#[derive(Parser, Debug)]
#[command(
    name = "fels",
    version,
    about = "Find and download Landsat and Sentinel-2 imagery from the public cloud catalogues",
    override_usage = "fels [OPTIONS] [SCENE] <SAT> <START_DATE> <END_DATE>\n       fels [OPTIONS] --geometry <GEOMETRY> <SAT> <START_DATE> <END_DATE>"
)]
pub struct Cli {
    /// [SCENE] SAT START_DATE END_DATE. SCENE is a WRS-2 path/row such as
    /// 198030 for Landsat or an MGRS tile such as 52SDG for Sentinel-2; it
    /// is omitted when --geometry is given. SAT is TM, ETM, OLI_TIRS or S2
    /// (L5, L7, L8 also work). Dates are YYYY-MM-DD.
    #[arg(value_name = "ARGS", required = true, num_args = 3..=4)]
    pub args: Vec<String>,

    /// GeoJSON or WKT geometry; every scene it touches is searched.
    #[arg(short = 'g', long)]
    pub geometry: Option<String>,

    /// Also take scenes that only intersect the geometry.
    #[arg(short = 'i', long = "includeoverlap")]
    pub include_overlap: bool,

    /// Minimum overlap fraction of the geometry area for intersecting
    /// scenes; 0 disables it.
    #[arg(short = 't', long, visible_alias = "minoverlap")]
    pub thresh: Option<f64>,

    /// Maximum cloud cover in percent.
    #[arg(short = 'c', long = "cloudcover", default_value_t = 100.0)]
    pub cloud_cover: f64,

    /// Where products are downloaded.
    #[arg(short = 'o', long, default_value = ".")]
    pub output: PathBuf,

    /// Drop products that could not be fetched completely.
    #[arg(short = 'e', long = "excludepartial")]
    pub exclude_partial: bool,

    /// Only the best match per scene.
    #[arg(long)]
    pub latest: bool,

    /// Keep the product folder name instead of the INSPIRE title.
    #[arg(long = "noinspire")]
    pub no_inspire: bool,

    /// Where the catalogue indexes are kept.
    #[arg(long = "outputcatalogs")]
    pub output_catalogs: Option<PathBuf>,

    /// Replace files that already exist.
    #[arg(long)]
    pub overwrite: bool,

    /// Print matches instead of downloading them.
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Print acquisition dates instead of addresses.
    #[arg(short = 'd', long)]
    pub dates: bool,

    /// Skip Sentinel-2 products in the pre-2016 packaging.
    #[arg(short = 'r', long = "reject-old", visible_alias = "reject_old")]
    pub reject_old: bool,

    /// Scan the CSV index instead of the SQLite cache.
    #[arg(long = "use-csv", visible_alias = "use_csv")]
    pub use_csv: bool,

    /// Directory holding the reference grids used by --geometry:
    /// wrs2_descending.geojson (the USGS WRS-2 descending path/row
    /// shapefile converted to GeoJSON) and sentinel_2_index.geojson (the
    /// ESA Sentinel-2 tiling grid KML converted to GeoJSON). They are not
    /// downloaded. Defaults to the config grid_dir, then the catalogue
    /// directory.
    #[arg(long = "grid-dir")]
    pub grid_dir: Option<PathBuf>,

    #[arg(long)]
    pub json: bool,

    #[arg(short = 'v', long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Positional arguments once the optional scene has been accounted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Positionals<'a> {
    pub scene: Option<&'a str>,
    pub sat: &'a str,
    pub start_date: &'a str,
    pub end_date: &'a str,
}

impl Cli {
    /// A scene is required without `--geometry` and rejected with it.
    pub fn positionals(&self) -> Result<Positionals<'_>, FelsError> {
        match (self.geometry.is_some(), self.args.as_slice()) {
            (false, [scene, sat, start, end]) => Ok(Positionals {
                scene: Some(scene.as_str()),
                sat: sat.as_str(),
                start_date: start.as_str(),
                end_date: end.as_str(),
            }),
            (true, [sat, start, end]) => Ok(Positionals {
                scene: None,
                sat: sat.as_str(),
                start_date: start.as_str(),
                end_date: end.as_str(),
            }),
            (false, _) => Err(FelsError::InvalidArgument(
                "expected SCENE SAT START_DATE END_DATE".to_string(),
            )),
            (true, _) => Err(FelsError::InvalidArgument(
                "with --geometry, expected SAT START_DATE END_DATE and no scene".to_string(),
            )),
        }
    }

    /// `0` means no threshold.
    pub fn min_overlap(&self) -> Option<f64> {
        self.thresh.filter(|value| *value != 0.0)
    }
}
