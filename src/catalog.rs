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

//! Catalogue source files: where they come from, where they live, and how
//! their rows are streamed.
//!
//! Index files are plain comma separated text whose fields never contain a
//! comma, so rows are split directly instead of going through a quoted CSV
//! parser. Column positions come from the header row of each file.

use std::fs;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use flate2::read::GzDecoder;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use tracing::debug;
use tracing::info;

use crate::error::FelsError;
use crate::model::Family;
use crate::sql::SqlColumn;
use crate::sql::SqlTable;
use crate::transfer::Fetcher;

pub const LANDSAT_METADATA_URL: &str =
    "http://storage.googleapis.com/gcp-public-data-landsat/index.csv.gz";
pub const SENTINEL2_METADATA_URL: &str =
    "http://storage.googleapis.com/gcp-public-data-sentinel-2/index.csv.gz";

const READ_BUFFER_BYTES: usize = 1 << 22;
const PROGRESS_STEP: usize = 50_000;

impl Family {
    pub fn metadata_url(self) -> &'static str {
        match self {
            Family::Landsat => LANDSAT_METADATA_URL,
            Family::Sentinel2 => SENTINEL2_METADATA_URL,
        }
    }

    fn index_stem(self) -> &'static str {
        match self {
            Family::Landsat => "Landsat",
            Family::Sentinel2 => "Sentinel",
        }
    }

    pub fn table(self) -> SqlTable {
        match self {
            Family::Landsat => SqlTable::Landsat,
            Family::Sentinel2 => SqlTable::Sentinel2,
        }
    }

    /// Column holding the acquisition timestamp.
    pub fn date_column(self) -> SqlColumn {
        match self {
            Family::Landsat => SqlColumn::DateAcquired,
            Family::Sentinel2 => SqlColumn::SensingTime,
        }
    }
}

/// Local path of the decompressed index for `family` inside `dir`.
pub fn index_path(dir: &Path, family: Family) -> PathBuf {
    dir.join(format!("index_{}.csv", family.index_stem()))
}

fn zipped_index_path(dir: &Path, family: Family) -> PathBuf {
    dir.join(format!("index_{}.csv.gz", family.index_stem()))
}

/// Returns the local index file for `family`, downloading and unpacking it
/// first when it is not already present in `dir`.
pub fn ensure_metadata(fetcher: &Fetcher, family: Family, dir: &Path) -> Result<PathBuf> {
    let index = index_path(dir, family);
    if index.is_file() {
        debug!(path = %index.display(), "using existing catalogue");
        return Ok(index);
    }

    fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
    let zipped = zipped_index_path(dir, family);
    if !zipped.is_file() {
        info!(
            url = family.metadata_url(),
            dir = %dir.display(),
            "downloading {} metadata file",
            family.as_label()
        );
        fetcher.download(family.metadata_url(), &zipped)?;
    }

    info!(path = %zipped.display(), "unzipping metadata file");
    gunzip(&zipped, &index)?;
    Ok(index)
}

fn gunzip(src: &Path, dest: &Path) -> Result<()> {
    let input = File::open(src).with_context(|| format!("open {}", src.display()))?;
    let mut decoder = GzDecoder::new(BufReader::new(input));
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    std::io::copy(&mut decoder, &mut tmp)
        .with_context(|| format!("decompress {}", src.display()))?;
    tmp.persist(dest)
        .with_context(|| format!("write {}", dest.display()))?;
    Ok(())
}

/// Positions of the requested columns within a header row.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    positions: Vec<usize>,
    width: usize,
}

impl HeaderMap {
    pub fn resolve(header: &str, columns: &[SqlColumn], path: &Path) -> Result<Self> {
        let names: Vec<&str> = header.trim_end_matches(['\r', '\n']).split(',').collect();
        let mut positions = Vec::with_capacity(columns.len());
        for column in columns {
            let idx = names
                .iter()
                .position(|name| name.trim() == column.sql())
                .ok_or_else(|| FelsError::CorruptCatalogue {
                    path: path.to_path_buf(),
                    line: 1,
                    reason: format!("header has no {} column", column.sql()),
                })?;
            positions.push(idx);
        }
        Ok(Self {
            positions,
            width: names.len(),
        })
    }

    /// Splits one data row and returns the requested fields in column order.
    pub fn project<'a>(&self, row: &'a str, path: &Path, line: usize) -> Result<Vec<&'a str>> {
        let fields: Vec<&str> = row.split(',').collect();
        if fields.len() != self.width {
            return Err(FelsError::CorruptCatalogue {
                path: path.to_path_buf(),
                line,
                reason: format!(
                    "expected {} fields, found {} (incomplete download?)",
                    self.width,
                    fields.len()
                ),
            }
            .into());
        }
        Ok(self.positions.iter().map(|&idx| fields[idx]).collect())
    }
}

/// Streams every data row of `path`, passing the projected `columns` to
/// `visit`. Returns the number of rows visited.
///
/// A row with the wrong field count aborts the stream: it means the file
/// is truncated or corrupt, and a partial result must not be used.
pub fn for_each_row<F>(
    path: &Path,
    columns: &[SqlColumn],
    label: &str,
    mut visit: F,
) -> Result<usize>
where
    F: FnMut(&[&str]) -> Result<()>,
{
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);

    let mut header = String::new();
    let read = reader
        .read_line(&mut header)
        .with_context(|| format!("read header of {}", path.display()))?;
    if read == 0 {
        return Err(FelsError::CorruptCatalogue {
            path: path.to_path_buf(),
            line: 1,
            reason: "file is empty".to_string(),
        }
        .into());
    }
    let map = HeaderMap::resolve(&header, columns, path)?;

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner} {msg}: {pos} rows ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_message(label.to_string());

    let mut line = String::new();
    let mut line_no = 1usize;
    let mut rows = 0usize;
    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .with_context(|| format!("read {} line {}", path.display(), line_no + 1))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        let row = line.trim_end_matches(['\r', '\n']);
        if row.is_empty() {
            continue;
        }
        let values = map.project(row, path, line_no)?;
        visit(&values)?;
        rows += 1;
        if rows % PROGRESS_STEP == 0 {
            progress.set_position(rows as u64);
        }
    }
    progress.finish_and_clear();
    debug!(path = %path.display(), rows, "streamed catalogue");
    Ok(rows)
}

/// Reads a numeric catalogue field. ASCII blanks around the value are
/// ignored; anything that is not a finite decimal number is `None`. The
/// cache loader and the linear scan both go through here.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim_ascii()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
