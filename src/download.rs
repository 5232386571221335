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

//! Product downloads.
//!
//! Landsat products are a flat set of band files next to each other.
//! Sentinel-2 products are `.SAFE` trees described by `manifest.safe`; the
//! tree is mirrored file by file.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;
use tracing::info;
use tracing::warn;
use walkdir::WalkDir;

use crate::model::Sensor;
use crate::product_id::product_name;
use crate::transfer::Fetcher;
use crate::transfer::is_not_found;

const MANIFEST: &str = "manifest.safe";
const INSPIRE: &str = "INSPIRE.xml";
const TILE_METADATA: &str = "MTD_TL.xml";
const EXTRA_DIRS: [&str; 2] = ["AUX_DATA", "HTML"];

const TM_BANDS: &[&str] = &[
    "B1.TIF", "B2.TIF", "B3.TIF", "B4.TIF", "B5.TIF", "B6.TIF", "B7.TIF", "GCP.txt", "VER.txt",
    "VER.jpg", "ANG.txt", "BQA.TIF", "MTL.txt",
];
const OLI_TIRS_BANDS: &[&str] = &[
    "B1.TIF", "B2.TIF", "B3.TIF", "B4.TIF", "B5.TIF", "B6.TIF", "B7.TIF", "B8.TIF", "B9.TIF",
    "B10.TIF", "B11.TIF", "ANG.txt", "BQA.TIF", "MTL.txt",
];
const ETM_BANDS: &[&str] = &[
    "B1.TIF",
    "B2.TIF",
    "B3.TIF",
    "B4.TIF",
    "B5.TIF",
    "B6_VCID_1.TIF",
    "B6_VCID_2.TIF",
    "B7.TIF",
    "B8.TIF",
    "ANG.txt",
    "BQA.TIF",
    "MTL.txt",
];

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub output: PathBuf,
    pub overwrite: bool,
    pub exclude_partial: bool,
    pub no_inspire: bool,
    pub reject_old: bool,
}

/// What happened to one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProductOutcome {
    Complete { path: PathBuf },
    /// Some listed files could not be fetched.
    Partial { path: PathBuf, missing: Vec<String> },
    Skipped { reason: String },
}

impl ProductOutcome {
    pub fn is_kept(&self) -> bool {
        !matches!(self, ProductOutcome::Skipped { .. })
    }
}

/// Files published for each Landsat sensor, as suffixes of the product id.
/// Sentinel-2 products are mirrored from their manifest instead.
pub fn landsat_bands(sensor: Sensor) -> &'static [&'static str] {
    match sensor {
        Sensor::Tm => TM_BANDS,
        Sensor::OliTirs => OLI_TIRS_BANDS,
        Sensor::Etm => ETM_BANDS,
        Sensor::S2 => &[],
    }
}

/// Downloads the band files of one Landsat product. Bands the sensor does
/// not publish for this product are logged and skipped.
pub fn download_landsat(
    fetcher: &Fetcher,
    url: &str,
    sensor: Sensor,
    options: &DownloadOptions,
) -> Result<ProductOutcome> {
    let img = product_name(url);
    let target = options.output.join(img);
    fs::create_dir_all(&target).with_context(|| format!("create dir {}", target.display()))?;

    for band in landsat_bands(sensor) {
        let file_name = format!("{img}_{band}");
        let dest = target.join(&file_name);
        if dest.exists() && !options.overwrite {
            info!(path = %dest.display(), "exists and --overwrite was not used, skipping");
            continue;
        }
        let band_url = format!("{}/{file_name}", url.trim_end_matches('/'));
        match fetcher.download(&band_url, &dest) {
            Ok(_) => info!(path = %dest.display(), "downloaded"),
            Err(err) if is_not_found(&err) => {
                warn!(band = *band, product = img, "could not find band image file");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(ProductOutcome::Complete { path: target })
}

/// Mirrors one Sentinel-2 `.SAFE` product below `options.output`.
pub fn download_sentinel2(
    fetcher: &Fetcher,
    url: &str,
    options: &DownloadOptions,
) -> Result<ProductOutcome> {
    let url = url.trim_end_matches('/');
    let img = product_name(url);
    let target = options.output.join(img);
    let manifest_url = format!("{url}/{MANIFEST}");

    let mut missing = Vec::new();
    if !target.exists() || options.overwrite {
        if options.reject_old {
            let body = fetcher.fetch_bytes(&manifest_url)?;
            if !is_new_format_manifest(&String::from_utf8_lossy(&body)) {
                warn!(product = img, "old-format product rejected");
                return Ok(ProductOutcome::Skipped {
                    reason: "old-format product".to_string(),
                });
            }
        }

        fs::create_dir_all(&target).with_context(|| format!("create dir {}", target.display()))?;
        let manifest_path = target.join(MANIFEST);
        fetcher.download(&manifest_url, &manifest_path)?;
        let manifest = fs::read_to_string(&manifest_path)
            .with_context(|| format!("read {}", manifest_path.display()))?;

        let hrefs = manifest_hrefs(&manifest)?;
        info!(product = img, files = hrefs.len(), "mirroring product");
        for href in &hrefs {
            let Some(dest) = local_path(&target, href) else {
                warn!(href = href.as_str(), "ignoring manifest entry outside the product");
                continue;
            };
            let file_url = format!("{url}{}", &href[1..]);
            match fetcher.download(&file_url, &dest) {
                Ok(_) => {}
                Err(err) if is_not_found(&err) => {
                    warn!(url = file_url.as_str(), "could not download product file");
                    missing.push(href.clone());
                }
                Err(err) => return Err(err),
            }
        }
        create_extra_dirs(&target)?;
    } else if options.reject_old && !is_new_format_dir(&target) {
        warn!(path = %target.display(), "old-format product already exists");
        return Ok(ProductOutcome::Skipped {
            reason: "old-format product".to_string(),
        });
    }

    finish_sentinel2(&target, missing, options)
}

/// Local steps after the files are in place: partial handling and the
/// INSPIRE rename.
pub fn finish_sentinel2(
    target: &Path,
    missing: Vec<String>,
    options: &DownloadOptions,
) -> Result<ProductOutcome> {
    if !missing.is_empty() && options.exclude_partial {
        info!(path = %target.display(), missing = missing.len(), "removing partial tile");
        fs::remove_dir_all(target).with_context(|| format!("remove {}", target.display()))?;
        return Ok(ProductOutcome::Skipped {
            reason: format!("partial tile, {} files missing", missing.len()),
        });
    }

    let mut path = target.to_path_buf();
    if !options.no_inspire {
        let inspire = target.join(INSPIRE);
        if !inspire.is_file() {
            warn!(path = %inspire.display(), "file could not be found");
            return Ok(ProductOutcome::Skipped {
                reason: format!("{INSPIRE} is missing"),
            });
        }
        let text = fs::read_to_string(&inspire)
            .with_context(|| format!("read {}", inspire.display()))?;
        let title = inspire_title(&text)?
            .with_context(|| format!("no title in {}", inspire.display()))?;
        let current = target.file_name().and_then(|name| name.to_str());
        if current != Some(title.as_str()) {
            if title.contains(['/', '\\']) || title == "." || title == ".." {
                bail!("refusing to rename product to {title:?}");
            }
            let renamed = target.with_file_name(&title);
            fs::rename(target, &renamed).with_context(|| {
                format!("rename {} to {}", target.display(), renamed.display())
            })?;
            path = renamed;
        }
    }

    if missing.is_empty() {
        Ok(ProductOutcome::Complete { path })
    } else {
        Ok(ProductOutcome::Partial { path, missing })
    }
}

/// `href` values of file locations in a manifest, in document order.
pub fn manifest_hrefs(manifest: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(manifest);
    let mut hrefs = Vec::new();
    loop {
        match reader.read_event().context("parse manifest")? {
            Event::Start(element) | Event::Empty(element) => {
                if let Some(attr) = element
                    .try_get_attribute("href")
                    .context("parse manifest attribute")?
                {
                    let value = attr.unescape_value().context("decode manifest href")?;
                    if value.starts_with("./") {
                        hrefs.push(value.into_owned());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(hrefs)
}

/// Maps `./a/b` to `target/a/b`. Entries escaping the product are refused.
fn local_path(target: &Path, href: &str) -> Option<PathBuf> {
    let mut path = target.to_path_buf();
    let mut pushed = false;
    for segment in href.split('/').skip(1) {
        match segment {
            "" | "." => continue,
            ".." => return None,
            name => {
                path.push(name);
                pushed = true;
            }
        }
    }
    pushed.then_some(path)
}

fn create_extra_dirs(target: &Path) -> Result<()> {
    let mut roots = vec![target.to_path_buf()];
    let granules = target.join("GRANULE");
    if granules.is_dir() {
        for entry in fs::read_dir(&granules)
            .with_context(|| format!("read dir {}", granules.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                roots.push(entry.path());
            }
        }
    }
    for root in roots {
        for extra in EXTRA_DIRS {
            let dir = root.join(extra);
            fs::create_dir_all(&dir).with_context(|| format!("create dir {}", dir.display()))?;
        }
    }
    Ok(())
}

/// New-format products (after November 2016) reference exactly one tile
/// metadata file.
pub fn is_new_format_manifest(manifest: &str) -> bool {
    manifest
        .split_whitespace()
        .filter(|token| token.contains(TILE_METADATA))
        .count()
        == 1
}

/// Same check on a downloaded product: exactly one `GRANULE/*/MTD_TL.xml`.
pub fn is_new_format_dir(safe_dir: &Path) -> bool {
    WalkDir::new(safe_dir.join("GRANULE"))
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == TILE_METADATA)
        .count()
        == 1
}

const TITLE_PATH: [&[u8]; 6] = [
    b"identificationInfo",
    b"MD_DataIdentification",
    b"citation",
    b"CI_Citation",
    b"title",
    b"CharacterString",
];

fn at_title(stack: &[Vec<u8>]) -> bool {
    stack.len() >= TITLE_PATH.len()
        && stack[stack.len() - TITLE_PATH.len()..]
            .iter()
            .zip(TITLE_PATH)
            .all(|(open, expected)| open.as_slice() == expected)
}

/// Product title recorded in an INSPIRE metadata document.
pub fn inspire_title(xml: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    loop {
        match reader.read_event().context("parse INSPIRE metadata")? {
            Event::Start(element) => stack.push(element.local_name().as_ref().to_vec()),
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) if at_title(&stack) => {
                let title = text.unescape().context("decode INSPIRE title")?;
                let title = title.trim();
                if !title.is_empty() {
                    return Ok(Some(title.to_string()));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::http_fixture::LocalServer;
    use crate::http_fixture::Route;
    use crate::transfer::RetryPolicy;

    const MANIFEST_NEW: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xfdu:XFDU xmlns:xfdu="urn:ccsds:schema:xfdu:1">
  <dataObjectSection>
    <dataObject ID="S2_Level-1C_Tile1_Metadata">
      <byteStream mimeType="text/xml" size="1">
        <fileLocation locatorType="URL" href="./GRANULE/L1C_T52SDG_A008/MTD_TL.xml"/>
      </byteStream>
    </dataObject>
    <dataObject ID="IMG_DATA_Band_60m_1_Tile1_Data">
      <byteStream mimeType="application/octet-stream" size="1">
        <fileLocation locatorType="URL" href="./GRANULE/L1C_T52SDG_A008/IMG_DATA/T52SDG_B01.jp2"/>
      </byteStream>
    </dataObject>
    <dataObject ID="INSPIRE_Metadata">
      <byteStream mimeType="text/xml" size="1">
        <fileLocation locatorType="URL" href="./INSPIRE.xml"></fileLocation>
      </byteStream>
    </dataObject>
    <dataObject ID="External"><fileLocation href="http://elsewhere/x"/></dataObject>
  </dataObjectSection>
</xfdu:XFDU>"#;

    const INSPIRE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gmd:MD_Metadata xmlns:gmd="http://www.isotc211.org/2005/gmd" xmlns:gco="http://www.isotc211.org/2005/gco">
  <gmd:fileIdentifier><gco:CharacterString>ignored</gco:CharacterString></gmd:fileIdentifier>
  <gmd:identificationInfo>
    <gmd:MD_DataIdentification>
      <gmd:citation>
        <gmd:CI_Citation>
          <gmd:title>
            <gco:CharacterString>S2B_MSIL1C_20181010T021649_N0206_R003_T52SDG_20181010T064007.SAFE</gco:CharacterString>
          </gmd:title>
        </gmd:CI_Citation>
      </gmd:citation>
    </gmd:MD_DataIdentification>
  </gmd:identificationInfo>
</gmd:MD_Metadata>"#;

    #[test]
    fn manifest_lists_local_file_locations() -> Result<()> {
        let hrefs = manifest_hrefs(MANIFEST_NEW)?;
        assert_eq!(
            hrefs,
            vec![
                "./GRANULE/L1C_T52SDG_A008/MTD_TL.xml",
                "./GRANULE/L1C_T52SDG_A008/IMG_DATA/T52SDG_B01.jp2",
                "./INSPIRE.xml",
            ]
        );
        Ok(())
    }

    #[test]
    fn href_maps_below_target() {
        let target = Path::new("/out/P.SAFE");
        assert_eq!(
            local_path(target, "./GRANULE/G/IMG_DATA/B01.jp2"),
            Some(PathBuf::from("/out/P.SAFE/GRANULE/G/IMG_DATA/B01.jp2"))
        );
        assert_eq!(local_path(target, "./../escape"), None);
        assert_eq!(local_path(target, "./"), None);
    }

    #[test]
    fn format_detection_from_manifest() {
        assert!(is_new_format_manifest(MANIFEST_NEW));
        let doubled = format!("{MANIFEST_NEW} href=\"./GRANULE/other/MTD_TL.xml\"");
        assert!(!is_new_format_manifest(&doubled));
        assert!(!is_new_format_manifest("<XFDU/>"));
    }

    #[test]
    fn format_detection_from_directory() -> Result<()> {
        let dir = tempdir()?;
        let granule = dir.path().join("GRANULE").join("L1C_T52SDG_A008");
        fs::create_dir_all(&granule)?;
        assert!(!is_new_format_dir(dir.path()));
        fs::write(granule.join(TILE_METADATA), "<x/>")?;
        assert!(is_new_format_dir(dir.path()));
        let second = dir.path().join("GRANULE").join("L1C_T52SDG_A009");
        fs::create_dir_all(&second)?;
        fs::write(second.join(TILE_METADATA), "<x/>")?;
        assert!(!is_new_format_dir(dir.path()));
        Ok(())
    }

    #[test]
    fn inspire_title_follows_citation_path() -> Result<()> {
        assert_eq!(
            inspire_title(INSPIRE_XML)?.as_deref(),
            Some("S2B_MSIL1C_20181010T021649_N0206_R003_T52SDG_20181010T064007.SAFE")
        );
        assert_eq!(inspire_title("<root><title>x</title></root>")?, None);
        Ok(())
    }

    #[test]
    fn finish_renames_to_inspire_title() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("download.SAFE");
        fs::create_dir_all(&target)?;
        fs::write(target.join(INSPIRE), INSPIRE_XML)?;

        let options = DownloadOptions {
            output: dir.path().to_path_buf(),
            ..DownloadOptions::default()
        };
        let outcome = finish_sentinel2(&target, Vec::new(), &options)?;
        let expected =
            dir.path().join("S2B_MSIL1C_20181010T021649_N0206_R003_T52SDG_20181010T064007.SAFE");
        assert_eq!(outcome, ProductOutcome::Complete { path: expected.clone() });
        assert!(expected.join(INSPIRE).is_file());
        assert!(!target.exists());
        Ok(())
    }

    #[test]
    fn finish_without_inspire_is_skipped_unless_disabled() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("P.SAFE");
        fs::create_dir_all(&target)?;

        let strict = DownloadOptions::default();
        assert!(!finish_sentinel2(&target, Vec::new(), &strict)?.is_kept());

        let lenient = DownloadOptions {
            no_inspire: true,
            ..DownloadOptions::default()
        };
        let outcome = finish_sentinel2(&target, vec!["./a.jp2".to_string()], &lenient)?;
        assert!(matches!(
            outcome,
            ProductOutcome::Partial { ref missing, .. } if missing.len() == 1
        ));
        Ok(())
    }

    #[test]
    fn excluded_partial_tiles_are_removed() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("P.SAFE");
        fs::create_dir_all(target.join("GRANULE"))?;
        let options = DownloadOptions {
            exclude_partial: true,
            no_inspire: true,
            ..DownloadOptions::default()
        };
        let outcome = finish_sentinel2(&target, vec!["./x".to_string()], &options)?;
        assert!(!outcome.is_kept());
        assert!(!target.exists());
        Ok(())
    }

    #[test]
    fn extra_dirs_created_at_product_and_granule_level() -> Result<()> {
        let dir = tempdir()?;
        let granule = dir.path().join("GRANULE").join("G1");
        fs::create_dir_all(&granule)?;
        create_extra_dirs(dir.path())?;
        for root in [dir.path().to_path_buf(), granule] {
            assert!(root.join("AUX_DATA").is_dir());
            assert!(root.join("HTML").is_dir());
        }
        Ok(())
    }

    #[test]
    fn band_lists_per_sensor() {
        assert_eq!(landsat_bands(Sensor::OliTirs).len(), 14);
        assert!(landsat_bands(Sensor::Etm).contains(&"B6_VCID_2.TIF"));
        assert!(landsat_bands(Sensor::Tm).contains(&"VER.jpg"));
        assert!(landsat_bands(Sensor::S2).is_empty());
    }

    const PRODUCT: &str = "/tiles/P.SAFE";

    fn fetcher() -> Fetcher {
        Fetcher::direct(RetryPolicy::immediate(1)).expect("http client")
    }

    #[test]
    fn sentinel2_with_missing_file_is_partial() -> Result<()> {
        let server = LocalServer::serve(vec![
            ("/tiles/P.SAFE/manifest.safe", Route::ok(MANIFEST_NEW)),
            ("/tiles/P.SAFE/GRANULE/L1C_T52SDG_A008/MTD_TL.xml", Route::ok("<tile/>")),
            ("/tiles/P.SAFE/INSPIRE.xml", Route::ok(INSPIRE_XML)),
        ]);
        let dir = tempdir()?;
        let options = DownloadOptions {
            output: dir.path().to_path_buf(),
            no_inspire: true,
            ..DownloadOptions::default()
        };

        let outcome = download_sentinel2(&fetcher(), &server.url(PRODUCT), &options)?;
        let target = dir.path().join("P.SAFE");
        assert_eq!(
            outcome,
            ProductOutcome::Partial {
                path: target.clone(),
                missing: vec!["./GRANULE/L1C_T52SDG_A008/IMG_DATA/T52SDG_B01.jp2".to_string()],
            }
        );
        assert!(target.join(MANIFEST).is_file());
        assert!(target.join("GRANULE/L1C_T52SDG_A008/MTD_TL.xml").is_file());
        assert!(!target.join("GRANULE/L1C_T52SDG_A008/IMG_DATA/T52SDG_B01.jp2").exists());
        assert!(target.join("GRANULE/L1C_T52SDG_A008/AUX_DATA").is_dir());
        Ok(())
    }

    #[test]
    fn sentinel2_renamed_after_inspire_title() -> Result<()> {
        let server = LocalServer::serve(vec![
            ("/tiles/P.SAFE/manifest.safe", Route::ok(MANIFEST_NEW)),
            ("/tiles/P.SAFE/GRANULE/L1C_T52SDG_A008/MTD_TL.xml", Route::ok("<tile/>")),
            ("/tiles/P.SAFE/GRANULE/L1C_T52SDG_A008/IMG_DATA/T52SDG_B01.jp2", Route::ok("jp2")),
            ("/tiles/P.SAFE/INSPIRE.xml", Route::ok(INSPIRE_XML)),
        ]);
        let dir = tempdir()?;
        let options = DownloadOptions {
            output: dir.path().to_path_buf(),
            ..DownloadOptions::default()
        };

        let outcome = download_sentinel2(&fetcher(), &server.url(PRODUCT), &options)?;
        let renamed =
            dir.path().join("S2B_MSIL1C_20181010T021649_N0206_R003_T52SDG_20181010T064007.SAFE");
        assert_eq!(outcome, ProductOutcome::Complete { path: renamed.clone() });
        assert!(renamed.join("GRANULE/L1C_T52SDG_A008/IMG_DATA/T52SDG_B01.jp2").is_file());
        assert!(!dir.path().join("P.SAFE").exists());
        Ok(())
    }

    #[test]
    fn reject_old_stops_after_the_manifest() -> Result<()> {
        let old = format!("{MANIFEST_NEW} href=\"./GRANULE/other/MTD_TL.xml\"");
        let server = LocalServer::serve(vec![("/tiles/P.SAFE/manifest.safe", Route::ok(old))]);
        let dir = tempdir()?;
        let options = DownloadOptions {
            output: dir.path().to_path_buf(),
            reject_old: true,
            ..DownloadOptions::default()
        };

        let outcome = download_sentinel2(&fetcher(), &server.url(PRODUCT), &options)?;
        assert!(matches!(outcome, ProductOutcome::Skipped { .. }));
        assert_eq!(server.hits(), vec!["/tiles/P.SAFE/manifest.safe"]);
        assert!(!dir.path().join("P.SAFE").exists());
        Ok(())
    }

    #[test]
    fn landsat_missing_bands_are_tolerated() -> Result<()> {
        let img = "LC08_L1TP_115034_20160715_20170222_01_T1";
        let band = format!("/landsat/{img}/{img}_B1.TIF");
        let mtl = format!("/landsat/{img}/{img}_MTL.txt");
        let server = LocalServer::serve(vec![
            (band.as_str(), Route::ok("b1")),
            (mtl.as_str(), Route::ok("mtl")),
        ]);
        let dir = tempdir()?;
        let options = DownloadOptions {
            output: dir.path().to_path_buf(),
            ..DownloadOptions::default()
        };

        let url = server.url(&format!("/landsat/{img}"));
        let outcome = download_landsat(&fetcher(), &url, Sensor::OliTirs, &options)?;
        let target = dir.path().join(img);
        assert_eq!(outcome, ProductOutcome::Complete { path: target.clone() });
        assert_eq!(server.hits().len(), landsat_bands(Sensor::OliTirs).len());
        assert_eq!(fs::read_to_string(target.join(format!("{img}_B1.TIF")))?, "b1");
        assert!(target.join(format!("{img}_MTL.txt")).is_file());
        assert!(!target.join(format!("{img}_B2.TIF")).exists());
        Ok(())
    }

    #[test]
    fn landsat_hard_failure_is_an_error() -> Result<()> {
        let img = "LE07_L1GT_115034_20160707_20161009_01_T2";
        let band = format!("/landsat/{img}/{img}_B1.TIF");
        let server = LocalServer::serve(vec![(band.as_str(), Route::status(403))]);
        let dir = tempdir()?;
        let options = DownloadOptions {
            output: dir.path().to_path_buf(),
            ..DownloadOptions::default()
        };

        let url = server.url(&format!("/landsat/{img}"));
        let err = download_landsat(&fetcher(), &url, Sensor::Etm, &options).unwrap_err();
        assert!(format!("{err:#}").contains("403"));
        assert_eq!(server.hits().len(), 1);
        Ok(())
    }
}
