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

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// Rows B and C tie on cloud cover and sensing time; D and E only differ in
// the processing baseline.
const S2_INDEX: &str = "GRANULE_ID,PRODUCT_ID,DATATAKE_IDENTIFIER,MGRS_TILE,SENSING_TIME,TOTAL_SIZE,CLOUD_COVER,GEOMETRIC_QUALITY_FLAG,GENERATION_TIME,NORTH_LAT,SOUTH_LAT,WEST_LON,EAST_LON,BASE_URL\n\
L1C_A,S2A_MSIL1C_20200101T021651_N0208_R003_T52SDG_20200101T050722,D1,52SDG,2020-01-01T02:16:51Z,1,5.0,PASSED,2020-01-01T05:07:22Z,1,0,0,1,gs://gcp-public-data-sentinel-2/tiles/52/S/DG/S2A_MSIL1C_20200101T021651_N0208_R003_T52SDG_20200101T050722.SAFE\n\
L1C_B,S2A_MSIL1C_20200301T021651_N0208_R003_T52SDG_20200301T050722,D2,52SDG,2020-03-01T02:16:51Z,1,5.0,PASSED,2020-03-01T05:07:22Z,1,0,0,1,gs://gcp-public-data-sentinel-2/tiles/52/S/DG/S2A_MSIL1C_20200301T021651_N0208_R003_T52SDG_20200301T050722.SAFE\n\
L1C_C,S2B_MSIL1C_20200301T021651_N0208_R003_T52SDG_20200301T050722,D3,52SDG,2020-03-01T02:16:51Z,1,5.0,PASSED,2020-03-01T05:07:22Z,1,0,0,1,gs://gcp-public-data-sentinel-2/tiles/52/S/DG/S2B_MSIL1C_20200301T021651_N0208_R003_T52SDG_20200301T050722.SAFE\n\
L1C_D,S2A_MSIL1C_20200601T021651_N0208_R003_T52SDG_20200601T050722,D4,52SDG,2020-06-01T02:16:51Z,1,12.0,PASSED,2020-06-01T05:07:22Z,1,0,0,1,gs://gcp-public-data-sentinel-2/tiles/52/S/DG/S2A_MSIL1C_20200601T021651_N0208_R003_T52SDG_20200601T050722.SAFE\n\
L1C_E,S2A_MSIL1C_20200601T021651_N0209_R003_T52SDG_20200601T090000,D5,52SDG,2020-06-01T02:16:51Z,1,12.0,PASSED,2020-06-01T09:00:00Z,1,0,0,1,gs://gcp-public-data-sentinel-2/tiles/52/S/DG/S2A_MSIL1C_20200601T021651_N0209_R003_T52SDG_20200601T090000.SAFE\n";

fn fels_cmd(catalogs: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fels"));
    cmd.env("FELS_CONFIG", catalogs.join("absent.toml"));
    cmd.env_remove("RUST_LOG");
    cmd.arg("--outputcatalogs").arg(catalogs);
    cmd.current_dir(catalogs);
    cmd
}

fn normalize_json(mut value: Value) -> Value {
    if let Some(stats) = value.get_mut("stats")
        && let Some(obj) = stats.as_object_mut()
    {
        obj.insert("took_ms".to_string(), json!(0));
    }
    if let Some(query) = value.get_mut("query")
        && let Some(obj) = query.as_object_mut()
    {
        obj.remove("lookup");
    }
    value
}

fn run_stdout(args: &[&str], cwd: &Path) -> String {
    let output = fels_cmd(cwd).args(args).output().expect("run fels");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf8 stdout")
}

fn assert_repeatable(args: &[&str], runs: usize, cwd: &Path) -> String {
    let mut baseline: Option<String> = None;
    for _ in 0..runs {
        let stdout = run_stdout(args, cwd);
        if let Some(ref expected) = baseline {
            assert_eq!(&stdout, expected);
        } else {
            baseline = Some(stdout);
        }
    }
    baseline.unwrap_or_default()
}

#[test]
fn deterministic_outputs() {
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    fs::write(root.join("index_Sentinel.csv"), S2_INDEX).expect("write index");

    let listing = assert_repeatable(&["52SDG", "S2", "2020-01-01", "2020-12-31", "-l"], 10, root);
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines[0], "Found 5 files.");
    let expected_heads = [
        "S2B_MSIL1C_20200301T021651_N0208_R003_T52SDG_20200301T050722.SAFE",
        "S2A_MSIL1C_20200301T021651_N0208_R003_T52SDG_20200301T050722.SAFE",
        "S2A_MSIL1C_20200101T021651_N0208_R003_T52SDG_20200101T050722.SAFE",
    ];
    for (line, product) in lines[1..].iter().zip(expected_heads) {
        assert!(line.ends_with(product), "{line}");
    }

    // The first run above built the cache; the scan path must agree with it.
    let scanned = assert_repeatable(
        &["52SDG", "S2", "2020-01-01", "2020-12-31", "-l", "--use-csv"],
        3,
        root,
    );
    assert_eq!(scanned, listing);

    let latest = assert_repeatable(
        &["52SDG", "S2", "2020-01-01", "2020-12-31", "-l", "--latest", "-d"],
        5,
        root,
    );
    assert_eq!(latest, "Found 1 files.\n2020-03-01\n");
}

#[test]
fn json_matches_across_lookups() {
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    fs::write(root.join("index_Sentinel.csv"), S2_INDEX).expect("write index");

    let args = ["52SDG", "S2", "2020-01-01", "2020-12-31", "-l", "--json"];
    let cached: Value = serde_json::from_str(&run_stdout(&args, root)).expect("parse json");
    let mut scan_args = args.to_vec();
    scan_args.push("--use-csv");
    let scanned: Value = serde_json::from_str(&run_stdout(&scan_args, root)).expect("parse json");
    assert_eq!(normalize_json(cached), normalize_json(scanned));
}
