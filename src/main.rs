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

use std::time::Instant;

use anyhow::Context as _;
use anyhow::Result;
use clap::Parser;
use fels::cache::CatalogCache;
use fels::cli::Cli;
use fels::config::Config;
use fels::config::load_global_config;
use fels::download::DownloadOptions;
use fels::error::FelsError;
use fels::error::error_code;
use fels::model::Sensor;
use fels::output::JsonResponse;
use fels::output::NO_IMAGE_MESSAGE;
use fels::output::QueryOut;
use fels::output::StatsOut;
use fels::output::empty_scene_warnings;
use fels::output::print_json;
use fels::query::DATE_FORMAT;
use fels::query::Lookup;
use fels::query::parse_date;
use fels::run::FelsOptions;
use fels::run::ItemKind;
use fels::run::SceneResult;
use fels::run::SceneTarget;
use fels::run::run_fels;
use fels::scene::Containment;
use fels::transfer::Fetcher;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let json = cli.json;
    if let Err(err) = run(cli) {
        handle_error(&err, json);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fels={level}")));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn handle_error(err: &anyhow::Error, json: bool) {
    if json {
        let resp = JsonResponse::error(error_code(err), &format!("{err:#}"));
        let resp = match err.downcast_ref::<FelsError>() {
            Some(FelsError::CorruptCatalogue { .. }) => {
                resp.with_hint("delete the catalogue files and run again")
            }
            Some(FelsError::UnknownSensor(_)) => resp.with_hint("use TM, ETM, OLI_TIRS or S2"),
            _ => resp,
        };
        if print_json(&resp).is_ok() {
            return;
        }
    }
    eprintln!("error: {err:#}");
}

fn run(cli: Cli) -> Result<()> {
    let started = Instant::now();
    let config = load_global_config().context("load config")?;
    let options = build_options(&cli, &config)?;
    debug!(?options, "resolved options");

    let fetcher = Fetcher::new(config.retry_policy(), config.timeout_secs)?;
    let mut cache = CatalogCache::new();
    let announce = !cli.json && !cli.list;
    let results = run_fels(&mut cache, &fetcher, &options, |_, found| {
        if announce {
            print_found(found.len());
        }
    });
    let closed = cache.close();
    let results = results?;
    closed.context("close catalogue cache")?;

    if cli.json {
        let took_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let resp = JsonResponse::ok()
            .with_query(query_out(&cli, &options)?)
            .with_warnings(empty_scene_warnings(&results))
            .with_stats(StatsOut::from_results(&results, took_ms))
            .with_results(&results);
        return print_json(&resp);
    }
    if cli.list {
        print_listing(&results);
    }
    Ok(())
}

fn print_found(count: usize) {
    if count == 0 {
        println!("{NO_IMAGE_MESSAGE}");
    } else {
        println!("Found {count} files.");
    }
}

fn print_listing(results: &[SceneResult]) {
    for result in results {
        print_found(result.found.len());
        for item in &result.items {
            println!("{item}");
        }
    }
}

fn build_options(cli: &Cli, config: &Config) -> Result<FelsOptions> {
    let positionals = cli.positionals()?;
    let sensor: Sensor = positionals.sat.parse()?;
    let start = parse_date(positionals.start_date)?;
    let end = parse_date(positionals.end_date)?;
    if start > end {
        return Err(FelsError::InvalidArgument(format!(
            "start date {} is after end date {}",
            positionals.start_date, positionals.end_date
        ))
        .into());
    }

    let target = match (&cli.geometry, positionals.scene) {
        (Some(text), _) => SceneTarget::Geometry {
            text: text.clone(),
            containment: Containment::from_flags(cli.include_overlap, cli.min_overlap())?,
        },
        (None, Some(scene)) => SceneTarget::Scene(scene.to_string()),
        (None, None) => {
            return Err(FelsError::InvalidArgument(
                "a scene or --geometry is required".to_string(),
            )
            .into());
        }
    };

    let catalog_dir = cli
        .output_catalogs
        .clone()
        .unwrap_or_else(|| config.catalog_dir());
    let grid_dir = cli
        .grid_dir
        .clone()
        .unwrap_or_else(|| config.grid_dir(&catalog_dir));
    let download = (!cli.list).then(|| DownloadOptions {
        output: cli.output.clone(),
        overwrite: cli.overwrite,
        exclude_partial: cli.exclude_partial,
        no_inspire: cli.no_inspire,
        reject_old: cli.reject_old,
    });

    Ok(FelsOptions {
        sensor,
        target,
        start,
        end,
        max_cloud_cover: cli.cloud_cover,
        latest: cli.latest,
        lookup: if cli.use_csv { Lookup::Scan } else { Lookup::Cache },
        catalog_dir,
        grid_dir,
        items: if cli.dates { ItemKind::Dates } else { ItemKind::Urls },
        download,
    })
}

fn query_out(cli: &Cli, options: &FelsOptions) -> Result<QueryOut> {
    let (scene, geometry) = match &options.target {
        SceneTarget::Scene(scene) => (Some(scene.clone()), None),
        SceneTarget::Geometry { text, .. } => (None, Some(text.clone())),
    };
    Ok(QueryOut {
        sensor: options.sensor.code().to_string(),
        scene,
        geometry,
        start: options.start.format(DATE_FORMAT).context("format start date")?,
        end: options.end.format(DATE_FORMAT).context("format end date")?,
        latest: options.latest,
        lookup: options.lookup.as_str().to_string(),
        items: options.items,
        download: !cli.list,
    })
}
