//! Stage dispatch: wires readers, writers and listeners per step.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};

use wikicarto_core::queue::advance_stage_stem;
use wikicarto_core::{
    run_stage, stage_dir, ClientConfig, DirectoryListener, JsonBatchWriter, SharedProgress,
    WikiClient,
};
use wikicarto_store::SqliteWriter;
use wikicarto_wiki::{
    listing, CoordStage, DiscoverStage, Endpoints, HubConfig, IngestStage, QidStage, SummaryStage,
};

use crate::config::Config;
use crate::RunArgs;

fn client_from(config: &Config) -> WikiClient {
    WikiClient::new(ClientConfig {
        timeout: Duration::from_secs(config.http.timeout_secs),
        slow_call: Duration::from_secs_f64(config.http.slow_call_secs),
        sparql_max_retries: config.http.sparql_max_retries,
        ..ClientConfig::default()
    })
}

fn endpoints_from(config: &Config) -> Endpoints {
    Endpoints {
        wikipedia_api: config.wikipedia.api_url.clone(),
        wikipedia_rest: config.wikipedia.rest_url.clone(),
        wikipedia_pages: config.wikipedia.pages_url.clone(),
        wikidata_api: config.wikidata.api_url.clone(),
        wikidata_entity_data: config.wikidata.entity_data_url.clone(),
        wikidata_sparql: config.wikidata.sparql_url.clone(),
    }
}

/// Entry point for `wikicarto run`.
pub fn run(args: &RunArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let client = client_from(config);
    let endpoints = endpoints_from(config);

    match args.step {
        0 => run_listing(args, config, &client, &endpoints),
        1 => run_extraction(args, config, &client, &endpoints),
        2..=5 => run_listener(args, config, &client, &endpoints, progress),
        other => {
            log::error!("step {other} is not implemented");
            Ok(())
        }
    }
}

fn hub_table(args: &RunArgs, config: &Config) -> Result<HubConfig> {
    HubConfig::from_csv(&config.data.input.join(format!("{}.csv", args.run_id)))
}

/// Step 0: print the hub section tables (diagnostic, no durable output).
fn run_listing(
    args: &RunArgs,
    config: &Config,
    client: &WikiClient,
    endpoints: &Endpoints,
) -> Result<()> {
    log::info!("step 0: section listing for run {}", args.run_id);
    let hubs = hub_table(args, config)?;
    listing::print_hub_sections(client, endpoints, &hubs);
    Ok(())
}

/// Step 1: one-shot extraction, then the completion marker.
fn run_extraction(
    args: &RunArgs,
    config: &Config,
    client: &WikiClient,
    endpoints: &Endpoints,
) -> Result<()> {
    log::info!(
        "step 1: backlink extraction for run {} (cap: {:?})",
        args.run_id,
        args.max_entries
    );
    let hubs = hub_table(args, config)?;

    let out_dir = stage_dir(&config.data.root, 1);
    let mut writer = JsonBatchWriter::bounded(
        &out_dir,
        &format!("{}_Step1", args.run_id),
        &args.run_id,
        wikicarto_wiki::discover::BATCH_SIZE,
    )?;
    let mut stage = DiscoverStage::new(
        &args.run_id,
        client.clone(),
        endpoints.clone(),
        hubs,
        args.pause(),
        args.max_entries,
    );

    run_stage(&mut stage, &mut writer)?;
    writer.emit_stop_marker()?;
    Ok(())
}

/// Steps 2-5: drain the upstream directory until the marker arrives.
fn run_listener(
    args: &RunArgs,
    config: &Config,
    client: &WikiClient,
    endpoints: &Endpoints,
    progress: &SharedProgress,
) -> Result<()> {
    let step = args.step;
    let input_dir = stage_dir(&config.data.root, step - 1);
    let next_dir = (step < 5).then(|| stage_dir(&config.data.root, step));

    let listener = DirectoryListener::new(&input_dir, next_dir, &args.run_id)
        .with_poll_interval(Duration::from_secs(config.listener.poll_secs));

    let status = progress.stage_line(&format!("step {step}"));
    status.set_message(format!("watching {}", input_dir.display()));

    let outcome = listener.run(|path| {
        status.set_message(path.file_name().unwrap_or_default().to_string_lossy().into_owned());
        handle_batch_file(step, path, args, config, client, endpoints)
    });
    status.finish_and_clear();
    outcome
}

fn handle_batch_file(
    step: u32,
    input: &Path,
    args: &RunArgs,
    config: &Config,
    client: &WikiClient,
    endpoints: &Endpoints,
) -> Result<()> {
    let pause = args.pause();
    match step {
        2 => {
            let stem = advance_stage_stem(input, 1, 2)?;
            let mut writer =
                JsonBatchWriter::single(stage_dir(&config.data.root, 2), &stem, &args.run_id)?;
            let mut stage =
                QidStage::new(&args.run_id, input, client.clone(), endpoints.clone(), pause);
            run_stage(&mut stage, &mut writer)?;
        }
        3 => {
            let stem = advance_stage_stem(input, 2, 3)?;
            let mut writer =
                JsonBatchWriter::single(stage_dir(&config.data.root, 3), &stem, &args.run_id)?;
            let mut stage =
                CoordStage::new(&args.run_id, input, client.clone(), endpoints.clone(), pause);
            run_stage(&mut stage, &mut writer)?;
        }
        4 => {
            let stem = advance_stage_stem(input, 3, 4)?;
            let mut writer =
                JsonBatchWriter::single(stage_dir(&config.data.root, 4), &stem, &args.run_id)?;
            let mut stage =
                SummaryStage::new(&args.run_id, input, client.clone(), endpoints.clone(), pause);
            run_stage(&mut stage, &mut writer)?;
        }
        5 => {
            let mut writer = SqliteWriter::new(&config.database.path);
            let mut stage = IngestStage::new(
                &args.run_id,
                input,
                &config.database.path,
                client.clone(),
                endpoints.clone(),
            )?;
            run_stage(&mut stage, &mut writer)?;
        }
        other => bail!("no batch handler for step {other}"),
    }
    Ok(())
}
