//! Command handlers.

use crate::config::Settings;
use anyhow::Context;
use console::style;
use gridiron_api::{AppState, DatasetService, create_router};
use gridiron_cache::ResponseCache;
use gridiron_core::ports::{SourceReader, Warehouse};
use gridiron_core::{Dataset, LoadRequest, Seasons};
use gridiron_db::{Database, MemoryWarehouse};
use gridiron_loader::{IncrementalLoader, LoadScheduler};
use gridiron_source::HttpSourceReader;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

fn source(settings: &Settings) -> anyhow::Result<Arc<dyn SourceReader>> {
    Ok(Arc::new(HttpSourceReader::new(settings.source.clone())?))
}

async fn warehouse(settings: &Settings, in_memory: bool) -> anyhow::Result<Arc<dyn Warehouse>> {
    if in_memory {
        info!("Using in-memory warehouse");
        return Ok(Arc::new(MemoryWarehouse::new()));
    }
    let db = Database::connect(&settings.database)
        .await
        .with_context(|| format!("connecting to {}", settings.database.redacted_url()))?;
    Ok(Arc::new(db.warehouse()))
}

async fn loader(settings: &Settings, in_memory: bool) -> anyhow::Result<IncrementalLoader> {
    settings.loader.validate()?;
    Ok(
        IncrementalLoader::new(source(settings)?, warehouse(settings, in_memory).await?, &settings.loader.schema)
            .with_retry(settings.loader.retry_policy()),
    )
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

/// Serve the dataset API until interrupted.
pub async fn serve(settings: Settings, bind: Option<String>) -> anyhow::Result<()> {
    let cache = Arc::new(ResponseCache::new(settings.cache.clone())?);
    let state = Arc::new(AppState::new(cache, DatasetService::new(source(&settings)?)));
    let bind = bind.unwrap_or(settings.server.bind);

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    info!(bind = %bind, "API server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Load one dataset and print the outcome.
pub async fn load(
    settings: &Settings,
    dataset: Dataset,
    seasons: Option<String>,
    incremental_key: Option<String>,
    in_memory: bool,
) -> anyhow::Result<()> {
    let seasons = match seasons {
        Some(raw) => Seasons::parse_list(&raw)?,
        None => Seasons::all(),
    };
    let mut request = LoadRequest::new(dataset, seasons);
    if let Some(key) = incremental_key {
        request = request.with_incremental_key(key);
    }

    let outcome = loader(settings, in_memory).await?.run(&request).await?;

    let mark = if outcome.is_skipped() {
        style("-").yellow()
    } else {
        style("✓").green()
    };
    println!(
        "{} {} rows_loaded={} rows_updated={}",
        mark,
        style(dataset).bold(),
        outcome.rows_loaded,
        outcome.rows_updated
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Run the scheduled pipeline, once or until interrupted.
pub async fn schedule(settings: &Settings, once: bool, in_memory: bool) -> anyhow::Result<()> {
    let loader = Arc::new(loader(settings, in_memory).await?);
    let scheduler = LoadScheduler::new(loader, &settings.schedule)?;

    if once {
        let report = scheduler.run_once().await?;
        println!(
            "{} Pipeline completed: {} loads, {} quality reports, {} downstream jobs",
            style("✓").green(),
            report.loads.len(),
            report.quality.len(),
            report.downstream.len()
        );
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    scheduler.run(shutdown_signal()).await;
    Ok(())
}

/// Validate settings and print them with the database password redacted.
pub fn check_config(settings: &Settings) -> anyhow::Result<()> {
    settings.cache.validate()?;
    settings.source.validate()?;
    settings.loader.validate()?;
    settings.schedule.parsed_cron()?;
    for job in &settings.schedule.jobs {
        gridiron_core::TableRef::new(&settings.loader.schema, job.dataset.as_str())?;
    }

    let mut redacted = settings.clone();
    redacted.database.password = "***".to_string();
    print!("{}", serde_yaml::to_string(&redacted)?);
    println!("{} Configuration is valid", style("✓").green());
    Ok(())
}
