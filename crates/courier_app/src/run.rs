//! Turns a loaded config and the parsed command line into engine components
//! and executes the selected command.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use courier_core::RunReport;
use courier_engine::{
    send_file, AssetStore, ConverterSettings, DeliveryOptions, FetchSettings, KarakeepClient,
    OutputDir, OutputFormat, Pipeline, PipelineSettings, ReqwestFetcher, SmtpDelivery,
    SmtpSettings,
};
use engine_logging::{engine_info, engine_warn};

use crate::cli::Cli;
use crate::config::AppConfig;

const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

pub fn purge(config: &AppConfig, keep_recent: bool) -> Result<usize> {
    let output = OutputDir::new(&config.output.output_dir);
    let removed = output
        .purge(keep_recent)
        .with_context(|| format!("failed to purge {}", output.path().display()))?;
    engine_info!("Purged {} file(s) from {}", removed, output.path().display());
    Ok(removed)
}

pub async fn send_existing(config: &AppConfig, file: &Path, cli: &Cli) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("file not found: {}", file.display());
    }
    if cli.dry_run {
        engine_info!(
            "DRY RUN: would send {} to {}",
            file.display(),
            config.kindle.email
        );
        return Ok(());
    }
    config.validate_delivery()?;
    let transport = SmtpDelivery::new(smtp_settings(config));
    send_file(&transport, file, DeliveryOptions { cleanup: cli.cleanup })
        .await
        .with_context(|| format!("failed to send {}", file.display()))?;
    engine_info!("Sent {} to {}", file.display(), config.kindle.email);
    Ok(())
}

pub async fn run_pipeline(config: &AppConfig, cli: &Cli) -> Result<RunReport> {
    let settings = pipeline_settings(config, cli)?;
    config.validate_source()?;
    if !settings.dry_run {
        config.validate_delivery()?;
    }

    let source = KarakeepClient::new(&config.karakeep.api_url, &config.karakeep.api_key)
        .context("failed to build the Karakeep client")?;
    let fetcher = ReqwestFetcher::new(fetch_settings(config))
        .map_err(|err| anyhow::anyhow!("failed to build the image fetcher: {err}"))?;
    let assets = AssetStore::new(&config.karakeep.api_url, &config.karakeep.api_key);
    let transport = SmtpDelivery::new(smtp_settings(config));

    let pipeline = Pipeline::new(
        Arc::new(source),
        Arc::new(transport),
        Arc::new(fetcher),
        OutputDir::new(&config.output.output_dir),
        settings,
    )
    .with_asset_store(assets)
    .with_converter(&converter_settings(config));

    let report = pipeline.run().await?;
    if report.failed > 0 {
        engine_warn!("{} of {} article(s) failed", report.failed, report.total);
    }
    Ok(report)
}

/// One-line outcome printed when a run finishes.
pub fn summary_line(report: &RunReport) -> String {
    let prefix = if report.dry_run { "DRY RUN: " } else { "" };
    format!(
        "{prefix}processed={} archived={} failed={}",
        report.processed, report.archived, report.failed
    )
}

pub fn pipeline_settings(config: &AppConfig, cli: &Cli) -> Result<PipelineSettings> {
    let format: OutputFormat = match cli.format {
        Some(format) => format,
        None => config.output_format()?,
    };
    Ok(PipelineSettings {
        format,
        compilation: cli.compilation,
        dry_run: cli.dry_run,
        cleanup: cli.cleanup,
        image_concurrency: config.images.concurrency.max(1),
    })
}

pub fn fetch_settings(config: &AppConfig) -> FetchSettings {
    FetchSettings {
        request_timeout: config.image_timeout(),
        max_bytes: config.images.max_bytes,
        ..FetchSettings::default()
    }
}

pub fn converter_settings(config: &AppConfig) -> ConverterSettings {
    ConverterSettings {
        timeout: config.converter_timeout(),
        embedded_epub: config.converters.embedded_epub,
        ..ConverterSettings::default()
    }
}

pub fn smtp_settings(config: &AppConfig) -> SmtpSettings {
    let kindle = &config.kindle;
    SmtpSettings {
        server: kindle.smtp_server.clone(),
        port: kindle.smtp_port,
        username: kindle.smtp_user.clone(),
        password: kindle.smtp_password.clone(),
        recipient: kindle.email.clone(),
        timeout: SMTP_TIMEOUT,
    }
}
