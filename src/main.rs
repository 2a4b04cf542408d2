use anyhow::Context;
use std::sync::Arc;
use tender_task_client::binder::TaskView;
use tender_task_client::client::types::UploadFile;
use tender_task_client::*;
use tracing_subscriber::EnvFilter;

/// Usage: `tender-client [tender.json]`
///
/// Loads the configuration, checks the service is up and, when a tender JSON
/// file is given, generates a bid proposal and downloads the artifacts into
/// `./downloads`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config().await?;
    let api = Arc::new(ApiClient::from_config(&config)?);

    let health = api.health().await.context("service health check failed")?;
    tracing::info!(base_url = api.base_url(), %health, "service is up");

    let Some(path) = std::env::args().nth(1) else {
        return Ok(());
    };

    let generator = BidProposalGenerator::new(api.clone(), &config);
    let file = UploadFile::from_path(&path).await?;
    let created = generator
        .generate(Some(file), generator.default_options())
        .await?;
    tracing::info!(task_id = %created.task_id, "bid proposal task created");

    let mut views = generator.subscribe();
    let finished = loop {
        views.changed().await?;
        let view = views.borrow_and_update().clone();
        if let TaskView::Progress { percent, message, .. } = &view {
            tracing::info!(percent = *percent, %message, "generating");
        }
        if matches!(view, TaskView::Completed { .. } | TaskView::Failed { .. }) {
            break view;
        }
    };

    let dest = std::path::Path::new("downloads");
    match finished {
        TaskView::Completed { downloads, .. } if !downloads.is_empty() => {
            for action in downloads {
                let path = generator.download(action.kind, &action.filename, dest).await?;
                tracing::info!(path = %path.display(), "downloaded");
            }
        }
        TaskView::Completed { .. } => {
            if let Some(blob) = generator.inline_download().await {
                let path = blob.save(dest).await?;
                tracing::info!(path = %path.display(), "saved generated text");
            }
        }
        TaskView::Failed { error, .. } => anyhow::bail!("generation failed: {}", error),
        _ => {}
    }

    Ok(())
}

/// `TENDER_CONFIG` may name a local file or a URL; otherwise the document is
/// fetched from the service origin.
async fn load_config() -> anyhow::Result<ClientConfig> {
    let config = match std::env::var("TENDER_CONFIG") {
        Ok(source) if source.starts_with("http://") || source.starts_with("https://") => {
            ClientConfig::load(&source).await
        }
        Ok(path) => ClientConfig::from_file(&path)
            .await
            .with_context(|| format!("failed to read config file {}", path))?,
        Err(_) => {
            let base = std::env::var(config::BASE_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
            let url = format!("{}{}", base.trim_end_matches('/'), DEFAULT_CONFIG_PATH);
            ClientConfig::load(&url).await
        }
    };
    Ok(config.with_env_overrides())
}
