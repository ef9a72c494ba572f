use std::path::{Path, PathBuf};

use icon_copier::config::{self, Config, Source};
use icon_copier::export::{self, ExportItem, ExportPipeline};
use icon_copier::{DroppedItem, IngestSettings, IngestionCoordinator, ItemReference};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn find_config() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));

    let candidates = [
        exe_dir.as_ref().map(|d| d.join("config.json")),
        Some(PathBuf::from("config.json")),
    ];

    for candidate in candidates.iter().flatten() {
        if candidate.exists() {
            info!(path = %candidate.display(), "found config");
            return candidate.clone();
        }
    }

    PathBuf::from("config.json")
}

/// Paths given on the command line are appended to the configured sources.
fn collect_sources(config: &Config) -> Vec<Source> {
    config
        .sources
        .iter()
        .cloned()
        .chain(std::env::args_os().skip(1).map(|arg| Source {
            name: None,
            path: PathBuf::from(arg),
        }))
        .map(Source::into_absolute)
        .collect()
}

fn export_label(sources: &[Source], source_path: &Path) -> Option<String> {
    sources
        .iter()
        .find(|s| s.path == source_path)
        .and_then(|s| s.name.clone())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = find_config();
    let config = config::load_config(&config_path).unwrap_or_else(|e| {
        error!(path = %config_path.display(), error = %e, "failed to load config");
        Config::default()
    });

    let sources = collect_sources(&config);
    info!(sources = sources.len(), "config loaded");

    let mut items: Vec<Box<dyn ItemReference>> = Vec::with_capacity(sources.len());
    for source in &sources {
        match DroppedItem::from_path(&source.path) {
            Some(item) => items.push(Box::new(item)),
            None => warn!(path = %source.path.display(), "source is not a file path"),
        }
    }

    let coordinator = IngestionCoordinator::new(IngestSettings::from(&config));
    let report = match coordinator.ingest(items).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "ingestion rejected");
            return;
        }
    };
    if report.results.is_empty() {
        info!("no icons to export");
        return;
    }

    let Some(folder) = config.export_dir.clone().or_else(export::default_export_dir) else {
        error!("no export folder configured and no downloads directory found");
        return;
    };

    let export_items: Vec<ExportItem> = report
        .results
        .iter()
        .map(|result| {
            let mut item = ExportItem::from(result);
            if let Some(name) = export_label(&sources, result.source().path()) {
                item.source_label = Some(name);
            }
            item
        })
        .collect();

    let batch = ExportPipeline::new().export_batch(&export_items, config.icon_dimensions, &folder);
    for failure in &batch.failures {
        error!(label = %failure.label, error = %failure.error, "export failed");
    }
}
