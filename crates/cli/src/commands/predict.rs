//! Diagnosis commands.
//!
//! # Usage
//!
//! ```bash
//! # Diagnose a photo (refreshes the model cache and syncs while online)
//! ph-cli predict leaf.jpg
//!
//! # Same, but never touch the network
//! ph-cli predict leaf.jpg --offline
//!
//! # Print the ten most recent predictions
//! ph-cli history --limit 10
//! ```
//!
//! Both commands share the ledger and model paths with the web server.

use std::path::Path;

use plant_health_core::humanize;
use plant_health_web::config::AppConfig;
use plant_health_web::services::connectivity::{Connectivity, FixedConnectivity, HttpProbe};
use plant_health_web::services::{
    DiagnosisError, DiagnosisService, InferencePipeline, ModelCache, PredictionLedger,
    SimulatedCloudSync, TreatmentLookup,
};
use thiserror::Error;

/// Errors that can occur while diagnosing a file.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Diagnosis(#[from] DiagnosisError),
}

/// Diagnose one image and print the result.
///
/// # Errors
///
/// Returns `PredictError::Read` if the file can't be read and
/// `PredictError::Diagnosis` if no model is available or the image is bad.
pub async fn predict(config: &AppConfig, image: &Path, offline: bool) -> Result<(), PredictError> {
    let bytes = tokio::fs::read(image)
        .await
        .map_err(|source| PredictError::Read {
            path: image.display().to_string(),
            source,
        })?;
    let image_name = image
        .file_name()
        .map_or_else(|| image.display().to_string(), |name| name.to_string_lossy().into_owned());

    let client = reqwest::Client::new();
    let connectivity: Box<dyn Connectivity> = if offline {
        Box::new(FixedConnectivity(false))
    } else {
        Box::new(HttpProbe::new(
            client.clone(),
            config.network.probe_url.clone(),
            config.network.probe_timeout,
        ))
    };

    let ledger = PredictionLedger::new(&config.ledger_path);
    let models = ModelCache::from_config(&config.model);
    let pipeline = InferencePipeline::onnx();
    let treatments = TreatmentLookup::from_config(client, &config.network);
    let sync = SimulatedCloudSync::new(config.sync_delay);
    let service = DiagnosisService::new(&ledger, &models, &pipeline, &treatments, &sync);

    let diagnosis = service
        .diagnose(&image_name, bytes, connectivity.as_ref())
        .await?;
    let treatment = diagnosis.treatment();

    #[allow(clippy::print_stdout)]
    {
        println!("Detected: {}", diagnosis.label.display_name());
        println!();
        println!("{}", treatment.description);
        print_list("Prevention", &treatment.treatment.prevention);
        print_list("Organic Treatment", &treatment.treatment.organic);
        print_list("Chemical Treatment", &treatment.treatment.chemical);
        println!();
        if diagnosis.synced() {
            println!("Prediction synced to cloud");
        } else {
            println!("Prediction saved locally");
        }
    }

    Ok(())
}

/// Print the ledger's predictions, newest first.
pub async fn history(config: &AppConfig, limit: Option<usize>) {
    let lines = history_lines(&config.ledger_path, limit).await;

    #[allow(clippy::print_stdout)]
    {
        if lines.is_empty() {
            println!("No prediction history found");
            return;
        }
        for line in lines {
            println!("{line}");
        }
    }
}

/// One line per prediction in the ledger at `path`, newest first, at most
/// `limit` of them.
async fn history_lines(path: &Path, limit: Option<usize>) -> Vec<String> {
    let records = PredictionLedger::new(path).load().await.predictions;

    records
        .iter()
        .rev()
        .take(limit.unwrap_or(usize::MAX))
        .map(|record| {
            let status = if record.synced {
                "Synced to cloud"
            } else {
                "Local only"
            };
            format!(
                "{}  {:<30}  {:<40}  {status}",
                record.timestamp,
                record.image_name,
                humanize(&record.prediction)
            )
        })
        .collect()
}

#[allow(clippy::print_stdout)]
fn print_list(title: &str, items: &[String]) {
    println!();
    println!("{title}:");
    for item in items {
        println!("  - {item}");
    }
}
