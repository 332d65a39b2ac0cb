//! Treatment lookup.
//!
//! Online, treatment advice is fetched from a remote source by appending the
//! disease name to a base URL. The remote source is best-effort: any transport
//! error, timeout, non-success status or malformed body falls through to the
//! built-in table, exactly as if the app were offline.
//!
//! Remote answers that pass shape validation are cached for 5 minutes.

use std::time::Duration;

use moka::future::Cache;

use plant_health_core::TreatmentInfo;

use super::connectivity::Connectivity;
use crate::config::NetworkConfig;

/// Built-in treatment table, in display order.
const LOCAL_TREATMENTS: [(&str, LocalEntry); 3] = [
    (
        "Tomato___Bacterial_spot",
        LocalEntry {
            description: "Caused by Xanthomonas bacteria, appears as small water-soaked spots",
            prevention: &[
                "Use disease-free seeds",
                "Practice crop rotation (2-3 years)",
                "Avoid overhead watering",
            ],
            organic: &["Copper-based fungicides", "Bacillus subtilis products"],
            chemical: &[
                "Streptomycin sulfate (limited availability)",
                "Copper hydroxide",
            ],
        },
    ),
    (
        "Tomato___Early_blight",
        LocalEntry {
            description: "Fungal disease causing concentric rings on leaves",
            prevention: &["Remove infected plant debris", "Ensure proper plant spacing"],
            organic: &["Copper fungicides", "Baking soda sprays (1 tbsp/gallon)"],
            chemical: &["Chlorothalonil", "Mancozeb"],
        },
    ),
    (
        "Tomato___healthy",
        LocalEntry {
            description: "No disease detected",
            prevention: &["Maintain good growing conditions", "Regularly inspect plants"],
            organic: &[],
            chemical: &[],
        },
    ),
];

struct LocalEntry {
    description: &'static str,
    prevention: &'static [&'static str],
    organic: &'static [&'static str],
    chemical: &'static [&'static str],
}

/// Advice from the built-in table, or [`TreatmentInfo::fallback`] for labels
/// it does not cover.
#[must_use]
pub fn local(label: &str) -> TreatmentInfo {
    LOCAL_TREATMENTS
        .iter()
        .find(|(name, _)| *name == label)
        .map_or_else(TreatmentInfo::fallback, |(_, entry)| {
            TreatmentInfo::new(
                entry.description,
                entry.prevention,
                entry.organic,
                entry.chemical,
            )
        })
}

/// Labels covered by the built-in table, in display order.
#[must_use]
pub fn local_labels() -> Vec<&'static str> {
    LOCAL_TREATMENTS.iter().map(|(name, _)| *name).collect()
}

/// Looks up treatment advice, remote first when online.
#[derive(Clone)]
pub struct TreatmentLookup {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    cache: Cache<String, TreatmentInfo>,
}

impl TreatmentLookup {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(100)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            client,
            base_url: base_url.into(),
            timeout,
            cache,
        }
    }

    #[must_use]
    pub fn from_config(client: reqwest::Client, config: &NetworkConfig) -> Self {
        Self::new(client, &config.treatment_url, config.treatment_timeout)
    }

    /// Treatment advice for `label`.
    ///
    /// Never fails. Offline, or when the remote source does not deliver a
    /// well-formed record, the answer is [`local`].
    #[tracing::instrument(skip(self, connectivity))]
    pub async fn lookup(&self, label: &str, connectivity: &dyn Connectivity) -> TreatmentInfo {
        if connectivity.is_online().await {
            if let Some(info) = self.cache.get(label).await {
                return info;
            }

            match self.fetch(label).await {
                Ok(info) => {
                    self.cache.insert(label.to_string(), info.clone()).await;
                    return info;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Remote treatment lookup failed, using local table");
                }
            }
        }

        local(label)
    }

    fn url_for(&self, label: &str) -> String {
        format!("{}{}", self.base_url, urlencoding::encode(label))
    }

    async fn fetch(&self, label: &str) -> Result<TreatmentInfo, reqwest::Error> {
        self.client
            .get(self.url_for(label))
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<TreatmentInfo>()
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        Json, Router,
        extract::{Path, State},
        http::StatusCode,
        response::Html,
        routing::get,
    };

    use super::*;
    use crate::services::connectivity::FixedConnectivity;

    fn remote_info(label: &str) -> TreatmentInfo {
        TreatmentInfo::new(
            &format!("Remote advice for {label}"),
            &["Stake plants"],
            &["Neem oil"],
            &["Azoxystrobin"],
        )
    }

    /// Serve one treatment source per failure kind and return the base URL.
    /// `/ok/` counts the requests it answers in `hits`.
    async fn serve_treatments(hits: Arc<AtomicUsize>) -> String {
        let app = Router::new()
            .route(
                "/html/{label}",
                get(|| async { Html("<html><body>Treatment</body></html>") }),
            )
            .route(
                "/error/{label}",
                get(|Path(label): Path<String>| async move {
                    (StatusCode::INTERNAL_SERVER_ERROR, Json(remote_info(&label)))
                }),
            )
            .route(
                "/shape/{label}",
                get(|| async { Json(serde_json::json!({ "description": 7, "steps": ["spray"] })) }),
            )
            .route(
                "/ok/{label}",
                get(
                    |State(hits): State<Arc<AtomicUsize>>, Path(label): Path<String>| async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        Json(remote_info(&label))
                    },
                ),
            )
            .with_state(hits);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn lookup_at(base: &str, kind: &str) -> TreatmentLookup {
        TreatmentLookup::new(
            reqwest::Client::new(),
            format!("{base}/{kind}/"),
            Duration::from_secs(2),
        )
    }

    fn lookup() -> TreatmentLookup {
        TreatmentLookup::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/treatment/",
            Duration::from_millis(200),
        )
    }

    #[test]
    fn test_local_table() {
        let info = local("Tomato___Early_blight");
        assert_eq!(info.description, "Fungal disease causing concentric rings on leaves");
        assert_eq!(info.treatment.chemical, vec!["Chlorothalonil", "Mancozeb"]);

        let healthy = local("Tomato___healthy");
        assert!(healthy.treatment.organic.is_empty());
        assert!(healthy.treatment.chemical.is_empty());
    }

    #[test]
    fn test_local_labels_order() {
        assert_eq!(
            local_labels(),
            vec!["Tomato___Bacterial_spot", "Tomato___Early_blight", "Tomato___healthy"]
        );
    }

    #[test]
    fn test_url_is_encoded() {
        assert_eq!(
            lookup().url_for("Tomato___Spider_mites Two-spotted_spider_mite"),
            "http://127.0.0.1:9/treatment/Tomato___Spider_mites%20Two-spotted_spider_mite"
        );
    }

    #[tokio::test]
    async fn test_offline_unknown_label_falls_back() {
        let info = lookup()
            .lookup("Tomato___Late_blight", &FixedConnectivity(false))
            .await;

        assert_eq!(info, TreatmentInfo::fallback());
        assert_eq!(
            info.treatment.prevention,
            vec!["Consult local agricultural extension officer"]
        );
        assert!(info.treatment.organic.is_empty());
        assert!(info.treatment.chemical.is_empty());
    }

    #[tokio::test]
    async fn test_online_failure_matches_offline() {
        let lookup = lookup();
        for label in ["Tomato___Late_blight", "Tomato___Bacterial_spot", "not a label"] {
            let offline = lookup.lookup(label, &FixedConnectivity(false)).await;
            let online = lookup.lookup(label, &FixedConnectivity(true)).await;
            assert_eq!(offline, online, "{label}");
        }
    }

    #[tokio::test]
    async fn test_bad_remote_answers_use_local_table() {
        let base = serve_treatments(Arc::new(AtomicUsize::new(0))).await;

        for kind in ["html", "error", "shape"] {
            let lookup = lookup_at(&base, kind);
            for label in ["Tomato___Early_blight", "Tomato___Late_blight"] {
                let info = lookup.lookup(label, &FixedConnectivity(true)).await;
                assert_eq!(info, local(label), "{kind} {label}");
            }
        }
    }

    #[tokio::test]
    async fn test_remote_answer_is_used_and_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = serve_treatments(Arc::clone(&hits)).await;
        let lookup = lookup_at(&base, "ok");
        let label = "Tomato___Early_blight";

        let first = lookup.lookup(label, &FixedConnectivity(true)).await;
        assert_eq!(first, remote_info(label));
        assert_ne!(first, local(label));

        let second = lookup.lookup(label, &FixedConnectivity(true)).await;
        assert_eq!(second, first);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Offline never consults the cache.
        let offline = lookup.lookup(label, &FixedConnectivity(false)).await;
        assert_eq!(offline, local(label));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
