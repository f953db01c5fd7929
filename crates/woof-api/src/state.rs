//! Application state.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use woof_storage::UploadStore;
use woof_vision::Classifier;

use crate::config::ApiConfig;
use crate::session::SessionStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub uploads: Arc<UploadStore>,
    pub sessions: Arc<SessionStore>,
    pub classifier: Arc<Classifier>,
}

impl AppState {
    /// Create new application state, loading every model.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let missing = config.vision.missing_files();
        if !missing.is_empty() {
            anyhow::bail!("missing model files: {:?}", missing);
        }

        let vision = config.vision.clone();
        let classifier = tokio::task::spawn_blocking(move || Classifier::load(&vision))
            .await
            .context("model loading task panicked")?
            .context("failed to load models")?;

        Self::with_classifier(config, classifier).await
    }

    /// Create state around an already built classifier.
    pub async fn with_classifier(config: ApiConfig, classifier: Classifier) -> anyhow::Result<Self> {
        let uploads = UploadStore::open(&config.upload_dir)
            .await
            .with_context(|| format!("failed to open upload dir {}", config.upload_dir.display()))?;

        info!(upload_dir = %config.upload_dir.display(), "Application state ready");

        Ok(Self {
            config,
            uploads: Arc::new(uploads),
            sessions: Arc::new(SessionStore::new()),
            classifier: Arc::new(classifier),
        })
    }
}
