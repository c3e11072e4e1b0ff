use crate::config::settings::AppConfig;
use crate::infrastructure::storage::artifacts::ArtifactStore;
use crate::modules::video::repository::JobStore;
use crate::modules::video::resolver::ArtifactResolver;
use crate::workers::TranscodePipeline;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub jobs: Arc<dyn JobStore>,
    pub artifacts: ArtifactStore,
    pub pipeline: TranscodePipeline,
    pub resolver: ArtifactResolver,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        jobs: Arc<dyn JobStore>,
        artifacts: ArtifactStore,
        pipeline: TranscodePipeline,
    ) -> Self {
        let resolver = ArtifactResolver::new(artifacts.clone(), jobs.clone());
        Self {
            config,
            jobs,
            artifacts,
            pipeline,
            resolver,
        }
    }
}
