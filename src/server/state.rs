//! Shared application state injected into every handler.

use crate::codec::CodecRuntime;
use crate::config::ServerConfig;
use crate::output::OutputStore;
use crate::pipeline::ConversionPipeline;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<ServerConfig>,
    pub pipeline: ConversionPipeline,
    /// Where converted files are written and served from.
    pub store: OutputStore,
    /// Admission control: one permit per in-flight conversion.
    pub conversions: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: ServerConfig, runtime: Arc<CodecRuntime>) -> Self {
        let store = OutputStore::new(config.output_dir.clone());
        let conversions = Arc::new(Semaphore::new(config.max_concurrent_conversions.max(1)));
        Self {
            config: Arc::new(config),
            pipeline: ConversionPipeline::new(runtime),
            store,
            conversions,
        }
    }
}
