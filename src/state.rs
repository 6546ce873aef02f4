use std::sync::Arc;

use crate::config::RecipeConfig;
use crate::services::dispatch::RecipeDispatcher;
use crate::services::paint_mixing::PaintMixingService;
use crate::services::worker::RecipeWorker;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RecipeConfig>,
    pub dispatcher: Arc<RecipeDispatcher>,
}

impl AppState {
    pub fn new(config: RecipeConfig) -> Self {
        let worker = RecipeWorker::with_capacities(
            Arc::new(PaintMixingService::default()),
            config.palette_cache_capacity,
            config.suggestion_cache_capacity,
        );
        let dispatcher = RecipeDispatcher::new(worker, config.worker_timeout());
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
        }
    }
}
