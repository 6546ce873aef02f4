//! Runs recipe batches off the caller's task
//!
//! Every batch gets a request id from a monotonically increasing counter.
//! A batch whose id is no longer the newest is abandoned as soon as the
//! search notices and its result is dropped: the last request wins. If the
//! background worker does not answer within the timeout, the batch is
//! computed in the foreground one target at a time, yielding between
//! targets.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::models::{Paint, Rgb, SuggestOptions, Superseded};
use crate::services::paint_mixing::PaintMixingService;
use crate::services::pigment::{KubelkaMunkModel, PigmentModel};
use crate::services::worker::{BatchRequest, BatchResponse, RecipeWorker};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

pub struct RecipeDispatcher<M = KubelkaMunkModel> {
    worker: Arc<Mutex<RecipeWorker<M>>>,
    service: Arc<PaintMixingService<M>>,
    latest: Arc<AtomicU64>,
    timeout: Duration,
}

impl<M: PigmentModel + 'static> RecipeDispatcher<M> {
    pub fn new(worker: RecipeWorker<M>, timeout: Duration) -> Self {
        let service = Arc::clone(worker.service());
        Self {
            worker: Arc::new(Mutex::new(worker)),
            service,
            latest: Arc::new(AtomicU64::new(0)),
            timeout,
        }
    }

    /// Claim the next request id, superseding every earlier one
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest_request_id(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, id: u64) -> bool {
        self.latest_request_id() == id
    }

    /// Start and run a batch; `None` if a newer batch was started meanwhile
    pub async fn request(
        &self,
        palette: Vec<Paint>,
        colors: Vec<Rgb>,
        options: SuggestOptions,
    ) -> Option<BatchResponse> {
        let id = self.begin();
        self.run(id, palette, colors, options).await
    }

    /// Run a batch for an id obtained from [`begin`](Self::begin)
    pub async fn run(
        &self,
        id: u64,
        palette: Vec<Paint>,
        colors: Vec<Rgb>,
        options: SuggestOptions,
    ) -> Option<BatchResponse> {
        if !self.is_current(id) {
            debug!(id, latest = self.latest_request_id(), "batch superseded before start");
            return None;
        }

        let request = BatchRequest {
            id,
            palette,
            colors,
            options,
        };
        let response = match self.run_background(request.clone()).await {
            Some(Ok(response)) => response,
            Some(Err(Superseded)) => {
                debug!(id, latest = self.latest_request_id(), "batch abandoned by worker");
                return None;
            }
            None => self.run_foreground(&request).await?,
        };

        if !self.is_current(id) {
            debug!(id, latest = self.latest_request_id(), "dropping stale batch");
            return None;
        }
        Some(response)
    }

    /// `None` when the worker failed or timed out
    async fn run_background(
        &self,
        request: BatchRequest,
    ) -> Option<Result<BatchResponse, Superseded>> {
        let worker = Arc::clone(&self.worker);
        let latest = Arc::clone(&self.latest);
        let task = tokio::task::spawn_blocking(move || {
            let is_current = || latest.load(Ordering::SeqCst) == request.id;
            // Do not queue behind the lock for a batch nobody wants anymore
            if !is_current() {
                return Err(Superseded);
            }
            let mut worker = worker.lock().unwrap_or_else(PoisonError::into_inner);
            worker.handle_while(&request, is_current)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => {
                warn!(error = %e, "recipe worker failed, computing in foreground");
                None
            }
            Err(_) => {
                warn!(
                    timeout = ?self.timeout,
                    "recipe worker timed out, computing in foreground"
                );
                None
            }
        }
    }

    async fn run_foreground(&self, request: &BatchRequest) -> Option<BatchResponse> {
        let prepared = self.service.prepare_palette(&request.palette);
        let mut suggestions = Vec::with_capacity(request.colors.len());
        for &color in &request.colors {
            let suggestion = self
                .service
                .suggest_while(&prepared, color, &request.options, || {
                    self.is_current(request.id)
                })
                .ok()?;
            suggestions.push(suggestion);
            tokio::task::yield_now().await;
        }
        Some(BatchResponse {
            id: request.id,
            suggestions,
        })
    }
}
