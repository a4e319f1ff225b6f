//! Rendering every page of a document in one cancelable sweep.

use crate::document::{render_checked, Document, PixelBuffer, RenderRequest};
use crate::error::{ExportError, RenderError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause between pages so the interactive side keeps running.
const PAGE_YIELD: Duration = Duration::from_millis(1);

/// Shared cancel flag for one sweep. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A document plus one request per page, captured from a viewport.
#[derive(Clone)]
pub struct ExportJob {
    pub document: Arc<dyn Document>,
    pub requests: Vec<RenderRequest>,
}

impl ExportJob {
    pub fn page_count(&self) -> usize {
        self.requests.len()
    }
}

/// Render the pages of `job` in order, each on the blocking pool.
///
/// The first failure stops the sweep. Either way the pages finished so far
/// are returned inside the error.
pub async fn render_all_pages(
    job: ExportJob,
    cancel: CancellationToken,
) -> Result<Vec<PixelBuffer>, ExportError> {
    let total = job.requests.len();
    let mut completed = Vec::with_capacity(total);
    info!(pages = total, "export started");

    for request in job.requests {
        if cancel.is_cancelled() {
            info!(done = completed.len(), "export cancelled");
            return Err(ExportError::Cancelled { completed });
        }

        let page = request.page;
        let document = Arc::clone(&job.document);
        let rendered = tokio::task::spawn_blocking(move || render_checked(document.as_ref(), &request))
            .await
            .unwrap_or_else(|e| {
                Err(RenderError::Backend {
                    page,
                    message: e.to_string(),
                })
            });

        match rendered {
            Ok(bitmap) => {
                debug!(page, done = completed.len() + 1, total, "export page rendered");
                completed.push(bitmap);
            }
            Err(source) => {
                warn!(page, error = %source, "export aborted");
                return Err(ExportError::Render {
                    page,
                    source,
                    completed,
                });
            }
        }
        tokio::time::sleep(PAGE_YIELD).await;
    }

    info!(pages = completed.len(), "export finished");
    Ok(completed)
}
