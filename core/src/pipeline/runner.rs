use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::detection::metadata::{MetadataDocument, MetadataResolver};
use crate::detection::record::{DetectionRecord, GeoPoint};
use crate::detection::upload::{DetectionResponse, DetectionService, ImagePayload};
use crate::pipeline::cancel::UploadTicket;
use crate::pipeline::session::{UploadReport, UploadSession, UploadStatus};
use crate::prelude::{PipelineError, PipelineResult};
use crate::state::reconciler::Reconciler;
use crate::state::store::UpsertOutcome;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{MetricsRecorder, MetricsSnapshot};

/// Record committed by a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    pub record: DetectionRecord,
    pub outcome: UpsertOutcome,
}

/// Upload → detection → metadata → commit, one ticket per run.
pub struct UploadPipeline {
    detection: Arc<dyn DetectionService>,
    resolver: MetadataResolver,
    reconciler: Arc<Reconciler>,
    in_flight: Mutex<HashMap<u64, UploadTicket>>,
    next_ticket: AtomicU64,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl UploadPipeline {
    pub fn new(
        detection: Arc<dyn DetectionService>,
        resolver: MetadataResolver,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            detection,
            resolver,
            reconciler,
            in_flight: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("pipeline"),
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Registers a new in-flight upload.
    pub fn begin(&self) -> UploadTicket {
        let ticket = UploadTicket::new(self.next_ticket.fetch_add(1, Ordering::SeqCst));
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ticket.id(), ticket.clone());
        ticket
    }

    pub fn cancel(&self, ticket_id: u64) -> bool {
        let ticket = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ticket_id);
        match ticket {
            Some(ticket) => {
                ticket.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every in-flight upload, e.g. when the user picks a new file.
    pub fn cancel_all(&self) -> usize {
        let tickets: Vec<UploadTicket> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, ticket)| ticket)
            .collect();
        for ticket in &tickets {
            ticket.cancel();
        }
        tickets.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub async fn submit(&self, image: ImagePayload) -> UploadReport {
        let ticket = self.begin();
        self.submit_with(ticket, image).await
    }

    /// Runs `ticket` to completion and recovers every error into the report.
    pub async fn submit_with(&self, ticket: UploadTicket, image: ImagePayload) -> UploadReport {
        let mut session = UploadSession::new(image.file_name.clone());
        self.metrics.record_started();
        self.logger.record(&format!(
            "upload {} started ({}, {} bytes)",
            ticket.id(),
            image.file_name,
            image.bytes.len()
        ));

        let guard = InFlightGuard::new(self, ticket.id());
        let result = self.run(&ticket, image, &mut session).await;
        guard.release();

        let status = match result {
            Ok(committed) => {
                self.metrics.record_committed();
                UploadStatus::Committed {
                    id: committed.record.id,
                    outcome: committed.outcome,
                }
            }
            Err(err) => {
                self.metrics.record_error(&err);
                match err.user_message() {
                    Some(message) => {
                        self.logger
                            .warn(&format!("upload {} failed: {}", ticket.id(), err));
                        session.error = Some(message.clone());
                        UploadStatus::Failed { message }
                    }
                    None => {
                        self.logger.debug(&format!("upload {}: {}", ticket.id(), err));
                        UploadStatus::Discarded
                    }
                }
            }
        };

        UploadReport {
            ticket: ticket.id(),
            session,
            status,
        }
    }

    /// One pipeline pass; the store is touched only by the final commit.
    pub async fn run(
        &self,
        ticket: &UploadTicket,
        image: ImagePayload,
        session: &mut UploadSession,
    ) -> PipelineResult<Committed> {
        if image.is_empty() {
            return Err(PipelineError::EmptyImage);
        }

        let response = self
            .guard(ticket, self.detection.submit(image))
            .await??;
        session.apply_detection(&response);
        self.logger.record(&format!(
            "upload {} detected {} items, correlation {}",
            ticket.id(),
            response.trash_count,
            response.document_id
        ));

        let document = self
            .guard(ticket, self.resolver.resolve(&response.document_id))
            .await??;
        session.metadata = Some(document.clone());

        let record = correlate(&response, &document)?;
        let outcome = self
            .reconciler
            .upsert_if(record.clone(), || !ticket.is_cancelled())
            .ok_or(PipelineError::StaleResponseDiscarded {
                ticket: ticket.id(),
            })?;

        Ok(Committed { record, outcome })
    }

    /// Races `work` against the ticket's cancellation.
    async fn guard<F>(&self, ticket: &UploadTicket, work: F) -> PipelineResult<F::Output>
    where
        F: Future,
    {
        let stale = PipelineError::StaleResponseDiscarded {
            ticket: ticket.id(),
        };
        tokio::select! {
            biased;
            _ = ticket.token().cancelled() => Err(stale),
            output = work => {
                if ticket.is_cancelled() {
                    Err(stale)
                } else {
                    Ok(output)
                }
            }
        }
    }

    fn finish(&self, ticket_id: u64) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ticket_id);
    }
}

/// Keeps a ticket registered while its run is being polled.
///
/// A run dropped mid-await (client disconnect, aborted task) never reaches
/// `release`, so the drop unregisters the ticket and counts it as discarded.
struct InFlightGuard<'a> {
    pipeline: &'a UploadPipeline,
    ticket_id: u64,
    released: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(pipeline: &'a UploadPipeline, ticket_id: u64) -> Self {
        Self {
            pipeline,
            ticket_id,
            released: false,
        }
    }

    fn release(mut self) {
        self.released = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.pipeline.finish(self.ticket_id);
        if !self.released {
            let abandoned = PipelineError::StaleResponseDiscarded {
                ticket: self.ticket_id,
            };
            self.pipeline.metrics.record_error(&abandoned);
            self.pipeline
                .logger
                .debug(&format!("upload {} dropped before completion", self.ticket_id));
        }
    }
}

/// Joins a detection reply with its metadata document.
fn correlate(
    response: &DetectionResponse,
    document: &MetadataDocument,
) -> PipelineResult<DetectionRecord> {
    let (lat, lng) = match (document.latitude, document.longitude) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => {
            return Err(PipelineError::MissingLocation {
                id: response.document_id.clone(),
            })
        }
    };
    Ok(DetectionRecord::new(
        response.document_id.clone(),
        GeoPoint::new(lat, lng),
        document.date_created.clone(),
        response.trash_count,
        response.display_image(),
    ))
}
