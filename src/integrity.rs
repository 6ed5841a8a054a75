//! Timer-driven recovery for objects the eager gap check cannot finish.
//!
//! Losing the final fragment of an object, or several fragments in a row,
//! leaves nothing to trigger the Reassembler's predecessor check. The
//! [`IntegrityChecker`] periodically scans pending objects and asks again for
//! every slot of the stale ones. An object still stale after `max_retries`
//! request rounds is abandoned on the next sweep.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use log::info;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ProtocolConfig,
    fragment::ObjectId,
    metrics::{self, RequestSource},
    reassembler::ReassemblyTable,
    retransmit::RetransmitRequest,
    sender::SenderHandle,
};

/// Outcome of one sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Retransmission requests queued.
    pub requested: usize,
    /// Objects dropped after exhausting the retry budget.
    pub abandoned: Vec<ObjectId>,
}

/// Periodic scanner over the shared [`ReassemblyTable`].
pub struct IntegrityChecker {
    table: Arc<ReassemblyTable>,
    sender: SenderHandle,
    interval: Duration,
    max_retries: u32,
    retries: HashMap<ObjectId, u32>,
}

impl IntegrityChecker {
    /// Create a checker using the interval and retry budget of `config`.
    #[must_use]
    pub fn new(table: Arc<ReassemblyTable>, sender: SenderHandle, config: &ProtocolConfig) -> Self {
        Self {
            table,
            sender,
            interval: config.integrity_interval,
            max_retries: config.max_retries,
            retries: HashMap::new(),
        }
    }

    /// Run one sweep as of `now`.
    ///
    /// An object touched within the last interval is making progress and its
    /// retry count is cleared. A stale object has its count bumped; once the
    /// count exceeds `max_retries` it is abandoned, otherwise every empty slot
    /// is requested again.
    pub fn sweep_at(&mut self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let pending = self.table.pending();
        let live: HashSet<&ObjectId> = pending.iter().map(|object| &object.object_id).collect();
        self.retries.retain(|object_id, _| live.contains(object_id));

        for object in &pending {
            if now.saturating_duration_since(object.last_touched) < self.interval {
                self.retries.remove(&object.object_id);
                continue;
            }
            let attempts = self.retries.entry(object.object_id.clone()).or_insert(0);
            *attempts += 1;
            if *attempts > self.max_retries {
                let attempts = *attempts;
                self.retries.remove(&object.object_id);
                if self.table.abandon(&object.object_id) {
                    info!(
                        "object abandoned: object_id={}, attempts={attempts}",
                        object.object_id
                    );
                    metrics::inc_objects_abandoned();
                    report.abandoned.push(object.object_id.clone());
                }
                continue;
            }
            let Some(missing) = self.table.missing(&object.object_id) else {
                continue;
            };
            tracing::debug!(
                object_id = %object.object_id,
                missing = missing.len(),
                attempt = *attempts,
                "requesting stale fragments"
            );
            for index in missing {
                let request = RetransmitRequest::new(index, object.object_id.clone());
                if self.sender.request_retransmit(&request) {
                    metrics::inc_retransmit_requests(RequestSource::Sweep);
                    report.requested += 1;
                }
            }
        }

        self.table.prune_delivered_at(now);
        report
    }

    /// Sweep every interval until `token` is cancelled.
    ///
    /// The first sweep runs one interval after start.
    pub async fn run(mut self, token: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                tick = ticker.tick() => {
                    let report = self.sweep_at(tick);
                    if report.requested > 0 || !report.abandoned.is_empty() {
                        tracing::debug!(
                            requested = report.requested,
                            abandoned = report.abandoned.len(),
                            "integrity sweep"
                        );
                    }
                }
            }
        }
        log::debug!("integrity checker stopped");
    }
}
