// ── Alert queue ──
//
// Bounded, newest-first alert collection with per-alert auto-dismiss
// timers. Readers get immutable snapshots through a `watch` channel; every
// mutation swaps in a new snapshot while holding the channel's write lock,
// so concurrent writers never interleave.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::{oneshot, watch};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use super::model::{Alert, AlertId, AlertOptions, Severity};
use crate::config::AlertConfig;
use crate::stream::{AlertStream, Snapshot};

/// The alert lifecycle manager.
///
/// Cheaply cloneable; clones share one collection. All mutation goes
/// through [`add_alert`](Self::add_alert), [`remove_alert`](Self::remove_alert),
/// [`acknowledge_alert`](Self::acknowledge_alert) and
/// [`clear_all_alerts`](Self::clear_all_alerts). Every mutation is visible
/// to readers as soon as the call returns.
#[derive(Clone)]
pub struct AlertQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    config: AlertConfig,
    alerts: watch::Sender<Snapshot<Alert>>,
    /// Pending auto-dismiss timers, keyed by the alert they remove.
    timers: DashMap<AlertId, AbortHandle>,
    next_seq: AtomicU64,
    shut_down: AtomicBool,
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        for timer in &self.timers {
            timer.value().abort();
        }
    }
}

impl AlertQueue {
    pub fn new(config: AlertConfig) -> Self {
        let (alerts, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: Arc::new(QueueInner {
                config,
                alerts,
                timers: DashMap::new(),
                next_seq: AtomicU64::new(0),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.inner.config
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Create an alert, put it at the front of the queue, and return its id.
    ///
    /// Defaults by severity: `Critical` is always persistent; `Info`
    /// auto-dismisses after the configured delay; everything else stays
    /// until removed unless `opts` sets a delay. When the queue is full
    /// the oldest alerts are evicted, whatever their severity. A queue with
    /// `max_alerts == 0` retains nothing.
    pub fn add_alert(&self, message: impl Into<String>, severity: Severity, opts: AlertOptions) -> AlertId {
        let message = message.into();
        let capacity = self.inner.config.max_alerts;
        let info_default = self.inner.config.info_auto_dismiss;

        let mut id = AlertId::from(String::new());
        let mut dismiss_after = None;
        let mut evicted = Vec::new();
        // Sequence numbers are taken under the channel's write lock so list
        // order always matches `seq`.
        self.inner.alerts.send_modify(|snap| {
            let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
            let alert = Arc::new(opts.resolve(message, severity, seq, info_default));
            id = alert.id.clone();
            dismiss_after = alert.dismiss_after();

            let mut next = Vec::with_capacity(snap.len().min(capacity) + 1);
            next.push(alert);
            next.extend(snap.iter().cloned());
            if next.len() > capacity {
                evicted = next.split_off(capacity);
            }
            *snap = Arc::new(next);
        });

        debug!(id = %id, %severity, evicted = evicted.len(), "alert added");
        for old in &evicted {
            self.cancel_timer(&old.id);
        }
        let retained = evicted.iter().all(|old| old.id != id);
        if let Some(delay) = dismiss_after.filter(|_| retained) {
            self.schedule_dismiss(&id, delay);
        }

        id
    }

    /// Remove an alert. Unknown ids are a no-op. Returns whether it was present.
    pub fn remove_alert(&self, id: &AlertId) -> bool {
        self.cancel_timer(id);
        self.remove_entry(id)
    }

    /// Mark an alert acknowledged, keeping it in place. Unknown ids are a
    /// no-op. Returns whether it was present.
    pub fn acknowledge_alert(&self, id: &AlertId) -> bool {
        let mut found = false;
        self.inner.alerts.send_if_modified(|snap| {
            let Some(pos) = snap.iter().position(|a| &a.id == id) else {
                return false;
            };
            found = true;
            if snap[pos].acknowledged {
                return false;
            }
            let mut acked = Alert::clone(&snap[pos]);
            acked.acknowledged = true;
            let mut next = Vec::clone(snap);
            next[pos] = Arc::new(acked);
            *snap = Arc::new(next);
            true
        });
        found
    }

    /// Drop every alert and cancel every pending timer.
    pub fn clear_all_alerts(&self) {
        self.abort_all_timers();
        self.inner.alerts.send_if_modified(|snap| {
            if snap.is_empty() {
                return false;
            }
            *snap = Arc::new(Vec::new());
            true
        });
        debug!("alerts cleared");
    }

    // ── Views ────────────────────────────────────────────────────

    /// Full collection, newest first.
    pub fn alerts(&self) -> Snapshot<Alert> {
        self.inner.alerts.borrow().clone()
    }

    /// Unacknowledged alerts, newest first.
    pub fn active_alerts(&self) -> Vec<Arc<Alert>> {
        self.filtered(Alert::is_active)
    }

    /// Unacknowledged critical alerts, newest first.
    pub fn critical_alerts(&self) -> Vec<Arc<Alert>> {
        self.filtered(Alert::is_critical)
    }

    /// Alerts grouped by source, groups in order of their newest alert.
    pub fn by_source(&self) -> IndexMap<Option<String>, Vec<Arc<Alert>>> {
        let mut groups: IndexMap<Option<String>, Vec<Arc<Alert>>> = IndexMap::new();
        for alert in self.alerts().iter() {
            groups
                .entry(alert.source.clone())
                .or_default()
                .push(Arc::clone(alert));
        }
        groups
    }

    pub fn get(&self, id: &AlertId) -> Option<Arc<Alert>> {
        self.alerts().iter().find(|a| &a.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.alerts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.alerts.borrow().is_empty()
    }

    /// Number of auto-dismiss timers still pending.
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.len()
    }

    /// Subscribe to collection changes.
    pub fn subscribe(&self) -> AlertStream {
        AlertStream::new(self.inner.alerts.subscribe())
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Cancel every pending timer. Alerts stay readable and mutable, but
    /// no new timers are scheduled. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.abort_all_timers();
        debug!("alert queue shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    // ── Internals ────────────────────────────────────────────────

    fn filtered(&self, keep: impl Fn(&Alert) -> bool) -> Vec<Arc<Alert>> {
        self.alerts().iter().filter(|a| keep(a)).cloned().collect()
    }

    fn remove_entry(&self, id: &AlertId) -> bool {
        self.inner.alerts.send_if_modified(|snap| {
            let Some(pos) = snap.iter().position(|a| &a.id == id) else {
                return false;
            };
            let mut next = Vec::clone(snap);
            next.remove(pos);
            *snap = Arc::new(next);
            true
        })
    }

    fn schedule_dismiss(&self, id: &AlertId, delay: Duration) {
        if self.is_shut_down() {
            debug!(id = %id, "queue shut down, alert will not auto-dismiss");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(id = %id, "no Tokio runtime, alert will not auto-dismiss");
            return;
        };

        let deadline = tokio::time::Instant::now() + delay;
        let weak: Weak<QueueInner> = Arc::downgrade(&self.inner);
        let timer_id = id.clone();
        // The task waits on `armed` so its handle is registered before it
        // can remove itself from `timers`.
        let (arm, armed) = oneshot::channel::<()>();
        let task = runtime.spawn(async move {
            if armed.await.is_err() {
                return;
            }
            tokio::time::sleep_until(deadline).await;
            let Some(inner) = weak.upgrade() else { return };
            inner.timers.remove(&timer_id);
            let queue = AlertQueue { inner };
            if queue.remove_entry(&timer_id) {
                debug!(id = %timer_id, "alert auto-dismissed");
            }
        });

        self.inner.timers.insert(id.clone(), task.abort_handle());
        let _ = arm.send(());
    }

    fn cancel_timer(&self, id: &AlertId) {
        if let Some((_, timer)) = self.inner.timers.remove(id) {
            timer.abort();
        }
    }

    fn abort_all_timers(&self) {
        self.inner.timers.retain(|_, timer| {
            timer.abort();
            false
        });
    }
}

impl Default for AlertQueue {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

impl std::fmt::Debug for AlertQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertQueue")
            .field("len", &self.len())
            .field("max_alerts", &self.inner.config.max_alerts)
            .field("pending_timers", &self.pending_timers())
            .finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
