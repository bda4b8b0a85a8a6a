// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operation scheduler.
//!
//! [`SyncManager`] is the entry point callers hold on to. It buffers
//! reported mutations behind a short debounce, queues at most one request
//! of each kind and runs them one at a time on a background task:
//!
//! 1. reset local sync state
//! 2. purge deleted call links
//! 3. persist recorded mutations
//! 4. clean up unknown data
//! 5. restore or create
//! 6. resolve callers waiting on restores
//! 7. back up pending changes
//!
//! A request for a kind that is already queued joins it, so concurrent
//! callers share one execution and all receive its result.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{TimeDelta, Utc};
use ss_core::ByteKey;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::mutations::{PendingMutations, ServiceId};
use crate::operation::{Completion, OperationMode, SyncOperation};

/// Result delivered to every caller waiting on a coalesced request.
pub type SyncOutcome = std::result::Result<(), Arc<SyncError>>;

type Waiter = oneshot::Sender<SyncOutcome>;

type PurgeWaiter = oneshot::Sender<std::result::Result<usize, Arc<SyncError>>>;

#[derive(Default)]
struct Queue {
    /// Mutations reported since the debounce timer started.
    buffered: PendingMutations,
    debounce_scheduled: bool,
    reset: Option<Vec<Waiter>>,
    purge_call_links: Option<Vec<PurgeWaiter>>,
    mutations: Option<PendingMutations>,
    cleanup: bool,
    restore: Option<Vec<Waiter>>,
    restore_waiters: Vec<Waiter>,
    backup: Option<Vec<Waiter>>,
    running: bool,
    last_restore: Option<SyncOutcome>,
}

impl Queue {
    fn next_job(&mut self) -> Option<Job> {
        if let Some(waiters) = self.reset.take() {
            return Some(Job::Reset(waiters));
        }
        if let Some(waiters) = self.purge_call_links.take() {
            return Some(Job::PurgeCallLinks(waiters));
        }
        if let Some(mutations) = self.mutations.take() {
            return Some(Job::PersistMutations(mutations));
        }
        if std::mem::take(&mut self.cleanup) {
            return Some(Job::CleanUp);
        }
        if let Some(waiters) = self.restore.take() {
            return Some(Job::Restore(waiters));
        }
        if !self.restore_waiters.is_empty() {
            return Some(Job::ResolveRestoreWaiters(std::mem::take(
                &mut self.restore_waiters,
            )));
        }
        self.backup.take().map(Job::Backup)
    }

    fn request_backup(&mut self, waiter: Option<Waiter>) {
        let waiters = self.backup.get_or_insert_with(Vec::new);
        waiters.extend(waiter);
    }
}

enum Job {
    Reset(Vec<Waiter>),
    PurgeCallLinks(Vec<PurgeWaiter>),
    PersistMutations(PendingMutations),
    CleanUp,
    Restore(Vec<Waiter>),
    ResolveRestoreWaiters(Vec<Waiter>),
    Backup(Vec<Waiter>),
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::Reset(_) => "reset",
            Job::PurgeCallLinks(_) => "purge_call_links",
            Job::PersistMutations(_) => "persist_mutations",
            Job::CleanUp => "cleanup",
            Job::Restore(_) => "restore",
            Job::ResolveRestoreWaiters(_) => "restore_waiters",
            Job::Backup(_) => "backup",
        }
    }
}

struct Shared {
    ctx: SyncContext,
    queue: Mutex<Queue>,
}

/// Schedules sync operations for one account.
///
/// Cheap to clone; clones share the same queue. Requests made outside a
/// tokio runtime stay queued until the next request made inside one.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<Shared>,
}

impl SyncManager {
    pub fn new(ctx: SyncContext) -> Self {
        SyncManager {
            inner: Arc::new(Shared {
                ctx,
                queue: Mutex::new(Queue::default()),
            }),
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.inner.ctx
    }

    // Mutation reporting

    pub fn record_pending_local_account(&self) {
        self.record(|m| m.local_account = true);
    }

    pub fn record_pending_recipients<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record(|m| m.recipients.extend(ids.into_iter().map(Into::into)));
    }

    pub fn record_pending_service_ids(&self, ids: impl IntoIterator<Item = ServiceId>) {
        self.record(|m| m.service_ids.extend(ids));
    }

    pub fn record_pending_groups_v1(&self, ids: impl IntoIterator<Item = ByteKey>) {
        self.record(|m| m.groups_v1.extend(ids));
    }

    pub fn record_pending_groups_v2(&self, master_keys: impl IntoIterator<Item = ByteKey>) {
        self.record(|m| m.groups_v2.extend(master_keys));
    }

    pub fn record_pending_distribution_lists(&self, ids: impl IntoIterator<Item = ByteKey>) {
        self.record(|m| m.distribution_lists.extend(ids));
    }

    pub fn record_pending_call_links(&self, root_keys: impl IntoIterator<Item = ByteKey>) {
        self.record(|m| m.call_links.extend(root_keys));
    }

    /// Buffer a mutation and start the debounce timer if it is not running.
    /// Later mutations do not push the timer back.
    fn record(&self, f: impl FnOnce(&mut PendingMutations)) {
        let mut queue = self.lock();
        f(&mut queue.buffered);
        if queue.debounce_scheduled || !queue.buffered.has_changes() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            tracing::debug!("no runtime, mutations stay buffered until the next flush");
            return;
        };
        queue.debounce_scheduled = true;
        drop(queue);

        let manager = self.clone();
        let delay = self.inner.ctx.config.debounce();
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            manager.flush_mutations();
        });
    }

    /// Hand buffered mutations to the scheduler without waiting for the
    /// debounce timer.
    pub fn flush_mutations(&self) {
        let mut queue = self.lock();
        queue.debounce_scheduled = false;
        let buffered = std::mem::take(&mut queue.buffered);
        if !buffered.has_changes() {
            return;
        }
        queue
            .mutations
            .get_or_insert_with(PendingMutations::default)
            .extend(buffered);
        self.kick(queue);
    }

    // Operation requests

    /// Restore the latest manifest, or create one, and wait for the result.
    pub async fn restore_or_create(&self) -> SyncOutcome {
        let (tx, rx) = oneshot::channel();
        {
            let mut queue = self.lock();
            queue.restore.get_or_insert_with(Vec::new).push(tx);
            self.kick(queue);
        }
        wait(rx).await
    }

    /// Queue a restore without waiting for it.
    pub fn request_restore(&self) {
        let mut queue = self.lock();
        queue.restore.get_or_insert_with(Vec::new);
        self.kick(queue);
    }

    /// Resolve once every restore queued so far has run, with the result
    /// of the most recent one. Backups queued meanwhile run afterwards.
    pub async fn wait_for_pending_restores(&self) -> SyncOutcome {
        let (tx, rx) = oneshot::channel();
        {
            let mut queue = self.lock();
            queue.restore_waiters.push(tx);
            self.kick(queue);
        }
        wait(rx).await
    }

    pub fn backup_pending_changes(&self) {
        let mut queue = self.lock();
        queue.request_backup(None);
        self.kick(queue);
    }

    pub async fn backup_pending_changes_and_wait(&self) -> SyncOutcome {
        let (tx, rx) = oneshot::channel();
        {
            let mut queue = self.lock();
            queue.request_backup(Some(tx));
            self.kick(queue);
        }
        wait(rx).await
    }

    pub fn clean_up_unknown_data(&self) {
        let mut queue = self.lock();
        queue.cleanup = true;
        self.kick(queue);
    }

    /// Forget all sync state once the running operation finishes. The next
    /// restore starts from scratch.
    pub async fn reset_local_data(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        {
            let mut queue = self.lock();
            queue.reset.get_or_insert_with(Vec::new).push(tx);
            self.kick(queue);
        }
        wait(rx).await.map_err(unshare)
    }

    /// Purge call links deleted longer ago than the configured delay and
    /// queue them as mutations so their records are removed remotely.
    /// Returns how many were purged.
    pub async fn clean_up_deleted_call_links(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        {
            let mut queue = self.lock();
            queue.purge_call_links.get_or_insert_with(Vec::new).push(tx);
            self.kick(queue);
        }
        wait(rx).await.map_err(unshare)
    }

    // Execution

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.inner.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start the drive loop unless it is already running. Takes the guard
    /// so the decision is made under the same lock as the enqueue.
    fn kick(&self, mut queue: MutexGuard<'_, Queue>) {
        if queue.running {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            tracing::debug!("no runtime, sync work stays queued");
            return;
        };
        queue.running = true;
        drop(queue);

        let manager = self.clone();
        handle.spawn(async move { manager.drive().await });
    }

    async fn drive(self) {
        loop {
            let job = {
                let mut queue = self.lock();
                match queue.next_job() {
                    Some(job) => job,
                    None => {
                        queue.running = false;
                        return;
                    }
                }
            };
            tracing::debug!(job = job.name(), "running sync job");
            self.execute(job).await;
        }
    }

    async fn execute(&self, job: Job) {
        match job {
            Job::Reset(waiters) => {
                tracing::info!("resetting local sync state");
                let reset = self.inner.ctx.db.lock().await.reset_sync_state();
                let outcome = reset.map_err(|e| Arc::new(SyncError::from(e)));
                if let Err(e) = &outcome {
                    tracing::error!(error = %e, "failed to reset sync state");
                }
                resolve(waiters, &outcome);
            }
            Job::PurgeCallLinks(waiters) => {
                let outcome = self.purge_call_links().await.map_err(Arc::new);
                if let Err(e) = &outcome {
                    tracing::error!(error = %e, "failed to purge deleted call links");
                }
                resolve(waiters, &outcome);
            }
            Job::PersistMutations(mutations) => {
                let persisted = self.persist(mutations).await;
                match persisted {
                    Ok(()) => {
                        self.lock().request_backup(None);
                    }
                    Err(e) => tracing::error!(error = %e, "failed to persist pending mutations"),
                }
            }
            Job::CleanUp => {
                if let Ok(completion) = self.run(OperationMode::CleanUp).await {
                    self.follow_up(completion);
                }
            }
            Job::Restore(waiters) => {
                let outcome = match self.run(OperationMode::RestoreOrCreate).await {
                    Ok(completion) => {
                        self.follow_up(completion);
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                self.lock().last_restore = Some(outcome.clone());
                resolve(waiters, &outcome);
            }
            Job::ResolveRestoreWaiters(waiters) => {
                let outcome = self.lock().last_restore.clone().unwrap_or(Ok(()));
                resolve(waiters, &outcome);
            }
            Job::Backup(waiters) => {
                let outcome = match self.run(OperationMode::Backup).await {
                    Ok(completion) => {
                        self.follow_up(completion);
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                resolve(waiters, &outcome);
            }
        }
    }

    async fn persist(&self, mutations: PendingMutations) -> Result<()> {
        let ctx = &self.inner.ctx;
        let db = ctx.db.lock().await;
        db.transaction(|db| {
            let mut state = db.load_sync_state()?;
            mutations.apply(db, &mut state, ctx.config.call_link_sync)?;
            db.save_sync_state(&state)
        })?;
        Ok(())
    }

    async fn purge_call_links(&self) -> Result<usize> {
        let ctx = &self.inner.ctx;
        let delay = TimeDelta::from_std(ctx.config.call_link_deletion_delay())
            .map_err(|e| SyncError::Config(format!("call link deletion delay: {e}")))?;
        let cutoff = Utc::now() - delay;
        let purged = ctx.db.lock().await.purge_call_links_deleted_before(cutoff)?;
        if !purged.is_empty() {
            tracing::info!(purged = purged.len(), "purged deleted call links");
            self.lock()
                .mutations
                .get_or_insert_with(PendingMutations::default)
                .call_links
                .extend(purged.iter().cloned());
        }
        Ok(purged.len())
    }

    async fn run(&self, mode: OperationMode) -> std::result::Result<Completion, Arc<SyncError>> {
        let result = SyncOperation::new(self.inner.ctx.clone(), mode).run().await;
        if let Err(e) = &result {
            tracing::error!(mode = ?mode, error = %e, "sync operation failed");
        }
        result.map_err(Arc::new)
    }

    fn follow_up(&self, completion: Completion) {
        if completion.backup_requested {
            self.lock().request_backup(None);
        }
    }
}

async fn wait<T>(
    rx: oneshot::Receiver<std::result::Result<T, Arc<SyncError>>>,
) -> std::result::Result<T, Arc<SyncError>> {
    rx.await.unwrap_or_else(|_| Err(Arc::new(SyncError::Shutdown)))
}

/// Hand back the error itself when no other caller shares it.
fn unshare(error: Arc<SyncError>) -> SyncError {
    Arc::try_unwrap(error).unwrap_or_else(SyncError::Shared)
}

fn resolve<T: Clone>(waiters: Vec<oneshot::Sender<T>>, outcome: &T) {
    for waiter in waiters {
        // The caller may have stopped waiting.
        let _ = waiter.send(outcome.clone());
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
