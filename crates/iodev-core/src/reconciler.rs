// ── Incremental reconciler ──
//
// A single task owns the object cache. Change notifications patch the
// cache in receipt order and (re)arm a debounce timer; when it fires,
// the whole view is recomputed from the latest cache and published on a
// `watch` channel together with the preserved UI state.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use iodev_api::{ObjectEvent, ObjectStore, ObjectSubscription, SubscriptionItem};

use crate::config::CoreConfig;
use crate::convert;
use crate::detect::DetectorAdapter;
use crate::error::CoreError;
use crate::filter::{FilterPredicate, apply_filter};
use crate::model::ManagedObject;
use crate::namespace;
use crate::store::ObjectCache;
use crate::view::{self, Scope, ViewState};

const COMMAND_CHANNEL_SIZE: usize = 32;

/// Requests handled by the reconciler task.
#[derive(Debug)]
pub enum ReconcilerCommand {
    /// Reload from the store and recompute now, skipping the debounce.
    Refresh {
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
    SetFilter(FilterPredicate),
    ToggleExpanded(String),
    Select(Option<String>),
}

/// Handle to a running reconciler task.
pub struct ReconcilerHandle {
    commands: mpsc::Sender<ReconcilerCommand>,
    view: watch::Receiver<Arc<ViewState>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReconcilerHandle {
    /// Subscribe to published views.
    pub fn view(&self) -> watch::Receiver<Arc<ViewState>> {
        self.view.clone()
    }

    /// The most recently published view.
    pub fn current(&self) -> Arc<ViewState> {
        Arc::clone(&self.view.borrow())
    }

    pub async fn refresh(&self) -> Result<(), CoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(ReconcilerCommand::Refresh { reply }).await?;
        rx.await.map_err(|_| CoreError::ReconcilerStopped)?
    }

    pub async fn send(&self, command: ReconcilerCommand) -> Result<(), CoreError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoreError::ReconcilerStopped)
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.commands.is_closed()
    }

    /// Stop the task. A pending debounce is dropped; a recompute already
    /// running completes but is not published.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start the reconciler: subscribe, load, publish the first view.
pub fn spawn(
    store: Arc<dyn ObjectStore>,
    adapter: Arc<DetectorAdapter>,
    config: CoreConfig,
    warnings: Arc<Mutex<Vec<String>>>,
) -> Result<ReconcilerHandle, CoreError> {
    let subscription = store.subscribe("*")?;
    let (commands, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (view_tx, view) = watch::channel(Arc::new(ViewState::default()));
    let cancel = CancellationToken::new();

    let reconciler = Reconciler {
        store,
        adapter,
        config,
        warnings,
        cache: ObjectCache::new(),
        linked_instances: BTreeSet::new(),
        linked_active: false,
        view_tx,
        current: Arc::new(ViewState::default()),
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(reconciler.run(subscription, command_rx));

    Ok(ReconcilerHandle {
        commands,
        view,
        cancel,
        task: Mutex::new(Some(task)),
    })
}

// ── Task state ───────────────────────────────────────────────────────

struct Reconciler {
    store: Arc<dyn ObjectStore>,
    adapter: Arc<DetectorAdapter>,
    config: CoreConfig,
    warnings: Arc<Mutex<Vec<String>>>,
    cache: ObjectCache,
    /// Ids of the linked-devices instance objects currently present.
    linked_instances: BTreeSet<String>,
    linked_active: bool,
    view_tx: watch::Sender<Arc<ViewState>>,
    /// Last published view; source of UI state and of the previous tree.
    current: Arc<ViewState>,
    cancel: CancellationToken,
}

impl Reconciler {
    async fn run(
        mut self,
        mut subscription: ObjectSubscription,
        mut commands: mpsc::Receiver<ReconcilerCommand>,
    ) {
        if let Err(e) = self.reload().await {
            warn!(error = %e, "initial load failed");
            self.warn(format!("Initial load failed: {e}")).await;
        }
        self.recompute().await;

        let debounce = sleep(self.config.debounce);
        tokio::pin!(debounce);
        let mut pending = false;
        let mut listening = true;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if self.handle_command(command).await {
                        pending = false;
                    }
                }
                item = subscription.recv(), if listening => match item {
                    Some(SubscriptionItem::Event(event)) => {
                        if self.apply_event(event) {
                            pending = true;
                            debounce.as_mut().reset(Instant::now() + self.config.debounce);
                        }
                    }
                    Some(SubscriptionItem::Lagged(skipped)) => {
                        warn!(skipped, "change stream lagged, reloading");
                        if let Err(e) = self.reload().await {
                            self.warn(format!("Reload failed: {e}")).await;
                        }
                        pending = true;
                        debounce.as_mut().reset(Instant::now() + self.config.debounce);
                    }
                    None => {
                        warn!("change stream closed");
                        listening = false;
                    }
                },
                () = &mut debounce, if pending => {
                    pending = false;
                    self.recompute().await;
                }
            }
        }
        debug!("reconciler stopped");
    }

    /// Returns `true` if the command ran a full recompute.
    async fn handle_command(&mut self, command: ReconcilerCommand) -> bool {
        match command {
            ReconcilerCommand::Refresh { reply } => {
                let result = self.reload().await;
                if let Err(e) = &result {
                    warn!(error = %e, "refresh failed");
                }
                self.recompute().await;
                let _ = reply.send(result);
                true
            }
            ReconcilerCommand::SetFilter(filter) => {
                self.update_ui(|ui| ui.filter = filter);
                false
            }
            ReconcilerCommand::ToggleExpanded(id) => {
                self.update_ui(|ui| {
                    if !ui.expanded.remove(&id) {
                        ui.expanded.insert(id);
                    }
                });
                false
            }
            ReconcilerCommand::Select(id) => {
                self.update_ui(|ui| ui.selected = id);
                false
            }
        }
    }

    // ── Cache maintenance ──

    fn watches(&self, id: &str) -> bool {
        self.config.detect_foreign
            || namespace::is_within(id, &self.config.alias_namespace)
            || namespace::is_within(id, &self.config.linked_namespace)
            || id.starts_with("enum.")
    }

    /// `true` for `system.adapter.<linked adapter>.<n>` itself, not for the
    /// instance's own states below it.
    fn is_linked_instance_id(&self, id: &str) -> bool {
        id.strip_prefix("system.adapter.")
            .and_then(|rest| rest.strip_prefix(self.config.linked_adapter()))
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Patch the cache. Returns `true` if a recompute is needed.
    fn apply_event(&mut self, event: ObjectEvent) -> bool {
        if self.is_linked_instance_id(&event.id) {
            let present = event
                .object
                .as_ref()
                .is_some_and(|o| o.object_type == "instance");
            if present {
                self.linked_instances.insert(event.id.clone());
            } else {
                self.linked_instances.remove(&event.id);
            }
            let active = !self.linked_instances.is_empty();
            if active != self.linked_active {
                info!(active, instance = %event.id, "linked devices integration changed");
                self.linked_active = active;
                return true;
            }
            return false;
        }
        if !self.watches(&event.id) {
            return false;
        }
        match event.object {
            Some(raw) => match ManagedObject::try_from(Arc::unwrap_or_clone(raw)) {
                Ok(object) => self.cache.upsert(object),
                Err(e) => {
                    warn!(id = %event.id, error = %e, "dropping malformed object");
                    self.cache.remove(&event.id);
                }
            },
            None => {
                self.cache.remove(&event.id);
            }
        }
        true
    }

    async fn reload(&mut self) -> Result<(), CoreError> {
        let raw = self.store.get_objects().await?;
        let instances = self
            .store
            .adapter_instances(self.config.linked_adapter())
            .await?;
        let objects = convert::convert_all(raw)
            .into_iter()
            .filter(|(id, _)| self.watches(id))
            .collect();
        self.cache.replace_all(objects);
        self.linked_instances = instances.into_iter().map(|i| i.id).collect();
        self.linked_active = !self.linked_instances.is_empty();
        debug!(objects = self.cache.len(), linked = self.linked_active, "cache reloaded");
        Ok(())
    }

    // ── Publishing ──

    async fn recompute(&mut self) {
        let snapshot = self.cache.snapshot();
        let ui = self.current.ui.clone();
        let scope = Scope::new(&self.config, self.linked_active);
        match view::compute(&self.adapter, &snapshot, scope, &ui.filter) {
            Ok(computed) => {
                for skipped in &computed.skipped {
                    self.warn(skipped.to_string()).await;
                }
                let next = ViewState {
                    snapshot,
                    devices: Arc::new(computed.devices),
                    nodes: Arc::new(computed.nodes),
                    ui,
                    linked_active: self.linked_active,
                    recomputes: self.current.recomputes + 1,
                };
                self.publish(next);
            }
            Err(e) => {
                warn!(error = %e, "recompute failed, keeping previous view");
                self.warn(e.to_string()).await;
            }
        }
    }

    /// Apply a UI change and re-run only the filter.
    fn update_ui(&mut self, change: impl FnOnce(&mut crate::view::UiState)) {
        let mut next = ViewState::clone(&self.current);
        change(&mut next.ui);
        let mut nodes = Vec::clone(&next.nodes);
        apply_filter(&mut nodes, &next.devices, &next.ui.filter);
        next.nodes = Arc::new(nodes);
        self.publish(next);
    }

    fn publish(&mut self, next: ViewState) {
        if self.cancel.is_cancelled() {
            debug!("reconciler torn down, result dropped");
            return;
        }
        let next = Arc::new(next);
        self.current = Arc::clone(&next);
        self.view_tx.send_replace(next);
    }

    async fn warn(&self, message: String) {
        self.warnings.lock().await.push(message);
    }
}
