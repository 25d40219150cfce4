// ── Device manager ──
//
// Facade over the reconciler and the mutation operations. Structural
// mutations run one at a time behind a local busy guard; their results
// come back through the store's change notifications like any other
// write.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use iodev_api::{ObjectStore, RawObject};

use crate::config::CoreConfig;
use crate::detect::DetectorAdapter;
use crate::drag::DropValidator;
use crate::enums::{self, EnumCategory};
use crate::error::CoreError;
use crate::filter::FilterPredicate;
use crate::model::{
    Device, ManagedObject, MembershipChange, MutationReport, MutationState, StepFailure,
};
use crate::mutation::{self, FolderEdit};
use crate::namespace;
use crate::reconciler::{self, ReconcilerCommand, ReconcilerHandle};
use crate::smart_name::{self, SmartName};
use crate::view::{Scope, ViewState};

/// The main entry point for embedders.
///
/// Cheaply cloneable via `Arc<ManagerInner>`.
#[derive(Clone)]
pub struct DeviceManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: CoreConfig,
    store: Arc<dyn ObjectStore>,
    reconciler: ReconcilerHandle,
    busy: Mutex<()>,
    mutation_state: watch::Sender<MutationState>,
    warnings: Arc<Mutex<Vec<String>>>,
}

impl DeviceManager {
    /// Start with the built-in pattern detector.
    pub fn start(store: Arc<dyn ObjectStore>, config: CoreConfig) -> Result<Self, CoreError> {
        Self::with_detector(store, config, Arc::new(DetectorAdapter::builtin()))
    }

    /// Subscribe to the store and spawn the reconciler. Must be called
    /// inside a tokio runtime.
    pub fn with_detector(
        store: Arc<dyn ObjectStore>,
        config: CoreConfig,
        adapter: Arc<DetectorAdapter>,
    ) -> Result<Self, CoreError> {
        let warnings = Arc::new(Mutex::new(Vec::new()));
        let reconciler = reconciler::spawn(
            Arc::clone(&store),
            adapter,
            config.clone(),
            Arc::clone(&warnings),
        )?;
        let (mutation_state, _) = watch::channel(MutationState::NotStarted);
        info!(alias = %config.alias_namespace, "device manager started");

        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                store,
                reconciler,
                busy: Mutex::new(()),
                mutation_state,
                warnings,
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Subscribe to published views.
    pub fn view(&self) -> watch::Receiver<Arc<ViewState>> {
        self.inner.reconciler.view()
    }

    pub fn current(&self) -> Arc<ViewState> {
        self.inner.reconciler.current()
    }

    pub fn mutation_state(&self) -> watch::Receiver<MutationState> {
        self.inner.mutation_state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.try_lock().is_err()
    }

    /// Drain accumulated non-fatal warnings.
    pub async fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.warnings.lock().await)
    }

    /// Scope matching `view`.
    pub fn scope<'a>(&'a self, view: &ViewState) -> Scope<'a> {
        Scope::new(&self.inner.config, view.linked_active)
    }

    /// Reload everything now.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.inner.reconciler.refresh().await
    }

    // ── UI state ─────────────────────────────────────────────────────

    pub async fn set_filter(&self, filter: FilterPredicate) -> Result<(), CoreError> {
        self.inner
            .reconciler
            .send(ReconcilerCommand::SetFilter(filter))
            .await
    }

    pub async fn toggle_expanded(&self, id: impl Into<String>) -> Result<(), CoreError> {
        self.inner
            .reconciler
            .send(ReconcilerCommand::ToggleExpanded(id.into()))
            .await
    }

    pub async fn select(&self, id: Option<String>) -> Result<(), CoreError> {
        self.inner
            .reconciler
            .send(ReconcilerCommand::Select(id))
            .await
    }

    // ── Device mutations ─────────────────────────────────────────────

    pub async fn copy_device(
        &self,
        index: usize,
        new_container_id: &str,
    ) -> Result<MutationReport, CoreError> {
        self.run_mutation("copy device", |view| async move {
            let device = device_at(&view, index)?;
            let scope = self.scope(&view);
            mutation::copy_device(self.store(), &view.snapshot, scope, device, new_container_id)
                .await
        })
        .await
    }

    /// Delete the device at `index`. Returns the report and the device
    /// list without it.
    pub async fn delete_device(
        &self,
        index: usize,
    ) -> Result<(MutationReport, Vec<Device>), CoreError> {
        self.run_mutation_with("delete device", |view| async move {
            let device = device_at(&view, index)?;
            let scope = self.scope(&view);
            if !scope.is_editable(&device.channel_id) {
                return Err(CoreError::validation(format!(
                    "{} is read-only",
                    device.channel_id
                )));
            }
            let report = mutation::delete_device(self.store(), &view.snapshot, scope, device).await;
            let mut devices = Vec::clone(&view.devices);
            devices.remove(index);
            Ok((report, devices))
        })
        .await
    }

    /// Move a device by drag and drop. `target` `None` is the namespace
    /// root. The drop is validated against the current view.
    pub async fn move_by_drag(
        &self,
        dragged: &str,
        target: Option<&str>,
    ) -> Result<MutationReport, CoreError> {
        self.run_mutation("move device", |view| async move {
            let scope = self.scope(&view);
            let validator = DropValidator::new(&view, scope);
            let plan = validator.check(dragged, target)?;
            let device = validator
                .device(&plan.source)
                .ok_or_else(|| CoreError::DeviceNotFound {
                    identifier: plan.source.clone(),
                })?;
            debug!(from = %plan.source, to = %plan.destination, "drop accepted");
            if plan.delete_source {
                mutation::move_device(self.store(), &view.snapshot, scope, device, &plan.destination)
                    .await
            } else {
                mutation::copy_device(self.store(), &view.snapshot, scope, device, &plan.destination)
                    .await
            }
        })
        .await
    }

    // ── Folder mutations ─────────────────────────────────────────────

    /// Create a folder below `parent` (the namespace root when `None`).
    pub async fn create_folder(&self, parent: Option<&str>, name: &str) -> Result<String, CoreError> {
        let _guard = self.inner.busy.try_lock().map_err(|_| CoreError::Busy)?;
        let view = self.current();
        let parent = parent.unwrap_or(self.inner.config.alias_namespace.as_str());
        mutation::create_folder(self.store(), &view.snapshot, self.scope(&view), parent, name).await
    }

    /// Change a folder's name, icon or color.
    pub async fn rename_folder(&self, id: &str, edit: FolderEdit) -> Result<MutationReport, CoreError> {
        self.run_mutation("rename folder", |view| async move {
            let scope = self.scope(&view);
            mutation::rename_folder(self.store(), &view.snapshot, scope, &view.devices, id, &edit)
                .await
        })
        .await
    }

    /// Decorative edits only; the id never changes.
    pub async fn update_folder(&self, id: &str, edit: FolderEdit) -> Result<(), CoreError> {
        let _guard = self.inner.busy.try_lock().map_err(|_| CoreError::Busy)?;
        let view = self.current();
        mutation::update_folder(self.store(), &view.snapshot, self.scope(&view), id, &edit).await
    }

    /// Move a folder below `new_parent` (the namespace root when `None`).
    pub async fn move_folder(
        &self,
        id: &str,
        new_parent: Option<&str>,
    ) -> Result<MutationReport, CoreError> {
        let parent = new_parent.unwrap_or(self.inner.config.alias_namespace.as_str());
        let new_id = namespace::join(parent, namespace::last_segment(id));
        self.run_mutation("move folder", |view| async move {
            let scope = self.scope(&view);
            mutation::move_folder(
                self.store(),
                &view.snapshot,
                scope,
                &view.devices,
                id,
                &new_id,
                &FolderEdit::default(),
            )
            .await
        })
        .await
    }

    // ── Memberships and smart names ──────────────────────────────────

    /// Make the device a member of exactly `rooms` and `functions`.
    pub async fn set_device_memberships(
        &self,
        index: usize,
        rooms: &[String],
        functions: &[String],
    ) -> Result<MembershipChange, CoreError> {
        let view = self.current();
        let device = device_at(&view, index)?;
        let mut outcome = MembershipChange::default();
        for (category, desired) in [(EnumCategory::Rooms, rooms), (EnumCategory::Functions, functions)]
        {
            let all = enums::enum_ids(&view.snapshot, category);
            let change =
                enums::set_membership(self.store(), &device.channel_id, desired, &all, category)
                    .await;
            outcome.changed |= change.changed;
            outcome.failures.extend(change.failures);
        }
        self.record_failures(&outcome.failures).await;
        Ok(outcome)
    }

    /// Set the smart name of the device's main state for `lang`.
    /// Returns `true` if the object was rewritten.
    pub async fn set_device_smart_name(
        &self,
        index: usize,
        lang: &str,
        value: SmartName,
    ) -> Result<bool, CoreError> {
        let view = self.current();
        let device = device_at(&view, index)?;
        let id = device
            .main_state_id()
            .ok_or_else(|| CoreError::DetectorInvariant {
                kind: device.kind.to_string(),
            })?;
        let raw = self
            .store()
            .get_object(id)
            .await?
            .ok_or_else(|| CoreError::ObjectNotFound { id: id.to_owned() })?;
        let mut object = ManagedObject::try_from(raw)?;
        if !smart_name::set(&mut object.common, lang, &value, &self.inner.config.smart_name_mode) {
            return Ok(false);
        }
        self.store().set_object(id, RawObject::from(object)).await?;
        debug!(id, lang, "smart name updated");
        Ok(true)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Stop the reconciler. Published views stay readable.
    pub async fn shutdown(&self) {
        self.inner.reconciler.shutdown().await;
        info!("device manager stopped");
    }

    // ── Internals ────────────────────────────────────────────────────

    fn store(&self) -> &dyn ObjectStore {
        self.inner.store.as_ref()
    }

    /// Run one structural mutation under the busy guard.
    async fn run_mutation<F, Fut>(
        &self,
        label: &'static str,
        f: F,
    ) -> Result<MutationReport, CoreError>
    where
        F: FnOnce(Arc<ViewState>) -> Fut,
        Fut: Future<Output = Result<MutationReport, CoreError>>,
    {
        self.run_mutation_with(label, |view| async move {
            f(view).await.map(|report| (report, ()))
        })
        .await
        .map(|(report, ())| report)
    }

    /// [`Self::run_mutation`] for operations that also derive a value from
    /// the view they ran against.
    async fn run_mutation_with<T, F, Fut>(
        &self,
        label: &'static str,
        f: F,
    ) -> Result<(MutationReport, T), CoreError>
    where
        F: FnOnce(Arc<ViewState>) -> Fut,
        Fut: Future<Output = Result<(MutationReport, T), CoreError>>,
    {
        let _guard = self.inner.busy.try_lock().map_err(|_| CoreError::Busy)?;
        self.inner.mutation_state.send_replace(MutationState::InProgress);

        match f(self.current()).await {
            Ok((report, extra)) => {
                let report = report.finish();
                self.record_failures(&report.failures).await;
                info!(
                    operation = label,
                    state = %report.state,
                    written = report.written.len(),
                    deleted = report.deleted.len(),
                    "mutation finished"
                );
                self.inner.mutation_state.send_replace(report.state);
                Ok((report, extra))
            }
            Err(e) => {
                warn!(operation = label, error = %e, "mutation rejected");
                self.inner.mutation_state.send_replace(MutationState::NotStarted);
                Err(e)
            }
        }
    }

    async fn record_failures(&self, failures: &[StepFailure]) {
        if failures.is_empty() {
            return;
        }
        let mut warnings = self.inner.warnings.lock().await;
        warnings.extend(failures.iter().map(ToString::to_string));
    }
}

fn device_at(view: &ViewState, index: usize) -> Result<&Device, CoreError> {
    view.device(index).ok_or_else(|| CoreError::DeviceNotFound {
        identifier: format!("#{index}"),
    })
}
