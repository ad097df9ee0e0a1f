//! Single-item materialization orchestrator.
//!
//! Drives one catalog item at a time through transfer, optional extraction
//! and placement, and supports cancellation of the active item.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rommend_archive::{ExtractionError, ExtractionJob, is_container};
use rommend_folders::{PlatformFolderMap, platform_dir};
use rommend_protocol::constants::PARTIAL_SUFFIX;
use rommend_protocol::{CatalogItem, ProgressSink, TransferRequest};
use rommend_transfer::{TransferEngine, TransferOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::PipelineError;
use crate::types::{MaterializeOutcome, PipelineState};

/// Where an item's bytes go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPaths {
    /// `<root>/<platform folder>/<fs_name>`.
    pub target: PathBuf,
    /// `target` plus the partial suffix; bytes stream here first.
    pub partial: PathBuf,
    /// `<root>/<platform folder>/<file stem>` for containers.
    pub extract_dir: Option<PathBuf>,
}

impl ItemPaths {
    /// Path the item ends up at once materialized.
    pub fn final_path(&self) -> &Path {
        self.extract_dir.as_deref().unwrap_or(&self.target)
    }
}

#[derive(Default)]
struct Inner {
    state: PipelineState,
    cancel: Option<CancellationToken>,
    materialized: HashMap<u64, PathBuf>,
}

/// Resets the orchestrator to idle however a request ends, including when
/// its future is dropped mid-flight.
struct IdleGuard<'a>(&'a Orchestrator);

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.lock();
        inner.state = PipelineState::Idle;
        inner.cancel = None;
    }
}

/// Materializes catalog items under a download root.
pub struct Orchestrator {
    engine: TransferEngine,
    folders: Arc<PlatformFolderMap>,
    root: PathBuf,
    inner: Mutex<Inner>,
}

impl Orchestrator {
    pub fn new(
        engine: TransferEngine,
        folders: Arc<PlatformFolderMap>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            folders,
            root: root.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn folders(&self) -> &PlatformFolderMap {
        &self.folders
    }

    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    pub fn is_materialized(&self, id: u64) -> bool {
        self.lock().materialized.contains_key(&id)
    }

    pub fn materialized_path(&self, id: u64) -> Option<PathBuf> {
        self.lock().materialized.get(&id).cloned()
    }

    /// Requests cancellation of the active item.
    ///
    /// Returns `false` when nothing cancellable is running.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            PipelineState::Transferring | PipelineState::Extracting => {
                inner.state = PipelineState::Cancelling;
                if let Some(token) = &inner.cancel {
                    token.cancel();
                }
                info!("cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Computes where `item` is downloaded and extracted to.
    pub fn plan(&self, item: &CatalogItem) -> Result<ItemPaths, PipelineError> {
        let folder = self.folders.resolve(&item.platform_fs_slug);
        check_relative_folder(folder)?;
        check_file_name(&item.fs_name)?;

        let dir = platform_dir(&self.root, &self.folders, &item.platform_fs_slug);
        let target = dir.join(&item.fs_name);

        let mut partial_name = target.as_os_str().to_os_string();
        partial_name.push(".");
        partial_name.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial_name);

        let extract_dir = if is_container(&target) {
            let stem = Path::new(&item.fs_name)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            check_file_name(&stem)?;
            Some(dir.join(stem))
        } else {
            None
        };

        Ok(ItemPaths {
            target,
            partial,
            extract_dir,
        })
    }

    /// Downloads `item` and, for containers, extracts it in place.
    ///
    /// Returns [`PipelineError::Busy`] without side effects when another
    /// item is in flight. Every other result is a [`MaterializeOutcome`].
    pub async fn materialize(
        &self,
        item: &CatalogItem,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<MaterializeOutcome, PipelineError> {
        let cancel = self.begin()?;
        let _idle = IdleGuard(self);

        info!(
            item = item.id,
            name = %item.name,
            platform = %item.platform_fs_slug,
            "materialize started"
        );

        let outcome = self.run(item, sink, &cancel).await;
        match &outcome {
            MaterializeOutcome::Materialized(path) => {
                info!(item = item.id, path = %path.display(), "materialized");
            }
            MaterializeOutcome::AlreadyPresent(path) => {
                info!(item = item.id, path = %path.display(), "already present");
            }
            MaterializeOutcome::Failed(err) => {
                warn!(item = item.id, error = %err, "materialize failed");
            }
            MaterializeOutcome::Cancelled => {
                info!(item = item.id, "materialize cancelled");
            }
        }
        Ok(outcome)
    }

    async fn run(
        &self,
        item: &CatalogItem,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> MaterializeOutcome {
        let paths = match self.plan(item) {
            Ok(paths) => paths,
            Err(err) => return MaterializeOutcome::Failed(err),
        };

        let existing = paths.final_path();
        if existing.exists() {
            self.record(item.id, existing.to_path_buf());
            return MaterializeOutcome::AlreadyPresent(existing.to_path_buf());
        }

        let request = TransferRequest::for_item(item, paths.partial.clone());
        match self.engine.transfer(&request, sink.as_ref(), cancel).await {
            TransferOutcome::Completed(_) => {}
            TransferOutcome::Failed(err) => {
                remove_file_quietly(&paths.partial).await;
                return MaterializeOutcome::Failed(err.into());
            }
            TransferOutcome::Cancelled => {
                remove_file_quietly(&paths.partial).await;
                return MaterializeOutcome::Cancelled;
            }
        }

        match paths.extract_dir.as_deref() {
            Some(dir) => {
                self.place_container(item.id, &paths.partial, &paths.target, dir, sink, cancel)
                    .await
            }
            None => self.place_file(item.id, &paths.partial, &paths.target).await,
        }
    }

    /// Renames a finished download into place.
    async fn place_file(&self, id: u64, partial: &Path, target: &Path) -> MaterializeOutcome {
        if !self.advance(PipelineState::Finalizing) {
            remove_file_quietly(partial).await;
            return MaterializeOutcome::Cancelled;
        }
        if let Err(err) = tokio::fs::rename(partial, target).await {
            remove_file_quietly(partial).await;
            return MaterializeOutcome::Failed(err.into());
        }
        self.record(id, target.to_path_buf());
        MaterializeOutcome::Materialized(target.to_path_buf())
    }

    /// Extracts a finished container into a staging folder next to `dir`
    /// and renames it into place once complete. The container is removed
    /// whatever the result.
    async fn place_container(
        &self,
        id: u64,
        partial: &Path,
        container: &Path,
        dir: &Path,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> MaterializeOutcome {
        if let Err(err) = tokio::fs::rename(partial, container).await {
            remove_file_quietly(partial).await;
            return MaterializeOutcome::Failed(err.into());
        }

        let staging = staging_dir(dir);
        // Left over from an interrupted run.
        remove_dir_quietly(&staging).await;

        let base_name = dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let extracted = self
            .extract(container, &staging, base_name, sink, cancel)
            .await;
        remove_file_quietly(container).await;

        let placed = match extracted {
            Ok(()) if self.advance(PipelineState::Finalizing) => tokio::fs::rename(&staging, dir)
                .await
                .map_err(|err| MaterializeOutcome::Failed(err.into())),
            Ok(()) => Err(MaterializeOutcome::Cancelled),
            Err(outcome) => Err(outcome),
        };
        if let Err(outcome) = placed {
            remove_dir_quietly(&staging).await;
            return outcome;
        }

        self.record(id, dir.to_path_buf());
        MaterializeOutcome::Materialized(dir.to_path_buf())
    }

    /// Runs the extractor on the blocking pool.
    async fn extract(
        &self,
        container: &Path,
        dest: &Path,
        base_name: String,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<(), MaterializeOutcome> {
        if cancel.is_cancelled() || !self.advance(PipelineState::Extracting) {
            return Err(MaterializeOutcome::Cancelled);
        }

        let job = ExtractionJob {
            source: container.to_path_buf(),
            destination: dest.to_path_buf(),
            base_name,
        };
        let token = cancel.clone();
        let joined =
            tokio::task::spawn_blocking(move || rommend_archive::extract(&job, sink.as_ref(), &token))
                .await;

        match joined {
            Ok(Ok(report)) => {
                if !report.skipped.is_empty() {
                    warn!(skipped = ?report.skipped, "unsafe entries were not extracted");
                }
                debug!(files = report.written.len(), "container extracted");
                Ok(())
            }
            Ok(Err(ExtractionError::Cancelled)) => Err(MaterializeOutcome::Cancelled),
            Ok(Err(err)) => Err(MaterializeOutcome::Failed(err.into())),
            Err(err) => Err(MaterializeOutcome::Failed(PipelineError::Task(err.to_string()))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Result<CancellationToken, PipelineError> {
        let mut inner = self.lock();
        if inner.state != PipelineState::Idle {
            return Err(PipelineError::Busy);
        }
        let token = CancellationToken::new();
        inner.state = PipelineState::Transferring;
        inner.cancel = Some(token.clone());
        Ok(token)
    }

    /// Moves to `next` unless a cancellation is already under way.
    /// Returns `false` when the request has been cancelled.
    fn advance(&self, next: PipelineState) -> bool {
        let mut inner = self.lock();
        if inner.state == PipelineState::Cancelling {
            return false;
        }
        inner.state = next;
        true
    }

    fn record(&self, id: u64, path: PathBuf) {
        self.lock().materialized.insert(id, path);
    }
}

/// Hidden sibling of `dir` that extraction writes into.
fn staging_dir(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    dir.with_file_name(format!(".{name}.{PARTIAL_SUFFIX}"))
}

fn check_file_name(name: &str) -> Result<(), PipelineError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => Err(PipelineError::InvalidName(name.to_string())),
    }
}

fn check_relative_folder(folder: &str) -> Result<(), PipelineError> {
    if Path::new(folder)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Ok(())
    } else {
        Err(PipelineError::InvalidName(folder.to_string()))
    }
}

async fn remove_file_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove file"),
    }
}

async fn remove_dir_quietly(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial extraction"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove directory"),
    }
}
