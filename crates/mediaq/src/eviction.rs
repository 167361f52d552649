use crate::config::{EvictionConfig, EvictionRoot};
use serde::Deserialize;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

const SIDECAR_SUFFIX: &str = ".meta";
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one eviction sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub files_removed: u64,
    pub bytes_freed: u64,
}

impl EvictionReport {
    fn merge(&mut self, other: EvictionReport) {
        self.files_removed += other.files_removed;
        self.bytes_freed += other.bytes_freed;
    }
}

/// Sidecar metadata stored next to an artifact as `<file>.meta`.
///
/// When present, its `created_at` (unix seconds) overrides the filesystem
/// mtime as the artifact's age source. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct SidecarMeta {
    created_at: f64,
}

/// Background loop deleting artifacts older than a per-directory threshold.
///
/// Runs independently of job tracking: it never consults the status store
/// and acts purely on file ages. The design relies on age thresholds being
/// much larger than any realistic task duration, so a file still in use by
/// a worker is never old enough to delete.
pub struct EvictionService {
    config: EvictionConfig,
    shutdown: watch::Sender<bool>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl EvictionService {
    pub fn new(config: EvictionConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            shutdown,
            handle: std::sync::Mutex::new(None),
        }
    }

    /// Start the scheduled loop. A second call while running is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::warn!("Eviction service already running");
            return;
        }

        let roots = self.config.roots.clone();
        let interval = self.config.interval;
        let mut shutdown_rx = self.shutdown.subscribe();

        *handle = Some(tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Eviction service started");
            loop {
                let report = run_sweep(roots.clone()).await;
                if report.files_removed > 0 {
                    tracing::info!(
                        files = report.files_removed,
                        bytes = report.bytes_freed,
                        "Evicted aged artifacts"
                    );
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            tracing::info!("Eviction service stopped");
        }));
    }

    /// Signal the loop to stop and wait for it, bounded by a join timeout.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let handle = {
            let mut guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        if let Some(handle) = handle {
            if tokio::time::timeout(STOP_JOIN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("Eviction loop did not stop within the join timeout");
            }
        }
    }

    /// Run one sweep immediately, outside the timer.
    ///
    /// Safe to race with the scheduled cycle: a file the other sweep already
    /// removed is skipped without error and counted by neither.
    pub async fn run_now(&self) -> EvictionReport {
        run_sweep(self.config.roots.clone()).await
    }
}

/// The filesystem walk is synchronous, so sweeps run on the blocking pool.
async fn run_sweep(roots: Vec<EvictionRoot>) -> EvictionReport {
    tokio::task::spawn_blocking(move || sweep(&roots))
        .await
        .unwrap_or_default()
}

fn sweep(roots: &[EvictionRoot]) -> EvictionReport {
    let mut report = EvictionReport::default();
    for root in roots {
        report.merge(sweep_directory(&root.path, root.max_age));
    }
    report
}

fn sweep_directory(root: &Path, max_age: Duration) -> EvictionReport {
    let mut report = EvictionReport::default();

    if !root.is_dir() {
        tracing::warn!(path = %root.display(), "Eviction root does not exist");
        return report;
    }

    let now = SystemTime::now();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();

        // Hidden files and metadata sidecars are never primaries; sidecars
        // are deleted alongside the file they describe.
        if name.starts_with('.') || name.ends_with(SIDECAR_SUFFIX) {
            continue;
        }

        let age = match artifact_age(path, now) {
            Some(age) => age,
            None => continue,
        };
        if age <= max_age {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        match std::fs::remove_file(path) {
            Ok(()) => {
                report.files_removed += 1;
                report.bytes_freed += size;
                remove_sidecar(path);
                tracing::debug!(path = %path.display(), age_secs = age.as_secs(), "Evicted file");
            }
            // Already removed by a concurrent sweep; count nothing.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to evict file");
            }
        }
    }

    report
}

/// Age from the sidecar's `created_at` when one exists and parses, else
/// from filesystem mtime. Returns `None` when neither source is usable
/// (e.g. the file vanished mid-scan).
fn artifact_age(path: &Path, now: SystemTime) -> Option<Duration> {
    if let Some(meta) = read_sidecar(path) {
        let created = SystemTime::UNIX_EPOCH + Duration::from_secs_f64(meta.created_at.max(0.0));
        return Some(now.duration_since(created).unwrap_or_default());
    }

    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(now.duration_since(modified).unwrap_or_default())
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(SIDECAR_SUFFIX);
    PathBuf::from(os)
}

fn read_sidecar(path: &Path) -> Option<SidecarMeta> {
    let raw = std::fs::read_to_string(sidecar_path(path)).ok()?;
    serde_json::from_str(&raw).ok()
}

fn remove_sidecar(path: &Path) {
    let sidecar = sidecar_path(path);
    if let Err(e) = std::fs::remove_file(&sidecar) {
        if e.kind() != ErrorKind::NotFound {
            tracing::error!(path = %sidecar.display(), error = %e, "Failed to remove sidecar");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_artifact(dir: &Path, name: &str, contents: &[u8], age: Option<Duration>) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        if let Some(age) = age {
            let created = SystemTime::now() - age;
            let secs = created
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap()
                .as_secs_f64();
            fs::write(
                sidecar_path(&path),
                format!(r#"{{"created_at": {secs}, "source": "test"}}"#),
            )
            .unwrap();
        }
        path
    }

    fn hours(h: u64) -> Duration {
        Duration::from_secs(h * 3600)
    }

    #[test]
    fn removes_only_files_past_threshold() {
        let dir = tempdir().unwrap();
        let old = write_artifact(dir.path(), "old.mp4", b"0123456789", Some(hours(25)));
        let fresh = write_artifact(dir.path(), "fresh.mp4", b"abc", Some(hours(1)));

        let report = sweep_directory(dir.path(), hours(24));

        assert_eq!(report.files_removed, 1);
        assert_eq!(report.bytes_freed, 10);
        assert!(!old.exists());
        assert!(!sidecar_path(&old).exists());
        assert!(fresh.exists());
        assert!(sidecar_path(&fresh).exists());
    }

    #[test]
    fn second_sweep_is_a_no_op() {
        let dir = tempdir().unwrap();
        write_artifact(dir.path(), "old.mp4", b"xxxx", Some(hours(30)));

        let first = sweep_directory(dir.path(), hours(24));
        assert_eq!(first.files_removed, 1);

        let second = sweep_directory(dir.path(), hours(24));
        assert_eq!(second, EvictionReport::default());
    }

    #[test]
    fn mtime_used_when_no_sidecar() {
        let dir = tempdir().unwrap();
        // Freshly written file with no sidecar: mtime is now, so a 24h
        // threshold keeps it.
        let path = write_artifact(dir.path(), "new.wav", b"pcm", None);

        let report = sweep_directory(dir.path(), hours(24));
        assert_eq!(report.files_removed, 0);
        assert!(path.exists());
    }

    #[test]
    fn sidecars_and_hidden_files_are_not_primaries() {
        let dir = tempdir().unwrap();
        // An orphan sidecar and a dotfile, both nominally ancient.
        let orphan = dir.path().join("gone.mp4.meta");
        fs::write(&orphan, r#"{"created_at": 0}"#).unwrap();
        let hidden = dir.path().join(".keep");
        fs::write(&hidden, b"").unwrap();

        let report = sweep_directory(dir.path(), Duration::ZERO);
        assert_eq!(report.files_removed, 0);
        assert!(orphan.exists());
        assert!(hidden.exists());
    }

    #[test]
    fn malformed_sidecar_falls_back_to_mtime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        fs::write(&path, b"data").unwrap();
        fs::write(sidecar_path(&path), "not json").unwrap();

        // mtime is now, so nothing is old enough.
        let report = sweep_directory(dir.path(), hours(1));
        assert_eq!(report.files_removed, 0);
        assert!(path.exists());
    }

    #[test]
    fn missing_root_reports_zero() {
        let report = sweep_directory(Path::new("/nonexistent/mediaq-test"), hours(1));
        assert_eq!(report, EvictionReport::default());
    }

    #[test]
    fn walks_nested_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        write_artifact(&nested, "deep.mp4", b"123456", Some(hours(48)));

        let report = sweep_directory(dir.path(), hours(24));
        assert_eq!(report.files_removed, 1);
        assert_eq!(report.bytes_freed, 6);
    }

    #[tokio::test]
    async fn run_now_aggregates_roots() {
        let storage = tempdir().unwrap();
        let temp = tempdir().unwrap();
        write_artifact(storage.path(), "a.mp4", b"aaaa", Some(hours(25)));
        write_artifact(temp.path(), "b.tmp", b"bb", Some(hours(13)));
        write_artifact(temp.path(), "c.tmp", b"cc", Some(hours(1)));

        let service = EvictionService::new(
            EvictionConfig::new()
                .root(storage.path(), hours(24))
                .root(temp.path(), hours(12)),
        );

        let report = service.run_now().await;
        assert_eq!(report.files_removed, 2);
        assert_eq!(report.bytes_freed, 6);
    }

    #[tokio::test]
    async fn scheduled_loop_starts_and_stops() {
        let dir = tempdir().unwrap();
        write_artifact(dir.path(), "old.mp4", b"zzz", Some(hours(25)));

        let service = EvictionService::new(
            EvictionConfig::new()
                .interval(Duration::from_millis(50))
                .root(dir.path(), hours(24)),
        );
        service.start();

        // The first cycle runs immediately on start.
        tokio::time::sleep(Duration::from_millis(100)).await;
        service.stop().await;

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
