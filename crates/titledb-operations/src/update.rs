//! Manifest-driven update of the installed packs.
//!
//! An update downloads both packs next to their final location with a
//! `.download` suffix, verifies size and SHA-256, writes the manifest record
//! and then commits the three files as a group. If any commit fails, the files
//! already committed are rolled back in reverse order, so the store ends up
//! either exactly as before or fully at the new version.

use std::{
    cell::RefCell,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use titledb_dl::{DownloadError, Fetcher, Progress};
use titledb_registry::{fetch_manifest, FileRef};
use titledb_store::{layout::MANIFEST_FILE, MetadataService};
use titledb_utils::{
    atomic::{self, CommitHandle},
    error::HashError,
    fs::{ensure_dir_exists, safe_remove, with_suffix},
    hash::digest_file,
};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, UpdateError},
    progress::{band_percent, ProgressThrottle},
    types::{ApplyResult, CheckResult, PackKind, UpdateProgress, UpdateStage},
};

pub const DOWNLOAD_SUFFIX: &str = ".download";

const MANIFEST_FETCHING: f64 = 5.0;
const MANIFEST_PARSED: f64 = 15.0;
const TITLES_BAND: (f64, f64) = (20.0, 45.0);
const ICONS_BAND: (f64, f64) = (45.0, 70.0);
const WRITING_MANIFEST: f64 = 80.0;
const COMMITTING: f64 = 90.0;
const DONE: f64 = 100.0;

/// Removes leftover temp files when dropped.
struct Scratch(Vec<PathBuf>);

impl Drop for Scratch {
    fn drop(&mut self) {
        for path in &self.0 {
            if let Err(err) = safe_remove(path) {
                debug!("{err}");
            }
        }
    }
}

/// Single writer of the offline store.
pub struct Updater<F: Fetcher> {
    fetcher: F,
    service: Arc<MetadataService>,
}

impl<F: Fetcher> Updater<F> {
    pub fn new(fetcher: F, service: Arc<MetadataService>) -> Self {
        Self {
            fetcher,
            service,
        }
    }

    pub fn service(&self) -> &Arc<MetadataService> {
        &self.service
    }

    /// Compares the published manifest with the installed state. Never writes.
    pub fn check_for_update(&self, manifest_url: &str) -> CheckResult {
        let local_version = self.service.get_installed_version();

        match fetch_manifest(&self.fetcher, manifest_url) {
            Ok((manifest, _)) => {
                let update_available = !self.service.has_installed_packs()
                    || local_version.is_empty()
                    || local_version != manifest.version;
                CheckResult {
                    success: true,
                    update_available,
                    local_version,
                    remote_version: manifest.version,
                    error: None,
                }
            }
            Err(err) => {
                CheckResult {
                    success: false,
                    local_version,
                    error: Some(UpdateError::from_registry(manifest_url, err)),
                    ..Default::default()
                }
            }
        }
    }

    /// Installs the packs described by the manifest at `manifest_url`.
    ///
    /// Without `force`, an installation already at the published version is
    /// left alone and reported with `updated == false`.
    pub fn apply_update(
        &self,
        manifest_url: &str,
        force: bool,
        on_progress: Option<&dyn Fn(UpdateProgress)>,
    ) -> ApplyResult {
        let emit = |progress: UpdateProgress| {
            if let Some(cb) = on_progress {
                cb(progress);
            }
        };

        match self.run(manifest_url, force, &emit) {
            Ok((version, updated)) => {
                ApplyResult {
                    success: true,
                    updated,
                    version,
                    error: None,
                }
            }
            Err(err) => {
                warn!("update failed: {err}");
                ApplyResult {
                    success: false,
                    updated: false,
                    version: self.service.get_installed_version(),
                    error: Some(err),
                }
            }
        }
    }

    fn run(
        &self,
        manifest_url: &str,
        force: bool,
        emit: &dyn Fn(UpdateProgress),
    ) -> Result<(String, bool)> {
        emit(UpdateProgress::stage(
            UpdateStage::FetchingManifest,
            MANIFEST_FETCHING,
        ));
        let (manifest, raw) = fetch_manifest(&self.fetcher, manifest_url)
            .map_err(|err| UpdateError::from_registry(manifest_url, err))?;
        emit(UpdateProgress::stage(
            UpdateStage::FetchingManifest,
            MANIFEST_PARSED,
        ));

        let local_version = self.service.get_installed_version();
        if !force
            && self.service.has_installed_packs()
            && !local_version.is_empty()
            && local_version == manifest.version
        {
            info!("titledb {} is already installed", local_version);
            emit(UpdateProgress::stage(UpdateStage::UpToDate, DONE));
            return Ok((local_version, false));
        }

        let layout = self.service.layout();
        let dir = layout.offline_dir();
        ensure_dir_exists(&dir).map_err(|source| {
            UpdateError::DirectoryCreateFailed {
                path: dir.clone(),
                source,
            }
        })?;

        let titles_temp = with_suffix(layout.titles_pack(), DOWNLOAD_SUFFIX);
        let icons_temp = with_suffix(layout.icons_pack(), DOWNLOAD_SUFFIX);
        let manifest_temp = with_suffix(layout.manifest(), DOWNLOAD_SUFFIX);
        let _scratch = Scratch(vec![
            titles_temp.clone(),
            icons_temp.clone(),
            manifest_temp.clone(),
        ]);

        self.download_verified(
            PackKind::Titles,
            &manifest.titles,
            &titles_temp,
            TITLES_BAND,
            emit,
        )?;
        self.download_verified(
            PackKind::Icons,
            &manifest.icons,
            &icons_temp,
            ICONS_BAND,
            emit,
        )?;

        emit(UpdateProgress::stage(
            UpdateStage::WritingManifest,
            WRITING_MANIFEST,
        ));
        write_synced(&manifest_temp, raw.as_bytes()).map_err(|source| {
            UpdateError::WriteFailed {
                path: manifest_temp.clone(),
                source,
            }
        })?;

        emit(UpdateProgress::stage(UpdateStage::Committing, COMMITTING));
        let handles = commit_group(&[
            (
                &titles_temp,
                layout.titles_pack(),
                PackKind::Titles.file_name(),
            ),
            (&icons_temp, layout.icons_pack(), PackKind::Icons.file_name()),
            (&manifest_temp, layout.manifest(), MANIFEST_FILE),
        ])?;

        for handle in handles {
            let backup = handle.backup().to_path_buf();
            if let Err(err) = handle.cleanup() {
                warn!("failed to remove {}: {}", backup.display(), err);
            }
        }

        self.service.invalidate();
        info!("installed titledb {}", manifest.version);
        emit(UpdateProgress::stage(UpdateStage::Done, DONE));

        Ok((manifest.version, true))
    }

    /// Downloads `file` into `temp` and checks its size and digest.
    /// `temp` is removed on any failure.
    fn download_verified(
        &self,
        kind: PackKind,
        file: &FileRef,
        temp: &Path,
        (start, end): (f64, f64),
        emit: &dyn Fn(UpdateProgress),
    ) -> Result<()> {
        let name = kind.file_name();
        let expected = file.size;
        let fail = |err: UpdateError| {
            if let Err(remove_err) = safe_remove(temp) {
                debug!("{remove_err}");
            }
            err
        };

        emit(UpdateProgress {
            stage: UpdateStage::Downloading(kind),
            percent: start,
            downloaded: 0,
            total: expected,
            bytes_per_sec: 0.0,
        });

        let throttle = RefCell::new(ProgressThrottle::new());
        let on_chunk = |progress: Progress| {
            let (downloaded, is_final) = match progress {
                Progress::Starting { .. } => return,
                Progress::Chunk { current, .. } => (current, current >= expected),
                Progress::Complete { total } => (total, true),
            };
            let percent = band_percent(start, end, downloaded, expected);
            let rate = throttle
                .borrow_mut()
                .observe(Instant::now(), downloaded, percent, is_final);
            if let Some(bytes_per_sec) = rate {
                emit(UpdateProgress {
                    stage: UpdateStage::Downloading(kind),
                    percent,
                    downloaded,
                    total: expected,
                    bytes_per_sec,
                });
            }
        };

        debug!("downloading {} from {}", name, file.url);
        self.fetcher
            .fetch_to_file(&file.url, temp, Some(&on_chunk))
            .map_err(|source| {
                fail(UpdateError::DownloadFailed {
                    file: name.to_string(),
                    source,
                })
            })?;

        emit(UpdateProgress {
            stage: UpdateStage::Verifying(kind),
            percent: end,
            downloaded: expected,
            total: expected,
            bytes_per_sec: throttle.borrow().rate(),
        });

        let digest = digest_file(temp).map_err(|err| {
            let HashError::ReadFailed { source, .. } = err;
            fail(UpdateError::DownloadFailed {
                file: name.to_string(),
                source: DownloadError::Io(source),
            })
        })?;

        if digest.size != expected {
            return Err(fail(UpdateError::SizeMismatch {
                file: name.to_string(),
                expected,
                actual: digest.size,
            }));
        }
        if !digest.sha256.eq_ignore_ascii_case(&file.sha256) {
            return Err(fail(UpdateError::HashMismatch {
                file: name.to_string(),
                expected: file.sha256.clone(),
                actual: digest.sha256,
            }));
        }

        debug!("verified {} ({} bytes)", name, digest.size);
        Ok(())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Commits every `(temp, target, name)` in order, or none of them.
fn commit_group(files: &[(&PathBuf, PathBuf, &str)]) -> Result<Vec<CommitHandle>> {
    let mut committed: Vec<CommitHandle> = Vec::with_capacity(files.len());

    for (temp, target, name) in files {
        match atomic::commit(temp, target) {
            Ok(handle) => committed.push(handle),
            Err(source) => {
                warn!("failed to commit {}, rolling back", name);
                for handle in committed.into_iter().rev() {
                    let target = handle.target().to_path_buf();
                    if let Err(err) = handle.rollback() {
                        warn!("failed to roll back {}: {}", target.display(), err);
                    }
                }
                return Err(UpdateError::CommitFailed {
                    file: name.to_string(),
                    source,
                });
            }
        }
    }

    Ok(committed)
}
