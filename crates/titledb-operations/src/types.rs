use std::fmt;

use crate::error::UpdateError;

// ---- Check ----

/// Outcome of [`crate::Updater::check_for_update`].
#[derive(Debug, Default)]
pub struct CheckResult {
    pub success: bool,
    pub update_available: bool,
    /// Installed version, empty if none.
    pub local_version: String,
    /// Published version, empty if the manifest could not be read.
    pub remote_version: String,
    pub error: Option<UpdateError>,
}

// ---- Apply ----

/// Outcome of [`crate::Updater::apply_update`].
#[derive(Debug, Default)]
pub struct ApplyResult {
    pub success: bool,
    /// False when the installed packs were already current.
    pub updated: bool,
    /// Installed version after the call; unchanged on failure.
    pub version: String,
    pub error: Option<UpdateError>,
}

// ---- Progress ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackKind {
    Titles,
    Icons,
}

impl PackKind {
    /// File name of the pack once installed.
    pub fn file_name(self) -> &'static str {
        match self {
            PackKind::Titles => "titles.pack",
            PackKind::Icons => "icons.pack",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    FetchingManifest,
    UpToDate,
    Downloading(PackKind),
    Verifying(PackKind),
    WritingManifest,
    Committing,
    Done,
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStage::FetchingManifest => write!(f, "Fetching manifest"),
            UpdateStage::UpToDate => write!(f, "Up to date"),
            UpdateStage::Downloading(kind) => write!(f, "Downloading {}", kind.file_name()),
            UpdateStage::Verifying(kind) => write!(f, "Verifying {}", kind.file_name()),
            UpdateStage::WritingManifest => write!(f, "Writing manifest"),
            UpdateStage::Committing => write!(f, "Installing"),
            UpdateStage::Done => write!(f, "Done"),
        }
    }
}

/// A progress report from [`crate::Updater::apply_update`].
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateProgress {
    pub stage: UpdateStage,
    /// Overall completion, 0 to 100.
    pub percent: f64,
    /// Bytes of the current download so far; 0 outside downloads.
    pub downloaded: u64,
    pub total: u64,
    /// Smoothed download throughput.
    pub bytes_per_sec: f64,
}

impl UpdateProgress {
    pub fn stage(stage: UpdateStage, percent: f64) -> Self {
        Self {
            stage,
            percent,
            downloaded: 0,
            total: 0,
            bytes_per_sec: 0.0,
        }
    }
}
