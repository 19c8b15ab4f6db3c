use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use titledb_operations::{UpdateProgress, UpdateStage};
use titledb_utils::bytes::format_rate;

use crate::utils::progress_enabled;

/// Shared MultiProgress instance so logging can suspend the bars.
static MULTI: LazyLock<Arc<MultiProgress>> = LazyLock::new(|| Arc::new(MultiProgress::new()));

/// Pause progress display, run the closure, then resume.
pub fn suspend<F: FnOnce()>(f: F) {
    MULTI.suspend(f);
}

/// Stop and clear all progress bars.
pub fn stop() {
    MULTI.clear().ok();
}

fn update_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg:<24} {wide_bar:.cyan/dim} {pos:>3}%  {prefix}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━─")
}

/// Progress bar driven by [`UpdateProgress`] reports, scaled to 0..=100.
pub fn create_update_job() -> ProgressBar {
    let pb = if progress_enabled() {
        MULTI.add(ProgressBar::new(100))
    } else {
        MULTI.add(ProgressBar::hidden())
    };
    pb.set_style(update_style());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn handle_update_progress(progress: &UpdateProgress, pb: &ProgressBar) {
    pb.set_message(progress.stage.to_string());
    pb.set_position(progress.percent.round().clamp(0.0, 100.0) as u64);

    match progress.stage {
        UpdateStage::Downloading(_) if progress.bytes_per_sec > 0.0 => {
            pb.set_prefix(format_rate(progress.bytes_per_sec));
        }
        UpdateStage::Downloading(_) => {}
        _ => pb.set_prefix(""),
    }

    if matches!(progress.stage, UpdateStage::Done | UpdateStage::UpToDate) {
        pb.finish_and_clear();
    }
}
