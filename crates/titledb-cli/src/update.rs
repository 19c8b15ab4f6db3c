use nu_ansi_term::Color::{Cyan, Green, Red, Yellow};
use titledb_dl::Fetcher;
use titledb_operations::{UpdateProgress, Updater};
use tracing::info;

use crate::{
    progress::{create_update_job, handle_update_progress},
    utils::{version_or_dash, Colored, Icons},
};

pub fn check_update<F: Fetcher>(updater: &Updater<F>, manifest_url: &str) -> miette::Result<()> {
    let result = updater.check_for_update(manifest_url);
    if let Some(err) = result.error {
        return Err(err.into());
    }

    let local = version_or_dash(&result.local_version);
    if result.update_available {
        info!(
            local_version = %result.local_version,
            remote_version = %result.remote_version,
            update_available = true,
            "Update available: {} {} {}",
            Colored(Red, local),
            Icons::ARROW,
            Colored(Green, &result.remote_version),
        );
    } else {
        info!(
            local_version = %result.local_version,
            remote_version = %result.remote_version,
            update_available = false,
            "{} Up to date ({})",
            Colored(Green, Icons::CHECK),
            Colored(Cyan, local),
        );
    }

    Ok(())
}

pub fn apply_update<F: Fetcher>(
    updater: &Updater<F>,
    manifest_url: &str,
    force: bool,
) -> miette::Result<()> {
    let pb = create_update_job();
    let on_progress = |progress: UpdateProgress| handle_update_progress(&progress, &pb);
    let result = updater.apply_update(manifest_url, force, Some(&on_progress));
    pb.finish_and_clear();

    if let Some(err) = result.error {
        return Err(err.into());
    }

    if result.updated {
        let service = updater.service();
        info!(
            version = %result.version,
            titles = service.title_count(),
            icons = service.icon_count(),
            "{} Installed version {} ({} titles, {} icons)",
            Colored(Green, Icons::CHECK),
            Colored(Cyan, &result.version),
            service.title_count(),
            service.icon_count(),
        );
    } else {
        info!(
            version = %result.version,
            "{} Version {} is already installed",
            Colored(Yellow, Icons::CHECK),
            Colored(Cyan, &result.version),
        );
    }

    Ok(())
}
