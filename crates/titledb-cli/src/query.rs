use std::{fs, path::PathBuf};

use miette::{miette, IntoDiagnostic, WrapErr};
use nu_ansi_term::Color::{Blue, Cyan, Green, Magenta, Red};
use serde_json::json;
use titledb_store::{format_title_id, parse_title_id, MetadataService, TitleMetadata};
use titledb_utils::{bytes::format_bytes, path::resolve_path};
use tracing::{debug, info};

use crate::utils::{version_or_dash, Colored, Icons};

/// `20200131` as `2020-01-31`; anything else verbatim.
fn format_release_date(date: u32) -> String {
    let text = date.to_string();
    if text.len() == 8 {
        format!("{}-{}-{}", &text[..4], &text[4..6], &text[6..])
    } else {
        text
    }
}

fn print_metadata(title_id: u64, meta: &TitleMetadata, icon: Option<String>) {
    info!("{}", Colored(Blue, format_title_id(title_id)));

    let field = |label: &str, value: &str| info!("  {:<13}{}", format!("{label}:"), value);
    if let Some(name) = &meta.name {
        field("Name", &Colored(Cyan, name).to_string());
    }
    if let Some(publisher) = &meta.publisher {
        field("Publisher", publisher);
    }
    if let Some(version) = meta.version {
        field("Version", &version.to_string());
    }
    if let Some(date) = meta.release_date {
        field("Released", &format_release_date(date));
    }
    if let Some(size) = meta.size {
        field("Size", &Colored(Magenta, format_bytes(size, 2)).to_string());
    }
    if let Some(is_demo) = meta.is_demo {
        field("Demo", if is_demo { "yes" } else { "no" });
    }
    if let Some(intro) = &meta.intro {
        field("Intro", intro);
    }
    if let Some(description) = &meta.description {
        field("Description", description);
    }
    match icon {
        Some(ext) => field("Icon", &format!("{} {ext}", Colored(Green, Icons::CHECK))),
        None => field("Icon", &Colored(Red, Icons::CROSS).to_string()),
    }
}

pub fn show_info(service: &MetadataService, title_id: &str, json: bool) -> miette::Result<()> {
    let title_id = parse_title_id(title_id)?;
    let meta = service.try_get_metadata(title_id).ok_or_else(|| {
        miette!(
            help = "Run `titledb update` to install the latest database",
            "No metadata for title {}",
            format_title_id(title_id)
        )
    })?;
    let icon = service
        .has_icon(title_id)
        .then(|| service.icon_extension(title_id))
        .flatten();

    if json {
        let value = json!({
            "title_id": format_title_id(title_id),
            "metadata": meta,
            "icon": icon,
        });
        println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
    } else {
        print_metadata(title_id, &meta, icon);
    }

    Ok(())
}

pub fn export_icon(
    service: &MetadataService,
    title_id: &str,
    output: Option<&str>,
) -> miette::Result<()> {
    let title_id = parse_title_id(title_id)?;
    let data = service
        .try_get_icon_data(title_id)
        .ok_or_else(|| miette!("No icon for title {}", format_title_id(title_id)))?;

    if let Some(legacy) = service.try_get_icon_path(title_id) {
        debug!("icon served from {}", legacy.display());
    }

    let path = match output {
        Some(output) => resolve_path(output).into_diagnostic()?,
        None => {
            let ext = service
                .icon_extension(title_id)
                .unwrap_or_else(|| "img".to_string());
            PathBuf::from(format!("{}.{ext}", format_title_id(title_id)))
        }
    };

    fs::write(&path, &data)
        .into_diagnostic()
        .wrap_err_with(|| format!("writing {}", path.display()))?;

    info!(
        "{} Wrote {} ({})",
        Colored(Green, Icons::CHECK),
        path.display(),
        format_bytes(data.len() as u64, 2)
    );
    Ok(())
}

pub fn show_status(service: &MetadataService, json: bool) -> miette::Result<()> {
    let version = service.get_installed_version();
    let installed = service.has_installed_packs();
    let titles = service.title_count();
    let icons = service.icon_count();
    let title_source = service.title_source();
    let icon_source = service.icon_source();

    if json {
        let value = json!({
            "data_dir": service.layout().data_dir,
            "version": version,
            "packs_installed": installed,
            "titles": titles,
            "icons": icons,
            "title_source": title_source,
            "icon_source": icon_source,
        });
        println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        return Ok(());
    }

    let describe = |source: Option<PathBuf>| {
        source
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    let packs = if installed {
        Colored(Green, Icons::CHECK)
    } else {
        Colored(Red, Icons::CROSS)
    };

    info!("Data dir:  {}", service.layout().data_dir.display());
    info!("Version:   {}", Colored(Cyan, version_or_dash(&version)));
    info!("Packs:     {packs}");
    info!("Titles:    {} from {}", titles, describe(title_source));
    info!("Icons:     {} from {}", icons, describe(icon_source));
    Ok(())
}
