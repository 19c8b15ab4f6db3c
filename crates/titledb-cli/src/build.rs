use std::{fs, path::Path};

use miette::{IntoDiagnostic, WrapErr};
use nu_ansi_term::Color::{Cyan, Green, Magenta};
use titledb_store::{
    json::parse_title_json,
    layout::{ICONS_PACK, TITLES_PACK},
    IconPackWriter, TitlePackWriter,
};
use titledb_utils::{
    bytes::format_bytes,
    fs::ensure_dir_exists,
    hash::digest_file,
    path::resolve_path,
};
use tracing::{info, warn};

use crate::utils::{Colored, Icons};

/// Logs what a manifest entry for `path` needs.
fn report_pack(path: &Path) -> miette::Result<()> {
    let digest = digest_file(path).into_diagnostic()?;
    info!(
        file = %path.display(),
        size = digest.size,
        sha256 = %digest.sha256,
        "{} {} {} sha256:{}",
        Colored(Green, Icons::CHECK),
        Colored(Cyan, path.display()),
        Colored(Magenta, format_bytes(digest.size, 2)),
        digest.sha256,
    );
    Ok(())
}

pub fn build_packs(titles: &str, icons: Option<&str>, out: &str) -> miette::Result<()> {
    let titles_path = resolve_path(titles).into_diagnostic()?;
    let out_dir = resolve_path(out).into_diagnostic()?;

    let text = fs::read_to_string(&titles_path)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading {}", titles_path.display()))?;
    let entries = parse_title_json(&text)?;

    let mut title_writer = TitlePackWriter::new();
    for (title_id, metadata) in entries {
        title_writer.add(title_id, metadata);
    }

    let mut icon_writer = IconPackWriter::new();
    if let Some(icons) = icons {
        let icons_dir = resolve_path(icons).into_diagnostic()?;
        icon_writer.add_directory(&icons_dir)?;
    }

    ensure_dir_exists(&out_dir).into_diagnostic()?;

    let titles_pack = out_dir.join(TITLES_PACK);
    title_writer.write(&titles_pack)?;
    report_pack(&titles_pack)?;

    if icon_writer.is_empty() {
        warn!("no icons found, skipping {}", ICONS_PACK);
    } else {
        let icons_pack = out_dir.join(ICONS_PACK);
        icon_writer.write(&icons_pack)?;
        report_pack(&icons_pack)?;
    }

    info!(
        "Packed {} titles and {} icons",
        title_writer.len(),
        icon_writer.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use titledb_store::{MetadataService, StoreLayout};

    use super::*;

    #[test]
    fn test_build_packs_round_trip() {
        let dir = tempdir().unwrap();
        let titles = dir.path().join("titles.json");
        fs::write(
            &titles,
            r#"{
                "0100000000010000": {"name": "Sample", "publisher": "Studio", "size": 1024},
                "0100000000020000": {"name": "Other", "isDemo": true}
            }"#,
        )
        .unwrap();
        let icons = dir.path().join("icons");
        fs::create_dir_all(&icons).unwrap();
        fs::write(icons.join("0100000000010000.png"), b"png").unwrap();

        let layout = StoreLayout::new(dir.path().join("store"));
        build_packs(
            titles.to_str().unwrap(),
            icons.to_str(),
            layout.offline_dir().to_str().unwrap(),
        )
        .unwrap();

        let service = MetadataService::new(layout);
        assert!(service.has_installed_packs());
        assert_eq!(service.title_count(), 2);
        let meta = service.try_get_metadata(0x0100_0000_0001_0000).unwrap();
        assert_eq!(meta.name.as_deref(), Some("Sample"));
        assert_eq!(meta.size, Some(1024));
        assert_eq!(
            service.try_get_metadata(0x0100_0000_0002_0000).unwrap().is_demo,
            Some(true)
        );
        assert_eq!(
            service.try_get_icon_data(0x0100_0000_0001_0000).as_deref(),
            Some(&b"png"[..])
        );
    }

    #[test]
    fn test_build_without_icons() {
        let dir = tempdir().unwrap();
        let titles = dir.path().join("titles.json");
        fs::write(&titles, r#"[["0100000000010000", "Sample"]]"#).unwrap();
        let out = dir.path().join("out");

        build_packs(titles.to_str().unwrap(), None, out.to_str().unwrap()).unwrap();
        assert!(out.join(TITLES_PACK).is_file());
        assert!(!out.join(ICONS_PACK).exists());
    }

    #[test]
    fn test_build_rejects_empty_document() {
        let dir = tempdir().unwrap();
        let titles = dir.path().join("titles.json");
        fs::write(&titles, "{}").unwrap();

        let out = dir.path().join("out");
        assert!(build_packs(titles.to_str().unwrap(), None, out.to_str().unwrap()).is_err());
    }
}
