use std::sync::Arc;

use clap::Parser;
use cli::{Args, Commands};
use logging::setup_logging;
use miette::IntoDiagnostic;
use titledb_config::{
    config::{self, get_config, set_config_path, Config, CONFIG_PATH},
    error::ConfigError,
};
use titledb_dl::{http_client::configure_http_client, HttpFetcher};
use titledb_operations::Updater;
use titledb_store::{MetadataService, StoreLayout};
use titledb_utils::path::resolve_path;
use tracing::{debug, info};
use ureq::{
    http::{HeaderMap, HeaderName, HeaderValue},
    Proxy,
};
use utils::{set_color, set_progress};

mod build;
mod cli;
mod logging;
mod progress;
mod query;
mod update;
mod utils;

/// Folds command-line transport flags over the file configuration.
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(proxy) = &args.proxy {
        config.proxy = Some(proxy.clone());
    }
    if let Some(user_agent) = &args.user_agent {
        config.user_agent = Some(user_agent.clone());
    }
    if let Some(headers) = &args.header {
        config
            .headers
            .get_or_insert_with(Vec::new)
            .extend(headers.iter().cloned());
    }
}

fn header_map(pairs: &[(String, String)]) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        let invalid = || ConfigError::InvalidHeader(format!("{name}: {value}"));
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.append(name, value);
    }
    Ok(map)
}

fn configure_transport(config: &Config) -> miette::Result<()> {
    let timeout = config.get_timeout()?;
    let headers = header_map(&config.get_headers()?)?;
    let proxy = config
        .proxy
        .as_deref()
        .map(Proxy::new)
        .transpose()
        .into_diagnostic()?;
    let user_agent = config.user_agent.clone();

    configure_http_client(|client| {
        if proxy.is_some() {
            client.proxy = proxy;
        }
        if user_agent.is_some() {
            client.user_agent = user_agent;
        }
        if !headers.is_empty() {
            client.headers = Some(headers);
        }
        if timeout.is_some() {
            client.timeout = timeout;
        }
    });
    Ok(())
}

fn create_service(config: &Config) -> miette::Result<Arc<MetadataService>> {
    let data_dir = config.get_data_dir()?;
    debug!("data dir: {}", data_dir.display());
    Ok(Arc::new(MetadataService::new(StoreLayout::new(data_dir))))
}

fn handle_cli() -> miette::Result<()> {
    let args = Args::parse();

    setup_logging(&args);
    set_color(!args.no_color);
    set_progress(!args.no_progress && !args.quiet && !args.json);

    if let Some(path) = &args.config {
        set_config_path(resolve_path(path).map_err(ConfigError::from)?);
    }

    config::init()?;
    let mut config = get_config();
    apply_overrides(&mut config, &args);

    match args.command {
        Commands::Check {
            url,
        } => {
            configure_transport(&config)?;
            let updater = Updater::new(HttpFetcher::new(), create_service(&config)?);
            update::check_update(&updater, config.get_manifest_url(url.as_deref())?)?;
        }
        Commands::Update {
            url,
            force,
        } => {
            configure_transport(&config)?;
            let updater = Updater::new(HttpFetcher::new(), create_service(&config)?);
            update::apply_update(&updater, config.get_manifest_url(url.as_deref())?, force)?;
        }
        Commands::Info {
            title_id,
        } => {
            let service = create_service(&config)?;
            query::show_info(&service, &title_id, args.json)?;
        }
        Commands::Icon {
            title_id,
            output,
        } => {
            let service = create_service(&config)?;
            query::export_icon(&service, &title_id, output.as_deref())?;
        }
        Commands::Status => {
            let service = create_service(&config)?;
            query::show_status(&service, args.json)?;
        }
        Commands::Build {
            titles,
            icons,
            out,
        } => build::build_packs(&titles, icons.as_deref(), &out)?,
        Commands::Config => {
            let path = CONFIG_PATH
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone();
            debug!("config path: {}", path.display());
            info!("{}", config.to_toml()?);
        }
    }

    progress::stop();
    Ok(())
}

fn main() -> miette::Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    handle_cli()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let mut config = Config {
            proxy: Some("http://file-proxy:8080".into()),
            headers: Some(vec!["X-From-File: 1".into()]),
            ..Default::default()
        };
        let args = Args::try_parse_from([
            "titledb",
            "-P",
            "http://cli-proxy:3128",
            "-H",
            "X-From-Cli: 2",
            "status",
        ])
        .unwrap();

        apply_overrides(&mut config, &args);
        assert_eq!(config.proxy.as_deref(), Some("http://cli-proxy:3128"));
        assert_eq!(
            config.get_headers().unwrap(),
            vec![
                ("X-From-File".to_string(), "1".to_string()),
                ("X-From-Cli".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_header_map() {
        let map = header_map(&[("X-Token".into(), "abc".into())]).unwrap();
        assert_eq!(map.get("x-token").unwrap(), "abc");

        assert!(matches!(
            header_map(&[("Bad Name".into(), "v".into())]),
            Err(ConfigError::InvalidHeader(_))
        ));
        assert!(header_map(&[("X-Ok".into(), "line\nbreak".into())]).is_err());
    }

    #[test]
    fn test_service_serves_read_commands() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: Some(dir.path().display().to_string()),
            ..Default::default()
        };

        let service = create_service(&config).unwrap();
        query::show_status(&service, true).unwrap();
        assert!(query::show_info(&service, "0100000000010000", true).is_err());
        assert!(query::export_icon(&service, "0100000000010000", None).is_err());
    }
}
