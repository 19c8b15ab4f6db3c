//! Process-wide HTTP agent, rebuilt whenever its settings change.

use std::{
    sync::{LazyLock, PoisonError, RwLock},
    time::Duration,
};

use ureq::{http::HeaderMap, typestate::WithoutBody, Agent, Proxy, RequestBuilder};

const DEFAULT_USER_AGENT: &str = concat!("titledb/", env!("CARGO_PKG_VERSION"));

/// Transport settings shared by every request of the process.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    /// Sent with every request on top of the agent defaults.
    pub headers: Option<HeaderMap>,
    pub proxy: Option<Proxy>,
    /// Whole-request deadline, connect through body.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            headers: None,
            proxy: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    fn agent(&self) -> Agent {
        Agent::config_builder()
            .proxy(self.proxy.clone())
            .timeout_global(self.timeout)
            .user_agent(self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .build()
            .into()
    }
}

struct Transport {
    agent: Agent,
    config: ClientConfig,
}

impl From<ClientConfig> for Transport {
    fn from(config: ClientConfig) -> Self {
        Self {
            agent: config.agent(),
            config,
        }
    }
}

static TRANSPORT: LazyLock<RwLock<Transport>> =
    LazyLock::new(|| RwLock::new(ClientConfig::default().into()));

/// GET request on the shared agent with the configured headers attached.
pub fn get(url: &str) -> RequestBuilder<WithoutBody> {
    let transport = TRANSPORT.read().unwrap_or_else(PoisonError::into_inner);
    let request = transport
        .config
        .headers
        .iter()
        .flatten()
        .fold(transport.agent.get(url), |req, (name, value)| {
            req.header(name, value)
        });
    request
}

/// Edits the shared settings in place and swaps in a freshly built agent.
///
/// Requests already built keep the agent they were created with.
///
/// ```
/// use std::time::Duration;
/// use titledb_dl::http_client::configure_http_client;
///
/// configure_http_client(|client| client.timeout = Some(Duration::from_secs(30)));
/// ```
pub fn configure_http_client<F>(edit: F)
where
    F: FnOnce(&mut ClientConfig),
{
    let mut transport = TRANSPORT.write().unwrap_or_else(PoisonError::into_inner);
    let mut config = transport.config.clone();
    edit(&mut config);
    *transport = config.into();
}

pub fn current_config() -> ClientConfig {
    TRANSPORT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .config
        .clone()
}
