use std::env;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::mapping::{controllers_from_details, local_controller, zones_from_schedule};
use crate::protocol::{
    all_zones_command_params, check_envelope, local_base_url, relay_identifier, schedule_params,
    schedule_path, set_param, set_zone_path, zone_command_params, QueryParams, CLOUD_URL,
    CUSTOMER_DETAILS_PATH, DEFAULT_LOCAL_USER, LOCAL_ONLY_MESSAGE,
};
use crate::types::*;
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved, immutable connection settings.
#[derive(Clone)]
pub struct ConnectionConfig {
    connection_type: ConnectionType,
    base_url: String,
    username: String,
    password: String,
    api_key: String,
}

impl ConnectionConfig {
    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("connection_type", &self.connection_type)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

pub struct HydrawiseBuilder {
    connection_type: ConnectionType,
    host: Option<String>,
    user: Option<String>,
    password: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl fmt::Debug for HydrawiseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydrawiseBuilder")
            .field("connection_type", &self.connection_type)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("log_mode", &self.log_mode)
            .field("log_path", &self.log_path)
            .finish()
    }
}

impl HydrawiseBuilder {
    pub fn new(connection_type: ConnectionType) -> Self {
        Self {
            connection_type,
            host: None,
            user: None,
            password: None,
            api_key: None,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            log_mode: None,
            log_path: None,
        }
    }

    /// Cloud binding if `HYDRAWISE_API_KEY` is set, otherwise a local binding
    /// from `HYDRAWISE_HOST`, `HYDRAWISE_PASSWORD` and optional `HYDRAWISE_USER`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(key) = lookup("HYDRAWISE_API_KEY") {
            return Ok(Self::new(ConnectionType::Cloud).api_key(key));
        }
        let host = lookup("HYDRAWISE_HOST").ok_or_else(|| {
            Error::InvalidConfig("set HYDRAWISE_API_KEY or HYDRAWISE_HOST".to_string())
        })?;
        let mut builder = Self::new(ConnectionType::Local).host(host);
        if let Some(password) = lookup("HYDRAWISE_PASSWORD") {
            builder = builder.password(password);
        }
        if let Some(user) = lookup("HYDRAWISE_USER") {
            builder = builder.user(user);
        }
        Ok(builder)
    }

    /// Hostname or address (optionally with port) of a local controller.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the URL every endpoint path is appended to.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.base_url = Some(url);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Hydrawise> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

        let config = match self.connection_type {
            ConnectionType::Cloud => {
                let api_key = non_empty(self.api_key).ok_or_else(|| {
                    Error::InvalidConfig("cloud binding requires an API key".to_string())
                })?;
                ConnectionConfig {
                    connection_type: ConnectionType::Cloud,
                    base_url: self.base_url.unwrap_or_else(|| CLOUD_URL.to_string()),
                    username: String::new(),
                    password: String::new(),
                    api_key,
                }
            }
            ConnectionType::Local => {
                let host = non_empty(self.host).ok_or_else(|| {
                    Error::InvalidConfig("local binding requires a host".to_string())
                })?;
                let password = non_empty(self.password).ok_or_else(|| {
                    Error::InvalidConfig("local binding requires a password".to_string())
                })?;
                ConnectionConfig {
                    connection_type: ConnectionType::Local,
                    base_url: self.base_url.unwrap_or_else(|| local_base_url(&host)),
                    username: non_empty(self.user)
                        .unwrap_or_else(|| DEFAULT_LOCAL_USER.to_string()),
                    password,
                    api_key: String::new(),
                }
            }
        };

        let http = reqwest::Client::builder().timeout(self.timeout).build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        debug!(mode = %config.connection_type, url = %config.base_url, "built Hydrawise binding");

        Ok(Hydrawise {
            inner: Arc::new(Binding {
                http,
                config,
                logger,
            }),
        })
    }
}

pub(crate) struct Binding {
    http: reqwest::Client,
    config: ConnectionConfig,
    logger: Option<Mutex<MessageLogger>>,
}

/// A cloud or local Hydrawise API binding.
///
/// Cheap to clone; clones share one HTTP client. Zones and controllers
/// returned by this binding keep a weak handle to it for their convenience
/// methods.
#[derive(Clone)]
pub struct Hydrawise {
    inner: Arc<Binding>,
}

impl fmt::Debug for Hydrawise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hydrawise")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Hydrawise {
    pub fn builder(connection_type: ConnectionType) -> HydrawiseBuilder {
        HydrawiseBuilder::new(connection_type)
    }

    pub fn cloud(api_key: impl Into<String>) -> HydrawiseBuilder {
        HydrawiseBuilder::new(ConnectionType::Cloud).api_key(api_key)
    }

    pub fn local(host: impl Into<String>, password: impl Into<String>) -> HydrawiseBuilder {
        HydrawiseBuilder::new(ConnectionType::Local)
            .host(host)
            .password(password)
    }

    pub(crate) fn from_weak(binding: &Weak<Binding>) -> Option<Self> {
        binding.upgrade().map(|inner| Hydrawise { inner })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.inner.config.connection_type
    }

    pub fn base_url(&self) -> &str {
        &self.inner.config.base_url
    }

    fn handle(&self) -> Weak<Binding> {
        Arc::downgrade(&self.inner)
    }

    fn with_logger(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(ref logger) = self.inner.logger {
            let mut guard = logger.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard);
        }
    }

    async fn request(&self, path: &str, params: QueryParams) -> Result<Value> {
        let config = &self.inner.config;
        let url = format!("{}{}", config.base_url, path);
        debug!(url = %url, mode = %config.connection_type, "GET");
        self.with_logger(|logger| logger.log_request(path, &params));

        let request = self.inner.http.get(&url).query(&params);
        let request = match config.connection_type {
            ConnectionType::Local => {
                request.basic_auth(&config.username, Some(&config.password))
            }
            ConnectionType::Cloud => request.query(&[("api_key", config.api_key.as_str())]),
        };

        let body: Value = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        trace!(path, body = %body, "response");
        self.with_logger(|logger| logger.log_response(path, &body));

        if let Err(e) = check_envelope(&body) {
            warn!(path, message = %e.message, "controller rejected request");
            return Err(e.into());
        }
        Ok(body)
    }

    // -- Commands --

    /// Send `run`, `suspend` or `stop` to one zone. `duration` applies to
    /// run and suspend.
    pub async fn command_zone<'a>(
        &self,
        action: ZoneAction,
        target: impl Into<ZoneRef<'a>>,
        duration: Option<Duration>,
    ) -> Result<Value> {
        let target = target.into();
        let kind = self.connection_type();
        let params = zone_command_params(kind, action, target, duration);
        let relay = relay_identifier(kind, target);
        debug!(action = action.as_api_str(), relay, "zone command");
        self.with_logger(|logger| logger.log_command(action.as_api_str(), Some(relay)));
        self.set_zone(params, None).await
    }

    /// Send `runall`, `suspendall` or `stopall`, optionally scoped to one
    /// cloud controller.
    pub async fn command_all_zones(
        &self,
        action: AllZonesAction,
        controller: Option<ControllerRef<'_>>,
        duration: Option<Duration>,
    ) -> Result<Value> {
        let controller_id = controller.and_then(|c| c.id());
        let params =
            all_zones_command_params(self.connection_type(), action, controller_id, duration);
        debug!(action = action.as_api_str(), ?controller_id, "all-zones command");
        self.with_logger(|logger| logger.log_command(action.as_api_str(), None));
        self.set_zone(params, None).await
    }

    pub async fn run_zone<'a>(
        &self,
        target: impl Into<ZoneRef<'a>>,
        duration: Option<Duration>,
    ) -> Result<Value> {
        self.command_zone(ZoneAction::Run, target, duration).await
    }

    pub async fn suspend_zone<'a>(
        &self,
        target: impl Into<ZoneRef<'a>>,
        duration: Option<Duration>,
    ) -> Result<Value> {
        self.command_zone(ZoneAction::Suspend, target, duration).await
    }

    pub async fn stop_zone<'a>(&self, target: impl Into<ZoneRef<'a>>) -> Result<Value> {
        self.command_zone(ZoneAction::Stop, target, None).await
    }

    pub async fn run_all_zones(
        &self,
        controller: Option<ControllerRef<'_>>,
        duration: Option<Duration>,
    ) -> Result<Value> {
        self.command_all_zones(AllZonesAction::RunAll, controller, duration)
            .await
    }

    pub async fn suspend_all_zones(
        &self,
        controller: Option<ControllerRef<'_>>,
        duration: Option<Duration>,
    ) -> Result<Value> {
        self.command_all_zones(AllZonesAction::SuspendAll, controller, duration)
            .await
    }

    pub async fn stop_all_zones(&self, controller: Option<ControllerRef<'_>>) -> Result<Value> {
        self.command_all_zones(AllZonesAction::StopAll, controller, None)
            .await
    }

    // -- Reads --

    /// Zones known to the controller. Passing a controller record links it
    /// to every returned zone.
    pub async fn get_zones(&self, controller: Option<ControllerRef<'_>>) -> Result<Vec<Zone>> {
        let query = match controller.and_then(|c| c.id()) {
            Some(id) => ScheduleQuery::Controller(id),
            None => ScheduleQuery::All,
        };
        let data = self.get_status_and_schedule(&query).await?;
        let record = match controller {
            Some(ControllerRef::Controller(c)) => Some(c),
            _ => None,
        };
        zones_from_schedule(&data, self.connection_type(), record, &self.handle())
    }

    /// Cloud controllers on the account, or a single stand-in controller for
    /// a local binding (no request is made in that case).
    pub async fn get_controllers(&self) -> Result<Vec<Controller>> {
        match self.connection_type() {
            ConnectionType::Local => Ok(vec![local_controller(self.base_url(), &self.handle())]),
            ConnectionType::Cloud => {
                let data = self.get_customer_details("controllers").await?;
                controllers_from_details(&data, &self.handle())
            }
        }
    }

    // -- Raw API calls --

    /// Cloud only.
    pub async fn get_customer_details(&self, kind: &str) -> Result<Value> {
        if self.connection_type() == ConnectionType::Local {
            return Err(Error::command(LOCAL_ONLY_MESSAGE));
        }
        let mut params = QueryParams::new();
        set_param(&mut params, "type", kind);
        self.request(CUSTOMER_DETAILS_PATH, params).await
    }

    pub async fn get_status_and_schedule(&self, query: &ScheduleQuery) -> Result<Value> {
        let path = schedule_path(self.connection_type());
        self.request(path, schedule_params(query)).await
    }

    /// Send a prepared command to `setzone` (cloud) or `set_manual_data`
    /// (local). `controller` is merged in as `controller_id`.
    pub async fn set_zone(&self, mut params: QueryParams, controller: Option<u64>) -> Result<Value> {
        if let Some(id) = controller {
            set_param(&mut params, "controller_id", id);
        }
        let path = set_zone_path(self.connection_type());
        self.request(path, params).await
    }
}
