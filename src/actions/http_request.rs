//! Action that performs an HTTP request when it runs.
//!
//! The engine is synchronous, so requests go through reqwest's blocking
//! client. Timeouts are enforced per request and surface as ordinary
//! [`ActionExecutionError`]s. An object passed as execution args (an event
//! payload) overrides the configured options for that one request.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::redirect::Policy;
use reqwest::{Method, Proxy, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{Action, ActionMeta, parse_options};
use crate::error::{ActionExecutionError, ConfigurationError};
use crate::runtime::Process;

const KIND: &str = "http_request";

const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Keys of [`HttpRequestConfig`], the ones an execution payload may override.
const OPTION_KEYS: [&str; 19] = [
    "url",
    "method",
    "headers",
    "query",
    "json",
    "body",
    "form_params",
    "auth",
    "timeout_secs",
    "connect_timeout_secs",
    "user_agent",
    "referer",
    "allow_redirects",
    "max_redirects",
    "verify",
    "proxy",
    "dry_run",
    "http_errors",
    "response_variable",
];

/// Keys that each carry a request body; setting one clears the others.
const BODY_KEYS: [&str; 3] = ["json", "body", "form_params"];

/// Process-wide defaults applied to every HTTP action, loaded from the
/// `[http]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpDefaults {
    /// Whole-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Simulate every request instead of sending it.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("flowstate/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
            dry_run: false,
        }
    }
}

/// Request authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HttpAuth {
    Basic {
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    Bearer {
        token: String,
    },
}

/// Options accepted by [`HttpRequestAction::configure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequestConfig {
    pub url: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,

    /// JSON request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,

    /// Raw request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// URL-encoded form body. Only one of `json`, `body` and `form_params` may be set.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub form_params: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<HttpAuth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,

    /// Follow redirects (default true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_redirects: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_redirects: Option<usize>,

    /// Verify TLS certificates (default true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<bool>,

    /// Proxy URL used for every scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,

    /// Treat 4xx/5xx responses as failures.
    #[serde(default)]
    pub http_errors: bool,

    /// Process variable that receives `{status, body}` of the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_variable: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// A validated configuration and the client built for it.
#[derive(Debug)]
struct PreparedRequest {
    config: HttpRequestConfig,
    method: Method,
    headers: HeaderMap,
    // None in dry-run mode.
    client: Option<Client>,
}

#[derive(Debug)]
pub struct HttpRequestAction {
    meta: ActionMeta,
    defaults: HttpDefaults,
    prepared: Option<PreparedRequest>,
}

impl Default for HttpRequestAction {
    fn default() -> Self {
        Self::new(HttpDefaults::default())
    }
}

impl HttpRequestAction {
    /// An unconfigured action; call [`Action::configure`] before running it.
    pub fn new(defaults: HttpDefaults) -> Self {
        Self {
            meta: ActionMeta::default(),
            defaults,
            prepared: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.meta.id = id.into();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.prepared
            .as_ref()
            .and_then(|p| p.config.dry_run)
            .unwrap_or(self.defaults.dry_run)
    }

    fn prepare(&self, config: HttpRequestConfig) -> Result<PreparedRequest, ConfigurationError> {
        Url::parse(&config.url)
            .map_err(|e| ConfigurationError::new(KIND, format!("invalid url '{}': {e}", config.url)))?;
        let method = Method::from_bytes(config.method.to_uppercase().as_bytes())
            .map_err(|_| ConfigurationError::new(KIND, format!("invalid method '{}'", config.method)))?;

        let bodies = [
            config.json.is_some(),
            config.body.is_some(),
            !config.form_params.is_empty(),
        ];
        if bodies.iter().filter(|set| **set).count() > 1 {
            return Err(ConfigurationError::new(
                KIND,
                "`json`, `body` and `form_params` are mutually exclusive",
            ));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigurationError::new(KIND, format!("invalid header name '{name}'")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ConfigurationError::new(KIND, format!("invalid value for header '{}'", name.as_str())))?;
            headers.insert(name, value);
        }
        if let Some(referer) = &config.referer {
            let value = HeaderValue::from_str(referer)
                .map_err(|_| ConfigurationError::new(KIND, format!("invalid referer '{referer}'")))?;
            headers.insert(REFERER, value);
        }

        let dry_run = config.dry_run.unwrap_or(self.defaults.dry_run);
        let client = if dry_run {
            None
        } else {
            Some(self.build_client(&config)?)
        };
        Ok(PreparedRequest {
            config,
            method,
            headers,
            client,
        })
    }

    fn build_client(&self, config: &HttpRequestConfig) -> Result<Client, ConfigurationError> {
        let timeout = config.timeout_secs.unwrap_or(self.defaults.timeout_secs);
        let connect_timeout = config
            .connect_timeout_secs
            .unwrap_or(self.defaults.connect_timeout_secs);
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| self.defaults.user_agent.clone());
        let redirects = if config.allow_redirects.unwrap_or(true) {
            Policy::limited(config.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS))
        } else {
            Policy::none()
        };

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .connect_timeout(Duration::from_secs(connect_timeout))
            .user_agent(user_agent)
            .redirect(redirects)
            .danger_accept_invalid_certs(!config.verify.unwrap_or(true));
        if let Some(proxy) = &config.proxy {
            let proxy = Proxy::all(proxy.as_str())
                .map_err(|e| ConfigurationError::new(KIND, format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| ConfigurationError::new(KIND, format!("cannot build HTTP client: {e}")))
    }

    /// Configuration for this run with the option keys of `args` laid over
    /// the stored one, or `None` when `args` overrides nothing.
    fn with_overrides(
        &self,
        stored: &PreparedRequest,
        args: &Value,
    ) -> Result<Option<PreparedRequest>, ActionExecutionError> {
        let Some(args) = args.as_object() else {
            return Ok(None);
        };
        let overrides: Map<String, Value> = args
            .iter()
            .filter(|(key, _)| OPTION_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if overrides.is_empty() {
            return Ok(None);
        }

        let mut merged = match serde_json::to_value(&stored.config) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if overrides.keys().any(|key| BODY_KEYS.contains(&key.as_str())) {
            for key in BODY_KEYS {
                merged.remove(key);
            }
        }
        merged.extend(overrides);

        debug!(action = %self.id(), "applying runtime options");
        parse_options(KIND, &Value::Object(merged))
            .and_then(|config| self.prepare(config))
            .map(Some)
            .map_err(|e| ActionExecutionError::new(KIND, self.id(), format!("invalid runtime options: {}", e.message)))
    }

    fn send(&self, client: &Client, request: &PreparedRequest) -> Result<(u16, Value), ActionExecutionError> {
        let config = &request.config;
        let builder = client
            .request(request.method.clone(), &config.url)
            .headers(request.headers.clone());
        let builder = with_body(with_auth(builder, config.auth.as_ref()), config);

        debug!(method = %request.method, url = %config.url, "sending request");
        let response = builder.send().map_err(|e| {
            warn!(method = %request.method, url = %config.url, error = %e, "request failed");
            let reason = if e.is_timeout() {
                format!("{} {} timed out", request.method, config.url)
            } else {
                format!("{} {} failed: {e}", request.method, config.url)
            };
            ActionExecutionError::new(KIND, self.id(), reason)
        })?;

        let status = response.status().as_u16();
        let text = response.text().map_err(|e| {
            ActionExecutionError::new(KIND, self.id(), format!("cannot read response body: {e}"))
        })?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok((status, body))
    }
}

fn with_auth(builder: RequestBuilder, auth: Option<&HttpAuth>) -> RequestBuilder {
    match auth {
        Some(HttpAuth::Basic { username, password }) => builder.basic_auth(username, password.as_ref()),
        Some(HttpAuth::Bearer { token }) => builder.bearer_auth(token),
        None => builder,
    }
}

fn with_body(mut builder: RequestBuilder, config: &HttpRequestConfig) -> RequestBuilder {
    if !config.query.is_empty() {
        builder = builder.query(&config.query);
    }
    if let Some(json) = &config.json {
        builder.json(json)
    } else if let Some(body) = &config.body {
        builder.body(body.clone())
    } else if !config.form_params.is_empty() {
        builder.form(&config.form_params)
    } else {
        builder
    }
}

impl Action for HttpRequestAction {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn configure(&mut self, options: &Value) -> Result<(), ConfigurationError> {
        let config: HttpRequestConfig = parse_options(KIND, options)?;
        self.prepared = Some(self.prepare(config)?);
        Ok(())
    }

    fn execute(&self, process: &mut Process, args: &Value) -> Result<(), ActionExecutionError> {
        self.record_attempt(process);
        let stored = self
            .prepared
            .as_ref()
            .ok_or_else(|| ActionExecutionError::new(KIND, self.id(), "action was never configured"))?;
        let overridden = self.with_overrides(stored, args)?;
        let request = overridden.as_ref().unwrap_or(stored);
        let config = &request.config;

        let (status, body) = match &request.client {
            Some(client) => self.send(client, request)?,
            None => {
                debug!(method = %request.method, url = %config.url, "dry run, request not sent");
                (200, json!({ "status": "dry_run_simulation" }))
            }
        };

        if let Some(variable) = &config.response_variable {
            process.set_variable_value(variable.as_str(), json!({ "status": status, "body": body }));
        }

        let success = (200..300).contains(&status);
        if config.http_errors && !success {
            return Err(ActionExecutionError::new(
                KIND,
                self.id(),
                format!("{} {} returned status {status}", request.method, config.url),
            ));
        }
        Ok(())
    }

    fn options(&self) -> Value {
        match &self.prepared {
            Some(prepared) => serde_json::to_value(&prepared.config).unwrap_or_default(),
            None => Value::Object(Map::new()),
        }
    }
}
