use std::time::Duration;

use url::Url;

use super::{OptionsError, Result};

/// Port used when an endpoint does not name one.
pub const DEFAULT_PORT: u16 = 6379;

/// Extra attempts made when the initial connect fails.
pub const DEFAULT_CONNECT_RETRY: u32 = 3;

/// Bound on one connect attempt when `connectTimeout` is not given.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    fn parse(item: &str) -> Result<Self> {
        let invalid = || OptionsError::InvalidEndpoint(item.to_string());

        // Bracketed IPv6 literal: [::1]:6379
        if let Some(rest) = item.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p.parse().map_err(|_| invalid())?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(invalid()),
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        let (host, port) = match item.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
            None => (item, DEFAULT_PORT),
        };

        // IPv6 literals must be bracketed
        if host.is_empty() || host.contains(':') {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// Parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub endpoints: Vec<Endpoint>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub ssl: bool,
    pub default_database: u32,
    pub client_name: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub connect_retry: u32,
    /// Option keys that were present but not understood.
    pub ignored: Vec<String>,
    /// The input, when it was given as a URL.
    pub url: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            user: None,
            password: None,
            ssl: false,
            default_database: 0,
            client_name: None,
            connect_timeout: None,
            connect_retry: DEFAULT_CONNECT_RETRY,
            ignored: Vec::new(),
            url: None,
        }
    }
}

impl ConnectionOptions {
    /// Parses a `redis://` URL or a StackExchange-style configuration string.
    ///
    /// # Examples
    ///
    /// ```
    /// use backplane_core::options::ConnectionOptions;
    ///
    /// let options = ConnectionOptions::parse("localhost,defaultDatabase=3").unwrap();
    /// assert_eq!(options.to_redis_url(), "redis://localhost:6379/3");
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(OptionsError::Empty);
        }

        if input.starts_with("redis://") || input.starts_with("rediss://") {
            return Self::parse_url(input);
        }

        let mut options = Self::default();

        for item in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item.split_once('=') {
                Some((key, value)) => options.apply(key.trim(), value.trim())?,
                None => options.endpoints.push(Endpoint::parse(item)?),
            }
        }

        if options.endpoints.is_empty() {
            return Err(OptionsError::NoEndpoint);
        }

        Ok(options)
    }

    fn parse_url(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| OptionsError::InvalidUrl(e.to_string()))?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(OptionsError::NoEndpoint)?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let default_database = match url.path().trim_start_matches('/') {
            "" => 0,
            db => db.parse().map_err(|_| OptionsError::InvalidValue {
                key: "database".to_string(),
                value: db.to_string(),
            })?,
        };

        Ok(Self {
            endpoints: vec![Endpoint {
                host,
                port: url.port().unwrap_or(DEFAULT_PORT),
            }],
            user: Some(url.username())
                .filter(|u| !u.is_empty())
                .map(|u| decode_component("user", u))
                .transpose()?,
            password: url
                .password()
                .map(|p| decode_component("password", p))
                .transpose()?,
            ssl: url.scheme() == "rediss",
            default_database,
            url: Some(input.to_string()),
            ..Self::default()
        })
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || OptionsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key.to_ascii_lowercase().as_str() {
            "password" => self.password = Some(value.to_string()).filter(|v| !v.is_empty()),
            "user" => self.user = Some(value.to_string()).filter(|v| !v.is_empty()),
            "ssl" => self.ssl = parse_bool(value).ok_or_else(invalid)?,
            "defaultdatabase" => self.default_database = value.parse().map_err(|_| invalid())?,
            "name" => self.client_name = Some(value.to_string()).filter(|v| !v.is_empty()),
            "connecttimeout" => {
                let ms: u64 = value.parse().map_err(|_| invalid())?;
                self.connect_timeout = Some(Duration::from_millis(ms));
            }
            "connectretry" => self.connect_retry = value.parse().map_err(|_| invalid())?,
            _ => self.ignored.push(key.to_string()),
        }

        Ok(())
    }

    /// Returns the URL the options were parsed from, or builds a `redis://`
    /// (or `rediss://`) URL for the first endpoint.
    pub fn to_redis_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }

        let scheme = if self.ssl { "rediss" } else { "redis" };

        let Some(endpoint) = self.endpoints.first() else {
            return format!("{scheme}://localhost:{DEFAULT_PORT}/{}", self.default_database);
        };

        let host = if endpoint.host.contains(':') {
            format!("[{}]", endpoint.host)
        } else {
            endpoint.host.clone()
        };

        let base = format!("{scheme}://{host}:{}/{}", endpoint.port, self.default_database);
        let Ok(mut url) = Url::parse(&base) else {
            return base;
        };

        if self.user.is_some() || self.password.is_some() {
            let _ = url.set_username(self.user.as_deref().unwrap_or_default());
            let _ = url.set_password(self.password.as_deref());
        }

        url.to_string()
    }
}

fn decode_component(key: &str, value: &str) -> Result<String> {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| OptionsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
