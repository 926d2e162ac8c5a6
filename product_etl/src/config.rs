use std::time::Duration;

use crate::error::{EtlError, Result};

pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com";
pub const DATA_SOURCE: &str = "dummyjson_api";
pub const PIPELINE_VERSION: &str = "1.0";

pub const BUCKET_ENV: &str = "S3_BUCKET_NAME";
const BASE_URL_ENV: &str = "PRODUCTS_API_BASE_URL";
const REQUEST_TIMEOUT_ENV: &str = "REQUEST_TIMEOUT_SECS";
const UPLOAD_TIMEOUT_ENV: &str = "UPLOAD_TIMEOUT_SECS";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    bucket_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            bucket_name: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. The bucket is not
    /// validated here; it is only required once there is something to upload.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            base_url: lookup(BASE_URL_ENV)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.base_url),
            request_timeout: seconds(&lookup, REQUEST_TIMEOUT_ENV)?
                .unwrap_or(defaults.request_timeout),
            upload_timeout: seconds(&lookup, UPLOAD_TIMEOUT_ENV)?
                .unwrap_or(defaults.upload_timeout),
            bucket_name: lookup(BUCKET_ENV),
        })
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket_name = Some(bucket.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn products_endpoint(&self) -> String {
        format!("{}/products", self.base_url.trim_end_matches('/'))
    }

    pub fn bucket_name(&self) -> Result<&str> {
        match self.bucket_name.as_deref() {
            Some(bucket) if !bucket.trim().is_empty() => Ok(bucket),
            _ => Err(EtlError::Config(format!(
                "{BUCKET_ENV} environment variable not set"
            ))),
        }
    }
}

fn seconds<F>(lookup: &F, name: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };

    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(EtlError::Config(format!(
            "{name} must be a positive number of seconds, got {raw:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.products_endpoint(), "https://dummyjson.com/products");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.upload_timeout, Duration::from_secs(60));
    }

    #[test]
    fn missing_bucket_only_fails_when_asked_for() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        let err = config.bucket_name().unwrap_err();

        assert!(matches!(err, EtlError::Config(_)));
        assert_eq!(err.to_string(), "S3_BUCKET_NAME environment variable not set");
    }

    #[test]
    fn empty_bucket_counts_as_unset() {
        let config = Config::from_lookup(lookup(&[(BUCKET_ENV, "")])).unwrap();
        assert!(config.bucket_name().is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            (BUCKET_ENV, "shop-etl-data"),
            (BASE_URL_ENV, "http://localhost:9000/"),
            (REQUEST_TIMEOUT_ENV, "5"),
            (UPLOAD_TIMEOUT_ENV, "120"),
        ]))
        .unwrap();

        assert_eq!(config.bucket_name().unwrap(), "shop-etl-data");
        assert_eq!(config.products_endpoint(), "http://localhost:9000/products");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.upload_timeout, Duration::from_secs(120));
    }

    #[test]
    fn rejects_bad_timeouts() {
        for bad in ["soon", "0", "-3"] {
            let err = Config::from_lookup(lookup(&[(REQUEST_TIMEOUT_ENV, bad)])).unwrap_err();
            assert!(matches!(err, EtlError::Config(_)), "{bad}");
        }
    }
}
