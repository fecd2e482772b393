use rand::Rng;
use std::env;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BUCKET: &str = "storage";
const DEFAULT_TABLE: &str = "Profile";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const SESSION_KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("SESSION_KEY must be at least 32 bytes")]
    ShortSessionKey,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub supabase: SupabaseConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub session_key: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub bucket: String,
    pub profile_table: String,
    pub public_storage_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source. `SUPABASE_URL` and
    /// `SUPABASE_ANON_KEY` are required; everything else has a default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let url = required("SUPABASE_URL")?.trim_end_matches('/').to_owned();
        let anon_key = required("SUPABASE_ANON_KEY")?;
        let bucket = var("STORAGE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_owned());
        let public_storage_url = var("PUBLIC_STORAGE_URL")
            .map(|u| u.trim_end_matches('/').to_owned())
            .unwrap_or_else(|| format!("{}/storage/v1/object/public/{}", url, bucket));

        let session_key = match var("SESSION_KEY") {
            Some(key) if key.len() < SESSION_KEY_LEN => return Err(ConfigError::ShortSessionKey),
            Some(key) => key.into_bytes(),
            None => {
                let mut key = vec![0u8; SESSION_KEY_LEN];
                rand::thread_rng().fill(&mut key[..]);
                key
            }
        };

        Ok(Self {
            server: ServerConfig {
                host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_owned()),
                port: parse(&var, "PORT", 8000)?,
                session_key,
            },
            supabase: SupabaseConfig {
                url,
                anon_key,
                bucket,
                profile_table: var("PROFILE_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_owned()),
                public_storage_url,
                timeout: Duration::from_secs(parse(&var, "HTTP_TIMEOUT_SECS", 30)?),
            },
            upload: UploadConfig {
                max_bytes: parse(&var, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            },
        })
    }
}

fn parse<T: std::str::FromStr>(
    var: &impl Fn(&'static str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("SUPABASE_URL", "https://demo.supabase.co/"),
        ("SUPABASE_ANON_KEY", "anon"),
    ];

    #[test]
    fn missing_endpoint_is_fatal() {
        let err = Config::from_lookup(lookup(&[("SUPABASE_ANON_KEY", "anon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SUPABASE_URL")));
    }

    #[test]
    fn missing_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[("SUPABASE_URL", "https://x.co")])).unwrap_err();
        assert_eq!(err.to_string(), "SUPABASE_ANON_KEY must be set");
    }

    #[test]
    fn defaults_fill_the_rest() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.supabase.url, "https://demo.supabase.co");
        assert_eq!(config.supabase.bucket, "storage");
        assert_eq!(config.supabase.profile_table, "Profile");
        assert_eq!(
            config.supabase.public_storage_url,
            "https://demo.supabase.co/storage/v1/object/public/storage"
        );
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.session_key.len(), SESSION_KEY_LEN);
        assert_eq!(config.upload.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn bad_port_is_reported_by_name() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(err.to_string(), r#"PORT has an invalid value "eighty""#);
    }

    #[test]
    fn short_session_key_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SESSION_KEY", "short"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::ShortSessionKey)
        ));
    }
}
