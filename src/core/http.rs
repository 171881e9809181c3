use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;
use tracing::warn;

use super::config::Config;

const APP_USER_AGENT: &str = "serverpacker/0.1.0";

/// Build the one HTTP client shared by every component. The CurseForge key
/// rides along as a default header so each call site stays plain.
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    match HeaderValue::from_str(&config.curseforge_api_key) {
        Ok(key) => {
            default_headers.insert("x-api-key", key);
        }
        Err(_) => warn!("CurseForge API key contains invalid header bytes, sending without it"),
    }

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .timeout(config.http_timeout)
        .build()
}
