//! Transport shared by every SOAP call to the vendor.

use std::sync::OnceLock;
use std::time::Duration;

use log::warn;
use reqwest::StatusCode;
use reqwest::blocking::Client;

use super::CaError;

/// Seconds to wait for the vendor before a call counts as a transport failure.
pub const TIMEOUT_ENV: &str = "SYMANTEC_HTTP_TIMEOUT_SECS";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Vendor error pages are full HTML documents; only the start is kept.
const MAX_BODY_CHARS: usize = 200;

pub struct HttpClient;

impl HttpClient {
    /// Client reused by every order and query call in the process.
    pub fn shared() -> &'static Client {
        static CLIENT: OnceLock<Client> = OnceLock::new();
        CLIENT.get_or_init(|| {
            let timeout = ca_timeout(std::env::var(TIMEOUT_ENV).ok().as_deref());
            Client::builder()
                .timeout(timeout)
                .user_agent(concat!("symantec-ca-plugin/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|err| {
                    warn!("[symantec-http] failed to build CA client: {err}");
                    Client::new()
                })
        })
    }
}

fn ca_timeout(raw: Option<&str>) -> Duration {
    let Some(raw) = raw else {
        return Duration::from_secs(DEFAULT_TIMEOUT_SECS);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            warn!("[symantec-http] ignoring {TIMEOUT_ENV}={raw:?}; using {DEFAULT_TIMEOUT_SECS}s");
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        }
    }
}

/// Error for a non-2xx reply that carried no SOAP fault.
pub fn status_error(status: StatusCode, body: Option<String>) -> CaError {
    let message = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            "CA rejected the partner credentials".to_string()
        }
        StatusCode::TOO_MANY_REQUESTS => "CA is throttling this partner account".to_string(),
        _ => match body.as_deref().map(str::trim).filter(|body| !body.is_empty()) {
            Some(body) => body.chars().take(MAX_BODY_CHARS).collect(),
            None => format!("CA answered {status} with an empty body"),
        },
    };
    CaError::Http {
        status: status.as_u16(),
        message,
    }
}
