//! Filename generation and public URL resolution.

use reqwest::Url;
use std::net::IpAddr;
use uuid::Uuid;

const DEV_FALLBACK_BASE: &str = "http://localhost:5000";

/// `{uuid}.{ext}`, or a bare uuid when `original_name` has no extension.
pub fn generate_filename(original_name: &str) -> String {
    let id = Uuid::new_v4();
    match original_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!("{id}.{ext}"),
        _ => id.to_string(),
    }
}

pub fn source_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("file")
        .to_string()
}

#[derive(Debug, Clone, Default)]
pub struct PublicUrls {
    deployment_url: Option<String>,
    base_url: Option<String>,
}

impl PublicUrls {
    pub fn new(deployment_url: Option<String>, base_url: Option<String>) -> Self {
        Self {
            deployment_url,
            base_url,
        }
    }

    pub fn base(&self, forwarded_host: Option<&str>) -> String {
        if let Some(host) = forwarded_host.filter(|h| !h.is_empty()) {
            let scheme = if is_loopback(host) { "http" } else { "https" };
            return format!("{scheme}://{host}");
        }

        if let Some(deployment) = &self.deployment_url {
            return format!("https://{deployment}");
        }

        if let Some(base) = &self.base_url {
            let base = base.trim_end_matches('/');
            return if base.starts_with("http") {
                base.to_string()
            } else {
                format!("https://{base}")
            };
        }

        DEV_FALLBACK_BASE.to_string()
    }

    pub fn file_url(&self, forwarded_host: Option<&str>, filename: &str) -> String {
        format!("{}/files/{filename}", self.base(forwarded_host))
    }
}

fn is_loopback(host: &str) -> bool {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback();
    }

    // Strip the port, keeping bracketed IPv6 literals intact.
    let name = match host.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => host.rsplit_once(':').map_or(host, |(name, _)| name),
    };

    name.eq_ignore_ascii_case("localhost")
        || name.to_ascii_lowercase().ends_with(".localhost")
        || name.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}
