//! Input validation for uploaded files and submitted URLs.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

use tracing::warn;
use url::{Host, Url};

/// Accepted input image extensions.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Maximum accepted URL length.
pub const MAX_URL_LENGTH: usize = 2048;

/// Message returned when a file or URL has the wrong extension.
pub const EXTENSION_HINT: &str = "possible extensions are [jpg, jpeg, png]";

/// Extract the lowercased extension of a file name or URL path, if allowed.
pub fn allowed_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Parse and check a submitted image URL.
///
/// Only http/https are accepted. Unless `allow_private` is set, hosts that
/// resolve to loopback, private or link-local ranges by literal address or
/// well-known name are rejected.
pub fn validate_image_url(raw: &str, allow_private: bool) -> Result<Url, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("URL cannot be empty".to_string());
    }
    if raw.len() > MAX_URL_LENGTH {
        return Err(format!(
            "URL exceeds maximum length of {} characters",
            MAX_URL_LENGTH
        ));
    }

    let parsed = Url::parse(raw).map_err(|e| format!("Invalid URL format: {}", e))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(format!(
                "Invalid protocol '{}'. Only HTTP and HTTPS are allowed.",
                scheme
            ))
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| "URL must have a valid host".to_string())?;

    if !allow_private && is_restricted_host(&host) {
        warn!(url = %raw, "Blocked URL targeting internal address");
        return Err("URL appears to target an internal or restricted endpoint".to_string());
    }

    Ok(parsed)
}

/// Whether a URL's host is loopback, private, link-local or an internal name.
pub fn is_restricted_url(url: &Url) -> bool {
    url.host().map_or(true, |host| is_restricted_host(&host))
}

fn is_restricted_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost"
                || domain.ends_with(".localhost")
                || domain.ends_with(".internal")
                || domain.ends_with(".local")
        }
        Host::Ipv4(ip) => is_restricted_v4(ip),
        Host::Ipv6(ip) => is_restricted_v6(ip),
    }
}

fn is_restricted_v4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
}

fn is_restricted_v6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_restricted_v4(&v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00 // unique local
        || (first & 0xffc0) == 0xfe80 // link local
}
