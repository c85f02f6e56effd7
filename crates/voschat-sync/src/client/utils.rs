//! Utility functions for the chat client.

use crate::error::{Result, SyncError};
use std::time::Duration;
use url::Url;

pub fn exponential_backoff(attempt: u32, base_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2_u64.pow(attempt.min(10)));
    Duration::from_millis(delay_ms)
}

/// Parse an API base URL, normalising it to end in `/` so joins stay below it.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| SyncError::Config(format!("{}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(SyncError::Config(format!("{} cannot be a base URL", raw)));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Append path segments to `base`, percent-encoding each segment.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| SyncError::Config(format!("{} cannot be a base URL", base)))?;
        path.pop_if_empty();
        for segment in segments {
            for part in segment.split('/').filter(|p| !p.is_empty()) {
                path.push(part);
            }
        }
    }
    Ok(url)
}

/// Push a single, possibly user-supplied, value as one encoded segment.
pub fn endpoint_with_id(base: &Url, path: &str, id: &str) -> Result<Url> {
    let mut url = endpoint(base, &[path])?;
    url.path_segments_mut()
        .map_err(|_| SyncError::Config(format!("{} cannot be a base URL", base)))?
        .push(id);
    Ok(url)
}

/// Resolve a file URL the server returned, which may be relative to its origin.
pub fn resolve_file_url(base: &Url, file_url: &str) -> Result<Url> {
    match Url::parse(file_url) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => base
            .join(file_url)
            .map_err(|e| SyncError::Config(format!("{}: {}", file_url, e))),
        Err(e) => Err(SyncError::Config(format!("{}: {}", file_url, e))),
    }
}

/// Derive the realtime URL from an HTTP API base (`http://h/api` -> `ws://h/ws`).
pub fn websocket_url_for(base: &Url) -> Result<Url> {
    let scheme = match base.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(SyncError::Config(format!(
                "base URL must be http or https, got {}",
                other
            )))
        }
    };
    let mut url = base
        .join(&format!("/{}", crate::protocol::paths::WEBSOCKET))
        .map_err(|e| SyncError::Config(e.to_string()))?;
    url.set_scheme(scheme)
        .map_err(|_| SyncError::Config(format!("cannot switch {} to {}", base, scheme)))?;
    Ok(url)
}

/// Shorten a frame for diagnostics.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}
