use thiserror::Error;
use url::Url;

/// Result of fetching a URL
#[derive(Clone, Debug)]
pub struct FetchResult {
    pub body: String,
    pub url: String,
    pub status: u16,
    pub content_type: String,
}

/// Error during fetch
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Client error: {0}")]
    Client(String),
    #[error("Request failed: {0}")]
    Request(String),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Failed to read body: {0}")]
    Body(String),
}

/// Normalize a sheet or document link into an absolute URL.
pub fn normalize_url(url_str: &str) -> Result<Url, FetchError> {
    let trimmed = url_str.trim();
    let url = if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        format!("https://{}", trimmed)
    } else {
        trimmed.to_string()
    };

    Url::parse(&url).map_err(|e| FetchError::InvalidUrl(e.to_string()))
}

/// Fetch a URL and return its text body (blocking).
///
/// Non-2xx responses are errors: a published sheet that has been
/// unpublished answers with an HTML error page, not CSV.
pub fn fetch_text(url_str: &str) -> Result<FetchResult, FetchError> {
    let parsed = normalize_url(url_str)?;

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("Mozilla/5.0 (compatible; Wisdom-Browser/", env!("CARGO_PKG_VERSION"), ")"))
        .timeout(std::time::Duration::from_secs(15))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))?;

    let response = client
        .get(parsed.as_str())
        .header("Accept", "text/csv,text/html;q=0.9,*/*;q=0.8")
        .send()
        .map_err(|e| FetchError::Request(e.to_string()))?;

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    if !response.status().is_success() {
        return Err(FetchError::Status {
            status,
            url: final_url,
        });
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/plain")
        .to_string();

    let body = response
        .text()
        .map_err(|e| FetchError::Body(e.to_string()))?;

    log::debug!("Fetched {} ({} bytes, {})", final_url, body.len(), content_type);

    Ok(FetchResult {
        body,
        url: final_url,
        status,
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_get_https() {
        let url = normalize_url("docs.google.com/spreadsheets/d/abc/pub?output=csv").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("docs.google.com"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(normalize_url("http://"), Err(FetchError::InvalidUrl(_))));
    }
}
