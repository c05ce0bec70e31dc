use url::Url;

/// Page served when an app-shell request misses the cache and the network is down.
pub const OFFLINE_PAGE_HTML: &str = concat!(
    "<!doctype html><html><head><meta charset=\"utf-8\"><title>Offline</title></head>",
    "<body style=\"font-family:sans-serif;text-align:center;padding-top:20vh\">",
    "<h1>Offline</h1><p>This page has not been saved for offline use yet.</p>",
    "<p><a href=\"index.html\">Back to matches</a></p></body></html>"
);

/// An outgoing request as seen by the offline proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    pub method: String,
    pub url: Url,
}

impl CacheRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// The request URL with query string and fragment removed.
    pub fn url_without_search(&self) -> String {
        strip_search(&self.url)
    }
}

/// Drop query and fragment so `page.html?matchId=1` and `page.html` compare equal.
pub fn strip_search(url: &Url) -> String {
    let mut bare = url.clone();
    bare.set_query(None);
    bare.set_fragment(None);
    bare.to_string()
}

/// A response that can be stored in, and replayed from, the offline cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Empty `503 Offline`, returned instead of ever leaving a fetch unanswered.
    pub fn service_unavailable() -> Self {
        Self::new(503, "Offline", Vec::new())
    }

    /// Minimal HTML page for app-shell requests that cannot be satisfied.
    pub fn offline_page() -> Self {
        Self::new(200, "OK", OFFLINE_PAGE_HTML).with_header("Content-Type", "text/html")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
