use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use rally_core::config::RallyConfig;
use rally_core::error::RallyError;
use rally_core::models::http::{CacheRequest, CachedResponse};

use crate::fetcher::Fetcher;
use crate::storage::CacheStorage;

/// How a request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Not handled; the caller goes to the network itself.
    PassThrough,
    /// Third-party resources: network, then cache, then `503`.
    NetworkFirst,
    /// App shell: cache with background refresh, then network, then offline page.
    CacheFirst,
}

impl std::fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchPolicy::PassThrough => write!(f, "pass_through"),
            FetchPolicy::NetworkFirst => write!(f, "network_first"),
            FetchPolicy::CacheFirst => write!(f, "cache_first"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Synthesized because neither network nor cache could answer.
    Fallback,
}

impl std::fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseSource::Network => write!(f, "network"),
            ResponseSource::Cache => write!(f, "cache"),
            ResponseSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    PassThrough,
    Respond {
        response: CachedResponse,
        source: ResponseSource,
    },
}

/// Lifecycle of one proxy version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this version never serves.
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Activated => write!(f, "activated"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    /// Stale partitions removed, in creation order.
    pub deleted: Vec<String>,
    pub clients_claimed: bool,
}

/// Everything the proxy needs from configuration.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub origin: Url,
    pub data_api_host: String,
    pub version: String,
    pub manifest: Vec<String>,
    pub timeout: Duration,
}

impl ProxySettings {
    pub fn from_config(config: &RallyConfig) -> Self {
        Self {
            origin: config.app_origin.clone(),
            data_api_host: config.data_api_host.to_ascii_lowercase(),
            version: config.cache_version.clone(),
            manifest: config.app_shell.clone(),
            timeout: config.request_timeout(),
        }
    }
}

async fn bounded_fetch(
    fetcher: &dyn Fetcher,
    request: &CacheRequest,
    timeout: Duration,
) -> Result<CachedResponse, RallyError> {
    match tokio::time::timeout(timeout, fetcher.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(RallyError::Timeout {
            operation: format!("fetch {}", request.url),
            secs: timeout.as_secs(),
        }),
    }
}

/// Versioned offline cache in front of the network.
pub struct OfflineCacheProxy {
    settings: ProxySettings,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<WorkerState>,
    clients_claimed: AtomicBool,
}

impl OfflineCacheProxy {
    pub fn new(settings: ProxySettings, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            settings,
            storage,
            fetcher,
            state: Mutex::new(WorkerState::Parsed),
            clients_claimed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, state: WorkerState) {
        debug!(version = %self.settings.version, %state, "worker state");
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    fn is_data_api_host(&self, host: &str) -> bool {
        let api = self.settings.data_api_host.as_str();
        !api.is_empty() && (host == api || host.ends_with(&format!(".{api}")))
    }

    pub fn classify(&self, request: &CacheRequest) -> FetchPolicy {
        if !request.is_get() {
            return FetchPolicy::PassThrough;
        }
        let host = request.url.host_str().unwrap_or_default().to_ascii_lowercase();
        if self.is_data_api_host(&host) {
            return FetchPolicy::PassThrough;
        }
        if Some(host.as_str()) != self.settings.origin.host_str() {
            return FetchPolicy::NetworkFirst;
        }
        FetchPolicy::CacheFirst
    }

    /// Answer a request. Only `PassThrough` leaves the request unanswered.
    pub async fn handle_fetch(&self, request: &CacheRequest) -> FetchOutcome {
        match self.classify(request) {
            FetchPolicy::PassThrough => FetchOutcome::PassThrough,
            FetchPolicy::NetworkFirst => self.network_first(request).await,
            FetchPolicy::CacheFirst => self.cache_first(request).await,
        }
    }

    async fn network_first(&self, request: &CacheRequest) -> FetchOutcome {
        match bounded_fetch(self.fetcher.as_ref(), request, self.settings.timeout).await {
            Ok(response) => {
                self.store_copy(&request.url, &response);
                respond(response, ResponseSource::Network)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "network failed, trying cache");
                match self.lookup(&request.url) {
                    Some(hit) => respond(hit, ResponseSource::Cache),
                    None => respond(CachedResponse::service_unavailable(), ResponseSource::Fallback),
                }
            }
        }
    }

    async fn cache_first(&self, request: &CacheRequest) -> FetchOutcome {
        if let Some(hit) = self.lookup(&request.url) {
            self.spawn_revalidation(request.clone());
            return respond(hit, ResponseSource::Cache);
        }
        match bounded_fetch(self.fetcher.as_ref(), request, self.settings.timeout).await {
            Ok(response) => {
                self.store_copy(&request.url, &response);
                respond(response, ResponseSource::Network)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "app shell miss while offline");
                respond(CachedResponse::offline_page(), ResponseSource::Fallback)
            }
        }
    }

    /// Refresh a cached entry in the background. The returned response never waits on it.
    fn spawn_revalidation(&self, request: CacheRequest) {
        let fetcher = self.fetcher.clone();
        let storage = self.storage.clone();
        let partition = self.settings.version.clone();
        let timeout = self.settings.timeout;
        tokio::spawn(async move {
            match bounded_fetch(fetcher.as_ref(), &request, timeout).await {
                Ok(fresh) => {
                    if let Err(e) = storage.put(&partition, &request.url, &fresh) {
                        debug!(url = %request.url, error = %e, "revalidation store failed");
                    }
                }
                Err(e) => debug!(url = %request.url, error = %e, "revalidation fetch failed"),
            }
        });
    }

    fn lookup(&self, url: &Url) -> Option<CachedResponse> {
        match self.storage.lookup(url, true) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(%url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    fn store_copy(&self, url: &Url, response: &CachedResponse) {
        if let Err(e) = self.storage.put(&self.settings.version, url, response) {
            warn!(%url, error = %e, "failed to cache response");
        }
    }

    fn manifest_urls(&self) -> Result<Vec<(String, Url)>, RallyError> {
        self.settings
            .manifest
            .iter()
            .map(|path| {
                self.settings
                    .origin
                    .join(path)
                    .map(|url| (path.clone(), url))
                    .map_err(|e| RallyError::InvalidUrl {
                        url: path.clone(),
                        message: e.to_string(),
                    })
            })
            .collect()
    }

    /// Pre-cache the app shell. Nothing is stored unless every path succeeds.
    ///
    /// Returns the number of cached entries.
    pub async fn install(&self) -> Result<usize, RallyError> {
        self.set_state(WorkerState::Installing);
        match self.install_inner().await {
            Ok(count) => {
                self.set_state(WorkerState::Installed);
                info!(version = %self.settings.version, count, "app shell cached, skipping wait");
                Ok(count)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                warn!(version = %self.settings.version, error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn install_inner(&self) -> Result<usize, RallyError> {
        self.storage.open_partition(&self.settings.version)?;

        let mut entries = Vec::with_capacity(self.settings.manifest.len());
        for (path, url) in self.manifest_urls()? {
            let request = CacheRequest::get(url.clone());
            let response = bounded_fetch(self.fetcher.as_ref(), &request, self.settings.timeout)
                .await
                .map_err(|e| RallyError::InstallFailed {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            if !response.is_success() {
                return Err(RallyError::InstallFailed {
                    path,
                    message: format!("HTTP {} {}", response.status, response.status_text),
                });
            }
            entries.push((url, response));
        }

        self.storage.put_all(&self.settings.version, &entries)?;
        Ok(entries.len())
    }

    /// Drop every partition but the current version, then take control of clients.
    pub fn activate(&self) -> Result<ActivationReport, RallyError> {
        if self.state() == WorkerState::Redundant {
            return Err(RallyError::Other(format!(
                "cache version {} failed to install and cannot activate",
                self.settings.version
            )));
        }
        self.set_state(WorkerState::Activating);

        let mut deleted = Vec::new();
        for name in self.storage.partitions()? {
            if name != self.settings.version && self.storage.delete_partition(&name)? {
                info!(partition = %name, "deleted stale cache partition");
                deleted.push(name);
            }
        }

        self.clients_claimed.store(true, Ordering::SeqCst);
        self.set_state(WorkerState::Activated);
        Ok(ActivationReport {
            deleted,
            clients_claimed: true,
        })
    }
}

fn respond(response: CachedResponse, source: ResponseSource) -> FetchOutcome {
    FetchOutcome::Respond { response, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCacheStorage;
    use async_trait::async_trait;
    use rally_core::config::APP_SHELL_FILES;
    use std::collections::HashMap;

    /// Serves canned bodies by URL; unknown URLs get a 404.
    #[derive(Default)]
    struct ScriptedFetcher {
        bodies: Mutex<HashMap<String, String>>,
        offline: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn serve(&self, url: &str, body: &str) {
            self.bodies
                .lock()
                .unwrap()
                .insert(url.to_string(), body.to_string());
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, RallyError> {
            self.calls.lock().unwrap().push(request.url.to_string());
            if self.offline.load(Ordering::SeqCst) {
                return Err(RallyError::Network {
                    message: "offline".into(),
                });
            }
            Ok(match self.bodies.lock().unwrap().get(request.url.as_str()) {
                Some(body) => CachedResponse::new(200, "OK", body.clone()),
                None => CachedResponse::new(404, "Not Found", Vec::new()),
            })
        }
    }

    fn settings() -> ProxySettings {
        ProxySettings::from_config(&RallyConfig {
            app_origin: Url::parse("https://tracker.test/app/").unwrap(),
            ..RallyConfig::default()
        })
    }

    fn proxy() -> (OfflineCacheProxy, Arc<MemoryCacheStorage>, Arc<ScriptedFetcher>) {
        let storage = Arc::new(MemoryCacheStorage::new());
        let fetcher = Arc::new(ScriptedFetcher::default());
        let proxy = OfflineCacheProxy::new(settings(), storage.clone(), fetcher.clone());
        (proxy, storage, fetcher)
    }

    fn get(url: &str) -> CacheRequest {
        CacheRequest::get(Url::parse(url).unwrap())
    }

    fn unwrap_response(outcome: FetchOutcome) -> (CachedResponse, ResponseSource) {
        match outcome {
            FetchOutcome::Respond { response, source } => (response, source),
            FetchOutcome::PassThrough => panic!("expected a response"),
        }
    }

    fn serve_shell(fetcher: &ScriptedFetcher) {
        let origin = Url::parse("https://tracker.test/app/").unwrap();
        for path in APP_SHELL_FILES {
            fetcher.serve(origin.join(path).unwrap().as_str(), &format!("body of {path}"));
        }
    }

    #[test]
    fn test_classify() {
        let (proxy, _, _) = proxy();
        let post = CacheRequest::new("POST", Url::parse("https://tracker.test/app/x").unwrap());
        assert_eq!(proxy.classify(&post), FetchPolicy::PassThrough);
        assert_eq!(
            proxy.classify(&get("https://abcd.supabase.co/rest/v1/matches")),
            FetchPolicy::PassThrough
        );
        assert_eq!(
            proxy.classify(&get("https://notsupabase.com/lib.js")),
            FetchPolicy::NetworkFirst
        );
        assert_eq!(
            proxy.classify(&get("https://cdn.jsdelivr.net/npm/@supabase/supabase-js@2")),
            FetchPolicy::NetworkFirst
        );
        assert_eq!(
            proxy.classify(&get("https://tracker.test/app/index.html")),
            FetchPolicy::CacheFirst
        );
        // Hostname decides, not port or scheme.
        assert_eq!(
            proxy.classify(&get("http://tracker.test:9000/other.html")),
            FetchPolicy::CacheFirst
        );
    }

    #[tokio::test]
    async fn test_pass_through_never_fetches() {
        let (proxy, _, fetcher) = proxy();
        let outcome = proxy
            .handle_fetch(&get("https://abcd.supabase.co/rest/v1/matches"))
            .await;
        assert_eq!(outcome, FetchOutcome::PassThrough);
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_install_then_offline_cache_hit() {
        let (proxy, storage, fetcher) = proxy();
        serve_shell(&fetcher);
        assert_eq!(proxy.install().await.unwrap(), APP_SHELL_FILES.len());
        assert_eq!(proxy.state(), WorkerState::Installed);

        fetcher.set_offline(true);
        let (response, source) = unwrap_response(
            proxy
                .handle_fetch(&get("https://tracker.test/app/volleyball-tracker.html?matchId=abc"))
                .await,
        );
        assert_eq!(source, ResponseSource::Cache);
        assert_eq!(response.body_text(), "body of ./volleyball-tracker.html");
        assert_eq!(storage.entry_count("vb-tracker-v8").unwrap(), APP_SHELL_FILES.len() as u32);
    }

    #[tokio::test]
    async fn test_cache_hit_revalidates_in_background() {
        let (proxy, storage, fetcher) = proxy();
        serve_shell(&fetcher);
        proxy.install().await.unwrap();

        let url = "https://tracker.test/app/index.html";
        fetcher.serve(url, "fresh index");
        let (response, source) = unwrap_response(proxy.handle_fetch(&get(url)).await);
        assert_eq!(source, ResponseSource::Cache);
        assert_eq!(response.body_text(), "body of ./index.html");

        let target = Url::parse(url).unwrap();
        let mut refreshed = false;
        for _ in 0..50 {
            let hit = storage.lookup(&target, false).unwrap().unwrap();
            if hit.body_text() == "fresh index" {
                refreshed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(refreshed);
    }

    #[tokio::test]
    async fn test_app_shell_miss_fetches_then_falls_back() {
        let (proxy, storage, fetcher) = proxy();
        let url = "https://tracker.test/app/analyze-stats.html";
        fetcher.serve(url, "stats");

        let (response, source) = unwrap_response(proxy.handle_fetch(&get(url)).await);
        assert_eq!(source, ResponseSource::Network);
        assert_eq!(response.body_text(), "stats");
        assert!(storage.lookup(&Url::parse(url).unwrap(), false).unwrap().is_some());

        fetcher.set_offline(true);
        let (response, source) = unwrap_response(
            proxy
                .handle_fetch(&get("https://tracker.test/app/never-seen.html"))
                .await,
        );
        assert_eq!(source, ResponseSource::Fallback);
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("text/html"));
    }

    #[tokio::test]
    async fn test_third_party_network_first() {
        let (proxy, _, fetcher) = proxy();
        let cdn = "https://cdn.jsdelivr.net/npm/@supabase/supabase-js@2";
        fetcher.serve(cdn, "sdk");

        let (response, source) = unwrap_response(proxy.handle_fetch(&get(cdn)).await);
        assert_eq!(source, ResponseSource::Network);
        assert_eq!(response.body_text(), "sdk");

        fetcher.set_offline(true);
        let (response, source) = unwrap_response(
            proxy.handle_fetch(&get(&format!("{cdn}?v=2"))).await,
        );
        assert_eq!(source, ResponseSource::Cache);
        assert_eq!(response.body_text(), "sdk");

        let (response, source) = unwrap_response(
            proxy
                .handle_fetch(&get("https://fonts.example.com/font.css"))
                .await,
        );
        assert_eq!(source, ResponseSource::Fallback);
        assert_eq!(response.status, 503);
        assert_eq!(response.status_text, "Offline");
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let (proxy, storage, fetcher) = proxy();
        serve_shell(&fetcher);
        fetcher
            .bodies
            .lock()
            .unwrap()
            .remove("https://tracker.test/app/manifest.json");

        let err = proxy.install().await.unwrap_err();
        assert!(matches!(err, RallyError::InstallFailed { ref path, .. } if path == "./manifest.json"));
        assert_eq!(proxy.state(), WorkerState::Redundant);
        assert_eq!(storage.entry_count("vb-tracker-v8").unwrap(), 0);
        assert!(proxy.activate().is_err());
    }

    #[tokio::test]
    async fn test_install_fails_when_offline() {
        let (proxy, storage, fetcher) = proxy();
        fetcher.set_offline(true);
        assert!(proxy.install().await.is_err());
        assert_eq!(storage.entry_count("vb-tracker-v8").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_activate_purges_stale_partitions() {
        let (proxy, storage, fetcher) = proxy();
        let stale = Url::parse("https://tracker.test/app/index.html").unwrap();
        storage
            .put("vb-tracker-v6", &stale, &CachedResponse::new(200, "OK", "v6"))
            .unwrap();
        storage
            .put("vb-tracker-v7", &stale, &CachedResponse::new(200, "OK", "v7"))
            .unwrap();
        serve_shell(&fetcher);
        proxy.install().await.unwrap();

        let report = proxy.activate().unwrap();
        assert_eq!(report.deleted, vec!["vb-tracker-v6", "vb-tracker-v7"]);
        assert!(report.clients_claimed);
        assert!(proxy.clients_claimed());
        assert_eq!(proxy.state(), WorkerState::Activated);
        assert_eq!(storage.partitions().unwrap(), vec!["vb-tracker-v8"]);

        let hit = storage.lookup(&stale, false).unwrap().unwrap();
        assert_eq!(hit.body_text(), "body of ./index.html");
    }
}
