use std::time::Duration;

use async_trait::async_trait;

use artiview_core::config::LOOPBACK;
use artiview_core::probe::{
    LISTING_BODY_LIMIT, TITLE_BODY_LIMIT, extract_title, looks_like_artifact_listing,
    workspace_from_identity,
};

/// Per-probe time budget
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(2000);

/// HTTP probes used by the apps manager.
///
/// Every probe is bounded by its own timeout and maps any failure to
/// `false` / `None`.
#[async_trait]
pub trait AppProber: Send + Sync {
    /// GET completes with a status in `[200, 500)`
    async fn check_health(&self, url: &str) -> bool;

    /// `/api/artifacts` on `port` answers like an artifact viewer
    async fn is_viewer(&self, port: u16) -> bool;

    /// First `<title>` of the page at `url`
    async fn fetch_page_title(&self, url: &str) -> Option<String>;

    /// `workspace` from `/api/identity` on `port`
    async fn fetch_workspace_name(&self, port: u16) -> Option<String>;
}

pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new() -> Self {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        // a redirect counts as an answer; its target is never fetched
        let client = reqwest::Client::builder()
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, timeout }
    }

    async fn get(&self, url: &str) -> Option<reqwest::Response> {
        self.client.get(url).send().await.ok()
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new()
    }
}

/// Read at most a little over `limit` bytes; dropping the response closes
/// the connection.
async fn read_capped(mut resp: reqwest::Response, limit: usize) -> Vec<u8> {
    let mut body = Vec::new();
    while let Ok(Some(chunk)) = resp.chunk().await {
        body.extend_from_slice(&chunk);
        if body.len() > limit {
            break;
        }
    }
    body
}

fn api_url(port: u16, path: &str) -> String {
    format!("http://{LOOPBACK}:{port}{path}")
}

#[async_trait]
impl AppProber for HttpProber {
    async fn check_health(&self, url: &str) -> bool {
        let probe = async {
            let resp = self.get(url).await?;
            let status = resp.status().as_u16();
            Some((200..500).contains(&status))
        };
        matches!(tokio::time::timeout(self.timeout, probe).await, Ok(Some(true)))
    }

    async fn is_viewer(&self, port: u16) -> bool {
        let probe = async {
            let resp = self.get(&api_url(port, "/api/artifacts")).await?;
            if resp.status() != reqwest::StatusCode::OK {
                return Some(false);
            }
            let body = read_capped(resp, LISTING_BODY_LIMIT).await;
            Some(looks_like_artifact_listing(&String::from_utf8_lossy(&body)))
        };
        matches!(tokio::time::timeout(self.timeout, probe).await, Ok(Some(true)))
    }

    async fn fetch_page_title(&self, url: &str) -> Option<String> {
        let probe = async {
            let resp = self.get(url).await?;
            let body = read_capped(resp, TITLE_BODY_LIMIT).await;
            extract_title(&String::from_utf8_lossy(&body))
        };
        tokio::time::timeout(self.timeout, probe).await.ok().flatten()
    }

    async fn fetch_workspace_name(&self, port: u16) -> Option<String> {
        let probe = async {
            let resp = self.get(&api_url(port, "/api/identity")).await?;
            if resp.status() != reqwest::StatusCode::OK {
                return None;
            }
            let body = resp.text().await.ok()?;
            workspace_from_identity(&body)
        };
        tokio::time::timeout(self.timeout, probe).await.ok().flatten()
    }
}
