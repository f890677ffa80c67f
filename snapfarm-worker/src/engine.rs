//! Render engine bridge
//!
//! The runtime executes tasks against a [`RenderEngine`]; the stock
//! backend is a browser-less HTTP fetch engine that captures the raw page
//! body. Geometry settings (viewport, clip rect, zoom) ride along in the
//! task for backends that can honor them; the HTTP engine applies the
//! user agent and cookies only.

use async_trait::async_trait;
use reqwest::header::{COOKIE, IF_MODIFIED_SINCE, USER_AGENT};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::debug;

use snapfarm_ipc::{PageSummary, SnapshotData, TaskSpec};

use crate::storage::StoragePaths;

/// Cache-busting value sent with every engine fetch, so a repeat snapshot
/// of the same URL never gets a 304 shortcut
const IF_MODIFIED_SINCE_EPOCH: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Render engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine initialization failed: {0}")]
    Initialization(String),

    /// The page could not be opened; maps to a `fail` task status
    #[error("Failed to open {url}: {reason}")]
    Open { url: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// One render backend
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Open the task's URL, capture it into `paths.full` and return the
    /// result payload (carrying `paths.relative`)
    async fn snapshot(&self, task: &TaskSpec, paths: &StoragePaths) -> Result<SnapshotData, EngineError>;

    /// Open the task's URL and report only whether it loads
    async fn validate(&self, task: &TaskSpec) -> Result<(), EngineError>;
}

/// Browser-less engine: plain HTTP GET, no JavaScript execution
pub struct HttpEngine {
    client: reqwest::Client,
    default_user_agent: String,
}

impl HttpEngine {
    pub fn new(default_user_agent: impl Into<String>) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| EngineError::Initialization(e.to_string()))?;
        Ok(Self {
            client,
            default_user_agent: default_user_agent.into(),
        })
    }

    async fn fetch(&self, task: &TaskSpec) -> Result<String, EngineError> {
        let request = &task.request;
        let open = |e: reqwest::Error| EngineError::Open {
            url: request.url.clone(),
            reason: e.to_string(),
        };

        let user_agent = request
            .user_agent
            .as_deref()
            .unwrap_or(&self.default_user_agent);

        let mut builder = self
            .client
            .get(&request.url)
            .header(USER_AGENT, user_agent)
            .header(IF_MODIFIED_SINCE, IF_MODIFIED_SINCE_EPOCH);

        if !request.cookies.is_empty() {
            let header = request
                .cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(COOKIE, header);
        }

        let response = builder.send().await.map_err(open)?;
        debug!(task = task.id, url = %request.url, status = %response.status(), "page opened");
        response.text().await.map_err(open)
    }
}

#[async_trait]
impl RenderEngine for HttpEngine {
    async fn snapshot(&self, task: &TaskSpec, paths: &StoragePaths) -> Result<SnapshotData, EngineError> {
        let body = self.fetch(task).await?;

        let summary = task.request.get_summary.then(|| extract_summary(&body));

        if let Some(parent) = paths.full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&paths.full, body.as_bytes()).await?;
        debug!(task = task.id, path = %paths.full.display(), "capture written");

        Ok(SnapshotData {
            path: paths.relative.clone(),
            summary,
        })
    }

    async fn validate(&self, task: &TaskSpec) -> Result<(), EngineError> {
        self.fetch(task).await.map(drop)
    }
}

/// Pull `{title, description}` out of a page; missing pieces come back
/// as empty strings
pub fn extract_summary(html: &str) -> PageSummary {
    let document = Html::parse_document(html);
    // Static selectors, parse cannot fail
    let title_sel = Selector::parse("title").unwrap();
    let description_sel = Selector::parse(r#"meta[name="description"]"#).unwrap();

    let title = document
        .select(&title_sel)
        .next()
        .map(|n| n.text().collect::<String>())
        .unwrap_or_default();

    let description = document
        .select(&description_sel)
        .next()
        .and_then(|n| n.value().attr("content"))
        .unwrap_or_default()
        .to_string();

    PageSummary { title, description }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_extracted_from_head() {
        let html = r#"<html><head>
            <title>Example Domain</title>
            <meta name="description" content="An example page">
        </head><body></body></html>"#;

        let summary = extract_summary(html);
        assert_eq!(summary.title, "Example Domain");
        assert_eq!(summary.description, "An example page");
    }

    #[test]
    fn test_summary_tolerates_missing_pieces() {
        let summary = extract_summary("<html><body><p>no head</p></body></html>");
        assert_eq!(summary.title, "");
        assert_eq!(summary.description, "");

        let summary = extract_summary("");
        assert_eq!(summary, PageSummary::default());
    }

    #[test]
    fn test_summary_ignores_other_meta_tags() {
        let html = r#"<html><head>
            <meta name="keywords" content="a,b">
            <meta name="description" content="the right one">
        </head></html>"#;
        assert_eq!(extract_summary(html).description, "the right one");
    }

    #[tokio::test]
    async fn test_open_failure_reported_with_url() {
        // Reserved TEST-NET-1 address, nothing listens there
        let engine = HttpEngine::new("test-agent").unwrap();
        let task = snapfarm_ipc::TaskSpec::new(
            0,
            snapfarm_ipc::TaskKind::Validate,
            snapfarm_ipc::TaskRequest::for_url("http://127.0.0.1:1/"),
        );
        match engine.validate(&task).await {
            Err(EngineError::Open { url, .. }) => assert_eq!(url, "http://127.0.0.1:1/"),
            other => panic!("expected open failure, got {other:?}"),
        }
    }
}
