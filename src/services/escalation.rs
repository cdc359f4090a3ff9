//! Browser fallback for report pages that only work once rendered.
//!
//! Each candidate page gets its own browser session, driven through a fixed
//! sequence of states:
//!
//! ```text
//! Init -> Navigating -> ConsentHandling -> AnchorScan
//!      -> {DirectDownload | ButtonSearch} -> NetworkCapture -> Done
//! ```
//!
//! Failures inside a state never abort the sequence; the session is closed
//! on every path out of it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::discovery::url_utils::{resolve_href, url_basename};
use crate::discovery::DiscoveryConfig;
use crate::models::Candidate;
use crate::scrapers::browser::{
    BrowserDriver, BrowserEngineConfig, BrowserError, BrowserSession, WaitCondition,
};
use crate::storage::DocumentStore;
use crate::utils::truncate_chars;

const CONSENT_SELECTORS: &[&str] = &["button", "a", "input[type=button]", "input[type=submit]"];
const CONTROL_SELECTOR: &str = "a,button,input[type=button],input[type=submit]";
const ANCHOR_SELECTOR: &str = "a[href]";
const FALLBACK_FILENAME: &str = "report.pdf";

/// Pause after a successful consent click.
const CONSENT_SETTLE: Duration = Duration::from_millis(400);

/// Error type for the browser fallback.
#[derive(Debug, thiserror::Error)]
pub enum EscalationError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("Invalid escalation configuration: {0}")]
    Config(String),

    #[error("Escalation cancelled")]
    Cancelled,
}

/// How an escalated PDF was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationSource {
    /// Rendered anchor fetched through the session.
    Anchor,
    /// Response observed on the wire.
    Network,
}

impl EscalationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anchor => "anchor",
            Self::Network => "network",
        }
    }
}

impl std::fmt::Display for EscalationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A PDF saved by the browser fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationResult {
    pub source: EscalationSource,
    pub pdf_url: String,
    pub saved_path: std::path::PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
}

/// States of one escalation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    Init,
    Navigating,
    ConsentHandling,
    AnchorScan,
    DirectDownload,
    ButtonSearch,
    NetworkCapture,
    Done,
}

/// Drives a browser over candidate pages and saves the PDFs it surfaces.
pub struct FallbackEscalator {
    driver: Arc<dyn BrowserDriver>,
    store: DocumentStore,
    browser: BrowserEngineConfig,
    consent_keywords: Vec<String>,
    control_pattern: Regex,
    max_candidates: usize,
}

impl FallbackEscalator {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        store: DocumentStore,
        config: &DiscoveryConfig,
        browser: BrowserEngineConfig,
    ) -> Result<Self, EscalationError> {
        let control_pattern = RegexBuilder::new(&config.button_keywords)
            .case_insensitive(true)
            .build()
            .map_err(|e| EscalationError::Config(format!("invalid button_keywords: {}", e)))?;

        Ok(Self {
            driver,
            store,
            browser,
            consent_keywords: config
                .consent_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            control_pattern,
            max_candidates: config.escalation_candidates,
        })
    }

    /// Escalate the top candidates by confidence, one session each.
    ///
    /// A candidate that yields nothing does not stop the next one. Failing
    /// to start a browser at all is an error.
    pub async fn escalate(
        &self,
        company: &str,
        candidates: &[Candidate],
        cancel: &CancellationToken,
    ) -> Result<Vec<EscalationResult>, EscalationError> {
        let mut ranked: Vec<&Candidate> = candidates.iter().collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut results = Vec::new();
        for candidate in ranked.into_iter().take(self.max_candidates) {
            if cancel.is_cancelled() {
                return Err(EscalationError::Cancelled);
            }
            info!(
                "Escalating {} (method={}, confidence={:.2})",
                candidate.url, candidate.method, candidate.confidence
            );
            let found = self.escalate_page(company, &candidate.url).await?;
            if found.is_empty() {
                info!("Browser fallback found no PDFs on {}", candidate.url);
            }
            results.extend(found);
        }
        Ok(results)
    }

    /// Run one session against a single page.
    pub async fn escalate_page(
        &self,
        company: &str,
        page_url: &str,
    ) -> Result<Vec<EscalationResult>, EscalationError> {
        let mut session = self.driver.open_session().await?;
        let results = self.run(session.as_mut(), company, page_url).await;
        session.close().await;
        Ok(results)
    }

    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        company: &str,
        page_url: &str,
    ) -> Vec<EscalationResult> {
        let mut state = EscalationState::Init;
        let mut anchors = Vec::new();
        let mut saved_urls = HashSet::new();
        let mut results = Vec::new();

        loop {
            let next = match state {
                EscalationState::Init => EscalationState::Navigating,
                EscalationState::Navigating => {
                    if self.navigate(session, page_url).await {
                        EscalationState::ConsentHandling
                    } else {
                        EscalationState::Done
                    }
                }
                EscalationState::ConsentHandling => {
                    self.accept_consent(session).await;
                    tokio::time::sleep(self.browser.render_delay()).await;
                    EscalationState::AnchorScan
                }
                EscalationState::AnchorScan => {
                    anchors = rendered_pdf_links(session, page_url).await;
                    if anchors.is_empty() {
                        EscalationState::ButtonSearch
                    } else {
                        info!("Found {} PDF anchors in rendered page", anchors.len());
                        EscalationState::DirectDownload
                    }
                }
                EscalationState::DirectDownload => {
                    for url in &anchors {
                        if let Some(result) = self.download_anchor(session, company, url).await {
                            saved_urls.insert(result.pdf_url.clone());
                            results.push(result);
                        }
                    }
                    EscalationState::NetworkCapture
                }
                EscalationState::ButtonSearch => {
                    if self.click_report_controls(session).await == 0 {
                        debug!("No download controls; waiting for background responses");
                        tokio::time::sleep(self.browser.idle_wait()).await;
                    }
                    EscalationState::NetworkCapture
                }
                EscalationState::NetworkCapture => {
                    results.extend(self.save_captured(session, company, &mut saved_urls).await);
                    EscalationState::Done
                }
                EscalationState::Done => break,
            };
            debug!("Escalation {:?} -> {:?}", state, next);
            state = next;
        }

        results
    }

    /// Navigate, retrying once with a looser load condition on timeout.
    async fn navigate(&self, session: &mut dyn BrowserSession, url: &str) -> bool {
        let timeout = self.browser.navigation_timeout();
        info!("Navigating to {}", url);

        match session.navigate(url, timeout, WaitCondition::NetworkIdle).await {
            Ok(()) => return true,
            Err(BrowserError::NavigationTimeout { .. }) => {
                debug!("Network never went idle on {}, retrying", url);
            }
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        }

        match session
            .navigate(url, timeout, WaitCondition::DomContentLoaded)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Navigation failed twice: {}", e);
                false
            }
        }
    }

    /// Click the first consent control that accepts a click.
    async fn accept_consent(&self, session: &mut dyn BrowserSession) -> bool {
        for selector in CONSENT_SELECTORS {
            for element in session.query_elements(selector).await {
                let element = match element {
                    Ok(element) => element,
                    Err(e) => {
                        debug!("Skipping element: {}", e);
                        continue;
                    }
                };

                let label = element_label(element.as_ref()).await;
                if !self.consent_keywords.iter().any(|k| label.contains(k)) {
                    continue;
                }

                match element.click(self.browser.consent_click_timeout()).await {
                    Ok(()) => {
                        info!("Clicked consent control: {}", truncate_chars(&label, 50));
                        tokio::time::sleep(CONSENT_SETTLE).await;
                        return true;
                    }
                    Err(e) => debug!("Consent click failed: {}", e),
                }
            }
        }
        false
    }

    /// Click every control that looks like a report download. Returns how many matched.
    async fn click_report_controls(&self, session: &mut dyn BrowserSession) -> usize {
        let mut controls = Vec::new();
        for element in session.query_elements(CONTROL_SELECTOR).await {
            match element {
                Ok(element) => {
                    let label = element_label(element.as_ref()).await;
                    if self.control_pattern.is_match(&label) {
                        controls.push((label, element));
                    }
                }
                Err(e) => debug!("Skipping element: {}", e),
            }
        }

        info!("Clicking {} candidate download controls", controls.len());
        for (index, (label, element)) in controls.iter().enumerate() {
            debug!("Clicking control #{}: '{}'", index + 1, truncate_chars(label, 80));
            if let Err(e) = element.click(self.browser.click_timeout()).await {
                debug!("Click failed: {}", e);
                continue;
            }
            tokio::time::sleep(self.browser.settle_delay()).await;
        }
        controls.len()
    }

    async fn download_anchor(
        &self,
        session: &mut dyn BrowserSession,
        company: &str,
        url: &str,
    ) -> Option<EscalationResult> {
        let response = match session
            .fetch_in_session(url, self.browser.navigation_timeout())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Anchor fetch failed: {}", e);
                return None;
            }
        };
        if response.status != 200 {
            debug!("Anchor GET returned {} for {}", response.status, url);
            return None;
        }
        self.persist(company, url, &response.body, EscalationSource::Anchor)
    }

    async fn save_captured(
        &self,
        session: &mut dyn BrowserSession,
        company: &str,
        saved_urls: &mut HashSet<String>,
    ) -> Vec<EscalationResult> {
        let captured = session.captured_responses().await;
        if captured.is_empty() {
            debug!("No PDF responses captured");
            return Vec::new();
        }

        let mut results = Vec::new();
        for response in captured {
            if saved_urls.contains(response.url()) {
                continue;
            }
            let body = match response.body().await {
                Ok(body) => body,
                Err(e) => {
                    debug!("{}", e);
                    continue;
                }
            };
            if let Some(result) =
                self.persist(company, response.url(), &body, EscalationSource::Network)
            {
                saved_urls.insert(result.pdf_url.clone());
                results.push(result);
            }
        }
        results
    }

    fn persist(
        &self,
        company: &str,
        url: &str,
        body: &[u8],
        source: EscalationSource,
    ) -> Option<EscalationResult> {
        let name = match url_basename(url) {
            name if name.is_empty() => FALLBACK_FILENAME.to_string(),
            name => name,
        };

        match self.store.save(company, &name, body) {
            Ok(doc) => {
                info!("Saved {} ({} via {})", doc.path.display(), url, source);
                Some(EscalationResult {
                    source,
                    pdf_url: url.to_string(),
                    saved_path: doc.path,
                    sha256: doc.sha256,
                    size_bytes: doc.size_bytes,
                })
            }
            Err(e) => {
                warn!("Failed to save {}: {}", url, e);
                None
            }
        }
    }
}

/// Absolute URLs of rendered anchors whose href mentions `.pdf`.
async fn rendered_pdf_links(session: &mut dyn BrowserSession, page_url: &str) -> Vec<String> {
    let mut links = Vec::new();
    for element in session.query_elements(ANCHOR_SELECTOR).await {
        let href = match element {
            Ok(element) => element.attribute("href").await,
            Err(e) => Err(e),
        };
        match href {
            Ok(Some(href)) if href.to_lowercase().contains(".pdf") => {
                if let Some(url) = resolve_href(page_url, &href) {
                    if !links.contains(&url) {
                        links.push(url);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => debug!("Skipping anchor: {}", e),
        }
    }
    links
}

/// Lowercased visible text plus `value` attribute.
async fn element_label(element: &dyn crate::scrapers::browser::PageElement) -> String {
    let text = element.text().await.unwrap_or_default();
    let value = element.attribute("value").await.ok().flatten().unwrap_or_default();
    format!("{} {}", text.trim(), value.trim()).trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiscoveryMethod;
    use crate::scrapers::browser::{CapturedResponse, PageElement, SessionResponse};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Clone)]
    struct FakeElement {
        text: String,
        attrs: HashMap<String, String>,
        clickable: bool,
        log: Log,
    }

    #[async_trait]
    impl PageElement for FakeElement {
        async fn text(&self) -> Result<String, BrowserError> {
            Ok(self.text.clone())
        }

        async fn attribute(&self, name: &str) -> Result<Option<String>, BrowserError> {
            Ok(self.attrs.get(name).cloned())
        }

        async fn click(&self, _timeout: Duration) -> Result<(), BrowserError> {
            self.log.lock().unwrap().push(format!("click {}", self.text));
            if self.clickable {
                Ok(())
            } else {
                Err(BrowserError::ClickFailure("detached".to_string()))
            }
        }
    }

    struct FakeCapture {
        url: String,
        body: Option<Vec<u8>>,
    }

    #[async_trait]
    impl CapturedResponse for FakeCapture {
        fn url(&self) -> &str {
            &self.url
        }

        fn content_type(&self) -> &str {
            "application/pdf"
        }

        async fn body(&self) -> Result<Vec<u8>, BrowserError> {
            self.body.clone().ok_or_else(|| BrowserError::BodyReadFailure {
                url: self.url.clone(),
                message: "evicted".to_string(),
            })
        }
    }

    /// Scripted page shared by every session the fake driver opens.
    #[derive(Clone, Default)]
    struct Script {
        nav_timeouts: usize,
        elements: HashMap<String, Vec<(String, Vec<(&'static str, String)>, bool)>>,
        fetchable: HashMap<String, (u16, Vec<u8>)>,
        captured: Vec<(String, Option<Vec<u8>>)>,
    }

    struct FakeDriver {
        script: Script,
        log: Log,
        fail_launch: bool,
    }

    impl FakeDriver {
        fn new(script: Script) -> Self {
            Self {
                script,
                log: Arc::new(Mutex::new(Vec::new())),
                fail_launch: false,
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrowserDriver for FakeDriver {
        async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            if self.fail_launch {
                return Err(BrowserError::Launch("no display".to_string()));
            }
            self.log.lock().unwrap().push("open".to_string());
            Ok(Box::new(FakeSession {
                script: self.script.clone(),
                navigations: 0,
                log: self.log.clone(),
            }))
        }
    }

    struct FakeSession {
        script: Script,
        navigations: usize,
        log: Log,
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn navigate(
            &mut self,
            url: &str,
            _timeout: Duration,
            wait: WaitCondition,
        ) -> Result<(), BrowserError> {
            self.log.lock().unwrap().push(format!("navigate {:?}", wait));
            self.navigations += 1;
            if self.navigations <= self.script.nav_timeouts {
                Err(BrowserError::NavigationTimeout {
                    url: url.to_string(),
                })
            } else {
                Ok(())
            }
        }

        async fn query_elements(
            &mut self,
            selector: &str,
        ) -> Vec<Result<Box<dyn PageElement>, BrowserError>> {
            let mut out: Vec<Result<Box<dyn PageElement>, BrowserError>> = vec![Err(
                BrowserError::InspectionFailure("stale node".to_string()),
            )];
            for (text, attrs, clickable) in self.script.elements.get(selector).cloned().unwrap_or_default() {
                out.push(Ok(Box::new(FakeElement {
                    text,
                    attrs: attrs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                    clickable,
                    log: self.log.clone(),
                })));
            }
            out
        }

        async fn fetch_in_session(
            &mut self,
            url: &str,
            _timeout: Duration,
        ) -> Result<SessionResponse, BrowserError> {
            self.log.lock().unwrap().push(format!("fetch {}", url));
            match self.script.fetchable.get(url) {
                Some((status, body)) => Ok(SessionResponse {
                    status: *status,
                    body: body.clone(),
                }),
                None => Err(BrowserError::BodyReadFailure {
                    url: url.to_string(),
                    message: "net::ERR_FAILED".to_string(),
                }),
            }
        }

        async fn captured_responses(&mut self) -> Vec<Box<dyn CapturedResponse>> {
            self.script
                .captured
                .iter()
                .map(|(url, body)| {
                    Box::new(FakeCapture {
                        url: url.clone(),
                        body: body.clone(),
                    }) as Box<dyn CapturedResponse>
                })
                .collect()
        }

        async fn close(&mut self) {
            self.log.lock().unwrap().push("close".to_string());
        }
    }

    fn anchor(href: &str) -> (String, Vec<(&'static str, String)>, bool) {
        (String::new(), vec![("href", href.to_string())], true)
    }

    fn control(text: &str, clickable: bool) -> (String, Vec<(&'static str, String)>, bool) {
        (text.to_string(), Vec::new(), clickable)
    }

    fn escalator(driver: Arc<FakeDriver>, root: &std::path::Path) -> FallbackEscalator {
        FallbackEscalator::new(
            driver,
            DocumentStore::new(root),
            &DiscoveryConfig::default(),
            BrowserEngineConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_anchor_download_then_network_capture() {
        let mut script = Script::default();
        script.elements.insert(
            "a[href]".to_string(),
            vec![
                anchor("/files/AR2023.pdf"),
                anchor("/about"),
                anchor("/files/AR2023.pdf"),
                anchor("/files/missing.pdf"),
            ],
        );
        script.fetchable.insert(
            "https://acme.example/files/AR2023.pdf".to_string(),
            (200, b"%PDF-anchor".to_vec()),
        );
        script.captured = vec![
            ("https://acme.example/files/AR2023.pdf".to_string(), Some(b"%PDF-anchor".to_vec())),
            ("https://cdn.acme.example/q3.pdf".to_string(), Some(b"%PDF-network".to_vec())),
            ("https://cdn.acme.example/gone.pdf".to_string(), None),
        ];

        let dir = tempdir().unwrap();
        let driver = Arc::new(FakeDriver::new(script));
        let results = escalator(driver.clone(), dir.path())
            .escalate_page("Acme Corp", "https://acme.example/ir")
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, EscalationSource::Anchor);
        assert_eq!(results[0].pdf_url, "https://acme.example/files/AR2023.pdf");
        assert_eq!(
            results[0].saved_path,
            dir.path().join("Acme_Corp").join("AR2023.pdf")
        );
        assert_eq!(results[1].source, EscalationSource::Network);
        assert_eq!(results[1].size_bytes, 12);
        assert_eq!(
            std::fs::read(&results[1].saved_path).unwrap(),
            b"%PDF-network"
        );

        let log = driver.log();
        assert_eq!(log.first().map(String::as_str), Some("open"));
        assert_eq!(log.last().map(String::as_str), Some("close"));
        let fetches = log.iter().filter(|l| l.starts_with("fetch")).count();
        assert_eq!(fetches, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consent_clicks_first_working_match() {
        let mut script = Script::default();
        script.elements.insert(
            "button".to_string(),
            vec![
                control("Subscribe", true),
                control("Accept all cookies", false),
                control("OK", true),
                control("I agree", true),
            ],
        );

        let dir = tempdir().unwrap();
        let driver = Arc::new(FakeDriver::new(script));
        escalator(driver.clone(), dir.path())
            .escalate_page("Acme", "https://acme.example/ir")
            .await
            .unwrap();

        let clicks: Vec<String> = driver
            .log()
            .into_iter()
            .filter(|l| l.starts_with("click"))
            .collect();
        assert_eq!(clicks, vec!["click Accept all cookies", "click OK"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_search_clicks_report_controls() {
        let mut script = Script::default();
        script.elements.insert(
            CONTROL_SELECTOR.to_string(),
            vec![
                control("Download Annual Report", true),
                control("Contact us", true),
                control("FY24 results", false),
            ],
        );
        script.captured = vec![(
            "https://cdn.acme.example/download".to_string(),
            Some(b"%PDF".to_vec()),
        )];

        let dir = tempdir().unwrap();
        let driver = Arc::new(FakeDriver::new(script));
        let results = escalator(driver.clone(), dir.path())
            .escalate_page("Acme", "https://acme.example/ir")
            .await
            .unwrap();

        let clicks: Vec<String> = driver
            .log()
            .into_iter()
            .filter(|l| l.starts_with("click"))
            .collect();
        assert_eq!(
            clicks,
            vec!["click Download Annual Report", "click FY24 results"]
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, EscalationSource::Network);
        assert!(results[0].saved_path.ends_with("download.pdf"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_retries_once_with_looser_condition() {
        let script = Script {
            nav_timeouts: 1,
            ..Script::default()
        };
        let dir = tempdir().unwrap();
        let driver = Arc::new(FakeDriver::new(script));
        escalator(driver.clone(), dir.path())
            .escalate_page("Acme", "https://acme.example/ir")
            .await
            .unwrap();

        let navigations: Vec<String> = driver
            .log()
            .into_iter()
            .filter(|l| l.starts_with("navigate"))
            .collect();
        assert_eq!(
            navigations,
            vec!["navigate NetworkIdle", "navigate DomContentLoaded"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_navigation_failure_ends_session() {
        let mut script = Script {
            nav_timeouts: 2,
            ..Script::default()
        };
        script.captured = vec![("https://acme.example/x.pdf".to_string(), Some(b"%PDF".to_vec()))];

        let dir = tempdir().unwrap();
        let driver = Arc::new(FakeDriver::new(script));
        let results = escalator(driver.clone(), dir.path())
            .escalate_page("Acme", "https://acme.example/ir")
            .await
            .unwrap();

        assert!(results.is_empty());
        let log = driver.log();
        assert_eq!(log.len(), 4);
        assert_eq!(log[3], "close");
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalate_tries_top_candidates_in_confidence_order() {
        let dir = tempdir().unwrap();
        let driver = Arc::new(FakeDriver::new(Script::default()));
        let candidates = vec![
            Candidate::new("https://acme.example/a".into(), DiscoveryMethod::ProbePath, 0.5),
            Candidate::new("https://acme.example/b".into(), DiscoveryMethod::Serp, 0.9),
            Candidate::new("https://acme.example/c".into(), DiscoveryMethod::SitemapPage, 0.75),
        ];

        let results = escalator(driver.clone(), dir.path())
            .escalate("Acme", &candidates, &CancellationToken::new())
            .await
            .unwrap();

        assert!(results.is_empty());
        let opens = driver.log().iter().filter(|l| *l == "open").count();
        let closes = driver.log().iter().filter(|l| *l == "close").count();
        assert_eq!(opens, 2);
        assert_eq!(closes, 2);
    }

    #[tokio::test]
    async fn test_launch_failure_and_cancellation() {
        let dir = tempdir().unwrap();
        let candidates = vec![Candidate::new(
            "https://acme.example/ir".into(),
            DiscoveryMethod::Serp,
            0.9,
        )];

        let mut broken = FakeDriver::new(Script::default());
        broken.fail_launch = true;
        let err = escalator(Arc::new(broken), dir.path())
            .escalate("Acme", &candidates, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EscalationError::Browser(BrowserError::Launch(_))));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let driver = Arc::new(FakeDriver::new(Script::default()));
        let err = escalator(driver.clone(), dir.path())
            .escalate("Acme", &candidates, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, EscalationError::Cancelled));
        assert!(driver.log().is_empty());
    }

    #[test]
    fn test_invalid_button_pattern() {
        let config = DiscoveryConfig {
            button_keywords: "(unclosed".to_string(),
            ..DiscoveryConfig::default()
        };
        let result = FallbackEscalator::new(
            Arc::new(FakeDriver::new(Script::default())),
            DocumentStore::new("/tmp/unused"),
            &config,
            BrowserEngineConfig::default(),
        );
        assert!(matches!(result, Err(EscalationError::Config(_))));
    }
}
