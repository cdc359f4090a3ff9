//! Chrome DevTools implementation of the browser traits.

#[cfg(feature = "browser")]
pub use enabled::ChromiumDriver;

#[cfg(not(feature = "browser"))]
pub use disabled::ChromiumDriver;

#[cfg(feature = "browser")]
mod enabled {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use base64::Engine;
    use chromiumoxide::cdp::browser_protocol::network::{
        EnableParams, EventResponseReceived, GetResponseBodyParams, RequestId,
    };
    use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
    use chromiumoxide::{Browser, BrowserConfig, Element, Page};
    use futures::StreamExt;
    use serde::Deserialize;
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tracing::{debug, info};

    use crate::scrapers::browser::{
        BrowserDriver, BrowserEngineConfig, BrowserError, BrowserSession, CapturedResponse,
        PageElement, SessionResponse, WaitCondition,
    };
    use crate::scrapers::http_client::signals_pdf;

    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &[&str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    /// Resolves once the DOM is parsed, or after 10 seconds.
    const READY_STATE_SCRIPT: &str = r#"
        new Promise((resolve) => {
            if (document.readyState === 'complete' || document.readyState === 'interactive') {
                resolve(document.readyState);
            } else {
                document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                setTimeout(() => resolve('timeout'), 10000);
            }
        })
    "#;

    /// Launches (or attaches to) Chrome, one browser per session.
    pub struct ChromiumDriver {
        config: BrowserEngineConfig,
    }

    impl ChromiumDriver {
        pub fn new(config: BrowserEngineConfig) -> Self {
            Self { config }
        }

        /// Find Chrome executable.
        fn find_chrome() -> Result<PathBuf, BrowserError> {
            for path in CHROME_PATHS {
                let p = std::path::Path::new(path);
                if p.exists() {
                    info!("Found Chrome at: {}", path);
                    return Ok(p.to_path_buf());
                }
            }

            for cmd in &[
                "google-chrome",
                "google-chrome-stable",
                "chromium",
                "chromium-browser",
            ] {
                if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                    if output.status.success() {
                        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                        if !path.is_empty() {
                            info!("Found Chrome in PATH: {}", path);
                            return Ok(PathBuf::from(path));
                        }
                    }
                }
            }

            Err(BrowserError::Unavailable(
                "Chrome/Chromium not found. Install it or set browser.remote_url".to_string(),
            ))
        }

        async fn launch(&self) -> Result<(Browser, JoinHandle<()>), BrowserError> {
            info!("Launching browser (headless={})", self.config.headless);

            let chrome_path = Self::find_chrome()?;
            let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

            // with_head means NOT headless
            if !self.config.headless {
                builder = builder.with_head();
            }

            if let Some(ref proxy) = self.config.proxy {
                builder = builder.arg(format!("--proxy-server={}", proxy));
            }

            builder = builder
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg("--disable-sync")
                .arg("--disable-translate")
                .arg("--ignore-certificate-errors")
                .arg("--no-sandbox") // Often needed for headless in containers
                .arg("--disable-gpu");

            for arg in &self.config.chrome_args {
                builder = builder.arg(arg);
            }

            let config = builder.build().map_err(BrowserError::Launch)?;

            let (browser, handler) = Browser::launch(config)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            Ok((browser, spawn_handler(handler)))
        }

        /// Connect to a remote Chrome instance.
        async fn connect_remote(&self, url: &str) -> Result<(Browser, JoinHandle<()>), BrowserError> {
            info!("Connecting to remote browser at {}", url);

            // The WebSocket URL comes from the /json/version endpoint
            let http_url = url
                .replace("ws://", "http://")
                .replace("wss://", "https://");
            let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

            let resp: serde_json::Value = reqwest::Client::new()
                .get(&version_url)
                .send()
                .await
                .map_err(|e| BrowserError::Launch(format!("remote browser unreachable: {}", e)))?
                .json()
                .await
                .map_err(|e| BrowserError::Launch(format!("bad browser version info: {}", e)))?;

            let ws_url = resp
                .get("webSocketDebuggerUrl")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    BrowserError::Launch("No webSocketDebuggerUrl in response".to_string())
                })?;

            info!("Connecting to WebSocket: {}", ws_url);

            let (browser, handler) = Browser::connect(ws_url)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            Ok((browser, spawn_handler(handler)))
        }
    }

    fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        })
    }

    #[async_trait]
    impl BrowserDriver for ChromiumDriver {
        async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            let (mut browser, handler, owned) = match self.config.remote_url.clone() {
                Some(remote) => {
                    let (b, h) = self.connect_remote(&remote).await?;
                    (b, h, false)
                }
                None => {
                    let (b, h) = self.launch().await?;
                    (b, h, true)
                }
            };

            let page = match browser.new_page("about:blank").await {
                Ok(page) => page,
                Err(e) => {
                    if owned {
                        let _ = browser.close().await;
                    }
                    handler.abort();
                    return Err(BrowserError::Launch(e.to_string()));
                }
            };

            let captured = Arc::new(Mutex::new(Vec::new()));
            let listener = match install_listener(&page, captured.clone()).await {
                Ok(listener) => listener,
                Err(e) => {
                    let _ = page.close().await;
                    if owned {
                        let _ = browser.close().await;
                    }
                    handler.abort();
                    return Err(e);
                }
            };

            Ok(Box::new(ChromiumSession {
                browser: Some(browser),
                owned,
                page: Some(page),
                handler,
                listener,
                captured,
            }))
        }
    }

    /// A PDF response seen by the listener.
    #[derive(Debug, Clone)]
    struct SeenResponse {
        request_id: RequestId,
        url: String,
        content_type: String,
    }

    /// Enable the network domain and buffer every PDF response.
    async fn install_listener(
        page: &Page,
        captured: Arc<Mutex<Vec<SeenResponse>>>,
    ) -> Result<JoinHandle<()>, BrowserError> {
        page.execute(EnableParams::default())
            .await
            .map_err(|e| BrowserError::Launch(format!("network domain: {}", e)))?;

        let mut events = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| BrowserError::Launch(format!("response listener: {}", e)))?;

        Ok(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let response = &event.response;
                if signals_pdf(Some(&response.mime_type), &response.url) {
                    debug!("Captured PDF response: {}", response.url);
                    captured.lock().await.push(SeenResponse {
                        request_id: event.request_id.clone(),
                        url: response.url.clone(),
                        content_type: response.mime_type.clone(),
                    });
                }
            }
        }))
    }

    struct ChromiumSession {
        browser: Option<Browser>,
        owned: bool,
        page: Option<Page>,
        handler: JoinHandle<()>,
        listener: JoinHandle<()>,
        captured: Arc<Mutex<Vec<SeenResponse>>>,
    }

    impl ChromiumSession {
        fn page(&self) -> Result<&Page, BrowserError> {
            self.page
                .as_ref()
                .ok_or_else(|| BrowserError::InspectionFailure("session is closed".to_string()))
        }
    }

    #[derive(Debug, Deserialize)]
    struct FetchResult {
        status: Option<u16>,
        data: Option<String>,
        error: Option<String>,
    }

    #[async_trait]
    impl BrowserSession for ChromiumSession {
        async fn navigate(
            &mut self,
            url: &str,
            timeout: Duration,
            wait: WaitCondition,
        ) -> Result<(), BrowserError> {
            let page = self.page()?;
            let nav_error = |e: chromiumoxide::error::CdpError| BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            };

            let navigation = async {
                match wait {
                    WaitCondition::NetworkIdle => {
                        page.goto(url).await.map_err(nav_error)?;
                    }
                    WaitCondition::DomContentLoaded => {
                        let params = NavigateParams::builder()
                            .url(url)
                            .build()
                            .map_err(|e| BrowserError::Navigation {
                                url: url.to_string(),
                                message: e,
                            })?;
                        page.execute(params).await.map_err(nav_error)?;
                        if let Err(e) = page.evaluate(READY_STATE_SCRIPT.to_string()).await {
                            // Non-HTML pages have no document to wait on
                            debug!("Could not check ready state: {}", e);
                        }
                    }
                }
                Ok::<(), BrowserError>(())
            };

            match tokio::time::timeout(timeout, navigation).await {
                Ok(result) => result,
                Err(_) => Err(BrowserError::NavigationTimeout {
                    url: url.to_string(),
                }),
            }
        }

        async fn query_elements(
            &mut self,
            selector: &str,
        ) -> Vec<Result<Box<dyn PageElement>, BrowserError>> {
            let page = match self.page() {
                Ok(page) => page,
                Err(e) => return vec![Err(e)],
            };
            match page.find_elements(selector).await {
                Ok(elements) => elements
                    .into_iter()
                    .map(|el| Ok(Box::new(ChromiumElement(el)) as Box<dyn PageElement>))
                    .collect(),
                Err(e) => vec![Err(BrowserError::InspectionFailure(format!(
                    "{}: {}",
                    selector, e
                )))],
            }
        }

        async fn fetch_in_session(
            &mut self,
            url: &str,
            timeout: Duration,
        ) -> Result<SessionResponse, BrowserError> {
            let page = self.page()?;
            let body_error = |message: String| BrowserError::BodyReadFailure {
                url: url.to_string(),
                message,
            };

            // fetch() from the page shares its cookies and session state
            let quoted = serde_json::to_string(url).map_err(|e| body_error(e.to_string()))?;
            let script = format!(
                r#"
                (async () => {{
                    try {{
                        const response = await fetch({}, {{
                            method: 'GET',
                            credentials: 'include',
                            headers: {{ 'Accept': 'application/pdf, */*' }}
                        }});
                        if (!response.ok) {{
                            return {{ status: response.status, data: '' }};
                        }}
                        const bytes = new Uint8Array(await response.arrayBuffer());
                        let binary = '';
                        for (let i = 0; i < bytes.length; i++) {{
                            binary += String.fromCharCode(bytes[i]);
                        }}
                        return {{ status: response.status, data: btoa(binary) }};
                    }} catch (e) {{
                        return {{ error: e.toString() }};
                    }}
                }})()
                "#,
                quoted
            );

            let evaluation = tokio::time::timeout(timeout, page.evaluate(script))
                .await
                .map_err(|_| body_error("timed out".to_string()))?
                .map_err(|e| body_error(e.to_string()))?;
            let result: FetchResult = evaluation
                .into_value()
                .map_err(|e| body_error(format!("bad fetch result: {}", e)))?;

            if let Some(error) = result.error {
                return Err(body_error(error));
            }

            let body = base64::engine::general_purpose::STANDARD
                .decode(result.data.unwrap_or_default())
                .map_err(|e| body_error(e.to_string()))?;

            Ok(SessionResponse {
                status: result.status.unwrap_or(0),
                body,
            })
        }

        async fn captured_responses(&mut self) -> Vec<Box<dyn CapturedResponse>> {
            let Some(page) = self.page.clone() else {
                return Vec::new();
            };
            self.captured
                .lock()
                .await
                .iter()
                .cloned()
                .map(|seen| {
                    Box::new(ChromiumCapture {
                        page: page.clone(),
                        seen,
                    }) as Box<dyn CapturedResponse>
                })
                .collect()
        }

        async fn close(&mut self) {
            self.listener.abort();
            if let Some(page) = self.page.take() {
                let _ = page.close().await;
            }
            if let Some(mut browser) = self.browser.take() {
                if self.owned {
                    let _ = browser.close().await;
                    let _ = browser.wait().await;
                }
            }
            self.handler.abort();
            debug!("Browser session closed");
        }
    }

    struct ChromiumElement(Element);

    #[async_trait]
    impl PageElement for ChromiumElement {
        async fn text(&self) -> Result<String, BrowserError> {
            self.0
                .inner_text()
                .await
                .map(Option::unwrap_or_default)
                .map_err(|e| BrowserError::InspectionFailure(e.to_string()))
        }

        async fn attribute(&self, name: &str) -> Result<Option<String>, BrowserError> {
            self.0
                .attribute(name)
                .await
                .map_err(|e| BrowserError::InspectionFailure(e.to_string()))
        }

        async fn click(&self, timeout: Duration) -> Result<(), BrowserError> {
            match tokio::time::timeout(timeout, self.0.click()).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(BrowserError::ClickFailure(e.to_string())),
                Err(_) => Err(BrowserError::ClickFailure("timed out".to_string())),
            }
        }
    }

    struct ChromiumCapture {
        page: Page,
        seen: SeenResponse,
    }

    #[async_trait]
    impl CapturedResponse for ChromiumCapture {
        fn url(&self) -> &str {
            &self.seen.url
        }

        fn content_type(&self) -> &str {
            &self.seen.content_type
        }

        async fn body(&self) -> Result<Vec<u8>, BrowserError> {
            let body_error = |message: String| BrowserError::BodyReadFailure {
                url: self.seen.url.clone(),
                message,
            };

            let resp = self
                .page
                .execute(GetResponseBodyParams::new(self.seen.request_id.clone()))
                .await
                .map_err(|e| body_error(e.to_string()))?;

            if resp.result.base64_encoded {
                base64::engine::general_purpose::STANDARD
                    .decode(&resp.result.body)
                    .map_err(|e| body_error(e.to_string()))
            } else {
                Ok(resp.result.body.clone().into_bytes())
            }
        }
    }
}

#[cfg(not(feature = "browser"))]
mod disabled {
    use async_trait::async_trait;

    use crate::scrapers::browser::{
        BrowserDriver, BrowserEngineConfig, BrowserError, BrowserSession,
    };

    // Stub for when browser feature is disabled
    pub struct ChromiumDriver;

    impl ChromiumDriver {
        pub fn new(_config: BrowserEngineConfig) -> Self {
            Self
        }
    }

    #[async_trait]
    impl BrowserDriver for ChromiumDriver {
        async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            Err(BrowserError::Unavailable(
                "built without the `browser` feature".to_string(),
            ))
        }
    }
}
