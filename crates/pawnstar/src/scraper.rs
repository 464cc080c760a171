//! Move-list scraping over the W3C WebDriver wire protocol.
//!
//! Talks to a running driver (chromedriver by default) with plain HTTP. The
//! page is queried with an ordered list of CSS selectors; the first one that
//! yields move tokens wins.

use std::future::Future;
use std::time::Duration;

use chess_core::notation::{extract_san_moves, tokenize_move_text};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DriverSettings;
use crate::error::AssistantError;

/// Selectors for individual move elements, most specific first
pub const MOVE_SELECTORS: [&str; 8] = [
    "div.move-list-component .move",
    "ol.moves li",
    ".moves .move",
    "[class*='move-list'] [class*='move']",
    ".vertical-move-list .move",
    "wc-vertical-move-list .move",
    "[data-cy='move']",
    ".move-list .move",
];

/// Whole move-list containers, mined for SAN when no element selector hits
pub const CONTAINER_SELECTORS: [&str; 4] = [
    "div[class*='move-list']",
    "div[class*='moves']",
    ".vertical-move-list",
    "wc-vertical-move-list",
];

const BOARD_SELECTORS: [&str; 3] = [".board-layout-board", ".board", "[class*='board']"];

/// W3C web element identifier key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_EMPTY_WARNINGS: u32 = 3;

const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    /// The driver answered badly or not at all; worth retrying
    #[error("Scrape failed: {0}")]
    Transient(String),

    /// The browser session is gone for good
    #[error("Browser session lost: {0}")]
    SessionLost(String),
}

/// Source of the current move list.
pub trait MoveSource: Send {
    /// Current move tokens in play order. `Ok(vec![])` means nothing was
    /// found, which is not an error.
    fn scrape(&mut self) -> impl Future<Output = Result<Vec<String>, ScrapeError>> + Send;

    /// Release the underlying page or browser.
    fn close(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

#[derive(Deserialize)]
struct WireResponse {
    value: Value,
}

#[derive(Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Serialize)]
struct FindElements<'a> {
    using: &'static str,
    value: &'a str,
}

#[derive(Serialize)]
struct NavigateTo<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct ExecuteScript<'a> {
    script: &'a str,
    args: Vec<Value>,
}

/// WebDriver-backed [`MoveSource`]
pub struct WebDriverScraper {
    client: Client,
    base_url: String,
    session_id: Option<String>,
    last_scraped: Vec<String>,
    empty_warnings: u32,
}

impl WebDriverScraper {
    /// Start a browser session on the configured driver.
    pub async fn connect(settings: &DriverSettings) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .user_agent("PawnStar/1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AssistantError::Driver(format!("HTTP client error: {e}")))?;

        let mut scraper = Self {
            client,
            base_url: settings.webdriver_url.trim_end_matches('/').to_string(),
            session_id: None,
            last_scraped: Vec::new(),
            empty_warnings: 0,
        };

        let value = scraper
            .command(
                Method::POST,
                "/session",
                Some(json!({ "capabilities": capabilities(settings.headless) })),
            )
            .await
            .map_err(|e| AssistantError::Driver(format!("Failed to start Chrome driver: {e}")))?;
        let session: NewSession = serde_json::from_value(value)?;
        info!(session_id = %session.session_id, "Browser session started");
        scraper.session_id = Some(session.session_id);

        if let Err(e) = scraper.execute(HIDE_WEBDRIVER).await {
            warn!(error = %e, "Could not hide webdriver flag");
        }

        Ok(scraper)
    }

    /// Navigate to `url` and wait until a board element shows up.
    pub async fn open(&mut self, url: &str) -> Result<(), AssistantError> {
        let path = self.session_path("/url")?;
        let body = serde_json::to_value(NavigateTo { url })?;
        self.command(Method::POST, &path, Some(body))
            .await
            .map_err(|e| AssistantError::Driver(format!("Failed to load {url}: {e}")))?;

        let deadline = tokio::time::Instant::now() + PAGE_LOAD_TIMEOUT;
        loop {
            for selector in BOARD_SELECTORS {
                if let Ok(found) = self.find_elements(selector).await {
                    if !found.is_empty() {
                        info!(url, selector, "Board found");
                        return Ok(());
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AssistantError::Driver(format!(
                    "No board found on {url} after {PAGE_LOAD_TIMEOUT:?}"
                )));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    fn session_path(&self, suffix: &str) -> Result<String, ScrapeError> {
        self.session_id
            .as_deref()
            .map(|id| format!("/session/{id}{suffix}"))
            .ok_or_else(|| ScrapeError::SessionLost("no browser session".into()))
    }

    /// Issue one WebDriver command and return its `value`.
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ScrapeError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = resp.status();
        let data: WireResponse = resp
            .json()
            .await
            .map_err(|e| ScrapeError::Transient(format!("HTTP {status}: {e}")))?;

        into_result(data.value)
    }

    async fn execute(&self, script: &str) -> Result<Value, ScrapeError> {
        let path = self.session_path("/execute/sync")?;
        let body = serde_json::to_value(ExecuteScript {
            script,
            args: Vec::new(),
        })
        .map_err(|e| ScrapeError::Transient(e.to_string()))?;
        self.command(Method::POST, &path, Some(body)).await
    }

    async fn find_elements(&self, css: &str) -> Result<Vec<String>, ScrapeError> {
        let path = self.session_path("/elements")?;
        let body = serde_json::to_value(FindElements {
            using: "css selector",
            value: css,
        })
        .map_err(|e| ScrapeError::Transient(e.to_string()))?;
        let value = self.command(Method::POST, &path, Some(body)).await?;
        Ok(element_ids(&value))
    }

    async fn element_text(&self, element_id: &str) -> Result<String, ScrapeError> {
        let path = self.session_path(&format!("/element/{element_id}/text"))?;
        let value = self.command(Method::GET, &path, None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Tokens from every element matching one move selector.
    async fn selector_moves(&self, selector: &str) -> Result<Vec<String>, ScrapeError> {
        let mut moves = Vec::new();
        for id in self.find_elements(selector).await? {
            let text = self.element_text(&id).await?;
            moves.extend(tokenize_move_text(&text));
        }
        Ok(moves)
    }

    /// SAN moves mined from the first matching container's text.
    async fn container_moves(&self, selector: &str) -> Result<Vec<String>, ScrapeError> {
        let ids = self.find_elements(selector).await?;
        let Some(id) = ids.first() else {
            return Ok(Vec::new());
        };
        let text = self.element_text(id).await?;
        Ok(extract_san_moves(&text))
    }

    /// Log a result only when it differs from the previous one.
    fn note_found(&mut self, moves: &[String], selector: &str) {
        if self.last_scraped.as_slice() == moves {
            return;
        }
        let tail = &moves[moves.len().saturating_sub(4)..];
        info!(count = moves.len(), selector, last = %tail.join(" "), "Found moves");
        self.last_scraped = moves.to_vec();
    }
}

impl MoveSource for WebDriverScraper {
    async fn scrape(&mut self) -> Result<Vec<String>, ScrapeError> {
        let mut queried = false;
        let mut last_error = None;

        for selector in MOVE_SELECTORS {
            match self.selector_moves(selector).await {
                Ok(moves) if !moves.is_empty() => {
                    self.note_found(&moves, selector);
                    return Ok(moves);
                }
                Ok(_) => queried = true,
                Err(e @ ScrapeError::SessionLost(_)) => return Err(e),
                Err(e) => {
                    debug!(selector, error = %e, "Selector failed");
                    last_error = Some(e);
                }
            }
        }

        for selector in CONTAINER_SELECTORS {
            match self.container_moves(selector).await {
                Ok(moves) if !moves.is_empty() => {
                    self.note_found(&moves, selector);
                    return Ok(moves);
                }
                Ok(_) => queried = true,
                Err(e @ ScrapeError::SessionLost(_)) => return Err(e),
                Err(e) => {
                    debug!(selector, error = %e, "Container selector failed");
                    last_error = Some(e);
                }
            }
        }

        if !queried {
            return Err(last_error
                .unwrap_or_else(|| ScrapeError::Transient("no selector could be queried".into())));
        }

        if self.empty_warnings < MAX_EMPTY_WARNINGS {
            warn!("No moves found in move list");
            self.empty_warnings += 1;
        }
        Ok(Vec::new())
    }

    async fn close(&mut self) {
        let Some(session_id) = self.session_id.take() else {
            return;
        };
        let path = format!("/session/{session_id}");
        match self.command(Method::DELETE, &path, None).await {
            Ok(_) => info!(%session_id, "Browser session closed"),
            Err(e) => warn!(%session_id, error = %e, "Failed to close browser session"),
        }
    }
}

/// Chrome capabilities that keep the automation banner and flag out of sight.
pub fn capabilities(headless: bool) -> Value {
    let mut args = vec![
        "--disable-dev-shm-usage",
        "--no-sandbox",
        "--disable-blink-features=AutomationControlled",
    ];
    if headless {
        args.extend(["--headless=new", "--disable-gpu"]);
    }

    json!({
        "alwaysMatch": {
            "browserName": "chrome",
            "goog:chromeOptions": {
                "args": args,
                "excludeSwitches": ["enable-automation"],
                "useAutomationExtension": false,
            }
        }
    })
}

/// Split a command's `value` into success or a classified error.
fn into_result(value: Value) -> Result<Value, ScrapeError> {
    match serde_json::from_value::<WireError>(value.clone()) {
        Ok(err) => Err(classify_error(&err.error, &err.message)),
        Err(_) => Ok(value),
    }
}

pub fn classify_error(code: &str, message: &str) -> ScrapeError {
    match code {
        "invalid session id" | "no such window" | "session not created" => {
            ScrapeError::SessionLost(format!("{code}: {message}"))
        }
        _ => ScrapeError::Transient(format!("{code}: {message}")),
    }
}

fn classify_transport(e: &reqwest::Error) -> ScrapeError {
    if e.is_connect() {
        ScrapeError::SessionLost(format!("WebDriver unreachable: {e}"))
    } else {
        ScrapeError::Transient(format!("WebDriver request failed: {e}"))
    }
}

/// Element ids from a find-elements response.
fn element_ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|elements| {
            elements
                .iter()
                .filter_map(|el| el.get(ELEMENT_KEY)?.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
