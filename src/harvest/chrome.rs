//! Chrome-backed browsing session
//!
//! Launches Chrome over the DevTools protocol, installs the auth cookie,
//! and listens to network events so pagination responses can be read back
//! as they finish loading.
//!
//! Bodies are read on a background task and queued, so the harvest loop can
//! abandon a wait at any point without dropping a page.

use crate::config::BrowserConfig;
use crate::harvest::request::{AUTH_COOKIE_DOMAIN, AUTH_COOKIE_NAME};
use crate::harvest::session::{
    is_pagination_url, BrowserSession, InterceptedResponse, SessionError, SessionResult,
};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, CookieSameSite, EnableParams, EventLoadingFinished, EventResponseReceived,
    GetResponseBodyParams, RequestId,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Handler, Page};
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How long to wait for a matched response to finish loading
const LOADING_FINISHED_TIMEOUT: Duration = Duration::from_secs(10);

/// Responses read ahead of the harvest loop
const RESPONSE_QUEUE_SIZE: usize = 64;

/// Finished request ids remembered while waiting for a different one
const FINISHED_BACKLOG: usize = 1024;

const SCROLL_DOWN_JS: &str = r#"
(() => {
    window.scrollTo({ top: document.body.scrollHeight, behavior: "smooth" });
    const selectors = [
        "a div[data-testid='tweetPhoto']",
        "a div[aria-label='Image']",
        "div[data-testid='tweetPhoto']",
    ];
    for (const selector of selectors) {
        document.querySelectorAll(selector).forEach((node) => node.remove());
    }
    return true;
})()
"#;

const SCROLL_UP_JS: &str = r#"
(() => {
    window.scrollTo({ top: 0, behavior: "smooth" });
    return true;
})()
"#;

const NO_RESULTS_JS: &str = r#"
(() => {
    const body = document.body ? document.body.innerText : "";
    return body.includes("No results for");
})()
"#;

const CLICK_RETRY_JS: &str = r#"
(() => {
    const candidates = Array.from(document.querySelectorAll("[role='button'], button"));
    const retry = candidates.find((node) => node.innerText && node.innerText.trim() === "Retry");
    if (!retry) {
        return false;
    }
    retry.click();
    return true;
})()
"#;

/// A live Chrome tab carrying the auth cookie
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    reader_task: JoinHandle<()>,
    responses: mpsc::Receiver<InterceptedResponse>,
    navigation_timeout: Duration,
    closed: bool,
}

impl ChromeSession {
    /// Launches Chrome and prepares an authenticated blank tab
    ///
    /// # Arguments
    ///
    /// * `token` - Auth token installed as a secure, http-only cookie
    /// * `config` - Window, visibility and navigation settings
    ///
    /// # Returns
    ///
    /// * `Ok(ChromeSession)` - Browser is running with network events enabled
    /// * `Err(SessionError)` - Launch, cookie or listener setup failed
    pub async fn open(token: &str, config: &BrowserConfig) -> SessionResult<Self> {
        let navigation_timeout = Duration::from_secs(config.navigation_timeout_secs);

        let mut builder = ChromeConfig::builder()
            .window_size(config.window_width, config.window_height)
            .request_timeout(navigation_timeout);
        if !config.headless {
            builder = builder.with_head();
        }
        let chrome_config = builder.build().map_err(SessionError::Launch)?;

        let (browser, handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;
        let handler_task = spawn_handler_task(handler);

        let page = browser.new_page("about:blank").await.map_err(protocol)?;
        page.execute(EnableParams::default())
            .await
            .map_err(protocol)?;

        let cookie = CookieParam::builder()
            .name(AUTH_COOKIE_NAME)
            .value(token)
            .domain(AUTH_COOKIE_DOMAIN)
            .path("/")
            .secure(true)
            .http_only(true)
            .same_site(CookieSameSite::Strict)
            .build()
            .map_err(SessionError::Launch)?;
        page.set_cookie(cookie).await.map_err(protocol)?;

        let received = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(protocol)?;
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(protocol)?;

        let (queue, responses) = mpsc::channel(RESPONSE_QUEUE_SIZE);
        let reader = BodyReader {
            page: page.clone(),
            finished,
            seen_finished: HashSet::new(),
        };
        let reader_task = tokio::spawn(forward_responses(received, reader, queue));

        tracing::debug!(
            "Browser launched ({}x{}, headless: {})",
            config.window_width,
            config.window_height,
            config.headless
        );

        Ok(Self {
            browser,
            page,
            handler_task,
            reader_task,
            responses,
            navigation_timeout,
            closed: false,
        })
    }

    async fn evaluate_bool(&self, script: &str) -> SessionResult<bool> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(result.into_value::<bool>().unwrap_or(false))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> SessionResult<()> {
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(SessionError::NavigationTimeout {
                url: url.to_string(),
            }),
        }
    }

    async fn current_url(&mut self) -> SessionResult<String> {
        Ok(self.page.url().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn scroll_down(&mut self) -> SessionResult<()> {
        self.evaluate_bool(SCROLL_DOWN_JS).await.map(|_| ())
    }

    async fn scroll_up(&mut self) -> SessionResult<()> {
        self.evaluate_bool(SCROLL_UP_JS).await.map(|_| ())
    }

    async fn next_response(&mut self) -> SessionResult<InterceptedResponse> {
        self.responses.recv().await.ok_or(SessionError::Closed)
    }

    async fn has_no_results_marker(&mut self) -> SessionResult<bool> {
        self.evaluate_bool(NO_RESULTS_JS).await
    }

    async fn click_retry(&mut self) -> SessionResult<()> {
        if !self.evaluate_bool(CLICK_RETRY_JS).await? {
            return Err(SessionError::Script("no Retry button on page".to_string()));
        }
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> SessionResult<()> {
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .map_err(|e| SessionError::Screenshot(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) -> SessionResult<()> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.closed = true;

        let result = self.browser.close().await.map_err(protocol);
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("Browser process did not exit cleanly: {}", e);
        }
        self.reader_task.abort();
        self.handler_task.abort();
        result.map(|_| ())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.handler_task.abort();
    }
}

/// Turns one network event into a response, if it carries a readable page
#[async_trait]
trait ResponseReader: Send {
    type Event: Send;

    async fn read(&mut self, event: Self::Event) -> Option<InterceptedResponse>;
}

/// Reads events in arrival order and queues every readable response
///
/// Stops when the events end or the receiving side is gone.
async fn forward_responses<E, R>(
    mut events: E,
    mut reader: R,
    queue: mpsc::Sender<InterceptedResponse>,
) where
    E: Stream<Item = R::Event> + Unpin,
    R: ResponseReader,
{
    while let Some(event) = events.next().await {
        let Some(response) = reader.read(event).await else {
            continue;
        };
        if queue.send(response).await.is_err() {
            break;
        }
    }
}

/// Reads pagination bodies from the page once they finish loading
struct BodyReader {
    page: Page,
    finished: EventStream<EventLoadingFinished>,
    seen_finished: HashSet<RequestId>,
}

impl BodyReader {
    async fn wait_for_loading_finished(&mut self, request_id: &RequestId) {
        if self.seen_finished.remove(request_id) {
            return;
        }

        let finished = &mut self.finished;
        let seen = &mut self.seen_finished;
        let wait = async {
            while let Some(event) = finished.next().await {
                if event.request_id == *request_id {
                    break;
                }
                if seen.len() >= FINISHED_BACKLOG {
                    seen.clear();
                }
                seen.insert(event.request_id.clone());
            }
        };
        if tokio::time::timeout(LOADING_FINISHED_TIMEOUT, wait)
            .await
            .is_err()
        {
            tracing::debug!("Response {:?} did not report loading finished", request_id);
        }
    }
}

/// Fetches a finished response body, decoding base64 transfers
async fn read_body(page: &Page, request_id: RequestId, url: &str) -> SessionResult<String> {
    let response = page
        .execute(GetResponseBodyParams::new(request_id))
        .await
        .map_err(|e| SessionError::ResponseBody {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    if !response.result.base64_encoded {
        return Ok(response.result.body.clone());
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&response.result.body)
        .map_err(|e| SessionError::ResponseBody {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[async_trait]
impl ResponseReader for BodyReader {
    type Event = Arc<EventResponseReceived>;

    async fn read(&mut self, event: Self::Event) -> Option<InterceptedResponse> {
        let url = event.response.url.clone();
        if !is_pagination_url(&url) {
            return None;
        }

        self.wait_for_loading_finished(&event.request_id).await;

        match read_body(&self.page, event.request_id.clone(), &url).await {
            Ok(body) => Some(InterceptedResponse {
                url,
                status: u16::try_from(event.response.status).unwrap_or_default(),
                body,
            }),
            // Bodies evicted before they could be read are skipped
            Err(e) => {
                tracing::debug!("{}", e);
                None
            }
        }
    }
}

/// Drives the DevTools connection until the browser goes away
fn spawn_handler_task(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!("Browser handler event error: {}", e);
            }
        }
    })
}

fn protocol(error: CdpError) -> SessionError {
    SessionError::Protocol(error.to_string())
}
