//! Chrome-backed pages over the DevTools protocol
//!
//! One browser process serves the whole run. Every page lives in its own
//! browser context, so nothing (storage, blob URLs, `window.demuxer` state)
//! leaks from one case into the next.

use anyhow::{anyhow, Context};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use demux_conformance_core::config::parse_flag;
use demux_conformance_core::{InPageRoutine, PageHandle, PageLauncher};
use futures::StreamExt;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How to start Chrome
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowserSettings {
    /// Explicit Chrome/Chromium binary; otherwise chromiumoxide searches the usual places
    pub chrome_path: Option<PathBuf>,
    pub headful: bool,
    pub no_sandbox: bool,
}

impl BrowserSettings {
    /// Reads `CHROME_PATH`, `DEMUX_HEADFUL` and `DEMUX_NO_SANDBOX`
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| -> anyhow::Result<bool> {
            match lookup(key) {
                Some(value) => parse_flag(&value)
                    .ok_or_else(|| anyhow!("{}={} is not a boolean", key, value)),
                None => Ok(false),
            }
        };

        Ok(Self {
            chrome_path: lookup("CHROME_PATH").filter(|p| !p.is_empty()).map(PathBuf::from),
            headful: flag("DEMUX_HEADFUL")?,
            no_sandbox: flag("DEMUX_NO_SANDBOX")?,
        })
    }

    fn to_config(&self) -> anyhow::Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder();
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if self.headful {
            builder = builder.with_head();
        }
        if self.no_sandbox {
            builder = builder.no_sandbox();
        }
        builder.build().map_err(anyhow::Error::msg)
    }
}

/// A running Chrome plus the task pumping its CDP connection
struct RunningChrome {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

impl RunningChrome {
    async fn launch(settings: &BrowserSettings) -> anyhow::Result<Self> {
        let (browser, mut handler) = Browser::launch(settings.to_config()?)
            .await
            .context("failed to launch Chrome")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {}", e);
                }
            }
        });

        info!("Chrome launched (headful: {})", settings.headful);
        Ok(Self {
            browser: Arc::new(browser),
            handler,
        })
    }

    async fn shutdown(self) -> anyhow::Result<()> {
        match Arc::try_unwrap(self.browser) {
            Ok(mut browser) => {
                browser.close().await.context("failed to close Chrome")?;
                browser.wait().await.context("Chrome did not exit")?;
            }
            Err(_) => warn!("Pages still open at shutdown; leaving Chrome to the handler"),
        }
        self.handler.abort();
        Ok(())
    }
}

/// Opens pages in a Chrome that is started on first use
///
/// Runs that execute no case (`--list`, filters matching nothing) never
/// start a browser. A failed launch is retried by the next case.
pub struct ChromeLauncher {
    settings: BrowserSettings,
    chrome: OnceCell<RunningChrome>,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            chrome: OnceCell::new(),
        }
    }

    pub fn is_started(&self) -> bool {
        self.chrome.initialized()
    }

    async fn browser(&self) -> anyhow::Result<&Arc<Browser>> {
        let running = self
            .chrome
            .get_or_try_init(|| RunningChrome::launch(&self.settings))
            .await?;
        Ok(&running.browser)
    }

    /// Closes the browser, if it was ever started
    pub async fn shutdown(self) -> anyhow::Result<()> {
        match self.chrome.into_inner() {
            Some(running) => running.shutdown().await,
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl PageLauncher for ChromeLauncher {
    async fn open_page(&self) -> anyhow::Result<Box<dyn PageHandle>> {
        let browser = self.browser().await?;
        let context = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("failed to create browser context")?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context.clone())
            .build()
            .map_err(anyhow::Error::msg)?;

        let mut handle = ChromePage {
            browser: Arc::clone(browser),
            page: None,
            context: Some(context),
        };
        match browser.new_page(target).await {
            Ok(page) => {
                handle.page = Some(page);
                Ok(Box::new(handle))
            }
            Err(e) => {
                if let Err(close) = handle.close().await {
                    warn!("Failed to dispose browser context: {:#}", close);
                }
                Err(anyhow::Error::new(e).context("failed to open page"))
            }
        }
    }
}

/// One page in its own browser context
pub struct ChromePage {
    browser: Arc<Browser>,
    page: Option<Page>,
    context: Option<BrowserContextId>,
}

impl ChromePage {
    fn page(&self) -> anyhow::Result<&Page> {
        self.page.as_ref().ok_or_else(|| anyhow!("page is closed"))
    }
}

#[async_trait::async_trait]
impl PageHandle for ChromePage {
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        self.page()?
            .goto(url)
            .await
            .with_context(|| format!("failed to load {}", url))?;
        Ok(())
    }

    async fn bind_file(&mut self, selector: &str, path: &Path) -> anyhow::Result<()> {
        let absolute = tokio::fs::canonicalize(path)
            .await
            .with_context(|| format!("cannot resolve {}", path.display()))?;
        let page = self.page()?;

        let input = page
            .find_element(selector)
            .await
            .with_context(|| format!("no element matches selector {}", selector))?;
        let params = SetFileInputFilesParams::builder()
            .file(absolute.to_string_lossy().into_owned())
            .backend_node_id(input.backend_node_id.clone())
            .build()
            .map_err(anyhow::Error::msg)?;
        page.execute(params)
            .await
            .with_context(|| format!("failed to bind {} to {}", absolute.display(), selector))?;
        Ok(())
    }

    async fn evaluate(&mut self, routine: &InPageRoutine) -> anyhow::Result<Value> {
        let params = EvaluateParams::builder()
            .expression(routine.to_script())
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(anyhow::Error::msg)?;

        let result = self
            .page()?
            .evaluate_expression(params)
            .await
            .context("in-page routine threw")?;
        Ok(result.into_value::<Value>()?)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        let closed = match self.page.take() {
            Some(page) => page.close().await.map_err(anyhow::Error::from),
            None => Ok(()),
        };
        // disposing the context also tears down a page that failed to close
        if let Some(context) = self.context.take() {
            self.browser
                .execute(DisposeBrowserContextParams::new(context))
                .await
                .context("failed to dispose browser context")?;
        }
        closed
    }
}
