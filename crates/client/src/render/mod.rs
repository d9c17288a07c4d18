//! Headless browser screenshots.
//!
//! Browsers are launched lazily and kept in a [`ResourcePool`] so that at most
//! `pool_size` Chrome/Chromium processes run at once. A browser that fails a
//! capture is discarded instead of being returned to the pool.

use async_trait::async_trait;
use bytes::Bytes;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use linkdigest_core::config::ScreenshotConfig;
use linkdigest_core::{Error, ResourcePool, ScreenshotFormat, Screenshotter};

/// A launched browser plus the task driving its DevTools connection.
struct PooledBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl PooledBrowser {
    async fn launch(width: u32, height: u32) -> Result<Self, Error> {
        let config = BrowserConfig::builder()
            .window_size(width, height)
            .no_sandbox()
            .build()
            .map_err(|e| Error::ScreenshotFailed(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::ScreenshotFailed(format!("browser launch failed: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        tracing::debug!(width, height, "launched headless browser");
        Ok(Self { browser, handler })
    }
}

impl Drop for PooledBrowser {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// [`Screenshotter`] backed by pooled headless Chrome/Chromium instances.
pub struct HeadlessScreenshotter {
    pool: ResourcePool<PooledBrowser>,
    config: ScreenshotConfig,
}

impl HeadlessScreenshotter {
    /// No browser is started until the first capture.
    pub fn new(config: ScreenshotConfig) -> Self {
        let pool = ResourcePool::new(config.pool_size, config.idle_timeout());
        Self { pool, config }
    }

    fn params(&self) -> ScreenshotParams {
        let builder = ScreenshotParams::builder().full_page(self.config.full_page);
        match self.config.format {
            ScreenshotFormat::Png => builder.format(CaptureScreenshotFormat::Png).build(),
            ScreenshotFormat::Jpeg => builder
                .format(CaptureScreenshotFormat::Jpeg)
                .quality(i64::from(self.config.quality))
                .build(),
        }
    }

    async fn capture_with(&self, browser: &Browser, url: &str) -> Result<Vec<u8>, Error> {
        let page = browser
            .new_page(url)
            .await
            .map_err(|e| Error::ScreenshotFailed(format!("navigation failed: {e}")))?;

        tokio::time::sleep(self.config.wait()).await;

        let image = page
            .screenshot(self.params())
            .await
            .map_err(|e| Error::ScreenshotFailed(format!("capture failed: {e}")));

        page.close().await.ok();
        image
    }

    /// Stop launching browsers and drop the idle ones.
    pub fn shutdown(&self) {
        self.pool.close();
    }
}

#[async_trait]
impl Screenshotter for HeadlessScreenshotter {
    async fn capture(&self, url: &str) -> Result<Bytes, Error> {
        let (width, height) = (self.config.width, self.config.height);
        let lease = self.pool.acquire(|| PooledBrowser::launch(width, height)).await?;

        match self.capture_with(&lease.browser, url).await {
            Ok(image) => {
                tracing::debug!(url, bytes = image.len(), "captured screenshot");
                Ok(Bytes::from(image))
            }
            Err(e) => {
                lease.discard();
                Err(e)
            }
        }
    }

    fn mime_type(&self) -> &'static str {
        self.config.format.mime_type()
    }
}
