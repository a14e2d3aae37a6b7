//! Chromium driver over the DevTools protocol.
//!
//! Elements are resolved inside the page with the JavaScript emitted by
//! [`Selector::to_query`], so CSS and XPath behave the same. Pointer clicks and key presses
//! go through the CDP `Input` domain so the page sees trusted events.

use crate::driver::UiDriver;
use crate::locator::Selector;
use crate::result::{QuoteflowError, QuoteflowResult};
use crate::settings::Settings;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Attribute used to hand an editing input back as a selector
const FIELD_MARKER: &str = "data-quoteflow-field";

/// Result of an element script
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ElementStatus {
    Ok,
    Missing,
    Hidden,
    Disabled,
}

#[derive(Debug, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

/// Browser session with one page
pub struct CdpDriver {
    browser: Mutex<Option<CdpBrowser>>,
    page: CdpPage,
    closed: AtomicBool,
    handle: tokio::task::JoinHandle<()>,
}

impl fmt::Debug for CdpDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpDriver")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CdpDriver {
    /// Launch Chromium and open a blank page
    ///
    /// # Errors
    ///
    /// Returns [`QuoteflowError::BrowserLaunch`] when the browser cannot be started.
    pub async fn launch(settings: &Settings) -> QuoteflowResult<Self> {
        let mut builder =
            CdpConfig::builder().window_size(settings.window_width, settings.window_height);

        if !settings.headless {
            builder = builder.with_head();
        }

        if let Some(ref path) = settings.chromium_path {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder.build().map_err(|e| QuoteflowError::BrowserLaunch {
            message: e.to_string(),
        })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| QuoteflowError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| QuoteflowError::BrowserLaunch {
                message: e.to_string(),
            })?;

        tracing::info!(
            headless = settings.headless,
            width = settings.window_width,
            height = settings.window_height,
            "browser launched"
        );

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            closed: AtomicBool::new(false),
            handle,
        })
    }

    fn ensure_open(&self) -> QuoteflowResult<()> {
        if self.closed.load(Ordering::SeqCst) || self.handle.is_finished() {
            return Err(QuoteflowError::SessionClosed {
                message: "browser connection is gone".to_string(),
            });
        }
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> QuoteflowResult<T> {
        self.ensure_open()?;
        let result = self.page.evaluate(script).await.map_err(cdp_error)?;
        decode(result.value())
    }

    /// Run `body` against the first match bound as `el`; `body` must return a value
    async fn with_element<T: DeserializeOwned>(
        &self,
        selector: &Selector,
        missing: &str,
        body: &str,
    ) -> QuoteflowResult<T> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) {{ return {missing}; }} {body} }})()",
            selector.to_query()
        );
        self.eval(script).await
    }

    /// Run an action script that reports an [`ElementStatus`]
    async fn act(&self, selector: &Selector, check: &str, body: &str) -> QuoteflowResult<()> {
        let script = format!("{VISIBLE_FN} {check} {body} return 'ok';");
        let status: ElementStatus = self.with_element(selector, "'missing'", &script).await?;
        match status {
            ElementStatus::Ok => Ok(()),
            ElementStatus::Missing => Err(QuoteflowError::not_found(selector)),
            ElementStatus::Hidden => Err(QuoteflowError::not_interactable(selector, "not visible")),
            ElementStatus::Disabled => Err(QuoteflowError::not_interactable(selector, "disabled")),
        }
    }

    async fn dispatch_mouse(&self, kind: DispatchMouseEventType, at: &Point) -> QuoteflowResult<()> {
        let mut builder = DispatchMouseEventParams::builder()
            .r#type(kind.clone())
            .x(at.x)
            .y(at.y);
        if !matches!(kind, DispatchMouseEventType::MouseMoved) {
            builder = builder.button(MouseButton::Left).click_count(1);
        }
        let params = builder.build().map_err(QuoteflowError::input)?;
        let _ = self.page.execute(params).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn dispatch_key(&self, params: DispatchKeyEventParams) -> QuoteflowResult<()> {
        let _ = self.page.execute(params).await.map_err(cdp_error)?;
        Ok(())
    }
}

/// Shared visibility test, defines `visible(el)`
const VISIBLE_FN: &str = "const visible = (e) => { const s = window.getComputedStyle(e); \
    const r = e.getBoundingClientRect(); return s.display !== 'none' && s.visibility !== 'hidden' \
    && r.width > 0 && r.height > 0; };";

/// Guard that rejects hidden or disabled elements
const INTERACTABLE_CHECK: &str = "if (!visible(el)) { return 'hidden'; } \
    if (el.disabled) { return 'disabled'; }";

/// Deserialize a script result. A script yielding `null` or `undefined` carries no value,
/// which is read as JSON `null` so that `Option` results come back as `None`.
fn decode<T: DeserializeOwned>(value: Option<&serde_json::Value>) -> QuoteflowResult<T> {
    let value = value.cloned().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value).map_err(|e| QuoteflowError::script(e.to_string()))
}

/// Map a CDP failure, telling a lost session from a failed command
fn cdp_error(err: CdpError) -> QuoteflowError {
    match err {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            QuoteflowError::SessionClosed {
                message: err.to_string(),
            }
        }
        other => {
            let message = other.to_string();
            if is_closed_message(&message) {
                QuoteflowError::SessionClosed { message }
            } else {
                QuoteflowError::script(message)
            }
        }
    }
}

fn is_closed_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["target closed", "session closed", "no target with given id", "browser has disconnected"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// JavaScript string literal for `value`
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl UiDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> QuoteflowResult<()> {
        self.ensure_open()?;
        tracing::debug!(url, "navigate");
        let _ = self.page.goto(url).await.map_err(|e| match cdp_error(e) {
            QuoteflowError::Script { message } => QuoteflowError::Navigation {
                url: url.to_string(),
                message,
            },
            other => other,
        })?;
        Ok(())
    }

    async fn reload(&self) -> QuoteflowResult<()> {
        self.ensure_open()?;
        let _ = self.page.reload().await.map_err(cdp_error)?;
        Ok(())
    }

    async fn is_present(&self, selector: &Selector) -> QuoteflowResult<bool> {
        self.with_element(selector, "false", "return true;").await
    }

    async fn is_visible(&self, selector: &Selector) -> QuoteflowResult<bool> {
        let body = format!("{VISIBLE_FN} return visible(el);");
        self.with_element(selector, "false", &body).await
    }

    async fn is_clickable(&self, selector: &Selector) -> QuoteflowResult<bool> {
        let body = format!("{VISIBLE_FN} return visible(el) && !el.disabled;");
        self.with_element(selector, "false", &body).await
    }

    async fn click(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.pointer_click(selector).await
    }

    async fn pointer_click(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.act(selector, INTERACTABLE_CHECK, "").await?;
        let body = "el.scrollIntoView({block: 'center', inline: 'center'}); \
            const r = el.getBoundingClientRect(); \
            return {x: r.left + r.width / 2, y: r.top + r.height / 2};";
        let point: Option<Point> = self.with_element(selector, "null", body).await?;
        let point = point.ok_or_else(|| QuoteflowError::not_found(selector))?;
        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, &point).await?;
        self.dispatch_mouse(DispatchMouseEventType::MousePressed, &point).await?;
        self.dispatch_mouse(DispatchMouseEventType::MouseReleased, &point).await
    }

    async fn force_click(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.act(selector, "", "el.click();").await
    }

    async fn scroll_into_view(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.act(selector, "", "el.scrollIntoView({block: 'center', inline: 'center'});")
            .await
    }

    async fn clear(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.act(
            selector,
            "",
            "el.value = ''; el.dispatchEvent(new Event('input', {bubbles: true}));",
        )
        .await
    }

    async fn type_text(&self, selector: &Selector, text: &str) -> QuoteflowResult<()> {
        self.act(selector, INTERACTABLE_CHECK, "el.focus();").await?;
        for ch in text.chars() {
            let params = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::Char)
                .text(ch.to_string())
                .build()
                .map_err(QuoteflowError::input)?;
            self.dispatch_key(params).await?;
        }
        Ok(())
    }

    async fn press_enter(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.act(selector, INTERACTABLE_CHECK, "el.focus();").await?;
        let down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyDown)
            .key("Enter")
            .code("Enter")
            .text("\r")
            .windows_virtual_key_code(13)
            .native_virtual_key_code(13)
            .build()
            .map_err(QuoteflowError::input)?;
        self.dispatch_key(down).await?;
        let up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13)
            .native_virtual_key_code(13)
            .build()
            .map_err(QuoteflowError::input)?;
        self.dispatch_key(up).await
    }

    async fn text(&self, selector: &Selector) -> QuoteflowResult<Option<String>> {
        self.with_element(selector, "null", "return el.textContent;")
            .await
    }

    async fn attribute(&self, selector: &Selector, name: &str) -> QuoteflowResult<Option<String>> {
        let body = format!("return el.getAttribute({});", js_string(name));
        self.with_element(selector, "null", &body).await
    }

    async fn attributes_of_all(
        &self,
        selector: &Selector,
        name: &str,
    ) -> QuoteflowResult<Vec<String>> {
        let script = format!(
            "{}.map((e) => e.getAttribute({})).filter((v) => v !== null)",
            selector.to_all_query(),
            js_string(name)
        );
        self.eval(script).await
    }

    async fn texts_of_all(&self, selector: &Selector) -> QuoteflowResult<Vec<String>> {
        let script = format!(
            "(() => {{ {VISIBLE_FN} return {}.filter(visible).map((e) => (e.textContent || '').trim()); }})()",
            selector.to_all_query()
        );
        self.eval(script).await
    }

    async fn editable_field(&self, row_id: &str) -> QuoteflowResult<Option<Selector>> {
        let script = format!(
            "(() => {{ {VISIBLE_FN} \
             document.querySelectorAll('[{FIELD_MARKER}]').forEach((e) => e.removeAttribute('{FIELD_MARKER}')); \
             const row = document.getElementById({row}); if (!row) {{ return false; }} \
             const active = document.activeElement; \
             let field = (active && row.contains(active) && 'value' in active) ? active : null; \
             if (!field) {{ field = Array.from(row.querySelectorAll('input:not([type=hidden]):not([type=checkbox]), textarea')).find(visible) || null; }} \
             if (!field) {{ return false; }} \
             field.setAttribute('{FIELD_MARKER}', '1'); return true; }})()",
            row = js_string(row_id),
        );
        let found: bool = self.eval(script).await?;
        Ok(found.then(|| Selector::css(format!("[{FIELD_MARKER}='1']"))))
    }

    async fn set_field_value(&self, selector: &Selector, value: &str) -> QuoteflowResult<()> {
        let body = format!(
            "el.focus(); el.value = {}; \
             el.dispatchEvent(new Event('input', {{bubbles: true}})); \
             el.dispatchEvent(new Event('change', {{bubbles: true}}));",
            js_string(value)
        );
        self.act(selector, "", &body).await
    }

    async fn screenshot(&self) -> QuoteflowResult<Vec<u8>> {
        self.ensure_open()?;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let screenshot = self
            .page
            .execute(params)
            .await
            .map_err(|e| QuoteflowError::Screenshot {
                message: e.to_string(),
            })?;

        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&screenshot.data)
            .map_err(|e| QuoteflowError::Screenshot {
                message: e.to_string(),
            })
    }

    async fn close(&self) -> QuoteflowResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            browser
                .close()
                .await
                .map_err(|e| QuoteflowError::SessionClosed {
                    message: e.to_string(),
                })?;
            let _ = browser.wait().await;
        }
        self.handle.abort();
        tracing::info!("browser closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("a\"b"), "\"a\\\"b\"");
        assert_eq!(js_string("row_1"), "\"row_1\"");
    }

    #[test]
    fn test_closed_messages() {
        assert!(is_closed_message("Target closed."));
        assert!(is_closed_message("No target with given id found"));
        assert!(!is_closed_message("ReferenceError: x is not defined"));
    }

    #[test]
    fn test_missing_value_decodes_as_none() {
        let text: Option<String> = decode(None).unwrap_or(Some("x".to_string()));
        assert_eq!(text, None);
        let null = serde_json::Value::Null;
        let attr: Option<String> = decode(Some(&null)).unwrap_or(Some("x".to_string()));
        assert_eq!(attr, None);
    }

    #[test]
    fn test_present_value_decodes() {
        let value = serde_json::json!("9801A1AA");
        let text: Option<String> = decode(Some(&value)).unwrap_or(None);
        assert_eq!(text.as_deref(), Some("9801A1AA"));
    }

    #[test]
    fn test_missing_value_is_an_error_for_plain_types() {
        assert!(decode::<bool>(None).is_err());
    }

    #[test]
    fn test_status_parses() {
        let status: ElementStatus = serde_json::from_str("\"hidden\"").unwrap_or(ElementStatus::Ok);
        assert!(matches!(status, ElementStatus::Hidden));
    }
}
