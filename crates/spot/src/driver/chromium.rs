//! Chromium backend over the Chrome `DevTools` Protocol.
//!
//! Element handles live in a page-side registry (`window.__spot`) that hands
//! out one id per DOM node and forgets nodes once they are detached; every
//! call is one script evaluation against the document of the current frame,
//! so frame switching needs no protocol-level session juggling. Only
//! same-origin frames are reachable this way.

use super::{ElementId, FrameLocator, WebDriver};
use crate::locator::By;
use crate::result::{SpotError, SpotResult};
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::cell::RefCell;

/// Browser launch configuration
#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
            viewport_width: 1280,
            viewport_height: 800,
        }
    }
}

impl ChromiumConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }
}

const PRELUDE: &str = r"
const reg = window.__spot || (window.__spot = { seq: 0, els: new Map(), ids: new WeakMap() });
for (const [id, el] of reg.els) {
  if (!el.isConnected) { reg.els.delete(id); reg.ids.delete(el); }
}
let doc = document;
for (const f of __FRAMES__) {
  const el = reg.els.get(f);
  if (!el || !el.contentDocument) { return { frame: f }; }
  doc = el.contentDocument;
}
const keep = (el) => {
  const known = reg.ids.get(el);
  if (known !== undefined && reg.els.get(known) === el) { return known; }
  const id = __SESSION__ + '-' + (++reg.seq);
  reg.els.set(id, el);
  reg.ids.set(el, id);
  return id;
};
const get = (id) => {
  const el = reg.els.get(id);
  return el && el.ownerDocument === doc ? el : null;
};
const shown = (el) => {
  const style = doc.defaultView.getComputedStyle(el);
  return style.visibility !== 'hidden' && style.display !== 'none'
    && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
};
";

/// Self-invoking script running `body` after the prelude
fn script(frames: &[String], session: &str, body: &str) -> SpotResult<String> {
    let prelude = PRELUDE
        .replace("__FRAMES__", &serde_json::to_string(frames)?)
        .replace("__SESSION__", &serde_json::to_string(session)?);
    Ok(format!("(() => {{ {prelude} {body} }})()"))
}

/// Real browser driven through chromiumoxide
#[derive(Debug)]
pub struct ChromiumDriver {
    runtime: tokio::runtime::Runtime,
    browser: RefCell<Browser>,
    page: Page,
    frames: RefCell<Vec<String>>,
    session: String,
    handle: tokio::task::JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch a browser and open a blank page
    pub fn launch(config: &ChromiumConfig) -> SpotResult<Self> {
        let runtime = tokio::runtime::Runtime::new()?;

        let mut builder = CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(SpotError::driver)?;

        let (browser, mut handler) = runtime
            .block_on(Browser::launch(cdp_config))
            .map_err(|e| SpotError::driver(format!("failed to launch browser: {e}")))?;

        // Spawn handler task
        let handle = runtime.spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = runtime
            .block_on(browser.new_page("about:blank"))
            .map_err(|e| SpotError::driver(format!("failed to open page: {e}")))?;

        tracing::info!(headless = config.headless, "chromium session started");
        Ok(Self {
            runtime,
            browser: RefCell::new(browser),
            page,
            frames: RefCell::new(Vec::new()),
            session: uuid::Uuid::new_v4().simple().to_string(),
            handle,
        })
    }

    /// Evaluate `body` with the prelude bound to the current frame document.
    ///
    /// Bodies return `{ ok }`, `{ stale }`, `{ frame }` or `{ error }`.
    fn call(&self, body: &str) -> SpotResult<Value> {
        let script = script(&self.frames.borrow(), &self.session, body)?;
        let result = self
            .runtime
            .block_on(self.page.evaluate(script.as_str()))
            .map_err(|e| SpotError::driver(e.to_string()))?;
        let value: Value = result
            .into_value()
            .map_err(|e| SpotError::driver(e.to_string()))?;
        if let Some(ok) = value.get("ok") {
            return Ok(ok.clone());
        }
        if let Some(id) = value.get("stale").and_then(Value::as_str) {
            return Err(SpotError::StaleElement { id: id.to_string() });
        }
        if let Some(frame) = value.get("frame").and_then(Value::as_str) {
            return Err(SpotError::FrameNotFound {
                frame: frame.to_string(),
                message: "frame was detached".to_string(),
            });
        }
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unexpected script result");
        Err(SpotError::driver(message))
    }

    fn call_on(&self, element: &ElementId, body: &str) -> SpotResult<Value> {
        let id = serde_json::to_string(element.as_str())?;
        self.call(&format!(
            "const el = get({id}); if (!el) {{ return {{ stale: {id} }}; }} {body}"
        ))
    }

    fn call_bool(&self, element: &ElementId, expr: &str) -> SpotResult<bool> {
        Ok(self
            .call_on(element, &format!("return {{ ok: !!({expr}) }};"))?
            .as_bool()
            .unwrap_or_default())
    }

    fn call_string(&self, element: &ElementId, expr: &str) -> SpotResult<String> {
        Ok(self
            .call_on(element, &format!("return {{ ok: String({expr}) }};"))?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

impl WebDriver for ChromiumDriver {
    fn navigate(&self, url: &str) -> SpotResult<()> {
        tracing::debug!(url, "navigate");
        self.runtime
            .block_on(self.page.goto(url))
            .map_err(|e| SpotError::driver(format!("navigation to {url} failed: {e}")))?;
        self.frames.borrow_mut().clear();
        Ok(())
    }

    fn current_url(&self) -> SpotResult<String> {
        self.runtime
            .block_on(self.page.url())
            .map(Option::unwrap_or_default)
            .map_err(|e| SpotError::driver(e.to_string()))
    }

    fn title(&self) -> SpotResult<String> {
        self.runtime
            .block_on(self.page.get_title())
            .map(Option::unwrap_or_default)
            .map_err(|e| SpotError::driver(e.to_string()))
    }

    fn find_elements(&self, scope: Option<&ElementId>, by: &By) -> SpotResult<Vec<ElementId>> {
        let scope = match scope {
            Some(element) => serde_json::to_string(element.as_str())?,
            None => "null".to_string(),
        };
        let value = serde_json::to_string(by.value())?;
        let css = serde_json::to_string(&by.to_css())?;
        let strategy = serde_json::to_string(by.strategy())?;
        let found = self.call(&format!(
            "const scope = {scope};
             const root = scope === null ? doc : get(scope);
             if (!root) {{ return {{ stale: scope }}; }}
             const strategy = {strategy}; const value = {value};
             let found = [];
             if (strategy === 'xpath') {{
               const r = doc.evaluate(value, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
               for (let i = 0; i < r.snapshotLength; i++) {{
                 const n = r.snapshotItem(i);
                 if (n.nodeType === 1) {{ found.push(n); }}
               }}
             }} else if (strategy === 'link text') {{
               found = Array.from(root.querySelectorAll('a')).filter(a => a.innerText.trim() === value);
             }} else if (strategy === 'partial link text') {{
               found = Array.from(root.querySelectorAll('a')).filter(a => a.innerText.includes(value));
             }} else {{
               try {{ found = Array.from(root.querySelectorAll({css})); }}
               catch (e) {{ return {{ error: 'invalid selector: ' + e.message }}; }}
             }}
             return {{ ok: found.map(keep) }};"
        ))?;
        Ok(found
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(ElementId::new)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn tag_name(&self, element: &ElementId) -> SpotResult<String> {
        self.call_string(element, "el.tagName.toLowerCase()")
    }

    fn text(&self, element: &ElementId) -> SpotResult<String> {
        self.call_string(element, "shown(el) ? (el.innerText || '').trim() : ''")
    }

    fn attribute(&self, element: &ElementId, name: &str) -> SpotResult<Option<String>> {
        let name = serde_json::to_string(name)?;
        let value = self.call_on(
            element,
            &format!(
                "const name = {name};
                 const prop = ['value', 'checked', 'selected'].includes(name) ? el[name] : undefined;
                 if (prop !== undefined && prop !== null && prop !== false) {{ return {{ ok: String(prop) }}; }}
                 return {{ ok: el.getAttribute(name) }};"
            ),
        )?;
        Ok(value.as_str().map(str::to_string))
    }

    fn is_displayed(&self, element: &ElementId) -> SpotResult<bool> {
        self.call_bool(element, "shown(el)")
    }

    fn is_enabled(&self, element: &ElementId) -> SpotResult<bool> {
        self.call_bool(element, "!el.disabled")
    }

    fn is_selected(&self, element: &ElementId) -> SpotResult<bool> {
        self.call_bool(element, "el.selected || el.checked")
    }

    fn click(&self, element: &ElementId) -> SpotResult<()> {
        let _ = self.call_on(
            element,
            "if (el.disabled) { return { ok: false }; }
             if (el.tagName === 'OPTION') {
               const select = el.closest('select');
               el.selected = select && select.multiple ? !el.selected : true;
               if (select) { select.dispatchEvent(new Event('change', { bubbles: true })); }
               return { ok: true };
             }
             if (!shown(el)) { return { error: 'element not interactable' }; }
             el.scrollIntoView({ block: 'center' });
             el.click();
             return { ok: true };",
        )?;
        Ok(())
    }

    fn send_keys(&self, element: &ElementId, text: &str) -> SpotResult<()> {
        let text = serde_json::to_string(text)?;
        let _ = self.call_on(
            element,
            &format!(
                "el.focus();
                 el.value = (el.value || '') + {text};
                 el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                 el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                 return {{ ok: true }};"
            ),
        )?;
        Ok(())
    }

    fn clear(&self, element: &ElementId) -> SpotResult<()> {
        let _ = self.call_on(
            element,
            "el.value = '';
             el.dispatchEvent(new Event('input', { bubbles: true }));
             el.dispatchEvent(new Event('change', { bubbles: true }));
             return { ok: true };",
        )?;
        Ok(())
    }

    fn switch_to_default(&self) -> SpotResult<()> {
        self.frames.borrow_mut().clear();
        Ok(())
    }

    fn switch_to_frame(&self, frame: &FrameLocator) -> SpotResult<()> {
        let body = match frame {
            FrameLocator::Index(index) => format!(
                "const f = Array.from(doc.querySelectorAll('iframe, frame'))[{index}];
                 return f ? {{ ok: keep(f) }} : {{ error: 'no frame at index {index}' }};"
            ),
            FrameLocator::Name(name) => {
                let name = serde_json::to_string(name)?;
                format!(
                    "const f = Array.from(doc.querySelectorAll('iframe, frame'))
                       .find(f => f.name === {name} || f.id === {name});
                     return f ? {{ ok: keep(f) }} : {{ error: 'no frame named ' + {name} }};"
                )
            }
            FrameLocator::Element(element) => {
                let id = serde_json::to_string(element.as_str())?;
                format!(
                    "const f = get({id});
                     if (!f) {{ return {{ stale: {id} }}; }}
                     return f.contentDocument ? {{ ok: {id} }} : {{ error: 'not a frame' }};"
                )
            }
        };
        let id = self.call(&body).map_err(|e| match e {
            SpotError::Driver { message } => SpotError::FrameNotFound {
                frame: frame.to_string(),
                message,
            },
            other => other,
        })?;
        let Some(id) = id.as_str() else {
            return Err(SpotError::driver("frame handle missing"));
        };
        self.frames.borrow_mut().push(id.to_string());
        Ok(())
    }

    fn switch_to_parent_frame(&self) -> SpotResult<()> {
        let _ = self.frames.borrow_mut().pop();
        Ok(())
    }

    fn quit(&self) -> SpotResult<()> {
        let mut browser = self.browser.borrow_mut();
        let result = self.runtime.block_on(browser.close());
        self.handle.abort();
        result
            .map(|_| ())
            .map_err(|e| SpotError::driver(format!("failed to close browser: {e}")))
    }
}
