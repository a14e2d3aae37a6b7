//! UiDriver - abstract UI automation trait
//!
//! The workflow only talks to the configurator through [`UiDriver`]. The Chromium
//! implementation lives in `cdp` (feature `browser`); [`MockDriver`] is an in-memory page
//! used by the tests.
//!
//! Every method takes `&self`: the session is the single shared resource and all calls are
//! issued sequentially by one orchestrator, so implementations only need interior
//! mutability, not locking discipline.

use crate::locator::Selector;
use crate::result::{QuoteflowError, QuoteflowResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Abstract driver trait for the configurator UI
///
/// # Implementations
///
/// - `CdpDriver` - Chromium over CDP, uses chromiumoxide (feature `browser`)
/// - [`MockDriver`] - For unit and workflow tests
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Navigate to URL
    async fn navigate(&self, url: &str) -> QuoteflowResult<()>;

    /// Reload the current page
    async fn reload(&self) -> QuoteflowResult<()>;

    /// Whether any element matches
    async fn is_present(&self, selector: &Selector) -> QuoteflowResult<bool>;

    /// Whether the first match is rendered and visible
    async fn is_visible(&self, selector: &Selector) -> QuoteflowResult<bool>;

    /// Whether the first match is visible and enabled
    async fn is_clickable(&self, selector: &Selector) -> QuoteflowResult<bool>;

    /// Native click on the first match
    async fn click(&self, selector: &Selector) -> QuoteflowResult<()>;

    /// Move the pointer onto the element's center, then press and release
    async fn pointer_click(&self, selector: &Selector) -> QuoteflowResult<()>;

    /// Script-level `element.click()`, bypasses overlays and hit testing
    async fn force_click(&self, selector: &Selector) -> QuoteflowResult<()>;

    /// Scroll the element to the middle of the viewport
    async fn scroll_into_view(&self, selector: &Selector) -> QuoteflowResult<()>;

    /// Clear an input
    async fn clear(&self, selector: &Selector) -> QuoteflowResult<()>;

    /// Type text into an input
    async fn type_text(&self, selector: &Selector, text: &str) -> QuoteflowResult<()>;

    /// Send the Enter key to the element
    async fn press_enter(&self, selector: &Selector) -> QuoteflowResult<()>;

    /// Text content of the first match
    async fn text(&self, selector: &Selector) -> QuoteflowResult<Option<String>>;

    /// Attribute of the first match
    async fn attribute(&self, selector: &Selector, name: &str) -> QuoteflowResult<Option<String>>;

    /// Attribute of every match, skipping elements without it
    async fn attributes_of_all(&self, selector: &Selector, name: &str)
        -> QuoteflowResult<Vec<String>>;

    /// Trimmed text of every visible match
    async fn texts_of_all(&self, selector: &Selector) -> QuoteflowResult<Vec<String>>;

    /// Text input exposed by the editing context of the row with id `row_id`, if any
    async fn editable_field(&self, row_id: &str) -> QuoteflowResult<Option<Selector>>;

    /// Set an input's value directly and raise its `input` and `change` events
    async fn set_field_value(&self, selector: &Selector, value: &str) -> QuoteflowResult<()>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> QuoteflowResult<Vec<u8>>;

    /// Close the session
    async fn close(&self) -> QuoteflowResult<()>;
}

// ============================================================================
// Mock driver
// ============================================================================

/// A mock DOM element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Rendered and visible
    pub visible: bool,
    /// Accepts interaction
    pub enabled: bool,
    /// Text content
    pub text: String,
    /// Input value
    pub value: String,
    /// Attributes
    pub attributes: HashMap<String, String>,
}

impl Default for MockElement {
    fn default() -> Self {
        Self {
            visible: true,
            enabled: true,
            text: String::new(),
            value: String::new(),
            attributes: HashMap::new(),
        }
    }
}

impl MockElement {
    /// Visible, enabled element with no content
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Mark as not visible
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark as disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Append a class to the `class` attribute
    pub fn add_class(&mut self, class: &str) {
        let entry = self.attributes.entry("class".to_string()).or_default();
        if !entry.split_whitespace().any(|c| c == class) {
            if !entry.is_empty() {
                entry.push(' ');
            }
            entry.push_str(class);
        }
    }
}

/// Interaction kinds recorded and scriptable on [`MockDriver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockAction {
    /// Any click; hooks registered with this fire for all three click kinds
    Click,
    /// Pointer move and click
    PointerClick,
    /// Script-level click
    ForceClick,
    /// Scroll into view
    Scroll,
    /// Clear input
    Clear,
    /// Type text
    Type,
    /// Enter key
    Enter,
    /// Direct value assignment
    SetValue,
    /// Navigation (selector key is the URL)
    Navigate,
    /// Page reload (selector key is empty)
    Reload,
}

impl MockAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::PointerClick => "pointer_click",
            Self::ForceClick => "force_click",
            Self::Scroll => "scroll",
            Self::Clear => "clear",
            Self::Type => "type",
            Self::Enter => "enter",
            Self::SetValue => "set_value",
            Self::Navigate => "navigate",
            Self::Reload => "reload",
        }
    }

    const fn is_click(self) -> bool {
        matches!(self, Self::Click | Self::PointerClick | Self::ForceClick)
    }

    fn covers(self, other: Self) -> bool {
        self == other || (self == Self::Click && other.is_click())
    }
}

impl fmt::Display for MockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interaction passed to hooks
#[derive(Debug, Clone)]
pub struct MockEvent {
    /// What happened
    pub action: MockAction,
    /// Selector key (selector display form, URL for navigation)
    pub target: String,
    /// Typed or assigned text
    pub value: Option<String>,
}

/// Page state a hook may reshape
#[derive(Debug, Default)]
pub struct MockPage {
    elements: HashMap<String, Vec<MockElement>>,
    editable_fields: HashMap<String, Selector>,
    url: String,
}

impl MockPage {
    /// Replace all matches of `selector` with one element
    pub fn insert(&mut self, selector: &Selector, element: MockElement) {
        let _ = self
            .elements
            .insert(selector.to_string(), vec![element]);
    }

    /// Add another match for `selector`
    pub fn push(&mut self, selector: &Selector, element: MockElement) {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .push(element);
    }

    /// Remove all matches of `selector`
    pub fn remove(&mut self, selector: &Selector) {
        let _ = self.elements.remove(&selector.to_string());
    }

    /// First match of `selector`
    #[must_use]
    pub fn element(&self, selector: &Selector) -> Option<&MockElement> {
        self.elements
            .get(&selector.to_string())
            .and_then(|v| v.first())
    }

    /// First match of `selector`, mutable
    pub fn element_mut(&mut self, selector: &Selector) -> Option<&mut MockElement> {
        self.elements
            .get_mut(&selector.to_string())
            .and_then(|v| v.first_mut())
    }

    /// Add a class to the first match, if present
    pub fn add_class(&mut self, selector: &Selector, class: &str) {
        if let Some(element) = self.element_mut(selector) {
            element.add_class(class);
        }
    }

    /// Declare the text input that row `row_id` exposes while editing
    pub fn set_editable_field(&mut self, row_id: &str, field: Selector) {
        let _ = self.editable_fields.insert(row_id.to_string(), field);
    }

    /// Current URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn all(&self, selector: &Selector) -> &[MockElement] {
        self.elements
            .get(&selector.to_string())
            .map_or(&[], Vec::as_slice)
    }
}

type MockHook = Box<dyn FnMut(&mut MockPage, &MockEvent) + Send>;

struct MockState {
    page: MockPage,
    hooks: Vec<(MockAction, String, MockHook)>,
    failures: Vec<(MockAction, String, u32)>,
    history: Vec<String>,
    screenshot: Vec<u8>,
    closed: bool,
}

impl MockState {
    fn check_open(&self) -> QuoteflowResult<()> {
        if self.closed {
            return Err(QuoteflowError::SessionClosed {
                message: "mock session closed".to_string(),
            });
        }
        Ok(())
    }

    /// Record the call and consume a scripted failure, if one matches
    fn record(&mut self, action: MockAction, target: &str) -> QuoteflowResult<()> {
        self.check_open()?;
        self.history.push(format!("{action}:{target}"));
        if let Some(slot) = self
            .failures
            .iter_mut()
            .find(|(a, t, left)| a.covers(action) && t == target && *left > 0)
        {
            slot.2 -= 1;
            return Err(QuoteflowError::not_interactable(
                target,
                format!("scripted {action} failure"),
            ));
        }
        Ok(())
    }

    fn fire(&mut self, event: &MockEvent) {
        let Self { page, hooks, .. } = self;
        for (action, target, hook) in hooks.iter_mut() {
            if action.covers(event.action) && *target == event.target {
                hook(page, event);
            }
        }
    }

    fn require(&self, selector: &Selector) -> QuoteflowResult<&MockElement> {
        self.page
            .element(selector)
            .ok_or_else(|| QuoteflowError::not_found(selector))
    }

    fn require_interactable(&self, selector: &Selector) -> QuoteflowResult<&MockElement> {
        let element = self.require(selector)?;
        if !element.visible || !element.enabled {
            return Err(QuoteflowError::not_interactable(
                selector,
                "hidden or disabled",
            ));
        }
        Ok(element)
    }
}

/// Mock driver for unit testing
///
/// Elements are keyed by the display form of their selector. Hooks attached with
/// [`MockDriver::on`] and [`MockDriver::on_click`] let a test model how the page reacts.
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDriver").finish_non_exhaustive()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create new mock driver with an empty page
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                page: MockPage::default(),
                hooks: Vec::new(),
                failures: Vec::new(),
                history: Vec::new(),
                screenshot: vec![0x89, 0x50, 0x4E, 0x47],
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Add or replace an element
    pub fn add_element(&self, selector: &Selector, element: MockElement) {
        self.lock().page.insert(selector, element);
    }

    /// Run `f` against the page state
    pub fn with_page<R>(&self, f: impl FnOnce(&mut MockPage) -> R) -> R {
        f(&mut self.lock().page)
    }

    /// React to `action` on `selector`
    pub fn on(
        &self,
        action: MockAction,
        selector: &Selector,
        hook: impl FnMut(&mut MockPage, &MockEvent) + Send + 'static,
    ) {
        self.lock()
            .hooks
            .push((action, selector.to_string(), Box::new(hook)));
    }

    /// React to any click kind on `selector`
    pub fn on_click(
        &self,
        selector: &Selector,
        mut hook: impl FnMut(&mut MockPage) + Send + 'static,
    ) {
        self.on(MockAction::Click, selector, move |page, _| hook(page));
    }

    /// React to a page reload
    pub fn on_reload(&self, mut hook: impl FnMut(&mut MockPage) + Send + 'static) {
        self.lock().hooks.push((
            MockAction::Reload,
            String::new(),
            Box::new(move |page, _| hook(page)),
        ));
    }

    /// Make the next `times` matching calls fail as not interactable
    pub fn fail_next(&self, action: MockAction, selector: &Selector, times: u32) {
        self.lock()
            .failures
            .push((action, selector.to_string(), times));
    }

    /// Set the screenshot bytes
    pub fn set_screenshot(&self, data: Vec<u8>) {
        self.lock().screenshot = data;
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Check if a call was recorded with this prefix
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().history.iter().any(|c| c.starts_with(prefix))
    }

    /// Number of recorded `action` calls on `selector`
    #[must_use]
    pub fn count(&self, action: MockAction, selector: &Selector) -> usize {
        let entry = format!("{action}:{selector}");
        self.lock().history.iter().filter(|c| **c == entry).count()
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn interact(
        &self,
        action: MockAction,
        selector: &Selector,
        value: Option<&str>,
        mutate: impl FnOnce(&mut MockElement),
    ) -> QuoteflowResult<()> {
        let mut state = self.lock();
        let target = selector.to_string();
        state.record(action, &target)?;
        match action {
            MockAction::Click | MockAction::PointerClick | MockAction::Type | MockAction::Enter => {
                let _ = state.require_interactable(selector)?;
            }
            _ => {
                let _ = state.require(selector)?;
            }
        }
        if let Some(element) = state.page.element_mut(selector) {
            mutate(element);
        }
        state.fire(&MockEvent {
            action,
            target,
            value: value.map(str::to_string),
        });
        Ok(())
    }
}

#[async_trait]
impl UiDriver for MockDriver {
    async fn navigate(&self, url: &str) -> QuoteflowResult<()> {
        let mut state = self.lock();
        state.record(MockAction::Navigate, url)?;
        state.page.url = url.to_string();
        state.fire(&MockEvent {
            action: MockAction::Navigate,
            target: url.to_string(),
            value: None,
        });
        Ok(())
    }

    async fn reload(&self) -> QuoteflowResult<()> {
        let mut state = self.lock();
        state.record(MockAction::Reload, "")?;
        state.fire(&MockEvent {
            action: MockAction::Reload,
            target: String::new(),
            value: None,
        });
        Ok(())
    }

    async fn is_present(&self, selector: &Selector) -> QuoteflowResult<bool> {
        let state = self.lock();
        state.check_open()?;
        Ok(!state.page.all(selector).is_empty())
    }

    async fn is_visible(&self, selector: &Selector) -> QuoteflowResult<bool> {
        let state = self.lock();
        state.check_open()?;
        Ok(state.page.element(selector).is_some_and(|e| e.visible))
    }

    async fn is_clickable(&self, selector: &Selector) -> QuoteflowResult<bool> {
        let state = self.lock();
        state.check_open()?;
        Ok(state
            .page
            .element(selector)
            .is_some_and(|e| e.visible && e.enabled))
    }

    async fn click(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.interact(MockAction::Click, selector, None, |_| {})
    }

    async fn pointer_click(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.interact(MockAction::PointerClick, selector, None, |_| {})
    }

    async fn force_click(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.interact(MockAction::ForceClick, selector, None, |_| {})
    }

    async fn scroll_into_view(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.interact(MockAction::Scroll, selector, None, |_| {})
    }

    async fn clear(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.interact(MockAction::Clear, selector, None, |e| e.value.clear())
    }

    async fn type_text(&self, selector: &Selector, text: &str) -> QuoteflowResult<()> {
        self.interact(MockAction::Type, selector, Some(text), |e| {
            e.value.push_str(text);
        })
    }

    async fn press_enter(&self, selector: &Selector) -> QuoteflowResult<()> {
        self.interact(MockAction::Enter, selector, None, |_| {})
    }

    async fn text(&self, selector: &Selector) -> QuoteflowResult<Option<String>> {
        let state = self.lock();
        state.check_open()?;
        Ok(state.page.element(selector).map(|e| e.text.clone()))
    }

    async fn attribute(&self, selector: &Selector, name: &str) -> QuoteflowResult<Option<String>> {
        let state = self.lock();
        state.check_open()?;
        Ok(state
            .page
            .element(selector)
            .and_then(|e| e.attributes.get(name).cloned()))
    }

    async fn attributes_of_all(
        &self,
        selector: &Selector,
        name: &str,
    ) -> QuoteflowResult<Vec<String>> {
        let state = self.lock();
        state.check_open()?;
        Ok(state
            .page
            .all(selector)
            .iter()
            .filter_map(|e| e.attributes.get(name).cloned())
            .collect())
    }

    async fn texts_of_all(&self, selector: &Selector) -> QuoteflowResult<Vec<String>> {
        let state = self.lock();
        state.check_open()?;
        Ok(state
            .page
            .all(selector)
            .iter()
            .filter(|e| e.visible)
            .map(|e| e.text.trim().to_string())
            .collect())
    }

    async fn editable_field(&self, row_id: &str) -> QuoteflowResult<Option<Selector>> {
        let state = self.lock();
        state.check_open()?;
        Ok(state
            .page
            .editable_fields
            .get(row_id)
            .filter(|field| state.page.element(field).is_some())
            .cloned())
    }

    async fn set_field_value(&self, selector: &Selector, value: &str) -> QuoteflowResult<()> {
        self.interact(MockAction::SetValue, selector, Some(value), |e| {
            e.value = value.to_string();
        })
    }

    async fn screenshot(&self) -> QuoteflowResult<Vec<u8>> {
        let state = self.lock();
        state.check_open()?;
        Ok(state.screenshot.clone())
    }

    async fn close(&self) -> QuoteflowResult<()> {
        let mut state = self.lock();
        state.history.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}
