//! Element selectors.
//!
//! Selectors are resolved inside the page through JavaScript, so CSS and XPath go through
//! the same code path in every driver.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selector type for locating elements
///
/// In settings files a selector is a one-key map, `{css: '#go'}` or `{xpath: '//tr'}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SelectorRepr", into = "SelectorRepr")]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// XPath selector
    XPath(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::XPath(selector.into())
    }

    /// Element by `id` attribute
    #[must_use]
    pub fn id(id: &str) -> Self {
        Self::XPath(format!("//*[@id={}]", xpath_literal(id)))
    }

    /// Element by `name` attribute
    #[must_use]
    pub fn name(name: &str) -> Self {
        Self::XPath(format!("//*[@name={}]", xpath_literal(name)))
    }

    /// Element carrying a CSS class
    #[must_use]
    pub fn class(class: &str) -> Self {
        Self::XPath(format!(
            "//*[contains(concat(' ', normalize-space(@class), ' '), {})]",
            xpath_literal(&format!(" {class} "))
        ))
    }

    /// Link whose whole text equals `text`
    #[must_use]
    pub fn link_text(text: &str) -> Self {
        Self::XPath(format!("//a[normalize-space(.)={}]", xpath_literal(text)))
    }

    /// Convert to JavaScript expression yielding the first match or `null`
    #[must_use]
    pub fn to_query(&self) -> String {
        match self {
            Self::Css(s) => format!("document.querySelector({s:?})"),
            Self::XPath(s) => {
                format!("document.evaluate({s:?}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue")
            }
        }
    }

    /// Convert to JavaScript expression yielding an array of all matches
    #[must_use]
    pub fn to_all_query(&self) -> String {
        match self {
            Self::Css(s) => format!("Array.from(document.querySelectorAll({s:?}))"),
            Self::XPath(s) => format!(
                "(() => {{ const r = document.evaluate({s:?}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 const out = []; for (let i = 0; i < r.snapshotLength; i++) {{ out.push(r.snapshotItem(i)); }} return out; }})()"
            ),
        }
    }
}

/// Map form of a selector as written in settings files
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SelectorRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    css: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    xpath: Option<String>,
}

impl TryFrom<SelectorRepr> for Selector {
    type Error = String;

    fn try_from(repr: SelectorRepr) -> Result<Self, Self::Error> {
        match (repr.css, repr.xpath) {
            (Some(css), None) => Ok(Self::Css(css)),
            (None, Some(xpath)) => Ok(Self::XPath(xpath)),
            _ => Err("a selector needs exactly one of `css` or `xpath`".to_string()),
        }
    }
}

impl From<Selector> for SelectorRepr {
    fn from(selector: Selector) -> Self {
        match selector {
            Selector::Css(css) => Self {
                css: Some(css),
                xpath: None,
            },
            Selector::XPath(xpath) => Self {
                css: None,
                xpath: Some(xpath),
            },
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
        }
    }
}

/// Quote a string for use as an XPath 1.0 literal.
///
/// XPath has no escape sequences, so a value holding both quote kinds is built with `concat()`.
#[must_use]
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}
