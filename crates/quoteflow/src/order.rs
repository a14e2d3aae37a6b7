//! Order file parsing.
//!
//! An order file mixes flat `key: value` settings with one designated section
//! (by default `Page 2: Configuration`) that holds the product tree:
//!
//! ```text
//! Quotation name: Campus refresh
//! Country: Germany
//! Is U.S. ECCN needed: No
//! Page 2: Configuration
//! S5560X-30C-EI 2
//!     - 1000BASE-LX SFP Module 4
//! WA6320 1
//!     Cable max
//! ```
//!
//! Products sit at indentation zero, accessories are indented below their product.
//! The quantity is always the trailing whitespace token, reduced to its digits, so names
//! may contain digits of their own. Lines that do not fit are dropped silently.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// Section whose body is parsed as the product tree
pub const DEFAULT_SECTION: &str = "Page 2: Configuration";

/// Prefix that opens a named section
const SECTION_PREFIX: &str = "Page ";

/// Setting key for the quotation name
pub const KEY_QUOTATION_NAME: &str = "Quotation name";
/// Setting key for the destination country
pub const KEY_COUNTRY: &str = "Country";
/// Setting key for the ECCN flag
pub const KEY_ECCN: &str = "Is U.S. ECCN needed";

/// Requested quantity of an accessory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessoryQuantity {
    /// Literal amount, matched verbatim against menu labels
    Exact(u32),
    /// Largest amount the configurator offers for the row
    Maximum,
}

impl AccessoryQuantity {
    /// Label used for verbatim menu matching and text entry
    #[must_use]
    pub fn label(&self) -> Option<String> {
        match self {
            Self::Exact(n) => Some(n.to_string()),
            Self::Maximum => None,
        }
    }
}

impl fmt::Display for AccessoryQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::Maximum => write!(f, "max"),
        }
    }
}

impl Serialize for AccessoryQuantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Exact(n) => serializer.serialize_u32(*n),
            Self::Maximum => serializer.serialize_str("max"),
        }
    }
}

/// Product family, derived from the product name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProductKind {
    /// Complete devices (`S...`, `F...`), added from the Standard tab
    Standard,
    /// Spare parts (`WA...`), added from the Parts tab
    Parts,
    /// Unrecognized prefix
    Unknown,
}

impl ProductKind {
    /// Classify a product name. Prefix match, case-sensitive.
    #[must_use]
    pub fn classify(name: &str) -> Self {
        if name.starts_with("WA") {
            Self::Parts
        } else if name.starts_with('S') || name.starts_with('F') {
            Self::Standard
        } else {
            Self::Unknown
        }
    }

    /// Kind the workflow acts on. Unknown products are handled as Standard.
    #[must_use]
    pub const fn effective(self) -> Self {
        match self {
            Self::Unknown => Self::Standard,
            other => other,
        }
    }

    /// Whether rows of this kind are identified by set difference
    #[must_use]
    pub const fn is_parts(self) -> bool {
        matches!(self, Self::Parts)
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standard => "Standard",
            Self::Parts => "Parts",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// An accessory line under a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accessory {
    /// Name as written in the order file, whitespace-normalized
    pub name: String,
    /// Requested quantity
    pub quantity: AccessoryQuantity,
}

impl Accessory {
    /// Name used to find the accessory row: list markers and padding removed
    #[must_use]
    pub fn lookup_name(&self) -> &str {
        self.name.trim().trim_start_matches('-').trim()
    }
}

/// A product line and its accessories
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductEntry {
    /// Product name, unique within a configuration
    pub name: String,
    /// Number of sets, always positive
    pub quantity: u32,
    /// Accessories in declaration order
    pub accessories: Vec<Accessory>,
}

impl ProductEntry {
    fn new(name: String, quantity: u32) -> Self {
        Self {
            name,
            quantity,
            accessories: Vec::new(),
        }
    }

    /// Product family
    #[must_use]
    pub fn kind(&self) -> ProductKind {
        ProductKind::classify(&self.name)
    }

    /// Look up an accessory by its written name
    #[must_use]
    pub fn accessory(&self, name: &str) -> Option<&Accessory> {
        self.accessories.iter().find(|a| a.name == name)
    }

    fn upsert_accessory(&mut self, name: String, quantity: AccessoryQuantity) {
        match self.accessories.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.quantity = quantity,
            None => self.accessories.push(Accessory { name, quantity }),
        }
    }
}

/// Parsed order file. Read-only once parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Configuration {
    settings: Vec<(String, String)>,
    products: Vec<ProductEntry>,
}

impl Configuration {
    /// Scalar setting by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All scalar settings in first-seen order
    #[must_use]
    pub fn settings(&self) -> &[(String, String)] {
        &self.settings
    }

    /// Products in declaration order
    #[must_use]
    pub fn products(&self) -> &[ProductEntry] {
        &self.products
    }

    /// Product by name
    #[must_use]
    pub fn product(&self, name: &str) -> Option<&ProductEntry> {
        self.products.iter().find(|p| p.name == name)
    }

    /// Quotation name setting
    #[must_use]
    pub fn quotation_name(&self) -> Option<&str> {
        self.get(KEY_QUOTATION_NAME)
    }

    /// Destination country setting
    #[must_use]
    pub fn country(&self) -> Option<&str> {
        self.get(KEY_COUNTRY)
    }

    /// Only the literal `Yes` enables ECCN
    #[must_use]
    pub fn eccn_required(&self) -> bool {
        self.get(KEY_ECCN) == Some("Yes")
    }

    /// Render back to order-file text that parses to an equal configuration
    #[must_use]
    pub fn to_text(&self, section: &str) -> String {
        let mut out = String::new();
        for (key, value) in &self.settings {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push_str(section);
        out.push('\n');
        for product in &self.products {
            out.push_str(&product.name);
            out.push(' ');
            out.push_str(&product.quantity.to_string());
            out.push('\n');
            for accessory in &product.accessories {
                out.push_str("    ");
                out.push_str(&accessory.name);
                out.push(' ');
                out.push_str(&accessory.quantity.to_string());
                out.push('\n');
            }
        }
        out
    }

    fn set(&mut self, key: String, value: String) {
        match self.settings.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.settings.push((key, value)),
        }
    }

    /// Insert a product, or reset an existing one in place; returns its index
    fn upsert_product(&mut self, name: String, quantity: u32) -> usize {
        if let Some(index) = self.products.iter().position(|p| p.name == name) {
            self.products[index] = ProductEntry::new(name, quantity);
            index
        } else {
            self.products.push(ProductEntry::new(name, quantity));
            self.products.len() - 1
        }
    }
}

/// Parser for order files
#[derive(Debug, Clone)]
pub struct ConfigParser {
    section: String,
}

impl Default for ConfigParser {
    fn default() -> Self {
        Self {
            section: DEFAULT_SECTION.to_string(),
        }
    }
}

impl ConfigParser {
    /// Parser for the default designated section
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another section name for the product tree
    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    /// Designated section name
    #[must_use]
    pub fn section(&self) -> &str {
        &self.section
    }

    /// Parse order-file text. Never fails; malformed lines are dropped.
    #[must_use]
    pub fn parse(&self, text: &str) -> Configuration {
        let mut config = Configuration::default();
        let mut in_tree = false;
        let mut current: Option<usize> = None;

        for raw in text.trim_start_matches('\u{feff}').lines() {
            let line = raw.trim_end();
            if line.trim().is_empty() {
                continue;
            }

            if line.starts_with(SECTION_PREFIX) {
                in_tree = line.trim() == self.section;
                current = None;
                continue;
            }

            if in_tree {
                let indent = line.len() - line.trim_start().len();
                let Some((name, token)) = split_trailing_token(line) else {
                    continue;
                };

                if indent == 0 {
                    // A dropped product line leaves accessories with the last kept product.
                    if let Some(quantity) = product_quantity(token) {
                        current = Some(config.upsert_product(name, quantity));
                    }
                } else if let Some(index) = current {
                    if let Some(quantity) = accessory_quantity(token) {
                        config.products[index].upsert_accessory(name, quantity);
                    }
                }
            } else if let Some((key, value)) = line.split_once(':') {
                config.set(key.trim().to_string(), value.trim().to_string());
            }
        }

        config
    }
}

/// Parse with the default designated section
#[must_use]
pub fn parse(text: &str) -> Configuration {
    ConfigParser::new().parse(text)
}

/// Split a line into its name (all tokens but the last, single-spaced) and the last token
fn split_trailing_token(line: &str) -> Option<(String, &str)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (last, rest) = tokens.split_last()?;
    if rest.is_empty() {
        return None;
    }
    Some((rest.join(" "), last))
}

/// Digits of a token as a number. Full-width digits count as digits.
fn digits_value(token: &str) -> Option<u32> {
    let digits: String = token
        .chars()
        .filter_map(|c| match c {
            '0'..='9' => Some(c),
            '\u{ff10}'..='\u{ff19}' => char::from_u32(u32::from(c) - 0xff10 + u32::from('0')),
            _ => None,
        })
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn product_quantity(token: &str) -> Option<u32> {
    digits_value(token).filter(|&n| n > 0)
}

fn accessory_quantity(token: &str) -> Option<AccessoryQuantity> {
    static MAX_TOKEN: OnceLock<Option<Regex>> = OnceLock::new();
    let is_max = MAX_TOKEN
        .get_or_init(|| Regex::new(r"(?i)^\W*max(imum)?\W*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(token));
    if is_max {
        return Some(AccessoryQuantity::Maximum);
    }
    digits_value(token).map(AccessoryQuantity::Exact)
}
