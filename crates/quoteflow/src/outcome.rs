//! Unit-of-work outcomes and the run report.

use crate::context::RunEvent;
use crate::order::{AccessoryQuantity, ProductKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Result of one unit of work (a tab activation, a product, an accessory)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Completed
    Success,
    /// Contained failure; the run continues
    Skipped {
        /// Why the unit was skipped
        reason: String,
    },
    /// No sound containment boundary; the run aborts
    Fatal {
        /// Why the run cannot continue
        reason: String,
    },
}

impl Outcome {
    /// Skipped with a reason
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Fatal with a reason
    #[must_use]
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    /// Whether the unit completed
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the run must abort
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Fatal { reason } => write!(f, "fatal: {reason}"),
        }
    }
}

// ============================================================================
// Row disambiguation
// ============================================================================

/// Which row an "add" created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowMatch {
    /// Exactly one new row
    Found(String),
    /// The row set did not change
    NotFound,
    /// More than one new row; never guessed
    Ambiguous(Vec<String>),
}

/// Set difference of row identifiers captured after and before an "add"
#[must_use]
pub fn identify_new_row<I, J, S, T>(before: I, after: J) -> RowMatch
where
    I: IntoIterator<Item = S>,
    J: IntoIterator<Item = T>,
    S: Into<String>,
    T: Into<String>,
{
    let before: BTreeSet<String> = before.into_iter().map(Into::into).collect();
    let added: Vec<String> = after
        .into_iter()
        .map(Into::into)
        .collect::<BTreeSet<String>>()
        .difference(&before)
        .cloned()
        .collect();
    match added.len() {
        0 => RowMatch::NotFound,
        1 => added
            .into_iter()
            .next()
            .map_or(RowMatch::NotFound, RowMatch::Found),
        _ => RowMatch::Ambiguous(added),
    }
}

// ============================================================================
// Reports
// ============================================================================

/// How an accessory quantity was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityStrategy {
    /// Popup menu option
    Menu,
    /// Direct value assignment into the row's text field
    TextField,
}

/// One accessory's result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryReport {
    /// Cleaned accessory name
    pub name: String,
    /// Requested quantity
    pub requested: AccessoryQuantity,
    /// Row id in the detail view
    pub row_id: Option<String>,
    /// Strategy that entered the quantity
    pub strategy: Option<QuantityStrategy>,
    /// Value entered
    pub applied_value: Option<String>,
    /// Result
    pub outcome: Outcome,
}

/// One product's result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReport {
    /// Product name
    pub name: String,
    /// Classification used
    pub kind: ProductKind,
    /// Requested sets
    pub quantity: u32,
    /// Product code read from the catalog (non-Parts products)
    pub product_code: Option<String>,
    /// Identifier of the configuration row created for this product
    pub row_id: Option<String>,
    /// Base entry result
    pub outcome: Outcome,
    /// Accessory phase result; `None` when the product declares no accessories or the base
    /// entry failed
    pub accessory_phase: Option<Outcome>,
    /// Per-accessory results
    pub accessories: Vec<AccessoryReport>,
}

impl ProductReport {
    /// Report for a product that has not been processed yet
    #[must_use]
    pub fn pending(name: &str, kind: ProductKind, quantity: u32) -> Self {
        Self {
            name: name.to_string(),
            kind,
            quantity,
            product_code: None,
            row_id: None,
            outcome: Outcome::skipped("not processed"),
            accessory_phase: None,
            accessories: Vec::new(),
        }
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Final workflow state
    pub final_state: crate::orchestrator::WorkflowState,
    /// Per-product results in declared order
    pub products: Vec<ProductReport>,
    /// Failure that aborted the run
    pub fatal: Option<String>,
    /// Every event emitted during the run
    pub events: Vec<RunEvent>,
}

impl RunReport {
    /// Whether the run ended aborted
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.final_state == crate::orchestrator::WorkflowState::Aborted
    }

    /// Products whose base entry succeeded
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.products.iter().filter(|p| p.outcome.is_success()).count()
    }

    /// Accessories whose quantity was applied
    #[must_use]
    pub fn accessories_applied(&self) -> usize {
        self.products
            .iter()
            .flat_map(|p| &p.accessories)
            .filter(|a| a.outcome.is_success())
            .count()
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> crate::QuoteflowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
