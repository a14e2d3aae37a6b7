//! Quoteflow: order-entry automation for the H3C iConfig web configurator
//!
//! An order is written as an indented text file (products, quantities and accessories).
//! Quoteflow parses it and replays it into the configurator through a [`UiDriver`],
//! containing failures at the narrowest unit that can be skipped.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   QUOTEFLOW Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌──────────────┐    ┌────────────┐          │
//! │   │ Config.txt │    │ Orchestrator │    │ UiDriver   │          │
//! │   │ (parser)   │───►│ retry, waits │───►│ CDP / mock │          │
//! │   │            │    │ diagnostics  │    │            │          │
//! │   └────────────┘    └──────────────┘    └────────────┘          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod context;
pub mod credentials;
pub mod diagnostics;
pub mod driver;
pub mod locator;
pub mod orchestrator;
pub mod order;
pub mod outcome;
pub mod page_map;
pub mod quantity;
mod result;
pub mod retry;
pub mod settings;
pub mod wait;

/// Chromium driver (feature `browser`)
#[cfg(feature = "browser")]
pub mod cdp;

pub use context::{
    EventCategory, EventLevel, EventSink, RecordingSink, RunContext, RunEvent, TracingSink,
};
pub use credentials::Credentials;
pub use diagnostics::Diagnostics;
pub use driver::{MockAction, MockDriver, MockElement, MockEvent, MockPage, UiDriver};
pub use locator::Selector;
pub use orchestrator::{run_session, Orchestrator, WorkflowState};
pub use order::{
    parse, Accessory, AccessoryQuantity, ConfigParser, Configuration, ProductEntry, ProductKind,
    DEFAULT_SECTION,
};
pub use outcome::{
    identify_new_row, AccessoryReport, Outcome, ProductReport, QuantityStrategy, RowMatch,
    RunReport,
};
pub use page_map::PageMap;
pub use quantity::{pick_maximum, QuantitySelector};
pub use result::{QuoteflowError, QuoteflowResult};
pub use retry::{Attempted, RetryPolicy, RetryableAction};
pub use settings::{Settings, SettleTimes, Timeouts};
pub use wait::{WaitOptions, WaitResult, Waiter};

#[cfg(feature = "browser")]
pub use cdp::CdpDriver;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::context::*;
    pub use super::credentials::*;
    pub use super::driver::*;
    pub use super::locator::*;
    pub use super::orchestrator::*;
    pub use super::order::*;
    pub use super::outcome::*;
    pub use super::result::*;
    pub use super::settings::*;
    #[cfg(feature = "browser")]
    pub use super::cdp::CdpDriver;
}
