//! Workflow orchestration.
//!
//! [`Orchestrator`] replays a parsed order into the configurator:
//!
//! ```text
//! LoggedOut -> LanguageSelected -> LoggedIn -> QuotationCreated -> BasicInfoSaved
//!           -> ConfiguringProducts -> Done
//! ```
//!
//! Any state may fall into the absorbing `Aborted` state. Products are processed strictly in
//! declared order and failures are contained at the narrowest unit that can be skipped
//! soundly: an accessory, the accessory phase of a product, a product. A broken session or a
//! failure before the first product (login, quotation header) aborts the run.

use crate::context::{EventCategory, EventLevel, RunContext, RunEvent};
use crate::credentials::Credentials;
use crate::diagnostics::Diagnostics;
use crate::driver::UiDriver;
use crate::locator::Selector;
use crate::order::{Configuration, ProductEntry, ProductKind};
use crate::outcome::{identify_new_row, Outcome, ProductReport, RowMatch, RunReport};
use crate::quantity::QuantitySelector;
use crate::result::{QuoteflowError, QuoteflowResult};
use crate::retry::{Attempted, RetryableAction};
use crate::settings::{ms, Settings};
use crate::wait::{settle, Waiter};
use serde::Serialize;
use std::fmt;

/// Workflow states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkflowState {
    /// Nothing done yet
    LoggedOut,
    /// Login page switched to English
    LanguageSelected,
    /// Credentials accepted
    LoggedIn,
    /// New quotation opened and its header filled
    QuotationCreated,
    /// Quotation header saved
    BasicInfoSaved,
    /// Adding products
    ConfiguringProducts,
    /// Every product processed
    Done,
    /// Unrecoverable failure
    Aborted,
}

impl WorkflowState {
    /// Next state on the happy path
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::LoggedOut => Some(Self::LanguageSelected),
            Self::LanguageSelected => Some(Self::LoggedIn),
            Self::LoggedIn => Some(Self::QuotationCreated),
            Self::QuotationCreated => Some(Self::BasicInfoSaved),
            Self::BasicInfoSaved => Some(Self::ConfiguringProducts),
            Self::ConfiguringProducts => Some(Self::Done),
            Self::Done | Self::Aborted => None,
        }
    }

    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Whether `self -> to` is a legal transition
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Aborted || self.next() == Some(to)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Reason the run aborted
#[derive(Debug)]
struct Abort(String);

impl From<QuoteflowError> for Abort {
    fn from(e: QuoteflowError) -> Self {
        Self(e.to_string())
    }
}

/// Drives the configurator through one order
pub struct Orchestrator<'a> {
    driver: &'a dyn UiDriver,
    settings: &'a Settings,
    ctx: &'a RunContext,
    diagnostics: Diagnostics,
    retry: RetryableAction,
    state: WorkflowState,
}

impl fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator in `LoggedOut`
    #[must_use]
    pub fn new(driver: &'a dyn UiDriver, settings: &'a Settings, ctx: &'a RunContext) -> Self {
        Self {
            driver,
            settings,
            ctx,
            diagnostics: Diagnostics::new(settings.output_dir.clone()),
            retry: RetryableAction::new(settings.retry),
            state: WorkflowState::LoggedOut,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> WorkflowState {
        self.state
    }

    /// Move to `to`
    ///
    /// # Errors
    ///
    /// Returns [`QuoteflowError::InvalidState`] for a transition the state machine forbids.
    pub fn transition(&mut self, to: WorkflowState) -> QuoteflowResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(QuoteflowError::InvalidState {
                message: format!("cannot go from {} to {to}", self.state),
            });
        }
        self.ctx.emit(
            RunEvent::new(
                EventLevel::Info,
                EventCategory::State,
                format!("{} -> {to}", self.state),
            )
            .with("from", self.state.to_string())
            .with("to", to.to_string()),
        );
        self.state = to;
        Ok(())
    }

    fn waiter(&self) -> Waiter<'a> {
        Waiter::new(self.driver, self.settings.timeouts.element())
    }

    /// Replay the order. Never fails: an abort is recorded in the report.
    pub async fn run(&mut self, config: &Configuration, credentials: &Credentials) -> RunReport {
        let mut products: Vec<ProductReport> = config
            .products()
            .iter()
            .map(|p| ProductReport::pending(&p.name, p.kind(), p.quantity))
            .collect();

        let fatal = match self.drive(config, credentials, &mut products).await {
            Ok(()) => None,
            Err(Abort(reason)) => {
                self.ctx.error(
                    EventCategory::State,
                    format!("An unexpected error occurred: {reason}"),
                );
                let _ = self
                    .diagnostics
                    .capture(self.driver, self.ctx, "unexpected", "error")
                    .await;
                if !self.state.is_terminal() {
                    let _ = self.transition(WorkflowState::Aborted);
                }
                Some(reason)
            }
        };

        RunReport {
            final_state: self.state,
            products,
            fatal,
            events: self.ctx.events(),
        }
    }

    async fn drive(
        &mut self,
        config: &Configuration,
        credentials: &Credentials,
        products: &mut [ProductReport],
    ) -> Result<(), Abort> {
        let quotation_name = config
            .quotation_name()
            .ok_or_else(|| Abort("order file has no 'Quotation name'".to_string()))?;
        let country = config
            .country()
            .ok_or_else(|| Abort("order file has no 'Country'".to_string()))?;

        self.login(credentials).await?;
        self.create_quotation(quotation_name, country, config.eccn_required())
            .await?;

        for (product, report) in config.products().iter().zip(products.iter_mut()) {
            let outcome = self.process_product(product, report).await?;
            report.outcome = outcome.clone();
            self.ctx.emit(
                RunEvent::new(
                    EventLevel::Info,
                    EventCategory::Product,
                    format!("Finished processing product: {}", product.name),
                )
                .with("outcome", outcome.to_string()),
            );
            if let Outcome::Fatal { reason } = outcome {
                return Err(Abort(format!("{}: {reason}", product.name)));
            }
        }

        settle(ms(self.settings.settle.final_observe_ms)).await;
        self.transition(WorkflowState::Done)?;
        Ok(())
    }

    async fn click_when_clickable(&self, selector: &Selector) -> QuoteflowResult<()> {
        let _ = self.waiter().clickable(selector).await?;
        self.driver.click(selector).await
    }

    async fn login(&mut self, credentials: &Credentials) -> QuoteflowResult<()> {
        let settings = self.settings;
        let page = &settings.page;
        let url = &settings.base_url;
        self.ctx
            .info(EventCategory::Navigation, "Opening login page...");
        self.driver
            .navigate(url)
            .await
            .map_err(|e| match e {
                e if e.is_fatal() => e,
                e => QuoteflowError::Navigation {
                    url: url.clone(),
                    message: e.to_string(),
                },
            })?;

        self.click_when_clickable(&page.language_link).await?;
        let _ = self
            .waiter()
            .text_contains(&page.login_title, &page.login_title_text)
            .await?;
        self.transition(WorkflowState::LanguageSelected)?;

        self.click_when_clickable(&page.internal_user_tab).await?;
        let waiter = self.waiter();
        let _ = waiter.visible(&page.username).await?;
        let _ = waiter.clickable(&page.username).await?;
        let _ = waiter.clickable(&page.password).await?;
        self.driver
            .type_text(&page.username, credentials.username())
            .await?;
        self.driver
            .type_text(&page.password, credentials.password())
            .await?;
        self.ctx.info(EventCategory::Navigation, "Credentials entered");
        self.click_when_clickable(&page.login_submit).await?;
        settle(ms(settings.settle.after_login_ms)).await;
        self.transition(WorkflowState::LoggedIn)
    }

    async fn create_quotation(
        &mut self,
        quotation_name: &str,
        country: &str,
        eccn: bool,
    ) -> QuoteflowResult<()> {
        let settings = self.settings;
        let page = &settings.page;
        let settle_times = settings.settle;
        let waiter = self.waiter();

        let _ = waiter.clickable(&page.quotation_menu).await?;
        self.driver.force_click(&page.quotation_menu).await?;
        self.ctx
            .info(EventCategory::Navigation, "Clicked the Quotation menu");
        settle(ms(settle_times.after_quotation_menu_ms)).await;

        self.click_when_clickable(&page.new_quotation).await?;
        let _ = waiter.visible(&page.quotation_name).await?;
        self.driver
            .type_text(&page.quotation_name, quotation_name)
            .await?;
        self.ctx.info(
            EventCategory::Navigation,
            format!("Entered Quotation name: {quotation_name}"),
        );

        self.click_when_clickable(&page.country_dropdown).await?;
        self.click_when_clickable(&page.country_option(country))
            .await?;
        self.ctx.info(
            EventCategory::Navigation,
            format!("Selected Country: {country}"),
        );

        let radio = if eccn { &page.eccn_yes } else { &page.eccn_no };
        self.click_when_clickable(radio).await?;
        self.ctx.info(
            EventCategory::Navigation,
            format!(
                "Selected 'Is U.S. ECCN needed': {}",
                if eccn { "Yes" } else { "No" }
            ),
        );
        self.transition(WorkflowState::QuotationCreated)?;

        self.click_when_clickable(&page.save_quotation).await?;
        settle(ms(settle_times.after_basic_save_ms)).await;
        self.transition(WorkflowState::BasicInfoSaved)?;

        self.click_when_clickable(&page.configuration_tab).await?;
        settle(ms(settle_times.after_configuration_tab_ms)).await;
        self.transition(WorkflowState::ConfiguringProducts)
    }

    /// One product. `Err` only for fatal session errors.
    async fn process_product(
        &self,
        product: &ProductEntry,
        report: &mut ProductReport,
    ) -> QuoteflowResult<Outcome> {
        let kind = product.kind();
        let effective = kind.effective();
        if kind == ProductKind::Unknown {
            self.ctx.warn(
                EventCategory::Product,
                format!(
                    "Product {} has an unknown type. Assuming 'Standard' and proceeding",
                    product.name
                ),
            );
        } else {
            self.ctx.info(
                EventCategory::Product,
                format!("Product {} is a '{kind}' type", product.name),
            );
        }

        if !self.activate_tab(effective).await? {
            return Ok(Outcome::skipped(format!("could not activate the {effective} tab")));
        }
        settle(ms(self.settings.settle.after_tab_ms)).await;

        // Later products take a fresh pre-image or key on their own code, so a failed
        // search or add only costs this product.
        let added = match self.search_and_add(product, effective).await {
            Ok(added) => added,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.ctx.error(
                    EventCategory::Product,
                    format!("Failed to search or add {}: {e}", product.name),
                );
                let _ = self
                    .diagnostics
                    .capture(self.driver, self.ctx, "main_product", &product.name)
                    .await;
                return Ok(Outcome::skipped(format!("search or add failed: {e}")));
            }
        };
        let Some(Added { code, pre_image }) = added else {
            return Ok(Outcome::skipped("catalog row has no product code"));
        };
        report.product_code.clone_from(&code);

        let Some((row_id, edit_button)) = self.locate_added_row(code.as_deref(), pre_image).await?
        else {
            let _ = self
                .diagnostics
                .capture(self.driver, self.ctx, "main_product", &product.name)
                .await;
            return Ok(Outcome::skipped(
                "could not identify the newly added row",
            ));
        };
        report.row_id.clone_from(&row_id);

        if let Err(e) = self.edit_base_entry(product, &edit_button).await {
            if e.is_fatal() {
                return Err(e);
            }
            self.ctx.error(
                EventCategory::Product,
                format!(
                    "Failed to edit configuration for {}: {e}",
                    product.name
                ),
            );
            let _ = self
                .diagnostics
                .capture(self.driver, self.ctx, "main_product", &product.name)
                .await;
            return Ok(Outcome::skipped(format!("edit dialog failed: {e}")));
        }

        if !product.accessories.is_empty() {
            let node_key = if effective.is_parts() {
                row_id.clone()
            } else {
                code.clone()
            }
            .unwrap_or_default();
            let phase = self.accessory_phase(product, &node_key, report).await?;
            report.accessory_phase = Some(phase);
        }
        Ok(Outcome::Success)
    }

    /// Click the product tab under the retry policy
    async fn activate_tab(&self, kind: ProductKind) -> QuoteflowResult<bool> {
        let page = &self.settings.page;
        let tab = page.tab_for(kind.is_parts());
        let overlay = &page.overlay;
        let waiter = self.waiter();
        let driver = self.driver;
        let attempted = self
            .retry
            .run(
                self.ctx,
                &format!("click '{kind}' tab"),
                || async move { waiter.gone(overlay).await.map(|_| ()) },
                || async move {
                    let _ = waiter.clickable(tab).await?;
                    driver.click(tab).await
                },
            )
            .await?;
        Ok(attempted.is_success())
    }

    async fn search_and_add(
        &self,
        product: &ProductEntry,
        kind: ProductKind,
    ) -> QuoteflowResult<Option<Added>> {
        let page = &self.settings.page;
        let waiter = self.waiter();
        let name = &product.name;

        self.ctx.info(
            EventCategory::Product,
            format!("Searching for product: {name}"),
        );
        let _ = waiter.visible(&page.search_input).await?;
        self.driver.clear(&page.search_input).await?;
        self.driver.type_text(&page.search_input, name).await?;
        self.click_when_clickable(&page.search_button).await?;
        settle(ms(self.settings.settle.after_search_ms)).await;

        let _ = waiter.visible(&page.result_row(name)).await?;

        let mut code = None;
        let mut pre_image = Vec::new();
        if kind.is_parts() {
            pre_image = self
                .driver
                .attributes_of_all(&page.config_rows, &page.config_name_attribute)
                .await?;
            self.ctx.emit(
                RunEvent::new(
                    EventLevel::Debug,
                    EventCategory::Product,
                    "Existing config names before adding part",
                )
                .with("rows", pre_image.clone()),
            );
        } else {
            let text = self
                .driver
                .text(&page.result_code_cell(name))
                .await?
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            if text.is_empty() {
                return Ok(None);
            }
            self.ctx.info(
                EventCategory::Product,
                format!("Captured Product Code: {text}"),
            );
            code = Some(text);
        }

        self.click_when_clickable(&page.result_checkbox(name)).await?;
        self.click_when_clickable(&page.add_button).await?;
        self.click_when_clickable(&page.ok_button).await?;
        self.ctx
            .info(EventCategory::Product, format!("Added product {name}"));
        settle(ms(self.settings.settle.after_add_ms)).await;
        Ok(Some(Added { code, pre_image }))
    }

    /// Row id and edit button of the row the last add created
    async fn locate_added_row(
        &self,
        code: Option<&str>,
        pre_image: Vec<String>,
    ) -> QuoteflowResult<Option<(Option<String>, Selector)>> {
        let page = &self.settings.page;
        let rows = self
            .driver
            .attributes_of_all(&page.config_rows, &page.config_name_attribute)
            .await?;

        if let Some(code) = code {
            let row_id = rows.into_iter().find(|r| r.contains(code));
            return Ok(Some((row_id, page.edit_by_code(code))));
        }

        match identify_new_row(pre_image, rows) {
            RowMatch::Found(row) => {
                self.ctx.info(
                    EventCategory::Product,
                    format!("Found newly added part config name: {row}"),
                );
                let edit = page.edit_by_config(&row);
                Ok(Some((Some(row), edit)))
            }
            RowMatch::NotFound => {
                self.ctx.error(
                    EventCategory::Product,
                    "Could not identify the newly added part's config name",
                );
                Ok(None)
            }
            RowMatch::Ambiguous(rows) => {
                self.ctx.emit(
                    RunEvent::new(
                        EventLevel::Error,
                        EventCategory::Product,
                        "Several new rows appeared, refusing to guess",
                    )
                    .with("rows", rows),
                );
                Ok(None)
            }
        }
    }

    /// Open the edit dialog and write the configuration name and sets
    async fn edit_base_entry(
        &self,
        product: &ProductEntry,
        edit_button: &Selector,
    ) -> QuoteflowResult<()> {
        let page = &self.settings.page;
        let settle_times = self.settings.settle;
        let waiter = self.waiter();
        let driver = self.driver;
        let overlay = &page.overlay;
        let name_input = &page.config_name_input;

        let attempted = self
            .retry
            .run(
                self.ctx,
                &format!("open edit dialog for {}", product.name),
                || async move { waiter.gone(overlay).await.map(|_| ()) },
                || async move {
                    let _ = waiter.clickable(edit_button).await?;
                    driver.scroll_into_view(edit_button).await?;
                    settle(ms(settle_times.before_edit_click_ms)).await;
                    driver.click(edit_button).await?;
                    settle(ms(settle_times.after_edit_click_ms)).await;
                    waiter.visible(name_input).await.map(|_| ())
                },
            )
            .await?;
        if let Attempted::Exhausted { last_error, .. } = attempted {
            return Err(QuoteflowError::not_interactable(edit_button, last_error));
        }

        self.driver.clear(name_input).await?;
        self.driver.type_text(name_input, &product.name).await?;
        let _ = waiter.visible(&page.sets_input).await?;
        self.driver.clear(&page.sets_input).await?;
        self.driver
            .type_text(&page.sets_input, &product.quantity.to_string())
            .await?;
        self.click_when_clickable(&page.ok_button).await?;
        self.ctx.info(
            EventCategory::Product,
            format!(
                "Set config name '{}' and sets {}",
                product.name, product.quantity
            ),
        );
        Ok(())
    }

    /// Configure accessories in the detail view, with one refresh and one recovery return
    async fn accessory_phase(
        &self,
        product: &ProductEntry,
        node_key: &str,
        report: &mut ProductReport,
    ) -> QuoteflowResult<Outcome> {
        let failure = match self.configure_accessories(product, node_key, report).await {
            Ok(()) => return Ok(Outcome::Success),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => e,
        };

        self.ctx.error(
            EventCategory::Accessory,
            format!(
                "Could not process accessories on Components page for {}: {failure}",
                product.name
            ),
        );
        let _ = self
            .diagnostics
            .capture(self.driver, self.ctx, "components_page", &product.name)
            .await;

        let page = &self.settings.page;
        let settle_times = self.settings.settle;
        self.ctx
            .info(EventCategory::Navigation, "Refreshing page to recover");
        let recovery = async {
            self.driver.reload().await?;
            settle(ms(settle_times.after_refresh_ms)).await;
            let _ = self.waiter().clickable(&page.back_list).await?;
            self.driver.force_click(&page.back_list).await?;
            settle(ms(settle_times.after_recovery_back_ms)).await;
            Ok::<(), QuoteflowError>(())
        };
        match recovery.await {
            Ok(()) => Ok(Outcome::skipped(format!(
                "accessory phase failed and was recovered: {failure}"
            ))),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.ctx.error(
                    EventCategory::Navigation,
                    format!("Failed to go back to the main page after refresh: {e}"),
                );
                Ok(Outcome::skipped(format!(
                    "accessory phase failed ({failure}) and recovery failed ({e})"
                )))
            }
        }
    }

    async fn configure_accessories(
        &self,
        product: &ProductEntry,
        node_key: &str,
        report: &mut ProductReport,
    ) -> QuoteflowResult<()> {
        let page = &self.settings.page;
        let settings = self.settings;
        let waiter = self.waiter();

        self.ctx.info(
            EventCategory::Accessory,
            format!("Entering detail page for {}", product.name),
        );
        let detail = page.detail_link(&product.name);
        let _ = waiter.clickable(&detail).await?;
        self.driver.force_click(&detail).await?;
        settle(ms(settings.settle.after_detail_link_ms)).await;

        let node = page.component_node(node_key);
        let _ = waiter.clickable(&node).await?;
        self.driver.force_click(&node).await?;
        let _ = waiter.present(&page.accessory_page_marker).await?;
        self.ctx
            .info(EventCategory::Accessory, "Accessory page loaded");

        match self.click_when_clickable(&page.expand_all).await {
            Ok(()) => settle(ms(settings.settle.after_expand_ms)).await,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.ctx.error(
                    EventCategory::Accessory,
                    format!("Could not find or click 'Expand all': {e}"),
                );
                let _ = self
                    .diagnostics
                    .capture(self.driver, self.ctx, "expand_all", &product.name)
                    .await;
            }
        }

        let selector = QuantitySelector::new(
            self.driver,
            page,
            settings.timeouts,
            settings.settle,
            &self.diagnostics,
        );
        for accessory in &product.accessories {
            report.accessories.push(selector.apply(self.ctx, accessory).await?);
        }

        let save_waiter = Waiter::new(
            self.driver,
            settings.timeouts.options(settings.timeouts.save_ms),
        );
        let saved = async {
            let _ = save_waiter.clickable(&page.save_config).await?;
            self.driver.click(&page.save_config).await
        };
        if let Err(e) = saved.await {
            if !e.is_fatal() {
                self.ctx.error(
                    EventCategory::Accessory,
                    format!("Error clicking save button: {e}"),
                );
            }
            return Err(e);
        }
        self.ctx
            .info(EventCategory::Accessory, "Saved configuration");
        settle(ms(settings.settle.after_save_ms)).await;

        let _ = save_waiter.clickable(&page.back_list).await?;
        self.driver.click(&page.back_list).await?;
        self.ctx
            .info(EventCategory::Navigation, "Returned to main list");
        settle(ms(settings.settle.after_back_ms)).await;
        Ok(())
    }
}

/// What an add action left behind
struct Added {
    /// Product code (non-Parts products)
    code: Option<String>,
    /// Row identifiers before the add (Parts products)
    pre_image: Vec<String>,
}

/// Run the whole order and release the session, whatever the outcome.
pub async fn run_session(
    driver: &dyn UiDriver,
    settings: &Settings,
    ctx: &RunContext,
    config: &Configuration,
    credentials: &Credentials,
) -> RunReport {
    let mut report = Orchestrator::new(driver, settings, ctx)
        .run(config, credentials)
        .await;
    ctx.info(EventCategory::Navigation, "Closing the browser");
    if let Err(e) = driver.close().await {
        ctx.warn(
            EventCategory::Navigation,
            format!("Failed to close the browser: {e}"),
        );
    }
    report.events = ctx.events();
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::context::RecordingSink;
    use crate::driver::{MockDriver, MockElement};
    use crate::order::parse;
    use crate::settings::{SettleTimes, Timeouts};
    use std::sync::Arc;

    fn fast_settings(dir: &std::path::Path) -> Settings {
        Settings {
            output_dir: dir.to_path_buf(),
            retry: crate::retry::RetryPolicy::new(3).with_delay(1),
            timeouts: Timeouts {
                element_ms: 30,
                popup_ms: 10,
                confirm_ms: 30,
                save_ms: 30,
                poll_interval_ms: 2,
            },
            settle: SettleTimes::none(),
            ..Settings::default()
        }
    }

    mod state_tests {
        use super::*;

        #[test]
        fn test_happy_path_order() {
            let mut state = WorkflowState::LoggedOut;
            let mut seen = vec![state];
            while let Some(next) = state.next() {
                assert!(state.can_transition_to(next));
                state = next;
                seen.push(state);
            }
            assert_eq!(seen.len(), 7);
            assert_eq!(state, WorkflowState::Done);
        }

        #[test]
        fn test_aborted_is_absorbing() {
            assert!(WorkflowState::LoggedIn.can_transition_to(WorkflowState::Aborted));
            assert!(!WorkflowState::Aborted.can_transition_to(WorkflowState::LoggedOut));
            assert!(!WorkflowState::Aborted.can_transition_to(WorkflowState::Aborted));
            assert!(!WorkflowState::Done.can_transition_to(WorkflowState::Aborted));
        }

        #[test]
        fn test_skipping_states_is_rejected() {
            let driver = MockDriver::new();
            let settings = Settings::default();
            let ctx = RunContext::new(Arc::new(RecordingSink::new()));
            let mut orchestrator = Orchestrator::new(&driver, &settings, &ctx);
            let err = orchestrator
                .transition(WorkflowState::LoggedIn)
                .unwrap_err();
            assert!(matches!(err, QuoteflowError::InvalidState { .. }));
            orchestrator
                .transition(WorkflowState::LanguageSelected)
                .unwrap();
            assert_eq!(orchestrator.state(), WorkflowState::LanguageSelected);
        }
    }

    mod abort_tests {
        use super::*;

        #[tokio::test]
        async fn test_missing_quotation_name_aborts_before_navigation() {
            let dir = tempfile::tempdir().unwrap();
            let driver = MockDriver::new();
            let settings = fast_settings(dir.path());
            let ctx = RunContext::new(Arc::new(RecordingSink::new()));
            let config = parse("Country: China\n");
            let report = run_session(
                &driver,
                &settings,
                &ctx,
                &config,
                &Credentials::new("u", "p"),
            )
            .await;
            assert!(report.aborted());
            assert!(report.fatal.unwrap().contains("Quotation name"));
            assert!(!driver.was_called("navigate:"));
            assert!(driver.is_closed());
        }

        #[tokio::test]
        async fn test_login_page_failure_aborts_and_closes() {
            let dir = tempfile::tempdir().unwrap();
            let driver = MockDriver::new();
            let settings = fast_settings(dir.path());
            let ctx = RunContext::new(Arc::new(RecordingSink::new()));
            let config = parse("Quotation name: Q1\nCountry: China\n");
            let report = run_session(
                &driver,
                &settings,
                &ctx,
                &config,
                &Credentials::new("u", "p"),
            )
            .await;
            assert_eq!(report.final_state, WorkflowState::Aborted);
            assert!(report.fatal.unwrap().contains("Timed out"));
            assert!(driver.is_closed());
            assert!(report
                .events
                .iter()
                .any(|e| e.message.contains("LoggedOut -> Aborted")));
        }

        #[tokio::test]
        async fn test_language_switch_reaches_language_selected() {
            let dir = tempfile::tempdir().unwrap();
            let driver = MockDriver::new();
            let settings = fast_settings(dir.path());
            let page = &settings.page;
            driver.add_element(&page.language_link, MockElement::new());
            driver.add_element(
                &page.login_title,
                MockElement::new().with_text(page.login_title_text.clone()),
            );
            let ctx = RunContext::new(Arc::new(RecordingSink::new()));
            let config = parse("Quotation name: Q1\nCountry: China\n");
            let report = run_session(
                &driver,
                &settings,
                &ctx,
                &config,
                &Credentials::new("u", "p"),
            )
            .await;
            assert!(report.aborted());
            assert!(report
                .events
                .iter()
                .any(|e| e.message == "LoggedOut -> LanguageSelected"));
        }
    }
}
