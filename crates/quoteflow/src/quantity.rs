//! Accessory quantity entry.
//!
//! The configurator renders each accessory as a table row whose quantity cell turns into an
//! editor when clicked. Depending on the row, the editor is a popup menu of allowed values or
//! a bare text input. [`QuantitySelector`] drives whichever one the row offers:
//!
//! 1. activate editing on the row's quantity cell
//! 2. menu rows: pick the option labelled with the requested value, or the numerically
//!    largest option for `max`; when no matching option shows up, fall through to text entry
//! 3. text rows: assign the value to the row's editable field and confirm with Enter
//! 4. wait for the row's applied-state class
//!
//! Any failure is contained to the accessory: it yields a skipped [`AccessoryReport`] and a
//! diagnostic snapshot. Only fatal session errors are returned as `Err`.

use crate::context::{EventCategory, EventLevel, RunContext, RunEvent};
use crate::diagnostics::Diagnostics;
use crate::driver::UiDriver;
use crate::locator::Selector;
use crate::order::{Accessory, AccessoryQuantity};
use crate::outcome::{AccessoryReport, Outcome, QuantityStrategy};
use crate::page_map::PageMap;
use crate::result::{QuoteflowError, QuoteflowResult};
use crate::settings::{ms, SettleTimes, Timeouts};
use crate::wait::{settle, Waiter};

/// Pick the numerically largest label. Non-numeric labels are ignored.
#[must_use]
pub fn pick_maximum<S: AsRef<str>>(labels: &[S]) -> Option<String> {
    let mut best: Option<(u64, &str)> = None;
    for label in labels {
        let label = label.as_ref().trim();
        let Ok(value) = label.parse::<u64>() else {
            continue;
        };
        if best.is_none_or(|(current, _)| value > current) {
            best = Some((value, label));
        }
    }
    best.map(|(_, label)| label.to_string())
}

enum Failure {
    Skip {
        reason: String,
        snapshot: &'static str,
    },
    Fatal(QuoteflowError),
}

/// Map a driver error to a skip, keeping fatal errors fatal
fn skip<'a>(
    snapshot: &'static str,
    context: &'a str,
) -> impl FnOnce(QuoteflowError) -> Failure + 'a {
    move |e| {
        if e.is_fatal() {
            Failure::Fatal(e)
        } else {
            Failure::Skip {
                reason: format!("{context}: {e}"),
                snapshot,
            }
        }
    }
}

/// Sets accessory quantities in the detail view
#[derive(Clone, Copy)]
pub struct QuantitySelector<'a> {
    driver: &'a dyn UiDriver,
    page: &'a PageMap,
    timeouts: Timeouts,
    settle: SettleTimes,
    diagnostics: &'a Diagnostics,
}

impl std::fmt::Debug for QuantitySelector<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantitySelector")
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl<'a> QuantitySelector<'a> {
    /// Create a selector over a driver and page map
    #[must_use]
    pub const fn new(
        driver: &'a dyn UiDriver,
        page: &'a PageMap,
        timeouts: Timeouts,
        settle: SettleTimes,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        Self {
            driver,
            page,
            timeouts,
            settle,
            diagnostics,
        }
    }

    fn waiter(&self, timeout_ms: u64) -> Waiter<'a> {
        Waiter::new(self.driver, self.timeouts.options(timeout_ms))
    }

    /// Force the accessory's quantity control into the requested state
    ///
    /// # Errors
    ///
    /// Returns only fatal session errors; every other failure is reported as skipped.
    pub async fn apply(
        &self,
        ctx: &RunContext,
        accessory: &Accessory,
    ) -> QuoteflowResult<AccessoryReport> {
        let name = accessory.lookup_name().to_string();
        let mut report = AccessoryReport {
            name: name.clone(),
            requested: accessory.quantity,
            row_id: None,
            strategy: None,
            applied_value: None,
            outcome: Outcome::Success,
        };
        ctx.emit(
            RunEvent::new(
                EventLevel::Info,
                EventCategory::Accessory,
                format!("Processing accessory '{name}'"),
            )
            .with("quantity", accessory.quantity.to_string()),
        );

        match self.try_apply(ctx, &name, accessory.quantity, &mut report).await {
            Ok(()) => {
                ctx.emit(
                    RunEvent::new(
                        EventLevel::Info,
                        EventCategory::Accessory,
                        format!("Applied quantity for '{name}'"),
                    )
                    .with("value", report.applied_value.clone().unwrap_or_default()),
                );
                settle(ms(self.settle.between_accessories_ms)).await;
            }
            Err(Failure::Fatal(e)) => return Err(e),
            Err(Failure::Skip { reason, snapshot }) => {
                ctx.error(
                    EventCategory::Accessory,
                    format!("Failed to set quantity for '{name}': {reason}"),
                );
                let _ = self
                    .diagnostics
                    .capture(self.driver, ctx, snapshot, &name)
                    .await;
                report.outcome = Outcome::skipped(reason);
            }
        }
        Ok(report)
    }

    async fn try_apply(
        &self,
        ctx: &RunContext,
        name: &str,
        quantity: AccessoryQuantity,
        report: &mut AccessoryReport,
    ) -> Result<(), Failure> {
        let row_id = self.activate_editing(ctx, name).await?;
        report.row_id = Some(row_id.clone());

        let (strategy, value) = if self.page.is_text_field_family(&row_id) {
            ctx.debug(
                EventCategory::Accessory,
                format!("Row '{row_id}' only offers a text field"),
            );
            let value = text_label(quantity)?;
            self.enter_text(&row_id, &value).await?;
            (QuantityStrategy::TextField, value)
        } else if let Some(value) = self.choose_from_menu(ctx, quantity).await? {
            (QuantityStrategy::Menu, value)
        } else {
            let value = text_label(quantity)?;
            ctx.info(
                EventCategory::Accessory,
                format!("No menu option '{value}' for '{name}', entering it as text"),
            );
            self.enter_text(&row_id, &value).await?;
            (QuantityStrategy::TextField, value)
        };
        report.strategy = Some(strategy);
        report.applied_value = Some(value);

        self.waiter(self.timeouts.confirm_ms)
            .has_class(&self.page.row_by_id(&row_id), &self.page.applied_class)
            .await
            .map_err(skip("select_qty", "quantity was not confirmed"))?;
        Ok(())
    }

    /// Locate the row, bring it into view and open its quantity editor. Returns the row id.
    async fn activate_editing(&self, ctx: &RunContext, name: &str) -> Result<String, Failure> {
        let row = self.page.accessory_row(name);
        let waiter = self.waiter(self.timeouts.element_ms);
        let _ = waiter
            .present(&row)
            .await
            .map_err(skip("accessory", "accessory row not found"))?;
        let row_id = self
            .driver
            .attribute(&row, "id")
            .await
            .map_err(skip("accessory", "cannot read row id"))?
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Failure::Skip {
                reason: "accessory row has no id".to_string(),
                snapshot: "accessory",
            })?;

        self.driver
            .scroll_into_view(&row)
            .await
            .map_err(skip("perform_qty_selection", "cannot scroll to row"))?;
        settle(ms(self.settle.after_scroll_ms)).await;

        let cell = self.page.quantity_cell(&row_id);
        let _ = waiter
            .clickable(&cell)
            .await
            .map_err(skip("perform_qty_selection", "quantity cell not clickable"))?;
        if let Err(e) = self.driver.pointer_click(&cell).await {
            if e.is_fatal() {
                return Err(Failure::Fatal(e));
            }
            ctx.warn(
                EventCategory::Accessory,
                format!("Pointer click on quantity cell failed: {e}. Using script click"),
            );
            self.driver
                .force_click(&cell)
                .await
                .map_err(skip("perform_qty_selection", "cannot click quantity cell"))?;
        }
        settle(ms(self.settle.after_cell_click_ms)).await;

        match waiter
            .has_class(&self.page.row_by_id(&row_id), &self.page.editing_class)
            .await
        {
            Ok(_) => ctx.debug(
                EventCategory::Accessory,
                format!("Row '{row_id}' is in editing state"),
            ),
            Err(e) if e.is_fatal() => return Err(Failure::Fatal(e)),
            Err(_) => ctx.warn(
                EventCategory::Accessory,
                format!("Row '{row_id}' did not enter editing state, continuing anyway"),
            ),
        }
        Ok(row_id)
    }

    /// Try the popup menu. `Ok(None)` means no usable option appeared in time.
    async fn choose_from_menu(
        &self,
        ctx: &RunContext,
        quantity: AccessoryQuantity,
    ) -> Result<Option<String>, Failure> {
        let waiter = self.waiter(self.timeouts.popup_ms);
        let label = match quantity {
            AccessoryQuantity::Exact(n) => n.to_string(),
            AccessoryQuantity::Maximum => {
                let offered = match waiter.present(&self.page.popup_options).await {
                    Ok(_) => self
                        .driver
                        .texts_of_all(&self.page.popup_options)
                        .await
                        .map_err(skip("select_qty", "cannot read menu options"))?,
                    Err(e) if e.is_fatal() => return Err(Failure::Fatal(e)),
                    Err(_) => Vec::new(),
                };
                match pick_maximum(&offered) {
                    Some(label) => label,
                    None => {
                        return Err(Failure::Skip {
                            reason: "no numeric menu option to take the maximum of".to_string(),
                            snapshot: "select_qty",
                        })
                    }
                }
            }
        };

        let option = self.page.popup_option(&label);
        match waiter.clickable(&option).await {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(Failure::Fatal(e)),
            Err(e) => {
                ctx.debug(EventCategory::Accessory, format!("Popup menu unavailable: {e}"));
                return Ok(None);
            }
        }
        if let Err(e) = self.driver.click(&option).await {
            if e.is_fatal() {
                return Err(Failure::Fatal(e));
            }
            ctx.debug(EventCategory::Accessory, format!("Popup option click failed: {e}"));
            return Ok(None);
        }
        ctx.info(
            EventCategory::Accessory,
            format!("Clicked popup menu option '{label}'"),
        );
        self.confirm_keystroke(ctx, &option).await?;
        Ok(Some(label))
    }

    /// Assign `value` to the row's editable field and confirm
    async fn enter_text(&self, row_id: &str, value: &str) -> Result<(), Failure> {
        settle(ms(self.settle.before_field_entry_ms)).await;
        let field = self
            .driver
            .editable_field(row_id)
            .await
            .map_err(skip("select_qty", "cannot query editable field"))?
            .ok_or_else(|| Failure::Skip {
                reason: format!("row '{row_id}' exposes no editable field"),
                snapshot: "select_qty",
            })?;
        self.driver
            .set_field_value(&field, value)
            .await
            .map_err(skip("select_qty", "cannot set field value"))?;
        settle(ms(self.settle.after_field_value_ms)).await;
        self.driver
            .press_enter(&field)
            .await
            .map_err(skip("select_qty", "cannot confirm field value"))?;
        Ok(())
    }

    /// Enter on a clicked menu option. The menu may already be gone, so only fatal errors count.
    async fn confirm_keystroke(&self, ctx: &RunContext, option: &Selector) -> Result<(), Failure> {
        match self.driver.press_enter(option).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(Failure::Fatal(e)),
            Err(e) => {
                ctx.debug(
                    EventCategory::Accessory,
                    format!("Enter on popup option skipped: {e}"),
                );
                Ok(())
            }
        }
    }
}

/// Text to type for a quantity; the maximum cannot be typed
fn text_label(quantity: AccessoryQuantity) -> Result<String, Failure> {
    quantity.label().ok_or_else(|| Failure::Skip {
        reason: "maximum requested but the row offers no menu".to_string(),
        snapshot: "select_qty",
    })
}
