//! End-to-end workflow tests against a simulated configurator.
//!
//! The simulation is a [`MockDriver`] whose hooks reproduce how the real pages react: the
//! login form appears after choosing the internal-user tab, an "add" inserts rows into the
//! configuration list, a component node opens the accessory page, and so on.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use quoteflow::{
    parse, run_session, Credentials, MockAction, MockDriver, MockElement, Outcome, PageMap,
    QuantityStrategy, RecordingSink, RetryPolicy, RunContext, Selector, Settings, SettleTimes,
    Timeouts, WorkflowState,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const ORDER: &str = "\
Quotation name: Demo quote
Country: Chile
Is U.S. ECCN needed: No
Page 2: Configuration
S100 2
WA200 1
    Cable 3
";

/// What the catalog knows about a product
#[derive(Clone)]
struct CatalogItem {
    /// Product code shown in the result row; empty for parts
    code: String,
    /// Config names the list gains when the product is added
    new_rows: Vec<String>,
}

/// Values typed into the edit dialog, recorded when OK is pressed
#[derive(Debug, Default)]
struct SimState {
    checked: Option<String>,
    typed_name: String,
    typed_sets: String,
    edits: Vec<(String, String)>,
}

struct Sim {
    driver: MockDriver,
    page: PageMap,
    settings: Settings,
    state: Arc<Mutex<SimState>>,
    _dir: TempDir,
}

impl Sim {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            output_dir: dir.path().join("snapshots"),
            retry: RetryPolicy::new(2).with_delay(1),
            timeouts: Timeouts {
                element_ms: 40,
                popup_ms: 20,
                confirm_ms: 40,
                save_ms: 40,
                poll_interval_ms: 2,
            },
            settle: SettleTimes::none(),
            ..Settings::default()
        };
        let sim = Self {
            driver: MockDriver::new(),
            page: settings.page.clone(),
            settings,
            state: Arc::new(Mutex::new(SimState::default())),
            _dir: dir,
        };
        sim.login_pages();
        sim.quotation_pages();
        sim.edit_dialog();
        sim
    }

    fn login_pages(&self) {
        let page = self.page.clone();
        self.driver.with_page(|p| {
            p.insert(&page.language_link, MockElement::new());
            p.insert(&page.login_title, MockElement::new().with_text("欢迎渠道用户登录"));
            p.insert(&page.internal_user_tab, MockElement::new());
            p.insert(&page.login_submit, MockElement::new());
        });

        let (title, text) = (page.login_title.clone(), page.login_title_text.clone());
        self.driver.on_click(&page.language_link, move |p| {
            p.insert(&title, MockElement::new().with_text(text.clone()));
        });
        let (user, password) = (page.username.clone(), page.password.clone());
        self.driver.on_click(&page.internal_user_tab, move |p| {
            p.insert(&user, MockElement::new());
            p.insert(&password, MockElement::new());
        });
        let menu = page.quotation_menu.clone();
        self.driver.on_click(&page.login_submit, move |p| {
            p.insert(&menu, MockElement::new());
        });
    }

    fn quotation_pages(&self) {
        let page = self.page.clone();
        let new_quotation = page.new_quotation.clone();
        self.driver.on_click(&page.quotation_menu, move |p| {
            p.insert(&new_quotation, MockElement::new());
        });
        let header: Vec<Selector> = vec![
            page.quotation_name.clone(),
            page.country_dropdown.clone(),
            page.eccn_yes.clone(),
            page.eccn_no.clone(),
            page.save_quotation.clone(),
        ];
        self.driver.on_click(&page.new_quotation, move |p| {
            for selector in &header {
                p.insert(selector, MockElement::new());
            }
        });
        let option = page.country_option("Chile");
        self.driver.on_click(&page.country_dropdown, move |p| {
            p.insert(&option, MockElement::new().with_text("Chile"));
        });
        let tab = page.configuration_tab.clone();
        self.driver.on_click(&page.save_quotation, move |p| {
            p.insert(&tab, MockElement::new());
        });
        let list: Vec<Selector> = vec![
            page.standard_tab.clone(),
            page.parts_tab.clone(),
            page.search_input.clone(),
            page.search_button.clone(),
            page.add_button.clone(),
            page.ok_button.clone(),
        ];
        self.driver.on_click(&page.configuration_tab, move |p| {
            for selector in &list {
                p.insert(selector, MockElement::new());
            }
        });
    }

    /// Record what is typed into the edit dialog
    fn edit_dialog(&self) {
        let page = self.page.clone();
        let state = Arc::clone(&self.state);
        self.driver
            .on(MockAction::Type, &page.config_name_input, move |_, event| {
                state.lock().unwrap().typed_name = event.value.clone().unwrap_or_default();
            });
        let state = Arc::clone(&self.state);
        self.driver
            .on(MockAction::Type, &page.sets_input, move |_, event| {
                state.lock().unwrap().typed_sets = event.value.clone().unwrap_or_default();
            });
    }

    /// Put `items` in the catalog; OK after an add inserts their rows
    fn catalog(&self, items: &[(&str, CatalogItem)]) {
        let page = self.page.clone();
        let catalog: HashMap<String, CatalogItem> = items
            .iter()
            .map(|(name, item)| ((*name).to_string(), item.clone()))
            .collect();

        for (name, item) in items {
            let checkbox = page.result_checkbox(name);
            self.driver.with_page(|p| {
                p.insert(&page.result_row(name), MockElement::new());
                p.insert(&page.result_code_cell(name), MockElement::new().with_text(&item.code));
                p.insert(&checkbox, MockElement::new());
            });
            let state = Arc::clone(&self.state);
            let product = (*name).to_string();
            self.driver.on_click(&checkbox, move |_| {
                state.lock().unwrap().checked = Some(product.clone());
            });

            let edits: Vec<Selector> = if item.code.is_empty() {
                item.new_rows.iter().map(|row| page.edit_by_config(row)).collect()
            } else {
                vec![page.edit_by_code(&item.code)]
            };
            for edit in edits {
                let (name_input, sets_input) =
                    (page.config_name_input.clone(), page.sets_input.clone());
                self.driver.on_click(&edit, move |p| {
                    p.insert(&name_input, MockElement::new());
                    p.insert(&sets_input, MockElement::new());
                });
            }
        }

        let state = Arc::clone(&self.state);
        let hook_page = page.clone();
        self.driver.on_click(&page.ok_button, move |p| {
            let mut state = state.lock().unwrap();
            if let Some(product) = state.checked.take() {
                let item = &catalog[&product];
                for row in &item.new_rows {
                    p.push(
                        &hook_page.config_rows,
                        MockElement::new().with_attr("configname", row),
                    );
                }
                if item.code.is_empty() {
                    for row in &item.new_rows {
                        p.insert(&hook_page.edit_by_config(row), MockElement::new());
                    }
                } else {
                    p.insert(&hook_page.edit_by_code(&item.code), MockElement::new());
                }
            } else {
                let edit = (state.typed_name.clone(), state.typed_sets.clone());
                state.edits.push(edit);
                p.remove(&hook_page.config_name_input);
                p.remove(&hook_page.sets_input);
            }
        });
    }

    /// Detail view of `product` reached through component node `node_key`
    fn detail_view(&self, product: &str, node_key: &str) {
        let page = self.page.clone();
        let link = page.detail_link(product);
        let node = page.component_node(node_key);
        self.driver.with_page(|p| p.insert(&link, MockElement::new()));
        let node_for_link = node.clone();
        self.driver.on_click(&link, move |p| {
            p.insert(&node_for_link, MockElement::new());
        });
        let detail: Vec<Selector> = vec![
            page.accessory_page_marker.clone(),
            page.expand_all.clone(),
            page.save_config.clone(),
            page.back_list.clone(),
        ];
        self.driver.on_click(&node, move |p| {
            for selector in &detail {
                p.insert(selector, MockElement::new());
            }
        });
    }

    /// Accessory row with a quantity menu offering `options`
    fn accessory_with_menu(&self, name: &str, row_id: &str, options: &[&str]) {
        let page = &self.page;
        let row = page.accessory_row(name);
        let by_id = page.row_by_id(row_id);
        let cell = page.quantity_cell(row_id);
        self.driver.with_page(|p| {
            p.insert(&row, MockElement::new().with_attr("id", row_id));
            p.insert(&by_id, MockElement::new().with_attr("class", "item_tr"));
            p.insert(&cell, MockElement::new());
        });

        let by_id_hook = by_id.clone();
        let all = page.popup_options.clone();
        let labels: Vec<(Selector, String)> = options
            .iter()
            .map(|label| (page.popup_option(label), (*label).to_string()))
            .collect();
        let menu = labels.clone();
        self.driver.on_click(&cell, move |p| {
            p.add_class(&by_id_hook, "editing");
            for (option, label) in &menu {
                p.insert(option, MockElement::new().with_text(label.clone()));
                p.push(&all, MockElement::new().with_text(label.clone()));
            }
        });
        for (option, _) in labels {
            let by_id_hook = by_id.clone();
            self.driver.on_click(&option, move |p| p.add_class(&by_id_hook, "selected"));
        }
    }

    async fn run(&self, order: &str) -> (quoteflow::RunReport, Arc<RecordingSink>) {
        let recorder = Arc::new(RecordingSink::new());
        let ctx = RunContext::new(recorder.clone());
        let config = parse(order);
        let credentials = Credentials::new("alice", "secret");
        let report = run_session(&self.driver, &self.settings, &ctx, &config, &credentials).await;
        (report, recorder)
    }

    fn snapshots(&self) -> Vec<String> {
        std::fs::read_dir(&self.settings.output_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn standard(code: &str, row: &str) -> CatalogItem {
    CatalogItem {
        code: code.to_string(),
        new_rows: vec![row.to_string()],
    }
}

fn part(rows: &[&str]) -> CatalogItem {
    CatalogItem {
        code: String::new(),
        new_rows: rows.iter().map(|r| (*r).to_string()).collect(),
    }
}

mod happy_path {
    use super::*;

    #[tokio::test]
    async fn test_two_products_with_an_accessory() {
        let sim = Sim::new();
        sim.catalog(&[
            ("S100", standard("9801A1AA", "9801A1AA_S100")),
            ("WA200", part(&["WA200_p1"])),
        ]);
        sim.detail_view("WA200", "WA200_p1");
        sim.accessory_with_menu("Cable", "item_Cable_3", &["1", "2", "3", "4"]);

        let (report, recorder) = sim.run(ORDER).await;

        assert_eq!(report.final_state, WorkflowState::Done, "{:?}", report.fatal);
        assert!(!report.aborted());
        assert_eq!(report.products.len(), 2);

        let s100 = &report.products[0];
        assert_eq!(s100.outcome, Outcome::Success);
        assert_eq!(s100.product_code.as_deref(), Some("9801A1AA"));
        assert_eq!(s100.row_id.as_deref(), Some("9801A1AA_S100"));
        assert!(s100.accessory_phase.is_none());

        let wa200 = &report.products[1];
        assert_eq!(wa200.outcome, Outcome::Success);
        assert_eq!(wa200.row_id.as_deref(), Some("WA200_p1"));
        assert_eq!(wa200.accessory_phase, Some(Outcome::Success));
        assert_eq!(wa200.accessories.len(), 1);
        assert_eq!(wa200.accessories[0].strategy, Some(QuantityStrategy::Menu));
        assert_eq!(wa200.accessories[0].applied_value.as_deref(), Some("3"));
        assert_eq!(report.accessories_applied(), 1);

        let state = sim.state.lock().unwrap();
        assert_eq!(
            state.edits,
            vec![
                ("S100".to_string(), "2".to_string()),
                ("WA200".to_string(), "1".to_string()),
            ]
        );

        assert!(sim.driver.is_closed());
        assert!(recorder.contains("LoggedOut -> LanguageSelected"));
        assert!(recorder.contains("ConfiguringProducts -> Done"));
        assert!(sim.snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_parts_tab_used_for_parts() {
        let sim = Sim::new();
        sim.catalog(&[
            ("S100", standard("9801A1AA", "9801A1AA_S100")),
            ("WA200", part(&["WA200_p1"])),
        ]);
        sim.detail_view("WA200", "WA200_p1");
        sim.accessory_with_menu("Cable", "item_Cable_3", &["3"]);

        let _ = sim.run(ORDER).await;

        assert_eq!(sim.driver.count(MockAction::Click, &sim.page.standard_tab), 1);
        assert_eq!(sim.driver.count(MockAction::Click, &sim.page.parts_tab), 1);
        assert!(sim.driver.was_called("type:css=#userAccounts"));
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let sim = Sim::new();
        sim.catalog(&[("S100", standard("9801A1AA", "9801A1AA_S100"))]);
        let order = "Quotation name: Q\nCountry: Chile\nPage 2: Configuration\nS100 1\n";

        let (report, _) = sim.run(order).await;
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["final_state"], "Done");
        assert_eq!(json["products"][0]["outcome"]["status"], "success");
        assert!(json["events"].as_array().is_some_and(|e| !e.is_empty()));
    }
}

mod containment {
    use super::*;

    #[tokio::test]
    async fn test_missing_accessory_is_skipped_and_run_completes() {
        let sim = Sim::new();
        sim.catalog(&[
            ("S100", standard("9801A1AA", "9801A1AA_S100")),
            ("WA200", part(&["WA200_p1"])),
        ]);
        sim.detail_view("WA200", "WA200_p1");
        let order = format!("{ORDER}    Fan 2\n");
        sim.accessory_with_menu("Cable", "item_Cable_3", &["3"]);

        let (report, recorder) = sim.run(&order).await;

        assert_eq!(report.final_state, WorkflowState::Done);
        let accessories = &report.products[1].accessories;
        assert_eq!(accessories.len(), 2);
        assert!(accessories[0].outcome.is_success());
        assert!(matches!(accessories[1].outcome, Outcome::Skipped { .. }));
        assert_eq!(report.products[1].accessory_phase, Some(Outcome::Success));
        assert!(recorder.contains("Failed to set quantity for 'Fan'"));
        assert!(sim.snapshots().iter().any(|s| s.starts_with("accessory_Fan_")));
    }

    #[tokio::test]
    async fn test_accessory_page_failure_recovers_and_continues() {
        let sim = Sim::new();
        sim.catalog(&[
            ("WA200", part(&["WA200_p1"])),
            ("S100", standard("9801A1AA", "9801A1AA_S100")),
        ]);
        // No component node: the detail link leads nowhere.
        let link = sim.page.detail_link("WA200");
        let back = sim.page.back_list.clone();
        sim.driver.with_page(|p| p.insert(&link, MockElement::new()));
        sim.driver.on_reload(move |p| p.insert(&back, MockElement::new()));
        let order = "Quotation name: Q\nCountry: Chile\nPage 2: Configuration\nWA200 1\n    Cable 3\nS100 2\n";

        let (report, recorder) = sim.run(order).await;

        assert_eq!(report.final_state, WorkflowState::Done);
        assert_eq!(report.products[0].outcome, Outcome::Success);
        match &report.products[0].accessory_phase {
            Some(Outcome::Skipped { reason }) => assert!(reason.contains("recovered")),
            other => panic!("unexpected accessory phase: {other:?}"),
        }
        assert_eq!(report.products[1].outcome, Outcome::Success);
        assert!(sim.driver.was_called("reload:"));
        assert_eq!(sim.driver.count(MockAction::ForceClick, &sim.page.back_list), 1);
        assert!(recorder.contains("Refreshing page to recover"));
        assert!(sim.snapshots().iter().any(|s| s.starts_with("components_page_WA200_")));
    }

    #[tokio::test]
    async fn test_ambiguous_part_rows_skip_the_product() {
        let sim = Sim::new();
        sim.catalog(&[
            ("WA200", part(&["WA200_p1", "WA200_p2"])),
            ("S100", standard("9801A1AA", "9801A1AA_S100")),
        ]);
        let order = "Quotation name: Q\nCountry: Chile\nPage 2: Configuration\nWA200 1\nS100 2\n";

        let (report, recorder) = sim.run(order).await;

        assert_eq!(report.final_state, WorkflowState::Done);
        assert!(matches!(report.products[0].outcome, Outcome::Skipped { .. }));
        assert_eq!(report.products[1].outcome, Outcome::Success);
        assert!(recorder.contains("refusing to guess"));
        assert_eq!(sim.state.lock().unwrap().edits.len(), 1);
    }

    #[tokio::test]
    async fn test_product_missing_from_catalog_is_skipped() {
        let sim = Sim::new();
        sim.catalog(&[("S100", standard("9801A1AA", "9801A1AA_S100"))]);
        let order = "Quotation name: Q\nCountry: Chile\nPage 2: Configuration\nS999 1\nS100 1\n";

        let (report, recorder) = sim.run(order).await;

        assert_eq!(report.final_state, WorkflowState::Done, "{:?}", report.fatal);
        assert!(report.fatal.is_none());
        match &report.products[0].outcome {
            Outcome::Skipped { reason } => assert!(reason.contains("search or add failed")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(report.products[1].outcome, Outcome::Success);
        assert!(recorder.contains("Failed to search or add S999"));
        assert!(sim.snapshots().iter().any(|s| s.starts_with("main_product_S999_")));
        assert_eq!(
            sim.state.lock().unwrap().edits,
            vec![("S100".to_string(), "1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failed_add_skips_and_next_product_uses_fresh_rows() {
        let sim = Sim::new();
        sim.catalog(&[
            ("WA100", part(&["WA100_p1"])),
            ("WA200", part(&["WA200_p1"])),
        ]);
        sim.driver.fail_next(MockAction::Click, &sim.page.add_button, 1);
        let order = "Quotation name: Q\nCountry: Chile\nPage 2: Configuration\nWA100 1\nWA200 2\n";

        let (report, _) = sim.run(order).await;

        assert_eq!(report.final_state, WorkflowState::Done);
        assert!(matches!(report.products[0].outcome, Outcome::Skipped { .. }));
        assert_eq!(report.products[1].outcome, Outcome::Success);
        assert_eq!(report.products[1].row_id.as_deref(), Some("WA200_p1"));
    }

    #[tokio::test]
    async fn test_unsaved_detail_view_recovers() {
        let sim = Sim::new();
        sim.catalog(&[
            ("WA200", part(&["WA200_p1"])),
            ("S100", standard("9801A1AA", "9801A1AA_S100")),
        ]);
        sim.detail_view("WA200", "WA200_p1");
        sim.accessory_with_menu("Cable", "item_Cable_3", &["3"]);
        let node = sim.page.component_node("WA200_p1");
        let save = sim.page.save_config.clone();
        sim.driver.on_click(&node, move |p| p.remove(&save));
        let order = "Quotation name: Q\nCountry: Chile\nPage 2: Configuration\nWA200 1\n    Cable 3\nS100 2\n";

        let (report, recorder) = sim.run(order).await;

        assert_eq!(report.final_state, WorkflowState::Done);
        let wa200 = &report.products[0];
        assert_eq!(wa200.outcome, Outcome::Success);
        assert!(wa200.accessories[0].outcome.is_success());
        match &wa200.accessory_phase {
            Some(Outcome::Skipped { reason }) => assert!(reason.contains("recovered")),
            other => panic!("unexpected accessory phase: {other:?}"),
        }
        assert!(recorder.contains("Error clicking save button"));
        assert!(sim.driver.was_called("reload:"));
        assert_eq!(sim.driver.count(MockAction::ForceClick, &sim.page.back_list), 1);
        assert_eq!(sim.driver.count(MockAction::Click, &sim.page.back_list), 0);
        assert_eq!(report.products[1].outcome, Outcome::Success);
    }

    #[tokio::test]
    async fn test_blocked_tab_skips_after_retries() {
        let sim = Sim::new();
        sim.catalog(&[("S100", standard("9801A1AA", "9801A1AA_S100"))]);
        sim.driver.fail_next(MockAction::Click, &sim.page.standard_tab, 5);
        let order = "Quotation name: Q\nCountry: Chile\nPage 2: Configuration\nS100 1\n";

        let (report, recorder) = sim.run(order).await;

        assert_eq!(report.final_state, WorkflowState::Done);
        assert!(matches!(report.products[0].outcome, Outcome::Skipped { .. }));
        assert_eq!(sim.driver.count(MockAction::Click, &sim.page.standard_tab), 2);
        assert!(recorder.contains("Failed to click 'Standard' tab after 2 attempts"));
    }
}

mod aborts {
    use super::*;

    #[tokio::test]
    async fn test_unknown_country_aborts_before_products() {
        let sim = Sim::new();
        sim.catalog(&[("S100", standard("9801A1AA", "9801A1AA_S100"))]);
        let order = "Quotation name: Q\nCountry: Peru\nPage 2: Configuration\nS100 1\n";

        let (report, recorder) = sim.run(order).await;

        assert!(report.aborted());
        assert_eq!(report.products[0].outcome, Outcome::skipped("not processed"));
        assert!(recorder.contains("An unexpected error occurred"));
        assert!(recorder.contains("LoggedIn -> Aborted"));
        assert!(sim.snapshots().iter().any(|s| s.starts_with("unexpected_")));
        assert!(sim.driver.is_closed());
    }

    #[tokio::test]
    async fn test_missing_country_aborts_before_login() {
        let sim = Sim::new();
        let (report, _) = sim.run("Quotation name: Q\nPage 2: Configuration\nS100 1\n").await;

        assert!(report.aborted());
        assert!(!sim.driver.was_called("navigate:"));
        assert!(report.fatal.as_deref().is_some_and(|f| f.contains("Country")));
        assert!(sim.driver.is_closed());
        assert!(sim.snapshots().iter().any(|s| s.starts_with("unexpected_")));
    }
}
