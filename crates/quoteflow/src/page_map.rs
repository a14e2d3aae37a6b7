//! Page map of the configurator.
//!
//! Static elements are plain [`Selector`]s. Elements that depend on run data (a product
//! name, a row id, a menu label) are XPath templates holding a `{value}` placeholder, which
//! is replaced by the value quoted as an XPath literal. Everything can be overridden from the
//! `page` block of the settings file.

use crate::locator::{xpath_literal, Selector};
use serde::{Deserialize, Serialize};

/// Placeholder substituted in templates
pub const PLACEHOLDER: &str = "{value}";

/// Selectors of the target web application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMap {
    // Login
    /// Language switch link
    pub language_link: Selector,
    /// Login title, changes text once the language applied
    pub login_title: Selector,
    /// Expected login title text after switching language
    pub login_title_text: String,
    /// Internal user tab
    pub internal_user_tab: Selector,
    /// Username input
    pub username: Selector,
    /// Password input
    pub password: Selector,
    /// Login button
    pub login_submit: Selector,

    // Quotation header
    /// Quotation menu entry
    pub quotation_menu: Selector,
    /// "New" quotation link
    pub new_quotation: Selector,
    /// Quotation name input
    pub quotation_name: Selector,
    /// Country dropdown button
    pub country_dropdown: Selector,
    /// Country option template (country name)
    pub country_option: String,
    /// ECCN "Yes" radio
    pub eccn_yes: Selector,
    /// ECCN "No" radio
    pub eccn_no: Selector,
    /// Save button of the basic information form
    pub save_quotation: Selector,
    /// Configuration page tab
    pub configuration_tab: Selector,

    // Product list
    /// Standard products tab
    pub standard_tab: Selector,
    /// Parts tab
    pub parts_tab: Selector,
    /// Blocking loading overlay
    pub overlay: Selector,
    /// Catalog search input
    pub search_input: Selector,
    /// Catalog search button
    pub search_button: Selector,
    /// Search result row template (product name)
    pub result_row: String,
    /// Product code cell of a result row (product name)
    pub result_code_cell: String,
    /// Checkbox of a result row (product name)
    pub result_checkbox: String,
    /// "Add" button
    pub add_button: Selector,
    /// "OK" button, shared by the add and edit dialogs
    pub ok_button: Selector,
    /// Row markers of the configuration list
    pub config_rows: Selector,
    /// Attribute of a row marker holding the row identifier
    pub config_name_attribute: String,
    /// Edit button of the row with exactly this identifier
    pub edit_by_config: String,
    /// Edit button of the row whose identifier contains this product code
    pub edit_by_code: String,
    /// Configuration name input of the edit dialog
    pub config_name_input: Selector,
    /// Sets input of the edit dialog
    pub sets_input: Selector,

    // Detail page
    /// Link into a product's detail view (product name)
    pub detail_link: String,
    /// Id template of a component node; substituted verbatim, not quoted
    pub component_node_id: String,
    /// Element present once the accessory page is loaded
    pub accessory_page_marker: Selector,
    /// "Expand all" button
    pub expand_all: Selector,
    /// Accessory row by exact normalized name
    pub accessory_row: String,
    /// Row by id
    pub row_by_id: String,
    /// Quantity cell of a row (row id)
    pub quantity_cell: String,
    /// Popup option by label
    pub popup_option: String,
    /// All popup options
    pub popup_options: Selector,
    /// Row class set while editing
    pub editing_class: String,
    /// Row class set once the quantity is applied
    pub applied_class: String,
    /// Row id substring of controls that only expose a text field
    pub text_field_family: String,
    /// Save button of the detail view
    pub save_config: Selector,
    /// Return to product list
    pub back_list: Selector,
}

impl Default for PageMap {
    fn default() -> Self {
        Self {
            language_link: Selector::css(".englishDiv a"),
            login_title: Selector::css("#lblLoginTitle"),
            login_title_text: "Welcome Channel user to login the H3C Configurator".to_string(),
            internal_user_tab: Selector::css("#InternalUser a"),
            username: Selector::css("#userAccounts"),
            password: Selector::css("#password"),
            login_submit: Selector::css("#login_submit"),

            quotation_menu: Selector::css("#myH3CQuotation"),
            new_quotation: Selector::link_text("New"),
            quotation_name: Selector::css("#quoterName"),
            country_dropdown: Selector::css("button[data-id='countryCode']"),
            country_option: "//div[contains(@class, 'dropdown-menu')]//span[text()={value}]"
                .to_string(),
            eccn_yes: Selector::css("input[name='eccn'][value='1']"),
            eccn_no: Selector::css("input[name='eccn'][value='0']"),
            save_quotation: Selector::css("#quotation_sava_btn"),
            configuration_tab: Selector::css(".config_page"),

            standard_tab: Selector::css("#normCfg"),
            parts_tab: Selector::css("#partsCfg"),
            overlay: Selector::css("div.blockUI.blockOverlay"),
            search_input: Selector::css("input[placeholder*='for multiple conditi']"),
            search_button: Selector::css("#searchBtn"),
            result_row: "//tr[contains(., {value})]".to_string(),
            result_code_cell: "//tr[contains(., {value})]/td[2]".to_string(),
            result_checkbox: "//tr[contains(., {value})]//input[@type='checkbox']".to_string(),
            add_button: Selector::css("#addToTable2"),
            ok_button: Selector::css("#ok_button"),
            config_rows: Selector::xpath("//input[@name='checkList']"),
            config_name_attribute: "configname".to_string(),
            edit_by_config: "//tr[.//input[@name='checkList' and @configname={value}]]//a[@class='editConfig pointer']"
                .to_string(),
            edit_by_code: "//tr[.//input[@name='checkList' and contains(@configname, {value})]]//a[@class='editConfig pointer']"
                .to_string(),
            config_name_input: Selector::css("#configName"),
            sets_input: Selector::css("[name='siteNum']"),

            detail_link: "//a[@class='showConfig' and contains(., {value})]".to_string(),
            component_node_id: "node_title__{value}_0".to_string(),
            accessory_page_marker: Selector::css("#allzhankai"),
            expand_all: Selector::css("#expand_all"),
            accessory_row: "//tr[contains(@class, 'item_tr') and .//td[.//span[normalize-space(text())={value}]]]"
                .to_string(),
            row_by_id: "//tr[@id={value}]".to_string(),
            quantity_cell: "//tr[@id={value}]//td[contains(@class, 'item_qty')]".to_string(),
            popup_option: "//div[@id='action_div' and contains(@class, 'popup-menu')]//a[text()={value}]"
                .to_string(),
            popup_options: Selector::xpath(
                "//div[@id='action_div' and contains(@class, 'popup-menu')]//a",
            ),
            editing_class: "editing".to_string(),
            applied_class: "selected".to_string(),
            text_field_family: "License".to_string(),
            save_config: Selector::css("#h3c_save_config"),
            back_list: Selector::css("#back_list"),
        }
    }
}

/// Fill an XPath template with `value` quoted as a literal
#[must_use]
pub fn fill(template: &str, value: &str) -> Selector {
    Selector::XPath(template.replace(PLACEHOLDER, &xpath_literal(value)))
}

impl PageMap {
    /// Country option
    #[must_use]
    pub fn country_option(&self, country: &str) -> Selector {
        fill(&self.country_option, country)
    }

    /// Search result row
    #[must_use]
    pub fn result_row(&self, product: &str) -> Selector {
        fill(&self.result_row, product)
    }

    /// Product code cell of a search result row
    #[must_use]
    pub fn result_code_cell(&self, product: &str) -> Selector {
        fill(&self.result_code_cell, product)
    }

    /// Checkbox of a search result row
    #[must_use]
    pub fn result_checkbox(&self, product: &str) -> Selector {
        fill(&self.result_checkbox, product)
    }

    /// Edit button of the row with identifier `config`
    #[must_use]
    pub fn edit_by_config(&self, config: &str) -> Selector {
        fill(&self.edit_by_config, config)
    }

    /// Edit button of the row whose identifier contains `code`
    #[must_use]
    pub fn edit_by_code(&self, code: &str) -> Selector {
        fill(&self.edit_by_code, code)
    }

    /// Link into the product detail view
    #[must_use]
    pub fn detail_link(&self, product: &str) -> Selector {
        fill(&self.detail_link, product)
    }

    /// Component node for `key`
    #[must_use]
    pub fn component_node(&self, key: &str) -> Selector {
        Selector::id(&self.component_node_id.replace(PLACEHOLDER, key))
    }

    /// Accessory row by cleaned name
    #[must_use]
    pub fn accessory_row(&self, name: &str) -> Selector {
        fill(&self.accessory_row, name)
    }

    /// Row by id
    #[must_use]
    pub fn row_by_id(&self, row_id: &str) -> Selector {
        fill(&self.row_by_id, row_id)
    }

    /// Quantity cell of row `row_id`
    #[must_use]
    pub fn quantity_cell(&self, row_id: &str) -> Selector {
        fill(&self.quantity_cell, row_id)
    }

    /// Popup option labelled exactly `label`
    #[must_use]
    pub fn popup_option(&self, label: &str) -> Selector {
        fill(&self.popup_option, label)
    }

    /// Tab for a product kind
    #[must_use]
    pub const fn tab_for(&self, parts: bool) -> &Selector {
        if parts {
            &self.parts_tab
        } else {
            &self.standard_tab
        }
    }

    /// Whether a row belongs to the text-field-only control family
    #[must_use]
    pub fn is_text_field_family(&self, row_id: &str) -> bool {
        !self.text_field_family.is_empty() && row_id.contains(&self.text_field_family)
    }
}
