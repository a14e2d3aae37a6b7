//! Run settings.
//!
//! Loaded from an optional YAML file. Every field defaults to the value the configurator
//! was tuned with, so an empty file is a valid settings file.

use crate::order::DEFAULT_SECTION;
use crate::page_map::PageMap;
use crate::result::{QuoteflowError, QuoteflowResult};
use crate::retry::RetryPolicy;
use crate::wait::WaitOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Entry page of the configurator
pub const DEFAULT_BASE_URL: &str = "https://iconfig-cloud.h3c.com/iconfig/Index";

/// Bounded wait limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// General element waits
    pub element_ms: u64,
    /// Popup option lookup before falling back to text entry
    pub popup_ms: u64,
    /// Applied-state confirmation of an accessory row
    pub confirm_ms: u64,
    /// Save and back buttons of the detail view
    pub save_ms: u64,
    /// Poll interval of every wait
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element_ms: 20_000,
            popup_ms: 3_000,
            confirm_ms: 5_000,
            save_ms: 10_000,
            poll_interval_ms: 250,
        }
    }
}

impl Timeouts {
    /// Wait options with the given timeout and the common poll interval
    #[must_use]
    pub const fn options(&self, timeout_ms: u64) -> WaitOptions {
        WaitOptions {
            timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    /// Wait options for general element waits
    #[must_use]
    pub const fn element(&self) -> WaitOptions {
        self.options(self.element_ms)
    }
}

/// Fixed delays where the page exposes no completion signal (milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_field_names)]
pub struct SettleTimes {
    /// Landing page after login
    pub after_login_ms: u64,
    /// Quotation list after opening the menu
    pub after_quotation_menu_ms: u64,
    /// Basic information save
    pub after_basic_save_ms: u64,
    /// Configuration page load
    pub after_configuration_tab_ms: u64,
    /// Tab content after switching product tab
    pub after_tab_ms: u64,
    /// Search results
    pub after_search_ms: u64,
    /// Product list refresh after add and confirm
    pub after_add_ms: u64,
    /// Scroll before clicking an edit button
    pub before_edit_click_ms: u64,
    /// Edit dialog animation
    pub after_edit_click_ms: u64,
    /// Detail view load
    pub after_detail_link_ms: u64,
    /// Accessory groups expansion
    pub after_expand_ms: u64,
    /// Scroll of an accessory row
    pub after_scroll_ms: u64,
    /// Popup animation after clicking a quantity cell
    pub after_cell_click_ms: u64,
    /// Page script creating the quantity input
    pub before_field_entry_ms: u64,
    /// Input handlers after assigning a value
    pub after_field_value_ms: u64,
    /// Pause between accessories
    pub between_accessories_ms: u64,
    /// Detail view save
    pub after_save_ms: u64,
    /// Product list after returning
    pub after_back_ms: u64,
    /// Reload during accessory recovery
    pub after_refresh_ms: u64,
    /// Product list after the recovery return
    pub after_recovery_back_ms: u64,
    /// Last look at the result before closing
    pub final_observe_ms: u64,
}

impl Default for SettleTimes {
    fn default() -> Self {
        Self {
            after_login_ms: 10_000,
            after_quotation_menu_ms: 10_000,
            after_basic_save_ms: 2_000,
            after_configuration_tab_ms: 10_000,
            after_tab_ms: 2_000,
            after_search_ms: 3_000,
            after_add_ms: 3_000,
            before_edit_click_ms: 1_000,
            after_edit_click_ms: 2_000,
            after_detail_link_ms: 5_000,
            after_expand_ms: 2_000,
            after_scroll_ms: 2_000,
            after_cell_click_ms: 1_000,
            before_field_entry_ms: 1_000,
            after_field_value_ms: 500,
            between_accessories_ms: 1_000,
            after_save_ms: 2_000,
            after_back_ms: 2_000,
            after_refresh_ms: 5_000,
            after_recovery_back_ms: 3_000,
            final_observe_ms: 10_000,
        }
    }
}

impl SettleTimes {
    /// No fixed delays at all
    #[must_use]
    pub const fn none() -> Self {
        Self {
            after_login_ms: 0,
            after_quotation_menu_ms: 0,
            after_basic_save_ms: 0,
            after_configuration_tab_ms: 0,
            after_tab_ms: 0,
            after_search_ms: 0,
            after_add_ms: 0,
            before_edit_click_ms: 0,
            after_edit_click_ms: 0,
            after_detail_link_ms: 0,
            after_expand_ms: 0,
            after_scroll_ms: 0,
            after_cell_click_ms: 0,
            before_field_entry_ms: 0,
            after_field_value_ms: 0,
            between_accessories_ms: 0,
            after_save_ms: 0,
            after_back_ms: 0,
            after_refresh_ms: 0,
            after_recovery_back_ms: 0,
            final_observe_ms: 0,
        }
    }
}

/// Convert a settle field to a duration
#[must_use]
pub const fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Everything a run can be tuned with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Entry page
    pub base_url: String,
    /// Run Chromium without a window
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Chromium executable, auto-detected when absent
    pub chromium_path: Option<PathBuf>,
    /// Directory for diagnostic snapshots
    pub output_dir: PathBuf,
    /// Designated section of the order file
    pub section: String,
    /// Retry policy for tab activation and edit navigation
    pub retry: RetryPolicy,
    /// Bounded wait limits
    pub timeouts: Timeouts,
    /// Fixed delays
    pub settle: SettleTimes,
    /// Selectors of the target page
    pub page: PageMap,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            headless: false,
            window_width: 1920,
            window_height: 1080,
            chromium_path: None,
            output_dir: PathBuf::from("."),
            section: DEFAULT_SECTION.to_string(),
            retry: RetryPolicy::default(),
            timeouts: Timeouts::default(),
            settle: SettleTimes::default(),
            page: PageMap::default(),
        }
    }
}

impl Settings {
    /// Parse settings from YAML
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or a value is out of range.
    pub fn from_yaml_str(yaml: &str) -> QuoteflowResult<Self> {
        let settings: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(yaml)?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> QuoteflowResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| QuoteflowError::Settings {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&text)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> QuoteflowResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`QuoteflowError::Settings`] naming the first invalid field.
    pub fn validate(&self) -> QuoteflowResult<()> {
        let invalid = |message: &str| {
            Err(QuoteflowError::Settings {
                message: message.to_string(),
            })
        };
        if self.base_url.trim().is_empty() {
            return invalid("base_url must not be empty");
        }
        if self.section.trim().is_empty() {
            return invalid("section must not be empty");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if !self.retry.backoff.is_finite() || self.retry.backoff < 1.0 {
            return invalid("retry.backoff must be a finite number >= 1.0");
        }
        if self.timeouts.poll_interval_ms == 0 {
            return invalid("timeouts.poll_interval_ms must be positive");
        }
        if self.window_width == 0 || self.window_height == 0 {
            return invalid("window size must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    mod defaults_tests {
        use super::*;

        #[test]
        fn test_defaults_match_tuned_values() {
            let settings = Settings::default();
            assert_eq!(settings.base_url, DEFAULT_BASE_URL);
            assert_eq!(settings.section, "Page 2: Configuration");
            assert_eq!(settings.retry.max_attempts, 3);
            assert_eq!(settings.retry.delay_ms, 1_000);
            assert_eq!(settings.timeouts.element_ms, 20_000);
            assert_eq!(settings.timeouts.popup_ms, 3_000);
            assert_eq!(settings.timeouts.confirm_ms, 5_000);
            assert_eq!(settings.settle.after_login_ms, 10_000);
            assert_eq!(settings.settle.after_field_value_ms, 500);
        }

        #[test]
        fn test_empty_yaml_is_default() {
            assert_eq!(Settings::from_yaml_str("").unwrap(), Settings::default());
            assert_eq!(Settings::from_yaml_str("  \n").unwrap(), Settings::default());
        }

        #[test]
        fn test_settle_none() {
            let none = SettleTimes::none();
            assert_eq!(none.after_refresh_ms, 0);
            assert_eq!(ms(none.final_observe_ms), Duration::ZERO);
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_override() {
            let yaml = r"
headless: true
retry:
  max_attempts: 5
timeouts:
  popup_ms: 1500
settle:
  after_login_ms: 0
";
            let settings = Settings::from_yaml_str(yaml).unwrap();
            assert!(settings.headless);
            assert_eq!(settings.retry.max_attempts, 5);
            assert_eq!(settings.retry.delay_ms, 1_000);
            assert_eq!(settings.timeouts.popup_ms, 1_500);
            assert_eq!(settings.timeouts.element_ms, 20_000);
            assert_eq!(settings.settle.after_login_ms, 0);
            assert_eq!(settings.settle.after_search_ms, 3_000);
        }

        #[test]
        fn test_roundtrip_yaml() {
            let settings = Settings::default();
            let yaml = settings.to_yaml().unwrap();
            assert_eq!(Settings::from_yaml_str(&yaml).unwrap(), settings);
        }

        #[test]
        fn test_invalid_values_rejected() {
            let err = Settings::from_yaml_str("retry:\n  max_attempts: 0\n").unwrap_err();
            assert!(err.to_string().contains("max_attempts"));
            let err = Settings::from_yaml_str("retry:\n  backoff: 0.5\n").unwrap_err();
            assert!(err.to_string().contains("backoff"));
            let err = Settings::from_yaml_str("base_url: ''\n").unwrap_err();
            assert!(err.to_string().contains("base_url"));
        }

        #[test]
        fn test_malformed_yaml() {
            let err = Settings::from_yaml_str("retry: [1, 2").unwrap_err();
            assert!(matches!(err, QuoteflowError::Yaml(_)));
        }
    }

    mod file_tests {
        use super::*;

        #[test]
        fn test_load_from_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "output_dir: shots\nsection: 'Page 3: Parts'").unwrap();
            let settings = Settings::load(file.path()).unwrap();
            assert_eq!(settings.output_dir, PathBuf::from("shots"));
            assert_eq!(settings.section, "Page 3: Parts");
        }

        #[test]
        fn test_missing_file() {
            let dir = tempfile::tempdir().unwrap();
            let err = Settings::load(&dir.path().join("nope.yaml")).unwrap_err();
            assert!(matches!(err, QuoteflowError::Settings { .. }));
        }
    }
}
