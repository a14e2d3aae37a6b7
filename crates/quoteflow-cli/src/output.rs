//! Output formatting and status reporting

use console::{style, Style, Term};
use quoteflow::{AccessoryQuantity, Configuration, Outcome, ProductKind, RunReport};
use serde::Serialize;

/// A scalar setting of the order file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingView {
    /// Key
    pub key: String,
    /// Value
    pub value: String,
}

/// An accessory as it will be entered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryView {
    /// Name as written
    pub name: String,
    /// Requested quantity
    pub quantity: AccessoryQuantity,
}

/// A product as it will be entered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    /// Product name
    pub name: String,
    /// Number of sets
    pub quantity: u32,
    /// Classification from the name prefix
    pub kind: ProductKind,
    /// Tab the product is added from
    pub tab: ProductKind,
    /// Accessories in order
    pub accessories: Vec<AccessoryView>,
}

/// Dry-run view of a parsed order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    /// Product section name
    pub section: String,
    /// Scalar settings
    pub settings: Vec<SettingView>,
    /// Products in order
    pub products: Vec<ProductView>,
}

impl OrderView {
    /// Build from a parsed configuration
    #[must_use]
    pub fn new(config: &Configuration, section: &str) -> Self {
        Self {
            section: section.to_string(),
            settings: config
                .settings()
                .iter()
                .map(|(key, value)| SettingView {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            products: config
                .products()
                .iter()
                .map(|p| ProductView {
                    name: p.name.clone(),
                    quantity: p.quantity,
                    kind: p.kind(),
                    tab: p.kind().effective(),
                    accessories: p
                        .accessories
                        .iter()
                        .map(|a| AccessoryView {
                            name: a.name.clone(),
                            quantity: a.quantity,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Indented text rendering
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for setting in &self.settings {
            out.push_str(&format!("{}: {}\n", setting.key, setting.value));
        }
        out.push_str(&format!("\n{} ({} products)\n", self.section, self.products.len()));
        for product in &self.products {
            let note = if product.kind == ProductKind::Unknown {
                " (unrecognized prefix, uses the Standard tab)"
            } else {
                ""
            };
            out.push_str(&format!(
                "  {} x{} [{}]{note}\n",
                product.name, product.quantity, product.tab
            ));
            for accessory in &product.accessories {
                out.push_str(&format!("      {} {}\n", accessory.name, accessory.quantity));
            }
        }
        out
    }
}

/// Status reporter for the terminal
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "SKIP".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print one line per product and accessory, then the totals
    pub fn report(&self, report: &RunReport) {
        self.header("Run summary");
        for product in &report.products {
            let line = format!("{} x{} [{}]", product.name, product.quantity, product.kind);
            self.outcome(&line, &product.outcome);
            if let Some(phase) = product.accessory_phase.as_ref().filter(|o| !o.is_success()) {
                self.outcome(&format!("  {} accessories", product.name), phase);
            }
            for accessory in &product.accessories {
                let line = format!("  {} {}", accessory.name, accessory.requested);
                self.outcome(&line, &accessory.outcome);
            }
        }
        self.summary(report);
    }

    fn outcome(&self, line: &str, outcome: &Outcome) {
        match outcome {
            Outcome::Success => self.success(line),
            Outcome::Skipped { reason } => self.warning(&format!("{line}: {reason}")),
            Outcome::Fatal { reason } => self.failure(&format!("{line}: {reason}")),
        }
    }

    /// Print the totals line
    pub fn summary(&self, report: &RunReport) {
        if self.quiet && !report.aborted() {
            return;
        }
        let total = report.products.len();
        let entered = report.succeeded();
        let accessories = report.accessories_applied();
        let status = if report.aborted() { "ABORTED" } else { "DONE" };
        let line = format!(
            "{status} {entered}/{total} products entered, {accessories} accessory quantities applied (final state {})",
            report.final_state
        );
        let _ = self.term.write_line("");
        if self.use_color {
            let status_style = if report.aborted() {
                Style::new().red().bold()
            } else {
                Style::new().green().bold()
            };
            let _ = self.term.write_line(&line.replacen(
                status,
                &status_style.apply_to(status).to_string(),
                1,
            ));
        } else {
            let _ = self.term.write_line(&line);
        }
        if let Some(ref fatal) = report.fatal {
            self.failure(fatal);
        }
    }
}
