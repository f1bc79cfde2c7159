//! # Financial Statement Validator
//!
//! Cross-checks the line items of a financial statement against a curated set
//! of accounting identities and explains every mismatch as a decomposed
//! formula trace.
//!
//! ## Core Concepts
//!
//! - **Subject**: A named line item (e.g. 应收账款). Names are the join key between rows and rules
//! - **Rule Catalog**: Fixed mapping `target → [±source, …]`; at most one rule per target
//! - **Evaluation**: One level deep. Source amounts are read from the row snapshot as entered,
//!   never re-derived from their own rules
//! - **Tolerance**: A row passes when `|current - expected| < 0.01`
//! - **Relation**: Two subjects are related when one is a term of the other's rule (one hop)
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_statement_validator::*;
//!
//! let verifier = StatementVerifier::standard()?;
//! let meta = ReportMeta::new("ACME", "202412", StatementKind::BalanceSheet, AmountColumn::Closing)?;
//! let mut sheet = verifier.open(meta)?;
//!
//! sheet.set_amount("存货账面余额", "1,000,000.00")?;
//! sheet.set_amount("存货跌价准备", "20,000.00")?;
//!
//! if let Some(result) = sheet.validate_row(verifier.catalog(), "存货")? {
//!     if !result.is_valid {
//!         println!("{}", explain(&result));
//!         sheet.apply_correction(verifier.catalog(), "存货", result.expected)?;
//!     }
//! }
//! ```

pub mod amount;
pub mod catalog;
pub mod error;
pub mod evaluator;
pub mod relation;
pub mod report;
pub mod schema;
pub mod sheet;
pub mod template;

pub use amount::{format_amount, parse_amount, parse_report_period, MAX_AMOUNT, TOLERANCE};
pub use catalog::{standard_rules, RuleCatalog, RuleCatalogConfig};
pub use error::{Result, StatementError};
pub use evaluator::{
    evaluate, evaluate_rule, AmountLookup, Evaluator, TermDetail, ValidationResult,
};
pub use relation::{related, RelationResolver};
pub use report::{explain, to_csv, to_markdown, VerificationStatus, VerificationSummary};
pub use schema::*;
pub use sheet::{RowRef, StatementSheet};
pub use template::StatementTemplate;

use log::{debug, info};

/// A rule catalog paired with the template sessions are seeded from.
pub struct StatementVerifier {
    catalog: RuleCatalog,
    template: StatementTemplate,
}

impl StatementVerifier {
    pub fn new(catalog: RuleCatalog, template: StatementTemplate) -> Self {
        let unchecked = template.unchecked_computed_rows(&catalog);
        debug!(
            "{} computed rows in the {} template have no rule",
            unchecked.len(),
            template.statement.label()
        );

        Self { catalog, template }
    }

    /// Built-in balance sheet rules and template.
    pub fn standard() -> Result<Self> {
        Ok(Self::new(
            RuleCatalog::standard()?,
            StatementTemplate::balance_sheet()?,
        ))
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn template(&self) -> &StatementTemplate {
        &self.template
    }

    /// Starts a session with every row seeded empty from the template.
    pub fn open(&self, meta: ReportMeta) -> Result<StatementSheet> {
        StatementSheet::new(meta, &self.template)
    }

    pub fn verify(&self, sheet: &StatementSheet) -> VerificationSummary {
        let summary = sheet.summary(&self.catalog);

        info!(
            "{} for {}: {} of {} checked rows passed, {} failed",
            summary.status.label(),
            sheet.meta().customer_name,
            summary.passed,
            summary.checked,
            summary.failed
        );

        summary
    }
}

/// Checks recognized rows against the built-in rules in one call.
pub fn verify_statement(meta: ReportMeta, rows: Vec<SubjectRow>) -> Result<VerificationSummary> {
    let catalog = RuleCatalog::standard()?;
    let sheet = StatementSheet::from_rows(meta, rows)?;
    Ok(sheet.summary(&catalog))
}
