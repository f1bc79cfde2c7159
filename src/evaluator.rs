use crate::amount::{parse_amount, within_tolerance};
use crate::catalog::RuleCatalog;
use crate::schema::{CalculationRule, Operator};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Read access to the current amount text of each subject in a row snapshot.
pub trait AmountLookup {
    fn amount_text(&self, name: &str) -> Option<&str>;

    /// Resolved numeric amount. Missing or malformed text is zero.
    fn amount(&self, name: &str) -> Decimal {
        self.amount_text(name).map(parse_amount).unwrap_or(Decimal::ZERO)
    }
}

impl AmountLookup for HashMap<String, String> {
    fn amount_text(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl AmountLookup for BTreeMap<String, String> {
    fn amount_text(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl AmountLookup for HashMap<&str, &str> {
    fn amount_text(&self, name: &str) -> Option<&str> {
        self.get(name).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermDetail {
    pub operator: Operator,
    pub source: String,
    /// Resolved amount of the source subject, before the sign is applied.
    pub amount: Decimal,
}

impl TermDetail {
    pub fn signed_amount(&self) -> Decimal {
        match self.operator {
            Operator::Add => self.amount,
            Operator::Subtract => -self.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub target: String,
    pub is_valid: bool,
    /// Signed sum of the formula terms.
    pub expected: Decimal,
    /// Amount entered for the target row itself.
    pub current: Decimal,
    /// Absolute difference between `current` and `expected`.
    pub diff: Decimal,
    /// One entry per formula term, in formula order.
    pub details: Vec<TermDetail>,
}

impl ValidationResult {
    /// `current - expected`; positive when the entered amount is too high.
    pub fn signed_diff(&self) -> Decimal {
        saturating_sub(self.current, self.expected)
    }
}

/// Checks rows against the accounting identities of a catalog.
///
/// Evaluation is one level deep: every source amount is taken from the
/// snapshot as given, even when that source has a rule of its own.
pub struct Evaluator<'a> {
    catalog: &'a RuleCatalog,
}

impl<'a> Evaluator<'a> {
    pub fn new(catalog: &'a RuleCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a RuleCatalog {
        self.catalog
    }

    /// Returns `None` when `target` has no rule; such a row is not
    /// validatable, which is different from failing validation.
    pub fn evaluate<L>(&self, target: &str, rows: &L) -> Option<ValidationResult>
    where
        L: AmountLookup + ?Sized,
    {
        let rule = self.catalog.rule_for(target)?;
        let result = evaluate_rule(rule, rows);

        debug!(
            "Checked {}: expected {}, current {}, diff {} ({})",
            result.target,
            result.expected,
            result.current,
            result.diff,
            if result.is_valid { "ok" } else { "mismatch" }
        );

        Some(result)
    }

    /// Evaluates every rule target in catalog order.
    pub fn evaluate_all<L>(&self, rows: &L) -> Vec<ValidationResult>
    where
        L: AmountLookup + ?Sized,
    {
        self.catalog
            .iter()
            .map(|rule| evaluate_rule(rule, rows))
            .collect()
    }
}

/// Evaluates a single rule against a row snapshot.
///
/// Amounts parsed from text are bounded by [`crate::amount::MAX_AMOUNT`],
/// so the sums here cannot leave the range of `Decimal`. A lookup that overrides
/// [`AmountLookup::amount`] may return anything; sums then saturate at the
/// `Decimal` bounds and an overflowing difference reports `Decimal::MAX`,
/// which always fails the tolerance check.
pub fn evaluate_rule<L>(rule: &CalculationRule, rows: &L) -> ValidationResult
where
    L: AmountLookup + ?Sized,
{
    let mut expected = Decimal::ZERO;
    let mut details = Vec::with_capacity(rule.formula.len());

    for term in &rule.formula {
        let detail = TermDetail {
            operator: term.operator,
            source: term.source.clone(),
            amount: rows.amount(&term.source),
        };
        expected = saturating_add(expected, detail.signed_amount());
        details.push(detail);
    }

    let current = rows.amount(&rule.target);
    let diff = current
        .checked_sub(expected)
        .map_or(Decimal::MAX, |d| d.abs());

    ValidationResult {
        target: rule.target.clone(),
        is_valid: within_tolerance(diff),
        expected,
        current,
        diff,
        details,
    }
}

fn saturating_add(a: Decimal, b: Decimal) -> Decimal {
    a.checked_add(b).unwrap_or(if b.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    })
}

fn saturating_sub(a: Decimal, b: Decimal) -> Decimal {
    saturating_add(a, -b)
}

pub fn evaluate<L>(catalog: &RuleCatalog, target: &str, rows: &L) -> Option<ValidationResult>
where
    L: AmountLookup + ?Sized,
{
    Evaluator::new(catalog).evaluate(target, rows)
}
