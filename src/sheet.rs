use crate::amount::{format_amount, round_amount, MAX_AMOUNT};
use crate::catalog::RuleCatalog;
use crate::error::{Result, StatementError};
use crate::evaluator::{AmountLookup, Evaluator, ValidationResult};
use crate::relation::RelationResolver;
use crate::report::VerificationSummary;
use crate::schema::{ReportMeta, SubjectRow};
use crate::template::StatementTemplate;
use log::{debug, info};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Addresses a row either by display position or by subject name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRef<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for RowRef<'_> {
    fn from(index: usize) -> Self {
        RowRef::Index(index)
    }
}

impl<'a> From<&'a str> for RowRef<'a> {
    fn from(name: &'a str) -> Self {
        RowRef::Name(name)
    }
}

/// One verification session over a single statement.
///
/// Owns the row table for the lifetime of the session. The only write paths
/// are [`StatementSheet::set_amount`] and [`StatementSheet::apply_correction`];
/// every validation query reads the table as it stands at call time.
#[derive(Debug, Clone)]
pub struct StatementSheet {
    meta: ReportMeta,
    rows: Vec<SubjectRow>,
    index: HashMap<String, usize>,
}

impl StatementSheet {
    pub fn new(meta: ReportMeta, template: &StatementTemplate) -> Result<Self> {
        Self::from_rows(meta, template.rows.clone())
    }

    /// Builds a session from rows already in display order. Duplicate names
    /// are rejected here so lookups are never ambiguous.
    pub fn from_rows(meta: ReportMeta, rows: Vec<SubjectRow>) -> Result<Self> {
        let mut index = HashMap::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            if index.insert(row.name.clone(), idx).is_some() {
                return Err(StatementError::DuplicateSubject(row.name.clone()));
            }
        }

        info!(
            "Opened {} verification for {} ({}, {})",
            meta.statement.label(),
            meta.customer_name,
            meta.period_label(),
            meta.column.label()
        );

        Ok(Self { meta, rows, index })
    }

    pub fn meta(&self) -> &ReportMeta {
        &self.meta
    }

    pub fn rows(&self) -> &[SubjectRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, name: &str) -> Option<&SubjectRow> {
        self.index.get(name).map(|&idx| &self.rows[idx])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn resolve(&self, row: RowRef<'_>) -> Result<usize> {
        match row {
            RowRef::Index(index) if index < self.rows.len() => Ok(index),
            RowRef::Index(index) => Err(StatementError::RowIndexOutOfRange {
                index,
                len: self.rows.len(),
            }),
            RowRef::Name(name) => self
                .position(name)
                .ok_or_else(|| StatementError::UnknownSubject(name.to_string())),
        }
    }

    /// Stores new amount text on an input row. The text is kept as entered;
    /// it is parsed only when evaluated.
    pub fn set_amount<'r>(
        &mut self,
        row: impl Into<RowRef<'r>>,
        text: impl Into<String>,
    ) -> Result<()> {
        let idx = self.resolve(row.into())?;
        let target = &mut self.rows[idx];

        if !target.kind.is_editable() {
            return Err(StatementError::NotEditable(target.name.clone()));
        }

        target.amount = text.into();
        Ok(())
    }

    /// Overwrites a row's amount with `value` formatted to two decimals.
    /// Only rows with a calculation rule can be corrected, and only to a
    /// value within [`MAX_AMOUNT`] so the stored text reads back unchanged.
    pub fn apply_correction<'r>(
        &mut self,
        catalog: &RuleCatalog,
        row: impl Into<RowRef<'r>>,
        value: Decimal,
    ) -> Result<()> {
        let idx = self.resolve(row.into())?;
        let target = &mut self.rows[idx];

        if !catalog.has_rule(&target.name) {
            return Err(StatementError::NotCorrectable(target.name.clone()));
        }
        if round_amount(value).abs() > MAX_AMOUNT {
            return Err(StatementError::AmountOutOfRange {
                subject: target.name.clone(),
                amount: value,
            });
        }

        let formatted = format_amount(value);
        debug!(
            "Correcting {}: '{}' -> '{}'",
            target.name, target.amount, formatted
        );
        target.amount = formatted;
        Ok(())
    }

    /// Validates one row against the current table; `Ok(None)` means the row
    /// has no rule and gets no pass/fail indicator.
    pub fn validate_row<'r>(
        &self,
        catalog: &RuleCatalog,
        row: impl Into<RowRef<'r>>,
    ) -> Result<Option<ValidationResult>> {
        let idx = self.resolve(row.into())?;
        Ok(Evaluator::new(catalog).evaluate(&self.rows[idx].name, self))
    }

    /// One entry per row in display order.
    pub fn validate_all(&self, catalog: &RuleCatalog) -> Vec<Option<ValidationResult>> {
        let evaluator = Evaluator::new(catalog);
        self.rows
            .iter()
            .map(|row| evaluator.evaluate(&row.name, self))
            .collect()
    }

    pub fn summary(&self, catalog: &RuleCatalog) -> VerificationSummary {
        VerificationSummary::from_sheet(self, catalog)
    }

    /// Positions of rows directly linked to the hovered row, including the
    /// hovered row itself. Empty when the hovered name is not on the sheet.
    pub fn highlighted(&self, catalog: &RuleCatalog, hovered: &str) -> Vec<usize> {
        if !self.index.contains_key(hovered) {
            return Vec::new();
        }

        let resolver = RelationResolver::new(catalog);
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| resolver.related(hovered, &row.name))
            .map(|(idx, _)| idx)
            .collect()
    }
}

impl AmountLookup for StatementSheet {
    fn amount_text(&self, name: &str) -> Option<&str> {
        self.row(name).map(|r| r.amount.as_str())
    }
}
