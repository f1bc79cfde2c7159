use crate::amount::{format_report_period, parse_report_period};
use crate::error::Result;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    #[schemars(description = "资产负债表: point-in-time balances of assets, liabilities and equity")]
    BalanceSheet,

    #[schemars(description = "利润表: revenue, costs and profit over the reporting period")]
    IncomeStatement,

    #[schemars(description = "现金流量表: cash movements over the reporting period")]
    CashFlow,
}

impl StatementKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatementKind::BalanceSheet => "资产负债表",
            StatementKind::IncomeStatement => "利润表",
            StatementKind::CashFlow => "现金流量表",
        }
    }
}

/// Which recognized column of the source report the amounts were taken from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AmountColumn {
    #[schemars(description = "期初余额: balance at the start of the period")]
    Opening,

    #[default]
    #[schemars(description = "期末余额: balance at the end of the period")]
    Closing,
}

impl AmountColumn {
    pub fn label(&self) -> &'static str {
        match self {
            AmountColumn::Opening => "期初余额",
            AmountColumn::Closing => "期末余额",
        }
    }
}

/// How a row participates in the statement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    #[schemars(description = "User-editable leaf amount")]
    Input,

    #[schemars(description = "Display-only amount that is always derived from other subjects")]
    Computed,

    #[schemars(description = "Caption row (bracketed names); never editable")]
    Header,
}

impl RowKind {
    pub fn is_editable(&self) -> bool {
        matches!(self, RowKind::Input)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct SubjectRow {
    #[schemars(description = "Subject name, unique within the statement. Acts as the join key for calculation rules.")]
    pub name: String,

    pub kind: RowKind,

    #[serde(default)]
    #[schemars(description = "Visual nesting depth. Has no computational effect.")]
    pub indent_level: u32,

    #[schemars(description = "Fixed display position assigned by the template")]
    pub sort_index: i32,

    #[serde(default)]
    #[schemars(description = "Amount as formatted text (e.g. '1,234.00'). Empty or unparseable text counts as zero.")]
    pub amount: String,
}

impl SubjectRow {
    pub fn new(name: impl Into<String>, kind: RowKind, indent_level: u32, sort_index: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            indent_level,
            sort_index,
            amount: String::new(),
        }
    }

    pub fn with_amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = amount.into();
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct FormulaTerm {
    pub operator: Operator,
    #[schemars(description = "Name of the subject whose amount contributes to the target")]
    pub source: String,
}

impl FormulaTerm {
    pub fn add(source: impl Into<String>) -> Self {
        Self {
            operator: Operator::Add,
            source: source.into(),
        }
    }

    pub fn subtract(source: impl Into<String>) -> Self {
        Self {
            operator: Operator::Subtract,
            source: source.into(),
        }
    }
}

/// An accounting identity: `target = ±source₁ ±source₂ …`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct CalculationRule {
    #[schemars(description = "Subject whose amount is checked. At most one rule per target.")]
    pub target: String,

    #[schemars(description = "Ordered signed terms summed to produce the expected amount")]
    pub formula: Vec<FormulaTerm>,
}

impl CalculationRule {
    pub fn new(target: impl Into<String>, formula: Vec<FormulaTerm>) -> Self {
        Self {
            target: target.into(),
            formula,
        }
    }

    pub fn references(&self, source: &str) -> bool {
        self.formula.iter().any(|term| term.source == source)
    }
}

/// Descriptive data about the report under verification. Carried by the
/// session for rendering; never consulted by the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ReportMeta {
    pub customer_name: String,

    #[schemars(description = "Month-end date of the reporting period")]
    pub period: NaiveDate,

    pub statement: StatementKind,

    #[serde(default)]
    pub column: AmountColumn,
}

impl ReportMeta {
    /// Builds metadata from a `YYYYMM` period string.
    pub fn new(
        customer_name: impl Into<String>,
        period: &str,
        statement: StatementKind,
        column: AmountColumn,
    ) -> Result<Self> {
        Ok(Self {
            customer_name: customer_name.into(),
            period: parse_report_period(period)?,
            statement,
            column,
        })
    }

    pub fn period_label(&self) -> String {
        format_report_period(self.period)
    }
}
