use crate::amount::{format_amount, parse_amount};
use crate::catalog::RuleCatalog;
use crate::evaluator::ValidationResult;
use crate::schema::{Operator, RowKind, StatementKind};
use crate::sheet::StatementSheet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Success,
    Failed,
}

impl VerificationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            VerificationStatus::Success => "校验成功",
            VerificationStatus::Failed => "校验失败",
        }
    }
}

/// Outcome of checking every validatable row of a sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub statement: StatementKind,
    pub status: VerificationStatus,
    /// Rows that have a rule.
    pub checked: usize,
    pub passed: usize,
    pub failed: usize,
    /// Failing results in display order.
    pub failures: Vec<ValidationResult>,
}

impl VerificationSummary {
    pub fn from_sheet(sheet: &StatementSheet, catalog: &RuleCatalog) -> Self {
        let results: Vec<ValidationResult> =
            sheet.validate_all(catalog).into_iter().flatten().collect();

        let checked = results.len();
        let failures: Vec<ValidationResult> =
            results.into_iter().filter(|r| !r.is_valid).collect();
        let status = if failures.is_empty() {
            VerificationStatus::Success
        } else {
            VerificationStatus::Failed
        };

        Self {
            statement: sheet.meta().statement,
            status,
            checked,
            passed: checked - failures.len(),
            failed: failures.len(),
            failures,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == VerificationStatus::Success
    }
}

/// Spells out how the expected value was reached, e.g.
/// `存货 = 存货账面余额(100.00) - 存货跌价准备(20.00) = 80.00; entered 90.00, diff 10.00`.
pub fn explain(result: &ValidationResult) -> String {
    let mut trace = format!("{} =", result.target);

    for (idx, term) in result.details.iter().enumerate() {
        let op = match (idx, term.operator) {
            (0, Operator::Add) => String::new(),
            (0, Operator::Subtract) => "-".to_string(),
            (_, op) => format!("{} ", op),
        };
        trace.push_str(&format!(" {}{}({})", op, term.source, format_amount(term.amount)));
    }

    trace.push_str(&format!(
        " = {}; entered {}, diff {}",
        format_amount(result.expected),
        format_amount(result.current),
        format_amount(result.diff)
    ));

    trace
}

pub fn to_markdown(sheet: &StatementSheet, catalog: &RuleCatalog) -> String {
    let meta = sheet.meta();
    let summary = VerificationSummary::from_sheet(sheet, catalog);
    let mut output = String::new();

    output.push_str(&format!(
        "# {} - {}\n\n",
        meta.statement.label(),
        meta.customer_name
    ));
    output.push_str(&format!(
        "**Period:** {} | **Column:** {} | **Status:** {} ({}/{} passed)\n\n",
        meta.period_label(),
        meta.column.label(),
        summary.status.label(),
        summary.passed,
        summary.checked
    ));

    output.push_str("| # | Subject | Amount | Check |\n");
    output.push_str("|---|---|---:|---|\n");

    let results = sheet.validate_all(catalog);
    for (idx, (row, result)) in sheet.rows().iter().zip(&results).enumerate() {
        let indent = "\u{3000}".repeat(row.indent_level as usize);
        let name = match row.kind {
            RowKind::Header => format!("**{}**", row.name),
            _ => row.name.clone(),
        };
        let amount = if row.amount.trim().is_empty() {
            String::new()
        } else {
            format_amount(parse_amount(&row.amount))
        };
        let check = match result {
            Some(r) if r.is_valid => "✅".to_string(),
            Some(r) => format!(
                "❌ expected {} (diff {})",
                format_amount(r.expected),
                format_amount(r.diff)
            ),
            None => String::new(),
        };

        output.push_str(&format!(
            "| {} | {}{} | {} | {} |\n",
            idx + 1,
            indent,
            name,
            amount,
            check
        ));
    }
    output.push('\n');

    if !summary.failures.is_empty() {
        output.push_str("## Discrepancies\n\n");
        for failure in &summary.failures {
            output.push_str(&format!("- {}\n", explain(failure)));
        }
        output.push('\n');
    }

    output
}

pub fn to_csv(sheet: &StatementSheet, catalog: &RuleCatalog) -> String {
    let mut output = String::new();
    output.push_str("Index,Subject,Kind,Amount,Expected,Diff,Status\n");

    let results = sheet.validate_all(catalog);
    for (row, result) in sheet.rows().iter().zip(&results) {
        let (expected, diff, status) = match result {
            Some(r) => {
                let status = if r.is_valid { "pass" } else { "fail" };
                (format_amount(r.expected), format_amount(r.diff), status)
            }
            None => (String::new(), String::new(), ""),
        };

        output.push_str(&format!(
            "{},{},{:?},{},{},{},{}\n",
            row.sort_index,
            csv_field(&row.name),
            row.kind,
            csv_field(&row.amount),
            csv_field(&expected),
            csv_field(&diff),
            status
        ));
    }

    output
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AmountColumn, ReportMeta, SubjectRow};

    fn receivables_sheet(book_value: &str) -> StatementSheet {
        let meta = ReportMeta::new(
            "测试客户",
            "202412",
            StatementKind::BalanceSheet,
            AmountColumn::Closing,
        )
        .unwrap();
        let rows = vec![
            SubjectRow::new("【流动资产：】", RowKind::Header, 0, 1),
            SubjectRow::new("应收账款账面价值合计", RowKind::Computed, 1, 2)
                .with_amount(book_value),
            SubjectRow::new("应收账款账面余额合计", RowKind::Input, 2, 3).with_amount("300"),
            SubjectRow::new("应收账款坏账准备", RowKind::Input, 2, 4).with_amount("50"),
        ];
        StatementSheet::from_rows(meta, rows).unwrap()
    }

    #[test]
    fn test_summary_counts() {
        let catalog = RuleCatalog::standard().unwrap();

        let summary = VerificationSummary::from_sheet(&receivables_sheet("260"), &catalog);
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.passed, 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.status.label(), "校验失败");

        let summary = VerificationSummary::from_sheet(&receivables_sheet("250.00"), &catalog);
        assert!(summary.is_success());
        assert_eq!(summary.status.label(), "校验成功");
    }

    #[test]
    fn test_explain_trace() {
        let catalog = RuleCatalog::standard().unwrap();
        let sheet = receivables_sheet("260");
        let result = sheet
            .validate_row(&catalog, "应收账款账面价值合计")
            .unwrap()
            .unwrap();

        assert_eq!(
            explain(&result),
            "应收账款账面价值合计 = 应收账款账面余额合计(300.00) - 应收账款坏账准备(50.00) = 250.00; entered 260.00, diff 10.00"
        );
    }

    #[test]
    fn test_markdown_report() {
        let catalog = RuleCatalog::standard().unwrap();
        let markdown = to_markdown(&receivables_sheet("260"), &catalog);

        assert!(markdown.contains("# 资产负债表 - 测试客户"));
        assert!(markdown.contains("**Period:** 202412"));
        assert!(markdown.contains("校验失败 (0/1 passed)"));
        assert!(markdown.contains("**【流动资产：】**"));
        assert!(markdown.contains("❌ expected 250.00 (diff 10.00)"));
        assert!(markdown.contains("## Discrepancies"));
    }

    #[test]
    fn test_csv_report() {
        let catalog = RuleCatalog::standard().unwrap();
        let csv = to_csv(&receivables_sheet("1,260"), &catalog);

        assert!(csv.starts_with("Index,Subject,Kind,Amount,Expected,Diff,Status\n"));
        assert!(csv.contains("2,应收账款账面价值合计,Computed,\"1,260\",250.00,\"1,010.00\",fail"));
        assert!(csv.contains("3,应收账款账面余额合计,Input,300,,,\n"));
        assert!(csv.contains("1,【流动资产：】,Header,,,,\n"));
    }
}
