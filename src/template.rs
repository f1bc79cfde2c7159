use crate::catalog::RuleCatalog;
use crate::error::{Result, StatementError};
use crate::schema::RowKind::{Computed as C, Header as H, Input as I};
use crate::schema::{RowKind, StatementKind, SubjectRow};
use log::{info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The fixed row layout a verification session is seeded from.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatementTemplate {
    pub statement: StatementKind,

    #[schemars(description = "Rows in any order; they are sorted by sort_index when loaded. Names must be unique.")]
    pub rows: Vec<SubjectRow>,
}

impl StatementTemplate {
    /// Checks name uniqueness and puts rows into display order.
    pub fn new(statement: StatementKind, mut rows: Vec<SubjectRow>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(row.name.as_str()) {
                return Err(StatementError::DuplicateSubject(row.name.clone()));
            }
        }

        rows.sort_by_key(|r| r.sort_index);

        info!(
            "Loaded {} template with {} rows",
            statement.label(),
            rows.len()
        );

        Ok(Self { statement, rows })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: StatementTemplate = serde_json::from_str(json)?;
        Self::new(raw.statement, raw.rows)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = schemars::schema_for!(StatementTemplate);
        Ok(serde_json::to_string_pretty(&schema)?)
    }

    /// Computed rows with no rule in `catalog`. These stay display-only and
    /// are never offered a pass/fail indicator or a correction.
    pub fn unchecked_computed_rows<'t>(&'t self, catalog: &RuleCatalog) -> Vec<&'t str> {
        let unchecked: Vec<&str> = self
            .rows
            .iter()
            .filter(|r| r.kind == RowKind::Computed && !catalog.has_rule(&r.name))
            .map(|r| r.name.as_str())
            .collect();

        for name in &unchecked {
            warn!("Computed row '{}' has no calculation rule; it will not be validated", name);
        }

        unchecked
    }

    /// The standard enterprise balance sheet, covering every subject named by
    /// [`RuleCatalog::standard`].
    pub fn balance_sheet() -> Result<Self> {
        Self::new(StatementKind::BalanceSheet, seed(BALANCE_SHEET_LAYOUT))
    }
}

const BALANCE_SHEET_LAYOUT: &[(&str, RowKind, u32)] = &[
    ("【流动资产：】", H, 0),
    ("货币资金", I, 1),
    ("以公允价值计量且其变动计入当期损益的金融资产", I, 1),
    ("衍生金融资产", I, 1),
    ("应收票据", I, 1),
    ("应收账款", C, 1),
    ("应收账款账面价值合计", C, 2),
    ("应收账款账面余额合计", C, 3),
    ("1年以内（含1年）", I, 4),
    ("1年至2年（含2年）", I, 4),
    ("2年至3年（含3年）", I, 4),
    ("3年以上", I, 4),
    ("应收账款坏账准备", I, 3),
    ("预付款项", I, 1),
    ("其他应收款", I, 1),
    ("存货", C, 1),
    ("存货账面余额", I, 2),
    ("存货跌价准备", I, 2),
    ("持有待售资产", I, 1),
    ("一年内到期的非流动资产", I, 1),
    ("其他流动资产", I, 1),
    ("【流动资产合计】", C, 0),
    ("【非流动资产：】", H, 0),
    ("可供出售金融资产", I, 1),
    ("持有至到期投资", I, 1),
    ("长期应收款", I, 1),
    ("长期股权投资", I, 1),
    ("投资性房地产", C, 1),
    ("投资性房地产账面价值合计：", C, 2),
    ("房屋、建筑物帐面价值（成本模式）", I, 3),
    ("土地使用权账面价值（成本模式）", I, 3),
    ("投资性房地产公允价值合计：", C, 2),
    ("房屋、建筑物公允价值（公允价值模式）", I, 3),
    ("土地使用权公允价值（公允价值模式）", I, 3),
    ("固定资产", C, 1),
    ("固定资产账面价值合计：", C, 2),
    ("固定资产一原值", I, 3),
    ("固定资产累计折旧", I, 3),
    ("固定资产减值准备合计", I, 3),
    ("在建工程", I, 1),
    ("生产性生物资产", I, 1),
    ("油气资产", I, 1),
    ("无形资产", I, 1),
    ("开发支出", I, 1),
    ("商誉", I, 1),
    ("长期待摊费用", I, 1),
    ("递延所得税资产", I, 1),
    ("其他非流动资产", I, 1),
    ("【非流动资产合计】", C, 0),
    ("【资产总计】", C, 0),
    ("【流动负债：】", H, 0),
    ("短期借款", C, 1),
    ("短期借款合计：", C, 2),
    ("信用借款（短期）", I, 3),
    ("抵押贷款（短期）", I, 3),
    ("质押贷款（短期）", I, 3),
    ("保证贷款（短期）", I, 3),
    ("以公允价值计量且其变动计入当期损益的金融负债", I, 1),
    ("衍生金融负债", I, 1),
    ("应付票据", I, 1),
    ("应付账款", I, 1),
    ("预收款项", I, 1),
    ("应付职工薪酬", I, 1),
    ("应交税费", I, 1),
    ("其他应付款", I, 1),
    ("持有待售负债", I, 1),
    ("一年内到期的非流动负债", I, 1),
    ("其他流动负债", I, 1),
    ("【流动负债合计】", C, 0),
    ("【非流动负债：】", H, 0),
    ("长期借款", C, 1),
    ("长期借款合计：", C, 2),
    ("信用借款（长期）", I, 3),
    ("抵押贷款（长期）", I, 3),
    ("质押贷款（长期）", I, 3),
    ("保证贷款（长期）", I, 3),
    ("应付债券", I, 1),
    ("长期应付款", I, 1),
    ("预计负债", I, 1),
    ("递延收益", I, 1),
    ("递延所得税负债", I, 1),
    ("其他非流动负债", I, 1),
    ("【非流动负债合计】", C, 0),
    ("【负债合计】", C, 0),
    ("【所有者权益（或股东权益）：】", H, 0),
    ("实收资本（或股本）", I, 1),
    ("其他权益工具", I, 1),
    ("资本公积", I, 1),
    ("减：库存股", I, 1),
    ("其他综合收益", I, 1),
    ("专项存储", I, 1),
    ("盈余公积", I, 1),
    ("未分配利润", I, 1),
    ("【归属于母公司所有者权益合计】", C, 0),
    ("少数股东权益", I, 1),
    ("【所有者权益（或股东权益）合计】", C, 0),
    ("【负债和所有者权益（或股东权益）总计】", C, 0),
    ("【补充资料：】", H, 0),
    ("借款合计：", C, 1),
    ("资产减值准备合计：", C, 1),
    ("坏账准备", I, 2),
    ("可供出售金融资产减值准备", I, 2),
    ("持有至到期投资减值准备", I, 2),
    ("长期股权投资减值准备", I, 2),
    ("投资性房地产减值准备", I, 2),
    ("固定资产减值准备", I, 2),
    ("工程物资减值准备", I, 2),
    ("在建工程减值准备", I, 2),
    ("生产性生物资产减值准备", I, 2),
    ("油气资产减值准备", I, 2),
    ("无形资产减值准备", I, 2),
    ("商誉减值准备", I, 2),
    ("其他", I, 2),
];

fn seed(layout: &[(&str, RowKind, u32)]) -> Vec<SubjectRow> {
    layout
        .iter()
        .enumerate()
        .map(|(idx, &(name, kind, indent))| SubjectRow::new(name, kind, indent, idx as i32 + 1))
        .collect()
}
