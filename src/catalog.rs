use crate::error::{Result, StatementError};
use crate::schema::{CalculationRule, FormulaTerm};
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;

/// Serialized form of a rule catalog.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RuleCatalogConfig {
    #[schemars(description = "Ordered list of calculation rules. Each target subject may appear at most once.")]
    pub rules: Vec<CalculationRule>,
}

/// Immutable, ordered set of calculation rules keyed by target subject.
///
/// Construction validates the rule set once; every query afterwards is a pure
/// read, so a catalog can be shared freely across threads.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<CalculationRule>,
    by_target: HashMap<String, usize>,
}

impl RuleCatalog {
    /// Builds a catalog, failing on duplicate targets, empty formulas, or
    /// rules that derive a subject from itself through any chain.
    pub fn new(rules: Vec<CalculationRule>) -> Result<Self> {
        let mut by_target = HashMap::with_capacity(rules.len());

        for (idx, rule) in rules.iter().enumerate() {
            if rule.formula.is_empty() {
                return Err(StatementError::EmptyFormula(rule.target.clone()));
            }
            if by_target.insert(rule.target.clone(), idx).is_some() {
                return Err(StatementError::DuplicateRuleTarget(rule.target.clone()));
            }
        }

        let catalog = Self { rules, by_target };
        catalog.dependency_order()?;

        info!(
            "Loaded rule catalog with {} rules ({} distinct subjects)",
            catalog.rules.len(),
            catalog.subjects().len()
        );

        Ok(catalog)
    }

    /// The built-in balance sheet identities.
    pub fn standard() -> Result<Self> {
        Self::new(standard_rules())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: RuleCatalogConfig = serde_json::from_str(json)?;
        Self::new(config.rules)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let config: RuleCatalogConfig = serde_json::from_reader(reader)?;
        Self::new(config.rules)
    }

    pub fn to_json(&self) -> Result<String> {
        let config = RuleCatalogConfig {
            rules: self.rules.clone(),
        };
        Ok(serde_json::to_string_pretty(&config)?)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = schemars::schema_for!(RuleCatalogConfig);
        Ok(serde_json::to_string_pretty(&schema)?)
    }

    pub fn rule_for(&self, target: &str) -> Option<&CalculationRule> {
        self.by_target.get(target).map(|&idx| &self.rules[idx])
    }

    pub fn has_rule(&self, target: &str) -> bool {
        self.by_target.contains_key(target)
    }

    /// All rules whose formula uses `source` as a term, in catalog order.
    pub fn rules_referencing(&self, source: &str) -> Vec<&CalculationRule> {
        self.rules.iter().filter(|r| r.references(source)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalculationRule> {
        self.rules.iter()
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.target.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every subject named anywhere in the catalog, as target or source.
    pub fn subjects(&self) -> HashSet<&str> {
        self.rules
            .iter()
            .flat_map(|r| {
                std::iter::once(r.target.as_str())
                    .chain(r.formula.iter().map(|t| t.source.as_str()))
            })
            .collect()
    }

    /// Targets ordered so that any target used as a source by another rule
    /// comes first. Ties keep catalog order.
    pub fn dependency_order(&self) -> Result<Vec<&str>> {
        // in-degree counts only sources that are themselves rule targets
        let mut pending: BTreeMap<usize, usize> = BTreeMap::new();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();

        for (idx, rule) in self.rules.iter().enumerate() {
            let mut upstream = HashSet::new();
            for term in &rule.formula {
                if let Some(&dep) = self.by_target.get(&term.source) {
                    if upstream.insert(dep) {
                        dependents.entry(dep).or_default().push(idx);
                    }
                }
            }
            pending.insert(idx, upstream.len());
        }

        let mut order = Vec::with_capacity(self.rules.len());
        loop {
            let ready: Vec<usize> = pending
                .iter()
                .filter(|(_, count)| **count == 0)
                .map(|(&idx, _)| idx)
                .collect();

            if ready.is_empty() {
                break;
            }

            for idx in ready {
                pending.remove(&idx);
                order.push(self.rules[idx].target.as_str());
                if let Some(children) = dependents.get(&idx) {
                    for child in children {
                        if let Some(count) = pending.get_mut(child) {
                            *count -= 1;
                        }
                    }
                }
            }
        }

        if let Some((&idx, _)) = pending.iter().next() {
            return Err(StatementError::CyclicRule(self.rules[idx].target.clone()));
        }

        Ok(order)
    }
}

fn rule(target: &str, formula: &[(char, &str)]) -> CalculationRule {
    let terms = formula
        .iter()
        .map(|&(op, source)| match op {
            '-' => FormulaTerm::subtract(source),
            _ => FormulaTerm::add(source),
        })
        .collect();
    CalculationRule::new(target, terms)
}

/// Balance sheet identities under the 2019 enterprise report format.
pub fn standard_rules() -> Vec<CalculationRule> {
    vec![
        rule("应收账款", &[('+', "应收账款账面价值合计")]),
        rule(
            "应收账款账面价值合计",
            &[('+', "应收账款账面余额合计"), ('-', "应收账款坏账准备")],
        ),
        rule(
            "应收账款账面余额合计",
            &[
                ('+', "1年以内（含1年）"),
                ('+', "1年至2年（含2年）"),
                ('+', "2年至3年（含3年）"),
                ('+', "3年以上"),
            ],
        ),
        rule("存货", &[('+', "存货账面余额"), ('-', "存货跌价准备")]),
        rule(
            "【流动资产合计】",
            &[
                ('+', "货币资金"),
                ('+', "以公允价值计量且其变动计入当期损益的金融资产"),
                ('+', "衍生金融资产"),
                ('+', "应收票据"),
                ('+', "应收账款"),
                ('+', "预付款项"),
                ('+', "其他应收款"),
                ('+', "存货"),
                ('+', "持有待售资产"),
                ('+', "一年内到期的非流动资产"),
                ('+', "其他流动资产"),
            ],
        ),
        rule(
            "投资性房地产",
            &[
                ('+', "投资性房地产账面价值合计："),
                ('+', "投资性房地产公允价值合计："),
            ],
        ),
        rule(
            "投资性房地产账面价值合计：",
            &[
                ('+', "房屋、建筑物帐面价值（成本模式）"),
                ('+', "土地使用权账面价值（成本模式）"),
            ],
        ),
        rule(
            "投资性房地产公允价值合计：",
            &[
                ('+', "房屋、建筑物公允价值（公允价值模式）"),
                ('+', "土地使用权公允价值（公允价值模式）"),
            ],
        ),
        rule("固定资产", &[('+', "固定资产账面价值合计：")]),
        rule(
            "固定资产账面价值合计：",
            &[
                ('+', "固定资产一原值"),
                ('-', "固定资产累计折旧"),
                ('-', "固定资产减值准备合计"),
            ],
        ),
        rule(
            "【非流动资产合计】",
            &[
                ('+', "可供出售金融资产"),
                ('+', "持有至到期投资"),
                ('+', "长期应收款"),
                ('+', "长期股权投资"),
                ('+', "投资性房地产"),
                ('+', "固定资产"),
                ('+', "在建工程"),
                ('+', "生产性生物资产"),
                ('+', "油气资产"),
                ('+', "无形资产"),
                ('+', "开发支出"),
                ('+', "商誉"),
                ('+', "长期待摊费用"),
                ('+', "递延所得税资产"),
                ('+', "其他非流动资产"),
            ],
        ),
        rule(
            "【资产总计】",
            &[('+', "【流动资产合计】"), ('+', "【非流动资产合计】")],
        ),
        rule(
            "短期借款合计：",
            &[
                ('+', "信用借款（短期）"),
                ('+', "抵押贷款（短期）"),
                ('+', "质押贷款（短期）"),
                ('+', "保证贷款（短期）"),
            ],
        ),
        rule("短期借款", &[('+', "短期借款合计：")]),
        rule(
            "【流动负债合计】",
            &[
                ('+', "短期借款"),
                ('+', "以公允价值计量且其变动计入当期损益的金融负债"),
                ('+', "衍生金融负债"),
                ('+', "应付票据"),
                ('+', "应付账款"),
                ('+', "预收款项"),
                ('+', "应付职工薪酬"),
                ('+', "应交税费"),
                ('+', "其他应付款"),
                ('+', "持有待售负债"),
                ('+', "一年内到期的非流动负债"),
                ('+', "其他流动负债"),
            ],
        ),
        rule(
            "长期借款合计：",
            &[
                ('+', "信用借款（长期）"),
                ('+', "抵押贷款（长期）"),
                ('+', "质押贷款（长期）"),
                ('+', "保证贷款（长期）"),
            ],
        ),
        rule("长期借款", &[('+', "长期借款合计：")]),
        rule(
            "【非流动负债合计】",
            &[
                ('+', "长期借款"),
                ('+', "应付债券"),
                ('+', "长期应付款"),
                ('+', "预计负债"),
                ('+', "递延收益"),
                ('+', "递延所得税负债"),
                ('+', "其他非流动负债"),
            ],
        ),
        rule(
            "【负债合计】",
            &[('+', "【流动负债合计】"), ('+', "【非流动负债合计】")],
        ),
        rule(
            "【归属于母公司所有者权益合计】",
            &[
                ('+', "实收资本（或股本）"),
                ('+', "其他权益工具"),
                ('+', "资本公积"),
                ('-', "减：库存股"),
                ('+', "其他综合收益"),
                ('+', "专项存储"),
                ('+', "盈余公积"),
                ('+', "未分配利润"),
            ],
        ),
        rule(
            "【所有者权益（或股东权益）合计】",
            &[('+', "【归属于母公司所有者权益合计】"), ('+', "少数股东权益")],
        ),
        rule(
            "【负债和所有者权益（或股东权益）总计】",
            &[
                ('+', "【负债合计】"),
                ('+', "【所有者权益（或股东权益）合计】"),
            ],
        ),
        rule(
            "借款合计：",
            &[('+', "短期借款合计："), ('+', "长期借款合计：")],
        ),
        rule(
            "资产减值准备合计：",
            &[
                ('+', "坏账准备"),
                ('+', "存货跌价准备"),
                ('+', "可供出售金融资产减值准备"),
                ('+', "持有至到期投资减值准备"),
                ('+', "长期股权投资减值准备"),
                ('+', "投资性房地产减值准备"),
                ('+', "固定资产减值准备"),
                ('+', "工程物资减值准备"),
                ('+', "在建工程减值准备"),
                ('+', "生产性生物资产减值准备"),
                ('+', "油气资产减值准备"),
                ('+', "无形资产减值准备"),
                ('+', "商誉减值准备"),
                ('+', "其他"),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Operator;

    #[test]
    fn test_standard_catalog_loads() {
        let catalog = RuleCatalog::standard().unwrap();
        assert_eq!(catalog.len(), 24);

        let longest = catalog.iter().map(|r| r.formula.len()).max().unwrap();
        assert_eq!(longest, 14);
    }

    #[test]
    fn test_rule_for_exact_match() {
        let catalog = RuleCatalog::standard().unwrap();

        let rule = catalog.rule_for("应收账款账面价值合计").unwrap();
        assert_eq!(rule.formula.len(), 2);
        assert_eq!(rule.formula[0].source, "应收账款账面余额合计");
        assert_eq!(rule.formula[1].operator, Operator::Subtract);
        assert_eq!(rule.formula[1].source, "应收账款坏账准备");

        assert!(catalog.rule_for("货币资金").is_none());
        assert!(catalog.rule_for("应收账款 ").is_none());
    }

    #[test]
    fn test_rules_referencing() {
        let catalog = RuleCatalog::standard().unwrap();

        let targets: Vec<&str> = catalog
            .rules_referencing("短期借款合计：")
            .iter()
            .map(|r| r.target.as_str())
            .collect();
        assert_eq!(targets, vec!["短期借款", "借款合计："]);

        let targets: Vec<&str> = catalog
            .rules_referencing("存货跌价准备")
            .iter()
            .map(|r| r.target.as_str())
            .collect();
        assert_eq!(targets, vec!["存货", "资产减值准备合计："]);

        assert!(catalog.rules_referencing("【资产总计】").is_empty());
    }

    #[test]
    fn test_duplicate_target_fails_fast() {
        let rules = vec![
            rule("A", &[('+', "B")]),
            rule("A", &[('+', "C")]),
        ];
        let err = RuleCatalog::new(rules).unwrap_err();
        assert!(matches!(err, StatementError::DuplicateRuleTarget(name) if name == "A"));
    }

    #[test]
    fn test_empty_formula_rejected() {
        let err = RuleCatalog::new(vec![CalculationRule::new("A", vec![])]).unwrap_err();
        assert!(matches!(err, StatementError::EmptyFormula(_)));
    }

    #[test]
    fn test_cycle_rejected() {
        let rules = vec![
            rule("A", &[('+', "B")]),
            rule("B", &[('+', "C"), ('-', "D")]),
            rule("C", &[('+', "A")]),
        ];
        let err = RuleCatalog::new(rules).unwrap_err();
        assert!(matches!(err, StatementError::CyclicRule(_)));

        let err = RuleCatalog::new(vec![rule("A", &[('+', "A")])]).unwrap_err();
        assert!(matches!(err, StatementError::CyclicRule(name) if name == "A"));
    }

    #[test]
    fn test_dependency_order_puts_sources_first() {
        let catalog = RuleCatalog::standard().unwrap();
        let order = catalog.dependency_order().unwrap();
        assert_eq!(order.len(), catalog.len());

        let position = |name: &str| order.iter().position(|t| *t == name).unwrap();
        assert!(position("应收账款账面余额合计") < position("应收账款账面价值合计"));
        assert!(position("应收账款账面价值合计") < position("应收账款"));
        assert!(position("应收账款") < position("【流动资产合计】"));
        assert!(position("【流动资产合计】") < position("【资产总计】"));
        assert!(position("【负债合计】") < position("【负债和所有者权益（或股东权益）总计】"));
    }

    #[test]
    fn test_json_config_roundtrip() {
        let catalog = RuleCatalog::standard().unwrap();
        let json = catalog.to_json().unwrap();

        let reloaded = RuleCatalog::from_json(&json).unwrap();
        assert_eq!(reloaded.len(), catalog.len());
        assert_eq!(
            reloaded.rule_for("存货").unwrap(),
            catalog.rule_for("存货").unwrap()
        );

        let reloaded = RuleCatalog::from_reader(json.as_bytes()).unwrap();
        assert!(reloaded.has_rule("【资产总计】"));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = RuleCatalog::schema_as_json().unwrap();
        assert!(schema_json.contains("rules"));
        assert!(schema_json.contains("formula"));
        assert!(schema_json.contains("operator"));
    }
}
