use crate::catalog::RuleCatalog;
use std::collections::BTreeSet;

/// Answers whether two subjects share a direct calculation edge. Used to
/// highlight the participants of a formula while a row is hovered.
///
/// Relations are one hop only: a subject is related to its own formula
/// terms and to the targets whose formulas use it, never to anything
/// further along a chain.
pub struct RelationResolver<'a> {
    catalog: &'a RuleCatalog,
}

impl<'a> RelationResolver<'a> {
    pub fn new(catalog: &'a RuleCatalog) -> Self {
        Self { catalog }
    }

    pub fn related(&self, hovered: &str, candidate: &str) -> bool {
        if hovered == candidate {
            return true;
        }

        let is_term_of = |target: &str, source: &str| {
            self.catalog
                .rule_for(target)
                .is_some_and(|rule| rule.references(source))
        };

        is_term_of(hovered, candidate) || is_term_of(candidate, hovered)
    }

    /// Every subject directly related to `hovered`, excluding itself.
    pub fn related_subjects(&self, hovered: &str) -> BTreeSet<&'a str> {
        let mut related: BTreeSet<&'a str> = BTreeSet::new();

        if let Some(rule) = self.catalog.rule_for(hovered) {
            related.extend(rule.formula.iter().map(|t| t.source.as_str()));
        }

        related.extend(
            self.catalog
                .rules_referencing(hovered)
                .into_iter()
                .map(|r| r.target.as_str()),
        );

        related.remove(hovered);
        related
    }
}

pub fn related(catalog: &RuleCatalog, hovered: &str, candidate: &str) -> bool {
    RelationResolver::new(catalog).related(hovered, candidate)
}
