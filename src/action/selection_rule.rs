//! Selection-count predicates
//!
//! A predicate compares the number of selected rows with an integer: `=1`, `!=0`, `>0`, `>=2`,
//! `<3`, `<=1`. A bare integer means equality. Blank text always holds.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Compiled predicate over the selection count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionRule {
    #[default]
    Always,
    Compare(Comparison, i64),
}

impl SelectionRule {
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SelectionRule::Always);
        }

        let (comparison, operand) = [
            ("!=", Comparison::Ne),
            (">=", Comparison::Ge),
            ("<=", Comparison::Le),
            ("=", Comparison::Eq),
            (">", Comparison::Gt),
            ("<", Comparison::Lt),
        ]
        .iter()
        .find_map(|(op, cmp)| text.strip_prefix(op).map(|rest| (*cmp, rest)))
        .unwrap_or((Comparison::Eq, text));

        operand
            .trim()
            .parse::<i64>()
            .map(|value| SelectionRule::Compare(comparison, value))
            .map_err(|_| format!("Invalid selection rule: {}", text))
    }

    pub fn evaluate(&self, count: usize) -> bool {
        let SelectionRule::Compare(comparison, value) = *self else {
            return true;
        };
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        match comparison {
            Comparison::Eq => count == value,
            Comparison::Ne => count != value,
            Comparison::Gt => count > value,
            Comparison::Ge => count >= value,
            Comparison::Lt => count < value,
            Comparison::Le => count <= value,
        }
    }
}

/// Rules compiled once per distinct text
#[derive(Debug, Default)]
pub struct SelectionRuleCache {
    rules: RwLock<HashMap<String, SelectionRule>>,
}

impl SelectionRuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `text`, reusing an earlier compilation. Unparseable text always holds.
    pub fn get(&self, text: Option<&str>) -> SelectionRule {
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            return SelectionRule::Always;
        };

        if let Some(rule) = self.rules.read().get(text) {
            return *rule;
        }

        let rule = SelectionRule::parse(text).unwrap_or_else(|e| {
            warn!(rule = text, error = %e, "Unparseable selection rule, treating as always true");
            SelectionRule::Always
        });
        self.rules.write().insert(text.to_string(), rule);
        rule
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}
