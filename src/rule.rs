//! User-authored rules: a condition tree plus an ordered action list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::condition::ConditionGroup;

/// What an action does to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    MoveToFolder,
    CopyToFolder,
    MoveToCategory,
    SortIntoSubfolder,
    Rename,
    Delete,
    Ignore,
    /// Keep evaluating lower-priority rules after this one matched.
    Continue,
}

impl ActionType {
    /// Actions that change where the file ends up.
    pub fn relocates(&self) -> bool {
        matches!(
            self,
            ActionType::MoveToFolder
                | ActionType::MoveToCategory
                | ActionType::SortIntoSubfolder
                | ActionType::Rename
        )
    }
}

/// One step of a rule's action list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl RuleAction {
    pub fn new(action_type: ActionType, value: impl Into<String>) -> Self {
        Self {
            action_type,
            value: value.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn move_to(folder: impl Into<String>) -> Self {
        Self::new(ActionType::MoveToFolder, folder)
    }

    pub fn copy_to(folder: impl Into<String>) -> Self {
        Self::new(ActionType::CopyToFolder, folder)
    }

    pub fn move_to_category(category: impl Into<String>) -> Self {
        Self::new(ActionType::MoveToCategory, category)
    }

    pub fn sort_into(pattern: impl Into<String>) -> Self {
        Self::new(ActionType::SortIntoSubfolder, pattern)
    }

    pub fn rename(pattern: impl Into<String>) -> Self {
        Self::new(ActionType::Rename, pattern)
    }

    pub fn delete() -> Self {
        Self::new(ActionType::Delete, "")
    }

    pub fn ignore() -> Self {
        Self::new(ActionType::Ignore, "")
    }

    pub fn continue_matching() -> Self {
        Self::new(ActionType::Continue, "")
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Reads a boolean option, accepting `true/false`, `yes/no` and `1/0`.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.options.get(key)?.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

/// A prioritized condition → action mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    /// Lower runs first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    #[serde(default)]
    pub conditions: ConditionGroup,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            priority,
            is_enabled: true,
            conditions: ConditionGroup::default(),
            actions: Vec::new(),
        }
    }

    pub fn with_conditions(mut self, conditions: ConditionGroup) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }

    /// True if matching should carry on to the next rule.
    pub fn continues(&self) -> bool {
        self.actions
            .iter()
            .any(|a| a.action_type == ActionType::Continue)
    }
}

/// Sorts rules into evaluation order and reassigns dense priorities `0..n`.
///
/// Ties keep their relative order.
pub fn normalize_priorities(rules: &mut [Rule]) {
    rules.sort_by_key(|r| r.priority);
    for (index, rule) in rules.iter_mut().enumerate() {
        rule.priority = index as i32;
    }
}

/// Moves a rule to `new_index` in evaluation order and renumbers priorities.
///
/// Returns false if no rule has this id.
pub fn move_rule(rules: &mut Vec<Rule>, id: &str, new_index: usize) -> bool {
    normalize_priorities(rules);
    let Some(current) = rules.iter().position(|r| r.id == id) else {
        return false;
    };
    let rule = rules.remove(current);
    let target = new_index.min(rules.len());
    rules.insert(target, rule);
    for (index, rule) in rules.iter_mut().enumerate() {
        rule.priority = index as i32;
    }
    true
}
