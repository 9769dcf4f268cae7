//! Condition evaluation.
//!
//! A [`ConditionGroup`] is a boolean tree over [`Condition`]s. Evaluation is a
//! pure function of the file snapshot and the current time, so it can run on
//! any thread without locking.

use chrono::{DateTime, Local, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::metadata::FileMetadata;

/// File attribute a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attribute {
    Name,
    Extension,
    FullName,
    Kind,
    Size,
    DateCreated,
    DateModified,
    DateAccessed,
    Folder,
    FolderPath,
    /// Reserved. Content matching is not implemented and never matches.
    Contents,
}

/// Comparison applied to an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Is,
    IsNot,
    Contains,
    DoesNotContain,
    StartsWith,
    EndsWith,
    MatchesPattern,
    IsBlank,
    IsNotBlank,
    IsGreaterThan,
    IsLessThan,
    IsBefore,
    IsAfter,
    IsInTheLast,
}

/// How the results inside a group are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchType {
    #[default]
    All,
    Any,
    None,
}

/// A single predicate over file metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: Attribute,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
    /// Unit for sizes ("MB") and relative dates ("days").
    #[serde(default)]
    pub secondary_value: String,
}

impl Condition {
    pub fn new(attribute: Attribute, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            attribute,
            operator,
            value: value.into(),
            secondary_value: String::new(),
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary_value = secondary.into();
        self
    }

    /// Evaluates against the current local time.
    pub fn evaluate(&self, file: &FileMetadata) -> bool {
        self.evaluate_at(file, Local::now())
    }

    pub fn evaluate_at(&self, file: &FileMetadata, now: DateTime<Local>) -> bool {
        match self.attribute {
            Attribute::Name => self.compare_text(&file.name),
            Attribute::Extension => self.compare_text(&file.extension),
            Attribute::FullName => self.compare_text(&file.full_name),
            Attribute::Kind => self.compare_text(file.kind.label()),
            Attribute::Folder => self.compare_text(&file.folder()),
            Attribute::FolderPath => self.compare_text(&file.folder_path()),
            Attribute::Size => self.compare_size(file.size),
            Attribute::DateCreated => self.compare_date(file.created, now),
            Attribute::DateModified => self.compare_date(file.modified, now),
            Attribute::DateAccessed => self.compare_date(file.accessed, now),
            Attribute::Contents => false,
        }
    }

    fn compare_text(&self, actual: &str) -> bool {
        let actual = actual.to_lowercase();
        let mut expected = self.value.trim().to_lowercase();
        if self.attribute == Attribute::Extension {
            expected = expected.trim_start_matches('.').to_string();
        }

        match self.operator {
            Operator::Is => actual == expected,
            Operator::IsNot => actual != expected,
            Operator::Contains => actual.contains(&expected),
            Operator::DoesNotContain => !actual.contains(&expected),
            Operator::StartsWith => actual.starts_with(&expected),
            Operator::EndsWith => actual.ends_with(&expected),
            Operator::MatchesPattern => wildcard_matches(&expected, &actual),
            Operator::IsBlank => actual.trim().is_empty(),
            Operator::IsNotBlank => !actual.trim().is_empty(),
            _ => false,
        }
    }

    fn compare_size(&self, size: u64) -> bool {
        let Some(threshold) = parse_size(&self.value, &self.secondary_value) else {
            return false;
        };
        let size = size as f64;

        match self.operator {
            Operator::Is => size == threshold.round(),
            Operator::IsNot => size != threshold.round(),
            Operator::IsGreaterThan => size > threshold,
            Operator::IsLessThan => size < threshold,
            _ => false,
        }
    }

    fn compare_date(&self, actual: Option<DateTime<Local>>, now: DateTime<Local>) -> bool {
        let Some(actual) = actual else {
            return false;
        };

        match self.operator {
            Operator::IsInTheLast => relative_cutoff(&self.value, &self.secondary_value, now)
                .is_some_and(|cutoff| actual >= cutoff),
            Operator::IsBefore | Operator::IsAfter | Operator::Is | Operator::IsNot => {
                let Some(expected) = parse_date(&self.value) else {
                    return false;
                };
                match (self.operator, expected) {
                    (Operator::IsBefore, DateValue::Day(day)) => actual.date_naive() < day,
                    (Operator::IsAfter, DateValue::Day(day)) => actual.date_naive() > day,
                    (Operator::IsBefore, DateValue::Instant(at)) => actual < at,
                    (Operator::IsAfter, DateValue::Instant(at)) => actual > at,
                    (Operator::Is, value) => actual.date_naive() == value.day(),
                    (Operator::IsNot, value) => actual.date_naive() != value.day(),
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// A boolean combination of conditions and nested groups.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub nested_groups: Vec<ConditionGroup>,
}

impl ConditionGroup {
    pub fn new(match_type: MatchType) -> Self {
        Self {
            match_type,
            conditions: Vec::new(),
            nested_groups: Vec::new(),
        }
    }

    /// A group that requires every condition.
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self {
            match_type: MatchType::All,
            conditions,
            nested_groups: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_group(mut self, group: ConditionGroup) -> Self {
        self.nested_groups.push(group);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.nested_groups.is_empty()
    }

    pub fn evaluate(&self, file: &FileMetadata) -> bool {
        self.evaluate_at(file, Local::now())
    }

    /// Evaluates the group. An empty group is always true.
    pub fn evaluate_at(&self, file: &FileMetadata, now: DateTime<Local>) -> bool {
        if self.is_empty() {
            return true;
        }

        let mut results = self
            .conditions
            .iter()
            .map(|c| c.evaluate_at(file, now))
            .chain(self.nested_groups.iter().map(|g| g.evaluate_at(file, now)));

        match self.match_type {
            MatchType::All => results.all(|r| r),
            MatchType::Any => results.any(|r| r),
            MatchType::None => !results.any(|r| r),
        }
    }
}

/// Case-insensitive wildcard match supporting only `*` and `?`.
pub fn wildcard_matches(pattern: &str, text: &str) -> bool {
    let escaped: String = pattern
        .chars()
        .map(|c| match c {
            '*' | '?' => c.to_string(),
            other => Pattern::escape(&other.to_string()),
        })
        .collect();

    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    Pattern::new(&escaped).is_ok_and(|p| p.matches_with(text, options))
}

static NUMBER_WITH_UNIT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*([A-Za-z]*)\s*$").ok());

fn split_number_unit(value: &str) -> Option<(f64, String)> {
    let re = NUMBER_WITH_UNIT.as_ref()?;
    let caps = re.captures(value)?;
    let number = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let unit = caps.get(2).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
    Some((number, unit))
}

/// Parses a size threshold in bytes. The unit may be embedded or given separately.
pub fn parse_size(value: &str, unit: &str) -> Option<f64> {
    let (number, embedded) = split_number_unit(value)?;
    let unit = if embedded.is_empty() {
        unit.trim().to_lowercase()
    } else {
        embedded
    };

    let multiplier: f64 = match unit.as_str() {
        "" | "b" | "byte" | "bytes" => 1.0,
        "k" | "kb" | "kib" => 1024.0,
        "m" | "mb" | "mib" => 1024.0 * 1024.0,
        "g" | "gb" | "gib" => 1024.0 * 1024.0 * 1024.0,
        "t" | "tb" | "tib" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some(number * multiplier)
}

#[derive(Debug, Clone, Copy)]
enum DateValue {
    Day(NaiveDate),
    Instant(DateTime<Local>),
}

impl DateValue {
    fn day(self) -> NaiveDate {
        match self {
            DateValue::Day(day) => day,
            DateValue::Instant(at) => at.date_naive(),
        }
    }
}

fn parse_date(value: &str) -> Option<DateValue> {
    let value = value.trim();
    if let Ok(day) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(DateValue::Day(day));
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(DateValue::Instant(at.with_timezone(&Local)));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(DateValue::Instant)
}

/// Earliest instant that still counts as "in the last N units".
fn relative_cutoff(value: &str, unit: &str, now: DateTime<Local>) -> Option<DateTime<Local>> {
    let (amount, embedded) = split_number_unit(value)?;
    let amount = amount as i64;
    let unit = if embedded.is_empty() {
        unit.trim().to_lowercase()
    } else {
        embedded
    };

    match unit.as_str() {
        "minute" | "minutes" | "min" | "mins" => now.checked_sub_signed(TimeDelta::try_minutes(amount)?),
        "hour" | "hours" | "h" => now.checked_sub_signed(TimeDelta::try_hours(amount)?),
        "" | "day" | "days" | "d" => now.checked_sub_signed(TimeDelta::try_days(amount)?),
        "week" | "weeks" | "w" => now.checked_sub_signed(TimeDelta::try_weeks(amount)?),
        "month" | "months" => now.checked_sub_months(Months::new(u32::try_from(amount).ok()?)),
        "year" | "years" | "y" => {
            let months = u32::try_from(amount.checked_mul(12)?).ok()?;
            now.checked_sub_months(Months::new(months))
        }
        _ => None,
    }
}
