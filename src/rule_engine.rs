//! Rule matching and destination planning.
//!
//! Matching walks enabled rules in ascending priority and stops at the first
//! hit unless that rule carries a `Continue` action. Planning simulates the
//! matched actions against an immutable [`Cursor`] so every step is a pure
//! transformation that the executor can replay later with real I/O.

use std::ops::ControlFlow;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::category::{Category, CategoryResolver};
use crate::file_kind::KindMapper;
use crate::metadata::{FileMetadata, split_name};
use crate::naming::{is_case_only_change, is_same_file, unique_path};
use crate::pattern::{self, TokenContext};
use crate::rule::{ActionType, Rule, RuleAction};

/// Destination reported for files sent to the trash.
pub const TRASH_SENTINEL: &str = "[trash]";

/// How a file was claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchedBy {
    #[default]
    None,
    Rule,
    Category,
}

/// How one file was, or would be, handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOrganizeResult {
    pub source_path: PathBuf,
    /// Primary destination. Equal to `source_path` when the file stays put.
    pub destination_path: Option<PathBuf>,
    /// Extra copies, in action order.
    pub additional_destinations: Vec<PathBuf>,
    pub matched_by: MatchedBy,
    pub matched_rule_id: Option<String>,
    pub matched_rule_name: Option<String>,
    /// Ids of every rule that contributed through `Continue` chaining.
    pub chained_rule_ids: Vec<String>,
    pub category: Option<String>,
    pub actions: Vec<RuleAction>,
}

impl FileOrganizeResult {
    fn unmatched(source: &Path) -> Self {
        Self {
            source_path: source.to_path_buf(),
            destination_path: None,
            additional_destinations: Vec::new(),
            matched_by: MatchedBy::None,
            matched_rule_id: None,
            matched_rule_name: None,
            chained_rule_ids: Vec::new(),
            category: None,
            actions: Vec::new(),
        }
    }

    pub fn will_be_organized(&self) -> bool {
        self.matched_by != MatchedBy::None && self.destination_path.is_some()
    }

    /// Matched, but the file already sits where the plan would put it.
    pub fn is_unchanged(&self) -> bool {
        self.destination_path.as_deref() == Some(self.source_path.as_path())
            && self.additional_destinations.is_empty()
    }

    pub fn is_delete(&self) -> bool {
        self.destination_path.as_deref() == Some(Path::new(TRASH_SENTINEL))
    }

    /// Destinations in the list form: primary first, then copies.
    pub fn destinations(&self) -> Vec<PathBuf> {
        self.destination_path
            .iter()
            .chain(self.additional_destinations.iter())
            .cloned()
            .collect()
    }
}

/// Outcome of simulating an action list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// The file stays where it is.
    Ignore,
    /// The file goes to the trash.
    Delete,
    Relocate {
        primary: Option<PathBuf>,
        copies: Vec<PathBuf>,
    },
}

impl Plan {
    /// Primary destination first, then copies. Delete yields the trash sentinel.
    pub fn destinations(&self) -> Vec<PathBuf> {
        match self {
            Plan::Ignore => Vec::new(),
            Plan::Delete => vec![PathBuf::from(TRASH_SENTINEL)],
            Plan::Relocate { primary, copies } => {
                primary.iter().chain(copies.iter()).cloned().collect()
            }
        }
    }
}

/// Where the file is at a given point of the action chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub dir: PathBuf,
    pub name: String,
}

impl Cursor {
    pub fn at(path: &Path) -> Self {
        Self {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }
}

/// Result of applying one action to a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The file moves; the cursor follows.
    Move(Cursor),
    /// A copy lands here; the cursor stays.
    Copy(PathBuf),
    Delete,
    Ignore,
    /// Nothing to do (empty value, `Continue`, unknown category).
    Skip,
}

/// Everything an action needs to resolve its target.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub base_path: &'a Path,
    pub file: &'a FileMetadata,
    pub categories: &'a CategoryResolver,
    pub now: DateTime<Local>,
}

impl PlanContext<'_> {
    fn resolve_folder(&self, value: &str) -> Option<PathBuf> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let path = Path::new(value);
        Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        })
    }

    fn category_for(&self, name: &str) -> Option<&Category> {
        let (_, extension) = split_name(name);
        self.categories.resolve(&extension)
    }

    fn tokens<'b>(&'b self, cursor: &'b Cursor) -> TokenContext<'b> {
        TokenContext {
            file: self.file,
            current_name: &cursor.name,
            category: self.category_for(&cursor.name).map(|c| c.name.as_str()),
            now: self.now,
        }
    }
}

/// Applies one action to the cursor without touching the filesystem.
///
/// Targets are probed for collisions, so the returned paths are the ones a
/// run started right now would use.
pub fn step(cursor: &Cursor, action: &RuleAction, ctx: &PlanContext<'_>) -> Step {
    let current = cursor.path();
    let relocate = |target: PathBuf| {
        // A case-only target that is a different file still needs a fresh name.
        if is_case_only_change(&current, &target)
            && (!target.exists() || is_same_file(&target, &current))
        {
            Step::Move(Cursor::at(&target))
        } else {
            Step::Move(Cursor::at(&unique_path(&target, Some(&current))))
        }
    };

    match action.action_type {
        ActionType::MoveToFolder => match ctx.resolve_folder(&action.value) {
            Some(dir) => relocate(dir.join(&cursor.name)),
            None => Step::Skip,
        },
        ActionType::CopyToFolder => match ctx.resolve_folder(&action.value) {
            Some(dir) => Step::Copy(unique_path(&dir.join(&cursor.name), None)),
            None => Step::Skip,
        },
        ActionType::MoveToCategory => {
            let category = if action.value.trim().is_empty() {
                ctx.category_for(&cursor.name)
            } else {
                ctx.categories.by_name(&action.value)
            };
            match category {
                Some(category) => {
                    relocate(category.destination_dir(ctx.base_path).join(&cursor.name))
                }
                None => {
                    warn!(category = %action.value, "no category to move into");
                    Step::Skip
                }
            }
        }
        ActionType::SortIntoSubfolder => {
            let expanded = pattern::expand(&action.value, &ctx.tokens(cursor));
            let subfolder: PathBuf = Path::new(&expanded)
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part),
                    _ => None,
                })
                .collect();
            if subfolder.as_os_str().is_empty() {
                Step::Skip
            } else if already_sorted(&cursor.dir, ctx.base_path, &subfolder) {
                Step::Move(cursor.clone())
            } else {
                relocate(cursor.dir.join(subfolder).join(&cursor.name))
            }
        }
        ActionType::Rename => match renamed(cursor, action, ctx) {
            Some(new_name) => relocate(cursor.dir.join(new_name)),
            None => Step::Skip,
        },
        ActionType::Delete => Step::Delete,
        ActionType::Ignore => Step::Ignore,
        ActionType::Continue => Step::Skip,
    }
}

/// True when `dir` sits below `base` and already ends with `subfolder`,
/// i.e. an earlier run sorted the file there.
fn already_sorted(dir: &Path, base: &Path, subfolder: &Path) -> bool {
    dir.strip_prefix(base)
        .is_ok_and(|below| below.ends_with(subfolder))
}

fn renamed(cursor: &Cursor, action: &RuleAction, ctx: &PlanContext<'_>) -> Option<String> {
    let expanded = pattern::expand(&action.value, &ctx.tokens(cursor));
    let mut new_name: String = expanded
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '-' } else { c })
        .collect();
    if new_name.is_empty() {
        return None;
    }

    let (_, extension) = split_name(&cursor.name);
    let keep_extension = action.flag("keep_extension").unwrap_or(true);
    let suffix = format!(".{}", extension.to_lowercase());
    if keep_extension
        && !extension.is_empty()
        && !pattern::has_extension_token(&action.value)
        && !new_name.to_lowercase().ends_with(&suffix)
    {
        new_name.push('.');
        new_name.push_str(&extension);
    }
    Some(new_name)
}

/// Running state of the fold over an action list.
#[derive(Debug, Clone)]
struct Simulation {
    cursor: Cursor,
    primary: Option<PathBuf>,
    copies: Vec<PathBuf>,
}

impl Simulation {
    fn apply(mut self, step: Step) -> ControlFlow<Plan, Simulation> {
        match step {
            Step::Move(next) => {
                self.primary = Some(next.path());
                self.cursor = next;
                ControlFlow::Continue(self)
            }
            Step::Copy(target) => {
                self.copies.push(target);
                ControlFlow::Continue(self)
            }
            Step::Delete => ControlFlow::Break(Plan::Delete),
            Step::Ignore => ControlFlow::Break(Plan::Ignore),
            Step::Skip => ControlFlow::Continue(self),
        }
    }
}

/// Simulates `actions` in order and returns where the file would end up.
pub fn plan_actions(actions: &[RuleAction], ctx: &PlanContext<'_>) -> Plan {
    let seed = Simulation {
        cursor: Cursor::at(&ctx.file.path),
        primary: None,
        copies: Vec::new(),
    };

    match actions
        .iter()
        .try_fold(seed, |sim, action| {
            let next = step(&sim.cursor, action, ctx);
            sim.apply(next)
        }) {
        ControlFlow::Continue(sim) => Plan::Relocate {
            primary: sim.primary,
            copies: sim.copies,
        },
        ControlFlow::Break(plan) => plan,
    }
}

/// Holds the priority-ordered rules and the category fallback.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<Rule>,
    categories: CategoryResolver,
    kinds: KindMapper,
    use_categories_as_fallback: bool,
}

impl RuleEngine {
    pub fn new(mut rules: Vec<Rule>, categories: CategoryResolver) -> Self {
        rules.sort_by_key(|r| r.priority);
        Self {
            rules,
            categories,
            kinds: KindMapper::default(),
            use_categories_as_fallback: true,
        }
    }

    pub fn with_category_fallback(mut self, enabled: bool) -> Self {
        self.use_categories_as_fallback = enabled;
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn categories(&self) -> &CategoryResolver {
        &self.categories
    }

    pub fn kinds(&self) -> &KindMapper {
        &self.kinds
    }

    /// Enabled rules whose conditions hold, honoring `Continue` chaining.
    pub fn match_rules(&self, file: &FileMetadata) -> Vec<&Rule> {
        self.match_rules_at(file, Local::now())
    }

    pub fn match_rules_at(&self, file: &FileMetadata, now: DateTime<Local>) -> Vec<&Rule> {
        let mut matched = Vec::new();
        for rule in self.rules.iter().filter(|r| r.is_enabled) {
            if rule.conditions.evaluate_at(file, now) {
                matched.push(rule);
                if !rule.continues() {
                    break;
                }
            }
        }
        matched
    }

    fn context<'a>(
        &'a self,
        file: &'a FileMetadata,
        base_path: &'a Path,
        now: DateTime<Local>,
    ) -> PlanContext<'a> {
        PlanContext {
            base_path,
            file,
            categories: &self.categories,
            now,
        }
    }

    /// Simulates a single rule's actions for a file.
    pub fn plan_destinations(&self, rule: &Rule, file: &FileMetadata, base_path: &Path) -> Plan {
        plan_actions(&rule.actions, &self.context(file, base_path, Local::now()))
    }

    /// Reads the file from disk and classifies it.
    pub fn classify_path(&self, path: &Path, base_path: &Path) -> std::io::Result<FileOrganizeResult> {
        let file = FileMetadata::from_path(path, &self.kinds)?;
        Ok(self.classify(&file, base_path))
    }

    pub fn classify(&self, file: &FileMetadata, base_path: &Path) -> FileOrganizeResult {
        self.classify_at(file, base_path, Local::now())
    }

    /// Decides how a file is handled: by rules first, then by category.
    pub fn classify_at(
        &self,
        file: &FileMetadata,
        base_path: &Path,
        now: DateTime<Local>,
    ) -> FileOrganizeResult {
        let matched = self.match_rules_at(file, now);
        let Some(first) = matched.first() else {
            return self.classify_by_category(file, base_path);
        };

        let actions: Vec<RuleAction> = matched
            .iter()
            .flat_map(|r| r.actions.iter())
            .filter(|a| a.action_type != ActionType::Continue)
            .cloned()
            .collect();

        let mut result = FileOrganizeResult::unmatched(&file.path);
        result.matched_by = MatchedBy::Rule;
        result.matched_rule_id = Some(first.id.clone());
        result.matched_rule_name = Some(first.name.clone());
        result.chained_rule_ids = matched.iter().map(|r| r.id.clone()).collect();

        if actions.iter().any(|a| a.action_type == ActionType::Ignore) {
            debug!(path = %file.path.display(), rule = %first.name, "ignored by rule");
            return result;
        }

        let plan = plan_actions(&actions, &self.context(file, base_path, now));
        match plan {
            Plan::Ignore => {}
            Plan::Delete => {
                result.destination_path = Some(PathBuf::from(TRASH_SENTINEL));
            }
            Plan::Relocate { primary, copies } => {
                let last_continues = matched.last().is_some_and(|r| r.continues());
                if primary.is_none() && copies.is_empty() && last_continues {
                    return self.classify_by_category(file, base_path);
                }
                if primary.is_some() || !copies.is_empty() {
                    result.destination_path = Some(primary.unwrap_or_else(|| file.path.clone()));
                }
                result.additional_destinations = copies;
            }
        }
        result.actions = actions;
        result
    }

    fn classify_by_category(&self, file: &FileMetadata, base_path: &Path) -> FileOrganizeResult {
        let mut result = FileOrganizeResult::unmatched(&file.path);
        if !self.use_categories_as_fallback {
            return result;
        }
        let Some(category) = self.categories.resolve(&file.extension) else {
            return result;
        };

        let dir = category.destination_dir(base_path);
        result.matched_by = MatchedBy::Category;
        result.category = Some(category.name.clone());

        if file.path.parent().is_some_and(|parent| parent.starts_with(&dir)) {
            result.destination_path = Some(file.path.clone());
            return result;
        }

        result.destination_path = Some(unique_path(&dir.join(&file.full_name), Some(&file.path)));
        result.actions = vec![RuleAction::move_to_category(category.name.clone())];
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::condition::{Attribute, Condition, ConditionGroup, Operator};
    use crate::file_kind::FileKind;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn photo_2024(path: &str) -> FileMetadata {
        let modified = Local
            .with_ymd_and_hms(2024, 5, 1, 10, 0, 0)
            .earliest()
            .expect("valid time");
        FileMetadata::from_parts(Path::new(path), 2048, FileKind::Image).with_modified(modified)
    }

    fn ext_is(ext: &str) -> ConditionGroup {
        ConditionGroup::all(vec![Condition::new(Attribute::Extension, Operator::Is, ext)])
    }

    fn engine(rules: Vec<Rule>) -> RuleEngine {
        RuleEngine::new(rules, CategoryResolver::default())
    }

    #[test]
    fn test_rule_without_conditions_matches_anything() {
        let rule = Rule::new("catch-all", 0).with_action(RuleAction::move_to("All"));
        let e = engine(vec![rule]);
        let file = FileMetadata::from_parts(Path::new("/w/x.weird"), 0, FileKind::Other);
        assert_eq!(e.match_rules(&file).len(), 1);
    }

    #[test]
    fn test_rules_evaluated_by_priority_and_stop_on_first_match() {
        let low = Rule::new("low", 5).with_action(RuleAction::move_to("Low"));
        let high = Rule::new("high", 1).with_action(RuleAction::move_to("High"));
        let disabled = Rule::new("off", 0).disabled();
        let e = engine(vec![low, high, disabled]);

        let file = photo_2024("/w/a.jpg");
        let names: Vec<_> = e.match_rules(&file).iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["high".to_string()]);
    }

    #[test]
    fn test_move_to_folder_scenario() {
        let rule = Rule::new("PDFs", 0)
            .with_conditions(ext_is("pdf"))
            .with_action(RuleAction::move_to("PDFs"));
        let e = engine(vec![rule]);
        let file = FileMetadata::from_parts(Path::new("/watch/report.pdf"), 10, FileKind::Document);

        let result = e.classify(&file, Path::new("/watch"));
        assert!(result.will_be_organized());
        assert_eq!(result.destination_path, Some(PathBuf::from("/watch/PDFs/report.pdf")));
        assert_eq!(result.matched_by, MatchedBy::Rule);
    }

    #[test]
    fn test_plan_destinations_for_single_rule() {
        let rule = Rule::new("rename+copy", 0)
            .with_action(RuleAction::rename("{Name}_{Year}"))
            .with_action(RuleAction::copy_to("Backup"))
            .with_action(RuleAction::move_to("/archive"));
        let e = engine(vec![]);
        let plan = e.plan_destinations(&rule, &photo_2024("/w/photo.jpg"), Path::new("/w"));

        assert_eq!(
            plan.destinations(),
            vec![
                PathBuf::from("/archive/photo_2024.jpg"),
                PathBuf::from("/w/Backup/photo_2024.jpg"),
            ]
        );
    }

    #[test]
    fn test_delete_and_ignore_short_circuit() {
        let e = engine(vec![]);
        let file = photo_2024("/w/old.log");
        let base = Path::new("/w");

        let delete = Rule::new("d", 0)
            .with_action(RuleAction::delete())
            .with_action(RuleAction::move_to("Never"));
        assert_eq!(e.plan_destinations(&delete, &file, base), Plan::Delete);
        assert_eq!(
            Plan::Delete.destinations(),
            vec![PathBuf::from(TRASH_SENTINEL)]
        );

        let ignore = Rule::new("i", 0)
            .with_action(RuleAction::ignore())
            .with_action(RuleAction::move_to("Never"));
        assert_eq!(e.plan_destinations(&ignore, &file, base), Plan::Ignore);
        assert!(Plan::Ignore.destinations().is_empty());
    }

    #[test]
    fn test_continue_chains_sort_and_copy() {
        let sort = Rule::new("sort", 0)
            .with_conditions(ext_is("jpg"))
            .with_action(RuleAction::sort_into("{Year}"))
            .with_action(RuleAction::continue_matching());
        let backup = Rule::new("backup", 1)
            .with_conditions(ext_is("jpg"))
            .with_action(RuleAction::copy_to("Backup"));
        let e = engine(vec![backup, sort]);

        let result = e.classify(&photo_2024("/watch/photo.jpg"), Path::new("/watch"));
        assert_eq!(result.destination_path, Some(PathBuf::from("/watch/2024/photo.jpg")));
        assert_eq!(
            result.additional_destinations,
            vec![PathBuf::from("/watch/Backup/photo.jpg")]
        );
        assert_eq!(result.chained_rule_ids.len(), 2);
        assert_eq!(result.matched_rule_name.as_deref(), Some("sort"));
    }

    #[test]
    fn test_ignore_in_chain_wins() {
        let first = Rule::new("first", 0)
            .with_action(RuleAction::move_to("Somewhere"))
            .with_action(RuleAction::continue_matching());
        let second = Rule::new("second", 1).with_action(RuleAction::ignore());
        let e = engine(vec![first, second]);

        let result = e.classify(&photo_2024("/w/a.jpg"), Path::new("/w"));
        assert_eq!(result.matched_by, MatchedBy::Rule);
        assert!(!result.will_be_organized());
    }

    #[test]
    fn test_continue_without_destination_falls_back_to_category() {
        let tag_only = Rule::new("noop", 0).with_action(RuleAction::continue_matching());
        let e = engine(vec![tag_only]);

        let result = e.classify(&photo_2024("/w/a.jpg"), Path::new("/w"));
        assert_eq!(result.matched_by, MatchedBy::Category);
        assert_eq!(result.category.as_deref(), Some("Images"));
        assert_eq!(result.destination_path, Some(PathBuf::from("/w/Images/a.jpg")));
    }

    #[test]
    fn test_category_fallback_can_be_disabled() {
        let e = engine(vec![]).with_category_fallback(false);
        let result = e.classify(&photo_2024("/w/a.jpg"), Path::new("/w"));
        assert_eq!(result.matched_by, MatchedBy::None);
        assert!(!result.will_be_organized());
    }

    #[test]
    fn test_file_already_in_category_folder_is_unchanged() {
        let e = engine(vec![]);
        let file = photo_2024("/w/Images/2023/a.jpg");
        let result = e.classify(&file, Path::new("/w"));
        assert_eq!(result.matched_by, MatchedBy::Category);
        assert!(result.is_unchanged());
        assert!(result.actions.is_empty());
    }

    #[test]
    fn test_custom_category_destination() {
        let mut categories = Category::defaults();
        categories.push(Category::new("Scans", &["pdf"]).with_destination("Paperwork/Scans"));
        let e = RuleEngine::new(vec![], CategoryResolver::new(categories));
        let file = FileMetadata::from_parts(Path::new("/w/bill.pdf"), 1, FileKind::Document);

        let result = e.classify(&file, Path::new("/w"));
        assert_eq!(
            result.destination_path,
            Some(PathBuf::from("/w/Paperwork/Scans/bill.pdf"))
        );
    }

    #[test]
    fn test_rename_appends_extension_and_sort_uses_category() {
        let rule = Rule::new("r", 0)
            .with_action(RuleAction::rename("{Category}-{Name}"))
            .with_action(RuleAction::sort_into("{Kind}/{date:yyyy}"));
        let e = engine(vec![]);
        let plan = e.plan_destinations(&rule, &photo_2024("/w/cat.png"), Path::new("/w"));
        assert_eq!(
            plan.destinations(),
            vec![PathBuf::from("/w/Image/2024/Images-cat.png")]
        );
    }

    #[test]
    fn test_rename_keeps_explicit_extension_case_only() {
        let rule = Rule::new("lower", 0).with_action(RuleAction::rename("{Name}.pdf"));
        let e = engine(vec![]);
        let file = FileMetadata::from_parts(Path::new("/w/report.PDF"), 1, FileKind::Document);
        let plan = e.plan_destinations(&rule, &file, Path::new("/w"));
        assert_eq!(plan.destinations(), vec![PathBuf::from("/w/report.pdf")]);
    }

    #[test]
    fn test_sort_rejects_parent_components() {
        let rule = Rule::new("escape", 0).with_action(RuleAction::sort_into("../../etc"));
        let e = engine(vec![]);
        let plan = e.plan_destinations(&rule, &photo_2024("/w/a.jpg"), Path::new("/w"));
        assert_eq!(plan.destinations(), vec![PathBuf::from("/w/etc/a.jpg")]);
    }

    #[test]
    fn test_sort_is_stable_on_rescan() {
        let rule = Rule::new("by-year", 0).with_action(RuleAction::sort_into("{Year}"));
        let e = engine(vec![rule]);
        let result = e.classify(&photo_2024("/w/2024/a.jpg"), Path::new("/w"));
        assert!(result.is_unchanged());
    }

    #[test]
    fn test_sort_ignores_matching_names_above_base() {
        let rule = Rule::new("by-year", 0).with_action(RuleAction::sort_into("Docs/{Year}"));
        let e = engine(vec![rule]);
        let base = Path::new("/x/Docs/2024");
        let result = e.classify(&photo_2024("/x/Docs/2024/b.jpg"), base);
        assert!(!result.is_unchanged());
        assert_eq!(
            result.destination_path,
            Some(PathBuf::from("/x/Docs/2024/Docs/2024/b.jpg"))
        );

        let sorted = e.classify(&photo_2024("/x/Docs/2024/Docs/2024/b.jpg"), base);
        assert!(sorted.is_unchanged());
    }

    #[test]
    fn test_already_sorted_requires_path_below_base() {
        let base = Path::new("/w/2024");
        assert!(!already_sorted(Path::new("/w/2024"), base, Path::new("2024")));
        assert!(already_sorted(Path::new("/w/2024/2024"), base, Path::new("2024")));
        assert!(!already_sorted(Path::new("/elsewhere/2024"), base, Path::new("2024")));
    }

    #[test]
    fn test_case_only_rename_avoids_unrelated_file() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        std::fs::write(base.join("report.PDF"), "incoming").expect("write");
        std::fs::write(base.join("report.pdf"), "unrelated").expect("write");
        let case_sensitive = !is_same_file(&base.join("report.PDF"), &base.join("report.pdf"));

        let rule = Rule::new("lower", 0)
            .with_conditions(ext_is("pdf"))
            .with_action(RuleAction::rename("{Name}.pdf"));
        let e = engine(vec![rule]);
        let result = e
            .classify_path(&base.join("report.PDF"), base)
            .expect("classify");
        if case_sensitive {
            assert_eq!(result.destination_path, Some(base.join("report (1).pdf")));
        }
    }

    #[test]
    fn test_move_to_named_category() {
        let rule = Rule::new("docs", 0).with_action(RuleAction::move_to_category("documents"));
        let e = engine(vec![]);
        let plan = e.plan_destinations(&rule, &photo_2024("/w/a.jpg"), Path::new("/w"));
        assert_eq!(plan.destinations(), vec![PathBuf::from("/w/Documents/a.jpg")]);
    }
}
