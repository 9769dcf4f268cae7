//! Name pattern tokens used by `Rename` and `SortIntoSubfolder` actions.
//!
//! Supported tokens (case-insensitive): `{Name}`, `{Extension}`/`{ext}`,
//! `{Date}`/`{date:fmt}`, `{Year}`, `{Month}`, `{Day}`, `{CreatedYear}`,
//! `{CreatedMonth}`, `{CreatedDay}`, `{created:fmt}`, `{Today}`/`{today:fmt}`,
//! `{Kind}` and `{Category}`. Unknown tokens are copied through untouched.

use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use regex::{Captures, Regex};

use crate::metadata::{FileMetadata, split_name};

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

static TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z]+)(?::([^{}]*))?\}").ok());

/// Values available to token expansion.
#[derive(Debug, Clone, Copy)]
pub struct TokenContext<'a> {
    pub file: &'a FileMetadata,
    /// File name at the current point of the action chain.
    pub current_name: &'a str,
    pub category: Option<&'a str>,
    pub now: DateTime<Local>,
}

/// Expands every recognised token in `pattern`.
pub fn expand(pattern: &str, ctx: &TokenContext<'_>) -> String {
    let Some(re) = TOKEN.as_ref() else {
        return pattern.to_string();
    };

    re.replace_all(pattern, |caps: &Captures<'_>| {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let format = caps.get(2).map(|m| m.as_str());
        match expand_token(name, format, ctx) {
            Some(value) => sanitize(&value),
            None => caps
                .get(0)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        }
    })
    .into_owned()
}

/// True if the pattern controls the extension itself.
pub fn has_extension_token(pattern: &str) -> bool {
    let lower = pattern.to_lowercase();
    lower.contains("{extension}") || lower.contains("{ext}")
}

fn expand_token(name: &str, format: Option<&str>, ctx: &TokenContext<'_>) -> Option<String> {
    let (stem, extension) = split_name(ctx.current_name);
    let modified = ctx.file.modified_or_created();
    let created = ctx.file.created_or_modified();

    match name.to_lowercase().as_str() {
        "name" => Some(stem),
        "extension" | "ext" => Some(extension),
        "kind" => Some(ctx.file.kind.label().to_string()),
        "category" => ctx.category.map(str::to_string),
        "date" => format_date(modified?, format),
        "created" => format_date(created?, format),
        "today" => format_date(ctx.now, format),
        "year" => format_date(modified?, Some("%Y")),
        "month" => format_date(modified?, Some("%m")),
        "day" => format_date(modified?, Some("%d")),
        "createdyear" => format_date(created?, Some("%Y")),
        "createdmonth" => format_date(created?, Some("%m")),
        "createdday" => format_date(created?, Some("%d")),
        _ => None,
    }
}

fn format_date(date: DateTime<Local>, format: Option<&str>) -> Option<String> {
    let format = match format {
        Some(f) if f.contains('%') => f.to_string(),
        Some(f) if !f.is_empty() => translate_format(f),
        _ => DEFAULT_DATE_FORMAT.to_string(),
    };

    let items: Vec<Item<'_>> = StrftimeItems::new(&format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }

    let mut out = String::new();
    write!(out, "{}", date.format_with_items(items.iter())).ok()?;
    Some(out)
}

/// Translates `yyyy-MM-dd` style formats into strftime.
///
/// Month and day names always come out in English.
pub fn translate_format(format: &str) -> String {
    let chars: Vec<char> = format.chars().collect();
    let mut out = String::with_capacity(format.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let spec = match (c, run) {
            ('y', 4..) => Some("%Y"),
            ('y', _) => Some("%y"),
            ('M', 4..) => Some("%B"),
            ('M', 3) => Some("%b"),
            ('M', 2) => Some("%m"),
            ('M', _) => Some("%-m"),
            ('d', 4..) => Some("%A"),
            ('d', 3) => Some("%a"),
            ('d', 2) => Some("%d"),
            ('d', _) => Some("%-d"),
            ('H', 2..) => Some("%H"),
            ('H', _) => Some("%-H"),
            ('h', 2..) => Some("%I"),
            ('h', _) => Some("%-I"),
            ('m', 2..) => Some("%M"),
            ('m', _) => Some("%-M"),
            ('s', 2..) => Some("%S"),
            ('s', _) => Some("%-S"),
            ('t', _) => Some("%p"),
            _ => None,
        };

        match spec {
            Some(spec) => {
                out.push_str(spec);
                i += run;
            }
            None => {
                if c == '%' {
                    out.push_str("%%");
                } else {
                    out.push(c);
                }
                i += 1;
            }
        }
    }
    out
}

/// Token values must never introduce path separators.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            other => other,
        })
        .collect()
}
