//! Plan annotations.
//!
//! Plans carry their metadata as annotations:
//!
//! ```text
//! @Plan:name('OrderAlerts')
//! @Plan:description('Raises alerts for large orders')
//! @Plan:trace('false')
//! @Plan:statistics('true')
//!
//! @Import('Orders:1.0.0')
//! define stream OrdersIn (id string, price double);
//!
//! @Export('Alerts:1.0.0')
//! define stream AlertsOut (id string);
//! ```
//!
//! The engine returns these in a [`ParsedPlan`]; [`PlanMetadata`] turns them
//! into plan configuration. [`scan`] reads the same grammar straight from
//! text and [`set_plan_flag`] rewrites a boolean plan annotation in place.

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

use crate::engine::{DeclaredStream, ParsedPlan};
use crate::error::{CoreError, CoreResult};
use crate::stream::StreamId;
use crate::types::{Direction, Plan, StreamBinding};

pub const PLAN: &str = "Plan";
pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const TRACE: &str = "trace";
pub const STATISTICS: &str = "statistics";
pub const IMPORT: &str = "Import";
pub const EXPORT: &str = "Export";

const QUOTED_VALUE: &str = r#"\(\s*(?:'([^']*)'|"([^"]*)")\s*\)"#;
const QUOTED: &str = r#"\(\s*(?:'[^']*'|"[^"]*")\s*\)"#;

/// One annotation: `@name:key('value')` or `@name('value')`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub key: Option<String>,
    pub value: String,
}

impl Annotation {
    pub fn new(name: &str, key: Option<&str>, value: &str) -> Self {
        Self {
            name: name.to_string(),
            key: key.map(str::to_string),
            value: value.to_string(),
        }
    }

    /// Case-insensitive match on name and key.
    pub fn is(&self, name: &str, key: Option<&str>) -> bool {
        self.name.eq_ignore_ascii_case(name)
            && match (self.key.as_deref(), key) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                (None, None) => true,
                _ => false,
            }
    }
}

/// Value of the first annotation matching `name` and `key`.
pub fn find<'a>(annotations: &'a [Annotation], name: &str, key: Option<&str>) -> Option<&'a str> {
    annotations
        .iter()
        .find(|a| a.is(name, key))
        .map(|a| a.value.as_str())
}

fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// Plan configuration extracted from parsed annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub name: String,
    pub description: String,
    pub tracing_enabled: bool,
    pub statistics_enabled: bool,
    pub imports: Vec<StreamBinding>,
    pub exports: Vec<StreamBinding>,
}

impl PlanMetadata {
    /// Extract metadata. Absent description defaults to empty, absent
    /// trace/statistics default to `false`. A name is mandatory and every
    /// bound stream id must carry a version.
    pub fn from_parsed(parsed: &ParsedPlan) -> CoreResult<Self> {
        let name = find(&parsed.annotations, PLAN, Some(NAME))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(CoreError::MissingPlanName)?
            .to_string();

        let mut imports = Vec::new();
        let mut exports = Vec::new();
        for stream in &parsed.streams {
            if let Some(id) = find(&stream.annotations, IMPORT, None) {
                imports.push(StreamBinding {
                    local_name: stream.name.clone(),
                    stream_id: StreamId::parse(id)?,
                    direction: Direction::Import,
                });
            }
            if let Some(id) = find(&stream.annotations, EXPORT, None) {
                exports.push(StreamBinding {
                    local_name: stream.name.clone(),
                    stream_id: StreamId::parse(id)?,
                    direction: Direction::Export,
                });
            }
        }

        Ok(Self {
            name,
            description: find(&parsed.annotations, PLAN, Some(DESCRIPTION))
                .unwrap_or_default()
                .to_string(),
            tracing_enabled: parse_flag(find(&parsed.annotations, PLAN, Some(TRACE))),
            statistics_enabled: parse_flag(find(&parsed.annotations, PLAN, Some(STATISTICS))),
            imports,
            exports,
        })
    }

    pub fn into_plan(self, text: &str, editable: bool) -> Plan {
        Plan {
            name: self.name,
            text: text.to_string(),
            description: self.description,
            tracing_enabled: self.tracing_enabled,
            statistics_enabled: self.statistics_enabled,
            editable,
            imports: self.imports,
            exports: self.exports,
        }
    }
}

fn annotation_pattern() -> CoreResult<Regex> {
    Ok(Regex::new(&format!(r"@(\w+)(?:\s*:\s*(\w+))?\s*{QUOTED_VALUE}"))?)
}

fn annotations_in(pattern: &Regex, text: &str) -> Vec<Annotation> {
    pattern
        .captures_iter(text)
        .map(|caps| {
            let value = caps.get(3).or_else(|| caps.get(4)).map_or("", |m| m.as_str());
            Annotation::new(&caps[1], caps.get(2).map(|m| m.as_str()), value)
        })
        .collect()
}

/// Read plan and stream annotations directly from plan text.
///
/// Only the annotation grammar is understood; the rest of the query
/// language is left to the engine.
pub fn scan(text: &str) -> CoreResult<ParsedPlan> {
    let single = annotation_pattern()?;
    let stream_block = Regex::new(&format!(
        r"(?i)((?:@\w+(?:\s*:\s*\w+)?\s*{QUOTED}\s*)*)define\s+stream\s+(\w+)"
    ))?;

    let annotations = annotations_in(&single, text)
        .into_iter()
        .filter(|a| a.name.eq_ignore_ascii_case(PLAN))
        .collect();

    let streams = stream_block
        .captures_iter(text)
        .map(|caps| DeclaredStream {
            name: caps[2].to_string(),
            annotations: annotations_in(&single, &caps[1])
                .into_iter()
                .filter(|a| !a.name.eq_ignore_ascii_case(PLAN))
                .collect(),
        })
        .collect();

    Ok(ParsedPlan {
        annotations,
        streams,
    })
}

/// Set `@Plan:<key>('<enabled>')` in `text`, replacing an existing value or
/// inserting the annotation after `@Plan:name(...)`.
pub fn set_plan_flag(text: &str, key: &str, enabled: bool) -> CoreResult<String> {
    let replacement = format!("@{PLAN}:{key}('{enabled}')");
    let existing = Regex::new(&format!(
        r"(?i)@{PLAN}\s*:\s*{}\s*{QUOTED}",
        regex::escape(key)
    ))?;
    if existing.is_match(text) {
        return Ok(existing.replace_all(text, NoExpand(&replacement)).into_owned());
    }

    let name = Regex::new(&format!(r"(?i)@{PLAN}\s*:\s*{NAME}\s*{QUOTED}"))?;
    Ok(match name.find(text) {
        Some(m) => format!("{}\n{replacement}{}", &text[..m.end()], &text[m.end()..]),
        None => format!("{replacement}\n{text}"),
    })
}
