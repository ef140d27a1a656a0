//! Roster page → shift observations.
//!
//! Name candidates are `<h3>`, `<strong>` and elements classed `name` or
//! `cast_name`, in document order. The time range is looked up in the
//! candidate's own text first, then in its parent and grandparent, never past
//! a list or table container (that text belongs to other members).

use std::sync::OnceLock;

use regex::Regex;

use roster_core::{names, Observation, ShiftTimes};

use crate::html::{Document, Element};

const NAME_TAGS: &[&str] = &["h3", "strong"];
const NAME_CLASSES: &[&str] = &["name", "cast_name"];
const CONTAINER_TAGS: &[&str] = &["ul", "ol", "table", "tbody", "body", "html"];

/// Ancestors searched for a time range above the candidate itself.
const CONTEXT_DEPTH: usize = 2;

/// Result of scanning one page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Candidates with a time range, in document order.
    pub observations: Vec<Observation>,
    /// Candidates that looked like names but had no time range nearby.
    pub without_times: Vec<String>,
}

/// Extract every observation from a roster page.
pub fn extract_observations(html: &str) -> Extraction {
    let doc = Document::parse(html);
    let mut extraction = Extraction::default();

    for element in doc.elements().filter(is_name_candidate) {
        let raw = element.text();
        if names::lookup_key(&raw).is_empty() {
            continue;
        }
        match find_times(element) {
            Some(times) => extraction.observations.push(Observation {
                display_name: raw,
                times,
            }),
            None => extraction.without_times.push(raw),
        }
    }
    extraction
}

/// First `H:MM … H:MM` pair in `text`, zero-padded.
pub fn parse_time_range(text: &str) -> Option<ShiftTimes> {
    static TIME_RANGE: OnceLock<Regex> = OnceLock::new();
    let re = TIME_RANGE.get_or_init(|| {
        Regex::new(r"([0-9]{1,2}:[0-9]{2}).*?([0-9]{1,2}:[0-9]{2})")
            .expect("time range pattern is valid")
    });
    let caps = re.captures(text)?;
    ShiftTimes::parse(&caps[1], &caps[2]).ok()
}

fn is_name_candidate(element: &Element<'_>) -> bool {
    NAME_TAGS.contains(&element.tag()) || NAME_CLASSES.iter().any(|c| element.has_class(c))
}

fn find_times(element: Element<'_>) -> Option<ShiftTimes> {
    let mut current = Some(element);
    for _ in 0..=CONTEXT_DEPTH {
        let el = current?;
        if CONTAINER_TAGS.contains(&el.tag()) {
            return None;
        }
        if let Some(times) = parse_time_range(&el.text()) {
            return Some(times);
        }
        current = el.parent();
    }
    None
}
