use std::fmt;

use chrono::{DateTime, TimeZone};

use super::FlowKind;

/// Suggested file name for an exported preset, e.g. `team_prompts_nosearch_20250102_030405.json`.
pub fn preset_filename<Tz: TimeZone>(name: &str, flow: Option<FlowKind>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    let mut stem = String::with_capacity(name.len());
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            stem.push(ch);
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_matches('_');
    let mut file = if stem.is_empty() {
        String::from("prompts")
    } else {
        stem.to_string()
    };
    if let Some(flow) = flow {
        file.push('_');
        file.push_str(flow.as_str());
    }
    file.push('_');
    file.push_str(&now.format("%Y%m%d_%H%M%S").to_string());
    file.push_str(".json");
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn sanitizes_and_stamps() {
        assert_eq!(
            preset_filename("Team Prompts!", Some(FlowKind::Nosearch), &at()),
            "team_prompts_nosearch_20250102_030405.json"
        );
        assert_eq!(
            preset_filename("  --Deep   research v2--", None, &at()),
            "deep_research_v2_20250102_030405.json"
        );
    }

    #[test]
    fn empty_names_fall_back() {
        assert_eq!(preset_filename("", None, &at()), "prompts_20250102_030405.json");
        assert_eq!(
            preset_filename("研究", Some(FlowKind::Default), &at()),
            "prompts_default_20250102_030405.json"
        );
    }
}
