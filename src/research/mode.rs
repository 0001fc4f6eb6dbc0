//! Static registry of research modes, effort levels and agent flows.
//!
//! Everything here is plain data. Adding a variant forces every `match` in the
//! resolver, the classifier and the UI to be revisited.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

/// How much web research the remote agent performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    /// Answer from model knowledge only.
    NoSearch,
    /// A few queries and reflection loops.
    #[default]
    Standard,
    /// Many queries, long loops and source validation.
    Deep,
}

impl SearchMode {
    pub const ALL: [SearchMode; 3] = [SearchMode::NoSearch, SearchMode::Standard, SearchMode::Deep];

    /// Wire spelling, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::NoSearch => "no-search",
            SearchMode::Standard => "standard",
            SearchMode::Deep => "deep",
        }
    }

    pub fn label(self) -> &'static str {
        self.profile().label
    }

    /// Cycles to the next mode, wrapping around.
    pub fn next(self) -> Self {
        match self {
            SearchMode::NoSearch => SearchMode::Standard,
            SearchMode::Standard => SearchMode::Deep,
            SearchMode::Deep => SearchMode::NoSearch,
        }
    }

    /// Returns the registry entry describing this mode.
    pub fn profile(self) -> &'static ModeProfile {
        match self {
            SearchMode::NoSearch => &MODE_PROFILES[0],
            SearchMode::Standard => &MODE_PROFILES[1],
            SearchMode::Deep => &MODE_PROFILES[2],
        }
    }

    /// Whether effort changes anything for this mode.
    pub fn uses_effort(self) -> bool {
        !matches!(self, SearchMode::NoSearch)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secondary dial that scales query and loop counts inside a mode.
///
/// Parsing is lenient: any unrecognised spelling becomes [`EffortLevel::Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EffortLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl EffortLevel {
    pub const ALL: [EffortLevel; 3] = [EffortLevel::Low, EffortLevel::Medium, EffortLevel::High];

    pub fn as_str(self) -> &'static str {
        match self {
            EffortLevel::Low => "low",
            EffortLevel::Medium => "medium",
            EffortLevel::High => "high",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EffortLevel::Low => "Low",
            EffortLevel::Medium => "Medium",
            EffortLevel::High => "High",
        }
    }

    pub fn next(self) -> Self {
        match self {
            EffortLevel::Low => EffortLevel::Medium,
            EffortLevel::Medium => EffortLevel::High,
            EffortLevel::High => EffortLevel::Low,
        }
    }

    /// Parses an effort string, falling back to `Medium` for anything unknown.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => EffortLevel::Low,
            "medium" => EffortLevel::Medium,
            "high" => EffortLevel::High,
            other => {
                warn!("Unknown effort level {:?}, falling back to medium", other);
                EffortLevel::Medium
            }
        }
    }

    /// `clap` value parser that never rejects input.
    pub fn clap_parser(raw: &str) -> Result<Self, std::convert::Infallible> {
        Ok(Self::parse_lenient(raw))
    }
}

impl From<String> for EffortLevel {
    fn from(raw: String) -> Self {
        Self::parse_lenient(&raw)
    }
}

impl From<&str> for EffortLevel {
    fn from(raw: &str) -> Self {
        Self::parse_lenient(raw)
    }
}

impl From<EffortLevel> for String {
    fn from(level: EffortLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for EffortLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which remote assistant graph handles the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FlowType {
    #[default]
    SingleAgent,
    MultiAgent,
    Claude,
}

impl FlowType {
    pub const ALL: [FlowType; 3] = [FlowType::SingleAgent, FlowType::MultiAgent, FlowType::Claude];

    pub fn as_str(self) -> &'static str {
        match self {
            FlowType::SingleAgent => "single-agent",
            FlowType::MultiAgent => "multi-agent",
            FlowType::Claude => "claude",
        }
    }

    /// Default display name, used when the server does not publish a flow list.
    pub fn label(self) -> &'static str {
        match self {
            FlowType::SingleAgent => "Single Agent Research",
            FlowType::MultiAgent => "Multi-Agent Research System",
            FlowType::Claude => "Claude Research",
        }
    }

    pub fn next(self) -> Self {
        match self {
            FlowType::SingleAgent => FlowType::MultiAgent,
            FlowType::MultiAgent => FlowType::Claude,
            FlowType::Claude => FlowType::SingleAgent,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flow| flow.as_str() == key)
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-facing description of a research mode.
#[derive(Debug)]
pub struct ModeProfile {
    pub mode: SearchMode,
    pub label: &'static str,
    pub summary: &'static str,
    /// Rough wall-clock estimate shown next to the selector.
    pub estimated_time: &'static str,
    pub features: &'static [&'static str],
}

pub static MODE_PROFILES: [ModeProfile; 3] = [
    ModeProfile {
        mode: SearchMode::NoSearch,
        label: "No Search",
        summary: "Answer directly from the model's training knowledge",
        estimated_time: "5-15 s",
        features: &["No web queries", "No research loops", "Fastest response"],
    },
    ModeProfile {
        mode: SearchMode::Standard,
        label: "Standard",
        summary: "Balanced web research with reflection",
        estimated_time: "30 s - 2 min",
        features: &["1-5 initial queries", "1-10 research loops", "Cited sources"],
    },
    ModeProfile {
        mode: SearchMode::Deep,
        label: "Deep Research",
        summary: "Comprehensive investigation with source validation",
        estimated_time: "5-15 min",
        features: &[
            "8-12 initial queries",
            "Up to 15 research loops",
            "2 extra source validation rounds",
            "Cross-referenced report",
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_entries_match_their_mode() {
        for mode in SearchMode::ALL {
            assert_eq!(mode.profile().mode, mode);
            assert!(!mode.profile().features.is_empty());
        }
    }

    #[test]
    fn unknown_effort_fails_closed_to_medium() {
        assert_eq!(EffortLevel::parse_lenient("HIGH"), EffortLevel::High);
        assert_eq!(EffortLevel::parse_lenient(" low "), EffortLevel::Low);
        assert_eq!(EffortLevel::parse_lenient("extreme"), EffortLevel::Medium);
        assert_eq!(EffortLevel::parse_lenient(""), EffortLevel::Medium);
    }

    #[test]
    fn serde_spellings_are_kebab_case() {
        let mode: SearchMode = serde_json::from_str("\"no-search\"").unwrap();
        assert_eq!(mode, SearchMode::NoSearch);
        let flow: FlowType = serde_json::from_str("\"multi-agent\"").unwrap();
        assert_eq!(flow, FlowType::MultiAgent);
        let effort: EffortLevel = serde_json::from_str("\"bogus\"").unwrap();
        assert_eq!(effort, EffortLevel::Medium);
        assert_eq!(serde_json::to_string(&EffortLevel::High).unwrap(), "\"high\"");
    }

    #[test]
    fn cycling_visits_every_variant() {
        let mut mode = SearchMode::NoSearch;
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(mode, SearchMode::NoSearch);
        assert_eq!(seen, SearchMode::ALL.to_vec());
        assert_eq!(FlowType::from_key("claude"), Some(FlowType::Claude));
        assert_eq!(FlowType::from_key("agent"), None);
    }
}
