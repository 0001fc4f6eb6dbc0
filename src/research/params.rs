use serde::Serialize;

use super::mode::{EffortLevel, FlowType, SearchMode};

/// Assistant (graph) id used by every flow except multi-agent.
pub const DEFAULT_ASSISTANT_ID: &str = "agent";
/// Assistant id of the multi-agent research graph.
pub const MULTI_AGENT_ASSISTANT_ID: &str = "multi-agent";

/// Concrete request parameters derived from the user's selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedParameters {
    pub initial_search_query_count: u32,
    pub max_research_loops: u32,
    pub assistant_id: String,
}

/// Maps a (mode, effort, flow) selection to request parameters.
///
/// No-search ignores effort entirely; deep always runs 15 loops.
pub fn resolve(mode: SearchMode, effort: EffortLevel, flow: FlowType) -> ResolvedParameters {
    let (initial_search_query_count, max_research_loops) = match (mode, effort) {
        (SearchMode::NoSearch, _) => (0, 0),
        (SearchMode::Deep, EffortLevel::Low) => (8, 15),
        (SearchMode::Deep, EffortLevel::Medium) => (10, 15),
        (SearchMode::Deep, EffortLevel::High) => (12, 15),
        (SearchMode::Standard, EffortLevel::Low) => (1, 1),
        (SearchMode::Standard, EffortLevel::Medium) => (3, 3),
        (SearchMode::Standard, EffortLevel::High) => (5, 10),
    };
    let assistant_id = match flow {
        FlowType::MultiAgent => MULTI_AGENT_ASSISTANT_ID,
        FlowType::SingleAgent | FlowType::Claude => DEFAULT_ASSISTANT_ID,
    };
    ResolvedParameters {
        initial_search_query_count,
        max_research_loops,
        assistant_id: assistant_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn counts(mode: SearchMode, effort: EffortLevel) -> (u32, u32) {
        let params = resolve(mode, effort, FlowType::SingleAgent);
        (params.initial_search_query_count, params.max_research_loops)
    }

    #[test]
    fn no_search_is_always_zero() {
        for effort in EffortLevel::ALL {
            for flow in FlowType::ALL {
                let params = resolve(SearchMode::NoSearch, effort, flow);
                assert_eq!(params.initial_search_query_count, 0);
                assert_eq!(params.max_research_loops, 0);
            }
        }
    }

    #[test]
    fn lookup_table() {
        assert_eq!(counts(SearchMode::Standard, EffortLevel::Low), (1, 1));
        assert_eq!(counts(SearchMode::Standard, EffortLevel::Medium), (3, 3));
        assert_eq!(counts(SearchMode::Standard, EffortLevel::High), (5, 10));
        assert_eq!(counts(SearchMode::Deep, EffortLevel::Low), (8, 15));
        assert_eq!(counts(SearchMode::Deep, EffortLevel::Medium), (10, 15));
        assert_eq!(counts(SearchMode::Deep, EffortLevel::High), (12, 15));
    }

    #[test]
    fn multi_agent_flow_selects_multi_agent_assistant() {
        for mode in SearchMode::ALL {
            for effort in EffortLevel::ALL {
                assert_eq!(
                    resolve(mode, effort, FlowType::MultiAgent).assistant_id,
                    "multi-agent"
                );
                assert_eq!(
                    resolve(mode, effort, FlowType::SingleAgent).assistant_id,
                    DEFAULT_ASSISTANT_ID
                );
            }
        }
    }

    #[test]
    fn unknown_effort_string_resolves_like_medium() {
        let effort = EffortLevel::parse_lenient("turbo");
        assert_eq!(
            resolve(SearchMode::Deep, effort, FlowType::Claude),
            resolve(SearchMode::Deep, EffortLevel::Medium, FlowType::Claude)
        );
        assert_eq!(counts(SearchMode::Standard, effort), (3, 3));
    }

    #[test]
    fn deep_low_single_agent_scenario() {
        assert_eq!(
            resolve(SearchMode::Deep, EffortLevel::Low, FlowType::SingleAgent),
            ResolvedParameters {
                initial_search_query_count: 8,
                max_research_loops: 15,
                assistant_id: String::from("agent"),
            }
        );
    }
}
