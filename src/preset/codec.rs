use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use super::{
    AllFlowPrompts, FlowKind, FlowPrompts, Preset, PresetError, PresetMetadata, PromptPreset,
    SingleFlowPreset,
};

type Object = Map<String, Value>;

/// Parses and validates a preset document.
///
/// Nothing is returned unless the whole document is valid, so callers can apply
/// the result without worrying about half-imported state.
pub fn decode(text: &str) -> Result<Preset, PresetError> {
    let root: Value = serde_json::from_str(text)?;
    let root = object(&root, "$")?;

    let metadata = decode_metadata(required(root, "metadata", "metadata")?)?;
    let prompts = required(root, "prompts", "prompts")?;

    match metadata.flow_type {
        Some(flow) => {
            let prompts = decode_flow(prompts, flow, "prompts")?;
            Ok(Preset::SingleFlow(SingleFlowPreset { metadata, prompts }))
        }
        None => {
            let flows = object(prompts, "prompts")?;
            let mut decoded = Vec::with_capacity(FlowKind::ALL.len());
            for flow in FlowKind::ALL {
                let path = format!("prompts.{}", flow);
                decoded.push(decode_flow(required(flows, flow.as_str(), &path)?, flow, &path)?);
            }
            let mut decoded = decoded.into_iter();
            let (Some(default), Some(anthropic), Some(nosearch)) =
                (decoded.next(), decoded.next(), decoded.next())
            else {
                return Err(PresetError::schema("prompts", "expected three flows"));
            };
            Ok(Preset::AllFlows(PromptPreset {
                metadata,
                prompts: AllFlowPrompts {
                    default,
                    anthropic,
                    nosearch,
                },
            }))
        }
    }
}

/// Pretty JSON with two-space indentation. Prompt keys come out sorted.
pub fn encode(preset: &Preset) -> Result<String, PresetError> {
    let text = match preset {
        Preset::AllFlows(preset) => serde_json::to_string_pretty(preset)?,
        Preset::SingleFlow(preset) => serde_json::to_string_pretty(preset)?,
    };
    Ok(text)
}

pub fn read_preset(path: &Path) -> Result<Preset, PresetError> {
    let text = fs::read_to_string(path).map_err(|source| PresetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&text)
}

pub fn write_preset(path: &Path, preset: &Preset) -> Result<(), PresetError> {
    let mut text = encode(preset)?;
    text.push('\n');
    fs::write(path, text).map_err(|source| PresetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Checks that `prompts` carries every prompt `flow` needs.
pub(crate) fn validate_flow(
    prompts: &FlowPrompts,
    flow: FlowKind,
    path: &str,
) -> Result<(), PresetError> {
    for key in flow.required_prompts() {
        match prompts.get(*key) {
            None => return Err(PresetError::schema(format!("{}.{}", path, key), "missing")),
            Some(text) if text.trim().is_empty() => {
                return Err(PresetError::schema(format!("{}.{}", path, key), "must not be empty"));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn decode_metadata(value: &Value) -> Result<PresetMetadata, PresetError> {
    let metadata = object(value, "metadata")?;
    let flow_type = match metadata.get("flow_type") {
        None | Some(Value::Null) => None,
        Some(Value::String(key)) => Some(FlowKind::from_key(key).ok_or_else(|| {
            PresetError::schema(
                "metadata.flow_type",
                format!("unknown flow {:?}, expected default, anthropic or nosearch", key),
            )
        })?),
        Some(_) => return Err(PresetError::schema("metadata.flow_type", "must be a string")),
    };
    Ok(PresetMetadata {
        name: required_text(metadata, "name")?,
        description: optional_text(metadata, "description")?,
        version: required_text(metadata, "version")?,
        created_at: required_text(metadata, "created_at")?,
        modified_at: optional_text(metadata, "modified_at")?,
        author: optional_text(metadata, "author")?,
        flow_type,
    })
}

fn decode_flow(value: &Value, flow: FlowKind, path: &str) -> Result<FlowPrompts, PresetError> {
    let fields = object(value, path)?;
    let mut prompts = FlowPrompts::new();
    for (key, value) in fields {
        match value {
            Value::String(text) => {
                prompts.insert(key.clone(), text.clone());
            }
            _ => {
                return Err(PresetError::schema(format!("{}.{}", path, key), "must be a string"));
            }
        }
    }
    validate_flow(&prompts, flow, path)?;
    Ok(prompts)
}

fn object<'a>(value: &'a Value, path: &str) -> Result<&'a Object, PresetError> {
    value
        .as_object()
        .ok_or_else(|| PresetError::schema(path, "must be an object"))
}

fn required<'a>(object: &'a Object, key: &str, path: &str) -> Result<&'a Value, PresetError> {
    object
        .get(key)
        .ok_or_else(|| PresetError::schema(path, "missing"))
}

fn required_text(metadata: &Object, key: &str) -> Result<String, PresetError> {
    let path = format!("metadata.{}", key);
    match metadata.get(key) {
        None => Err(PresetError::schema(path, "missing")),
        Some(Value::String(text)) if text.trim().is_empty() => {
            Err(PresetError::schema(path, "must not be empty"))
        }
        Some(Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(PresetError::schema(path, "must be a string")),
    }
}

fn optional_text(metadata: &Object, key: &str) -> Result<Option<String>, PresetError> {
    match metadata.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(PresetError::schema(format!("metadata.{}", key), "must be a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn metadata() -> Value {
        json!({
            "name": "Team prompts",
            "version": "1.0",
            "created_at": "2025-01-02T03:04:05+00:00"
        })
    }

    fn default_prompts() -> Value {
        json!({
            "generate_query": "Write queries for {research_topic}",
            "web_research": "Search for {research_topic}",
            "reflection": "Find gaps",
            "finalize_answer": "Answer with citations"
        })
    }

    fn all_flows() -> Value {
        let mut anthropic = default_prompts();
        anthropic["direct_llm_response"] = json!("Answer directly");
        json!({
            "metadata": metadata(),
            "prompts": {
                "default": default_prompts(),
                "anthropic": anthropic,
                "nosearch": {"direct_llm_response": "Answer from memory", "tone": "brief"}
            }
        })
    }

    fn schema_path(result: Result<Preset, PresetError>) -> String {
        match result {
            Err(PresetError::Schema { path, .. }) => path,
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn decodes_all_flow_presets() {
        let preset = decode(&all_flows().to_string()).unwrap();
        let Preset::AllFlows(preset) = preset else {
            panic!("expected an all-flow preset");
        };
        assert_eq!(preset.metadata.name, "Team prompts");
        assert_eq!(preset.prompts.get(FlowKind::Nosearch)["tone"], "brief");
        assert_eq!(preset.prompts.anthropic.len(), 5);
    }

    #[test]
    fn nosearch_single_flow_round_trips() {
        let mut meta = metadata();
        meta["flow_type"] = json!("nosearch");
        meta["author"] = json!("research-team");
        let doc = json!({
            "metadata": meta,
            "prompts": {"direct_llm_response": "Answer from memory"}
        });
        let preset = decode(&doc.to_string()).unwrap();
        assert_eq!(preset.flows(), vec![FlowKind::Nosearch]);
        let encoded = encode(&preset).unwrap();
        assert!(encoded.contains("\n  \"metadata\": {\n    \"name\""));
        assert_eq!(decode(&encoded).unwrap(), preset);
    }

    #[test]
    fn encoding_is_deterministic() {
        let preset = decode(&all_flows().to_string()).unwrap();
        let first = encode(&preset).unwrap();
        let second = encode(&decode(&first).unwrap()).unwrap();
        assert_eq!(first, second);
        let finalize = first.find("\"finalize_answer\"").unwrap();
        let generate = first.find("\"generate_query\"").unwrap();
        assert!(finalize < generate);
    }

    #[test]
    fn invalid_json_is_a_format_error() {
        assert!(matches!(decode("{\"metadata\": "), Err(PresetError::Format(_))));
    }

    #[test]
    fn missing_version_is_reported_by_path() {
        let mut doc = all_flows();
        doc["metadata"].as_object_mut().unwrap().remove("version");
        assert_eq!(schema_path(decode(&doc.to_string())), "metadata.version");
    }

    #[test]
    fn metadata_fields_must_be_non_empty_strings() {
        let mut doc = all_flows();
        doc["metadata"]["name"] = json!("  ");
        assert_eq!(schema_path(decode(&doc.to_string())), "metadata.name");

        let mut doc = all_flows();
        doc["metadata"]["created_at"] = json!(20250102);
        assert_eq!(schema_path(decode(&doc.to_string())), "metadata.created_at");

        let mut doc = all_flows();
        doc["metadata"]["author"] = json!(["a"]);
        assert_eq!(schema_path(decode(&doc.to_string())), "metadata.author");
    }

    #[test]
    fn whitespace_only_prompts_count_as_empty() {
        let mut doc = all_flows();
        doc["prompts"]["default"]["reflection"] = json!(" \n\t ");
        assert_eq!(schema_path(decode(&doc.to_string())), "prompts.default.reflection");
    }

    #[test]
    fn unknown_flow_type_is_rejected() {
        let mut doc = all_flows();
        doc["metadata"]["flow_type"] = json!("claude");
        assert_eq!(schema_path(decode(&doc.to_string())), "metadata.flow_type");
    }

    #[test]
    fn missing_flow_in_bundle_is_rejected() {
        let mut doc = all_flows();
        doc["prompts"].as_object_mut().unwrap().remove("anthropic");
        assert_eq!(schema_path(decode(&doc.to_string())), "prompts.anthropic");
    }

    #[test]
    fn required_prompt_fields_follow_the_flow() {
        let mut doc = all_flows();
        doc["prompts"]["anthropic"]
            .as_object_mut()
            .unwrap()
            .remove("direct_llm_response");
        assert_eq!(
            schema_path(decode(&doc.to_string())),
            "prompts.anthropic.direct_llm_response"
        );

        let mut meta = metadata();
        meta["flow_type"] = json!("default");
        let doc = json!({"metadata": meta, "prompts": {"generate_query": "q"}});
        assert_eq!(schema_path(decode(&doc.to_string())), "prompts.web_research");
    }

    #[test]
    fn non_string_prompt_values_are_rejected() {
        let mut doc = all_flows();
        doc["prompts"]["nosearch"]["temperature"] = json!(0.2);
        assert_eq!(
            schema_path(decode(&doc.to_string())),
            "prompts.nosearch.temperature"
        );
    }

    #[test]
    fn file_helpers_report_io_errors_with_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        match read_preset(&missing) {
            Err(PresetError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected io error, got {:?}", other),
        }

        let preset = decode(&all_flows().to_string()).unwrap();
        let target = dir.path().join("team.json");
        write_preset(&target, &preset).unwrap();
        assert_eq!(read_preset(&target).unwrap(), preset);
    }
}
