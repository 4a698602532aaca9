use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, INDEX_COMMANDS, MULTI_PATH_COMMANDS, NO_ARG_COMMANDS, SETTING_COMMANDS,
    SINGLE_PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub settings_update: BTreeMap<String, Value>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            settings_update: BTreeMap::new(),
            command_args: BTreeMap::new(),
        }
    }

    fn update(action: &str, raw: &str, field: &str, value: Value) -> Self {
        let mut intent = Self::new(action, raw);
        intent.settings_update.insert(field.to_string(), value);
        intent
    }

    pub fn path_arg(&self) -> Option<&str> {
        self.command_args
            .get("path")
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
    }

    pub fn path_args(&self) -> Vec<String> {
        self.command_args
            .get("paths")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    parse_path_args(arg).join(" ")
}

/// Turn one line of wizard input into an [`Intent`]. Plain text sets the
/// prompt; `/command args` dispatches through the command tables.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return Intent::update(
            "update_settings",
            text,
            "prompt",
            Value::String(raw_trimmed.to_string()),
        );
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some(field) = find_action(&command, SETTING_COMMANDS) {
        return Intent::update("update_settings", text, field, Value::String(arg.to_string()));
    }

    if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
        let mut intent = Intent::new(action, text);
        intent.command_args.insert(
            "path".to_string(),
            Value::String(parse_single_path_arg(arg)),
        );
        return intent;
    }

    if let Some(action) = find_action(&command, MULTI_PATH_COMMANDS) {
        let mut intent = Intent::new(action, text);
        intent.command_args.insert(
            "paths".to_string(),
            Value::Array(parse_path_args(arg).into_iter().map(Value::String).collect()),
        );
        return intent;
    }

    if let Some(action) = find_action(&command, INDEX_COMMANDS) {
        let mut intent = Intent::new(action, text);
        let index = arg
            .parse::<u64>()
            .ok()
            .map(Value::from)
            .unwrap_or(Value::Null);
        intent.command_args.insert("index".to_string(), index);
        return intent;
    }

    if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
        return Intent::new(action, text);
    }

    let mut intent = Intent::new("unknown", text);
    intent
        .command_args
        .insert("command".to_string(), Value::String(command));
    intent
        .command_args
        .insert("arg".to_string(), Value::String(arg.to_string()));
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn plain_text_sets_prompt() {
        let intent = parse_intent("  bright minimalist kitchen  ");
        assert_eq!(intent.action, "update_settings");
        assert_eq!(
            intent.settings_update["prompt"],
            json!("bright minimalist kitchen")
        );
    }

    #[test]
    fn setting_commands_map_to_field_names() {
        let room = parse_intent("/room kitchen");
        assert_eq!(room.action, "update_settings");
        assert_eq!(room.settings_update["roomType"], json!("kitchen"));

        let budget = parse_intent("/budget 25000");
        assert_eq!(budget.settings_update["budget"], json!("25000"));

        let weight = parse_intent("/WEIGHT High");
        assert_eq!(weight.settings_update["inspirationWeight"], json!("High"));
    }

    #[test]
    fn image_path_keeps_quoted_spaces() {
        let intent = parse_intent("/image \"/tmp/my room.jpg\"");
        assert_eq!(intent.action, "set_primary_image");
        assert_eq!(intent.path_arg(), Some("/tmp/my room.jpg"));
    }

    #[test]
    fn add_collects_every_path() {
        let intent = parse_intent("/add sofa.png \"/tmp/floor lamp.png\" plant.webp");
        assert_eq!(intent.action, "add_auxiliary_images");
        assert_eq!(
            intent.path_args(),
            vec!["sofa.png", "/tmp/floor lamp.png", "plant.webp"]
        );
    }

    #[test]
    fn remove_parses_index_or_null() {
        assert_eq!(parse_intent("/remove 2").command_args["index"], json!(2));
        assert_eq!(
            parse_intent("/remove second").command_args["index"],
            json!(null)
        );
    }

    #[test]
    fn download_without_dir_has_no_path() {
        let intent = parse_intent("/download");
        assert_eq!(intent.action, "download");
        assert_eq!(intent.path_arg(), None);
    }

    #[test]
    fn navigation_and_finish_aliases() {
        assert_eq!(parse_intent("/next").action, "next");
        assert_eq!(parse_intent("/back").action, "back");
        assert_eq!(parse_intent("/generate").action, "finish");
        assert_eq!(parse_intent("/finish").action, "finish");
        assert_eq!(parse_intent("/restart").action, "reset_workflow");
        assert_eq!(parse_intent("/exit").action, "quit");
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn unknown_command_keeps_arguments() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
