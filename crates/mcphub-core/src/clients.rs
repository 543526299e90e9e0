use crate::error::HubError;
use crate::models::{ClientId, ServerDefinition};
use crate::paths::write_atomic;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const CODEX_BEGIN: &str = "# mcphub:servers:begin";
const CODEX_END: &str = "# mcphub:servers:end";

const CLINE_SETTINGS_FILE: &str = "cline_mcp_settings.json";
const CLINE_EDITOR_VARIANTS: [&str; 5] =
    ["Code", "Code - Insiders", "VSCodium", "Cursor", "Windsurf"];

/// Knows, for every supported client, where its configuration lives and how
/// to read and rewrite MCP server entries from it. Writes merge in place:
/// unrelated keys in a client's file always survive.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    home_directory: PathBuf,
}

impl ClientRegistry {
    pub fn new(home_directory: PathBuf) -> Self {
        Self { home_directory }
    }

    pub fn detect() -> Self {
        let home = crate::paths::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home)
    }

    pub fn home_directory(&self) -> &Path {
        &self.home_directory
    }

    /// Path of the client's config file when it exists on disk.
    pub fn locate_config_path(&self, client: ClientId) -> Option<PathBuf> {
        match client {
            ClientId::Cline => self.find_cline_settings(),
            _ => {
                let path = self.config_write_path(client);
                path.is_file().then_some(path)
            }
        }
    }

    /// Deterministic target path for writes, used even when the file does
    /// not exist yet (`create_if_missing` flows).
    pub fn config_write_path(&self, client: ClientId) -> PathBuf {
        match client {
            ClientId::Cursor => self.home_directory.join(".cursor").join("mcp.json"),
            ClientId::Windsurf => self
                .home_directory
                .join(".codeium")
                .join("windsurf")
                .join("mcp_config.json"),
            ClientId::Cline => self
                .find_cline_settings()
                .unwrap_or_else(|| self.cline_default_path()),
            ClientId::ClaudeDesktop => self
                .app_data_directory()
                .join("Claude")
                .join("claude_desktop_config.json"),
            ClientId::ClaudeCode => self.home_directory.join(".claude.json"),
            ClientId::Vscode => self
                .app_data_directory()
                .join("Code")
                .join("User")
                .join("settings.json"),
            ClientId::Codex => self.home_directory.join(".codex").join("config.toml"),
        }
    }

    pub fn read_servers(&self, client: ClientId) -> Result<Vec<ServerDefinition>, HubError> {
        let Some(path) = self.locate_config_path(client) else {
            return Err(HubError::NotFound {
                path: self.config_write_path(client),
            });
        };
        let raw = fs::read_to_string(&path).map_err(|error| HubError::io(&path, error))?;
        self.parse(client, &raw)
    }

    /// Parses a client's raw config into server definitions. A malformed file
    /// fails the whole client; no partial definitions escape it.
    pub fn parse(&self, client: ClientId, raw: &str) -> Result<Vec<ServerDefinition>, HubError> {
        match client {
            ClientId::Codex => parse_codex_toml(client, raw),
            _ => parse_client_json(client, raw),
        }
    }

    /// Drops the servers named in `removed` from the client's config and
    /// upserts `unified`, leaving every other entry's stored value and every
    /// unrelated key exactly as found. A missing file starts from an empty
    /// document.
    pub fn replace_servers(
        &self,
        client: ClientId,
        path: &Path,
        removed: &BTreeSet<String>,
        unified: &ServerDefinition,
    ) -> Result<(), HubError> {
        match client {
            ClientId::Codex => replace_codex_servers(client, path, removed, unified),
            _ => replace_json_servers(client, path, removed, unified),
        }
    }

    fn app_data_directory(&self) -> PathBuf {
        #[cfg(target_os = "macos")]
        {
            self.home_directory
                .join("Library")
                .join("Application Support")
        }
        #[cfg(not(target_os = "macos"))]
        {
            self.home_directory.join(".config")
        }
    }

    fn cline_default_path(&self) -> PathBuf {
        self.app_data_directory()
            .join("Code")
            .join("User")
            .join("globalStorage")
            .join("saoudrizwan.claude-dev")
            .join("settings")
            .join(CLINE_SETTINGS_FILE)
    }

    /// Cline stores its settings under the host editor's globalStorage, and
    /// the host may be any VS Code variant.
    fn find_cline_settings(&self) -> Option<PathBuf> {
        for editor in CLINE_EDITOR_VARIANTS {
            let storage = self
                .app_data_directory()
                .join(editor)
                .join("User")
                .join("globalStorage");
            if !storage.is_dir() {
                continue;
            }
            let found = WalkDir::new(&storage)
                .max_depth(3)
                .into_iter()
                .filter_map(Result::ok)
                .find(|entry| {
                    entry.file_type().is_file()
                        && entry.file_name().to_str() == Some(CLINE_SETTINGS_FILE)
                });
            if let Some(entry) = found {
                return Some(entry.into_path());
            }
        }
        None
    }
}

fn parse_client_json(client: ClientId, raw: &str) -> Result<Vec<ServerDefinition>, HubError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed = serde_json::from_str::<JsonValue>(raw)
        .map_err(|error| HubError::parse(client, error.to_string()))?;
    let Some(root) = parsed.as_object() else {
        return Err(HubError::parse(client, "root must be a JSON object"));
    };
    Ok(parse_mcp_like_object(root))
}

/// Tolerant reader shared by every JSON client: accepts `mcpServers` or
/// `servers`, map or named-list form, and falls back to recursing into any
/// top-level `*mcp*` object (the VS Code settings heuristic).
fn parse_mcp_like_object(root: &JsonMap<String, JsonValue>) -> Vec<ServerDefinition> {
    let mut result = Vec::new();

    for key in ["mcpServers", "servers"] {
        match root.get(key) {
            Some(JsonValue::Object(map)) => {
                for (name, spec) in map {
                    if let Some(spec) = spec.as_object() {
                        result.push(coerce_server_entry(name, spec));
                    }
                }
                if !result.is_empty() {
                    return result;
                }
            }
            Some(JsonValue::Array(items)) => {
                for spec in items {
                    let Some(spec) = spec.as_object() else {
                        continue;
                    };
                    let Some(name) = spec.get("name").and_then(JsonValue::as_str) else {
                        continue;
                    };
                    result.push(coerce_server_entry(name, spec));
                }
                if !result.is_empty() {
                    return result;
                }
            }
            _ => {}
        }
    }

    for (key, value) in root {
        if key.to_ascii_lowercase().contains("mcp") {
            if let Some(nested) = value.as_object() {
                result.extend(parse_mcp_like_object(nested));
            }
        }
    }

    result
}

fn coerce_server_entry(name: &str, spec: &JsonMap<String, JsonValue>) -> ServerDefinition {
    let mut command = spec
        .get("command")
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string();
    let mut args = string_items(spec.get("args"));

    // Some tools provide a combined commandWithArgs array instead.
    if command.is_empty() {
        let combined = string_items(spec.get("commandWithArgs"));
        if let Some((first, rest)) = combined.split_first() {
            command = first.clone();
            args = rest.to_vec();
        }
    }

    let mut env = BTreeMap::new();
    let env_node = spec.get("env").or_else(|| spec.get("environment"));
    if let Some(env_map) = env_node.and_then(JsonValue::as_object) {
        for (key, value) in env_map {
            if let Some(text) = scalar_to_string(value) {
                env.insert(key.clone(), text);
            }
        }
    }

    let enabled = spec
        .get("enabled")
        .and_then(JsonValue::as_bool)
        .unwrap_or(true);

    let roots_node = spec.get("roots").or_else(|| spec.get("rootPaths"));
    let roots = match string_items(roots_node) {
        items if items.is_empty() => None,
        items => Some(items),
    };

    let mut definition = ServerDefinition::new(name, command);
    definition.args = args;
    definition.env = env;
    definition.enabled = enabled;
    definition.roots = roots;
    definition
}

fn string_items(node: Option<&JsonValue>) -> Vec<String> {
    node.and_then(JsonValue::as_array)
        .map(|items| items.iter().filter_map(scalar_to_string).collect())
        .unwrap_or_default()
}

fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(text) => Some(text.clone()),
        JsonValue::Number(number) => Some(number.to_string()),
        JsonValue::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn parse_codex_toml(client: ClientId, raw: &str) -> Result<Vec<ServerDefinition>, HubError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed = raw
        .parse::<toml::Table>()
        .map_err(|error| HubError::parse(client, error.to_string()))?;
    let Some(table) = parsed.get("mcp_servers").and_then(toml::Value::as_table) else {
        return Ok(Vec::new());
    };

    let mut result = Vec::new();
    for (name, value) in table {
        let Some(server_table) = value.as_table() else {
            continue;
        };
        let command = server_table
            .get("command")
            .and_then(toml::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let args = server_table
            .get("args")
            .and_then(toml::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(toml::Value::as_str)
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let mut env = BTreeMap::new();
        if let Some(env_table) = server_table.get("env").and_then(toml::Value::as_table) {
            for (key, value) in env_table {
                if let Some(value) = value.as_str() {
                    env.insert(key.to_string(), value.to_string());
                }
            }
        }
        let enabled = server_table
            .get("enabled")
            .and_then(toml::Value::as_bool)
            .unwrap_or(true);

        let mut definition = ServerDefinition::new(name, command);
        definition.args = args;
        definition.env = env;
        definition.enabled = enabled;
        result.push(definition);
    }

    Ok(result)
}

fn definition_to_json(definition: &ServerDefinition) -> JsonValue {
    let mut object = JsonMap::new();
    object.insert(
        "command".to_string(),
        JsonValue::String(definition.command.clone()),
    );
    if !definition.args.is_empty() {
        object.insert(
            "args".to_string(),
            JsonValue::Array(
                definition
                    .args
                    .iter()
                    .map(|item| JsonValue::String(item.clone()))
                    .collect(),
            ),
        );
    }
    if !definition.env.is_empty() {
        let mut env = JsonMap::new();
        for (key, value) in &definition.env {
            env.insert(key.clone(), JsonValue::String(value.clone()));
        }
        object.insert("env".to_string(), JsonValue::Object(env));
    }
    object.insert("enabled".to_string(), JsonValue::Bool(definition.enabled));
    if let Some(roots) = &definition.roots {
        object.insert(
            "roots".to_string(),
            JsonValue::Array(
                roots
                    .iter()
                    .map(|item| JsonValue::String(item.clone()))
                    .collect(),
            ),
        );
    }
    JsonValue::Object(object)
}

fn replace_json_servers(
    client: ClientId,
    path: &Path,
    removed: &BTreeSet<String>,
    unified: &ServerDefinition,
) -> Result<(), HubError> {
    let existing_raw = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(error) => return Err(HubError::io(path, error)),
    };

    let mut root = if existing_raw.trim().is_empty() {
        JsonValue::Object(JsonMap::new())
    } else {
        serde_json::from_str::<JsonValue>(&existing_raw)
            .map_err(|error| HubError::parse(client, error.to_string()))?
    };
    let Some(root_obj) = root.as_object_mut() else {
        return Err(HubError::parse(client, "root must be a JSON object"));
    };

    // Edit whichever container the file already uses; never re-render the
    // entries that stay.
    let container_key = ["mcpServers", "servers"]
        .into_iter()
        .find(|key| root_obj.contains_key(*key))
        .unwrap_or("mcpServers");
    let container = root_obj
        .entry(container_key.to_string())
        .or_insert_with(|| JsonValue::Object(JsonMap::new()));
    match container {
        JsonValue::Object(map) => {
            map.retain(|name, _| !removed.contains(name) && *name != unified.name);
            map.insert(unified.name.clone(), definition_to_json(unified));
        }
        JsonValue::Array(items) => {
            items.retain(|item| {
                item.get("name")
                    .and_then(JsonValue::as_str)
                    .map(|name| !removed.contains(name) && name != unified.name)
                    .unwrap_or(true)
            });
            let mut entry = definition_to_json(unified);
            if let Some(object) = entry.as_object_mut() {
                object.insert("name".to_string(), JsonValue::String(unified.name.clone()));
            }
            items.push(entry);
        }
        other => {
            let mut map = JsonMap::new();
            map.insert(unified.name.clone(), definition_to_json(unified));
            *other = JsonValue::Object(map);
        }
    }

    let mut rendered = serde_json::to_vec_pretty(&root)?;
    rendered.push(b'\n');
    write_atomic(path, &rendered)
}

fn replace_codex_servers(
    client: ClientId,
    path: &Path,
    removed: &BTreeSet<String>,
    unified: &ServerDefinition,
) -> Result<(), HubError> {
    let existing = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(error) => return Err(HubError::io(path, error)),
    };
    if !existing.trim().is_empty() {
        existing
            .parse::<toml::Table>()
            .map_err(|error| HubError::parse(client, error.to_string()))?;
    }

    let mut dropped = removed.clone();
    dropped.insert(unified.name.clone());
    let stripped = strip_codex_server_sections(&existing, &dropped);

    let block = render_codex_block(std::slice::from_ref(unified));
    let updated = upsert_managed_block(&stripped, CODEX_BEGIN, CODEX_END, &block);
    if updated == existing {
        return Ok(());
    }
    write_atomic(path, updated.as_bytes())
}

/// Removes `[mcp_servers.<name>]` sections (and their subtables) for the
/// given names, leaving all other lines byte-for-byte as found.
fn strip_codex_server_sections(raw: &str, names: &BTreeSet<String>) -> String {
    let mut kept = Vec::new();
    let mut skipping = false;
    for line in raw.lines() {
        if let Some(section) = codex_section_name(line) {
            skipping = names.contains(&section);
        } else if line.trim_start().starts_with('[')
            || line.trim() == CODEX_BEGIN
            || line.trim() == CODEX_END
        {
            // Table headers and block markers end the section being dropped.
            skipping = false;
        }
        if !skipping {
            kept.push(line);
        }
    }
    let mut result = kept.join("\n");
    if raw.ends_with('\n') && !result.is_empty() {
        result.push('\n');
    }
    result
}

fn codex_section_name(line: &str) -> Option<String> {
    let inner = line.trim().strip_prefix('[')?.strip_suffix(']')?;
    let rest = inner.trim().strip_prefix("mcp_servers.")?;
    let name = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next()?,
        None => rest.split('.').next()?,
    };
    Some(name.to_string())
}

fn render_codex_block(servers: &[ServerDefinition]) -> String {
    let mut lines = Vec::new();
    for definition in servers {
        lines.push(format!(
            "[mcp_servers.\"{}\"]",
            toml_escape(&definition.name)
        ));
        lines.push(format!(
            "command = \"{}\"",
            toml_escape(&definition.command)
        ));
        if !definition.args.is_empty() {
            lines.push(format!(
                "args = [{}]",
                definition
                    .args
                    .iter()
                    .map(|value| format!("\"{}\"", toml_escape(value)))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        lines.push(format!("enabled = {}", definition.enabled));
        if !definition.env.is_empty() {
            lines.push(format!(
                "[mcp_servers.\"{}\".env]",
                toml_escape(&definition.name)
            ));
            for (key, value) in &definition.env {
                lines.push(format!("{} = \"{}\"", key, toml_escape(value)));
            }
        }
        lines.push(String::new());
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

fn upsert_managed_block(current: &str, begin_marker: &str, end_marker: &str, body: &str) -> String {
    let block = format!("{begin_marker}\n{body}\n{end_marker}");
    if current.trim().is_empty() {
        return format!("{block}\n");
    }

    let normalized = current.replace("\r\n", "\n");
    if let Some(begin_index) = normalized.find(begin_marker) {
        if let Some(end_index) = normalized[begin_index..].find(end_marker) {
            let end_absolute = begin_index + end_index + end_marker.len();
            let prefix = normalized[..begin_index].trim_matches('\n');
            let suffix = normalized[end_absolute..].trim_matches('\n');
            return match (prefix.is_empty(), suffix.is_empty()) {
                (true, true) => format!("{block}\n"),
                (true, false) => format!("{block}\n\n{suffix}\n"),
                (false, true) => format!("{prefix}\n\n{block}\n"),
                (false, false) => format!("{prefix}\n\n{block}\n\n{suffix}\n"),
            };
        }
    }

    let trimmed = normalized.trim_matches('\n');
    format!("{trimmed}\n\n{block}\n")
}

fn toml_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientId;
    use tempfile::TempDir;

    fn registry_in(temp: &TempDir) -> ClientRegistry {
        ClientRegistry::new(temp.path().to_path_buf())
    }

    #[test]
    fn parses_mcp_servers_map() {
        let temp = TempDir::new().expect("tempdir");
        let registry = registry_in(&temp);
        let raw = r#"{
  "mcpServers": {
    "fs": {
      "command": "npx",
      "args": ["-y", "fs-server"],
      "env": {"TOKEN": "${TOKEN}"},
      "enabled": false
    }
  }
}"#;
        let servers = registry.parse(ClientId::Cursor, raw).expect("parse");
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "fs");
        assert_eq!(servers[0].command, "npx");
        assert_eq!(servers[0].args, vec!["-y", "fs-server"]);
        assert_eq!(servers[0].env.get("TOKEN").map(String::as_str), Some("${TOKEN}"));
        assert!(!servers[0].enabled);
    }

    #[test]
    fn parses_named_list_and_command_with_args() {
        let temp = TempDir::new().expect("tempdir");
        let registry = registry_in(&temp);
        let raw = r#"{
  "servers": [
    {"name": "echo", "commandWithArgs": ["uvx", "mcp-echo"], "environment": {"A": "1"}}
  ]
}"#;
        let servers = registry.parse(ClientId::Windsurf, raw).expect("parse");
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "echo");
        assert_eq!(servers[0].command, "uvx");
        assert_eq!(servers[0].args, vec!["mcp-echo"]);
        assert_eq!(servers[0].env.get("A").map(String::as_str), Some("1"));
        assert!(servers[0].enabled);
    }

    #[test]
    fn nested_mcp_heuristic_finds_vscode_settings_entries() {
        let temp = TempDir::new().expect("tempdir");
        let registry = registry_in(&temp);
        let raw = r#"{
  "editor.fontSize": 13,
  "chat.mcp": {
    "mcpServers": {
      "search": {"command": "npx", "args": ["-y", "search-server"]}
    }
  }
}"#;
        let servers = registry.parse(ClientId::Vscode, raw).expect("parse");
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "search");
    }

    #[test]
    fn empty_roots_normalize_to_absent() {
        let temp = TempDir::new().expect("tempdir");
        let registry = registry_in(&temp);
        let raw = r#"{"mcpServers": {"fs": {"command": "npx", "roots": []}}}"#;
        let servers = registry.parse(ClientId::Cursor, raw).expect("parse");
        assert_eq!(servers[0].roots, None);

        let raw = r#"{"mcpServers": {"fs": {"command": "npx", "rootPaths": ["/srv"]}}}"#;
        let servers = registry.parse(ClientId::Cursor, raw).expect("parse");
        assert_eq!(servers[0].roots.as_deref(), Some(&["/srv".to_string()][..]));
    }

    #[test]
    fn malformed_json_fails_the_whole_client() {
        let temp = TempDir::new().expect("tempdir");
        let registry = registry_in(&temp);
        let error = registry
            .parse(ClientId::Cursor, "{not json")
            .expect_err("must fail");
        assert!(matches!(error, HubError::Parse { client: ClientId::Cursor, .. }));
    }

    #[test]
    fn parses_codex_toml_tables() {
        let temp = TempDir::new().expect("tempdir");
        let registry = registry_in(&temp);
        let raw = r#"
model = "o4"

[mcp_servers.test]
command = "npx"
args = ["-y", "foo"]
enabled = false

[mcp_servers.test.env]
API_KEY = "${API_KEY}"
"#;
        let servers = registry.parse(ClientId::Codex, raw).expect("parse");
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "test");
        assert!(!servers[0].enabled);
        assert_eq!(
            servers[0].env.get("API_KEY").map(String::as_str),
            Some("${API_KEY}")
        );
    }

    fn removed(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn json_replace_drops_only_the_removed_names() {
        let temp = TempDir::new().expect("tempdir");
        let registry = registry_in(&temp);
        let path = temp.path().join(".cursor").join("mcp.json");
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(
            &path,
            r#"{"theme": "dark", "mcpServers": {"old": {"command": "npx"}, "keepme": {"command": "uvx"}}}"#,
        )
        .expect("seed");

        let definition = ServerDefinition::new("fresh", "uvx");
        registry
            .replace_servers(ClientId::Cursor, &path, &removed(&["old"]), &definition)
            .expect("replace");

        let raw = std::fs::read_to_string(&path).expect("read");
        let value: JsonValue = serde_json::from_str(&raw).expect("json");
        assert_eq!(value.get("theme").and_then(JsonValue::as_str), Some("dark"));
        let servers = value
            .get("mcpServers")
            .and_then(JsonValue::as_object)
            .expect("servers");
        assert!(servers.contains_key("fresh"));
        assert!(servers.contains_key("keepme"));
        assert!(!servers.contains_key("old"));
    }

    #[test]
    fn json_replace_keeps_foreign_entry_fields_verbatim() {
        let temp = TempDir::new().expect("tempdir");
        let registry = registry_in(&temp);
        let path = temp.path().join(".cursor").join("mcp.json");
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(
            &path,
            r#"{"mcpServers": {
                "fs": {"command": "npx", "args": ["-y", "fs-server"]},
                "keepme": {"command": "uvx", "args": ["notes"], "autoApprove": ["read"], "disabled": false},
                "remote-sse": {"url": "https://api.example.com/sse", "type": "sse"}
            }}"#,
        )
        .expect("seed");

        registry
            .replace_servers(
                ClientId::Cursor,
                &path,
                &removed(&["fs"]),
                &ServerDefinition::new("hub", "npx"),
            )
            .expect("replace");

        let raw = std::fs::read_to_string(&path).expect("read");
        let value: JsonValue = serde_json::from_str(&raw).expect("json");
        let servers = value
            .get("mcpServers")
            .and_then(JsonValue::as_object)
            .expect("servers");
        let keepme = servers.get("keepme").expect("keepme survives");
        assert_eq!(
            keepme.get("autoApprove"),
            Some(&serde_json::json!(["read"])),
            "fields outside the model must survive"
        );
        assert_eq!(keepme.get("disabled"), Some(&JsonValue::Bool(false)));
        let remote = servers.get("remote-sse").expect("url-only entry survives");
        assert_eq!(
            remote.get("url").and_then(JsonValue::as_str),
            Some("https://api.example.com/sse")
        );
        assert!(!servers.contains_key("fs"));
        assert!(servers.contains_key("hub"));
    }

    #[test]
    fn codex_replace_upserts_managed_block_and_strips_taken_sections() {
        let temp = TempDir::new().expect("tempdir");
        let registry = registry_in(&temp);
        let path = temp.path().join(".codex").join("config.toml");
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(
            &path,
            "model = \"o4\"\n\n[mcp_servers.taken]\ncommand = \"npx\"\n\n[mcp_servers.kept]\ncommand = \"uvx\"\n",
        )
        .expect("seed");

        let mut definition = ServerDefinition::new("hub", "npx");
        definition.args = vec!["-y".into(), "mcp-remote".into()];
        registry
            .replace_servers(ClientId::Codex, &path, &removed(&["taken"]), &definition)
            .expect("first replace");

        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.contains("model = \"o4\""));
        assert!(raw.contains(CODEX_BEGIN));
        assert!(raw.contains("[mcp_servers.\"hub\"]"));
        assert!(raw.contains("[mcp_servers.kept]"));
        assert!(!raw.contains("[mcp_servers.taken]"));

        // Second upsert replaces the block instead of appending another one.
        registry
            .replace_servers(ClientId::Codex, &path, &removed(&["taken"]), &definition)
            .expect("second replace");
        let raw = std::fs::read_to_string(&path).expect("read");
        assert_eq!(raw.matches(CODEX_BEGIN).count(), 1);

        let mut names: Vec<_> = registry
            .read_servers(ClientId::Codex)
            .expect("re-read")
            .into_iter()
            .map(|server| server.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["hub", "kept"]);
    }

    #[test]
    fn locate_config_path_requires_existing_file() {
        let temp = TempDir::new().expect("tempdir");
        let registry = registry_in(&temp);
        assert_eq!(registry.locate_config_path(ClientId::Cursor), None);

        let path = registry.config_write_path(ClientId::Cursor);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "{}").expect("seed");
        assert_eq!(registry.locate_config_path(ClientId::Cursor), Some(path));
    }
}
