use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::{json, Map, Value as JsonValue};
use std::process::Command;
use std::{collections::HashMap, env, fmt};

/// Remote resolution failed. Transport errors, nonzero exits and malformed
/// envelopes all collapse into this one kind; callers absorb it into an
/// empty result rather than propagating.
#[derive(Debug, Clone)]
pub struct RemoteError(pub String);

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote call failed: {}", self.0)
    }
}

impl std::error::Error for RemoteError {}

impl From<anyhow::Error> for RemoteError {
    fn from(e: anyhow::Error) -> Self {
        RemoteError(format!("{e:#}"))
    }
}

/// Synchronous remote operation on a named model. The one seam the selection
/// core talks through; hosts plug in a transport or a test double.
pub trait Remote {
    fn call(
        &self,
        model: &str,
        method: &str,
        args: &[JsonValue],
        context: Option<&Map<String, JsonValue>>,
    ) -> std::result::Result<JsonValue, RemoteError>;
}

/// Filtered relational search: paging disabled, display-name projection only.
pub fn search_read(
    remote: &dyn Remote,
    relation: &str,
    domain: JsonValue,
    context: &Map<String, JsonValue>,
) -> std::result::Result<JsonValue, RemoteError> {
    remote.call(
        relation,
        "search_read",
        &[
            domain,
            json!(0),
            JsonValue::Null,
            JsonValue::Null,
            json!(["display_name"]),
        ],
        Some(context),
    )
}

/// Read a single record's display name by id.
pub fn read_display_name(
    remote: &dyn Remote,
    relation: &str,
    id: &JsonValue,
) -> std::result::Result<JsonValue, RemoteError> {
    remote.call(
        relation,
        "read",
        &[json!([id]), json!(["display_name"])],
        None,
    )
}

fn expand_cmdline_env(cmdline: &str) -> String {
    // Expand ${VAR} from environment; special-case ${BACKEND_BIN}
    // -> COMBO_BACKEND_BIN (quoted if contains whitespace) or default "example-backend"
    let re = Regex::new(r"\$\{([A-Z0-9_]+)\}").unwrap();
    let env_map: HashMap<String, String> = env::vars().collect();
    re.replace_all(cmdline, |caps: &regex::Captures| {
        let key = &caps[1];
        if key == "BACKEND_BIN" {
            if let Some(v) = env_map.get("COMBO_BACKEND_BIN") {
                // Quote if contains whitespace to keep it a single arg in shlex::split
                let needs_quote = v.chars().any(|c| c.is_whitespace());
                if needs_quote {
                    let escaped = v.replace('"', "\\\"");
                    return format!("\"{escaped}\"");
                }
                return v.to_string();
            }
            return "example-backend".to_string();
        }
        env_map.get(key).cloned().unwrap_or_default()
    })
    .to_string()
}

/// Unwrap a backend envelope: `{"type": "result", "data": ...}` yields the
/// data; an `error` envelope or a missing payload is a failure.
pub(crate) fn parse_envelope(v: &JsonValue) -> Result<JsonValue> {
    let typ = v.get("type").and_then(|s| s.as_str()).unwrap_or("result");
    if typ == "error" {
        let msg = v
            .get("message")
            .and_then(|s| s.as_str())
            .unwrap_or("unspecified error");
        return Err(anyhow!("backend error: {msg}"));
    }
    v.get("data")
        .cloned()
        .ok_or_else(|| anyhow!("envelope has no data"))
}

/// Remote backed by an external command line. Each call appends
/// `model method args-json [context-json]` to the configured command,
/// runs it and unwraps the JSON envelope from stdout.
pub struct CliRemote {
    cmdline: String,
}

impl CliRemote {
    pub fn new(cmdline: impl Into<String>) -> Self {
        Self {
            cmdline: cmdline.into(),
        }
    }

    fn invoke(
        &self,
        model: &str,
        method: &str,
        args: &[JsonValue],
        context: Option<&Map<String, JsonValue>>,
    ) -> Result<JsonValue> {
        let expanded = expand_cmdline_env(&self.cmdline);
        let mut parts =
            shlex::split(&expanded).ok_or_else(|| anyhow!("Failed to parse command line"))?;
        if parts.is_empty() {
            return Err(anyhow!("Empty command line"));
        }
        parts.push(model.to_string());
        parts.push(method.to_string());
        parts.push(serde_json::to_string(args).with_context(|| "encoding call args")?);
        if let Some(ctx) = context {
            parts.push(
                serde_json::to_string(ctx).with_context(|| "encoding call context")?,
            );
        }
        let program = &parts[0];
        let call_args = &parts[1..];
        let output = Command::new(program)
            .args(call_args)
            .env("COMBO_BIND_JSON", "1")
            .output()
            .with_context(|| format!("spawning {expanded}"))?;
        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(anyhow!("Command failed: {} {}\n{}", expanded, method, err));
        }
        let text = String::from_utf8_lossy(&output.stdout).to_string();
        let v: JsonValue =
            serde_json::from_str(&text).with_context(|| "parsing backend JSON")?;
        parse_envelope(&v)
    }
}

impl Remote for CliRemote {
    fn call(
        &self,
        model: &str,
        method: &str,
        args: &[JsonValue],
        context: Option<&Map<String, JsonValue>>,
    ) -> std::result::Result<JsonValue, RemoteError> {
        self.invoke(model, method, args, context)
            .map_err(RemoteError::from)
    }
}
