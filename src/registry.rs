//! Static registry mapping `(resource, operation)` pairs to request templates.
//!
//! The table is built once on first use and never mutated. Each template knows
//! its HTTP method, a path pattern with `{field}` placeholders, an optional body
//! template, and the fields the operation accepts.

use std::{collections::HashMap, fmt, str::FromStr, sync::LazyLock};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    errors::{Error, Result, ValidationError},
    fields::FieldValues,
};

/// API entity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Agent,
    Chat,
    Datasource,
    Department,
    LanguageModel,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Agent,
        Resource::Chat,
        Resource::Datasource,
        Resource::Department,
        Resource::LanguageModel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Agent => "agent",
            Resource::Chat => "chat",
            Resource::Datasource => "datasource",
            Resource::Department => "department",
            Resource::LanguageModel => "languageModel",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Resource::Agent => "Agent",
            Resource::Chat => "Chat",
            Resource::Datasource => "Datasource",
            Resource::Department => "Department",
            Resource::LanguageModel => "Language Model",
        }
    }

    pub fn operations(&self) -> &'static [Operation] {
        match self {
            Resource::Agent => &[Operation::GetAgent, Operation::ListAgents],
            Resource::Chat => &[
                Operation::GetChat,
                Operation::ListChats,
                Operation::SendMessage,
            ],
            Resource::Datasource => &[Operation::GetDatasource, Operation::ListDatasources],
            Resource::Department => &[Operation::GetDepartment, Operation::ListDepartments],
            Resource::LanguageModel => {
                &[Operation::GetLanguageModel, Operation::ListLanguageModels]
            }
        }
    }

    /// Operation preselected when the resource is chosen.
    pub fn default_operation(&self) -> Operation {
        match self {
            Resource::Agent => Operation::ListAgents,
            Resource::Chat => Operation::SendMessage,
            Resource::Datasource => Operation::ListDatasources,
            Resource::Department => Operation::ListDepartments,
            Resource::LanguageModel => Operation::ListLanguageModels,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown resource: {s:?}")))
    }
}

/// Named action on a resource. Serialized with its display value (e.g. `"Send Message"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "Get Agent by ID")]
    GetAgent,
    #[serde(rename = "Get Agents")]
    ListAgents,
    #[serde(rename = "Get Chat by ID")]
    GetChat,
    #[serde(rename = "Get Chats")]
    ListChats,
    #[serde(rename = "Send Message")]
    SendMessage,
    #[serde(rename = "Get Datasource by ID")]
    GetDatasource,
    #[serde(rename = "Get Datasources")]
    ListDatasources,
    #[serde(rename = "Get Department by ID")]
    GetDepartment,
    #[serde(rename = "Get Departments")]
    ListDepartments,
    #[serde(rename = "Get Language Model by ID")]
    GetLanguageModel,
    #[serde(rename = "Get Language Models")]
    ListLanguageModels,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::GetAgent,
        Operation::ListAgents,
        Operation::GetChat,
        Operation::ListChats,
        Operation::SendMessage,
        Operation::GetDatasource,
        Operation::ListDatasources,
        Operation::GetDepartment,
        Operation::ListDepartments,
        Operation::GetLanguageModel,
        Operation::ListLanguageModels,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetAgent => "Get Agent by ID",
            Operation::ListAgents => "Get Agents",
            Operation::GetChat => "Get Chat by ID",
            Operation::ListChats => "Get Chats",
            Operation::SendMessage => "Send Message",
            Operation::GetDatasource => "Get Datasource by ID",
            Operation::ListDatasources => "Get Datasources",
            Operation::GetDepartment => "Get Department by ID",
            Operation::ListDepartments => "Get Departments",
            Operation::GetLanguageModel => "Get Language Model by ID",
            Operation::ListLanguageModels => "Get Language Models",
        }
    }

    /// Sentence-case action label, e.g. `"Get agent by id"`.
    pub fn action(&self) -> String {
        let name = self.as_str();
        let mut out = String::with_capacity(name.len());
        for (i, ch) in name.chars().enumerate() {
            if i == 0 {
                out.push(ch);
            } else {
                out.extend(ch.to_lowercase());
            }
        }
        out
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown operation: {s:?}")))
    }
}

/// Composite key selecting exactly one [`RequestTemplate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    pub resource: Resource,
    pub operation: Operation,
}

impl OperationKey {
    pub fn new(resource: Resource, operation: Operation) -> Self {
        Self {
            resource,
            operation,
        }
    }

    /// Parse wire names, e.g. `("chat", "Send Message")`.
    pub fn parse(resource: &str, operation: &str) -> Result<Self> {
        Ok(Self::new(resource.parse()?, operation.parse()?))
    }

    /// Registry lookup. A miss means the pair is not a valid combination.
    pub fn template(&self) -> Result<&'static RequestTemplate> {
        lookup(self)
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource, self.operation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Boolean,
    StringList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    None,
    Text(&'static str),
    Flag(bool),
}

/// Declared input of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub display_name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: FieldDefault,
    pub description: &'static str,
}

impl FieldSpec {
    const fn identifier(name: &'static str, display_name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            display_name,
            kind: FieldKind::String,
            required: true,
            default: FieldDefault::None,
            description,
        }
    }
}

/// Body builders. Tagged so the registry stays plain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyTemplate {
    /// `POST /chat/agentchat`
    AgentChat,
}

impl BodyTemplate {
    fn build(&self, template: &RequestTemplate, fields: &FieldValues) -> Result<Value> {
        match self {
            BodyTemplate::AgentChat => {
                let agents = fields.string_list("agentsIds")?.unwrap_or_default();
                let mut body = Map::new();
                body.insert(
                    "agentsIds".into(),
                    Value::Array(agents.into_iter().map(Value::String).collect()),
                );
                body.insert(
                    "message".into(),
                    Value::String(template.text_value(fields, "message").unwrap_or_default()),
                );
                body.insert(
                    "language".into(),
                    Value::String(template.text_value(fields, "language").unwrap_or_default()),
                );
                if let Some(chat_id) = template.text_value(fields, "chatId") {
                    body.insert("chatId".into(), Value::String(chat_id));
                }
                body.insert(
                    "hideChat".into(),
                    Value::Bool(template.flag_value(fields, "hideChat")?),
                );
                Ok(Value::Object(body))
            }
        }
    }
}

/// Static request description bound to one [`OperationKey`].
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub method: Method,
    /// Path relative to the backend URL; `{name}` is replaced by field `name`.
    pub path: &'static str,
    pub body: Option<BodyTemplate>,
    pub fields: &'static [FieldSpec],
}

/// A template with field values applied, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RequestTemplate {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate required fields, render the path and build the body.
    pub fn prepare(&self, fields: &FieldValues) -> Result<PreparedRequest> {
        self.validate(fields)?;
        let path = render_path(self.path, fields)?;
        let body = self
            .body
            .map(|body| body.build(self, fields))
            .transpose()?;
        Ok(PreparedRequest {
            method: self.method.clone(),
            path,
            body,
        })
    }

    fn validate(&self, fields: &FieldValues) -> Result<()> {
        for spec in self.fields {
            if !spec.required || spec.default != FieldDefault::None {
                continue;
            }
            let provided = match spec.kind {
                FieldKind::StringList => fields.string_list(spec.name)?.is_some(),
                FieldKind::Boolean => fields.flag(spec.name).is_some(),
                FieldKind::String => fields.is_provided(spec.name),
            };
            if !provided {
                return Err(ValidationError::new("is required")
                    .with_field(spec.name)
                    .into());
            }
        }
        Ok(())
    }

    /// Provided text, falling back to the declared default.
    fn text_value(&self, fields: &FieldValues, name: &str) -> Option<String> {
        fields.text(name).or_else(|| match self.field(name)?.default {
            FieldDefault::Text(default) => Some(default.to_string()),
            _ => None,
        })
    }

    fn flag_value(&self, fields: &FieldValues, name: &str) -> Result<bool> {
        if fields.is_provided(name) {
            return fields.flag(name).ok_or_else(|| {
                ValidationError::new("expected a boolean")
                    .with_field(name)
                    .into()
            });
        }
        match self.field(name).map(|f| f.default) {
            Some(FieldDefault::Flag(default)) => Ok(default),
            _ => Ok(false),
        }
    }
}

/// Substitute `{name}` placeholders. A value must stay a single path segment:
/// separators, escapes, control characters and dot segments are rejected.
fn render_path(pattern: &str, fields: &FieldValues) -> Result<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| Error::Config(format!("unterminated placeholder in {pattern:?}")))?;
        let name = &after[..end];
        let value = fields
            .text(name)
            .ok_or_else(|| ValidationError::new("is required").with_field(name))?;
        let value = value.trim();
        check_segment(name, value)?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn check_segment(name: &str, value: &str) -> Result<()> {
    if value.contains(['/', '\\', '?', '#', '%']) || value.chars().any(char::is_control) {
        return Err(ValidationError::new(
            "must not contain '/', '\\', '?', '#', '%' or control characters",
        )
        .with_field(name)
        .into());
    }
    if value == "." || value == ".." {
        return Err(ValidationError::new("must not be a dot segment")
            .with_field(name)
            .into());
    }
    Ok(())
}

const AGENT_FIELDS: &[FieldSpec] = &[FieldSpec::identifier(
    "agentId",
    "Agent ID",
    "The agent identifier",
)];

const CHAT_FIELDS: &[FieldSpec] = &[FieldSpec::identifier(
    "chatId",
    "Chat ID",
    "The chat identifier to retrieve",
)];

const DATASOURCE_FIELDS: &[FieldSpec] = &[FieldSpec::identifier(
    "datasourceId",
    "Datasource ID",
    "The datasource identifier",
)];

const DEPARTMENT_FIELDS: &[FieldSpec] = &[FieldSpec::identifier(
    "departmentId",
    "Department ID",
    "The department identifier",
)];

const LANGUAGE_MODEL_FIELDS: &[FieldSpec] = &[FieldSpec::identifier(
    "languageModelId",
    "Language Model ID",
    "The language model identifier",
)];

const SEND_MESSAGE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "message",
        display_name: "Message",
        kind: FieldKind::String,
        required: true,
        default: FieldDefault::None,
        description: "The message content to send",
    },
    FieldSpec {
        name: "language",
        display_name: "Language",
        kind: FieldKind::String,
        required: true,
        default: FieldDefault::Text("pt-br"),
        description: "The language code (e.g., pt-br, en-us)",
    },
    FieldSpec {
        name: "agentsIds",
        display_name: "Agent IDs",
        kind: FieldKind::StringList,
        required: true,
        default: FieldDefault::None,
        description: "Array of agent IDs",
    },
    FieldSpec {
        name: "chatId",
        display_name: "Chat ID",
        kind: FieldKind::String,
        required: false,
        default: FieldDefault::None,
        description: "Optional chat identifier for message continuation",
    },
    FieldSpec {
        name: "hideChat",
        display_name: "Hide Chat",
        kind: FieldKind::Boolean,
        required: false,
        default: FieldDefault::Flag(false),
        description: "Whether to hide the chat in the response",
    },
];

fn get(path: &'static str, fields: &'static [FieldSpec]) -> RequestTemplate {
    RequestTemplate {
        method: Method::GET,
        path,
        body: None,
        fields,
    }
}

static REGISTRY: LazyLock<HashMap<OperationKey, RequestTemplate>> = LazyLock::new(|| {
    use Operation::*;

    let entries = [
        (Resource::Agent, GetAgent, get("/Agent/{agentId}", AGENT_FIELDS)),
        (Resource::Agent, ListAgents, get("/Agent/availables", &[])),
        (Resource::Chat, GetChat, get("/chat/{chatId}", CHAT_FIELDS)),
        (Resource::Chat, ListChats, get("/chat", &[])),
        (
            Resource::Chat,
            SendMessage,
            RequestTemplate {
                method: Method::POST,
                path: "/chat/agentchat",
                body: Some(BodyTemplate::AgentChat),
                fields: SEND_MESSAGE_FIELDS,
            },
        ),
        (
            Resource::Datasource,
            GetDatasource,
            get("/datasource/{datasourceId}", DATASOURCE_FIELDS),
        ),
        (
            Resource::Datasource,
            ListDatasources,
            get("/datasource/availables", &[]),
        ),
        (
            Resource::Department,
            GetDepartment,
            get("/Department/{departmentId}", DEPARTMENT_FIELDS),
        ),
        (Resource::Department, ListDepartments, get("/Department", &[])),
        (
            Resource::LanguageModel,
            GetLanguageModel,
            get("/languageModel/{languageModelId}", LANGUAGE_MODEL_FIELDS),
        ),
        (
            Resource::LanguageModel,
            ListLanguageModels,
            get("/languageModel/availables", &[]),
        ),
    ];

    entries
        .into_iter()
        .map(|(resource, operation, template)| (OperationKey::new(resource, operation), template))
        .collect()
});

/// Resolve the template for `key`.
pub fn lookup(key: &OperationKey) -> Result<&'static RequestTemplate> {
    REGISTRY
        .get(key)
        .ok_or_else(|| Error::Config(format!("no request template registered for {key}")))
}

/// Every registered pair, in no particular order.
pub fn templates() -> impl Iterator<Item = (&'static OperationKey, &'static RequestTemplate)> {
    REGISTRY.iter()
}
