//! Prompt templates: definition, rendering, loading, caching
//!
//! A template is a named prompt with `{{placeholder}}` slots and a declared
//! set of output variables. Template steps reference templates either by
//! inline name (registered up front) or by URL (fetched once per store and
//! cached).
//!
//! # Template Format
//!
//! ```yaml
//! name: summarize
//! description: Summarize a bug report
//! systemPrompt: You are a triage assistant. Respond with JSON.
//! content: |
//!   Summarize the following report in two sentences:
//!
//!   {{report}}
//! outputVariables:
//!   - name: summary
//! ```
//!
//! # Output Extraction
//!
//! After the provider finishes, declared outputs are extracted from the
//! completion text: a JSON object (bare or inside a ```json fence) supplies
//! declared names directly; otherwise a template with exactly one declared
//! output binds the whole text to it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Result, WorkflowError};
use crate::resolver::substitute_with;

/// One declared template output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputVariable {
    /// Name the extracted value is bound to
    pub name: String,
    /// What the value means, for humans and prompt tooling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A prompt template with declared outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
    /// Template name, used by inline `template:` references
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional system prompt sent ahead of the rendered content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Prompt body with `{{placeholder}}` slots
    pub content: String,
    /// Outputs extracted from the completion text
    #[serde(default)]
    pub output_variables: Vec<OutputVariable>,
}

impl TemplateDefinition {
    /// Create a template with no declared outputs
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            system_prompt: None,
            content: content.into(),
            output_variables: Vec::new(),
        }
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Declare an output variable
    pub fn with_output_variable(mut self, name: impl Into<String>) -> Self {
        self.output_variables.push(OutputVariable {
            name: name.into(),
            description: None,
        });
        self
    }

    /// Parse a template from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let def: TemplateDefinition = serde_yaml::from_str(yaml)?;
        def.validate()?;
        Ok(def)
    }

    /// Parse a template from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let def: TemplateDefinition = serde_json::from_str(json)?;
        def.validate()?;
        Ok(def)
    }

    /// Validate the template structure
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "template name cannot be empty".to_string(),
            ));
        }
        if self.content.trim().is_empty() {
            return Err(WorkflowError::Validation(format!(
                "template '{}' has empty content",
                self.name
            )));
        }
        Ok(())
    }

    /// Render the prompt body with the step's resolved inputs
    ///
    /// Placeholder semantics match input resolution: missing names become
    /// the empty string, non-string values are rendered as compact JSON.
    pub fn render(&self, variables: &Map<String, Value>) -> String {
        substitute_with(&self.content, |name| variables.get(name).cloned())
    }

    /// Extract declared outputs from the completion text
    pub fn extract_outputs(&self, response: &str) -> Value {
        if let Some(object) = parse_json_object(response) {
            let mut outputs = Map::new();
            for variable in &self.output_variables {
                if let Some(value) = object.get(&variable.name) {
                    outputs.insert(variable.name.clone(), value.clone());
                }
            }
            if !outputs.is_empty() {
                return Value::Object(outputs);
            }
        }

        if self.output_variables.len() == 1 {
            let mut outputs = Map::new();
            outputs.insert(
                self.output_variables[0].name.clone(),
                Value::String(response.to_string()),
            );
            return Value::Object(outputs);
        }

        Value::Object(Map::new())
    }
}

/// Parse a JSON object from the text, bare or inside a ```json fence
fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Some(map);
    }

    let start = trimmed.find("```json")? + "```json".len();
    let rest = &trimmed[start..];
    let end = rest.find("```")?;
    match serde_json::from_str::<Value>(rest[..end].trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Loads remote templates by URL
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    /// Fetch and parse the template at `url`
    async fn load(&self, url: &str) -> Result<TemplateDefinition>;
}

/// HTTP template loader
///
/// Fetches template documents with `reqwest` and parses them as JSON first,
/// falling back to YAML.
#[derive(Debug, Clone, Default)]
pub struct HttpTemplateLoader {
    client: reqwest::Client,
}

impl HttpTemplateLoader {
    /// Loader with a default HTTP client
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader reusing an existing HTTP client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TemplateLoader for HttpTemplateLoader {
    async fn load(&self, url: &str) -> Result<TemplateDefinition> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(WorkflowError::TemplateFetch {
                url: url.to_string(),
                error: format!("HTTP status {}", response.status()),
            });
        }

        let body = response.text().await?;
        TemplateDefinition::from_json_str(&body)
            .or_else(|_| TemplateDefinition::from_yaml_str(&body))
            .map_err(|e| WorkflowError::TemplateFetch {
                url: url.to_string(),
                error: format!("not a valid template document: {}", e),
            })
    }
}

/// In-memory loader keyed by exact URL
///
/// Serves pre-registered templates without any network access; used in
/// tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateLoader {
    templates: HashMap<String, TemplateDefinition>,
}

impl StaticTemplateLoader {
    /// Empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under a URL
    pub fn with_template(mut self, url: impl Into<String>, template: TemplateDefinition) -> Self {
        self.templates.insert(url.into(), template);
        self
    }
}

#[async_trait]
impl TemplateLoader for StaticTemplateLoader {
    async fn load(&self, url: &str) -> Result<TemplateDefinition> {
        self.templates
            .get(url)
            .cloned()
            .ok_or_else(|| WorkflowError::TemplateFetch {
                url: url.to_string(),
                error: "no template registered for URL".to_string(),
            })
    }
}

/// Template cache shared by the manager and its executors
///
/// Inline templates are registered by name; remote templates are fetched
/// through the loader at most once per URL, whether the fetch happens at
/// registration time or lazily during a run.
pub struct TemplateStore {
    loader: Arc<dyn TemplateLoader>,
    by_name: RwLock<HashMap<String, Arc<TemplateDefinition>>>,
    by_url: RwLock<HashMap<String, Arc<TemplateDefinition>>>,
}

impl TemplateStore {
    /// Store backed by the given loader
    pub fn new(loader: Arc<dyn TemplateLoader>) -> Self {
        Self {
            loader,
            by_name: RwLock::new(HashMap::new()),
            by_url: RwLock::new(HashMap::new()),
        }
    }

    /// Register an inline template under its own name
    pub async fn insert(&self, template: TemplateDefinition) {
        let name = template.name.clone();
        self.by_name.write().await.insert(name, Arc::new(template));
    }

    /// Look up an inline template by name
    pub async fn get_by_name(&self, name: &str) -> Option<Arc<TemplateDefinition>> {
        self.by_name.read().await.get(name).cloned()
    }

    /// Fetch a remote template, caching by exact URL
    pub async fn fetch(&self, url: &str) -> Result<Arc<TemplateDefinition>> {
        if let Some(template) = self.by_url.read().await.get(url) {
            return Ok(Arc::clone(template));
        }

        // Hold the write lock across the fetch so one URL is never fetched
        // twice, even when two runs race on it.
        let mut cache = self.by_url.write().await;
        if let Some(template) = cache.get(url) {
            return Ok(Arc::clone(template));
        }

        tracing::debug!(url = %url, "fetching remote template");
        let template = Arc::new(self.loader.load(url).await?);
        cache.insert(url.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// True when a URL is already cached
    pub async fn is_cached(&self, url: &str) -> bool {
        self.by_url.read().await.contains_key(url)
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new(Arc::new(HttpTemplateLoader::new()))
    }
}

impl std::fmt::Debug for TemplateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        template: TemplateDefinition,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TemplateLoader for CountingLoader {
        async fn load(&self, _url: &str) -> Result<TemplateDefinition> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.template.clone())
        }
    }

    #[test]
    fn test_parse_template_yaml() {
        let yaml = r#"
name: summarize
systemPrompt: You are terse.
content: "Summarize: {{report}}"
outputVariables:
  - name: summary
"#;
        let template = TemplateDefinition::from_yaml_str(yaml).unwrap();
        assert_eq!(template.name, "summarize");
        assert_eq!(template.system_prompt.as_deref(), Some("You are terse."));
        assert_eq!(template.output_variables.len(), 1);
    }

    #[test]
    fn test_empty_content_rejected() {
        let yaml = "name: empty\ncontent: \"\"\n";
        let err = TemplateDefinition::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("empty content"));
    }

    #[test]
    fn test_render_substitutes_inputs() {
        let template = TemplateDefinition::new("t", "Hello {{user}}, priority {{level}}.");
        let mut vars = Map::new();
        vars.insert("user".to_string(), json!("ada"));
        vars.insert("level".to_string(), json!(2));

        assert_eq!(template.render(&vars), "Hello ada, priority 2.");
    }

    #[test]
    fn test_render_missing_placeholder_is_empty() {
        let template = TemplateDefinition::new("t", "[{{gone}}]");
        assert_eq!(template.render(&Map::new()), "[]");
    }

    #[test]
    fn test_extract_outputs_from_json_response() {
        let template = TemplateDefinition::new("t", "c")
            .with_output_variable("summary")
            .with_output_variable("score");

        let outputs =
            template.extract_outputs(r#"{"summary": "short", "score": 0.9, "extra": true}"#);
        assert_eq!(outputs, json!({"summary": "short", "score": 0.9}));
    }

    #[test]
    fn test_extract_outputs_from_fenced_json() {
        let template = TemplateDefinition::new("t", "c").with_output_variable("summary");
        let response = "Here you go:\n```json\n{\"summary\": \"fenced\"}\n```\nDone.";

        assert_eq!(template.extract_outputs(response), json!({"summary": "fenced"}));
    }

    #[test]
    fn test_single_output_binds_whole_text() {
        let template = TemplateDefinition::new("t", "c").with_output_variable("summary");
        let outputs = template.extract_outputs("plain prose answer");
        assert_eq!(outputs, json!({"summary": "plain prose answer"}));
    }

    #[test]
    fn test_no_declared_outputs_yields_empty_object() {
        let template = TemplateDefinition::new("t", "c");
        assert_eq!(template.extract_outputs("whatever"), json!({}));
    }

    #[tokio::test]
    async fn test_store_inline_registration() {
        let store = TemplateStore::new(Arc::new(StaticTemplateLoader::new()));
        store.insert(TemplateDefinition::new("greet", "hi {{who}}")).await;

        let found = store.get_by_name("greet").await.unwrap();
        assert_eq!(found.content, "hi {{who}}");
        assert!(store.get_by_name("absent").await.is_none());
    }

    #[tokio::test]
    async fn test_store_fetches_url_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = TemplateStore::new(Arc::new(CountingLoader {
            template: TemplateDefinition::new("remote", "body"),
            calls: Arc::clone(&calls),
        }));

        let url = "https://example.com/t.yaml";
        assert!(!store.is_cached(url).await);

        let first = store.fetch(url).await.unwrap();
        let second = store.fetch(url).await.unwrap();

        assert_eq!(first.name, "remote");
        assert_eq!(second.name, "remote");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.is_cached(url).await);
    }

    #[tokio::test]
    async fn test_static_loader_unknown_url_fails() {
        let loader = StaticTemplateLoader::new();
        let err = loader.load("https://nowhere/t.yaml").await.unwrap_err();
        assert!(matches!(err, WorkflowError::TemplateFetch { .. }));
    }
}
