//! # cascade-cli
//!
//! Command-line runner for cascade workflows.
//!
//! Three subcommands:
//!
//! - `cascade validate <file>` parses a workflow definition and reports
//!   per-step problems without running anything.
//! - `cascade run <file>` executes a workflow with the built-in tools,
//!   wiring up providers from the environment (`OPENAI_API_KEY`,
//!   `ANTHROPIC_API_KEY`, and an Ollama server at `OLLAMA_BASE_URL` or
//!   localhost).
//! - `cascade tools` lists the built-in tool registry.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use cascade_core::{
    EventSink, StoredValue, ToolRegistry, WorkflowDefinition, WorkflowEvent, WorkflowManager,
    WorkflowStep,
};
use cascade_llm::{
    AnthropicProvider, LocalProviderConfig, OllamaProvider, OpenAiProvider, RemoteProviderConfig,
    ANTHROPIC_BASE_URL, OLLAMA_BASE_URL, OPENAI_BASE_URL,
};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

#[derive(Parser)]
#[command(name = "cascade")]
#[command(about = "Cascade - declarative AI workflow runner", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workflow definition without running it
    Validate {
        /// Path to a workflow YAML or JSON file
        file: PathBuf,
    },

    /// Run a workflow with built-in tools and providers from the environment
    Run {
        /// Path to a workflow YAML or JSON file
        file: PathBuf,

        /// Initial input entry as KEY=VALUE; repeatable. Values that parse
        /// as JSON are kept typed, anything else becomes a string.
        #[arg(short, long = "input", value_name = "KEY=VALUE")]
        input: Vec<String>,

        /// Initial input as a JSON object; --input entries override its keys
        #[arg(long, value_name = "JSON")]
        input_json: Option<String>,

        /// Override the workflow's default provider
        #[arg(short, long)]
        provider: Option<String>,

        /// Print only the final results
        #[arg(short, long)]
        quiet: bool,
    },

    /// List the built-in tools
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { file } => validate(&file),
        Commands::Run {
            file,
            input,
            input_json,
            provider,
            quiet,
        } => run(&file, &input, input_json.as_deref(), provider.as_deref(), quiet).await,
        Commands::Tools => {
            list_tools();
            Ok(())
        }
    }
}

/// Diagnostics go to stderr; stdout carries workflow output.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "info,cascade_core=debug,cascade_llm=debug,cascade_tools=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn validate(file: &Path) -> anyhow::Result<()> {
    println!("Validating: {}", file.display());

    let workflow = match parse_workflow(file) {
        Ok(workflow) => workflow,
        Err(e) => {
            eprintln!("✗ {}", e);
            return Err(e.into());
        }
    };

    println!("✓ Workflow is valid");
    println!("  Name: {}", workflow.name);
    if let Some(description) = &workflow.description {
        println!("  Description: {}", description);
    }
    if let Some(provider) = &workflow.default_provider {
        println!("  Default provider: {}", provider);
    }

    println!("\nSteps ({}):", workflow.steps.len());
    for (index, step) in workflow.steps.iter().enumerate() {
        match step {
            WorkflowStep::Tool(s) => {
                println!("  {}. tool '{}' -> {}", index, s.tool, s.output);
            }
            WorkflowStep::Template(s) => {
                let source = s
                    .template
                    .as_deref()
                    .or(s.template_url.as_deref())
                    .unwrap_or_default();
                println!("  {}. template '{}' -> {}", index, source, s.output);
            }
        }
    }

    // Structural checks passed; tool availability is a separate concern
    // because library embedders can register their own tools. The CLI runs
    // with built-ins only, so flag anything it could not execute.
    let registry = builtin_registry();
    let unknown: Vec<&str> = workflow
        .referenced_tools()
        .into_iter()
        .filter(|tool| !registry.has_tool(tool))
        .collect();
    if !unknown.is_empty() {
        println!();
        for tool in unknown {
            println!("⚠ tool '{}' is not built in; 'cascade run' would fail on it", tool);
        }
    }

    Ok(())
}

async fn run(
    file: &Path,
    pairs: &[String],
    input_json: Option<&str>,
    provider_override: Option<&str>,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut workflow = parse_workflow(file)?;
    if let Some(provider) = provider_override {
        // Per-step providers still win; only the workflow default moves.
        workflow.default_provider = Some(provider.to_string());
    }
    let name = workflow.name.clone();
    let initial = parse_inputs(pairs, input_json)?;

    let manager = build_manager();
    tracing::debug!(providers = ?manager.provider_names(), "configured providers");
    manager.register_workflow(workflow).await?;

    let results = if quiet {
        manager.run_workflow(&name, initial, &EventSink::null()).await?
    } else {
        println!("Running: {}\n", name);

        let (sink, mut events) = EventSink::channel();
        let printer = tokio::spawn(async move {
            // Chunks print raw so streamed text reads as prose; any other
            // event first terminates a half-open chunk line.
            let mut mid_stream = false;
            while let Some(event) = events.recv().await {
                match &event {
                    WorkflowEvent::StreamChunk { chunk, .. } => {
                        print!("{}", chunk);
                        let _ = std::io::stdout().flush();
                        mid_stream = true;
                    }
                    _ => {
                        if mid_stream {
                            println!();
                            mid_stream = false;
                        }
                        println!("{}", event.description());
                    }
                }
            }
            if mid_stream {
                println!();
            }
        });

        let outcome = manager.run_workflow(&name, initial, &sink).await;

        // Dropping the sink closes the channel, so the printer drains the
        // remaining events and exits before the results print.
        drop(sink);
        let _ = printer.await;

        println!();
        outcome?
    };

    let ordered: BTreeMap<&String, &StoredValue> = results.iter().collect();
    println!("{}", serde_json::to_string_pretty(&ordered)?);
    Ok(())
}

fn list_tools() {
    let registry = builtin_registry();

    println!("Built-in tools ({}):", registry.len());
    println!();
    println!("{:<16} {:<12} {}", "Name", "Ref Key", "Description");
    println!("{}", "-".repeat(80));
    for definition in registry.definitions() {
        let reference = definition.reference_key.as_deref().unwrap_or("-");
        println!(
            "{:<16} {:<12} {}",
            definition.name, reference, definition.description
        );
    }
}

/// Parse a workflow file, picking the JSON parser by extension.
fn parse_workflow(file: &Path) -> cascade_core::Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(file)?;
    if file.extension().and_then(|e| e.to_str()) == Some("json") {
        WorkflowDefinition::from_json_str(&content)
    } else {
        WorkflowDefinition::from_yaml_str(&content)
    }
}

/// Merge `--input-json` and repeated `--input` pairs into the initial input.
///
/// The JSON object is the base; `KEY=VALUE` pairs overlay it, so a single
/// entry can be tweaked without rewriting the whole object.
fn parse_inputs(pairs: &[String], input_json: Option<&str>) -> anyhow::Result<Map<String, Value>> {
    let mut initial = match input_json {
        Some(raw) => {
            let value: Value =
                serde_json::from_str(raw).context("--input-json is not valid JSON")?;
            match value {
                Value::Object(map) => map,
                _ => anyhow::bail!("--input-json must be a JSON object"),
            }
        }
        None => Map::new(),
    };

    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("--input '{}' is not KEY=VALUE", pair))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        initial.insert(key.to_string(), value);
    }

    Ok(initial)
}

fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    cascade_tools::register_builtins(&mut registry);
    registry
}

/// Build a manager with the built-in tools and every provider the
/// environment can configure.
///
/// Remote providers register only when their API key is set. Ollama needs
/// no key, so it always registers; availability is checked only when a
/// step actually uses it.
fn build_manager() -> WorkflowManager {
    let mut manager = WorkflowManager::new(Arc::new(builtin_registry()));

    if let Ok(config) = RemoteProviderConfig::from_env(
        "OPENAI_API_KEY",
        OPENAI_BASE_URL,
        env_model("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
    ) {
        manager = manager.with_provider("openai", Arc::new(OpenAiProvider::new(config)));
    }

    if let Ok(config) = RemoteProviderConfig::from_env(
        "ANTHROPIC_API_KEY",
        ANTHROPIC_BASE_URL,
        env_model("ANTHROPIC_MODEL", DEFAULT_ANTHROPIC_MODEL),
    ) {
        manager = manager.with_provider("anthropic", Arc::new(AnthropicProvider::new(config)));
    }

    let ollama = LocalProviderConfig::from_env(
        "OLLAMA_BASE_URL",
        OLLAMA_BASE_URL,
        env_model("OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL),
    );
    manager.with_provider("ollama", Arc::new(OllamaProvider::new(ollama)))
}

fn env_model(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Input Parsing ====================

    /// Test Case 1: KEY=VALUE pairs keep JSON types where they parse
    ///
    /// Verifies: numbers and booleans come through typed, plain words
    /// fall back to strings, and an embedded '=' stays in the value.
    #[test]
    fn test_input_pairs_parse_json_values() {
        let pairs = vec![
            "count=3".to_string(),
            "dry_run=true".to_string(),
            "topic=rust workflows".to_string(),
            "query=a=b".to_string(),
        ];

        let initial = parse_inputs(&pairs, None).unwrap();

        assert_eq!(initial["count"], json!(3));
        assert_eq!(initial["dry_run"], json!(true));
        assert_eq!(initial["topic"], json!("rust workflows"));
        assert_eq!(initial["query"], json!("a=b"));
    }

    /// Test Case 2: --input entries overlay the --input-json base
    ///
    /// Verifies: keys from the JSON object survive unless a pair names
    /// them, in which case the pair wins.
    #[test]
    fn test_input_json_base_overlaid_by_pairs() {
        let pairs = vec!["limit=10".to_string()];
        let base = r#"{"limit": 5, "topic": "news"}"#;

        let initial = parse_inputs(&pairs, Some(base)).unwrap();

        assert_eq!(initial["limit"], json!(10));
        assert_eq!(initial["topic"], json!("news"));
    }

    /// Test Case 3: malformed inputs are rejected with the offending text
    #[test]
    fn test_malformed_inputs_rejected() {
        let err = parse_inputs(&["no-equals-sign".to_string()], None).unwrap_err();
        assert!(err.to_string().contains("no-equals-sign"));

        let err = parse_inputs(&[], Some("not json")).unwrap_err();
        assert!(err.to_string().contains("--input-json"));

        let err = parse_inputs(&[], Some("[1, 2]")).unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    // ==================== Workflow Files ====================

    /// Test Case 4: the parser is picked by file extension
    ///
    /// Verifies: a .json file goes through the JSON parser and a .yaml
    /// file through the YAML parser, both yielding the same definition.
    #[test]
    fn test_parse_workflow_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("flow.yaml");
        std::fs::write(
            &yaml_path,
            r#"
name: greet
steps:
  - tool: chat_message
    input:
      text: "hello"
    output: sent
"#,
        )
        .unwrap();

        let json_path = dir.path().join("flow.json");
        std::fs::write(
            &json_path,
            r#"{
  "name": "greet",
  "steps": [
    {"tool": "chat_message", "input": {"text": "hello"}, "output": "sent"}
  ]
}"#,
        )
        .unwrap();

        let from_yaml = parse_workflow(&yaml_path).unwrap();
        let from_json = parse_workflow(&json_path).unwrap();

        assert_eq!(from_yaml.name, "greet");
        assert_eq!(from_json.name, "greet");
        assert_eq!(from_yaml.steps.len(), from_json.steps.len());
    }

    /// Test Case 5: a structurally broken workflow fails to parse
    #[test]
    fn test_parse_workflow_reports_step_problems() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(
            &path,
            r#"
name: broken
steps:
  - template: summarize
    output: ""
"#,
        )
        .unwrap();

        let err = parse_workflow(&path).unwrap_err();
        assert!(err.to_string().contains("step 0"));
    }

    // ==================== Built-in Registry ====================

    /// Test Case 6: the run registry carries every built-in tool
    #[test]
    fn test_builtin_registry_is_populated() {
        let registry = builtin_registry();
        assert!(registry.has_tool("http_request"));
        assert!(registry.has_tool("run_command"));
        assert!(!registry.is_empty());
    }
}
