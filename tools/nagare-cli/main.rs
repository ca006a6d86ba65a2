use clap::{Parser, Subcommand};
use nagare::bytecode::Disassembly;
use nagare::error::ConversionError;
use nagare::flow::validation;
use nagare::prelude::*;
use serde::Deserialize;
use serde_json::Map;
use std::fs;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// --- JSON Deserialization Structs (Editor Format Specific) ---
// These structs match the editor's project document and are only used here for conversion.

#[derive(Deserialize)]
struct RawProject {
    #[serde(default)]
    variables: RawVariables,
    #[serde(default)]
    pages: Vec<RawPage>,
    actions: Vec<RawAction>,
}

#[derive(Deserialize, Default)]
struct RawVariables {
    #[serde(default, alias = "globalVariables")]
    global_variables: Vec<RawVariable>,
}

#[derive(Deserialize)]
struct RawVariable {
    name: String,
    #[serde(default, rename = "type")]
    value_type: Option<String>,
    #[serde(default, alias = "defaultValue")]
    default_value: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawPage {
    name: String,
}

#[derive(Deserialize)]
struct RawAction {
    name: String,
    #[serde(default)]
    components: Vec<RawComponent>,
    #[serde(default, alias = "connectionLines")]
    connection_lines: Vec<RawConnectionLine>,
    #[serde(default, alias = "localVariables")]
    local_variables: Vec<RawVariable>,
}

#[derive(Deserialize)]
struct RawComponent {
    #[serde(alias = "objID")]
    obj_id: String,
    #[serde(rename = "type")]
    component_type: String,
    #[serde(default, alias = "customInputs")]
    custom_inputs: Vec<RawCustomInput>,
    #[serde(flatten)]
    properties: Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawCustomInput {
    name: String,
}

#[derive(Deserialize)]
struct RawConnectionLine {
    source: String,
    output: String,
    target: String,
    input: String,
}

/// Expression properties are stored as text; anything else is kept in its JSON form.
fn text(properties: &Map<String, serde_json::Value>, key: &str) -> String {
    match properties.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

impl From<RawVariable> for VariableDefinition {
    fn from(raw: RawVariable) -> Self {
        let default_value = match raw.default_value {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let mut variable = VariableDefinition::new(&raw.name, &default_value);
        if let Some(value_type) = raw.value_type {
            variable.value_type = value_type;
        }
        variable
    }
}

impl RawComponent {
    fn kind(&self) -> Result<ComponentKind, ConversionError> {
        let p = &self.properties;
        let kind = match self.component_type.as_str() {
            "StartActionComponent" => ComponentKind::Start,
            "EndActionComponent" => ComponentKind::End,
            "InputActionComponent" => ComponentKind::Input {
                name: text(p, "name"),
                value_type: non_empty_or_any(text(p, "inputType")),
            },
            "OutputActionComponent" => ComponentKind::Output {
                name: text(p, "name"),
                value_type: non_empty_or_any(text(p, "outputType")),
            },
            "EvalExprActionComponent" => ComponentKind::EvalExpr {
                expression: text(p, "expression"),
            },
            "SetVariableActionComponent" => ComponentKind::SetVariable {
                variable: text(p, "variable"),
                value: text(p, "value"),
            },
            "SwitchActionComponent" => {
                let tests = p
                    .get("tests")
                    .and_then(|t| t.as_array())
                    .map(|tests| {
                        tests
                            .iter()
                            .filter_map(|t| t.as_object())
                            .map(|t| SwitchTest::new(&text(t, "condition"), &text(t, "outputName")))
                            .collect()
                    })
                    .unwrap_or_default();
                ComponentKind::Switch { tests }
            }
            "CompareActionComponent" => {
                let symbol = text(p, "operator");
                let operator = if symbol.is_empty() {
                    CompareOperator::Equal
                } else {
                    CompareOperator::from_symbol(&symbol).ok_or_else(|| {
                        ConversionError::ValidationError(format!(
                            "component '{}' uses unknown operator '{}'",
                            self.obj_id, symbol
                        ))
                    })?
                };
                ComponentKind::Compare {
                    operator,
                    a: text(p, "A"),
                    b: text(p, "B"),
                    c: text(p, "C"),
                }
            }
            "IsTrueActionComponent" => ComponentKind::IsTrue {
                value: text(p, "value"),
            },
            "ConstantActionComponent" => ComponentKind::Constant {
                value: text(p, "value"),
            },
            "CounterActionComponent" => {
                let count_value = text(p, "countValue").trim().parse::<i64>().map_err(|_| {
                    ConversionError::ValidationError(format!(
                        "component '{}' has an invalid countValue",
                        self.obj_id
                    ))
                })?;
                ComponentKind::Counter { count_value }
            }
            "LoopActionComponent" => ComponentKind::Loop {
                variable: text(p, "variable"),
                from: text(p, "from"),
                to: text(p, "to"),
                step: text(p, "step"),
            },
            "CallActionActionComponent" => ComponentKind::CallAction {
                action: text(p, "action"),
            },
            "DelayActionComponent" => ComponentKind::Delay {
                milliseconds: text(p, "milliseconds"),
            },
            "ErrorActionComponent" => ComponentKind::Error {
                message: text(p, "message"),
            },
            "CatchErrorActionComponent" => ComponentKind::CatchError,
            "WatchVariableActionComponent" => ComponentKind::WatchVariable {
                variable: text(p, "variable"),
            },
            "DateNowActionComponent" => ComponentKind::DateNow,
            "ReadSettingActionComponent" => ComponentKind::ReadSetting {
                key: text(p, "key"),
            },
            "WriteSettingsActionComponent" => ComponentKind::WriteSettings {
                key: text(p, "key"),
                value: text(p, "value"),
            },
            "LogActionComponent" => ComponentKind::Log {
                value: text(p, "value"),
            },
            "ShowPageActionComponent" => ComponentKind::ShowPage {
                page: text(p, "page"),
            },
            other => {
                return Err(ConversionError::UnknownComponentType {
                    component: self.obj_id.clone(),
                    type_name: other.to_string(),
                });
            }
        };
        Ok(kind)
    }
}

fn non_empty_or_any(value_type: String) -> String {
    if value_type.is_empty() {
        "any".to_string()
    } else {
        value_type
    }
}

impl IntoProject for RawProject {
    fn into_project(self) -> Result<Project, ConversionError> {
        let mut flows = Vec::with_capacity(self.actions.len());
        for action in self.actions {
            let mut components = Vec::with_capacity(action.components.len());
            for raw in &action.components {
                let inputs: Vec<&str> = raw.custom_inputs.iter().map(|i| i.name.as_str()).collect();
                components.push(
                    ComponentDefinition::new(raw.obj_id.as_str(), raw.kind()?).with_inputs(&inputs),
                );
            }
            let wires = action
                .connection_lines
                .iter()
                .map(|l| WireDefinition::new(&l.source, &l.output, &l.target, &l.input))
                .collect();
            flows.push(FlowDefinition {
                name: action.name,
                components,
                wires,
                local_variables: action.local_variables.into_iter().map(Into::into).collect(),
            });
        }

        Ok(Project {
            flows,
            global_variables: self
                .variables
                .global_variables
                .into_iter()
                .map(Into::into)
                .collect(),
            pages: self.pages.into_iter().map(|p| p.name).collect(),
        })
    }
}

/// Command-line interface for checking, building and running flow projects.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a project file and list every problem found
    Check { project: String },
    /// Compile a project into a binary artifact
    Build {
        project: String,
        #[arg(short, long, default_value = "project.bin")]
        output: String,
    },
    /// Print the native records of a compiled artifact
    Disasm { artifact: String },
    /// Execute the root flow and print what it logged
    Run {
        /// A project file, or an artifact built with `build`
        project: String,
        /// Flow to start instead of the first one
        #[arg(long)]
        entry: Option<String>,
        /// Keep polling watches for this many milliseconds after the flow goes idle
        #[arg(long)]
        watch_ms: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Check { project } => check(&project),
        Command::Build { project, output } => build(&project, &output),
        Command::Disasm { artifact } => disasm(&artifact),
        Command::Run {
            project,
            entry,
            watch_ms,
        } => run(&project, entry, watch_ms.map(Duration::from_millis)),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("nagare={level}"))),
        )
        .with_target(false)
        .init();
}

/// Loads a project from either the editor format or the canonical JSON model.
fn load_project(path: &str) -> Project {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read project file '{}': {}", path, e))
    });
    let json: serde_json::Value = serde_json::from_str(&content)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse project JSON: {}", e)));

    if json.get("actions").is_some() {
        let raw: RawProject = serde_json::from_value(json).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to parse editor project: {}", e))
        });
        raw.into_project().unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to convert editor project: {}", e))
        })
    } else {
        serde_json::from_value(json)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse project: {}", e)))
    }
}

fn check(path: &str) {
    let project = load_project(path);
    let issues = validation::collect_issues(&project);

    let components: usize = project.flows.iter().map(|f| f.components.len()).sum();
    let wires: usize = project.flows.iter().map(|f| f.wires.len()).sum();
    println!("--- Project Summary ---");
    println!("Flows:            {}", project.flows.len());
    println!("Components:       {}", components);
    println!("Wires:            {}", wires);
    println!("Global Variables: {}", project.global_variables.len());

    if issues.is_empty() {
        println!("\nProject is valid.");
        return;
    }
    println!("\n{} problem(s) found:", issues.len());
    for issue in &issues {
        println!("  -> {}", issue);
    }
    std::process::exit(1);
}

fn build(path: &str, output: &str) {
    let project = load_project(path);

    println!("Building project...");
    let start = Instant::now();
    let artifact = match CompiledProject::build(&project) {
        Ok(artifact) => artifact,
        Err(BuildError::Unsupported { component, kind }) => {
            println!(
                "Note: component '{}' ({}) has no binary form, packaging for the interpreter only",
                component, kind
            );
            CompiledProject::interpreted(&project)
                .unwrap_or_else(|e| exit_with_error(&format!("Build failed: {}", e)))
        }
        Err(e) => exit_with_error(&format!("Build failed: {}", e)),
    };
    let duration = start.elapsed();

    artifact
        .save(output)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to write artifact: {}", e)));

    if let Some(native) = &artifact.native {
        let components: usize = native.flows.iter().map(|f| f.components.len()).sum();
        println!(
            "Build Successful! {} flows, {} components, {} constants in {:?}",
            native.flows.len(),
            components,
            native.constants.len(),
            duration
        );
    }
    println!("Artifact written to {}", output);
}

fn disasm(path: &str) {
    let artifact = CompiledProject::from_file(path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load artifact: {}", e)));
    match &artifact.native {
        Some(native) => print!("{}", Disassembly(native)),
        None => exit_with_error("Artifact has no native section."),
    }
}

fn run(path: &str, entry: Option<String>, watch: Option<Duration>) {
    let project = if path.ends_with(".json") {
        load_project(path)
    } else {
        CompiledProject::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load artifact: {}", e)))
            .interpreter
            .unwrap_or_else(|| exit_with_error("Artifact has no interpreter section."))
    };

    let mut config = RuntimeConfig::from_env();
    if let Some(entry) = entry {
        config = config.with_entry_flow(&entry);
    }
    let poll_interval = config.watch_poll_interval();

    let mut runtime = Runtime::builder(project)
        .config(config)
        .build()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to prepare runtime: {}", e)));

    let executor = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to start async runtime: {}", e)));

    println!("Running flow...");
    let start = Instant::now();
    let status = executor.block_on(async {
        let mut status = runtime.run().await;
        if let Some(watch) = watch {
            let deadline = Instant::now() + watch;
            while status == RuntimeStatus::Running && Instant::now() < deadline {
                tokio::time::sleep(poll_interval).await;
                status = runtime.run().await;
            }
        }
        if status == RuntimeStatus::Running {
            runtime.stop();
        }
        runtime.status().clone()
    });
    let duration = start.elapsed();

    println!("\n--- Log ---");
    for entry in &runtime.host().logs {
        println!("[{}] {}", entry.component.component, entry.message);
    }
    if !runtime.host().errors.is_empty() {
        println!("\n--- Errors ---");
        for entry in &runtime.host().errors {
            println!("[{}] {}", entry.component, entry.message);
        }
    }

    let stats = runtime.stats();
    println!("\n--- Run Summary ---");
    println!("Status:               {:?}", status);
    println!("Components Executed:  {}", stats.executed_components);
    println!("Flow States Created:  {}", stats.flow_states_created);
    println!("Errors Caught:        {}", stats.caught_errors);
    println!("Handles Disposed:     {}", stats.disposed_handles);
    println!("-----------------------------");
    println!("Total Execution:      {:?}", duration);

    if let RuntimeStatus::Failed(message) = status {
        exit_with_error(&message);
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
