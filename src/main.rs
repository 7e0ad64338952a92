mod cli;
mod ui;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, Step};
use flowstate::config::LogFormat;
use flowstate::{ActionRegistry, Definition, DefinitionDocument, FlowstateConfig, Process, Processor, TimeOrderedIdGenerator};
use ui::Reporter;

const DEMO_WORKFLOW: &str = include_str!("../workflows/approval.json");

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FlowstateConfig::load(cli.config.as_deref())?;
    init_logging(&config, cli.verbose)?;
    info!("flowstate v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Validate { file } => validate(&config, &file),
        Command::Run { file, steps, json } => run(&config, &file, &steps, json),
        Command::Demo => demo(&config),
    }
}

fn init_logging(config: &FlowstateConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { config.log.level.as_str() };
    let filter = EnvFilter::try_new(level).with_context(|| format!("invalid log filter '{level}'"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match config.log.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Full => builder.init(),
    }
    debug!(level, "logging initialized");
    Ok(())
}

fn build(config: &FlowstateConfig, document: DefinitionDocument) -> Result<Arc<Definition>> {
    let registry = ActionRegistry::with_http_defaults(config.http.clone());
    let definition = document.into_definition(&registry, Arc::new(TimeOrderedIdGenerator::new()))?;
    Ok(Arc::new(definition))
}

fn load(config: &FlowstateConfig, path: &Path) -> Result<Arc<Definition>> {
    let document = DefinitionDocument::load(path).with_context(|| format!("cannot load {}", path.display()))?;
    build(config, document).with_context(|| format!("invalid workflow in {}", path.display()))
}

fn validate(config: &FlowstateConfig, path: &Path) -> Result<()> {
    let definition = load(config, path)?;
    Reporter::new().definition(&definition);
    Ok(())
}

fn run(config: &FlowstateConfig, path: &Path, steps: &[Step], as_json: bool) -> Result<()> {
    let definition = load(config, path)?;
    let reporter = Reporter::new();
    let processor = Processor::default();
    let mut process = processor.instantiate(&definition, json!({ "source": path.display().to_string() }));

    let outcome = apply_steps(&processor, &mut process, steps, (!as_json).then_some(&reporter));

    if as_json {
        println!("{}", serde_json::to_string_pretty(&process.snapshot())?);
    } else {
        reporter.process(&process);
    }
    outcome
}

fn apply_steps(
    processor: &Processor,
    process: &mut Process,
    steps: &[Step],
    reporter: Option<&Reporter>,
) -> Result<()> {
    for step in steps {
        let (label, result) = match step {
            Step::Event { id, payload } => (
                format!("event {id}"),
                processor.trigger_event(process, id, payload.clone()),
            ),
            Step::Set { variable, value } => {
                processor.set_variable(process, variable, value.clone());
                (format!("set {variable} = {value}"), Ok(()))
            }
            Step::Process => ("process".to_string(), processor.process(process)),
        };
        if let Err(err) = result {
            if let Some(reporter) = reporter {
                reporter.failure(&label, &err);
            }
            return Err(err).with_context(|| format!("step '{label}' failed"));
        }
        if let Some(reporter) = reporter {
            reporter.step(&label, process);
        }
    }
    Ok(())
}

fn demo(config: &FlowstateConfig) -> Result<()> {
    let document = DefinitionDocument::from_json_str(DEMO_WORKFLOW).context("bundled workflow is invalid")?;
    let definition = build(config, document)?;
    let reporter = Reporter::new();
    reporter.definition(&definition);
    println!();

    let steps = [
        Step::Set {
            variable: "role".into(),
            value: json!("manager"),
        },
        Step::Event {
            id: "submit".into(),
            payload: Value::Null,
        },
        Step::Process,
        Step::Event {
            id: "approve".into(),
            payload: json!({ "approver": "demo" }),
        },
        Step::Process,
    ];
    let processor = Processor::default();
    let mut process = processor.instantiate(&definition, Value::Null);
    let outcome = apply_steps(&processor, &mut process, &steps, Some(&reporter));
    reporter.process(&process);
    outcome
}
