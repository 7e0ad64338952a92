//! Command line interface built on clap.
//!
//! [`Cli`] carries the global flags (`--config`, `--verbose`) and one
//! [`Command`]: `validate`, `run` or `demo`.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use serde_json::Value;

/// flowstate: run workflow definitions from the command line.
#[derive(Debug, Parser)]
#[command(name = "flowstate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./flowstate.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level regardless of configuration.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a definition file and report its structure.
    Validate {
        /// A .json or .toml definition.
        file: PathBuf,
    },

    /// Instantiate a definition and apply steps to the new process in order.
    Run {
        /// A .json or .toml definition.
        file: PathBuf,

        /// `event:<id>[=<json>]`, `set:<variable>=<value>` or `process`.
        #[arg(long = "step", short, value_name = "STEP")]
        steps: Vec<Step>,

        /// Print the final process snapshot as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Walk the bundled approval workflow from draft to approved.
    Demo,
}

/// One scripted operation for `run`.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Event { id: String, payload: Value },
    Set { variable: String, value: Value },
    Process,
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "process" {
            return Ok(Step::Process);
        }
        if let Some(rest) = s.strip_prefix("event:") {
            let (id, payload) = match rest.split_once('=') {
                Some((id, raw)) => {
                    let payload = serde_json::from_str(raw)
                        .map_err(|e| format!("invalid JSON payload for event '{id}': {e}"))?;
                    (id, payload)
                }
                None => (rest, Value::Null),
            };
            if id.is_empty() {
                return Err("event step needs an id: event:<id>".to_string());
            }
            return Ok(Step::Event {
                id: id.to_string(),
                payload,
            });
        }
        if let Some(rest) = s.strip_prefix("set:") {
            let (variable, raw) = rest
                .split_once('=')
                .ok_or_else(|| format!("expected set:<variable>=<value>, got '{s}'"))?;
            if variable.is_empty() {
                return Err("set step needs a variable name".to_string());
            }
            // Anything that is not valid JSON is taken as a plain string.
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            return Ok(Step::Set {
                variable: variable.to_string(),
                value,
            });
        }
        Err(format!(
            "unknown step '{s}' (expected event:<id>, set:<variable>=<value> or process)"
        ))
    }
}
