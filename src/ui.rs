//! Terminal output for the CLI, styled with `console`.

use console::Style;

use flowstate::{Definition, HistoryKind, Process, StateKind};

pub struct Reporter {
    green: Style,
    red: Style,
    yellow: Style,
    cyan: Style,
    dim: Style,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    pub fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            cyan: Style::new().cyan(),
            dim: Style::new().dim(),
        }
    }

    /// States, transitions and events of a definition.
    pub fn definition(&self, definition: &Definition) {
        println!(
            "{} {} {}",
            self.green.apply_to("✓"),
            definition.name(),
            self.dim.apply_to(format!("({})", definition.id()))
        );
        if let Some(description) = definition.description() {
            println!("  {description}");
        }

        println!("  {}", self.cyan.apply_to("states"));
        for state in definition.states() {
            let marker = match state.kind() {
                StateKind::Initial => self.green.apply_to("▶"),
                StateKind::Intermediate => self.dim.apply_to("·"),
                StateKind::Final => self.yellow.apply_to("■"),
            };
            println!(
                "    {marker} {} {} {}",
                state.id(),
                self.dim.apply_to(state.name()),
                self.dim.apply_to(format!(
                    "[entry {}, exit {}]",
                    state.entry_actions().len(),
                    state.exit_actions().len()
                ))
            );
        }

        println!("  {}", self.cyan.apply_to("transitions"));
        for transition in definition.transitions() {
            let guards: Vec<String> = transition
                .conditions()
                .iter()
                .map(|c| format!("{} {} {}", c.variable_path, c.operator, c.value))
                .collect();
            let guard = if guards.is_empty() {
                String::new()
            } else {
                format!(" when {}", guards.join(" and "))
            };
            println!(
                "    {} → {}{}",
                transition.from(),
                transition.to(),
                self.dim.apply_to(guard)
            );
        }

        println!("  {}", self.cyan.apply_to("events"));
        for event in definition.events() {
            println!(
                "    {} {}",
                event.id(),
                self.dim.apply_to(format!("({} actions)", event.actions().len()))
            );
        }
    }

    pub fn step(&self, label: &str, process: &Process) {
        let active: Vec<&str> = process.active_state_ids().iter().map(|id| id.as_str()).collect();
        println!(
            "{} {label} {}",
            self.cyan.apply_to("→"),
            self.dim.apply_to(format!("active: [{}]", active.join(", ")))
        );
    }

    pub fn failure(&self, label: &str, error: &dyn std::fmt::Display) {
        println!("{} {label}: {error}", self.red.apply_to("✗"));
    }

    /// Active states, variables and the full history.
    pub fn process(&self, process: &Process) {
        println!();
        println!("{}", self.green.apply_to(format!("─── Process {} ───", process.id())));
        let active: Vec<&str> = process.active_state_ids().iter().map(|id| id.as_str()).collect();
        println!("  active: {}", active.join(", "));

        println!("  {}", self.cyan.apply_to("variables"));
        for (id, value) in process.variables() {
            println!("    {id} = {value}");
        }

        println!("  {}", self.cyan.apply_to("history"));
        for entry in process.history() {
            let kind = match entry.kind {
                HistoryKind::Audit => self.yellow.apply_to(entry.kind.to_string()),
                _ => self.dim.apply_to(entry.kind.to_string()),
            };
            println!(
                "    {} {kind} {}",
                self.dim.apply_to(entry.timestamp.format("%H:%M:%S%.3f")),
                entry.message
            );
        }
    }
}
