//! Simulate command implementation.
//!
//! Runs a checklist against the mock probe and reports every task's state
//! after each scripted step.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use dishtemp_core::checklist::command_channel;
use dishtemp_core::{
    Checklist, DisplayPreferences, MockProbe, ReaderOptions, ReaderPolicy, RecordingSink,
    TaskSnapshot, TemperatureProbe,
};
use dishtemp_types::TaskId;

use crate::cli::{OutputFormat, SimulateArgs};
use crate::config::{Config, MAX_STEP_LATENCY_MS};
use crate::format::{format_json, format_snapshot_text};

/// Address reported by the simulated probe.
const PROBE_ADDRESS: &str = "SIM-DISH-PROBE";

/// Longest wait for the probe to become idle, on top of its own step delays.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Press a task's button.
    Press(TaskId),
    /// Cancel a task's in-flight reading.
    Cancel(TaskId),
    /// Wait until the probe is idle.
    Wait,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Press(task) => write!(f, "{}:press", task),
            Step::Cancel(task) => write!(f, "{}:cancel", task),
            Step::Wait => write!(f, "wait"),
        }
    }
}

/// Parse a script such as `a:press,wait,a:press`.
pub fn parse_script(script: &str, tasks: &[TaskId]) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for raw in script.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if raw.eq_ignore_ascii_case("wait") {
            steps.push(Step::Wait);
            continue;
        }
        let Some((task, action)) = raw.rsplit_once(':') else {
            bail!("Invalid step '{}': expected <task>:press, <task>:cancel or wait", raw);
        };
        let task_id = TaskId::new(task.trim());
        if !tasks.contains(&task_id) {
            bail!("Step '{}' refers to unknown task '{}'", raw, task_id);
        }
        match action.trim().to_lowercase().as_str() {
            "press" => steps.push(Step::Press(task_id)),
            "cancel" => steps.push(Step::Cancel(task_id)),
            other => bail!("Unknown action '{}' in step '{}'", other, raw),
        }
    }
    if steps.is_empty() {
        bail!("Script has no steps");
    }
    Ok(steps)
}

/// Read and save every task in turn.
pub fn default_script(tasks: &[TaskId]) -> Vec<Step> {
    tasks
        .iter()
        .flat_map(|task| [Step::Press(task.clone()), Step::Wait, Step::Press(task.clone())])
        .collect()
}

/// Everything a simulation run needs.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub tasks: Vec<TaskId>,
    pub reading_celsius: f32,
    pub failures: u32,
    pub step_latency: Duration,
    pub options: ReaderOptions,
    pub steps: Vec<Step>,
}

impl SimulationSettings {
    /// Combine command-line arguments with the configuration file.
    pub fn resolve(args: &SimulateArgs, config: &Config) -> Result<Self> {
        let mut tasks: Vec<TaskId> = Vec::new();
        for id in args.tasks.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let task_id = TaskId::new(id);
            if tasks.contains(&task_id) {
                bail!("Task '{}' listed twice", task_id);
            }
            tasks.push(task_id);
        }
        if tasks.is_empty() {
            bail!("No tasks given");
        }

        let reading_celsius = args.reading.unwrap_or(config.simulation.reading_celsius);
        if !reading_celsius.is_finite() {
            bail!("Reading must be a finite number");
        }

        let policy = match args.policy {
            Some(name) => ReaderPolicy::from_name(name.as_str())?,
            None => config.reader_policy()?,
        };
        let display = DisplayPreferences::new(args.units.resolve_unit(config.display_unit))
            .show_both(args.units.resolve_show_both(config.show_both));
        let step_latency_ms = args
            .step_latency
            .unwrap_or(config.simulation.step_latency_ms);
        if step_latency_ms > MAX_STEP_LATENCY_MS {
            bail!("Step latency must be at most {} ms", MAX_STEP_LATENCY_MS);
        }
        let step_latency = Duration::from_millis(step_latency_ms);

        let steps = match &args.script {
            Some(script) => parse_script(script, &tasks)?,
            None => default_script(&tasks),
        };

        Ok(Self {
            tasks,
            reading_celsius,
            failures: args.fail,
            step_latency,
            options: ReaderOptions::new().policy(policy).display(display),
            steps,
        })
    }
}

/// Task states after one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tasks: Vec<TaskSnapshot>,
}

/// A response committed during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedResponse {
    pub task_id: TaskId,
    pub value: String,
}

/// Result of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub steps: Vec<StepReport>,
    pub saved: Vec<SavedResponse>,
}

async fn wait_for_idle(probe: &MockProbe, step_latency: Duration) -> Result<()> {
    let limit = IDLE_TIMEOUT + step_latency * 4;
    timeout(limit, async {
        while probe.status().is_busy() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .context("Timed out waiting for the probe to finish")?;
    debug!(status = %probe.status(), "Probe idle");
    Ok(())
}

/// Run a checklist against the mock probe.
pub async fn run_simulation(settings: &SimulationSettings) -> Result<SimulationReport> {
    let probe = Arc::new(
        MockProbe::builder()
            .address(PROBE_ADDRESS)
            .reading(settings.reading_celsius)
            .step_latency(settings.step_latency)
            .fail_next(settings.failures)
            .build(),
    );
    let sink = Arc::new(RecordingSink::new());

    let mut checklist = Checklist::new(Arc::clone(&probe), sink.clone(), settings.options);
    for task in &settings.tasks {
        checklist.add_task(task.clone())?;
    }

    let (handle, commands) = command_channel(16);
    let events = checklist.subscribe_events();
    let shutdown = CancellationToken::new();
    let event_loop = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { checklist.run(events, commands, shutdown).await }
    });

    info!(
        tasks = settings.tasks.len(),
        steps = settings.steps.len(),
        "Starting simulation"
    );
    let mut steps = Vec::with_capacity(settings.steps.len());
    for (index, step) in settings.steps.iter().enumerate() {
        debug!(step = %step, "Running step");
        let error = match step {
            Step::Press(task) => handle.press(task).await.err(),
            Step::Cancel(task) => handle.cancel(task).await.err(),
            Step::Wait => {
                wait_for_idle(&probe, settings.step_latency).await?;
                None
            }
        };
        steps.push(StepReport {
            step: index + 1,
            action: step.to_string(),
            error: error.map(|e| e.to_string()),
            tasks: handle.snapshot().await?,
        });
    }

    shutdown.cancel();
    event_loop.await.context("Checklist event loop panicked")??;

    let saved = sink
        .saves()
        .await
        .into_iter()
        .map(|(task_id, value)| SavedResponse { task_id, value })
        .collect();
    Ok(SimulationReport { steps, saved })
}

fn format_report_text(report: &SimulationReport, no_color: bool) -> String {
    let mut output = String::new();
    for step in &report.steps {
        output.push_str(&format!("Step {}: {}\n", step.step, step.action));
        if let Some(error) = &step.error {
            output.push_str(&format!("  error: {}\n", error));
        }
        output.push_str(&format_snapshot_text(&step.tasks, no_color));
    }
    if report.saved.is_empty() {
        output.push_str("\nNo responses saved\n");
    } else {
        output.push_str("\nSaved responses (°C):\n");
        for saved in &report.saved {
            output.push_str(&format!("  {} = {}\n", saved.task_id, saved.value));
        }
    }
    output
}

pub async fn cmd_simulate(args: SimulateArgs, config: &Config, no_color: bool) -> Result<()> {
    let settings = SimulationSettings::resolve(&args, config)?;
    let report = run_simulation(&settings).await?;
    let content = match args.format {
        OutputFormat::Json => format_json(&report)?,
        OutputFormat::Text => format_report_text(&report, no_color),
    };
    print!("{}", content);
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}
