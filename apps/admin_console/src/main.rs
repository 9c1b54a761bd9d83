mod commands;
mod config;
mod present;
mod wizard_steps;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    HttpSimulationClient, MultiStepWizardController, SimulationClient, ValidationError,
    WorkflowController, WorkflowUpdate,
};
use commands::{parse_command, ConsoleCommand, HELP};
use shared::domain::{AssignmentId, SubjectId, SubjectRef, SubjectType};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Stage, simulate and commit access assignment changes")]
struct Cli {
    /// TOML settings file; defaults to ./console.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    csrf_token: Option<String>,
    #[arg(long)]
    debounce_ms: Option<u64>,
    #[arg(long)]
    request_timeout_ms: Option<u64>,
    #[arg(long, default_value = "user")]
    subject_type: SubjectType,
    /// Sent as given; the server's id format is not guessed.
    #[arg(long)]
    subject_id: String,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Mode {
    /// Print the subject's current assignments and exit.
    Show,
    /// Interactive editing session on stdin (default).
    #[default]
    Edit,
    /// Step through one selection step per item kind, saving each step.
    Wizard {
        /// Minimum selected items before a step can be left.
        #[arg(long, default_value_t = 0)]
        min_per_step: usize,
    },
}

/// Plain edit session or the same session driven step by step.
enum Driver {
    Workflow(WorkflowController),
    Wizard {
        wizard: MultiStepWizardController,
        min_per_step: usize,
    },
}

impl Driver {
    fn workflow(&self) -> &WorkflowController {
        match self {
            Self::Workflow(workflow) => workflow,
            Self::Wizard { wizard, .. } => wizard.workflow(),
        }
    }

    fn workflow_mut(&mut self) -> &mut WorkflowController {
        match self {
            Self::Workflow(workflow) => workflow,
            Self::Wizard { wizard, .. } => wizard.workflow_mut(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(url) = cli.server_url {
        settings.server_url = url;
    }
    if let Some(token) = cli.csrf_token {
        settings.csrf_token = Some(token);
    }
    if let Some(ms) = cli.debounce_ms {
        settings.debounce_ms = ms;
    }
    if let Some(ms) = cli.request_timeout_ms {
        settings.request_timeout_ms = ms;
    }

    let http = Arc::new(HttpSimulationClient::new(settings.client_config()?));
    let subject = SubjectRef::new(SubjectId::from(cli.subject_id), cli.subject_type);
    info!(server = %settings.server_url, subject = %subject, "admin console starting");

    let snapshot = http
        .fetch_snapshot(&subject)
        .await
        .with_context(|| format!("failed to load assignments for {subject}"))?;
    println!("{}", present::render_snapshot(&subject, &snapshot));

    let mode = cli.mode.unwrap_or_default();
    if matches!(mode, Mode::Show) {
        return Ok(());
    }

    let client: Arc<dyn SimulationClient> = http.clone();
    let mut workflow = WorkflowController::new(client, settings.workflow_options());
    let steps = match mode {
        Mode::Wizard { min_per_step } => {
            Some((wizard_steps::steps_for(&snapshot, min_per_step), min_per_step))
        }
        Mode::Show | Mode::Edit => None,
    };
    workflow.select_subject(subject.clone(), snapshot)?;
    workflow.begin_edit()?;
    let mut driver = match steps {
        Some((steps, min_per_step)) => Driver::Wizard {
            wizard: MultiStepWizardController::new(workflow, steps)
                .context("the subject has nothing to step through")?,
            min_per_step,
        },
        None => Driver::Workflow(workflow),
    };
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(ConsoleCommand::Help)) => println!("{HELP}"),
                    Ok(Some(command)) => {
                        debug!(command = command.name(), "console command");
                        match run_command(&mut driver, command).await {
                            Ok(()) => print_state(&driver),
                            Err(err) => {
                                warn!(error = %err, "command rejected");
                                println!("! {err}");
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("{message}"),
                }
            }
            Some(update) = driver.workflow_mut().process_next() => {
                on_update(&http, &mut driver, &subject, update).await;
            }
        }
    }

    info!("admin console exiting");
    Ok(())
}

async fn on_update(
    http: &HttpSimulationClient,
    driver: &mut Driver,
    subject: &SubjectRef,
    update: WorkflowUpdate,
) {
    debug!(?update, "workflow update");
    if let Some(line) = present::describe_update(&update) {
        println!("{line}");
    }
    if !matches!(update, WorkflowUpdate::Committed(_)) {
        print_state(driver);
        return;
    }
    if let Err(err) = reload(http, driver, subject).await {
        warn!(error = %err, "assignments not reloaded after commit");
        println!("! commit succeeded but reloading assignments failed: {err:#}");
        print_state(driver);
    }
}

async fn run_command(driver: &mut Driver, command: ConsoleCommand) -> Result<()> {
    if let ConsoleCommand::Toggle { id } = &command {
        let id = resolve(driver.workflow(), id)?;
        match driver {
            Driver::Workflow(workflow) => workflow.toggle(&id)?,
            Driver::Wizard { wizard, .. } => wizard.toggle(&id)?,
        }
        return Ok(());
    }

    match (driver, command) {
        (Driver::Wizard { wizard, .. }, ConsoleCommand::Next) => {
            wizard.advance().await?;
        }
        (Driver::Wizard { wizard, .. }, ConsoleCommand::Back) => {
            wizard.retreat();
        }
        (Driver::Wizard { wizard, .. }, ConsoleCommand::Commit { metadata }) => {
            wizard.commit(metadata)?;
        }
        (Driver::Workflow(_), ConsoleCommand::Next | ConsoleCommand::Back) => {
            bail!("next and back are only available in wizard mode");
        }
        (driver, command) => {
            let workflow = driver.workflow_mut();
            match command {
                ConsoleCommand::Edit => workflow.begin_edit()?,
                ConsoleCommand::Refresh => {
                    workflow.refresh_impact()?;
                }
                ConsoleCommand::Revert => workflow.revert_all()?,
                ConsoleCommand::Commit { metadata } => workflow.commit(metadata)?,
                ConsoleCommand::Cancel => workflow.cancel()?,
                ConsoleCommand::Dismiss => workflow.dismiss_notice(),
                ConsoleCommand::Show
                | ConsoleCommand::Toggle { .. }
                | ConsoleCommand::Next
                | ConsoleCommand::Back
                | ConsoleCommand::Help
                | ConsoleCommand::Quit => {}
            }
        }
    }
    Ok(())
}

fn resolve(workflow: &WorkflowController, raw: &str) -> Result<AssignmentId> {
    match workflow.resolve_assignment(raw) {
        Some(id) => Ok(id),
        None => Err(ValidationError::UnknownAssignment(AssignmentId::from(raw)).into()),
    }
}

/// Re-reads the subject after a commit so the new assignments become the
/// baseline of the next session.
async fn reload(http: &HttpSimulationClient, driver: &mut Driver, subject: &SubjectRef) -> Result<()> {
    let snapshot = http
        .fetch_snapshot(subject)
        .await
        .with_context(|| format!("failed to reload assignments for {subject}"))?;
    println!("{}", present::render_snapshot(subject, &snapshot));

    match driver {
        Driver::Workflow(workflow) => workflow.select_subject(subject.clone(), snapshot)?,
        Driver::Wizard {
            wizard,
            min_per_step,
        } => {
            let steps = wizard_steps::steps_for(&snapshot, *min_per_step);
            wizard.workflow_mut().select_subject(subject.clone(), snapshot)?;
            wizard.restart(steps)?;
        }
    }
    println!("type 'edit' to start another session");
    Ok(())
}

fn print_state(driver: &Driver) {
    if let Driver::Wizard { wizard, .. } = driver {
        print!("{}", present::render_wizard_step(wizard));
        if let Some(summary) = wizard.summary() {
            print!("{}", present::render_summary(&summary));
        }
    }
    let workflow = driver.workflow();
    if let Some(view) = workflow.view() {
        print!("{}", present::render_view(workflow.state(), &view));
    }
    if let Some(notice) = workflow.notice() {
        println!("{}", present::render_notice(notice));
    }
}
