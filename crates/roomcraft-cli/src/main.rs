use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, ExitStatus};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use roomcraft_contracts::commands::{parse_intent, Intent, WIZARD_HELP_COMMANDS};
use roomcraft_contracts::context::{StaticUiContext, ThemeMode};
use roomcraft_contracts::events::EventWriter;
use roomcraft_contracts::storage::JsonFileStore;
use roomcraft_contracts::wire::WizardVariant;
use roomcraft_engine::{
    Applied, DesignWorkflow, DryrunGenerationClient, GenerationClient, HttpGenerationClient,
    Navigator, ResetScope, StageTransition, StepOutcome, WorkflowConfig, WorkflowStage,
};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "roomcraft", version, about = "Staged room redesign generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive three-step wizard driven by slash commands.
    Wizard(WizardArgs),
    /// Run all three steps non-interactively and download the result.
    Generate(GenerateArgs),
}

#[derive(Debug, Args)]
struct ServiceArgs {
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    variant: Option<WizardVariant>,
    /// Synthesize results locally instead of calling the service.
    #[arg(long)]
    dryrun: bool,
    /// Directory for events.jsonl and saved designs.
    #[arg(long)]
    state_dir: Option<PathBuf>,
    #[arg(long, default_value = "dark")]
    theme: ThemeMode,
    #[arg(long, default_value = "en")]
    language: String,
}

#[derive(Debug, Parser)]
struct WizardArgs {
    #[command(flatten)]
    service: ServiceArgs,
    #[arg(long)]
    download_dir: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[command(flatten)]
    service: ServiceArgs,
    #[arg(long)]
    image: PathBuf,
    #[arg(long = "element")]
    elements: Vec<PathBuf>,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    room: Option<String>,
    #[arg(long)]
    weight: Option<String>,
    #[arg(long)]
    design: Option<String>,
    #[arg(long)]
    budget: Option<i64>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("roomcraft error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roomcraft=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Wizard(args) => run_wizard(args).await,
        Command::Generate(args) => run_generate(args).await,
    }
}

fn build_workflow(service: &ServiceArgs, download_dir: Option<PathBuf>) -> Result<DesignWorkflow> {
    let mut config = WorkflowConfig::load().context("failed loading configuration")?;
    if let Some(endpoint) = &service.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(variant) = service.variant {
        config.variant = variant;
    }
    if let Some(dir) = download_dir {
        config.download_dir = dir;
    }
    config.validate()?;

    let client: Arc<dyn GenerationClient> = if service.dryrun {
        Arc::new(DryrunGenerationClient)
    } else {
        Arc::new(HttpGenerationClient::from_config(&config)?)
    };
    info!(
        client = client.name(),
        variant = %config.variant,
        endpoint = %config.endpoint,
        "workflow configured"
    );
    let ui = StaticUiContext::new(service.theme, service.language.clone());
    let mut workflow = DesignWorkflow::new(config, client, Arc::new(ui))?;

    if let Some(state_dir) = &service.state_dir {
        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("failed creating {}", state_dir.display()))?;
        let session_id = workflow.session_id().to_string();
        workflow = workflow
            .with_store(Box::new(JsonFileStore::new(state_dir.join("state.json"))))
            .with_events(EventWriter::new(state_dir.join("events.jsonl"), session_id));
    }
    Ok(workflow)
}

async fn run_wizard(args: WizardArgs) -> Result<i32> {
    let mut workflow = build_workflow(&args.service, args.download_dir)?;
    let navigator = SystemNavigator;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Roomcraft wizard started. Type /help for commands.");
    print_stage_hint(&workflow);

    loop {
        let stage = workflow.stage();
        stdout
            .write_all(format!("[{}/3 {}] > ", stage.number(), stage.as_str()).as_bytes())
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let intent = parse_intent(&line);
        match intent.action.as_str() {
            "noop" => {}
            "help" => println!("Commands: {}", WIZARD_HELP_COMMANDS.join(" ")),
            "quit" => break,
            "update_settings" => apply_settings_update(&mut workflow, &intent),
            "set_primary_image" => {
                let Some(path) = intent.path_arg() else {
                    println!("/image requires a path");
                    continue;
                };
                match workflow.load_primary_image(Path::new(path)) {
                    Ok(preview) => println!("Room photo set ({preview})"),
                    Err(err) => println!("Upload failed: {err}"),
                }
            }
            "add_auxiliary_images" => {
                let paths = intent.path_args();
                if paths.is_empty() {
                    println!("/add requires one or more paths");
                    continue;
                }
                match workflow.load_auxiliary_images(&paths) {
                    Ok(previews) => println!(
                        "Added {} reference image(s); {} total",
                        previews.len(),
                        workflow.inputs().auxiliary().len()
                    ),
                    Err(err) => println!("Upload failed: {err}"),
                }
            }
            "remove_auxiliary_image" => {
                let Some(position) = intent
                    .command_args
                    .get("index")
                    .and_then(Value::as_u64)
                    .filter(|position| *position >= 1)
                else {
                    println!("/remove requires a position starting at 1");
                    continue;
                };
                match workflow.remove_auxiliary_image(position as usize - 1) {
                    Ok(removed) => println!("Removed {}", removed.name()),
                    Err(err) => println!("{err}"),
                }
            }
            "next" => match workflow.advance() {
                StageTransition::Finish => run_generation(&mut workflow).await,
                transition => report_transition(&workflow, &transition),
            },
            "back" => {
                let transition = workflow.back();
                report_transition(&workflow, &transition);
            }
            "finish" => {
                if workflow.stage() == WorkflowStage::Settings {
                    match workflow.advance() {
                        StageTransition::Finish => run_generation(&mut workflow).await,
                        transition => report_transition(&workflow, &transition),
                    }
                } else {
                    run_generation(&mut workflow).await;
                }
            }
            "open" => match workflow.open_full_size(&navigator) {
                Ok(()) => {}
                Err(err) => println!("{err}"),
            },
            "download" => {
                let dir = intent.path_arg().map(PathBuf::from);
                match workflow.download(dir.as_deref()).await {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(err) => println!("Download failed: {err}"),
                }
            }
            "reset_result" => {
                workflow.reset(ResetScope::Result);
                println!("Result cleared. Adjust settings and /generate again.");
            }
            "reset_workflow" => {
                workflow.reset(ResetScope::Workflow);
                println!("Started over.");
                print_stage_hint(&workflow);
            }
            "status" => print_status(&workflow),
            "history" => {
                let history = workflow.history();
                if history.is_empty() {
                    println!("No saved designs.");
                }
                for (idx, record) in history.iter().enumerate() {
                    println!(
                        "{}. {} {} / {} budget {} -> {}",
                        idx + 1,
                        record.created_at,
                        record.settings.style,
                        record.settings.room_type,
                        record.settings.budget,
                        record.artifact_url
                    );
                }
            }
            _ => {
                let command = intent
                    .command_args
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                println!("Unknown command /{command}. Type /help for commands.");
            }
        }
    }
    Ok(0)
}

async fn run_generate(args: GenerateArgs) -> Result<i32> {
    let mut workflow = build_workflow(&args.service, args.out.clone())?;
    workflow.load_primary_image(&args.image)?;
    if !args.elements.is_empty() {
        workflow.load_auxiliary_images(&args.elements)?;
    }

    let mut updates = vec![("prompt", json!(args.prompt))];
    for (name, value) in [
        ("style", &args.style),
        ("roomType", &args.room),
        ("inspirationWeight", &args.weight),
        ("design", &args.design),
    ] {
        if let Some(value) = value {
            updates.push((name, json!(value)));
        }
    }
    if let Some(budget) = args.budget {
        updates.push(("budget", json!(budget)));
    }
    for (name, value) in updates {
        workflow.update_named(name, &value)?;
    }

    for _ in WorkflowStage::ALL {
        match workflow.next().await? {
            StepOutcome::Transition(StageTransition::Blocked { stage, reason }) => {
                bail!("stage {} blocked: {reason}", stage.number());
            }
            StepOutcome::Transition(_) => continue,
            StepOutcome::Generation(Applied::Success(_)) => {
                let path = workflow.download(None).await?;
                println!("{}", path.display());
                return Ok(0);
            }
            StepOutcome::Generation(Applied::Failure(failure)) => {
                eprintln!("Generation failed: {}", failure.message);
                return Ok(1);
            }
            StepOutcome::Generation(Applied::Discarded(attempt)) => {
                bail!("{attempt} was discarded");
            }
        }
    }
    bail!("wizard did not reach the generation step")
}

/// Submit from the settings stage; Ctrl-C abandons the request.
async fn run_generation(workflow: &mut DesignWorkflow) {
    let pending = match workflow.prepare_generation() {
        Ok(pending) => pending,
        Err(rejection) => {
            println!("{rejection}");
            return;
        }
    };
    println!("Generating design ({})... press Ctrl-C to cancel", pending.attempt());

    let run = pending.run();
    tokio::pin!(run);
    let completed = tokio::select! {
        completed = &mut run => completed,
        _ = tokio::signal::ctrl_c() => {
            workflow.abandon_generation();
            run.await
        }
    };

    match workflow.apply_generation(completed) {
        Applied::Success(_) => {
            if let Some(view) = workflow.result_view() {
                println!("Design ready: {}", display_url(&view.artifact_url));
                println!("{}", view.caption);
                println!("Use /open, /download [DIR], or /reset to try again.");
            }
        }
        Applied::Failure(failure) => {
            match failure.status {
                Some(status) => println!("Generation failed ({status}): {}", failure.message),
                None => println!("Generation failed: {}", failure.message),
            }
            println!("Adjust settings and /generate to retry.");
        }
        Applied::Discarded(attempt) => println!("Cancelled {attempt}."),
    }
}

fn apply_settings_update(workflow: &mut DesignWorkflow, intent: &Intent) {
    for (name, value) in &intent.settings_update {
        match workflow.update_named(name, value) {
            Ok(()) => {
                let settings = workflow.settings();
                let shown = match name.as_str() {
                    "prompt" => format!("prompt: {}", settings.prompt),
                    "style" => format!("style: {}", settings.style),
                    "roomType" => format!("room: {}", settings.room_type),
                    "inspirationWeight" => format!("weight: {}", settings.inspiration_weight),
                    "design" => format!("design: {}", settings.design),
                    "budget" => format!(
                        "budget: {} ({})",
                        settings.budget,
                        workflow.settings().budget_level(&workflow.config().budget_thresholds)
                    ),
                    other => other.to_string(),
                };
                println!("{shown}");
            }
            Err(err) => println!("{err}"),
        }
    }
}

fn report_transition(workflow: &DesignWorkflow, transition: &StageTransition) {
    match transition {
        StageTransition::Advanced { .. } | StageTransition::Retreated { .. } => {
            print_stage_hint(workflow)
        }
        StageTransition::Blocked { reason, .. } => println!("{reason}"),
        StageTransition::Unchanged => println!("Already at the first step."),
        StageTransition::Finish => {}
    }
}

fn print_stage_hint(workflow: &DesignWorkflow) {
    let hint = match workflow.stage() {
        WorkflowStage::Upload => "Step 1: upload a room photo with /image PATH, then /next.",
        WorkflowStage::Elements => {
            "Step 2: add reference images with /add PATH... (optional), then /next."
        }
        WorkflowStage::Settings => {
            "Step 3: type a prompt, tune /style /room /weight /design /budget, then /generate."
        }
    };
    println!("{}", workflow.ui().message(&format!("hint.{}", workflow.stage().as_str()), hint));
}

fn print_status(workflow: &DesignWorkflow) {
    let settings = workflow.settings();
    let inputs = workflow.inputs();
    println!("Stage: {}", workflow.stage());
    println!(
        "Room photo: {}",
        inputs
            .primary()
            .map(|image| image.upload.name().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("References: {}", inputs.auxiliary_names().join(", "));
    println!(
        "Prompt: {}",
        if settings.trimmed_prompt().is_empty() {
            "(empty)"
        } else {
            settings.trimmed_prompt()
        }
    );
    println!(
        "Style: {} • Room: {} • Weight: {} • Design: {}",
        settings.style, settings.room_type, settings.inspiration_weight, settings.design
    );
    println!(
        "Budget: {} ({})",
        settings.budget,
        settings.budget_level(&workflow.config().budget_thresholds)
    );
    if workflow.is_generating() {
        println!("Generation: in progress");
    } else if let Some(view) = workflow.result_view() {
        println!("Result: {}", display_url(&view.artifact_url));
    } else if let Some(failure) = workflow.result().failure() {
        println!("Last attempt failed: {}", failure.message);
    }
}

fn display_url(url: &str) -> String {
    if url.starts_with("data:") {
        return "(inline image, use /download to save it)".to_string();
    }
    url.to_string()
}

/// Opens artifact URLs with the platform's default handler.
struct SystemNavigator;

impl SystemNavigator {
    fn viewer_command(url: &str) -> ProcessCommand {
        let mut command = if cfg!(target_os = "macos") {
            ProcessCommand::new("open")
        } else if cfg!(target_os = "windows") {
            let mut command = ProcessCommand::new("cmd");
            command.args(["/C", "start", ""]);
            command
        } else {
            ProcessCommand::new("xdg-open")
        };
        command.arg(url);
        command
    }
}

impl Navigator for SystemNavigator {
    fn open(&self, url: &str) -> Result<()> {
        if url.starts_with("data:") {
            bail!("inline images cannot be opened directly; use /download");
        }
        spawn_reaped(Self::viewer_command(url))
            .with_context(|| format!("failed launching a viewer for {url}"))?;
        Ok(())
    }
}

/// Spawns `command` and waits on it from a background thread so the child
/// never lingers as a zombie.
fn spawn_reaped(mut command: ProcessCommand) -> Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = command.spawn()?;
    let reaper = thread::Builder::new()
        .name("viewer-reaper".to_string())
        .spawn(move || match child.wait() {
            Ok(status) => {
                if !status.success() {
                    warn!(%status, "viewer exited with an error");
                }
                Some(status)
            }
            Err(err) => {
                warn!(error = %err, "failed waiting on viewer");
                None
            }
        })?;
    Ok(reaper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_artifacts_are_not_handed_to_a_viewer() {
        let err = SystemNavigator.open("data:image/png;base64,AAAA");
        assert!(err.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn viewer_process_is_waited_on() -> anyhow::Result<()> {
        let reaper = spawn_reaped(ProcessCommand::new("true"))?;
        let status = reaper
            .join()
            .map_err(|_| anyhow::anyhow!("reaper thread panicked"))?;
        assert!(status.is_some_and(|status| status.success()));
        Ok(())
    }

    #[test]
    fn missing_viewer_reports_spawn_error() {
        let result = spawn_reaped(ProcessCommand::new("roomcraft-no-such-viewer"));
        assert!(result.is_err());
    }

    #[test]
    fn display_url_hides_inline_payloads() {
        assert_eq!(
            display_url("https://cdn.example.com/design.png"),
            "https://cdn.example.com/design.png"
        );
        assert!(display_url("data:image/png;base64,AAAA").starts_with("(inline image"));
    }
}
