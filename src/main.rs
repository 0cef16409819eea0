use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

use checklist::config::Config;
use checklist::model::{parse_task_id, CompletionState};
use checklist::orchestrator::parse_group;
use checklist::{log, GroupType, Progress, Task, TaskId, TaskOrchestrator};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// YAML configuration file; the environment is used when absent
    #[arg(long, global = true, env = "CHECKLIST_CONFIG")]
    config: Option<PathBuf>,

    /// Output JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the tasks of a group
    ///
    /// Example: checklist list daily
    List { group: String },
    /// Flip the completion of a task
    ///
    /// Example: checklist toggle weekly 3
    Toggle { group: String, id: TaskId },
    /// Show the completion flag of every task of a group
    Completion { group: String },
    /// Show how many tasks of a group are done
    Progress { group: String },
}

fn print_tasks(tasks: &[Task], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(tasks)?);
        return Ok(());
    }
    for task in tasks {
        let mark = if task.completed { "x" } else { " " };
        let extra = match (task.details.category(), task.details.priority()) {
            (Some(category), Some(priority)) => format!(" ({}, {})", category, priority.as_str()),
            (Some(category), None) => format!(" ({})", category),
            _ => String::new(),
        };
        println!("[{}] {:>2} {}{}", mark, task.id, task.title, extra);
    }
    Ok(())
}

fn print_completion(state: &CompletionState, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(state)?);
        return Ok(());
    }
    for (id, completed) in state.iter() {
        println!("{:>2} {}", id, completed);
    }
    Ok(())
}

fn print_progress(group: GroupType, progress: Progress, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(&progress)?);
    } else {
        println!("{}: {}/{}", group, progress.completed, progress.total);
    }
    Ok(())
}

/// A command with its arguments checked, before any provider is involved.
enum Request {
    List(GroupType),
    Toggle(GroupType, TaskId),
    Completion(GroupType),
    Progress(GroupType),
}

impl Command {
    fn request(&self) -> anyhow::Result<Request> {
        Ok(match self {
            Command::List { group } => Request::List(parse_group(group)?),
            Command::Toggle { group, id } => {
                Request::Toggle(parse_group(group)?, parse_task_id(i64::from(*id))?)
            }
            Command::Completion { group } => Request::Completion(parse_group(group)?),
            Command::Progress { group } => Request::Progress(parse_group(group)?),
        })
    }
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let request = cli.command.request()?;
    let orchestrator = TaskOrchestrator::from_config(&config).await?;
    let json = cli.json;
    orchestrator.register_task_completed_observer(move |event| {
        if !json {
            println!("completed {} task {}", event.group, event.task_id);
        }
    });
    orchestrator.register_all_tasks_completed_observer(move |event| {
        if !json {
            println!("all {} tasks completed", event.group);
        }
    });

    match request {
        Request::List(group) => {
            let tasks = orchestrator.load_tasks(group).await?;
            print_tasks(&tasks, json)
        }
        Request::Toggle(group, id) => {
            let tasks = orchestrator.toggle_task(group, id).await?;
            print_tasks(&tasks, json)
        }
        Request::Completion(group) => {
            let state = orchestrator.load_completion_state(group).await?;
            print_completion(&state, json)
        }
        Request::Progress(group) => {
            let progress = orchestrator.progress(group).await?;
            print_progress(group, progress, json)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::from_env()?,
    };
    let env_filter = EnvFilter::try_from_env("CHECKLIST_LOG").ok();
    log::setup(env_filter, config.log.as_ref())?;

    event!(
        Level::DEBUG,
        "Starting checklist {} with the {} provider",
        env!("CARGO_PKG_VERSION"),
        config.provider.name()
    );

    run(cli, config).await
}
