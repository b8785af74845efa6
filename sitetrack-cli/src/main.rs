use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sitetrack_core::{
    Cascade, EmployeeId, MilestoneId, MilestoneOutcome, PhaseId, Role, SiteId, TaskId,
    milestone_overview,
};
use sitetrack_store::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod config;
mod state;

use config::{Config, init_config, load_config};
use state::Home;

#[derive(Parser, Debug)]
#[command(
    name = "sitetrack",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SITETRACK_BUILD_SHA"), ")"),
    about = "Construction site task approvals and milestone tracking"
)]
struct Cli {
    /// Directory holding config.toml and the default database
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect or create config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Manage sites
    Site {
        #[command(subcommand)]
        command: SiteCommand,
    },

    /// Manage phases of a site
    Phase {
        #[command(subcommand)]
        command: PhaseCommand,
    },

    /// Manage milestones of a site
    Milestone {
        #[command(subcommand)]
        command: MilestoneCommand,
    },

    /// Create tasks and move them through approval
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Manage employees
    Employee {
        #[command(subcommand)]
        command: EmployeeCommand,
    },

    /// Re-evaluate every open milestone of a site
    Evaluate { site: i64 },

    /// Milestone progress next to task completion, per milestone
    Overview {
        site: i64,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Chat entries of a phase
    Messages { phase: i64 },

    /// Stored notifications
    Notifications {
        /// Only those addressed to this employee
        #[arg(long)]
        employee: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config.toml if none exists
    Init,
    /// Print the effective configuration
    Show,
}

#[derive(Subcommand, Debug)]
enum SiteCommand {
    Add { name: String },
}

#[derive(Subcommand, Debug)]
enum PhaseCommand {
    Add {
        #[arg(long)]
        site: i64,
        #[arg(long)]
        name: String,
        /// Position within the site; the highest linked phase receives achievements
        #[arg(long)]
        order: i32,
        #[arg(long)]
        milestone: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum MilestoneCommand {
    Add {
        #[arg(long)]
        site: i64,
        #[arg(long)]
        name: String,
        /// YYYY-MM-DD
        #[arg(long)]
        planned_start: Option<NaiveDate>,
        /// YYYY-MM-DD
        #[arg(long)]
        planned_end: Option<NaiveDate>,
    },
    /// Mark a milestone delayed
    Delay {
        id: i64,
        #[arg(long)]
        reason: String,
    },
    /// Set the manually tracked progress percentage
    Progress {
        id: i64,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    Add {
        #[arg(long)]
        phase: i64,
        #[arg(long)]
        name: String,
    },
    Start {
        id: i64,
        #[arg(long)]
        actor: i64,
    },
    Submit {
        id: i64,
        #[arg(long)]
        actor: i64,
    },
    Approve {
        id: i64,
        #[arg(long)]
        actor: i64,
    },
    Reject {
        id: i64,
        #[arg(long)]
        actor: i64,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum EmployeeCommand {
    Add {
        #[arg(long)]
        name: String,
        /// admin, supervisor, worker, or any other label
        #[arg(long)]
        role: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let home = Home::resolve(cli.home)?;
    let cfg = load_config(&home)?;
    init_logging(&cfg);
    debug!(home = %home.dir().display(), "loaded configuration");

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init => {
                let p = home.config_path();
                if init_config(&home)? {
                    println!("Wrote {}", p.display());
                } else {
                    println!("Config already exists: {}", p.display());
                }
            }
            ConfigCommand::Show => {
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },

        Command::Site { command } => match command {
            SiteCommand::Add { name } => {
                let site = open_store(&home, &cfg)?.add_site(&name)?;
                println!("site {} {}", site.id, site.name);
            }
        },

        Command::Phase { command } => match command {
            PhaseCommand::Add {
                site,
                name,
                order,
                milestone,
            } => {
                let phase = open_store(&home, &cfg)?.add_phase(
                    SiteId(site),
                    &name,
                    order,
                    milestone.map(MilestoneId),
                )?;
                println!("phase {} {} (order {})", phase.id, phase.name, phase.order_num);
            }
        },

        Command::Milestone { command } => milestone_command(&home, &cfg, command)?,

        Command::Task { command } => task_command(&home, &cfg, command)?,

        Command::Employee { command } => match command {
            EmployeeCommand::Add { name, role } => {
                if role.trim().is_empty() {
                    bail!("role must not be empty");
                }
                let employee = open_store(&home, &cfg)?.add_employee(&name, &Role::parse(&role))?;
                println!("employee {} {} ({})", employee.id, employee.name, employee.role);
            }
        },

        Command::Evaluate { site } => {
            let cascade = open_cascade(&home, &cfg)?;
            let report = cascade.evaluator().evaluate(SiteId(site));
            if report.outcomes.is_empty() {
                println!("No open milestones for site {site}");
            }
            for (id, outcome) in &report.outcomes {
                println!("milestone {id}: {}", describe(outcome));
            }
        }

        Command::Overview { site, json } => {
            let store = open_store(&home, &cfg)?;
            let rows = milestone_overview(&store, SiteId(site))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for r in &rows {
                    let ratio = r
                        .task_progress
                        .map_or_else(|| "-".to_string(), |p| format!("{p}%"));
                    println!(
                        "{:>4}  {:<24} {:<12} progress={:>3}% tasks={}/{} ({}){}",
                        r.milestone_id,
                        r.name,
                        r.status,
                        r.stored_progress,
                        r.completed_tasks,
                        r.total_tasks,
                        ratio,
                        if r.diverges { "  !" } else { "" }
                    );
                }
            }
        }

        Command::Messages { phase } => {
            let store = open_store(&home, &cfg)?;
            if store.phase(PhaseId(phase))?.is_none() {
                bail!("phase {phase} not found");
            }
            for m in store.stage_messages(PhaseId(phase))? {
                println!(
                    "[{}] {} #{}: {}",
                    m.created_at.format("%Y-%m-%d %H:%M"),
                    m.kind,
                    m.sender_id,
                    m.content
                );
            }
        }

        Command::Notifications { employee } => {
            let store = open_store(&home, &cfg)?;
            for n in store.notifications(employee.map(EmployeeId))? {
                println!(
                    "{} -> employee {} [{}]{} {}",
                    n.created_at.format("%Y-%m-%d %H:%M"),
                    n.employee_id,
                    n.kind,
                    if n.is_read { "" } else { " *" },
                    n.message
                );
            }
        }
    }

    Ok(())
}

fn milestone_command(home: &Home, cfg: &Config, command: MilestoneCommand) -> Result<()> {
    let store = open_store(home, cfg)?;
    match command {
        MilestoneCommand::Add {
            site,
            name,
            planned_start,
            planned_end,
        } => {
            if let (Some(start), Some(end)) = (planned_start, planned_end) {
                if end < start {
                    bail!("planned end {end} is before planned start {start}");
                }
            }
            let m = store.add_milestone(SiteId(site), &name, planned_start, planned_end)?;
            println!("milestone {} {}", m.id, m.name);
        }
        MilestoneCommand::Delay { id, reason } => {
            if !store.delay_milestone(MilestoneId(id), &reason)? {
                bail!("milestone {id} is completed and cannot be delayed");
            }
            println!("milestone {id} delayed: {reason}");
        }
        MilestoneCommand::Progress { id, percent } => {
            store.set_milestone_progress(MilestoneId(id), percent)?;
            println!("milestone {id} progress {percent}%");
        }
    }
    Ok(())
}

fn task_command(home: &Home, cfg: &Config, command: TaskCommand) -> Result<()> {
    let cascade = open_cascade(home, cfg)?;
    let approvals = cascade.approvals();
    let task = match command {
        TaskCommand::Add { phase, name } => cascade.store().add_task(PhaseId(phase), &name)?,
        TaskCommand::Start { id, actor } => approvals.start(TaskId(id), EmployeeId(actor))?,
        TaskCommand::Submit { id, actor } => {
            approvals.submit_for_approval(TaskId(id), EmployeeId(actor))?
        }
        TaskCommand::Approve { id, actor } => approvals.approve(TaskId(id), EmployeeId(actor))?,
        TaskCommand::Reject { id, actor, reason } => {
            approvals.reject(TaskId(id), EmployeeId(actor), reason.as_deref())?
        }
    };
    println!("task {} {} [{}] {}%", task.id, task.name, task.status, task.progress);
    Ok(())
}

fn describe(outcome: &MilestoneOutcome) -> String {
    match outcome {
        MilestoneOutcome::NoLinkedPhases => "no linked phases".to_string(),
        MilestoneOutcome::Pending { incomplete } => format!("{incomplete} task(s) open"),
        MilestoneOutcome::Completed { last_phase, .. } => {
            format!("completed; achievement posted to phase {last_phase}")
        }
        MilestoneOutcome::AlreadyCompleted => "already completed".to_string(),
        MilestoneOutcome::Failed => "evaluation failed (see log)".to_string(),
    }
}

fn init_logging(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.log.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(home: &Home, cfg: &Config) -> Result<SqliteStore> {
    home.ensure()?;
    let path = home.resolve_path(&cfg.store.path);
    SqliteStore::open(&path).with_context(|| format!("open database {}", path.display()))
}

fn open_cascade(home: &Home, cfg: &Config) -> Result<Cascade<SqliteStore, SqliteStore>> {
    let store = Arc::new(open_store(home, cfg)?);
    Ok(Cascade::new(store.clone(), store, cfg.cascade_settings()?))
}
