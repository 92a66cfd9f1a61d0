mod config;
mod telemetry;
mod terminal;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use lesson_core::StepCompiler;
use lesson_core::model::LessonId;
use services::{Clock, LessonLoopService};
use storage::{LessonCatalog, Storage};
use tracing::info;

use crate::config::AppConfig;
use crate::terminal::{Command, HELP, TerminalHost, outline_line};

const DEFAULT_CONFIG: &str = "lessons.toml";

/// Work through interactive lessons in the terminal.
#[derive(Debug, Parser)]
#[command(name = "lessons", version)]
struct Cli {
    /// TOML config file (missing file means defaults).
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// JSON lesson table; the bundled sample lessons are used otherwise.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Lesson to open.
    #[arg(long)]
    lesson: Option<String>,

    /// List available lessons and exit.
    #[arg(long)]
    list: bool,

    /// Print the compiled steps of `--lesson` and exit.
    #[arg(long)]
    outline: bool,

    /// Seed for task introduction phrasing.
    #[arg(long)]
    seed: Option<u64>,
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    telemetry::init_tracing(config.log_level.as_deref());
    let settings = config.lesson_settings()?;

    let catalog = match cli.catalog.as_ref().or(config.catalog.as_ref()) {
        Some(path) => LessonCatalog::from_path(path)?,
        None => LessonCatalog::bundled()?,
    };
    info!(lessons = catalog.len(), "lesson catalog ready");
    let storage = Storage::with_lessons(Arc::new(catalog));

    let mut compiler = StepCompiler::new(settings);
    if let Some(seed) = cli.seed {
        compiler = compiler.with_phrasing_seed(seed);
    }
    let service =
        LessonLoopService::from_storage(Clock::default(), &storage).with_compiler(compiler);

    let lessons = service.list_lessons().await?;
    if cli.list || lessons.is_empty() {
        for lesson in &lessons {
            println!("{:<24} {} ({} tasks)", lesson.id.as_str(), lesson.title, lesson.task_count);
        }
        return Ok(());
    }

    let lesson_id = match cli.lesson {
        Some(raw) => raw.parse::<LessonId>()?,
        None => lessons[0].id.clone(),
    };

    if cli.outline {
        let steps = service.outline(&lesson_id).await?;
        for (index, step) in steps.iter().enumerate() {
            println!("{}", outline_line(index, step));
        }
        return Ok(());
    }

    let host = TerminalHost::new(io::stdout());
    let mut lesson_loop = service.start_session(&lesson_id, host).await?;
    lesson_loop.host_mut().say(HELP);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                lesson_loop.host_mut().say(&err.to_string());
                continue;
            }
        };
        let version = lesson_loop.session().version();
        match command {
            Command::Toggle(index) => {
                lesson_loop.toggle_selection(index);
            }
            Command::Submit => {
                lesson_loop.submit();
            }
            Command::Next => {
                lesson_loop.advance();
            }
            Command::Previous => {
                lesson_loop.retreat();
            }
            Command::Report { passed, score } => {
                lesson_loop.report_final_assessment(score, passed);
            }
            Command::Help => {
                lesson_loop.host_mut().say(HELP);
                continue;
            }
            Command::Quit => break,
        }
        if lesson_loop.session().version() == version {
            lesson_loop.host_mut().say("That doesn't apply right now.");
        } else if matches!(command, Command::Toggle(_)) {
            let picked: Vec<String> = lesson_loop
                .session()
                .selection()
                .iter()
                .map(|i| (i + 1).to_string())
                .collect();
            lesson_loop
                .host_mut()
                .say(&format!("selected: {}", picked.join(", ")));
        }
        if lesson_loop.is_complete() {
            break;
        }
    }

    lesson_loop.flush_rewards().await;
    let session_id = lesson_loop.session_id();
    if lesson_loop.is_complete() {
        let recorded = storage.rewards.rewards_for_session(session_id).await?;
        let xp: u32 = recorded.iter().map(|r| r.xp).sum();
        println!("{xp} XP recorded from {} correct answers.", recorded.len());
    } else {
        let _host = lesson_loop.exit();
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
