use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::{
    app::App,
    dialog::{DialogResult, DialogSubmission, OpenOutcome},
    paths::AppPaths,
    reminder::{REMINDER_INTERVAL, SystemNotifier},
    settings::Settings,
    types::{Priority, Task, TaskDraft, TaskId, parse_due_date},
};

const SCHEMA_VERSION: &str = "cli.v1";
const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone, Subcommand)]
pub enum RootCommand {
    /// Show tasks in display order
    List(ListArgs),
    /// Add a task
    Add(AddArgs),
    /// Edit an existing task
    Edit(EditArgs),
    /// Flip a task between open and done
    Toggle(TaskIdArgs),
    /// Delete a task
    Delete(TaskIdArgs),
    /// Show or change display settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Send desktop notifications for tasks that are due soon
    Watch(WatchArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum SettingsCommand {
    Show,
    Set(SettingsSetArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ListArgs {
    /// Include completed tasks
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    #[arg(long, value_name = "TEXT")]
    pub title: String,

    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    #[arg(long, value_name = "low|medium|high", value_parser = parse_priority_arg)]
    pub priority: Option<Priority>,

    #[arg(long, value_name = "WHEN", value_parser = parse_due_arg)]
    pub due: Option<DateTime<Utc>>,

    #[arg(long)]
    pub reminder: bool,
}

#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: String,

    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    #[arg(long, value_name = "low|medium|high", value_parser = parse_priority_arg)]
    pub priority: Option<Priority>,

    #[arg(long, value_name = "WHEN", value_parser = parse_due_arg, conflicts_with = "clear_due")]
    pub due: Option<DateTime<Utc>>,

    #[arg(long)]
    pub clear_due: bool,

    #[arg(long, value_name = "true|false")]
    pub reminder: Option<bool>,
}

#[derive(Debug, Clone, Args)]
pub struct TaskIdArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: String,
}

#[derive(Debug, Clone, Args)]
pub struct SettingsSetArgs {
    #[arg(long, value_name = "#RRGGBB")]
    pub background_color: Option<String>,

    #[arg(long, value_name = "0..1")]
    pub opacity: Option<f64>,

    #[arg(long, value_name = "PX")]
    pub font_size: Option<u32>,
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    #[arg(long, value_name = "SECONDS", default_value_t = REMINDER_INTERVAL.as_secs())]
    pub interval_secs: u64,
}

fn parse_priority_arg(raw: &str) -> Result<Priority, String> {
    raw.parse()
        .map_err(|()| format!("unknown priority '{raw}' (expected low, medium or high)"))
}

fn parse_due_arg(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_due_date(raw).ok_or_else(|| {
        format!("invalid due date '{raw}' (expected RFC 3339 or YYYY-MM-DDTHH:MM)")
    })
}

pub async fn run(paths: AppPaths, command: RootCommand, json_output: bool, quiet: bool) -> i32 {
    let result = match command {
        RootCommand::Watch(args) => watch(paths, args, json_output || quiet).await,
        command => execute(paths, command),
    };

    match result {
        Ok(output) => {
            print_success(output, json_output, quiet);
            0
        }
        Err(err) => {
            print_error(&err, json_output);
            err.exit_code
        }
    }
}

#[derive(Debug)]
struct CommandOutput {
    command: &'static str,
    data: Value,
    text: String,
}

#[derive(Debug)]
struct CliError {
    exit_code: i32,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

type CliResult<T> = Result<T, CliError>;

fn execute(paths: AppPaths, command: RootCommand) -> CliResult<CommandOutput> {
    let mut app = App::open(paths);

    match command {
        RootCommand::List(args) => task_list(&app, args),
        RootCommand::Add(args) => task_add(&mut app, args),
        RootCommand::Edit(args) => task_edit(&mut app, args),
        RootCommand::Toggle(args) => task_toggle(&app, args),
        RootCommand::Delete(args) => task_delete(&app, args),
        RootCommand::Settings { command } => match command {
            SettingsCommand::Show => settings_show(&app),
            SettingsCommand::Set(args) => settings_set(&mut app, args),
        },
        RootCommand::Watch(_) => Err(usage_error(
            "WATCH_REQUIRES_RUNTIME",
            "watch must run through the async entry point",
        )),
    }
}

fn task_list(app: &App, args: ListArgs) -> CliResult<CommandOutput> {
    let now = Utc::now();
    let tasks = app
        .ordered_tasks()
        .map_err(runtime_error)?
        .into_iter()
        .filter(|task| args.all || !task.completed)
        .collect::<Vec<_>>();

    let data = json!({
        "tasks": tasks.iter().map(|task| task_json(task, now)).collect::<Vec<_>>()
    });

    Ok(CommandOutput {
        command: "list",
        data,
        text: render_task_list_text(&tasks, now),
    })
}

fn render_task_list_text(tasks: &[Task], now: DateTime<Utc>) -> String {
    if tasks.is_empty() {
        return "No tasks yet. Add one with `desktop-todo add --title ...`.".to_string();
    }

    let headers = ["ID", "Pri", "Done", "Title", "Due"];
    let rows = tasks
        .iter()
        .map(|task| {
            let due = match task.due_label(now) {
                Some(label) if task.is_overdue(now) => format!("{label} (!)"),
                Some(label) => label,
                None => "-".to_string(),
            };
            vec![
                short_id(&task.id),
                task.priority.as_str().to_string(),
                if task.completed { "x" } else { " " }.to_string(),
                task.title.replace('\n', " "),
                due,
            ]
        })
        .collect::<Vec<_>>();

    render_text_table(&headers, &rows)
}

fn task_add(app: &mut App, args: AddArgs) -> CliResult<CommandOutput> {
    let draft = TaskDraft {
        title: args.title,
        description: args.description,
        priority: args.priority.unwrap_or_default(),
        due_date: args.due,
        reminder: args.reminder,
    };

    if app.open_create_dialog() == OpenOutcome::Refocused {
        warn!("create dialog was already open");
    }
    let saved = app
        .submit_dialog(DialogSubmission::Save(draft))
        .map_err(|err| {
            app.cancel_dialog();
            usage_error("INVALID_TASK", format_anyhow_error_chain(&err))
        })?;
    ensure_saved(saved)?;

    let created = app
        .newest_task()
        .map_err(runtime_error)?
        .ok_or_else(|| runtime_error("created task disappeared after save"))?;

    Ok(CommandOutput {
        command: "add",
        data: json!({ "task": task_json(&created, Utc::now()) }),
        text: format!("added task {} ({})", created.title, created.id),
    })
}

fn task_edit(app: &mut App, args: EditArgs) -> CliResult<CommandOutput> {
    if args.title.is_none()
        && args.description.is_none()
        && args.priority.is_none()
        && args.due.is_none()
        && !args.clear_due
        && args.reminder.is_none()
    {
        return Err(usage_error(
            "EDIT_EMPTY",
            "provide at least one of --title, --description, --priority, --due, --clear-due, or --reminder",
        ));
    }

    let id = resolve_task_id(app, &args.id)?;
    app.open_edit_dialog(id.clone());
    let mut draft = app
        .dialog_prefill()
        .map_err(runtime_error)?
        .ok_or_else(|| not_found_error("TASK_NOT_FOUND", format!("task {id} not found")))?;

    if let Some(title) = args.title {
        draft.title = title;
    }
    if let Some(description) = args.description {
        draft.description = Some(description);
    }
    if let Some(priority) = args.priority {
        draft.priority = priority;
    }
    if let Some(due) = args.due {
        draft.due_date = Some(due);
    }
    if args.clear_due {
        draft.due_date = None;
    }
    if let Some(reminder) = args.reminder {
        draft.reminder = reminder;
    }

    let saved = app
        .submit_dialog(DialogSubmission::Save(draft))
        .map_err(|err| {
            app.cancel_dialog();
            usage_error("INVALID_TASK", format_anyhow_error_chain(&err))
        })?;
    ensure_saved(saved)?;

    let updated = find_task(app, &id)?;
    Ok(CommandOutput {
        command: "edit",
        data: json!({ "task": task_json(&updated, Utc::now()) }),
        text: format!("updated task {} ({})", updated.title, updated.id),
    })
}

fn task_toggle(app: &App, args: TaskIdArgs) -> CliResult<CommandOutput> {
    let id = resolve_task_id(app, &args.id)?;
    ensure_saved(app.toggle_completed(&id).map_err(runtime_error)?)?;

    let task = find_task(app, &id)?;
    let state = if task.completed { "done" } else { "open" };
    Ok(CommandOutput {
        command: "toggle",
        data: json!({ "task": task_json(&task, Utc::now()) }),
        text: format!("marked {} as {state}", task.title),
    })
}

fn task_delete(app: &App, args: TaskIdArgs) -> CliResult<CommandOutput> {
    let id = resolve_task_id(app, &args.id)?;
    let saved = app
        .apply_dialog_result(DialogResult::Delete(id.clone()))
        .map_err(runtime_error)?;
    ensure_saved(saved)?;

    Ok(CommandOutput {
        command: "delete",
        data: json!({ "deleted": true, "task_id": id }),
        text: format!("deleted task {id}"),
    })
}

fn settings_show(app: &App) -> CliResult<CommandOutput> {
    Ok(CommandOutput {
        command: "settings show",
        data: json!({ "settings": app.settings() }),
        text: render_settings_text(app.settings()),
    })
}

fn settings_set(app: &mut App, args: SettingsSetArgs) -> CliResult<CommandOutput> {
    if args.background_color.is_none() && args.opacity.is_none() && args.font_size.is_none() {
        return Err(usage_error(
            "SETTINGS_SET_EMPTY",
            "provide at least one of --background-color, --opacity, or --font-size",
        ));
    }

    let saved = app
        .update_settings(|settings| {
            if let Some(color) = args.background_color.as_deref() {
                settings.set_background_color(color)?;
            }
            if let Some(opacity) = args.opacity {
                settings.set_opacity(opacity);
            }
            if let Some(font_size) = args.font_size {
                settings.set_font_size(font_size);
            }
            Ok(())
        })
        .map_err(|err| usage_error("INVALID_SETTING", format_anyhow_error_chain(&err)))?;
    ensure_saved(saved)?;

    Ok(CommandOutput {
        command: "settings set",
        data: json!({ "settings": app.settings() }),
        text: render_settings_text(app.settings()),
    })
}

fn render_settings_text(settings: &Settings) -> String {
    [
        format!("backgroundColor: {}", settings.background_color),
        format!("opacity:         {}", settings.opacity),
        format!("fontSize:        {}", settings.font_size),
        format!("background:      {}", settings.background_rgba()),
    ]
    .join("\n")
}

async fn watch(paths: AppPaths, args: WatchArgs, silent: bool) -> CliResult<CommandOutput> {
    if args.interval_secs == 0 {
        return Err(usage_error("INVALID_INTERVAL", "--interval-secs must be positive"));
    }
    let interval = Duration::from_secs(args.interval_secs);

    let mut app = App::open(paths);
    app.start_reminders(Arc::new(SystemNotifier::default()), interval);
    info!(interval_secs = args.interval_secs, "watching for due tasks");
    if !silent {
        println!("Watching for due tasks every {}s. Press Ctrl-C to stop.", args.interval_secs);
    }

    // Other invocations edit todos.json directly, so re-read it between scans.
    let mut reload = tokio::time::interval(interval);
    reload.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let outcome = loop {
        tokio::select! {
            signal = &mut ctrl_c => break signal,
            _ = reload.tick() => {
                if let Err(err) = app.reload_tasks() {
                    warn!(error = %err, "failed to reload tasks");
                }
            }
        }
    };

    app.shutdown().await;
    outcome.map_err(runtime_error)?;

    Ok(CommandOutput {
        command: "watch",
        data: json!({ "stopped": true }),
        text: "stopped watching".to_string(),
    })
}

fn resolve_task_id(app: &App, raw: &str) -> CliResult<TaskId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(usage_error("TASK_ID_REQUIRED", "--id cannot be empty"));
    }

    let tasks = app.ordered_tasks().map_err(runtime_error)?;
    if let Some(task) = tasks.iter().find(|task| task.id.as_str() == raw) {
        return Ok(task.id.clone());
    }

    let matches = tasks
        .iter()
        .filter(|task| task.id.as_str().starts_with(raw))
        .map(|task| task.id.clone())
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [] => Err(not_found_error(
            "TASK_NOT_FOUND",
            format!("task {raw} not found"),
        )),
        [single] => Ok(single.clone()),
        _ => Err(conflict_error(
            "AMBIGUOUS_TASK_ID",
            format!("task id prefix '{raw}' matches {} tasks", matches.len()),
            Some(json!({ "candidates": matches })),
        )),
    }
}

fn find_task(app: &App, id: &TaskId) -> CliResult<Task> {
    app.task(id)
        .map_err(runtime_error)?
        .ok_or_else(|| not_found_error("TASK_NOT_FOUND", format!("task {id} not found")))
}

fn ensure_saved(saved: bool) -> CliResult<()> {
    if saved {
        Ok(())
    } else {
        Err(CliError {
            exit_code: 5,
            code: "SAVE_FAILED",
            message: "changes could not be written to disk; see the log for details".to_string(),
            details: None,
        })
    }
}

fn short_id(id: &TaskId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

fn task_json(task: &Task, now: DateTime<Utc>) -> Value {
    json!({
        "id": task.id,
        "title": task.title,
        "description": task.description,
        "priority": task.priority,
        "due_date": task.due_date,
        "due_label": task.due_label(now),
        "overdue": task.is_overdue(now),
        "reminder": task.reminder,
        "completed": task.completed,
        "created_at": task.created_at,
    })
}

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();

    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            widths[index] = widths[index].max(cell.chars().count());
        }
    }

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|width| "-".repeat(*width + 2))
            .collect::<Vec<_>>()
            .join("+")
    );
    let render_row = |cells: Vec<&str>| {
        format!(
            "| {} |",
            cells
                .iter()
                .enumerate()
                .map(|(index, cell)| format!("{cell:<width$}", width = widths[index]))
                .collect::<Vec<_>>()
                .join(" | ")
        )
    };

    let mut lines = vec![border.clone(), render_row(headers.to_vec()), border.clone()];
    for row in rows {
        lines.push(render_row(row.iter().map(String::as_str).collect()));
    }
    lines.push(border);
    lines.join("\n")
}

fn usage_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 2,
        code,
        message: message.into(),
        details: None,
    }
}

fn not_found_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 3,
        code,
        message: message.into(),
        details: None,
    }
}

fn conflict_error(
    code: &'static str,
    message: impl Into<String>,
    details: Option<Value>,
) -> CliError {
    CliError {
        exit_code: 4,
        code,
        message: message.into(),
        details,
    }
}

fn runtime_error(err: impl std::fmt::Display) -> CliError {
    CliError {
        exit_code: 5,
        code: "RUNTIME_ERROR",
        message: err.to_string(),
        details: None,
    }
}

fn format_anyhow_error_chain(err: &anyhow::Error) -> String {
    let mut seen = HashSet::new();
    err.chain()
        .map(|cause| cause.to_string())
        .filter(|text| seen.insert(text.clone()))
        .collect::<Vec<_>>()
        .join(": ")
}

fn print_success(output: CommandOutput, json_output: bool, quiet: bool) {
    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "command": output.command,
            "data": output.data
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => println!("{value}"),
            Err(_) => println!("{}", payload),
        }
        return;
    }

    if quiet {
        return;
    }

    if output.text.is_empty() {
        println!("ok");
    } else {
        println!("{}", output.text);
    }
}

fn print_error(err: &CliError, json_output: bool) {
    error!(
        code = err.code,
        message = %err.message,
        details = ?err.details,
        "cli command failed"
    );

    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "error": {
                "code": err.code,
                "message": err.message,
                "details": err.details
            }
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => eprintln!("{value}"),
            Err(_) => eprintln!("{}", payload),
        }
        return;
    }

    eprintln!("error[{}]: {}", err.code, err.message);
}
