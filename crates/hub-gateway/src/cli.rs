//! CLI (Command Line Interface) mode
//!
//! Interactive REPL over the orchestrator and the fast task service.

use hub_core::{AgentId, AgentSnapshot, AgentStatus, Submission, Task, TaskKind, TaskSpec, TaskStatus};
use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, Emacs, KeyCode, KeyModifiers, Keybindings,
    MenuBuilder, Prompt, Reedline, ReedlineEvent, ReedlineMenu, Signal, Suggestion,
};
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use tracing::info;

use crate::Hub;
use crate::error::{GatewayError, Result};

/// Available commands for autocomplete display
const COMMANDS: &[(&str, &str)] = &[
    ("/agents", "エージェント一覧を表示"),
    ("/start", "エージェントを起動 (引数なしで全体を起動)"),
    ("/stop", "エージェントを停止 (引数なしで全体を停止)"),
    ("/assign", "タスクを割り当て: /assign <agent> <type> <description>"),
    ("/tasks", "タスク一覧を表示"),
    ("/status", "オーケストレーターと高速サービスの状態"),
    ("/fast", "高速タスクを実行: /fast <type> [json]"),
    ("/help", "ヘルプを表示"),
    ("/exit", "プログラムを終了"),
];

/// Command completer for reedline
#[derive(Clone)]
pub struct CommandCompleter {
    commands: Vec<(&'static str, &'static str)>,
}

impl CommandCompleter {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.to_vec(),
        }
    }
}

impl Default for CommandCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        // 行頭が / で始まる場合のみ候補を表示
        if !line.starts_with('/') {
            return Vec::new();
        }

        self.commands
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(line))
            .map(|(cmd, desc)| Suggestion {
                value: cmd.to_string(),
                description: Some(desc.to_string()),
                extra: None,
                span: reedline::Span::new(0, pos),
                append_whitespace: true,
                style: None,
            })
            .collect()
    }
}

/// Custom prompt with colored styling
struct ColoredPrompt {
    style: Style,
}

impl ColoredPrompt {
    fn new() -> Self {
        Self {
            style: Color::Cyan.bold(),
        }
    }
}

impl Prompt for ColoredPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Owned(self.style.paint("hub> ").to_string())
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: reedline::PromptHistorySearch,
    ) -> Cow<'_, str> {
        Cow::Borrowed("")
    }
}

/// A parsed REPL command
#[derive(Debug, PartialEq)]
pub enum Command {
    Agents,
    /// `None` starts the orchestrator and every agent
    Start(Option<AgentId>),
    Stop(Option<AgentId>),
    Assign {
        agent: AgentId,
        kind: TaskKind,
        description: String,
    },
    Tasks,
    Status,
    Fast {
        kind: TaskKind,
        input: JsonValue,
    },
    Help,
    Exit,
}

impl Command {
    /// Parse one input line
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (name, rest) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (input, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "/agents" => Self::Agents,
            "/start" => Self::Start(optional_agent(rest)),
            "/stop" => Self::Stop(optional_agent(rest)),
            "/assign" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                let usage = || GatewayError::Usage("/assign <agent> <type> <description>".into());
                let agent = parts.next().filter(|s| !s.is_empty()).ok_or_else(usage)?;
                let kind = parts.next().ok_or_else(usage)?.parse()?;
                let description = parts.next().unwrap_or_default().trim().to_string();
                Self::Assign {
                    agent: AgentId::new(agent),
                    kind,
                    description,
                }
            }
            "/tasks" => Self::Tasks,
            "/status" => Self::Status,
            "/fast" => {
                let (kind, json) = match rest.split_once(char::is_whitespace) {
                    Some((kind, json)) => (kind, json.trim()),
                    None => (rest, ""),
                };
                if kind.is_empty() {
                    return Err(GatewayError::Usage("/fast <type> [json]".into()));
                }
                let input = if json.is_empty() {
                    JsonValue::Object(Default::default())
                } else {
                    serde_json::from_str(json)?
                };
                Self::Fast {
                    kind: kind.parse()?,
                    input,
                }
            }
            "/help" | "/?" => Self::Help,
            "/exit" | "/quit" | "/q" => Self::Exit,
            _ => {
                return Err(GatewayError::Usage(format!(
                    "不明なコマンド: {}。/help でコマンド一覧を確認してください",
                    input
                )));
            }
        };

        Ok(command)
    }
}

fn optional_agent(rest: &str) -> Option<AgentId> {
    rest.split_whitespace().next().map(AgentId::new)
}

/// Run CLI interactive mode
pub async fn run_cli(hub: &Hub) -> anyhow::Result<()> {
    info!("Starting CLI mode");

    // Welcome message
    print_welcome();

    // Setup keybindings
    let mut keybindings = default_keybindings();

    // Trigger completion on '/' key
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Char('/'),
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );

    let menu = Box::new(
        ColumnarMenu::default()
            .with_name("command_menu")
            .with_columns(1)
            .with_column_width(Some(60))
            .with_only_buffer_difference(false),
    );

    let hinter = DefaultHinter::default().with_style(Style::new().dimmed());

    let mut line_editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(menu))
        .with_hinter(Box::new(hinter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let prompt = ColoredPrompt::new();

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if !input.starts_with('/') {
                    eprintln!("\n❓ コマンドは / で始めてください。/help で一覧を確認できます。\n");
                    continue;
                }

                let command = match Command::parse(input) {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("\n{} {}\n", Color::Yellow.paint("⚠"), e);
                        continue;
                    }
                };
                if command == Command::Exit {
                    println!("\n👋 さようなら！\n");
                    break;
                }
                if let Err(e) = execute(hub, command).await {
                    eprintln!("\n{} {}\n", Color::Red.paint("❌ エラー:"), e);
                }
            }
            Ok(Signal::CtrlC) => {
                println!("^C");
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("\n👋 さようなら！\n");
                break;
            }
            Err(err) => {
                eprintln!("\n❌ エラー: {}\n", err);
                break;
            }
        }
    }

    Ok(())
}

/// Default keybindings for reedline
fn default_keybindings() -> Keybindings {
    let mut keybindings = Keybindings::new();
    // Tab key triggers completion
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Esc, ReedlineEvent::Esc);
    keybindings.add_binding(
        KeyModifiers::CONTROL,
        KeyCode::Char('c'),
        ReedlineEvent::CtrlC,
    );
    keybindings.add_binding(
        KeyModifiers::CONTROL,
        KeyCode::Char('d'),
        ReedlineEvent::CtrlD,
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings
}

async fn execute(hub: &Hub, command: Command) -> Result<()> {
    match command {
        Command::Agents => {
            print_agents(&hub.orchestrator.all_agents_status().await);
        }
        Command::Start(Some(id)) => {
            let agent = hub.orchestrator.start_agent(&id).await?;
            println!("\n✅ {} を起動しました ({})\n", agent.name, paint_status(agent.status));
        }
        Command::Start(None) => {
            hub.orchestrator.start().await;
            println!("\n✅ オーケストレーターと全エージェントを起動しました\n");
        }
        Command::Stop(Some(id)) => {
            let agent = hub.orchestrator.stop_agent(&id).await?;
            println!("\n⏹ {} を停止しました ({})\n", agent.name, paint_status(agent.status));
        }
        Command::Stop(None) => {
            hub.orchestrator.stop().await;
            println!("\n⏹ オーケストレーターと全エージェントを停止しました\n");
        }
        Command::Assign {
            agent,
            kind,
            description,
        } => {
            let task_id = hub
                .orchestrator
                .assign_task(&agent, TaskSpec::new(kind, description))
                .await?;
            match hub.orchestrator.get_task(task_id.as_str()).await {
                Some(task) => print_task(&task),
                None => println!("\n{}\n", task_id),
            }
        }
        Command::Tasks => {
            print_tasks(&hub.orchestrator.all_tasks().await);
        }
        Command::Status => {
            let status = hub.orchestrator.status().await;
            let fast = hub.fast.get_status();
            println!();
            println!("{}", Style::new().bold().paint("Orchestrator"));
            println!("  status:         {}", paint_status(status.status));
            println!("  agents:         {} ({} running)", status.agents_count, status.running_agents);
            println!("  tasks:          {}", status.tasks_count);
            println!("{}", Style::new().bold().paint("Fast service"));
            println!("  running:        {}", fast.is_running);
            println!("  active/queued:  {}/{}", fast.active_tasks, fast.queued_tasks);
            println!("  processed:      {}", fast.processed_count);
            println!("  cache entries:  {}", fast.cache_size);
            println!("  tasks/sec:      {:.2}", fast.tasks_per_second);
            println!();
        }
        Command::Fast { kind, input } => {
            let priority = Default::default();
            match hub.fast.add_task(kind, input, priority).await? {
                Submission::Cached { output } => {
                    println!("\n{} {}", Color::Purple.paint("⚡ cache hit"), kind);
                    println!("{}\n", pretty(&output));
                }
                Submission::Accepted { task_id } => {
                    let task = hub.fast.wait_for(&task_id).await?;
                    print_task(&task);
                }
            }
        }
        Command::Help => print_help(),
        Command::Exit => {}
    }

    Ok(())
}

fn paint_status(status: AgentStatus) -> String {
    let color = match status {
        AgentStatus::Running => Color::Green,
        AgentStatus::Idle => Color::Yellow,
        AgentStatus::Stopped => Color::DarkGray,
        AgentStatus::Error => Color::Red,
    };
    color.paint(status.as_str()).to_string()
}

fn paint_task_status(status: TaskStatus) -> String {
    let color = match status {
        TaskStatus::Completed => Color::Green,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Running => Color::Cyan,
        TaskStatus::Pending => Color::Yellow,
    };
    color.paint(status.as_str()).to_string()
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {}>", e))
}

fn print_agents(agents: &[AgentSnapshot]) {
    println!();
    println!("🤖 エージェント ({} 件):", agents.len());
    println!("{}", "─".repeat(60));
    for agent in agents {
        println!(
            "  {:<12} {:<22} {:<18} done={} failed={}",
            agent.id.as_str(),
            agent.name,
            paint_status(agent.status),
            agent.tasks.completed,
            agent.tasks.failed,
        );
    }
    println!("{}", "─".repeat(60));
    println!();
}

fn print_tasks(tasks: &[Task]) {
    println!();
    println!("📋 タスク ({} 件):", tasks.len());
    println!("{}", "─".repeat(60));
    for task in tasks {
        let agent = task.agent_id.as_ref().map(AgentId::as_str).unwrap_or("-");
        println!(
            "  {} {:<12} {:<16} {}",
            task.id,
            agent,
            task.kind.as_str(),
            paint_task_status(task.status),
        );
    }
    println!("{}", "─".repeat(60));
    println!();
}

fn print_task(task: &Task) {
    println!();
    println!("{} {} [{}]", task.id, task.kind, paint_task_status(task.status));
    if let Some(ms) = task.processing_time_ms {
        println!("  processing time: {} ms", ms);
    }
    if let Some(result) = &task.result {
        println!("{}", pretty(result));
    }
    if let Some(error) = &task.error {
        println!("  {}", Color::Red.paint(error.as_str()));
    }
    println!();
}

/// Print welcome message
fn print_welcome() {
    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║          🛰  hub-gateway CLI - 対話モード                   ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║  コマンド: /agents, /assign, /fast, /status, /help, /exit  ║");
    println!("║  / を入力するとコマンド候補が表示されます                   ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
}

/// Print help message
fn print_help() {
    println!();
    println!("📖 利用可能なコマンド:");
    for (cmd, desc) in COMMANDS {
        println!("  {} - {}", cmd, desc);
    }
    println!();
    println!("💡 タスク種別: {}", TaskKind::ALL.map(|k| k.as_str()).join(", "));
    println!();
}
