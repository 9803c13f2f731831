//! Interactive terminal client for the Jarvis assistant.
//!
//! This binary opens a chat session on the backend's websocket and streams
//! the assistant's replies, showing its reasoning dimmed.
//!
//! # Usage
//!
//! ```bash
//! # Continue the most recent general chat
//! jarvis-chat
//!
//! # Talk about a project or a task
//! jarvis-chat --project Apollo
//! jarvis-chat --task 12
//!
//! # Point at another backend, without colors or reasoning
//! jarvis-chat --api-url http://jarvis.local:8000/api/ --no-color --hide-thinking
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/sessions` - List sessions
//! - `/new [title]` - Start a new session
//! - `/switch <id>` - Switch to another session
//! - `/projects`, `/memories`, `/config` - Browse the backend
//! - `/transcribe <file>` - Dictate into the next prompt
//! - `/quit` - Exit the application

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use time::macros::format_description;
use tracing_subscriber::EnvFilter;

use jarvis::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatScope, Conversation, Draft, PlainTextRenderer,
    Renderer, StreamPrinter, help_text, parse_command, render_entry,
};
use jarvis::optimistic::{EventRemote, Events, MutationOutcome, TaskRemote, Tasks};
use jarvis::{
    ApiClient, BackendConfig, ConnectionEvent, ConnectionStatus, Memory, MemoryCreate,
    OptimisticList, PendingMutation, Project, ProjectCreate, Remote, SendOutcome, StoredFile,
    TaskCreate, TaskUpdate, WebSocketConnector,
};

/// How often waiting for a reply checks for Ctrl+C.
const INTERRUPT_POLL: Duration = Duration::from_millis(100);

/// Main entry point for the jarvis-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("jarvis-chat [OPTIONS]");
    let config = ChatConfig::try_from(args)?;
    let mut show_thinking = config.show_thinking;
    let parser = config.client.thought_parser()?;

    let api = Arc::new(ApiClient::new(&config.client)?);
    let connector = Arc::new(WebSocketConnector::from_config(&config.client)?);
    let mut conversation = Conversation::new(api.clone(), connector, config.scope.provisioner());
    let mut tasks = Tasks::new(TaskRemote::new(api.clone()));
    let mut events = Events::new(EventRemote::new(api.clone()));

    // Flag for interrupt handling while waiting on a reply
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut renderer =
        PlainTextRenderer::with_color(config.use_color).with_interrupt(interrupted.clone());
    let mut rl = DefaultEditor::new()?;

    // Set up Ctrl+C handler
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("Jarvis Chat ({})", api.base_url());
    println!("Type /help for commands, /quit to exit\n");

    if let ChatScope::Project(name) = &config.scope {
        match api.list_projects().await {
            Ok(projects) if !projects.iter().any(|p| &p.name == name) => renderer.print_info(
                &format!("No project named {name:?}; chatting in its sessions anyway."),
            ),
            Ok(_) => {}
            Err(err) => renderer.print_error(&format!("Could not load projects: {err}")),
        }
    }

    match conversation.enter(config.session).await {
        Ok(Some(id)) => {
            renderer.print_info(&format!("Session #{id}"));
            wait_for_connection(&mut conversation, &mut renderer, config.client.connect_timeout)
                .await;
            for entry in conversation.manager().messages() {
                render_entry(&mut renderer, &parser, entry, show_thinking);
            }
        }
        Ok(None) => renderer.print_info("No session yet. Use /new to start one."),
        Err(err) => renderer.print_error(&format!("Could not load sessions: {err}")),
    }

    let mut draft = Draft::new();
    let mut printer: Option<StreamPrinter> = None;
    let mut shown_status = conversation.manager().status();

    loop {
        // Catch up on whatever arrived while we were at the prompt
        if conversation.manager_mut().drain() > 0 {
            if let Some(printer) = printer.as_mut() {
                if let Some(entry) = conversation.manager().messages().last() {
                    printer.update(entry, &mut renderer);
                    printer.finish(&mut renderer);
                }
            }
        }
        let status = conversation.manager().status();
        if status != shown_status {
            renderer.print_status(status);
            shown_status = status;
        }

        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline_with_initial("You: ", (&draft.take(), ""));

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Sessions => match conversation.refresh_sessions().await {
                            Ok(()) => print_sessions(&conversation),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::New(title) => match conversation.new_session(title).await {
                            Ok(session) => {
                                printer = None;
                                renderer.print_info(&format!(
                                    "Started session #{}: {}",
                                    session.id, session.title
                                ));
                                wait_for_connection(
                                    &mut conversation,
                                    &mut renderer,
                                    config.client.connect_timeout,
                                )
                                .await;
                                shown_status = conversation.manager().status();
                            }
                            Err(err) => renderer
                                .print_error(&format!("Could not create a session: {err}")),
                        },
                        ChatCommand::Switch(id) => {
                            conversation.switch(id).await;
                            printer = None;
                            renderer.print_info(&format!("Switched to session #{id}"));
                            wait_for_connection(
                                &mut conversation,
                                &mut renderer,
                                config.client.connect_timeout,
                            )
                            .await;
                            shown_status = conversation.manager().status();
                            for entry in conversation.manager().messages() {
                                render_entry(&mut renderer, &parser, entry, show_thinking);
                            }
                        }
                        ChatCommand::Rename(id, title) => {
                            let outcome = conversation.rename(id, title.clone()).await;
                            report(&mut renderer, &outcome, &format!("Renamed #{id} to {title}"));
                        }
                        ChatCommand::Delete(id) => {
                            let bound = conversation.manager().session();
                            match conversation.delete(id).await {
                                Ok(outcome) => {
                                    report(&mut renderer, &outcome, &format!("Deleted session #{id}"))
                                }
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                            let current = conversation.manager().session();
                            if current != bound {
                                printer = None;
                                match current {
                                    Some(current) => {
                                        renderer.print_info(&format!("Now in session #{current}"));
                                        wait_for_connection(
                                            &mut conversation,
                                            &mut renderer,
                                            config.client.connect_timeout,
                                        )
                                        .await;
                                        for entry in conversation.manager().messages() {
                                            render_entry(&mut renderer, &parser, entry, show_thinking);
                                        }
                                    }
                                    None => renderer.print_info("No session. Use /new to start one."),
                                }
                                shown_status = conversation.manager().status();
                            }
                        }
                        ChatCommand::Reconnect => {
                            if conversation.manager_mut().reconnect().await {
                                printer = None;
                                wait_for_connection(
                                    &mut conversation,
                                    &mut renderer,
                                    config.client.connect_timeout,
                                )
                                .await;
                                shown_status = conversation.manager().status();
                            } else {
                                renderer.print_info("No session to reconnect.");
                            }
                        }
                        ChatCommand::History => {
                            for entry in conversation.manager().messages() {
                                render_entry(&mut renderer, &parser, entry, show_thinking);
                            }
                        }
                        ChatCommand::Tasks => match tasks.refresh().await {
                            Ok(()) => print_tasks(&tasks),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::TaskAdd(title) => {
                            let payload = TaskCreate {
                                title,
                                ..TaskCreate::default()
                            };
                            match tasks.create(&payload).await {
                                Ok(task) => renderer
                                    .print_info(&format!("Created task #{}: {}", task.id, task.title)),
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::TaskStatus(id, status) => {
                            let pending = tasks.begin_update(id, &TaskUpdate::status(status));
                            print_tasks(&tasks);
                            let outcome = settle(&mut tasks, pending).await;
                            report(&mut renderer, &outcome, &format!("Task #{id} is now {status}"));
                        }
                        ChatCommand::TaskRemove(id) => {
                            let pending = tasks.begin_delete(id);
                            print_tasks(&tasks);
                            let outcome = settle(&mut tasks, pending).await;
                            report(&mut renderer, &outcome, &format!("Deleted task #{id}"));
                        }
                        ChatCommand::TaskFiles(id) => match api.task_files(id).await {
                            Ok(files) => print_files(&format!("Task #{id} files"), &files),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Events => match events.refresh().await {
                            Ok(()) => print_events(&events),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::EventRemove(id) => {
                            let pending = events.begin_delete(id);
                            print_events(&events);
                            let outcome = settle(&mut events, pending).await;
                            report(&mut renderer, &outcome, &format!("Deleted event #{id}"));
                        }
                        ChatCommand::Projects => match api.list_projects().await {
                            Ok(projects) => print_projects(&projects),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::ProjectAdd(name) => {
                            match api.create_project(&ProjectCreate::new(name)).await {
                                Ok(project) => renderer.print_info(&format!(
                                    "Created project #{}: {}",
                                    project.id, project.name
                                )),
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::ProjectShow(id) => match api.get_project(id).await {
                            Ok(project) => {
                                print_projects(std::slice::from_ref(&project));
                                if let Some(description) = &project.description {
                                    println!("      {description}");
                                }
                                match api.project_files(id).await {
                                    Ok(files) => print_files("Files", &files),
                                    Err(err) => renderer.print_error(&err.to_string()),
                                }
                            }
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Memories => match api.list_memories().await {
                            Ok(memories) => print_memories(&memories),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::MemoryAdd { category, content } => {
                            match api.create_memory(&MemoryCreate::new(content, category)).await {
                                Ok(memory) => renderer.print_info(&format!(
                                    "Remembered #{} [{}]",
                                    memory.id, memory.category
                                )),
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::MemoryRemove(id) => match api.delete_memory(id).await {
                            Ok(()) => renderer.print_info(&format!("Forgot memory #{id}")),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::BackendConfig => match api.backend_config().await {
                            Ok(settings) => print_backend_config(&settings),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Transcribe(path) => {
                            renderer.print_info("Transcribing...");
                            match draft.apply_transcription(api.transcribe_file(&path).await) {
                                Ok(()) => renderer.print_info("Transcription added to the prompt."),
                                Err(err) => renderer
                                    .print_error(&format!("Transcription failed: {err}")),
                            }
                        }
                        ChatCommand::Thinking(show) => {
                            show_thinking = show;
                            if show {
                                renderer.print_info("Thinking output enabled.");
                            } else {
                                renderer.print_info("Thinking output hidden.");
                            }
                        }
                        ChatCommand::Status => print_status(&conversation, show_thinking),
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - send on the session
                match conversation.manager_mut().send_message(line) {
                    SendOutcome::Sent => {
                        let mut reply = StreamPrinter::new(parser.clone(), show_thinking);
                        println!("Jarvis:");
                        await_reply(
                            &mut conversation,
                            &mut renderer,
                            &mut reply,
                            config.client.reply_timeout,
                            config.client.turn_idle,
                        )
                        .await;
                        printer = Some(reply);
                    }
                    SendOutcome::Dropped(reason) => {
                        draft.append(line);
                        renderer.print_status(conversation.manager().status());
                        renderer.print_info(&format!("Not sent: {reason}. Try /reconnect."));
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    conversation.manager_mut().unbind();
    Ok(())
}

/// Waits until the bound session's connection opens or fails.
async fn wait_for_connection(
    conversation: &mut Conversation,
    renderer: &mut dyn Renderer,
    limit: Duration,
) {
    let manager = conversation.manager_mut();
    if manager.session().is_none() {
        return;
    }
    let started = Instant::now();
    while manager.status() == ConnectionStatus::Connecting && started.elapsed() < limit {
        match tokio::time::timeout(INTERRUPT_POLL, manager.next_event()).await {
            Ok(Some(ConnectionEvent::Closed {
                reason: Some(reason),
            })) => renderer.print_error(&reason),
            Ok(None) => break,
            _ => {}
        }
    }
    renderer.print_status(manager.status());
}

/// Prints the reply as it streams in.
///
/// There is no end-of-turn signal, so the reply counts as settled once no
/// fragment has arrived for `turn_idle`, or if nothing arrives within
/// `reply_timeout`.  Later fragments are shown before the next prompt.
async fn await_reply(
    conversation: &mut Conversation,
    renderer: &mut dyn Renderer,
    printer: &mut StreamPrinter,
    reply_timeout: Duration,
    turn_idle: Duration,
) {
    let mut last_activity = Instant::now();
    let mut replied = false;
    loop {
        if renderer.should_interrupt() {
            renderer.print_interrupted();
            break;
        }
        let limit = if replied { turn_idle } else { reply_timeout };
        if last_activity.elapsed() >= limit {
            if !replied {
                renderer.print_info("(no reply yet)");
            }
            break;
        }
        let manager = conversation.manager_mut();
        let event = match tokio::time::timeout(INTERRUPT_POLL, manager.next_event()).await {
            Ok(event) => event,
            Err(_) => continue,
        };
        match event {
            Some(ConnectionEvent::Fragment(_)) => {
                replied = true;
                last_activity = Instant::now();
                if let Some(entry) = manager.messages().last() {
                    printer.update(entry, renderer);
                }
            }
            Some(ConnectionEvent::Opened) => {}
            Some(ConnectionEvent::Closed { reason }) => {
                renderer.print_status(ConnectionStatus::Disconnected);
                if let Some(reason) = reason {
                    renderer.print_error(&reason);
                }
                break;
            }
            None => break,
        }
    }
    printer.finish(renderer);
}

/// Sends a mutation already shown locally and reconciles the list.
async fn settle<R: Remote>(
    list: &mut OptimisticList<R>,
    pending: PendingMutation<R>,
) -> MutationOutcome {
    let settlement = pending.send().await;
    list.settle(settlement).await
}

fn report(renderer: &mut dyn Renderer, outcome: &MutationOutcome, success: &str) {
    match outcome {
        MutationOutcome::Confirmed => renderer.print_info(success),
        MutationOutcome::Reverted { error } => {
            renderer.print_error(&format!("{error} (change undone)"))
        }
        MutationOutcome::Unsynced {
            error,
            resync_error,
        } => renderer.print_error(&format!(
            "{error}; reloading also failed ({resync_error}), the list may be stale"
        )),
    }
}

fn print_sessions(conversation: &Conversation) {
    let current = conversation.manager().session();
    if conversation.sessions().is_empty() {
        println!("    Sessions: (none)");
        return;
    }
    println!("    Sessions:");
    for session in conversation.sessions() {
        let marker = if Some(session.id) == current { "*" } else { " " };
        println!("    {marker} #{} {}", session.id, session.title);
    }
}

fn print_tasks(tasks: &Tasks) {
    if tasks.items().is_empty() {
        println!("    Tasks: (none)");
        return;
    }
    println!("    Tasks:");
    for task in tasks.items() {
        println!("      #{:<5} [{}] {}", task.id, task.status, task.title);
    }
}

fn print_events(events: &Events) {
    if events.items().is_empty() {
        println!("    Events: (none)");
        return;
    }
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    println!("    Events:");
    for event in events.items() {
        let start = event
            .start_time
            .format(format)
            .unwrap_or_else(|_| event.start_time.to_string());
        println!("      #{:<5} {start}  {}", event.id, event.title);
    }
}

fn print_projects(projects: &[Project]) {
    if projects.is_empty() {
        println!("    Projects: (none)");
        return;
    }
    println!("    Projects:");
    for project in projects {
        println!(
            "      #{:<5} {} ({}, {} files)",
            project.id, project.name, project.status, project.file_count
        );
    }
}

fn print_files(heading: &str, files: &[StoredFile]) {
    if files.is_empty() {
        println!("    {heading}: (none)");
        return;
    }
    println!("    {heading}:");
    for file in files {
        println!("      #{:<5} {} [{}]", file.id, file.filename, file.file_type);
        if let Some(summary) = &file.summary {
            println!("             {summary}");
        }
    }
}

fn print_memories(memories: &[Memory]) {
    if memories.is_empty() {
        println!("    Memories: (none)");
        return;
    }
    println!("    Memories:");
    for memory in memories {
        println!("      #{:<5} [{}] {}", memory.id, memory.category, memory.content);
    }
}

fn print_backend_config(settings: &BackendConfig) {
    println!("    Backend: {}{}", settings.app_name, if settings.debug { " (debug)" } else { "" });
    println!("      Model: {} at {}", settings.llm.model, settings.llm.base_url);
    println!("      Embeddings: {}", settings.llm.embedding_model);
    println!(
        "      Vector store: {} ({})",
        settings.vector_db.provider,
        if settings.vector_db.enabled { "enabled" } else { "disabled" }
    );
    println!("      Database: {}", settings.database.kind);
    println!("      Uploads: {}", settings.storage.upload_dir);
}

fn print_status(conversation: &Conversation, show_thinking: bool) {
    let manager = conversation.manager();
    println!("    Status:");
    match manager.session() {
        Some(id) => {
            let title = conversation
                .sessions()
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.title.as_str())
                .unwrap_or("(untitled)");
            println!("      Session: #{id} {title}");
        }
        None => println!("      Session: (none)"),
    }
    println!("      Connection: {}", manager.status());
    println!("      Messages: {}", manager.messages().len());
    println!(
        "      Thinking output: {}",
        if show_thinking { "shown" } else { "hidden" }
    );
}
