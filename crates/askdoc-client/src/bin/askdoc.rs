//! Askdoc interactive console.
//!
//! Minimal conversational front-end over the client crates: ask questions,
//! manage sessions, upload documents, watch ingestion progress. Rendering is
//! deliberately plain; all the interesting behavior lives in the libraries.
//!
//! Usage:
//!   askdoc                          # connect to ASKDOC_BASE_URL (or localhost:8000)
//!   ASKDOC_TOP_K=8 askdoc
//!
//! Commands: :new :sessions :switch N :delete N :rename TITLE :docs
//!           :upload PATH :rm NAME :mode fast|deep :cancel :help :quit

use std::io::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use askdoc_client::{
    ApiClient, ClientConfig, DocumentIndex, HealthMonitor, IngestController, IngestEvent,
    QueryController, QueryEvent,
};
use askdoc_core::models::{QueryMode, Role};
use askdoc_core::pipeline::{step_status, PipelineStep, StepStatus};
use askdoc_store::{FileStorage, SessionStore};

struct App {
    store: Arc<SessionStore>,
    query: Arc<QueryController>,
    ingest: Arc<IngestController>,
    documents: Arc<DocumentIndex>,
    health: Arc<HealthMonitor>,
    mode: QueryMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let data_dir =
        std::env::var("ASKDOC_DATA_DIR").unwrap_or_else(|_| ".askdoc".to_string());

    let api = Arc::new(ApiClient::new(ClientConfig::from_env())?);
    let store = Arc::new(
        SessionStore::open(FileStorage::new(&data_dir)?)
            .context("failed to open session store")?,
    );
    let documents = Arc::new(DocumentIndex::new(Arc::clone(&api)));
    let query = Arc::new(QueryController::new(Arc::clone(&api), Arc::clone(&store)));
    let ingest = Arc::new(IngestController::new(
        Arc::clone(&api),
        Arc::clone(&documents),
    ));
    let health = Arc::new(HealthMonitor::new(Arc::clone(&api)));
    health.start();

    let mut app = App {
        store,
        query,
        ingest,
        documents,
        health,
        mode: QueryMode::Deep,
    };

    println!("askdoc console (:help for commands)");

    // Stdin runs on its own task so :cancel works while an answer streams
    let (line_tx, mut line_rx) = mpsc::channel::<String>(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    loop {
        prompt(&app);
        let Some(line) = line_rx.recv().await else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == ":quit" || line == ":q" {
            break;
        }
        if let Err(e) = dispatch(&mut app, &line, &mut line_rx).await {
            println!("error: {:#}", e);
        }
    }

    app.health.stop();
    Ok(())
}

fn prompt(app: &App) {
    let online = if app.health.is_online() { "●" } else { "○" };
    print!("{} [{}] > ", online, app.mode);
    let _ = std::io::stdout().flush();
}

async fn dispatch(app: &mut App, line: &str, line_rx: &mut mpsc::Receiver<String>) -> Result<()> {
    let (command, rest) = match line.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    match command {
        ":help" => print_help(),
        ":new" => {
            app.store.create_session()?;
            println!("started a new chat");
        }
        ":sessions" => list_sessions(app),
        ":switch" => {
            let session = nth_session(app, rest)?;
            app.store.set_current(session)?;
        }
        ":delete" => {
            let session = nth_session(app, rest)?;
            app.store.delete_session(session)?;
            println!("deleted");
        }
        ":rename" => {
            app.store.rename(app.store.current_id(), rest)?;
        }
        ":docs" => {
            let names = app.documents.refresh().await?;
            if names.is_empty() {
                println!("no documents ingested yet");
            }
            for name in names {
                println!("  {}", name);
            }
        }
        ":upload" => upload(app, rest).await?,
        ":rm" => {
            app.documents.delete(rest).await?;
            println!("removed {}", rest);
        }
        ":mode" => {
            app.mode = match rest {
                "fast" => QueryMode::Fast,
                "deep" => QueryMode::Deep,
                other => anyhow::bail!("unknown mode {:?} (fast|deep)", other),
            };
        }
        ":cancel" => app.query.cancel(),
        _ if command.starts_with(':') => anyhow::bail!("unknown command {} (:help)", command),
        _ => ask(app, line, line_rx).await?,
    }
    Ok(())
}

fn print_help() {
    println!(
        "  :new              start a new chat\n\
         \x20 :sessions         list chats\n\
         \x20 :switch N         switch to chat N\n\
         \x20 :delete N         delete chat N\n\
         \x20 :rename TITLE     rename the current chat\n\
         \x20 :docs             list ingested documents\n\
         \x20 :upload PATH      upload and ingest a document\n\
         \x20 :rm NAME          delete a document\n\
         \x20 :mode fast|deep   switch answer mode\n\
         \x20 :cancel           stop the in-flight answer\n\
         \x20 :quit             exit"
    );
}

fn list_sessions(app: &App) {
    let current = app.store.current_id();
    for (i, session) in app.store.sessions().iter().enumerate() {
        let marker = if session.id == current { "*" } else { " " };
        println!(
            "{} {:2}  {}  ({} messages, {})",
            marker,
            i + 1,
            session.title,
            session.messages.len(),
            session.created_date
        );
    }
}

fn nth_session(app: &App, arg: &str) -> Result<uuid::Uuid> {
    let index: usize = arg.parse().context("expected a session number")?;
    app.store
        .sessions()
        .get(index.saturating_sub(1))
        .map(|s| s.id)
        .context("no such session")
}

async fn ask(app: &App, question: &str, line_rx: &mut mpsc::Receiver<String>) -> Result<()> {
    let mut status_rx = app.query.subscribe_status();
    let mut events_rx = app.query.subscribe();
    app.query.submit(question, app.mode)?;

    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_ok() {
                    let label = status_rx.borrow().clone();
                    if let Some(label) = label {
                        println!("  .. {}", label);
                    }
                }
            }
            event = events_rx.recv() => match event {
                Ok(QueryEvent::Completed { session_id }) => {
                    print_answer(app, session_id);
                    break;
                }
                Ok(QueryEvent::Failed { error, .. }) => {
                    println!("  !! {}", error);
                    break;
                }
                Ok(QueryEvent::Cancelled { .. }) => {
                    println!("  (stopped)");
                    break;
                }
                Ok(QueryEvent::Started { .. }) => {}
                Err(_) => break,
            },
            line = line_rx.recv() => {
                match line.as_deref().map(str::trim) {
                    Some(":cancel") => app.query.cancel(),
                    Some("") | None => {}
                    Some(other) => println!("  (busy; {} ignored, :cancel to stop)", other),
                }
            }
        }
    }
    Ok(())
}

fn print_answer(app: &App, session_id: uuid::Uuid) {
    let Some(session) = app.store.session(session_id) else {
        return;
    };
    let Some(message) = session
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
    else {
        return;
    };

    println!("\n{}\n", message.content);
    if let Some(thoughts) = &message.thoughts {
        println!("  thoughts: {}", thoughts);
    }
    if let Some(sources) = &message.sources {
        for source in sources {
            println!("  source: {}", source);
        }
    }
    if let Some(latency) = message.latency_seconds {
        println!("  ({:.1}s)", latency);
    }
}

fn print_pipeline(current: PipelineStep) {
    if current.is_terminal() || current == PipelineStep::Idle {
        // Collapsed summary row for idle/complete/error
        println!("  {}", current);
        return;
    }
    let row: Vec<String> = PipelineStep::visible_steps()
        .iter()
        .map(|step| {
            let mark = match step_status(*step, current) {
                StepStatus::Done => "x",
                StepStatus::Active => ">",
                StepStatus::Pending => ".",
            };
            format!("[{}] {}", mark, step)
        })
        .collect();
    println!("  {}", row.join(" "));
}

async fn upload(app: &App, path: &str) -> Result<()> {
    let content = std::fs::read(path).with_context(|| format!("cannot read {}", path))?;
    let file_name = std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .context("path has no file name")?
        .to_string();

    let mut events_rx = app.ingest.subscribe();
    app.ingest.submit(&file_name, content)?;

    while let Ok(event) = events_rx.recv().await {
        match event {
            IngestEvent::Started { .. } => {}
            IngestEvent::StepReached { step, .. } => print_pipeline(step),
            IngestEvent::Completed { file_name } => {
                println!("  ingested {}", file_name);
                break;
            }
            IngestEvent::Failed { error, .. } => {
                println!("  !! {}", error);
                break;
            }
            IngestEvent::Cancelled { .. } => {
                println!("  (stopped)");
                break;
            }
        }
    }
    Ok(())
}
