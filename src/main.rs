// Aula - assistant reply pipeline
// Main entry point

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use aula::config::{load_config, Config, LoggingConfig};
use aula::conversation::{Change, Conversation, MessageAccumulator, TurnOutcome};
use aula::directive::{classify, ContentClassification, DirectiveKind};
use aula::draft::{DraftInteractionController, HttpDispatcher, SubmitContext};
use aula::logging;
use aula::render::{self, terminal, DirectiveView};
use aula::stream::HttpTransport;

const GRAY: &str = "\x1b[90m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[derive(Parser)]
#[command(name = "aula")]
#[command(about = "Stream assistant replies and act on their drafts")]
#[command(version)]
struct Args {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a message and stream the reply
    Chat {
        /// Conversation session id
        #[arg(short, long)]
        session: String,

        /// Case the conversation belongs to
        #[arg(long)]
        case: Option<String>,

        /// Conversation title
        #[arg(long)]
        title: Option<String>,

        /// Message text
        message: String,
    },

    /// Classify a reply text from a file or stdin
    Classify {
        /// File to read; stdin when omitted
        file: Option<PathBuf>,

        /// Render the view instead of printing the classification as JSON
        #[arg(short, long)]
        render: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Chat {
            session,
            case,
            title,
            message,
        } => {
            let config = load_config()?;
            logging::init(&config.logging, args.verbose);
            cmd_chat(&config, session, case, title, &message).await
        }
        Command::Classify { file, render: as_view } => {
            logging::init(&LoggingConfig::default(), args.verbose);
            cmd_classify(file, as_view)
        }
    }
}

async fn cmd_chat(
    config: &Config,
    session: String,
    case: Option<String>,
    title: Option<String>,
    message: &str,
) -> Result<()> {
    let transport = HttpTransport::new(&config.backend).context("failed to build HTTP client")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || on_interrupt.cancel())
        .context("failed to install Ctrl-C handler")?;

    let mut conversation = Conversation::new(session);
    if let Some(case) = case {
        conversation = conversation.with_case(case);
    }
    if let Some(title) = title {
        conversation = conversation.with_title(title);
    }

    let mut preparing_shown = false;
    let outcome = conversation
        .send(
            &transport,
            message,
            &cancel,
            &config.stream,
            |acc: &MessageAccumulator, change| match change {
                Change::Status => {
                    if let Some(status) = acc.status() {
                        eprintln!("{}{}{}", GRAY, status, RESET);
                    }
                }
                Change::Content => {
                    if !preparing_shown
                        && matches!(
                            acc.classification(),
                            ContentClassification::StreamingDirective { .. }
                        )
                    {
                        preparing_shown = true;
                        eprintln!("{}preparing…{}", GRAY, RESET);
                    }
                }
                Change::Suggestions => debug!("{} suggestions", acc.suggestions().len()),
            },
        )
        .await;

    let Some(reply) = conversation.last_assistant() else {
        return Ok(());
    };
    let reply_id = reply.id;
    let suggestions = reply.suggestions.clone();

    if let Some(view) = conversation.view(reply_id) {
        print!("{}", terminal::render(&view));

        if let (TurnOutcome::Completed, DirectiveView::Draft { controller, .. }) = (&outcome, &view)
        {
            let context = SubmitContext {
                sender: config.identity.sender.clone(),
                session_id: conversation.session_id().to_string(),
                message_id: reply_id,
            };
            handle_draft(config, controller, &context).await?;
            if let Some(view) = conversation.view(reply_id) {
                print!("{}", terminal::render(&view));
            }
        }
    }

    for suggestion in &suggestions {
        println!("{}› {}{}", GRAY, suggestion, RESET);
    }

    match outcome {
        TurnOutcome::Completed => Ok(()),
        TurnOutcome::Cancelled => {
            eprintln!("{}cancelled{}", GRAY, RESET);
            Ok(())
        }
        TurnOutcome::Failed(e) => Err(e).context("reply stream failed"),
    }
}

/// Ask whether to deliver a pending draft, retrying after failures until the
/// user declines
async fn handle_draft(
    config: &Config,
    controller: &DraftInteractionController,
    context: &SubmitContext,
) -> Result<()> {
    let question = match controller.kind() {
        DirectiveKind::CalendarDraft => "Create this event?",
        _ => "Send this email?",
    };
    let dispatcher = HttpDispatcher::new(config)?;

    while !controller.state().is_terminal() {
        if !confirm(question).await? {
            controller.cancel()?;
            break;
        }
        if let Err(e) = controller.submit(&dispatcher, context).await {
            eprintln!("{}{}{}", RED, e, RESET);
        }
    }
    Ok(())
}

async fn confirm(question: &'static str) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        eprint!("{} [y/N] ", question);
        std::io::stderr().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        Ok::<_, std::io::Error>(matches!(
            answer.trim().to_lowercase().as_str(),
            "y" | "yes" | "s" | "si" | "sí"
        ))
    })
    .await
    .context("prompt task failed")?
    .context("failed to read answer")
}

fn cmd_classify(file: Option<PathBuf>, as_view: bool) -> Result<()> {
    let text = match &file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            text
        }
    };

    let classification = classify(&text);
    if as_view {
        let registry = aula::draft::DraftRegistry::new();
        let view = render::resolve_classified(
            aula::conversation::MessageId::new(),
            &text,
            &classification,
            &registry,
        );
        print!("{}", terminal::render(&view));
    } else {
        println!("{}", serde_json::to_string_pretty(&classification)?);
    }
    Ok(())
}
