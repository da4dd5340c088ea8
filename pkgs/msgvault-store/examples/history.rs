use anyhow::Context;
use clap::{Parser, Subcommand};
use msgvault_store::{Jid, Message, MessageBody, MessageEvent, MessageStore, StoreConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database file
    #[arg(short, long, default_value = "msgvault.db")]
    db: PathBuf,

    /// Idle lifetime of chat list cache entries
    #[arg(long, default_value = "10m", value_parser = humantime::parse_duration)]
    summary_ttl: Duration,

    /// Remember at most this many message ids per session
    #[arg(long)]
    dedup_capacity: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a text message
    Ingest {
        /// Chat address, e.g. family@g.us
        #[arg(short, long)]
        chat: String,
        /// Sender address
        #[arg(short, long)]
        sender: String,
        #[arg(long)]
        id: String,
        /// Epoch seconds
        #[arg(long)]
        timestamp: i64,
        #[arg(long, default_value = "")]
        push_name: String,
        #[arg(long)]
        from_me: bool,
        /// Id of the message this one replies to
        #[arg(long)]
        reply_to: Option<String>,
        text: String,
    },
    /// Print a page of history, oldest first
    History {
        #[arg(short, long)]
        chat: String,
        /// Only messages older than this epoch second (0 = latest)
        #[arg(short, long, default_value = "0")]
        before: i64,
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Print one line per chat
    Chats,
    /// Print a single message by id
    Show { id: String },
}

fn print_message(store: &MessageStore, msg: &Message) {
    let text = msgvault_store::extract_message_text(&msg.content);
    let sender = msgvault_store::sender_label(&msg.info);
    println!(
        "[{}] {} <{}>: {}",
        msg.info.timestamp.format("%Y-%m-%d %H:%M:%S"),
        msg.info.id,
        sender,
        text
    );
    if let Some(quoted) = store.resolve_quoted(msg) {
        println!(
            "    > {}",
            msgvault_store::extract_message_text(&quoted.content)
        );
    }
}

fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args = Args::parse();

    let store = MessageStore::with_config(StoreConfig {
        db_path: args.db.clone(),
        summary_ttl_seconds: args.summary_ttl.as_secs(),
        dedup_capacity: args.dedup_capacity,
        ..Default::default()
    })
    .with_context(|| format!("Failed to open {}", args.db.display()))?;

    match args.command {
        Command::Ingest {
            chat,
            sender,
            id,
            timestamp,
            push_name,
            from_me,
            reply_to,
            text,
        } => {
            let body = match reply_to {
                Some(quoted) => MessageBody::reply(text, quoted),
                None => MessageBody::text(text),
            };
            let mut event = MessageEvent::new(
                Jid::parse(&chat)?,
                Jid::parse(&sender)?,
                id,
                timestamp,
                body,
            )
            .with_push_name(push_name);
            if from_me {
                event = event.from_me();
            }
            store.process_message_event(&event);
        }
        Command::History {
            chat,
            before,
            limit,
        } => {
            let chat = Jid::parse(&chat)?;
            for msg in store.get_messages_paged(&chat, before, limit) {
                print_message(&store, &msg);
            }
        }
        Command::Chats => {
            for summary in store.get_chat_list() {
                println!(
                    "{:<32} {:>12} {}: {}",
                    summary.jid.to_string(),
                    summary.message_time,
                    summary.sender,
                    summary.message_text
                );
            }
        }
        Command::Show { id } => match store.get_message_by_id(&id) {
            Some(msg) => print_message(&store, &msg),
            None => println!("No message with id {}", id),
        },
    }

    Ok(())
}
