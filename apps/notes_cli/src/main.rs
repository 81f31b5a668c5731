use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    config::normalize_api_base_url, load_settings, load_settings_file, render_list, ListView,
    Notification, NotesClient, NotesOrchestrator, NotificationLevel, SyncOutcome,
};
use shared::domain::{NoteDraft, NoteId, NoteTag};
use tokio::{sync::broadcast, time::Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Browse, create and delete notes from the terminal")]
struct Args {
    /// Settings file to use instead of ./notes.toml; it must exist.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Notes API base URL; overrides notes.toml and the environment.
    #[arg(long)]
    server_url: Option<String>,
    /// Tag filter route slug, `All` for no filter.
    #[arg(long, default_value = "All")]
    tag: String,
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Id of a note to delete after listing.
    #[arg(long)]
    delete: Option<String>,
    #[arg(long)]
    create_title: Option<String>,
    #[arg(long, default_value = "")]
    create_content: String,
    #[arg(long, default_value = "Todo")]
    create_tag: NoteTag,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => load_settings_file(path)?,
        None => load_settings(),
    };
    if let Some(url) = &args.server_url {
        settings.api_base_url = normalize_api_base_url(url);
    }
    info!("cli: using notes api {}", settings.api_base_url);

    let client = NotesClient::new(settings).context("failed to build notes client")?;
    let mut notifications = client.subscribe_notifications();

    let tag = NoteTag::from_route_slug(&[args.tag.as_str()])?;
    let list = client.mount_list(tag, None).await;
    if !args.search.is_empty() {
        list.set_search_text(args.search.clone(), Instant::now()).await;
        list.flush_search().await;
    }
    list.set_page(args.page).await?;
    show(&list).await;

    let mut mutated = false;
    if let Some(id) = args.delete {
        mutated |= client.mutations().delete_note(&NoteId::new(id)).await.is_ok();
        drain_notifications(&mut notifications);
    }
    if let Some(title) = args.create_title {
        let draft = NoteDraft {
            title,
            content: args.create_content,
            tag: args.create_tag,
        };
        mutated |= client.mutations().create_note(draft).await.is_ok();
        drain_notifications(&mut notifications);
    }

    if mutated {
        println!();
        show(&list).await;
    }

    Ok(())
}

async fn show(list: &NotesOrchestrator) {
    if let SyncOutcome::Failed(err) = list.sync().await {
        warn!("cli: list request failed: {err}");
    }
    let snapshot = list.snapshot();
    println!("notes {}", snapshot.key);
    print_view(&render_list(&snapshot));
}

fn print_view(view: &ListView) {
    match view {
        ListView::Loading => println!("Loading..."),
        ListView::Error { message } => println!("Error: {message}"),
        ListView::Empty => println!("No notes found."),
        ListView::Notes {
            rows, pagination, ..
        } => {
            for row in rows {
                println!("- [{}] {} ({})", row.tag, row.title, row.detail_href);
                if !row.content.is_empty() {
                    println!("    {}", row.content);
                }
            }
            if let Some(pagination) = pagination {
                println!("page {} of {}", pagination.page, pagination.total_pages);
            }
        }
    }
}

fn drain_notifications(notifications: &mut broadcast::Receiver<Notification>) {
    while let Ok(notification) = notifications.try_recv() {
        match notification.level {
            NotificationLevel::Success => println!("{}", notification.message),
            NotificationLevel::Error => eprintln!("error: {}", notification.message),
        }
    }
}
