//! engage-cli — join a live session from the terminal and tail its state.
//!
//! Fetches the session detail, starts the connection manager, and prints
//! snapshot transitions and notices until the session ends or Ctrl-C. When
//! the current slide is a canvas slide, its drawing is fetched through the
//! slide viewer and summarized, mirroring what the learner view renders.

use std::sync::Arc;

use clap::Parser;
use uuid::Uuid;

use engage_client::canvas::view::Viewport;
use engage_client::canvas::viewer::{SlideDisplay, SlideViewer};
use engage_client::{
    ApiClient, ClientConfig, ClientError, ConnectionManager, Notice, SessionSnapshot, SlideKind,
};

#[derive(Parser, Debug)]
#[command(name = "engage-cli", about = "Live session client for the engage platform")]
struct Cli {
    #[arg(long, env = "ENGAGE_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    /// Display name for presence and heartbeats. A guest name is generated
    /// when omitted.
    #[arg(long, env = "ENGAGE_USERNAME")]
    username: Option<String>,

    #[arg(long, default_value = "")]
    invite_code: String,

    /// Session to join.
    session_id: String,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let username = cli
        .username
        .unwrap_or_else(|| format!("guest-{}", Uuid::new_v4()));

    let mut config = ClientConfig::from_env();
    config.base_url = cli.base_url;

    let api = Arc::new(ApiClient::new(&config)?);
    let detail = api.session_detail(&cli.session_id).await?;

    let viewer = SlideViewer::new(Arc::clone(&api), &config, Viewport::new(1280.0, 720.0));
    let mut handle = ConnectionManager::start(config, &detail, &cli.invite_code, &username)?;
    let mut snapshots = handle.subscribe();

    let mut shown_slide: Option<String> = None;
    print_snapshot(&snapshots.borrow().clone());

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print_snapshot(&snapshot);
                show_current_canvas(&viewer, &snapshot, &mut shown_slide).await;
            }
            notice = handle.notice() => match notice {
                Some(notice) => print_notice(notice),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("leaving session");
                break;
            }
        }
    }

    viewer.close().await;
    handle.stop().await;
    Ok(())
}

/// Fetch and summarize the drawing when the current slide is canvas-type and
/// has not been shown yet.
async fn show_current_canvas(
    viewer: &SlideViewer,
    snapshot: &SessionSnapshot,
    shown_slide: &mut Option<String>,
) {
    let Some(slide) = &snapshot.current_slide else {
        return;
    };
    if slide.kind != SlideKind::Canvas || shown_slide.as_deref() == Some(slide.id.as_str()) {
        return;
    }
    *shown_slide = Some(slide.id.clone());

    viewer.show_slide(slide).await;
    match viewer.display().await {
        SlideDisplay::Content(content) => {
            let camera = viewer.camera().await;
            println!(
                "canvas: {} elements on {} (zoom {:.2})",
                content.elements.len(),
                content.background_color,
                camera.zoom,
            );
        }
        SlideDisplay::NoContent => println!("canvas: no drawing yet"),
        SlideDisplay::Failed(message) => println!("canvas: {message}"),
        SlideDisplay::Empty | SlideDisplay::Loading => {}
    }
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let slide = snapshot
        .current_slide
        .as_ref()
        .map_or_else(|| "-".to_owned(), |slide| slide.id.clone());
    println!(
        "status={:?} connection={:?} slide_index={} slide={} slides={}{}",
        snapshot.status,
        snapshot.connection,
        snapshot.current_slide_index,
        slide,
        snapshot.slides.len(),
        snapshot
            .last_error
            .as_deref()
            .map(|error| format!(" error={error}"))
            .unwrap_or_default(),
    );
}

fn print_notice(notice: Notice) {
    match notice {
        Notice::Connected => println!("* connected"),
        Notice::SessionStarted => println!("* session started"),
        Notice::SessionEnded => println!("* session ended"),
    }
}
