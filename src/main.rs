use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;

use postcal::attachments::ImageFile;
use postcal::blob::FsBlobStore;
use postcal::config::{AppPaths, Settings};
use postcal::errors::Result;
use postcal::export::write_snapshot;
use postcal::logging;
use postcal::mirror::LocalMirror;
use postcal::session::{NoticeLevel, Session};
use postcal::storage::models::{Client, ClientDraft, DEFAULT_THEME_COLOR, Post, PostDraft};
use postcal::storage::sqlite::SqliteStore;

type AppSession = Session<SqliteStore, FsBlobStore>;

#[derive(Parser)]
#[command(name = "postcal", version, about = "Social-media posting calendars per client")]
struct Cli {
    /// Output results as JSON
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Data directory (defaults to ~/.postcal)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Client password, checked when opening a client's calendar
    #[arg(short, long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage clients
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },

    /// Manage a client's scheduled posts
    Post {
        #[command(subcommand)]
        action: PostAction,
    },

    /// Attach or detach post images
    Image {
        #[command(subcommand)]
        action: ImageAction,
    },

    /// Render a client's agenda as printable HTML
    Export {
        /// Client ID
        client_id: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show dashboard figures
    Stats,

    /// Print a client's share link
    Share {
        /// Client ID
        client_id: String,
    },

    /// Show or change settings
    Config {
        #[arg(long)]
        company_name: Option<String>,

        #[arg(long)]
        public_base_url: Option<String>,

        #[arg(long)]
        share_base_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum ClientAction {
    /// List clients
    List,

    /// Create a client
    Add {
        name: String,

        /// Theme color as hex
        #[arg(short, long, default_value = DEFAULT_THEME_COLOR)]
        color: String,

        /// Password required to open the calendar
        #[arg(long, default_value = "")]
        secret: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Create the client as inactive
        #[arg(long)]
        inactive: bool,
    },

    /// Change a client's settings
    Edit {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        color: Option<String>,

        #[arg(long)]
        secret: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete a client and all its posts
    Delete { id: String },

    /// Show a client with its posts
    Show { id: String },
}

#[derive(Args)]
struct NewPostArgs {
    /// Calendar date, e.g. 2025-04-07
    #[arg(long)]
    date: String,

    #[arg(long, default_value = "")]
    title: String,

    #[arg(long, default_value = "")]
    text: String,

    /// Day label shown on the date badge
    #[arg(long, default_value = "")]
    day: String,

    #[arg(long, default_value = "")]
    day_of_week: String,

    /// Content type tag
    #[arg(long = "type", default_value = "")]
    content_type: String,

    /// Post type tag, e.g. Reels or Carrossel
    #[arg(long, default_value = "")]
    post_type: String,

    /// Target social network (repeatable)
    #[arg(short, long = "network")]
    networks: Vec<String>,

    #[arg(long)]
    month: Option<i32>,

    #[arg(long)]
    year: Option<i32>,

    #[arg(long)]
    time: Option<String>,
}

#[derive(Subcommand)]
enum PostAction {
    /// List a client's posts
    List { client_id: String },

    /// Schedule a post
    Add {
        client_id: String,

        #[command(flatten)]
        post: NewPostArgs,
    },

    /// Edit a post's title or text
    Edit {
        client_id: String,
        post_id: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        text: Option<String>,
    },

    /// Toggle a post between pending and completed
    Complete { client_id: String, post_id: i64 },

    /// Replace a post's notes
    Notes {
        client_id: String,
        post_id: i64,
        notes: String,
    },

    /// Delete a post
    Delete { client_id: String, post_id: i64 },
}

#[derive(Subcommand)]
enum ImageAction {
    /// Upload image files and attach them to a post
    Add {
        client_id: String,
        post_id: i64,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove the image at a position (0-based)
    Remove {
        client_id: String,
        post_id: i64,
        index: usize,
    },
}

#[derive(Serialize)]
struct StatusResponse {
    success: bool,
    message: String,
}

fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            if json {
                eprintln!("{}", serde_json::json!({"error": e.to_string()}));
            } else {
                eprintln!("error: {}", e);
            }
            process::exit(1);
        }
    }
}

/// Runs one command. `Ok(false)` means the session reported an error notice.
fn run(cli: Cli) -> Result<bool> {
    let paths = match cli.data_dir {
        Some(dir) => AppPaths::from_base(dir),
        None => AppPaths::new(),
    };
    logging::init(&paths)?;

    if let Some(Commands::Config {
        company_name,
        public_base_url,
        share_base_url,
    }) = &cli.command
    {
        return cmd_config(
            &paths,
            company_name.clone(),
            public_base_url.clone(),
            share_base_url.clone(),
            cli.json,
        );
    }

    let mut session = open_session(&paths)?;
    let json = cli.json;
    let password = cli.password.as_deref();

    match cli.command {
        None | Some(Commands::Client { action: ClientAction::List }) => {
            cmd_client_list(&mut session, json)?
        }
        Some(Commands::Client { action }) => cmd_client(&mut session, action, password, json)?,
        Some(Commands::Post { action }) => cmd_post(&mut session, action, password, json)?,
        Some(Commands::Image { action }) => cmd_image(&mut session, action, password, json)?,
        Some(Commands::Export { client_id, output }) => {
            cmd_export(&mut session, &client_id, password, output)?
        }
        Some(Commands::Stats) => cmd_stats(&mut session, json)?,
        Some(Commands::Share { client_id }) => cmd_share(&mut session, &client_id, password, json)?,
        // Settings are handled before the session opens.
        Some(Commands::Config { .. }) => {}
    }

    Ok(report_notices(&mut session, json))
}

fn open_session(paths: &AppPaths) -> Result<AppSession> {
    paths.ensure_dirs()?;
    let settings = Settings::load(paths)?;
    let store = SqliteStore::new(Connection::open(&paths.db_path)?)?;
    let blobs = FsBlobStore::post_images(&paths.blobs_dir, &settings.public_base_url)?;
    let mirror = LocalMirror::open(&paths.mirror_path);
    Ok(Session::new(store, blobs, mirror, settings))
}

/// Prints queued notices and returns false if any of them is an error.
fn report_notices(session: &mut AppSession, json: bool) -> bool {
    let mut ok = true;
    for notice in session.drain_notices() {
        let failed = notice.level == NoticeLevel::Error;
        ok &= !failed;
        if json {
            if failed {
                eprintln!("{}", serde_json::json!({"error": notice.message}));
            }
        } else if failed {
            eprintln!("error: {}", notice.message);
        } else {
            println!("{}", notice.message);
        }
    }
    ok
}

fn print_status(json: bool, success: bool, message: String) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string(&StatusResponse { success, message })?
        );
    } else if success {
        println!("{}", message);
    }
    Ok(())
}

fn open_client(session: &mut AppSession, client_id: &str, password: Option<&str>) -> bool {
    session.select_client(client_id, password).is_some()
}

// --- Clients ---

fn cmd_client_list(session: &mut AppSession, json: bool) -> Result<()> {
    session.load_clients();
    let clients = session.clients();

    if json {
        println!("{}", serde_json::to_string(clients)?);
        return Ok(());
    }

    if clients.is_empty() {
        println!("No clients yet.");
        return Ok(());
    }

    for client in clients {
        print_client_row(client);
    }
    Ok(())
}

fn cmd_client(
    session: &mut AppSession,
    action: ClientAction,
    password: Option<&str>,
    json: bool,
) -> Result<()> {
    match action {
        ClientAction::List => cmd_client_list(session, json),
        ClientAction::Add {
            name,
            color,
            secret,
            description,
            inactive,
        } => {
            let draft = ClientDraft {
                id: None,
                name,
                theme_color: color,
                password: secret,
                active: !inactive,
                description,
            };
            if let Some(client) = session.create_client(draft) {
                if json {
                    println!("{}", serde_json::to_string(&client)?);
                } else {
                    println!("Created client {} ({}).", client.name, client.id);
                }
            }
            Ok(())
        }
        ClientAction::Edit {
            id,
            name,
            color,
            secret,
            description,
            active,
        } => {
            if !open_client(session, &id, password) {
                return Ok(());
            }
            let Some(current) = session.selected().cloned() else {
                return Ok(());
            };
            let mut draft = current.to_draft();
            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(color) = color {
                draft.theme_color = color;
            }
            if let Some(secret) = secret {
                draft.password = secret;
            }
            if let Some(description) = description {
                draft.description = description;
            }
            if let Some(active) = active {
                draft.active = active;
            }
            if let Some(client) = session.update_client(draft)
                && json
            {
                println!("{}", serde_json::to_string(&client)?);
            }
            Ok(())
        }
        ClientAction::Delete { id } => {
            if !open_client(session, &id, password) {
                return Ok(());
            }
            let removed = session.delete_client(&id);
            if json {
                print_status(json, removed, format!("Deleted client {}.", id))?;
            }
            Ok(())
        }
        ClientAction::Show { id } => {
            let Some(client) = session.select_client(&id, password).cloned() else {
                return Ok(());
            };
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "client": client, "posts": session.posts() })
                );
                return Ok(());
            }
            print_client_detail(&client);
            println!("─────────────────────────");
            print_posts(session.posts());
            Ok(())
        }
    }
}

// --- Posts ---

fn cmd_post(
    session: &mut AppSession,
    action: PostAction,
    password: Option<&str>,
    json: bool,
) -> Result<()> {
    match action {
        PostAction::List { client_id } => {
            if !open_client(session, &client_id, password) {
                return Ok(());
            }
            if json {
                println!("{}", serde_json::to_string(session.posts())?);
            } else if session.posts().is_empty() {
                println!("No posts scheduled.");
            } else {
                print_posts(session.posts());
            }
            Ok(())
        }
        PostAction::Add { client_id, post } => {
            if !open_client(session, &client_id, password) {
                return Ok(());
            }
            let draft = PostDraft {
                id: None,
                client_id,
                date: post.date,
                day: post.day,
                day_of_week: post.day_of_week,
                title: post.title,
                content_type: post.content_type,
                post_type: post.post_type,
                text: post.text,
                completed: false,
                notes: String::new(),
                images: Vec::new(),
                social_networks: post.networks,
                month: post.month,
                year: post.year,
                time: post.time,
            };
            if let Some(created) = session.create_post(draft) {
                if json {
                    println!("{}", serde_json::to_string(&created)?);
                } else {
                    println!("Scheduled post #{} on {}.", created.id, created.date);
                }
            }
            Ok(())
        }
        PostAction::Edit {
            client_id,
            post_id,
            title,
            text,
        } => {
            if open_client(session, &client_id, password) {
                session.edit_post(post_id, title, text);
                print_post_json(session, post_id, json)?;
            }
            Ok(())
        }
        PostAction::Complete { client_id, post_id } => {
            if open_client(session, &client_id, password) {
                session.toggle_completed(post_id);
                print_post_json(session, post_id, json)?;
            }
            Ok(())
        }
        PostAction::Notes {
            client_id,
            post_id,
            notes,
        } => {
            if open_client(session, &client_id, password) && session.update_notes(post_id, &notes)
            {
                print_status(json, true, format!("Updated notes of post #{}.", post_id))?;
            }
            Ok(())
        }
        PostAction::Delete { client_id, post_id } => {
            if open_client(session, &client_id, password) {
                let removed = session.delete_post(post_id);
                if json {
                    print_status(json, removed, format!("Deleted post #{}.", post_id))?;
                }
            }
            Ok(())
        }
    }
}

fn print_post_json(session: &AppSession, post_id: i64, json: bool) -> Result<()> {
    if json && let Some(post) = session.post(post_id) {
        println!("{}", serde_json::to_string(post)?);
    }
    Ok(())
}

// --- Images ---

fn cmd_image(
    session: &mut AppSession,
    action: ImageAction,
    password: Option<&str>,
    json: bool,
) -> Result<()> {
    match action {
        ImageAction::Add {
            client_id,
            post_id,
            files,
        } => {
            let images = files
                .iter()
                .map(|path| ImageFile::from_path(path))
                .collect::<Result<Vec<_>>>()?;
            if open_client(session, &client_id, password) {
                session.upload_images(post_id, &images);
                print_post_json(session, post_id, json)?;
            }
            Ok(())
        }
        ImageAction::Remove {
            client_id,
            post_id,
            index,
        } => {
            if open_client(session, &client_id, password) {
                session.remove_image(post_id, index);
                print_post_json(session, post_id, json)?;
            }
            Ok(())
        }
    }
}

// --- Export, stats, sharing ---

fn cmd_export(
    session: &mut AppSession,
    client_id: &str,
    password: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    if !open_client(session, client_id, password) {
        return Ok(());
    }
    let options = session.export_options();
    let Some(html) = session.export_snapshot(&options) else {
        return Ok(());
    };
    match output {
        Some(path) => {
            write_snapshot(&path, &html)?;
            println!("Wrote {}.", path.display());
        }
        None => print!("{}", html),
    }
    Ok(())
}

fn cmd_stats(session: &mut AppSession, json: bool) -> Result<()> {
    session.load_clients();
    let Some(dashboard) = session.dashboard() else {
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string(&dashboard)?);
        return Ok(());
    }

    println!("Dashboard");
    println!("────────────────────");
    println!("Active clients: {}", dashboard.active_clients);
    println!("Scheduled posts: {}", dashboard.total_posts);
    println!("Posts per client: {}", dashboard.average_display());
    if !dashboard.chart.is_empty() {
        println!();
        let widest = dashboard.chart.iter().map(|e| e.posts).max().unwrap_or(0).max(1);
        for entry in &dashboard.chart {
            let bar = "█".repeat(((entry.posts * 30) / widest) as usize);
            println!("{:<13} {:>4} {}", entry.name, entry.posts, bar);
        }
    }
    Ok(())
}

fn cmd_share(
    session: &mut AppSession,
    client_id: &str,
    password: Option<&str>,
    json: bool,
) -> Result<()> {
    if !open_client(session, client_id, password) {
        return Ok(());
    }
    let link = session.share_link(client_id);
    if json {
        println!("{}", serde_json::json!({ "link": link }));
    } else {
        println!("{}", link);
    }
    Ok(())
}

fn cmd_config(
    paths: &AppPaths,
    company_name: Option<String>,
    public_base_url: Option<String>,
    share_base_url: Option<String>,
    json: bool,
) -> Result<bool> {
    let mut settings = Settings::load(paths)?;
    let changed = company_name.is_some() || public_base_url.is_some() || share_base_url.is_some();
    if let Some(value) = company_name {
        settings.company_name = value;
    }
    if let Some(value) = public_base_url {
        settings.public_base_url = value;
    }
    if let Some(value) = share_base_url {
        settings.share_base_url = value;
    }
    if changed {
        settings.save(paths)?;
        tracing::info!(path = %paths.settings_path.display(), "settings saved");
    }

    if json {
        println!("{}", serde_json::to_string(&settings)?);
    } else {
        println!("Company name:    {}", settings.company_name);
        println!("Public base URL: {}", settings.public_base_url);
        println!("Share base URL:  {}", settings.share_base_url);
    }
    Ok(true)
}

// --- Printing ---

fn print_client_row(client: &Client) {
    let lock = if client.password.is_empty() { " " } else { "*" };
    let state = if client.active { "active" } else { "inactive" };
    println!(
        "{} {} {:<24} {:<8} {}",
        client.id, lock, client.name, state, client.theme_color
    );
}

fn print_client_detail(client: &Client) {
    println!("ID:          {}", client.id);
    println!("Name:        {}", client.name);
    println!("Theme color: {}", client.theme_color);
    println!("Active:      {}", client.active);
    println!("Created:     {}", client.created_at.format("%Y-%m-%d %H:%M"));
    if !client.description.is_empty() {
        println!("Description: {}", client.description);
    }
}

fn print_posts(posts: &[Post]) {
    for post in posts {
        let done = if post.completed { "x" } else { " " };
        let title = if post.title.chars().count() > 40 {
            format!("{}...", post.title.chars().take(37).collect::<String>())
        } else {
            post.title.clone()
        };
        let images = if post.images.is_empty() {
            String::new()
        } else {
            format!(" ({} image(s))", post.images.len())
        };
        println!(
            "{:>4} [{}] {} {:<10} {}{}",
            post.id, done, post.date, post.post_type, title, images
        );
    }
}
