//! PassVault CLI - Command line client for a PassVault server.
//!
//! This tool logs in to the service, manages vault items and handles
//! export, import and sharing under the limits of the user's plan.

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use dialoguer::{Confirm, Input};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use passvault_api::ClientConfig;
use passvault_common::{Error, ItemId, Operation, PlanDescriptor, Secret, VaultDraft, VaultItem};
use passvault_policy::Severity;
use passvault_sync::VaultClient;

#[derive(Parser)]
#[command(name = "passvault")]
#[command(about = "PassVault - Password vault client")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Server base URL (e.g. https://vault.example.com/api).
    #[arg(long, env = "PASSVAULT_SERVER", global = true)]
    server: Option<String>,

    /// Directory holding the session database.
    #[arg(long, env = "PASSVAULT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Optional item fields shared by `add` and `edit`.
#[derive(Args)]
struct ItemFields {
    /// Login name.
    #[arg(short, long)]
    username: Option<String>,

    /// Site address.
    #[arg(long)]
    url: Option<String>,

    /// Free-form notes.
    #[arg(short, long)]
    notes: Option<String>,

    /// Folder name.
    #[arg(short, long)]
    folder: Option<String>,

    /// Comma-separated tags.
    #[arg(long)]
    tags: Option<String>,

    /// Mark as favorite.
    #[arg(long)]
    favorite: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session.
    Login {
        /// Username (prompted if omitted).
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Forget the stored session.
    Logout,

    /// Show session, plan and vault usage.
    Status,

    /// Reload plan limits from the server.
    Plan,

    /// List vault items.
    List,

    /// Show one vault item.
    Show {
        /// Item id.
        id: String,
    },

    /// Add a vault item. The password is prompted.
    Add {
        /// Item title.
        #[arg(short, long)]
        title: String,

        #[command(flatten)]
        fields: ItemFields,
    },

    /// Edit a vault item. An empty password keeps the current one.
    Edit {
        /// Item id.
        id: String,

        /// New title.
        #[arg(short, long)]
        title: Option<String>,

        #[command(flatten)]
        fields: ItemFields,
    },

    /// Remove a vault item.
    Remove {
        /// Item id.
        id: String,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Download the vault as a JSON document.
    Export {
        /// Output file (default: name suggested by the server).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import items from a JSON export document.
    Import {
        /// Document to import.
        file: PathBuf,
    },

    /// Share an item with another user.
    Share {
        /// Item id.
        id: String,

        /// Recipient username or email.
        recipient: String,

        /// Allow the recipient to edit the item.
        #[arg(long)]
        can_edit: bool,
    },

    /// List items other users shared with you.
    Shared,

    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "passvault", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;
    let client = VaultClient::open(&config).context("Failed to open client")?;

    match cli.command {
        Commands::Login { username } => cmd_login(&client, username).await,
        Commands::Logout => cmd_logout(&client).await,
        Commands::Status => cmd_status(&client).await,
        Commands::Plan => cmd_plan(&client).await,
        Commands::List => cmd_list(&client).await,
        Commands::Show { id } => cmd_show(&client, &id).await,
        Commands::Add { title, fields } => cmd_add(&client, title, fields).await,
        Commands::Edit { id, title, fields } => cmd_edit(&client, &id, title, fields).await,
        Commands::Remove { id, yes } => cmd_remove(&client, &id, yes).await,
        Commands::Export { out } => cmd_export(&client, out).await,
        Commands::Import { file } => cmd_import(&client, &file).await,
        Commands::Share {
            id,
            recipient,
            can_edit,
        } => cmd_share(&client, &id, &recipient, can_edit).await,
        Commands::Shared => cmd_shared(&client).await,
        Commands::Completions { .. } => Ok(()),
    }
}

/// Read `config.json` from the user config directory, then apply overrides.
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let path = dirs::config_dir().map(|d| d.join("passvault").join("config.json"));

    let mut config = match path {
        Some(path) if path.exists() => {
            debug!("Loading config from {}", path.display());
            ClientConfig::load(&path).context("Failed to load config")?
        }
        _ => ClientConfig::default(),
    };

    if let Some(server) = &cli.server {
        config.base_url = server.clone();
    }
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Turn a client error into a message for the user.
fn fail(op: Operation) -> impl FnOnce(Error) -> anyhow::Error {
    move |e| {
        if e.requires_login() {
            anyhow!(
                "{}\nRun `passvault login` to sign in again.",
                e.user_message(op)
            )
        } else {
            anyhow!(e.user_message(op))
        }
    }
}

/// Prompt for a secret without echo.
fn prompt_secret(prompt: &str) -> Result<Secret> {
    let value = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Secret::new(value))
}

fn parse_id(id: &str) -> Result<ItemId> {
    ItemId::new(id).context("Invalid item id")
}

async fn require_session(client: &VaultClient) -> Result<()> {
    if client.session().current().await.is_none() {
        return Err(fail(Operation::LoadItems)(Error::NotAuthenticated));
    }
    Ok(())
}

fn print_plan(plan: &PlanDescriptor) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("Plan: {}", plan.name);
    println!("  Max items: {}", plan.max_vault_items);
    println!("  Max password length: {}", plan.max_password_length);
    println!("  Export: {}", yes_no(plan.can_export));
    println!("  Import: {}", yes_no(plan.can_import));
    println!("  Sharing: {}", yes_no(plan.can_share));
}

fn print_usage(plan: &PlanDescriptor, count: usize) {
    println!(
        "Items: {}/{} ({} remaining)",
        count,
        plan.max_vault_items,
        passvault_policy::remaining_capacity(plan, count)
    );
    let warning = passvault_policy::utilization_warning(plan, count);
    match warning.severity {
        Severity::None => {}
        Severity::Warning => println!("Warning: {}", warning.message),
        Severity::Critical => println!("Critical: {}", warning.message),
    }
}

fn item_id(item: &VaultItem) -> &str {
    item.id.as_ref().map(ItemId::as_str).unwrap_or("-")
}

fn apply_fields(mut draft: VaultDraft, fields: ItemFields) -> VaultDraft {
    if fields.username.is_some() {
        draft.username = fields.username;
    }
    if fields.url.is_some() {
        draft.url = fields.url;
    }
    if fields.notes.is_some() {
        draft.notes = fields.notes;
    }
    if fields.folder.is_some() {
        draft.folder = fields.folder;
    }
    if fields.tags.is_some() {
        draft.tags = fields.tags;
    }
    if fields.favorite {
        draft.is_favorite = Some(true);
    }
    draft
}

/// Log in.
async fn cmd_login(client: &VaultClient, username: Option<String>) -> Result<()> {
    let username: String = match username {
        Some(u) => u,
        None => Input::new()
            .with_prompt("Username")
            .interact_text()
            .context("Failed to read username")?,
    };
    let password = prompt_secret("Password: ")?;

    let session = client
        .auth()
        .login(&username, &password)
        .await
        .map_err(fail(Operation::Login))?;

    println!("Logged in as {} (user id {})", username.trim(), session.user_id());
    if let Some(plan) = client.session().cached_plan().await {
        println!("Plan: {}", plan.name);
    }

    Ok(())
}

/// Log out.
async fn cmd_logout(client: &VaultClient) -> Result<()> {
    client
        .auth()
        .logout()
        .await
        .context("Failed to clear session")?;
    println!("Logged out.");
    Ok(())
}

/// Show session state.
async fn cmd_status(client: &VaultClient) -> Result<()> {
    let Some(session) = client.session().current().await else {
        println!("Not logged in.");
        return Ok(());
    };

    println!("Logged in as user id {}", session.user_id());
    println!(
        "  Since: {}",
        session.created_locally().format("%Y-%m-%d %H:%M:%S UTC")
    );

    let Some(plan) = client.session().cached_plan().await else {
        println!("Plan not loaded. Run `passvault plan`.");
        return Ok(());
    };
    print_plan(&plan);

    let items = client
        .vault()
        .list()
        .await
        .map_err(fail(Operation::LoadItems))?;
    print_usage(&plan, items.len());

    Ok(())
}

/// Refresh the plan.
async fn cmd_plan(client: &VaultClient) -> Result<()> {
    require_session(client).await?;
    let plan = client
        .auth()
        .refresh_plan()
        .await
        .map_err(fail(Operation::LoadPlan))?;
    print_plan(&plan);
    Ok(())
}

/// List vault items.
async fn cmd_list(client: &VaultClient) -> Result<()> {
    require_session(client).await?;
    let items = client
        .vault()
        .list()
        .await
        .map_err(fail(Operation::LoadItems))?;

    if items.is_empty() {
        println!("Vault is empty.");
    } else {
        println!("{:>6}  {:<32} {:<24} FOLDER", "ID", "TITLE", "USERNAME");
        for item in items.iter() {
            println!(
                "{:>6}  {:<32} {:<24} {}",
                item_id(item),
                item.title,
                item.username.as_deref().unwrap_or(""),
                item.folder.as_deref().unwrap_or("")
            );
        }
    }

    if let Some(plan) = client.session().cached_plan().await {
        println!();
        print_usage(&plan, items.len());
    }

    Ok(())
}

/// Show one item.
async fn cmd_show(client: &VaultClient, id: &str) -> Result<()> {
    require_session(client).await?;
    let id = parse_id(id)?;
    let item = client
        .vault()
        .get(&id)
        .await
        .map_err(fail(Operation::LoadItem))?;

    println!("{}", item.title);
    println!("  ID: {}", item_id(&item));
    let optional = [
        ("Username", &item.username),
        ("URL", &item.url),
        ("Folder", &item.folder),
        ("Tags", &item.tags),
        ("Notes", &item.notes),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            println!("  {}: {}", label, value);
        }
    }
    if item.is_favorite == Some(true) {
        println!("  Favorite: yes");
    }
    if let Some(created) = item.created_at {
        println!("  Created: {}", created.format("%Y-%m-%d %H:%M"));
    }
    if let Some(updated) = item.updated_at {
        println!("  Updated: {}", updated.format("%Y-%m-%d %H:%M"));
    }

    Ok(())
}

/// Add an item.
async fn cmd_add(client: &VaultClient, title: String, fields: ItemFields) -> Result<()> {
    require_session(client).await?;

    // Refuse before prompting when the plan is already full.
    if let Some(plan) = client.session().cached_plan().await {
        let items = client
            .vault()
            .list()
            .await
            .map_err(fail(Operation::LoadItems))?;
        passvault_policy::check_add_item(&plan, items.len())
            .map_err(fail(Operation::CreateItem))?;
    }

    let secret = prompt_secret("Password: ")?;
    let confirm = prompt_secret("Confirm password: ")?;
    if secret != confirm {
        anyhow::bail!("Passwords do not match");
    }

    let draft = apply_fields(VaultDraft::new(title), fields).with_secret(secret);
    let created = client
        .vault()
        .create(&draft)
        .await
        .map_err(fail(Operation::CreateItem))?;

    info!("Item added");
    println!("Added '{}' (id {})", created.title, item_id(&created));
    Ok(())
}

/// Edit an item.
async fn cmd_edit(
    client: &VaultClient,
    id: &str,
    title: Option<String>,
    fields: ItemFields,
) -> Result<()> {
    require_session(client).await?;
    let id = parse_id(id)?;
    let current = client
        .vault()
        .get(&id)
        .await
        .map_err(fail(Operation::LoadItem))?;

    let mut draft = apply_fields(VaultDraft::from_item(&current), fields);
    if let Some(title) = title {
        draft.title = title;
    }
    let draft = draft.with_secret(prompt_secret("New password (leave empty to keep): ")?);

    let updated = client
        .vault()
        .update(&id, &draft)
        .await
        .map_err(fail(Operation::UpdateItem))?;

    println!("Updated '{}'", updated.title);
    Ok(())
}

/// Remove an item.
async fn cmd_remove(client: &VaultClient, id: &str, yes: bool) -> Result<()> {
    require_session(client).await?;
    let id = parse_id(id)?;

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete vault item {}?", id))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    client
        .vault()
        .delete(&id)
        .await
        .map_err(fail(Operation::DeleteItem))?;

    println!("Deleted item {}", id);
    Ok(())
}

/// Export the vault.
async fn cmd_export(client: &VaultClient, out: Option<PathBuf>) -> Result<()> {
    require_session(client).await?;
    let exported = client
        .transfer()
        .export()
        .await
        .map_err(fail(Operation::Export))?;

    let path = out.unwrap_or_else(|| PathBuf::from(&exported.file_name));
    std::fs::write(&path, &exported.content).context("Failed to write export file")?;

    let count = exported.document().map(|d| d.items.len()).unwrap_or(0);
    println!("Exported {} items to {}", count, path.display());
    println!("The file contains your passwords in plain text. Keep it safe.");
    Ok(())
}

/// Import a document.
async fn cmd_import(client: &VaultClient, file: &Path) -> Result<()> {
    require_session(client).await?;
    let text = std::fs::read_to_string(file).context("Failed to read import file")?;

    let result = client
        .transfer()
        .import_str(&text)
        .await
        .map_err(fail(Operation::Import))?;

    println!("{}", result.summary());
    for failure in &result.errors {
        match failure.index {
            Some(i) => println!("  item {}: {}", i + 1, failure.reason),
            None => println!("  {}", failure.reason),
        }
    }

    if result.imported_count > 0 {
        let items = client
            .vault()
            .list()
            .await
            .map_err(fail(Operation::LoadItems))?;
        println!("Vault now holds {} items.", items.len());
    }

    Ok(())
}

/// Share an item.
async fn cmd_share(client: &VaultClient, id: &str, recipient: &str, can_edit: bool) -> Result<()> {
    require_session(client).await?;
    let id = parse_id(id)?;

    client
        .shares()
        .share(&id, recipient, can_edit)
        .await
        .map_err(fail(Operation::Share))?;

    println!("Shared item {} with {}", id, recipient.trim());
    Ok(())
}

/// List items shared with the user.
async fn cmd_shared(client: &VaultClient) -> Result<()> {
    require_session(client).await?;
    let shared = client
        .shares()
        .received()
        .await
        .map_err(fail(Operation::LoadShared))?;

    if shared.is_empty() {
        println!("Nothing has been shared with you.");
        return Ok(());
    }

    for entry in &shared {
        let access = if entry.can_edit { "can edit" } else { "read only" };
        println!(
            "{:>6}  {:<32} from {} ({}, {})",
            item_id(&entry.vault_item),
            entry.vault_item.title,
            entry.shared_by_username,
            access,
            entry.shared_at
        );
    }

    Ok(())
}
