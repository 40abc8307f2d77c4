//! ticketsync - Ticket admin with Trello and Slack notifications
//!
//! Main entry point for the ticketsync CLI.

mod commands;

use anyhow::Context;
use clap::Parser;
use commands::{
    Cli, ClientCommands, Commands, LabelCommands, SettingsArgs, SettingsCommands, TicketCommands,
};
use std::path::{Path, PathBuf};
use std::process;
use ticketsync::config::AppConfig;
use ticketsync::integrations::TrelloAdapter;
use ticketsync::model::{ClientId, JobLog, Module, NewTicket, Ticket, TicketId, TicketStatus};
use ticketsync::storage::{Store, StoreConfig};
use ticketsync::sync::{sync_board_labels, SyncReport, TicketService, TicketSynchronizer};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    if let Err(e) = ticketsync::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_file = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);

    // Init creates the config, everything else needs it
    if let Commands::Init { seed } = cli.command {
        return handle_init_command(&config_file, seed);
    }

    let config = match AppConfig::load(&config_file) {
        Ok(config) => config,
        Err(ticketsync::TicketSyncError::Config(msg)) if msg.contains("Config file not found") => {
            anyhow::bail!(
                "No configuration found at {}. Run 'ticketsync init' first.",
                config_file.display()
            );
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    let store = Store::open(StoreConfig::new(&config.database))
        .with_context(|| format!("Failed to open database {}", config.database.display()))?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Settings(cmd) => handle_settings_command(&store, cmd),
        Commands::Client(cmd) => handle_client_command(&store, cmd),
        Commands::Ticket(cmd) => handle_ticket_command(&store, &config, cmd).await,
        Commands::Labels(cmd) => handle_labels_command(&store, &config, cmd).await,
    }
}

fn handle_init_command(config_file: &Path, seed: bool) -> anyhow::Result<()> {
    let config = if config_file.exists() {
        println!("Configuration already exists at {}", config_file.display());
        AppConfig::load(config_file).context("Failed to load existing configuration")?
    } else {
        let config = AppConfig::new();
        config
            .save(config_file)
            .with_context(|| format!("Failed to write {}", config_file.display()))?;
        println!("✓ Created configuration at {}", config_file.display());
        config
    };

    let store = Store::open(StoreConfig::new(&config.database))
        .with_context(|| format!("Failed to create database {}", config.database.display()))?;
    println!("✓ Database ready at {}", config.database.display());

    if seed {
        seed_database(&store).context("Failed to seed database")?;
    }

    println!();
    println!("Next steps:");
    println!("  1. Configure Trello and Slack:");
    println!("     ticketsync settings set --trello-api-key <key> --trello-api-token <token> \\");
    println!("       --trello-board-id <board> --trello-list-id <list> \\");
    println!("       --slack-token <token> --slack-channel-id <channel>");
    println!();
    println!("  2. Import board labels and map them to modules:");
    println!("     ticketsync labels sync");
    println!("     ticketsync labels assign <label_id> <module>");

    Ok(())
}

/// Sample client and draft ticket, created only if missing
fn seed_database(store: &Store) -> ticketsync::Result<()> {
    println!("Setting up testing client..");
    let client = match store.find_client_by_name("Best Client")? {
        Some(client) => client,
        None => store.add_client("Best Client")?,
    };

    println!("Setting up testing ticket..");
    if store.find_ticket_by_no("64853")?.is_none() {
        let mut new = NewTicket::draft("Payments are not processed.")
            .with_ticket_no("64853")
            .with_module("sellermatch")
            .with_status(TicketStatus::Open)
            .with_client(client.id)
            .with_description(
                "<p>Payments are currently not being matched to our orders.</p>\
                 <p>This seems to have been going on for quite a while.</p>",
            );
        new.joblog = JobLog {
            log: Some(String::new()),
            message: Some(
                "Source Sync Metadata started...\n    Sync ok.\n        \
                 Manufacturers (+0/-0)\n        Shipping      (+0/-0)\n        \
                 Markets       (+0/-0)\n        Users         (+0/-0)"
                    .to_string(),
            ),
            stacktrace: Some(String::new()),
        };
        store.insert_ticket(&new)?;
    }

    Ok(())
}

fn handle_settings_command(store: &Store, cmd: SettingsCommands) -> anyhow::Result<()> {
    match cmd {
        SettingsCommands::Show => match store.settings()? {
            Some(settings) => {
                let shown = settings.redacted();
                println!("Trello:");
                println!("  API key:    {}", shown.trello.api_key);
                println!("  API token:  {}", shown.trello.api_token);
                println!("  Board:      {}", shown.trello.board_id);
                println!("  List:       {}", shown.trello.list_id);
                println!("Slack:");
                println!("  Token:      {}", shown.slack.token);
                println!("  Channel:    {}", shown.slack.channel_id);
            }
            None => println!("No settings configured; synchronization is disabled."),
        },
        SettingsCommands::Set(args) => {
            if args.is_empty() {
                anyhow::bail!("Nothing to set. See 'ticketsync settings set --help'.");
            }
            let mut settings = store.settings()?.unwrap_or_default();
            apply_settings(&mut settings, args);
            store.put_settings(&settings).context("Failed to save settings")?;
            println!("✓ Settings saved");
        }
        SettingsCommands::Clear => {
            if store.clear_settings()? {
                println!("✓ Settings removed; synchronization is disabled");
            } else {
                println!("No settings to remove");
            }
        }
    }
    Ok(())
}

fn apply_settings(settings: &mut ticketsync::model::Settings, args: SettingsArgs) {
    let fields = [
        (args.trello_api_key, &mut settings.trello.api_key),
        (args.trello_api_token, &mut settings.trello.api_token),
        (args.trello_board_id, &mut settings.trello.board_id),
        (args.trello_list_id, &mut settings.trello.list_id),
        (args.slack_token, &mut settings.slack.token),
        (args.slack_channel_id, &mut settings.slack.channel_id),
    ];
    for (value, field) in fields {
        if let Some(value) = value {
            *field = value;
        }
    }
}

fn handle_client_command(store: &Store, cmd: ClientCommands) -> anyhow::Result<()> {
    match cmd {
        ClientCommands::Add { name } => {
            let client = store.add_client(&name).context("Failed to add client")?;
            println!("✓ Added client {} ({})", client.name, client.id);
        }
        ClientCommands::List => {
            let clients = store.clients()?;
            println!("Clients: {}", clients.len());
            for client in clients {
                println!("  {:>4}  {}", client.id, client.name);
            }
        }
    }
    Ok(())
}

async fn handle_ticket_command(
    store: &Store,
    config: &AppConfig,
    cmd: TicketCommands,
) -> anyhow::Result<()> {
    let service = TicketService::new(store, TicketSynchronizer::from_config(config)?);

    match cmd {
        TicketCommands::Create {
            title,
            ticket_no,
            module,
            client,
            description,
            status,
            publish,
        } => {
            let mut new = NewTicket::draft(title).with_ticket_no(ticket_no);
            new.draft = !publish;
            if let Some(module) = module {
                new = new.with_module(module);
            }
            if let Some(client) = client {
                let id = ClientId::new(client);
                store
                    .client(id)?
                    .with_context(|| format!("Client {} not found", id))?;
                new = new.with_client(id);
            }
            if let Some(description) = description {
                new = new.with_description(description);
            }
            if let Some(status) = status {
                new = new.with_status(status.parse()?);
            }

            let (ticket, report) = service.create(&new).await.context("Failed to create ticket")?;
            println!("✓ Created ticket {}", ticket.id);
            print_report(&report);
        }
        TicketCommands::List { status } => {
            let status = status.map(|s| s.parse::<TicketStatus>()).transpose()?;
            let tickets = store.tickets(status)?;
            println!("Found {} tickets:", tickets.len());
            println!();
            for ticket in &tickets {
                print_ticket_summary(ticket);
            }
        }
        TicketCommands::Show { id } => {
            let ticket = store.require_ticket(TicketId::new(id))?;
            print_ticket(&ticket, config);
        }
        TicketCommands::Update {
            id,
            title,
            status,
            module,
            description,
            assignee,
        } => {
            let status = status.map(|s| s.parse::<TicketStatus>()).transpose()?;
            let (ticket, report) = service
                .update(TicketId::new(id), |ticket| {
                    if let Some(title) = title {
                        ticket.title = title;
                    }
                    if let Some(status) = status {
                        ticket.status = status;
                    }
                    if let Some(module) = module {
                        ticket.module = Some(Module::new(module));
                    }
                    if let Some(description) = description {
                        ticket.description = Some(description);
                    }
                    if let Some(assignee) = assignee {
                        ticket.assignee = Some(assignee);
                    }
                })
                .await
                .with_context(|| format!("Failed to update ticket {}", id))?;
            println!("✓ Updated ticket {}", ticket.id);
            print_report(&report);
        }
        TicketCommands::Publish { id } => {
            let (ticket, report) = service
                .publish(TicketId::new(id))
                .await
                .with_context(|| format!("Failed to publish ticket {}", id))?;
            println!("✓ Published ticket {}", ticket.id);
            print_report(&report);
        }
        TicketCommands::Save { id } => {
            let (ticket, report) = service
                .resave(TicketId::new(id))
                .await
                .with_context(|| format!("Failed to save ticket {}", id))?;
            println!("✓ Saved ticket {}", ticket.id);
            print_report(&report);
        }
    }
    Ok(())
}

async fn handle_labels_command(
    store: &Store,
    config: &AppConfig,
    cmd: LabelCommands,
) -> anyhow::Result<()> {
    match cmd {
        LabelCommands::Sync => {
            let settings = store
                .settings()?
                .context("Settings not found, configure them with 'ticketsync settings set'")?;
            let trello = TrelloAdapter::new(&config.services.trello_url)?;
            let summary = sync_board_labels(store, &trello, &settings)
                .await
                .context("Failed to sync Trello labels")?;
            println!(
                "✓ Fetched {} labels, {} new",
                summary.fetched, summary.created
            );
        }
        LabelCommands::List => {
            let labels = store.labels()?;
            println!("Labels: {}", labels.len());
            for label in labels {
                let module = label.module.as_ref().map(|m| m.as_str()).unwrap_or("-");
                println!(
                    "  {}  {:<20} {:<10} module: {}",
                    label.trello_label_id, label.name, label.color, module
                );
            }
        }
        LabelCommands::Assign { label_id, module } => {
            let label = store
                .assign_label(&label_id, Some(&Module::new(module)))
                .with_context(|| format!("Failed to assign label {}", label_id))?;
            println!(
                "✓ Label {} now marks module {}",
                label.name,
                label.module.as_ref().map(|m| m.as_str()).unwrap_or("-")
            );
        }
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    if report.is_disabled() {
        println!("  Sync:    disabled (no settings)");
        return;
    }
    println!("  Card:    {}", report.card);
    println!("  Label:   {}", report.label);
    println!("  Message: {}", report.message);
    println!("  Refresh: {}", report.refresh);
}

fn print_ticket_summary(ticket: &Ticket) {
    let draft = if ticket.draft { " [draft]" } else { "" };
    println!(
        "  {:>4}  #{:<8} {:<12} {}{}",
        ticket.id,
        ticket.ticket_no,
        ticket.status.as_str(),
        ticket.title,
        draft
    );
}

fn print_ticket(ticket: &Ticket, config: &AppConfig) {
    println!("{}: {}", ticket.id, ticket.title);
    println!("  Ticket no:  {}", ticket.ticket_no);
    println!("  Status:     {}", ticket.status.label());
    println!("  Draft:      {}", ticket.draft);
    if let Some(module) = &ticket.module {
        println!("  Module:     {}", module);
    }
    if let Some(client) = &ticket.client {
        println!("  Client:     {} ({})", client.name, client.id);
    }
    if let Some(assignee) = &ticket.assignee {
        println!("  Assignee:   {}", assignee);
    }
    println!("  Admin:      {}", config.admin_url(ticket.id));
    match &ticket.card {
        Some(card) => println!("  Card:       {}", card.url),
        None => println!("  Card:       -"),
    }
    match &ticket.message {
        Some(message) => println!("  Message:    {} in {}", message.ts, message.channel_id),
        None => println!("  Message:    -"),
    }
    if let Some(description) = &ticket.description {
        println!();
        println!("{}", description);
    }
    if let Some(message) = &ticket.joblog.message {
        if !message.is_empty() {
            println!();
            println!("Last job log:");
            println!("{}", message);
        }
    }
    println!();
    println!("  Created: {}", ticket.created_at);
    println!("  Updated: {}", ticket.updated_at);
}
