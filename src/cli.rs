use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use salesdeck_core::dashboard::{self, ActivityGroup};
use salesdeck_core::models::*;
use salesdeck_core::view::{
    ActivityFilter, ActivitySort, ContactFilter, ContactSort, TaskFilter, TaskSort, ViewState,
};

use crate::api;
use crate::config::StoreArgs;
use crate::service::{CrmService, Transition};

#[derive(Debug, Parser)]
#[command(name = "salesdeck")]
#[command(about = "Contacts, deals, tasks and a sales pipeline for small teams")]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the HTTP API and record store
    Serve {
        /// Port for HTTP API
        #[arg(short, long, env = "SALESDECK_PORT", default_value = "3000")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Summary statistics and recent records
    Dashboard,
    /// Deals grouped by stage
    Pipeline,
    /// Move a deal to another stage
    MoveDeal {
        id: Id,
        #[arg(value_parser = parse_stage)]
        stage: Stage,
    },
    /// Manage contacts
    Contacts {
        #[command(subcommand)]
        action: ContactCommand,
    },
    /// Manage deals
    Deals {
        #[command(subcommand)]
        action: DealCommand,
    },
    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        action: TaskCommand,
    },
    /// Activity log, grouped by day
    Activities {
        #[arg(short, long, default_value = "")]
        search: String,
        /// all, today, yesterday, last7days, or an activity type
        #[arg(short, long, default_value = "all")]
        filter: String,
        /// newest, oldest or type
        #[arg(long, default_value = "newest")]
        sort: String,
    },
    /// Manage custom field definitions
    Fields {
        #[command(subcommand)]
        action: FieldCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ContactCommand {
    List {
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long)]
        tag: Option<String>,
        /// name, company, recent or lastContacted
        #[arg(long, default_value = "name")]
        sort: String,
    },
    /// Contact details with related deals, tasks and activities
    Show { id: Id },
    Add {
        name: String,
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        position: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Custom field value as FIELD_ID=VALUE
        #[arg(long = "field", value_parser = parse_custom_value)]
        fields: Vec<(String, serde_json::Value)>,
    },
    Update {
        id: Id,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        position: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },
    Delete { id: Id },
}

#[derive(Debug, Subcommand)]
pub enum DealCommand {
    Add {
        title: String,
        value: f64,
        #[arg(long)]
        contact: Id,
        #[arg(long, value_parser = parse_stage, default_value = "lead")]
        stage: Stage,
        #[arg(long, default_value_t = DEFAULT_PROBABILITY)]
        probability: u8,
        /// Expected close date, YYYY-MM-DD
        #[arg(long)]
        close: Option<NaiveDate>,
        /// Custom field value as FIELD_ID=VALUE
        #[arg(long = "field", value_parser = parse_custom_value)]
        fields: Vec<(String, serde_json::Value)>,
    },
    Update {
        id: Id,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        value: Option<f64>,
        #[arg(long)]
        probability: Option<u8>,
        #[arg(long)]
        close: Option<NaiveDate>,
    },
    Delete { id: Id },
}

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    List {
        #[arg(short, long, default_value = "")]
        search: String,
        /// all, today, overdue, a status or a priority
        #[arg(short, long, default_value = "all")]
        filter: String,
        /// dueDate, priority, status or title
        #[arg(long, default_value = "dueDate")]
        sort: String,
    },
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// YYYY-MM-DD or RFC 3339
        #[arg(long, value_parser = parse_due)]
        due: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_priority, default_value = "medium")]
        priority: Priority,
        #[arg(long)]
        contact: Option<Id>,
        #[arg(long)]
        deal: Option<Id>,
    },
    /// Flip between completed and pending
    Toggle { id: Id },
    Delete { id: Id },
}

#[derive(Debug, Subcommand)]
pub enum FieldCommand {
    List {
        #[arg(value_parser = parse_field_entity, default_value = "contact")]
        entity: FieldEntity,
    },
    Add {
        label: String,
        #[arg(long, value_parser = parse_field_entity, default_value = "contact")]
        entity: FieldEntity,
        #[arg(long = "type", value_parser = parse_field_type, default_value = "text")]
        field_type: FieldType,
        #[arg(long)]
        required: bool,
        #[arg(long)]
        placeholder: Option<String>,
        #[arg(long, value_delimiter = ',')]
        options: Vec<String>,
    },
    Update {
        id: Id,
        #[arg(long)]
        label: Option<String>,
        #[arg(long = "type", value_parser = parse_field_type)]
        field_type: Option<FieldType>,
        #[arg(long)]
        required: Option<bool>,
        #[arg(long)]
        placeholder: Option<String>,
        #[arg(long, value_delimiter = ',')]
        options: Option<Vec<String>>,
    },
    Delete { id: Id },
}

fn parse_stage(s: &str) -> Result<Stage, String> {
    Stage::from_str(s).ok_or_else(|| format!("unknown stage '{}'", s))
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::from_str(s).ok_or_else(|| format!("unknown priority '{}'", s))
}

fn parse_field_entity(s: &str) -> Result<FieldEntity, String> {
    FieldEntity::from_str(s).ok_or_else(|| format!("custom fields apply to contact or deal, not '{}'", s))
}

fn parse_field_type(s: &str) -> Result<FieldType, String> {
    FieldType::from_str(s).ok_or_else(|| format!("unknown field type '{}'", s))
}

fn parse_due(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("expected YYYY-MM-DD or RFC 3339, got '{}'", s))
}

/// `KEY=VALUE`; the value is read as JSON when it parses, else as text.
fn parse_custom_value(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD_ID=VALUE, got '{}'", s))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.into()));
    Ok((key.trim().to_string(), value))
}

fn parse_view<T>(kind: &str, name: &str, parse: fn(&str) -> Option<T>) -> anyhow::Result<T> {
    parse(name).with_context(|| format!("unknown {} '{}'", kind, name))
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Commands::Serve {
        port: 3000,
        host: "127.0.0.1".into(),
    });
    let stores = cli.store.open()?;
    let service = CrmService::new(stores);

    match command {
        Commands::Serve { port, host } => serve(service, &host, port).await,
        Commands::Dashboard => show_dashboard(&service).await,
        Commands::Pipeline => show_pipeline(&service).await,
        Commands::MoveDeal { id, stage } => {
            match service.move_deal(id, stage).await? {
                Transition::Unchanged => println!("Deal {} is already in {}", id, stage.label()),
                Transition::Moved { deal, .. } => {
                    println!("Moved \"{}\" to {}", deal.title, deal.stage.label())
                }
            }
            Ok(())
        }
        Commands::Contacts { action } => contacts(&service, action).await,
        Commands::Deals { action } => deals(&service, action).await,
        Commands::Tasks { action } => tasks(&service, action).await,
        Commands::Activities {
            search,
            filter,
            sort,
        } => {
            let state = ViewState::new(
                search,
                parse_view("filter", &filter, ActivityFilter::from_str)?,
                parse_view("sort", &sort, ActivitySort::from_str)?,
            );
            let list = service.activity_list(&state, Utc::now()).await?;
            print_groups(&list.groups);
            Ok(())
        }
        Commands::Fields { action } => fields(&service, action).await,
    }
}

async fn serve(service: CrmService, host: &str, port: u16) -> anyhow::Result<()> {
    tracing::info!(
        "Starting Salesdeck server on port {} ({} store)",
        port,
        service.stores().backend_tag()
    );
    let app = api::router(service);
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("Salesdeck server listening on http://{}:{}", host, port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn show_dashboard(service: &CrmService) -> anyhow::Result<()> {
    let dash = service.load_dashboard(Utc::now()).await?;
    let s = &dash.stats;
    println!("Contacts:      {}", s.total_contacts);
    println!("Deals:         {} ({} won)", s.total_deals, s.won_deals);
    println!("Pipeline value {:.2}", s.total_value);
    println!("Win rate:      {}%", s.win_rate);
    println!("Active tasks:  {}", s.active_tasks);

    println!("\nRecent deals");
    for deal in &dash.recent_deals {
        println!("  #{:<4} {:<30} {:>12.2}  {}", deal.id, deal.title, deal.value, deal.stage.label());
    }
    println!("\nDue today");
    for task in &dash.todays_tasks {
        println!("  #{:<4} [{}] {}", task.id, task.status.as_str(), task.title);
    }
    println!("\nRecent activity");
    for activity in &dash.recent_activities {
        println!(
            "  {} {:<8} {}",
            activity.timestamp.format("%Y-%m-%d %H:%M"),
            activity.kind.as_str(),
            activity.description
        );
    }
    Ok(())
}

async fn show_pipeline(service: &CrmService) -> anyhow::Result<()> {
    let snapshot = service.load_pipeline().await?;
    let contact_name = |id: Id| {
        snapshot
            .contacts
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
            .unwrap_or("-")
    };
    let pipeline = snapshot.board.pipeline();
    for column in &pipeline.columns {
        println!("{} ({}) {:.2}", column.label, column.count(), column.total_value);
        for deal in &column.deals {
            println!(
                "  #{:<4} {:<30} {:>12.2}  {:>3}%  {}",
                deal.id,
                deal.title,
                deal.value,
                deal.probability,
                contact_name(deal.contact_id)
            );
        }
    }
    println!(
        "\nTotal {:.2}, win rate {}%",
        pipeline.total_value(),
        dashboard::win_rate(snapshot.board.deals())
    );
    Ok(())
}

fn print_contact(contact: &Contact) {
    println!(
        "#{:<4} {:<24} {:<28} {}",
        contact.id,
        contact.name,
        contact.email,
        contact.company.as_deref().unwrap_or("")
    );
}

fn print_task(task: &Task) {
    let due = task
        .due_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".into());
    println!(
        "#{:<4} [{:<11}] {:<6} {:<10} {}",
        task.id,
        task.status.as_str(),
        task.priority.as_str(),
        due,
        task.title
    );
}

fn print_groups(groups: &[ActivityGroup]) {
    for group in groups {
        println!("{}", group.label);
        for activity in &group.activities {
            println!(
                "  {} {:<8} {}",
                activity.timestamp.format("%H:%M"),
                activity.kind.as_str(),
                activity.description
            );
        }
    }
}

async fn contacts(service: &CrmService, action: ContactCommand) -> anyhow::Result<()> {
    match action {
        ContactCommand::List { search, tag, sort } => {
            let filter = tag.map(ContactFilter::Tag).unwrap_or_default();
            let state = ViewState::new(search, filter, parse_view("sort", &sort, ContactSort::from_str)?);
            let list = service.contact_list(&state, Utc::now()).await?;
            for contact in &list.records {
                print_contact(contact);
            }
            if !list.tags.is_empty() {
                println!("\nTags: {}", list.tags.join(", "));
            }
        }
        ContactCommand::Show { id } => {
            let overview = service.contact_overview(id).await?;
            let c = &overview.contact;
            print_contact(c);
            for (label, value) in [
                ("Phone", c.phone.as_deref()),
                ("Position", c.position.as_deref()),
            ] {
                if let Some(value) = value {
                    println!("  {}: {}", label, value);
                }
            }
            if !c.tags.is_empty() {
                println!("  Tags: {}", c.tags.join(", "));
            }
            println!("\nDeals");
            for deal in &overview.deals {
                println!("  #{:<4} {:<30} {:>12.2}  {}", deal.id, deal.title, deal.value, deal.stage.label());
            }
            println!("\nTasks");
            for task in &overview.tasks {
                print!("  ");
                print_task(task);
            }
            println!("\nActivity");
            print_groups(&dashboard::group_by_day(&overview.activities, Utc::now()));
        }
        ContactCommand::Add {
            name,
            email,
            phone,
            company,
            position,
            tags,
            fields,
        } => {
            let created = service
                .create_contact(CreateContactInput {
                    name,
                    email,
                    phone,
                    company,
                    position,
                    tags,
                    last_contacted_at: None,
                    custom_fields: fields.into_iter().collect(),
                })
                .await?;
            println!("Created contact #{}", created.record.id);
        }
        ContactCommand::Update {
            id,
            name,
            email,
            phone,
            company,
            position,
            tags,
        } => {
            let updated = service
                .update_contact(
                    id,
                    UpdateContactInput {
                        name,
                        email,
                        phone: phone.map(Some),
                        company: company.map(Some),
                        position: position.map(Some),
                        tags,
                        ..Default::default()
                    },
                )
                .await?;
            println!("Updated contact #{}", updated.record.id);
        }
        ContactCommand::Delete { id } => {
            service.delete_contact(id).await?;
            println!("Deleted contact #{}", id);
        }
    }
    Ok(())
}

async fn deals(service: &CrmService, action: DealCommand) -> anyhow::Result<()> {
    match action {
        DealCommand::Add {
            title,
            value,
            contact,
            stage,
            probability,
            close,
            fields,
        } => {
            let created = service
                .create_deal(CreateDealInput {
                    stage,
                    probability,
                    expected_close_date: close,
                    custom_fields: fields.into_iter().collect(),
                    ..CreateDealInput::new(title, value, contact)
                })
                .await?;
            println!("Created deal #{}", created.record.id);
        }
        DealCommand::Update {
            id,
            title,
            value,
            probability,
            close,
        } => {
            let updated = service
                .update_deal(
                    id,
                    UpdateDealInput {
                        title,
                        value,
                        probability,
                        expected_close_date: close.map(Some),
                        ..Default::default()
                    },
                )
                .await?;
            println!("Updated deal #{}", updated.record.id);
        }
        DealCommand::Delete { id } => {
            service.delete_deal(id).await?;
            println!("Deleted deal #{}", id);
        }
    }
    Ok(())
}

async fn tasks(service: &CrmService, action: TaskCommand) -> anyhow::Result<()> {
    match action {
        TaskCommand::List {
            search,
            filter,
            sort,
        } => {
            let state = ViewState::new(
                search,
                parse_view("filter", &filter, TaskFilter::from_str)?,
                parse_view("sort", &sort, TaskSort::from_str)?,
            );
            let list = service.task_list(&state, Utc::now()).await?;
            for task in &list.records {
                print_task(task);
            }
            let s = &list.stats;
            println!(
                "\n{} tasks, {} completed, {} overdue, {} due today",
                s.total, s.completed, s.overdue, s.due_today
            );
        }
        TaskCommand::Add {
            title,
            description,
            due,
            priority,
            contact,
            deal,
        } => {
            let created = service
                .create_task(CreateTaskInput {
                    title,
                    description,
                    due_date: due,
                    priority,
                    contact_id: contact,
                    deal_id: deal,
                    ..Default::default()
                })
                .await?;
            println!("Created task #{}", created.record.id);
        }
        TaskCommand::Toggle { id } => {
            let toggled = service.toggle_task(id).await?;
            println!("Task #{} is now {}", id, toggled.record.status.as_str());
        }
        TaskCommand::Delete { id } => {
            service.delete_task(id).await?;
            println!("Deleted task #{}", id);
        }
    }
    Ok(())
}

async fn fields(service: &CrmService, action: FieldCommand) -> anyhow::Result<()> {
    match action {
        FieldCommand::List { entity } => {
            for def in service.custom_fields(entity).await? {
                let required = if def.required { " (required)" } else { "" };
                print!("#{:<4} {:<24} {}{}", def.id, def.label, def.field_type.as_str(), required);
                if !def.options.is_empty() {
                    print!(" [{}]", def.options.join(", "));
                }
                println!();
            }
        }
        FieldCommand::Add {
            label,
            entity,
            field_type,
            required,
            placeholder,
            options,
        } => {
            let def = service
                .create_custom_field(CreateCustomFieldInput {
                    label,
                    field_type,
                    entity,
                    required,
                    placeholder,
                    options,
                })
                .await?;
            println!("Created field #{} (key {})", def.id, def.key());
        }
        FieldCommand::Update {
            id,
            label,
            field_type,
            required,
            placeholder,
            options,
        } => {
            let def = service
                .update_custom_field(
                    id,
                    UpdateCustomFieldInput {
                        label,
                        field_type,
                        required,
                        placeholder: placeholder.map(Some),
                        options,
                        ..Default::default()
                    },
                )
                .await?;
            println!("Updated field #{} ({})", def.id, def.field_type.as_str());
        }
        FieldCommand::Delete { id } => {
            service.delete_custom_field(id).await?;
            println!("Deleted field #{}", id);
        }
    }
    Ok(())
}
