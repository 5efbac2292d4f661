use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use logbook_api::client::{HttpRpcBackend, NotesClient};
use logbook_api::config::ClientConfig;
use logbook_api::logbook::export::{
    csv_filename, export_csv, export_json, format_timestamp, json_filename, read_import_file,
};
use logbook_api::logbook::filter::{filter_notes, FilterCriteria};
use logbook_api::logbook::form::{build_payload, form_from_note, recategorize_payload, NoteForm};
use logbook_api::logbook::projection::{project_all, ProjectedNote};
use logbook_api::models::note::{CategoryFields, Note, NoteCategory, NotePatch};

#[derive(Parser)]
#[command(name = "logbook", version, about = "Service logbook for an agent/asset")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List visible notes, newest first
    List {
        /// Category id or name
        #[arg(long)]
        category: Option<String>,
        /// Case-insensitive text search
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Add a note
    Add(NoteArgs),
    /// Change only the given fields of a note; everything else stays as stored
    Edit {
        note_id: String,
        #[command(flatten)]
        changes: EditArgs,
    },
    /// Move a note to another category, dropping the old category's data
    Recategorize {
        note_id: String,
        /// New category name; omit to clear
        #[arg(long)]
        category: Option<String>,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Remove a note
    Remove { note_id: String },
    /// Write all notes to a file
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Output path; defaults to a name derived from the asset
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import notes from a JSON export or a bare array of notes
    Import { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[derive(Args)]
struct NoteArgs {
    #[arg(long)]
    text: String,
    #[arg(long)]
    subject: Option<String>,
    /// Business category name, e.g. "Stack installs"
    #[arg(long)]
    category: Option<String>,
    /// Visible to external viewers
    #[arg(long)]
    external: bool,
    #[command(flatten)]
    fields: FieldArgs,
}

#[derive(Args)]
struct EditArgs {
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    /// Visible to external viewers
    #[arg(long)]
    external: Option<bool>,
    #[command(flatten)]
    fields: FieldArgs,
}

/// Category-specific values. Only those owned by the chosen category are kept.
#[derive(Args)]
struct FieldArgs {
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long)]
    software_version: Option<String>,
    #[arg(long)]
    software_type: Option<String>,
    #[arg(long)]
    workorder: Option<String>,
    /// JSON array of stack entries for stack categories,
    /// e.g. '[{"identifier":"a","serial":"SN1"}]'
    #[arg(long)]
    stacks: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ClientConfig::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={level},logbook_api={level}",
                env!("CARGO_CRATE_NAME"),
                level = &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let backend = HttpRpcBackend::new(&config.api_url, config.identity.clone())?;
    let mut client = NotesClient::new(backend);

    match cli.command {
        Command::List { category, query } => {
            client.load().await?;
            let projected = project_all(client.notes(), &config.projection_context());
            let criteria = FilterCriteria {
                category_id: category.map(|c| resolve_category_id(&config, &c)).transpose()?,
                query,
            };
            let visible = filter_notes(&projected, &criteria, config.visibility());
            for note in &visible {
                print_note(note);
            }
            info!(shown = visible.len(), total = projected.len(), "listed notes");
        }
        Command::Add(args) => {
            let form = note_form(&args)?;
            let payload = build_payload(&form, &config.form_context())?;
            let note = client.add(&payload).await?;
            println!("Added note {}", note.id);
        }
        Command::Edit { note_id, changes } => {
            let note = find_note(&mut client, &note_id).await?;
            let mut form = form_from_note(&note);
            if let Some(text) = changes.text {
                form.text = text;
            }
            if let Some(subject) = changes.subject {
                form.subject = Some(subject);
            }
            if let Some(external) = changes.external {
                form.external = external;
            }
            apply_fields(&mut form, &changes.fields)?;
            let payload = build_payload(&form, &config.form_context())?;
            let patch = NotePatch::changes(&note, &payload);
            if patch.is_empty() {
                println!("Nothing to change on note {note_id}");
                return Ok(());
            }
            client.edit(&note_id, &patch).await?;
            println!("Updated note {note_id}");
        }
        Command::Recategorize {
            note_id,
            category,
            fields,
        } => {
            let note = find_note(&mut client, &note_id).await?;
            let category = match category.as_deref() {
                Some(name) => Some(
                    NoteCategory::parse(name)
                        .with_context(|| format!("Unknown note category '{name}'"))?,
                ),
                None => None,
            };
            let mut form = form_from_note(&note);
            form.note_category = category.map(|c| c.as_str().to_string());
            apply_fields(&mut form, &fields)?;
            let payload = recategorize_payload(&note, category, &form, &config.form_context())?;
            client.edit(&note_id, &NotePatch::changes(&note, &payload)).await?;
            println!("Moved note {note_id}");
        }
        Command::Remove { note_id } => {
            client.remove(&note_id).await;
            println!("Removed note {note_id}");
        }
        Command::Export { format, out } => {
            let asset_name = config.asset_name.clone().unwrap_or_default();
            let (contents, default_name) = match format {
                ExportFormat::Csv => {
                    client.load().await?;
                    let projected = project_all(client.notes(), &config.projection_context());
                    let visible: Vec<ProjectedNote> = filter_notes(
                        &projected,
                        &FilterCriteria::default(),
                        config.visibility(),
                    )
                    .into_iter()
                    .cloned()
                    .collect();
                    (export_csv(&visible), csv_filename(&asset_name))
                }
                ExportFormat::Json => {
                    let bundle = client.export_data().await?;
                    (export_json(&bundle)?, json_filename(&asset_name))
                }
            };
            let path = out.unwrap_or_else(|| PathBuf::from(default_name));
            std::fs::write(&path, contents)
                .with_context(|| format!("Could not write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        Command::Import { file } => {
            let batch = read_import_file(&file)?;
            if batch.is_empty() {
                warn!("nothing to import");
            }
            let summary = client.import_data(&batch).await?;
            println!(
                "Imported {} notes, skipped {}",
                summary.imported, summary.skipped
            );
        }
    }

    Ok(())
}

fn resolve_category_id(config: &ClientConfig, raw: &str) -> Result<i64> {
    if let Ok(id) = raw.trim().parse::<i64>() {
        return Ok(id);
    }
    config
        .categories
        .id_for_name(raw)
        .with_context(|| format!("No category named '{raw}' is configured"))
}

async fn find_note(client: &mut NotesClient<HttpRpcBackend>, note_id: &str) -> Result<Note> {
    client.load().await?;
    match client.notes().iter().find(|n| n.id == note_id) {
        Some(note) => Ok(note.clone()),
        None => bail!("No note with id {note_id}"),
    }
}

fn note_form(args: &NoteArgs) -> Result<NoteForm> {
    let mut form = NoteForm {
        text: args.text.clone(),
        subject: args.subject.clone(),
        note_category: args.category.clone(),
        external: args.external,
        ..Default::default()
    };
    apply_fields(&mut form, &args.fields)?;
    Ok(form)
}

/// Copies the given flag values into the form and leaves the rest alone.
/// `--stacks` is decoded as the entry type of the form's category.
fn apply_fields(form: &mut NoteForm, args: &FieldArgs) -> Result<()> {
    if !args.tags.is_empty() {
        form.tag_numbers = args.tags.clone();
    }
    if args.software_version.is_some() {
        form.software_version = args.software_version.clone();
    }
    if args.software_type.is_some() {
        form.software_type = args.software_type.clone();
    }
    if args.workorder.is_some() {
        form.workorder_id = args.workorder.clone();
    }

    let Some(raw) = &args.stacks else {
        return Ok(());
    };
    let entries: Value = serde_json::from_str(raw).context("--stacks must be a JSON array")?;
    let category = form
        .note_category
        .as_deref()
        .and_then(NoteCategory::parse)
        .filter(NoteCategory::has_stack_entries)
        .context("--stacks needs a stack category")?;

    let field = CategoryFields::owned_by(category)[0];
    let mut current = serde_json::to_value(&*form)?;
    current[field] = entries;
    *form = serde_json::from_value(current)
        .with_context(|| format!("--stacks does not match the '{category}' entry shape"))?;
    Ok(())
}

fn print_note(projected: &ProjectedNote) {
    let note = &projected.note;
    println!(
        "{}  {}  {}  [{}]",
        note.id,
        format_timestamp(note.created_on),
        projected.author_name,
        projected.category_label
    );
    if let Some(subject) = note.subject.as_deref().filter(|s| !s.is_empty()) {
        println!("  {subject}");
    }
    println!("  {}", projected.body_text);
    if !projected.editor_name.is_empty() {
        println!("  edited by {}", projected.editor_name);
    }
    if let Some(extra) = category_summary(&note.fields) {
        println!("  {extra}");
    }
}

fn category_summary(fields: &CategoryFields) -> Option<String> {
    match serde_json::to_value(fields).ok()? {
        Value::Object(map) if !map.is_empty() => Some(Value::Object(map).to_string()),
        _ => None,
    }
}
