use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pform_core::{
    AttachmentOutcome, AttachmentSlot, AttachmentSource, FieldPath, FormConfig, FormStore,
    PathKey, PatientRecord, SessionCredential,
};

#[derive(Parser)]
#[command(name = "patient-form")]
#[command(about = "Fill in, check and submit patient registration forms")]
struct Cli {
    /// Form configuration file (YAML)
    #[arg(long, env = "PFORM_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Session token authorising the submission
    #[arg(long, env = "PFORM_SESSION_TOKEN", global = true, hide_env_values = true)]
    session_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill in a new patient form and prepare it for submission
    Create {
        #[command(flatten)]
        edits: FormEdits,
    },
    /// Edit an existing patient record and prepare the update
    Update {
        /// Record JSON as fetched from the record store
        #[arg(long)]
        record: PathBuf,
        /// Record identifier, when the JSON carries none
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        edits: FormEdits,
    },
    /// List required fields that are still empty
    Check {
        #[arg(long)]
        record: PathBuf,
    },
    /// Decode an attachment from a record into a file
    Extract {
        #[arg(long)]
        record: PathBuf,
        /// `photo` or `documentFile`
        #[arg(long, value_parser = parse_slot)]
        slot: AttachmentSlot,
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct FormEdits {
    /// Set a field, e.g. `bloodPressure.value=120/80`
    #[arg(long = "set", value_name = "PATH=VALUE", value_parser = parse_assignment)]
    sets: Vec<(String, String)>,
    /// Attach a file, e.g. `photo=face.jpg` or `documentFile=scan.bin@application/pdf`
    #[arg(long = "attach", value_name = "SLOT=FILE[@TYPE]", value_parser = parse_attachment)]
    attachments: Vec<AttachArg>,
    /// Write the submission payload here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
    /// Prepare the submission even if required fields are empty
    #[arg(long)]
    allow_incomplete: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AttachArg {
    slot: AttachmentSlot,
    path: PathBuf,
    media_type: Option<String>,
}

/// Entry point for the patient form CLI
///
/// # Environment Variables
/// - `PFORM_CONFIG`: form configuration file (same as `--config`)
/// - `PFORM_SESSION_TOKEN`: session token (same as `--session-token`)
/// - `RUST_LOG`: log filter; logs go to stderr so payloads on stdout stay clean
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("patient_form=info".parse()?)
                .add_directive("pform_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FormConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => FormConfig::default(),
    };
    let store = FormStore::new(Arc::new(config));

    match cli.command {
        Commands::Create { edits } => {
            let credential = credential(cli.session_token)?;
            fill_in(&store, edits.sets, edits.attachments).await?;
            submit(&store, credential, edits.output, edits.allow_incomplete).await?;
        }
        Commands::Update { record, id, edits } => {
            let credential = credential(cli.session_token)?;
            let mut existing = load_record(&record).await?;
            if let Some(id) = id {
                existing = existing.with_id(id);
            }
            if existing.id().is_none() {
                bail!("{} has no `_id`; pass --id", record.display());
            }
            store.hydrate(existing);
            fill_in(&store, edits.sets, edits.attachments).await?;
            submit(&store, credential, edits.output, edits.allow_incomplete).await?;
        }
        Commands::Check { record } => {
            store.hydrate(load_record(&record).await?);
            let missing = store.missing_configured();
            if !missing.is_empty() {
                bail!("missing required fields: {}", labels(&missing));
            }
            println!("All required fields are filled in.");
        }
        Commands::Extract {
            record,
            slot,
            output,
        } => {
            store.hydrate(load_record(&record).await?);
            let snapshot = store.snapshot();
            let Some(attachment) = snapshot.attachment(slot).encoded() else {
                bail!("{} holds no {slot}", record.display());
            };
            let bytes = attachment.decode()?;
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            tracing::info!(
                %slot,
                media_type = attachment.media_type(),
                bytes = bytes.len(),
                "extracted attachment"
            );
        }
    }

    Ok(())
}

fn credential(token: Option<String>) -> anyhow::Result<SessionCredential> {
    let Some(token) = token else {
        bail!("a session token is required (--session-token or PFORM_SESSION_TOKEN)");
    };
    Ok(SessionCredential::new(token)?)
}

async fn fill_in(
    store: &FormStore,
    sets: Vec<(String, String)>,
    attachments: Vec<AttachArg>,
) -> anyhow::Result<()> {
    for (path, value) in sets {
        store
            .apply_edit(&path, value)
            .with_context(|| format!("setting {path}"))?;
    }

    for attach in attachments {
        let mut source = AttachmentSource::from_path(&attach.path).await?;
        if let Some(media_type) = attach.media_type {
            source = source.with_declared_type(media_type);
        }
        match store.apply_attachment(attach.slot, source).await? {
            AttachmentOutcome::Applied => {}
            AttachmentOutcome::Superseded => {
                tracing::warn!(slot = %attach.slot, path = %attach.path.display(), "attachment superseded");
            }
        }
    }

    Ok(())
}

async fn submit(
    store: &FormStore,
    credential: SessionCredential,
    output: Option<PathBuf>,
    allow_incomplete: bool,
) -> anyhow::Result<()> {
    let missing = store.missing_configured();
    if !missing.is_empty() {
        if !allow_incomplete {
            bail!("missing required fields: {}", labels(&missing));
        }
        tracing::warn!(missing = missing.len(), "preparing incomplete submission");
    }

    let submission = store.submission(credential);
    let payload = submission.payload_json()?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, payload)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(mode = ?submission.mode, path = %path.display(), "submission prepared");
        }
        None => println!("{payload}"),
    }

    Ok(())
}

async fn load_record(path: &Path) -> anyhow::Result<PatientRecord> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    record_from_document(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Accepts either a bare record or a submission payload written by `create`/`update`.
fn record_from_document(text: &str) -> anyhow::Result<PatientRecord> {
    let value: Value = serde_json::from_str(text)?;
    let value = match value {
        Value::Object(mut map) if map.contains_key("mode") && map.contains_key("record") => {
            map.remove("record").unwrap_or_default()
        }
        other => other,
    };
    Ok(PatientRecord::from_value(value)?)
}

fn labels(missing: &[PathKey]) -> String {
    missing
        .iter()
        .map(|key| match FieldPath::resolve(key) {
            Ok(field) => field.label(),
            Err(_) => key.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (path, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=VALUE, got `{raw}`"))?;
    PathKey::parse(path).map_err(|e| e.to_string())?;
    Ok((path.to_owned(), value.to_owned()))
}

fn parse_slot(raw: &str) -> Result<AttachmentSlot, String> {
    AttachmentSlot::from_name(raw).ok_or_else(|| {
        let known: Vec<_> = AttachmentSlot::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown attachment slot `{raw}` (expected one of {})", known.join(", "))
    })
}

fn parse_attachment(raw: &str) -> Result<AttachArg, String> {
    let (slot, file) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SLOT=FILE[@TYPE], got `{raw}`"))?;
    let slot = parse_slot(slot)?;

    // A trailing `@type/subtype` declares the media type; other `@`s belong to the file name.
    let (file, media_type) = match file.rsplit_once('@') {
        Some((file, media_type)) if media_type.contains('/') => (file, Some(media_type.to_owned())),
        _ => (file, None),
    };
    if file.is_empty() {
        return Err(format!("missing file name in `{raw}`"));
    }

    Ok(AttachArg {
        slot,
        path: PathBuf::from(file),
        media_type,
    })
}
