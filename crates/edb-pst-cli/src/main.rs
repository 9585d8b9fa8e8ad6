//! Diagnostic binary wiring `edb-pst` end to end against a recorded JSONL
//! fixture. This is a dev-facing demonstrator, not a full CLI command
//! surface — that belongs to a surrounding collaborator.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use edb_pst::edb::entity::{EmailMessage, Entity, Folder, Importance, Mailbox, RecipientRef};
use edb_pst::eml::{parse_eml, MapiValue};
use edb_pst::export::eml::render_eml;
use edb_pst::lzxpress::decompress;
use edb_pst::messaging::writer::{assemble_pst, FolderContents};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a Unicode PST from a JSONL fixture of `{folder, subject, from,
    /// to, body}` rows.
    BuildPst {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Parse a raw `.eml` file and re-render it, exercising the EML -> MAPI
    /// -> EML round trip.
    RoundtripEml {
        #[arg(long)]
        input: PathBuf,
    },
    /// Decompress a raw LZXPRESS/ESE column and print its byte length.
    Decompress {
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct FixtureRow {
    folder: String,
    subject: String,
    from: String,
    to: Vec<String>,
    body: String,
    #[serde(default)]
    message_id: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.command {
        Command::BuildPst { input, output } => build_pst(&input, &output),
        Command::RoundtripEml { input } => roundtrip_eml(&input),
        Command::Decompress { input } => decompress_file(&input),
    }
}

/// Deterministically derives a 26-byte folder id from its path, so repeated
/// runs over the same fixture produce byte-identical PSTs.
fn folder_id_for(path: &str) -> [u8; 26] {
    let mut id = [0u8; 26];
    let digest = edb_pst::util::crc::compute_crc(0, path.as_bytes());
    id[..4].copy_from_slice(&digest.to_le_bytes());
    let len = path.len().min(22);
    id[4..4 + len].copy_from_slice(&path.as_bytes()[..len]);
    id
}

fn build_pst(input: &PathBuf, output: &PathBuf) -> anyhow::Result<()> {
    let file = fs::File::open(input)?;
    let reader = BufReader::new(file);

    let mut folder_order: Vec<String> = Vec::new();
    let mut entities_by_folder: std::collections::HashMap<String, Vec<Entity>> = std::collections::HashMap::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: FixtureRow = serde_json::from_str(&line)
            .map_err(|err| anyhow::anyhow!("fixture line {index}: {err}"))?;

        if !folder_order.contains(&row.folder) {
            folder_order.push(row.folder.clone());
        }

        let message = EmailMessage {
            record_index: index as u64,
            folder_id: folder_id_for(&row.folder),
            subject: row.subject,
            sender_name: split_name(&row.from).0,
            sender_email: split_name(&row.from).1,
            recipients_to: row
                .to
                .iter()
                .map(|addr| RecipientRef {
                    name: addr.clone(),
                    email: addr.clone(),
                })
                .collect(),
            recipients_cc: Vec::new(),
            recipients_bcc: Vec::new(),
            date_sent: None,
            date_received: None,
            message_id: row.message_id.unwrap_or_default(),
            importance: Importance::Normal,
            is_read: false,
            is_hidden: false,
            body_html: String::new(),
            body_text: row.body,
            attachments: Vec::new(),
            message_class: "IPM.Note".to_string(),
        };

        entities_by_folder
            .entry(row.folder.clone())
            .or_default()
            .push(Entity::Email(message));
    }

    let mailbox = Mailbox {
        mailbox_number: 1,
        guid: [0u8; 16],
        owner_display_name: "Fixture Mailbox".to_string(),
        message_count: folder_order.iter().map(|f| entities_by_folder[f].len() as u64).sum(),
        last_logon: None,
    };

    // `parent_id == [0; 26]` is the sentinel that marks a folder as the
    // root; it must appear on exactly one entry, with every other folder's
    // `parent_id` chaining up to some other entry's `folder_id`.
    let root_folder_id = folder_id_for("\0top-of-personal-folders");
    let root = Folder {
        folder_id: root_folder_id,
        parent_id: [0u8; 26],
        display_name: "Top of Personal Folders".to_string(),
        special_number: Some(1),
        message_count: 0,
    };

    let mut folders: Vec<Folder> = vec![root];
    // `path/to/folder` segments become nested folders, with each ancestor
    // created exactly once regardless of how many fixture rows reference it.
    let mut known: std::collections::HashSet<String> = std::collections::HashSet::new();
    for path in &folder_order {
        let mut built = String::new();
        for segment in path.split('/') {
            let parent_path = built.clone();
            if !built.is_empty() {
                built.push('/');
            }
            built.push_str(segment);
            if known.insert(built.clone()) {
                let parent_id = if parent_path.is_empty() {
                    root_folder_id
                } else {
                    folder_id_for(&parent_path)
                };
                folders.push(Folder {
                    folder_id: folder_id_for(&built),
                    parent_id,
                    display_name: segment.to_string(),
                    special_number: None,
                    message_count: 0,
                });
            }
        }
    }

    let contents: Vec<FolderContents> = folders
        .iter()
        .map(|folder| {
            let entities = folder_order
                .iter()
                .find(|path| folder_id_for(path) == folder.folder_id)
                .map(|path| entities_by_folder[path].iter().collect())
                .unwrap_or_default();
            FolderContents { folder, entities }
        })
        .collect();

    let bytes = assemble_pst(&mailbox, &contents, None)?;
    fs::write(output, &bytes)?;
    tracing::info!(bytes = bytes.len(), folders = folders.len(), "wrote pst");
    println!("wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

fn split_name(from: &str) -> (String, String) {
    if let Some(start) = from.find('<') {
        if let Some(end) = from.find('>') {
            let name = from[..start].trim().trim_matches('"').to_string();
            let email = from[start + 1..end].trim().to_string();
            return (name, email);
        }
    }
    (from.to_string(), from.to_string())
}

fn mapi_string(properties: &edb_pst::eml::MapiPropertySet, tag: u32) -> String {
    match properties.get(&tag) {
        Some(MapiValue::Unicode(s)) => s.clone(),
        _ => String::new(),
    }
}

fn roundtrip_eml(input: &PathBuf) -> anyhow::Result<()> {
    let raw = fs::read(input)?;
    let mapi = parse_eml(&raw)?;

    let message = EmailMessage {
        record_index: 0,
        folder_id: [0u8; 26],
        subject: mapi_string(&mapi.properties, edb_pst::eml::tags::PR_SUBJECT_W),
        sender_name: mapi_string(&mapi.properties, edb_pst::eml::tags::PR_SENDER_NAME_W),
        sender_email: mapi_string(&mapi.properties, edb_pst::eml::tags::PR_SENDER_EMAIL_ADDRESS_W),
        recipients_to: Vec::new(),
        recipients_cc: Vec::new(),
        recipients_bcc: Vec::new(),
        date_sent: None,
        date_received: None,
        message_id: String::new(),
        importance: Importance::Normal,
        is_read: true,
        is_hidden: false,
        body_html: String::new(),
        body_text: mapi_string(&mapi.properties, edb_pst::eml::tags::PR_BODY_W),
        attachments: Vec::new(),
        message_class: "IPM.Note".to_string(),
    };

    let rendered = render_eml(&message, None)?;
    println!("{}", String::from_utf8_lossy(&rendered));
    Ok(())
}

fn decompress_file(input: &PathBuf) -> anyhow::Result<()> {
    let raw = fs::read(input)?;
    let decoded = decompress(&raw)?;
    println!("decoded {} bytes from {} input bytes", decoded.len(), raw.len());
    Ok(())
}
