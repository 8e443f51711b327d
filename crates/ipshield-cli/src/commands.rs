use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use ipshield_crypto::ContentHasher;
use ipshield_ledger::LedgerGateway;
use ipshield_sdk::{
    size_label, AssetMetadata, AssetRecord, AssetRegistry, AssetStatus, NetworkId, RegistrationStream,
    Verification,
};

use crate::cli::*;
use crate::config::ClientConfig;
use crate::devnet::Devnet;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let open = || -> anyhow::Result<Devnet> {
        Devnet::open(ClientConfig::load(cli.config.as_deref())?)
    };
    match cli.command {
        Command::Hash(args) => cmd_hash(&args, format).await,
        Command::Register(args) => cmd_register(&open()?, args, format).await,
        Command::Verify(args) => cmd_verify(&open()?, args, format).await,
        Command::List => cmd_list(&open()?, format).await,
        Command::Networks => cmd_networks(&open()?, format).await,
        Command::Status => cmd_status(&open()?, format).await,
    }
}

async fn cmd_hash(args: &HashArgs, format: OutputFormat) -> anyhow::Result<()> {
    let fingerprint = ContentHasher::new()
        .hash_file(&args.file)
        .await
        .with_context(|| format!("hashing {}", args.file.display()))?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "file": args.file,
            "fingerprint": fingerprint,
        }))?,
        OutputFormat::Text => println!("{}  {}", fingerprint, args.file.display()),
    }
    Ok(())
}

async fn cmd_register(devnet: &Devnet, args: RegisterArgs, format: OutputFormat) -> anyhow::Result<()> {
    if args.name.is_some() && args.files.len() > 1 {
        anyhow::bail!("--name applies to a single file");
    }
    let session = Arc::new(devnet.session());
    let registry = AssetRegistry::new(session.clone());
    let network = session.network().await?;

    // Submit everything up front; the writes settle concurrently.
    let mut streams: Vec<RegistrationStream> = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?
            .len();
        let fingerprint = registry
            .fingerprint_file(path)
            .await
            .with_context(|| format!("hashing {}", path.display()))?;
        let name = args.name.clone().unwrap_or_else(|| file_name(path));
        let media_type = args
            .media_type
            .clone()
            .unwrap_or_else(|| guess_media_type(path).to_string());
        let metadata = AssetMetadata::new(name, media_type, size_label(size));
        streams.push(registry.submit(fingerprint, metadata));
    }

    let mut settled = Vec::with_capacity(streams.len());
    let mut fatal = None;
    for mut stream in streams {
        while let Some(update) = stream.next().await {
            match update {
                Ok(record) => {
                    if format == OutputFormat::Text {
                        print_record(&record, &network);
                    }
                    if record.status.is_terminal() {
                        settled.push(record);
                    }
                }
                Err(e) => {
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
            }
        }
    }
    devnet.save()?;

    if let Some(e) = fatal {
        return Err(e.into());
    }
    if format == OutputFormat::Json {
        print_json(&settled)?;
    }
    Ok(())
}

async fn cmd_verify(devnet: &Devnet, args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let session = Arc::new(devnet.session());
    let registry = AssetRegistry::new(session.clone());
    let verification = match (&args.fingerprint, &args.file) {
        (Some(input), _) => registry.verify_fingerprint(input).await?,
        (None, Some(path)) => {
            let fingerprint = registry
                .fingerprint_file(path)
                .await
                .with_context(|| format!("hashing {}", path.display()))?;
            registry.verify(&fingerprint).await?
        }
        (None, None) => anyhow::bail!("a fingerprint or --file is required"),
    };

    if format == OutputFormat::Json {
        return print_json(&verification);
    }
    match &verification {
        Verification::Found { record, registrant } => {
            print_record(record, &session.network().await?);
            println!("  Registrant: {}", registrant.to_string().cyan());
        }
        Verification::NotFound => {
            println!("{} No registration found for this content.", "○".dimmed());
        }
    }
    Ok(())
}

async fn cmd_list(devnet: &Devnet, format: OutputFormat) -> anyhow::Result<()> {
    let session = Arc::new(devnet.session());
    let registry = AssetRegistry::new(session.clone());
    let records = registry.list_all().await?;
    if format == OutputFormat::Json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No registered assets.");
        return Ok(());
    }
    let network = session.network().await?;
    for record in &records {
        print_record(record, &network);
    }
    println!("\n{} registered", records.len().to_string().bold());
    Ok(())
}

async fn cmd_networks(devnet: &Devnet, format: OutputFormat) -> anyhow::Result<()> {
    let current = devnet.session().network().await?;
    let networks: Vec<_> = devnet
        .deployments()
        .networks()
        .map(|(id, location)| {
            serde_json::json!({
                "network": id,
                "name": id.display_name(),
                "registry": location,
                "current": *id == current,
            })
        })
        .collect();
    if format == OutputFormat::Json {
        return print_json(&networks);
    }
    if networks.is_empty() {
        println!("No deployments.");
    }
    for (id, location) in devnet.deployments().networks() {
        let marker = if *id == current { "*".green().bold() } else { " ".normal() };
        println!("{} {:<10} {:<18} {}", marker, id.as_str(), id.display_name(), location.to_string().dimmed());
    }
    Ok(())
}

async fn cmd_status(devnet: &Devnet, format: OutputFormat) -> anyhow::Result<()> {
    let session = Arc::new(devnet.session());
    let registry = AssetRegistry::new(session.clone());
    let identity = registry.connect().await?;
    let network = session.network().await?;
    let location = session.registry_location().await?;
    let summary = registry.summary();

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "network": network,
            "network_name": network.display_name(),
            "registry": location,
            "identity": identity,
            "summary": summary,
        }));
    }
    println!("Network:  {} ({})", session.network_name().await.bold(), network);
    println!("Registry: {}", location.to_string().cyan());
    println!("Identity: {}", identity.to_string().cyan());
    println!("Assets:   {}", summary);
    for (kind, count) in &summary.by_kind {
        println!("  {:<9} {}", kind.as_str(), count);
    }
    Ok(())
}

fn print_record(record: &AssetRecord, network: &NetworkId) {
    let meta = &record.metadata;
    match &record.status {
        AssetStatus::Pending { .. } => {
            println!("{} {} {}", "…".yellow(), meta.display_name.bold(), "pending".yellow());
        }
        AssetStatus::Confirmed {
            write_reference,
            registered_at,
        } => {
            println!("{} {} {}", "✓".green().bold(), meta.display_name.bold(), "confirmed".green());
            println!("  Registered: {}", registered_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("  Write:      {}", write_reference.to_string().yellow());
            if let Some(url) = network.explorer_tx_url(write_reference) {
                println!("  Explorer:   {}", url.blue());
            }
        }
        AssetStatus::Failed { reason } => {
            println!("{} {} {}", "✗".red().bold(), meta.display_name.bold(), "failed".red());
            println!("  Reason:     {}", reason);
        }
    }
    if !matches!(record.status, AssetStatus::Pending { .. }) {
        println!("  Fingerprint: {}", record.fingerprint.to_string().dimmed());
        println!("  Type: {}  Size: {}", meta.media_type, meta.size_label);
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Media type from the file extension.
fn guess_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
