//! Folio CLI: upload, check and delete media from the command line.
//!
//! Storage is configured from the environment (or a `.env` file); see
//! `StorageConfig::from_env` for the variables.

use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_cli::{init_tracing, progress_line, resolve_content_type, ErrorReport};
use folio_core::{
    MediaCategory, MediaError, MediaFile, MediaUrls, NoOpProgress, StorageConfig, UploadPolicy,
    UploadRequest, UploadStage,
};
use folio_processing::{default_decoder, is_heic, prepare_file, HeicConverter, MediaUploader};
use folio_storage::create_storage;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "folio", about = "Upload media to the configured object store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Media category: image or video
        #[arg(long, default_value = "image")]
        category: MediaCategory,
        /// Destination folder (defaults to images/ or videos/)
        #[arg(long)]
        folder: Option<String>,
        /// Declared MIME type; guessed from the extension when omitted
        #[arg(long)]
        content_type: Option<String>,
        /// Hide progress output
        #[arg(long)]
        quiet: bool,
    },
    /// Convert and validate a file without uploading it
    Check {
        /// File to check
        file: PathBuf,
        /// Media category: image or video
        #[arg(long, default_value = "image")]
        category: MediaCategory,
        /// Declared MIME type; guessed from the extension when omitted
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Delete previously uploaded media by URL
    Delete {
        /// A URL, a JSON array of URLs, or a JSON string
        urls: String,
    },
}

#[derive(Serialize)]
struct CheckOutcome {
    name: String,
    content_type: String,
    size_bytes: u64,
    converted: bool,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn report_failure(err: &MediaError) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(&ErrorReport::from(err)).context("Serialize error")?;
    eprintln!("{}", out);
    Ok(())
}

async fn read_media_file(path: &Path, content_type: Option<&str>) -> anyhow::Result<MediaFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    Ok(MediaFile::new(name, resolve_content_type(path, content_type), data))
}

async fn build_uploader() -> anyhow::Result<MediaUploader> {
    let config = StorageConfig::from_env().context("Failed to load storage configuration")?;
    config.validate()?;
    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage backend")?;
    Ok(MediaUploader::new(storage, UploadPolicy::default()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut failed = false;

    match cli.command {
        Commands::Upload {
            files,
            category,
            folder,
            content_type,
            quiet,
        } => {
            let uploader = build_uploader().await?;

            let mut names = Vec::with_capacity(files.len());
            let mut requests = Vec::with_capacity(files.len());
            for path in &files {
                let file = read_media_file(path, content_type.as_deref()).await?;
                names.push(file.name.clone());
                let request = UploadRequest::new(file, category);
                requests.push(match &folder {
                    Some(folder) => request.with_folder(folder.clone()),
                    None => request,
                });
            }

            let results = uploader
                .upload_all(requests, &|index: usize, stage: UploadStage, percent: u8| {
                    if !quiet {
                        let name = names.get(index).map(String::as_str).unwrap_or_default();
                        eprintln!("{}", progress_line(index, name, stage, percent));
                    }
                })
                .await;

            let mut stored = Vec::new();
            for result in results {
                match result {
                    Ok(object) => stored.push(object),
                    Err(e) => {
                        failed = true;
                        report_failure(&e)?;
                    }
                }
            }
            print_json(&stored)?;
        }
        Commands::Check {
            file,
            category,
            content_type,
        } => {
            let policy = UploadPolicy::default();
            let media = read_media_file(&file, content_type.as_deref()).await?;

            let converted = category == MediaCategory::Image
                && is_heic(&media.name, &media.content_type);
            let converter = HeicConverter::new(default_decoder(), policy.jpeg_quality);
            let outcome = prepare_file(&policy, &converter, media, category, &NoOpProgress).await;

            match outcome {
                Ok(media) => print_json(&CheckOutcome {
                    name: media.name.clone(),
                    content_type: media.content_type.clone(),
                    size_bytes: media.size(),
                    converted,
                })?,
                Err(e) => {
                    failed = true;
                    report_failure(&e)?;
                }
            }
        }
        Commands::Delete { urls } => {
            let urls = MediaUrls::parse(&urls).context("Invalid URL list")?;
            if urls.is_empty() {
                anyhow::bail!("No URLs given");
            }

            let uploader = build_uploader().await?;
            let mut deleted = Vec::new();
            for url in urls.iter() {
                match uploader.delete(url).await {
                    Ok(()) => deleted.push(url.to_string()),
                    Err(e) => {
                        failed = true;
                        report_failure(&e)?;
                    }
                }
            }
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
