use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Upload category; images and videos carry independent size and type policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Video,
}

impl MediaCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaCategory::Image => "image",
            MediaCategory::Video => "video",
        }
    }

    /// Folder used when the caller does not name one.
    pub fn default_folder(self) -> &'static str {
        match self {
            MediaCategory::Image => "images",
            MediaCategory::Video => "videos",
        }
    }
}

impl FromStr for MediaCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" | "images" => Ok(MediaCategory::Image),
            "video" | "videos" => Ok(MediaCategory::Video),
            _ => Err(anyhow::anyhow!(
                "Invalid media category: {}. Must be: image or video",
                s
            )),
        }
    }
}

impl Display for MediaCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaCategory::Image => write!(f, "Image"),
            MediaCategory::Video => write!(f, "Video"),
        }
    }
}

/// A file handed in by the user: name, declared MIME type and payload.
///
/// `content_type` is whatever the client claimed and may be empty or wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl MediaFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Lowercased extension without the dot, if the name has one.
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.name)
    }
}

/// Lowercased extension of `name` without the dot. Hidden-file style names
/// (`.env`) and names ending in a dot have none.
pub fn file_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.contains('/') {
        return None;
    }
    Some(ext.to_lowercase())
}

/// One user-initiated upload. Consumed by a single pipeline run.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: MediaFile,
    pub category: MediaCategory,
    /// Destination folder; `None` uses the category default.
    pub folder: Option<String>,
}

impl UploadRequest {
    pub fn new(file: MediaFile, category: MediaCategory) -> Self {
        Self {
            file,
            category,
            folder: None,
        }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn destination_folder(&self) -> &str {
        self.folder
            .as_deref()
            .filter(|f| !f.trim_matches('/').trim().is_empty())
            .unwrap_or_else(|| self.category.default_folder())
    }
}
