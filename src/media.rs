//! Media upload policies and validation ahead of the object store.

use crate::error::{CoreError, CoreResult};
use crate::storage::ObjectStore;
use uuid::Uuid;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Avatar,
    Cover,
    Post,
    Story,
}

impl MediaKind {
    pub fn bucket(self) -> &'static str {
        match self {
            MediaKind::Avatar => "avatars",
            MediaKind::Cover => "covers",
            MediaKind::Post => "post-media",
            MediaKind::Story => "story-media",
        }
    }

    pub fn max_bytes(self) -> u64 {
        match self {
            MediaKind::Avatar => 5 * MIB,
            MediaKind::Cover => 10 * MIB,
            MediaKind::Post => 50 * MIB,
            MediaKind::Story => 100 * MIB,
        }
    }

    pub fn allows(self, category: MediaCategory) -> bool {
        match self {
            MediaKind::Avatar | MediaKind::Cover => category == MediaCategory::Image,
            MediaKind::Post | MediaKind::Story => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Image,
    Video,
}

pub fn category_of(mime: &str) -> Option<MediaCategory> {
    if mime.starts_with("image/") {
        Some(MediaCategory::Image)
    } else if mime.starts_with("video/") {
        Some(MediaCategory::Video)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub struct MediaService {
    store: ObjectStore,
}

impl MediaService {
    pub fn new(store: ObjectStore) -> Self {
        Self { store }
    }

    /// Validates the upload against the kind's policy, then persists it and
    /// returns the public URL. The declared content type must match what the
    /// bytes actually look like.
    pub async fn store_media(&self, kind: MediaKind, upload: MediaUpload) -> CoreResult<String> {
        let declared = category_of(&upload.mime).ok_or_else(|| {
            CoreError::validation(format!("unsupported content type: {}", upload.mime))
        })?;
        if !kind.allows(declared) {
            return Err(CoreError::validation(format!(
                "{} uploads only accept images",
                kind.bucket()
            )));
        }
        let size = upload.data.len() as u64;
        if size == 0 {
            return Err(CoreError::validation("upload is empty"));
        }
        if size > kind.max_bytes() {
            return Err(CoreError::validation(format!(
                "upload of {size} bytes exceeds the {} limit of {} bytes",
                kind.bucket(),
                kind.max_bytes()
            )));
        }
        if let Some(sniffed) = infer::get(&upload.data) {
            if category_of(sniffed.mime_type()) != Some(declared) {
                return Err(CoreError::validation(format!(
                    "declared type {} does not match file contents ({})",
                    upload.mime,
                    sniffed.mime_type()
                )));
            }
        }

        let key = object_key(&upload.file_name);
        self.store.upload(kind.bucket(), &key, &upload.data).await?;
        Ok(self.store.public_url(kind.bucket(), &key))
    }
}

fn object_key(file_name: &str) -> String {
    let id = Uuid::new_v4();
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(char::is_alphanumeric) => {
            format!("{id}.{}", ext.to_ascii_lowercase())
        }
        _ => id.to_string(),
    }
}
