use actix_web::http::StatusCode;
use actix_web::web;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SupabaseConfig;
use crate::storage::compress::{compress_image, CompressError, Compressed};
use crate::storage::forms::{ProfileForm, SelectedFile};
use crate::storage::inflight::InFlight;
use crate::storage::models::Profile;
use crate::supabase::{ObjectStore, ProviderError, ProviderResult, PutOptions, RowStore};

pub const FILE_PREFIX: &str = "cloud";
pub const PROFILE_PREFIX: &str = "profile_photos";
pub const CACHE_CONTROL_SECS: u32 = 3600;
const CONFLICT_COLUMN: &str = "email";

/// Why a submission did not go through. The display text is what the user
/// sees in the modal banner.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    Invalid(&'static str),

    #[error("Your form has expired, please reopen it.")]
    Expired,

    #[error("An upload from this form is already in progress.")]
    InFlight,

    #[error("Could not process the selected image.")]
    Compress(#[source] CompressError),

    #[error("Error checking for existing file: {0}")]
    Lookup(#[source] ProviderError),

    #[error("Error removing existing file: {0}")]
    Remove(#[source] ProviderError),

    #[error("Error uploading file to Supabase: {0}")]
    Store(#[source] ProviderError),

    #[error("Error saving profile information: {0}")]
    Save(#[source] ProviderError),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::Invalid(_) => StatusCode::BAD_REQUEST,
            UploadError::Expired => StatusCode::FORBIDDEN,
            UploadError::InFlight => StatusCode::CONFLICT,
            UploadError::Compress(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UploadError::Lookup(_)
            | UploadError::Remove(_)
            | UploadError::Store(_)
            | UploadError::Save(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Replace each whitespace run with `_`, then drop anything that cannot live
/// in a single path segment.
pub fn sanitize_object_name(name: &str) -> String {
    static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));
    or_generated(name, sanitize_filename::sanitize(WHITESPACE.replace_all(name, "_")))
}

/// Name for a generic upload. Spaces are kept.
pub fn file_object_name(name: &str) -> String {
    or_generated(name, sanitize_filename::sanitize(name))
}

/// Names such as `..` or `con.txt` sanitize to nothing and would address the
/// folder itself. Those get a random name that keeps the extension.
fn or_generated(original: &str, sanitized: String) -> String {
    if !sanitized.is_empty() {
        return sanitized;
    }
    let generated = Uuid::new_v4().to_string();
    let extension = Path::new(original)
        .extension()
        .and_then(OsStr::to_str)
        .map(sanitize_filename::sanitize)
        .unwrap_or_default();
    if extension.is_empty() {
        generated
    } else {
        format!("{}.{}", generated, extension)
    }
}

/// The upload pipeline and the profile list, shared by every handler.
pub struct StorageService {
    objects: Arc<dyn ObjectStore>,
    rows: Arc<dyn RowStore>,
    profile_table: String,
    public_base: String,
    in_flight: InFlight,
}

impl StorageService {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        rows: Arc<dyn RowStore>,
        config: &SupabaseConfig,
    ) -> Self {
        Self {
            objects,
            rows,
            profile_table: config.profile_table.clone(),
            public_base: config.public_storage_url.clone(),
            in_flight: InFlight::default(),
        }
    }

    pub fn public_base(&self) -> &str {
        &self.public_base
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// All profile rows in the order the table returns them. Rows that do
    /// not look like profiles are skipped.
    pub async fn list_profiles(&self) -> ProviderResult<Vec<Profile>> {
        let rows = self.rows.select_all(&self.profile_table).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Profile>(row) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!("skipping malformed {} row: {}", self.profile_table, e);
                    None
                }
            })
            .collect())
    }

    /// Store a generic upload at `cloud/<filename>`. Images are compressed
    /// first; everything else goes up byte for byte.
    pub async fn store_file(&self, file: SelectedFile) -> Result<String, UploadError> {
        let path = format!("{}/{}", FILE_PREFIX, file_object_name(&file.name));
        let (bytes, content_type) = if file.is_image() {
            let compressed = compress(file.bytes, file.content_type).await?;
            (compressed.bytes, compressed.content_type)
        } else {
            (file.bytes, file.content_type)
        };

        self.put_new(&path, bytes, content_type).await?;
        info!("stored {}", path);
        Ok(path)
    }

    /// Store the photo at `profile_photos/<sanitized name>`, replacing any
    /// object already there, then upsert the profile row pointing at it.
    ///
    /// Calls run one after another and stop at the first failure. Nothing
    /// done before a failure is undone.
    pub async fn save_profile(
        &self,
        form: ProfileForm,
        photo: SelectedFile,
    ) -> Result<Profile, UploadError> {
        let compressed = compress(photo.bytes, photo.content_type).await?;
        let name = sanitize_object_name(&photo.name);
        let path = format!("{}/{}", PROFILE_PREFIX, name);

        let existing = self
            .objects
            .list(PROFILE_PREFIX, &name)
            .await
            .map_err(UploadError::Lookup)?;
        if existing.iter().any(|entry| entry.name == name) {
            self.objects
                .remove(&[path.clone()])
                .await
                .map_err(UploadError::Remove)?;
            info!("removed existing {}", path);
        }

        self.put_new(&path, compressed.bytes, compressed.content_type)
            .await?;

        let profile = form.into_profile(path);
        let row = serde_json::to_value(&profile)
            .map_err(|e| UploadError::Save(ProviderError::new(e.to_string())))?;
        self.rows
            .upsert(&self.profile_table, row, CONFLICT_COLUMN)
            .await
            .map_err(UploadError::Save)?;

        info!("saved profile for {}", profile.email);
        Ok(profile)
    }

    async fn put_new(&self, path: &str, bytes: Vec<u8>, content_type: String) -> Result<(), UploadError> {
        let options = PutOptions {
            content_type,
            overwrite: false,
            cache_control_secs: CACHE_CONTROL_SECS,
        };
        self.objects
            .put(path, bytes, &options)
            .await
            .map_err(UploadError::Store)
    }
}

async fn compress(bytes: Vec<u8>, content_type: String) -> Result<Compressed, UploadError> {
    let original_len = bytes.len();
    let compressed = web::block(move || compress_image(&bytes, &content_type))
        .await
        .map_err(|_| CompressError::Cancelled)
        .and_then(|result| result)
        .map_err(|e| {
            tracing::error!("compression failed: {}", e);
            UploadError::Compress(e)
        })?;

    info!(
        "compressed image from {} to {} bytes",
        original_len,
        compressed.bytes.len()
    );
    Ok(compressed)
}
