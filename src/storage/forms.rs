use actix_multipart::Multipart;
use futures::{StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::storage::models::{Gender, Profile, COUNTRIES};
use crate::storage::service::UploadError;

pub const MSG_FILL_ALL: &str = "Please fill in all the fields.";
pub const MSG_EMAIL: &str = "Please enter a valid email address.";
pub const MSG_DIGITS: &str = "Contact number should contain only digits.";
pub const MSG_CHOICE: &str = "Please choose an option from the list.";
pub const MSG_NO_IMAGE: &str = "Please select a valid image file.";
pub const MSG_NOT_IMAGE: &str = "Only image files can be used as a profile photo.";
pub const MSG_NO_FILE: &str = "Please select a file to upload!";
pub const MSG_TOO_LARGE: &str = "The selected file is too large.";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+@[A-Za-z0-9_.-]+\.[A-Za-z]{2,6}$").expect("email pattern")
});
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("digits pattern"));

/// Which flavour of the upload modal is in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    File,
    Profile,
}

impl UploadMode {
    pub fn action(self) -> &'static str {
        match self {
            UploadMode::File => "/storage/files",
            UploadMode::Profile => "/storage/profile",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Validate)]
pub struct ProfileForm {
    #[validate(length(min = 1, code = "required"))]
    pub account_name: String,
    #[validate(
        length(min = 1, code = "required"),
        regex(path = "EMAIL_RE", code = "email")
    )]
    pub email: String,
    #[validate(
        length(min = 1, code = "required"),
        regex(path = "DIGITS_RE", code = "digits")
    )]
    pub contact_number: String,
    #[validate(
        length(min = 1, code = "required"),
        custom(function = "validate_gender")
    )]
    pub gender: String,
    #[validate(
        length(min = 1, code = "required"),
        custom(function = "validate_country")
    )]
    pub country: String,
}

fn validate_gender(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<Gender>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("choice"))
}

fn validate_country(value: &str) -> Result<(), ValidationError> {
    if COUNTRIES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("choice"))
    }
}

impl ProfileForm {
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let field = |name: &str| fields.get(name).map(|v| v.trim().to_owned()).unwrap_or_default();
        Self {
            account_name: field("account_name"),
            email: field("email"),
            contact_number: field("contact_number"),
            gender: field("gender"),
            country: field("country"),
        }
    }

    /// Validate, reporting the first failing rule in a fixed order: empty
    /// fields, email, contact number, then list choices.
    pub fn check(&self) -> Result<(), UploadError> {
        let errors = match self.validate() {
            Ok(()) => return Ok(()),
            Err(errors) => errors,
        };
        let fields = errors.field_errors();
        let failed = |code: &str| {
            fields
                .values()
                .any(|errs| errs.iter().any(|e| e.code == code))
        };

        let message = if failed("required") {
            MSG_FILL_ALL
        } else if failed("email") {
            MSG_EMAIL
        } else if failed("digits") {
            MSG_DIGITS
        } else {
            MSG_CHOICE
        };
        Err(UploadError::Invalid(message))
    }

    pub fn into_profile(self, photo_url: String) -> Profile {
        Profile {
            account_name: self.account_name,
            email: self.email,
            contact_number: self.contact_number,
            gender: Some(self.gender),
            country: Some(self.country),
            photo_url: Some(photo_url),
        }
    }
}

/// A file picked in the browser, held only for the length of the request.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Everything one multipart upload form carried.
#[derive(Debug, Default)]
pub struct Submission {
    pub fields: HashMap<String, String>,
    pub file: Option<SelectedFile>,
    pub file_too_large: bool,
}

impl Submission {
    pub fn form_token(&self) -> &str {
        self.fields.get("form_token").map(String::as_str).unwrap_or("")
    }

    /// The selected file for a generic upload.
    pub fn require_file(&mut self) -> Result<SelectedFile, UploadError> {
        if self.file_too_large {
            return Err(UploadError::Invalid(MSG_TOO_LARGE));
        }
        self.file.take().ok_or(UploadError::Invalid(MSG_NO_FILE))
    }

    /// The selected file for a profile upload, which must be an image.
    pub fn require_image(&mut self) -> Result<SelectedFile, UploadError> {
        if self.file_too_large {
            return Err(UploadError::Invalid(MSG_TOO_LARGE));
        }
        match self.file.take() {
            None => Err(UploadError::Invalid(MSG_NO_IMAGE)),
            Some(file) if !file.is_image() => Err(UploadError::Invalid(MSG_NOT_IMAGE)),
            Some(file) => Ok(file),
        }
    }
}

/// Drain a multipart payload. Text parts land in `fields`; the part named
/// `file` becomes the selection. A file over `max_bytes` is dropped and
/// flagged rather than failing the read, so the other values survive.
pub async fn read_submission(mut payload: Multipart, max_bytes: usize) -> Result<Submission, AppError> {
    let mut submission = Submission::default();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Multipart(e.to_string()))?
    {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_owned();
        let filename = disposition.get_filename().map(str::to_owned);
        let content_type = field.content_type().to_string();

        let mut bytes = Vec::new();
        let mut overflow = false;
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::Multipart(e.to_string()))?;
            if overflow || bytes.len() + chunk.len() > max_bytes {
                overflow = true;
                continue;
            }
            bytes.extend_from_slice(&chunk);
        }

        match filename {
            Some(filename) if name == "file" => {
                if overflow {
                    submission.file_too_large = true;
                } else if !filename.is_empty() {
                    submission.file = Some(SelectedFile {
                        name: filename,
                        content_type,
                        bytes,
                    });
                }
            }
            _ if !overflow => {
                let value = String::from_utf8_lossy(&bytes).into_owned();
                submission.fields.insert(name, value);
            }
            _ => {}
        }
    }

    Ok(submission)
}
