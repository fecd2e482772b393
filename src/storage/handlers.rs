use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::http::{self, StatusCode};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tracing::{error, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::AppResult;
use crate::render;
use crate::storage::forms::{read_submission, ProfileForm, Submission, UploadMode};
use crate::storage::models::{Gender, ProfileCard, COUNTRIES};
use crate::storage::service::{StorageService, UploadError};

const FORM_TOKEN_KEY: &str = "form_token";
const FLASH_KEY: &str = "flash";
const LIST_ERROR: &str = "Error fetching users from Supabase.";

#[derive(Deserialize)]
pub struct StorageQuery {
    pub upload: Option<UploadMode>,
}

#[derive(Serialize)]
struct ModalView {
    mode: UploadMode,
    action: &'static str,
    token: String,
    values: ProfileForm,
    error: Option<String>,
}

impl ModalView {
    fn new(mode: UploadMode, token: String, values: ProfileForm, error: Option<String>) -> Self {
        Self {
            mode,
            action: mode.action(),
            token,
            values,
            error,
        }
    }
}

fn page_context() -> Context {
    let mut context = Context::new();
    context.insert("title", "Cloud Storage");
    context.insert("genders", &Gender::ALL);
    context.insert("countries", &COUNTRIES);
    context
}

pub async fn storage_get(
    session: Session,
    tera: web::Data<Tera>,
    service: web::Data<StorageService>,
    query: web::Query<StorageQuery>,
) -> AppResult<HttpResponse> {
    let mut context = page_context();

    let flash: Option<String> = session.get(FLASH_KEY)?;
    if flash.is_some() {
        session.remove(FLASH_KEY);
    }
    context.insert("flash", &flash);

    insert_profiles(&mut context, &service).await;

    if let Some(mode) = query.upload {
        let token = issue_form_token(&session)?;
        context.insert(
            "modal",
            &ModalView::new(mode, token, ProfileForm::default(), None),
        );
    }

    render(&tera, "storage/index.html", &context, StatusCode::OK)
}

async fn insert_profiles(context: &mut Context, service: &StorageService) {
    match service.list_profiles().await {
        Ok(profiles) => {
            let cards: Vec<ProfileCard> = profiles
                .into_iter()
                .map(|p| ProfileCard::new(p, service.public_base()))
                .collect();
            context.insert("profiles", &cards);
        }
        Err(e) => {
            error!("fetching profiles failed: {}", e);
            context.insert("list_error", LIST_ERROR);
        }
    }
}

pub async fn upload_profile_post(
    session: Session,
    tera: web::Data<Tera>,
    service: web::Data<StorageService>,
    upload: web::Data<UploadConfig>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let mut submission = read_submission(payload, upload.max_bytes).await?;
    let form = ProfileForm::from_fields(&submission.fields);

    match submit_profile(&session, &service, &mut submission, form.clone()).await {
        Ok(()) => finish(&session, "Profile Uploaded!"),
        Err(err) => {
            reject(&session, &tera, &service, UploadMode::Profile, &submission, form, err).await
        }
    }
}

async fn submit_profile(
    session: &Session,
    service: &StorageService,
    submission: &mut Submission,
    form: ProfileForm,
) -> Result<(), UploadError> {
    verify_form_token(session, submission.form_token())?;
    let _busy = service
        .in_flight()
        .claim(submission.form_token())
        .ok_or(UploadError::InFlight)?;

    form.check()?;
    let photo = submission.require_image()?;
    service.save_profile(form, photo).await?;
    Ok(())
}

pub async fn upload_file_post(
    session: Session,
    tera: web::Data<Tera>,
    service: web::Data<StorageService>,
    upload: web::Data<UploadConfig>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let mut submission = read_submission(payload, upload.max_bytes).await?;

    match submit_file(&session, &service, &mut submission).await {
        Ok(()) => finish(&session, "File uploaded successfully!"),
        Err(err) => {
            reject(
                &session,
                &tera,
                &service,
                UploadMode::File,
                &submission,
                ProfileForm::default(),
                err,
            )
            .await
        }
    }
}

async fn submit_file(
    session: &Session,
    service: &StorageService,
    submission: &mut Submission,
) -> Result<(), UploadError> {
    verify_form_token(session, submission.form_token())?;
    let _busy = service
        .in_flight()
        .claim(submission.form_token())
        .ok_or(UploadError::InFlight)?;

    let file = submission.require_file()?;
    service.store_file(file).await?;
    Ok(())
}

fn issue_form_token(session: &Session) -> AppResult<String> {
    let token = Uuid::new_v4().to_string();
    session.insert(FORM_TOKEN_KEY, &token)?;
    Ok(token)
}

fn verify_form_token(session: &Session, submitted: &str) -> Result<(), UploadError> {
    match session.get::<String>(FORM_TOKEN_KEY) {
        Ok(Some(expected)) if !submitted.is_empty() && expected == submitted => Ok(()),
        _ => Err(UploadError::Expired),
    }
}

/// Close the modal and send the browser back to a freshly read list.
fn finish(session: &Session, message: &str) -> AppResult<HttpResponse> {
    session.insert(FLASH_KEY, message)?;
    session.remove(FORM_TOKEN_KEY);
    Ok(HttpResponse::SeeOther()
        .append_header((http::header::LOCATION, "/storage"))
        .finish())
}

/// Re-render the modal with the banner and the values the user typed.
///
/// Submissions refused before any provider call leave the list empty behind
/// the modal so they stay free of network calls; failures that already
/// reached the provider read the list again.
async fn reject(
    session: &Session,
    tera: &Tera,
    service: &StorageService,
    mode: UploadMode,
    submission: &Submission,
    values: ProfileForm,
    err: UploadError,
) -> AppResult<HttpResponse> {
    let refused = matches!(
        err,
        UploadError::Invalid(_)
            | UploadError::Expired
            | UploadError::InFlight
            | UploadError::Compress(_)
    );
    if refused {
        warn!("{:?} upload rejected: {}", mode, err);
    } else {
        error!("{:?} upload failed: {}", mode, err);
    }

    let token = match err {
        UploadError::Expired => issue_form_token(session)?,
        _ => submission.form_token().to_owned(),
    };

    let mut context = page_context();
    if !refused {
        insert_profiles(&mut context, service).await;
    }
    context.insert(
        "modal",
        &ModalView::new(mode, token, values, Some(err.to_string())),
    );
    render(tera, "storage/index.html", &context, err.status())
}
