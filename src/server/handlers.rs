use crate::server::config::Config;
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::{Json, Path};
use crate::server::jobs::JobBoard;
use crate::server::notify::{LogNotifier, Notifier, SmtpNotifier};
use crate::server::otp::OtpStore;
use crate::server::profiles::Profiles;
use crate::server::schema::{
    ApplicationResponse, Candidate, JobFilter, JobPost, JobSearchResponse, LoginRequest,
    LoginResponse, MessageResponse, OtpRequest, ProfileData, RegisterRequest,
    ResetPasswordRequest, ResumeUploadResponse, VerifyOtpRequest,
};
use crate::server::service::Accounts;
use crate::server::storage::DataStore;
use crate::server::uploads::ResumeStore;
use crate::{info, warn};
use anyhow::Result;
use axum::Router;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub accounts: Accounts,
    pub jobs: JobBoard,
    pub profiles: Profiles,
    pub resumes: ResumeStore,
    pub start_time: Instant,
}

impl AppState {
    /// Opens the persistent stores and picks a notifier from the config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let notifier: Arc<dyn Notifier> = match &config.smtp {
            Some(smtp) => {
                info!("Mail delivery via SMTP relay {}", smtp.host);
                Arc::new(SmtpNotifier::new(&smtp.host, &smtp.user, &smtp.password)?)
            }
            None => {
                warn!("SMTP not configured, OTP mails will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Self::build(config, notifier)
    }

    pub fn build(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let employees = DataStore::open(config.employees_path())?;
        let profiles = DataStore::open(config.profiles_path())?;

        Ok(AppState {
            accounts: Accounts::new(employees, OtpStore::new(config.otp_policy()), notifier),
            jobs: JobBoard::default(),
            profiles: Profiles::new(profiles),
            resumes: ResumeStore::new(config.uploads_dir.clone()),
            start_time: Instant::now(),
        })
    }

    pub fn otps(&self) -> &OtpStore {
        self.accounts.otps()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/search", post(search_jobs))
        .route("/jobs", get(list_jobs))
        .route("/post-job", post(post_job))
        .route("/apply", post(apply_for_job))
        .route("/upload-resume", post(upload_resume))
        .route("/save-profile", post(save_profile))
        .route("/get-profile/{email}", get(get_profile))
        .route("/profiles", get(list_profiles))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime_hrs = state.start_time.elapsed().as_secs_f64() / 3600.0;

    Json(serde_json::json!({
        "status": "healthy",
        "uptime_hours": format!("{:.2}", uptime_hrs),
        "pending_otps": state.otps().pending(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let response = state.accounts.register(&payload)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(state.accounts.login(&payload)?))
}

async fn send_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    Ok(Json(state.accounts.send_login_otp(&payload.email).await?))
}

async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    Ok(Json(
        state
            .accounts
            .verify_login_otp(&payload.email, &payload.otp)?,
    ))
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    Ok(Json(state.accounts.forgot_password(&payload.email).await?))
}

async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    Ok(Json(state.accounts.reset_password(&payload)?))
}

async fn search_jobs(
    State(state): State<AppState>,
    Json(filter): Json<JobFilter>,
) -> ApiResult<Json<JobSearchResponse>> {
    info!("Job search request received");
    let jobs = state.jobs.search(&filter).await?;
    Ok(Json(JobSearchResponse { jobs }))
}

async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobPost>> {
    Json(state.jobs.list().await)
}

async fn post_job(State(state): State<AppState>, Json(job): Json<JobPost>) -> Json<JobPost> {
    Json(state.jobs.post(job).await)
}

async fn apply_for_job(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ApplicationResponse>> {
    let form = read_form(multipart?, "resume").await?;

    let name = form.text("name")?;
    let email = form.text("email")?;
    let job_title = form.text("job_title")?;
    let company = form.text("company")?;
    info!(
        "Job application attempt by {} ({}) for {} at {}",
        name, email, job_title, company
    );

    let (file_name, bytes) = form.file("resume")?;
    let (_, path) = state.resumes.save(file_name, bytes).await?;

    Ok(Json(ApplicationResponse {
        message: "Application submitted".to_string(),
        file_saved: path.display().to_string(),
    }))
}

async fn upload_resume(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ResumeUploadResponse>> {
    let form = read_form(multipart?, "file").await?;
    let (file_name, bytes) = form.file("file")?;
    info!("Uploading resume: {}", file_name);

    let (stored, _) = state.resumes.save(file_name, bytes).await?;

    Ok(Json(ResumeUploadResponse {
        file_name: stored,
        message: "Resume uploaded successfully".to_string(),
    }))
}

async fn save_profile(
    State(state): State<AppState>,
    Json(profile): Json<ProfileData>,
) -> ApiResult<Json<MessageResponse>> {
    Ok(Json(state.profiles.save(profile)?))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<ProfileData>> {
    info!("Fetching profile for email: {}", email);
    Ok(Json(state.profiles.get(&email)?))
}

async fn list_profiles(State(state): State<AppState>) -> ApiResult<Json<Vec<Candidate>>> {
    Ok(Json(state.profiles.candidates()?))
}

/// Text fields plus the single file field of a multipart form.
struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<(String, Vec<u8>)>,
}

impl UploadForm {
    fn text(&self, name: &str) -> ApiResult<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::bad_request(format!("Missing form field: {}", name)))
    }

    fn file(&self, name: &str) -> ApiResult<(&str, &[u8])> {
        self.file
            .as_ref()
            .map(|(file_name, bytes)| (file_name.as_str(), bytes.as_slice()))
            .ok_or_else(|| ApiError::bad_request(format!("Missing file field: {}", name)))
    }
}

async fn read_form(mut multipart: Multipart, file_field: &str) -> ApiResult<UploadForm> {
    let mut form = UploadForm {
        fields: HashMap::new(),
        file: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == file_field {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
            form.file = Some((file_name, bytes.to_vec()));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read field: {}", e)))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
