use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Lowercased, trimmed email used as the key for accounts, profiles and OTPs.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// Accounts

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Employee {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Deserialize, Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Deserialize, Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct LoginResponse {
    pub message: String,
    pub email: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OtpRequest {
    pub email: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Deserialize, Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        MessageResponse {
            message: message.into(),
        }
    }
}

// Jobs

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobPost {
    #[serde(default)]
    pub id: Option<u64>,
    pub title: String,
    pub company: String,
    pub location: String,
    pub experience: String,
    pub salary: String,
    pub job_type: String,
    pub work_mode: String,
    pub skills: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub posted_date: Option<NaiveDate>,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub applicants: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct JobFilter {
    pub skillset: Option<String>,
    pub city: Option<String>,
    pub min_experience: Option<u32>,
    pub work_mode: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct JobSearchResponse {
    pub jobs: Vec<JobPost>,
}

// Profiles

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub avatar: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_number: String,
    pub gender: String,
    pub current_location: String,
    pub highest_qualification: Option<String>,
    pub university: Option<String>,
    #[serde(default)]
    pub primary_skills: Vec<String>,
    pub project_details: Option<String>,
    pub notice_period: Option<String>,
    pub preferred_salary: Option<String>,
    pub resume_file_name: Option<String>,
    pub address: Option<String>,
    pub physically_challenged: Option<String>,
    pub preferred_location: Option<String>,
    #[serde(rename = "currentCTC")]
    pub current_ctc: Option<String>,
    pub visa: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: u64,
    pub name: String,
    pub role: String,
    pub company: String,
    pub experience: String,
    pub location: String,
    pub ctc: String,
    pub notice_period: String,
    pub degree: String,
    pub university: String,
    pub passing_year: String,
    pub skills: Vec<String>,
    pub gender: String,
    pub category: String,
    pub resume_updated: String,
}

// Uploads

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResumeUploadResponse {
    pub file_name: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApplicationResponse {
    pub message: String,
    pub file_saved: String,
}

#[test]
fn test_normalize_email() {
    assert_eq!(normalize_email("  Ann@Example.COM "), "ann@example.com");
}

#[test]
fn test_job_post_wire_names() -> anyhow::Result<()> {
    let job: JobPost = serde_json::from_value(serde_json::json!({
        "title": "Backend Engineer",
        "company": "Acme",
        "location": "Pune",
        "experience": "3 years",
        "salary": "12 LPA",
        "jobType": "Full-time",
        "workMode": "Remote",
        "skills": ["Rust", "SQL"],
        "description": "Build services",
        "deadline": "2026-12-31"
    }))?;

    assert_eq!(job.id, None);
    assert_eq!(job.applicants, 0);
    assert_eq!(job.work_mode, "Remote");

    let value = serde_json::to_value(&job)?;
    assert!(value.get("jobType").is_some());
    assert!(value.get("postedDate").is_some());
    Ok(())
}

#[test]
fn test_profile_ctc_field_name() -> anyhow::Result<()> {
    let profile: ProfileData = serde_json::from_value(serde_json::json!({
        "firstName": "Ann",
        "lastName": "Lee",
        "email": "ann@x.com",
        "mobileNumber": "999",
        "gender": "F",
        "currentLocation": "Pune",
        "primarySkills": ["Rust"],
        "currentCTC": "10 LPA"
    }))?;

    assert_eq!(profile.current_ctc.as_deref(), Some("10 LPA"));
    assert_eq!(profile.avatar, None);
    Ok(())
}
