use crate::server::error::{ApiError, ApiResult};
use crate::server::schema::{Candidate, MessageResponse, ProfileData, normalize_email};
use crate::server::storage::DataStore;
use crate::{info, warn};
use chrono::Utc;

const UNKNOWN: &str = "Unknown";

#[derive(Clone)]
pub struct Profiles {
    store: DataStore<String, ProfileData>,
}

impl Profiles {
    pub fn new(store: DataStore<String, ProfileData>) -> Self {
        Profiles { store }
    }

    /// Creates or replaces the profile keyed by its email.
    pub fn save(&self, mut profile: ProfileData) -> ApiResult<MessageResponse> {
        profile.email = normalize_email(&profile.email);
        info!("Saving profile for email: {}", profile.email);

        let missing = missing_required_fields(&profile);
        if !missing.is_empty() {
            let fields = missing.join(", ");
            warn!("Missing required fields: {}", fields);
            return Err(ApiError::bad_request(format!(
                "Missing required fields: {}",
                fields
            )));
        }

        let email = profile.email.clone();
        self.store
            .upsert(email.clone(), profile)
            .map_err(|e| ApiError::internal("Error saving profile", e))?;

        info!("Profile saved successfully for {}", email);
        Ok(MessageResponse::new("Profile saved successfully"))
    }

    pub fn get(&self, email: &str) -> ApiResult<ProfileData> {
        let email = normalize_email(email);
        let profile = self
            .store
            .get(&email)
            .map_err(|e| ApiError::internal("Error retrieving profile", e))?;

        profile.ok_or_else(|| {
            warn!("Profile not found for {}", email);
            ApiError::not_found("Profile not found")
        })
    }

    /// Every profile as a candidate card, numbered in email order.
    pub fn candidates(&self) -> ApiResult<Vec<Candidate>> {
        let mut entries = self
            .store
            .entries()
            .map_err(|e| ApiError::internal("Error fetching profiles", e))?;
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        let resume_updated = Utc::now().to_rfc3339();
        let candidates: Vec<Candidate> = entries
            .into_iter()
            .enumerate()
            .map(|(i, (_, profile))| to_candidate(i as u64 + 1, profile, &resume_updated))
            .collect();

        info!("Retrieved {} candidate profiles", candidates.len());
        Ok(candidates)
    }
}

fn missing_required_fields(profile: &ProfileData) -> Vec<&'static str> {
    [
        ("firstName", &profile.first_name),
        ("lastName", &profile.last_name),
        ("email", &profile.email),
        ("mobileNumber", &profile.mobile_number),
        ("gender", &profile.gender),
        ("currentLocation", &profile.current_location),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect()
}

fn to_candidate(id: u64, profile: ProfileData, resume_updated: &str) -> Candidate {
    Candidate {
        id,
        name: format!("{} {}", profile.first_name, profile.last_name),
        role: UNKNOWN.to_string(),
        company: UNKNOWN.to_string(),
        experience: "0 years".to_string(),
        location: profile.current_location,
        ctc: profile.current_ctc.unwrap_or_default(),
        notice_period: profile.notice_period.unwrap_or_default(),
        degree: profile.highest_qualification.unwrap_or_default(),
        university: profile.university.unwrap_or_default(),
        passing_year: UNKNOWN.to_string(),
        skills: profile
            .primary_skills
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        gender: profile.gender,
        category: "General".to_string(),
        resume_updated: resume_updated.to_string(),
    }
}
