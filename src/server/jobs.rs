use crate::info;
use crate::server::error::{ApiError, ApiResult};
use crate::server::schema::{JobFilter, JobPost};
use chrono::Local;
use rayon::prelude::*;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory job listings, newest first.
#[derive(Clone, Default)]
pub struct JobBoard {
    jobs: Arc<RwLock<Vec<JobPost>>>,
}

impl JobBoard {
    pub async fn list(&self) -> Vec<JobPost> {
        self.jobs.read().await.clone()
    }

    /// Stamps the id and posting date and puts the job at the top.
    pub async fn post(&self, mut job: JobPost) -> JobPost {
        let mut jobs = self.jobs.write().await;
        job.id = Some(jobs.len() as u64 + 1);
        job.posted_date = Some(Local::now().date_naive());
        jobs.insert(0, job.clone());
        info!("Job posted successfully with ID: {}", jobs.len());
        job
    }

    pub async fn search(&self, filter: &JobFilter) -> ApiResult<Vec<JobPost>> {
        if !filter.has_criteria() {
            return Err(ApiError::bad_request(
                "At least one filter must be provided",
            ));
        }

        let jobs = self.jobs.read().await;
        let matches: Vec<JobPost> = jobs
            .par_iter()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();

        if matches.is_empty() {
            info!("No jobs found for the provided filters");
            return Err(ApiError::not_found("No jobs found"));
        }

        info!("Found {} jobs matching filters", matches.len());
        Ok(matches)
    }
}

impl JobFilter {
    pub fn has_criteria(&self) -> bool {
        non_blank(&self.skillset).is_some()
            || non_blank(&self.city).is_some()
            || self.min_experience.is_some()
            || non_blank(&self.work_mode).is_some()
    }

    pub fn matches(&self, job: &JobPost) -> bool {
        if let Some(skill) = non_blank(&self.skillset) {
            let needle = skill.to_lowercase();
            if !job
                .skills
                .iter()
                .any(|s| s.to_lowercase().contains(&needle))
            {
                return false;
            }
        }

        if let Some(city) = non_blank(&self.city) {
            if !job.location.trim().eq_ignore_ascii_case(city) {
                return false;
            }
        }

        if let Some(min) = self.min_experience {
            match experience_years(&job.experience) {
                Some(years) if years >= min => {}
                _ => return false,
            }
        }

        if let Some(mode) = non_blank(&self.work_mode) {
            if !job.work_mode.trim().eq_ignore_ascii_case(mode) {
                return false;
            }
        }

        true
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Leading whole number of an experience label such as "3 years" or "2-4 yrs".
pub fn experience_years(label: &str) -> Option<u32> {
    let digits: String = label
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
