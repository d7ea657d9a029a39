use crate::server::crypto::{hash_password, verify_password};
use crate::server::error::{ApiError, ApiResult};
use crate::server::notify::Notifier;
use crate::server::otp::OtpStore;
use crate::server::schema::{
    Employee, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    ResetPasswordRequest, normalize_email,
};
use crate::server::storage::DataStore;
use crate::{info, warn};
use chrono::Utc;
use std::sync::Arc;

/// Which flow an OTP is issued for. Both share the same store and rules,
/// they differ only in wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Login,
    PasswordReset,
}

impl OtpPurpose {
    fn subject(self) -> &'static str {
        match self {
            OtpPurpose::Login => "Your OTP for Login",
            OtpPurpose::PasswordReset => "Password Reset OTP",
        }
    }

    fn body(self, code: &str, validity: &str) -> String {
        match self {
            OtpPurpose::Login => {
                format!("Your OTP code is: {}.\n\nIt is valid for {}.", code, validity)
            }
            OtpPurpose::PasswordReset => {
                format!("Your OTP is: {}.\n\nIt is valid for {}.", code, validity)
            }
        }
    }

    fn not_registered(self) -> &'static str {
        match self {
            OtpPurpose::Login => "Email not registered",
            OtpPurpose::PasswordReset => "Email not found",
        }
    }
}

/// Employee registry plus the two OTP flows built on top of it.
#[derive(Clone)]
pub struct Accounts {
    employees: DataStore<String, Employee>,
    otps: OtpStore,
    notifier: Arc<dyn Notifier>,
}

impl Accounts {
    pub fn new(
        employees: DataStore<String, Employee>,
        otps: OtpStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Accounts {
            employees,
            otps,
            notifier,
        }
    }

    pub fn otps(&self) -> &OtpStore {
        &self.otps
    }

    pub fn exists(&self, email: &str) -> ApiResult<bool> {
        self.employees
            .contains_key(&normalize_email(email))
            .map_err(|e| ApiError::internal("Failed to read employee registry", e))
    }

    pub fn register(&self, req: &RegisterRequest) -> ApiResult<MessageResponse> {
        let email = require_email(&req.email)?;
        info!("Register attempt for email: {}", email);

        if req.full_name.trim().is_empty() {
            return Err(ApiError::bad_request("Full name is required"));
        }
        if req.password.is_empty() {
            return Err(ApiError::bad_request("Password is required"));
        }
        if req.password != req.confirm_password {
            warn!("Passwords do not match for {}", email);
            return Err(ApiError::bad_request("Passwords do not match"));
        }

        let employee = Employee {
            full_name: req.full_name.trim().to_string(),
            email: email.clone(),
            password_hash: hash_password(&req.password),
            created_at: Utc::now().to_rfc3339(),
        };

        let created = self
            .employees
            .insert_new(email.clone(), employee)
            .map_err(|e| ApiError::internal("Failed to save employee", e))?;
        if !created {
            warn!("Email {} already registered", email);
            return Err(ApiError::Conflict("Email already exists".to_string()));
        }

        info!("User {} registered successfully", email);
        Ok(MessageResponse::new("User registered successfully"))
    }

    pub fn login(&self, req: &LoginRequest) -> ApiResult<LoginResponse> {
        let email = require_email(&req.email)?;
        info!("Login attempt for email: {}", email);

        let employee = self
            .employees
            .get(&email)
            .map_err(|e| ApiError::internal("Failed to read employee registry", e))?;

        let valid = match &employee {
            Some(employee) => verify_password(&req.password, &employee.password_hash)
                .map_err(|e| ApiError::internal("Stored password hash is unreadable", e))?,
            None => false,
        };

        if !valid {
            warn!("Invalid login attempt for {}", email);
            return Err(ApiError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }

        info!("User {} logged in successfully", email);
        Ok(LoginResponse {
            message: "Login successful".to_string(),
            email,
        })
    }

    pub async fn send_login_otp(&self, email: &str) -> ApiResult<MessageResponse> {
        self.issue_and_dispatch(email, OtpPurpose::Login).await?;
        Ok(MessageResponse::new("OTP sent successfully"))
    }

    pub fn verify_login_otp(&self, email: &str, otp: &str) -> ApiResult<MessageResponse> {
        let email = require_email(email)?;
        info!("OTP verification attempt for email: {}", email);

        self.consume_otp(&email, otp)?;

        info!("OTP verified successfully for {}", email);
        Ok(MessageResponse::new("Login successful"))
    }

    pub async fn forgot_password(&self, email: &str) -> ApiResult<MessageResponse> {
        self.issue_and_dispatch(email, OtpPurpose::PasswordReset)
            .await?;
        Ok(MessageResponse::new("OTP sent successfully"))
    }

    /// Consumes the reset OTP, then stores the new password hash.
    pub fn reset_password(&self, req: &ResetPasswordRequest) -> ApiResult<MessageResponse> {
        let email = require_email(&req.email)?;
        info!("Password reset attempt for email: {}", email);

        if req.new_password.is_empty() {
            return Err(ApiError::bad_request("New password is required"));
        }

        self.consume_otp(&email, &req.otp)?;

        let password_hash = hash_password(&req.new_password);
        let updated = self
            .employees
            .update(&email, |employee| employee.password_hash = password_hash)
            .map_err(|e| ApiError::internal("Failed to update password", e))?;

        if updated.is_none() {
            warn!("Password reset for {} but the account is gone", email);
            return Err(ApiError::not_found("Email not found"));
        }

        info!("Password updated for {}", email);
        Ok(MessageResponse::new("Password reset successful"))
    }

    fn consume_otp(&self, email: &str, otp: &str) -> ApiResult<()> {
        self.otps
            .verify_and_consume(email, otp.trim())
            .map_err(|reason| {
                warn!("OTP rejected for {}: {}", email, reason);
                ApiError::from(reason)
            })
    }

    /// Issues a code for a registered email and hands it to the notifier.
    /// Delivery and the rollback of an undelivered code both run on the
    /// blocking pool, so they finish even if the request is dropped.
    async fn issue_and_dispatch(&self, email: &str, purpose: OtpPurpose) -> ApiResult<()> {
        let email = require_email(email)?;
        info!("{:?} OTP request for email: {}", purpose, email);

        if !self.exists(&email)? {
            warn!("Email {} not registered", email);
            return Err(ApiError::not_found(purpose.not_registered()));
        }

        let code = self.otps.issue(&email);
        let subject = purpose.subject();
        let body = purpose.body(&code, &validity_text(self.otps.policy().ttl));

        let notifier = Arc::clone(&self.notifier);
        let otps = self.otps.clone();
        let to = email.clone();
        let issued = code.clone();
        let delivery = tokio::task::spawn_blocking(move || {
            let sent = notifier.send(&to, subject, &body);
            if sent.is_err() {
                let revoked = otps.revoke(&to, &issued);
                warn!("Failed to send OTP to {} (code revoked: {})", to, revoked);
            }
            sent
        })
        .await;

        let cause = match delivery {
            Ok(Ok(())) => {
                info!("{:?} OTP sent successfully to {}", purpose, email);
                return Ok(());
            }
            Ok(Err(e)) => e,
            Err(join_err) => {
                // The notifier panicked before the rollback could run
                self.otps.revoke(&email, &code);
                anyhow::anyhow!("Notifier task failed: {}", join_err)
            }
        };

        Err(ApiError::internal("Failed to send OTP", cause))
    }
}

fn require_email(raw: &str) -> ApiResult<String> {
    let email = normalize_email(raw);
    if email.is_empty() {
        return Err(ApiError::bad_request("Email is required"));
    }
    Ok(email)
}

fn validity_text(ttl: chrono::Duration) -> String {
    let secs = ttl.num_seconds();
    match secs {
        60 => "1 minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{} seconds", s),
    }
}
