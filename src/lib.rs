pub mod server;

pub mod prelude {
    pub use crate::server::config::Config;
    pub use crate::server::error::{ApiError, ApiResult};
    pub use crate::server::handlers::{AppState, create_router};
    pub use crate::server::log;
    pub use crate::server::notify::{LogNotifier, Notifier, SmtpNotifier};
    pub use crate::server::otp::{OtpError, OtpPolicy, OtpRecord, OtpStore};
    pub use crate::server::schema::{
        Candidate, Employee, JobFilter, JobPost, MessageResponse, ProfileData, normalize_email,
    };
}
pub use crate::prelude::{OtpError, OtpStore};
