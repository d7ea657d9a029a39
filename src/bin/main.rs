use anyhow::Result;
use jobportal_service::prelude::*;
use jobportal_service::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    info!("Starting Job Portal Service...");

    let config = Config::from_env()?;
    let state = AppState::from_config(&config)?;

    state.resumes.ensure_dir().await?;
    info!("Uploads directory ensured: {}", state.resumes.dir().display());

    start_otp_reaper(state.otps().clone(), config.otp_reaper_interval_secs);

    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_time = chrono::Local::now();

    info!("Server listening on {}", addr);
    info!("Server started at {}", server_time.to_rfc3339().yellow());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Drops expired OTPs that nobody came back to verify.
fn start_otp_reaper(otps: OtpStore, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            let removed = otps.purge_expired();
            if removed > 0 {
                info!("Cleaned up {} expired OTP(s)", removed);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
