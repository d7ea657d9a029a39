// HTTP-level tests driving the full router through tower::ServiceExt::oneshot,
// with a recording notifier standing in for SMTP.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use jobportal_service::prelude::*;
use jobportal_service::server::notify::{RecordingNotifier, extract_code};
use serde_json::{Value, json};
use tower::ServiceExt;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

struct TestApp {
    state: AppState,
    notifier: Arc<RecordingNotifier>,
    root: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

impl TestApp {
    fn new() -> anyhow::Result<Self> {
        let root = std::env::temp_dir().join(format!(
            "jobportal_http_{}_{}",
            std::process::id(),
            NEXT_ID.fetch_add(1, Ordering::SeqCst)
        ));
        let data_dir = root.join("data").display().to_string();
        let uploads_dir = root.join("uploads").display().to_string();

        let config = Config::from_lookup(|key| match key {
            "JOBPORTAL_DATA_DIR" => Some(data_dir.clone()),
            "JOBPORTAL_UPLOADS_DIR" => Some(uploads_dir.clone()),
            _ => None,
        })?;

        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::build(&config, notifier.clone())?;
        Ok(TestApp {
            state,
            notifier,
            root,
        })
    }

    fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    async fn post_json(&self, uri: &str, body: Value) -> anyhow::Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?;
        send(self.router(), request).await
    }

    async fn get(&self, uri: &str) -> anyhow::Result<(StatusCode, Value)> {
        let request = Request::builder().uri(uri).body(Body::empty())?;
        send(self.router(), request).await
    }

    async fn register(&self, email: &str, password: &str) -> anyhow::Result<()> {
        let (status, _) = self
            .post_json(
                "/register",
                json!({
                    "full_name": "Test User",
                    "email": email,
                    "password": password,
                    "confirm_password": password
                }),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        Ok(())
    }

    fn last_code(&self, email: &str) -> String {
        let mail = self.notifier.last_to(email).expect("mail was sent");
        extract_code(&mail.body).expect("mail carries a code")
    }
}

async fn send(router: Router, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let response = router.oneshot(request).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

fn wrong_code(code: &str) -> String {
    let n: u32 = code.parse().unwrap_or(0);
    format!("{:06}", (n + 1) % 1_000_000)
}

#[tokio::test]
async fn health_reports_status() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let (status, body) = app.get("/health").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["pending_otps"], 0);
    Ok(())
}

#[tokio::test]
async fn register_then_login() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.register("ann@x.com", "s3cret").await?;

    let (status, body) = app
        .post_json(
            "/register",
            json!({
                "full_name": "Ann Again",
                "email": "ANN@x.com",
                "password": "other",
                "confirm_password": "other"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Email already exists");

    let (status, body) = app
        .post_json("/login", json!({"email": "ann@x.com", "password": "s3cret"}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");

    let (status, body) = app
        .post_json("/login", json!({"email": "ann@x.com", "password": "wrong"}))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid email or password");
    Ok(())
}

#[tokio::test]
async fn login_otp_happy_path_and_replay() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.register("a@x.com", "pw").await?;

    let (status, body) = app.post_json("/send-otp", json!({"email": "a@x.com"})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OTP sent successfully");

    let code = app.last_code("a@x.com");
    let (status, body) = app
        .post_json("/verify-otp", json!({"email": "a@x.com", "otp": code}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");

    let (status, body) = app
        .post_json("/verify-otp", json!({"email": "a@x.com", "otp": code}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid OTP");
    Ok(())
}

#[tokio::test]
async fn send_otp_for_unknown_email_is_404() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let (status, body) = app
        .post_json("/send-otp", json!({"email": "ghost@x.com"}))
        .await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Email not registered");
    assert_eq!(app.state.otps().pending(), 0);
    Ok(())
}

#[tokio::test]
async fn expired_otp_is_reported_once() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.register("b@x.com", "pw").await?;

    // Issue directly, backdated past the TTL
    let issued = chrono::Utc::now() - chrono::Duration::seconds(301);
    let code = app.state.otps().issue_at("b@x.com", issued);

    let (status, body) = app
        .post_json("/verify-otp", json!({"email": "b@x.com", "otp": code}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "OTP expired");

    let (_, body) = app
        .post_json("/verify-otp", json!({"email": "b@x.com", "otp": code}))
        .await?;
    assert_eq!(body["detail"], "Invalid OTP");
    Ok(())
}

#[tokio::test]
async fn reissue_invalidates_first_code() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.register("d@x.com", "pw").await?;

    app.post_json("/send-otp", json!({"email": "d@x.com"})).await?;
    let first = app.last_code("d@x.com");
    app.post_json("/send-otp", json!({"email": "d@x.com"})).await?;
    let second = app.last_code("d@x.com");

    if first != second {
        let (status, _) = app
            .post_json("/verify-otp", json!({"email": "d@x.com", "otp": first}))
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = app
        .post_json("/verify-otp", json!({"email": "d@x.com", "otp": second}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn failed_delivery_leaves_no_code() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.register("f@x.com", "pw").await?;
    app.notifier.set_failing(true);

    let (status, body) = app
        .post_json("/forgot-password", json!({"email": "f@x.com"}))
        .await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Failed to send OTP");
    assert_eq!(app.state.otps().pending(), 0);
    Ok(())
}

#[tokio::test]
async fn password_reset_end_to_end() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.register("c@x.com", "old-pw").await?;

    let (status, _) = app
        .post_json("/forgot-password", json!({"email": "c@x.com"}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let code = app.last_code("c@x.com");

    let (status, body) = app
        .post_json(
            "/reset-password",
            json!({"email": "c@x.com", "otp": wrong_code(&code), "new_password": "new-pw"}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid OTP");

    // The wrong attempt did not burn the code
    let (status, body) = app
        .post_json(
            "/reset-password",
            json!({"email": "c@x.com", "otp": code, "new_password": "new-pw"}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password reset successful");

    let (status, _) = app
        .post_json("/login", json!({"email": "c@x.com", "password": "new-pw"}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn expired_reset_code_keeps_old_password() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    app.register("r@x.com", "old-pw").await?;

    let issued = chrono::Utc::now() - chrono::Duration::seconds(301);
    let code = app.state.otps().issue_at("r@x.com", issued);

    let (status, body) = app
        .post_json(
            "/reset-password",
            json!({"email": "r@x.com", "otp": code, "new_password": "new-pw"}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "OTP expired");
    assert_eq!(app.state.otps().pending(), 0);

    let (status, _) = app
        .post_json("/login", json!({"email": "r@x.com", "password": "old-pw"}))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post_json("/login", json!({"email": "r@x.com", "password": "new-pw"}))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn unparsable_bodies_get_json_errors() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    let (status, body) = app
        .post_json("/verify-otp", json!({"email": "a@x.com"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().is_some_and(|d| d.contains("otp")));
    assert!(body["timestamp"].is_string());

    let (status, body) = app
        .post_json("/save-profile", json!({"firstName": "Ann"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri("/reset-password")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))?;
    let (status, body) = send(app.router(), request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
    assert!(body["timestamp"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri("/upload-resume")
        .body(Body::from("plain text"))?;
    let (status, body) = send(app.router(), request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn jobs_post_list_and_search() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    for (title, location, experience, skills) in [
        ("Rust Dev", "Pune", "4 years", vec!["Rust", "Axum"]),
        ("Data Eng", "Delhi", "2 years", vec!["Python", "Spark"]),
    ] {
        let (status, body) = app
            .post_json(
                "/post-job",
                json!({
                    "title": title,
                    "company": "Acme",
                    "location": location,
                    "experience": experience,
                    "salary": "20 LPA",
                    "jobType": "Full-time",
                    "workMode": "Remote",
                    "skills": skills,
                    "description": "Ship it",
                    "deadline": "2026-12-31"
                }),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert!(body["postedDate"].is_string());
    }

    let (status, body) = app.get("/jobs").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["title"], "Data Eng");
    assert_eq!(body[0]["id"], 2);

    let (status, body) = app
        .post_json("/search", json!({"skillset": "rust", "min_experience": 3}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"].as_array().map(Vec::len), Some(1));

    let (status, _) = app.post_json("/search", json!({})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post_json("/search", json!({"city": "Chennai"})).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "No jobs found");
    Ok(())
}

#[tokio::test]
async fn profiles_save_get_and_list() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    let (status, body) = app
        .post_json(
            "/save-profile",
            json!({
                "firstName": "Ann",
                "lastName": "Lee",
                "email": "ann@x.com",
                "mobileNumber": "9999999999",
                "gender": "F",
                "currentLocation": "Pune",
                "primarySkills": ["Rust", "SQL"],
                "currentCTC": "12 LPA"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Profile saved successfully");

    let (status, body) = app
        .post_json(
            "/save-profile",
            json!({
                "firstName": "",
                "lastName": "Lee",
                "email": "x@x.com",
                "mobileNumber": "",
                "gender": "M",
                "currentLocation": "Goa"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Missing required fields: firstName, mobileNumber");

    let (status, body) = app.get("/get-profile/ann@x.com").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentCTC"], "12 LPA");

    let (status, _) = app.get("/get-profile/nobody@x.com").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/profiles").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Ann Lee");
    assert_eq!(body[0]["skills"], json!(["Rust", "SQL"]));
    Ok(())
}

#[tokio::test]
async fn resume_upload_and_application() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let boundary = "XBOUNDARYX";

    let upload = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"ann_cv.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n%PDF-1.4 resume\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/upload-resume")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(upload))?;
    let (status, body) = send(app.router(), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fileName"], "ann_cv.pdf");
    assert!(app.state.resumes.dir().join("ann_cv.pdf").exists());

    let mut apply = String::new();
    for (name, value) in [
        ("name", "Ann"),
        ("email", "ann@x.com"),
        ("job_title", "Rust Dev"),
        ("company", "Acme"),
    ] {
        apply.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            boundary, name, value
        ));
    }
    apply.push_str(&format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"resume\"; filename=\"../apply_cv.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\nbytes\r\n--{b}--\r\n",
        b = boundary
    ));
    let request = Request::builder()
        .method("POST")
        .uri("/apply")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(apply))?;
    let (status, body) = send(app.router(), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Application submitted");
    assert!(app.state.resumes.dir().join("apply_cv.pdf").exists());
    Ok(())
}
