//! Walks the full session lifecycle against a live backend.
//!
//! ```text
//! AGORA_URL=http://localhost:8000 cargo run -p login-flow -- <username> <password>
//! ```
//!
//! First run: logs in with the given credentials and persists the token
//! pair to `/tmp/agora-demo-credentials.json`. Subsequent runs (no
//! arguments needed) restore the session from that file without asking
//! for a password. Pass `--logout` to end the session.

use std::process::ExitCode;

use agora::prelude::*;
use tracing_subscriber::EnvFilter;

const CREDENTIAL_FILE: &str = "/tmp/agora-demo-credentials.json";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let base_url = std::env::var("AGORA_URL")
        .unwrap_or_else(|_| "http://localhost:8000".to_string());
    let args: Vec<String> = std::env::args().skip(1).collect();

    let client = AgoraClient::builder()
        .base_url(&base_url)
        .credential_file(CREDENTIAL_FILE)
        .build();

    // A real UI would subscribe before booting and render each snapshot;
    // here we just log the transitions as they arrive.
    let mut session = client.subscribe();
    tokio::spawn(async move {
        while session.changed().await.is_ok() {
            let snap = session.borrow_and_update().clone();
            tracing::debug!(?snap.state, loading = snap.is_loading(), "session changed");
        }
    });

    if args.first().map(String::as_str) == Some("--logout") {
        client.logout().await;
        println!("logged out");
        return ExitCode::SUCCESS;
    }

    client.boot(BootLocation::Elsewhere).await;

    if !client.snapshot().is_authenticated() {
        let [username, password] = args.as_slice() else {
            eprintln!("no stored session; usage: login-flow <username> <password>");
            return ExitCode::FAILURE;
        };
        match client.login(username, password).await {
            Ok(identity) => {
                tracing::info!(user = %identity.id, "logged in");
            }
            Err(AgoraError::Session(SessionError::UnverifiedAccount(msg))) => {
                eprintln!("account not verified: {msg}");
                return ExitCode::FAILURE;
            }
            Err(err) => {
                eprintln!("login failed: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    let snap = client.snapshot();
    let identity = snap.current_identity().expect("authenticated session");
    println!(
        "logged in as {} ({}), role: {}",
        identity.display_name, identity.username, identity.role
    );
    if snap.is_admin_or_moderator() {
        println!("moderation tools available");
    }

    client.shutdown();
    ExitCode::SUCCESS
}
