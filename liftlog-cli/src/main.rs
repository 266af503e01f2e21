//! liftlog: terminal front end for the Liftlog session tracker
//!
//! Talks to a running `liftlog-server` over HTTP and renders its snapshot.
//!
//! # Subcommands
//! - `history [--json]`: recorded sessions, most recent first
//! - `add --exercise <e> --weight <kg> --reps <n>`: record a session
//! - `delete <id>`: delete a session
//! - `exercises`: distinct exercises
//! - `chart <exercise>`: weight progress for one exercise
//! - `refresh`: refetch from the remote store
//! - `switch-user [user]`: change (or clear) the signed-in user
//! - `status`: server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";
const CHART_WIDTH: usize = 40;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "liftlog", version, about = "Record lifting sessions and track progress")]
struct Cli {
    /// Liftlog HTTP server URL (overrides LIFTLOG_HTTP_URL env var)
    #[arg(long, env = "LIFTLOG_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List recorded sessions
    History {
        /// Print the raw snapshot JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a lifting session
    Add {
        #[arg(short, long)]
        exercise: String,

        /// Weight in kilograms
        #[arg(short, long)]
        weight: String,

        #[arg(short, long)]
        reps: String,
    },

    /// Delete a session by id
    Delete { id: i64 },

    /// List distinct exercises
    Exercises,

    /// Show weight progress for one exercise
    Chart { exercise: String },

    /// Refetch sessions from the remote store
    Refresh,

    /// Change the signed-in user; omit to sign out
    SwitchUser { user: Option<String> },

    /// Show Liftlog server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SessionRow {
    pub id: i64,
    pub exercise: String,
    pub weight: f64,
    pub reps: i32,
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusView {
    pub state: String,
    pub message: Option<String>,
}

/// The subset of the server snapshot this CLI renders.
#[derive(Debug, Deserialize)]
pub struct Snapshot {
    pub user_id: Option<String>,
    pub status: StatusView,
    #[serde(default)]
    pub sessions: Vec<SessionRow>,
    #[serde(default)]
    pub exercise_index: Vec<String>,
    #[serde(default)]
    pub chart_labels: Vec<String>,
    #[serde(default)]
    pub chart_values: Vec<f64>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

// ============================================================================
// Rendering
// ============================================================================

/// `#12  2024-01-02  Squat  100 kg x 5 reps`
pub fn render_session(s: &SessionRow) -> String {
    let day: String = s.date.chars().take(10).collect();
    format!(
        "#{:<4} {}  {}  {} kg x {} reps",
        s.id, day, s.exercise, s.weight, s.reps
    )
}

/// One bar per point, scaled to the heaviest lift.
pub fn render_chart(labels: &[String], values: &[f64]) -> Vec<String> {
    let max = values.iter().cloned().fold(0.0_f64, f64::max);
    labels
        .iter()
        .zip(values)
        .map(|(label, value)| {
            let width = if max > 0.0 {
                ((value / max) * CHART_WIDTH as f64).round() as usize
            } else {
                0
            };
            format!("{}  {:<w$}  {} kg", label, "█".repeat(width), value, w = CHART_WIDTH)
        })
        .collect()
}

fn print_outcome(snap: &Snapshot) {
    if let Some(notice) = &snap.notice {
        println!("{}", notice);
    }
    if let Some(message) = &snap.status.message {
        eprintln!("liftlog: {} ({})", message, snap.status.state);
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?)
}

/// Send a request and parse the snapshot body. Error responses still carry
/// a snapshot; their message is printed and the process exits non-zero.
fn send(req: reqwest::blocking::RequestBuilder, url: &str) -> anyhow::Result<Snapshot> {
    let resp = match req.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("liftlog: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let snap: Snapshot = match resp.json() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("liftlog: failed to parse response (HTTP {}): {}", status, e);
            std::process::exit(1);
        }
    };

    if !status.is_success() {
        eprintln!(
            "liftlog: {}",
            snap.error.as_deref().unwrap_or("request failed")
        );
        std::process::exit(1);
    }

    Ok(snap)
}

fn do_history(server: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/snapshot", server);
    let client = client()?;

    if json_output {
        let body: serde_json::Value = client.get(&url).send()?.json()?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let snap = send(client.get(&url), &url)?;
    if snap.sessions.is_empty() {
        eprintln!("No sessions recorded yet.");
        return Ok(());
    }
    for s in &snap.sessions {
        println!("{}", render_session(s));
    }
    Ok(())
}

fn do_add(server: &str, exercise: &str, weight: &str, reps: &str) -> anyhow::Result<()> {
    let url = format!("{}/sessions", server);
    let body = serde_json::json!({
        "exercise": exercise,
        "weight": weight,
        "reps": reps,
    });
    let snap = send(client()?.post(&url).json(&body), &url)?;
    print_outcome(&snap);
    Ok(())
}

fn do_delete(server: &str, id: i64) -> anyhow::Result<()> {
    let url = format!("{}/sessions/{}", server, id);
    let snap = send(client()?.delete(&url), &url)?;
    print_outcome(&snap);
    Ok(())
}

fn do_exercises(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/snapshot", server);
    let snap = send(client()?.get(&url), &url)?;
    for name in &snap.exercise_index {
        println!("{}", name);
    }
    Ok(())
}

fn do_chart(server: &str, exercise: &str) -> anyhow::Result<()> {
    let url = format!("{}/selection", server);
    let body = serde_json::json!({ "exercise": exercise });
    let snap = send(client()?.put(&url).json(&body), &url)?;

    if snap.chart_values.is_empty() {
        eprintln!("No sessions recorded for {}.", exercise);
        return Ok(());
    }
    println!("{} (most recent first)", exercise);
    for line in render_chart(&snap.chart_labels, &snap.chart_values) {
        println!("{}", line);
    }
    Ok(())
}

fn do_refresh(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/refresh", server);
    let snap = send(client()?.post(&url), &url)?;
    println!(
        "{} sessions, {} exercises",
        snap.sessions.len(),
        snap.exercise_index.len()
    );
    Ok(())
}

fn do_switch_user(server: &str, user: Option<String>) -> anyhow::Result<()> {
    let url = format!("{}/identity", server);
    let body = serde_json::json!({ "user_id": user });
    let snap = send(client()?.put(&url).json(&body), &url)?;
    match snap.user_id {
        Some(u) => println!("Signed in as {}", u),
        None => println!("Signed out"),
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client()?.get(&url).send();

    match resp {
        Ok(r) => {
            let healthy = r.status().is_success();
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Liftlog server: {}", if healthy { "healthy" } else { "unhealthy" });
            println!("Backend:        {}", body["backend"].as_str().unwrap_or("?"));
            match body["sessions"].as_u64() {
                Some(n) => println!("Sessions:       {}", n),
                None => println!("Error:          {}", body["error"].as_str().unwrap_or("?")),
            }
            if !healthy {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("liftlog: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::History { json } => do_history(&server, json),
        Commands::Add { exercise, weight, reps } => do_add(&server, &exercise, &weight, &reps),
        Commands::Delete { id } => do_delete(&server, id),
        Commands::Exercises => do_exercises(&server),
        Commands::Chart { exercise } => do_chart(&server, &exercise),
        Commands::Refresh => do_refresh(&server),
        Commands::SwitchUser { user } => do_switch_user(&server, user),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("liftlog: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, exercise: &str, weight: f64, reps: i32, date: &str) -> SessionRow {
        SessionRow {
            id,
            exercise: exercise.to_string(),
            weight,
            reps,
            date: date.to_string(),
        }
    }

    #[test]
    fn test_render_session_uses_day_weight_and_reps() {
        let line = render_session(&row(12, "Squat", 100.0, 5, "2024-01-02T08:30:00Z"));
        assert_eq!(line, "#12   2024-01-02  Squat  100 kg x 5 reps");
    }

    #[test]
    fn test_render_chart_scales_to_heaviest() {
        let labels = vec!["2024-01-02".to_string(), "2024-01-01".to_string()];
        let lines = render_chart(&labels, &[100.0, 50.0]);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].matches('█').count(), CHART_WIDTH);
        assert_eq!(lines[1].matches('█').count(), CHART_WIDTH / 2);
        assert!(lines[0].starts_with("2024-01-02"));
        assert!(lines[1].ends_with("50 kg"));
    }

    #[test]
    fn test_render_chart_handles_zero_weights() {
        let labels = vec!["2024-01-01".to_string()];
        let lines = render_chart(&labels, &[0.0]);
        assert_eq!(lines[0].matches('█').count(), 0);
    }

    #[test]
    fn test_snapshot_parses_error_body() {
        let body = serde_json::json!({
            "user_id": "u1",
            "status": {"state": "error", "message": "Remote store error: boom"},
            "sessions": [{
                "id": 1, "user_id": "u1", "exercise": "Squat",
                "weight": 100.0, "reps": 5, "date": "2024-01-02T00:00:00Z"
            }],
            "exercise_index": ["Squat"],
            "error": "Remote store error: boom",
            "kind": "gateway"
        });
        let snap: Snapshot = serde_json::from_value(body).unwrap();
        assert_eq!(snap.status.state, "error");
        assert_eq!(snap.sessions.len(), 1);
        assert_eq!(snap.exercise_index, vec!["Squat"]);
        assert!(snap.chart_values.is_empty());
        assert_eq!(snap.error.as_deref(), Some("Remote store error: boom"));
    }
}
