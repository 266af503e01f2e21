use liftlog_core::protocol::{TrackerRequest, TrackerResponse};

use crate::tracker::{Outcome, ViewStateController};

/// Apply one request to the controller and answer with its new snapshot.
pub async fn handle_request(
    request: TrackerRequest,
    controller: &ViewStateController,
) -> TrackerResponse {
    match request {
        TrackerRequest::Ping => TrackerResponse::pong(),
        TrackerRequest::Health => {
            let report = controller.health().await;
            match serde_json::to_value(&report) {
                Ok(data) if report.reachable => TrackerResponse::ok(data),
                Ok(data) => TrackerResponse::err_with("remote store unreachable", Some(data))
                    .with_kind("gateway"),
                Err(e) => TrackerResponse::err(format!("Serialization error: {}", e)),
            }
        }
        TrackerRequest::Snapshot => snapshot_response(controller),
        TrackerRequest::Refresh => outcome_response(controller.refresh().await, controller),
        TrackerRequest::SubmitAdd => outcome_response(controller.submit_add().await, controller),
        TrackerRequest::SubmitDelete { id } => {
            outcome_response(controller.submit_delete(id).await, controller)
        }
        TrackerRequest::SelectExercise { exercise } => {
            controller.select_exercise(exercise);
            snapshot_response(controller)
        }
        TrackerRequest::UpdateField { field, value } => {
            match controller.update_field(&field, value) {
                Ok(()) => snapshot_response(controller),
                Err(e) => {
                    TrackerResponse::err_with(e.to_string(), snapshot_value(controller).ok())
                        .with_kind(e.kind())
                }
            }
        }
        TrackerRequest::AuthChanged { user_id } => {
            controller.on_auth_change(user_id);
            snapshot_response(controller)
        }
    }
}

fn snapshot_value(controller: &ViewStateController) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(controller.snapshot())
}

fn snapshot_response(controller: &ViewStateController) -> TrackerResponse {
    match snapshot_value(controller) {
        Ok(data) => TrackerResponse::ok(data),
        Err(e) => TrackerResponse::err(format!("Serialization error: {}", e)),
    }
}

fn outcome_response(outcome: Outcome, controller: &ViewStateController) -> TrackerResponse {
    let data = snapshot_value(controller).ok();
    match outcome {
        Outcome::Settled => match data {
            Some(data) => TrackerResponse::ok(data),
            None => TrackerResponse::err("Serialization error"),
        },
        Outcome::Rejected(e) | Outcome::Failed(e) => {
            TrackerResponse::err_with(e.to_string(), data).with_kind(e.kind())
        }
        Outcome::Superseded => {
            TrackerResponse::err_with("request superseded by an identity change", data)
                .with_kind("superseded")
        }
    }
}
