use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "config": state.config }))
}

fn handle_config_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let next = match state.config.merged(&req.params) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if let Err(e) = next.save(conn) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(term = %next.current_term, session = %next.current_session, "engine config updated");
    state.config = next;
    ok(&req.id, json!({ "config": state.config }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.config.get" => Some(handle_config_get(state, req)),
        "reports.config.update" => Some(handle_config_update(state, req)),
        _ => None,
    }
}
