use std::time::Duration;

use serde_json::Value;

use crate::error::CommandError;
use crate::types::{AllZonesAction, ConnectionType, ScheduleQuery, ZoneAction, ZoneRef};

pub const CLOUD_URL: &str = "https://app.hydrawise.com/api/v1/";
pub const DEFAULT_LOCAL_USER: &str = "admin";

/// Period ID the API expects for manually issued commands.
pub const MANUAL_PERIOD_ID: u32 = 998;

pub const CLOUD_SCHEDULE_PATH: &str = "statusschedule.php";
pub const LOCAL_SCHEDULE_PATH: &str = "get_sched_json.php";
pub const CLOUD_SET_ZONE_PATH: &str = "setzone.php";
pub const LOCAL_SET_ZONE_PATH: &str = "set_manual_data.php";
pub const CUSTOMER_DETAILS_PATH: &str = "customerdetails.php";

pub const LOCAL_ONLY_MESSAGE: &str = "Calling Cloud API function on a Local Binding";

pub type QueryParams = Vec<(String, String)>;

pub fn local_base_url(host: &str) -> String {
    format!("http://{host}/")
}

pub fn schedule_path(kind: ConnectionType) -> &'static str {
    match kind {
        ConnectionType::Cloud => CLOUD_SCHEDULE_PATH,
        ConnectionType::Local => LOCAL_SCHEDULE_PATH,
    }
}

pub fn set_zone_path(kind: ConnectionType) -> &'static str {
    match kind {
        ConnectionType::Cloud => CLOUD_SET_ZONE_PATH,
        ConnectionType::Local => LOCAL_SET_ZONE_PATH,
    }
}

/// Insert or replace a query parameter.
pub fn set_param(params: &mut QueryParams, key: &str, value: impl ToString) {
    let value = value.to_string();
    match params.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value,
        None => params.push((key.to_string(), value)),
    }
}

pub fn schedule_params(query: &ScheduleQuery) -> QueryParams {
    let mut params = QueryParams::new();
    match query {
        ScheduleQuery::All => {}
        ScheduleQuery::Controller(id) => set_param(&mut params, "controller_id", id),
        ScheduleQuery::Tagged { tag, hours } => {
            set_param(&mut params, "tag", tag);
            set_param(&mut params, "hours", hours);
        }
    }
    params
}

fn command_params(action: &str, duration: Option<Duration>) -> QueryParams {
    let mut params = QueryParams::new();
    set_param(&mut params, "period_id", MANUAL_PERIOD_ID);
    set_param(&mut params, "action", action);
    if let Some(d) = duration {
        set_param(&mut params, "custom", d.as_secs());
    }
    params
}

/// The identifier a zone is addressed by: local relay number on a local
/// binding, cloud relay ID on a cloud binding. Raw references pass through.
pub fn relay_identifier(kind: ConnectionType, target: ZoneRef<'_>) -> u64 {
    match (kind, target) {
        (_, ZoneRef::Relay(id)) => id,
        (ConnectionType::Local, ZoneRef::Zone(z)) => u64::from(z.local_zone_number),
        (ConnectionType::Cloud, ZoneRef::Zone(z)) => z.relay_id,
    }
}

/// Parameters for a single-zone command. A cloud zone linked to a
/// controller also carries `controller_id`.
pub fn zone_command_params(
    kind: ConnectionType,
    action: ZoneAction,
    target: ZoneRef<'_>,
    duration: Option<Duration>,
) -> QueryParams {
    let mut params = command_params(action.as_api_str(), duration);
    let relay = relay_identifier(kind, target);
    match kind {
        ConnectionType::Local => set_param(&mut params, "relay", relay),
        ConnectionType::Cloud => {
            set_param(&mut params, "relay_id", relay);
            if let ZoneRef::Zone(z) = target
                && let Some(id) = z.controller.as_ref().and_then(|c| c.id)
            {
                set_param(&mut params, "controller_id", id);
            }
        }
    }
    params
}

pub fn all_zones_command_params(
    kind: ConnectionType,
    action: AllZonesAction,
    controller_id: Option<u64>,
    duration: Option<Duration>,
) -> QueryParams {
    let mut params = command_params(action.as_api_str(), duration);
    if let (ConnectionType::Cloud, Some(id)) = (kind, controller_id) {
        set_param(&mut params, "controller_id", id);
    }
    params
}

/// Vendor error envelope: `{"messageType": "error", "message": "..."}`.
pub fn check_envelope(body: &Value) -> Result<(), CommandError> {
    if body.get("messageType").and_then(|v| v.as_str()) == Some("error") {
        let message = body
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        return Err(CommandError::new(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Controller, Zone};
    use serde_json::json;

    fn get<'a>(params: &'a QueryParams, key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn zone_with_controller() -> Zone {
        Zone {
            relay_id: 5001,
            local_zone_number: 3,
            controller: Some(Controller {
                id: Some(11774),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn cloud_zone_record_uses_relay_id_and_controller() {
        let zone = zone_with_controller();
        let params = zone_command_params(
            ConnectionType::Cloud,
            ZoneAction::Run,
            (&zone).into(),
            Some(Duration::from_secs(60)),
        );
        assert_eq!(get(&params, "period_id"), Some("998"));
        assert_eq!(get(&params, "action"), Some("run"));
        assert_eq!(get(&params, "relay_id"), Some("5001"));
        assert_eq!(get(&params, "custom"), Some("60"));
        assert_eq!(get(&params, "controller_id"), Some("11774"));
        assert_eq!(get(&params, "relay"), None);
    }

    #[test]
    fn local_zone_record_uses_relay_number() {
        let zone = zone_with_controller();
        let params = zone_command_params(
            ConnectionType::Local,
            ZoneAction::Run,
            (&zone).into(),
            Some(Duration::from_secs(60)),
        );
        assert_eq!(get(&params, "relay"), Some("3"));
        assert_eq!(get(&params, "relay_id"), None);
        assert_eq!(get(&params, "controller_id"), None);
    }

    #[test]
    fn raw_relay_without_duration() {
        let params =
            zone_command_params(ConnectionType::Cloud, ZoneAction::Stop, ZoneRef::Relay(42), None);
        assert_eq!(get(&params, "action"), Some("stop"));
        assert_eq!(get(&params, "relay_id"), Some("42"));
        assert_eq!(get(&params, "custom"), None);
    }

    #[test]
    fn all_zones_controller_only_in_cloud() {
        let cloud = all_zones_command_params(
            ConnectionType::Cloud,
            AllZonesAction::SuspendAll,
            Some(7),
            Some(Duration::from_secs(3600)),
        );
        assert_eq!(get(&cloud, "action"), Some("suspendall"));
        assert_eq!(get(&cloud, "controller_id"), Some("7"));
        assert_eq!(get(&cloud, "custom"), Some("3600"));

        let local =
            all_zones_command_params(ConnectionType::Local, AllZonesAction::StopAll, Some(7), None);
        assert_eq!(get(&local, "controller_id"), None);
        assert_eq!(get(&local, "relay"), None);
    }

    #[test]
    fn set_param_replaces_existing() {
        let mut params = QueryParams::new();
        set_param(&mut params, "controller_id", 1);
        set_param(&mut params, "controller_id", 2);
        assert_eq!(params.len(), 1);
        assert_eq!(get(&params, "controller_id"), Some("2"));
    }

    #[test]
    fn schedule_params_shapes() {
        assert!(schedule_params(&ScheduleQuery::All).is_empty());
        let p = schedule_params(&ScheduleQuery::Controller(9));
        assert_eq!(get(&p, "controller_id"), Some("9"));
        let p = schedule_params(&ScheduleQuery::Tagged {
            tag: "hydrawise_all".into(),
            hours: 168,
        });
        assert_eq!(get(&p, "tag"), Some("hydrawise_all"));
        assert_eq!(get(&p, "hours"), Some("168"));
    }

    #[test]
    fn paths_by_mode() {
        assert_eq!(schedule_path(ConnectionType::Local), "get_sched_json.php");
        assert_eq!(schedule_path(ConnectionType::Cloud), "statusschedule.php");
        assert_eq!(set_zone_path(ConnectionType::Local), "set_manual_data.php");
        assert_eq!(set_zone_path(ConnectionType::Cloud), "setzone.php");
        assert_eq!(local_base_url("10.0.0.5"), "http://10.0.0.5/");
    }

    #[test]
    fn error_envelope() {
        let err = check_envelope(&json!({"messageType": "error", "message": "Bad login"}))
            .unwrap_err();
        assert_eq!(err.message, "Bad login");
        assert!(check_envelope(&json!({"messageType": "info", "message": "ok"})).is_ok());
        assert!(check_envelope(&json!({"relays": []})).is_ok());
    }
}
