use std::sync::Weak;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{trace, warn};

use crate::client::Binding;
use crate::types::*;
use crate::{Error, Result};

/// Cloud marks an actively running relay with a countdown of exactly 1s.
const CLOUD_RUNNING_SENTINEL: i64 = 1;

/// Numbers arrive either as JSON numbers or as numeric strings.
fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field_i64(obj: &Value, key: &str) -> Option<i64> {
    obj.get(key).and_then(number).map(|n| n as i64)
}

fn field_u64(obj: &Value, key: &str) -> Option<u64> {
    obj.get(key)
        .and_then(number)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64)
}

fn epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn is_configured(kind: ConnectionType, relay: &Value) -> bool {
    match kind {
        ConnectionType::Cloud => true,
        ConnectionType::Local => field_i64(relay, "lastwaterepoch") != Some(0),
    }
}

/// Map a status/schedule response into zones.
pub(crate) fn zones_from_schedule(
    data: &Value,
    kind: ConnectionType,
    controller: Option<&Controller>,
    binding: &Weak<Binding>,
) -> Result<Vec<Zone>> {
    let relays = data
        .get("relays")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::Protocol("status response has no relays".to_string()))?;
    let now = field_i64(data, "time").unwrap_or(0);
    let running = data.get("running").and_then(|v| v.as_array());

    let zones: Vec<Zone> = relays
        .iter()
        .filter(|relay| is_configured(kind, relay))
        .filter_map(|relay| {
            let relay_id = field_u64(relay, "relay_id").unwrap_or(0);
            let local_zone_number = match field_u64(relay, "relay").map(u32::try_from) {
                None => 0,
                Some(Ok(n)) => n,
                Some(Err(_)) => {
                    warn!(relay_id, "relay number out of range, skipping relay");
                    return None;
                }
            };
            let countdown = field_i64(relay, "time").unwrap_or(0);
            let next_run_secs = field_u64(relay, "run")
                .filter(|secs| *secs != 0)
                .or_else(|| field_u64(relay, "run_seconds"))
                .unwrap_or(0);

            let mut zone = Zone {
                relay_id,
                local_zone_number,
                name: relay
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                next_run_at: now.checked_add(countdown).map(epoch).unwrap_or_default(),
                next_run_duration: Duration::from_secs(next_run_secs),
                is_suspended: field_i64(relay, "suspended") == Some(1),
                controller: controller.cloned(),
                binding: binding.clone(),
                ..Default::default()
            };

            if kind == ConnectionType::Local {
                zone.default_run_duration = relay
                    .get("normalRuntime")
                    .and_then(number)
                    .filter(|mins| *mins >= 0.0)
                    .map(|mins| Duration::from_secs((mins * 60.0) as u64));
            }

            let running_entry = running.and_then(|list| {
                list.iter()
                    .find(|r| field_u64(r, "relay_id") == Some(relay_id))
            });
            if let Some(entry) = running_entry {
                zone.is_running = true;
                zone.remaining_running_time =
                    Duration::from_secs(field_u64(entry, "time_left").unwrap_or(0));
            } else if kind == ConnectionType::Cloud && countdown == CLOUD_RUNNING_SENTINEL {
                zone.is_running = true;
                zone.remaining_running_time = zone.next_run_duration;
            }

            Some(zone)
        })
        .collect();

    trace!(count = zones.len(), total = relays.len(), "mapped zones");
    Ok(zones)
}

/// Map a `customerdetails` response (`type=controllers`) into controllers.
pub(crate) fn controllers_from_details(
    data: &Value,
    binding: &Weak<Binding>,
) -> Result<Vec<Controller>> {
    let entries = data
        .get("controllers")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::Protocol("customer details have no controllers".to_string()))?;

    Ok(entries
        .iter()
        .map(|c| Controller {
            id: field_u64(c, "controller_id"),
            name: c
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            serial_number: c
                .get("serial_number")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            last_contact_with_cloud: field_i64(c, "last_contact").map(epoch),
            status: c.get("status").and_then(|v| v.as_str()).map(str::to_string),
            binding: binding.clone(),
        })
        .collect())
}

/// The local API has no notion of multiple controllers; stand in one named
/// after the controller's URL.
pub(crate) fn local_controller(base_url: &str, binding: &Weak<Binding>) -> Controller {
    Controller {
        name: base_url.to_string(),
        binding: binding.clone(),
        ..Default::default()
    }
}
