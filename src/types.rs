use std::fmt;
use std::sync::Weak;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::{Binding, Hydrawise};
use crate::{Error, Result};

/// Which Hydrawise API a binding talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    Cloud,
    Local,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Cloud => write!(f, "cloud"),
            ConnectionType::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneAction {
    Run,
    Suspend,
    Stop,
}

impl ZoneAction {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            ZoneAction::Run => "run",
            ZoneAction::Suspend => "suspend",
            ZoneAction::Stop => "stop",
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "run" => Some(ZoneAction::Run),
            "suspend" => Some(ZoneAction::Suspend),
            "stop" => Some(ZoneAction::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllZonesAction {
    RunAll,
    SuspendAll,
    StopAll,
}

impl AllZonesAction {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            AllZonesAction::RunAll => "runall",
            AllZonesAction::SuspendAll => "suspendall",
            AllZonesAction::StopAll => "stopall",
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "runall" => Some(AllZonesAction::RunAll),
            "suspendall" => Some(AllZonesAction::SuspendAll),
            "stopall" => Some(AllZonesAction::StopAll),
            _ => None,
        }
    }
}

/// Filter for the status/schedule endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScheduleQuery {
    #[default]
    All,
    Controller(u64),
    /// Freeform cloud filter, e.g. `hydrawise_all` over the next `hours`.
    Tagged { tag: String, hours: u32 },
}

/// A zone either by raw identifier or by a record returned from `get_zones`.
///
/// A raw identifier is sent as-is: the local relay number on a local binding,
/// the cloud relay ID on a cloud binding.
#[derive(Debug, Clone, Copy)]
pub enum ZoneRef<'a> {
    Relay(u64),
    Zone(&'a Zone),
}

impl From<u64> for ZoneRef<'_> {
    fn from(id: u64) -> Self {
        ZoneRef::Relay(id)
    }
}

impl<'a> From<&'a Zone> for ZoneRef<'a> {
    fn from(zone: &'a Zone) -> Self {
        ZoneRef::Zone(zone)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ControllerRef<'a> {
    Id(u64),
    Controller(&'a Controller),
}

impl ControllerRef<'_> {
    /// The cloud controller ID, if there is one. The synthetic local
    /// controller has none.
    pub fn id(&self) -> Option<u64> {
        match self {
            ControllerRef::Id(id) => Some(*id),
            ControllerRef::Controller(c) => c.id,
        }
    }
}

impl From<u64> for ControllerRef<'_> {
    fn from(id: u64) -> Self {
        ControllerRef::Id(id)
    }
}

impl<'a> From<&'a Controller> for ControllerRef<'a> {
    fn from(controller: &'a Controller) -> Self {
        ControllerRef::Controller(controller)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Zone {
    /// Unique relay ID known to the cloud.
    pub relay_id: u64,
    /// Relay number on the physical controller.
    pub local_zone_number: u32,
    pub name: String,
    pub next_run_at: DateTime<Utc>,
    pub next_run_duration: Duration,
    pub is_suspended: bool,
    pub is_running: bool,
    pub remaining_running_time: Duration,
    /// Only reported by the local API.
    pub default_run_duration: Option<Duration>,
    /// Set when the zones were fetched for a specific cloud controller.
    pub controller: Option<Controller>,
    #[serde(skip)]
    pub(crate) binding: Weak<Binding>,
}

impl Zone {
    fn client(&self) -> Result<Hydrawise> {
        Hydrawise::from_weak(&self.binding).ok_or(Error::Detached)
    }

    pub async fn run(&self, duration: Option<Duration>) -> Result<serde_json::Value> {
        self.client()?
            .command_zone(ZoneAction::Run, self, duration)
            .await
    }

    pub async fn suspend(&self, duration: Option<Duration>) -> Result<serde_json::Value> {
        self.client()?
            .command_zone(ZoneAction::Suspend, self, duration)
            .await
    }

    pub async fn stop(&self) -> Result<serde_json::Value> {
        self.client()?
            .command_zone(ZoneAction::Stop, self, None)
            .await
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Controller {
    pub id: Option<u64>,
    pub name: String,
    pub serial_number: Option<String>,
    pub last_contact_with_cloud: Option<DateTime<Utc>>,
    pub status: Option<String>,
    #[serde(skip)]
    pub(crate) binding: Weak<Binding>,
}

impl Controller {
    fn client(&self) -> Result<Hydrawise> {
        Hydrawise::from_weak(&self.binding).ok_or(Error::Detached)
    }

    /// Zones of this controller, each linked back to it.
    pub async fn get_zones(&self) -> Result<Vec<Zone>> {
        self.client()?.get_zones(Some(self.into())).await
    }

    pub async fn run_all_zones(&self, duration: Option<Duration>) -> Result<serde_json::Value> {
        self.client()?
            .command_all_zones(AllZonesAction::RunAll, Some(self.into()), duration)
            .await
    }

    pub async fn suspend_all_zones(&self, duration: Option<Duration>) -> Result<serde_json::Value> {
        self.client()?
            .command_all_zones(AllZonesAction::SuspendAll, Some(self.into()), duration)
            .await
    }

    pub async fn stop_all_zones(&self) -> Result<serde_json::Value> {
        self.client()?
            .command_all_zones(AllZonesAction::StopAll, Some(self.into()), None)
            .await
    }
}
