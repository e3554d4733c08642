use std::env;
use std::time::Duration;

use hydrawise::{HydrawiseBuilder, ZoneAction};

/// Usage:
///   HYDRAWISE_API_KEY=... cargo run --example zones
///   HYDRAWISE_HOST=10.0.0.5 HYDRAWISE_PASSWORD=... cargo run --example zones -- run 3 60
#[tokio::main]
async fn main() -> hydrawise::Result<()> {
    tracing_subscriber::fmt::init();

    let client = HydrawiseBuilder::from_env()?.build()?;
    let args: Vec<String> = env::args().skip(1).collect();

    if let [action, relay, rest @ ..] = args.as_slice() {
        let action = ZoneAction::from_api_str(action).expect("action must be run, suspend or stop");
        let relay: u64 = relay.parse().expect("relay must be a number");
        let duration = rest
            .first()
            .map(|s| Duration::from_secs(s.parse().expect("duration must be seconds")));
        let reply = client.command_zone(action, relay, duration).await?;
        println!("{reply}");
        return Ok(());
    }

    for controller in client.get_controllers().await? {
        println!(
            "{} [{}]",
            controller.name,
            controller.status.as_deref().unwrap_or("-")
        );
        for zone in controller.get_zones().await? {
            println!(
                "  #{:<2} {:<24} next {} for {}s{}{}",
                zone.local_zone_number,
                zone.name,
                zone.next_run_at.format("%Y-%m-%d %H:%M"),
                zone.next_run_duration.as_secs(),
                if zone.is_suspended { " | suspended" } else { "" },
                if zone.is_running {
                    format!(" | running, {}s left", zone.remaining_running_time.as_secs())
                } else {
                    String::new()
                },
            );
        }
    }

    Ok(())
}
