use hydrawise::HydrawiseBuilder;

/// Run with: cargo test --test integration -- --ignored
/// Requires either HYDRAWISE_API_KEY (cloud account) or
/// HYDRAWISE_HOST + HYDRAWISE_PASSWORD (controller on the LAN).
/// Read-only: lists controllers and zones, never issues commands.
#[tokio::test]
#[ignore]
async fn list_controllers_and_zones() {
    let client = HydrawiseBuilder::from_env()
        .expect("HYDRAWISE_* environment not set")
        .build()
        .expect("binding should build");

    let controllers = client
        .get_controllers()
        .await
        .expect("get_controllers failed");
    assert!(!controllers.is_empty(), "should have at least one controller");

    for controller in &controllers {
        let zones = controller
            .get_zones()
            .await
            .unwrap_or_else(|e| panic!("get_zones for {} failed: {e}", controller.name));
        println!("{}: {} zones", controller.name, zones.len());
        for zone in &zones {
            println!("  {zone:?}");
        }
    }
}
