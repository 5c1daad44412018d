// ABOUTME: Registry command implementation.
// ABOUTME: Starts and stops the persistent local registry container.

use deployer::config::RegistryConfig;
use deployer::error::Result;
use deployer::output::Output;
use deployer::process::LocalRunner;
use deployer::registry::LocalRegistry;

pub async fn start_registry(
    settings: &RegistryConfig,
    port: Option<u16>,
    output: &Output,
) -> Result<()> {
    let runner = LocalRunner::new();
    let registry = LocalRegistry::new(&runner, settings.container.as_str());

    if let Some(endpoint) = registry.endpoint().await? {
        output.success(&format!(
            "Registry {} already running on {}",
            registry.container(),
            endpoint
        ));
        return Ok(());
    }

    let endpoint = registry.start(port.unwrap_or(settings.port), true).await?;
    output.success(&format!(
        "Registry {} running on {}",
        registry.container(),
        endpoint
    ));
    Ok(())
}

pub async fn stop_registry(settings: &RegistryConfig, output: &Output) -> Result<()> {
    let runner = LocalRunner::new();
    let registry = LocalRegistry::new(&runner, settings.container.as_str());
    registry.stop().await?;
    output.success(&format!("Registry {} removed", registry.container()));
    Ok(())
}
