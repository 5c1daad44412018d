// ABOUTME: Inspect command implementation.
// ABOUTME: Prints the deployment label of a service and flags images changed since.

use deployer::config::Config;
use deployer::diagnostics::{Diagnostics, Warning};
use deployer::error::{Error, Result};
use deployer::inspect::inspect_service;
use deployer::output::Output;
use deployer::process::LocalRunner;
use deployer::types::{RemoteHost, ServiceName};

/// `service` is a config key when a config is available, otherwise a swarm service name.
pub async fn inspect(
    config: Option<&Config>,
    host: &RemoteHost,
    service: &str,
    output: &Output,
) -> Result<()> {
    let service_name = match config.and_then(|c| c.services.get(service)) {
        Some(configured) => configured.service_name.clone(),
        None => ServiceName::new(service).map_err(|_| Error::UnknownService(service.to_string()))?,
    };

    let runner = LocalRunner::new();
    let report = inspect_service(&runner, host, &service_name).await?;
    let metadata = &report.metadata;

    output.progress(&format!("Service:      {}", report.service));
    output.progress(&format!("Image:        {}", report.current_image));
    output.progress(&format!("Deployed at:  {}", metadata.date.to_rfc3339()));
    output.progress(&format!(
        "Deployed by:  {} on {} ({} {})",
        metadata.computer_username,
        metadata.device_name,
        metadata.operating_system.platform,
        metadata.operating_system.architecture
    ));
    output.progress(&format!(
        "Project:      {} (deployer {})",
        metadata.name, metadata.deployer_version
    ));

    let mut diag = Diagnostics::default();
    if !report.image_matches() {
        diag.warn(Warning::metadata_mismatch(format!(
            "{} runs {} but was last deployed with {}",
            report.service, report.current_image, metadata.image
        )));
    }
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    output.success(&format!(
        "{} deployed by {} at {}",
        report.service,
        metadata.computer_username,
        metadata.date.to_rfc3339()
    ));
    Ok(())
}
