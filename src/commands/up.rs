// ABOUTME: Up command implementation.
// ABOUTME: Runs one pipeline in-process, or fans several services out to worker processes.

use std::path::Path;

use deployer::config::Config;
use deployer::deploy::{DeploymentCoordinator, DeploymentRequest};
use deployer::error::Result;
use deployer::output::Output;
use deployer::process::LocalRunner;
use deployer::types::RemoteHost;
use deployer::workers::{WorkerPlan, combined_exit_code, run_workers};

/// Exit code after an interrupt, as shells report SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Deploy the selected services; returns the process exit code.
pub async fn up(
    config: &Config,
    config_path: &Path,
    host: &RemoteHost,
    services: &[String],
    output: Output,
    verbose: bool,
) -> Result<i32> {
    let keys = config.select(services)?;

    if keys.len() == 1 {
        let request = config.request(keys.first(), host)?;
        return deploy_one(&request, output).await;
    }

    output.progress(&format!(
        "Deploying {} services to {}: {}",
        keys.len(),
        host,
        keys.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    ));

    let plan = WorkerPlan {
        program: std::env::current_exe()?,
        config_path: config_path.to_path_buf(),
        host: host.clone(),
        mode: output.mode(),
        verbose,
    };

    // Workers get the terminal's interrupt too and tear down their own tunnels;
    // the parent only keeps waiting for them.
    tokio::spawn(async {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, waiting for workers to tear down");
        }
    });

    let runner = LocalRunner::new();
    let exits = run_workers(&runner, &plan, &keys).await?;
    for exit in exits.iter().filter(|exit| !exit.success()) {
        output.error(&format!(
            "{} failed (exit code {})",
            exit.key,
            exit.code.map_or("none".to_string(), |c| c.to_string())
        ));
    }

    Ok(combined_exit_code(&exits))
}

/// Run the pipeline for one service in this process.
async fn deploy_one(request: &DeploymentRequest, output: Output) -> Result<i32> {
    let mut output = output.for_service(request.key.as_str());
    output.start_timer();
    output.progress(&format!(
        "Deploying {} ({}) to {}",
        request.service_name, request.image, request.remote_host
    ));

    let runner = LocalRunner::new();
    let coordinator = DeploymentCoordinator::new(&runner);

    // Dropping the pipeline future on a signal drops the tunnel handle, which
    // kills the ssh process.
    let result = tokio::select! {
        result = coordinator.run(request, &output) => result,
        _ = shutdown_signal() => {
            output.error("interrupted, tunnel closed");
            return Ok(INTERRUPTED_EXIT_CODE);
        }
    };

    for warning in &result.warnings {
        output.warning(&warning.message);
    }

    match (&result.deployed_image, result.error_detail()) {
        (Some(image), _) if result.succeeded => {
            output.success(&format!("Deployed {} with {}", request.service_name, image));
        }
        (_, detail) => {
            output.error(&detail.unwrap_or_else(|| "deployment failed".to_string()));
        }
    }

    Ok(result.exit_code())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::debug!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
