// ABOUTME: Integration tests for moving images between the local and cluster registries.
// ABOUTME: Exercises the exact docker invocations on both ends of the tunnel.

mod support;

use deployer::process::OutputMode;
use deployer::registry::{LocalRegistry, RegistryBridge, RegistryEndpoint, RegistryError};
use deployer::topology::SwarmTopology;
use deployer::types::{ImageRef, RemoteHost};
use support::fake_runner::FakeRunner;

fn host() -> RemoteHost {
    RemoteHost::parse("deploy@swarm").unwrap()
}

fn image() -> ImageRef {
    ImageRef::parse("api-img:1.4").unwrap()
}

#[tokio::test]
async fn tags_and_pushes_into_local_registry() {
    let runner = FakeRunner::new();

    let pushed = RegistryBridge::new(&runner)
        .tag_and_push(&image(), &RegistryEndpoint::local(20000, false), "make image")
        .await
        .unwrap();

    assert_eq!(pushed.to_string(), "localhost:20000/api-img:1.4");
    assert_eq!(
        runner.commands(),
        vec![
            "docker image tag api-img:1.4 localhost:20000/api-img:1.4",
            "docker image push localhost:20000/api-img:1.4",
        ]
    );
}

#[tokio::test]
async fn push_failure_is_not_a_tag_mismatch() {
    let runner = FakeRunner::new().fail("image push", 1, "connection refused");

    let err = RegistryBridge::new(&runner)
        .tag_and_push(&image(), &RegistryEndpoint::local(20000, false), "make image")
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::Push { .. }));
}

#[tokio::test]
async fn pulls_through_tunnel_port_and_retags() {
    let runner = FakeRunner::new();

    let tag = RegistryBridge::new(&runner)
        .pull_and_retag_on_remote(&image(), &host(), 40661, "shop")
        .await
        .unwrap();

    assert_eq!(tag, "shop/api-img:latest");
    assert_eq!(
        runner.commands(),
        vec![
            "docker -H ssh://deploy@swarm pull localhost:40661/api-img:1.4",
            "docker -H ssh://deploy@swarm image tag localhost:40661/api-img:1.4 shop/api-img:latest",
        ]
    );
}

#[tokio::test]
async fn transfers_follow_tool_output_while_tags_stay_captured() {
    let runner = FakeRunner::new();
    let bridge = RegistryBridge::new(&runner).tool_output(OutputMode::Inherit);

    bridge
        .tag_and_push(&image(), &RegistryEndpoint::local(20000, false), "make image")
        .await
        .unwrap();
    bridge
        .pull_and_retag_on_remote(&image(), &host(), 40661, "shop")
        .await
        .unwrap();

    let modes: Vec<(String, OutputMode)> = runner
        .calls()
        .into_iter()
        .map(|call| (call.command_line(), call.output))
        .collect();
    assert_eq!(
        modes,
        vec![
            ("docker image tag api-img:1.4 localhost:20000/api-img:1.4".to_string(), OutputMode::Piped),
            ("docker image push localhost:20000/api-img:1.4".to_string(), OutputMode::Inherit),
            ("docker -H ssh://deploy@swarm pull localhost:40661/api-img:1.4".to_string(), OutputMode::Inherit),
            (
                "docker -H ssh://deploy@swarm image tag localhost:40661/api-img:1.4 shop/api-img:latest".to_string(),
                OutputMode::Piped
            ),
        ]
    );
}

#[tokio::test]
async fn relay_with_existing_registry_skips_creation() {
    let runner = FakeRunner::new().stdout(
        "service inspect deployer-registry",
        r#"[{"Endpoint": {"Ports": [{"TargetPort": 5000, "PublishedPort": 31337}]}}]"#,
    );
    let topology = SwarmTopology {
        node_count: 3,
        has_cluster_registry: true,
    };

    let target = RegistryBridge::new(&runner)
        .relay_to_cluster_registry(&image(), &host(), "shop", &topology)
        .await
        .unwrap();

    assert_eq!(target.to_string(), "127.0.0.1:31337/api-img:latest");
    assert!(!runner.ran("service create"));
    assert!(runner.ran("image tag shop/api-img:latest 127.0.0.1:31337/api-img:latest"));
    assert!(runner.ran("docker -H ssh://deploy@swarm push 127.0.0.1:31337/api-img:latest"));
}

#[tokio::test]
async fn failed_registry_creation_is_a_relay_error() {
    let runner = FakeRunner::new().fail(
        "service create",
        1,
        "Error response from daemon: This node is not a swarm manager.",
    );
    let topology = SwarmTopology {
        node_count: 3,
        has_cluster_registry: false,
    };

    let err = RegistryBridge::new(&runner)
        .relay_to_cluster_registry(&image(), &host(), "shop", &topology)
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::Relay { .. }));
    assert!(!runner.ran(" push "));
}

#[tokio::test]
async fn local_registry_endpoint_from_docker_port() {
    let runner = FakeRunner::new().with_local_registry("my-registry", 21000);

    let endpoint = LocalRegistry::new(&runner, "my-registry")
        .endpoint()
        .await
        .unwrap();

    assert_eq!(endpoint, Some(RegistryEndpoint::local(21000, false)));
}

#[tokio::test]
async fn absent_local_registry_has_no_endpoint() {
    let runner = FakeRunner::new().fail("docker port", 1, "Error: No such container: my-registry");

    let endpoint = LocalRegistry::new(&runner, "my-registry")
        .endpoint()
        .await
        .unwrap();

    assert_eq!(endpoint, None);
}

#[tokio::test]
async fn persistent_registry_restarts_with_docker() {
    let runner = FakeRunner::new();

    let endpoint = LocalRegistry::new(&runner, "my-registry")
        .start(21000, true)
        .await
        .unwrap();

    assert!(!endpoint.is_ephemeral);
    assert_eq!(
        runner.commands(),
        vec!["docker run -d -p 21000:5000 --restart=always --name my-registry registry:2"]
    );
}
