// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests file discovery, key aliases, service selection and request building.

use deployer::config::*;
use deployer::error::Error;
use deployer::types::RemoteHost;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const SHOP: &str = r#"
name: shop
services:
  api:
    service_name: shop_api
    image_name: api-img
    build: docker build -t api-img .
    working_dir: services/api
  web:
    serviceName: shop_web
    imageName: web-img:2.0
    build: make image
"#;

fn host() -> RemoteHost {
    RemoteHost::parse("deploy@swarm").unwrap()
}

mod parsing {
    use super::*;

    #[test]
    fn parse_services_with_both_key_styles() {
        let config = Config::from_yaml(SHOP).unwrap();
        assert_eq!(config.name, "shop");
        assert_eq!(config.services.len(), 2);

        let api = &config.services["api"];
        assert_eq!(api.service_name.as_str(), "shop_api");
        assert_eq!(api.image_name.to_string(), "api-img:latest");
        assert_eq!(api.working_dir, Some(PathBuf::from("services/api")));

        let web = &config.services["web"];
        assert_eq!(web.service_name.as_str(), "shop_web");
        assert_eq!(web.image_name.tag(), Some("2.0"));
        assert_eq!(web.working_dir, None);
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_yaml(
            r#"
services:
  api:
    service_name: api
    image_name: api-img
    build: "true"
"#,
        )
        .unwrap();

        assert_eq!(config.name, "deployer");
        assert_eq!(config.registry, RegistryConfig::default());
        assert_eq!(config.registry.port, DEFAULT_REGISTRY_PORT);
        assert_eq!(config.registry.container, "deployer-registry");
        assert!(!config.registry.auto_start);
        assert_eq!(config.tunnel.allocation_timeout, Duration::from_secs(30));
    }

    #[test]
    fn registry_and_tunnel_settings() {
        let config = Config::from_yaml(
            r#"
registry:
  container: team-registry
  port: 21000
  autoStart: true
tunnel:
  allocation_timeout: 45s
services:
  api:
    service_name: api
    image_name: api-img
    build: "true"
"#,
        )
        .unwrap();

        assert_eq!(config.registry.container, "team-registry");
        assert_eq!(config.registry.port, 21000);
        assert!(config.registry.auto_start);
        assert_eq!(config.tunnel.allocation_timeout, Duration::from_secs(45));
    }

    #[test]
    fn json_is_accepted() {
        let config = Config::from_yaml(
            r#"{"name": "shop", "services": {"api": {"serviceName": "api", "imageName": "api-img", "build": "make"}}}"#,
        )
        .unwrap();
        assert_eq!(config.services["api"].service_name.as_str(), "api");
    }
}

mod validation {
    use super::*;

    fn service(key: &str) -> String {
        format!(
            "services:\n  {key}:\n    service_name: api\n    image_name: api-img\n    build: make\n"
        )
    }

    #[test]
    fn all_is_a_reserved_key() {
        let err = Config::from_yaml(&service("all")).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("reserved")));
    }

    #[test]
    fn services_are_required() {
        assert!(Config::from_yaml("name: shop\nservices: {}\n").is_err());
        assert!(Config::from_yaml("name: shop\n").is_err());
    }

    #[test]
    fn name_must_be_tag_safe() {
        let yaml = format!("name: my shop\n{}", service("api"));
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn name_must_be_lowercase() {
        let yaml = format!("name: Shop\n{}", service("api"));
        match Config::from_yaml(&yaml) {
            Err(Error::InvalidConfig(message)) => assert!(message.contains("lowercase"), "{}", message),
            other => panic!("expected invalid config, got {:?}", other),
        }

        let yaml = format!("name: shop-2_eu\n{}", service("api"));
        assert!(Config::from_yaml(&yaml).is_ok());
    }

    #[test]
    fn build_command_must_not_be_blank() {
        let yaml = "services:\n  api:\n    service_name: api\n    image_name: api-img\n    build: '  '\n";
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(Error::InvalidConfig(ref msg)) if msg.contains("empty build command")
        ));
    }

    #[test]
    fn invalid_service_name_is_rejected() {
        let yaml = "services:\n  api:\n    service_name: '-api'\n    image_name: api-img\n    build: make\n";
        assert!(Config::from_yaml(yaml).is_err());
    }
}

mod selection {
    use super::*;

    #[test]
    fn explicit_keys_keep_order_without_duplicates() {
        let config = Config::from_yaml(SHOP).unwrap();
        let keys = config.select(&["web", "api", "web"]).unwrap();
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["web", "api"]);
    }

    #[test]
    fn all_selects_every_service() {
        let config = Config::from_yaml(SHOP).unwrap();
        let keys = config.select(&[ALL_SERVICES]).unwrap();
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["api", "web"]);
    }

    #[test]
    fn unknown_key_is_an_error() {
        let config = Config::from_yaml(SHOP).unwrap();
        assert!(matches!(
            config.select(&["api", "worker"]),
            Err(Error::UnknownService(ref key)) if key == "worker"
        ));
    }

    #[test]
    fn empty_selection_is_an_error() {
        let config = Config::from_yaml(SHOP).unwrap();
        let none: [&str; 0] = [];
        assert!(config.select(&none).is_err());
    }
}

mod requests {
    use super::*;

    #[test]
    fn request_carries_service_settings() {
        let config = Config::from_yaml(SHOP).unwrap();
        let request = config.request("api", &host()).unwrap();

        assert_eq!(request.key, "api");
        assert_eq!(request.service_name.as_str(), "shop_api");
        assert_eq!(request.build_command, "docker build -t api-img .");
        assert_eq!(request.tag_prefix, "shop");
        assert_eq!(request.swarm_tag(), "shop/api-img:latest");
        assert_eq!(request.remote_host, host());
        assert_eq!(request.allocation_timeout, Duration::from_secs(30));
    }

    #[test]
    fn working_dir_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, SHOP).unwrap();

        let config = Config::load(&path).unwrap();
        let api = config.request("api", &host()).unwrap();
        let web = config.request("web", &host()).unwrap();

        assert_eq!(api.working_dir, Some(dir.path().join("services/api")));
        assert_eq!(web.working_dir, Some(dir.path().to_path_buf()));
    }

    #[test]
    fn requests_follow_selection() {
        let config = Config::from_yaml(SHOP).unwrap();
        let requests = config.requests(&["all"], &host()).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests.head.key, "api");
        assert_eq!(requests.tail[0].key, "web");
    }
}

mod discovery {
    use super::*;

    #[test]
    fn finds_yml_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_JSON), "{}").unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), SHOP).unwrap();

        let path = Config::locate(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("deployer.yml"));
    }

    #[test]
    fn falls_back_to_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILENAME_JSON),
            r#"{"services": {"api": {"serviceName": "api", "imageName": "api-img", "build": "make"}}}"#,
        )
        .unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert!(config.services.contains_key("api"));
        assert_eq!(config.base_dir, dir.path());
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::discover(dir.path()),
            Err(Error::ConfigNotFound(ref path)) if path == dir.path()
        ));
    }
}
