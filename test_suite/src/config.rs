#![cfg(test)]

use std::io::Write;
use std::time::Duration;

use django_queryset::{ClientConfig, ConfigError, Model, ServerClient};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

use crate::models::Thing;

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn env(pairs: &[(&str, &str)]) -> Option<::config::Map<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[tokio::test]
async fn test_load_config() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/thing/"))
        .and(matchers::header("authorization", "Token abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 3}])))
        .expect(1)
        .mount(&server)
        .await;

    let file = config_file(&format!(
        r#"
base_url = "{}"
timeout_secs = 30

[default_headers]
authorization = "Token abc"
"#,
        server.uri()
    ));

    let config = ClientConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
    assert_eq!(config.base_url, server.uri());
    assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    assert_eq!(
        config.default_headers.get("authorization").map(String::as_str),
        Some("Token abc")
    );

    let overridden = ClientConfig::load_with_env(
        Some(file.path()),
        env(&[("DJANGO_CLIENT_TIMEOUT_SECS", "7")]),
    )
    .unwrap();
    assert_eq!(overridden.timeout_secs, Some(7));
    assert_eq!(overridden.base_url, server.uri());

    let client = ServerClient::from_config(&config).unwrap();
    let things = Thing::objects().retrieve(&client).await.into_model().unwrap();
    assert_eq!(things.iter().map(Model::pk).collect::<Vec<_>>(), vec![3]);

    let zero = config_file(&format!(
        "base_url = \"{}\"\ntimeout_secs = 0\n",
        server.uri()
    ));
    assert!(matches!(
        ClientConfig::load_with_env(Some(zero.path()), env(&[])),
        Err(ConfigError::Validation(_))
    ));

    let missing = config_file("timeout_secs = 5\n");
    assert!(matches!(
        ClientConfig::load_with_env(Some(missing.path()), env(&[])),
        Err(ConfigError::Validation(_))
    ));
    let supplied = ClientConfig::load_with_env(
        Some(missing.path()),
        env(&[("DJANGO_CLIENT_BASE_URL", "http://localhost:8000/")]),
    )
    .unwrap();
    assert_eq!(supplied.base_url, "http://localhost:8000/");
    assert_eq!(supplied.timeout_secs, Some(5));
}

#[test]
fn test_validate() {
    assert!(ClientConfig::new("http://localhost:8000/").validate().is_ok());
    assert!(ClientConfig::default().validate().is_err());
    assert_eq!(ClientConfig::new("http://localhost:8000/").timeout(), None);
    assert!(matches!(
        ServerClient::from_config(&ClientConfig::default()),
        Err(django_queryset::ClientError::Config(ConfigError::Validation(_)))
    ));
}
