use signup_gateway::config::{AppConfig, Environment, StorageBackendKind, DEFAULT_SESSION_SECRET};
use signup_gateway::storage::StorageConfig;
use std::io::Write;
use time::Duration;

fn vars(pairs: &[(&str, &str)]) -> config::Map<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn defaults_match_the_documented_values() {
    let config = AppConfig::from_sources(vars(&[])).unwrap();

    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.body_limit, 10 * 1024 * 1024);
    assert!(!config.server.trust_proxy);
    assert_eq!(config.storage.backend, StorageBackendKind::Mongo);
    assert_eq!(config.storage.database, "demo");
    assert_eq!(config.session.secret, DEFAULT_SESSION_SECRET);
    assert_eq!(config.environment, Environment::Development);

    let session = config.session_runtime();
    assert_eq!(session.collection, "sessions");
    assert_eq!(session.max_age, Duration::hours(24));
    assert!(!session.secure);
}

#[test]
fn conventional_variables_are_honoured() {
    let config = AppConfig::from_sources(vars(&[
        ("PORT", "8080"),
        ("MONGODB_URI", "mongodb://db.internal:27017"),
        ("SESSION_SECRET", "s3cret"),
        ("NODE_ENV", "production"),
    ]))
    .unwrap();

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.storage.uri, "mongodb://db.internal:27017");
    assert_eq!(config.session.secret, "s3cret");
    assert!(config.is_production());
    assert!(config.session_runtime().secure);
}

#[test]
fn prefixed_variables_win_over_conventional_ones() {
    let config = AppConfig::from_sources(vars(&[
        ("PORT", "8080"),
        ("SIGNUP_SERVER__PORT", "9090"),
        ("SIGNUP_SERVER__TRUST_PROXY", "true"),
        ("SIGNUP_STORAGE__BACKEND", "memory"),
    ]))
    .unwrap();

    assert_eq!(config.server.port, 9090);
    assert!(config.server.trust_proxy);
    assert!(matches!(config.storage_runtime(), StorageConfig::Memory));
}

#[test]
fn unknown_environment_falls_back_to_development() {
    let config = AppConfig::from_sources(vars(&[("NODE_ENV", "staging")])).unwrap();
    assert_eq!(config.environment, Environment::Development);
}

#[test]
fn only_exact_production_enables_production() {
    for value in ["prod", "Production", "PRODUCTION"] {
        let config = AppConfig::from_sources(vars(&[("NODE_ENV", value)])).unwrap();
        assert!(!config.is_production(), "{value:?} must not count as production");
        assert!(!config.session_runtime().secure);
    }

    let config = AppConfig::from_sources(vars(&[("NODE_ENV", "production")])).unwrap();
    assert_eq!(config.environment, Environment::Production);
}

#[test]
fn config_file_is_loaded_and_validated() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "[server]\nport = 4000\n\n[storage]\nbackend = \"mongo\"\nuri = \"mongodb://file-host:27017\"\ndatabase = \"signups\""
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let config = AppConfig::from_sources(vars(&[("SIGNUP_CONFIG", path.as_str())])).unwrap();
    assert_eq!(config.server.port, 4000);
    match config.storage_runtime() {
        StorageConfig::Mongo { uri, database } => {
            assert_eq!(uri, "mongodb://file-host:27017");
            assert_eq!(database, "signups");
        }
        other => panic!("Unexpected storage config: {other:?}"),
    }

    let result = AppConfig::from_sources(vars(&[
        ("SIGNUP_CONFIG", path.as_str()),
        ("SIGNUP_STORAGE__DATABASE", " "),
    ]));
    assert!(result.is_err(), "Expected blank database name to fail validation");
}
