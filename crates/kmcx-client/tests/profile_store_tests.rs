use kmcx_client::{FingerprintStore, ProfileStore};
use kmcx_core::config::load_config_from;
use kmcx_core::errors::ConfigError;
use kmcx_test_utils::TestContext;

#[test]
fn test_fingerprint_is_written_to_the_profile() {
    let ctx = TestContext::new();
    let store = ProfileStore::new(&ctx.config_path);

    store.save("cluster", "SHA256:abc").unwrap();

    let config = load_config_from(&ctx.config_path).unwrap();
    assert_eq!(
        config.profiles["cluster"].host_fingerprint.as_deref(),
        Some("SHA256:abc")
    );
    assert_eq!(config.profiles["local"].host_fingerprint, None);
    assert_eq!(config.active_profile.as_deref(), Some("cluster"));
}

#[test]
fn test_unknown_profile_is_reported() {
    let ctx = TestContext::new();
    let store = ProfileStore::new(&ctx.config_path);

    let err = store.save("missing", "SHA256:abc").unwrap_err();
    assert!(matches!(err, ConfigError::ProfileNotFound(name) if name == "missing"));
}
