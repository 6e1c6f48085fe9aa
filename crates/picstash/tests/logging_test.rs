//! Tracing bootstrap tests.

use picstash::{ErrorClass, LoggingConfig, init_tracing};

#[test]
fn test_second_init_fails_without_panicking() {
    let config = LoggingConfig {
        level: "picstash=debug".to_string(),
        json: true,
    };

    init_tracing(&config).unwrap();
    let err = init_tracing(&config).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Config);
}
