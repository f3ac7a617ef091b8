//! Runtime settings layering with `LOOM_*` environment overrides.

use std::io::Write;

use loom::infrastructure::config::SettingsLoader;

#[test]
fn test_env_overrides_defaults() {
    temp_env::with_vars(
        [
            ("LOOM_LOGGING__LEVEL", Some("debug")),
            ("LOOM_EXECUTION__MAX_PARALLEL_ROLLOUTS", Some("2")),
            ("LOOM_RETRY__MAX_RETRIES", Some("5")),
        ],
        || {
            let settings = SettingsLoader::load().expect("settings should load");
            assert_eq!(settings.logging.level, "debug");
            assert_eq!(settings.execution.max_parallel_rollouts, 2);
            assert_eq!(settings.retry.max_retries, 5);
            assert_eq!(settings.execution.max_concurrent_calls, 8);
        },
    );
}

#[test]
fn test_env_wins_over_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "rate_limit:\n  requests_per_second: 20\n  burst_size: 40").unwrap();

    temp_env::with_var("LOOM_RATE_LIMIT__REQUESTS_PER_SECOND", Some("3"), || {
        let settings = SettingsLoader::load_from_file(file.path()).unwrap();
        assert_eq!(settings.rate_limit.requests_per_second, 3);
        assert_eq!(settings.rate_limit.burst_size, 40);
    });
}

#[test]
fn test_invalid_env_value_is_rejected() {
    temp_env::with_var("LOOM_LOGGING__FORMAT", Some("xml"), || {
        let err = SettingsLoader::load().unwrap_err();
        assert!(err.to_string().contains("xml"), "unexpected error: {err:#}");
    });
}
