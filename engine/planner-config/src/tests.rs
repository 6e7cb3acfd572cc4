use crate::{apply_env_overrides, CentralConfig};

#[test]
fn test_defaults_are_consistent() {
    let config = CentralConfig::default();

    assert_eq!(config.common.log_level, "info");
    assert_eq!(config.runner.episodes, 10);
    assert_eq!(config.runner.max_steps, 60);
    assert!(config.search.validate().is_ok());
    assert_eq!(config.crossing.crossing_point(), 21);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let toml = r#"
        [common]
        log_level = "debug"

        [search]
        max_iterations = 123

        [search.cost_constrained]
        cost_constraint = 0.25
    "#;

    let config: CentralConfig = toml::from_str(toml).unwrap();

    assert_eq!(config.common.log_level, "debug");
    assert_eq!(config.search.max_iterations, 123);
    assert!((config.search.cost_constrained.cost_constraint - 0.25).abs() < 1e-12);
    // Untouched sections keep their defaults.
    assert_eq!(config.runner.episodes, 10);
    assert_eq!(config.crossing.state_x_length, 41);
}

#[test]
fn test_env_overrides_take_precedence() {
    std::env::set_var("PLANNER_SEARCH_MAX_ITERATIONS", "777");
    std::env::set_var("PLANNER_COMMON_LOG_LEVEL", "trace");

    let config = apply_env_overrides(CentralConfig::default());

    assert_eq!(config.search.max_iterations, 777);
    assert_eq!(config.common.log_level, "trace");

    std::env::remove_var("PLANNER_SEARCH_MAX_ITERATIONS");
    std::env::remove_var("PLANNER_COMMON_LOG_LEVEL");
}

#[test]
fn test_unparseable_env_value_is_ignored() {
    std::env::set_var("PLANNER_RUNNER_EPISODES", "not-a-number");

    let config = apply_env_overrides(CentralConfig::default());
    assert_eq!(config.runner.episodes, 10);

    std::env::remove_var("PLANNER_RUNNER_EPISODES");
}

#[test]
fn test_config_round_trips_through_toml() {
    let mut config = CentralConfig::default();
    config.search.cost_constrained.kappa = 1.5;
    config.crossing.num_other_agents = 3;

    let encoded = toml::to_string(&config).unwrap();
    let decoded: CentralConfig = toml::from_str(&encoded).unwrap();

    assert!((decoded.search.cost_constrained.kappa - 1.5).abs() < 1e-12);
    assert_eq!(decoded.crossing.num_other_agents, 3);
}
