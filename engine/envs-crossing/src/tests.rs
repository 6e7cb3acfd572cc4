use super::*;
use rand::SeedableRng;

fn joint(ego: ActionIdx, other: ActionIdx) -> JointAction {
    JointAction::new(vec![ego, other])
}

fn state_with_positions(ego_x: i64, other_x: i64) -> CrossingState {
    let mut state = CrossingState::new(&CrossingConfig::default());
    state.add_hypothesis(GapPolicy::new(4, 6));
    state.add_hypothesis(GapPolicy::new(0, 2));
    place(&state, ego_x, other_x)
}

/// Walk a fresh state to the wanted positions via execute, keeping the
/// public construction path honest.
fn place(state: &CrossingState, ego_x: i64, other_x: i64) -> CrossingState {
    let mut rng = ChaCha20Rng::seed_from_u64(0);
    let mut current = state.clone();
    while current.ego_state().x_pos < ego_x || current.other_state(0).x_pos < other_x {
        let ego_action = if current.ego_state().x_pos < ego_x {
            FORWARD
        } else {
            WAIT
        };
        let other_action = if current.other_state(0).x_pos < other_x {
            FORWARD
        } else {
            WAIT
        };
        current = current.execute(&joint(ego_action, other_action), &mut rng).state;
        assert!(!current.is_terminal(), "setup walk must not terminate");
    }
    current
}

#[test]
fn test_default_geometry() {
    let config = CrossingConfig::default();
    assert_eq!(config.crossing_point(), 21);
    assert_eq!(config.ego_goal_position, 35);
}

#[test]
fn test_forward_from_one_before_goal_reaches_it() {
    let state = state_with_positions(34, 0);
    let mut rng = ChaCha20Rng::seed_from_u64(0);

    let outcome = state.execute(&joint(FORWARD, WAIT), &mut rng);

    assert!(outcome.state.ego_goal_reached());
    assert!(outcome.state.is_terminal());
    assert!(!outcome.state.ego_collided());
    assert!((outcome.rewards[0] - 100.0).abs() < 1e-12);
    assert!(outcome.ego_cost.abs() < 1e-12);
}

#[test]
fn test_meeting_on_crossing_point_collides() {
    // Ego at 20 moving forward, other at 22 moving back: both land on 21.
    let state = state_with_positions(20, 22);
    let mut rng = ChaCha20Rng::seed_from_u64(0);

    let outcome = state.execute(&joint(FORWARD, BACKWARD), &mut rng);

    assert!(outcome.state.is_terminal());
    assert!(outcome.state.ego_collided());
    assert!((outcome.rewards[0] + 1000.0).abs() < 1e-12);
    assert!((outcome.ego_cost - 1.0).abs() < 1e-12);
}

#[test]
fn test_passing_crossing_point_alone_is_safe() {
    let state = state_with_positions(20, 10);
    let mut rng = ChaCha20Rng::seed_from_u64(0);

    let outcome = state.execute(&joint(FORWARD, FORWARD), &mut rng);

    assert!(!outcome.state.is_terminal());
    assert!(outcome.rewards[0].abs() < 1e-12);
    assert!(outcome.ego_cost.abs() < 1e-12);
}

#[test]
fn test_last_actions_recorded() {
    let state = state_with_positions(5, 3);
    let mut rng = ChaCha20Rng::seed_from_u64(0);

    let next = state.execute(&joint(BACKWARD, FORWARD), &mut rng).state;

    assert_eq!(next.last_action(0), BACKWARD);
    assert_eq!(next.last_action(1), FORWARD);
    assert_eq!(next.ego_state().x_pos, 4);
    assert_eq!(next.other_state(0).x_pos, 4);
}

#[test]
fn test_gap_policy_action_probabilities() {
    // Distance 5, desired gaps 4..=6: gap 4 -> forward, 5 -> wait,
    // 6 -> backward, one third each.
    let policy = GapPolicy::new(4, 6);

    assert!((policy.probability(5, FORWARD) - 1.0 / 3.0).abs() < 1e-12);
    assert!((policy.probability(5, WAIT) - 1.0 / 3.0).abs() < 1e-12);
    assert!((policy.probability(5, BACKWARD) - 1.0 / 3.0).abs() < 1e-12);

    let total: f64 = [WAIT, FORWARD, BACKWARD]
        .iter()
        .map(|&action| policy.probability(5, action))
        .sum();
    assert!((total - 1.0).abs() < 1e-12);
}

#[test]
fn test_gap_policy_saturates_far_from_gap() {
    let policy = GapPolicy::new(2, 3);

    // Distance far above every desired gap: always forward.
    assert!((policy.probability(10, FORWARD) - 1.0).abs() < 1e-12);
    // Distance below every desired gap: always backward.
    assert!((policy.probability(-1, BACKWARD) - 1.0).abs() < 1e-12);
}

#[test]
fn test_gap_policy_act_is_seed_deterministic() {
    let policy = GapPolicy::new(0, 6);

    let actions_a: Vec<ActionIdx> = {
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        (0..32).map(|_| policy.act(3, &mut rng)).collect()
    };
    let actions_b: Vec<ActionIdx> = {
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        (0..32).map(|_| policy.act(3, &mut rng)).collect()
    };

    assert_eq!(actions_a, actions_b);
    // The sampled gaps vary, so at this distance the policy must not be a
    // constant function of its input.
    assert!(actions_a.iter().any(|&a| a != actions_a[0]));
}

#[test]
fn test_hypothesis_queries() {
    let state = state_with_positions(5, 0);

    assert_eq!(state.num_hypotheses(1), 2);
    assert!((state.hypothesis_prior(0, 1) - 0.5).abs() < 1e-12);

    // Distance 5, hypothesis 1 keeps gaps 0..=2: always forward.
    assert!((state.hypothesis_probability(1, 1, FORWARD) - 1.0).abs() < 1e-12);
    assert!(state.hypothesis_probability(1, 1, BACKWARD).abs() < 1e-12);
}

#[test]
fn test_planned_action_follows_assigned_hypothesis() {
    let state = state_with_positions(5, 0);
    let mut rng = ChaCha20Rng::seed_from_u64(0);

    let assignment: HypothesisAssignment = [(1, 1)].into_iter().collect();
    // Hypothesis 1 (gaps 0..=2) always drives forward at distance 5.
    for _ in 0..16 {
        assert_eq!(
            state.plan_action_current_hypothesis(1, &assignment, &mut rng),
            FORWARD
        );
    }
}

#[test]
fn test_agent_indices_and_action_count() {
    let state = state_with_positions(0, 0);
    assert_eq!(state.agent_indices(), vec![0, 1]);
    assert_eq!(state.num_actions(0), 3);
    assert_eq!(state.num_actions(1), 3);
}
