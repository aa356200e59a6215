//! Finite discounted MDPs and value iteration.
//!
//! `DiscreteMdp` holds, for every state and action, a list of
//! `(next, probability, reward)` transitions. An action with no
//! transitions is unavailable in that state; every state must have at
//! least one available action.
//!
//! ```text
//! Q(s, a) = Σ p(s' | s, a) · (r(s, a, s') + γ · V(s'))
//! V(s)    = max_a Q(s, a)
//! ```

use serde::{Deserialize, Serialize};

use liverswap_types::{LiverswapError, Result};

/// Probability mass may deviate from 1 by this much.
const PROBABILITY_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub next: usize,
    pub prob: f64,
    pub reward: f64,
}

/// A finite MDP with discount `gamma < 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteMdp {
    num_actions: usize,
    discount: f64,
    /// `transitions[state][action]`.
    transitions: Vec<Vec<Vec<Transition>>>,
}

impl DiscreteMdp {
    /// An MDP with no transitions yet.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for zero states or actions, or a discount
    /// outside `(0, 1)`.
    pub fn new(num_states: usize, num_actions: usize, discount: f64) -> Result<Self> {
        if num_states == 0 {
            return Err(LiverswapError::config("num_states", "must be positive"));
        }
        if num_actions == 0 {
            return Err(LiverswapError::config("num_actions", "must be positive"));
        }
        if !(discount > 0.0 && discount < 1.0) {
            return Err(LiverswapError::config(
                "discount",
                format!("{discount} is not in (0, 1)"),
            ));
        }
        Ok(Self {
            num_actions,
            discount,
            transitions: vec![vec![Vec::new(); num_actions]; num_states],
        })
    }

    /// Add a transition `state --action--> next` with probability `prob`.
    ///
    /// # Errors
    /// `InvalidConfig` for out-of-range indices or a probability outside
    /// `[0, 1]`.
    pub fn add_transition(
        &mut self,
        state: usize,
        action: usize,
        next: usize,
        prob: f64,
        reward: f64,
    ) -> Result<()> {
        let n = self.num_states();
        if state >= n || next >= n {
            return Err(LiverswapError::config(
                "state",
                format!("state index out of range (have {n})"),
            ));
        }
        if action >= self.num_actions {
            return Err(LiverswapError::config(
                "action",
                format!("{action} out of range (have {})", self.num_actions),
            ));
        }
        if !(0.0..=1.0).contains(&prob) {
            return Err(LiverswapError::config("prob", format!("{prob} is not in [0, 1]")));
        }
        if !reward.is_finite() {
            return Err(LiverswapError::config("reward", "must be finite"));
        }
        self.transitions[state][action].push(Transition { next, prob, reward });
        Ok(())
    }

    #[must_use]
    pub fn num_states(&self) -> usize {
        self.transitions.len()
    }

    #[must_use]
    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    #[must_use]
    pub fn discount(&self) -> f64 {
        self.discount
    }

    #[must_use]
    pub fn transitions(&self, state: usize, action: usize) -> &[Transition] {
        &self.transitions[state][action]
    }

    #[must_use]
    pub fn is_available(&self, state: usize, action: usize) -> bool {
        !self.transitions[state][action].is_empty()
    }

    /// Check every available action's probabilities sum to 1 and every
    /// state has an available action.
    ///
    /// # Errors
    /// Returns `InvalidConfig` describing the first offending state.
    pub fn validate(&self) -> Result<()> {
        for (s, actions) in self.transitions.iter().enumerate() {
            if actions.iter().all(Vec::is_empty) {
                return Err(LiverswapError::config(
                    "transitions",
                    format!("state {s} has no available action"),
                ));
            }
            for (a, list) in actions.iter().enumerate() {
                if list.is_empty() {
                    continue;
                }
                let mass: f64 = list.iter().map(|t| t.prob).sum();
                if (mass - 1.0).abs() > PROBABILITY_SLACK {
                    return Err(LiverswapError::config(
                        "transitions",
                        format!("state {s} action {a} has probability mass {mass}"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn q_value(&self, values: &[f64], state: usize, action: usize) -> f64 {
        self.transitions[state][action]
            .iter()
            .map(|t| t.prob * (t.reward + self.discount * values[t.next]))
            .sum()
    }

    /// Best available action in `state` under `values`; ties go to the
    /// lower action index.
    fn best_action(&self, values: &[f64], state: usize) -> (usize, f64) {
        let mut best = (0, f64::NEG_INFINITY);
        for action in 0..self.num_actions {
            if !self.is_available(state, action) {
                continue;
            }
            let q = self.q_value(values, state, action);
            if q > best.1 {
                best = (action, q);
            }
        }
        best
    }
}

/// Output of value iteration or policy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFunction {
    pub values: Vec<f64>,
    /// Greedy action per state with respect to `values`.
    pub greedy_actions: Vec<usize>,
    pub iterations: usize,
    /// Whether the sup-norm update fell below the tolerance.
    pub converged: bool,
}

fn check_budget(tolerance: f64, max_iterations: usize) -> Result<()> {
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return Err(LiverswapError::config("tolerance", "must be positive"));
    }
    if max_iterations == 0 {
        return Err(LiverswapError::config("max_iterations", "must be positive"));
    }
    Ok(())
}

/// Solve `mdp` by synchronous value iteration from `V = 0`.
///
/// Stops when the sup-norm change drops below `tolerance` or after
/// `max_iterations` sweeps.
///
/// # Errors
/// Returns `InvalidConfig` for a malformed MDP or budget.
pub fn value_iteration(mdp: &DiscreteMdp, tolerance: f64, max_iterations: usize) -> Result<ValueFunction> {
    mdp.validate()?;
    check_budget(tolerance, max_iterations)?;

    let n = mdp.num_states();
    let mut values = vec![0.0; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;
        let next: Vec<f64> = (0..n).map(|s| mdp.best_action(&values, s).1).collect();
        let delta = next
            .iter()
            .zip(&values)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        values = next;
        if delta < tolerance {
            converged = true;
            break;
        }
    }

    let greedy_actions = (0..n).map(|s| mdp.best_action(&values, s).0).collect();
    tracing::debug!(states = n, iterations, converged, "Value iteration finished");
    Ok(ValueFunction {
        values,
        greedy_actions,
        iterations,
        converged,
    })
}

/// Value of following the fixed `actions` (one per state) in `mdp`.
///
/// # Errors
/// `InvalidConfig` if `actions` has the wrong length or names an
/// unavailable action, or for a malformed MDP or budget.
pub fn evaluate_fixed(
    mdp: &DiscreteMdp,
    actions: &[usize],
    tolerance: f64,
    max_iterations: usize,
) -> Result<ValueFunction> {
    mdp.validate()?;
    check_budget(tolerance, max_iterations)?;
    if actions.len() != mdp.num_states() {
        return Err(LiverswapError::config(
            "actions",
            format!("{} actions for {} states", actions.len(), mdp.num_states()),
        ));
    }
    for (s, &a) in actions.iter().enumerate() {
        if a >= mdp.num_actions() || !mdp.is_available(s, a) {
            return Err(LiverswapError::config(
                "actions",
                format!("action {a} unavailable in state {s}"),
            ));
        }
    }

    let n = mdp.num_states();
    let mut values = vec![0.0; n];
    let mut iterations = 0;
    let mut converged = false;
    while iterations < max_iterations {
        iterations += 1;
        let next: Vec<f64> = (0..n).map(|s| mdp.q_value(&values, s, actions[s])).collect();
        let delta = next
            .iter()
            .zip(&values)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        values = next;
        if delta < tolerance {
            converged = true;
            break;
        }
    }

    let greedy_actions = (0..n).map(|s| mdp.best_action(&values, s).0).collect();
    Ok(ValueFunction {
        values,
        greedy_actions,
        iterations,
        converged,
    })
}
