use crate::env::Env;
use canon::{EnvSpec, Trajectory, TrajectorySampler, Transition, TransitionSampler};
use ndarray::Array3;
use tracing::debug;

/// Coverage sampler: a state from [`Env::sample_state`], a uniformly random
/// action and the environment's successor.
#[derive(Debug, Clone)]
pub struct EnvSampler<E> {
    env: E,
}

impl<E: Env> EnvSampler<E> {
    pub fn new(env: E) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &E {
        &self.env
    }
}

impl<E: Env> TransitionSampler for EnvSampler<E> {
    fn spec(&self) -> &EnvSpec {
        self.env.spec()
    }

    fn sample(&mut self, batch_size: usize, rng: &mut fastrand::Rng) -> Vec<Transition> {
        (0..batch_size)
            .map(|_| {
                let obs = self.env.sample_state(rng);
                let act = self.env.sample_action(rng);
                let (next_obs, done) = self.env.transition(&obs, &act, rng);
                Transition::new(obs, act, next_obs).with_done(done)
            })
            .collect()
    }

    fn transition_table(&self) -> Option<Array3<f64>> {
        self.env.transition_table()
    }
}

/// Episodes of the uniformly random policy, cut after `horizon` steps.
#[derive(Debug, Clone)]
pub struct RandomRollout<E> {
    env: E,
    horizon: usize,
}

impl<E: Env> RandomRollout<E> {
    pub fn new(env: E, horizon: usize) -> Self {
        Self { env, horizon }
    }
}

impl<E: Env> TrajectorySampler for RandomRollout<E> {
    fn spec(&self) -> &EnvSpec {
        self.env.spec()
    }

    fn rollout(&mut self, n_episodes: usize, rng: &mut fastrand::Rng) -> Vec<Trajectory> {
        debug!(n_episodes, horizon = self.horizon, "rolling out random policy");
        (0..n_episodes)
            .map(|_| {
                let mut state = self.env.initial_state(rng);
                let mut transitions = Vec::with_capacity(self.horizon);
                for _ in 0..self.horizon {
                    let act = self.env.sample_action(rng);
                    let (next, done) = self.env.transition(&state, &act, rng);
                    transitions.push(Transition::new(state, act, next.clone()).with_done(done));
                    if done {
                        break;
                    }
                    state = next;
                }
                Trajectory { transitions }
            })
            .collect()
    }
}
