// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A small generic finite-state-machine skeleton.
//!
//! States are plain values; behavior lives in a [`StateMachine`]
//! implementation that the FSM drives by calling `run` for the current
//! state and `transition` to decide the next one. A state that transitions
//! to [`StateMachine::INVALID`] is terminal: `step` stops advancing once
//! it's reached.

/// The states, run behavior, and transition behavior of one machine.
///
/// `State` is usually a small `Copy` enum or integer id. `INVALID` is the
/// sentinel state meaning "no further transitions"; it does not have to be
/// reachable as an ordinary state.
pub trait StateMachine {
    type State: Copy + Eq;
    type Context;

    const INVALID: Self::State;

    /// Executes whatever the current state does.
    fn run(&mut self, state: Self::State, ctx: &mut Self::Context);

    /// Decides the next state after `run` has executed for `state`.
    fn transition(&mut self, state: Self::State, ctx: &mut Self::Context) -> Self::State;
}

/// Drives a [`StateMachine`] from a starting state.
pub struct Fsm<M: StateMachine> {
    machine: M,
    state: M::State,
}

impl<M: StateMachine> Fsm<M> {
    pub fn new(machine: M, initial: M::State) -> Self {
        Self {
            machine,
            state: initial,
        }
    }

    pub fn state(&self) -> M::State {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state == M::INVALID
    }

    /// Runs the current state once and transitions, unless already
    /// terminal. Returns the state after the step.
    pub fn step(&mut self, ctx: &mut M::Context) -> M::State {
        if self.is_terminal() {
            return self.state;
        }
        self.machine.run(self.state, ctx);
        self.state = self.machine.transition(self.state, ctx);
        self.state
    }

    /// Steps repeatedly until the machine reaches [`StateMachine::INVALID`]
    /// or `max_steps` have run, whichever comes first, guarding against a
    /// transition function that never terminates.
    pub fn run_to_completion(&mut self, ctx: &mut M::Context, max_steps: usize) -> M::State {
        for _ in 0..max_steps {
            if self.is_terminal() {
                break;
            }
            self.step(ctx);
        }
        self.state
    }
}
