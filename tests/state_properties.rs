// tests/state_properties.rs

use proptest::prelude::*;

use mesos_executor::types::{ProcessState, TaskState, task_state_from_process};

fn process_state() -> impl Strategy<Value = ProcessState> {
    prop_oneof![
        Just(ProcessState::Staging),
        Just(ProcessState::Starting),
        Just(ProcessState::Running),
        Just(ProcessState::Stopping),
        Just(ProcessState::Stopped),
    ]
}

proptest! {
    // Whatever the supervisor reports, in whatever order, the task walks the
    // lifecycle forward only and never leaves a terminal state.
    #[test]
    fn observed_task_states_never_walk_backwards(
        observations in proptest::collection::vec(process_state(), 1..40),
        asked_shutdown in any::<bool>(),
    ) {
        let mut state = TaskState::Staging;
        for observed in observations {
            let next = state.advance(task_state_from_process(observed, asked_shutdown));
            prop_assert!(next.rank() >= state.rank());
            if state.is_terminal() {
                prop_assert_eq!(next, state);
            }
            state = next;
        }
    }

    #[test]
    fn stopped_means_finished_only_when_asked(asked_shutdown in any::<bool>()) {
        let mapped = task_state_from_process(ProcessState::Stopped, asked_shutdown);
        prop_assert!(mapped.is_terminal());
        prop_assert_eq!(mapped == TaskState::Finished, asked_shutdown);
    }
}
