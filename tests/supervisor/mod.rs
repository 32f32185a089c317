//! Supervisor module tests.

mod policy_test;

/// Verify all public supervisor types are exported from the library.
#[test]
fn test_all_supervisor_types_exported() {
    use frame_supervisor::supervisor::{
        BackoffStrategy, EventBus, ExitClassification, RestartPolicy, Supervisor,
        SupervisorError, SupervisorEvent, SupervisorOptions, SupervisorState,
        SupervisorStateMachine,
    };
    use frame_supervisor::transcoder::InvocationSpec;

    let _ = Supervisor::new(InvocationSpec::new("ffmpeg", vec![]));
    let _ = Supervisor::with_options(
        InvocationSpec::new("ffmpeg", vec![]),
        SupervisorOptions::default(),
    );
    let _ = SupervisorStateMachine::new();
    let _ = EventBus::default();
    let _ = RestartPolicy::default();

    let _: fn() -> SupervisorError = || SupervisorError::Binding;
    let _ = SupervisorEvent::Started;
    let _ = SupervisorState::Stopped;
    let _ = BackoffStrategy::Fixed;
    let _ = ExitClassification::Restart;
}
