//! Pipeline FSM tests

use pare_server::deploy::fsm::{PipelineEvent, PipelineFsm, PipelineState};

#[test]
fn test_fsm_initial_state() {
    let fsm = PipelineFsm::new();
    assert_eq!(fsm.state(), PipelineState::Pending);
    assert!(fsm.error().is_none());
    assert!(fsm.failed_in().is_none());
}

#[test]
fn test_fsm_image_flow() {
    let mut fsm = PipelineFsm::new();

    fsm.process(PipelineEvent::Start).unwrap();
    assert_eq!(fsm.state(), PipelineState::EnsuringRepository);

    fsm.process(PipelineEvent::RepositoryReady).unwrap();
    assert_eq!(fsm.state(), PipelineState::Building);

    fsm.process(PipelineEvent::Built).unwrap();
    fsm.process(PipelineEvent::Published).unwrap();
    assert_eq!(fsm.state(), PipelineState::Recording);

    fsm.process(PipelineEvent::Recorded).unwrap();
    assert_eq!(fsm.state(), PipelineState::Deployed);
    assert!(fsm.state().is_terminal());
}

#[test]
fn test_fsm_zip_flow_skips_repository() {
    let mut fsm = PipelineFsm::new();

    fsm.process(PipelineEvent::StartPackage).unwrap();
    assert_eq!(fsm.state(), PipelineState::Building);

    fsm.process(PipelineEvent::Built).unwrap();
    assert_eq!(fsm.state(), PipelineState::Publishing);
}

#[test]
fn test_fsm_failure_records_stage() {
    let mut fsm = PipelineFsm::new();
    fsm.process(PipelineEvent::Start).unwrap();
    fsm.process(PipelineEvent::RepositoryReady).unwrap();

    fsm.process(PipelineEvent::Fail("docker exited with 1".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), PipelineState::Failed);
    assert_eq!(fsm.error(), Some("docker exited with 1"));
    assert_eq!(fsm.failed_in(), Some(PipelineState::Building));
}

#[test]
fn test_fsm_invalid_transitions() {
    let mut fsm = PipelineFsm::new();
    assert!(fsm.process(PipelineEvent::Published).is_err());
    assert_eq!(fsm.state(), PipelineState::Pending);

    fsm.process(PipelineEvent::Start).unwrap();
    // the push needs the repository first
    assert!(fsm.process(PipelineEvent::Built).is_err());

    fsm.process(PipelineEvent::Fail("x".to_string())).unwrap();
    assert!(fsm.process(PipelineEvent::Fail("again".to_string())).is_err());
    assert!(fsm.process(PipelineEvent::Start).is_err());
}

#[test]
fn test_stage_names() {
    assert_eq!(PipelineState::Building.as_str(), "build");
    assert_eq!(PipelineState::EnsuringRepository.as_str(), "registry");
    assert_eq!(PipelineState::Recording.as_str(), "record");
}
