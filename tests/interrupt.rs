//! SIGINT handling. Kept in its own test binary: the interrupt flag is
//! process-wide and the test signals its whole process group.
#![cfg(unix)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nexus_provision::sequencer::Sequencer;
use nexus_provision::ssh::SshClient;
use nexus_provision::{CancellationToken, ErrorCode, Plan, PlanState, Session, Step, StepState};

#[test]
fn ctrl_c_lets_the_running_step_finish_then_cancels() {
    // Leave the test runner's group so the signal below reaches only us and our children.
    assert_eq!(unsafe { libc::setpgid(0, 0) }, 0);

    let token = CancellationToken::on_interrupt();
    let session = Session::new(Arc::new(SshClient::local())).elevated(false);
    let plan = Plan::new("demo")
        .step(Step::command("slow", "sleep 1; echo finished"))
        .step(Step::command("after", "echo after"));

    let interrupter = thread::spawn(|| {
        thread::sleep(Duration::from_millis(300));
        unsafe { libc::kill(0, libc::SIGINT) };
    });

    let report = Sequencer::new()
        .with_cancellation(token.clone())
        .execute(&plan, &session);
    interrupter.join().unwrap();

    assert!(token.is_cancelled());
    assert!(report.cancelled);
    assert_eq!(report.state, PlanState::Aborted);
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].state, StepState::Succeeded);
    assert_eq!(report.steps[0].output.as_deref(), Some("finished"));
    assert_eq!(report.to_error().unwrap().code, ErrorCode::PlanCancelled);
}
