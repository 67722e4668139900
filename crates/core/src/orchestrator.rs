use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::driver::Driver;
use crate::error::{AutomationError, Result};
use crate::logger;
use crate::session::Session;
use crate::types::*;
use crate::workflow::Workflow;

/// A cooldown follows every `COOLDOWN_EVERY`-th processed target.
pub const COOLDOWN_EVERY: usize = 3;
pub const COOLDOWN: Duration = Duration::from_secs(3);

/// Only one run may drive the desktop at a time.
static RUN_LOCK: Mutex<()> = Mutex::new(());

/// Drives a [`Workflow`] across targets on a single worker, keeping the
/// [`Session`] alive and reporting through the event channel.
pub struct Orchestrator<S: Session, W: Workflow> {
    pub driver: Driver,
    pub session: S,
    pub workflow: W,
    events: Option<mpsc::Sender<Event>>,
    cancel: Arc<AtomicBool>,
}

impl<S: Session, W: Workflow> Orchestrator<S, W> {
    pub fn new(driver: Driver, session: S, workflow: W) -> Self {
        Self { driver, session, workflow, events: None, cancel: Arc::new(AtomicBool::new(false)) }
    }

    pub fn with_events(mut self, tx: mpsc::Sender<Event>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Set to request cancellation. Checked only between targets.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }

    /// Send `message` to a single target.
    pub fn send_one(&mut self, target: &ActionTarget, message: &str) -> bool {
        let _run = RUN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        logger::info_p("batch", &format!("sending to {}", target));

        if let Err(e) = self.session.ensure_ready(&mut self.driver) {
            logger::error_p("batch", &e.to_string());
            return false;
        }

        let ok = match self.process(target, message) {
            Ok(ok) => ok,
            Err(e) => {
                logger::error_p("batch", &format!("{}: {}", target, e));
                false
            }
        };
        self.report(target, ok);
        self.emit(Event::Progress(100));
        ok
    }

    /// Send `message` to every target in order. Individual failures are
    /// recorded and skipped; only an empty list or a session that cannot be
    /// activated stops the run before its first target.
    pub fn send_batch(&mut self, targets: &[ActionTarget], message: &str) -> BatchOutcome {
        let _run = RUN_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut outcome = BatchOutcome::default();

        if targets.is_empty() {
            logger::warn_p("batch", "no targets, nothing to send");
            outcome.aborted = Some(AutomationError::EmptyTargets);
            return outcome;
        }

        self.cancel.store(false, Ordering::SeqCst);
        let total = targets.len();
        logger::info_p("batch", &format!("starting run over {} target(s)", total));

        if let Err(e) = self.session.ensure_ready(&mut self.driver) {
            logger::error_p("batch", &format!("run aborted: {}", e));
            outcome.aborted = Some(e);
            return outcome;
        }

        for (idx, target) in targets.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                logger::warn_p(
                    "batch",
                    &format!("{} with {} of {} processed", AutomationError::Cancelled, outcome.processed, total),
                );
                outcome.cancelled = true;
                break;
            }

            let i = idx + 1;
            logger::info_p("batch", &format!("[{}/{}] {}", i, total, target));
            let ok = match self.process(target, message) {
                Ok(ok) => ok,
                Err(e) => {
                    logger::error_p("batch", &format!("{}: {}", target, e));
                    self.recover();
                    false
                }
            };
            if ok {
                outcome.record_success();
            } else {
                outcome.record_failure(target);
            }
            self.report(target, ok);

            self.emit(Event::Progress((i * 100 / total) as u8));
            if i % COOLDOWN_EVERY == 0 {
                logger::info_p("batch", &format!("cooling down for {}s", COOLDOWN.as_secs()));
                self.driver.pause(COOLDOWN);
            }
        }

        logger::info_p(
            "result",
            &format!("{} of {} sent, {} failed", outcome.succeeded, outcome.processed, outcome.failed_targets.len()),
        );
        if !outcome.failed_targets.is_empty() {
            let names: Vec<_> = outcome.failed_targets.iter().map(|t| t.name.as_str()).collect();
            logger::warn_p("result", &format!("failed: {}", names.join(", ")));
        }
        outcome
    }

    fn process(&mut self, target: &ActionTarget, message: &str) -> Result<bool> {
        if !self.workflow.open_surface(&mut self.driver, target)? {
            logger::warn_p("batch", &format!("could not open conversation with {}", target));
            return Ok(false);
        }
        self.workflow.deliver(&mut self.driver, message)?;
        Ok(true)
    }

    /// Re-activate after a target raised, in case the session died under it.
    fn recover(&mut self) {
        logger::info_p("session", "re-checking session after error");
        if let Err(e) = self.session.ensure_ready(&mut self.driver) {
            logger::warn_p("session", &format!("recovery failed: {}", e));
        }
    }

    fn report(&self, target: &ActionTarget, ok: bool) {
        if ok {
            logger::info_p("result", &format!("sent to {}", target));
        } else {
            logger::warn_p("result", &format!("failed for {}", target));
        }
        self.emit(Event::TargetResult(target.name.clone(), ok));
    }
}

/// Worker loop. Runs on a background thread until `Quit` or the command
/// channel closes; emits `Completed` after every send command.
pub fn serve<S: Session, W: Workflow>(mut orchestrator: Orchestrator<S, W>, cmd_rx: mpsc::Receiver<Command>) {
    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            Command::Quit => {
                logger::info("shutting down");
                return;
            }
            Command::SendOne(target, message) => {
                let ok = orchestrator.send_one(&target, &message);
                orchestrator.emit(Event::Completed(ok));
            }
            Command::SendBatch(targets, message) => {
                let outcome = orchestrator.send_batch(&targets, &message);
                orchestrator.emit(Event::Completed(outcome.is_success()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::scripted::ScriptedPlatform;
    use crate::sleep::RecordingPacer;
    use std::sync::atomic::AtomicUsize;

    /// Pause recorded by the fake workflow once per target, to place
    /// cooldowns in the sequence.
    const MARK: Duration = Duration::from_millis(1);

    struct FakeSession {
        ready: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Session for FakeSession {
        fn state(&self) -> SessionState {
            if self.ready { SessionState::Ready } else { SessionState::Failed }
        }

        fn ensure_ready(&mut self, _driver: &mut Driver) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.ready {
                Ok(())
            } else {
                Err(AutomationError::SessionActivationFailed("manual login required".into()))
            }
        }
    }

    #[derive(Default)]
    struct FakeWorkflow {
        unverified: Vec<&'static str>,
        raising: Vec<&'static str>,
        cancel_after: Option<(&'static str, Arc<AtomicBool>)>,
        delivered: Vec<String>,
    }

    impl Workflow for FakeWorkflow {
        fn open_surface(&mut self, driver: &mut Driver, target: &ActionTarget) -> Result<bool> {
            driver.pause(MARK);
            if self.raising.contains(&target.name.as_str()) {
                return Err(AutomationError::WindowNotFound("Chat".into()));
            }
            if let Some((name, flag)) = &self.cancel_after {
                if *name == target.name {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            Ok(!self.unverified.contains(&target.name.as_str()))
        }

        fn deliver(&mut self, _driver: &mut Driver, message: &str) -> Result<()> {
            self.delivered.push(message.to_string());
            Ok(())
        }
    }

    struct Rig {
        orchestrator: Orchestrator<FakeSession, FakeWorkflow>,
        pacer: RecordingPacer,
        session_calls: Arc<AtomicUsize>,
        events: mpsc::Receiver<Event>,
    }

    fn rig(ready: bool, workflow: FakeWorkflow) -> Rig {
        let pacer = RecordingPacer::new();
        let driver = Driver::new(Box::new(ScriptedPlatform::with_window("Chat")), "Chat", Box::new(pacer.clone()));
        let session_calls = Arc::new(AtomicUsize::new(0));
        let session = FakeSession { ready, calls: session_calls.clone() };
        let (tx, events) = mpsc::channel();
        let orchestrator = Orchestrator::new(driver, session, workflow).with_events(tx);
        Rig { orchestrator, pacer, session_calls, events }
    }

    fn targets(names: &[&str]) -> Vec<ActionTarget> {
        names.iter().map(|n| ActionTarget::new(*n)).collect()
    }

    fn progress(events: &mpsc::Receiver<Event>) -> Vec<u8> {
        events
            .try_iter()
            .filter_map(|e| match e {
                Event::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn one_unopened_target_does_not_stop_the_run() {
        let mut r = rig(true, FakeWorkflow { unverified: vec!["B"], ..Default::default() });
        let outcome = r.orchestrator.send_batch(&targets(&["A", "B", "C"]), "hi");

        assert_eq!(outcome.processed, 3);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed_targets, targets(&["B"]));
        assert!(outcome.is_success());
        assert_eq!(progress(&r.events), [33, 66, 100]);
        assert_eq!(r.orchestrator.workflow.delivered, ["hi", "hi"]);
    }

    #[test]
    fn cooldown_after_every_third_target() {
        let mut r = rig(true, FakeWorkflow::default());
        let outcome = r.orchestrator.send_batch(&targets(&["1", "2", "3", "4", "5", "6", "7"]), "hi");

        assert_eq!(outcome.processed, 7);
        let c = COOLDOWN;
        assert_eq!(r.pacer.pauses(), [MARK, MARK, MARK, c, MARK, MARK, MARK, c, MARK]);
    }

    #[test]
    fn empty_targets_never_touch_the_session() {
        let mut r = rig(true, FakeWorkflow::default());
        let outcome = r.orchestrator.send_batch(&[], "hi");

        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.aborted, Some(AutomationError::EmptyTargets));
        assert_eq!(r.session_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_activation_aborts_before_any_target() {
        let mut r = rig(false, FakeWorkflow::default());
        let outcome = r.orchestrator.send_batch(&targets(&["A", "B"]), "hi");

        assert_eq!(outcome.processed, 0);
        assert!(matches!(outcome.aborted, Some(AutomationError::SessionActivationFailed(_))));
        assert!(!outcome.is_success());
        assert!(r.pacer.pauses().is_empty());
        assert!(progress(&r.events).is_empty());
    }

    #[test]
    fn raising_target_triggers_session_recovery() {
        let mut r = rig(true, FakeWorkflow { raising: vec!["B"], ..Default::default() });
        let outcome = r.orchestrator.send_batch(&targets(&["A", "B", "C"]), "hi");

        assert_eq!(outcome.failed_targets, targets(&["B"]));
        assert_eq!(outcome.succeeded + outcome.failed_targets.len(), outcome.processed);
        assert_eq!(r.session_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancellation_waits_for_the_current_target() {
        let mut r = rig(true, FakeWorkflow::default());
        let flag = r.orchestrator.cancel_flag();
        r.orchestrator.workflow.cancel_after = Some(("A", flag));
        let outcome = r.orchestrator.send_batch(&targets(&["A", "B", "C"]), "hi");

        assert!(outcome.cancelled);
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.succeeded, 1);
    }

    #[test]
    fn serve_reports_completion_per_command() {
        let r = rig(true, FakeWorkflow::default());
        let (cmd_tx, cmd_rx) = mpsc::channel();
        cmd_tx.send(Command::SendOne(ActionTarget::new("A"), "hi".into())).unwrap();
        cmd_tx.send(Command::SendBatch(Vec::new(), "hi".into())).unwrap();
        cmd_tx.send(Command::Quit).unwrap();

        serve(r.orchestrator, cmd_rx);
        let completed: Vec<_> = r
            .events
            .try_iter()
            .filter_map(|e| match e {
                Event::Completed(ok) => Some(ok),
                _ => None,
            })
            .collect();
        assert_eq!(completed, [true, false]);
    }
}
