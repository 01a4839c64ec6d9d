//! The build pass.
//!
//! Per component, in build order: `is_valid` -> requirement gate -> `run`. The outcome is
//! recorded on the node; the failure policy decides what happens to the rest of the pass.
//! Once every in-scope component has been attempted (or skipped), `on_build_finished` fires
//! for each attempted component with the overall result.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use hashbrown::HashSet;
use log::{debug, error, info, warn};

use super::Stack;
use crate::component::{BuildContext, Component, ComponentStatus};
use crate::config::FailurePolicy;
use crate::error::{BuildFailure, StackError};
use crate::ids::ComponentId;

/// Outcome for one in-scope component.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEntry {
    pub id: ComponentId,
    pub label: String,
    pub status: ComponentStatus,
    pub failure: Option<BuildFailure>,
    /// Not attempted because of the failure policy.
    pub skipped: bool,
    pub elapsed_ms: f32,
}

/// Result of one build pass, entries in build order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub succeeded: bool,
    pub entries: Vec<BuildEntry>,
}

impl BuildReport {
    pub fn entry(&self, id: ComponentId) -> Option<&BuildEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Entries that ended `Invalid` or `Failed`.
    pub fn failures(&self) -> impl Iterator<Item = &BuildEntry> {
        self.entries.iter().filter(|entry| entry.failure.is_some())
    }

    /// Entries that were attempted.
    pub fn executed(&self) -> impl Iterator<Item = &BuildEntry> {
        self.entries.iter().filter(|entry| !entry.skipped)
    }

    pub fn total_ms(&self) -> f32 {
        self.entries.iter().map(|entry| entry.elapsed_ms).sum()
    }
}

impl Stack {
    /// Build every component (`build_below == None`) or the subtree rooted at
    /// `build_below`, parent included. Returns true only if every attempted component
    /// ended `Success`.
    ///
    /// An unknown `build_below` is logged and reported as a failed pass.
    pub fn build(&mut self, build_below: Option<ComponentId>) -> bool {
        match self.build_pass(build_below) {
            Ok(report) => report.succeeded,
            Err(err) => {
                error!("build pass rejected ({}): {}", err.category(), err);
                false
            }
        }
    }

    /// Like [`Stack::build`], returning the per-component report.
    pub fn build_pass(&mut self, build_below: Option<ComponentId>) -> Result<BuildReport, StackError> {
        let scope = match build_below {
            Some(id) => {
                if !self.contains(id) {
                    return Err(StackError::UnknownComponent(id));
                }
                self.subtree(id)
            }
            None => self.components(),
        };
        info!(
            "build pass started: {} component(s){}",
            scope.len(),
            build_below.map_or(String::new(), |id| format!(" below {id}"))
        );

        for id in &scope {
            if let Some(node) = self.nodes.get_mut(id) {
                node.status = ComponentStatus::NotExecuted;
                node.failure = None;
            }
        }

        let policy = self.config().failure_policy;
        let mut succeeded = true;
        let mut aborted = false;
        let mut blocked: HashSet<ComponentId> = HashSet::new();
        let mut attempted = Vec::with_capacity(scope.len());
        let mut entries = Vec::with_capacity(scope.len());

        for id in scope {
            let label = self.node(id).label.clone();
            let under_failure = policy == FailurePolicy::SkipBranch
                && self.node(id).parent.is_some_and(|p| blocked.contains(&p));
            if aborted || under_failure {
                if under_failure {
                    blocked.insert(id);
                }
                debug!("skipping '{}' ({})", label, id);
                entries.push(BuildEntry {
                    id,
                    label,
                    status: ComponentStatus::NotExecuted,
                    failure: None,
                    skipped: true,
                    elapsed_ms: 0.0,
                });
                continue;
            }

            let started = Instant::now();
            let failure = self.execute(id);
            let elapsed_ms = started.elapsed().as_secs_f32() * 1000.0;
            attempted.push(id);

            let status = failure
                .as_ref()
                .map_or(ComponentStatus::Success, BuildFailure::status);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.status = status;
                node.failure = failure.clone();
            }

            match &failure {
                None => debug!("'{}' built in {:.3} ms", label, elapsed_ms),
                Some(reason) => {
                    succeeded = false;
                    warn!("'{}' ended {:?}: {}", label, status, reason);
                    match policy {
                        FailurePolicy::Continue => {}
                        FailurePolicy::SkipBranch => {
                            blocked.insert(id);
                        }
                        FailurePolicy::Abort => aborted = true,
                    }
                }
            }

            entries.push(BuildEntry {
                id,
                label,
                status,
                failure,
                skipped: false,
                elapsed_ms,
            });
        }

        for id in &attempted {
            self.finish(*id, succeeded);
        }

        let report = BuildReport { succeeded, entries };
        info!(
            "build pass {}: {} attempted, {} failed, {} skipped in {:.3} ms",
            if succeeded { "succeeded" } else { "failed" },
            attempted.len(),
            report.failures().count(),
            report.entries.len() - attempted.len(),
            report.total_ms()
        );
        Ok(report)
    }

    /// Run one component's gate and `run`; `None` means success.
    fn execute(&mut self, id: ComponentId) -> Option<BuildFailure> {
        let catch_panics = self.config().catch_panics;
        let Some(mut behaviour) = self.nodes.get_mut(&id).and_then(|node| node.behaviour.take())
        else {
            return Some(BuildFailure::RunFault {
                message: "component is already executing".to_string(),
            });
        };

        let failure = {
            let mut ctx = BuildContext::new(self, id);
            check_and_run(behaviour.as_mut(), &mut ctx, catch_panics)
        };

        if let Some(node) = self.nodes.get_mut(&id) {
            node.behaviour = Some(behaviour);
        }
        failure
    }

    fn finish(&mut self, id: ComponentId, succeeded: bool) {
        let catch_panics = self.config().catch_panics;
        let Some(mut behaviour) = self.nodes.get_mut(&id).and_then(|node| node.behaviour.take())
        else {
            return;
        };

        {
            let mut ctx = BuildContext::new(self, id);
            if let Err(message) = guarded(catch_panics, || {
                behaviour.on_build_finished(&mut ctx, succeeded)
            }) {
                error!("on_build_finished panicked for {}: {}", id, message);
            }
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.behaviour = Some(behaviour);
        }
    }
}

fn check_and_run(
    behaviour: &mut dyn Component,
    ctx: &mut BuildContext<'_>,
    catch_panics: bool,
) -> Option<BuildFailure> {
    match guarded(catch_panics, || behaviour.is_valid(ctx)) {
        Ok(true) => {}
        Ok(false) => return Some(BuildFailure::InvalidComponent),
        Err(message) => return Some(BuildFailure::RunFault { message }),
    }

    let names = ctx.stack().unsatisfied_requirements(ctx.id());
    if !names.is_empty() {
        return Some(BuildFailure::UnsatisfiedRequirement { names });
    }

    let outcome = match guarded(catch_panics, || behaviour.run(ctx)) {
        Ok(outcome) => outcome,
        Err(message) => return Some(BuildFailure::RunFault { message }),
    };
    match outcome {
        Ok(true) => None,
        Ok(false) => Some(BuildFailure::RunReturnedFalse),
        Err(err) => Some(BuildFailure::RunFault {
            message: format!("{err:#}"),
        }),
    }
}

/// Call `f`, turning a panic into its message when `catch_panics` is set.
fn guarded<R>(catch_panics: bool, f: impl FnOnce() -> R) -> Result<R, String> {
    if !catch_panics {
        return Ok(f());
    }
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
