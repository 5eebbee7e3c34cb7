//! Alignment Pipeline - orchestrates the four stages.
//!
//! Intellect and Will run on the caller's path. Conscience, Spirit and the
//! ledger write run afterwards as a detached task, so the answer is never
//! delayed by the audit and an audit failure can never reach the caller.

use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::{AuditReport, AuditStatus, PipelineRun, ValueSet, WillDecision};
use crate::engine::{Conscience, Intellect, Spirit, Will};
use crate::error::{AlignmentError, AlignmentResult};
use crate::storage::{AuditLedger, AuditTracker};

/// Pipeline behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineSettings {
    /// Critique the suppression notice of blocked runs instead of skipping the audit.
    pub audit_blocked_runs: bool,
}

/// Handle to a run's background audit.
///
/// Dropping it detaches the task.
#[derive(Debug)]
pub struct AuditTask(JoinHandle<()>);

impl AuditTask {
    /// Wait for the audit to finish.
    pub async fn finished(self) {
        if let Err(e) = self.0.await {
            tracing::error!(error = %e, "Audit task did not finish cleanly");
        }
    }
}

/// What the caller gets back from a run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub final_output: String,
    pub will_decision: WillDecision,
    pub audit: AuditTask,
}

/// Components shared with the background audit.
struct AuditStages {
    conscience: Conscience,
    spirit: Spirit,
    ledger: Arc<dyn AuditLedger>,
    tracker: AuditTracker,
}

/// Runs Intellect -> Will, then Conscience -> Spirit -> Ledger in the background.
pub struct AlignmentPipeline {
    intellect: Intellect,
    will: Will,
    audit: Arc<AuditStages>,
    settings: PipelineSettings,
}

impl AlignmentPipeline {
    pub fn new(
        intellect: Intellect,
        will: Will,
        conscience: Conscience,
        ledger: Arc<dyn AuditLedger>,
        tracker: AuditTracker,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            intellect,
            will,
            audit: Arc::new(AuditStages {
                conscience,
                spirit: Spirit::new(),
                ledger,
                tracker,
            }),
            settings,
        }
    }

    /// Answer `prompt` under `value_set`.
    ///
    /// Returns once Intellect and Will have finished. Only an Intellect
    /// failure is an error; the audit is dispatched and not awaited.
    pub async fn run(&self, prompt: &str, value_set: &ValueSet) -> AlignmentResult<RunOutcome> {
        if value_set.is_empty() {
            return Err(AlignmentError::BadRequest(format!(
                "Value set '{}' has no value statements",
                value_set.name
            )));
        }

        let mut run = PipelineRun::new(prompt, value_set);
        let run_id = run.run_id;

        tracing::info!(
            run_id = %run_id,
            value_set = %value_set.name,
            values = value_set.len(),
            "Pipeline run started"
        );

        let thought = self
            .intellect
            .think(prompt, value_set)
            .await
            .map_err(|e| {
                tracing::error!(run_id = %run_id, error = %e, "Intellect failed, aborting run");
                e
            })?;

        let verdict = self
            .will
            .judge(prompt, &thought.message, value_set, &thought.reflection)
            .await;

        run.intellect_output = thought.message;
        run.intellect_reflection = thought.reflection;
        run.final_output = verdict.final_output.clone();
        run.will_decision = verdict.decision;

        tracing::info!(
            run_id = %run_id,
            decision = %verdict.decision,
            "Will decision reached"
        );

        self.audit
            .tracker
            .mark_pending(run_id, value_set.clone())
            .await;

        let critique = verdict.decision == WillDecision::Approved || self.settings.audit_blocked_runs;
        let stages = self.audit.clone();
        let handle = tokio::spawn(async move { stages.audit(run, critique).await });

        Ok(RunOutcome {
            run_id,
            final_output: verdict.final_output,
            will_decision: verdict.decision,
            audit: AuditTask(handle),
        })
    }

    /// Audit progress for a run: memory first, then the ledger.
    pub async fn audit_report(&self, run_id: Uuid) -> AlignmentResult<AuditReport> {
        if let Some(entry) = self.audit.tracker.get(run_id).await {
            return Ok(match (entry.status, entry.record) {
                (AuditStatus::Complete, Some(record)) => AuditReport::complete(record),
                (status, _) => AuditReport::unfinished(run_id, status, &entry.value_set),
            });
        }

        match self.audit.ledger.find(run_id).await? {
            Some(record) => Ok(AuditReport::complete(record)),
            None => Err(AlignmentError::NotFound(format!("Run {} not found", run_id))),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn AuditLedger> {
        &self.audit.ledger
    }

    pub fn tracker(&self) -> &AuditTracker {
        &self.audit.tracker
    }
}

impl AuditStages {
    async fn audit(&self, mut run: PipelineRun, critique: bool) {
        let run_id = run.run_id;

        if critique {
            match self
                .conscience
                .critique(
                    &run.user_prompt,
                    &run.final_output,
                    &run.value_set,
                    &run.intellect_reflection,
                )
                .await
            {
                Ok(output) => {
                    run.conscience_feedback = output.feedback;
                    run.evaluations = output.evaluations;
                }
                Err(e) => {
                    tracing::warn!(run_id = %run_id, error = %e, "Conscience failed, abandoning audit");
                    self.tracker.abandon(run_id).await;
                    return;
                }
            }

            let assessment = self.spirit.assess(&run.evaluations, &run.intellect_reflection);
            run.spirit_score = assessment.score;
            run.spirit_reflection = assessment.reflection;
        } else {
            run.spirit_reflection =
                "Not audited: the Will gate withheld this response.".to_string();
        }

        tracing::info!(
            run_id = %run_id,
            evaluations = run.evaluations.len(),
            score = ?run.spirit_score,
            "Audit complete"
        );

        if let Err(e) = self.ledger.append(&run).await {
            tracing::error!(run_id = %run_id, error = %e, "Failed to write ledger record");
        }

        self.tracker.complete(run).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::AffirmationLevel;
    use crate::engine::testing::{Reply, ScriptedClient};
    use crate::engine::{CompletionClient, LineBlockParser};
    use crate::storage::MemoryLedger;

    const CRITIQUE: &str = "Value: Commitment to truth\n\
                            Affirmation Level: Strongly Affirms\n\
                            Confidence: 90%\n\
                            Reason: It refuses to endorse deception.";

    fn value_set() -> ValueSet {
        ValueSet::from_text("Test", "1. Commitment to truth")
    }

    fn make_pipeline(
        client: Arc<dyn CompletionClient>,
        ledger: Arc<MemoryLedger>,
        settings: PipelineSettings,
    ) -> AlignmentPipeline {
        AlignmentPipeline::new(
            Intellect::new(client.clone(), 0.5),
            Will::new(client.clone(), 0.0),
            Conscience::new(client, 0.2, Box::new(LineBlockParser)),
            ledger,
            AuditTracker::new(16),
            settings,
        )
    }

    #[tokio::test]
    async fn test_end_to_end_approved_run() {
        crate::logging::init_test();
        let client = Arc::new(ScriptedClient::texts(&[
            "Lying corrodes trust, though protecting someone from harm is a hard case.\n\
             <REFLECTION>I centered honesty while acknowledging hard cases.</REFLECTION>",
            "approved",
            CRITIQUE,
        ]));
        let ledger = Arc::new(MemoryLedger::default());
        let pipeline = make_pipeline(client.clone(), ledger.clone(), PipelineSettings::default());

        let outcome = pipeline
            .run("Is lying ever acceptable?", &value_set())
            .await
            .unwrap();

        assert_eq!(outcome.will_decision, WillDecision::Approved);
        assert_eq!(
            outcome.final_output,
            "Lying corrodes trust, though protecting someone from harm is a hard case."
        );

        let run_id = outcome.run_id;
        outcome.audit.finished().await;

        let records = ledger.records.lock().await;
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.run_id, run_id);
        assert_eq!(record.final_output, record.intellect_output);
        assert_eq!(
            record.intellect_reflection,
            "I centered honesty while acknowledging hard cases."
        );
        assert_eq!(record.conscience_feedback, CRITIQUE);
        assert_eq!(record.evaluations.len(), 1);
        assert_eq!(
            record.evaluations[0].affirmation,
            AffirmationLevel::StronglyAffirms
        );
        assert_eq!(record.spirit_score, Some(5));
        drop(records);

        let report = pipeline.audit_report(run_id).await.unwrap();
        assert_eq!(report.status, AuditStatus::Complete);
        assert_eq!(report.spirit_score, Some(5));
        assert_eq!(report.profile, "Test");
        assert_eq!(client.recorded().len(), 3);
    }

    #[tokio::test]
    async fn test_blocked_run_skips_critique_by_default() {
        let client = Arc::new(ScriptedClient::texts(&["Some answer.", "VIOLATION."]));
        let ledger = Arc::new(MemoryLedger::default());
        let pipeline = make_pipeline(client.clone(), ledger.clone(), PipelineSettings::default());

        let outcome = pipeline.run("q", &value_set()).await.unwrap();
        assert_eq!(outcome.will_decision, WillDecision::Blocked);
        assert_eq!(outcome.final_output, Will::suppression_message(&value_set()));
        outcome.audit.finished().await;

        assert_eq!(client.recorded().len(), 2);
        let records = ledger.records.lock().await;
        assert_eq!(records[0].will_decision, WillDecision::Blocked);
        assert_eq!(records[0].intellect_output, "Some answer.");
        assert!(records[0].evaluations.is_empty());
        assert_eq!(records[0].spirit_score, None);
    }

    #[tokio::test]
    async fn test_blocked_run_critiques_suppression_when_enabled() {
        let client = Arc::new(ScriptedClient::texts(&["Some answer.", "violation", CRITIQUE]));
        let ledger = Arc::new(MemoryLedger::default());
        let pipeline = make_pipeline(
            client.clone(),
            ledger.clone(),
            PipelineSettings {
                audit_blocked_runs: true,
            },
        );

        let outcome = pipeline.run("q", &value_set()).await.unwrap();
        outcome.audit.finished().await;

        let requests = client.recorded();
        assert_eq!(requests.len(), 3);
        assert!(requests[2]
            .user_prompt
            .contains(&Will::suppression_message(&value_set())));
        assert_eq!(ledger.records.lock().await[0].spirit_score, Some(5));
    }

    #[tokio::test]
    async fn test_will_failure_fails_open() {
        let client = Arc::new(ScriptedClient::new(vec![
            Reply::Text("An answer.".to_string()),
            Reply::Fail("provider down".to_string()),
            Reply::Text(CRITIQUE.to_string()),
        ]));
        let ledger = Arc::new(MemoryLedger::default());
        let pipeline = make_pipeline(client, ledger, PipelineSettings::default());

        let outcome = pipeline.run("q", &value_set()).await.unwrap();
        assert_eq!(outcome.will_decision, WillDecision::Approved);
        assert_eq!(outcome.final_output, "An answer.");
    }

    #[tokio::test]
    async fn test_intellect_failure_aborts_run() {
        let client = Arc::new(ScriptedClient::new(vec![Reply::Fail("503".to_string())]));
        let ledger = Arc::new(MemoryLedger::default());
        let pipeline = make_pipeline(client.clone(), ledger.clone(), PipelineSettings::default());

        let result = pipeline.run("q", &value_set()).await;
        assert!(matches!(result, Err(AlignmentError::Completion(_))));
        assert_eq!(client.recorded().len(), 1);
        assert_eq!(pipeline.tracker().len().await, 0);
        assert!(ledger.records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_conscience_failure_abandons_audit_only() {
        let client = Arc::new(ScriptedClient::new(vec![
            Reply::Text("An answer.".to_string()),
            Reply::Text("approved".to_string()),
            Reply::Fail("timeout".to_string()),
        ]));
        let ledger = Arc::new(MemoryLedger::default());
        let pipeline = make_pipeline(client, ledger.clone(), PipelineSettings::default());

        let outcome = pipeline.run("q", &value_set()).await.unwrap();
        assert_eq!(outcome.final_output, "An answer.");
        let run_id = outcome.run_id;
        outcome.audit.finished().await;

        let report = pipeline.audit_report(run_id).await.unwrap();
        assert_eq!(report.status, AuditStatus::Abandoned);
        assert!(ledger.records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_critique_still_completes() {
        let client = Arc::new(ScriptedClient::texts(&[
            "An answer.",
            "approved",
            "Value: Commitment to truth\nAffirmation Level: Strongly Affirms\nReason: no confidence line",
        ]));
        let ledger = Arc::new(MemoryLedger::default());
        let pipeline = make_pipeline(client, ledger.clone(), PipelineSettings::default());

        let outcome = pipeline.run("q", &value_set()).await.unwrap();
        outcome.audit.finished().await;

        let records = ledger.records.lock().await;
        assert!(records[0].evaluations.is_empty());
        assert_eq!(records[0].spirit_score, None);
    }

    #[tokio::test]
    async fn test_ledger_failure_is_invisible_to_caller() {
        let client = Arc::new(ScriptedClient::texts(&["An answer.", "approved", CRITIQUE]));
        let ledger = Arc::new(MemoryLedger {
            fail_writes: true,
            ..Default::default()
        });
        let pipeline = make_pipeline(client, ledger, PipelineSettings::default());

        let outcome = pipeline.run("q", &value_set()).await.unwrap();
        let run_id = outcome.run_id;
        outcome.audit.finished().await;

        let report = pipeline.audit_report(run_id).await.unwrap();
        assert_eq!(report.status, AuditStatus::Complete);
    }

    #[tokio::test]
    async fn test_caller_is_not_blocked_by_audit() {
        let client = Arc::new(ScriptedClient::new(vec![
            Reply::Text("An answer.".to_string()),
            Reply::Text("approved".to_string()),
            Reply::Hang,
        ]));
        let ledger = Arc::new(MemoryLedger::default());
        let pipeline = make_pipeline(client, ledger, PipelineSettings::default());

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            pipeline.run("q", &value_set()),
        )
        .await
        .expect("run must not wait for the audit")
        .unwrap();

        let report = pipeline.audit_report(outcome.run_id).await.unwrap();
        assert_eq!(report.status, AuditStatus::Pending);
        assert!(report.ledger.is_none());
        assert_eq!(report.values, vec!["1. Commitment to truth"]);
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_found() {
        let client = Arc::new(ScriptedClient::default());
        let pipeline = make_pipeline(
            client,
            Arc::new(MemoryLedger::default()),
            PipelineSettings::default(),
        );
        let result = pipeline.audit_report(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AlignmentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_evicted_run_is_read_from_ledger() {
        let client = Arc::new(ScriptedClient::texts(&[
            "First.", "approved", CRITIQUE, "Second.", "approved", CRITIQUE,
        ]));
        let ledger = Arc::new(MemoryLedger::default());
        let pipeline = AlignmentPipeline::new(
            Intellect::new(client.clone(), 0.5),
            Will::new(client.clone(), 0.0),
            Conscience::new(client, 0.2, Box::new(LineBlockParser)),
            ledger,
            AuditTracker::new(1),
            PipelineSettings::default(),
        );

        let first = pipeline.run("one", &value_set()).await.unwrap();
        let first_id = first.run_id;
        first.audit.finished().await;
        pipeline
            .run("two", &value_set())
            .await
            .unwrap()
            .audit
            .finished()
            .await;

        assert!(pipeline.tracker().get(first_id).await.is_none());
        let report = pipeline.audit_report(first_id).await.unwrap();
        assert_eq!(report.status, AuditStatus::Complete);
        assert_eq!(report.ledger.unwrap().user_prompt, "one");
    }

    #[tokio::test]
    async fn test_pending_audit_outlives_tracker_capacity() {
        let client = Arc::new(ScriptedClient::new(vec![
            Reply::Text("First.".to_string()),
            Reply::Text("approved".to_string()),
            Reply::Hang,
            Reply::Text("Second.".to_string()),
            Reply::Text("approved".to_string()),
            Reply::Hang,
        ]));
        let pipeline = AlignmentPipeline::new(
            Intellect::new(client.clone(), 0.5),
            Will::new(client.clone(), 0.0),
            Conscience::new(client.clone(), 0.2, Box::new(LineBlockParser)),
            Arc::new(MemoryLedger::default()),
            AuditTracker::new(1),
            PipelineSettings::default(),
        );

        let first = pipeline.run("one", &value_set()).await.unwrap();
        // Let the first audit reach its hanging Conscience call.
        while client.recorded().len() < 3 {
            tokio::task::yield_now().await;
        }
        let second = pipeline.run("two", &value_set()).await.unwrap();

        let report = pipeline.audit_report(first.run_id).await.unwrap();
        assert_eq!(report.status, AuditStatus::Pending);
        let report = pipeline.audit_report(second.run_id).await.unwrap();
        assert_eq!(report.status, AuditStatus::Pending);
    }

    #[tokio::test]
    async fn test_empty_value_set_is_rejected() {
        let client = Arc::new(ScriptedClient::default());
        let pipeline = make_pipeline(
            client.clone(),
            Arc::new(MemoryLedger::default()),
            PipelineSettings::default(),
        );
        let empty = ValueSet::new("Empty", vec![]);
        let result = pipeline.run("q", &empty).await;
        assert!(matches!(result, Err(AlignmentError::BadRequest(_))));
        assert!(client.recorded().is_empty());
    }
}
