use crate::domain::job::{JobSnapshot, JobStatus, clamp_percent};
use crate::dto::event::{
    ErrorReport, EventEnvelope, JobEvent, ProgressStart, ProgressUpdate, StageSummary,
};
use crate::registry::StageRegistry;

use super::{Effect, Msg};

/// Pure update function: applies a message to a snapshot and returns any effects.
///
/// Once the snapshot is terminal only `Reset` and `Submitted` change it.
pub fn update(snapshot: JobSnapshot, msg: Msg) -> (JobSnapshot, Vec<Effect>) {
    match msg {
        Msg::Submitted { id, status } => (JobSnapshot::submitted(id, status), Vec::new()),
        Msg::SubmitFailed(detail) => submit_failed(snapshot, detail),
        Msg::RunAcknowledged(status) => run_acknowledged(snapshot, status),
        Msg::Event(envelope) => apply_event(snapshot, envelope),
        Msg::TransportError(notice) => transport_error(snapshot, notice),
        Msg::Cancelled => cancelled(snapshot),
        Msg::Reset => (JobSnapshot::default(), vec![Effect::CloseStream]),
    }
}

fn submit_failed(mut snapshot: JobSnapshot, detail: String) -> (JobSnapshot, Vec<Effect>) {
    if snapshot.is_terminal() {
        return (snapshot, Vec::new());
    }
    snapshot.status = JobStatus::Failed;
    snapshot.error_message = detail;
    (snapshot, Vec::new())
}

/// The run call may only confirm the job is waiting or working; endings
/// arrive through the event stream.
fn run_acknowledged(mut snapshot: JobSnapshot, status: JobStatus) -> (JobSnapshot, Vec<Effect>) {
    if snapshot.is_terminal() || !snapshot.has_job() || !status.is_active() {
        return (snapshot, Vec::new());
    }
    snapshot.status = status;
    (snapshot, Vec::new())
}

fn transport_error(mut snapshot: JobSnapshot, notice: String) -> (JobSnapshot, Vec<Effect>) {
    if snapshot.is_terminal() {
        return (snapshot, Vec::new());
    }
    snapshot.info_message = notice;
    (snapshot, Vec::new())
}

fn cancelled(mut snapshot: JobSnapshot) -> (JobSnapshot, Vec<Effect>) {
    if snapshot.is_terminal() || !snapshot.has_job() {
        return (snapshot, Vec::new());
    }
    snapshot.status = JobStatus::Canceled;
    (snapshot, vec![Effect::CloseStream])
}

fn apply_event(mut snapshot: JobSnapshot, envelope: EventEnvelope) -> (JobSnapshot, Vec<Effect>) {
    if snapshot.is_terminal() || !snapshot.has_job() {
        return (snapshot, Vec::new());
    }
    if let Some(id) = envelope.id {
        snapshot.last_event_id = Some(id);
    }

    match envelope.event {
        JobEvent::StageSummary(summary) => stage_summary(snapshot, summary),
        JobEvent::ProgressStart(start) => progress_start(snapshot, start),
        JobEvent::ProgressUpdate(progress) => progress_update(snapshot, progress),
        JobEvent::Finish => finish(snapshot),
        JobEvent::Error(report) => error(snapshot, report),
        JobEvent::ProgressEnd | JobEvent::Heartbeat => (snapshot, Vec::new()),
    }
}

fn stage_summary(mut snapshot: JobSnapshot, summary: StageSummary) -> (JobSnapshot, Vec<Effect>) {
    if !snapshot.status.is_active() {
        return (snapshot, Vec::new());
    }
    if let Some(stages) = summary.stages {
        snapshot.stages = StageRegistry::from_summary(&stages);
    }
    snapshot.status = JobStatus::Running;
    (snapshot, Vec::new())
}

fn progress_start(mut snapshot: JobSnapshot, start: ProgressStart) -> (JobSnapshot, Vec<Effect>) {
    if !snapshot.status.is_active() {
        return (snapshot, Vec::new());
    }
    snapshot.status = JobStatus::Running;
    if let Some(stage) = start.stage.filter(|s| !s.is_empty()) {
        snapshot.stages.mark_started(&stage);
        snapshot.current_stage_name = stage;
    }
    (snapshot, Vec::new())
}

fn progress_update(
    mut snapshot: JobSnapshot,
    progress: ProgressUpdate,
) -> (JobSnapshot, Vec<Effect>) {
    if !snapshot.status.is_active() {
        return (snapshot, Vec::new());
    }
    snapshot.status = JobStatus::Running;

    // The producer is the source of truth: replace, never max().
    if let Some(overall) = progress.overall_progress {
        snapshot.overall_progress = clamp_percent(overall);
    }
    if let Some(stage) = progress.stage.filter(|s| !s.is_empty()) {
        snapshot.current_stage_name = stage;
    }
    snapshot.current_stage_progress = progress.stage_progress.map(clamp_percent).unwrap_or(0);

    if !snapshot.current_stage_name.is_empty() {
        let percent = snapshot.current_stage_progress;
        snapshot
            .stages
            .update(&snapshot.current_stage_name, percent);
    }
    (snapshot, Vec::new())
}

fn finish(mut snapshot: JobSnapshot) -> (JobSnapshot, Vec<Effect>) {
    if snapshot.is_terminal() {
        return (snapshot, Vec::new());
    }
    snapshot.status = JobStatus::Finished;
    snapshot.overall_progress = 100;
    snapshot.current_stage_progress = 100;
    snapshot.stages.complete_all();

    let effects = vec![Effect::CloseStream, Effect::FetchFiles(snapshot.id.clone())];
    (snapshot, effects)
}

fn error(mut snapshot: JobSnapshot, report: ErrorReport) -> (JobSnapshot, Vec<Effect>) {
    if snapshot.is_terminal() {
        return (snapshot, Vec::new());
    }
    snapshot.status = JobStatus::Failed;
    snapshot.error_message = report.describe();
    (snapshot, vec![Effect::CloseStream])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::JobId;
    use crate::domain::stage::StageStatus;
    use crate::dto::event::{StageSpec, UNKNOWN_ERROR};

    fn running_job() -> JobSnapshot {
        let (snapshot, _) = update(
            JobSnapshot::default(),
            Msg::Submitted {
                id: JobId::new("job-1"),
                status: JobStatus::Queued,
            },
        );
        snapshot
    }

    fn event(event: JobEvent) -> Msg {
        Msg::Event(EventEnvelope::new(event))
    }

    fn summary(stages: &[(&str, f64)]) -> Msg {
        event(JobEvent::StageSummary(StageSummary {
            stages: Some(
                stages
                    .iter()
                    .map(|(name, weight)| StageSpec::new(*name, *weight))
                    .collect(),
            ),
        }))
    }

    fn start(stage: &str) -> Msg {
        event(JobEvent::ProgressStart(ProgressStart {
            stage: Some(stage.to_string()),
        }))
    }

    fn progress(overall: f64, stage: &str, stage_progress: f64) -> Msg {
        event(JobEvent::ProgressUpdate(ProgressUpdate {
            overall_progress: Some(overall),
            stage: Some(stage.to_string()),
            stage_progress: Some(stage_progress),
        }))
    }

    fn apply(snapshot: JobSnapshot, msgs: Vec<Msg>) -> (JobSnapshot, Vec<Effect>) {
        let mut effects = Vec::new();
        let mut snapshot = snapshot;
        for msg in msgs {
            let (next, mut produced) = update(snapshot, msg);
            snapshot = next;
            effects.append(&mut produced);
        }
        (snapshot, effects)
    }

    #[test]
    fn test_submitted_starts_fresh_snapshot() {
        let snapshot = running_job();
        assert_eq!(snapshot.id, JobId::new("job-1"));
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(snapshot.overall_progress, 0);
    }

    #[test]
    fn test_stage_summary_then_start() {
        let (snapshot, _) = apply(
            running_job(),
            vec![summary(&[("a", 30.0), ("b", 70.0)]), start("b")],
        );

        assert_eq!(snapshot.status, JobStatus::Running);
        assert_eq!(snapshot.current_stage_name, "b");
        let a = snapshot.stages.get("a").unwrap();
        assert_eq!((a.status, a.percent), (StageStatus::Completed, 100));
        assert_eq!(snapshot.stages.get("b").unwrap().status, StageStatus::Running);
        assert_eq!(snapshot.stages.get("b").unwrap().weight, 70.0);
    }

    #[test]
    fn test_repeat_summary_replaces_registry() {
        let (snapshot, _) = apply(
            running_job(),
            vec![
                summary(&[("a", 50.0), ("b", 50.0)]),
                start("b"),
                summary(&[("x", 100.0)]),
            ],
        );
        assert_eq!(snapshot.stages.len(), 1);
        assert_eq!(snapshot.stages.get("x").unwrap().status, StageStatus::Pending);
    }

    #[test]
    fn test_summary_without_stages_keeps_registry() {
        let (snapshot, _) = apply(
            running_job(),
            vec![
                summary(&[("a", 100.0)]),
                event(JobEvent::StageSummary(StageSummary { stages: None })),
            ],
        );
        assert_eq!(snapshot.stages.len(), 1);
        assert_eq!(snapshot.status, JobStatus::Running);
    }

    #[test]
    fn test_progress_update_replaces_values() {
        let (snapshot, _) = apply(
            running_job(),
            vec![
                summary(&[("parse", 20.0), ("translate", 80.0)]),
                progress(60.0, "translate", 45.0),
                progress(40.0, "translate", 50.0),
            ],
        );

        // No max(): a lower overall value from the producer wins
        assert_eq!(snapshot.overall_progress, 40);
        assert_eq!(snapshot.current_stage_name, "translate");
        assert_eq!(snapshot.current_stage_progress, 50);
        let stage = snapshot.stages.get("translate").unwrap();
        assert_eq!((stage.status, stage.percent), (StageStatus::Running, 50));
        // Stages not named keep their last status
        assert_eq!(
            snapshot.stages.get("parse").unwrap().status,
            StageStatus::Pending
        );
    }

    #[test]
    fn test_progress_update_missing_fields() {
        let (snapshot, _) = apply(
            running_job(),
            vec![
                progress(30.0, "parse", 70.0),
                event(JobEvent::ProgressUpdate(ProgressUpdate::default())),
            ],
        );
        assert_eq!(snapshot.overall_progress, 30);
        assert_eq!(snapshot.current_stage_name, "parse");
        assert_eq!(snapshot.current_stage_progress, 0);
    }

    #[test]
    fn test_progress_values_clamped() {
        let (snapshot, _) = apply(running_job(), vec![progress(140.0, "a", -5.0)]);
        assert_eq!(snapshot.overall_progress, 100);
        assert_eq!(snapshot.current_stage_progress, 0);
    }

    #[test]
    fn test_finish_forces_completion() {
        let (snapshot, effects) = apply(
            running_job(),
            vec![
                summary(&[("a", 30.0), ("b", 70.0), ("c", 0.0)]),
                progress(12.0, "a", 40.0),
                event(JobEvent::Finish),
            ],
        );

        assert_eq!(snapshot.status, JobStatus::Finished);
        assert_eq!(snapshot.overall_progress, 100);
        assert_eq!(snapshot.current_stage_progress, 100);
        assert!(
            snapshot
                .stages
                .iter()
                .all(|s| s.status == StageStatus::Completed && s.percent == 100)
        );
        assert_eq!(
            effects,
            vec![
                Effect::CloseStream,
                Effect::FetchFiles(JobId::new("job-1"))
            ]
        );
    }

    #[test]
    fn test_error_message_sources() {
        let (snapshot, effects) = apply(
            running_job(),
            vec![event(JobEvent::Error(ErrorReport {
                error: None,
                message: Some("disk full".to_string()),
            }))],
        );
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.error_message, "disk full");
        assert_eq!(effects, vec![Effect::CloseStream]);

        let (snapshot, _) = apply(
            running_job(),
            vec![event(JobEvent::Error(ErrorReport::default()))],
        );
        assert_eq!(snapshot.error_message, UNKNOWN_ERROR);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let late = || {
            vec![
                summary(&[("z", 100.0)]),
                start("z"),
                progress(5.0, "z", 5.0),
                event(JobEvent::Error(ErrorReport {
                    error: Some("late".to_string()),
                    message: None,
                })),
                event(JobEvent::Finish),
                Msg::TransportError("lost".to_string()),
                Msg::RunAcknowledged(JobStatus::Running),
                Msg::SubmitFailed("nope".to_string()),
                Msg::Cancelled,
            ]
        };

        let endings = vec![
            event(JobEvent::Finish),
            event(JobEvent::Error(ErrorReport::default())),
            Msg::Cancelled,
        ];

        for ending in endings {
            let (terminal, _) = apply(
                running_job(),
                vec![summary(&[("a", 100.0)]), progress(50.0, "a", 50.0), ending],
            );
            assert!(terminal.is_terminal());

            let (after, effects) = apply(terminal.clone(), late());
            assert_eq!(after, terminal);
            assert!(effects.is_empty());
        }
    }

    #[test]
    fn test_transport_error_is_advisory() {
        let (snapshot, effects) = apply(
            running_job(),
            vec![
                progress(20.0, "a", 20.0),
                Msg::TransportError("Connection lost".to_string()),
            ],
        );
        assert_eq!(snapshot.status, JobStatus::Running);
        assert_eq!(snapshot.info_message, "Connection lost");
        assert!(effects.is_empty());
    }

    #[test]
    fn test_cancel_twice_is_noop() {
        let (snapshot, effects) = apply(running_job(), vec![Msg::Cancelled]);
        assert_eq!(snapshot.status, JobStatus::Canceled);
        assert_eq!(effects, vec![Effect::CloseStream]);

        let (again, effects) = update(snapshot.clone(), Msg::Cancelled);
        assert_eq!(again, snapshot);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_cancel_without_job_is_noop() {
        let (snapshot, effects) = update(JobSnapshot::default(), Msg::Cancelled);
        assert_eq!(snapshot, JobSnapshot::default());
        assert!(effects.is_empty());
    }

    #[test]
    fn test_reset_restores_idle_defaults() {
        let (mid_run, _) = apply(
            running_job(),
            vec![
                summary(&[("a", 100.0)]),
                progress(50.0, "a", 50.0),
                Msg::TransportError("Connection lost".to_string()),
            ],
        );
        let (snapshot, effects) = update(mid_run, Msg::Reset);
        assert_eq!(snapshot, JobSnapshot::default());
        assert_eq!(effects, vec![Effect::CloseStream]);

        let (failed, _) = apply(running_job(), vec![event(JobEvent::Finish)]);
        let (snapshot, _) = update(failed, Msg::Reset);
        assert_eq!(snapshot, JobSnapshot::default());
    }

    #[test]
    fn test_progress_ignored_while_idle() {
        let (snapshot, _) = apply(
            JobSnapshot::default(),
            vec![summary(&[("a", 1.0)]), start("a"), progress(10.0, "a", 10.0)],
        );
        assert_eq!(snapshot.status, JobStatus::Idle);
        assert!(snapshot.stages.is_empty());
    }

    #[test]
    fn test_submit_failed_sets_detail() {
        let (snapshot, _) = update(
            JobSnapshot::default(),
            Msg::SubmitFailed("unsupported file type".to_string()),
        );
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.error_message, "unsupported file type");
    }

    #[test]
    fn test_run_acknowledged_updates_status() {
        let (snapshot, _) = update(running_job(), Msg::RunAcknowledged(JobStatus::Running));
        assert_eq!(snapshot.status, JobStatus::Running);
    }

    #[test]
    fn test_run_acknowledged_idle_is_ignored() {
        let (snapshot, _) = apply(
            running_job(),
            vec![Msg::RunAcknowledged(JobStatus::Idle), start("a")],
        );
        assert_eq!(snapshot.status, JobStatus::Running);
        assert_eq!(snapshot.current_stage_name, "a");
    }

    #[test]
    fn test_run_acknowledged_terminal_is_ignored() {
        let (snapshot, effects) = update(running_job(), Msg::RunAcknowledged(JobStatus::Finished));
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert!(effects.is_empty());

        // The stream's own finish still drives completion
        let (snapshot, effects) = apply(snapshot, vec![event(JobEvent::Finish)]);
        assert_eq!(snapshot.status, JobStatus::Finished);
        assert_eq!(snapshot.overall_progress, 100);
        assert_eq!(
            effects,
            vec![
                Effect::CloseStream,
                Effect::FetchFiles(JobId::new("job-1"))
            ]
        );
    }

    #[test]
    fn test_events_after_reset_are_ignored() {
        let (reset, _) = apply(running_job(), vec![start("a"), Msg::Reset]);
        let (snapshot, effects) = apply(
            reset,
            vec![
                Msg::Event(EventEnvelope::new(JobEvent::Finish).with_id(9)),
                Msg::Event(EventEnvelope::new(JobEvent::Heartbeat).with_id(3)),
                event(JobEvent::Error(ErrorReport::default())),
            ],
        );
        assert_eq!(snapshot, JobSnapshot::default());
        assert!(effects.is_empty());
    }

    #[test]
    fn test_last_event_id_tracked() {
        let (snapshot, _) = apply(
            running_job(),
            vec![
                Msg::Event(EventEnvelope::new(JobEvent::Heartbeat).with_id(3)),
                Msg::Event(EventEnvelope::new(JobEvent::Heartbeat)),
            ],
        );
        assert_eq!(snapshot.last_event_id, Some(3));

        let (finished, _) = apply(
            snapshot,
            vec![
                Msg::Event(EventEnvelope::new(JobEvent::Finish).with_id(4)),
                Msg::Event(EventEnvelope::new(JobEvent::Heartbeat).with_id(5)),
            ],
        );
        assert_eq!(finished.last_event_id, Some(4));
    }
}
