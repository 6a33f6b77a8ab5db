mod common;

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;

use common::{Call, RecordingUi, ScriptedBackend, UiEvent};
use quiz_core::Clock;
use quiz_core::model::{AttemptId, LastOutcome, Mode, OptionId, QuestionId};
use quiz_core::policy::{ModePolicy, PolicyTable, TimerRule};
use quiz_core::time::fixed_clock;
use services::protocol::{EndReply, SubmitRequest};
use services::{
    AnswerDisposition, EndReason, QuizRun, RemoteError, RunConfig, RunError, RunPhase, Severity,
    SubmitErrorPolicy,
};

fn run_with(backend: &ScriptedBackend, ui: &RecordingUi, clock: &Clock) -> QuizRun {
    QuizRun::new(Arc::new(backend.clone()), Arc::new(ui.clone()))
        .with_clock(clock.clone())
        .with_config(RunConfig::immediate())
}

fn two_plus_two() -> serde_json::Value {
    json!({
        "id": 5,
        "prompt": "2+2?",
        "difficulty": 3,
        "options": [{"id": 1, "text": "3"}, {"id": 2, "text": "4"}]
    })
}

fn question(id: i64, difficulty: i32) -> serde_json::Value {
    json!({
        "id": id,
        "prompt": format!("Q{id}"),
        "difficulty": difficulty,
        "options": [{"id": 1, "text": "a"}, {"id": 2, "text": "b"}]
    })
}

//
// ─── SCENARIOS ─────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn adaptive_answer_reports_latency_and_feeds_last_outcome() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .question_json(two_plus_two())
        .outcome_json(json!({"correct": true, "attempt_score": 10}));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Adaptive).await.unwrap();
    assert_eq!(run.phase(), RunPhase::Answering);

    clock.advance(Duration::milliseconds(1_230));
    let disposition = run.answer(vec![OptionId::from_int(2)]).await;
    assert!(matches!(disposition, AnswerDisposition::Submitted(ref o) if o.correct));

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    let body = serde_json::to_value(SubmitRequest::from(&submissions[0])).unwrap();
    assert_eq!(body["time_used"], json!(1.23));
    assert_eq!(body["selected"], json!([2]));
    assert_eq!(body["question_id"], json!(5));
    assert_eq!(body["attempt_id"], json!("A1"));
    assert_eq!(body["mode"], json!("adaptive"));

    assert_eq!(ui.scores(), vec![0, 10]);

    let requests = backend.question_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].0, None);
    assert_eq!(
        requests[1].0,
        Some(LastOutcome {
            correct: true,
            question_id: QuestionId::new(5),
            difficulty: Some(3),
        })
    );

    // Second fetch falls through to `finished`.
    assert_eq!(run.phase(), RunPhase::Finished);
    let summary = run.summary().unwrap();
    assert_eq!(summary.reason, EndReason::Exhausted);
    assert_eq!(summary.score, 10);
    assert_eq!(summary.answered, 1);
    assert!(ui.events().contains(&UiEvent::Results(AttemptId::new("A1"))));
}

#[tokio::test]
async fn minute_rush_deadline_forces_finish_while_answering() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend.question_json(question(1, 3));
    let ui = RecordingUi::answering_duration(1);
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::MinuteRush).await.unwrap();
    assert_eq!(run.phase(), RunPhase::Answering);
    assert_eq!(ui.events()[0], UiEvent::AskedDuration);

    clock.advance(Duration::milliseconds(500));
    run.tick().await;
    assert_eq!(run.phase(), RunPhase::Answering);
    assert_eq!(ui.timers().last().map(String::as_str), Some("0:01"));

    clock.advance(Duration::milliseconds(500));
    run.tick().await;
    assert_eq!(run.phase(), RunPhase::Finished);
    assert_eq!(run.summary().unwrap().reason, EndReason::TimeUp);
    assert_eq!(backend.end_calls(), 1);
    assert!(ui.notices().contains(&"Time's up!".to_owned()));

    clock.advance(Duration::seconds(30));
    run.tick().await;
    assert!(backend.submissions().is_empty());
    assert_eq!(backend.end_calls(), 1);
}

#[tokio::test]
async fn minute_rush_sends_deadline_with_state() {
    let clock = fixed_clock();
    let start = clock.now();
    let backend = ScriptedBackend::new();
    let ui = RecordingUi::answering_duration(90);
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::MinuteRush).await.unwrap();

    let (_, state) = &backend.question_requests()[0];
    assert_eq!(state.run_duration_secs, Some(90));
    assert_eq!(state.run_deadline, Some(start + Duration::seconds(90)));
}

#[tokio::test]
async fn unusable_duration_falls_back_to_default() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    let ui = RecordingUi::answering_duration(-5);
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::MinuteRush).await.unwrap();

    let (_, state) = &backend.question_requests()[0];
    assert_eq!(state.run_duration_secs, Some(180));
}

#[tokio::test]
async fn deadline_passing_during_a_fetch_finishes_without_rendering() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new().with_latency(clock.clone(), Duration::seconds(2));
    backend.question_json(question(1, 3));
    let ui = RecordingUi::answering_duration(3);
    let mut run = run_with(&backend, &ui, &clock);

    // start takes 2s, get_question another 2s: deadline at 3s passes in flight.
    run.select_mode(Mode::MinuteRush).await.unwrap();

    assert_eq!(run.phase(), RunPhase::Finished);
    assert_eq!(run.summary().unwrap().reason, EndReason::TimeUp);
    assert_eq!(ui.questions_shown(), 0);
}

#[tokio::test]
async fn finished_signal_skips_submission() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend.question_json(json!({"finished": true, "message": "No unseen questions left."}));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Challenger).await.unwrap();

    assert_eq!(run.phase(), RunPhase::Finished);
    assert!(backend.submissions().is_empty());
    assert_eq!(backend.end_calls(), 1);
    assert!(ui.notices().contains(&"No unseen questions left.".to_owned()));
    assert_eq!(run.summary().unwrap().reason, EndReason::Exhausted);
}

#[tokio::test]
async fn finished_without_message_uses_default_notice() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Adaptive).await.unwrap();

    assert!(ui.notices().contains(&"All questions completed!".to_owned()));
}

//
// ─── EXACTLY-ONCE SUBMISSION ───────────────────────────────────────────────────
//

#[tokio::test]
async fn expiry_then_click_submits_once() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .question_json(question(1, 3))
        .outcome_json(json!({"correct": false, "attempt_score": 0, "correct_answers": ["a"]}));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Challenger).await.unwrap();
    assert_eq!(ui.timers().last().map(String::as_str), Some("17"));

    clock.advance(Duration::seconds(17));
    run.tick().await;
    let click = run.answer(vec![OptionId::from_int(1)]).await;

    assert_eq!(click, AnswerDisposition::Ignored);
    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert!(submissions[0].is_timeout());
    assert_eq!(submissions[0].time_used, Some(17.0));
}

#[tokio::test]
async fn click_then_expiry_submits_once() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .question_json(question(1, 3))
        .outcome_json(json!({"correct": true, "attempt_score": 1}))
        .question_json(question(2, 3));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Challenger).await.unwrap();
    clock.advance(Duration::seconds(16));
    let click = run.answer(vec![OptionId::from_int(2)]).await;
    assert!(matches!(click, AnswerDisposition::Submitted(_)));

    // Past the first question's deadline; only the second question's
    // countdown is armed now.
    clock.advance(Duration::seconds(2));
    run.tick().await;

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].question_id, QuestionId::new(1));
    assert!(!submissions[0].is_timeout());
    assert_eq!(run.phase(), RunPhase::Answering);
    assert_eq!(run.current_question().map(|q| q.id), Some(QuestionId::new(2)));
}

#[tokio::test]
async fn held_submission_ignores_further_answers_until_retried() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .question_json(question(1, 3))
        .outcome_error(RemoteError::Transport("connection reset".into()))
        .outcome_json(json!({"correct": true, "attempt_score": 1}));
    let ui = RecordingUi::new();
    let mut run = QuizRun::new(Arc::new(backend.clone()), Arc::new(ui.clone()))
        .with_clock(clock.clone())
        .with_config(RunConfig::immediate().with_submit_error_policy(SubmitErrorPolicy::Hold));

    run.select_mode(Mode::Challenger).await.unwrap();
    let first = run.answer(vec![OptionId::from_int(2)]).await;
    assert!(matches!(first, AnswerDisposition::Failed(_)));
    assert!(run.has_held_submission());
    assert!(ui.notices().contains(&"connection reset".to_owned()));

    clock.advance(Duration::seconds(30));
    run.tick().await;
    assert_eq!(run.answer(vec![OptionId::from_int(1)]).await, AnswerDisposition::Ignored);
    assert_eq!(backend.submissions().len(), 1);

    let retried = run.retry_submission().await.unwrap();
    assert!(matches!(retried, AnswerDisposition::Submitted(_)));
    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0], submissions[1]);

    assert!(matches!(
        run.retry_submission().await,
        Err(RunError::NothingToRetry)
    ));
}

#[tokio::test]
async fn answers_for_another_question_are_ignored() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .question_json(question(1, 3))
        .outcome_json(json!({"correct": true, "attempt_score": 1}))
        .question_json(question(2, 4));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Adaptive).await.unwrap();
    let first = run
        .answer_question(QuestionId::new(1), vec![OptionId::from_int(2)])
        .await;
    assert!(matches!(first, AnswerDisposition::Submitted(_)));
    assert_eq!(run.current_question().map(|q| q.id), Some(QuestionId::new(2)));

    // A repeat click still aimed at question 1 must not answer question 2.
    let repeat = run
        .answer_question(QuestionId::new(1), vec![OptionId::from_int(2)])
        .await;
    assert_eq!(repeat, AnswerDisposition::Ignored);

    let unknown = run
        .answer_question(QuestionId::new(2), vec![OptionId::from_int(9)])
        .await;
    assert_eq!(unknown, AnswerDisposition::Ignored);

    assert_eq!(backend.submissions().len(), 1);
    assert_eq!(run.phase(), RunPhase::Answering);
    assert!(!run.is_answer_locked());
}

//
// ─── TERMINATION RULES ─────────────────────────────────────────────────────────
//

#[tokio::test]
async fn wrong_answer_ends_elimination_modes() {
    for mode in [Mode::Challenger, Mode::FirstStrike] {
        let clock = fixed_clock();
        let backend = ScriptedBackend::new();
        backend
            .question_json(question(1, 3))
            .outcome_json(json!({"correct": false, "attempt_score": 0, "correct_answers": ["b"]}))
            .question_json(question(2, 3));
        let ui = RecordingUi::new();
        let mut run = run_with(&backend, &ui, &clock);

        run.select_mode(mode).await.unwrap();
        run.answer(vec![OptionId::from_int(1)]).await;

        assert_eq!(run.phase(), RunPhase::Finished, "{mode}");
        assert_eq!(backend.question_requests().len(), 1, "{mode}");
        assert_eq!(run.summary().unwrap().reason, EndReason::WrongAnswer);
        assert!(ui.notices().contains(&"Wrong! Correct: b".to_owned()));
    }
}

#[tokio::test]
async fn wrong_answer_continues_adaptive_runs() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .question_json(question(1, 3))
        .outcome_json(json!({"correct": false, "attempt_score": 0, "adjustment": {"next_diff": 2}}))
        .question_json(question(2, 2));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Adaptive).await.unwrap();
    run.answer(vec![OptionId::from_int(1)]).await;

    assert_eq!(run.phase(), RunPhase::Answering);
    assert_eq!(backend.question_requests().len(), 2);
    assert_eq!(run.current_question().map(|q| q.id), Some(QuestionId::new(2)));
}

#[tokio::test]
async fn firststrike_can_run_a_fixed_countdown() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .question_json(question(1, 3))
        .outcome_json(json!({"correct": false, "attempt_score": 0}));
    let ui = RecordingUi::new();
    let policies = PolicyTable::standard().with_rule(
        Mode::FirstStrike,
        ModePolicy {
            timer: TimerRule::Fixed(12),
            ends_on_wrong: true,
            asks_duration: false,
        },
    );
    let mut run = run_with(&backend, &ui, &clock).with_policies(policies);

    run.select_mode(Mode::FirstStrike).await.unwrap();
    clock.advance(Duration::seconds(12));
    run.tick().await;

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert!(submissions[0].is_timeout());
    assert_eq!(run.summary().unwrap().reason, EndReason::WrongAnswer);
}

//
// ─── STATE ROUND-TRIPS ─────────────────────────────────────────────────────────
//

#[tokio::test]
async fn difficulty_round_trips_through_requests() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .question_json(question(1, 3))
        .outcome_json(json!({"correct": true, "attempt_score": 1}))
        .question_json(json!({
            "id": 2, "prompt": "p", "difficulty": 5, "options": [],
            "state": {"current_diff": 5}
        }))
        .outcome_json(json!({"correct": true, "attempt_score": 2, "adjustment": {"next_diff": 6}}));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Adaptive).await.unwrap();
    run.answer(vec![OptionId::from_int(1)]).await;
    run.answer(vec![OptionId::from_int(1)]).await;

    let submissions = backend.submissions();
    // Never updated: local default.
    assert_eq!(submissions[0].state.current_difficulty, 3);
    // Updated by the question payload.
    assert_eq!(submissions[1].state.current_difficulty, 5);
    // Updated by the outcome adjustment.
    let requests = backend.question_requests();
    assert_eq!(requests[2].1.current_difficulty, 6);
}

#[tokio::test]
async fn seen_ids_stay_unique_across_cycles() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .question_json(json!({
            "id": 1, "prompt": "p", "options": [],
            "state": {"seen_qids": [1, 1, "1"]}
        }))
        .outcome_json(json!({"correct": true}))
        .question_json(json!({
            "id": 2, "prompt": "p", "options": [],
            "state": {"seen_qids": [2, "bogus"]}
        }))
        .outcome_json(json!({"correct": true}))
        .question_json(json!({"id": 1, "prompt": "p", "options": []}))
        .outcome_json(json!({"correct": true}));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::LevelInfinity).await.unwrap();
    for _ in 0..3 {
        run.answer(vec![OptionId::from_int(1)]).await;
    }

    for (_, state) in backend.question_requests() {
        let mut ids = state.seen_question_ids.clone();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), state.seen_question_ids.len());
    }
    let seen = run.session().unwrap().seen().as_slice().to_vec();
    assert_eq!(seen, vec![QuestionId::new(1), QuestionId::new(2)]);
}

#[tokio::test]
async fn missing_score_keeps_the_last_reported_one() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .question_json(question(1, 3))
        .outcome_json(json!({"correct": true, "attempt_score": 4}))
        .question_json(question(2, 3))
        .outcome_json(json!({"correct": true}));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Adaptive).await.unwrap();
    run.answer(vec![OptionId::from_int(1)]).await;
    run.answer(vec![OptionId::from_int(1)]).await;

    assert_eq!(ui.scores(), vec![0, 4, 4]);
}

//
// ─── FAILURES ──────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn start_failure_returns_to_idle_and_restores_ui() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .start_reply(Err(RemoteError::Status {
            status: 500,
            message: "HTTP 500".into(),
        }))
        .start_reply(Ok(AttemptId::from_int(8)));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    let err = run.select_mode(Mode::Adaptive).await.unwrap_err();
    assert!(matches!(err, RunError::StartFailed(_)));
    assert_eq!(run.phase(), RunPhase::Idle);
    assert!(backend.question_requests().is_empty());
    assert_eq!(
        ui.events(),
        vec![
            UiEvent::EnterImmersive,
            UiEvent::Notify("HTTP 500".into(), Severity::Error),
            UiEvent::ExitImmersive,
        ]
    );

    run.select_mode(Mode::Adaptive).await.unwrap();
    assert_eq!(
        backend.question_requests().len(),
        1,
        "a retried start proceeds to the first fetch"
    );
}

#[tokio::test]
async fn fetch_error_finishes_the_run() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend.question_error(RemoteError::Server("No questions available".into()));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Adaptive).await.unwrap();

    assert_eq!(run.phase(), RunPhase::Finished);
    assert_eq!(run.summary().unwrap().reason, EndReason::Failed);
    assert_eq!(backend.end_calls(), 1);
    assert!(ui.notices().contains(&"No questions available".to_owned()));
    assert_eq!(ui.events().last(), Some(&UiEvent::Results(AttemptId::new("A1"))));
}

#[tokio::test]
async fn submit_error_finishes_by_default() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend
        .question_json(question(1, 3))
        .outcome_error(RemoteError::Server("invalid question".into()));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Adaptive).await.unwrap();
    let disposition = run.answer(vec![OptionId::from_int(1)]).await;

    assert!(matches!(disposition, AnswerDisposition::Failed(_)));
    assert_eq!(run.phase(), RunPhase::Finished);
    assert_eq!(run.summary().unwrap().reason, EndReason::Failed);
    assert_eq!(backend.question_requests().len(), 1);
}

#[tokio::test]
async fn end_failure_is_reported_without_navigation() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend.end_reply(Ok(EndReply {
        ok: false,
        attempt_id: None,
    }));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Adaptive).await.unwrap();

    let summary = run.summary().unwrap();
    assert!(!summary.closed);
    assert!(ui.notices().contains(&"Could not finish attempt.".to_owned()));
    assert!(!ui.events().iter().any(|e| matches!(e, UiEvent::Results(_))));
    assert!(ui.events().contains(&UiEvent::ExitImmersive));
}

//
// ─── LIFECYCLE GUARDS ──────────────────────────────────────────────────────────
//

#[tokio::test]
async fn user_end_is_idempotent() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend.question_json(question(1, 3));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    assert!(matches!(run.end_run().await, Err(RunError::NoActiveAttempt)));

    run.select_mode(Mode::Adaptive).await.unwrap();
    let first = run.end_run().await.unwrap();
    let second = run.end_run().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.reason, EndReason::UserEnded);
    assert_eq!(backend.end_calls(), 1);
    assert_eq!(
        ui.events()
            .iter()
            .filter(|e| **e == UiEvent::ExitImmersive)
            .count(),
        1
    );
}

#[tokio::test]
async fn a_run_starts_only_once() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend.question_json(question(1, 3));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Adaptive).await.unwrap();
    let err = run.select_mode(Mode::Challenger).await.unwrap_err();

    assert!(matches!(err, RunError::AlreadyStarted));
    assert_eq!(
        backend
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Start(_)))
            .count(),
        1
    );
}

#[tokio::test]
async fn elapsed_readout_ticks_for_adaptive() {
    let clock = fixed_clock();
    let backend = ScriptedBackend::new();
    backend.question_json(question(1, 3));
    let ui = RecordingUi::new();
    let mut run = run_with(&backend, &ui, &clock);

    run.select_mode(Mode::Adaptive).await.unwrap();
    clock.advance(Duration::milliseconds(2_340));
    run.tick().await;
    clock.advance(Duration::seconds(60));
    run.tick().await;

    assert_eq!(ui.timers(), vec!["0.00", "2.34", "62"]);
    assert_eq!(run.phase(), RunPhase::Answering);
}
