// Results aggregation and report export tests

mod common;

use anyhow::Result;
use chrono::Utc;
use common::{advanced_analysis, base_analysis, question, settle, RecordingSink};
use interview_coach::analysis::AnalysisResult;
use interview_coach::capture::{RecordingSummary, StopReason};
use interview_coach::catalog::ExperienceLevel;
use interview_coach::results::{mean_score, Grade, ResultsAggregator, SessionReport};
use interview_coach::session::{AnalysisMode, Answer, AnswerContent, Session};

fn session(mode: AnalysisMode, count: usize) -> Session {
    let questions: Vec<_> = (0..count)
        .map(|i| question(&format!("q{}", i + 1), &format!("Question number {}", i + 1)))
        .collect();

    Session {
        id: "session-fixed".to_string(),
        user_id: "user-3".to_string(),
        domain_id: "backend".to_string(),
        level: ExperienceLevel::Senior,
        analysis_mode: mode,
        total_questions: questions.len(),
        questions,
        created_at: Utc::now(),
    }
}

fn text_answer(session: &Session, index: usize, score: f64) -> Answer {
    Answer {
        question_index: index,
        question: session.questions[index].clone(),
        content: AnswerContent::Text {
            text: format!("Answer {}", index + 1),
        },
        transcription: None,
        analysis: AnalysisResult::Standard(base_analysis(score)),
        answered_at: Utc::now(),
    }
}

#[test]
fn test_overall_score_is_mean() {
    let session = session(AnalysisMode::Standard, 3);
    let answers: Vec<_> = [80.0, 60.0, 40.0]
        .iter()
        .enumerate()
        .map(|(i, score)| text_answer(&session, i, *score))
        .collect();

    let report = SessionReport::build(&session, &answers);
    assert_eq!(report.overall_score, 60.0);
    assert_eq!(report.grade, Grade::C);
    assert_eq!(report.questions.len(), 3);
    assert_eq!(report.questions[2].score, 40.0);
    assert_eq!(mean_score(&[]), 0.0);
}

#[test]
fn test_grade_thresholds() {
    let cases = [
        (95.0, Grade::APlus, "A+"),
        (90.0, Grade::APlus, "A+"),
        (85.5, Grade::A, "A"),
        (80.0, Grade::A, "A"),
        (79.99, Grade::B, "B"),
        (70.0, Grade::B, "B"),
        (60.0, Grade::C, "C"),
        (59.9, Grade::D, "D"),
        (0.0, Grade::D, "D"),
    ];

    for (score, grade, label) in cases {
        assert_eq!(Grade::from_score(score), grade, "score {}", score);
        assert_eq!(grade.to_string(), label);
    }
}

#[test]
fn test_text_export() {
    let session = session(AnalysisMode::Standard, 2);
    let answers = vec![text_answer(&session, 0, 92.0), text_answer(&session, 1, 71.0)];
    let report = SessionReport::build(&session, &answers);

    let text = report.to_text();
    assert!(text.starts_with("Interview Practice Report"));
    assert!(text.contains("Session: session-fixed"));
    assert!(text.contains("Level: senior"));
    assert!(text.contains("Overall Score: 81.50"));
    assert!(text.contains("Grade: A"));
    assert!(text.contains("Question 1 of 2"));
    assert!(text.contains("Question number 2"));
    assert!(text.contains("Answer: Answer 1"));
    assert!(text.contains("Score: 92.00"));
    assert!(text.contains("  - Clear structure"));
    assert!(text.contains("Assessment: Scored 71"));

    // Exporting leaves the report untouched
    assert_eq!(report.to_text(), text);
    assert_eq!(report.overall_score, 81.5);
}

#[test]
fn test_text_export_includes_media_insights() {
    let session = session(AnalysisMode::Advanced, 1);
    let answer = Answer {
        question_index: 0,
        question: session.questions[0].clone(),
        content: AnswerContent::Recording {
            recording: RecordingSummary {
                duration_secs: 42.0,
                audio_bytes: 1024,
                has_video: false,
                stop_reason: StopReason::UserStopped,
            },
        },
        transcription: None,
        analysis: advanced_analysis(66.0),
        answered_at: Utc::now(),
    };

    let report = SessionReport::build(&session, &[answer]);
    let text = report.to_text();

    assert_eq!(report.grade, Grade::C);
    assert!(text.contains("Mode: advanced"));
    assert!(text.contains("Answer: recording (42.0s)"));
    assert!(text.contains("Speech: 140 wpm"));
    assert!(text.contains("Body language: eye contact 70.00"));
    assert!(text.contains("Transcription (7 words"));
}

#[tokio::test]
async fn test_aggregator_persists_in_background() -> Result<()> {
    let sink = RecordingSink::new();
    let aggregator = ResultsAggregator::new(sink.clone());
    let session = session(AnalysisMode::Standard, 2);
    let answers = vec![text_answer(&session, 0, 100.0), text_answer(&session, 1, 50.0)];

    let report = aggregator.aggregate(&session, &answers);
    assert_eq!(report.overall_score, 75.0);
    assert_eq!(report.grade, Grade::B);

    settle().await;
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].session.id, "session-fixed");
    assert_eq!(records[0].overall_score, 75.0);

    let json = serde_json::to_value(&records[0])?;
    assert_eq!(json["grade"], "B");
    assert_eq!(json["user_id"], "user-3");

    Ok(())
}
