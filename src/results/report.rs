use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::grade::Grade;
use crate::analysis::AnalysisResult;
use crate::catalog::{ExperienceLevel, Question};
use crate::session::{AnalysisMode, Answer, AnswerContent, Session};

/// One answered question as shown in the report
#[derive(Debug, Clone, Serialize)]
pub struct QuestionReport {
    pub index: usize,
    pub question: Question,
    pub answer: AnswerContent,
    pub score: f64,
    pub analysis: AnalysisResult,
}

/// Scored summary of a completed session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub user_id: String,
    pub domain_id: String,
    pub level: ExperienceLevel,
    pub analysis_mode: AnalysisMode,
    pub questions: Vec<QuestionReport>,
    pub overall_score: f64,
    pub grade: Grade,
    pub generated_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn build(session: &Session, answers: &[Answer]) -> Self {
        let overall_score = mean_score(answers);

        let questions = answers
            .iter()
            .map(|answer| QuestionReport {
                index: answer.question_index,
                question: answer.question.clone(),
                answer: answer.content.clone(),
                score: answer.score(),
                analysis: answer.analysis.clone(),
            })
            .collect();

        Self {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            domain_id: session.domain_id.clone(),
            level: session.level,
            analysis_mode: session.analysis_mode,
            questions,
            overall_score,
            grade: Grade::from_score(overall_score),
            generated_at: Utc::now(),
        }
    }

    /// Plain-text export for download
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

/// Arithmetic mean of the answer scores; 0 for no answers
pub fn mean_score(answers: &[Answer]) -> f64 {
    if answers.is_empty() {
        return 0.0;
    }
    answers.iter().map(Answer::score).sum::<f64>() / answers.len() as f64
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Interview Practice Report")?;
        writeln!(f, "=========================")?;
        writeln!(f, "Session: {}", self.session_id)?;
        writeln!(f, "Domain: {}", self.domain_id)?;
        writeln!(f, "Level: {}", self.level)?;
        writeln!(f, "Mode: {}", self.analysis_mode)?;
        writeln!(f, "Generated: {}", self.generated_at.to_rfc3339())?;
        writeln!(f, "Overall Score: {:.2}", self.overall_score)?;
        writeln!(f, "Grade: {}", self.grade)?;

        let total = self.questions.len();
        for entry in &self.questions {
            writeln!(f)?;
            write_question(f, entry, total)?;
        }
        Ok(())
    }
}

fn write_question(f: &mut fmt::Formatter<'_>, entry: &QuestionReport, total: usize) -> fmt::Result {
    let heading = format!("Question {} of {}", entry.index + 1, total);
    writeln!(f, "{}", heading)?;
    writeln!(f, "{}", "-".repeat(heading.len()))?;
    writeln!(f, "{}", entry.question.text)?;
    writeln!(
        f,
        "Category: {} | Difficulty: {}",
        entry.question.category, entry.question.difficulty
    )?;
    if !entry.question.keywords.is_empty() {
        writeln!(f, "Keywords: {}", entry.question.keywords.join(", "))?;
    }

    match &entry.answer {
        AnswerContent::Text { text } => writeln!(f, "Answer: {}", text)?,
        AnswerContent::Recording { recording } => {
            writeln!(f, "Answer: recording ({:.1}s)", recording.duration_secs)?
        }
    }

    let base = entry.analysis.base();
    writeln!(f, "Score: {:.2}", entry.score)?;
    writeln!(
        f,
        "Feedback: technical accuracy {:.2}, clarity {:.2}, relevance {:.2}",
        base.feedback.technical_accuracy, base.feedback.clarity, base.feedback.relevance
    )?;
    write_list(f, "Strengths", &base.strengths)?;
    write_list(f, "Improvements", &base.improvements)?;
    writeln!(f, "Assessment: {}", base.overall_assessment)?;
    if let Some(insights) = &base.domain_specific_insights {
        writeln!(f, "Domain insights: {}", insights)?;
    }

    if let Some(advanced) = entry.analysis.advanced() {
        let breakdown = &advanced.score_breakdown;
        writeln!(
            f,
            "Score breakdown: content {:.2}, delivery {:.2}, body language {:.2}",
            breakdown.content, breakdown.delivery, breakdown.body_language
        )?;

        let speech = &advanced.speech_analysis;
        writeln!(
            f,
            "Speech: {:.0} wpm, {} filler words ({:.1}%), confidence {:.2}",
            speech.words_per_minute,
            speech.filler_word_count,
            speech.filler_word_percentage,
            speech.confidence
        )?;
        write_list(f, "Speech recommendations", &speech.recommendations)?;

        let body = &advanced.body_language_analysis;
        writeln!(
            f,
            "Body language: eye contact {:.2}, movement {:.2}, presence {:.2}",
            body.eye_contact, body.body_movement, body.overall_presence
        )?;
        write_list(f, "Body language recommendations", &body.recommendations)?;

        let transcription = &advanced.transcription;
        writeln!(
            f,
            "Transcription ({} words, {:.1}s, confidence {:.2}): {}",
            transcription.word_count,
            transcription.duration,
            transcription.confidence,
            transcription.text
        )?;
    }

    Ok(())
}

fn write_list(f: &mut fmt::Formatter<'_>, title: &str, items: &[String]) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(f, "{}:", title)?;
    for item in items {
        writeln!(f, "  - {}", item)?;
    }
    Ok(())
}
