//! Notification Composer
//!
//! Drafts SMS bodies and profile insights through a generative text backend.
//! Every draft goes through [`compose_with_fallback`]: a usable backend answer
//! is returned as-is, anything else (error, empty text, missing key) is
//! replaced by a deterministic template that embeds the student's name and
//! roll number. Callers therefore always receive text.

use async_trait::async_trait;
use rollcall_common::models::{Recipient, Student, SubjectGrade};
use rollcall_common::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Sampling temperature for SMS drafts (consistent formatting)
const MESSAGE_TEMPERATURE: f32 = 0.5;

/// Sampling temperature for free-form insights
const INSIGHT_TEMPERATURE: f32 = 0.7;

/// Message length the backend is asked to respect
pub const SMS_CHAR_BUDGET: usize = 160;

/// Text generation failures
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Composer not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Generative text backend (external collaborator)
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ComposeError>;
}

/// Absence message drafting as consumed by the attendance workflow
#[async_trait]
pub trait MessageComposer: Send + Sync {
    async fn absence_message(
        &self,
        student: &StudentSnapshot,
        recipient: Recipient,
    ) -> Result<String, ComposeError>;
}

/// Identity and academic summary handed to the composer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSnapshot {
    pub name: String,
    pub roll_number: String,
    #[serde(default)]
    pub gpa: f64,
    #[serde(default)]
    pub attendance_percentage: f64,
    #[serde(default)]
    pub academic_details: Vec<SubjectGrade>,
}

impl From<&Student> for StudentSnapshot {
    fn from(student: &Student) -> Self {
        Self {
            name: student.name.clone(),
            roll_number: student.roll_number.clone(),
            gpa: student.gpa,
            attendance_percentage: student.attendance_percentage,
            academic_details: student.academic_details.clone(),
        }
    }
}

/// Use the backend answer when it carries text, otherwise the template
pub fn compose_with_fallback(
    outcome: Result<String, ComposeError>,
    fallback: impl FnOnce() -> String,
) -> String {
    match outcome {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("Composer returned empty text, using template");
            fallback()
        }
        Err(e) => {
            warn!(error = %e, "Composer failed, using template");
            fallback()
        }
    }
}

/// Template used when no generated absence message is available
pub fn absence_template(student: &StudentSnapshot, recipient: Recipient, date: &str) -> String {
    match recipient {
        Recipient::Parent => format!(
            "ABSENT ALERT: {} ({}) was marked absent on {}. Current GPA: {:.2}. Please contact the class mentor.",
            student.name, student.roll_number, date, student.gpa
        ),
        Recipient::Student => format!(
            "ALERT: {} ({}) you were marked ABSENT on {}. GPA: {:.2}. Attend classes to keep your score.",
            student.name, student.roll_number, date, student.gpa
        ),
    }
}

/// Template used when no generated details request is available
pub fn details_request_template(student: &StudentSnapshot) -> String {
    format!(
        "Dear {} ({}), please submit your updated academic details (subjects, grades, scores) to the college office at the earliest. Thank you.",
        student.name, student.roll_number
    )
}

pub const INSIGHT_UNAVAILABLE: &str = "Unable to generate insights at this time.";

/// Composer backed by a [`TextGenerator`]
pub struct GenerativeComposer {
    generator: Arc<dyn TextGenerator>,
    clock: Arc<dyn Clock>,
}

impl GenerativeComposer {
    pub fn new(generator: Arc<dyn TextGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self { generator, clock }
    }

    fn today(&self) -> String {
        self.clock.now().format("%d/%m/%Y").to_string()
    }

    /// Absence SMS for one recipient; never fails
    pub async fn draft_absence(&self, student: &StudentSnapshot, recipient: Recipient) -> String {
        let date = self.today();
        let prompt = absence_prompt(student, recipient, &date);
        debug!(roll_number = %student.roll_number, recipient = %recipient, "Drafting absence message");

        let outcome = self.generator.generate(&prompt, MESSAGE_TEMPERATURE).await;
        compose_with_fallback(outcome, || absence_template(student, recipient, &date))
    }

    /// Short encouraging summary for the mentor's report
    pub async fn performance_insight(&self, student: &StudentSnapshot) -> String {
        let grades = student
            .academic_details
            .iter()
            .map(|s| format!("{}: {}", s.subject, s.grade))
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = format!(
            "Write a short, encouraging summary of this student's performance for a teacher's report.\n\
             Name: {}\nRoll Number: {}\nGPA: {}\nAttendance: {}%\nGrades: {}",
            student.name, student.roll_number, student.gpa, student.attendance_percentage, grades
        );

        let outcome = self.generator.generate(&prompt, INSIGHT_TEMPERATURE).await;
        compose_with_fallback(outcome, || INSIGHT_UNAVAILABLE.to_string())
    }

    /// SMS asking the student to submit updated academic details
    pub async fn details_request(&self, student: &StudentSnapshot) -> String {
        let prompt = format!(
            "Write a short formal SMS asking a student to submit their updated academic details \
             (subjects, grades, scores) to the college administration.\n\
             Student Name: {}\nRoll Number: {}\n\
             Keep it under {} characters, professional but friendly, and include the name and roll number.",
            student.name, student.roll_number, SMS_CHAR_BUDGET
        );

        let outcome = self.generator.generate(&prompt, MESSAGE_TEMPERATURE).await;
        compose_with_fallback(outcome, || details_request_template(student))
    }
}

#[async_trait]
impl MessageComposer for GenerativeComposer {
    async fn absence_message(
        &self,
        student: &StudentSnapshot,
        recipient: Recipient,
    ) -> Result<String, ComposeError> {
        Ok(self.draft_absence(student, recipient).await)
    }
}

fn absence_prompt(student: &StudentSnapshot, recipient: Recipient, date: &str) -> String {
    match recipient {
        Recipient::Parent => format!(
            "Write a formal SMS to a parent reporting that their child was ABSENT today.\n\
             The message must begin by identifying the student as: Name: {}, Roll No: {}.\n\
             Date: {}\n\
             Academic snapshot: GPA {}, attendance {}%.\n\
             Keep it under {} characters with a professional tone.",
            student.name,
            student.roll_number,
            date,
            student.gpa,
            student.attendance_percentage,
            SMS_CHAR_BUDGET
        ),
        Recipient::Student => format!(
            "Write an urgent SMS to a student who was marked ABSENT today.\n\
             The message must begin by identifying the student as: {} ({}).\n\
             Date: {}\n\
             Remind them their GPA is {} and that attending classes protects it.\n\
             Keep it under {} characters with an authoritative tone.",
            student.name, student.roll_number, date, student.gpa, SMS_CHAR_BUDGET
        ),
    }
}
