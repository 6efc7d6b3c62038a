//! Domain models shared by the directory store, the workflow and the HTTP API
//!
//! All wire representations use camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Student record with contact details and academic summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Assigned on intake; may be blank in seed rosters
    #[serde(default)]
    pub id: String,
    pub roll_number: String,
    pub name: String,
    pub email: String,
    pub parent_name: String,
    pub parent_phone: String,
    pub student_phone: String,
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub gpa: f64,
    #[serde(default)]
    pub attendance_percentage: f64,
    /// Ordered as entered
    #[serde(default)]
    pub academic_details: Vec<SubjectGrade>,
}

/// One subject line of a student's academic record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGrade {
    pub subject: String,
    pub grade: String,
    pub score: f64,
}

/// Fields accepted by directory intake
///
/// Every field is optional on the wire so missing ones can be reported
/// together instead of failing on the first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub name: Option<String>,
    pub roll_number: Option<String>,
    pub email: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub student_phone: Option<String>,
    pub grade: Option<String>,
    pub section: Option<String>,
}

impl NewStudent {
    /// Names of required fields that are absent or blank, in declaration order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let fields: [(&'static str, &Option<String>); 8] = [
            ("name", &self.name),
            ("rollNumber", &self.roll_number),
            ("email", &self.email),
            ("parentName", &self.parent_name),
            ("parentPhone", &self.parent_phone),
            ("studentPhone", &self.student_phone),
            ("grade", &self.grade),
            ("section", &self.section),
        ];

        fields
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Profile edit: only name and phone numbers may change
///
/// Empty strings are treated the same as absent fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdate {
    pub name: Option<String>,
    pub parent_phone: Option<String>,
    pub student_phone: Option<String>,
}

impl StudentUpdate {
    pub fn name(&self) -> Option<&str> {
        non_blank(&self.name)
    }

    pub fn parent_phone(&self) -> Option<&str> {
        non_blank(&self.parent_phone)
    }

    pub fn student_phone(&self) -> Option<&str> {
        non_blank(&self.student_phone)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Roll-call status of a student
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown attendance status: {}",
                other
            ))),
        }
    }
}

/// Append-only attendance log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub status: AttendanceStatus,
    pub timestamp: DateTime<Utc>,
}

/// Who an absence notification is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recipient {
    Parent,
    Student,
}

impl Recipient {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recipient::Parent => "parent",
            Recipient::Student => "student",
        }
    }

    /// Phone number of this recipient on the student record
    pub fn phone_of<'a>(&self, student: &'a Student) -> &'a str {
        match self {
            Recipient::Parent => &student.parent_phone,
            Recipient::Student => &student.student_phone,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one student's absence workflow
///
/// Idle is represented by the absence of a stage entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransmissionStage {
    /// Composer drafting both messages
    AiGeneration,
    /// Dispatcher sending parent then student SMS
    Transmitting,
    /// Both messages delivered; cleared after a short delay
    Sent,
    /// Composition or dispatch failed; stays until the next absence workflow
    Error,
}

impl TransmissionStage {
    /// Short progress label shown next to the roll-call row
    pub fn label(&self) -> &'static str {
        match self {
            TransmissionStage::AiGeneration => "AI Writing SMS...",
            TransmissionStage::Transmitting => "Relaying...",
            TransmissionStage::Sent => "Delivered",
            TransmissionStage::Error => "Failed",
        }
    }
}

/// Delivery state recorded on a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
}

/// One successfully dispatched SMS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLogEntry {
    pub id: String,
    pub student_id: String,
    pub recipient: Recipient,
    pub phone: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
}
