//! Shared fakes and fixtures for rollcall-mentor integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use rollcall_common::db::{self, init_in_memory};
use rollcall_common::models::{NewStudent, Student};
use rollcall_mentor::services::{ComposeError, DispatchError, SmsDispatcher, TextGenerator};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Mutex;

/// Text generator that answers every prompt the same way
pub struct FixedGenerator {
    reply: Option<String>,
}

impl FixedGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String, ComposeError> {
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(ComposeError::Api {
                status: 503,
                body: "model overloaded".to_string(),
            }),
        }
    }
}

/// Dispatcher that records every attempt and fails for selected numbers
#[derive(Default)]
pub struct RecordingDispatcher {
    failing_phones: HashSet<String>,
    attempts: Mutex<Vec<(String, String)>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(phones: &[&str]) -> Self {
        Self {
            failing_phones: phones.iter().map(|p| p.to_string()).collect(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// (phone, message) in call order
    pub fn attempts(&self) -> Vec<(String, String)> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsDispatcher for RecordingDispatcher {
    async fn send(&self, phone: &str, message: &str) -> Result<(), DispatchError> {
        self.attempts
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));

        if self.failing_phones.contains(phone) {
            return Err(DispatchError::Api {
                status: 500,
                body: "device offline".to_string(),
            });
        }
        Ok(())
    }
}

pub fn intake(name: &str, roll_number: &str, parent_phone: &str, student_phone: &str) -> NewStudent {
    NewStudent {
        name: Some(name.to_string()),
        roll_number: Some(roll_number.to_string()),
        email: Some(format!("{}@example.edu", roll_number.to_lowercase())),
        parent_name: Some(format!("Parent of {}", name)),
        parent_phone: Some(parent_phone.to_string()),
        student_phone: Some(student_phone.to_string()),
        grade: Some("B.Tech II".to_string()),
        section: Some("A".to_string()),
    }
}

/// In-memory directory holding Asha Rao (24R01A0001)
pub async fn pool_with_asha() -> (SqlitePool, Student) {
    let pool = init_in_memory().await.unwrap();
    let asha = db::students::create_student(
        &pool,
        &intake("Asha Rao", "24R01A0001", "9000000001", "9000000002"),
    )
    .await
    .unwrap();
    (pool, asha)
}
