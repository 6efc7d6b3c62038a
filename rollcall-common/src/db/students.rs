//! Student directory store
//!
//! Plain CRUD over `students` and `academic_details`. Students are never
//! deleted outside of a full roster replacement.

use crate::models::{NewStudent, Student, StudentUpdate, SubjectGrade};
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Message returned when roll number or email is already taken
pub const DUPLICATE_STUDENT_MESSAGE: &str =
    "A student with that roll number or email already exists.";

const STUDENT_COLUMNS: &str = "id, roll_number, name, email, parent_name, parent_phone, \
     student_phone, grade, section, avatar, gpa, attendance_percentage";

/// All students with their academic details, ordered by roll number
pub async fn list_students(pool: &SqlitePool) -> Result<Vec<Student>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM students ORDER BY roll_number",
        STUDENT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    let mut students: Vec<Student> = rows.iter().map(student_from_row).collect();

    let detail_rows = sqlx::query(
        "SELECT student_id, subject, grade, score FROM academic_details ORDER BY student_id, position",
    )
    .fetch_all(pool)
    .await?;

    let mut details: HashMap<String, Vec<SubjectGrade>> = HashMap::new();
    for row in &detail_rows {
        details
            .entry(row.get("student_id"))
            .or_default()
            .push(subject_grade_from_row(row));
    }

    for student in &mut students {
        if let Some(subjects) = details.remove(&student.id) {
            student.academic_details = subjects;
        }
    }

    Ok(students)
}

/// Look up one student by id
pub async fn find_student(pool: &SqlitePool, id: &str) -> Result<Option<Student>> {
    let row = sqlx::query(&format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut student = student_from_row(&row);
    student.academic_details = load_academic_details(pool, id).await?;
    Ok(Some(student))
}

/// Directory intake
///
/// New students start with GPA and attendance at zero and a generated avatar.
pub async fn create_student(pool: &SqlitePool, intake: &NewStudent) -> Result<Student> {
    let missing = intake.missing_fields();
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "All fields are required. Missing: {}",
            missing.join(", ")
        )));
    }

    let field = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();

    let roll_number = field(&intake.roll_number);
    let student = Student {
        id: Uuid::new_v4().to_string(),
        avatar: avatar_url(&roll_number),
        roll_number,
        name: field(&intake.name),
        email: field(&intake.email),
        parent_name: field(&intake.parent_name),
        parent_phone: field(&intake.parent_phone),
        student_phone: field(&intake.student_phone),
        grade: field(&intake.grade),
        section: field(&intake.section),
        gpa: 0.0,
        attendance_percentage: 0.0,
        academic_details: Vec::new(),
    };

    let mut tx = pool.begin().await?;
    insert_student(&mut tx, &student).await.map_err(duplicate_message)?;
    tx.commit().await?;

    info!(student_id = %student.id, roll_number = %student.roll_number, "Student created");
    Ok(student)
}

/// Profile edit limited to name and phone numbers
pub async fn update_student(pool: &SqlitePool, id: &str, update: &StudentUpdate) -> Result<Student> {
    let result = sqlx::query(
        r#"
        UPDATE students SET
            name = COALESCE(?, name),
            parent_phone = COALESCE(?, parent_phone),
            student_phone = COALESCE(?, student_phone),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(update.name())
    .bind(update.parent_phone())
    .bind(update.student_phone())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Student not found: {}", id)));
    }

    debug!(student_id = %id, "Student profile updated");

    find_student(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Student not found: {}", id)))
}

/// Replace the whole roster (students, academic details, attendance)
///
/// Blank ids in the input are assigned fresh UUIDs. Returns the number of
/// students written.
pub async fn replace_roster(pool: &SqlitePool, roster: &[Student]) -> Result<usize> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM academic_details").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM attendance").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM students").execute(&mut *tx).await?;

    for student in roster {
        let mut student = student.clone();
        if student.id.trim().is_empty() {
            student.id = Uuid::new_v4().to_string();
        }
        if student.avatar.trim().is_empty() {
            student.avatar = avatar_url(&student.roll_number);
        }
        insert_student(&mut tx, &student).await.map_err(duplicate_message)?;
        info!(roll_number = %student.roll_number, "Seeded student: {}", student.name);
    }

    tx.commit().await?;
    Ok(roster.len())
}

async fn insert_student(tx: &mut Transaction<'_, Sqlite>, student: &Student) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO students (
            id, roll_number, name, email, parent_name, parent_phone,
            student_phone, grade, section, avatar, gpa, attendance_percentage
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&student.id)
    .bind(&student.roll_number)
    .bind(&student.name)
    .bind(&student.email)
    .bind(&student.parent_name)
    .bind(&student.parent_phone)
    .bind(&student.student_phone)
    .bind(&student.grade)
    .bind(&student.section)
    .bind(&student.avatar)
    .bind(student.gpa)
    .bind(student.attendance_percentage)
    .execute(&mut **tx)
    .await?;

    for (position, detail) in student.academic_details.iter().enumerate() {
        sqlx::query(
            "INSERT INTO academic_details (student_id, position, subject, grade, score) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&student.id)
        .bind(position as i64)
        .bind(&detail.subject)
        .bind(&detail.grade)
        .bind(detail.score)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn load_academic_details(pool: &SqlitePool, student_id: &str) -> Result<Vec<SubjectGrade>> {
    let rows = sqlx::query(
        "SELECT subject, grade, score FROM academic_details WHERE student_id = ? ORDER BY position",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(subject_grade_from_row).collect())
}

fn student_from_row(row: &SqliteRow) -> Student {
    Student {
        id: row.get("id"),
        roll_number: row.get("roll_number"),
        name: row.get("name"),
        email: row.get("email"),
        parent_name: row.get("parent_name"),
        parent_phone: row.get("parent_phone"),
        student_phone: row.get("student_phone"),
        grade: row.get("grade"),
        section: row.get("section"),
        avatar: row.get("avatar"),
        gpa: row.get("gpa"),
        attendance_percentage: row.get("attendance_percentage"),
        academic_details: Vec::new(),
    }
}

fn subject_grade_from_row(row: &SqliteRow) -> SubjectGrade {
    SubjectGrade {
        subject: row.get("subject"),
        grade: row.get("grade"),
        score: row.get("score"),
    }
}

fn avatar_url(roll_number: &str) -> String {
    format!("https://i.pravatar.cc/150?u={}", roll_number)
}

fn duplicate_message(err: Error) -> Error {
    match err {
        Error::Conflict(_) => Error::Conflict(DUPLICATE_STUDENT_MESSAGE.to_string()),
        other => other,
    }
}
