use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    AttendanceRecord, AttendanceStatus, CommissionPolicy, CommissionType, Meeting, Payment,
    PaymentStatus, PaymentTransaction, StudentBilling, StudentRef,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let teachers = vec![
        (
            Uuid::parse_str("8f1c2b3a-5d6e-47f8-9a0b-1c2d3e4f5a6b")?,
            "Dewi Lestari",
            "dewi.lestari@course-office.id",
        ),
        (
            Uuid::parse_str("2a9b8c7d-6e5f-4a3b-8c1d-0e9f8a7b6c5d")?,
            "Fauzan Akbar",
            "fauzan.akbar@course-office.id",
        ),
    ];

    for (id, name, email) in &teachers {
        sqlx::query(
            r#"
            INSERT INTO course_office.teachers (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .execute(pool)
        .await?;
    }

    let classes = vec![
        (
            Uuid::parse_str("4b5c6d7e-8f9a-4b0c-9d1e-2f3a4b5c6d7e")?,
            "Tahsin Foundation",
            "dewi.lestari@course-office.id",
            "BY_STUDENT",
            15_000_i64,
        ),
        (
            Uuid::parse_str("7e6d5c4b-3a2b-4c1d-8e9f-0a1b2c3d4e5f")?,
            "Intensive Evening",
            "fauzan.akbar@course-office.id",
            "BY_CLASS",
            100_000_i64,
        ),
    ];

    for (id, name, teacher_email, commission_type, commission_amount) in &classes {
        let teacher_id: Uuid =
            sqlx::query("SELECT id FROM course_office.teachers WHERE email = $1")
                .bind(teacher_email)
                .fetch_one(pool)
                .await?
                .get("id");

        sqlx::query(
            r#"
            INSERT INTO course_office.classes
            (id, name, teacher_id, commission_type, commission_amount)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE
            SET teacher_id = EXCLUDED.teacher_id,
                commission_type = EXCLUDED.commission_type,
                commission_amount = EXCLUDED.commission_amount
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(teacher_id)
        .bind(commission_type)
        .bind(commission_amount)
        .execute(pool)
        .await?;
    }

    let students = vec![
        (
            Uuid::parse_str("1d2e3f4a-5b6c-4d7e-8f9a-0b1c2d3e4f5a")?,
            "Rizky Pratama",
            "rizky.pratama@course-office.id",
            "Tahsin Foundation",
        ),
        (
            Uuid::parse_str("9a8b7c6d-5e4f-4a3b-9c2d-1e0f9a8b7c6d")?,
            "Siti Rahma",
            "siti.rahma@course-office.id",
            "Tahsin Foundation",
        ),
        (
            Uuid::parse_str("3c4d5e6f-7a8b-4c9d-8e1f-2a3b4c5d6e7f")?,
            "Budi Santoso",
            "budi.santoso@course-office.id",
            "Intensive Evening",
        ),
    ];

    for (id, name, email, class_name) in &students {
        let class_id: Uuid = sqlx::query("SELECT id FROM course_office.classes WHERE name = $1")
            .bind(class_name)
            .fetch_one(pool)
            .await?
            .get("id");

        sqlx::query(
            r#"
            INSERT INTO course_office.students (id, full_name, email, class_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, class_id = EXCLUDED.class_id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(class_id)
        .execute(pool)
        .await?;
    }

    // The 2026-02-09 meeting is covered by a substitute.
    let meetings = vec![
        ("Tahsin Foundation", date(2026, 2, 2)?, None),
        (
            "Tahsin Foundation",
            date(2026, 2, 9)?,
            Some("fauzan.akbar@course-office.id"),
        ),
        ("Tahsin Foundation", date(2026, 2, 16)?, None),
        ("Intensive Evening", date(2026, 2, 3)?, None),
    ];

    for (class_name, meeting_date, substitute_email) in &meetings {
        let class_id: Uuid = sqlx::query("SELECT id FROM course_office.classes WHERE name = $1")
            .bind(class_name)
            .fetch_one(pool)
            .await?
            .get("id");

        let substitute_id: Option<Uuid> = match substitute_email {
            Some(email) => Some(
                sqlx::query("SELECT id FROM course_office.teachers WHERE email = $1")
                    .bind(email)
                    .fetch_one(pool)
                    .await?
                    .get("id"),
            ),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO course_office.meetings
            (id, class_id, meeting_date, substitute_teacher_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (class_id, meeting_date) DO UPDATE
            SET substitute_teacher_id = EXCLUDED.substitute_teacher_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(class_id)
        .bind(meeting_date)
        .bind(substitute_id)
        .execute(pool)
        .await?;
    }

    let attendance = vec![
        ("rizky.pratama@course-office.id", "Tahsin Foundation", date(2026, 2, 2)?, "HADIR"),
        ("siti.rahma@course-office.id", "Tahsin Foundation", date(2026, 2, 2)?, "TERLAMBAT"),
        ("rizky.pratama@course-office.id", "Tahsin Foundation", date(2026, 2, 9)?, "HADIR"),
        ("siti.rahma@course-office.id", "Tahsin Foundation", date(2026, 2, 9)?, "IZIN"),
        ("rizky.pratama@course-office.id", "Tahsin Foundation", date(2026, 2, 16)?, "TIDAK_HADIR"),
        ("siti.rahma@course-office.id", "Tahsin Foundation", date(2026, 2, 16)?, "HADIR"),
        ("budi.santoso@course-office.id", "Intensive Evening", date(2026, 2, 3)?, "HADIR"),
    ];

    for (email, class_name, meeting_date, status_code) in &attendance {
        let status: AttendanceStatus = status_code.parse()?;
        insert_attendance(pool, email, class_name, *meeting_date, status, None).await?;
    }

    let payments = vec![
        (
            Uuid::parse_str("6f5e4d3c-2b1a-4f9e-8d7c-6b5a4f3e2d1c")?,
            "rizky.pratama@course-office.id",
            1_500_000_i64,
            500_000_i64,
            "partial",
        ),
        (
            Uuid::parse_str("0b1c2d3e-4f5a-4b6c-9d8e-7f6a5b4c3d2e")?,
            "siti.rahma@course-office.id",
            1_500_000_i64,
            0_i64,
            "pending",
        ),
        (
            Uuid::parse_str("5a6b7c8d-9e0f-4a1b-8c2d-3e4f5a6b7c8d")?,
            "budi.santoso@course-office.id",
            1_200_000_i64,
            1_200_000_i64,
            "completed",
        ),
    ];

    for (id, email, total, paid, status) in &payments {
        let student_id: Uuid = sqlx::query("SELECT id FROM course_office.students WHERE email = $1")
            .bind(email)
            .fetch_one(pool)
            .await?
            .get("id");

        sqlx::query(
            r#"
            INSERT INTO course_office.payments
            (id, student_id, total_amount, paid_amount, remaining_amount, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id) DO UPDATE
            SET total_amount = EXCLUDED.total_amount,
                paid_amount = EXCLUDED.paid_amount,
                remaining_amount = EXCLUDED.remaining_amount,
                status = EXCLUDED.status
            "#,
        )
        .bind(id)
        .bind(student_id)
        .bind(total)
        .bind(paid)
        .bind(total - paid)
        .bind(status)
        .execute(pool)
        .await?;
    }

    let transactions = vec![
        (
            Uuid::parse_str("e1d2c3b4-a5f6-4e7d-8c9b-0a1f2e3d4c5b")?,
            "rizky.pratama@course-office.id",
            500_000_i64,
            date(2026, 2, 10)?,
            "first installment",
        ),
        (
            Uuid::parse_str("c5b4a3f2-e1d0-4c9b-8a7f-6e5d4c3b2a1f")?,
            "budi.santoso@course-office.id",
            1_200_000_i64,
            date(2026, 1, 20)?,
            "paid in full",
        ),
    ];

    for (id, email, amount, payment_date, note) in &transactions {
        let payment_id: Uuid = sqlx::query(
            r#"
            SELECT p.id FROM course_office.payments p
            JOIN course_office.students s ON s.id = p.student_id
            WHERE s.email = $1
            "#,
        )
        .bind(email)
        .fetch_one(pool)
        .await?
        .get("id");

        sqlx::query(
            r#"
            INSERT INTO course_office.payment_transactions
            (id, payment_id, amount, payment_date, note)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(payment_id)
        .bind(amount)
        .bind(payment_date)
        .bind(note)
        .execute(pool)
        .await?;
    }

    info!("seed data inserted");
    Ok(())
}

fn date(year: i32, month: u32, day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).context("invalid date")
}

async fn insert_attendance(
    pool: &PgPool,
    student_email: &str,
    class_name: &str,
    meeting_date: NaiveDate,
    status: AttendanceStatus,
    note: Option<&str>,
) -> anyhow::Result<u64> {
    let class_id: Uuid = sqlx::query("SELECT id FROM course_office.classes WHERE name = $1")
        .bind(class_name)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("unknown class: {class_name}"))?
        .get("id");

    let student_id: Uuid = sqlx::query("SELECT id FROM course_office.students WHERE email = $1")
        .bind(student_email)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("unknown student email: {student_email}"))?
        .get("id");

    let meeting_id: Uuid = sqlx::query(
        r#"
        INSERT INTO course_office.meetings (id, class_id, meeting_date)
        VALUES ($1, $2, $3)
        ON CONFLICT (class_id, meeting_date) DO UPDATE
        SET meeting_date = EXCLUDED.meeting_date
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(class_id)
    .bind(meeting_date)
    .fetch_one(pool)
    .await?
    .get("id");

    let result = sqlx::query(
        r#"
        INSERT INTO course_office.attendance (id, meeting_id, student_id, status, note)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (meeting_id, student_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(meeting_id)
    .bind(student_id)
    .bind(status.as_str())
    .bind(note)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Imports attendance rows from a CSV sheet. Status codes are the external
/// ones the sheets carry (HADIR, TIDAK_HADIR, TERLAMBAT, IZIN) and are
/// translated here, at the boundary; an unknown code fails the import.
pub async fn import_attendance_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_email: String,
        class_name: String,
        meeting_date: NaiveDate,
        status: String,
        note: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let status: AttendanceStatus = row
            .status
            .parse()
            .with_context(|| format!("csv row {}", index + 1))?;

        let affected = insert_attendance(
            pool,
            &row.student_email,
            &row.class_name,
            row.meeting_date,
            status,
            row.note.as_deref(),
        )
        .await
        .with_context(|| format!("csv row {}", index + 1))?;

        inserted += affected as usize;
    }

    info!(inserted, "attendance import finished");
    Ok(inserted)
}

pub async fn fetch_teacher_names(pool: &PgPool) -> anyhow::Result<HashMap<Uuid, String>> {
    let rows = sqlx::query("SELECT id, full_name FROM course_office.teachers")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("id"), row.get("full_name")))
        .collect())
}

/// One meeting with the class's commission policy and the full roster,
/// ready for the commission calculator.
pub async fn fetch_meeting(
    pool: &PgPool,
    meeting_id: Uuid,
) -> anyhow::Result<(Meeting, CommissionPolicy, Vec<AttendanceRecord>)> {
    let row = sqlx::query(
        r#"
        SELECT m.id, c.name AS class_name, m.meeting_date, c.teacher_id,
               m.substitute_teacher_id, m.actual_teacher_id,
               c.commission_type, c.commission_amount
        FROM course_office.meetings m
        JOIN course_office.classes c ON c.id = m.class_id
        WHERE m.id = $1
        "#,
    )
    .bind(meeting_id)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("meeting not found: {meeting_id}"))?;

    let commission_type: String = row.get("commission_type");
    let policy = CommissionPolicy {
        kind: commission_type.parse::<CommissionType>()?,
        amount: row.get("commission_amount"),
    };

    let meeting = Meeting {
        id: row.get("id"),
        class_name: row.get("class_name"),
        meeting_date: row.get("meeting_date"),
        primary_teacher: row.get("teacher_id"),
        substitute_teacher: row.get("substitute_teacher_id"),
        actual_teacher: row.get("actual_teacher_id"),
    };

    let attendance_rows = sqlx::query(
        r#"
        SELECT id, student_id, status, note
        FROM course_office.attendance
        WHERE meeting_id = $1
        "#,
    )
    .bind(meeting_id)
    .fetch_all(pool)
    .await?;

    let mut attendance = Vec::new();
    for row in attendance_rows {
        let status: String = row.get("status");
        attendance.push(AttendanceRecord {
            id: row.get("id"),
            student_id: row.get("student_id"),
            status: status.parse::<AttendanceStatus>()?,
            note: row.get("note"),
        });
    }

    debug!(%meeting_id, roster = attendance.len(), "fetched meeting roster");
    Ok((meeting, policy, attendance))
}

pub async fn fetch_meeting_ids(
    pool: &PgPool,
    class: Option<&str>,
) -> anyhow::Result<Vec<Uuid>> {
    let mut query = String::from(
        "SELECT m.id \
         FROM course_office.meetings m \
         JOIN course_office.classes c ON c.id = m.class_id",
    );
    if class.is_some() {
        query.push_str(" WHERE c.name = $1");
    }
    query.push_str(" ORDER BY m.meeting_date");

    let mut rows = sqlx::query(&query);
    if let Some(value) = class {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records.into_iter().map(|row| row.get("id")).collect())
}

/// Per-student billing snapshots for the reminder evaluator, scoped by
/// class or by a single student email.
pub async fn fetch_student_billing(
    pool: &PgPool,
    class: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<StudentBilling>> {
    let mut query = String::from(
        "SELECT st.id, st.full_name, st.email, c.name AS class_name \
         FROM course_office.students st \
         JOIN course_office.classes c ON c.id = st.class_id",
    );

    if class.is_some() {
        query.push_str(" WHERE c.name = $1");
    } else if email.is_some() {
        query.push_str(" WHERE st.email = $1");
    }
    query.push_str(" ORDER BY st.full_name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = class {
        rows = rows.bind(value);
    } else if let Some(value) = email {
        rows = rows.bind(value);
    }

    let students = rows.fetch_all(pool).await?;
    let mut snapshots = Vec::new();

    for row in students {
        let student = StudentRef {
            id: row.get("id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            class_name: row.get("class_name"),
        };

        let payment = fetch_payment(pool, student.id).await?;
        let transactions = fetch_transactions(pool, student.id).await?;
        let meeting_dates = fetch_meeting_dates(pool, student.id).await?;

        snapshots.push(StudentBilling {
            student,
            payment,
            transactions,
            meeting_dates,
        });
    }

    debug!(students = snapshots.len(), "fetched billing snapshots");
    Ok(snapshots)
}

async fn fetch_payment(pool: &PgPool, student_id: Uuid) -> anyhow::Result<Option<Payment>> {
    let row = sqlx::query(
        r#"
        SELECT student_id, total_amount, paid_amount, remaining_amount, status,
               reminder_dismissed_at, reminder_dismissed_by
        FROM course_office.payments
        WHERE student_id = $1
        "#,
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let status: String = row.get("status");
    Ok(Some(Payment {
        student_id: row.get("student_id"),
        total_amount: row.get("total_amount"),
        paid_amount: row.get("paid_amount"),
        remaining_amount: row.get("remaining_amount"),
        status: status.parse::<PaymentStatus>()?,
        reminder_dismissed_at: row.get("reminder_dismissed_at"),
        reminder_dismissed_by: row.get("reminder_dismissed_by"),
    }))
}

async fn fetch_transactions(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<PaymentTransaction>> {
    let rows = sqlx::query(
        r#"
        SELECT t.payment_id, t.amount, t.payment_date, t.note
        FROM course_office.payment_transactions t
        JOIN course_office.payments p ON p.id = t.payment_id
        WHERE p.student_id = $1
        ORDER BY t.payment_date
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| PaymentTransaction {
            payment_id: row.get("payment_id"),
            amount: row.get("amount"),
            payment_date: row.get("payment_date"),
            note: row.get("note"),
        })
        .collect())
}

async fn fetch_meeting_dates(pool: &PgPool, student_id: Uuid) -> anyhow::Result<Vec<NaiveDate>> {
    let rows = sqlx::query(
        r#"
        SELECT m.meeting_date
        FROM course_office.attendance a
        JOIN course_office.meetings m ON m.id = a.meeting_id
        WHERE a.student_id = $1
        ORDER BY m.meeting_date
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.get("meeting_date")).collect())
}
