use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineError;

/// Attendance status, translated once at the boundary from the external
/// codes the attendance sheets use. Core logic only ever sees this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    /// Only present and late students count toward a commission.
    pub fn is_commission_eligible(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }

    pub fn label(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Late => "LATE",
            AttendanceStatus::Excused => "EXCUSED",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PRESENT" | "HADIR" => Ok(AttendanceStatus::Present),
            "ABSENT" | "TIDAK_HADIR" => Ok(AttendanceStatus::Absent),
            "LATE" | "TERLAMBAT" => Ok(AttendanceStatus::Late),
            "EXCUSED" | "IZIN" => Ok(AttendanceStatus::Excused),
            other => Err(EngineError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a class pays its teacher per meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionType {
    /// Flat amount per meeting, regardless of how many students showed up.
    ByClass,
    /// Amount per eligible attendee.
    ByStudent,
}

impl FromStr for CommissionType {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "BY_CLASS" => Ok(CommissionType::ByClass),
            "BY_STUDENT" => Ok(CommissionType::ByStudent),
            other => Err(EngineError::InvalidPolicy {
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Completed,
}

impl FromStr for PaymentStatus {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(PaymentStatus::Pending),
            "partial" => Ok(PaymentStatus::Partial),
            "completed" => Ok(PaymentStatus::Completed),
            other => Err(EngineError::InvalidPaymentStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// What most recently restarted a student's reminder cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetType {
    Payment,
    Dismissal,
}

impl fmt::Display for ResetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetType::Payment => f.write_str("payment"),
            ResetType::Dismissal => f.write_str("dismissal"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    pub note: Option<String>,
}

/// One scheduled class meeting, with the teacher columns needed to decide
/// who gets credited for it.
#[derive(Debug, Clone)]
pub struct Meeting {
    pub id: Uuid,
    pub class_name: String,
    pub meeting_date: NaiveDate,
    pub primary_teacher: Uuid,
    pub substitute_teacher: Option<Uuid>,
    pub actual_teacher: Option<Uuid>,
}

#[derive(Debug, Clone, Copy)]
pub struct CommissionPolicy {
    pub kind: CommissionType,
    pub amount: i64,
}

/// A student's single payment account. `remaining_amount` is
/// `total_amount - paid_amount` and never goes negative in consistent data.
#[derive(Debug, Clone)]
pub struct Payment {
    pub student_id: Uuid,
    pub total_amount: i64,
    pub paid_amount: i64,
    pub remaining_amount: i64,
    pub status: PaymentStatus,
    pub reminder_dismissed_at: Option<NaiveDate>,
    pub reminder_dismissed_by: Option<String>,
}

/// Append-only ledger entry against a payment.
#[derive(Debug, Clone)]
pub struct PaymentTransaction {
    pub payment_id: Uuid,
    pub amount: i64,
    pub payment_date: NaiveDate,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionResult {
    pub amount: i64,
    pub breakdown: String,
    pub eligible_student_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderDecision {
    pub should_show_reminder: bool,
    pub reason: String,
    pub total_meetings: usize,
    pub meetings_since_reset: usize,
    pub last_reset_date: Option<NaiveDate>,
    pub reset_type: Option<ResetType>,
    pub remaining_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub class_name: String,
}

/// A reminder decision paired with the student it is about, ready for the
/// report and the JSON output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReminder {
    pub student: StudentRef,
    pub decision: ReminderDecision,
}

/// Everything the reminder evaluator needs for one student, materialized
/// in one consistent snapshot before evaluation.
#[derive(Debug, Clone)]
pub struct StudentBilling {
    pub student: StudentRef,
    pub payment: Option<Payment>,
    pub transactions: Vec<PaymentTransaction>,
    pub meeting_dates: Vec<NaiveDate>,
}
