use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::commission::credited_teacher;
use crate::currency::format_amount;
use crate::models::{CommissionResult, Meeting, StudentReminder};

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherCommissionTotal {
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub total_amount: i64,
    pub meeting_count: usize,
}

/// Aggregates per-meeting commissions into per-teacher totals. Attribution
/// goes through [`credited_teacher`] so a substituted meeting lands on the
/// substitute, never on the class's permanent teacher as well.
pub fn summarize_by_teacher(
    meetings: &[(Meeting, CommissionResult)],
    teacher_names: &HashMap<Uuid, String>,
) -> Vec<TeacherCommissionTotal> {
    let mut map: HashMap<Uuid, (i64, usize)> = HashMap::new();

    for (meeting, result) in meetings {
        let entry = map.entry(credited_teacher(meeting)).or_insert((0, 0));
        entry.0 += result.amount;
        entry.1 += 1;
    }

    let mut totals: Vec<TeacherCommissionTotal> = map
        .into_iter()
        .map(|(teacher_id, (total_amount, meeting_count))| TeacherCommissionTotal {
            teacher_id,
            teacher_name: teacher_names
                .get(&teacher_id)
                .cloned()
                .unwrap_or_else(|| teacher_id.to_string()),
            total_amount,
            meeting_count,
        })
        .collect();

    totals.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
    totals
}

pub fn build_report(
    scope: Option<&str>,
    today: NaiveDate,
    totals: &[TeacherCommissionTotal],
    reminders: &[StudentReminder],
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all classes");

    let _ = writeln!(output, "# Course Back Office Report");
    let _ = writeln!(output, "Generated for {} on {}", scope_label, today);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Teacher Commissions");

    if totals.is_empty() {
        let _ = writeln!(output, "No meetings with commissions in this scope.");
    } else {
        for total in totals.iter() {
            let _ = writeln!(
                output,
                "- {}: {} across {} meetings",
                total.teacher_name,
                format_amount(total.total_amount),
                total.meeting_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Payment Reminders Due");

    let due: Vec<&StudentReminder> = reminders
        .iter()
        .filter(|entry| entry.decision.should_show_reminder)
        .collect();

    if due.is_empty() {
        let _ = writeln!(output, "No students due for a reminder.");
    } else {
        for entry in due {
            let _ = writeln!(
                output,
                "- {} ({}, {}): {}",
                entry.student.full_name,
                entry.student.email,
                entry.student.class_name,
                entry.decision.reason
            );
        }
    }

    let mut outstanding: Vec<&StudentReminder> = reminders
        .iter()
        .filter(|entry| entry.decision.remaining_amount > 0)
        .collect();
    outstanding.sort_by(|a, b| {
        b.decision
            .remaining_amount
            .cmp(&a.decision.remaining_amount)
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Outstanding Balances");

    if outstanding.is_empty() {
        let _ = writeln!(output, "No outstanding balances.");
    } else {
        for entry in outstanding.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}): {} outstanding",
                entry.student.full_name,
                entry.student.class_name,
                format_amount(entry.decision.remaining_amount)
            );
        }
    }

    output
}
