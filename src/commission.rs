use uuid::Uuid;

use crate::currency::format_amount;
use crate::error::EngineError;
use crate::models::{AttendanceRecord, CommissionResult, CommissionType, Meeting};

/// Computes the commission owed for one meeting from its attendance roster
/// and the class's policy.
///
/// Pure and deterministic: same roster and policy always produce the same
/// amount. A negative `amount` is rejected before any computation; the
/// roster may be empty.
pub fn calculate_commission(
    kind: CommissionType,
    amount: i64,
    attendance: &[AttendanceRecord],
) -> Result<CommissionResult, EngineError> {
    if amount < 0 {
        return Err(EngineError::InvalidAmount { amount });
    }

    let eligible = attendance
        .iter()
        .filter(|record| record.status.is_commission_eligible())
        .count();

    if eligible == 0 {
        return Ok(CommissionResult {
            amount: 0,
            breakdown: "no students present or late".to_string(),
            eligible_student_count: 0,
        });
    }

    let result = match kind {
        CommissionType::ByClass => CommissionResult {
            amount,
            breakdown: format!("flat {} for the meeting", format_amount(amount)),
            eligible_student_count: eligible,
        },
        CommissionType::ByStudent => {
            let total = amount * eligible as i64;
            CommissionResult {
                amount: total,
                breakdown: format!(
                    "{} x {} = {}",
                    eligible,
                    format_amount(amount),
                    format_amount(total)
                ),
                eligible_student_count: eligible,
            }
        }
    };

    Ok(result)
}

/// Short roster summary for command output, e.g. `2 present, 1 late, 1 absent`.
pub fn roster_summary(attendance: &[AttendanceRecord]) -> String {
    use crate::models::AttendanceStatus;

    let order = [
        AttendanceStatus::Present,
        AttendanceStatus::Late,
        AttendanceStatus::Absent,
        AttendanceStatus::Excused,
    ];

    let parts: Vec<String> = order
        .iter()
        .filter_map(|status| {
            let count = attendance
                .iter()
                .filter(|record| record.status == *status)
                .count();
            (count > 0).then(|| format!("{count} {status}"))
        })
        .collect();

    if parts.is_empty() {
        "empty roster".to_string()
    } else {
        parts.join(", ")
    }
}

/// Which teacher is credited with a meeting's commission.
///
/// Priority: substitute assigned to the meeting, then an actual-teacher
/// override recorded on it, then the class's permanent teacher. Every
/// aggregation of commissions must go through this so a meeting is never
/// credited twice or to the wrong teacher.
pub fn credited_teacher(meeting: &Meeting) -> Uuid {
    meeting
        .substitute_teacher
        .or(meeting.actual_teacher)
        .unwrap_or(meeting.primary_teacher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;
    use chrono::NaiveDate;

    fn roster(statuses: &[AttendanceStatus]) -> Vec<AttendanceRecord> {
        statuses
            .iter()
            .map(|status| AttendanceRecord {
                id: Uuid::new_v4(),
                student_id: Uuid::new_v4(),
                status: *status,
                note: None,
            })
            .collect()
    }

    fn sample_meeting() -> Meeting {
        Meeting {
            id: Uuid::new_v4(),
            class_name: "Tahsin Foundation".to_string(),
            meeting_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            primary_teacher: Uuid::new_v4(),
            substitute_teacher: None,
            actual_teacher: None,
        }
    }

    #[test]
    fn by_class_pays_flat_regardless_of_roster_size() {
        use AttendanceStatus::*;
        let records = roster(&[Present, Absent, Late]);
        let result = calculate_commission(CommissionType::ByClass, 100_000, &records).unwrap();
        assert_eq!(result.amount, 100_000);
        assert_eq!(result.eligible_student_count, 2);

        let bigger = roster(&[Present, Present, Present, Late, Late]);
        let again = calculate_commission(CommissionType::ByClass, 100_000, &bigger).unwrap();
        assert_eq!(again.amount, 100_000);
    }

    #[test]
    fn by_student_pays_per_eligible_attendee() {
        use AttendanceStatus::*;
        let records = roster(&[Present, Present, Late, Excused]);
        let result = calculate_commission(CommissionType::ByStudent, 15_000, &records).unwrap();
        assert_eq!(result.amount, 45_000);
        assert_eq!(result.eligible_student_count, 3);
        assert_eq!(result.breakdown, "3 x Rp15.000 = Rp45.000");
    }

    #[test]
    fn by_student_is_proportional_to_eligible_count() {
        use AttendanceStatus::*;
        let one = calculate_commission(CommissionType::ByStudent, 15_000, &roster(&[Present]))
            .unwrap();
        let four = calculate_commission(
            CommissionType::ByStudent,
            15_000,
            &roster(&[Present, Late, Present, Late]),
        )
        .unwrap();
        assert_eq!(four.amount, 4 * one.amount);
    }

    #[test]
    fn no_eligible_students_yields_zero_for_both_policies() {
        use AttendanceStatus::*;
        let records = roster(&[Absent, Excused]);
        for kind in [CommissionType::ByClass, CommissionType::ByStudent] {
            let result = calculate_commission(kind, 15_000, &records).unwrap();
            assert_eq!(result.amount, 0);
            assert_eq!(result.eligible_student_count, 0);
            assert_eq!(result.breakdown, "no students present or late");
        }
    }

    #[test]
    fn empty_roster_yields_zero() {
        let result = calculate_commission(CommissionType::ByClass, 100_000, &[]).unwrap();
        assert_eq!(result.amount, 0);
        assert_eq!(result.breakdown, "no students present or late");
    }

    #[test]
    fn negative_amount_is_rejected_before_any_calculation() {
        let err = calculate_commission(CommissionType::ByClass, -1, &[]).unwrap_err();
        assert_eq!(err, EngineError::InvalidAmount { amount: -1 });
    }

    #[test]
    fn roster_summary_lists_counts_in_a_fixed_order() {
        use AttendanceStatus::*;
        let records = roster(&[Absent, Present, Present, Late]);
        assert_eq!(roster_summary(&records), "2 present, 1 late, 1 absent");
        assert_eq!(roster_summary(&[]), "empty roster");
    }

    #[test]
    fn substitute_teacher_outranks_everyone() {
        let mut meeting = sample_meeting();
        let substitute = Uuid::new_v4();
        let actual = Uuid::new_v4();
        meeting.substitute_teacher = Some(substitute);
        meeting.actual_teacher = Some(actual);
        assert_eq!(credited_teacher(&meeting), substitute);
    }

    #[test]
    fn actual_teacher_override_outranks_primary() {
        let mut meeting = sample_meeting();
        let actual = Uuid::new_v4();
        meeting.actual_teacher = Some(actual);
        assert_eq!(credited_teacher(&meeting), actual);
    }

    #[test]
    fn primary_teacher_is_the_fallback() {
        let meeting = sample_meeting();
        assert_eq!(credited_teacher(&meeting), meeting.primary_teacher);
    }
}
