use chrono::NaiveDate;

use crate::currency::format_amount;
use crate::models::{Payment, PaymentStatus, PaymentTransaction, ReminderDecision, ResetType};

/// Meetings after a reset checkpoint before the reminder becomes due again.
pub const REMINDER_CYCLE_MEETINGS: usize = 3;

/// Payments this recent always count as a reset, even when no meeting has
/// been recorded after them yet.
pub const PAYMENT_GRACE_DAYS: i64 = 7;

/// Decides whether a payment reminder should be surfaced for one student.
///
/// `today` is injected rather than read from the system clock: the 7-day
/// grace window is evaluated against it, so re-running the evaluator on
/// another day can change the outcome for the same stored data. Callers
/// pass `Utc::now().date_naive()` once at the edge; tests pin a date.
///
/// `meeting_dates` is the student's full attendance history, any status.
/// This counts activity, not presence, and is independent of commission
/// eligibility.
pub fn evaluate_reminder(
    payment: Option<&Payment>,
    transactions: &[PaymentTransaction],
    meeting_dates: &[NaiveDate],
    today: NaiveDate,
) -> ReminderDecision {
    let total_meetings = meeting_dates.len();

    let not_due = |reason: String, remaining: i64| ReminderDecision {
        should_show_reminder: false,
        reason,
        total_meetings,
        meetings_since_reset: 0,
        last_reset_date: None,
        reset_type: None,
        remaining_amount: remaining,
    };

    let Some(payment) = payment else {
        return not_due("no payment record on file".to_string(), 0);
    };
    if payment.status == PaymentStatus::Completed {
        return not_due(
            "payment already completed".to_string(),
            payment.remaining_amount,
        );
    }
    if payment.remaining_amount <= 0 {
        return not_due(
            "no outstanding balance".to_string(),
            payment.remaining_amount,
        );
    }

    let first_meeting = meeting_dates.iter().min().copied();
    let reset = latest_reset(payment, transactions, first_meeting, today);

    let meetings_since_reset = match reset {
        Some((reset_date, _)) => meeting_dates
            .iter()
            .filter(|date| **date > reset_date)
            .count(),
        None => total_meetings,
    };

    // No meetings at all means nothing can be due yet, whatever the
    // checkpoint situation looks like.
    let Some(first_meeting) = first_meeting else {
        return ReminderDecision {
            should_show_reminder: false,
            reason: "no meetings recorded yet, next reminder at meeting 1".to_string(),
            total_meetings,
            meetings_since_reset,
            last_reset_date: reset.map(|(date, _)| date),
            reset_type: reset.map(|(_, reset_type)| reset_type),
            remaining_amount: payment.remaining_amount,
        };
    };

    let (should_show_reminder, reason) = match reset {
        None => (
            true,
            format!(
                "{} outstanding, reminder active since first meeting on {first_meeting}",
                format_amount(payment.remaining_amount),
            ),
        ),
        Some((reset_date, reset_type)) => {
            if meetings_since_reset == 0 {
                (
                    false,
                    format!("cycle reset by {reset_type} on {reset_date}, no meetings since"),
                )
            } else if meetings_since_reset >= REMINDER_CYCLE_MEETINGS {
                (
                    true,
                    format!(
                        "{} meetings since {} reset on {}, {} outstanding",
                        meetings_since_reset,
                        reset_type,
                        reset_date,
                        format_amount(payment.remaining_amount),
                    ),
                )
            } else {
                let left = REMINDER_CYCLE_MEETINGS - meetings_since_reset;
                let noun = if left == 1 { "meeting" } else { "meetings" };
                (
                    false,
                    format!(
                        "cycle reset by {reset_type} on {reset_date}, {left} more {noun} until next reminder"
                    ),
                )
            }
        }
    };

    ReminderDecision {
        should_show_reminder,
        reason,
        total_meetings,
        meetings_since_reset,
        last_reset_date: reset.map(|(date, _)| date),
        reset_type: reset.map(|(_, reset_type)| reset_type),
        remaining_amount: payment.remaining_amount,
    }
}

/// The most recent reset checkpoint, if any.
///
/// A transaction resets the cycle when it lands strictly after the first
/// recorded meeting, or within the grace window of `today`; payments that
/// predate the first meeting and are older than the window are too old to
/// count. A dismissal resets unconditionally. On a tie the payment reset
/// wins; dismissal only when strictly more recent.
fn latest_reset(
    payment: &Payment,
    transactions: &[PaymentTransaction],
    first_meeting: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<(NaiveDate, ResetType)> {
    let payment_reset = transactions
        .iter()
        .filter(|tx| {
            let after_first = first_meeting.is_some_and(|first| tx.payment_date > first);
            let within_grace = (today - tx.payment_date).num_days() <= PAYMENT_GRACE_DAYS;
            after_first || within_grace
        })
        .map(|tx| tx.payment_date)
        .max();

    match (payment_reset, payment.reminder_dismissed_at) {
        (Some(paid), Some(dismissed)) if dismissed > paid => {
            Some((dismissed, ResetType::Dismissal))
        }
        (Some(paid), _) => Some((paid, ResetType::Payment)),
        (None, Some(dismissed)) => Some((dismissed, ResetType::Dismissal)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_payment(remaining: i64) -> Payment {
        Payment {
            student_id: Uuid::new_v4(),
            total_amount: 1_000_000,
            paid_amount: 1_000_000 - remaining,
            remaining_amount: remaining,
            status: PaymentStatus::Partial,
            reminder_dismissed_at: None,
            reminder_dismissed_by: None,
        }
    }

    fn tx(payment_date: NaiveDate) -> PaymentTransaction {
        PaymentTransaction {
            payment_id: Uuid::new_v4(),
            amount: 250_000,
            payment_date,
            note: None,
        }
    }

    fn today() -> NaiveDate {
        date(2026, 3, 10)
    }

    #[test]
    fn no_payment_record_never_reminds() {
        let meetings = vec![date(2026, 2, 2), date(2026, 2, 9)];
        let decision = evaluate_reminder(None, &[], &meetings, today());
        assert!(!decision.should_show_reminder);
        assert_eq!(decision.reason, "no payment record on file");
    }

    #[test]
    fn completed_payment_never_reminds() {
        let mut payment = open_payment(0);
        payment.status = PaymentStatus::Completed;
        let meetings: Vec<NaiveDate> = (1..=20).map(|d| date(2026, 1, d)).collect();
        let decision = evaluate_reminder(Some(&payment), &[], &meetings, today());
        assert!(!decision.should_show_reminder);
        assert_eq!(decision.reason, "payment already completed");
    }

    #[test]
    fn zero_remaining_balance_never_reminds() {
        let payment = open_payment(0);
        let meetings = vec![date(2026, 2, 2), date(2026, 2, 9), date(2026, 2, 16)];
        let decision = evaluate_reminder(Some(&payment), &[], &meetings, today());
        assert!(!decision.should_show_reminder);
        assert_eq!(decision.reason, "no outstanding balance");
    }

    #[test]
    fn no_meetings_yet_never_reminds() {
        let payment = open_payment(500_000);
        let decision = evaluate_reminder(Some(&payment), &[], &[], today());
        assert!(!decision.should_show_reminder);
        assert_eq!(decision.total_meetings, 0);
        assert_eq!(
            decision.reason,
            "no meetings recorded yet, next reminder at meeting 1"
        );
    }

    #[test]
    fn active_continuously_from_the_first_meeting() {
        let payment = open_payment(500_000);
        let meetings = vec![date(2026, 2, 2)];
        let decision = evaluate_reminder(Some(&payment), &[], &meetings, today());
        assert!(decision.should_show_reminder);
        assert!(decision.reason.contains("active since first meeting"));
        assert!(decision.reason.contains("Rp500.000"));
        assert_eq!(decision.meetings_since_reset, 1);
        assert!(decision.last_reset_date.is_none());
    }

    #[test]
    fn stale_transactions_before_the_first_meeting_do_not_reset() {
        let payment = open_payment(400_000);
        // Paid the day before the first meeting, long outside the grace
        // window; four meetings follow.
        let transactions = vec![tx(date(2026, 2, 1))];
        let meetings = vec![
            date(2026, 2, 2),
            date(2026, 2, 9),
            date(2026, 2, 16),
            date(2026, 2, 23),
        ];
        let decision = evaluate_reminder(Some(&payment), &transactions, &meetings, today());
        assert!(decision.should_show_reminder);
        assert!(decision.last_reset_date.is_none());
        assert!(decision.reason.contains("active since first meeting"));
    }

    #[test]
    fn dismissal_starts_a_three_meeting_cycle() {
        let mut payment = open_payment(600_000);
        payment.reminder_dismissed_at = Some(date(2026, 2, 10));
        payment.reminder_dismissed_by = Some("admin".to_string());
        // Two meetings before the dismissal, two after.
        let meetings = vec![
            date(2026, 2, 2),
            date(2026, 2, 9),
            date(2026, 2, 16),
            date(2026, 2, 23),
        ];
        let decision = evaluate_reminder(Some(&payment), &[], &meetings, today());
        assert!(!decision.should_show_reminder);
        assert_eq!(decision.meetings_since_reset, 2);
        assert_eq!(decision.reset_type, Some(ResetType::Dismissal));
        assert!(decision.reason.contains("1 more meeting until next reminder"));
    }

    #[test]
    fn reminder_becomes_due_at_exactly_three_meetings_since_reset() {
        let mut payment = open_payment(600_000);
        payment.reminder_dismissed_at = Some(date(2026, 2, 1));
        let mut meetings = vec![date(2026, 2, 2), date(2026, 2, 9)];
        let not_yet = evaluate_reminder(Some(&payment), &[], &meetings, today());
        assert!(!not_yet.should_show_reminder);
        assert_eq!(not_yet.meetings_since_reset, 2);

        meetings.push(date(2026, 2, 16));
        let due = evaluate_reminder(Some(&payment), &[], &meetings, today());
        assert!(due.should_show_reminder);
        assert_eq!(due.meetings_since_reset, 3);
        assert!(due.reason.contains("Rp600.000"));
    }

    #[test]
    fn reminder_stays_due_beyond_three_meetings() {
        let mut payment = open_payment(600_000);
        payment.reminder_dismissed_at = Some(date(2026, 1, 1));
        let meetings: Vec<NaiveDate> = (1..=5).map(|week| date(2026, 2, week * 5)).collect();
        let decision = evaluate_reminder(Some(&payment), &[], &meetings, today());
        assert!(decision.should_show_reminder);
        assert_eq!(decision.meetings_since_reset, 5);
    }

    #[test]
    fn checkpoint_with_no_meetings_after_it_is_not_due() {
        let payment = open_payment(300_000);
        // Paid after the most recent meeting.
        let transactions = vec![tx(date(2026, 2, 20))];
        let meetings = vec![date(2026, 2, 2), date(2026, 2, 9), date(2026, 2, 16)];
        let decision = evaluate_reminder(Some(&payment), &transactions, &meetings, today());
        assert!(!decision.should_show_reminder);
        assert_eq!(decision.meetings_since_reset, 0);
        assert_eq!(decision.reset_type, Some(ResetType::Payment));
        assert!(decision.reason.contains("no meetings since"));
    }

    #[test]
    fn recent_payment_within_grace_window_resets_even_before_meetings_catch_up() {
        let payment = open_payment(300_000);
        // All meetings happened before this payment; the payment is 3 days
        // old, inside the grace window.
        let transactions = vec![tx(date(2026, 3, 7))];
        let meetings = vec![date(2026, 2, 2), date(2026, 2, 9), date(2026, 2, 16)];
        let decision = evaluate_reminder(Some(&payment), &transactions, &meetings, today());
        assert!(!decision.should_show_reminder);
        assert_eq!(decision.last_reset_date, Some(date(2026, 3, 7)));
    }

    #[test]
    fn grace_window_includes_day_seven_but_not_day_eight() {
        // Both transactions predate the first meeting, so only the grace
        // window can make them count.
        let meetings = vec![date(2026, 3, 5)];
        let payment = open_payment(300_000);

        let seven_days_old = vec![tx(date(2026, 3, 3))];
        let decision = evaluate_reminder(Some(&payment), &seven_days_old, &meetings, today());
        assert_eq!(decision.last_reset_date, Some(date(2026, 3, 3)));

        let eight_days_old = vec![tx(date(2026, 3, 2))];
        let decision = evaluate_reminder(Some(&payment), &eight_days_old, &meetings, today());
        assert!(decision.last_reset_date.is_none());
        assert!(decision.should_show_reminder);
    }

    #[test]
    fn payment_reset_wins_ties_with_dismissal() {
        let mut payment = open_payment(300_000);
        payment.reminder_dismissed_at = Some(date(2026, 2, 10));
        let transactions = vec![tx(date(2026, 2, 10))];
        let meetings = vec![date(2026, 2, 2)];
        let decision = evaluate_reminder(Some(&payment), &transactions, &meetings, today());
        assert_eq!(decision.reset_type, Some(ResetType::Payment));
        assert_eq!(decision.last_reset_date, Some(date(2026, 2, 10)));
    }

    #[test]
    fn strictly_later_dismissal_wins_over_payment_reset() {
        let mut payment = open_payment(300_000);
        payment.reminder_dismissed_at = Some(date(2026, 2, 12));
        let transactions = vec![tx(date(2026, 2, 10))];
        let meetings = vec![date(2026, 2, 2)];
        let decision = evaluate_reminder(Some(&payment), &transactions, &meetings, today());
        assert_eq!(decision.reset_type, Some(ResetType::Dismissal));
        assert_eq!(decision.last_reset_date, Some(date(2026, 2, 12)));
    }

    #[test]
    fn recent_payment_with_no_meetings_still_records_the_checkpoint() {
        let payment = open_payment(300_000);
        let transactions = vec![tx(date(2026, 3, 8))];
        let decision = evaluate_reminder(Some(&payment), &transactions, &[], today());
        assert!(!decision.should_show_reminder);
        assert_eq!(decision.reset_type, Some(ResetType::Payment));
        assert_eq!(
            decision.reason,
            "no meetings recorded yet, next reminder at meeting 1"
        );
    }

    #[test]
    fn reason_is_always_populated() {
        let payment = open_payment(100_000);
        let cases = [
            evaluate_reminder(None, &[], &[], today()),
            evaluate_reminder(Some(&payment), &[], &[], today()),
            evaluate_reminder(Some(&payment), &[], &[date(2026, 2, 2)], today()),
        ];
        for decision in cases {
            assert!(!decision.reason.is_empty());
        }
    }
}
