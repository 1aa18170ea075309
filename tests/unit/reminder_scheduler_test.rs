// Reminder scheduling decisions
//
// Scenario C: sent 8 days ago, one reminder so far, cooldown clear
//             -> second auto-reminder.
// Scenario D: past due with five reminders -> excluded (cap reached).

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use invoice_ledger::core::Currency;
use invoice_ledger::invoices::models::{CreateInvoiceRequest, CreateLineItemRequest};
use invoice_ledger::invoices::{Invoice, InvoiceStatus};
use invoice_ledger::middleware::Owner;
use invoice_ledger::reminders::models::{ReminderDecision, ReminderDenial, ReminderTrigger};
use invoice_ledger::reminders::{ReminderPolicy, ReminderType};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap()
}

fn sent_invoice(sent_days_ago: i64, due_date: NaiveDate) -> Invoice {
    let owner = Owner {
        id: "owner-1".to_string(),
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
    };
    let request = CreateInvoiceRequest {
        invoice_number: None,
        client_name: "Acme".to_string(),
        client_email: "billing@acme.test".to_string(),
        currency: Currency::USD,
        tax_rate_bps: 0,
        due_date,
        notes: None,
        allow_partial_payments: false,
        minimum_payment_amount: None,
        auto_remind: true,
        milestone_id: None,
        line_items: vec![CreateLineItemRequest {
            description: "Work".to_string(),
            quantity: 1,
            unit_price: 10_000,
        }],
    };
    let sent_at = now() - Duration::days(sent_days_ago);
    let mut inv = Invoice::new(&owner, request, sent_at).unwrap();
    inv.sent_at = Some(sent_at);
    inv.status = if due_date < now().date_naive() {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Sent
    };
    inv
}

fn not_yet_due() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 30).unwrap()
}

fn long_past_due() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

#[test]
fn test_scenario_c_second_auto_reminder() {
    let mut inv = sent_invoice(8, not_yet_due());
    inv.reminder_count = 1;
    inv.last_reminder_at = Some(now() - Duration::days(5));

    let decision = ReminderPolicy::default().evaluate(&inv, now(), ReminderTrigger::Sweep);
    assert_eq!(decision, ReminderDecision::Send(ReminderType::SecondAuto));
}

#[test]
fn test_scenario_d_overdue_cap_excludes_invoice() {
    let mut inv = sent_invoice(30, long_past_due());
    inv.reminder_count = 5;
    inv.last_reminder_at = Some(now() - Duration::days(3));

    let decision = ReminderPolicy::default().evaluate(&inv, now(), ReminderTrigger::Sweep);
    assert_eq!(decision, ReminderDecision::Deny(ReminderDenial::NothingDue));
}

#[test]
fn test_first_auto_reminder_after_three_days() {
    let too_early = sent_invoice(2, not_yet_due());
    assert_eq!(
        ReminderPolicy::default().evaluate(&too_early, now(), ReminderTrigger::Sweep),
        ReminderDecision::Deny(ReminderDenial::NothingDue)
    );

    let due = sent_invoice(3, not_yet_due());
    assert_eq!(
        ReminderPolicy::default().evaluate(&due, now(), ReminderTrigger::Sweep),
        ReminderDecision::Send(ReminderType::FirstAuto)
    );
}

#[test]
fn test_overdue_bucket_below_cap() {
    let mut inv = sent_invoice(30, long_past_due());
    inv.reminder_count = 3;
    inv.last_reminder_at = Some(now() - Duration::days(2));

    assert_eq!(
        ReminderPolicy::default().evaluate(&inv, now(), ReminderTrigger::Sweep),
        ReminderDecision::Send(ReminderType::Overdue)
    );
}

#[test]
fn test_cooldown_denies_with_hours_remaining() {
    let mut inv = sent_invoice(10, not_yet_due());
    inv.last_reminder_at = Some(now() - Duration::hours(20) - Duration::minutes(30));

    assert_eq!(
        ReminderPolicy::default().evaluate(&inv, now(), ReminderTrigger::Manual),
        ReminderDecision::Deny(ReminderDenial::Cooldown { hours_remaining: 4 })
    );

    inv.last_reminder_at = Some(now() - Duration::hours(24));
    assert_eq!(
        ReminderPolicy::default().evaluate(&inv, now(), ReminderTrigger::Manual),
        ReminderDecision::Send(ReminderType::Manual)
    );
}

#[test]
fn test_sweep_respects_auto_remind_flag_but_manual_does_not() {
    let mut inv = sent_invoice(10, not_yet_due());
    inv.auto_remind = false;

    assert_eq!(
        ReminderPolicy::default().evaluate(&inv, now(), ReminderTrigger::Sweep),
        ReminderDecision::Deny(ReminderDenial::AutoRemindDisabled)
    );
    assert_eq!(
        ReminderPolicy::default().evaluate(&inv, now(), ReminderTrigger::Manual),
        ReminderDecision::Send(ReminderType::Manual)
    );
}

#[test]
fn test_paid_and_draft_invoices_take_no_reminders() {
    let mut paid = sent_invoice(10, not_yet_due());
    paid.status = InvoiceStatus::Paid;
    assert_eq!(
        ReminderPolicy::default().evaluate(&paid, now(), ReminderTrigger::Manual),
        ReminderDecision::Deny(ReminderDenial::NotRemindable(InvoiceStatus::Paid))
    );

    let mut draft = sent_invoice(10, not_yet_due());
    draft.sent_at = None;
    draft.status = InvoiceStatus::Draft;
    assert_eq!(
        ReminderPolicy::default().evaluate(&draft, now(), ReminderTrigger::Manual),
        ReminderDecision::Deny(ReminderDenial::NotRemindable(InvoiceStatus::Draft))
    );
}
