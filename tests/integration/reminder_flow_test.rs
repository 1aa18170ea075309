// Manual reminders, the escalation sweep and dispatch failures

#[path = "../helpers/mod.rs"]
mod helpers;

use chrono::Duration;
use helpers::*;
use invoice_ledger::core::AppError;
use invoice_ledger::invoices::InvoiceStatus;
use invoice_ledger::reminders::ReminderType;

#[tokio::test]
async fn test_manual_reminder_cooldown() {
    let harness = TestHarness::new();
    let invoice = harness.sent_invoice(InvoiceBuilder::new()).await;
    let reminders = &harness.services.reminders;

    let first = reminders
        .request_reminder(&owner().id, &invoice.id, Some("Friendly nudge".to_string()))
        .await
        .unwrap();
    assert_eq!(first.reminder_type, ReminderType::Manual);
    assert_eq!(first.recipient_email, "billing@acme.test");

    harness.advance(Duration::hours(10));
    let err = reminders
        .request_reminder(&owner().id, &invoice.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RateLimited { hours_remaining: 14 }));

    harness.advance(Duration::hours(14));
    reminders
        .request_reminder(&owner().id, &invoice.id, None)
        .await
        .unwrap();

    let stored = harness.stored(&invoice.id).await;
    assert_eq!(stored.reminder_count, 2);
    assert_eq!(stored.last_reminder_at, Some(harness.now()));

    let history = reminders.list_reminders(&owner().id, &invoice.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].custom_message.as_deref(), Some("Friendly nudge"));
}

#[tokio::test]
async fn test_reminder_notice_carries_balance_and_link() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;
    harness.pay(&invoice.id, 2_500).await.unwrap();

    harness
        .services
        .reminders
        .request_reminder(&owner().id, &invoice.id, None)
        .await
        .unwrap();

    let notice = harness.dispatcher.reminders().pop().unwrap();
    assert_eq!(notice.remaining_balance, "USD 75.00");
    assert!(notice.is_partially_paid);
    assert_eq!(notice.days_overdue, None);
    let token = harness.stored(&invoice.id).await.access_token.unwrap();
    assert_eq!(
        notice.public_url,
        Some(format!("{}/public/invoices/{}", PUBLIC_BASE_URL, token))
    );
}

#[tokio::test]
async fn test_reminders_refused_for_draft_and_paid_invoices() {
    let harness = TestHarness::new();
    let reminders = &harness.services.reminders;

    let draft = harness.draft_invoice(InvoiceBuilder::new()).await;
    let err = reminders.request_reminder(&owner().id, &draft.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let paid = harness.sent_invoice(InvoiceBuilder::new().total(10_000)).await;
    harness.pay(&paid.id, 10_000).await.unwrap();
    let err = reminders.request_reminder(&owner().id, &paid.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_custom_message_over_limit_is_rejected() {
    let harness = TestHarness::new();
    let invoice = harness.sent_invoice(InvoiceBuilder::new()).await;

    let err = harness
        .services
        .reminders
        .request_reminder(&owner().id, &invoice.id, Some("x".repeat(501)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(harness.dispatcher.reminders().is_empty());
}

#[tokio::test]
async fn test_failed_dispatch_records_nothing_and_keeps_cooldown_free() {
    let harness = TestHarness::new();
    let invoice = harness.sent_invoice(InvoiceBuilder::new()).await;
    let reminders = &harness.services.reminders;

    harness.dispatcher.fail_deliveries(true);
    let err = reminders
        .request_reminder(&owner().id, &invoice.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)));

    let stored = harness.stored(&invoice.id).await;
    assert_eq!(stored.reminder_count, 0);
    assert_eq!(stored.last_reminder_at, None);
    assert!(reminders
        .list_reminders(&owner().id, &invoice.id)
        .await
        .unwrap()
        .is_empty());

    harness.dispatcher.fail_deliveries(false);
    reminders
        .request_reminder(&owner().id, &invoice.id, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_sweep_escalation_timeline() {
    let harness = TestHarness::new();
    let invoice = harness.sent_invoice(InvoiceBuilder::new()).await;
    let reminders = &harness.services.reminders;

    // Day 3: first auto-reminder
    harness.advance(Duration::days(3));
    let report = reminders.run_reminder_sweep().await.unwrap();
    assert_eq!(report.sent.len(), 1);
    assert_eq!(report.sent[0].reminder_type, ReminderType::FirstAuto);

    // Day 4: nothing due
    harness.advance(Duration::days(1));
    let report = reminders.run_reminder_sweep().await.unwrap();
    assert!(report.sent.is_empty());
    assert_eq!(report.skipped, 1);

    // Day 7: second auto-reminder
    harness.advance(Duration::days(3));
    let report = reminders.run_reminder_sweep().await.unwrap();
    assert_eq!(report.sent[0].reminder_type, ReminderType::SecondAuto);

    // Past the due date: overdue reminders until the cap of five
    harness.advance(Duration::days(24));
    for expected_count in 3..=5 {
        let report = reminders.run_reminder_sweep().await.unwrap();
        assert_eq!(report.sent[0].reminder_type, ReminderType::Overdue);
        assert_eq!(harness.stored(&invoice.id).await.reminder_count, expected_count);
        harness.advance(Duration::days(1));
    }

    let report = reminders.run_reminder_sweep().await.unwrap();
    assert!(report.sent.is_empty());
    assert_eq!(harness.stored(&invoice.id).await.reminder_count, 5);
    assert_eq!(harness.dispatcher.reminders().len(), 5);
}

#[tokio::test]
async fn test_sweep_refreshes_status_even_when_nothing_is_sent() {
    let harness = TestHarness::new();
    let invoice = harness.sent_invoice(InvoiceBuilder::new()).await;

    // Manual reminder on the due date itself
    harness.clock.set(start_time() + Duration::days(30) + Duration::hours(11));
    harness
        .services
        .reminders
        .request_reminder(&owner().id, &invoice.id, None)
        .await
        .unwrap();
    assert_eq!(harness.stored(&invoice.id).await.status, InvoiceStatus::Sent);

    // Due date has passed, cooldown still running
    harness.advance(Duration::hours(5));
    let report = harness.services.reminders.run_reminder_sweep().await.unwrap();

    assert!(report.sent.is_empty());
    assert_eq!(report.skipped, 1);
    let stored = harness.stored(&invoice.id).await;
    assert_eq!(stored.status, InvoiceStatus::Overdue);
    assert_eq!(stored.reminder_count, 1);
}

#[tokio::test]
async fn test_sweep_skips_auto_remind_disabled_and_counts_failures() {
    let harness = TestHarness::new();
    let quiet = harness
        .sent_invoice(InvoiceBuilder::new().auto_remind(false))
        .await;
    let loud = harness.sent_invoice(InvoiceBuilder::new()).await;

    harness.advance(Duration::days(3));
    harness.dispatcher.fail_deliveries(true);
    let report = harness.services.reminders.run_reminder_sweep().await.unwrap();

    assert_eq!(report.examined, 1);
    assert_eq!(report.failed, 1);
    assert!(report.sent.is_empty());
    assert_eq!(harness.stored(&loud.id).await.reminder_count, 0);
    assert_eq!(harness.stored(&quiet.id).await.reminder_count, 0);

    harness.dispatcher.fail_deliveries(false);
    let report = harness.services.reminders.run_reminder_sweep().await.unwrap();
    assert_eq!(report.sent.len(), 1);
    assert_eq!(report.sent[0].invoice_id, loud.id);
}
