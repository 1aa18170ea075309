// Concurrent writers on one invoice
//
// Payments and reminders on the same invoice are serialized by the unit of
// work: concurrent payments can never overpay, and concurrent reminders can
// never both pass the cooldown.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::Arc;

use helpers::*;
use invoice_ledger::core::AppError;
use invoice_ledger::invoices::InvoiceStatus;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_close_invoice_exactly() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;

    let mut handles = Vec::new();
    for _ in 0..15 {
        let payments = Arc::clone(&harness.services.payments);
        let invoice_id = invoice.id.clone();
        handles.push(tokio::spawn(async move {
            payments
                .record_payment(&owner().id, &invoice_id, staff_payment(1_000))
                .await
        }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(AppError::InvalidState(_)) | Err(AppError::PolicyViolation(_)) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(rejected, 5);

    let stored = harness.stored(&invoice.id).await;
    assert_eq!(harness.ledger_sum(&invoice.id).await, 10_000);
    assert_eq!(stored.amount_paid, 10_000);
    assert_eq!(stored.status, InvoiceStatus::Paid);
    assert_eq!(harness.dispatcher.full_receipts(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_payments_that_together_settle_both_count() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;

    let a = {
        let payments = Arc::clone(&harness.services.payments);
        let id = invoice.id.clone();
        tokio::spawn(async move { payments.record_payment(&owner().id, &id, staff_payment(4_000)).await })
    };
    let b = {
        let payments = Arc::clone(&harness.services.payments);
        let id = invoice.id.clone();
        tokio::spawn(async move { payments.record_payment(&owner().id, &id, staff_payment(6_000)).await })
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(harness.stored(&invoice.id).await.status, InvoiceStatus::Paid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replays_of_one_external_ref_record_once() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let payments = Arc::clone(&harness.services.payments);
        let invoice_id = invoice.id.clone();
        handles.push(tokio::spawn(async move {
            payments
                .record_processor_payment(&invoice_id, processor_payment(2_500, "ch_race"))
                .await
        }));
    }

    let mut fresh = 0;
    for handle in handles {
        if !handle.await.unwrap().unwrap().duplicate {
            fresh += 1;
        }
    }

    assert_eq!(fresh, 1);
    assert_eq!(harness.ledger_sum(&invoice.id).await, 2_500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_manual_reminders_send_once() {
    let harness = TestHarness::new();
    let invoice = harness.sent_invoice(InvoiceBuilder::new()).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let reminders = Arc::clone(&harness.services.reminders);
        let invoice_id = invoice.id.clone();
        handles.push(tokio::spawn(async move {
            reminders.request_reminder(&owner().id, &invoice_id, None).await
        }));
    }

    let mut sent = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => sent += 1,
            Err(AppError::RateLimited { .. }) => limited += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(sent, 1);
    assert_eq!(limited, 5);
    assert_eq!(harness.dispatcher.reminders().len(), 1);
    assert_eq!(harness.stored(&invoice.id).await.reminder_count, 1);
}
