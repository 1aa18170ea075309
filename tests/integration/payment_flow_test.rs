// Payment recording end to end on the in-memory store
//
// Covers the ledger/status invariants, both partial-payment scenarios,
// idempotent processor deliveries, notifications and milestone unlocking.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::*;
use invoice_ledger::core::AppError;
use invoice_ledger::invoices::InvoiceStatus;
use invoice_ledger::payments::models::PaymentMethod;
use invoice_ledger::payments::services::PaymentRejection;
use invoice_ledger::payments::PaymentSource;

#[tokio::test]
async fn test_scenario_a_partial_disabled_then_full_payment() {
    let harness = TestHarness::new();
    let invoice = harness.sent_invoice(InvoiceBuilder::new().total(10_000)).await;

    let err = harness.pay(&invoice.id, 5_000).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::PolicyViolation(PaymentRejection::PartialNotAllowed { .. })
    ));
    assert_eq!(harness.ledger_sum(&invoice.id).await, 0);

    let outcome = harness.pay(&invoice.id, 10_000).await.unwrap();
    assert_eq!(outcome.invoice.status, InvoiceStatus::Paid);
    assert_eq!(outcome.invoice.remaining_balance(), 0);

    let stored = harness.stored(&invoice.id).await;
    assert_eq!(stored.status, InvoiceStatus::Paid);
    assert_eq!(stored.amount_paid, 10_000);
    assert_eq!(stored.paid_at, Some(harness.now()));
    assert_eq!(stored.payment_method.as_deref(), Some("bank_transfer"));
}

#[tokio::test]
async fn test_scenario_b_minimum_and_final_top_up() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(Some(2_000)))
        .await;

    let err = harness.pay(&invoice.id, 1_000).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::PolicyViolation(PaymentRejection::BelowMinimum { .. })
    ));

    let first = harness.pay(&invoice.id, 9_000).await.unwrap();
    assert_eq!(first.invoice.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(first.invoice.remaining_balance(), 1_000);

    // Below the minimum, but exactly what is left
    let last = harness.pay(&invoice.id, 1_000).await.unwrap();
    assert_eq!(last.invoice.status, InvoiceStatus::Paid);
    assert_eq!(harness.ledger_sum(&invoice.id).await, 10_000);
}

#[tokio::test]
async fn test_cached_paid_amount_matches_ledger_after_each_payment() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;

    for amount in [1_000, 2_500, 500, 6_000] {
        harness.pay(&invoice.id, amount).await.unwrap();
        let stored = harness.stored(&invoice.id).await;
        assert_eq!(stored.amount_paid, harness.ledger_sum(&invoice.id).await);
        assert!(stored.remaining_balance() >= 0);
    }

    assert_eq!(harness.stored(&invoice.id).await.status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn test_overpayment_and_payment_on_paid_invoice_are_rejected() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;

    let err = harness.pay(&invoice.id, 10_001).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::PolicyViolation(PaymentRejection::ExceedsBalance { .. })
    ));

    harness.pay(&invoice.id, 10_000).await.unwrap();
    let err = harness.pay(&invoice.id, 1).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(harness.ledger_sum(&invoice.id).await, 10_000);
}

#[tokio::test]
async fn test_draft_invoice_does_not_accept_payments() {
    let harness = TestHarness::new();
    let draft = harness.draft_invoice(InvoiceBuilder::new()).await;

    let err = harness.pay(&draft.id, 10_000).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_replayed_external_ref_records_once() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;
    let payments = &harness.services.payments;

    let first = payments
        .record_processor_payment(&invoice.id, processor_payment(4_000, "ch_123"))
        .await
        .unwrap();
    assert!(!first.duplicate);

    let second = payments
        .record_processor_payment(&invoice.id, processor_payment(4_000, "ch_123"))
        .await
        .unwrap();
    assert!(second.duplicate);
    assert_eq!(second.payment.id, first.payment.id);

    assert_eq!(harness.ledger_sum(&invoice.id).await, 4_000);
    assert_eq!(harness.dispatcher.partial_receipts(), 1);
}

#[tokio::test]
async fn test_replay_with_different_amount_is_rejected() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;
    let payments = &harness.services.payments;

    payments
        .record_processor_payment(&invoice.id, processor_payment(4_000, "ch_123"))
        .await
        .unwrap();

    let err = payments
        .record_processor_payment(&invoice.id, processor_payment(6_000, "ch_123"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(harness.ledger_sum(&invoice.id).await, 4_000);
}

#[tokio::test]
async fn test_external_ref_is_scoped_to_its_invoice() {
    let harness = TestHarness::new();
    let one = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;
    let two = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;
    let payments = &harness.services.payments;

    payments
        .record_processor_payment(&one.id, processor_payment(1_000, "ch_shared"))
        .await
        .unwrap();

    let outcome = payments
        .record_processor_payment(&two.id, processor_payment(1_000, "ch_shared"))
        .await
        .unwrap();
    assert!(!outcome.duplicate);
    assert_eq!(harness.ledger_sum(&one.id).await, 1_000);
    assert_eq!(harness.ledger_sum(&two.id).await, 1_000);
}

#[tokio::test]
async fn test_client_cannot_claim_processor_reference() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;
    let token = invoice.access_token.clone().unwrap();
    let payments = &harness.services.payments;

    let mut claimed = processor_payment(100, "ch_real");
    claimed.source = PaymentSource::Client;
    let err = payments
        .record_public_payment(&token, claimed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(harness.ledger_sum(&invoice.id).await, 0);

    // The real charge still lands in full
    let outcome = payments
        .record_processor_payment(&invoice.id, processor_payment(10_000, "ch_real"))
        .await
        .unwrap();
    assert!(!outcome.duplicate);
    assert_eq!(outcome.invoice.status, InvoiceStatus::Paid);
    assert_eq!(harness.ledger_sum(&invoice.id).await, 10_000);
}

#[tokio::test]
async fn test_staff_cannot_claim_processor_reference() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;

    let mut claimed = staff_payment(100);
    claimed.external_ref = Some("ch_real".to_string());
    let err = harness
        .services
        .payments
        .record_payment(&owner().id, &invoice.id, claimed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(harness.ledger_sum(&invoice.id).await, 0);
}

#[tokio::test]
async fn test_reference_on_another_tenant_does_not_block_delivery() {
    let harness = TestHarness::new();
    let invoices = &harness.services.invoices;
    let payments = &harness.services.payments;

    let theirs = invoices
        .create_invoice(&other_owner(), InvoiceBuilder::new().partial(None).build())
        .await
        .unwrap();
    let theirs = invoices
        .send_invoice(&other_owner().id, &theirs.id)
        .await
        .unwrap();
    let ours = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;

    payments
        .record_processor_payment(&theirs.id, processor_payment(100, "ch_victim"))
        .await
        .unwrap();

    let outcome = payments
        .record_processor_payment(&ours.id, processor_payment(10_000, "ch_victim"))
        .await
        .unwrap();
    assert!(!outcome.duplicate);
    assert_eq!(outcome.invoice.status, InvoiceStatus::Paid);
    assert_eq!(harness.ledger_sum(&ours.id).await, 10_000);
    assert_eq!(harness.ledger_sum(&theirs.id).await, 100);
}

#[tokio::test]
async fn test_processor_payment_requires_external_ref() {
    let harness = TestHarness::new();
    let invoice = harness.sent_invoice(InvoiceBuilder::new()).await;

    let err = harness
        .services
        .payments
        .record_processor_payment(&invoice.id, staff_payment(10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_mark_fully_paid_records_remaining_balance() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(Some(3_000)))
        .await;
    harness.pay(&invoice.id, 3_500).await.unwrap();

    let outcome = harness
        .services
        .payments
        .mark_fully_paid(&owner().id, &invoice.id, PaymentMethod::Cash, None)
        .await
        .unwrap();

    assert_eq!(outcome.payment.amount, 6_500);
    assert_eq!(outcome.invoice.status, InvoiceStatus::Paid);
    assert_eq!(outcome.invoice.payment_method.as_deref(), Some("cash"));
}

#[tokio::test]
async fn test_notification_only_on_status_change() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;

    harness.pay(&invoice.id, 2_000).await.unwrap();
    // Still partially paid: nothing new to tell
    let second = harness.pay(&invoice.id, 2_000).await.unwrap();
    assert_eq!(second.invoice.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(harness.dispatcher.partial_receipts(), 1);

    harness.pay(&invoice.id, 6_000).await.unwrap();

    assert_eq!(harness.dispatcher.partial_receipts(), 1);
    assert_eq!(harness.dispatcher.full_receipts(), 1);
}

#[tokio::test]
async fn test_failed_receipt_does_not_roll_back_payment() {
    let harness = TestHarness::new();
    let invoice = harness.sent_invoice(InvoiceBuilder::new().total(10_000)).await;
    harness.dispatcher.fail_deliveries(true);

    let outcome = harness.pay(&invoice.id, 10_000).await.unwrap();
    assert_eq!(outcome.invoice.status, InvoiceStatus::Paid);
    assert_eq!(harness.stored(&invoice.id).await.status, InvoiceStatus::Paid);
    assert_eq!(harness.dispatcher.full_receipts(), 0);
}

#[tokio::test]
async fn test_settling_payment_unlocks_milestone() {
    let harness = TestHarness::new();
    let invoice = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None).milestone("ms-7"))
        .await;

    harness.pay(&invoice.id, 5_000).await.unwrap();
    assert_eq!(harness.repository.milestone_paid_at("ms-7").unwrap(), None);

    harness.pay(&invoice.id, 5_000).await.unwrap();
    assert_eq!(
        harness.repository.milestone_paid_at("ms-7").unwrap(),
        Some(harness.now())
    );
}

#[tokio::test]
async fn test_other_owner_sees_not_found() {
    let harness = TestHarness::new();
    let invoice = harness.sent_invoice(InvoiceBuilder::new()).await;

    let err = harness
        .services
        .payments
        .record_payment(&other_owner().id, &invoice.id, staff_payment(10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
