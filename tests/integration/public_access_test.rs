// Public token flow and the invoice lifecycle around it

#[path = "../helpers/mod.rs"]
mod helpers;

use chrono::{Duration, NaiveDate};
use helpers::*;
use invoice_ledger::core::AppError;
use invoice_ledger::invoices::models::UpdateInvoiceRequest;
use invoice_ledger::invoices::InvoiceStatus;
use invoice_ledger::payments::models::PaymentMethod;
use invoice_ledger::payments::services::{NewPayment, PaymentAmount};
use invoice_ledger::payments::PaymentSource;

fn client_payment(amount: i64) -> NewPayment {
    NewPayment {
        amount: PaymentAmount::Exact(amount),
        method: PaymentMethod::Card,
        notes: None,
        external_ref: None,
        source: PaymentSource::Client,
    }
}

#[tokio::test]
async fn test_send_mints_token_once_and_notifies() {
    let harness = TestHarness::new();
    let draft = harness.draft_invoice(InvoiceBuilder::new()).await;
    assert_eq!(draft.access_token, None);

    let sent = harness
        .services
        .invoices
        .send_invoice(&owner().id, &draft.id)
        .await
        .unwrap();
    let token = sent.access_token.clone().unwrap();
    assert_eq!(token.len(), 64);
    assert_eq!(sent.status, InvoiceStatus::Sent);
    assert_eq!(harness.dispatcher.issued(), 1);

    let err = harness
        .services
        .invoices
        .send_invoice(&owner().id, &draft.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(harness.stored(&draft.id).await.access_token, Some(token));
}

#[tokio::test]
async fn test_first_resolution_marks_viewed() {
    let harness = TestHarness::new();
    let sent = harness.sent_invoice(InvoiceBuilder::new()).await;
    let token = sent.access_token.unwrap();

    harness.advance(Duration::hours(2));
    let view = harness
        .services
        .invoices
        .resolve_public_token(&token)
        .await
        .unwrap();
    assert_eq!(view.status, InvoiceStatus::Viewed);
    assert_eq!(view.from_name, "Ada Freelance");

    let stored = harness.stored(&sent.id).await;
    let first_view = stored.viewed_at.unwrap();

    harness.advance(Duration::hours(2));
    harness
        .services
        .invoices
        .resolve_public_token(&token)
        .await
        .unwrap();
    assert_eq!(harness.stored(&sent.id).await.viewed_at, Some(first_view));
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let harness = TestHarness::new();
    let err = harness
        .services
        .invoices
        .resolve_public_token("no-such-token")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_client_pays_through_token() {
    let harness = TestHarness::new();
    let sent = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(Some(2_000)))
        .await;
    let token = sent.access_token.unwrap();
    let payments = &harness.services.payments;

    let outcome = payments
        .record_public_payment(&token, client_payment(4_000))
        .await
        .unwrap();
    assert_eq!(outcome.invoice.status, InvoiceStatus::PartiallyPaid);

    let err = payments
        .record_public_payment(&token, client_payment(500))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PolicyViolation(_)));

    payments
        .record_public_payment(&token, client_payment(6_000))
        .await
        .unwrap();
    assert_eq!(harness.stored(&sent.id).await.status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn test_reads_present_overdue_before_it_is_persisted() {
    let harness = TestHarness::new();
    let sent = harness.sent_invoice(InvoiceBuilder::new()).await;

    harness.advance(Duration::days(31));
    let detail = harness
        .services
        .invoices
        .get_invoice(&owner().id, &sent.id)
        .await
        .unwrap();
    assert_eq!(detail.invoice.status, InvoiceStatus::Overdue);
    assert_eq!(harness.stored(&sent.id).await.status, InvoiceStatus::Sent);
}

#[tokio::test]
async fn test_moving_due_date_forward_clears_overdue() {
    let harness = TestHarness::new();
    let sent = harness.sent_invoice(InvoiceBuilder::new()).await;
    harness.advance(Duration::days(31));

    let updated = harness
        .services
        .invoices
        .update_invoice(
            &owner().id,
            &sent.id,
            UpdateInvoiceRequest {
                due_date: Some(NaiveDate::from_ymd_opt(2025, 4, 30).unwrap()),
                notes: Some("Extended by agreement".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, InvoiceStatus::Sent);
    assert_eq!(updated.notes.as_deref(), Some("Extended by agreement"));
}

#[tokio::test]
async fn test_partial_settings_freeze_after_first_payment() {
    let harness = TestHarness::new();
    let sent = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;
    let invoices = &harness.services.invoices;

    let changed = invoices
        .toggle_partial_payments(&owner().id, &sent.id, true, Some(3_000))
        .await
        .unwrap();
    assert_eq!(changed.minimum_payment_amount, Some(3_000));

    harness.pay(&sent.id, 3_000).await.unwrap();
    let err = invoices
        .toggle_partial_payments(&owner().id, &sent.id, false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_cancel_only_without_payments() {
    let harness = TestHarness::new();
    let invoices = &harness.services.invoices;

    let clean = harness.sent_invoice(InvoiceBuilder::new()).await;
    let cancelled = invoices.cancel_invoice(&owner().id, &clean.id).await.unwrap();
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

    let err = harness.pay(&clean.id, 10_000).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let paid_some = harness
        .sent_invoice(InvoiceBuilder::new().total(10_000).partial(None))
        .await;
    harness.pay(&paid_some.id, 1_000).await.unwrap();
    let err = invoices
        .cancel_invoice(&owner().id, &paid_some.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn test_toggle_auto_remind_in_any_status() {
    let harness = TestHarness::new();
    let sent = harness.sent_invoice(InvoiceBuilder::new().total(10_000)).await;
    harness.pay(&sent.id, 10_000).await.unwrap();

    let toggled = harness
        .services
        .invoices
        .toggle_auto_remind(&owner().id, &sent.id, false)
        .await
        .unwrap();
    assert!(!toggled.auto_remind);
}

#[tokio::test]
async fn test_duplicate_invoice_number_per_owner() {
    let harness = TestHarness::new();
    harness.draft_invoice(InvoiceBuilder::new().number("INV-42")).await;

    let err = harness
        .services
        .invoices
        .create_invoice(&owner(), InvoiceBuilder::new().number("INV-42").build())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Another owner may reuse the number
    harness
        .services
        .invoices
        .create_invoice(&other_owner(), InvoiceBuilder::new().number("INV-42").build())
        .await
        .unwrap();
}
