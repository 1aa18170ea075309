// Reminder scheduler
//
// Pure decision logic: given an invoice snapshot, the current instant and the
// trigger, decide whether a reminder may go out and which type it is. The
// caller evaluates this while holding the invoice's unit of work so the
// cooldown check and the reminder write are serialized per invoice.

use chrono::{DateTime, Duration, Utc};

use crate::config::ReminderConfig;
use crate::modules::invoices::models::Invoice;
use crate::modules::reminders::models::{
    ReminderDecision, ReminderDenial, ReminderTrigger, ReminderType, MAX_CUSTOM_MESSAGE_CHARS,
};

#[derive(Debug, Clone)]
pub struct ReminderPolicy {
    pub cooldown: Duration,
    pub first_auto_after: Duration,
    pub second_auto_after: Duration,
    pub overdue_cap: i32,
    pub max_message_chars: usize,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::hours(24),
            first_auto_after: Duration::days(3),
            second_auto_after: Duration::days(7),
            overdue_cap: 5,
            max_message_chars: MAX_CUSTOM_MESSAGE_CHARS,
        }
    }
}

impl From<&ReminderConfig> for ReminderPolicy {
    fn from(config: &ReminderConfig) -> Self {
        Self {
            cooldown: Duration::hours(config.cooldown_hours),
            first_auto_after: Duration::days(config.first_auto_after_days),
            second_auto_after: Duration::days(config.second_auto_after_days),
            overdue_cap: config.overdue_cap,
            max_message_chars: config.max_message_chars,
        }
    }
}

impl ReminderPolicy {
    /// Decide whether a reminder may be sent now.
    ///
    /// `invoice.status` must already be refreshed for `now`.
    pub fn evaluate(
        &self,
        invoice: &Invoice,
        now: DateTime<Utc>,
        trigger: ReminderTrigger,
    ) -> ReminderDecision {
        if !invoice.status.accepts_payments() {
            return ReminderDecision::Deny(ReminderDenial::NotRemindable(invoice.status));
        }

        if trigger == ReminderTrigger::Sweep && !invoice.auto_remind {
            return ReminderDecision::Deny(ReminderDenial::AutoRemindDisabled);
        }

        if let Some(hours_remaining) = self.cooldown_hours_remaining(invoice, now) {
            return ReminderDecision::Deny(ReminderDenial::Cooldown { hours_remaining });
        }

        match trigger {
            ReminderTrigger::Manual => ReminderDecision::Send(ReminderType::Manual),
            ReminderTrigger::Sweep => match self.classify(invoice, now) {
                Some(reminder_type) => ReminderDecision::Send(reminder_type),
                None => ReminderDecision::Deny(ReminderDenial::NothingDue),
            },
        }
    }

    /// Whole hours left on the cooldown, rounded up. `None` once it has cleared.
    pub fn cooldown_hours_remaining(&self, invoice: &Invoice, now: DateTime<Utc>) -> Option<i64> {
        let last = invoice.last_reminder_at?;
        let remaining = self.cooldown - (now - last);

        if remaining <= Duration::zero() {
            return None;
        }

        let seconds = remaining.num_seconds();
        Some(((seconds + 3599) / 3600).max(1))
    }

    /// Highest-priority sweep bucket the invoice falls into
    fn classify(&self, invoice: &Invoice, now: DateTime<Utc>) -> Option<ReminderType> {
        let since_sent = now - invoice.sent_at?;

        if since_sent >= self.first_auto_after && invoice.reminder_count == 0 {
            return Some(ReminderType::FirstAuto);
        }

        if since_sent >= self.second_auto_after && invoice.reminder_count == 1 {
            return Some(ReminderType::SecondAuto);
        }

        if invoice.due_date < now.date_naive() && invoice.reminder_count < self.overdue_cap {
            return Some(ReminderType::Overdue);
        }

        None
    }
}
