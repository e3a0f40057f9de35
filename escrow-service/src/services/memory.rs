//! In-process [`PaymentStore`] for tests and local runs without MongoDB.
//!
//! A single mutex guards all collections, so every operation (including the
//! check-in read-modify-write) is atomic with respect to every other.

use crate::models::{Account, Booking, BookingStatus, EscrowStatus, Payment, PaymentUpdate};
use crate::services::repository::{PaymentStore, TriggerOutcome};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mongodb::bson::DateTime;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Collections {
    bookings: HashMap<String, Booking>,
    payments: Vec<Payment>,
    providers: HashMap<String, Account>,
    users: HashMap<String, Account>,
}

#[derive(Default)]
pub struct InMemoryPaymentStore {
    inner: Mutex<Collections>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_booking(&self, booking: Booking) {
        self.inner
            .lock()
            .await
            .bookings
            .insert(booking.id.clone(), booking);
    }

    pub async fn put_provider(&self, account: Account) {
        self.inner
            .lock()
            .await
            .providers
            .insert(account.id.clone(), account);
    }

    pub async fn put_user(&self, account: Account) {
        self.inner
            .lock()
            .await
            .users
            .insert(account.id.clone(), account);
    }

    /// Snapshot of every payment, in insertion order.
    pub async fn payments(&self) -> Vec<Payment> {
        self.inner.lock().await.payments.clone()
    }

    pub async fn payments_for_booking(&self, booking_id: &str) -> Vec<Payment> {
        self.inner
            .lock()
            .await
            .payments
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>> {
        Ok(self.inner.lock().await.bookings.get(booking_id).cloned())
    }

    async fn mark_booking_escrowed(&self, booking_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let booking = inner
            .bookings
            .get_mut(booking_id)
            .ok_or_else(|| anyhow!("Booking {} not found", booking_id))?;
        booking.payment_status = Some(EscrowStatus::PaidEscrow);
        Ok(())
    }

    async fn release_booking(&self, booking_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.bookings.get_mut(booking_id) {
            Some(booking) => {
                booking.payment_status = Some(EscrowStatus::PaidReleased);
                booking.status = Some(BookingStatus::Released);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_booking_payout(
        &self,
        booking_id: &str,
        payout_id: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(booking) = inner.bookings.get_mut(booking_id) {
            booking.payment_status = Some(EscrowStatus::PaidReleased);
            if let Some(payout_id) = payout_id {
                booking.payout_id = Some(payout_id.to_string());
            }
        }
        Ok(())
    }

    async fn trigger_payout(&self, booking_id: &str) -> Result<TriggerOutcome> {
        let mut inner = self.inner.lock().await;

        let Some(booking) = inner.bookings.get_mut(booking_id) else {
            return Ok(TriggerOutcome::BookingMissing);
        };

        if booking.payout_triggered {
            return Ok(TriggerOutcome::AlreadyTriggered);
        }

        if let Some(status) = booking.status.as_ref().filter(|s| s.is_terminal()) {
            return Ok(TriggerOutcome::InvalidStatus(status.clone()));
        }

        let before = booking.clone();
        booking.payout_triggered = true;
        booking.status = Some(BookingStatus::CheckedIn);
        booking.payout_triggered_at = Some(DateTime::now());
        if booking.payment_status.is_none() {
            booking.payment_status = Some(EscrowStatus::PaidEscrow);
        }

        Ok(TriggerOutcome::Triggered(before))
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.payments.iter().any(|p| p.id == payment.id) {
            return Err(anyhow!("Duplicate payment id {}", payment.id));
        }
        inner.payments.push(payment.clone());
        Ok(())
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>> {
        Ok(self
            .inner
            .lock()
            .await
            .payments
            .iter()
            .find(|p| p.id == payment_id)
            .cloned())
    }

    async fn find_payments_by_order(&self, order_id: &str) -> Result<Vec<Payment>> {
        Ok(self
            .inner
            .lock()
            .await
            .payments
            .iter()
            .filter(|p| p.order_id.as_deref() == Some(order_id))
            .cloned()
            .collect())
    }

    async fn update_payment(&self, payment_id: &str, update: &PaymentUpdate) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let payment = inner
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| anyhow!("Payment {} not found", payment_id))?;
        update.apply(payment);
        Ok(())
    }

    async fn release_payments_for_booking(
        &self,
        booking_id: &str,
        commission: f64,
    ) -> Result<u64> {
        let update = PaymentUpdate::released_with_commission(commission);
        let mut inner = self.inner.lock().await;
        let mut touched = 0;
        for payment in inner
            .payments
            .iter_mut()
            .filter(|p| p.booking_id == booking_id)
        {
            update.apply(payment);
            touched += 1;
        }
        Ok(touched)
    }

    async fn get_provider(&self, provider_id: &str) -> Result<Option<Account>> {
        Ok(self.inner.lock().await.providers.get(provider_id).cloned())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<Account>> {
        Ok(self.inner.lock().await.users.get(user_id).cloned())
    }
}
