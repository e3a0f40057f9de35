use crate::models::{Account, Booking, BookingStatus, EscrowStatus, Payment, PaymentUpdate};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, DateTime, Document},
    error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{Acknowledgment, IndexOptions, ReadConcern, TransactionOptions, WriteConcern},
    Client, ClientSession, Collection, Database, IndexModel,
};

/// Upper bound on transaction attempts when MongoDB reports a transient
/// write conflict.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Result of the check-in read-modify-write on a booking.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// This call flipped `payoutTriggered`; carries the booking as read
    /// inside the transaction.
    Triggered(Booking),
    /// Another call already flipped the flag. Nothing was written.
    AlreadyTriggered,
    /// The booking was deleted between the ownership check and the transaction.
    BookingMissing,
    /// The booking is cancelled, vacated or rejected. Nothing was written.
    InvalidStatus(BookingStatus),
}

/// Document store behind the escrow flows.
///
/// `trigger_payout` is the only operation with a concurrency contract: for a
/// given booking, at most one call across all callers returns `Triggered`.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn health_check(&self) -> Result<()>;

    async fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>>;

    /// Set the booking's `paymentStatus` to `paid-escrow`. Errors if the
    /// booking does not exist.
    async fn mark_booking_escrowed(&self, booking_id: &str) -> Result<()>;

    /// Set `paymentStatus = paid-released` and `status = released`.
    /// Returns `false` if the booking does not exist.
    async fn release_booking(&self, booking_id: &str) -> Result<bool>;

    /// Record a completed gateway payout on the booking.
    async fn record_booking_payout(&self, booking_id: &str, payout_id: Option<&str>)
        -> Result<()>;

    /// Atomically flip `payoutTriggered` and move the booking to `checked-in`.
    async fn trigger_payout(&self, booking_id: &str) -> Result<TriggerOutcome>;

    async fn insert_payment(&self, payment: &Payment) -> Result<()>;

    async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>>;

    async fn find_payments_by_order(&self, order_id: &str) -> Result<Vec<Payment>>;

    async fn update_payment(&self, payment_id: &str, update: &PaymentUpdate) -> Result<()>;

    /// Mark every payment of the booking as released with the given
    /// commission. Returns the number of payments touched.
    async fn release_payments_for_booking(&self, booking_id: &str, commission: f64)
        -> Result<u64>;

    async fn get_provider(&self, provider_id: &str) -> Result<Option<Account>>;

    async fn get_user(&self, user_id: &str) -> Result<Option<Account>>;
}

/// MongoDB-backed store. `trigger_payout` runs inside a multi-document
/// transaction and therefore needs a replica set or sharded cluster.
#[derive(Clone)]
pub struct MongoPaymentStore {
    client: Client,
    db: Database,
    bookings: Collection<Booking>,
    payments: Collection<Payment>,
    providers: Collection<Account>,
    users: Collection<Account>,
}

impl MongoPaymentStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self {
            bookings: db.collection("bookings"),
            payments: db.collection("payments"),
            providers: db.collection("providers"),
            users: db.collection("users"),
            client,
            db,
        }
    }

    /// Initialize indexes for the payment lookups this service performs.
    pub async fn init_indexes(&self) -> Result<()> {
        let order_index = IndexModel::builder()
            .keys(doc! { "orderId": 1 })
            .options(
                IndexOptions::builder()
                    .name("payment_order_idx".to_string())
                    .build(),
            )
            .build();

        let booking_index = IndexModel::builder()
            .keys(doc! { "bookingId": 1 })
            .options(
                IndexOptions::builder()
                    .name("payment_booking_idx".to_string())
                    .build(),
            )
            .build();

        self.payments
            .create_indexes([order_index, booking_index], None)
            .await?;

        tracing::info!("Escrow service indexes initialized");
        Ok(())
    }

    fn transaction_options() -> TransactionOptions {
        TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .build()
    }

    async fn trigger_payout_in_session(
        &self,
        session: &mut ClientSession,
        booking_id: &str,
    ) -> mongodb::error::Result<TriggerOutcome> {
        let booking = self
            .bookings
            .find_one_with_session(doc! { "_id": booking_id }, None, session)
            .await?;

        let Some(booking) = booking else {
            return Ok(TriggerOutcome::BookingMissing);
        };

        if booking.payout_triggered {
            return Ok(TriggerOutcome::AlreadyTriggered);
        }

        if let Some(status) = booking.status.as_ref().filter(|s| s.is_terminal()) {
            return Ok(TriggerOutcome::InvalidStatus(status.clone()));
        }

        let mut set = doc! {
            "payoutTriggered": true,
            "status": BookingStatus::CheckedIn.as_str(),
            "payoutTriggeredAt": DateTime::now(),
        };
        if booking.payment_status.is_none() {
            set.insert("paymentStatus", EscrowStatus::PaidEscrow.as_str());
        }

        self.bookings
            .update_one_with_session(
                doc! { "_id": booking_id, "payoutTriggered": { "$ne": true } },
                doc! { "$set": set },
                None,
                session,
            )
            .await?;

        Ok(TriggerOutcome::Triggered(booking))
    }
}

fn payment_update_document(update: &PaymentUpdate) -> Result<Document> {
    let mut set = doc! {
        "status": to_bson(&update.status)?,
        "updatedAt": DateTime::now(),
    };
    if let Some(commission) = update.commission {
        set.insert("commission", commission);
    }
    if let Some(response) = &update.payout_response {
        set.insert("payoutResponse", to_bson(response)?);
    }
    if let Some(error) = &update.error {
        set.insert("error", error.as_str());
    }
    Ok(doc! { "$set": set })
}

#[async_trait]
impl PaymentStore for MongoPaymentStore {
    async fn health_check(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>> {
        let booking = self
            .bookings
            .find_one(doc! { "_id": booking_id }, None)
            .await?;
        Ok(booking)
    }

    async fn mark_booking_escrowed(&self, booking_id: &str) -> Result<()> {
        let result = self
            .bookings
            .update_one(
                doc! { "_id": booking_id },
                doc! { "$set": { "paymentStatus": EscrowStatus::PaidEscrow.as_str() } },
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(anyhow!("Booking {} not found", booking_id));
        }
        Ok(())
    }

    async fn release_booking(&self, booking_id: &str) -> Result<bool> {
        let result = self
            .bookings
            .update_one(
                doc! { "_id": booking_id },
                doc! {
                    "$set": {
                        "paymentStatus": EscrowStatus::PaidReleased.as_str(),
                        "status": BookingStatus::Released.as_str(),
                    }
                },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn record_booking_payout(
        &self,
        booking_id: &str,
        payout_id: Option<&str>,
    ) -> Result<()> {
        let mut set = doc! { "paymentStatus": EscrowStatus::PaidReleased.as_str() };
        if let Some(payout_id) = payout_id {
            set.insert("payoutId", payout_id);
        }

        self.bookings
            .update_one(doc! { "_id": booking_id }, doc! { "$set": set }, None)
            .await?;
        Ok(())
    }

    async fn trigger_payout(&self, booking_id: &str) -> Result<TriggerOutcome> {
        let mut session = self.client.start_session(None).await?;
        let mut attempt = 0;

        'transaction: loop {
            attempt += 1;
            session
                .start_transaction(Self::transaction_options())
                .await?;

            let outcome = match self.trigger_payout_in_session(&mut session, booking_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let _ = session.abort_transaction().await;
                    if e.contains_label(TRANSIENT_TRANSACTION_ERROR)
                        && attempt < MAX_TRANSACTION_ATTEMPTS
                    {
                        tracing::debug!(
                            booking_id = %booking_id,
                            attempt,
                            "Transient conflict while triggering payout, retrying"
                        );
                        continue 'transaction;
                    }
                    return Err(e.into());
                }
            };

            if !matches!(outcome, TriggerOutcome::Triggered(_)) {
                session.abort_transaction().await?;
                return Ok(outcome);
            }

            let mut commit_attempt = 0;
            loop {
                commit_attempt += 1;
                let e = match session.commit_transaction().await {
                    Ok(()) => return Ok(outcome),
                    Err(e) => e,
                };
                match commit_retry(|label| e.contains_label(label), commit_attempt, attempt) {
                    CommitRetry::Commit => {
                        tracing::debug!(booking_id = %booking_id, commit_attempt, "Retrying commit");
                    }
                    CommitRetry::Transaction => continue 'transaction,
                    CommitRetry::GiveUp => return Err(e.into()),
                }
            }
        }
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.payments.insert_one(payment, None).await?;
        Ok(())
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>> {
        let payment = self
            .payments
            .find_one(doc! { "_id": payment_id }, None)
            .await?;
        Ok(payment)
    }

    async fn find_payments_by_order(&self, order_id: &str) -> Result<Vec<Payment>> {
        let cursor = self
            .payments
            .find(doc! { "orderId": order_id }, None)
            .await?;
        let payments: Vec<Payment> = cursor.try_collect().await?;
        Ok(payments)
    }

    async fn update_payment(&self, payment_id: &str, update: &PaymentUpdate) -> Result<()> {
        let result = self
            .payments
            .update_one(
                doc! { "_id": payment_id },
                payment_update_document(update)?,
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(anyhow!("Payment {} not found", payment_id));
        }
        Ok(())
    }

    async fn release_payments_for_booking(
        &self,
        booking_id: &str,
        commission: f64,
    ) -> Result<u64> {
        let result = self
            .payments
            .update_many(
                doc! { "bookingId": booking_id },
                payment_update_document(&PaymentUpdate::released_with_commission(commission))?,
                None,
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn get_provider(&self, provider_id: &str) -> Result<Option<Account>> {
        Ok(self
            .providers
            .find_one(doc! { "_id": provider_id }, None)
            .await?)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<Account>> {
        Ok(self.users.find_one(doc! { "_id": user_id }, None).await?)
    }
}

/// Next step after a failed commit.
#[derive(Debug, PartialEq, Eq)]
enum CommitRetry {
    Commit,
    Transaction,
    GiveUp,
}

/// Both retry kinds are bounded by `MAX_TRANSACTION_ATTEMPTS`.
fn commit_retry(
    has_label: impl Fn(&str) -> bool,
    commit_attempt: u32,
    transaction_attempt: u32,
) -> CommitRetry {
    if has_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) && commit_attempt < MAX_TRANSACTION_ATTEMPTS {
        CommitRetry::Commit
    } else if has_label(TRANSIENT_TRANSACTION_ERROR)
        && transaction_attempt < MAX_TRANSACTION_ATTEMPTS
    {
        CommitRetry::Transaction
    } else {
        CommitRetry::GiveUp
    }
}
