use mongodb::bson::DateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// Booking document, written by the client-facing booking flow.
///
/// This service only ever patches individual fields with `$set`, so the
/// struct tolerates missing fields and unknown status values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub status: Option<BookingStatus>,
    #[serde(default)]
    pub payment_status: Option<EscrowStatus>,
    #[serde(default)]
    pub otp: Option<Otp>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payout_triggered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_triggered_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_cost: f64,
    #[serde(default)]
    pub user_email: Option<String>,
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Booking {
    pub fn is_assigned_to(&self, provider_uid: &str) -> bool {
        self.provider_id.as_deref() == Some(provider_uid)
    }

    pub fn is_owned_by(&self, user_uid: &str) -> bool {
        self.user_id.as_deref() == Some(user_uid)
    }

    pub fn otp_matches(&self, otp: &Otp) -> bool {
        self.otp.as_ref() == Some(otp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Created,
    Confirmed,
    CheckedIn,
    Cancelled,
    Vacated,
    Rejected,
    Released,
    /// Any status introduced by client flows that this service does not act on.
    #[serde(other)]
    Other,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Vacated | BookingStatus::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Created => "created",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked-in",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Vacated => "vacated",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Released => "released",
            BookingStatus::Other => "other",
        }
    }
}

/// Where the booking's money sits: held by the gateway or paid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EscrowStatus {
    PaidEscrow,
    PaidReleased,
    #[serde(other)]
    Other,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStatus::PaidEscrow => "paid-escrow",
            EscrowStatus::PaidReleased => "paid-released",
            EscrowStatus::Other => "other",
        }
    }
}

/// Check-in code shared between the user and the provider.
///
/// Stored and submitted either as a string or as a bare number; both are
/// normalised to their trimmed decimal text before comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Otp(String);

impl Otp {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Otp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawOtp {
            Text(String),
            Number(i64),
        }

        Ok(match RawOtp::deserialize(deserializer)? {
            RawOtp::Text(text) => Otp::new(text),
            RawOtp::Number(number) => Otp::new(number.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, Bson};

    #[test]
    fn terminal_statuses() {
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Vacated.is_terminal());
        assert!(BookingStatus::Rejected.is_terminal());
        assert!(!BookingStatus::Created.is_terminal());
        assert!(!BookingStatus::CheckedIn.is_terminal());
        assert!(!BookingStatus::Released.is_terminal());
        assert!(!BookingStatus::Other.is_terminal());
    }

    #[test]
    fn deserializes_sparse_document_with_unknown_status() {
        let document = doc! {
            "_id": "bk_1",
            "providerId": "prov_1",
            "status": "awaiting-arrival",
            "otp": 4821,
            "totalCost": 120,
        };

        let booking: Booking = mongodb::bson::from_document(document).unwrap();

        assert_eq!(booking.id, "bk_1");
        assert_eq!(booking.status, Some(BookingStatus::Other));
        assert_eq!(booking.payment_status, None);
        assert!(!booking.payout_triggered);
        assert_eq!(booking.total_cost, 120.0);
        assert!(booking.otp_matches(&Otp::new("4821")));
        assert!(booking.is_assigned_to("prov_1"));
        assert!(!booking.is_owned_by("prov_1"));
    }

    #[test]
    fn null_flags_and_cost_fall_back_to_defaults() {
        let document = doc! {
            "_id": "bk_1",
            "providerId": "prov_1",
            "status": "confirmed",
            "payoutTriggered": Bson::Null,
            "totalCost": Bson::Null,
        };

        let booking: Booking = mongodb::bson::from_document(document).unwrap();

        assert!(!booking.payout_triggered);
        assert_eq!(booking.total_cost, 0.0);
        assert_eq!(booking.status, Some(BookingStatus::Confirmed));
    }

    #[test]
    fn otp_accepts_string_and_number_json() {
        let from_text: Otp = serde_json::from_str("\" 123456 \"").unwrap();
        let from_number: Otp = serde_json::from_str("123456").unwrap();

        assert_eq!(from_text, from_number);
        assert_eq!(from_text.as_str(), "123456");
    }

    #[test]
    fn missing_otp_never_matches() {
        let booking: Booking = mongodb::bson::from_document(doc! { "_id": "bk_2" }).unwrap();
        assert!(!booking.otp_matches(&Otp::new("")));
        assert!(!booking.otp_matches(&Otp::new("0000")));
    }

    #[test]
    fn status_strings_round_trip_through_serde() {
        for status in [
            BookingStatus::CheckedIn,
            BookingStatus::Released,
            BookingStatus::Vacated,
        ] {
            let json = serde_json::to_value(&status).unwrap();
            assert_eq!(json, status.as_str());
        }
        assert_eq!(
            serde_json::to_value(EscrowStatus::PaidEscrow).unwrap(),
            EscrowStatus::PaidEscrow.as_str()
        );
    }
}
