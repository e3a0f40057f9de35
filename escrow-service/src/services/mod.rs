pub mod email;
pub mod identity;
pub mod memory;
pub mod metrics;
pub mod razorpay;
pub mod repository;

pub use email::{EmailMessage, EmailProvider, MockEmailProvider, ProviderError, SmtpProvider};
pub use identity::{IdTokenVerifier, VerifiedIdentity};
pub use memory::InMemoryPaymentStore;
pub use metrics::{get_metrics, init_metrics};
pub use razorpay::RazorpayClient;
pub use repository::{MongoPaymentStore, PaymentStore, TriggerOutcome};
