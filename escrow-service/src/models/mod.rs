pub mod account;
pub mod booking;
pub mod payment;

pub use account::{Account, BankAccount, PayoutDetails};
pub use booking::{Booking, BookingStatus, EscrowStatus, Otp};
pub use payment::{CheckoutCapture, Payment, PaymentStatus, PaymentUpdate};
