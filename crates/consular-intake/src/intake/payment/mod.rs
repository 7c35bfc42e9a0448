//! Payment-side clients: preparation (internal endpoint) and confirmation
//! (provider API). Both sit behind traits so the saga engine never knows
//! which wire it is on.

pub mod confirmation;
pub mod preparation;

pub use confirmation::{HttpPaymentConfirmer, PaymentConfirmationError, PaymentConfirmer};
pub use preparation::{
    HttpPaymentPreparer, PaymentPreparationError, PaymentPreparationRequest, PaymentPreparer,
};
