mod customers;
mod plans;
pub mod signature;
mod webhook;

#[cfg(test)]
pub use customers::StaticCustomers;
pub use customers::StripeCustomers;
pub use plans::{catalogue, Plan};
pub use webhook::BillingWebhook;
