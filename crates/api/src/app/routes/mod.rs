pub mod admin;
pub mod orders;
pub mod outbox;
pub mod system;
pub mod webhooks;
