pub mod analytics;
pub mod bulk;
pub mod emails;
pub mod health;
pub mod send;
pub mod webhooks;
