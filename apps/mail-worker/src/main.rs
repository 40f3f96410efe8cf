//! Mail Worker - Entry Point
//!
//! Background worker that drives the delivery state machine from the
//! mail job stream.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    mail_worker::run().await
}
