//! Mail API - Entry Point

#[tokio::main]
async fn main() -> eyre::Result<()> {
    mail_api::run().await
}
