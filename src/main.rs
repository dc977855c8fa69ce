#[tokio::main]
async fn main() -> anyhow::Result<()> {
    field_patrol::cli::run().await
}
