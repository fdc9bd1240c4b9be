use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    marag_cli::Cli::parse().run().await
}
