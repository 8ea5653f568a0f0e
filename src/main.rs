#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = unihelper_bot::run().await {
        eprintln!("unihelper-bot fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
