use std::sync::Arc;

use kfb_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), kfb_core::Error> {
    kfb_core::logging::init("kfb")?;

    let cfg = Arc::new(Config::load()?);

    kfb_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| kfb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
