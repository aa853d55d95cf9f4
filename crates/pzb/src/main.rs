use std::sync::Arc;

use pzb_core::{config::Config, publish::Publisher, store::JsonFileStore};
use pzb_ftp::{CertPolicy, FtpConnector};

#[tokio::main]
async fn main() -> Result<(), pzb_core::Error> {
    pzb_core::logging::init("pzb")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        credentials = %cfg.credentials_file.display(),
        temp_dir = %cfg.temp_dir.display(),
        timeout_secs = cfg.ftp_timeout.as_secs(),
        "configuration loaded"
    );

    let store = Arc::new(JsonFileStore::new(cfg.credentials_file.clone()));
    let connector = FtpConnector::new(CertPolicy::from_insecure_flag(cfg.ftp_tls_insecure))?;
    let publisher = Arc::new(Publisher::new(Arc::new(connector), cfg.ftp_timeout));

    pzb_telegram::router::run_polling(cfg, store, publisher)
        .await
        .map_err(|e| pzb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
