use chrono::Local;
use clap::Parser;

use tgexport_core::{export::run_export, pacing::Pacer};
use tgexport_telegram::TelegramProvider;

mod cli;

#[tokio::main]
async fn main() -> Result<(), tgexport_core::Error> {
    tgexport_core::logging::init("tgexport")?;

    let cfg = cli::Cli::parse()
        .into_inputs()?
        .resolve(Local::now().date_naive())?;

    let provider = TelegramProvider::new(cfg.session_file.clone());
    let summary = run_export(&provider, &cfg, &Pacer::new(cfg.pacing)).await?;

    println!(
        "{}: {} messages processed, {} files matched, {} downloaded, {} already present",
        summary.channel_name,
        summary.messages_processed,
        summary.records,
        summary.downloaded,
        summary.already_existed
    );
    if let Some(path) = &summary.output_path {
        println!("Data stored in {}", path.display());
    }

    Ok(())
}
