//! Sync CLI commands: replay saved changes and watch a day live.

use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};
use fooddude_core::{DocumentStore, QueueFile};

use super::{date_or_today, runtime};
use crate::session::{document_store, report_pending, Session};
use fooddude::config::Config;

/// Send changes that could not be saved earlier
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration, pending changes and server status
    Status,
}

impl SyncCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let rt = runtime()?;

        match &self.command {
            None => rt.block_on(self.sync(config)),
            Some(SyncSubcommand::Status) => rt.block_on(self.status(config)),
        }
    }

    async fn sync(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::open(config).await?;

        match session.startup_flush() {
            Some(report) => {
                println!("Sending saved changes...");
                println!("  ✓ {} sent", report.replayed);
                if report.requeued > 0 {
                    println!("  ✗ {} still waiting", report.requeued);
                }
                if report.rejected > 0 {
                    println!("  ✗ {} refused by the server", report.rejected);
                }
            }
            None => println!("Nothing to send."),
        }

        let report = session.close().await?;
        if report.pending == 0 {
            println!("All changes are saved.");
        }
        report_pending(report);
        Ok(())
    }

    async fn status(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        let store = match document_store(&config.sync) {
            Ok(store) => store,
            Err(_) => {
                println!("Status: Not configured");
                println!();
                println!("To enable sync, add to your config file:");
                println!();
                println!("  sync:");
                println!("    server_url: \"http://localhost:8080\"");
                println!("    api_key: \"your-key\"");
                println!();
                println!("Or set environment variables:");
                println!("  FOODDUDE_SYNC_URL, FOODDUDE_SYNC_API_KEY");
                return Ok(());
            }
        };

        let pending = QueueFile::new(config.pending_queue_path()).load()?;

        println!("Server:  {}", store.server_url());
        println!("User:    {}", config.user_id.value);
        println!("Pending: {} change(s)", pending.len());
        for mutation in &pending {
            println!("  - {}", mutation);
        }

        let rejected = QueueFile::new(config.rejected_changes_path()).load()?;
        if !rejected.is_empty() {
            println!(
                "Refused: {} change(s), kept in {}",
                rejected.len(),
                config.rejected_changes_path().display()
            );
            for mutation in &rejected {
                println!("  - {}", mutation);
            }
        }
        println!();

        print!("Server status: ");
        let today = Local::now().date_naive();
        match store.fetch(&config.user_id.value, today).await {
            Ok(_) => println!("✓ connected"),
            Err(e) => println!("✗ {}", e),
        }

        Ok(())
    }
}

/// Print a day every time it changes on the server (Ctrl-C to stop)
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Date (YYYY-MM-DD), defaults to today
    #[arg(long, short)]
    pub date: Option<NaiveDate>,
}

impl WatchCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let date = date_or_today(self.date);

        runtime()?.block_on(async {
            let mut session = Session::open(config).await?;
            session.load_day(date).await;
            println!("Watching {} (Ctrl-C to stop)", date);

            tokio::select! {
                result = session.follow_day(date, |day| {
                    println!();
                    println!("── {} ──", Local::now().format("%H:%M:%S"));
                    println!("{}", day);
                }) => {
                    result?;
                    println!("Connection closed by server.");
                }
                _ = tokio::signal::ctrl_c() => {}
            }

            report_pending(session.close().await?);
            Ok::<(), Box<dyn std::error::Error>>(())
        })
    }
}
