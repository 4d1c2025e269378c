use cosmic::app::Settings;
use cosmic::cosmic_config::CosmicConfigEntry;
use cosmic::iced::Limits;

mod application;
mod components;
mod localize;
mod message;
mod pages;

use keepup::auth;
use keepup::backend;
use keepup::board;
use keepup::config;
use keepup::core;
use keepup::store;

use application::{Flags, KeepUp};
use config::{APP_ID, CONFIG_VERSION, KeepUpConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cosmic_cfg = cosmic::cosmic_config::Config::new(APP_ID, CONFIG_VERSION)
        .map_err(|e| format!("Failed to create cosmic config: {}", e))?;
    let config = KeepUpConfig::get_entry(&cosmic_cfg).unwrap_or_else(|(errors, cfg)| {
        for e in errors {
            eprintln!("Config entry: {}", e);
        }
        cfg
    });

    // Log to the systemd user journal (`journalctl --user -t keepup -f`).
    // Our own targets at info/debug (per config), everything else at warn.
    {
        struct FilteredJournal {
            inner: systemd_journal_logger::JournalLog,
        }

        impl log::Log for FilteredJournal {
            fn enabled(&self, metadata: &log::Metadata) -> bool {
                let target = metadata.target();
                if target.starts_with("keepup") {
                    let max = if keepup::debug_logging() {
                        log::LevelFilter::Debug
                    } else {
                        log::LevelFilter::Info
                    };
                    metadata.level() <= max
                } else {
                    metadata.level() <= log::LevelFilter::Warn
                }
            }
            fn log(&self, record: &log::Record) {
                if self.enabled(record.metadata()) {
                    self.inner.log(record);
                }
            }
            fn flush(&self) {
                self.inner.flush();
            }
        }

        keepup::set_debug_logging(config.debug_logging);

        match systemd_journal_logger::JournalLog::new() {
            Ok(journal) => {
                let journal = journal.with_syslog_identifier("keepup".to_string());
                log::set_boxed_logger(Box::new(FilteredJournal { inner: journal }))?;
                // Global max stays at Debug so the toggle takes effect without a restart.
                log::set_max_level(log::LevelFilter::Debug);
            }
            Err(e) => eprintln!("Journal logging unavailable: {}", e),
        }
    }

    localize::localize();

    let mut settings = Settings::default();
    settings = settings.size_limits(Limits::NONE.min_width(420.0).min_height(360.0));

    let flags = Flags {
        config,
        cosmic_config: cosmic_cfg,
    };
    cosmic::app::run::<KeepUp>(settings, flags)?;

    Ok(())
}
