//! Optional scraper contract: pulls external data and hands it to a saver.

use super::health::HealthCheck;
use super::outcome::Outcome;
use super::saver::DataSaver;

pub trait Scraper: HealthCheck {
    /// Registered type name (e.g., "http_csv").
    fn name(&self) -> &str;

    /// Scrape every available source into `saver`.
    ///
    /// Fails if any single source fails; the others are still attempted.
    fn scrape_data(&self, saver: &dyn DataSaver) -> Outcome;

    /// Scrape one named source into `saver`.
    fn scrape_single_source(&self, name: &str, saver: &dyn DataSaver) -> Outcome;

    /// Names accepted by `scrape_single_source`.
    fn get_available_sources(&self) -> Vec<String>;
}
