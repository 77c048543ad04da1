//! Moves configuration between the persisted store and the live mapping.

use super::configuration::Configuration;
use super::literal::{LiteralParser, to_literal};
use super::store::ConfigStore;
use crate::bridge::traceback;
use crate::error::{ConfigParseError, ConfigReprError, StoreError};
use tracing::debug;

/// Outcome of [`reload`].
#[derive(Debug, Default)]
pub struct ReloadReport {
    /// Keys whose stored text was parsed into the mapping.
    pub loaded: Vec<String>,
    /// Entries that were skipped.
    pub errors: Vec<ConfigParseError>,
}

/// Outcome of [`save`].
#[derive(Debug, Default)]
pub struct SaveReport {
    /// Keys written to the store.
    pub saved: Vec<String>,
    /// Values that were skipped.
    pub errors: Vec<ConfigReprError>,
}

/// Replace the contents of `configuration` with the entries of `group`.
///
/// The mapping is cleared first, even when the store lacks the group.
pub fn reload(
    configuration: &Configuration,
    store: &dyn ConfigStore,
    group: &str,
    parser: &LiteralParser,
) -> ReloadReport {
    configuration.clear();
    let mut report = ReloadReport::default();

    for key in store.keys(group) {
        let Some(text) = store.read_entry(group, &key) else {
            continue;
        };
        match parser.parse(&text) {
            Ok(value) => {
                configuration.insert(&key, value);
                report.loaded.push(key);
            }
            Err(e) => {
                let message = traceback(&format!("Bad config value for '{key}': {text}"), &e);
                report.errors.push(ConfigParseError {
                    key,
                    text,
                    message,
                });
            }
        }
    }

    debug!(
        "Reloaded {} configuration entries from group '{}' ({} skipped)",
        report.loaded.len(),
        group,
        report.errors.len()
    );
    report
}

/// Write every entry of `configuration` into `group`, then sync the store.
///
/// Per-entry failures are collected in the report; only a failing sync is an
/// error.
pub fn save(
    configuration: &Configuration,
    store: &mut dyn ConfigStore,
    group: &str,
) -> Result<SaveReport, StoreError> {
    let mut report = SaveReport::default();

    for (key, value) in configuration.snapshot() {
        let key = key.to_string();
        match to_literal(&value) {
            Ok(text) => {
                store.write_entry(group, &key, &text);
                report.saved.push(key);
            }
            Err(e) => {
                let message = traceback(
                    &format!("Could not get the representation of the value for '{key}'"),
                    &e,
                );
                report.errors.push(ConfigReprError { key, message });
            }
        }
    }

    store.sync()?;
    debug!(
        "Saved {} configuration entries to group '{}' ({} skipped)",
        report.saved.len(),
        group,
        report.errors.len()
    );
    Ok(report)
}
