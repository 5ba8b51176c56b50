//! Static company reference data.
//!
//! Built once at start-up from the built-in entries plus any `[company.X]`
//! config sections, then only read.

use std::collections::HashMap;

use crate::domain::ticker::TickerSymbol;
use crate::ports::config_port::ConfigPort;

pub const UNKNOWN_NAME: &str = "Unknown";
pub const NO_DESCRIPTION: &str = "No Description Available";

const COMPANY_SECTION_PREFIX: &str = "company.";

const BUILTIN: &[(&str, &str, &str)] = &[
    ("F", "Ford", "Ford is an automobile manufacturer"),
    ("GOOG", "Google", "Google is a search engine"),
    ("META", "Meta", "Meta operates the Facebook online social network"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyInfo {
    pub name: String,
    pub description: String,
}

impl CompanyInfo {
    pub fn placeholder() -> Self {
        Self {
            name: UNKNOWN_NAME.to_string(),
            description: NO_DESCRIPTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DescriptionTable {
    entries: HashMap<TickerSymbol, CompanyInfo>,
}

impl DescriptionTable {
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .filter_map(|(ticker, name, description)| {
                let ticker = TickerSymbol::parse(ticker).ok()?;
                Some((
                    ticker,
                    CompanyInfo {
                        name: name.to_string(),
                        description: description.to_string(),
                    },
                ))
            })
            .collect();
        Self { entries }
    }

    /// Built-in entries overlaid with `[company.<TICKER>]` sections.
    ///
    /// A section may set only one of `name`/`description`; the other keeps
    /// the built-in value or falls back to the placeholder.
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let mut table = Self::builtin();
        for section in config.sections() {
            let Some(raw) = section.strip_prefix(COMPANY_SECTION_PREFIX) else {
                continue;
            };
            let Ok(ticker) = TickerSymbol::parse(raw) else {
                log::warn!("ignoring config section [{section}]: not a ticker");
                continue;
            };
            let current = table.describe(&ticker);
            let info = CompanyInfo {
                name: config.get_string(&section, "name").unwrap_or(current.name),
                description: config
                    .get_string(&section, "description")
                    .unwrap_or(current.description),
            };
            table.entries.insert(ticker, info);
        }
        table
    }

    pub fn with_entry(mut self, ticker: TickerSymbol, info: CompanyInfo) -> Self {
        self.entries.insert(ticker, info);
        self
    }

    /// Never fails: unknown tickers get [`CompanyInfo::placeholder`].
    pub fn describe(&self, ticker: &TickerSymbol) -> CompanyInfo {
        self.entries
            .get(ticker)
            .cloned()
            .unwrap_or_else(CompanyInfo::placeholder)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TickerSymbol {
        TickerSymbol::parse(s).unwrap()
    }

    #[test]
    fn unknown_ticker_gets_placeholder() {
        let info = DescriptionTable::builtin().describe(&t("ZZZZ"));
        assert_eq!(info.name, "Unknown");
        assert_eq!(info.description, "No Description Available");
    }

    #[test]
    fn builtin_lookup_is_case_insensitive() {
        let info = DescriptionTable::builtin().describe(&t("goog"));
        assert_eq!(info.name, "Google");
        assert_eq!(info.description, "Google is a search engine");
    }

    #[test]
    fn with_entry_overrides() {
        let table = DescriptionTable::default().with_entry(
            t("NVDA"),
            CompanyInfo {
                name: "Nvidia".into(),
                description: "GPUs".into(),
            },
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.describe(&t("NVDA")).name, "Nvidia");
    }
}
