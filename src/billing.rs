//! Unit prices per category and the billing report they produce for a period.

use crate::error::Res;
use crate::model::{Amount, DateRange, Snapshot, Source};
use anyhow::{bail, ensure};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `{source → {category → unit price}}`. Categories without a price bill at zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillingTable(BTreeMap<Source, BTreeMap<String, Amount>>);

impl BillingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from raw prices, rejecting categories the source does not declare and
    /// negative prices.
    pub fn from_prices(prices: BTreeMap<Source, BTreeMap<String, Amount>>) -> Res<Self> {
        let mut table = Self::new();
        for (source, categories) in prices {
            for (category, price) in categories {
                table.set(source, &category, price)?;
            }
        }
        Ok(table)
    }

    pub fn set(&mut self, source: Source, category: &str, price: Amount) -> Res<()> {
        let Some(declared) = source.category(category.trim()) else {
            bail!("'{category}' is not a category of {source}");
        };
        ensure!(
            !price.is_negative(),
            "The price of {source}.{category} is negative ({price})"
        );
        self.0
            .entry(source)
            .or_default()
            .insert(declared.key().to_string(), price.plain());
        Ok(())
    }

    /// The unit price of a category, zero when none is configured.
    pub fn price(&self, source: Source, category: &str) -> Amount {
        self.0
            .get(&source)
            .and_then(|prices| prices.get(category))
            .copied()
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    pub fn prices(&self) -> &BTreeMap<Source, BTreeMap<String, Amount>> {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingLine {
    pub category: String,
    pub label: String,
    pub count: i64,
    pub unit_price: Amount,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSection {
    pub source: Source,
    pub lines: Vec<BillingLine>,
    pub total: Amount,
}

/// `count × unit price` for every category of every source, with per-source and overall totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingReport {
    pub period: DateRange,
    pub sections: Vec<BillingSection>,
    pub total: Amount,
}

impl BillingReport {
    pub fn section(&self, source: Source) -> Option<&BillingSection> {
        self.sections.iter().find(|s| s.source == source)
    }

    /// The section total for a source, zero when the source has no section.
    pub fn section_total(&self, source: Source) -> Amount {
        self.section(source).map(|s| s.total).unwrap_or_default()
    }
}

/// Prices the snapshot's counts.
pub fn bill(snapshot: &Snapshot, table: &BillingTable) -> BillingReport {
    let mut sections = Vec::with_capacity(Source::ALL.len());
    let mut grand_total = Decimal::ZERO;

    for source in Source::ALL {
        let mut lines = Vec::new();
        let mut section_total = Decimal::ZERO;
        if let Some(counts) = snapshot.counts(source) {
            for entry in counts.iter() {
                let unit_price = table.price(source, &entry.category);
                let amount = unit_price.value() * Decimal::from(entry.count);
                section_total += amount;
                lines.push(BillingLine {
                    label: source
                        .category(&entry.category)
                        .map(|c| c.label().to_string())
                        .unwrap_or_else(|| entry.category.clone()),
                    category: entry.category.clone(),
                    count: entry.count,
                    unit_price,
                    amount: Amount::new(amount),
                });
            }
        }
        grand_total += section_total;
        sections.push(BillingSection {
            source,
            lines,
            total: Amount::new(section_total),
        });
    }

    BillingReport {
        period: snapshot.period(),
        sections,
        total: Amount::new(grand_total),
    }
}
