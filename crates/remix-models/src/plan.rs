//! Static price catalog: maps billing price ids to a tier and a credit grant.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::profile::SubscriptionTier;

/// Errors raised while parsing a catalog definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanCatalogError {
    #[error("plan entry '{0}' must look like price_id:tier:credits")]
    Malformed(String),

    #[error("plan entry '{entry}' has unknown tier '{tier}'")]
    UnknownTier { entry: String, tier: String },

    #[error("plan entry '{0}' has an invalid credit amount")]
    InvalidCredits(String),

    #[error("price id '{0}' is listed twice")]
    Duplicate(String),
}

/// One purchasable subscription price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub price_id: String,
    pub tier: SubscriptionTier,
    /// Credits granted on each renewal invoice.
    pub credits: i64,
}

/// Price id lookup table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanCatalog {
    entries: HashMap<String, PlanEntry>,
}

impl PlanCatalog {
    /// Parse `price_id:tier:credits` entries separated by commas.
    ///
    /// Blank input yields an empty catalog.
    pub fn parse(spec: &str) -> Result<Self, PlanCatalogError> {
        let mut entries = HashMap::new();

        for raw in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
            let [price_id, tier, credits] = parts.as_slice() else {
                return Err(PlanCatalogError::Malformed(raw.to_string()));
            };
            if price_id.is_empty() {
                return Err(PlanCatalogError::Malformed(raw.to_string()));
            }

            let tier = SubscriptionTier::parse(tier).ok_or_else(|| PlanCatalogError::UnknownTier {
                entry: raw.to_string(),
                tier: tier.to_string(),
            })?;
            let credits: i64 = credits
                .parse()
                .ok()
                .filter(|c| *c > 0)
                .ok_or_else(|| PlanCatalogError::InvalidCredits(raw.to_string()))?;

            let entry = PlanEntry {
                price_id: price_id.to_string(),
                tier,
                credits,
            };
            if entries.insert(price_id.to_string(), entry).is_some() {
                return Err(PlanCatalogError::Duplicate(price_id.to_string()));
            }
        }

        Ok(Self { entries })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = PlanEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.price_id.clone(), e))
                .collect(),
        }
    }

    pub fn get(&self, price_id: &str) -> Option<&PlanEntry> {
        self.entries.get(price_id)
    }

    pub fn credits_for_price(&self, price_id: &str) -> Option<i64> {
        self.get(price_id).map(|e| e.credits)
    }

    pub fn tier_for_price(&self, price_id: &str) -> Option<SubscriptionTier> {
        self.get(price_id).map(|e| e.tier)
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

    #[test]
    fn test_parse_catalog() {
        let c = PlanCatalog::parse("price_pro:pro:100, price_studio:Studio:400").unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.credits_for_price("price_pro"), Some(100));
        assert_eq!(c.tier_for_price("price_studio"), Some(SubscriptionTier::Studio));
        assert_eq!(c.credits_for_price("price_unknown"), None);
    }

    #[test]
    fn test_blank_catalog_is_empty() {
        assert!(PlanCatalog::parse("  ").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_entries() {
        assert!(matches!(
            PlanCatalog::parse("price_pro:pro"),
            Err(PlanCatalogError::Malformed(_))
        ));
        assert!(matches!(
            PlanCatalog::parse("price_pro:gold:10"),
            Err(PlanCatalogError::UnknownTier { .. })
        ));
        assert!(matches!(
            PlanCatalog::parse("price_pro:pro:-5"),
            Err(PlanCatalogError::InvalidCredits(_))
        ));
        assert!(matches!(
            PlanCatalog::parse("p:pro:1,p:studio:2"),
            Err(PlanCatalogError::Duplicate(_))
        ));
    }
}
