//! Selection filters shared by the catalog and order views.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::status::OrderStatus;

/// Wire value meaning "no filter".
pub const ALL: &str = "all";

/// Category selection for the catalog view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    /// Whether a product in `category` passes this filter.
    #[must_use]
    pub fn matches(&self, category: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(selected) => selected == category,
        }
    }

    /// Parse the wire value; empty strings and `"all"` select everything.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.is_empty() || value == ALL {
            Self::All
        } else {
            Self::Only(value.to_owned())
        }
    }

    /// Wire value for this filter.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL,
            Self::Only(category) => category,
        }
    }
}

impl From<Option<String>> for CategoryFilter {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map_or(Self::All, Self::parse)
    }
}

impl Serialize for CategoryFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CategoryFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

/// Status selection for the order view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(OrderStatus),
}

impl StatusFilter {
    /// Whether an order in `status` passes this filter.
    #[must_use]
    pub fn matches(self, status: OrderStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(selected) => selected == status,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == ALL {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

impl<'de> Deserialize<'de> for StatusFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_category_all_matches_everything() {
        let filter = CategoryFilter::parse("all");
        assert_eq!(filter, CategoryFilter::All);
        assert!(filter.matches("drinks"));
        assert!(filter.matches(""));
    }

    #[test]
    fn test_category_only_is_exact() {
        let filter = CategoryFilter::parse("drinks");
        assert!(filter.matches("drinks"));
        assert!(!filter.matches("Drinks"));
        assert_eq!(filter.as_str(), "drinks");
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "ready".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(OrderStatus::Ready)
        );
        assert!("lost".parse::<StatusFilter>().is_err());
    }
}
