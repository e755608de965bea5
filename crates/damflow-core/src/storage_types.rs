use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

/// Named storage location. Each tier owns an independent `uploads/` tree under the
/// storage root, in a directory named after the tier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub enum StorageTier {
    #[default]
    #[serde(rename = "DAM_STORAGE1")]
    Storage1,
    #[serde(rename = "DAM_STORAGE2")]
    Storage2,
}

impl StorageTier {
    pub const ALL: [StorageTier; 2] = [StorageTier::Storage1, StorageTier::Storage2];

    /// Directory name of the tier beneath the storage root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            StorageTier::Storage1 => "DAM_STORAGE1",
            StorageTier::Storage2 => "DAM_STORAGE2",
        }
    }
}

impl Display for StorageTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.dir_name())
    }
}

impl FromStr for StorageTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAM_STORAGE1" | "STORAGE1" => Ok(StorageTier::Storage1),
            "DAM_STORAGE2" | "STORAGE2" => Ok(StorageTier::Storage2),
            _ => Err(anyhow::anyhow!("Invalid storage tier: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_round_trips_through_dir_name() {
        for tier in StorageTier::ALL {
            assert_eq!(tier.dir_name().parse::<StorageTier>().unwrap(), tier);
        }
    }

    #[test]
    fn test_tier_parse_is_case_insensitive() {
        assert_eq!(
            "dam_storage2".parse::<StorageTier>().unwrap(),
            StorageTier::Storage2
        );
        assert!("DAM_STORAGE3".parse::<StorageTier>().is_err());
    }

    #[test]
    fn test_default_tier() {
        assert_eq!(StorageTier::default(), StorageTier::Storage1);
        assert_eq!(
            serde_json::to_string(&StorageTier::Storage1).unwrap(),
            "\"DAM_STORAGE1\""
        );
    }
}
