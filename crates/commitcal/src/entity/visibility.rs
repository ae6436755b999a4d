//! Visibility enum for repository access levels.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Repository visibility as reported by the hosting platform.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[sea_orm(string_value = "public")]
    #[default]
    Public,
    #[sea_orm(string_value = "private")]
    Private,
}

impl Visibility {
    /// Map the platform's `private` flag onto a visibility level.
    #[inline]
    pub fn from_private_flag(private: bool) -> Self {
        if private { Self::Private } else { Self::Public }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_public() {
        assert_eq!(Visibility::default(), Visibility::Public);
    }

    #[test]
    fn private_flag_maps_to_visibility() {
        assert_eq!(Visibility::from_private_flag(true), Visibility::Private);
        assert_eq!(Visibility::from_private_flag(false), Visibility::Public);
        assert_eq!(Visibility::Private.to_string(), "private");
    }
}
