//! Signature verification status of a commit.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum CommitStatus {
    #[sea_orm(string_value = "Verified")]
    Verified,
    #[sea_orm(string_value = "Unverified")]
    #[default]
    Unverified,
}

impl CommitStatus {
    #[inline]
    pub fn from_verified(verified: bool) -> Self {
        if verified {
            Self::Verified
        } else {
            Self::Unverified
        }
    }

    #[inline]
    pub fn is_verified(self) -> bool {
        self == Self::Verified
    }
}

impl std::fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitStatus::Verified => write!(f, "Verified"),
            CommitStatus::Unverified => write!(f, "Unverified"),
        }
    }
}
