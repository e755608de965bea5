//! Access control seams
//!
//! Group membership is owned by an external system. The pipeline only consumes it
//! through [`GroupMembership`]; [`MembershipAccessChecker`] turns membership standing into
//! the two decisions the asset surface needs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::Asset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupPermission {
    Admin,
    Member,
    Viewer,
}

impl GroupPermission {
    pub fn can_upload(&self) -> bool {
        matches!(self, GroupPermission::Admin | GroupPermission::Member)
    }
}

impl Display for GroupPermission {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            GroupPermission::Admin => write!(f, "admin"),
            GroupPermission::Member => write!(f, "member"),
            GroupPermission::Viewer => write!(f, "viewer"),
        }
    }
}

impl FromStr for GroupPermission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(GroupPermission::Admin),
            "member" => Ok(GroupPermission::Member),
            "viewer" => Ok(GroupPermission::Viewer),
            _ => Err(anyhow::anyhow!("Invalid group permission: {}", s)),
        }
    }
}

/// Membership lookup provided by the group system.
#[async_trait]
pub trait GroupMembership: Send + Sync {
    /// Standing of `user_id` in `group_id`, or `None` when not a member.
    async fn permission(&self, group_id: i64, user_id: i64)
        -> Result<Option<GroupPermission>, AppError>;

    /// Groups in which `user_id` holds any standing, ascending.
    async fn groups_for_user(&self, user_id: i64) -> Result<Vec<i64>, AppError>;
}

/// Access decisions for assets and group uploads.
#[async_trait]
pub trait AccessChecker: Send + Sync {
    async fn can_access(&self, asset: &Asset, user_id: i64) -> Result<bool, AppError>;

    async fn can_upload_to_group(&self, group_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Groups whose assets `user_id` may see.
    async fn visible_groups(&self, user_id: i64) -> Result<Vec<i64>, AppError>;
}

/// Owner always has access; group assets are visible to any member of the group;
/// uploading into a group requires member or admin standing.
#[derive(Clone)]
pub struct MembershipAccessChecker {
    membership: Arc<dyn GroupMembership>,
}

impl MembershipAccessChecker {
    pub fn new(membership: Arc<dyn GroupMembership>) -> Self {
        Self { membership }
    }
}

#[async_trait]
impl AccessChecker for MembershipAccessChecker {
    async fn can_access(&self, asset: &Asset, user_id: i64) -> Result<bool, AppError> {
        if asset.owner_user_id == user_id {
            return Ok(true);
        }
        match asset.group_id {
            Some(group_id) => Ok(self.membership.permission(group_id, user_id).await?.is_some()),
            None => Ok(false),
        }
    }

    async fn can_upload_to_group(&self, group_id: i64, user_id: i64) -> Result<bool, AppError> {
        Ok(self
            .membership
            .permission(group_id, user_id)
            .await?
            .map(|p| p.can_upload())
            .unwrap_or(false))
    }

    async fn visible_groups(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        self.membership.groups_for_user(user_id).await
    }
}
