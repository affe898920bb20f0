// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for stored resources.
//!
//! Writes require ownership. Reads require ownership unless the resource is
//! public.

use crate::auth::AuthenticatedUser;

use super::{StorageError, StorageResult};

/// Trait for resources that have an owner.
pub trait OwnedResource {
    /// Get the owner's user ID.
    fn owner_user_id(&self) -> &str;

    /// Whether anyone may read the resource.
    fn is_public(&self) -> bool {
        false
    }
}

/// Trait for enforcing ownership on storage operations.
pub trait OwnershipEnforcer {
    /// Verify that the user owns this resource.
    ///
    /// # Errors
    /// Returns `StorageError::PermissionDenied` if the user doesn't own the resource.
    fn verify_ownership(&self, user: &AuthenticatedUser) -> StorageResult<()>;

    /// Verify that the caller (if any) may read this resource.
    fn verify_read_access(&self, user: Option<&AuthenticatedUser>) -> StorageResult<()>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, user: &AuthenticatedUser) -> StorageResult<()> {
        if self.owner_user_id() == user.user_id {
            Ok(())
        } else {
            Err(StorageError::PermissionDenied {
                user_id: user.user_id.clone(),
                resource: "resource".to_string(),
            })
        }
    }

    fn verify_read_access(&self, user: Option<&AuthenticatedUser>) -> StorageResult<()> {
        if self.is_public() {
            return Ok(());
        }
        match user {
            Some(user) => self.verify_ownership(user),
            None => Err(StorageError::PermissionDenied {
                user_id: "anonymous".to_string(),
                resource: "resource".to_string(),
            }),
        }
    }
}
