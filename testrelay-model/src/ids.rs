// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use newtype_uuid::{TypedUuid, TypedUuidKind, TypedUuidTag};

/// The kind for [`LaunchUuid`].
pub enum LaunchKind {}

impl TypedUuidKind for LaunchKind {
    #[inline]
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("launch");
        TAG
    }
}

/// A temporary identifier for a launch.
///
/// Temporary identifiers are assigned by the client at the moment a launch is
/// requested, before the backend has acknowledged it.
pub type LaunchUuid = TypedUuid<LaunchKind>;

/// The kind for [`ItemUuid`].
pub enum ItemKind {}

impl TypedUuidKind for ItemKind {
    #[inline]
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("item");
        TAG
    }
}

/// A temporary identifier for a suite, test or step.
pub type ItemUuid = TypedUuid<ItemKind>;
