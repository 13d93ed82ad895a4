//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data that maintains
//! required invariants.

use crate::fixtures::User;
use proptest::prelude::*;
use tether_store::EntityId;

/// Strategy for generating user names.
pub fn user_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{1,11}").expect("Invalid regex")
}

/// Strategy for generating assigned entity IDs (never the unsaved
/// sentinel).
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    (1u64..1_000_000).prop_map(EntityId::new)
}

/// Strategy for generating transient users.
pub fn transient_user_strategy() -> impl Strategy<Value = User> {
    user_name_strategy().prop_map(|name| User::new(name))
}

/// Strategy for generating detached-looking users: an assigned
/// identifier the store may or may not know about.
pub fn detached_user_strategy() -> impl Strategy<Value = User> {
    (entity_id_strategy(), user_name_strategy()).prop_map(|(id, name)| User::with_id(id, name))
}

/// Strategy for generating a batch of distinct transient users.
pub fn user_batch_strategy(max: usize) -> impl Strategy<Value = Vec<User>> {
    prop::collection::vec(transient_user_strategy(), 1..max.max(2))
}
