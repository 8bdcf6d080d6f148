// Dengue Track
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Access evaluation for menus and actions
//!
//! The only gate presentation code is supposed to call. It never fails:
//! a storage error is logged and treated as a denial.

use crate::cache::PermissionCache;
use crate::permissions::{PermissionCode, PermissionSet};
use crate::policy::{MenuItem, PermissionPolicy, UserAction};
use std::sync::Arc;
use tracing::{debug, warn};

/// Decide whether `granted` satisfies `required`.
///
/// An empty requirement always passes; otherwise every required code must be
/// granted.
pub fn requirement_met(required: &[PermissionCode], granted: &PermissionSet) -> bool {
    required.is_empty() || granted.has_all(required)
}

/// Allow/deny decisions backed by the permission cache and the policy tables
#[derive(Debug, Clone)]
pub struct AccessEvaluator {
    cache: PermissionCache,
    policy: Arc<PermissionPolicy>,
}

impl AccessEvaluator {
    pub fn new(cache: PermissionCache, policy: Arc<PermissionPolicy>) -> Self {
        Self { cache, policy }
    }

    pub fn policy(&self) -> &PermissionPolicy {
        &self.policy
    }

    pub async fn can_access_menu(&self, required: &[PermissionCode]) -> bool {
        self.evaluate(required).await
    }

    pub async fn can_perform_action(&self, required: &[PermissionCode]) -> bool {
        self.evaluate(required).await
    }

    /// Gate a menu item through the policy table
    pub async fn can_open(&self, menu: MenuItem) -> bool {
        match self.policy.menu_requirement(menu) {
            Some(required) => self.can_access_menu(required).await,
            None => {
                warn!("No policy row for menu item {}, denying", menu);
                false
            }
        }
    }

    /// Gate an action through the policy table
    pub async fn can_perform(&self, action: UserAction) -> bool {
        match self.policy.action_requirement(action) {
            Some(required) => self.can_perform_action(required).await,
            None => {
                warn!("No policy row for action {}, denying", action);
                false
            }
        }
    }

    /// Menu items the current actor may open, in display order.
    ///
    /// Reads the permission set once for the whole menu.
    pub async fn visible_menu(&self) -> Vec<MenuItem> {
        let granted = self.granted().await;
        MenuItem::ALL
            .iter()
            .copied()
            .filter(|menu| self.policy.menu_requirement(*menu).is_some_and(|required| requirement_met(required, &granted)))
            .collect()
    }

    /// Actions the current actor may perform
    pub async fn allowed_actions(&self) -> Vec<UserAction> {
        let granted = self.granted().await;
        UserAction::ALL
            .iter()
            .copied()
            .filter(|action| self.policy.action_requirement(*action).is_some_and(|required| requirement_met(required, &granted)))
            .collect()
    }

    async fn evaluate(&self, required: &[PermissionCode]) -> bool {
        if required.is_empty() {
            return true;
        }
        match self.cache.has_all_permissions(required).await {
            Ok(allowed) => {
                debug!("Access check for {:?}: {}", required, allowed);
                allowed
            }
            Err(e) => {
                warn!("Permission lookup failed, denying access: {}", e);
                false
            }
        }
    }

    async fn granted(&self) -> PermissionSet {
        self.cache.permissions().await.unwrap_or_else(|e| {
            warn!("Permission lookup failed, treating as no permissions: {}", e);
            PermissionSet::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionCode::*;
    use dengue_store::{KeyValueStore, MemoryStore};
    use proptest::prelude::*;

    fn evaluator() -> (AccessEvaluator, PermissionCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = PermissionCache::new(store.clone());
        (AccessEvaluator::new(cache.clone(), Arc::new(PermissionPolicy::standard())), cache, store)
    }

    #[tokio::test]
    async fn test_fresh_store_allows_only_open_capabilities() {
        let (evaluator, _, _) = evaluator();

        assert!(evaluator.can_access_menu(&[]).await);
        assert!(!evaluator.can_access_menu(&[CaseViewAll]).await);
        assert!(evaluator.can_open(MenuItem::Home).await);
        assert!(!evaluator.can_open(MenuItem::AllCases).await);
        assert_eq!(evaluator.visible_menu().await, vec![MenuItem::Home, MenuItem::Profile]);
        assert_eq!(evaluator.allowed_actions().await, vec![UserAction::ViewOwnProfile]);
    }

    #[tokio::test]
    async fn test_menu_requires_every_code() {
        let (evaluator, cache, _) = evaluator();
        cache.save(42, 3, "ADMIN", &PermissionSet::from([CaseViewAll])).await.unwrap();

        assert!(evaluator.can_open(MenuItem::AllCases).await);
        assert!(!evaluator.can_open(MenuItem::CaseMap).await);

        cache.save(42, 3, "ADMIN", &PermissionSet::from([CaseViewAll, MapView])).await.unwrap();
        assert!(evaluator.can_open(MenuItem::CaseMap).await);
    }

    #[tokio::test]
    async fn test_actions_follow_policy() {
        let (evaluator, cache, _) = evaluator();
        cache.save(5, 2, "HEALTH_WORKER", &PermissionSet::from([CaseCreate, CaseUpdate])).await.unwrap();

        assert!(evaluator.can_perform(UserAction::ReportCase).await);
        assert!(evaluator.can_perform(UserAction::EditCase).await);
        assert!(!evaluator.can_perform(UserAction::DeleteCase).await);
        assert!(evaluator.can_perform_action(&[]).await);
    }

    #[tokio::test]
    async fn test_closed_store_denies_without_error() {
        let (evaluator, cache, store) = evaluator();
        cache.save(42, 3, "ADMIN", &PermissionSet::from([CaseViewAll])).await.unwrap();
        store.close();

        assert!(!evaluator.can_access_menu(&[CaseViewAll]).await);
        assert!(evaluator.can_access_menu(&[]).await);
        assert_eq!(evaluator.visible_menu().await, vec![MenuItem::Home, MenuItem::Profile]);
    }

    fn code_subset() -> impl Strategy<Value = Vec<PermissionCode>> {
        proptest::sample::subsequence(PermissionCode::ALL.to_vec(), 0..=PermissionCode::ALL.len())
    }

    proptest! {
        #[test]
        fn prop_menu_access_is_subset_check(granted in code_subset(), required in code_subset()) {
            let set: PermissionSet = granted.iter().copied().collect();
            let expected = required.is_empty() || required.iter().all(|code| granted.contains(code));
            prop_assert_eq!(requirement_met(&required, &set), expected);
        }

        #[test]
        fn prop_evaluator_agrees_with_cached_set(granted in code_subset(), required in code_subset()) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let set: PermissionSet = granted.iter().copied().collect();
            let (menu, action) = runtime.block_on(async {
                let (evaluator, cache, _) = evaluator();
                cache.save(1, 1, "ANY", &set).await.unwrap();
                (evaluator.can_access_menu(&required).await, evaluator.can_perform_action(&required).await)
            });
            let expected = required.is_empty() || required.iter().all(|code| granted.contains(code));
            prop_assert_eq!(menu, expected);
            prop_assert_eq!(action, expected);
        }
    }
}
