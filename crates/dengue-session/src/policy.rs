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

//! Static permission policy for menus and user actions
//!
//! Each gated capability maps to the set of codes an actor must hold, all of
//! them. An empty set means the capability is open to everyone. Gating a new
//! capability is one enum variant plus one table row.

use crate::error::SessionError;
use crate::permissions::PermissionCode::{self, *};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Navigation entries of the application menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuItem {
    Home,
    Profile,
    Publications,
    CaseReport,
    MyCases,
    AllCases,
    CaseMap,
    Hospitals,
    Users,
    Roles,
    Permissions,
    Statistics,
    Reports,
}

/// Operations a user can trigger from within a screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    ViewOwnProfile,
    ReportCase,
    EditCase,
    DeleteCase,
    ExportCases,
    CreatePublication,
    EditPublication,
    DeletePublication,
    ManageHospitals,
    CreateUser,
    EditUser,
    DeleteUser,
    ManageRoles,
    ManagePermissions,
}

/// Menu requirement table, in display order
pub const MENU_REQUIREMENTS: &[(MenuItem, &[PermissionCode])] = &[
    (MenuItem::Home, &[]),
    (MenuItem::Profile, &[]),
    (MenuItem::Publications, &[PublicationView]),
    (MenuItem::CaseReport, &[CaseCreate]),
    (MenuItem::MyCases, &[CaseViewOwn]),
    (MenuItem::AllCases, &[CaseViewAll]),
    (MenuItem::CaseMap, &[MapView, CaseViewAll]),
    (MenuItem::Hospitals, &[HospitalView]),
    (MenuItem::Users, &[UserViewAll]),
    (MenuItem::Roles, &[RoleView]),
    (MenuItem::Permissions, &[PermissionView]),
    (MenuItem::Statistics, &[StatisticsView]),
    (MenuItem::Reports, &[ReportView]),
];

/// Action requirement table
pub const ACTION_REQUIREMENTS: &[(UserAction, &[PermissionCode])] = &[
    (UserAction::ViewOwnProfile, &[]),
    (UserAction::ReportCase, &[CaseCreate]),
    (UserAction::EditCase, &[CaseUpdate]),
    (UserAction::DeleteCase, &[CaseDelete]),
    (UserAction::ExportCases, &[CaseExport, CaseViewAll]),
    (UserAction::CreatePublication, &[PublicationCreate]),
    (UserAction::EditPublication, &[PublicationUpdate]),
    (UserAction::DeletePublication, &[PublicationDelete]),
    (UserAction::ManageHospitals, &[HospitalManage]),
    (UserAction::CreateUser, &[UserCreate]),
    (UserAction::EditUser, &[UserUpdate]),
    (UserAction::DeleteUser, &[UserDelete]),
    (UserAction::ManageRoles, &[RoleManage]),
    (UserAction::ManagePermissions, &[PermissionManage]),
];

impl MenuItem {
    pub const ALL: &'static [MenuItem] = &[
        MenuItem::Home,
        MenuItem::Profile,
        MenuItem::Publications,
        MenuItem::CaseReport,
        MenuItem::MyCases,
        MenuItem::AllCases,
        MenuItem::CaseMap,
        MenuItem::Hospitals,
        MenuItem::Users,
        MenuItem::Roles,
        MenuItem::Permissions,
        MenuItem::Statistics,
        MenuItem::Reports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MenuItem::Home => "home",
            MenuItem::Profile => "profile",
            MenuItem::Publications => "publications",
            MenuItem::CaseReport => "case_report",
            MenuItem::MyCases => "my_cases",
            MenuItem::AllCases => "all_cases",
            MenuItem::CaseMap => "case_map",
            MenuItem::Hospitals => "hospitals",
            MenuItem::Users => "users",
            MenuItem::Roles => "roles",
            MenuItem::Permissions => "permissions",
            MenuItem::Statistics => "statistics",
            MenuItem::Reports => "reports",
        }
    }
}

impl UserAction {
    pub const ALL: &'static [UserAction] = &[
        UserAction::ViewOwnProfile,
        UserAction::ReportCase,
        UserAction::EditCase,
        UserAction::DeleteCase,
        UserAction::ExportCases,
        UserAction::CreatePublication,
        UserAction::EditPublication,
        UserAction::DeletePublication,
        UserAction::ManageHospitals,
        UserAction::CreateUser,
        UserAction::EditUser,
        UserAction::DeleteUser,
        UserAction::ManageRoles,
        UserAction::ManagePermissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserAction::ViewOwnProfile => "view_own_profile",
            UserAction::ReportCase => "report_case",
            UserAction::EditCase => "edit_case",
            UserAction::DeleteCase => "delete_case",
            UserAction::ExportCases => "export_cases",
            UserAction::CreatePublication => "create_publication",
            UserAction::EditPublication => "edit_publication",
            UserAction::DeletePublication => "delete_publication",
            UserAction::ManageHospitals => "manage_hospitals",
            UserAction::CreateUser => "create_user",
            UserAction::EditUser => "edit_user",
            UserAction::DeleteUser => "delete_user",
            UserAction::ManageRoles => "manage_roles",
            UserAction::ManagePermissions => "manage_permissions",
        }
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MenuItem {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MenuItem::ALL.iter().copied().find(|item| item.as_str() == s).ok_or_else(|| SessionError::InvalidData {
            message: format!("Unknown menu item: {}", s),
        })
    }
}

impl FromStr for UserAction {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserAction::ALL.iter().copied().find(|action| action.as_str() == s).ok_or_else(|| SessionError::InvalidData {
            message: format!("Unknown user action: {}", s),
        })
    }
}

/// Lookup tables consumed by the access evaluator
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    menus: HashMap<MenuItem, Vec<PermissionCode>>,
    actions: HashMap<UserAction, Vec<PermissionCode>>,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl PermissionPolicy {
    /// Policy built from [`MENU_REQUIREMENTS`] and [`ACTION_REQUIREMENTS`]
    pub fn standard() -> Self {
        Self {
            menus: MENU_REQUIREMENTS.iter().map(|(menu, codes)| (*menu, codes.to_vec())).collect(),
            actions: ACTION_REQUIREMENTS.iter().map(|(action, codes)| (*action, codes.to_vec())).collect(),
        }
    }

    /// Replace the requirement of one menu item
    pub fn with_menu_requirement(mut self, menu: MenuItem, codes: &[PermissionCode]) -> Self {
        self.menus.insert(menu, codes.to_vec());
        self
    }

    /// Replace the requirement of one action
    pub fn with_action_requirement(mut self, action: UserAction, codes: &[PermissionCode]) -> Self {
        self.actions.insert(action, codes.to_vec());
        self
    }

    pub fn menu_requirement(&self, menu: MenuItem) -> Option<&[PermissionCode]> {
        self.menus.get(&menu).map(Vec::as_slice)
    }

    pub fn action_requirement(&self, action: UserAction) -> Option<&[PermissionCode]> {
        self.actions.get(&action).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_capability_has_a_row() {
        let policy = PermissionPolicy::standard();
        for menu in MenuItem::ALL {
            assert!(policy.menu_requirement(*menu).is_some(), "missing menu row for {}", menu);
        }
        for action in UserAction::ALL {
            assert!(policy.action_requirement(*action).is_some(), "missing action row for {}", action);
        }
        assert_eq!(MENU_REQUIREMENTS.len(), MenuItem::ALL.len());
        assert_eq!(ACTION_REQUIREMENTS.len(), UserAction::ALL.len());
    }

    #[test]
    fn test_open_capabilities() {
        let policy = PermissionPolicy::standard();
        assert_eq!(policy.menu_requirement(MenuItem::Home), Some(&[][..]));
        assert_eq!(policy.action_requirement(UserAction::ViewOwnProfile), Some(&[][..]));
        assert_eq!(policy.menu_requirement(MenuItem::CaseMap), Some(&[MapView, CaseViewAll][..]));
    }

    #[test]
    fn test_override_requirement() {
        let policy = PermissionPolicy::standard().with_menu_requirement(MenuItem::Home, &[ReportView]);
        assert_eq!(policy.menu_requirement(MenuItem::Home), Some(&[ReportView][..]));
    }

    #[test]
    fn test_names_parse_back() {
        for menu in MenuItem::ALL {
            assert_eq!(menu.as_str().parse::<MenuItem>().unwrap(), *menu);
        }
        for action in UserAction::ALL {
            assert_eq!(action.as_str().parse::<UserAction>().unwrap(), *action);
        }
        assert!("settings".parse::<MenuItem>().is_err());
    }
}
