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

//! Permission codes and permission sets

use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Functional area a permission code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionCategory {
    Cases,
    Map,
    Hospitals,
    Publications,
    Users,
    Roles,
    Permissions,
    Reports,
}

macro_rules! permission_codes {
    ($($variant:ident => ($code:literal, $category:ident, $description:literal)),+ $(,)?) => {
        /// Atomic named capability.
        ///
        /// The universe of codes is closed: anything not listed here cannot
        /// enter a [`PermissionSet`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum PermissionCode {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl PermissionCode {
            /// Every known permission code
            pub const ALL: &'static [PermissionCode] = &[$(PermissionCode::$variant),+];

            /// Wire representation, e.g. `CASE_VIEW_ALL`
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(PermissionCode::$variant => $code,)+
                }
            }

            pub fn category(&self) -> PermissionCategory {
                match self {
                    $(PermissionCode::$variant => PermissionCategory::$category,)+
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $(PermissionCode::$variant => $description,)+
                }
            }
        }
    };
}

permission_codes! {
    CaseViewAll => ("CASE_VIEW_ALL", Cases, "View every reported dengue case"),
    CaseViewOwn => ("CASE_VIEW_OWN", Cases, "View cases reported by the signed-in user"),
    CaseCreate => ("CASE_CREATE", Cases, "Report a new dengue case"),
    CaseUpdate => ("CASE_UPDATE", Cases, "Edit an existing case"),
    CaseDelete => ("CASE_DELETE", Cases, "Delete a case"),
    CaseExport => ("CASE_EXPORT", Cases, "Export case data"),
    MapView => ("MAP_VIEW", Map, "Open the geolocated case map"),
    HospitalView => ("HOSPITAL_VIEW", Hospitals, "View hospitals and health centres"),
    HospitalManage => ("HOSPITAL_MANAGE", Hospitals, "Create, edit and remove hospitals"),
    PublicationView => ("PUBLICATION_VIEW", Publications, "Read published content"),
    PublicationCreate => ("PUBLICATION_CREATE", Publications, "Create publications"),
    PublicationUpdate => ("PUBLICATION_UPDATE", Publications, "Edit publications"),
    PublicationDelete => ("PUBLICATION_DELETE", Publications, "Delete publications"),
    UserViewAll => ("USER_VIEW_ALL", Users, "List every registered user"),
    UserCreate => ("USER_CREATE", Users, "Register users on behalf of others"),
    UserUpdate => ("USER_UPDATE", Users, "Edit user accounts"),
    UserDelete => ("USER_DELETE", Users, "Deactivate user accounts"),
    RoleView => ("ROLE_VIEW", Roles, "View roles"),
    RoleManage => ("ROLE_MANAGE", Roles, "Create and edit roles"),
    PermissionView => ("PERMISSION_VIEW", Permissions, "View role permission assignments"),
    PermissionManage => ("PERMISSION_MANAGE", Permissions, "Change role permission assignments"),
    ReportView => ("REPORT_VIEW", Reports, "View epidemiological reports"),
    StatisticsView => ("STATISTICS_VIEW", Reports, "View case statistics dashboards"),
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionCode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| SessionError::InvalidPermission { code: s.to_string() })
    }
}

/// Codes granted to one actor at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    codes: BTreeSet<PermissionCode>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse code strings, rejecting anything outside the known universe
    pub fn parse<I, S>(codes: I) -> SessionResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes.into_iter().map(|code| code.as_ref().parse::<PermissionCode>()).collect()
    }

    /// Parse code strings, silently skipping unknown ones. Returns the set and
    /// the rejected strings so callers can log them.
    pub fn parse_lenient<I, S>(codes: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        let mut unknown = Vec::new();
        for code in codes {
            match code.as_ref().parse::<PermissionCode>() {
                Ok(parsed) => {
                    set.insert(parsed);
                }
                Err(_) => unknown.push(code.as_ref().to_string()),
            }
        }
        (set, unknown)
    }

    pub fn insert(&mut self, code: PermissionCode) -> bool {
        self.codes.insert(code)
    }

    pub fn contains(&self, code: PermissionCode) -> bool {
        self.codes.contains(&code)
    }

    /// True when any of `codes` is granted; vacuously true for an empty slice
    pub fn has_any(&self, codes: &[PermissionCode]) -> bool {
        codes.is_empty() || codes.iter().any(|code| self.codes.contains(code))
    }

    /// True when every one of `codes` is granted; vacuously true for an empty slice
    pub fn has_all(&self, codes: &[PermissionCode]) -> bool {
        codes.iter().all(|code| self.codes.contains(code))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PermissionCode> + '_ {
        self.codes.iter().copied()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.codes.iter().map(|code| code.as_str().to_string()).collect()
    }
}

impl FromIterator<PermissionCode> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = PermissionCode>>(iter: T) -> Self {
        Self {
            codes: iter.into_iter().collect(),
        }
    }
}

impl<const N: usize> From<[PermissionCode; N]> for PermissionSet {
    fn from(codes: [PermissionCode; N]) -> Self {
        codes.into_iter().collect()
    }
}
