// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Who the current user may message.
//!
//! | Role   | Sees                                     |
//! |--------|------------------------------------------|
//! | family | staff, plus residents linked to them     |
//! | staff  | staff and family                         |
//! | admin  | staff, family, and admins                |
//! | other  | every profile                            |
//!
//! The current user never appears in their own list.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use haven_core::types::{Profile, ResidentRecord};
use haven_core::{DirectoryStore, HavenError, Role, UserId};

/// Someone the current user can open a conversation with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPartner {
    pub id: UserId,
    pub name: String,
    pub surname: String,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub avatar: Option<String>,
    pub care_level: Option<String>,
    pub is_resident: bool,
}

impl ChatPartner {
    /// "Name Surname", or just the name when there is no surname.
    pub fn display_name(&self) -> String {
        if self.surname.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.surname)
        }
    }

    fn from_profile(profile: Profile) -> Self {
        let name = display_name(profile.name.as_deref(), profile.email.as_deref());
        Self {
            role: profile.role(),
            id: profile.id,
            name,
            surname: profile.surname.unwrap_or_default(),
            email: profile.email,
            avatar: None,
            care_level: None,
            is_resident: false,
        }
    }

    fn from_resident(resident: ResidentRecord) -> Self {
        Self {
            id: resident.id,
            name: display_name(resident.fullname.as_deref(), None),
            surname: String::new(),
            email: None,
            role: Some(Role::Resident),
            avatar: resident.avatar,
            care_level: resident.care_level,
            is_resident: true,
        }
    }
}

/// First non-blank of: the name, the email's local part, `"Unknown"`.
fn display_name(name: Option<&str>, email: Option<&str>) -> String {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .or_else(|| {
            email
                .and_then(|e| e.split('@').next())
                .filter(|local| !local.is_empty())
        })
        .unwrap_or("Unknown")
        .to_string()
}

/// Narrows a partner list to one role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoleFilter {
    #[default]
    All,
    Only(Role),
}

impl RoleFilter {
    pub fn accepts(&self, partner: &ChatPartner) -> bool {
        match self {
            RoleFilter::All => true,
            RoleFilter::Only(role) => partner.role == Some(*role),
        }
    }

    pub fn apply<'a>(&self, partners: &'a [ChatPartner]) -> Vec<&'a ChatPartner> {
        partners.iter().filter(|p| self.accepts(p)).collect()
    }
}

impl FromStr for RoleFilter {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(RoleFilter::All)
        } else {
            Role::from_str(s).map(RoleFilter::Only)
        }
    }
}

/// Role-aware partner lookup over a [`DirectoryStore`].
#[derive(Clone)]
pub struct ChatDirectory {
    store: Arc<dyn DirectoryStore>,
}

impl ChatDirectory {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    /// Roles whose profiles `role` may message. Empty means no restriction.
    pub fn visible_roles(role: Option<Role>) -> &'static [Role] {
        match role {
            Some(Role::Family) => &[Role::Staff],
            Some(Role::Staff) => &[Role::Staff, Role::Family],
            Some(Role::Admin) => &[Role::Staff, Role::Family, Role::Admin],
            Some(Role::Resident) | None => &[],
        }
    }

    /// Everyone `self_id` may message.
    ///
    /// Failing to read the caller's own profile or the profile list is an
    /// error. For family members, a failed family or resident lookup is
    /// logged and the residents are left out.
    pub async fn partners(&self, self_id: &UserId) -> Result<Vec<ChatPartner>, HavenError> {
        let me = self.store.profile(self_id).await?;
        let role = me.role();
        let roles = Self::visible_roles(role);

        let mut partners: Vec<ChatPartner> = self
            .store
            .profiles_with_roles(self_id, roles)
            .await?
            .into_iter()
            .filter(|p| &p.id != self_id)
            .map(ChatPartner::from_profile)
            .collect();

        if role == Some(Role::Family) {
            partners.extend(self.linked_residents(&me).await);
        }

        debug!(
            user_id = %self_id,
            role = ?role,
            count = partners.len(),
            "chat partners resolved"
        );
        Ok(partners)
    }

    async fn linked_residents(&self, me: &Profile) -> Vec<ChatPartner> {
        let Some(email) = me.email.as_deref() else {
            return Vec::new();
        };
        let family = match self.store.family_by_email(email).await {
            Ok(Some(family)) => family,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(user_id = %me.id, error = %e, "family record lookup failed");
                return Vec::new();
            }
        };
        match self.store.residents_of_family(&family.id).await {
            Ok(residents) => residents
                .into_iter()
                .map(ChatPartner::from_resident)
                .collect(),
            Err(e) => {
                warn!(family_id = %family.id, error = %e, "resident lookup failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_fallbacks() {
        assert_eq!(display_name(Some("Ada"), Some("ada@x.org")), "Ada");
        assert_eq!(display_name(Some("  "), Some("grace@x.org")), "grace");
        assert_eq!(display_name(None, Some("@x.org")), "Unknown");
        assert_eq!(display_name(None, None), "Unknown");
    }

    #[test]
    fn role_filter_parses() {
        assert_eq!("all".parse::<RoleFilter>().unwrap(), RoleFilter::All);
        assert_eq!(
            "Staff".parse::<RoleFilter>().unwrap(),
            RoleFilter::Only(Role::Staff)
        );
        assert!("janitor".parse::<RoleFilter>().is_err());
    }

    #[test]
    fn visible_roles_by_role() {
        assert_eq!(ChatDirectory::visible_roles(Some(Role::Family)), &[Role::Staff]);
        assert_eq!(
            ChatDirectory::visible_roles(Some(Role::Admin)),
            &[Role::Staff, Role::Family, Role::Admin]
        );
        assert!(ChatDirectory::visible_roles(None).is_empty());
    }

    #[test]
    fn partner_display_name_joins_surname() {
        let partner = ChatPartner::from_profile(Profile {
            id: "s1".into(),
            email: Some("nurse@care.org".into()),
            name: None,
            surname: Some("Okafor".into()),
            role: Some("staff".into()),
            created_at: None,
        });
        assert_eq!(partner.display_name(), "nurse Okafor");
        assert!(RoleFilter::Only(Role::Staff).accepts(&partner));
        assert!(!RoleFilter::Only(Role::Family).accepts(&partner));
    }
}
