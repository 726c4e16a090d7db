//! Application roles and raw role-claim normalization.
//!
//! Raw claim strings vary by case, by a `ROLE_` prefix, and by synonym
//! (`DELIVERY`, `COURIER`, ...). Each normalized string maps to at most one
//! [`Role`]; anything else is dropped.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::LazyLock;

/// Closed set of storefront roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Seller,
    Admin,
    DeliveryAgent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Seller => "SELLER",
            Role::Admin => "ADMIN",
            Role::DeliveryAgent => "DELIVERY_AGENT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized (uppercased, `ROLE_`-stripped) role strings to canonical roles.
static ROLE_TABLE: LazyLock<HashMap<&'static str, Role>> = LazyLock::new(|| {
    HashMap::from([
        // Customer
        ("CUSTOMER", Role::Customer),
        ("CUSTOMERS", Role::Customer),
        ("BUYER", Role::Customer),
        ("SHOPPER", Role::Customer),
        // Seller
        ("SELLER", Role::Seller),
        ("SELLERS", Role::Seller),
        ("VENDOR", Role::Seller),
        ("MERCHANT", Role::Seller),
        // Admin
        ("ADMIN", Role::Admin),
        ("ADMINS", Role::Admin),
        ("ADMINISTRATOR", Role::Admin),
        // Delivery agent
        ("DELIVERY_AGENT", Role::DeliveryAgent),
        ("DELIVERY-AGENT", Role::DeliveryAgent),
        ("DELIVERY", Role::DeliveryAgent),
        ("COURIER", Role::DeliveryAgent),
        ("DRIVER", Role::DeliveryAgent),
    ])
});

/// Normalize one raw role string to a canonical role, if it maps to one.
pub fn resolve_one(raw: &str) -> Option<Role> {
    let upper = raw.trim().to_uppercase();
    let key = upper.strip_prefix("ROLE_").unwrap_or(&upper);
    ROLE_TABLE.get(key).copied()
}

/// Resolve raw role claims into a set of canonical roles.
///
/// Unmapped strings are dropped; the result may be empty.
pub fn resolve<I, S>(raw: I) -> BTreeSet<Role>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|r| resolve_one(r.as_ref()))
        .collect()
}

/// Resolve raw role claims, defaulting to `{CUSTOMER}` when nothing maps.
pub fn resolve_or_default<I, S>(raw: I) -> BTreeSet<Role>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let roles = resolve(raw);
    if roles.is_empty() {
        BTreeSet::from([Role::Customer])
    } else {
        roles
    }
}

/// Roles any one of which grants access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequirement {
    any_of: Vec<Role>,
}

impl RoleRequirement {
    pub fn any_of(roles: &[Role]) -> Self {
        Self {
            any_of: roles.to_vec(),
        }
    }

    pub fn is_satisfied_by(&self, roles: &BTreeSet<Role>) -> bool {
        self.any_of.iter().any(|r| roles.contains(r))
    }

    pub fn roles(&self) -> &[Role] {
        &self.any_of
    }
}

/// Comma-joined canonical names, as forwarded to downstream handlers.
pub fn join(roles: &BTreeSet<Role>) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_case_and_prefix_variants() {
        for raw in ["role_admin", "ROLE_ADMIN", "ADMIN", "Admin", "admin", "  admin  "] {
            assert_eq!(resolve_one(raw), Some(Role::Admin), "raw = {raw:?}");
        }
    }

    #[test]
    fn test_every_synonym_is_case_and_prefix_insensitive() {
        for (key, role) in ROLE_TABLE.iter() {
            let lower = key.to_lowercase();
            let prefixed = format!("role_{lower}");
            let mixed = format!("Role_{key}");
            assert_eq!(resolve_one(key), Some(*role));
            assert_eq!(resolve_one(&lower), Some(*role));
            assert_eq!(resolve_one(&prefixed), Some(*role));
            assert_eq!(resolve_one(&mixed), Some(*role));
        }
    }

    #[test]
    fn test_delivery_synonyms() {
        assert_eq!(resolve_one("delivery"), Some(Role::DeliveryAgent));
        assert_eq!(resolve_one("ROLE_DELIVERY_AGENT"), Some(Role::DeliveryAgent));
        assert_eq!(resolve_one("courier"), Some(Role::DeliveryAgent));
    }

    #[test]
    fn test_unmapped_roles_dropped() {
        assert_eq!(resolve_one("offline_access"), None);
        assert_eq!(resolve_one("uma_authorization"), None);
        assert_eq!(resolve_one(""), None);
        assert!(resolve(["default-roles-storefront", "manage-account"]).is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let roles = resolve(["ADMIN", "ROLE_ADMIN", "admin", "seller", "VENDOR"]);
        assert_eq!(roles, BTreeSet::from([Role::Seller, Role::Admin]));
    }

    #[test]
    fn test_default_is_customer_never_admin() {
        let empty: [&str; 0] = [];
        assert_eq!(resolve_or_default(empty), BTreeSet::from([Role::Customer]));
        assert_eq!(
            resolve_or_default(["offline_access"]),
            BTreeSet::from([Role::Customer])
        );
        assert_eq!(
            resolve_or_default(["ROLE_ADMIN"]),
            BTreeSet::from([Role::Admin])
        );
    }

    #[test]
    fn test_requirement_any_of() {
        let seller_area = RoleRequirement::any_of(&[Role::Seller, Role::Admin]);
        assert!(seller_area.is_satisfied_by(&BTreeSet::from([Role::Admin])));
        assert!(seller_area.is_satisfied_by(&BTreeSet::from([Role::Customer, Role::Seller])));
        assert!(!seller_area.is_satisfied_by(&BTreeSet::from([Role::Customer])));
        assert!(!seller_area.is_satisfied_by(&BTreeSet::new()));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Role::DeliveryAgent).unwrap();
        assert_eq!(json, "\"DELIVERY_AGENT\"");
        let back: Role = serde_json::from_str("\"SELLER\"").unwrap();
        assert_eq!(back, Role::Seller);
        assert_eq!(Role::DeliveryAgent.to_string(), "DELIVERY_AGENT");
    }

    #[test]
    fn test_join_is_ordered() {
        let roles = BTreeSet::from([Role::Admin, Role::Customer]);
        assert_eq!(join(&roles), "CUSTOMER,ADMIN");
    }
}
