/*!
 * # Permissions
 *
 * Capabilities are named `resource:action`, one per ledger operation the
 * CLI (or any other front end) can ask for.
 */

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum Permission {
    #[strum(serialize = "sales:create")]
    SalesCreate,
    #[strum(serialize = "inventory:read")]
    InventoryRead,
    #[strum(serialize = "inventory:adjust")]
    InventoryAdjust,
    #[strum(serialize = "inventory:transfer")]
    InventoryTransfer,
    #[strum(serialize = "inventory:ingest")]
    InventoryIngest,
    #[strum(serialize = "customers:payments")]
    CustomerPayments,
    #[strum(serialize = "suppliers:invoices")]
    SupplierInvoices,
    #[strum(serialize = "suppliers:payments")]
    SupplierPayments,
    #[strum(serialize = "reports:read")]
    ReportsRead,
    #[strum(serialize = "shifts:close")]
    ShiftsClose,
    #[strum(serialize = "forecast:run")]
    ForecastRun,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// The `resource` half of the name.
    pub fn resource(&self) -> &'static str {
        self.as_str().split(':').next().unwrap_or_default()
    }
}

/// Whether a granted pattern (`inventory:read`, `inventory:*`, `*`) covers
/// the required permission.
pub fn check_permission(granted: &str, required: &str) -> bool {
    if granted == required || granted == "*" {
        return true;
    }

    if let Some(prefix) = granted.strip_suffix(":*") {
        return required
            .split_once(':')
            .map(|(resource, _)| resource == prefix)
            .unwrap_or(false);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn names_round_trip_through_strings() {
        for permission in Permission::iter() {
            let parsed: Permission = permission.to_string().parse().unwrap();
            assert_eq!(parsed, permission);
        }
        assert_eq!(Permission::ForecastRun.as_str(), "forecast:run");
        assert_eq!(Permission::SupplierPayments.resource(), "suppliers");
    }

    #[test]
    fn wildcards_match_by_resource() {
        assert!(check_permission("*", "forecast:run"));
        assert!(check_permission("inventory:*", "inventory:adjust"));
        assert!(!check_permission("inventory:*", "inventoryx:adjust"));
        assert!(!check_permission("sales:create", "sales:void"));
    }
}
