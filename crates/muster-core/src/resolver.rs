//! Catalog-key lookups: display names and key validation.

/// Maps stored catalog keys to the names shown in views.
///
/// Unit types and owners are stored as keys in events. A resolver turns
/// them into display text when a view is folded, so renaming a catalog entry
/// changes how history reads without touching the log.
pub trait DisplayResolver {
    /// Display name of a unit-type key.
    fn unit_type_display(&self, key: &str) -> String;

    /// Display name of an owner key.
    fn owner_display(&self, key: &str) -> String;
}

/// Resolver that shows keys as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl DisplayResolver for IdentityResolver {
    fn unit_type_display(&self, key: &str) -> String {
        key.to_owned()
    }

    fn owner_display(&self, key: &str) -> String {
        key.to_owned()
    }
}

/// Tells which unit-type keys and promotions a campaign recognizes.
///
/// A [`TroopManager`](crate::TroopManager) given one rejects writes that
/// name anything else. The composite unit type is always accepted.
pub trait KeyCatalog {
    /// Whether `key` is a defined unit type.
    fn has_unit_type(&self, key: &str) -> bool;

    /// Whether `name` is a defined promotion.
    fn has_promotion(&self, name: &str) -> bool;
}
