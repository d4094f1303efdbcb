//! Whether an item may join the items already in a drawer.
//!
//! Two stages. Measure and category compatibility is absolute. Consent
//! (`share_drawer`) is checked only after that passes, and can be granted.

use std::collections::BTreeSet;

use binstock_api::{CategoryId, IncompatibleReason, Item, ShareCheck};

pub fn check_compat(existing: &[Item], new_item: &Item) -> ShareCheck {
    if existing.is_empty() {
        return ShareCheck::Compatible;
    }

    let measure = new_item.measure();
    let measures_ok = existing.iter().all(|it| it.measure() == measure);
    let categories_ok = existing
        .iter()
        .all(|it| it.category_id == new_item.category_id);

    let allowed = (categories_ok && measures_ok) || (!measure.is_empty() && measures_ok);
    if !allowed {
        let reason = if measures_ok {
            IncompatibleReason::CategoryMismatch
        } else {
            IncompatibleReason::MeasureMismatch
        };
        return ShareCheck::Incompatible { reason };
    }

    let mut blockers: Vec<_> = existing
        .iter()
        .filter(|it| !it.share_drawer)
        .map(|it| it.id)
        .collect();
    if !new_item.share_drawer {
        blockers.push(new_item.id);
    }

    if blockers.is_empty() {
        ShareCheck::Compatible
    } else {
        ShareCheck::NeedsConsent { blockers }
    }
}

/// Distinct categories of a group of items.
pub fn categories_of(items: &[Item]) -> BTreeSet<CategoryId> {
    items.iter().map(|it| it.category_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use binstock_api::ItemId;

    fn item(id: i64, category: i64, measure: &str, share: bool) -> Item {
        Item {
            id: ItemId(id),
            category_id: CategoryId(category),
            name: format!("item {}", id),
            thread_size: (!measure.is_empty()).then(|| measure.to_string()),
            material: None,
            main_size_mm: None,
            quantity: 0,
            share_drawer: share,
        }
    }

    #[test]
    fn test_empty_drawer_always_compatible() {
        assert_eq!(check_compat(&[], &item(1, 1, "", false)), ShareCheck::Compatible);
    }

    #[test]
    fn test_same_category_same_measure() {
        let existing = [item(1, 1, "M3", true)];
        assert!(check_compat(&existing, &item(2, 1, " m3 ", true)).is_compatible());
    }

    #[test]
    fn test_same_measure_crosses_categories() {
        let existing = [item(1, 1, "M4", true)];
        assert!(check_compat(&existing, &item(2, 2, "M4", true)).is_compatible());
    }

    #[test]
    fn test_same_category_different_measure_rejected() {
        let existing = [item(1, 1, "M3", true)];
        assert_eq!(
            check_compat(&existing, &item(2, 1, "M5", true)),
            ShareCheck::Incompatible {
                reason: IncompatibleReason::MeasureMismatch
            }
        );
    }

    #[test]
    fn test_empty_measure_needs_same_category() {
        let existing = [item(1, 1, "", true)];
        assert!(check_compat(&existing, &item(2, 1, "", true)).is_compatible());
        assert_eq!(
            check_compat(&existing, &item(3, 2, "", true)),
            ShareCheck::Incompatible {
                reason: IncompatibleReason::CategoryMismatch
            }
        );
    }

    #[test]
    fn test_consent_blockers_listed() {
        let existing = [item(1, 1, "M3", false), item(2, 1, "M3", true)];
        assert_eq!(
            check_compat(&existing, &item(3, 1, "M3", false)),
            ShareCheck::NeedsConsent {
                blockers: vec![ItemId(1), ItemId(3)]
            }
        );
    }

    #[test]
    fn test_incompatibility_wins_over_consent() {
        let existing = [item(1, 1, "M3", false)];
        assert!(matches!(
            check_compat(&existing, &item(2, 1, "M6", false)),
            ShareCheck::Incompatible { .. }
        ));
    }
}
