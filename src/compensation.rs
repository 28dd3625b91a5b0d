//! Downtime Adjustment Engine
//!
//! Reacts to downtime registration and removal. In the default mode every
//! accepted downtime that intersects a resource's billed window produces a
//! compensating ledger entry: same invoice, the intersected interval, the
//! affected item's daily price negated. The entry carries no live source
//! reference, so it survives resource deletion.
//!
//! The alternative mode shrinks the affected item's own end instead of
//! adding a credit. Which mode a deployment uses is a product decision;
//! see `AdjustmentMode`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::intervals;
use crate::models::{ItemKind, ServiceDowntime};
use crate::store::Store;

/// How a registered downtime adjusts the affected resource's billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    /// Add a negative-price ledger entry over the intersected days.
    Compensation,
    /// Shift the affected item's end backward by the intersected day count.
    /// Irreversible: removing the downtime later does not restore the item.
    ShrinkItem,
}

/// The invoice item a downtime window lands on.
struct AffectedItem {
    invoice: uuid::Uuid,
    item: u64,
}

/// Locate the billed window of the downtime's resource.
///
/// Only items still holding a live source reference qualify: once the
/// reference is cleared there is no authoritative daily price left to
/// offset. Of several intersecting items the most recently started wins.
fn find_affected_item(store: &Store, downtime: &ServiceDowntime) -> Option<AffectedItem> {
    store.source(downtime.resource)?;

    let mut best: Option<(AffectedItem, chrono::DateTime<chrono::Utc>)> = None;
    for invoice in store.invoices() {
        for item in &invoice.items {
            if item.source != Some(downtime.resource) || item.kind == ItemKind::Compensation {
                continue;
            }
            if intervals::intersect(item.start, item.end, downtime.start, downtime.end).is_none() {
                continue;
            }
            let newer = best
                .as_ref()
                .map(|(_, start)| item.start > *start)
                .unwrap_or(true);
            if newer {
                best = Some((
                    AffectedItem {
                        invoice: invoice.uuid,
                        item: item.id,
                    },
                    item.start,
                ));
            }
        }
    }
    best.map(|(affected, _)| affected)
}

/// Apply an accepted downtime to the ledger.
pub(crate) fn apply_downtime(store: &mut Store, downtime: &ServiceDowntime, mode: AdjustmentMode) {
    let Some(affected) = find_affected_item(store, downtime) else {
        debug!(resource = %downtime.resource, "downtime does not touch a billed window, skipping adjustment");
        return;
    };
    let Some(invoice) = store.invoice_mut(affected.invoice) else {
        return;
    };
    let Some(item) = invoice.item(affected.item) else {
        return;
    };
    let Some((start, end)) =
        intervals::intersect(item.start, item.end, downtime.start, downtime.end)
    else {
        return;
    };

    match mode {
        AdjustmentMode::Compensation => {
            let daily_price = -item.daily_price;
            let project_name = item.project_name.clone();
            let project_id = item.project_id;
            invoice.open_item(
                ItemKind::Compensation,
                None,
                daily_price,
                start,
                end,
                project_name,
                project_id,
            );
            debug!(invoice = %affected.invoice, %start, %end, "opened compensation entry");
        }
        AdjustmentMode::ShrinkItem => {
            let days = intervals::full_days(start, end);
            if let Some(item) = invoice.item_mut(affected.item) {
                item.shift_backward(days);
                debug!(invoice = %affected.invoice, days, "shrunk item window for downtime");
            }
        }
    }
}

/// Retract the ledger effect of a removed downtime.
///
/// Deletes the compensation entries whose interval exactly matches the
/// downtime's former intersection with the affected item. Removing a
/// downtime that produced no entry is a no-op; shrink-mode adjustments are
/// not restored.
pub(crate) fn retract_downtime(store: &mut Store, downtime: &ServiceDowntime) {
    let Some(affected) = find_affected_item(store, downtime) else {
        return;
    };
    let Some(invoice) = store.invoice_mut(affected.invoice) else {
        return;
    };
    let Some(item) = invoice.item(affected.item) else {
        return;
    };
    let Some((start, end)) =
        intervals::intersect(item.start, item.end, downtime.start, downtime.end)
    else {
        return;
    };

    invoice.items.retain(|candidate| {
        !(candidate.kind == ItemKind::Compensation
            && candidate.start == start
            && candidate.end == end)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceRecord, SourceKind};
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::Map;
    use uuid::Uuid;

    fn dt(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn downtime(resource: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> ServiceDowntime {
        ServiceDowntime {
            id: Uuid::new_v4(),
            resource,
            start,
            end,
        }
    }

    /// Store with one resource billed over Oct 11 - Oct 15.
    fn store_with_item() -> (Store, Uuid, Uuid) {
        let mut store = Store::new();
        let record = ResourceRecord {
            id: Uuid::new_v4(),
            kind: SourceKind::Resource,
            name: "tenant-1".to_string(),
            project_name: "project-x".to_string(),
            project_id: Uuid::new_v4(),
            daily_price: Decimal::new(10, 0),
            metadata: Map::new(),
        };
        store.insert_source(record.clone());
        let invoice = store.find_or_create_invoice(Uuid::new_v4(), 2018, 10, Decimal::ZERO);
        store.invoice_mut(invoice).unwrap().open_item(
            ItemKind::Resource,
            Some(record.id),
            record.daily_price,
            dt(2018, 10, 11),
            dt(2018, 10, 15),
            record.project_name.clone(),
            Some(record.project_id),
        );
        (store, invoice, record.id)
    }

    fn compensation_entries(store: &Store, invoice: Uuid) -> Vec<(DateTime<Utc>, DateTime<Utc>, Decimal)> {
        store
            .invoice(invoice)
            .unwrap()
            .items
            .iter()
            .filter(|item| item.kind == ItemKind::Compensation)
            .map(|item| (item.start, item.end, item.daily_price))
            .collect()
    }

    #[test]
    fn test_enclosing_downtime_compensates_whole_item_window() {
        let (mut store, invoice, resource) = store_with_item();
        let window = downtime(resource, dt(2018, 10, 1), dt(2018, 10, 20));
        apply_downtime(&mut store, &window, AdjustmentMode::Compensation);
        assert_eq!(
            compensation_entries(&store, invoice),
            vec![(dt(2018, 10, 11), dt(2018, 10, 15), Decimal::new(-10, 0))]
        );
    }

    #[test]
    fn test_inner_downtime_compensates_its_own_window() {
        let (mut store, invoice, resource) = store_with_item();
        let window = downtime(resource, dt(2018, 10, 12), dt(2018, 10, 14));
        apply_downtime(&mut store, &window, AdjustmentMode::Compensation);
        assert_eq!(
            compensation_entries(&store, invoice),
            vec![(dt(2018, 10, 12), dt(2018, 10, 14), Decimal::new(-10, 0))]
        );
    }

    #[test]
    fn test_downtime_overlapping_item_start_is_clipped() {
        let (mut store, invoice, resource) = store_with_item();
        let window = downtime(resource, dt(2018, 10, 1), dt(2018, 10, 12));
        apply_downtime(&mut store, &window, AdjustmentMode::Compensation);
        assert_eq!(
            compensation_entries(&store, invoice),
            vec![(dt(2018, 10, 11), dt(2018, 10, 12), Decimal::new(-10, 0))]
        );
    }

    #[test]
    fn test_downtime_overlapping_item_end_is_clipped() {
        let (mut store, invoice, resource) = store_with_item();
        let window = downtime(resource, dt(2018, 10, 12), dt(2018, 10, 20));
        apply_downtime(&mut store, &window, AdjustmentMode::Compensation);
        assert_eq!(
            compensation_entries(&store, invoice),
            vec![(dt(2018, 10, 12), dt(2018, 10, 15), Decimal::new(-10, 0))]
        );
    }

    #[test]
    fn test_disjoint_downtime_creates_nothing() {
        let (mut store, invoice, resource) = store_with_item();
        let window = downtime(resource, dt(2018, 10, 1), dt(2018, 10, 7));
        apply_downtime(&mut store, &window, AdjustmentMode::Compensation);
        assert!(compensation_entries(&store, invoice).is_empty());
    }

    #[test]
    fn test_missing_source_record_creates_nothing() {
        let (mut store, invoice, resource) = store_with_item();
        store.remove_source(resource);
        let window = downtime(resource, dt(2018, 10, 1), dt(2018, 10, 20));
        apply_downtime(&mut store, &window, AdjustmentMode::Compensation);
        assert!(compensation_entries(&store, invoice).is_empty());
    }

    #[test]
    fn test_retract_removes_only_the_matching_entry() {
        let (mut store, invoice, resource) = store_with_item();
        let first = downtime(resource, dt(2018, 10, 11), dt(2018, 10, 12));
        let second = downtime(resource, dt(2018, 10, 13), dt(2018, 10, 14));
        apply_downtime(&mut store, &first, AdjustmentMode::Compensation);
        apply_downtime(&mut store, &second, AdjustmentMode::Compensation);
        assert_eq!(compensation_entries(&store, invoice).len(), 2);

        retract_downtime(&mut store, &first);
        assert_eq!(
            compensation_entries(&store, invoice),
            vec![(dt(2018, 10, 13), dt(2018, 10, 14), Decimal::new(-10, 0))]
        );

        // Retracting again is a no-op.
        retract_downtime(&mut store, &first);
        assert_eq!(compensation_entries(&store, invoice).len(), 1);
    }

    #[test]
    fn test_shrink_mode_moves_item_end_backward() {
        let (mut store, invoice, resource) = store_with_item();
        let window = downtime(resource, dt(2018, 10, 12), dt(2018, 10, 14));
        apply_downtime(&mut store, &window, AdjustmentMode::ShrinkItem);

        let entry = store.invoice(invoice).unwrap();
        assert!(compensation_entries(&store, invoice).is_empty());
        assert_eq!(entry.items[0].end, dt(2018, 10, 13));
    }
}
