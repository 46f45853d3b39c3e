//! Store tests against real SQLite.
//!
//! Verifies:
//! - every mutation writes exactly one ledger entry in the same transaction
//! - failed operations leave items and the ledger untouched
//! - the confirmation-required and no-op paths write nothing
//! - registry and category rules, including the delete cascade

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use stockledger_core::{CategoryId, Conflict, DomainError, ItemId, PageRequest};
    use stockledger_inventory::{
        AdjustmentKind, Category, CategoryScope, Item, ItemQuery, ItemStatus, ItemUpdate,
        MovementFilter, MovementKind, MovementLogEntry, NewCategory, NewItem, StockAdjustment,
        Unit, UpdateOutcome,
    };

    use crate::{Inventory, StoreConfig, StoreError};

    struct Fixture {
        inv: Inventory,
        unit: Unit,
        category: Category,
    }

    async fn fixture() -> Fixture {
        let inv = Inventory::open(&StoreConfig::in_memory()).await.unwrap();
        let unit = inv.units.add("piece").await.unwrap();
        let root = inv.categories.add(NewCategory::root("Hardware")).await.unwrap();
        let category = inv
            .categories
            .add(NewCategory::child("Bolts", root.id))
            .await
            .unwrap();
        Fixture {
            inv,
            unit,
            category,
        }
    }

    impl Fixture {
        fn new_item(&self, name: &str, quantity: i64) -> NewItem {
            NewItem::new(name, self.unit.id, self.category.id, quantity)
        }

        async fn create(&self, name: &str, quantity: i64) -> Item {
            self.inv
                .items
                .create_item(self.new_item(name, quantity))
                .await
                .unwrap()
        }

        async fn history(&self, item_id: ItemId) -> Vec<MovementLogEntry> {
            self.inv.ledger.history(item_id).await.unwrap()
        }

        async fn item(&self, item_id: ItemId) -> Item {
            self.inv.items.get_item(item_id).await.unwrap().unwrap()
        }

        fn update_for(&self, item: &Item) -> ItemUpdate {
            ItemUpdate {
                item_id: item.id,
                name: item.name.clone(),
                unit_id: item.unit_id,
                sub_category_id: item.sub_category_id,
                barcode: item.barcode.clone(),
                actor: Some("tester".to_string()),
                force_unit_change: false,
            }
        }
    }

    fn domain(err: StoreError) -> DomainError {
        match err {
            StoreError::Domain(err) => err,
            other => panic!("expected a domain error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bolt_walkthrough() {
        let f = fixture().await;
        let bolt = f.create("Bolt-8mm", 100).await;
        assert_eq!(bolt.current_quantity, 100);
        assert_eq!(bolt.unit_name, "piece");
        assert_eq!(bolt.sub_category_name.as_deref(), Some("Bolts"));

        let bolt = f
            .inv
            .items
            .adjust_quantity(StockAdjustment::addition(bolt.id, 50).by("alice"))
            .await
            .unwrap();
        assert_eq!(bolt.current_quantity, 150);

        let history = f.history(bolt.id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, MovementKind::Addition);
        assert_eq!(history[0].quantity_changed, Some(50));
        assert_eq!(history[0].resulting_quantity, Some(150));
        assert_eq!(history[0].actor.as_deref(), Some("alice"));
        assert_eq!(history[1].kind, MovementKind::Creation);
        assert_eq!(history[1].quantity_changed, Some(100));
        assert_eq!(history[1].resulting_quantity, Some(100));

        let err = f
            .inv
            .items
            .adjust_quantity(StockAdjustment::removal(bolt.id, 200))
            .await
            .unwrap_err();
        assert_eq!(
            domain(err),
            DomainError::InvalidState("negative quantity".to_string())
        );
        assert_eq!(f.item(bolt.id).await.current_quantity, 150);
        assert_eq!(f.history(bolt.id).await.len(), 2);
    }

    #[tokio::test]
    async fn removal_is_logged_with_a_negative_delta() {
        let f = fixture().await;
        let item = f.create("Nut-M8", 40).await;
        let destination = f.inv.destinations.add("Site A").await.unwrap();

        let mut removal = StockAdjustment::removal(item.id, 15);
        removal.destination_id = Some(destination.id);
        let item = f.inv.items.adjust_quantity(removal).await.unwrap();
        assert_eq!(item.current_quantity, 25);

        let latest = &f.history(item.id).await[0];
        assert_eq!(latest.kind, MovementKind::Removal);
        assert_eq!(latest.quantity_changed, Some(-15));
        assert_eq!(latest.resulting_quantity, Some(25));
        assert_eq!(latest.destination_name.as_deref(), Some("Site A"));
    }

    #[tokio::test]
    async fn non_positive_delta_is_rejected_without_writes() {
        let f = fixture().await;
        let item = f.create("Washer", 10).await;
        let err = f
            .inv
            .items
            .adjust_quantity(StockAdjustment::addition(item.id, 0))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidArgument(_)));
        assert_eq!(f.history(item.id).await.len(), 1);
    }

    #[tokio::test]
    async fn adjusting_a_missing_item_is_not_found() {
        let f = fixture().await;
        let err = f
            .inv
            .items
            .adjust_quantity(StockAdjustment::addition(ItemId::new(), 5))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound { entity: "item", .. }));
    }

    #[tokio::test]
    async fn creation_logs_provider_and_cost() {
        let f = fixture().await;
        let provider = f.inv.providers.add("Acme").await.unwrap();
        let mut cmd = f.new_item("Hinge", 12);
        cmd.provider_id = Some(provider.id);
        cmd.cost = Some(Decimal::from_str("2.75").unwrap());
        cmd.actor = Some("bob".to_string());
        cmd.barcode = Some("HNG-1".to_string());

        let item = f.inv.items.create_item(cmd).await.unwrap();
        assert_eq!(item.provider_name.as_deref(), Some("Acme"));
        assert_eq!(item.cost, Some(Decimal::from_str("2.75").unwrap()));

        let created = &f.history(item.id).await[0];
        assert_eq!(created.kind, MovementKind::Creation);
        assert_eq!(created.provider_name.as_deref(), Some("Acme"));
        assert_eq!(created.unit_cost, Some(Decimal::from_str("2.75").unwrap()));
        assert_eq!(created.details.as_deref(), Some("Item created."));

        let by_barcode = f.inv.items.find_active_by_barcode("HNG-1").await.unwrap();
        assert_eq!(by_barcode.map(|i| i.id), Some(item.id));
    }

    #[tokio::test]
    async fn duplicate_active_name_fails_and_mutates_nothing() {
        let f = fixture().await;
        let first = f.create("Bolt-8mm", 100).await;

        let err = f
            .inv
            .items
            .create_item(f.new_item("  bolt-8MM ", 5))
            .await
            .unwrap_err();
        match domain(err) {
            DomainError::Conflict(Conflict::Duplicate { category, .. }) => {
                assert_eq!(category.as_deref(), Some("Bolts"));
            }
            other => panic!("expected duplicate, got {other:?}"),
        }

        let page = f
            .inv
            .items
            .list_items(&ItemQuery::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        let all = f.inv.ledger.query(&MovementFilter::default(), None).await.unwrap();
        assert_eq!(all.total_count, 1);
        assert_eq!(f.item(first.id).await.current_quantity, 100);
    }

    #[tokio::test]
    async fn name_of_inactive_or_archived_item_is_restorable() {
        let f = fixture().await;
        let item = f.create("Gasket", 3).await;
        f.inv
            .items
            .set_status(item.id, ItemStatus::Inactive, None)
            .await
            .unwrap();

        let err = f.inv.items.create_item(f.new_item("gasket", 1)).await.unwrap_err();
        match domain(err) {
            DomainError::Conflict(Conflict::Restorable { item_id, status, .. }) => {
                assert_eq!(item_id, item.id);
                assert_eq!(status, "inactive");
            }
            other => panic!("expected restorable, got {other:?}"),
        }

        f.inv.categories.delete(f.category.id).await.unwrap();
        let err = f.inv.items.create_item(f.new_item("GASKET", 1)).await.unwrap_err();
        match domain(err) {
            DomainError::Conflict(Conflict::Restorable { status, .. }) => {
                assert_eq!(status, "archived");
            }
            other => panic!("expected restorable, got {other:?}"),
        }
        let all = f.inv.ledger.query(&MovementFilter::default(), None).await.unwrap();
        assert_eq!(all.total_count, 2);
    }

    #[tokio::test]
    async fn create_rejects_blank_names_negative_stock_and_missing_references() {
        let f = fixture().await;
        let blank = f.inv.items.create_item(f.new_item("   ", 1)).await.unwrap_err();
        assert!(matches!(domain(blank), DomainError::InvalidArgument(_)));

        let negative = f.inv.items.create_item(f.new_item("Spring", -1)).await.unwrap_err();
        assert!(matches!(domain(negative), DomainError::InvalidArgument(_)));

        let mut missing = f.new_item("Spring", 1);
        missing.sub_category_id = CategoryId::new();
        let err = f.inv.items.create_item(missing).await.unwrap_err();
        assert!(matches!(
            domain(err),
            DomainError::NotFound {
                entity: "category",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn barcodes_are_unique_across_items() {
        let f = fixture().await;
        let mut first = f.new_item("Clamp", 1);
        first.barcode = Some("CLP-1".to_string());
        f.inv.items.create_item(first).await.unwrap();

        let mut second = f.new_item("Bracket", 1);
        second.barcode = Some("CLP-1".to_string());
        let err = f.inv.items.create_item(second).await.unwrap_err();
        assert_eq!(
            domain(err),
            DomainError::Conflict(Conflict::BarcodeInUse {
                barcode: "CLP-1".to_string()
            })
        );

        let bracket = f.create("Bracket", 1).await;
        let mut update = f.update_for(&bracket);
        update.barcode = Some("CLP-1".to_string());
        let err = f.inv.items.update_item(update).await.unwrap_err();
        assert!(matches!(
            domain(err),
            DomainError::Conflict(Conflict::BarcodeInUse { .. })
        ));
        assert_eq!(f.history(bracket.id).await.len(), 1);
    }

    #[tokio::test]
    async fn same_status_is_a_no_op() {
        let f = fixture().await;
        let item = f.create("Pipe", 7).await;

        let unchanged = f
            .inv
            .items
            .set_status(item.id, ItemStatus::Active, Some("carol".to_string()))
            .await
            .unwrap();
        assert_eq!(unchanged, item);
        assert_eq!(f.history(item.id).await.len(), 1);

        let inactive = f
            .inv
            .items
            .set_status(item.id, ItemStatus::Inactive, Some("carol".to_string()))
            .await
            .unwrap();
        assert_eq!(inactive.status, ItemStatus::Inactive);
        assert_eq!(inactive.current_quantity, 7);

        let history = f.history(item.id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, MovementKind::StatusChange);
        assert_eq!(
            history[0].details.as_deref(),
            Some("Status changed from 'active' to 'inactive'.")
        );
        assert_eq!(history[0].quantity_changed, None);
    }

    #[tokio::test]
    async fn archived_status_cannot_be_set_directly() {
        let f = fixture().await;
        let item = f.create("Valve", 2).await;
        let err = f
            .inv
            .items
            .set_status(item.id, ItemStatus::Archived, None)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidArgument(_)));
        assert_eq!(f.history(item.id).await.len(), 1);
    }

    #[tokio::test]
    async fn unit_change_needs_confirmation_once_history_exists() {
        let f = fixture().await;
        let item = f.create("Cable", 30).await;
        let metre = f.inv.units.add("metre").await.unwrap();

        let mut update = f.update_for(&item);
        update.unit_id = metre.id;
        let outcome = f.inv.items.update_item(update.clone()).await.unwrap();
        assert!(outcome.is_confirmation_required());
        assert_eq!(f.item(item.id).await.unit_id, f.unit.id);
        assert_eq!(f.history(item.id).await.len(), 1);

        update.force_unit_change = true;
        let outcome = f.inv.items.update_item(update).await.unwrap();
        let updated = match outcome {
            UpdateOutcome::Updated(item) => item,
            other => panic!("expected update, got {other:?}"),
        };
        assert_eq!(updated.unit_name, "metre");

        let history = f.history(item.id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, MovementKind::Update);
        assert_eq!(
            history[0].details.as_deref(),
            Some("Item details updated: unit changed.")
        );
    }

    #[tokio::test]
    async fn rename_logs_new_name_and_rejects_active_collisions() {
        let f = fixture().await;
        let cable = f.create("Cable", 30).await;
        f.create("Wire", 5).await;

        let mut update = f.update_for(&cable);
        update.name = "wire".to_string();
        let err = f.inv.items.update_item(update.clone()).await.unwrap_err();
        assert!(matches!(
            domain(err),
            DomainError::Conflict(Conflict::NameInUse { entity: "item", .. })
        ));

        update.name = "Cable-3mm".to_string();
        let outcome = f.inv.items.update_item(update).await.unwrap();
        assert_eq!(outcome.item().map(|i| i.name.as_str()), Some("Cable-3mm"));

        let history = f.history(cable.id).await;
        assert_eq!(history[0].item_name, "Cable-3mm");
        assert_eq!(history[1].item_name, "Cable");
    }

    #[tokio::test]
    async fn updating_a_missing_item_is_not_found() {
        let f = fixture().await;
        let err = f
            .inv
            .items
            .update_item(ItemUpdate {
                item_id: ItemId::new(),
                name: "Ghost".to_string(),
                unit_id: f.unit.id,
                sub_category_id: None,
                barcode: None,
                actor: None,
                force_unit_change: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn category_delete_fails_while_an_active_item_uses_it() {
        let f = fixture().await;
        let item = f.create("Anchor", 4).await;

        let err = f.inv.categories.delete(f.category.id).await.unwrap_err();
        assert!(matches!(
            domain(err),
            DomainError::Conflict(Conflict::InUse {
                entity: "category",
                ..
            })
        ));
        assert!(f.inv.categories.get(f.category.id).await.unwrap().is_some());
        assert_eq!(f.item(item.id).await.status, ItemStatus::Active);
    }

    #[tokio::test]
    async fn category_delete_archives_inactive_items_without_logging() {
        let f = fixture().await;
        let a = f.create("Rivet", 10).await;
        let b = f.create("Staple", 20).await;
        for id in [a.id, b.id] {
            f.inv
                .items
                .set_status(id, ItemStatus::Inactive, None)
                .await
                .unwrap();
        }
        let before = f.inv.ledger.query(&MovementFilter::default(), None).await.unwrap();

        let deletion = f.inv.categories.delete(f.category.id).await.unwrap();
        assert_eq!(deletion.category_id, f.category.id);
        let mut expected = vec![a.id, b.id];
        expected.sort_by_key(|id| id.to_string());
        assert_eq!(deletion.archived_items, expected);

        for id in [a.id, b.id] {
            let item = f.item(id).await;
            assert_eq!(item.status, ItemStatus::Archived);
            assert_eq!(item.sub_category_id, None);
        }
        let after = f.inv.ledger.query(&MovementFilter::default(), None).await.unwrap();
        assert_eq!(after.total_count, before.total_count);
        assert!(f.inv.categories.get(f.category.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn archived_items_come_back_through_restore() {
        let f = fixture().await;
        let item = f.create("Hook", 6).await;
        f.inv
            .items
            .set_status(item.id, ItemStatus::Inactive, None)
            .await
            .unwrap();
        f.inv.categories.delete(f.category.id).await.unwrap();

        let err = f
            .inv
            .items
            .set_status(item.id, ItemStatus::Active, None)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidState(_)));

        let root = f.inv.categories.add(NewCategory::root("Fixings")).await.unwrap();
        let hooks = f
            .inv
            .categories
            .add(NewCategory::child("Hooks", root.id))
            .await
            .unwrap();
        let restored = f
            .inv
            .items
            .restore(item.id, hooks.id, Some("dave".to_string()))
            .await
            .unwrap();
        assert_eq!(restored.status, ItemStatus::Active);
        assert_eq!(restored.sub_category_name.as_deref(), Some("Hooks"));
        assert_eq!(restored.current_quantity, 6);

        let latest = &f.history(item.id).await[0];
        assert_eq!(latest.kind, MovementKind::Restored);
        assert_eq!(latest.resulting_quantity, None);
        assert_eq!(latest.actor.as_deref(), Some("dave"));
    }

    #[tokio::test]
    async fn restoring_an_active_item_relogs() {
        let f = fixture().await;
        let item = f.create("Hook", 6).await;
        f.inv.items.restore(item.id, f.category.id, None).await.unwrap();
        f.inv.items.restore(item.id, f.category.id, None).await.unwrap();
        let kinds: Vec<_> = f.history(item.id).await.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MovementKind::Restored,
                MovementKind::Restored,
                MovementKind::Creation
            ]
        );
    }

    #[tokio::test]
    async fn restore_reports_missing_item_or_category() {
        let f = fixture().await;
        let item = f.create("Hook", 6).await;
        let err = f
            .inv
            .items
            .restore(ItemId::new(), f.category.id, None)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound { entity: "item", .. }));

        let err = f
            .inv
            .items
            .restore(item.id, CategoryId::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            domain(err),
            DomainError::NotFound {
                entity: "category",
                ..
            }
        ));
        assert_eq!(f.history(item.id).await.len(), 1);
    }

    #[tokio::test]
    async fn failed_ledger_append_rolls_back_the_item_write() {
        let f = fixture().await;
        let item = f.create("Spacer", 9).await;

        sqlx::query("DROP TABLE movement_logs")
            .execute(f.inv.pool())
            .await
            .unwrap();

        let err = f
            .inv
            .items
            .adjust_quantity(StockAdjustment::addition(item.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database { .. }));
        assert_eq!(f.item(item.id).await.current_quantity, 9);

        let summary = f.inv.ledger.daily_summary().await;
        assert!(summary.is_degraded());
        assert_eq!(summary.additions_today, 0);
    }

    #[tokio::test]
    async fn ledger_rows_cannot_be_edited_or_deleted() {
        let f = fixture().await;
        f.create("Spacer", 9).await;

        let update = sqlx::query("UPDATE movement_logs SET details = 'tampered'")
            .execute(f.inv.pool())
            .await;
        assert!(update.is_err());
        let delete = sqlx::query("DELETE FROM movement_logs")
            .execute(f.inv.pool())
            .await;
        assert!(delete.is_err());
    }

    async fn insert_entry(inv: &Inventory, item_id: ItemId, kind: MovementKind, timestamp: &str) {
        sqlx::query(
            "INSERT INTO movement_logs (id, item_id, item_name, kind, timestamp) VALUES (?1, ?2, 'Seeded', ?3, ?4)",
        )
        .bind(stockledger_core::EntryId::new().to_string())
        .bind(item_id.to_string())
        .bind(kind.label())
        .bind(timestamp)
        .execute(inv.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn ledger_query_filters_by_kind_and_day() {
        let f = fixture().await;
        let item_id = ItemId::new();
        insert_entry(&f.inv, item_id, MovementKind::Addition, "2024-03-01 09:00:00.000000").await;
        insert_entry(&f.inv, item_id, MovementKind::Removal, "2024-03-01 17:30:00.000000").await;
        insert_entry(&f.inv, item_id, MovementKind::Addition, "2024-03-02 08:00:00.000000").await;
        insert_entry(&f.inv, item_id, MovementKind::Update, "2024-03-03 12:00:00.000000").await;

        let kinds = MovementKind::parse_list("Addition,Removal").unwrap();
        let filter = MovementFilter::for_item(item_id).with_kinds(kinds);
        let page = f.inv.ledger.query(&filter, None).await.unwrap();
        assert_eq!(page.total_count, 3);

        let day = filter.clone().between("2024-03-01", "2024-03-01");
        let page = f.inv.ledger.query(&day, None).await.unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].kind, MovementKind::Removal);
        assert_eq!(page.entries[1].kind, MovementKind::Addition);

        // Malformed bounds are dropped, not rejected.
        let sloppy = filter.between("03/01/2024", "2024-03-01");
        let page = f.inv.ledger.query(&sloppy, None).await.unwrap();
        assert_eq!(page.entries.len(), 2);
    }

    #[tokio::test]
    async fn ledger_pages_newest_first() {
        let f = fixture().await;
        let item_id = ItemId::new();
        for day in 1..=5 {
            insert_entry(
                &f.inv,
                item_id,
                MovementKind::Addition,
                &format!("2024-04-0{day} 10:00:00.000000"),
            )
            .await;
        }

        let filter = MovementFilter::for_item(item_id);
        let page = f
            .inv
            .ledger
            .query(&filter, Some(PageRequest::new(2, 2).unwrap()))
            .await
            .unwrap();
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);
        let days: Vec<_> = page
            .entries
            .iter()
            .map(|e| e.timestamp.format("%d").to_string())
            .collect();
        assert_eq!(days, vec!["03", "02"]);
    }

    #[tokio::test]
    async fn ledger_filters_by_provider_and_tolerates_deleted_providers() {
        let f = fixture().await;
        let item = f.create("Lamp", 1).await;
        let provider = f.inv.providers.add("Brightco").await.unwrap();

        let mut addition = StockAdjustment::addition(item.id, 4);
        addition.provider_id = Some(provider.id);
        addition.cost = Some(Decimal::from_str("9.99").unwrap());
        f.inv.items.adjust_quantity(addition).await.unwrap();

        let filter = MovementFilter {
            provider_id: Some(provider.id),
            ..MovementFilter::default()
        };
        let page = f.inv.ledger.query(&filter, None).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.entries[0].provider_name.as_deref(), Some("Brightco"));

        // Only items count as uses of a provider; the ledger keeps the dangling id.
        assert!(!f.inv.providers.is_in_use(provider.id).await.unwrap());
        f.inv.providers.delete(provider.id).await.unwrap();

        let page = f.inv.ledger.query(&filter, None).await.unwrap();
        assert_eq!(page.entries[0].provider_id, Some(provider.id));
        assert_eq!(page.entries[0].provider_name, None);
    }

    #[tokio::test]
    async fn ledger_filters_by_destination() {
        let f = fixture().await;
        let item = f.create("Crate", 20).await;
        let north = f.inv.destinations.add("North depot").await.unwrap();
        let south = f.inv.destinations.add("South depot").await.unwrap();

        for (destination, delta) in [(north.id, 2), (south.id, 5), (north.id, 1)] {
            let mut removal = StockAdjustment::removal(item.id, delta);
            removal.destination_id = Some(destination);
            f.inv.items.adjust_quantity(removal).await.unwrap();
        }

        let filter = MovementFilter {
            destination_id: Some(north.id),
            ..MovementFilter::default()
        };
        let page = f.inv.ledger.query(&filter, None).await.unwrap();
        assert_eq!(page.total_count, 2);
        assert!(page.entries.iter().all(|e| e.destination_id == Some(north.id)));
        assert!(page
            .entries
            .iter()
            .all(|e| e.destination_name.as_deref() == Some("North depot")));
        let deltas: Vec<_> = page.entries.iter().filter_map(|e| e.quantity_changed).collect();
        assert_eq!(deltas, vec![-1, -2]);

        let filter = MovementFilter {
            destination_id: Some(south.id),
            ..MovementFilter::for_item(item.id)
        };
        let page = f.inv.ledger.query(&filter, None).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.entries[0].resulting_quantity, Some(13));
    }

    #[tokio::test]
    async fn ledger_day_range_may_be_open_on_either_side() {
        let f = fixture().await;
        let item_id = ItemId::new();
        insert_entry(&f.inv, item_id, MovementKind::Addition, "2024-05-01 09:00:00.000000").await;
        insert_entry(&f.inv, item_id, MovementKind::Addition, "2024-05-02 09:00:00.000000").await;
        insert_entry(&f.inv, item_id, MovementKind::Removal, "2024-05-03 09:00:00.000000").await;

        let from_only = MovementFilter {
            date_from: Some("2024-05-02".to_string()),
            ..MovementFilter::for_item(item_id)
        };
        let page = f.inv.ledger.query(&from_only, None).await.unwrap();
        let days: Vec<_> = page
            .entries
            .iter()
            .map(|e| e.timestamp.format("%d").to_string())
            .collect();
        assert_eq!(days, vec!["03", "02"]);

        let to_only = MovementFilter {
            date_to: Some("2024-05-01".to_string()),
            ..MovementFilter::for_item(item_id)
        };
        let page = f.inv.ledger.query(&to_only, None).await.unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].timestamp.format("%d").to_string(), "01");
    }

    #[tokio::test]
    async fn unknown_kinds_in_comma_list_match_nothing() {
        let f = fixture().await;
        let item_id = ItemId::new();
        insert_entry(&f.inv, item_id, MovementKind::Addition, "2024-03-01 09:00:00.000000").await;
        insert_entry(&f.inv, item_id, MovementKind::Removal, "2024-03-01 10:00:00.000000").await;

        let mixed = MovementFilter {
            kinds: MovementKind::parse_list("Addition,Shrinkage"),
            ..MovementFilter::for_item(item_id)
        };
        let page = f.inv.ledger.query(&mixed, None).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.entries[0].kind, MovementKind::Addition);

        let unknown = MovementFilter {
            kinds: MovementKind::parse_list("Shrinkage"),
            ..MovementFilter::for_item(item_id)
        };
        let page = f.inv.ledger.query(&unknown, None).await.unwrap();
        assert!(page.entries.is_empty());
        let page = f
            .inv
            .ledger
            .query(&unknown, Some(PageRequest::first(10).unwrap()))
            .await
            .unwrap();
        assert_eq!(page.total_count, 0);
    }

    #[tokio::test]
    async fn daily_summary_counts_todays_additions_and_removals() {
        let f = fixture().await;
        let item = f.create("Tape", 10).await;
        f.inv
            .items
            .adjust_quantity(StockAdjustment::addition(item.id, 5))
            .await
            .unwrap();
        f.inv
            .items
            .adjust_quantity(StockAdjustment::addition(item.id, 1))
            .await
            .unwrap();
        f.inv
            .items
            .adjust_quantity(StockAdjustment::removal(item.id, 3))
            .await
            .unwrap();
        insert_entry(&f.inv, item.id, MovementKind::Addition, "2001-01-01 10:00:00.000000").await;

        let summary = f.inv.ledger.daily_summary().await;
        assert_eq!(summary.additions_today, 2);
        assert_eq!(summary.withdrawals_today, 1);
        assert_eq!(summary.error, None);
    }

    #[tokio::test]
    async fn list_items_returns_active_matches_only() {
        let f = fixture().await;
        let mut bolt = f.new_item("Bolt-8mm", 1);
        bolt.barcode = Some("BX-77".to_string());
        let bolt = f.inv.items.create_item(bolt).await.unwrap();
        f.create("Bolt-10mm", 1).await;
        let old = f.create("Bolt-old", 1).await;
        f.create("Screw", 1).await;
        f.inv
            .items
            .set_status(old.id, ItemStatus::Inactive, None)
            .await
            .unwrap();

        let query = ItemQuery {
            search: Some("bolt".to_string()),
            sub_category_id: Some(f.category.id),
        };
        let page = f
            .inv
            .items
            .list_items(&query, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total_count, 2);
        assert!(page.entries.iter().all(Item::is_active));

        let by_barcode = ItemQuery {
            search: Some("BX-7".to_string()),
            sub_category_id: None,
        };
        let page = f
            .inv
            .items
            .list_items(&by_barcode, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].id, bolt.id);

        let found = f.inv.items.find_by_name("BOLT-OLD").await.unwrap().unwrap();
        assert_eq!(found.status, ItemStatus::Inactive);
    }

    #[tokio::test]
    async fn named_registries_enforce_unique_names_and_usage() {
        let f = fixture().await;

        let err = f.inv.units.add("piece").await.unwrap_err();
        assert!(matches!(
            domain(err),
            DomainError::Conflict(Conflict::NameInUse { entity: "unit", .. })
        ));
        let err = f.inv.units.add(" ").await.unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidArgument(_)));

        let kg = f.inv.units.add("kg").await.unwrap();
        let renamed = f.inv.units.update(kg.id, "kilogram").await.unwrap();
        assert_eq!(renamed.name, "kilogram");
        let err = f.inv.units.update(kg.id, "piece").await.unwrap_err();
        assert!(matches!(domain(err), DomainError::Conflict(_)));
        let err = f
            .inv
            .units
            .update(stockledger_core::UnitId::new(), "litre")
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound { .. }));

        let names: Vec<_> = f
            .inv
            .units
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["kilogram", "piece"]);

        f.create("Nail", 1).await;
        assert!(f.inv.units.is_in_use(f.unit.id).await.unwrap());
        let err = f.inv.units.delete(f.unit.id).await.unwrap_err();
        assert!(matches!(
            domain(err),
            DomainError::Conflict(Conflict::InUse { entity: "unit", .. })
        ));
        f.inv.units.delete(kg.id).await.unwrap();
        assert!(f.inv.units.get(kg.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn destinations_are_in_use_once_logged() {
        let f = fixture().await;
        let item = f.create("Brick", 100).await;
        let site = f.inv.destinations.add("Site B").await.unwrap();
        assert!(!f.inv.destinations.is_in_use(site.id).await.unwrap());

        let mut removal = StockAdjustment::removal(item.id, 10);
        removal.destination_id = Some(site.id);
        f.inv.items.adjust_quantity(removal).await.unwrap();

        assert!(f.inv.destinations.is_in_use(site.id).await.unwrap());
        assert!(f.inv.destinations.delete(site.id).await.is_err());
    }

    #[tokio::test]
    async fn category_tree_rules() {
        let f = fixture().await;
        let roots = f
            .inv
            .categories
            .list(CategoryScope::Roots, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(roots.total_count, 1);

        for n in 2..=8 {
            f.inv
                .categories
                .add(NewCategory::root(format!("Root {n}")))
                .await
                .unwrap();
        }
        let err = f
            .inv
            .categories
            .add(NewCategory::root("Root 9"))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::LimitExceeded(_)));

        // Renaming a root at the cap is still fine.
        let hardware = f.category.parent_id.unwrap();
        f.inv.categories.update(hardware, "Ironmongery").await.unwrap();

        let err = f
            .inv
            .categories
            .add(NewCategory::child("Too deep", f.category.id))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidArgument(_)));

        let err = f
            .inv
            .categories
            .add(NewCategory::child("Orphan", CategoryId::new()))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound { .. }));

        let children = f
            .inv
            .categories
            .list(CategoryScope::ChildrenOf(hardware), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(children.entries.len(), 1);
        assert_eq!(children.entries[0].name, "Bolts");

        assert!(f.inv.categories.is_in_use(hardware).await.unwrap());
        assert!(!f.inv.categories.is_in_use(f.category.id).await.unwrap());
    }

    /// Run `tasks` alternating +3/-3 adjustments against a file-backed store
    /// and check the stock and the ledger agree afterwards.
    async fn assert_concurrent_adjustments_serialize(max_connections: u32, tasks: usize) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("stock.db").display());
        let config = StoreConfig::new(url).with_max_connections(max_connections);
        let inv = Inventory::open(&config).await.unwrap();

        let unit = inv.units.add("box").await.unwrap();
        let root = inv.categories.add(NewCategory::root("Stores")).await.unwrap();
        let category = inv
            .categories
            .add(NewCategory::child("Boxes", root.id))
            .await
            .unwrap();
        let item = inv
            .items
            .create_item(NewItem::new("Carton", unit.id, category.id, 100))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for n in 0..tasks {
            let items = inv.items.clone();
            let kind = if n % 2 == 0 {
                AdjustmentKind::Addition
            } else {
                AdjustmentKind::Removal
            };
            handles.push(tokio::spawn(async move {
                items
                    .adjust_quantity(StockAdjustment::new(item.id, 3, kind))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let item = inv.items.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(item.current_quantity, 100);

        let history = inv.ledger.history(item.id).await.unwrap();
        assert_eq!(history.len(), tasks + 1);
        let total: i64 = history.iter().filter_map(|e| e.quantity_changed).sum();
        assert_eq!(total, item.current_quantity);
        inv.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adjustments_serialize() {
        assert_concurrent_adjustments_serialize(1, 20).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adjustments_serialize_across_pooled_connections() {
        assert_concurrent_adjustments_serialize(4, 40).await;
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 24,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of adjustments the stored quantity equals
        /// the sum of signed ledger deltas and every entry's resulting quantity is
        /// non-negative.
        #[test]
        fn stored_quantity_matches_ledger(
            opening in 0i64..200,
            steps in prop::collection::vec((1i64..120, any::<bool>()), 1..25)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let outcome: Result<(), TestCaseError> = rt.block_on(async {
                let f = fixture().await;
                let item = f.create("Sprocket", opening).await;

                for (delta, add) in steps {
                    let kind = if add { AdjustmentKind::Addition } else { AdjustmentKind::Removal };
                    let before = f.item(item.id).await.current_quantity;
                    let entries_before = f.history(item.id).await.len();

                    match f.inv.items.adjust_quantity(StockAdjustment::new(item.id, delta, kind)).await {
                        Ok(updated) => {
                            let latest = f.history(item.id).await;
                            prop_assert_eq!(latest.len(), entries_before + 1);
                            prop_assert_eq!(latest[0].resulting_quantity, Some(updated.current_quantity));
                        }
                        Err(err) => {
                            prop_assert_eq!(
                                domain(err),
                                DomainError::InvalidState("negative quantity".to_string())
                            );
                            prop_assert_eq!(f.item(item.id).await.current_quantity, before);
                            prop_assert_eq!(f.history(item.id).await.len(), entries_before);
                        }
                    }
                }

                let item = f.item(item.id).await;
                let history = f.history(item.id).await;
                let sum: i64 = history.iter().filter_map(|e| e.quantity_changed).sum();
                prop_assert_eq!(sum, item.current_quantity);
                prop_assert!(item.current_quantity >= 0);
                prop_assert!(history.iter().filter_map(|e| e.resulting_quantity).all(|q| q >= 0));
                Ok(())
            });
            outcome?;
        }
    }
}
