use anyhow::{Context, bail};
use serde::Serialize;
use tracing::debug;

use stockledger_core::{DomainError, Entity, ItemId, PageRequest};
use stockledger_infra::registry::{NamedRegistry, RegistryTable};
use stockledger_infra::{Inventory, StoreConfig};
use stockledger_inventory::{
    CategoryScope, Item, ItemQuery, ItemUpdate, MovementFilter, MovementKind, NewCategory,
    NewItem, StockAdjustment,
};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = store_config(cli.database.as_deref());
    debug!(database = %config.database_url, "opening store");
    let inventory = Inventory::open(&config)
        .await
        .with_context(|| format!("opening store at {}", config.database_url))?;

    let result = dispatch(&inventory, cli.command, cli.actor).await;
    inventory.close().await;
    result
}

fn store_config(database: Option<&str>) -> StoreConfig {
    let from_env = StoreConfig::from_env();
    match database {
        Some(url) => StoreConfig {
            database_url: url.to_string(),
            ..from_env
        },
        None => from_env,
    }
}

async fn dispatch(inv: &Inventory, command: Command, actor: Option<String>) -> anyhow::Result<()> {
    match command {
        Command::Init => {
            println!("store ready");
            Ok(())
        }
        Command::Unit(args) => cmd_registry(&inv.units, args.action).await,
        Command::Provider(args) => cmd_registry(&inv.providers, args.action).await,
        Command::Destination(args) => cmd_registry(&inv.destinations, args.action).await,
        Command::Category(args) => cmd_category(inv, args.action).await,
        Command::Item(args) => cmd_item(inv, args.action, actor).await,
        Command::Log(args) => cmd_log(inv, args).await,
        Command::Summary => print_json(&inv.ledger.daily_summary().await),
    }
}

async fn cmd_registry<R>(registry: &NamedRegistry<R>, action: RegistryAction) -> anyhow::Result<()>
where
    R: RegistryTable + Serialize,
{
    match action {
        RegistryAction::Add { name } => print_json(&registry.add(&name).await?),
        RegistryAction::List => print_json(&registry.list().await?),
        RegistryAction::Rename { id, name } => {
            print_json(&registry.update(parse_id::<R>(&id)?, &name).await?)
        }
        RegistryAction::Delete { id } => {
            let id = parse_id::<R>(&id)?;
            registry.delete(id).await?;
            println!("deleted {} {id}", R::KIND);
            Ok(())
        }
        RegistryAction::InUse { id } => {
            print_json(&registry.is_in_use(parse_id::<R>(&id)?).await?)
        }
    }
}

fn parse_id<R: RegistryTable>(raw: &str) -> Result<R::Id, DomainError> {
    raw.parse()
}

async fn cmd_category(inv: &Inventory, action: CategoryAction) -> anyhow::Result<()> {
    let categories = &inv.categories;
    match action {
        CategoryAction::Add { name, parent } => {
            let cmd = match parent {
                Some(parent_id) => NewCategory::child(name, parent_id),
                None => NewCategory::root(name),
            };
            print_json(&categories.add(cmd).await?)
        }
        CategoryAction::List {
            roots,
            parent,
            page,
        } => {
            let scope = match (roots, parent) {
                (_, Some(parent_id)) => CategoryScope::ChildrenOf(parent_id),
                (true, None) => CategoryScope::Roots,
                (false, None) => CategoryScope::All,
            };
            print_json(&categories.list(scope, page_request(page)?).await?)
        }
        CategoryAction::Rename { id, name } => print_json(&categories.update(id, &name).await?),
        CategoryAction::Delete { id } => print_json(&categories.delete(id).await?),
        CategoryAction::InUse { id } => print_json(&categories.is_in_use(id).await?),
    }
}

async fn cmd_item(inv: &Inventory, action: ItemAction, actor: Option<String>) -> anyhow::Result<()> {
    let items = &inv.items;
    match action {
        ItemAction::Create {
            name,
            unit,
            category,
            quantity,
            provider,
            cost,
            barcode,
        } => {
            let cmd = NewItem {
                provider_id: provider,
                cost,
                barcode,
                actor,
                ..NewItem::new(name, unit, category, quantity)
            };
            print_json(&items.create_item(cmd).await?)
        }
        ItemAction::Adjust {
            id,
            kind,
            delta,
            provider,
            cost,
            destination,
        } => {
            let adjustment = StockAdjustment {
                actor,
                provider_id: provider,
                cost,
                destination_id: destination,
                ..StockAdjustment::new(id, delta, kind)
            };
            print_json(&items.adjust_quantity(adjustment).await?)
        }
        ItemAction::Update {
            id,
            name,
            unit,
            category,
            barcode,
            force_unit_change,
        } => {
            let current = require_item(inv, id).await?;
            let update = ItemUpdate {
                item_id: id,
                name: name.unwrap_or_else(|| current.name.clone()),
                unit_id: unit.unwrap_or(current.unit_id),
                sub_category_id: category.or(current.sub_category_id),
                barcode: barcode.or_else(|| current.barcode.clone()),
                actor,
                force_unit_change,
            };
            let outcome = items.update_item(update).await?;
            if outcome.is_confirmation_required() {
                eprintln!("re-run with --force-unit-change to apply");
            }
            print_json(&outcome)
        }
        ItemAction::Status { id, status } => {
            print_json(&items.set_status(id, status, actor).await?)
        }
        ItemAction::Restore { id, category } => {
            print_json(&items.restore(id, category, actor).await?)
        }
        ItemAction::Show { id } => {
            let item = require_item(inv, id).await?;
            let history = inv.ledger.history(id).await?;
            print_json(&serde_json::json!({ "item": item, "history": history }))
        }
        ItemAction::Find { name, barcode } => {
            let found = match (name, barcode) {
                (Some(name), _) => items.find_by_name(&name).await?,
                (None, Some(barcode)) => items.find_active_by_barcode(&barcode).await?,
                (None, None) => bail!("pass --name or --barcode"),
            };
            match found {
                Some(item) => print_json(&item),
                None => bail!("no matching item"),
            }
        }
        ItemAction::List {
            search,
            category,
            page,
        } => {
            let query = ItemQuery {
                search,
                sub_category_id: category,
            };
            print_json(&items.list_items(&query, page_request(page)?).await?)
        }
    }
}

async fn require_item(inv: &Inventory, id: ItemId) -> anyhow::Result<Item> {
    inv.items
        .get_item(id)
        .await?
        .ok_or_else(|| DomainError::not_found(Item::KIND, id).into())
}

async fn cmd_log(inv: &Inventory, args: LogArgs) -> anyhow::Result<()> {
    let kinds = args.kinds.as_deref().and_then(MovementKind::parse_list);
    let filter = MovementFilter {
        item_id: args.item,
        kinds,
        provider_id: args.provider,
        destination_id: args.destination,
        date_from: args.from,
        date_to: args.to,
    };
    let page = if args.all {
        None
    } else {
        Some(page_request(args.page)?)
    };
    print_json(&inv.ledger.query(&filter, page).await?)
}

fn page_request(args: PageArgs) -> anyhow::Result<PageRequest> {
    Ok(PageRequest::new(args.page, args.page_size)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
