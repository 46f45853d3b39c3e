use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use stockledger_core::{CategoryId, DestinationId, ItemId, ProviderId, UnitId};
use stockledger_inventory::{AdjustmentKind, ItemStatus};

#[derive(Parser)]
#[command(
    name = "stockledger",
    about = "Warehouse stock with an append-only movement log",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Name recorded on every ledger entry this invocation writes.
    #[arg(long, global = true, env = "STOCKLEDGER_ACTOR")]
    pub actor: Option<String>,

    /// Overrides STOCKLEDGER_DATABASE_URL.
    #[arg(long, global = true)]
    pub database: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the database file and schema if missing
    Init,
    /// Manage units of measure
    Unit(RegistryArgs),
    /// Manage providers
    Provider(RegistryArgs),
    /// Manage shipping destinations
    Destination(RegistryArgs),
    /// Manage the category tree
    Category(CategoryArgs),
    /// Create, adjust and inspect items
    Item(ItemArgs),
    /// Query the movement log
    Log(LogArgs),
    /// Count today's additions and removals
    Summary,
}

#[derive(Args)]
pub struct RegistryArgs {
    #[command(subcommand)]
    pub action: RegistryAction,
}

/// Ids are parsed by the command for the record kind.
#[derive(Subcommand)]
pub enum RegistryAction {
    Add { name: String },
    List,
    Rename { id: String, name: String },
    Delete { id: String },
    InUse { id: String },
}

#[derive(Args)]
pub struct CategoryArgs {
    #[command(subcommand)]
    pub action: CategoryAction,
}

#[derive(Subcommand)]
pub enum CategoryAction {
    Add {
        name: String,
        /// Root category to file this one under
        #[arg(long)]
        parent: Option<CategoryId>,
    },
    List {
        #[arg(long, conflicts_with = "parent")]
        roots: bool,
        #[arg(long)]
        parent: Option<CategoryId>,
        #[command(flatten)]
        page: PageArgs,
    },
    Rename {
        id: CategoryId,
        name: String,
    },
    /// Delete a category, archiving its inactive items
    Delete {
        id: CategoryId,
    },
    InUse {
        id: CategoryId,
    },
}

#[derive(Args)]
pub struct ItemArgs {
    #[command(subcommand)]
    pub action: ItemAction,
}

#[derive(Subcommand)]
pub enum ItemAction {
    Create {
        name: String,
        #[arg(long)]
        unit: UnitId,
        #[arg(long)]
        category: CategoryId,
        #[arg(long, default_value_t = 0)]
        quantity: i64,
        #[arg(long)]
        provider: Option<ProviderId>,
        #[arg(long)]
        cost: Option<Decimal>,
        #[arg(long)]
        barcode: Option<String>,
    },
    Adjust {
        id: ItemId,
        /// addition or removal
        kind: AdjustmentKind,
        /// Positive amount to add or remove
        delta: i64,
        #[arg(long)]
        provider: Option<ProviderId>,
        #[arg(long)]
        cost: Option<Decimal>,
        #[arg(long)]
        destination: Option<DestinationId>,
    },
    /// Edit an item; omitted fields keep their current value
    Update {
        id: ItemId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        unit: Option<UnitId>,
        #[arg(long)]
        category: Option<CategoryId>,
        /// Pass an empty string to clear the barcode
        #[arg(long)]
        barcode: Option<String>,
        #[arg(long)]
        force_unit_change: bool,
    },
    Status {
        id: ItemId,
        /// active or inactive
        status: ItemStatus,
    },
    Restore {
        id: ItemId,
        #[arg(long)]
        category: CategoryId,
    },
    Show {
        id: ItemId,
    },
    Find {
        #[arg(long, required_unless_present = "barcode", conflicts_with = "barcode")]
        name: Option<String>,
        #[arg(long)]
        barcode: Option<String>,
    },
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<CategoryId>,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(long)]
    pub item: Option<ItemId>,
    /// Comma-separated kinds, e.g. "Addition,Removal"
    #[arg(long)]
    pub kinds: Option<String>,
    #[arg(long)]
    pub provider: Option<ProviderId>,
    #[arg(long)]
    pub destination: Option<DestinationId>,
    /// First day, YYYY-MM-DD
    #[arg(long)]
    pub from: Option<String>,
    /// Last day, YYYY-MM-DD
    #[arg(long)]
    pub to: Option<String>,
    /// Return every matching entry instead of one page
    #[arg(long)]
    pub all: bool,
    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Args, Clone, Copy)]
pub struct PageArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long, default_value_t = 50)]
    pub page_size: u32,
}
