//! # Schema Capabilities
//!
//! Tenant databases do not all carry every migration. The engine asks a
//! [`SchemaCapabilities`] snapshot before touching any column that was
//! added after the core schema, and leaves that column out when it is
//! missing.
//!
//! ## Snapshot Lifecycle
//! ```text
//! ┌──────────────┐  catalog scan   ┌──────────────┐  refresh   ┌──────────────┐
//! │ generation 0 │ ──────────────► │ generation 1 │ ─────────► │ generation 2 │
//! │ (empty)      │                 │ tables/cols  │            │ tables/cols  │
//! └──────────────┘                 └──────────────┘            └──────────────┘
//! ```
//! Snapshots are immutable; a refresh builds a new one and swaps it in
//! whole (see `tally_db::schema::SchemaCatalog`).

use std::collections::{HashMap, HashSet};

/// A column the engine uses only when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionalColumn {
    pub table: &'static str,
    pub column: &'static str,
}

impl OptionalColumn {
    pub const fn new(table: &'static str, column: &'static str) -> Self {
        OptionalColumn { table, column }
    }
}

impl std::fmt::Display for OptionalColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Every optional column the engine knows about.
pub mod columns {
    use super::OptionalColumn;

    pub const SALES_STORE_ID: OptionalColumn = OptionalColumn::new("sales", "store_id");
    pub const SALE_ITEMS_STORE_ID: OptionalColumn = OptionalColumn::new("sale_items", "store_id");
    pub const SALE_ITEMS_VARIANT_ID: OptionalColumn =
        OptionalColumn::new("sale_items", "variant_id");
    pub const PURCHASE_ITEMS_VARIANT_ID: OptionalColumn =
        OptionalColumn::new("purchase_items", "variant_id");
    pub const PURCHASE_ITEMS_MRP: OptionalColumn = OptionalColumn::new("purchase_items", "mrp");
    pub const PRODUCTS_IS_REPACKING: OptionalColumn =
        OptionalColumn::new("products", "is_repacking");
    pub const VARIANTS_STORE_ID: OptionalColumn =
        OptionalColumn::new("product_variants", "store_id");
    pub const VARIANTS_BARCODE: OptionalColumn = OptionalColumn::new("product_variants", "barcode");
    pub const CUSTOMERS_LOYALTY_POINTS: OptionalColumn =
        OptionalColumn::new("customers", "loyalty_points");
    pub const CUSTOMERS_CREDIT_DUE: OptionalColumn = OptionalColumn::new("customers", "credit_due");

    pub const ALL: [OptionalColumn; 10] = [
        SALES_STORE_ID,
        SALE_ITEMS_STORE_ID,
        SALE_ITEMS_VARIANT_ID,
        PURCHASE_ITEMS_VARIANT_ID,
        PURCHASE_ITEMS_MRP,
        PRODUCTS_IS_REPACKING,
        VARIANTS_STORE_ID,
        VARIANTS_BARCODE,
        CUSTOMERS_LOYALTY_POINTS,
        CUSTOMERS_CREDIT_DUE,
    ];
}

/// Tables the catalog scan covers.
pub const ENGINE_TABLES: [&str; 8] = [
    "stores",
    "products",
    "product_variants",
    "sales",
    "sale_items",
    "purchases",
    "purchase_items",
    "customers",
];

/// An immutable, versioned view of which columns exist.
///
/// Lookups are case-insensitive on both table and column names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaCapabilities {
    generation: u64,
    tables: HashMap<String, HashSet<String>>,
}

impl SchemaCapabilities {
    /// The pre-initialization snapshot: generation 0, no columns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a snapshot from `(table, column)` pairs.
    pub fn from_columns<I, T, C>(generation: u64, pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, C)>,
        T: AsRef<str>,
        C: AsRef<str>,
    {
        let mut tables: HashMap<String, HashSet<String>> = HashMap::new();
        for (table, column) in pairs {
            tables
                .entry(table.as_ref().to_ascii_lowercase())
                .or_default()
                .insert(column.as_ref().to_ascii_lowercase());
        }
        SchemaCapabilities { generation, tables }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once a catalog scan has produced this snapshot.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.generation > 0
    }

    /// False for unknown tables or columns, and before initialization.
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(&table.to_ascii_lowercase())
            .map(|cols| cols.contains(&column.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    #[inline]
    pub fn supports(&self, column: OptionalColumn) -> bool {
        self.has_column(column.table, column.column)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_ascii_lowercase())
    }

    /// Optional columns this database lacks.
    pub fn missing_optional(&self) -> Vec<OptionalColumn> {
        columns::ALL
            .iter()
            .copied()
            .filter(|c| !self.supports(*c))
            .collect()
    }
}
