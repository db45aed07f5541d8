use rusqlite::Connection;

/// Expected column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub create_sql: &'static str,
    pub columns: &'static [ColumnSpec],
}

#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

impl IndexSpec {
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {}({})",
            self.name,
            self.table,
            self.columns.join(", ")
        )
    }
}

const fn col(name: &'static str, sql_type: &'static str, nullable: bool) -> ColumnSpec {
    ColumnSpec {
        name,
        sql_type,
        nullable,
    }
}

pub const PRODUCTS: TableSpec = TableSpec {
    name: "products",
    create_sql: "
        CREATE TABLE IF NOT EXISTS products (
            PRD_ID INTEGER PRIMARY KEY AUTOINCREMENT,
            CODE   TEXT NOT NULL,
            NAME   TEXT NOT NULL,
            PRICE  INTEGER NOT NULL DEFAULT 0,
            CONSTRAINT ck_products_price_nonneg CHECK (PRICE >= 0),
            CONSTRAINT ck_products_code_len CHECK (length(CODE) >= 1 AND length(CODE) <= 64)
        )",
    columns: &[
        col("PRD_ID", "INTEGER", false),
        col("CODE", "TEXT", false),
        col("NAME", "TEXT", false),
        col("PRICE", "INTEGER", false),
    ],
};

pub const TRADES: TableSpec = TableSpec {
    name: "trades",
    create_sql: "
        CREATE TABLE IF NOT EXISTS trades (
            TRD_ID         INTEGER PRIMARY KEY AUTOINCREMENT,
            DATETIME       DATETIME,
            EMP_CD         TEXT,
            STORE_CD       TEXT,
            POS_NO         TEXT,
            TTL_AMT_EX_TAX INTEGER NOT NULL DEFAULT 0,
            TOTAL_AMT      INTEGER NOT NULL DEFAULT 0
        )",
    columns: &[
        col("TRD_ID", "INTEGER", false),
        col("DATETIME", "DATETIME", true),
        col("EMP_CD", "TEXT", true),
        col("STORE_CD", "TEXT", true),
        col("POS_NO", "TEXT", true),
        col("TTL_AMT_EX_TAX", "INTEGER", false),
        col("TOTAL_AMT", "INTEGER", false),
    ],
};

pub const TRADE_DETAILS: TableSpec = TableSpec {
    name: "trade_details",
    create_sql: "
        CREATE TABLE IF NOT EXISTS trade_details (
            DTL_ID    INTEGER PRIMARY KEY AUTOINCREMENT,
            TRD_ID    INTEGER NOT NULL REFERENCES trades(TRD_ID) ON DELETE CASCADE,
            DTL_NO    INTEGER NOT NULL DEFAULT 1,
            PRD_ID    INTEGER,
            PRD_CODE  TEXT NOT NULL,
            PRD_NAME  TEXT NOT NULL,
            PRD_PRICE INTEGER NOT NULL,
            TAX_CD    TEXT,
            QTY       INTEGER NOT NULL DEFAULT 1
        )",
    columns: &[
        col("DTL_ID", "INTEGER", false),
        col("TRD_ID", "INTEGER", false),
        col("DTL_NO", "INTEGER", false),
        col("PRD_ID", "INTEGER", true),
        col("PRD_CODE", "TEXT", false),
        col("PRD_NAME", "TEXT", false),
        col("PRD_PRICE", "INTEGER", false),
        col("TAX_CD", "TEXT", true),
        col("QTY", "INTEGER", false),
    ],
};

pub const TABLES: [TableSpec; 3] = [PRODUCTS, TRADES, TRADE_DETAILS];

pub const PRODUCT_CODE_INDEX: IndexSpec = IndexSpec {
    name: "ix_products_code",
    table: "products",
    columns: &["CODE"],
};

/// One line number per trade.
pub const TRADE_DETAIL_LINE_INDEX: IndexSpec = IndexSpec {
    name: "uq_trade_detail_per_trade",
    table: "trade_details",
    columns: &["TRD_ID", "DTL_NO"],
};

pub const UNIQUE_INDEXES: [IndexSpec; 2] = [PRODUCT_CODE_INDEX, TRADE_DETAIL_LINE_INDEX];

/// Create any missing tables and indexes. Safe to call on every startup.
///
/// Existing tables are left as they are. An index that cannot be built on an
/// older table (missing column, duplicate rows) is logged and skipped; the
/// schema doctor reports and repairs it.
pub fn run(conn: &Connection) -> rusqlite::Result<()> {
    for table in &TABLES {
        conn.execute_batch(table.create_sql)?;
    }
    for index in &UNIQUE_INDEXES {
        if let Err(e) = conn.execute_batch(&index.create_sql()) {
            tracing::warn!(index = index.name, table = index.table, "skipping unique index: {e}");
        }
    }
    Ok(())
}
