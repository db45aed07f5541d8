use anyhow::anyhow;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Mutex, MutexGuard};

use crate::config::DbLocation;
use crate::migrations;
use crate::models::product::{BulkUpsertSummary, Product, ProductUpsert};
use crate::models::trade::{NewTrade, Trade, TradeDetail};

/// Open a raw connection without touching the schema.
pub fn connect(location: &DbLocation) -> rusqlite::Result<Connection> {
    let conn = match location {
        DbLocation::File(path) => {
            let conn = Connection::open(path)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn
        }
        DbLocation::Memory => Connection::open_in_memory()?,
    };
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub struct PosDb {
    conn: Mutex<Connection>,
}

impl PosDb {
    pub fn open(location: &DbLocation) -> anyhow::Result<Self> {
        let db = Self {
            conn: Mutex::new(connect(location)?),
        };
        db.ensure_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::open(&DbLocation::Memory)
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    pub fn ensure_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        migrations::run(&conn)?;
        Ok(())
    }

    // ── Product operations ──

    pub fn find_product_by_code(&self, code: &str) -> anyhow::Result<Option<Product>> {
        let conn = self.lock()?;
        Ok(select_product(&conn, code)?)
    }

    /// Catalogue entries for several codes in one lock, in input order.
    pub fn find_products_by_codes<S: AsRef<str>>(
        &self,
        codes: &[S],
    ) -> anyhow::Result<Vec<Option<Product>>> {
        let conn = self.lock()?;
        codes
            .iter()
            .map(|c| select_product(&conn, c.as_ref()).map_err(Into::into))
            .collect()
    }

    /// Exact match, then the UPC-A/EAN-13 alternate form of a numeric code.
    pub fn lookup_product(&self, code: &str) -> anyhow::Result<Option<Product>> {
        let conn = self.lock()?;
        if let Some(p) = select_product(&conn, code)? {
            return Ok(Some(p));
        }
        match barcode_alternate(code) {
            Some(alt) => Ok(select_product(&conn, &alt)?),
            None => Ok(None),
        }
    }

    pub fn count_products(&self) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        Ok(count_products(&conn)?)
    }

    /// Insert the two sample products when the catalogue is empty.
    pub fn seed_sample_products(&self) -> anyhow::Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if count_products(&tx)? == 0 {
            for (code, name, price) in SAMPLE_PRODUCTS {
                tx.execute(
                    "INSERT INTO products (CODE, NAME, PRICE) VALUES (?1, ?2, ?3)",
                    params![code, name, price],
                )?;
            }
        }
        let count = count_products(&tx)?;
        tx.commit()?;
        Ok(count)
    }

    pub fn bulk_upsert(&self, items: &[ProductUpsert]) -> anyhow::Result<BulkUpsertSummary> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let (mut inserted, mut updated) = (0, 0);
        for item in items {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT PRD_ID FROM products WHERE CODE = ?1",
                    params![item.code],
                    |row| row.get(0),
                )
                .optional()?;
            match existing {
                Some(id) => {
                    if item.name.is_empty() {
                        tx.execute(
                            "UPDATE products SET PRICE = ?2 WHERE PRD_ID = ?1",
                            params![id, item.price],
                        )?;
                    } else {
                        tx.execute(
                            "UPDATE products SET NAME = ?2, PRICE = ?3 WHERE PRD_ID = ?1",
                            params![id, item.name, item.price],
                        )?;
                    }
                    updated += 1;
                }
                None => {
                    let name = if item.name.is_empty() { &item.code } else { &item.name };
                    tx.execute(
                        "INSERT INTO products (CODE, NAME, PRICE) VALUES (?1, ?2, ?3)",
                        params![item.code, name, item.price],
                    )?;
                    inserted += 1;
                }
            }
        }
        let count = count_products(&tx)?;
        tx.commit()?;
        Ok(BulkUpsertSummary {
            inserted,
            updated,
            count,
        })
    }

    // ── Trade operations ──

    /// Write a trade and all of its lines atomically. Returns the new `TRD_ID`.
    pub fn record_trade(&self, trade: &NewTrade) -> anyhow::Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO trades (DATETIME, EMP_CD, STORE_CD, POS_NO, TTL_AMT_EX_TAX, TOTAL_AMT)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                trade.datetime,
                trade.emp_cd,
                trade.store_cd,
                trade.pos_no,
                trade.subtotal,
                trade.total
            ],
        )?;
        let trade_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO trade_details
                    (TRD_ID, DTL_NO, PRD_ID, PRD_CODE, PRD_NAME, PRD_PRICE, TAX_CD, QTY)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for d in &trade.details {
                stmt.execute(params![
                    trade_id,
                    d.line_no,
                    d.prd_id,
                    d.prd_code,
                    d.prd_name,
                    d.prd_price,
                    d.tax_cd,
                    d.qty
                ])?;
            }
        }
        tx.commit()?;
        Ok(trade_id)
    }

    pub fn get_trade(&self, id: i64) -> anyhow::Result<Option<Trade>> {
        let conn = self.lock()?;
        let trade = conn
            .query_row(
                "SELECT TRD_ID, DATETIME, EMP_CD, STORE_CD, POS_NO, TTL_AMT_EX_TAX, TOTAL_AMT
                 FROM trades WHERE TRD_ID = ?1",
                params![id],
                |row| {
                    Ok(Trade {
                        id: row.get(0)?,
                        datetime: row.get(1)?,
                        emp_cd: row.get(2)?,
                        store_cd: row.get(3)?,
                        pos_no: row.get(4)?,
                        subtotal: row.get(5)?,
                        total: row.get(6)?,
                        details: Vec::new(),
                    })
                },
            )
            .optional()?;
        let Some(mut trade) = trade else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT DTL_ID, DTL_NO, PRD_ID, PRD_CODE, PRD_NAME, PRD_PRICE, TAX_CD, QTY
             FROM trade_details WHERE TRD_ID = ?1 ORDER BY DTL_NO",
        )?;
        trade.details = stmt
            .query_map(params![id], |row| {
                Ok(TradeDetail {
                    id: row.get(0)?,
                    line_no: row.get(1)?,
                    prd_id: row.get(2)?,
                    prd_code: row.get(3)?,
                    prd_name: row.get(4)?,
                    prd_price: row.get(5)?,
                    tax_cd: row.get(6)?,
                    qty: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(trade))
    }
}

const SAMPLE_PRODUCTS: [(&str, &str, i64); 2] = [
    ("4901234567894", "サンプルA", 150),
    ("4900000000001", "サンプルB", 300),
];

fn select_product(conn: &Connection, code: &str) -> rusqlite::Result<Option<Product>> {
    conn.query_row(
        "SELECT PRD_ID, CODE, NAME, PRICE FROM products WHERE CODE = ?1",
        params![code],
        |row| {
            Ok(Product {
                id: row.get(0)?,
                code: row.get(1)?,
                name: row.get(2)?,
                price: row.get(3)?,
            })
        },
    )
    .optional()
}

fn count_products(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
}

/// The other spelling of a retail barcode: a 12-digit UPC-A gains a leading
/// `0`, a 13-digit EAN-13 starting with `0` loses it. Spaces are ignored.
pub fn barcode_alternate(code: &str) -> Option<String> {
    let digits: String = code.trim().chars().filter(|c| *c != ' ').collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.len() {
        12 => Some(format!("0{digits}")),
        13 => digits.strip_prefix('0').map(str::to_string),
        _ => None,
    }
}
