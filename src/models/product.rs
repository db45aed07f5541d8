use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub price: i64,
}

/// Wire shape of a catalogue hit.
#[derive(Debug, Clone, Serialize)]
pub struct ProductItem {
    pub code: String,
    pub name: String,
    pub price: i64,
    #[serde(rename = "prdId")]
    pub prd_id: i64,
}

impl From<Product> for ProductItem {
    fn from(p: Product) -> Self {
        Self {
            code: p.code,
            name: p.name,
            price: p.price,
            prd_id: p.id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductLookupResponse {
    pub items: Vec<ProductItem>,
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpsertRequest {
    #[serde(default)]
    pub items: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkUpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductUpsert {
    pub code: String,
    pub name: String,
    pub price: i64,
}

impl ProductUpsert {
    /// Parse one loosely-typed bulk item.
    ///
    /// Codes may arrive as strings or numbers; prices as numbers, numeric
    /// strings or null. `Ok(None)` means the item has no usable code and is skipped.
    pub fn from_value(index: usize, item: &Value) -> Result<Option<Self>, String> {
        let Value::Object(fields) = item else {
            return Err(format!("items[{index}]: expected an object"));
        };

        let code = match fields.get("code") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => return Err(format!("items[{index}].code: unsupported value {other}")),
        };
        if code.is_empty() {
            return Ok(None);
        }

        let name = match fields.get("name") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => return Err(format!("items[{index}].name: unsupported value {other}")),
        };

        let price = parse_price(fields.get("price"))
            .ok_or_else(|| format!("items[{index}].price: expected a non-negative integer"))?;

        Ok(Some(Self { code, name, price }))
    }
}

fn parse_price(value: Option<&Value>) -> Option<i64> {
    let price = match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i,
            None => n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)?,
        },
        Some(Value::String(s)) if s.trim().is_empty() => 0,
        Some(Value::String(s)) => s.trim().parse().ok()?,
        Some(_) => return None,
    };
    (price >= 0).then_some(price)
}
