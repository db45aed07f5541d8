use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default)]
    pub cashier_code: Option<String>,
    #[serde(default)]
    pub store_code: Option<String>,
    #[serde(default)]
    pub pos_id: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<PurchaseItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseItem {
    #[serde(deserialize_with = "string_or_number")]
    pub product_code: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<i64>,
}

/// Scanners and spreadsheets often send barcodes as JSON numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Code::deserialize(deserializer)? {
        Code::Text(s) => s,
        Code::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub id: i64,
    pub status: String,
    pub success: bool,
    pub subtotal: i64,
    pub total: i64,
}

impl PurchaseResponse {
    pub fn empty() -> Self {
        Self {
            id: 0,
            status: "empty".to_string(),
            success: false,
            subtotal: 0,
            total: 0,
        }
    }

    pub fn accepted(id: i64, subtotal: i64, total: i64) -> Self {
        Self {
            id,
            status: "accepted".to_string(),
            success: true,
            subtotal,
            total,
        }
    }
}

/// A trade ready to be written, details numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrade {
    pub datetime: String,
    pub emp_cd: String,
    pub store_cd: String,
    pub pos_no: String,
    pub subtotal: i64,
    pub total: i64,
    pub details: Vec<NewTradeDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTradeDetail {
    pub line_no: i64,
    pub prd_id: Option<i64>,
    pub prd_code: String,
    pub prd_name: String,
    pub prd_price: i64,
    pub tax_cd: String,
    pub qty: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trade {
    pub id: i64,
    pub datetime: Option<String>,
    pub emp_cd: Option<String>,
    pub store_cd: Option<String>,
    pub pos_no: Option<String>,
    pub subtotal: i64,
    pub total: i64,
    pub details: Vec<TradeDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeDetail {
    pub id: i64,
    pub line_no: i64,
    pub prd_id: Option<i64>,
    pub prd_code: String,
    pub prd_name: String,
    pub prd_price: i64,
    pub tax_cd: Option<String>,
    pub qty: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_code_accepts_numbers() {
        let req: PurchaseRequest = serde_json::from_value(json!({
            "items": [
                {"product_code": 4901234567894u64, "quantity": 1},
                {"product_code": "0012345678905", "quantity": 2, "unit_price": 120}
            ]
        }))
        .unwrap();
        let items = req.items.unwrap();
        assert_eq!(items[0].product_code, "4901234567894");
        assert_eq!(items[1].product_code, "0012345678905");
        assert_eq!(items[1].unit_price, Some(120));
    }

    #[test]
    fn product_code_rejects_other_types() {
        let res: Result<PurchaseItem, _> =
            serde_json::from_value(json!({"product_code": true, "quantity": 1}));
        assert!(res.is_err());
    }
}
