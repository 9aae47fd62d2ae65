use std::io::Read;

use serde::{Deserialize, Deserializer};

use crate::workflows::comparison::domain::{CostCategory, LineItem, SourceRef};
use crate::workflows::comparison::format::parse_money;

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<LineItem>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut items = Vec::new();

    for (offset, record) in csv_reader.deserialize::<WorksheetRow>().enumerate() {
        let row = record?;
        if row.description.trim().is_empty() {
            continue;
        }
        items.push(row.into_line_item(offset as u32 + 2));
    }

    Ok(items)
}

/// One row of a structured line-item export. Header names match the
/// extraction service's worksheet format; unknown columns are ignored.
#[derive(Debug, Deserialize)]
struct WorksheetRow {
    #[serde(rename = "Description", alias = "description")]
    description: String,
    #[serde(
        rename = "Category",
        alias = "category",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    category: Option<String>,
    #[serde(
        rename = "Amount",
        alias = "amount",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    amount: Option<String>,
    #[serde(
        rename = "Quantity",
        alias = "quantity",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    quantity: Option<String>,
    #[serde(
        rename = "Unit Price",
        alias = "unit_price",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    unit_price: Option<String>,
    #[serde(
        rename = "Confidence",
        alias = "confidence",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    confidence: Option<String>,
}

impl WorksheetRow {
    fn into_line_item(self, row_number: u32) -> LineItem {
        let amount_raw = self.amount.clone().unwrap_or_default();
        let confidence = self
            .confidence
            .as_deref()
            .and_then(|raw| raw.trim().parse::<f32>().ok())
            .map(|value| value.clamp(0.0, 1.0))
            .unwrap_or(1.0);

        LineItem {
            description: self.description.trim().to_string(),
            category: self.category.as_deref().and_then(CostCategory::from_name),
            amount: self.amount.as_deref().and_then(parse_money),
            amount_raw,
            quantity: self
                .quantity
                .as_deref()
                .and_then(|raw| raw.trim().parse::<f64>().ok()),
            unit_price: self.unit_price.as_deref().and_then(parse_money),
            source: SourceRef {
                sheet: None,
                row: Some(row_number),
            },
            confidence,
            derived: None,
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
