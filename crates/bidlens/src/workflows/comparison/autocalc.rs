use super::domain::{LineItem, MoneyField};
use super::format::{format_currency, round_money, round_quantity};

/// Fill in the missing one of {amount, quantity, unit price} when exactly
/// two are present. Returns which field was derived, or `None` when the row
/// does not qualify: zero or one field present, all three present, or a
/// derivation that would divide by zero.
///
/// The derived field is marked on the item so later direct edits can clear
/// the mark; a row the user fully specified is never overwritten.
pub fn complete_line_item(item: &mut LineItem) -> Option<MoneyField> {
    match (item.amount, item.quantity, item.unit_price) {
        (None, Some(quantity), Some(unit_price)) => {
            let amount = round_money(quantity * unit_price);
            item.amount = Some(amount);
            item.amount_raw = format_currency(amount);
            item.derived = Some(MoneyField::Amount);
            Some(MoneyField::Amount)
        }
        (Some(amount), Some(quantity), None) => {
            if quantity == 0.0 {
                return None;
            }
            item.unit_price = Some(round_money(amount / quantity));
            item.derived = Some(MoneyField::UnitPrice);
            Some(MoneyField::UnitPrice)
        }
        (Some(amount), None, Some(unit_price)) => {
            if unit_price == 0.0 {
                return None;
            }
            item.quantity = Some(round_quantity(amount / unit_price));
            item.derived = Some(MoneyField::Quantity);
            Some(MoneyField::Quantity)
        }
        _ => None,
    }
}

/// Apply a direct user edit to one of the three money fields. The edited
/// value is taken as entered and any auto-calculated mark is cleared, so the
/// remaining fields are treated as fixed from here on.
pub fn set_field(item: &mut LineItem, field: MoneyField, value: Option<f64>) {
    match field {
        MoneyField::Amount => {
            item.amount = value.map(round_money);
            item.amount_raw = match item.amount {
                Some(amount) => format_currency(amount),
                None => String::new(),
            };
        }
        MoneyField::Quantity => item.quantity = value,
        MoneyField::UnitPrice => item.unit_price = value.map(round_money),
    }
    item.derived = None;
}
