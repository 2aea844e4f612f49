use crate::types::TransferRecord;

/// Fiat value of a transfer at the given spot price
pub fn fiat_value(record: &TransferRecord, fiat_price_per_unit: f64) -> f64 {
    record.native_value * fiat_price_per_unit
}

/// Keep the transfers worth at least `min_fiat_value`, in input order
pub fn filter(
    records: Vec<TransferRecord>,
    fiat_price_per_unit: f64,
    min_fiat_value: f64,
) -> Vec<TransferRecord> {
    records
        .into_iter()
        .filter(|r| fiat_value(r, fiat_price_per_unit) >= min_fiat_value)
        .collect()
}
