use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{PriceReferences, PropertyRecord, Valuation},
};

/**
 * Computes the valuation of a property.
 *
 * Land value is the total area times the price of the property's street. Construction value sums built area times
 * the price of each construction's standard. Tax is the improved value times the rate of the first construction's
 * primary use. Absent or non-positive areas and unmatched keys contribute zero.
 *
 * # Arguments
 * `property`: The property with its constructions loaded.
 * `references`: The reference tables.
 *
 * # Returns
 * The valuation, or a `Valuation` error when the stored data does not yield finite figures.
 */
pub fn try_calculate(property: &PropertyRecord, references: &PriceReferences) -> Result<Valuation, ApplicationError> {
    let total_area = property.total_area.unwrap_or(0.0);
    let land_value = match property.street.as_deref() {
        Some(street) if total_area > 0.0 => references.street_price(street).map_or(0.0, |price| total_area * price),
        _ => 0.0,
    };

    let construction_value: f64 = property
        .constructions
        .iter()
        .filter_map(|construction| {
            let built_area = construction.built_area.unwrap_or(0.0);
            if built_area <= 0.0 {
                return None;
            }
            let price = references.construction_price(construction.construction_standard.as_deref()?)?;
            Some(built_area * price)
        })
        .sum();

    let improved_value = land_value + construction_value;

    let tax_amount = match property.constructions.first() {
        Some(first) if improved_value > 0.0 => first.primary_use.as_deref().and_then(|use_type| references.tax_rate(use_type)).map_or(0.0, |rate| improved_value * rate),
        _ => 0.0,
    };

    let valuation = Valuation { land_value, construction_value, improved_value, tax_amount };
    if [land_value, construction_value, improved_value, tax_amount].iter().any(|value| !value.is_finite()) {
        return Err(ApplicationError::new(ErrorType::Valuation, format!("Valuation of property {} is not a finite number: {valuation:?}", property.id)));
    }
    Ok(valuation)
}

/**
 * Computes the valuation of a property, degrading to an all-zero valuation when it cannot be computed.
 *
 * # Arguments
 * `property`: The property with its constructions loaded.
 * `references`: The reference tables.
 *
 * # Returns
 * The valuation. Never fails.
 */
pub fn calculate(property: &PropertyRecord, references: &PriceReferences) -> Valuation {
    try_calculate(property, references).unwrap_or_else(|err| {
        tracing::warn!("Valuation degraded to zero: {err}");
        Valuation::default()
    })
}
