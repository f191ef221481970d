//! Row conversion between `SQLite` and the domain types.

use crate::models::{
    ApplicationType, Component, ComponentId, Formula, FormulaComponent, FormulaId, FormulaStatus,
    Ingredient, IngredientId, Intermediate, IntermediateId, IntermediateType, MaterialType,
    Performance, PerformanceId, PropertyMap, RawMaterial, RawMaterialId, TestMethod,
};
use chrono::{DateTime, Utc};
use rusqlite::Row;

/// Serializes a property map into a JSON text column.
pub fn encode_map(map: &PropertyMap) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
}

/// Reads a JSON text column back into a property map.
fn decode_map(row: &Row<'_>, column: &str) -> rusqlite::Result<PropertyMap> {
    let raw: Option<String> = row.get(column)?;
    Ok(raw
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default())
}

/// Reads a unix-seconds column.
fn timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(column)?;
    Ok(DateTime::from_timestamp(secs, 0).unwrap_or_default())
}

/// Parses a raw material from a `kg_raw_material` row.
pub fn parse_raw_material(row: &Row<'_>) -> rusqlite::Result<RawMaterial> {
    let material_type: String = row.get("material_type")?;
    Ok(RawMaterial {
        id: RawMaterialId::new(row.get("id")?),
        code: row.get("code")?,
        name: row.get("name")?,
        chemical_name: row.get("chemical_name")?,
        cas_number: row.get("cas_number")?,
        material_type: MaterialType::parse(&material_type).unwrap_or_default(),
        molecular_formula: row.get("molecular_formula")?,
        molecular_weight: row.get("molecular_weight")?,
        density: row.get("density")?,
        viscosity: row.get("viscosity")?,
        supplier: row.get("supplier")?,
        unit_price: row.get("unit_price")?,
        properties: decode_map(row, "properties")?,
        description: row.get("description")?,
        created_by: row.get("created_by")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

/// Parses an intermediate from a `kg_intermediate` row.
pub fn parse_intermediate(row: &Row<'_>) -> rusqlite::Result<Intermediate> {
    let intermediate_type: String = row.get("intermediate_type")?;
    Ok(Intermediate {
        id: IntermediateId::new(row.get("id")?),
        code: row.get("code")?,
        name: row.get("name")?,
        intermediate_type: IntermediateType::parse(&intermediate_type).unwrap_or_default(),
        preparation_method: row.get("preparation_method")?,
        reaction_conditions: decode_map(row, "reaction_conditions")?,
        viscosity: row.get("viscosity")?,
        solid_content: row.get("solid_content")?,
        properties: decode_map(row, "properties")?,
        description: row.get("description")?,
        created_by: row.get("created_by")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

/// Parses a formula from a `kg_formula` row.
pub fn parse_formula(row: &Row<'_>) -> rusqlite::Result<Formula> {
    let status: String = row.get("status")?;
    let application_type: String = row.get("application_type")?;
    Ok(Formula {
        id: FormulaId::new(row.get("id")?),
        code: row.get("code")?,
        name: row.get("name")?,
        version: row.get("version")?,
        status: FormulaStatus::parse(&status).unwrap_or_default(),
        application_type: ApplicationType::parse(&application_type).unwrap_or_default(),
        mixing_temperature: row.get("mixing_temperature")?,
        mixing_time: row.get("mixing_time")?,
        curing_temperature: row.get("curing_temperature")?,
        curing_time: row.get("curing_time")?,
        process_description: row.get("process_description")?,
        precautions: row.get("precautions")?,
        properties: decode_map(row, "properties")?,
        description: row.get("description")?,
        created_by: row.get("created_by")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

/// Parses a test record from a `kg_performance` row.
pub fn parse_performance(row: &Row<'_>) -> rusqlite::Result<Performance> {
    let test_method: String = row.get("test_method")?;
    Ok(Performance {
        id: PerformanceId::new(row.get("id")?),
        formula: FormulaId::new(row.get("formula_id")?),
        test_batch: row.get("test_batch")?,
        test_date: row.get("test_date")?,
        test_method: TestMethod::parse(&test_method).unwrap_or_default(),
        test_conditions: decode_map(row, "test_conditions")?,
        tensile_strength: row.get("tensile_strength")?,
        elongation_at_break: row.get("elongation_at_break")?,
        tear_strength: row.get("tear_strength")?,
        hardness: row.get("hardness")?,
        adhesion_strength: row.get("adhesion_strength")?,
        weather_resistance: row.get("weather_resistance")?,
        water_resistance: row.get("water_resistance")?,
        heat_resistance_temp: row.get("heat_resistance_temp")?,
        cold_resistance_temp: row.get("cold_resistance_temp")?,
        viscosity: row.get("viscosity")?,
        density: row.get("density")?,
        tack_free_time: row.get("tack_free_time")?,
        full_cure_time: row.get("full_cure_time")?,
        additional_properties: decode_map(row, "additional_properties")?,
        overall_rating: row.get("overall_rating")?,
        notes: row.get("notes")?,
        tested_by: row.get("tested_by")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

/// Parses an ingredient from a `kg_intermediate_composition` row.
pub fn parse_ingredient(row: &Row<'_>) -> rusqlite::Result<Ingredient> {
    Ok(Ingredient {
        id: IngredientId::new(row.get("id")?),
        intermediate: IntermediateId::new(row.get("intermediate_id")?),
        raw_material: RawMaterialId::new(row.get("raw_material_id")?),
        weight_ratio: row.get("weight_ratio")?,
        addition_order: row.get("addition_order")?,
        addition_temperature: row.get("addition_temperature")?,
        notes: row.get("notes")?,
    })
}

/// Parses a formula component from a `kg_formula_composition` row.
///
/// The table's CHECK constraint guarantees exactly one child column is set.
pub fn parse_component(row: &Row<'_>) -> rusqlite::Result<FormulaComponent> {
    let intermediate: Option<i64> = row.get("intermediate_id")?;
    let raw_material: Option<i64> = row.get("raw_material_id")?;
    let component = match (intermediate, raw_material) {
        (Some(id), _) => Component::from(IntermediateId::new(id)),
        (None, Some(id)) => Component::from(RawMaterialId::new(id)),
        (None, None) => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                "intermediate_id".to_string(),
                rusqlite::types::Type::Null,
            ));
        },
    };
    Ok(FormulaComponent {
        id: ComponentId::new(row.get("id")?),
        formula: FormulaId::new(row.get("formula_id")?),
        component,
        weight_ratio: row.get("weight_ratio")?,
        addition_order: row.get("addition_order")?,
        notes: row.get("notes")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyValue;

    #[test]
    fn test_encode_map_is_json_object() {
        let mut map = PropertyMap::new();
        map.insert("temperature".to_string(), PropertyValue::from("80-90 C"));
        map.insert("time_h".to_string(), PropertyValue::from(2.5));
        assert_eq!(encode_map(&map), r#"{"temperature":"80-90 C","time_h":2.5}"#);
        assert_eq!(encode_map(&PropertyMap::new()), "{}");
    }
}
