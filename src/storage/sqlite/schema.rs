//! Table definitions for the `SQLite` knowledge store.

use super::connection::storage_error;
use crate::Result;
use rusqlite::Connection;

/// Tables in creation order (parents before children).
const TABLES: &[(&str, &str)] = &[
    (
        "create_raw_material_table",
        "CREATE TABLE IF NOT EXISTS kg_raw_material (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            chemical_name TEXT NOT NULL DEFAULT '',
            cas_number TEXT NOT NULL DEFAULT '',
            material_type TEXT NOT NULL,
            molecular_formula TEXT NOT NULL DEFAULT '',
            molecular_weight REAL,
            density REAL,
            viscosity REAL,
            supplier TEXT NOT NULL DEFAULT '',
            unit_price REAL,
            properties TEXT NOT NULL DEFAULT '{}',
            description TEXT NOT NULL DEFAULT '',
            created_by TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    ),
    (
        "create_intermediate_table",
        "CREATE TABLE IF NOT EXISTS kg_intermediate (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            intermediate_type TEXT NOT NULL,
            preparation_method TEXT NOT NULL DEFAULT '',
            reaction_conditions TEXT NOT NULL DEFAULT '{}',
            viscosity REAL,
            solid_content REAL,
            properties TEXT NOT NULL DEFAULT '{}',
            description TEXT NOT NULL DEFAULT '',
            created_by TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    ),
    (
        "create_intermediate_composition_table",
        "CREATE TABLE IF NOT EXISTS kg_intermediate_composition (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            intermediate_id INTEGER NOT NULL
                REFERENCES kg_intermediate(id) ON DELETE CASCADE,
            raw_material_id INTEGER NOT NULL
                REFERENCES kg_raw_material(id) ON DELETE CASCADE,
            weight_ratio REAL NOT NULL CHECK (weight_ratio >= 0),
            addition_order INTEGER NOT NULL DEFAULT 1,
            addition_temperature REAL,
            notes TEXT NOT NULL DEFAULT '',
            UNIQUE (intermediate_id, raw_material_id)
        )",
    ),
    (
        "create_formula_table",
        "CREATE TABLE IF NOT EXISTS kg_formula (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            version TEXT NOT NULL DEFAULT '1.0',
            status TEXT NOT NULL DEFAULT 'draft',
            application_type TEXT NOT NULL,
            mixing_temperature REAL,
            mixing_time REAL,
            curing_temperature REAL,
            curing_time REAL,
            process_description TEXT NOT NULL DEFAULT '',
            precautions TEXT NOT NULL DEFAULT '',
            properties TEXT NOT NULL DEFAULT '{}',
            description TEXT NOT NULL DEFAULT '',
            created_by TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    ),
    (
        "create_formula_composition_table",
        "CREATE TABLE IF NOT EXISTS kg_formula_composition (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            formula_id INTEGER NOT NULL
                REFERENCES kg_formula(id) ON DELETE CASCADE,
            component_type TEXT NOT NULL,
            intermediate_id INTEGER
                REFERENCES kg_intermediate(id) ON DELETE CASCADE,
            raw_material_id INTEGER
                REFERENCES kg_raw_material(id) ON DELETE CASCADE,
            weight_ratio REAL NOT NULL CHECK (weight_ratio >= 0),
            addition_order INTEGER NOT NULL DEFAULT 1,
            notes TEXT NOT NULL DEFAULT '',
            CHECK (
                (component_type = 'intermediate'
                    AND intermediate_id IS NOT NULL AND raw_material_id IS NULL)
                OR (component_type = 'raw_material'
                    AND raw_material_id IS NOT NULL AND intermediate_id IS NULL)
            )
        )",
    ),
    (
        "create_performance_table",
        "CREATE TABLE IF NOT EXISTS kg_performance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            formula_id INTEGER NOT NULL
                REFERENCES kg_formula(id) ON DELETE CASCADE,
            test_batch TEXT NOT NULL,
            test_date TEXT NOT NULL,
            test_method TEXT NOT NULL,
            test_conditions TEXT NOT NULL DEFAULT '{}',
            tensile_strength REAL,
            elongation_at_break REAL,
            tear_strength REAL,
            hardness REAL,
            adhesion_strength REAL,
            weather_resistance TEXT NOT NULL DEFAULT '',
            water_resistance TEXT NOT NULL DEFAULT '',
            heat_resistance_temp REAL,
            cold_resistance_temp REAL,
            viscosity REAL,
            density REAL,
            tack_free_time REAL,
            full_cure_time REAL,
            additional_properties TEXT NOT NULL DEFAULT '{}',
            overall_rating INTEGER CHECK (overall_rating BETWEEN 1 AND 5),
            notes TEXT NOT NULL DEFAULT '',
            tested_by TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    ),
];

/// Creates all tables if they do not exist yet.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for &(operation, sql) in TABLES {
        conn.execute(sql, []).map_err(storage_error(operation))?;
    }
    create_indexes(conn);
    Ok(())
}

/// Creates indexes for the traversal lookups.
///
/// Failures are ignored; indexes only affect speed.
fn create_indexes(conn: &Connection) {
    let _ = conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_kg_ic_raw_material ON kg_intermediate_composition(raw_material_id)",
        [],
    );
    let _ = conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_kg_fc_formula ON kg_formula_composition(formula_id)",
        [],
    );
    let _ = conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_kg_fc_intermediate ON kg_formula_composition(intermediate_id)",
        [],
    );
    let _ = conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_kg_fc_raw_material ON kg_formula_composition(raw_material_id)",
        [],
    );
    let _ = conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_kg_performance_formula ON kg_performance(formula_id)",
        [],
    );
    let _ = conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_kg_formula_status ON kg_formula(status)",
        [],
    );
}
