//! `SQLite` knowledge store.
//!
//! Composition uniqueness, the one-child rule of formula components and all
//! cascades are table constraints, so they hold even when several processes
//! share one database file.

// SQLite row counts are i64 but always non-negative.
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]

use super::writer::{GraphWriter, write_bundle};
use crate::models::{
    Component, ComponentDraft, ComponentId, Formula, FormulaComponent, FormulaDraft,
    FormulaFilter, FormulaId, GraphBundle, GraphCounts, ImportSummary, Ingredient,
    IngredientDraft, IngredientId, Intermediate, IntermediateDraft, IntermediateFilter,
    IntermediateId, Performance, PerformanceDraft, PerformanceFilter, PerformanceId, RawMaterial,
    RawMaterialDraft, RawMaterialFilter, RawMaterialId,
};
use crate::storage::sqlite::{
    acquire_lock, configure_connection, encode_map, initialize_schema, parse_component,
    parse_formula, parse_ingredient, parse_intermediate, parse_performance, parse_raw_material,
    storage_error,
};
use crate::storage::traits::KnowledgeStore;
use crate::{Error, Result, current_timestamp};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::instrument;

type RowParser<T> = fn(&Row<'_>) -> rusqlite::Result<T>;

/// `SQLite`-based knowledge store.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and
/// `busy_timeout` handle concurrent access from other processes.
///
/// # Schema
///
/// | Table | Rows |
/// |-------|------|
/// | `kg_raw_material` | [`RawMaterial`] |
/// | `kg_intermediate` | [`Intermediate`] |
/// | `kg_intermediate_composition` | [`Ingredient`] |
/// | `kg_formula` | [`Formula`] |
/// | `kg_formula_composition` | [`FormulaComponent`] |
/// | `kg_performance` | [`Performance`] |
pub struct SqliteKnowledgeStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteKnowledgeStore {
    /// Opens (or creates) a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(storage_error("open_sqlite"))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_error("open_sqlite_memory"))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;
        initialize_schema(&conn)
    }
}

// ============================================================================
// Query helpers
// ============================================================================

fn query_all<T, P: Params>(
    conn: &Connection,
    operation: &'static str,
    sql: &str,
    params: P,
    parse: RowParser<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql).map_err(storage_error(operation))?;
    let rows = stmt
        .query_map(params, parse)
        .map_err(storage_error(operation))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(storage_error(operation))
}

fn query_one<T, P: Params>(
    conn: &Connection,
    operation: &'static str,
    sql: &str,
    params: P,
    parse: RowParser<T>,
) -> Result<Option<T>> {
    conn.query_row(sql, params, parse)
        .optional()
        .map_err(storage_error(operation))
}

/// WHERE clause under construction: SQL fragments plus their bound values.
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl Conditions {
    fn eq(&mut self, column: &str, value: impl ToSql + 'static) {
        self.clauses.push(format!("{column} = ?"));
        self.params.push(Box::new(value));
    }

    /// Case-insensitive substring match against any of `columns`.
    fn contains(&mut self, columns: &[&str], needle: &str) {
        let clause = columns
            .iter()
            .map(|c| format!("instr(lower({c}), lower(?)) > 0"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.clauses.push(format!("({clause})"));
        for _ in columns {
            self.params.push(Box::new(needle.to_string()));
        }
    }

    fn at_least(&mut self, column: &str, value: impl ToSql + 'static) {
        self.clauses.push(format!("{column} >= ?"));
        self.params.push(Box::new(value));
    }

    /// Runs `SELECT *` against `table` ordered by id.
    fn select<T>(
        &self,
        conn: &Connection,
        operation: &'static str,
        table: &str,
        parse: RowParser<T>,
    ) -> Result<Vec<T>> {
        let where_clause = if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        };
        let sql = format!("SELECT * FROM {table} {where_clause} ORDER BY id");
        let params: Vec<&dyn ToSql> = self.params.iter().map(AsRef::as_ref).collect();
        query_all(conn, operation, &sql, params.as_slice(), parse)
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

fn count(conn: &Connection, table: &str) -> Result<usize> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as usize)
    .map_err(storage_error("count_rows"))
}

/// Fails with [`Error::NotFound`] unless `table` has a row with `id`.
fn require_row(conn: &Connection, table: &str, missing: Error, id: i64) -> Result<()> {
    let exists: bool = conn
        .query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)"),
            [id],
            |row| row.get(0),
        )
        .map_err(storage_error("check_reference"))?;
    if exists {
        Ok(())
    } else {
        Err(missing)
    }
}

fn delete_by_id(conn: &Connection, operation: &'static str, table: &str, id: i64) -> Result<bool> {
    let rows = conn
        .execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])
        .map_err(storage_error(operation))?;
    Ok(rows > 0)
}

// ============================================================================
// Writer
// ============================================================================

/// [`GraphWriter`] over a connection or an open transaction.
struct SqliteWriter<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteWriter<'c> {
    const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl GraphWriter for SqliteWriter<'_> {
    fn insert_raw_material(&mut self, d: &RawMaterialDraft) -> Result<RawMaterial> {
        let now = current_timestamp().timestamp();
        self.conn
            .query_row(
                "INSERT INTO kg_raw_material (
                    code, name, chemical_name, cas_number, material_type, molecular_formula,
                    molecular_weight, density, viscosity, supplier, unit_price, properties,
                    description, created_by, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
                RETURNING *",
                params![
                    d.code,
                    d.name,
                    d.chemical_name,
                    d.cas_number,
                    d.material_type.as_str(),
                    d.molecular_formula,
                    d.molecular_weight,
                    d.density,
                    d.viscosity,
                    d.supplier,
                    d.unit_price,
                    encode_map(&d.properties),
                    d.description,
                    d.created_by,
                    now,
                ],
                parse_raw_material,
            )
            .map_err(storage_error("insert_raw_material"))
    }

    fn insert_intermediate(&mut self, d: &IntermediateDraft) -> Result<Intermediate> {
        let now = current_timestamp().timestamp();
        self.conn
            .query_row(
                "INSERT INTO kg_intermediate (
                    code, name, intermediate_type, preparation_method, reaction_conditions,
                    viscosity, solid_content, properties, description, created_by,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                RETURNING *",
                params![
                    d.code,
                    d.name,
                    d.intermediate_type.as_str(),
                    d.preparation_method,
                    encode_map(&d.reaction_conditions),
                    d.viscosity,
                    d.solid_content,
                    encode_map(&d.properties),
                    d.description,
                    d.created_by,
                    now,
                ],
                parse_intermediate,
            )
            .map_err(storage_error("insert_intermediate"))
    }

    fn insert_formula(&mut self, d: &FormulaDraft) -> Result<Formula> {
        let now = current_timestamp().timestamp();
        self.conn
            .query_row(
                "INSERT INTO kg_formula (
                    code, name, version, status, application_type, mixing_temperature,
                    mixing_time, curing_temperature, curing_time, process_description,
                    precautions, properties, description, created_by, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
                RETURNING *",
                params![
                    d.code,
                    d.name,
                    d.version,
                    d.status.as_str(),
                    d.application_type.as_str(),
                    d.mixing_temperature,
                    d.mixing_time,
                    d.curing_temperature,
                    d.curing_time,
                    d.process_description,
                    d.precautions,
                    encode_map(&d.properties),
                    d.description,
                    d.created_by,
                    now,
                ],
                parse_formula,
            )
            .map_err(storage_error("insert_formula"))
    }

    fn insert_performance(
        &mut self,
        formula: FormulaId,
        d: &PerformanceDraft,
    ) -> Result<Performance> {
        require_row(self.conn, "kg_formula", Error::not_found("formula", formula), formula.get())?;
        let now = current_timestamp().timestamp();
        self.conn
            .query_row(
                "INSERT INTO kg_performance (
                    formula_id, test_batch, test_date, test_method, test_conditions,
                    tensile_strength, elongation_at_break, tear_strength, hardness,
                    adhesion_strength, weather_resistance, water_resistance,
                    heat_resistance_temp, cold_resistance_temp, viscosity, density,
                    tack_free_time, full_cure_time, additional_properties, overall_rating,
                    notes, tested_by, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                          ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?23)
                RETURNING *",
                params![
                    formula.get(),
                    d.test_batch,
                    d.test_date,
                    d.test_method.as_str(),
                    encode_map(&d.test_conditions),
                    d.tensile_strength,
                    d.elongation_at_break,
                    d.tear_strength,
                    d.hardness,
                    d.adhesion_strength,
                    d.weather_resistance,
                    d.water_resistance,
                    d.heat_resistance_temp,
                    d.cold_resistance_temp,
                    d.viscosity,
                    d.density,
                    d.tack_free_time,
                    d.full_cure_time,
                    encode_map(&d.additional_properties),
                    d.overall_rating,
                    d.notes,
                    d.tested_by,
                    now,
                ],
                parse_performance,
            )
            .map_err(storage_error("insert_performance"))
    }

    fn insert_ingredient(
        &mut self,
        intermediate: IntermediateId,
        d: &IngredientDraft,
    ) -> Result<Ingredient> {
        require_row(
            self.conn,
            "kg_intermediate",
            Error::not_found("intermediate", intermediate),
            intermediate.get(),
        )?;
        require_row(
            self.conn,
            "kg_raw_material",
            Error::not_found("raw_material", d.raw_material),
            d.raw_material.get(),
        )?;
        self.conn
            .query_row(
                "INSERT INTO kg_intermediate_composition (
                    intermediate_id, raw_material_id, weight_ratio, addition_order,
                    addition_temperature, notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                RETURNING *",
                params![
                    intermediate.get(),
                    d.raw_material.get(),
                    d.weight_ratio,
                    d.addition_order,
                    d.addition_temperature,
                    d.notes,
                ],
                parse_ingredient,
            )
            .map_err(storage_error("insert_ingredient"))
    }

    fn insert_component(
        &mut self,
        formula: FormulaId,
        d: &ComponentDraft,
    ) -> Result<FormulaComponent> {
        require_row(self.conn, "kg_formula", Error::not_found("formula", formula), formula.get())?;
        let (table, id) = match d.component {
            Component::Intermediate { intermediate } => ("kg_intermediate", intermediate.get()),
            Component::RawMaterial { raw_material } => ("kg_raw_material", raw_material.get()),
        };
        require_row(self.conn, table, d.component.not_found(), id)?;
        self.conn
            .query_row(
                "INSERT INTO kg_formula_composition (
                    formula_id, component_type, intermediate_id, raw_material_id,
                    weight_ratio, addition_order, notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                RETURNING *",
                params![
                    formula.get(),
                    d.component.kind(),
                    d.component.intermediate().map(IntermediateId::get),
                    d.component.raw_material().map(RawMaterialId::get),
                    d.weight_ratio,
                    d.addition_order,
                    d.notes,
                ],
                parse_component,
            )
            .map_err(storage_error("insert_component"))
    }

    fn raw_material_id(&mut self, code: &str) -> Result<Option<RawMaterialId>> {
        self.conn
            .query_row(
                "SELECT id FROM kg_raw_material WHERE code = ?1",
                [code],
                |row| row.get(0).map(RawMaterialId::new),
            )
            .optional()
            .map_err(storage_error("resolve_raw_material_code"))
    }

    fn intermediate_id(&mut self, code: &str) -> Result<Option<IntermediateId>> {
        self.conn
            .query_row(
                "SELECT id FROM kg_intermediate WHERE code = ?1",
                [code],
                |row| row.get(0).map(IntermediateId::new),
            )
            .optional()
            .map_err(storage_error("resolve_intermediate_code"))
    }
}

impl KnowledgeStore for SqliteKnowledgeStore {
    // ========================================================================
    // Raw Materials
    // ========================================================================

    #[instrument(skip(self, draft), fields(code = %draft.code))]
    fn insert_raw_material(&self, draft: &RawMaterialDraft) -> Result<RawMaterial> {
        let conn = acquire_lock(&self.conn);
        SqliteWriter::new(&conn).insert_raw_material(draft)
    }

    #[instrument(skip(self), fields(raw_material_id = %id))]
    fn get_raw_material(&self, id: RawMaterialId) -> Result<Option<RawMaterial>> {
        let conn = acquire_lock(&self.conn);
        query_one(
            &conn,
            "get_raw_material",
            "SELECT * FROM kg_raw_material WHERE id = ?1",
            [id.get()],
            parse_raw_material,
        )
    }

    fn find_raw_material(&self, code: &str) -> Result<Option<RawMaterial>> {
        let conn = acquire_lock(&self.conn);
        query_one(
            &conn,
            "find_raw_material",
            "SELECT * FROM kg_raw_material WHERE code = ?1",
            [code],
            parse_raw_material,
        )
    }

    #[instrument(skip(self, d), fields(raw_material_id = %id))]
    fn update_raw_material(
        &self,
        id: RawMaterialId,
        d: &RawMaterialDraft,
    ) -> Result<Option<RawMaterial>> {
        let conn = acquire_lock(&self.conn);
        query_one(
            &conn,
            "update_raw_material",
            "UPDATE kg_raw_material SET
                code = ?2, name = ?3, chemical_name = ?4, cas_number = ?5, material_type = ?6,
                molecular_formula = ?7, molecular_weight = ?8, density = ?9, viscosity = ?10,
                supplier = ?11, unit_price = ?12, properties = ?13, description = ?14,
                created_by = ?15, updated_at = ?16
            WHERE id = ?1
            RETURNING *",
            params![
                id.get(),
                d.code,
                d.name,
                d.chemical_name,
                d.cas_number,
                d.material_type.as_str(),
                d.molecular_formula,
                d.molecular_weight,
                d.density,
                d.viscosity,
                d.supplier,
                d.unit_price,
                encode_map(&d.properties),
                d.description,
                d.created_by,
                current_timestamp().timestamp(),
            ],
            parse_raw_material,
        )
    }

    #[instrument(skip(self), fields(raw_material_id = %id))]
    fn delete_raw_material(&self, id: RawMaterialId) -> Result<bool> {
        let conn = acquire_lock(&self.conn);
        // Foreign key cascades remove ingredient and component rows
        delete_by_id(&conn, "delete_raw_material", "kg_raw_material", id.get())
    }

    #[instrument(skip(self, filter))]
    fn list_raw_materials(&self, filter: &RawMaterialFilter) -> Result<Vec<RawMaterial>> {
        let mut conditions = Conditions::default();
        if let Some(material_type) = filter.material_type {
            conditions.eq("material_type", material_type.as_str());
        }
        if let Some(search) = non_empty(filter.search.as_ref()) {
            conditions.contains(&["name", "code", "chemical_name", "cas_number"], search);
        }
        if let Some(supplier) = non_empty(filter.supplier.as_ref()) {
            conditions.contains(&["supplier"], supplier);
        }

        let conn = acquire_lock(&self.conn);
        conditions.select(&conn, "list_raw_materials", "kg_raw_material", parse_raw_material)
    }

    // ========================================================================
    // Intermediates
    // ========================================================================

    #[instrument(skip(self, draft), fields(code = %draft.code))]
    fn insert_intermediate(&self, draft: &IntermediateDraft) -> Result<Intermediate> {
        let conn = acquire_lock(&self.conn);
        SqliteWriter::new(&conn).insert_intermediate(draft)
    }

    #[instrument(skip(self), fields(intermediate_id = %id))]
    fn get_intermediate(&self, id: IntermediateId) -> Result<Option<Intermediate>> {
        let conn = acquire_lock(&self.conn);
        query_one(
            &conn,
            "get_intermediate",
            "SELECT * FROM kg_intermediate WHERE id = ?1",
            [id.get()],
            parse_intermediate,
        )
    }

    fn find_intermediate(&self, code: &str) -> Result<Option<Intermediate>> {
        let conn = acquire_lock(&self.conn);
        query_one(
            &conn,
            "find_intermediate",
            "SELECT * FROM kg_intermediate WHERE code = ?1",
            [code],
            parse_intermediate,
        )
    }

    #[instrument(skip(self, d), fields(intermediate_id = %id))]
    fn update_intermediate(
        &self,
        id: IntermediateId,
        d: &IntermediateDraft,
    ) -> Result<Option<Intermediate>> {
        let conn = acquire_lock(&self.conn);
        query_one(
            &conn,
            "update_intermediate",
            "UPDATE kg_intermediate SET
                code = ?2, name = ?3, intermediate_type = ?4, preparation_method = ?5,
                reaction_conditions = ?6, viscosity = ?7, solid_content = ?8, properties = ?9,
                description = ?10, created_by = ?11, updated_at = ?12
            WHERE id = ?1
            RETURNING *",
            params![
                id.get(),
                d.code,
                d.name,
                d.intermediate_type.as_str(),
                d.preparation_method,
                encode_map(&d.reaction_conditions),
                d.viscosity,
                d.solid_content,
                encode_map(&d.properties),
                d.description,
                d.created_by,
                current_timestamp().timestamp(),
            ],
            parse_intermediate,
        )
    }

    #[instrument(skip(self), fields(intermediate_id = %id))]
    fn delete_intermediate(&self, id: IntermediateId) -> Result<bool> {
        let conn = acquire_lock(&self.conn);
        delete_by_id(&conn, "delete_intermediate", "kg_intermediate", id.get())
    }

    #[instrument(skip(self, filter))]
    fn list_intermediates(&self, filter: &IntermediateFilter) -> Result<Vec<Intermediate>> {
        let mut conditions = Conditions::default();
        if let Some(intermediate_type) = filter.intermediate_type {
            conditions.eq("intermediate_type", intermediate_type.as_str());
        }
        if let Some(search) = non_empty(filter.search.as_ref()) {
            conditions.contains(&["name", "code"], search);
        }

        let conn = acquire_lock(&self.conn);
        conditions.select(&conn, "list_intermediates", "kg_intermediate", parse_intermediate)
    }

    // ========================================================================
    // Formulas
    // ========================================================================

    #[instrument(skip(self, draft), fields(code = %draft.code))]
    fn insert_formula(&self, draft: &FormulaDraft) -> Result<Formula> {
        let conn = acquire_lock(&self.conn);
        SqliteWriter::new(&conn).insert_formula(draft)
    }

    #[instrument(skip(self), fields(formula_id = %id))]
    fn get_formula(&self, id: FormulaId) -> Result<Option<Formula>> {
        let conn = acquire_lock(&self.conn);
        query_one(
            &conn,
            "get_formula",
            "SELECT * FROM kg_formula WHERE id = ?1",
            [id.get()],
            parse_formula,
        )
    }

    fn find_formula(&self, code: &str) -> Result<Option<Formula>> {
        let conn = acquire_lock(&self.conn);
        query_one(
            &conn,
            "find_formula",
            "SELECT * FROM kg_formula WHERE code = ?1",
            [code],
            parse_formula,
        )
    }

    #[instrument(skip(self, d), fields(formula_id = %id))]
    fn update_formula(&self, id: FormulaId, d: &FormulaDraft) -> Result<Option<Formula>> {
        let conn = acquire_lock(&self.conn);
        query_one(
            &conn,
            "update_formula",
            "UPDATE kg_formula SET
                code = ?2, name = ?3, version = ?4, status = ?5, application_type = ?6,
                mixing_temperature = ?7, mixing_time = ?8, curing_temperature = ?9,
                curing_time = ?10, process_description = ?11, precautions = ?12,
                properties = ?13, description = ?14, created_by = ?15, updated_at = ?16
            WHERE id = ?1
            RETURNING *",
            params![
                id.get(),
                d.code,
                d.name,
                d.version,
                d.status.as_str(),
                d.application_type.as_str(),
                d.mixing_temperature,
                d.mixing_time,
                d.curing_temperature,
                d.curing_time,
                d.process_description,
                d.precautions,
                encode_map(&d.properties),
                d.description,
                d.created_by,
                current_timestamp().timestamp(),
            ],
            parse_formula,
        )
    }

    #[instrument(skip(self), fields(formula_id = %id))]
    fn delete_formula(&self, id: FormulaId) -> Result<bool> {
        let conn = acquire_lock(&self.conn);
        delete_by_id(&conn, "delete_formula", "kg_formula", id.get())
    }

    #[instrument(skip(self, filter))]
    fn list_formulas(&self, filter: &FormulaFilter) -> Result<Vec<Formula>> {
        let mut conditions = Conditions::default();
        if let Some(status) = filter.status {
            conditions.eq("status", status.as_str());
        }
        if let Some(application_type) = filter.application_type {
            conditions.eq("application_type", application_type.as_str());
        }
        if let Some(search) = non_empty(filter.search.as_ref()) {
            conditions.contains(&["name", "code"], search);
        }

        let conn = acquire_lock(&self.conn);
        conditions.select(&conn, "list_formulas", "kg_formula", parse_formula)
    }

    // ========================================================================
    // Performance Records
    // ========================================================================

    #[instrument(skip(self, draft), fields(formula_id = %formula, batch = %draft.test_batch))]
    fn insert_performance(
        &self,
        formula: FormulaId,
        draft: &PerformanceDraft,
    ) -> Result<Performance> {
        let conn = acquire_lock(&self.conn);
        SqliteWriter::new(&conn).insert_performance(formula, draft)
    }

    #[instrument(skip(self), fields(performance_id = %id))]
    fn get_performance(&self, id: PerformanceId) -> Result<Option<Performance>> {
        let conn = acquire_lock(&self.conn);
        query_one(
            &conn,
            "get_performance",
            "SELECT * FROM kg_performance WHERE id = ?1",
            [id.get()],
            parse_performance,
        )
    }

    #[instrument(skip(self, d), fields(performance_id = %id))]
    fn update_performance(
        &self,
        id: PerformanceId,
        d: &PerformanceDraft,
    ) -> Result<Option<Performance>> {
        let conn = acquire_lock(&self.conn);
        query_one(
            &conn,
            "update_performance",
            "UPDATE kg_performance SET
                test_batch = ?2, test_date = ?3, test_method = ?4, test_conditions = ?5,
                tensile_strength = ?6, elongation_at_break = ?7, tear_strength = ?8,
                hardness = ?9, adhesion_strength = ?10, weather_resistance = ?11,
                water_resistance = ?12, heat_resistance_temp = ?13, cold_resistance_temp = ?14,
                viscosity = ?15, density = ?16, tack_free_time = ?17, full_cure_time = ?18,
                additional_properties = ?19, overall_rating = ?20, notes = ?21,
                tested_by = ?22, updated_at = ?23
            WHERE id = ?1
            RETURNING *",
            params![
                id.get(),
                d.test_batch,
                d.test_date,
                d.test_method.as_str(),
                encode_map(&d.test_conditions),
                d.tensile_strength,
                d.elongation_at_break,
                d.tear_strength,
                d.hardness,
                d.adhesion_strength,
                d.weather_resistance,
                d.water_resistance,
                d.heat_resistance_temp,
                d.cold_resistance_temp,
                d.viscosity,
                d.density,
                d.tack_free_time,
                d.full_cure_time,
                encode_map(&d.additional_properties),
                d.overall_rating,
                d.notes,
                d.tested_by,
                current_timestamp().timestamp(),
            ],
            parse_performance,
        )
    }

    #[instrument(skip(self), fields(performance_id = %id))]
    fn delete_performance(&self, id: PerformanceId) -> Result<bool> {
        let conn = acquire_lock(&self.conn);
        delete_by_id(&conn, "delete_performance", "kg_performance", id.get())
    }

    #[instrument(skip(self, filter))]
    fn list_performances(&self, filter: &PerformanceFilter) -> Result<Vec<Performance>> {
        let mut conditions = Conditions::default();
        if let Some(formula) = filter.formula {
            conditions.eq("formula_id", formula.get());
        }
        if let Some(test_method) = filter.test_method {
            conditions.eq("test_method", test_method.as_str());
        }
        if let Some(rating_min) = filter.rating_min {
            conditions.at_least("overall_rating", rating_min);
        }

        let conn = acquire_lock(&self.conn);
        conditions.select(&conn, "list_performances", "kg_performance", parse_performance)
    }

    #[instrument(skip(self, formulas), fields(formula_count = formulas.len()))]
    fn performances_for(&self, formulas: &[FormulaId]) -> Result<Vec<Performance>> {
        if formulas.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; formulas.len()].join(", ");
        let sql = format!(
            "SELECT * FROM kg_performance WHERE formula_id IN ({placeholders}) ORDER BY id"
        );
        let ids: Vec<i64> = formulas.iter().map(|f| f.get()).collect();

        let conn = acquire_lock(&self.conn);
        query_all(
            &conn,
            "performances_for",
            &sql,
            rusqlite::params_from_iter(ids),
            parse_performance,
        )
    }

    // ========================================================================
    // Composition Links
    // ========================================================================

    #[instrument(skip(self, draft), fields(intermediate_id = %intermediate, raw_material_id = %draft.raw_material))]
    fn insert_ingredient(
        &self,
        intermediate: IntermediateId,
        draft: &IngredientDraft,
    ) -> Result<Ingredient> {
        let conn = acquire_lock(&self.conn);
        SqliteWriter::new(&conn).insert_ingredient(intermediate, draft)
    }

    #[instrument(skip(self), fields(ingredient_id = %id))]
    fn delete_ingredient(&self, id: IngredientId) -> Result<bool> {
        let conn = acquire_lock(&self.conn);
        delete_by_id(
            &conn,
            "delete_ingredient",
            "kg_intermediate_composition",
            id.get(),
        )
    }

    fn ingredients_of(&self, intermediate: IntermediateId) -> Result<Vec<Ingredient>> {
        let conn = acquire_lock(&self.conn);
        query_all(
            &conn,
            "ingredients_of",
            "SELECT * FROM kg_intermediate_composition
             WHERE intermediate_id = ?1 ORDER BY addition_order, id",
            [intermediate.get()],
            parse_ingredient,
        )
    }

    fn ingredients_using(&self, raw_material: RawMaterialId) -> Result<Vec<Ingredient>> {
        let conn = acquire_lock(&self.conn);
        query_all(
            &conn,
            "ingredients_using",
            "SELECT * FROM kg_intermediate_composition
             WHERE raw_material_id = ?1 ORDER BY intermediate_id, id",
            [raw_material.get()],
            parse_ingredient,
        )
    }

    fn all_ingredients(&self) -> Result<Vec<Ingredient>> {
        let conn = acquire_lock(&self.conn);
        query_all(
            &conn,
            "all_ingredients",
            "SELECT * FROM kg_intermediate_composition ORDER BY intermediate_id, id",
            [],
            parse_ingredient,
        )
    }

    #[instrument(skip(self, draft), fields(formula_id = %formula, component_type = draft.component.kind()))]
    fn insert_component(
        &self,
        formula: FormulaId,
        draft: &ComponentDraft,
    ) -> Result<FormulaComponent> {
        let conn = acquire_lock(&self.conn);
        SqliteWriter::new(&conn).insert_component(formula, draft)
    }

    #[instrument(skip(self), fields(component_id = %id))]
    fn delete_component(&self, id: ComponentId) -> Result<bool> {
        let conn = acquire_lock(&self.conn);
        delete_by_id(&conn, "delete_component", "kg_formula_composition", id.get())
    }

    fn components_of(&self, formula: FormulaId) -> Result<Vec<FormulaComponent>> {
        let conn = acquire_lock(&self.conn);
        query_all(
            &conn,
            "components_of",
            "SELECT * FROM kg_formula_composition
             WHERE formula_id = ?1 ORDER BY addition_order, id",
            [formula.get()],
            parse_component,
        )
    }

    fn components_using(&self, component: Component) -> Result<Vec<FormulaComponent>> {
        let (column, id) = match component {
            Component::Intermediate { intermediate } => ("intermediate_id", intermediate.get()),
            Component::RawMaterial { raw_material } => ("raw_material_id", raw_material.get()),
        };
        let sql = format!(
            "SELECT * FROM kg_formula_composition WHERE {column} = ?1 ORDER BY formula_id, id"
        );

        let conn = acquire_lock(&self.conn);
        query_all(&conn, "components_using", &sql, [id], parse_component)
    }

    fn all_components(&self) -> Result<Vec<FormulaComponent>> {
        let conn = acquire_lock(&self.conn);
        query_all(
            &conn,
            "all_components",
            "SELECT * FROM kg_formula_composition ORDER BY formula_id, id",
            [],
            parse_component,
        )
    }

    // ========================================================================
    // Bulk Operations
    // ========================================================================

    #[instrument(skip(self, bundle))]
    fn import_bundle(&self, bundle: &GraphBundle) -> Result<ImportSummary> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn.transaction().map_err(storage_error("begin_import"))?;

        // Dropping the transaction on error rolls every row back
        let summary = write_bundle(&mut SqliteWriter::new(&tx), bundle)?;

        tx.commit().map_err(storage_error("commit_import"))?;
        Ok(summary)
    }

    fn counts(&self) -> Result<GraphCounts> {
        let conn = acquire_lock(&self.conn);
        Ok(GraphCounts {
            raw_materials_count: count(&conn, "kg_raw_material")?,
            intermediates_count: count(&conn, "kg_intermediate")?,
            formulas_count: count(&conn, "kg_formula")?,
            performances_count: count(&conn, "kg_performance")?,
        })
    }

    #[instrument(skip(self))]
    fn clear(&self) -> Result<()> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn.transaction().map_err(storage_error("begin_clear"))?;
        tx.execute_batch(
            "DELETE FROM kg_performance;
             DELETE FROM kg_formula_composition;
             DELETE FROM kg_intermediate_composition;
             DELETE FROM kg_formula;
             DELETE FROM kg_intermediate;
             DELETE FROM kg_raw_material;",
        )
        .map_err(storage_error("clear"))?;
        tx.commit().map_err(storage_error("commit_clear"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::Error;
    use crate::models::{ApplicationType, IntermediateType, MaterialType};

    fn store() -> SqliteKnowledgeStore {
        SqliteKnowledgeStore::in_memory().unwrap()
    }

    fn seed(store: &SqliteKnowledgeStore) -> (RawMaterial, Intermediate, Formula) {
        let rm = store
            .insert_raw_material(&RawMaterialDraft::new("RM-001", "Silicone oil", MaterialType::Polymer))
            .unwrap();
        let int = store
            .insert_intermediate(&IntermediateDraft::new("INT-001", "Prepolymer", IntermediateType::Prepolymer))
            .unwrap();
        let formula = store
            .insert_formula(&FormulaDraft::new("F-001", "Sealant", ApplicationType::Sealant))
            .unwrap();
        (rm, int, formula)
    }

    #[test]
    fn test_insert_and_get_raw_material() {
        let store = store();
        let mut draft = RawMaterialDraft::new("RM-001", "Silicone oil", MaterialType::Polymer);
        draft.properties.insert("grade".to_string(), "107".into());
        draft.density = Some(0.98);

        let stored = store.insert_raw_material(&draft).unwrap();
        let fetched = store.get_raw_material(stored.id).unwrap().unwrap();

        assert_eq!(fetched, stored);
        assert_eq!(fetched.density, Some(0.98));
        assert_eq!(fetched.properties.len(), 1);
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[test]
    fn test_duplicate_code_is_conflict() {
        let store = store();
        let draft = FormulaDraft::new("F-001", "Sealant", ApplicationType::Sealant);
        store.insert_formula(&draft).unwrap();
        let err = store.insert_formula(&draft).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "unexpected error: {err}");
    }

    #[test]
    fn test_duplicate_ingredient_is_conflict() {
        let store = store();
        let (rm, int, _) = seed(&store);
        let draft = IngredientDraft::new(rm.id, 85.0);
        store.insert_ingredient(int.id, &draft).unwrap();
        let err = store.insert_ingredient(int.id, &draft).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "unexpected error: {err}");
    }

    #[test]
    fn test_ingredient_for_missing_raw_material_is_rejected() {
        let store = store();
        let (_, int, _) = seed(&store);
        let err = store
            .insert_ingredient(int.id, &IngredientDraft::new(RawMaterialId::new(999), 5.0))
            .unwrap_err();
        assert_eq!(err.to_string(), "raw_material not found: 999");
    }

    #[test]
    fn test_missing_parent_names_its_id() {
        let store = store();
        let (rm, _, formula) = seed(&store);
        let err = store
            .insert_ingredient(IntermediateId::new(77), &IngredientDraft::new(rm.id, 5.0))
            .unwrap_err();
        assert_eq!(err.to_string(), "intermediate not found: 77");

        let err = store
            .insert_component(formula.id, &ComponentDraft::new(RawMaterialId::new(78), 5.0))
            .unwrap_err();
        assert_eq!(err.to_string(), "raw_material not found: 78");

        let err = store
            .insert_performance(
                FormulaId::new(79),
                &PerformanceDraft::new("B1", chrono::NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "formula not found: 79");
        assert_eq!(store.counts().unwrap().performances_count, 0);
    }

    #[test]
    fn test_delete_raw_material_cascades_links_only() {
        let store = store();
        let (rm, int, formula) = seed(&store);
        store.insert_ingredient(int.id, &IngredientDraft::new(rm.id, 85.0)).unwrap();
        store.insert_component(formula.id, &ComponentDraft::new(rm.id, 5.0)).unwrap();
        store.insert_component(formula.id, &ComponentDraft::new(int.id, 95.0)).unwrap();

        assert!(store.delete_raw_material(rm.id).unwrap());

        assert!(store.ingredients_of(int.id).unwrap().is_empty());
        let components = store.components_of(formula.id).unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].component.intermediate(), Some(int.id));
        assert!(store.get_intermediate(int.id).unwrap().is_some());
        assert!(store.get_formula(formula.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_formula_removes_performances() {
        let store = store();
        let (_, _, formula) = seed(&store);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        let perf = store
            .insert_performance(formula.id, &PerformanceDraft::new("B1", date))
            .unwrap();

        assert!(store.delete_formula(formula.id).unwrap());
        assert!(store.get_performance(perf.id).unwrap().is_none());
        assert!(!store.delete_formula(formula.id).unwrap());
    }

    #[test]
    fn test_update_returns_none_for_missing_row() {
        let store = store();
        let draft = RawMaterialDraft::new("RM-404", "Ghost", MaterialType::Other);
        assert!(store.update_raw_material(RawMaterialId::new(404), &draft).unwrap().is_none());
    }

    #[test]
    fn test_list_filters() {
        let store = store();
        let mut oil = RawMaterialDraft::new("RM-001", "Hydroxyl silicone oil", MaterialType::Polymer);
        oil.supplier = "Dongyue Chemical".to_string();
        store.insert_raw_material(&oil).unwrap();
        store
            .insert_raw_material(&RawMaterialDraft::new("RM-004", "Calcium carbonate", MaterialType::Filler))
            .unwrap();

        let filter = RawMaterialFilter {
            search: Some("SILICONE".to_string()),
            ..RawMaterialFilter::default()
        };
        let found = store.list_raw_materials(&filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "RM-001");

        let filter = RawMaterialFilter {
            material_type: Some(MaterialType::Filler),
            ..RawMaterialFilter::default()
        };
        assert_eq!(store.list_raw_materials(&filter).unwrap()[0].code, "RM-004");

        let filter = RawMaterialFilter {
            supplier: Some("dongyue".to_string()),
            search: Some("rm-".to_string()),
            ..RawMaterialFilter::default()
        };
        assert_eq!(store.list_raw_materials(&filter).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_import_rolls_back() {
        let store = store();
        let bundle: GraphBundle = serde_json::from_value(serde_json::json!({
            "raw_materials": [{"code": "RM-001", "name": "Oil", "material_type": "polymer"}],
            "formulas": [{
                "code": "F-001", "name": "Sealant", "application_type": "sealant",
                "composition": [{"component_type": "intermediate", "code": "INT-404", "weight_ratio": 10.0}]
            }]
        }))
        .unwrap();

        let err = store.import_bundle(&bundle).unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "intermediate", .. }));
        assert_eq!(store.counts().unwrap(), GraphCounts::default());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matgraph.db");
        {
            let store = SqliteKnowledgeStore::new(&path).unwrap();
            seed(&store);
        }
        let reopened = SqliteKnowledgeStore::new(&path).unwrap();
        assert_eq!(reopened.db_path(), Some(path.as_path()));
        assert_eq!(reopened.counts().unwrap().formulas_count, 1);
        assert!(reopened.find_formula("F-001").unwrap().is_some());
    }
}
