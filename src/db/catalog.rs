//! Read-only catalog queries
//!
//! The gateway never writes the catalog; it only needs to relate chats to
//! degrees when resolving role scopes. A chat is relevant to a degree when
//! it is the degree's flagship group or the group of one of its courses.

use rusqlite::{Row, params};

use super::{DbPool, conn};
use crate::Result;

/// A degree with its owning department
#[derive(Debug, Clone)]
pub struct Degree {
    pub id: i64,
    pub name: String,
    pub department_id: i64,
    pub group_id: Option<i64>,
}

impl Degree {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            department_id: row.get(2)?,
            group_id: row.get(3)?,
        })
    }
}

/// Repository for catalog reads
#[derive(Debug, Clone)]
pub struct CatalogRepo {
    pool: DbPool,
}

impl CatalogRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Degrees for which the given chat is relevant
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn degrees_for_chat(&self, chat_id: i64) -> Result<Vec<i64>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(
            r"SELECT DISTINCT d.id FROM degrees d
              LEFT JOIN course_degrees cd ON cd.degree_id = d.id
              LEFT JOIN courses c ON c.id = cd.course_id
              WHERE d.group_id = ?1 OR c.group_id = ?1
              ORDER BY d.id",
        )?;
        let ids = stmt.query_map([chat_id], |row| row.get(0))?.flatten().collect();
        Ok(ids)
    }

    // --- Seeding helpers used by the admin plane and tests -----------------

    /// Insert a department, returning its id
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn insert_department(&self, name: &str) -> Result<i64> {
        let conn = conn(&self.pool)?;
        conn.execute("INSERT INTO departments (name) VALUES (?1)", [name])?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a degree, returning its id
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn insert_degree(
        &self,
        name: &str,
        department_id: i64,
        group_id: Option<i64>,
    ) -> Result<i64> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO degrees (name, department_id, group_id) VALUES (?1, ?2, ?3)",
            params![name, department_id, group_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a course linked to its degrees, returning its id
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn insert_course(
        &self,
        name: &str,
        group_id: Option<i64>,
        degree_ids: &[i64],
    ) -> Result<i64> {
        let mut conn = conn(&self.pool)?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO courses (name, group_id) VALUES (?1, ?2)",
            params![name, group_id],
        )?;
        let course_id = tx.last_insert_rowid();
        for degree_id in degree_ids {
            tx.execute(
                "INSERT INTO course_degrees (course_id, degree_id) VALUES (?1, ?2)",
                params![course_id, degree_id],
            )?;
        }
        tx.commit()?;
        Ok(course_id)
    }

    /// Fetch a degree by id
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn get_degree(&self, id: i64) -> Result<Option<Degree>> {
        let conn = conn(&self.pool)?;
        let result = conn.query_row(
            "SELECT id, name, department_id, group_id FROM degrees WHERE id = ?1",
            [id],
            Degree::from_row,
        );
        match result {
            Ok(degree) => Ok(Some(degree)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
