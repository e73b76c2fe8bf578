use sqlx::PgPool;

/// Executes typed queries against the connection pool.
///
/// Every query is a plain input struct with a `Processor` impl for this type,
/// so the storage traits in [`crate::store`] are thin adapters over it.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
