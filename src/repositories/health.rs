use sqlx::PgPool;

/// Round-trips a trivial query so `/healthz` can report database state.
pub(crate) async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
