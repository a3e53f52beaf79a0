use anyhow::Result;

/// The daemon is mostly idle between ticks, one thread plus the blocking pool for SQLite is enough.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
