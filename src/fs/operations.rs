use std::{io::ErrorKind, path::Path};

use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{self, AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};

/// Reads the whole file while holding a shared lock, so a concurrent [write_locked] from another
/// process is never observed half way. A missing file yields `None`.
pub async fn read_locked(path: &Path) -> Result<Option<String>, io::Error> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    file.lock_shared()?;
    let mut content = String::new();
    let result = file.read_to_string(&mut content).await;
    file.unlock_async().await?;
    result?;

    Ok(Some(content))
}

/// Replaces the content of a file under an exclusive lock, creating it when needed.
pub async fn write_locked(path: &Path, content: &[u8]) -> Result<(), io::Error> {
    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await?;

    // Truncation happens only after the lock is taken. Truncating on open would let a reader
    // holding the shared lock see an empty file.
    file.lock_exclusive()?;
    let result = overwrite(&mut file, content).await;
    file.unlock_async().await?;
    result
}

async fn overwrite(file: &mut File, content: &[u8]) -> Result<(), io::Error> {
    file.set_len(0).await?;
    file.rewind().await?;
    file.write_all(content).await?;
    file.flush().await?;
    file.sync_data().await
}
