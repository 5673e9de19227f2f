use super::DbPool;
use crate::errors::StorageError;
use diesel::SqliteConnection;
use log::{debug, error};
use pocketbook_core::errors::{DatabaseError, Error, Result};
use std::any::Any;
use tokio::sync::{mpsc, oneshot};

type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;
type AnyResult = Result<Box<dyn Any + Send + 'static>>;

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<(Job<Box<dyn Any + Send + 'static>>, oneshot::Sender<AnyResult>)>,
}

fn actor_gone(detail: &str) -> Error {
    Error::Database(DatabaseError::Internal(format!("writer actor unavailable: {}", detail)))
}

impl WriteHandle {
    /// Executes a job on the writer's dedicated connection inside an
    /// immediate transaction. A failed job rolls the transaction back.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as Box<dyn Any + Send>)),
                ret_tx,
            ))
            .await
            .map_err(|_| actor_gone("job channel closed"))?;

        let boxed = ret_rx.await.map_err(|_| actor_gone("reply dropped"))??;
        boxed
            .downcast::<T>()
            .map(|v| *v)
            .map_err(|_| Error::Database(DatabaseError::Internal("writer result type mismatch".to_string())))
    }
}

/// Spawns a background task that owns one pooled connection and applies
/// write jobs serially.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_writer(pool: DbPool) -> Result<WriteHandle> {
    let mut conn = pool.get().map_err(StorageError::from)?;
    let (tx, mut rx) = mpsc::channel::<(Job<Box<dyn Any + Send + 'static>>, oneshot::Sender<AnyResult>)>(1024);

    tokio::spawn(async move {
        while let Some((job, reply_tx)) = rx.recv().await {
            let result: AnyResult = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(|e: StorageError| {
                    error!("Write job failed: {}", e);
                    e.into()
                });

            // The requester may have gone away.
            let _ = reply_tx.send(result);
        }
        debug!("Writer actor stopped");
    });

    Ok(WriteHandle { tx })
}
