//! Column views kept in sync through the columns-changed bus.
//!
//! A view holds its own copy of the column list and re-reads the registry
//! whenever a change is announced. Dropping the view unmounts it.

use crate::registry::ColumnRegistry;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use waypoint_core::{ColumnDefinition, ColumnResult};
use waypoint_events::BusError;

#[derive(Debug)]
pub struct ColumnView {
    columns: watch::Receiver<Vec<ColumnDefinition>>,
    listener: JoinHandle<()>,
}

impl ColumnView {
    /// Load the current column list and start listening for changes.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn mount(registry: Arc<ColumnRegistry>) -> ColumnResult<Self> {
        // Subscribe before the first read so no change slips between them.
        let mut subscription = registry.subscribe();
        let initial = registry.list().await?;
        let (tx, rx) = watch::channel(initial);

        let listener = tokio::spawn(async move {
            loop {
                match subscription.recv().await {
                    Ok(_) | Err(BusError::Lagged(_)) => {}
                    Err(BusError::Closed) => break,
                }
                // One re-read covers every change already queued.
                subscription.drain();

                match registry.list().await {
                    Ok(columns) => {
                        debug!(columns = columns.len(), "Column view refreshed");
                        if tx.send(columns).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Column view refresh failed"),
                }
            }
        });

        Ok(Self {
            columns: rx,
            listener,
        })
    }

    /// Current column list in display order.
    pub fn columns(&self) -> Vec<ColumnDefinition> {
        self.columns.borrow().clone()
    }

    /// Current visible columns in display order.
    pub fn visible_columns(&self) -> Vec<ColumnDefinition> {
        self.columns.borrow().iter().filter(|c| c.visible).cloned().collect()
    }

    /// Wait until the view has refreshed since the last call.
    ///
    /// Returns false once the view has stopped listening.
    pub async fn changed(&mut self) -> bool {
        self.columns.changed().await.is_ok()
    }

    /// Stop listening. Equivalent to dropping the view.
    pub fn unmount(self) {}

    pub fn is_mounted(&self) -> bool {
        !self.listener.is_finished()
    }
}

impl Drop for ColumnView {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
