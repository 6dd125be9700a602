//! Tokio adapters over blocking handles.
//!
//! Waits run on tokio's blocking thread pool, so a pending job never stalls
//! an async worker thread.

use std::any::Any;
use std::time::Duration;

use crate::core::{OperationType, ResultHandle, Scheduler, SchedulerError};

impl<T: Any + Clone + Send + Sync> ResultHandle<T> {
    /// Await the job's value from async code.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Same as [`ResultHandle::wait_timeout`]; `Internal` if the blocking
    /// task itself fails.
    pub async fn wait_async(&self, timeout: Option<Duration>) -> Result<T, SchedulerError> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.wait_timeout(timeout))
            .await
            .map_err(|e| SchedulerError::Internal(format!("blocking wait task failed: {e}")))?
    }
}

impl Scheduler {
    /// Submit a job and await its value. Its completion record never
    /// reaches the streams.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or `JobFailed` carrying the job's error.
    pub async fn submit_async<T, F>(&self, operation: OperationType, f: F) -> Result<T, SchedulerError>
    where
        T: Any + Clone + Send + Sync,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let private = self.private_partition("async");
        let handle = self.submit_with_partition(operation, private.key().clone(), f)?;
        handle.wait_async(None).await
    }

    /// Async counterpart of [`Scheduler::map_blocking`]: results in input
    /// order.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or the first failing item's `JobFailed`.
    pub async fn map_async<I, T, F>(
        &self,
        operation: OperationType,
        items: Vec<I>,
        f: F,
    ) -> Result<Vec<T>, SchedulerError>
    where
        I: Send + 'static,
        T: Any + Clone + Send + Sync,
        F: Fn(I) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        // Dropping the future early still releases the partition.
        let private = self.private_partition("map");
        let handles = self.submit_each(operation, private.key(), items, f)?;
        let mut values = Vec::with_capacity(handles.len());
        for handle in &handles {
            values.push(handle.wait_async(None).await?);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;

    #[tokio::test]
    async fn test_submit_async_returns_value() {
        let scheduler = Scheduler::new(SchedulerConfig::default().with_dispatch_poll_ms(10)).unwrap();
        scheduler.initialize().unwrap();

        let value = scheduler
            .submit_async(OperationType::ClaimsExtraction, || Ok(vec!["claim".to_string()]))
            .await
            .unwrap();
        assert_eq!(value, vec!["claim".to_string()]);

        let err = scheduler
            .submit_async::<u8, _>(OperationType::ClaimsExtraction, || anyhow::bail!("llm refused"))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::JobFailed { .. }));
        scheduler.shutdown(true);
    }
}
