use std::time::{Duration, Instant};
use crate::domain::ProbeError;
use crate::ports::Clock;

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl TokioClock {
    pub fn new() -> Self { Self }
}

impl Clock for TokioClock {
    fn now(&self) -> Instant { Instant::now() }

    async fn timeout<F, T>(&self, duration: Duration, future: F) -> Result<T, ProbeError>
    where
        F: std::future::Future<Output = T> + Send,
        T: Send,
    {
        tokio::time::timeout(duration, future).await.map_err(|_| ProbeError::timeout(format!("deadline of {:?} exceeded", duration)))
    }
}
