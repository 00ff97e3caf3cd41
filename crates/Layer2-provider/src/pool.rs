//! Invocation Pool - 동시 백엔드 호출 슬롯
//!
//! 슬롯마다 `slot-N` 레코드 락 하나. 프로세스는 슬롯 락을 잡은 동안에만
//! 백엔드 프로세스를 띄운다. 슬롯은 drop 시 반환된다.

use crate::error::BackendError;
use cmdgen_foundation::{RecordLock, StateStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 보유 중인 호출 슬롯
#[derive(Debug)]
pub struct PoolSlot {
    index: Option<usize>,
    _lock: Option<RecordLock>,
}

impl PoolSlot {
    /// 슬롯 번호 (저장소 장애로 락 없이 진행하는 경우 None)
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

/// 프로세스 간 공유 슬롯 풀
#[derive(Clone)]
pub struct InvocationPool {
    store: Arc<dyn StateStore>,
    slots: usize,
    max_wait: Duration,
    poll_interval: Duration,
}

impl InvocationPool {
    pub fn new(store: Arc<dyn StateStore>, slots: usize) -> Self {
        Self {
            store,
            slots: slots.max(1),
            max_wait: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// 빈 슬롯 획득 (상한 있는 대기)
    pub async fn acquire(&self) -> Result<PoolSlot, BackendError> {
        let started = Instant::now();
        // 프로세스마다 다른 슬롯부터 탐색
        let offset = std::process::id() as usize % self.slots;

        loop {
            for step in 0..self.slots {
                let index = (offset + step) % self.slots;
                match self.store.try_lock(&slot_record(index)) {
                    Ok(Some(lock)) => {
                        debug!(slot = index, "Acquired invocation slot");
                        return Ok(PoolSlot {
                            index: Some(index),
                            _lock: Some(lock),
                        });
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "Invocation pool unavailable, proceeding without slot");
                        return Ok(PoolSlot {
                            index: None,
                            _lock: None,
                        });
                    }
                }
            }

            if started.elapsed() >= self.max_wait {
                return Err(BackendError::PoolExhausted { slots: self.slots });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn slot_record(index: usize) -> String {
    format!("slot-{index}")
}

impl std::fmt::Debug for InvocationPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationPool")
            .field("slots", &self.slots)
            .field("max_wait", &self.max_wait)
            .finish()
    }
}
