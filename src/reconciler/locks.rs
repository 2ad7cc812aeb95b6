//! Per-equipment exclusive locks
//!
//! Serializes check-then-commit sequences for the same equipment inside one
//! process. The database transaction additionally takes the equipment row
//! `FOR UPDATE`, which covers several server instances.
//!
//! An entry lives only while someone holds or waits for it; the last guard
//! out removes it, so the registry is bounded by in-flight requests.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{AppError, AppResult};

type Registry = DashMap<i32, Arc<Mutex<()>>>;

/// Held for the duration of one booking mutation. Dropping it releases the lock.
#[derive(Debug)]
pub struct EquipmentGuard {
    equipment_id: i32,
    registry: Arc<Registry>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for EquipmentGuard {
    fn drop(&mut self) {
        // map + this guard; any waiter holds a third reference
        self.registry
            .remove_if(&self.equipment_id, |_, lock| Arc::strong_count(lock) == 2);
    }
}

#[derive(Debug)]
pub struct EquipmentLocks {
    locks: Arc<Registry>,
    timeout: Duration,
}

impl EquipmentLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait (bounded) for exclusive access to one equipment item.
    pub async fn acquire(&self, equipment_id: i32) -> AppResult<EquipmentGuard> {
        let lock = self
            .locks
            .entry(equipment_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(EquipmentGuard {
                equipment_id,
                registry: self.locks.clone(),
                _guard: guard,
            }),
            Err(_) => {
                // the holder may have left while we waited
                self.locks
                    .remove_if(&equipment_id, |_, lock| Arc::strong_count(lock) == 1);
                tracing::warn!(
                    equipment_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "equipment lock wait timed out"
                );
                Err(AppError::Busy(format!(
                    "Equipment {} is busy, try again",
                    equipment_id
                )))
            }
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Booking, BookingStatus, Equipment, EquipmentStatus};
    use crate::reconciler::{check_admission, TimeWindow};
    use chrono::{TimeZone, Utc};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_second_acquire_times_out() {
        let locks = EquipmentLocks::new(Duration::from_millis(20));
        let held = assert_ok!(locks.acquire(1).await);

        let err = assert_err!(locks.acquire(1).await);
        assert!(matches!(err, AppError::Busy(_)));

        drop(held);
        assert_ok!(locks.acquire(1).await);
    }

    #[tokio::test]
    async fn test_distinct_equipment_do_not_block() {
        let locks = EquipmentLocks::new(Duration::from_millis(20));
        let _a = assert_ok!(locks.acquire(1).await);
        let _b = assert_ok!(locks.acquire(2).await);
        assert_eq!(locks.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_released_on_early_return() {
        async fn failing_step(locks: &EquipmentLocks) -> AppResult<()> {
            let _guard = locks.acquire(5).await?;
            Err(AppError::Conflict("no room".to_string()))
        }

        let locks = EquipmentLocks::new(Duration::from_millis(20));
        assert!(failing_step(&locks).await.is_err());
        assert_ok!(locks.acquire(5).await);
    }

    #[tokio::test]
    async fn test_released_entries_are_removed() {
        let locks = EquipmentLocks::new(Duration::from_millis(20));
        for id in 1_000..6_000 {
            drop(assert_ok!(locks.acquire(id).await));
        }
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_entry_survives_while_someone_waits() {
        let locks = Arc::new(EquipmentLocks::new(Duration::from_secs(5)));
        let held = assert_ok!(locks.acquire(4).await);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(4).await?;
                Ok::<_, AppError>(locks.in_flight())
            })
        };
        // let the waiter clone the entry and start waiting
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        drop(held);

        let seen_while_holding = assert_ok!(waiter.await.unwrap());
        assert_eq!(seen_while_holding, 1);
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_waiter_leaves_no_entry() {
        let locks = EquipmentLocks::new(Duration::from_millis(20));
        let held = assert_ok!(locks.acquire(8).await);
        assert_err!(locks.acquire(8).await);
        drop(held);
        assert_eq!(locks.in_flight(), 0);
    }

    /// Many concurrent requests for the same slot, each doing
    /// read → check → yield → write under the lock. Only as many as fit in
    /// stock may be admitted.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_never_oversubscribe() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap();
        let window = TimeWindow::new(start, end).unwrap();
        let equipment = Equipment {
            id: 1,
            name: "Spectrometer".to_string(),
            category: "Optics".to_string(),
            description: None,
            quantity: 3,
            available_quantity: 3,
            status: EquipmentStatus::Available,
            location: None,
            created_at: start,
            updated_at: start,
        };

        let locks = Arc::new(EquipmentLocks::new(Duration::from_secs(5)));
        let store: Arc<std::sync::Mutex<Vec<Booking>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for id in 0..32 {
            let locks = locks.clone();
            let store = store.clone();
            let equipment = equipment.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(equipment.id).await?;
                let snapshot = store.lock().unwrap().clone();
                check_admission(Some(&equipment), &snapshot, &window, 1, None)?;
                tokio::task::yield_now().await;
                store.lock().unwrap().push(Booking {
                    id,
                    user_id: id,
                    equipment_id: equipment.id,
                    quantity: 1,
                    start_time: start,
                    end_time: end,
                    purpose: None,
                    status: BookingStatus::Pending,
                    admin_notes: None,
                    created_at: start,
                    updated_at: start,
                });
                Ok::<_, AppError>(())
            }));
        }

        let mut admitted = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => admitted += 1,
                Err(AppError::Unavailable(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert_eq!(admitted, 3);
        assert_eq!(conflicts, 29);
        assert_eq!(store.lock().unwrap().len(), 3);
        assert_eq!(locks.in_flight(), 0);
    }
}
