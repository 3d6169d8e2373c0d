use std::sync::Arc;

use moka::future::Cache;

use crate::core::time::Duration;

use super::{Account, AccountDataSource, AccountNumber, Agreement, ChargeSlot, Charger, Meter, MeterReading, SavingSession};

/// Caches snapshots per account, meter and charger.
///
/// Concurrent requests for the same key while a load is in flight wait for that load
/// instead of issuing their own upstream call.
pub struct CachingDataSource<D> {
    delegate: D,
    tariff_cache: Cache<AccountNumber, Arc<Vec<Agreement>>>,
    saving_session_cache: Cache<AccountNumber, Arc<Vec<SavingSession>>>,
    reading_cache: Cache<String, Option<MeterReading>>,
    schedule_cache: Cache<String, Option<Arc<Vec<ChargeSlot>>>>,
}

impl<D: AccountDataSource> CachingDataSource<D> {
    pub fn new(delegate: D, ttl: Duration) -> Self {
        let ttl: std::time::Duration = ttl.into();

        Self {
            delegate,
            tariff_cache: Cache::builder().time_to_live(ttl).build(),
            saving_session_cache: Cache::builder().time_to_live(ttl).build(),
            reading_cache: Cache::builder().time_to_live(ttl).build(),
            schedule_cache: Cache::builder().time_to_live(ttl).build(),
        }
    }
}

fn shared_error(e: Arc<anyhow::Error>) -> anyhow::Error {
    anyhow::anyhow!("{e:#}")
}

impl<D: AccountDataSource> AccountDataSource for CachingDataSource<D> {
    async fn accounts(&self) -> anyhow::Result<Vec<Account>> {
        self.delegate.accounts().await
    }

    async fn tariff_data(&self, account: &AccountNumber) -> anyhow::Result<Arc<Vec<Agreement>>> {
        self.tariff_cache
            .try_get_with(account.clone(), async {
                tracing::debug!("Reloading tariff data of account {}", account);
                self.delegate.tariff_data(account).await
            })
            .await
            .map_err(shared_error)
    }

    async fn saving_sessions(&self, account: &AccountNumber) -> anyhow::Result<Arc<Vec<SavingSession>>> {
        self.saving_session_cache
            .try_get_with(account.clone(), async {
                tracing::debug!("Reloading saving sessions of account {}", account);
                self.delegate.saving_sessions(account).await
            })
            .await
            .map_err(shared_error)
    }

    async fn latest_reading(&self, meter: &Meter) -> anyhow::Result<Option<MeterReading>> {
        self.reading_cache
            .try_get_with(meter.id.clone(), async {
                tracing::debug!("Reloading latest reading of meter {}", meter.serial);
                self.delegate.latest_reading(meter).await
            })
            .await
            .map_err(shared_error)
    }

    async fn charge_schedule(&self, charger: &Charger) -> anyhow::Result<Option<Arc<Vec<ChargeSlot>>>> {
        self.schedule_cache
            .try_get_with(charger.device_id.clone(), async {
                tracing::debug!("Reloading charge schedule of charger {}", charger.serial);
                self.delegate.charge_schedule(charger).await
            })
            .await
            .map_err(shared_error)
    }
}
