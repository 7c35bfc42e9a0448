use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use consular_intake::intake::{BookingId, LedgerError, SagaLedger, SagaRecord, ServiceKind};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Default saga ledger: a process-local map. Rows do not survive a restart,
/// which matches the accepted recovery story (support staff reconcile from
/// the record-keeping log); the trait seam is where a durable table slots in.
#[derive(Default)]
pub(crate) struct InMemorySagaLedger {
    rows: Mutex<HashMap<BookingId, SagaRecord>>,
    busy: Mutex<HashSet<BookingId>>,
}

impl SagaLedger for InMemorySagaLedger {
    fn begin(&self, record: SagaRecord) -> Result<(), LedgerError> {
        let mut rows = self.rows.lock().expect("ledger mutex poisoned");
        if rows.contains_key(&record.booking_id) {
            return Err(LedgerError::Conflict);
        }
        rows.insert(record.booking_id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &BookingId) -> Result<Option<SagaRecord>, LedgerError> {
        let rows = self.rows.lock().expect("ledger mutex poisoned");
        Ok(rows.get(id).cloned())
    }

    fn update(&self, record: SagaRecord) -> Result<(), LedgerError> {
        let mut rows = self.rows.lock().expect("ledger mutex poisoned");
        if !rows.contains_key(&record.booking_id) {
            return Err(LedgerError::NotFound);
        }
        rows.insert(record.booking_id.clone(), record);
        Ok(())
    }

    fn acquire(&self, id: &BookingId) -> Result<(), LedgerError> {
        let mut busy = self.busy.lock().expect("ledger mutex poisoned");
        if !busy.insert(id.clone()) {
            return Err(LedgerError::Busy);
        }
        Ok(())
    }

    fn release(&self, id: &BookingId) -> Result<(), LedgerError> {
        let mut busy = self.busy.lock().expect("ledger mutex poisoned");
        busy.remove(id);
        Ok(())
    }
}

pub(crate) fn parse_service(raw: &str) -> Result<ServiceKind, String> {
    ServiceKind::ALL
        .into_iter()
        .find(|service| service.label() == raw.trim().to_ascii_lowercase())
        .ok_or_else(|| {
            let known = ServiceKind::ALL
                .map(ServiceKind::label)
                .join(", ");
            format!("unknown service '{raw}' (known: {known})")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use consular_intake::intake::SagaRecord;

    #[test]
    fn ledger_rejects_duplicate_rows_and_busy_reacquire() {
        let ledger = InMemorySagaLedger::default();
        let record = SagaRecord::open(BookingId::from("bk-1"), ServiceKind::Visa);

        ledger.begin(record.clone()).expect("first insert");
        assert!(matches!(ledger.begin(record), Err(LedgerError::Conflict)));

        let id = BookingId::from("bk-1");
        ledger.acquire(&id).expect("first acquire");
        assert!(matches!(ledger.acquire(&id), Err(LedgerError::Busy)));
        ledger.release(&id).expect("release");
        ledger.acquire(&id).expect("reacquire after release");
    }

    #[test]
    fn parse_service_covers_all_labels() {
        for service in ServiceKind::ALL {
            assert_eq!(parse_service(service.label()), Ok(service));
        }
        assert!(parse_service("limousine").is_err());
    }
}
