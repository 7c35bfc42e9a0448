use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::DEFAULT_ATTACHMENT_CAP_BYTES;
use crate::intake::booking::BookingId;
use crate::intake::domain::{
    AttachmentUpload, IntakeRequest, PaymentOutcome, PaymentPreparation, RecordAck, SagaRecord,
    ServiceKind, Submission,
};
use crate::intake::ledger::{LedgerError, SagaLedger};
use crate::intake::payment::{
    PaymentConfirmationError, PaymentConfirmer, PaymentPreparationError, PaymentPreparationRequest,
    PaymentPreparer,
};
use crate::intake::record::{RecordKeeper, RecordingError};
use crate::intake::schema::ServiceRegistry;
use crate::intake::service::IntakeService;
use crate::intake::validator::SubmissionValidator;

pub(super) type TestService =
    IntakeService<ScriptedRecorder, ScriptedPreparer, ScriptedConfirmer, MemoryLedger>;

pub(super) fn passport_fields() -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("full_name".to_string(), "Giulia Rossi".to_string());
    fields.insert("email".to_string(), "giulia.rossi@example.com".to_string());
    fields.insert("telephone".to_string(), "+39 333 1234567".to_string());
    fields.insert("date_of_birth".to_string(), "1990-05-04".to_string());
    fields.insert("place_of_birth".to_string(), "Bologna".to_string());
    fields.insert(
        "residence_address".to_string(),
        "Via Indipendenza 12, Bologna".to_string(),
    );
    fields.insert("marital_status".to_string(), "single".to_string());
    fields
}

pub(super) fn request() -> IntakeRequest {
    IntakeRequest {
        service: ServiceKind::Passport,
        fields: passport_fields(),
        consent: true,
        locale: "it".to_string(),
        attachments: Vec::new(),
        resume: None,
    }
}

pub(super) fn pdf_upload(bytes: usize) -> AttachmentUpload {
    AttachmentUpload {
        filename: "id-scan.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        declared_bytes: bytes as u64,
        data: vec![0x25; bytes],
    }
}

pub(super) fn standard_validator() -> SubmissionValidator {
    SubmissionValidator::new(ServiceRegistry::standard(DEFAULT_ATTACHMENT_CAP_BYTES))
}

pub(super) fn build_service() -> (
    Arc<TestService>,
    Arc<ScriptedRecorder>,
    Arc<ScriptedPreparer>,
    Arc<ScriptedConfirmer>,
    Arc<MemoryLedger>,
) {
    let recorder = Arc::new(ScriptedRecorder::default());
    let preparer = Arc::new(ScriptedPreparer::default());
    let confirmer = Arc::new(ScriptedConfirmer::default());
    let ledger = Arc::new(MemoryLedger::default());
    let service = Arc::new(IntakeService::new(
        standard_validator(),
        recorder.clone(),
        preparer.clone(),
        confirmer.clone(),
        ledger.clone(),
    ));
    (service, recorder, preparer, confirmer, ledger)
}

/// In-memory ledger mirroring the API service's default deployment.
#[derive(Default)]
pub(super) struct MemoryLedger {
    rows: Mutex<HashMap<BookingId, SagaRecord>>,
    busy: Mutex<HashSet<BookingId>>,
}

impl SagaLedger for MemoryLedger {
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

pub(super) enum RecordScript {
    Ack(RecordAck),
    Fail(u16),
}

/// Scripted record-keeping backend: pops one scripted response per call and
/// panics on an unscripted call, so "this stage never ran" assertions fall
/// out of the script itself.
#[derive(Default)]
pub(super) struct ScriptedRecorder {
    script: Mutex<VecDeque<RecordScript>>,
    calls: Mutex<Vec<BookingId>>,
}

impl ScriptedRecorder {
    pub(super) fn push(&self, entry: RecordScript) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .push_back(entry);
    }

    pub(super) fn calls(&self) -> Vec<BookingId> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

#[async_trait]
impl RecordKeeper for ScriptedRecorder {
    async fn record(
        &self,
        _submission: &Submission,
        booking_id: &BookingId,
    ) -> Result<RecordAck, RecordingError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(booking_id.clone());
        let entry = self
            .script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted record-keeping call for {booking_id}"));
        match entry {
            RecordScript::Ack(ack) => Ok(ack),
            RecordScript::Fail(status) => Err(RecordingError::Status { status }),
        }
    }
}

pub(super) enum PrepareScript {
    Ready(PaymentPreparation),
    Fail(u16),
}

#[derive(Default)]
pub(super) struct ScriptedPreparer {
    script: Mutex<VecDeque<PrepareScript>>,
    calls: Mutex<Vec<PaymentPreparationRequest>>,
}

impl ScriptedPreparer {
    pub(super) fn push(&self, entry: PrepareScript) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .push_back(entry);
    }

    pub(super) fn calls(&self) -> Vec<PaymentPreparationRequest> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

#[async_trait]
impl PaymentPreparer for ScriptedPreparer {
    async fn prepare(
        &self,
        request: &PaymentPreparationRequest,
    ) -> Result<PaymentPreparation, PaymentPreparationError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(request.clone());
        let entry = self
            .script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted payment-preparation call for {}", request.booking_id));
        match entry {
            PrepareScript::Ready(preparation) => Ok(preparation),
            PrepareScript::Fail(status) => Err(PaymentPreparationError::Status { status }),
        }
    }
}

#[derive(Default)]
pub(super) struct ScriptedConfirmer {
    outcome: Mutex<Option<PaymentOutcome>>,
    secrets: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub(super) fn set(&self, outcome: PaymentOutcome) {
        *self.outcome.lock().expect("outcome mutex poisoned") = Some(outcome);
    }

    pub(super) fn secrets(&self) -> Vec<String> {
        self.secrets.lock().expect("secrets mutex poisoned").clone()
    }
}

#[async_trait]
impl PaymentConfirmer for ScriptedConfirmer {
    async fn confirm(
        &self,
        client_secret: &str,
    ) -> Result<PaymentOutcome, PaymentConfirmationError> {
        self.secrets
            .lock()
            .expect("secrets mutex poisoned")
            .push(client_secret.to_string());
        Ok(self
            .outcome
            .lock()
            .expect("outcome mutex poisoned")
            .clone()
            .expect("confirmer outcome not scripted"))
    }
}
