use kmcx_core::engine::{
    EngineField, EngineHandle, EngineSnapshot, FieldValue, OfflineEngine, StatusCode,
};
use kmcx_core::stages::Stage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetField(EngineField, FieldValue),
    SetDoping(usize, f64),
    Commit,
    ApplyStage(Stage),
    Serialize,
}

/// Engine double that logs every call and can be told to fail specific
/// ones. The call log stays readable after the engine is moved into a
/// `SharedEngine`.
#[derive(Debug, Clone)]
pub struct RecordingEngine {
    inner: OfflineEngine,
    calls: Arc<Mutex<Vec<EngineCall>>>,
    field_faults: HashMap<EngineField, StatusCode>,
    commit_fault: Option<StatusCode>,
    serialize_fault: Option<StatusCode>,
    panic_on_serialize: bool,
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingEngine {
    /// Every stage applied, ready to accept job settings.
    pub fn new() -> Self {
        Self {
            inner: OfflineEngine::prepared(Stage::ALL.len()),
            calls: Arc::new(Mutex::new(Vec::new())),
            field_faults: HashMap::new(),
            commit_fault: None,
            serialize_fault: None,
            panic_on_serialize: false,
        }
    }

    pub fn with_stages(count: usize) -> Self {
        Self {
            inner: OfflineEngine::prepared(count),
            ..Self::new()
        }
    }

    pub fn fail_field(mut self, field: EngineField, code: StatusCode) -> Self {
        self.field_faults.insert(field, code);
        self
    }

    pub fn fail_commit(mut self, code: StatusCode) -> Self {
        self.commit_fault = Some(code);
        self
    }

    pub fn fail_serialize(mut self, code: StatusCode) -> Self {
        self.serialize_fault = Some(code);
        self
    }

    pub fn panic_on_serialize(mut self) -> Self {
        self.panic_on_serialize = true;
        self
    }

    pub fn call_log(&self) -> Arc<Mutex<Vec<EngineCall>>> {
        self.calls.clone()
    }

    fn record(&self, call: EngineCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl EngineHandle for RecordingEngine {
    fn set_field(&mut self, field: EngineField, value: FieldValue) -> StatusCode {
        self.record(EngineCall::SetField(field, value));
        if let Some(code) = self.field_faults.get(&field) {
            return *code;
        }
        self.inner.set_field(field, value)
    }

    fn set_doping_concentration(&mut self, index: usize, value: f64) -> StatusCode {
        self.record(EngineCall::SetDoping(index, value));
        self.inner.set_doping_concentration(index, value)
    }

    fn get_field(&self, field: EngineField) -> Result<FieldValue, StatusCode> {
        self.inner.get_field(field)
    }

    fn commit(&mut self) -> StatusCode {
        self.record(EngineCall::Commit);
        if let Some(code) = self.commit_fault {
            return code;
        }
        self.inner.commit()
    }

    fn apply_stage(&mut self, stage: Stage, data: &serde_json::Value) -> StatusCode {
        self.record(EngineCall::ApplyStage(stage));
        self.inner.apply_stage(stage, data)
    }

    fn snapshot(&self) -> Result<EngineSnapshot, StatusCode> {
        self.inner.snapshot()
    }

    fn project_state(&self) -> u8 {
        self.inner.project_state()
    }

    fn serialize_settings(&self) -> Result<String, StatusCode> {
        self.record(EngineCall::Serialize);
        if self.panic_on_serialize {
            panic!("serializer crashed");
        }
        if let Some(code) = self.serialize_fault {
            return Err(code);
        }
        self.inner.serialize_settings()
    }
}
