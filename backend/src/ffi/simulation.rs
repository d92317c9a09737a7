//! PyO3 wrapper for Simulation
//!
//! Lets a Python web layer own the HTTP surface while the engine stays in
//! Rust. Every result comes back as plain dicts.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::types::{py_to_json, to_py, to_py_err};
use crate::config::SimulationConfig;
use crate::core::time::SystemClock;
use crate::orchestrator::{parse_phase, FileStateStore, JoinRequest, Simulation};

/// Python wrapper for the bank run engine
///
/// # Example (from Python)
///
/// ```python
/// from bank_run_core import BankRun
///
/// sim = BankRun({"wholesale_target": 4}, state_path="state/game.json")
/// info = sim.session_info()
/// me = sim.join({"displayName": "Ada Lovelace", "token": info["joinToken"]})
/// sim.set_phase("phase1")
/// sim.submit_action(me["participantId"], "select_product", {"product": "fixed_1y"})
/// print(sim.snapshot(me["participantId"])["metrics"])
/// ```
#[pyclass(name = "BankRun")]
pub struct PyBankRun {
    inner: Simulation,
    store: Option<FileStateStore>,
}

impl PyBankRun {
    /// Persist after every mutation when a state path was given
    fn persist(&mut self) -> PyResult<()> {
        if let Some(store) = self.store.as_mut() {
            self.inner.save(store).map_err(to_py_err)?;
        }
        Ok(())
    }
}

#[pymethods]
impl PyBankRun {
    /// Create an engine, restoring from `state_path` when it holds a usable
    /// checkpoint
    ///
    /// # Errors
    ///
    /// Raises ValueError if the config dict does not describe a valid config.
    #[new]
    #[pyo3(signature = (config=None, state_path=None))]
    fn new(config: Option<&Bound<'_, PyDict>>, state_path: Option<String>) -> PyResult<Self> {
        let config: SimulationConfig = match config {
            Some(dict) => serde_json::from_value(py_to_json(dict.as_any())?)
                .map_err(|e| PyValueError::new_err(format!("Invalid config: {}", e)))?,
            None => SimulationConfig::default(),
        };

        let store = state_path.map(FileStateStore::new);
        let inner = match &store {
            Some(store) => Simulation::restore_or_fresh(config, Box::new(SystemClock), store),
            None => Simulation::new(config, Box::new(SystemClock)),
        }
        .map_err(|e| PyRuntimeError::new_err(format!("Failed to create engine: {}", e)))?;

        Ok(PyBankRun { inner, store })
    }

    // ========================================================================
    // Read Model
    // ========================================================================

    #[pyo3(signature = (participant_id=None))]
    fn snapshot(&self, py: Python<'_>, participant_id: Option<&str>) -> PyResult<PyObject> {
        let snapshot = self.inner.snapshot(participant_id);
        to_py(py, &snapshot)
    }

    fn report(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py(py, &self.inner.classroom_report())
    }

    fn join_quiz(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py(py, &self.inner.join_quiz())
    }

    fn session_info(&mut self, py: Python<'_>) -> PyResult<PyObject> {
        let info = self.inner.session_info();
        self.persist()?;
        to_py(py, &info)
    }

    /// Scheduler period in seconds
    fn tick_period(&self) -> f64 {
        self.inner.tick_period().as_secs_f64()
    }

    // ========================================================================
    // Participant Commands
    // ========================================================================

    fn join(&mut self, py: Python<'_>, request: &Bound<'_, PyDict>) -> PyResult<PyObject> {
        let request: JoinRequest = serde_json::from_value(py_to_json(request.as_any())?)
            .map_err(|e| PyValueError::new_err(format!("Invalid join request: {}", e)))?;
        let receipt = self.inner.join(&request).map_err(to_py_err)?;
        self.persist()?;
        to_py(py, &receipt)
    }

    fn resume(&self, py: Python<'_>, resume_token: &str) -> PyResult<PyObject> {
        let receipt = self.inner.resume(resume_token).map_err(to_py_err)?;
        to_py(py, &receipt)
    }

    #[pyo3(signature = (participant_id, action_type, payload=None))]
    fn submit_action(
        &mut self,
        participant_id: &str,
        action_type: &str,
        payload: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<()> {
        let payload = match payload {
            Some(obj) => py_to_json(obj)?,
            None => serde_json::Value::Null,
        };
        self.inner
            .submit_action(participant_id, action_type, &payload)
            .map_err(to_py_err)?;
        self.persist()
    }

    // ========================================================================
    // Facilitator Commands
    // ========================================================================

    fn set_phase(&mut self, phase: &str) -> PyResult<()> {
        let phase = parse_phase(phase).map_err(|e| to_py_err(e.into()))?;
        self.inner.set_phase(phase).map_err(to_py_err)?;
        self.persist()
    }

    fn trigger_event(&mut self, key: &str) -> PyResult<String> {
        let fired = self.inner.trigger_event(key).map_err(to_py_err)?;
        self.persist()?;
        Ok(fired.to_string())
    }

    fn decide(&mut self, decision: &str) -> PyResult<String> {
        let decision = self
            .inner
            .apply_resolution_decision(decision)
            .map_err(to_py_err)?;
        self.persist()?;
        Ok(decision.to_string())
    }

    fn rotate_join_token(&mut self, py: Python<'_>) -> PyResult<PyObject> {
        let credentials = self.inner.rotate_join_token();
        self.persist()?;
        to_py(py, &credentials)
    }

    fn broadcast(&mut self, message: &str) -> PyResult<()> {
        self.inner.broadcast(message).map_err(to_py_err)?;
        self.persist()
    }

    fn reset(&mut self) -> PyResult<()> {
        self.inner.reset_session();
        self.persist()
    }

    // ========================================================================
    // Scheduler
    // ========================================================================

    /// Run one accrual tick; the host calls this every `tick_period()` seconds
    fn tick(&mut self, py: Python<'_>) -> PyResult<PyObject> {
        let report = self.inner.tick();
        self.persist()?;
        to_py(py, &report)
    }
}
