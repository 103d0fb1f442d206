//! Test-double executor
//!
//! Records every script dispatched to it and serves pre-configured responses
//! per container, in FIFO order, making reconciler tests deterministic
//! without a Proxmox host.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CommandOutput, ContainerExec};
use crate::error::{FleetError, Result};

/// One recorded exec invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub vmid: String,
    pub script: String,
    pub args: Vec<String>,
}

/// Scripted [`ContainerExec`] implementation for tests.
///
/// Responses are queued per vmid and popped in order; once a queue is empty
/// further calls succeed with empty output and exit code 0.
#[derive(Default)]
pub struct MockExec {
    responses: Mutex<HashMap<String, VecDeque<Result<CommandOutput>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockExec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response with the given exit code and stdout.
    pub fn push_status(&self, vmid: &str, exit_code: i32, stdout: &str) {
        self.push_response(
            vmid,
            Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(exit_code),
            }),
        );
    }

    /// Queue a failing command response (ran, exited non-zero, wrote stderr).
    pub fn push_failure(&self, vmid: &str, exit_code: i32, stderr: &str) {
        self.push_response(
            vmid,
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code: Some(exit_code),
            }),
        );
    }

    /// Queue an exec-primitive error (the command never ran).
    pub fn push_error(&self, vmid: &str, err: FleetError) {
        self.push_response(vmid, Err(err));
    }

    /// Queue an arbitrary response.
    pub fn push_response(&self, vmid: &str, response: Result<CommandOutput>) {
        self.responses
            .lock()
            .unwrap()
            .entry(vmid.to_string())
            .or_default()
            .push_back(response);
    }

    /// All recorded calls, in dispatch order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Scripts dispatched to one container, in order.
    pub fn scripts_for(&self, vmid: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.vmid == vmid)
            .map(|c| c.script.clone())
            .collect()
    }
}

#[async_trait]
impl ContainerExec for MockExec {
    async fn exec(&self, vmid: &str, script: &str, args: &[String]) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(RecordedCall {
            vmid: vmid.to_string(),
            script: script.to_string(),
            args: args.to_vec(),
        });

        let response = self
            .responses
            .lock()
            .unwrap()
            .get_mut(vmid)
            .and_then(|queue| queue.pop_front());

        match response {
            Some(response) => response,
            None => Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(0),
            }),
        }
    }
}
