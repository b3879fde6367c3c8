//! Circuit authentication for viewer connections.
//!
//! Every viewer connection to a simulator rides on a *circuit*: a numeric
//! code handed out at login together with the session tokens the viewer must
//! echo back. The [`CircuitManager`] is the per-simulator table of circuits
//! the region expects, fed ahead of time by the login path and by
//! neighbouring regions announcing child agents.
//!
//! Authentication is deliberately quiet: a failed check returns the same
//! opaque refusal whether the code was unknown, the session token stale or
//! the agent mismatched, and updates against unknown codes are dropped
//! without effect.

use dashmap::DashMap;
use tracing::warn;

use crate::types::{
    AgentCircuit, AgentId, AuthenticateResponse, LoginSession, SessionId, Vector3,
};

/// Table of circuits a simulator is willing to accept, keyed by circuit code.
///
/// The manager is safe to share across tasks behind an `Arc`; all operations
/// take `&self`.
pub struct CircuitManager {
    /// Expected circuits by circuit code
    circuits: DashMap<u32, AgentCircuit>,
}

impl CircuitManager {
    /// Creates an empty circuit table
    pub fn new() -> Self {
        Self {
            circuits: DashMap::new(),
        }
    }

    /// Registers a circuit the region should expect.
    ///
    /// Re-using a circuit code replaces the previous entry outright, on the
    /// assumption that the newest announcement reflects the current state of
    /// the agent. The replacement is logged so an operator can spot code
    /// collisions after the fact.
    pub fn add_circuit(&self, circuit: AgentCircuit) {
        let code = circuit.circuit_code;
        if let Some(previous) = self.circuits.insert(code, circuit) {
            warn!(
                "Circuit code {} reassigned from agent {} to a new announcement",
                code, previous.agent_id
            );
        }
    }

    /// Checks presented credentials against the expected circuit.
    ///
    /// The caller is admitted only when the circuit code is known and both
    /// the session ID and agent ID match the stored circuit exactly.
    ///
    /// # Arguments
    ///
    /// * `session_id` - Session token presented by the viewer
    /// * `agent_id` - Agent the viewer claims to be
    /// * `circuit_code` - Circuit code presented by the viewer
    ///
    /// # Returns
    ///
    /// An authorized response carrying the login details, or the opaque
    /// denial for any mismatch.
    pub fn authenticate_session(
        &self,
        session_id: SessionId,
        agent_id: AgentId,
        circuit_code: u32,
    ) -> AuthenticateResponse {
        let Some(circuit) = self.circuits.get(&circuit_code) else {
            return AuthenticateResponse::denied();
        };

        if circuit.session_id != session_id || circuit.agent_id != agent_id {
            return AuthenticateResponse::denied();
        }

        AuthenticateResponse {
            authorized: true,
            login_info: Some(LoginSession {
                agent_id: circuit.agent_id,
                session_id: circuit.session_id,
                secure_session_id: circuit.secure_session_id,
                circuit_code: circuit.circuit_code,
                first_name: circuit.first_name.clone(),
                last_name: circuit.last_name.clone(),
                base_folder: circuit.base_folder,
                inventory_folder: circuit.inventory_folder,
            }),
        }
    }

    /// Start position recorded for a circuit, or the origin when the code
    /// is unknown.
    pub fn position(&self, circuit_code: u32) -> Vector3 {
        self.circuits
            .get(&circuit_code)
            .map(|circuit| circuit.start_position)
            .unwrap_or_else(Vector3::zero)
    }

    /// Refreshes the mutable parts of a known circuit.
    ///
    /// Only the agent's name and start position are taken from `agent`; the
    /// identity and session fields of the stored circuit are left untouched.
    /// Unknown circuit codes are ignored.
    pub fn update_agent_data(&self, agent: &AgentCircuit) {
        if let Some(mut circuit) = self.circuits.get_mut(&agent.circuit_code) {
            circuit.first_name = agent.first_name.clone();
            circuit.last_name = agent.last_name.clone();
            circuit.start_position = agent.start_position;
        }
    }

    /// Marks a circuit as a child or root presence. Unknown codes are ignored.
    pub fn update_child_status(&self, circuit_code: u32, child: bool) {
        if let Some(mut circuit) = self.circuits.get_mut(&circuit_code) {
            circuit.child = child;
        }
    }

    /// Whether the circuit currently describes a child presence.
    ///
    /// Unknown codes report `false`, the same as a root presence.
    pub fn child_status(&self, circuit_code: u32) -> bool {
        self.circuits
            .get(&circuit_code)
            .map(|circuit| circuit.child)
            .unwrap_or(false)
    }

    /// Circuit code currently assigned to an agent, if any
    pub fn circuit_code_for_agent(&self, agent_id: AgentId) -> Option<u32> {
        self.circuits
            .iter()
            .find(|entry| entry.agent_id == agent_id)
            .map(|entry| entry.circuit_code)
    }

    /// Number of circuits currently expected
    pub fn circuit_count(&self) -> usize {
        self.circuits.len()
    }
}

impl Default for CircuitManager {
    fn default() -> Self {
        Self::new()
    }
}
