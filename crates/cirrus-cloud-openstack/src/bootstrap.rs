//! Bootstrap of an environment's first control instance
//!
//! ```text
//! Idle ─► InstanceRequested ─┬───────────────────────────────────────────────► Provisioned
//!                            └─► AddressAllocating ─► AddressAssociating ─────► Provisioned
//! ```
//!
//! Any step may fail; the attempt then ends in `Failed` and is not retried.

use crate::instances::InstanceManager;
use crate::network::NetworkAllocator;
use cirrus_cloud::{
    BootstrapAborted, BootstrapCause, BootstrapPhase, BootstrapPolicy, CaBundle, CredentialWriter,
    FloatingIp, Instance, MachineConfig, ProviderState, StateStore,
};

/// Outcome of a successful bootstrap
#[derive(Debug, Clone)]
pub struct Bootstrapped {
    pub instance: Instance,

    /// Address attached to the control instance, when the policy asked for one
    pub public_address: Option<FloatingIp>,

    /// Phases visited, in order
    pub phases: Vec<BootstrapPhase>,
}

enum State {
    Idle,
    InstanceRequested,
    AddressAllocating(Instance),
    AddressAssociating(Instance, FloatingIp),
    Provisioned(Instance, Option<FloatingIp>),
    Failed(BootstrapAborted),
}

impl State {
    fn phase(&self) -> BootstrapPhase {
        match self {
            State::Idle => BootstrapPhase::Idle,
            State::InstanceRequested => BootstrapPhase::InstanceRequested,
            State::AddressAllocating(_) => BootstrapPhase::AddressAllocating,
            State::AddressAssociating(..) => BootstrapPhase::AddressAssociating,
            State::Provisioned(..) => BootstrapPhase::Provisioned,
            State::Failed(_) => BootstrapPhase::Failed,
        }
    }
}

fn abort(phase: BootstrapPhase, instance: Option<Instance>, cause: BootstrapCause) -> State {
    tracing::warn!(%phase, error = %cause, "bootstrap aborted");
    State::Failed(BootstrapAborted {
        phase,
        instance,
        cause,
    })
}

/// Runs one bootstrap attempt.
///
/// The coordinator is consumed by [`run`](Self::run), so an attempt cannot be
/// re-entered.
pub struct BootstrapCoordinator<'a> {
    environment: &'a str,
    instances: &'a InstanceManager,
    network: &'a NetworkAllocator,
    state: &'a StateStore,
    credentials: CaBundle,
    policy: BootstrapPolicy,
    machine: MachineConfig,
    phases: Vec<BootstrapPhase>,
}

impl<'a> BootstrapCoordinator<'a> {
    pub fn new(
        environment: &'a str,
        instances: &'a InstanceManager,
        network: &'a NetworkAllocator,
        state: &'a StateStore,
        credentials: CaBundle,
        policy: BootstrapPolicy,
    ) -> Self {
        Self {
            environment,
            instances,
            network,
            state,
            credentials,
            policy,
            machine: MachineConfig::new("0"),
            phases: Vec::new(),
        }
    }

    /// Machine configuration for the control instance (machine "0" by default)
    pub fn with_machine(mut self, machine: MachineConfig) -> Self {
        self.machine = machine;
        self
    }

    /// Drive the state machine to `Provisioned` or `Failed`.
    ///
    /// `writer` is invoked exactly once, after the provider state was saved.
    /// If it fails the saved state is removed again, so the environment is
    /// left as it was and the whole bootstrap can be retried.
    pub async fn run(
        mut self,
        writer: &dyn CredentialWriter,
    ) -> Result<Bootstrapped, BootstrapAborted> {
        let mut state = State::Idle;
        loop {
            let phase = state.phase();
            tracing::debug!(environment = self.environment, %phase, "bootstrap phase");
            self.phases.push(phase);

            state = match state {
                State::Provisioned(instance, public_address) => {
                    tracing::info!(
                        environment = self.environment,
                        instance = %instance.id,
                        address = instance.dns_name().unwrap_or("-"),
                        "bootstrap complete"
                    );
                    return Ok(Bootstrapped {
                        instance,
                        public_address,
                        phases: self.phases,
                    });
                }
                State::Failed(aborted) => return Err(aborted),
                other => self.transition(other, writer).await,
            };
        }
    }

    async fn transition(&self, state: State, writer: &dyn CredentialWriter) -> State {
        match state {
            State::Idle => match self.state.exists().await {
                Ok(false) => State::InstanceRequested,
                Ok(true) => abort(
                    BootstrapPhase::Idle,
                    None,
                    BootstrapCause::AlreadyBootstrapped,
                ),
                Err(e) => abort(BootstrapPhase::Idle, None, BootstrapCause::ProviderState(e)),
            },

            State::InstanceRequested => match self.instances.start_instance(&self.machine).await {
                Ok(instance) if self.policy.require_public_ip => {
                    State::AddressAllocating(instance)
                }
                Ok(instance) => {
                    self.provision(BootstrapPhase::InstanceRequested, instance, None, writer)
                        .await
                }
                Err(e) => abort(
                    BootstrapPhase::InstanceRequested,
                    None,
                    BootstrapCause::StartInstance(Box::new(e)),
                ),
            },

            State::AddressAllocating(instance) => match self.network.allocate().await {
                Ok(fip) => State::AddressAssociating(instance, fip),
                Err(e) => abort(
                    BootstrapPhase::AddressAllocating,
                    Some(instance),
                    BootstrapCause::PublicAddress(e),
                ),
            },

            State::AddressAssociating(instance, fip) => {
                match self.network.associate(&instance, fip).await {
                    Ok(fip) => {
                        let instance = instance.with_public_address(fip.address.clone());
                        self.provision(
                            BootstrapPhase::AddressAssociating,
                            instance,
                            Some(fip),
                            writer,
                        )
                        .await
                    }
                    Err(e) => abort(
                        BootstrapPhase::AddressAssociating,
                        Some(instance),
                        BootstrapCause::PublicAddress(e),
                    ),
                }
            }

            terminal @ (State::Provisioned(..) | State::Failed(_)) => terminal,
        }
    }

    /// Record the control instance, then hand the credentials to `writer`.
    ///
    /// Failures are reported in `phase`, the last phase before `Provisioned`.
    async fn provision(
        &self,
        phase: BootstrapPhase,
        instance: Instance,
        public_address: Option<FloatingIp>,
        writer: &dyn CredentialWriter,
    ) -> State {
        let record = ProviderState::new(vec![instance.id.clone()]);
        if let Err(e) = self.state.save(&record).await {
            return abort(phase, Some(instance), BootstrapCause::ProviderState(e));
        }

        if let Err(e) = self.credentials.write_to(self.environment, writer) {
            if let Err(cleanup) = self.state.remove().await {
                tracing::warn!(
                    environment = self.environment,
                    error = %cleanup,
                    "cannot remove provider state of failed bootstrap"
                );
            }
            return abort(phase, Some(instance), BootstrapCause::WriteCredentials(e));
        }

        State::Provisioned(instance, public_address)
    }
}
