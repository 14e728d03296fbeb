//! ---
//! fl_section: "02-fault-injection"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Fault injection engine and capability adapters."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Fault injector: applies scenarios in configured order against a single
//! HTTP-addressable target, probing its health throughout, and always releases
//! load generators and network impairments before returning.

pub mod disruption;
pub mod engine;
pub mod load;
pub mod model;
pub mod network;
pub mod probe;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use disruption::{ProcessDisruptor, ShellDisruptor};
pub use engine::{Capabilities, FaultInjector, InjectorSettings};
pub use load::{
    select_load_generator, ActiveLoad, ExternalStressGenerator, InProcessLoadGenerator,
    LoadGenerator, LoadGeneratorPolicy, LoadRequest, ResourceKind,
};
pub use model::{
    InjectionOutcome, InjectionResult, InjectionRun, ProbeSample, RunStatus, Target,
};
pub use network::{
    Impairment, ImpairmentGuard, NetworkImpairer, NetworkState, SimulatedNetwork, TcNetemImpairer,
};
pub use probe::{HealthPoller, HealthProbe, HttpHealthProbe};
