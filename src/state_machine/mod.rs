//! # Exchange Lifecycle
//!
//! Record states, action guards and the state machine that is the sole writer
//! of a record's state, error, file and exchange timestamp.

pub mod errors;
pub mod exchange_state_machine;
pub mod guards;
pub mod states;

pub use errors::{GuardError, GuardResult};
pub use exchange_state_machine::{
    ActionOutcome, CallOptions, ExchangeStateMachine, GenerateOptions,
};
pub use guards::ActionGuard;
pub use states::ExchangeState;
