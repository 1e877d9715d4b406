pub mod config;
pub mod detect;
pub mod error;
pub mod history;
pub mod relay;
pub mod types;

pub use config::RelayCfg;
pub use error::{InputError, RelayError};
pub use relay::RelayEngine;
pub use types::{
    DecisionSource, Evaluation, Occurrence, RangeReport, RelaySnapshot, SpikeOutcome, Switch,
};
