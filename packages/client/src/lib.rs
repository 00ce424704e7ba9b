pub mod codec;
pub mod error;
pub mod results_poller;
pub mod service;

pub use codec::{Codec, JsonCodec};
pub use error::ClientError;
pub use results_poller::{JobOutcome, ResultsPoller};
pub use service::{CallConfig, Service};
