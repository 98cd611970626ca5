pub mod dispatcher;
pub mod engine;
pub mod merge;
pub mod normalize;
pub mod populate;
pub mod resolver;
pub mod store;

pub use crate::domain::model::{Key, LookupResult, TabularRecord};
pub use crate::domain::ports::{ConfigProvider, Provider, Storage};
pub use crate::utils::error::Result;
pub use dispatcher::{Dispatcher, RateLimits, TaskOutcome};
pub use engine::{GeocodeEngine, RunReport};
pub use merge::merge;
pub use normalize::{normalize, normalize_all};
pub use populate::{populate, PopulateOutcome};
pub use resolver::{FallbackResolver, ProviderTier, Resolution};
pub use store::ResultStore;
