pub mod cache;
pub mod generator;
pub mod model;
pub mod poller;
pub mod source;
pub mod store;

pub use cache::SnapshotCache;
pub use generator::RandomPriceGenerator;
pub use model::{FullSnapshot, InstrumentSnapshot};
pub use poller::{IngestionPoller, PollerSettings};
pub use source::PolygonSource;
pub use store::SnapshotStore;
