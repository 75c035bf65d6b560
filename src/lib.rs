pub mod android_jni;
pub mod config;
pub mod fix;
pub mod follow;
pub mod geo;
pub mod gpx;
pub mod recorder;
pub mod store;
pub mod trail;

pub use config::{EngineConfig, FollowConfig, QualityConfig, RecorderConfig};
pub use fix::{FixQuality, PositionError, PositionFix};
pub use follow::{FollowError, FollowSession, FollowState, FollowUpdate, Follower, Proximity};
pub use geo::Coordinate;
pub use recorder::{Recorder, RecorderError};
pub use store::{Connectivity, FallbackStore, JsonFileStore, StoreError, TrailStore};
pub use trail::{StyleTag, Trail, Waypoint};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
