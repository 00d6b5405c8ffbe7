pub mod msaa;
pub mod policy;

pub use crate::msaa::{MsaaConfig, MsaaManager, MsaaResetStats, ShadowSurface, MAX_RENDER_TARGETS};
pub use policy::{decide, CreateDecision, CreationPolicy};
