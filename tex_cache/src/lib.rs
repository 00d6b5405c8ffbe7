pub mod checksum;
pub mod tex_cache;
pub mod tex_dirs;

pub use crate::tex_cache::{CacheResetStats, CachedTexture, TextureCache};
pub use checksum::{checksum, crc32};
pub use tex_dirs::TextureDirs;
