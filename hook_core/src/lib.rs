pub mod fix_config;
pub mod frame_trace;
pub mod render_fix;

#[cfg(windows)]
#[allow(non_snake_case, non_camel_case_types)]
pub mod d3dx;
#[cfg(windows)]
#[allow(non_snake_case)]
pub mod hook_device;
#[cfg(windows)]
#[allow(non_snake_case, clippy::too_many_arguments)]
pub mod hook_render;
#[cfg(windows)]
pub mod util;

pub use fix_config::FixConfig;
pub use render_fix::{DrawState, RenderFix, ResetReport, FONT_CRC32};
