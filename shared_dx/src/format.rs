//! Human readable names for formats, usage flags and pools, plus the format predicates the
//! creation policy relies on.
use crate::defs::*;

/// Name of the format and whether the numeric ordinal is meaningful for it (FourCC formats
/// are shown by their code instead).
fn format_name(format: D3DFORMAT) -> Option<(&'static str, bool)> {
    let n = match format {
        D3DFMT_UNKNOWN => ("Unknown", true),
        D3DFMT_R8G8B8 => ("R8G8B8", true),
        D3DFMT_A8R8G8B8 => ("A8R8G8B8", true),
        D3DFMT_X8R8G8B8 => ("X8R8G8B8", true),
        D3DFMT_R5G6B5 => ("R5G6B5", true),
        D3DFMT_X1R5G5B5 => ("X1R5G5B5", true),
        D3DFMT_A1R5G5B5 => ("A1R5G5B5", true),
        D3DFMT_A4R4G4B4 => ("A4R4G4B4", true),
        D3DFMT_R3G3B2 => ("R3G3B2", true),
        D3DFMT_A8 => ("A8", true),
        D3DFMT_A8R3G3B2 => ("A8R3G3B2", true),
        D3DFMT_X4R4G4B4 => ("X4R4G4B4", true),
        D3DFMT_A2B10G10R10 => ("A2B10G10R10", true),
        D3DFMT_A8B8G8R8 => ("A8B8G8R8", true),
        D3DFMT_X8B8G8R8 => ("X8B8G8R8", true),
        D3DFMT_G16R16 => ("G16R16", true),
        D3DFMT_A2R10G10B10 => ("A2R10G10B10", true),
        D3DFMT_A16B16G16R16 => ("A16B16G16R16", true),
        D3DFMT_A8P8 => ("A8P8", true),
        D3DFMT_P8 => ("P8", true),
        D3DFMT_L8 => ("L8", true),
        D3DFMT_A8L8 => ("A8L8", true),
        D3DFMT_A4L4 => ("A4L4", true),
        D3DFMT_V8U8 => ("V8U8", true),
        D3DFMT_L6V5U5 => ("L6V5U5", true),
        D3DFMT_X8L8V8U8 => ("X8L8V8U8", true),
        D3DFMT_Q8W8V8U8 => ("Q8W8V8U8", true),
        D3DFMT_V16U16 => ("V16U16", true),
        D3DFMT_A2W10V10U10 => ("A2W10V10U10", true),
        D3DFMT_UYVY => ("FourCC 'UYVY'", false),
        D3DFMT_R8G8_B8G8 => ("FourCC 'RGBG'", false),
        D3DFMT_YUY2 => ("FourCC 'YUY2'", false),
        D3DFMT_G8R8_G8B8 => ("FourCC 'GRGB'", false),
        D3DFMT_DXT1 => ("DXT1", false),
        D3DFMT_DXT2 => ("DXT2", false),
        D3DFMT_DXT3 => ("DXT3", false),
        D3DFMT_DXT4 => ("DXT4", false),
        D3DFMT_DXT5 => ("DXT5", false),
        D3DFMT_D16_LOCKABLE => ("D16_LOCKABLE", true),
        D3DFMT_D32 => ("D32", true),
        D3DFMT_D15S1 => ("D15S1", true),
        D3DFMT_D24S8 => ("D24S8", true),
        D3DFMT_D24X8 => ("D24X8", true),
        D3DFMT_D24X4S4 => ("D24X4S4", true),
        D3DFMT_D16 => ("D16", true),
        D3DFMT_D32F_LOCKABLE => ("D32F_LOCKABLE", true),
        D3DFMT_D24FS8 => ("D24FS8", true),
        D3DFMT_D32_LOCKABLE => ("D32_LOCKABLE", true),
        D3DFMT_S8_LOCKABLE => ("S8_LOCKABLE", true),
        D3DFMT_L16 => ("L16", true),
        D3DFMT_VERTEXDATA => ("VERTEXDATA", true),
        D3DFMT_INDEX16 => ("INDEX16", true),
        D3DFMT_INDEX32 => ("INDEX32", true),
        D3DFMT_Q16W16V16U16 => ("Q16W16V16U16", true),
        D3DFMT_MULTI2_ARGB8 => ("FourCC 'MET1'", false),
        D3DFMT_R16F => ("R16F", true),
        D3DFMT_G16R16F => ("G16R16F", true),
        D3DFMT_A16B16G16R16F => ("A16B16G16R16F", true),
        D3DFMT_R32F => ("R32F", true),
        D3DFMT_G32R32F => ("G32R32F", true),
        D3DFMT_A32B32G32R32F => ("A32B32G32R32F", true),
        D3DFMT_CxV8U8 => ("CxV8U8", true),
        D3DFMT_A1 => ("A1", true),
        D3DFMT_A2B10G10R10_XR_BIAS => ("A2B10G10R10_XR_BIAS", true),
        D3DFMT_BINARYBUFFER => ("BINARYBUFFER", true),
        _ => return None,
    };
    Some(n)
}

/// e.g. "A8R8G8B8 (21)", or "A8R8G8B8" without the ordinal.  The ordinal-less form is also
/// the name of the per-format dump directory.
pub fn format_to_str(format: D3DFORMAT, include_ordinal: bool) -> String {
    match format_name(format) {
        Some((name, true)) if include_ordinal => format!("{} ({})", name, format),
        Some((name, _)) => name.to_owned(),
        None => "UNKNOWN?!".to_owned(),
    }
}

pub fn usage_to_str(usage: u32) -> String {
    let mut s = String::new();
    if usage & D3DUSAGE_RENDERTARGET != 0 {
        s.push_str("RenderTarget ");
    }
    if usage & D3DUSAGE_DEPTHSTENCIL != 0 {
        s.push_str("Depth/Stencil ");
    }
    if usage & D3DUSAGE_DYNAMIC != 0 {
        s.push_str("Dynamic");
    }
    if s.is_empty() {
        s.push_str("Don't Care");
    }
    s
}

pub fn pool_to_str(pool: u32) -> &'static str {
    match pool {
        D3DPOOL_DEFAULT => "    Default   (0)",
        D3DPOOL_MANAGED => "    Managed   (1)",
        D3DPOOL_SYSTEMMEM => "System Memory (2)",
        D3DPOOL_SCRATCH => "   Scratch    (3)",
        _ => "   UNKNOWN?!     ",
    }
}

pub fn is_render_target(usage: u32) -> bool {
    usage & D3DUSAGE_RENDERTARGET != 0
}

pub fn is_depth_stencil(usage: u32) -> bool {
    usage & D3DUSAGE_DEPTHSTENCIL != 0
}

pub fn is_dynamic(usage: u32) -> bool {
    usage & D3DUSAGE_DYNAMIC != 0
}

pub fn is_depth_format(format: D3DFORMAT) -> bool {
    matches!(
        format,
        D3DFMT_D16_LOCKABLE
            | D3DFMT_D32
            | D3DFMT_D15S1
            | D3DFMT_D24S8
            | D3DFMT_D24X8
            | D3DFMT_D24X4S4
            | D3DFMT_D16
            | D3DFMT_D32F_LOCKABLE
            | D3DFMT_D24FS8
            | D3DFMT_D32_LOCKABLE
            | D3DFMT_S8_LOCKABLE
    )
}

pub fn is_compressed(format: D3DFORMAT) -> bool {
    matches!(
        format,
        D3DFMT_DXT1 | D3DFMT_DXT2 | D3DFMT_DXT3 | D3DFMT_DXT4 | D3DFMT_DXT5
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(format_to_str(D3DFMT_A8R8G8B8, true), "A8R8G8B8 (21)");
        assert_eq!(format_to_str(D3DFMT_A8R8G8B8, false), "A8R8G8B8");
        assert_eq!(format_to_str(D3DFMT_UNKNOWN, true), "Unknown (0)");
        assert_eq!(format_to_str(D3DFMT_R32F, true), "R32F (114)");
        assert_eq!(format_to_str(D3DFMT_BINARYBUFFER, true), "BINARYBUFFER (199)");
        // fourcc formats never carry an ordinal
        assert_eq!(format_to_str(D3DFMT_DXT1, true), "DXT1");
        assert_eq!(format_to_str(D3DFMT_DXT5, false), "DXT5");
        assert_eq!(format_to_str(D3DFMT_UYVY, true), "FourCC 'UYVY'");
        assert_eq!(format_to_str(D3DFMT_MULTI2_ARGB8, true), "FourCC 'MET1'");
        assert_eq!(format_to_str(12345, true), "UNKNOWN?!");
    }

    #[test]
    fn test_usage_and_pool() {
        assert_eq!(usage_to_str(0), "Don't Care");
        assert_eq!(usage_to_str(D3DUSAGE_RENDERTARGET), "RenderTarget ");
        assert_eq!(
            usage_to_str(D3DUSAGE_RENDERTARGET | D3DUSAGE_DYNAMIC),
            "RenderTarget Dynamic"
        );
        assert_eq!(usage_to_str(D3DUSAGE_DEPTHSTENCIL), "Depth/Stencil ");
        // other bits are ignored
        assert_eq!(usage_to_str(D3DUSAGE_AUTOGENMIPMAP), "Don't Care");

        assert_eq!(pool_to_str(D3DPOOL_MANAGED), "    Managed   (1)");
        assert_eq!(pool_to_str(D3DPOOL_SYSTEMMEM), "System Memory (2)");
        assert_eq!(pool_to_str(9), "   UNKNOWN?!     ");
    }

    #[test]
    fn test_classification() {
        assert!(is_render_target(D3DUSAGE_RENDERTARGET | D3DUSAGE_DYNAMIC));
        assert!(!is_render_target(D3DUSAGE_DEPTHSTENCIL));
        assert!(is_depth_stencil(D3DUSAGE_DEPTHSTENCIL));
        assert!(is_dynamic(D3DUSAGE_DYNAMIC));
        assert!(is_depth_format(D3DFMT_D24S8));
        assert!(!is_depth_format(D3DFMT_R32F));
        assert!(is_compressed(D3DFMT_DXT3));
        assert!(!is_compressed(D3DFMT_A8R8G8B8));
    }
}
