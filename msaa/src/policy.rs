//! Texture creation policy for the primary device: which game render targets are resized to
//! the output resolution and which get a multisampled shadow.
use shared_dx::defs::*;
use shared_dx::format::is_render_target;
use shared_dx::types::TextureDesc;

/// The game's internal framebuffer size.
pub const PRIMARY_SIZE: (u32, u32) = (1280, 720);
/// Motion blur buffer, scaled by the post-process ratio.
pub const MOTION_BLUR_SIZE: (u32, u32) = (512, 256);
/// The game recreates a render target of this size every frame; refusing it is harmless.
pub const DEGENERATE_RT_SIZE: (u32, u32) = (16, 1);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CreationPolicy {
    pub output_width: u32,
    pub output_height: u32,
    pub postproc_ratio: f32,
}

impl Default for CreationPolicy {
    fn default() -> Self {
        CreationPolicy {
            output_width: PRIMARY_SIZE.0,
            output_height: PRIMARY_SIZE.1,
            postproc_ratio: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CreateDecision {
    Reject,
    Create { desc: TextureDesc, shadow: bool },
}

/// `msaa_applicable` is true when multisampling is configured and the draw state allows it
/// for new resources.
pub fn decide(desc: &TextureDesc, msaa_applicable: bool, policy: &CreationPolicy) -> CreateDecision {
    let rt = is_render_target(desc.usage);
    let size = (desc.width, desc.height);

    if rt && size == DEGENERATE_RT_SIZE {
        return CreateDecision::Reject;
    }

    let mut out = *desc;
    let mut shadow = msaa_applicable;

    if size == PRIMARY_SIZE {
        if (rt && (desc.format == D3DFMT_A8R8G8B8 || desc.format == D3DFMT_R32F))
            || desc.format == D3DFMT_D24S8
        {
            out.width = policy.output_width;
            out.height = policy.output_height;
            // HDR post-process doesn't benefit from multisampling
            if desc.format == D3DFMT_R32F {
                shadow = false;
            }
        } else {
            shadow = false;
        }
    } else if rt && size == MOTION_BLUR_SIZE {
        out.width = (policy.output_width as f32 * policy.postproc_ratio) as u32;
        out.height = (policy.output_height as f32 * policy.postproc_ratio) as u32;
        shadow = false;
    } else {
        // everything else, including the 256x256 post-process target, stays single sampled
        shadow = false;
    }

    CreateDecision::Create { desc: out, shadow }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(width: u32, height: u32, usage: u32, format: D3DFORMAT) -> TextureDesc {
        TextureDesc {
            width,
            height,
            levels: 1,
            usage,
            format,
            pool: D3DPOOL_DEFAULT,
        }
    }

    fn policy() -> CreationPolicy {
        CreationPolicy {
            output_width: 1920,
            output_height: 1080,
            postproc_ratio: 0.5,
        }
    }

    #[test]
    fn test_degenerate_rejected() {
        let d = desc(16, 1, D3DUSAGE_RENDERTARGET, D3DFMT_A8R8G8B8);
        assert_eq!(decide(&d, true, &policy()), CreateDecision::Reject);
        // not a render target: fine
        let d = desc(16, 1, 0, D3DFMT_A8R8G8B8);
        assert!(matches!(decide(&d, true, &policy()), CreateDecision::Create { .. }));
        // other tiny targets are left alone
        let d = desc(1, 1, D3DUSAGE_RENDERTARGET, D3DFMT_R32F);
        assert_eq!(
            decide(&d, true, &policy()),
            CreateDecision::Create { desc: d, shadow: false }
        );
    }

    #[test]
    fn test_primary_color_resized_with_shadow() {
        let d = desc(1280, 720, D3DUSAGE_RENDERTARGET, D3DFMT_A8R8G8B8);
        match decide(&d, true, &policy()) {
            CreateDecision::Create { desc, shadow } => {
                assert_eq!((desc.width, desc.height), (1920, 1080));
                assert_eq!(desc.format, D3DFMT_A8R8G8B8);
                assert!(shadow);
            }
            r => panic!("unexpected {:?}", r),
        }
        // no shadow when msaa isn't applicable, but still resized
        match decide(&d, false, &policy()) {
            CreateDecision::Create { desc, shadow } => {
                assert_eq!((desc.width, desc.height), (1920, 1080));
                assert!(!shadow);
            }
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn test_primary_depth_and_hdr() {
        let ds = desc(1280, 720, D3DUSAGE_DEPTHSTENCIL, D3DFMT_D24S8);
        match decide(&ds, true, &policy()) {
            CreateDecision::Create { desc, shadow } => {
                assert_eq!((desc.width, desc.height), (1920, 1080));
                assert!(shadow);
            }
            r => panic!("unexpected {:?}", r),
        }
        let hdr = desc(1280, 720, D3DUSAGE_RENDERTARGET, D3DFMT_R32F);
        match decide(&hdr, true, &policy()) {
            CreateDecision::Create { desc, shadow } => {
                assert_eq!((desc.width, desc.height), (1920, 1080));
                assert!(!shadow);
            }
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn test_primary_size_other_formats_untouched() {
        // plain texture that happens to be 1280x720
        let d = desc(1280, 720, 0, D3DFMT_A8R8G8B8);
        assert_eq!(
            decide(&d, true, &policy()),
            CreateDecision::Create { desc: d, shadow: false }
        );
        let d = desc(1280, 720, D3DUSAGE_RENDERTARGET, D3DFMT_X8R8G8B8);
        assert_eq!(
            decide(&d, true, &policy()),
            CreateDecision::Create { desc: d, shadow: false }
        );
    }

    #[test]
    fn test_postprocess_targets() {
        let blur = desc(512, 256, D3DUSAGE_RENDERTARGET, D3DFMT_A8R8G8B8);
        match decide(&blur, true, &policy()) {
            CreateDecision::Create { desc, shadow } => {
                assert_eq!((desc.width, desc.height), (960, 540));
                assert!(!shadow);
            }
            r => panic!("unexpected {:?}", r),
        }
        let pp = desc(256, 256, D3DUSAGE_RENDERTARGET, D3DFMT_A8R8G8B8);
        assert_eq!(
            decide(&pp, true, &policy()),
            CreateDecision::Create { desc: pp, shadow: false }
        );
        // 512x256 that isn't a render target is an ordinary texture
        let tex = desc(512, 256, 0, D3DFMT_DXT5);
        assert_eq!(
            decide(&tex, true, &policy()),
            CreateDecision::Create { desc: tex, shadow: false }
        );
    }
}
