//! Per-call trace of the intercepted bind and copy entry points.
use shared_dx::types::{Rect, SurfPtr, SurfaceDesc, TexPtr};
use shared_dx::util::write_log_file;

fn ptr_str(p: Option<usize>) -> String {
    format!("{:08x}h", p.unwrap_or(0))
}

/// A rect as "[l,t/r,b]", preceded by " *" when it was absent and the full surface is
/// assumed.
fn rect_str(rect: Option<&Rect>, desc: Option<&SurfaceDesc>) -> String {
    let (mark, r) = match (rect, desc) {
        (Some(r), _) => (" ", *r),
        (None, Some(d)) => (
            " *",
            Rect {
                left: 0,
                top: 0,
                right: d.width as i32,
                bottom: d.height as i32,
            },
        ),
        (None, None) => (" *", Rect::default()),
    };
    format!("{}[{},{}/{},{}]", mark, r.left, r.top, r.right, r.bottom)
}

#[derive(Debug, Default)]
pub struct FrameTracer {
    pub log: bool,
    /// Set while the dumper is writing a texture; D3DX issues its own copies then, which
    /// aren't interesting.
    pub dumping: bool,
}

impl FrameTracer {
    pub fn new(log: bool) -> Self {
        FrameTracer {
            log,
            dumping: false,
        }
    }

    pub fn set_texture(&self, sampler: u32, tex: Option<TexPtr>) {
        if self.log {
            write_log_file(&format!(
                "[FrameTrace] SetTexture      - Sampler: {}, pTexture: {}",
                sampler,
                ptr_str(tex.map(|t| t.0))
            ));
        }
    }

    pub fn proxy(&self, from: TexPtr, to: TexPtr) {
        if self.log {
            write_log_file(&format!(
                "[FrameTrace] --> Proxying {} through {} <--",
                ptr_str(Some(from.0)),
                ptr_str(Some(to.0))
            ));
        }
    }

    pub fn set_render_target(&self, index: u32, surf: Option<SurfPtr>) {
        if self.log {
            write_log_file(&format!(
                "[FrameTrace] SetRenderTarget - RenderTargetIndex: {}, pRenderTarget: {}",
                index,
                ptr_str(surf.map(|s| s.0))
            ));
        }
    }

    pub fn set_depth_stencil(&self, surf: Option<SurfPtr>) {
        if self.log {
            write_log_file(&format!(
                "[FrameTrace] SetDepthStencilSurface   ({})",
                ptr_str(surf.map(|s| s.0))
            ));
        }
    }

    /// Whether a copy should be traced at all; lets the caller skip the descriptor queries.
    pub fn wants_stretch_rect(&self) -> bool {
        self.log && !self.dumping
    }

    pub fn stretch_rect(
        &self,
        src_rect: Option<&Rect>,
        src_desc: Option<&SurfaceDesc>,
        dest_rect: Option<&Rect>,
        dest_desc: Option<&SurfaceDesc>,
    ) {
        if !self.wants_stretch_rect() {
            return;
        }
        write_log_file(&format!(
            "[FrameTrace] StretchRect      - {} ==> {}",
            rect_str(src_rect, src_desc),
            rect_str(dest_rect, dest_desc)
        ));
    }
}
