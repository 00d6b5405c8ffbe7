/*
Multisampled shadow surfaces for game render targets.

A shadow is created next to every texture the creation policy selects.  When the game binds
the texture's top level as a render target, the shadow is bound instead; when it later binds
the texture for sampling, the shadow is resolved into it first, but only if something was drawn
into the shadow since the last resolve.

"Something was drawn" is inferred from the device draw counter: each render-target slot
remembers the counter value at bind time, and a changed counter when the slot is rebound (or
when the shadow is read while still bound) means the shadow is dirty.  Clears don't bump the
counter, which is what conservative mode is for.
 */
use fnv::{FnvHashMap, FnvHashSet};

use shared_dx::defs::*;
use shared_dx::format::{format_to_str, is_depth_stencil, pool_to_str, usage_to_str};
use shared_dx::types::{D3D9Device, DevicePtr, SurfPtr, SurfaceDesc, TexPtr, TextureDesc};
use shared_dx::util::write_log_file;

pub const MAX_RENDER_TARGETS: usize = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MsaaConfig {
    pub samples: u32,
    pub quality: u32,
    /// Treat every freshly bound shadow as dirty.
    pub conservative: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShadowSurface {
    pub shadow: SurfPtr,
    pub texture: TexPtr,
    /// Top level of `texture`; we hold one reference on it.
    pub level0: SurfPtr,
    pub depth_stencil: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct RenderTargetRef {
    surf: Option<SurfPtr>,
    draws: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MsaaResetStats {
    pub surfaces: u32,
    /// Surfaces whose count was still positive after our release.
    pub zombies: u32,
    pub zombie_refs: i64,
}

pub struct MsaaManager {
    conf: MsaaConfig,
    render_targets: [RenderTargetRef; MAX_RENDER_TARGETS],
    shadows: FnvHashMap<SurfPtr, ShadowSurface>,
    by_texture: FnvHashMap<TexPtr, SurfPtr>,
    by_surface: FnvHashMap<SurfPtr, SurfPtr>,
    dirty: FnvHashSet<SurfPtr>,
    resolves: u64,
}

impl MsaaManager {
    pub fn new(conf: MsaaConfig) -> Self {
        MsaaManager {
            conf,
            render_targets: [RenderTargetRef::default(); MAX_RENDER_TARGETS],
            shadows: FnvHashMap::default(),
            by_texture: FnvHashMap::default(),
            by_surface: FnvHashMap::default(),
            dirty: FnvHashSet::default(),
            resolves: 0,
        }
    }

    pub fn conf(&self) -> &MsaaConfig {
        &self.conf
    }

    /// Multisampling is configured at all.
    pub fn enabled(&self) -> bool {
        self.conf.samples > 0
    }

    /// Substitution and resolves run only while the draw state allows it.
    pub fn active(&self, use_msaa: bool) -> bool {
        self.enabled() && use_msaa
    }

    /// Create the multisampled twin of a freshly created texture.  Failure is logged and
    /// leaves the texture unshadowed.
    pub fn create_shadow(
        &mut self,
        dev: &mut dyn D3D9Device,
        device: DevicePtr,
        tex: TexPtr,
        desc: &TextureDesc,
    ) -> Option<SurfPtr> {
        let sdesc = SurfaceDesc {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
            pool: D3DPOOL_DEFAULT,
            multisample: self.conf.samples,
            multisample_quality: self.conf.quality,
        };
        let depth_stencil = is_depth_stencil(desc.usage);
        let res = if depth_stencil {
            dev.create_depth_stencil_surface(device, &sdesc, false, 0)
        } else {
            dev.create_render_target(device, &sdesc, false, 0)
        };

        let shadow = match res {
            Ok(s) => s,
            Err(hr) => {
                write_log_file(&format!(
                    "[ MSAA Mgr ] >> ERROR: Unable to Create MSAA Surface for Render Target: ({} x {}), Format: {}, Usage: [{}], Pool: {} (hr: {:x})",
                    desc.width,
                    desc.height,
                    format_to_str(desc.format, true),
                    usage_to_str(desc.usage),
                    pool_to_str(desc.pool),
                    hr
                ));
                return None;
            }
        };

        let level0 = match dev.get_surface_level(tex, 0) {
            Ok(s) => s,
            Err(hr) => {
                write_log_file(&format!(
                    "[ MSAA Mgr ] >> ERROR: No top level surface for texture {} (hr: {:x}), dropping its MSAA surface",
                    tex, hr
                ));
                dev.release_surface(shadow);
                return None;
            }
        };

        self.shadows.insert(
            shadow,
            ShadowSurface {
                shadow,
                texture: tex,
                level0,
                depth_stencil,
            },
        );
        self.by_texture.insert(tex, shadow);
        self.by_surface.insert(level0, shadow);
        Some(shadow)
    }

    /// Render target bind.  Returns the surface that should actually be bound.
    pub fn bind_render_target(
        &mut self,
        index: u32,
        surf: Option<SurfPtr>,
        draws: u32,
    ) -> Option<SurfPtr> {
        let slot = match self.render_targets.get_mut(index as usize) {
            Some(s) => s,
            None => return surf,
        };

        if let Some(prev) = slot.surf {
            if slot.draws != draws {
                self.dirty.insert(prev);
            }
        }
        slot.surf = None;
        slot.draws = draws;

        let shadow = match surf.and_then(|s| self.by_surface.get(&s).copied()) {
            Some(sh) => sh,
            None => return surf,
        };
        slot.surf = Some(shadow);
        if self.conf.conservative {
            self.dirty.insert(shadow);
        }
        Some(shadow)
    }

    /// Depth/stencil bind.  Returns the surface that should actually be bound.
    pub fn substitute_depth_stencil(&self, surf: Option<SurfPtr>) -> Option<SurfPtr> {
        match surf.and_then(|s| self.by_surface.get(&s)) {
            Some(&shadow) => Some(shadow),
            None => surf,
        }
    }

    pub fn is_dirty(&self, shadow: SurfPtr, draws: u32) -> bool {
        self.dirty.contains(&shadow)
            || self
                .render_targets
                .iter()
                .any(|rt| rt.surf == Some(shadow) && rt.draws != draws)
    }

    fn resolve(
        &mut self,
        dev: &mut dyn D3D9Device,
        device: DevicePtr,
        shadow: SurfPtr,
        draws: u32,
    ) -> bool {
        let level0 = match self.shadows.get(&shadow) {
            Some(s) => s.level0,
            None => return false,
        };
        let hr = dev.stretch_rect(device, shadow, None, level0, None, D3DTEXF_NONE);
        if failed(hr) {
            write_log_file(&format!(
                "[ MSAA Mgr ] >> ERROR: Resolve of {} into {} failed (hr: {:x})",
                shadow, level0, hr
            ));
        }

        self.dirty.remove(&shadow);
        // still bound: the resolve covers everything drawn so far
        for rt in self.render_targets.iter_mut() {
            if rt.surf == Some(shadow) {
                rt.draws = draws;
            }
        }
        self.resolves += 1;
        true
    }

    /// Texture bind.  Resolves the texture's shadow if it is dirty; returns whether a resolve
    /// happened.
    pub fn resolve_for_texture(
        &mut self,
        dev: &mut dyn D3D9Device,
        device: DevicePtr,
        tex: TexPtr,
        draws: u32,
    ) -> bool {
        let shadow = match self.by_texture.get(&tex) {
            Some(&s) => s,
            None => return false,
        };
        if !self.is_dirty(shadow, draws) {
            return false;
        }
        self.resolve(dev, device, shadow, draws)
    }

    /// End of frame: resolve every shadow that is still dirty.
    pub fn resolve_all_dirty(
        &mut self,
        dev: &mut dyn D3D9Device,
        device: DevicePtr,
        draws: u32,
    ) -> u32 {
        for rt in self.render_targets.iter_mut() {
            if let Some(s) = rt.surf {
                if rt.draws != draws {
                    self.dirty.insert(s);
                    rt.draws = draws;
                }
            }
        }

        let mut pending: Vec<SurfPtr> = self.dirty.iter().copied().collect();
        pending.sort();
        let mut count = 0;
        for shadow in pending {
            if self.resolve(dev, device, shadow, draws) {
                count += 1;
            } else {
                self.dirty.remove(&shadow);
            }
        }
        count
    }

    /// Release both halves of every shadow mapping and forget all state.
    pub fn reset(&mut self, dev: &mut dyn D3D9Device) -> MsaaResetStats {
        let mut stats = MsaaResetStats::default();

        write_log_file("[ MSAA Mgr ]   Releasing MSAA surfaces...");

        let mut all: Vec<ShadowSurface> = self.shadows.drain().map(|(_, s)| s).collect();
        all.sort_by_key(|s| s.shadow);
        for s in all {
            stats.surfaces += 1;
            for remaining in [dev.release_surface(s.level0), dev.release_surface(s.shadow)] {
                if remaining > 0 {
                    stats.zombies += 1;
                    stats.zombie_refs += remaining as i64;
                }
            }
        }

        self.by_texture.clear();
        self.by_surface.clear();
        self.dirty.clear();
        self.render_targets = [RenderTargetRef::default(); MAX_RENDER_TARGETS];

        write_log_file(&format!(
            "[ MSAA Mgr ]   {:4} surfaces ({:4} zombies)",
            stats.surfaces, stats.zombies
        ));
        stats
    }

    pub fn num_msaa_surfs(&self) -> usize {
        self.shadows.len()
    }

    pub fn resolves(&self) -> u64 {
        self.resolves
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn shadow_for_texture(&self, tex: TexPtr) -> Option<SurfPtr> {
        self.by_texture.get(&tex).copied()
    }

    pub fn shadow_for_surface(&self, surf: SurfPtr) -> Option<SurfPtr> {
        self.by_surface.get(&surf).copied()
    }

    /// The texture a shadow stands in for.
    pub fn backing_texture(&self, shadow: SurfPtr) -> Option<TexPtr> {
        self.shadows.get(&shadow).map(|s| s.texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_dx::fake::{FakeCall, FakeGpu};
    use shared_dx::util::{prep_log_file, LOG_EXCL_LOCK};

    fn rt_desc() -> TextureDesc {
        TextureDesc {
            width: 1920,
            height: 1080,
            levels: 1,
            usage: D3DUSAGE_RENDERTARGET,
            format: D3DFMT_A8R8G8B8,
            pool: D3DPOOL_DEFAULT,
        }
    }

    struct Setup {
        gpu: FakeGpu,
        dev: FakeGpu,
        mgr: MsaaManager,
        tex: TexPtr,
        level0: SurfPtr,
        shadow: SurfPtr,
    }

    fn setup(conservative: bool) -> Setup {
        let gpu = FakeGpu::new();
        let mut dev = gpu.clone();
        let mut mgr = MsaaManager::new(MsaaConfig {
            samples: 4,
            quality: 0,
            conservative,
        });
        let tex = gpu.make_texture(rt_desc());
        let shadow = mgr
            .create_shadow(&mut dev, FakeGpu::device_ptr(), tex, &rt_desc())
            .unwrap();
        // the game's own view of the top level
        let level0 = dev.get_surface_level(tex, 0).unwrap();
        gpu.clear_calls();
        Setup {
            gpu,
            dev,
            mgr,
            tex,
            level0,
            shadow,
        }
    }

    #[test]
    fn test_create_shadow_registers_mappings() {
        let s = setup(false);
        assert_eq!(s.mgr.num_msaa_surfs(), 1);
        assert_eq!(s.mgr.shadow_for_texture(s.tex), Some(s.shadow));
        assert_eq!(s.mgr.shadow_for_surface(s.level0), Some(s.shadow));
        assert_eq!(s.mgr.backing_texture(s.shadow), Some(s.tex));
        let mut dev = s.dev.clone();
        let sd = dev.surface_desc(s.shadow).unwrap();
        assert_eq!(sd.multisample, 4);
        assert_eq!((sd.width, sd.height), (1920, 1080));
    }

    #[test]
    fn test_depth_stencil_shadow() {
        let gpu = FakeGpu::new();
        let mut dev = gpu.clone();
        let mut mgr = MsaaManager::new(MsaaConfig {
            samples: 2,
            quality: 1,
            conservative: false,
        });
        let desc = TextureDesc {
            usage: D3DUSAGE_DEPTHSTENCIL,
            format: D3DFMT_D24S8,
            ..rt_desc()
        };
        let tex = gpu.make_texture(desc);
        let shadow = mgr
            .create_shadow(&mut dev, FakeGpu::device_ptr(), tex, &desc)
            .unwrap();
        assert_eq!(
            gpu.count_calls(|c| matches!(c, FakeCall::CreateDepthStencilSurface(d) if d.multisample == 2 && d.multisample_quality == 1)),
            1
        );
        let level0 = dev.get_surface_level(tex, 0).unwrap();
        assert_eq!(mgr.substitute_depth_stencil(Some(level0)), Some(shadow));
        let other = SurfPtr(0x42);
        assert_eq!(mgr.substitute_depth_stencil(Some(other)), Some(other));
        assert_eq!(mgr.substitute_depth_stencil(None), None);
    }

    #[test]
    fn test_create_shadow_failure_is_not_fatal() {
        let _loglock = LOG_EXCL_LOCK.lock().unwrap();
        let logfile = prep_log_file(&_loglock, "__test_msaa_shadow_fail.txt").expect("doh");

        let gpu = FakeGpu::new();
        let mut dev = gpu.clone();
        gpu.set_fail_surfaces(true);
        let mut mgr = MsaaManager::new(MsaaConfig {
            samples: 4,
            quality: 0,
            conservative: false,
        });
        let tex = gpu.make_texture(rt_desc());
        assert_eq!(
            mgr.create_shadow(&mut dev, FakeGpu::device_ptr(), tex, &rt_desc()),
            None
        );
        assert_eq!(mgr.num_msaa_surfs(), 0);
        let logtext = std::fs::read_to_string(&logfile).unwrap();
        assert!(logtext.contains("Unable to Create MSAA Surface for Render Target: (1920 x 1080)"));
    }

    #[test]
    fn test_no_draws_no_resolve() {
        let mut s = setup(false);
        let bound = s.mgr.bind_render_target(0, Some(s.level0), 0);
        assert_eq!(bound, Some(s.shadow));
        let other = SurfPtr(0x99);
        assert_eq!(s.mgr.bind_render_target(0, Some(other), 0), Some(other));
        assert!(!s.mgr.is_dirty(s.shadow, 0));
        assert!(!s
            .mgr
            .resolve_for_texture(&mut s.dev, FakeGpu::device_ptr(), s.tex, 0));
        assert_eq!(s.gpu.stretch_rects(), 0);
    }

    #[test]
    fn test_draw_then_rebind_resolves_once() {
        let mut s = setup(false);
        s.mgr.bind_render_target(0, Some(s.level0), 0);
        // one draw
        s.mgr.bind_render_target(0, None, 1);
        assert!(s.mgr.is_dirty(s.shadow, 1));
        assert!(s
            .mgr
            .resolve_for_texture(&mut s.dev, FakeGpu::device_ptr(), s.tex, 1));
        assert_eq!(
            s.gpu.last_call(),
            Some(FakeCall::StretchRect(s.shadow, s.level0, D3DTEXF_NONE))
        );
        assert!(!s.mgr.is_dirty(s.shadow, 1));
        assert!(!s
            .mgr
            .resolve_for_texture(&mut s.dev, FakeGpu::device_ptr(), s.tex, 1));
        assert_eq!(s.gpu.stretch_rects(), 1);
        assert_eq!(s.mgr.resolves(), 1);
    }

    #[test]
    fn test_read_while_still_bound() {
        let mut s = setup(false);
        s.mgr.bind_render_target(0, Some(s.level0), 10);
        assert!(!s.mgr.is_dirty(s.shadow, 10));
        // draws happen while it's bound, then it gets sampled without being unbound
        assert!(s.mgr.is_dirty(s.shadow, 12));
        assert!(s
            .mgr
            .resolve_for_texture(&mut s.dev, FakeGpu::device_ptr(), s.tex, 12));
        assert!(!s
            .mgr
            .resolve_for_texture(&mut s.dev, FakeGpu::device_ptr(), s.tex, 12));
        // the slot was caught up by the resolve, so unbinding now doesn't re-dirty it
        s.mgr.bind_render_target(0, None, 12);
        assert!(!s.mgr.is_dirty(s.shadow, 12));
        assert_eq!(s.gpu.stretch_rects(), 1);
    }

    #[test]
    fn test_shadow_bound_in_two_slots() {
        let mut s = setup(false);
        let other = SurfPtr(0x99);
        assert_eq!(s.mgr.bind_render_target(0, Some(s.level0), 5), Some(s.shadow));
        assert_eq!(s.mgr.bind_render_target(1, Some(s.level0), 5), Some(s.shadow));

        // leaving one slot with nothing drawn doesn't dirty it
        s.mgr.bind_render_target(0, Some(other), 5);
        assert!(!s.mgr.is_dirty(s.shadow, 5));
        s.mgr.bind_render_target(0, Some(s.level0), 5);

        // draw, then leave slot 0 while slot 1 still has it
        s.mgr.bind_render_target(0, Some(other), 7);
        assert!(s.mgr.is_dirty(s.shadow, 7));
        assert!(s
            .mgr
            .resolve_for_texture(&mut s.dev, FakeGpu::device_ptr(), s.tex, 7));
        // the resolve caught up slot 1 too
        assert!(!s.mgr.is_dirty(s.shadow, 7));
        assert!(!s
            .mgr
            .resolve_for_texture(&mut s.dev, FakeGpu::device_ptr(), s.tex, 7));

        // more drawing through slot 1 is still seen
        assert!(s.mgr.is_dirty(s.shadow, 8));
        s.mgr.bind_render_target(1, None, 8);
        assert_eq!(s.mgr.dirty_count(), 1);
        assert_eq!(
            s.mgr
                .resolve_all_dirty(&mut s.dev, FakeGpu::device_ptr(), 8),
            1
        );
        assert_eq!(s.gpu.stretch_rects(), 2);
        assert_eq!(s.mgr.resolves(), 2);
    }

    #[test]
    fn test_conservative_marks_dirty_on_bind() {
        let mut s = setup(true);
        s.mgr.bind_render_target(0, Some(s.level0), 0);
        assert!(s.mgr.is_dirty(s.shadow, 0));
        s.mgr.bind_render_target(0, None, 0);
        assert!(s
            .mgr
            .resolve_for_texture(&mut s.dev, FakeGpu::device_ptr(), s.tex, 0));
        assert_eq!(s.gpu.stretch_rects(), 1);
    }

    #[test]
    fn test_end_of_frame_sweep() {
        let mut s = setup(false);
        s.mgr.bind_render_target(1, Some(s.level0), 3);
        // drawn into but never read back through SetTexture
        assert_eq!(
            s.mgr
                .resolve_all_dirty(&mut s.dev, FakeGpu::device_ptr(), 7),
            1
        );
        assert_eq!(s.mgr.dirty_count(), 0);
        assert_eq!(
            s.mgr
                .resolve_all_dirty(&mut s.dev, FakeGpu::device_ptr(), 7),
            0
        );
        assert_eq!(s.gpu.stretch_rects(), 1);
    }

    #[test]
    fn test_out_of_range_slot_passes_through() {
        let mut s = setup(false);
        assert_eq!(
            s.mgr.bind_render_target(MAX_RENDER_TARGETS as u32, Some(s.level0), 0),
            Some(s.level0)
        );
    }

    #[test]
    fn test_reset_releases_both_halves() {
        let _loglock = LOG_EXCL_LOCK.lock().unwrap();
        let logfile = prep_log_file(&_loglock, "__test_msaa_reset.txt").expect("doh");

        let mut s = setup(false);
        // game drops its own view of the top level before reset
        s.dev.release_surface(s.level0);
        s.mgr.bind_render_target(0, Some(s.level0), 0);
        s.mgr.bind_render_target(0, None, 1);

        let stats = s.mgr.reset(&mut s.dev);
        assert_eq!(stats.surfaces, 1);
        assert_eq!(stats.zombies, 0);
        assert_eq!(s.gpu.ref_count(s.shadow.0), 0);
        assert_eq!(s.gpu.ref_count(s.level0.0), 0);
        assert_eq!(s.mgr.num_msaa_surfs(), 0);
        assert_eq!(s.mgr.dirty_count(), 0);
        assert_eq!(s.mgr.shadow_for_texture(s.tex), None);
        assert_eq!(s.mgr.bind_render_target(0, Some(s.level0), 1), Some(s.level0));

        let logtext = std::fs::read_to_string(&logfile).unwrap();
        assert!(logtext.contains("   1 surfaces (   0 zombies)"));
    }

    #[test]
    fn test_reset_counts_zombies() {
        let _loglock = LOG_EXCL_LOCK.lock().unwrap();
        let _logfile = prep_log_file(&_loglock, "__test_msaa_zombies.txt").expect("doh");

        let mut s = setup(false);
        // the game still holds its top-level surface reference
        let stats = s.mgr.reset(&mut s.dev);
        assert_eq!(stats.surfaces, 1);
        assert_eq!(stats.zombies, 1);
        assert_eq!(stats.zombie_refs, 1);
    }
}
