use fnv::FnvHashMap;

use shared_dx::types::{D3D9Device, TexPtr};
use shared_dx::util::write_log_file;

/// A decoded texture kept alive by the cache.  `refs` counts the references the cache has
/// taken on the device object: one for the insert plus one per cache hit handed to the game.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedTexture {
    pub checksum: u32,
    pub tex: TexPtr,
    pub refs: u32,
    pub load_time_ms: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheResetStats {
    pub textures: u32,
    pub references: u32,
    /// Sum of the counts still held by someone else after the cache released its own.
    pub ext_refs: i64,
    pub ext_textures: u32,
    pub underflows: u32,
}

/// Texture data deduplication keyed by CRC-32 of the file bytes.
pub struct TextureCache {
    textures: FnvHashMap<u32, CachedTexture>,
    time_saved_ms: f64,
    hits: u64,
    log_hits: bool,
}

impl TextureCache {
    pub fn new(log_hits: bool) -> Self {
        TextureCache {
            textures: FnvHashMap::with_capacity_and_hasher(4096, Default::default()),
            time_saved_ms: 0.0,
            hits: 0,
            log_hits,
        }
    }

    pub fn lookup(&self, checksum: u32) -> Option<&CachedTexture> {
        self.textures.get(&checksum)
    }

    /// Track `tex` under `checksum`, taking a reference of its own on it.  Checksum 0 marks
    /// data that must never be shared and is refused, as is a checksum already present.
    pub fn insert(
        &mut self,
        dev: &mut dyn D3D9Device,
        checksum: u32,
        tex: TexPtr,
        load_time_ms: f64,
    ) -> bool {
        if checksum == 0 || self.textures.contains_key(&checksum) {
            return false;
        }
        dev.add_ref_texture(tex);
        self.textures.insert(
            checksum,
            CachedTexture {
                checksum,
                tex,
                refs: 1,
                load_time_ms,
            },
        );
        true
    }

    /// Hand out another reference to the cached texture for `checksum` and credit its load
    /// time to the savings counter.
    pub fn acquire(&mut self, dev: &mut dyn D3D9Device, checksum: u32) -> Option<TexPtr> {
        let entry = self.textures.get_mut(&checksum)?;
        dev.add_ref_texture(entry.tex);
        entry.refs += 1;
        self.hits += 1;
        self.time_saved_ms += entry.load_time_ms;

        if self.log_hits {
            write_log_file(&format!(
                "[CacheTrace] Cache hit ({:X}), saved {:2.1} ms",
                entry.checksum, entry.load_time_ms
            ));
        }
        Some(entry.tex)
    }

    /// Release every reference the cache holds and forget all entries.
    pub fn reset(&mut self, dev: &mut dyn D3D9Device) -> CacheResetStats {
        let mut stats = CacheResetStats::default();

        write_log_file("[ Tex. Mgr ] -- TextureManager::reset (...) -- ");
        write_log_file("[ Tex. Mgr ]   Releasing textures...");

        for (_, entry) in self.textures.drain() {
            stats.textures += 1;
            let mut remaining = 0;
            let mut underflow = false;
            for i in 0..entry.refs {
                stats.references += 1;
                remaining = dev.release_texture(entry.tex);
                // a device count never drops below zero; reaching it while we still owe
                // releases means someone else released our references and the object is gone
                if remaining < 0 || (remaining == 0 && i + 1 < entry.refs) {
                    underflow = true;
                    break;
                }
            }
            if remaining > 0 {
                stats.ext_refs += remaining as i64;
                stats.ext_textures += 1;
            }
            if underflow {
                stats.underflows += 1;
            }
        }

        write_log_file(&format!(
            "[ Tex. Mgr ]   {:4} textures ({:4} references)",
            stats.textures, stats.references
        ));
        if stats.ext_refs > 0 {
            write_log_file(&format!(
                "[ Tex. Mgr ] >> WARNING: The game is still holding references ({}) to {} textures !!!",
                stats.ext_refs, stats.ext_textures
            ));
        }
        if stats.underflows > 0 {
            write_log_file(&format!(
                "[ Tex. Mgr ] >> WARNING: Reference counting sanity check failed: Reference Underflow ({} times) !!!",
                stats.underflows
            ));
        }
        stats
    }

    pub fn time_saved_ms(&self) -> f64 {
        self.time_saved_ms
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}
