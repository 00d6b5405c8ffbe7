/*
Index of the on-disk texture directories:

  <root>/custom/<crc:08x>.dds         replacements, enumerated once at startup
  <root>/dump/<FORMAT>/<crc:08x>.png  textures written by the dumper

Both sets are built up front so the loader never has to touch the filesystem to learn whether
a checksum is customised or already dumped.
 */
use std::path::{Path, PathBuf};

use fnv::{FnvHashMap, FnvHashSet};

use shared_dx::error::Result;
use shared_dx::util::write_log_file;

pub const CUSTOM_EXT: &str = "dds";
pub const DUMP_EXT: &str = "png";

/// Parse the leading hex digits of a file stem, the way `%x` does.
fn parse_checksum(stem: &str) -> Option<u32> {
    let digits: String = stem
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .take(8)
        .collect();
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(&digits, 16).ok()
}

fn has_ext(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

pub struct TextureDirs {
    root: PathBuf,
    custom: FnvHashSet<u32>,
    custom_sizes: FnvHashMap<u32, u64>,
    dumped: FnvHashSet<u32>,
}

impl TextureDirs {
    /// An index with nothing in it.  Used when the directory doesn't exist yet.
    pub fn new(root: &Path) -> Self {
        TextureDirs {
            root: root.to_path_buf(),
            custom: FnvHashSet::default(),
            custom_sizes: FnvHashMap::default(),
            dumped: FnvHashSet::default(),
        }
    }

    /// Walk `<root>/custom` and every subdirectory of `<root>/dump`.  Missing directories
    /// are not an error; unreadable ones are.
    pub fn enumerate(root: &Path) -> Result<Self> {
        let mut dirs = TextureDirs::new(root);

        let custom_dir = root.join("custom");
        if custom_dir.is_dir() {
            let mut files = 0;
            let mut bytes = 0_u64;
            for entry in std::fs::read_dir(&custom_dir)? {
                let path = entry?.path();
                if !path.is_file() || !has_ext(&path, CUSTOM_EXT) {
                    continue;
                }
                let checksum = match path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(parse_checksum)
                {
                    Some(c) => c,
                    None => continue,
                };
                let size = shared_dx::util::file_size(&path);
                files += 1;
                bytes += size;
                dirs.custom.insert(checksum);
                dirs.custom_sizes.insert(checksum, size);
            }
            write_log_file(&format!(
                "[Custom Tex] Enumerating custom textures... {} files ({:3.1} MiB)",
                files,
                bytes as f64 / (1024.0 * 1024.0)
            ));
        }

        let dump_dir = root.join("dump");
        if dump_dir.is_dir() {
            let mut files = 0;
            let mut bytes = 0_u64;
            for entry in std::fs::read_dir(&dump_dir)? {
                let sub = entry?.path();
                if !sub.is_dir() {
                    continue;
                }
                for entry in std::fs::read_dir(&sub)? {
                    let path = entry?.path();
                    if !has_ext(&path, DUMP_EXT) {
                        continue;
                    }
                    if let Some(checksum) = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(parse_checksum)
                    {
                        files += 1;
                        bytes += shared_dx::util::file_size(&path);
                        dirs.dumped.insert(checksum);
                    }
                }
            }
            write_log_file(&format!(
                "[Custom Tex] Enumerating dumped textures... {} files ({:3.1} MiB)",
                files,
                bytes as f64 / (1024.0 * 1024.0)
            ));
        }

        Ok(dirs)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_custom(&self, checksum: u32) -> bool {
        self.custom.contains(&checksum)
    }

    pub fn custom_size(&self, checksum: u32) -> u64 {
        self.custom_sizes.get(&checksum).copied().unwrap_or(0)
    }

    pub fn custom_path(&self, checksum: u32) -> PathBuf {
        self.root
            .join("custom")
            .join(format!("{:08x}.{}", checksum, CUSTOM_EXT))
    }

    pub fn is_dumped(&self, checksum: u32) -> bool {
        self.dumped.contains(&checksum)
    }

    pub fn mark_dumped(&mut self, checksum: u32) {
        self.dumped.insert(checksum);
    }

    pub fn dump_dir(&self, format_name: &str) -> PathBuf {
        self.root.join("dump").join(format_name)
    }

    pub fn dump_path(&self, format_name: &str, checksum: u32) -> PathBuf {
        self.dump_dir(format_name)
            .join(format!("{:08x}.{}", checksum, DUMP_EXT))
    }

    pub fn num_custom(&self) -> usize {
        self.custom.len()
    }

    pub fn num_dumped(&self) -> usize {
        self.dumped.len()
    }
}
