use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use shared_dx::error::{HookError, Result};
use shared_dx::util::write_log_file;

pub const CONFIG_FILE: &str = "tsfix.yaml";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TextureConf {
    pub cache: bool,
    pub dump: bool,
    pub log: bool,
    pub optimize_ui: bool,
    pub full_mipmaps: bool,
    /// Decode custom textures on a worker thread, showing the game's own texture meanwhile.
    pub async_custom: bool,
    pub load_timeout_ms: u64,
}

impl Default for TextureConf {
    fn default() -> Self {
        TextureConf {
            cache: true,
            dump: false,
            log: false,
            optimize_ui: true,
            full_mipmaps: false,
            async_custom: false,
            load_timeout_ms: 10000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RenderConf {
    pub msaa_samples: u32,
    pub msaa_quality: u32,
    pub conservative_msaa: bool,
    pub output_width: u32,
    pub output_height: u32,
    pub postproc_ratio: f32,
}

impl Default for RenderConf {
    fn default() -> Self {
        RenderConf {
            msaa_samples: 0,
            msaa_quality: 0,
            conservative_msaa: false,
            output_width: 1280,
            output_height: 720,
            postproc_ratio: 1.0,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SystemConf {
    /// Log every intercepted bind and copy.  Very verbose.
    pub trace: bool,
    pub texture_dir: String,
}

impl Default for SystemConf {
    fn default() -> Self {
        SystemConf {
            trace: false,
            texture_dir: "TSFix_Textures".to_owned(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct FixConfig {
    pub textures: TextureConf,
    pub render: RenderConf,
    pub system: SystemConf,
}

impl fmt::Display for FixConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "FixConfig {{")?;
        let t = &self.textures;
        writeln!(
            f,
            "  textures: cache: {}, dump: {}, log: {}, optimize_ui: {}, full_mipmaps: {}",
            t.cache, t.dump, t.log, t.optimize_ui, t.full_mipmaps
        )?;
        writeln!(
            f,
            "  textures: async_custom: {}, load_timeout_ms: {}",
            t.async_custom, t.load_timeout_ms
        )?;
        let r = &self.render;
        if r.msaa_samples > 0 {
            writeln!(
                f,
                "  render: msaa: {}x (quality {}), conservative: {}",
                r.msaa_samples, r.msaa_quality, r.conservative_msaa
            )?;
        } else {
            writeln!(f, "  render: msaa off")?;
        }
        writeln!(
            f,
            "  render: output {}x{}, postproc_ratio: {}",
            r.output_width, r.output_height, r.postproc_ratio
        )?;
        writeln!(
            f,
            "  system: trace: {}, texture_dir: {}",
            self.system.trace, self.system.texture_dir
        )?;
        writeln!(f, "}}")
    }
}

impl FixConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_path(rootdir: &Path) -> PathBuf {
        rootdir.join(CONFIG_FILE)
    }

    /// Read `<rootdir>/tsfix.yaml`.  A missing file gives the defaults; a file that doesn't
    /// parse is an error.
    pub fn load(rootdir: &Path) -> Result<Self> {
        write_log_file("loading fix config");

        let pb = Self::config_path(rootdir);
        if !pb.is_file() {
            write_log_file(&format!("Config file does not exist: {:?}", pb));
            write_log_file("Using defaults");
            return Ok(FixConfig::new());
        }

        use std::fs::File;
        use std::io::BufReader;

        let file = File::open(&pb)?;
        let reader = BufReader::new(file);
        let conf: FixConfig = serde_yaml::from_reader(reader)
            .map_err(|e| HookError::SerdeError(format!("{:?}: {}", pb, e)))?;
        Ok(conf)
    }

    /// Resolved location of the custom/dump texture tree.
    pub fn texture_root(&self, rootdir: &Path) -> PathBuf {
        rootdir.join(&self.system.texture_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let d = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&d);
        std::fs::create_dir_all(&d).unwrap();
        d
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let root = scratch_dir("__test_fix_config_missing");
        let conf = FixConfig::load(&root).unwrap();
        assert_eq!(conf, FixConfig::default());
        assert!(conf.textures.cache);
        assert!(conf.textures.optimize_ui);
        assert_eq!(conf.render.msaa_samples, 0);
        assert_eq!((conf.render.output_width, conf.render.output_height), (1280, 720));
        assert_eq!(conf.texture_root(&root), root.join("TSFix_Textures"));
    }

    #[test]
    fn test_partial_file() {
        let root = scratch_dir("__test_fix_config_partial");
        std::fs::write(
            FixConfig::config_path(&root),
            "render:\n  msaa_samples: 4\n  output_width: 2560\n  output_height: 1440\ntextures:\n  dump: true\n",
        )
        .unwrap();
        let conf = FixConfig::load(&root).unwrap();
        assert_eq!(conf.render.msaa_samples, 4);
        assert_eq!(conf.render.output_width, 2560);
        assert_eq!(conf.render.output_height, 1440);
        assert_eq!(conf.render.postproc_ratio, 1.0);
        assert!(conf.textures.dump);
        // untouched fields keep their defaults
        assert!(conf.textures.cache);
        assert_eq!(conf.textures.load_timeout_ms, 10000);
        assert_eq!(conf.system.texture_dir, "TSFix_Textures");

        let shown = format!("{}", conf);
        assert!(shown.contains("msaa: 4x (quality 0)"));
        assert!(shown.contains("output 2560x1440"));
    }

    #[test]
    fn test_bad_file_is_error() {
        let root = scratch_dir("__test_fix_config_bad");
        std::fs::write(FixConfig::config_path(&root), "render: [this is not a map").unwrap();
        match FixConfig::load(&root) {
            Err(HookError::SerdeError(_)) => {}
            r => panic!("expected SerdeError, got {:?}", r),
        }
    }
}
