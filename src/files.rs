use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use ::effect_group::TextureEffectGroup;
use ::errors::{ErrorKind, Result, ResultExt};
use ::input_buffer::InputBuffer;
use ::parse::effect_group::Strictness;


/// Read an effect group from disk.  On failure you get the error and nothing else; there's no
/// half-loaded group.
pub fn load_effect_group<P: AsRef<Path>>(path: P) -> Result<TextureEffectGroup> {
    load_effect_group_with(path, Strictness::Lenient)
}

pub fn load_effect_group_with<P: AsRef<Path>>(path: P, strictness: Strictness) -> Result<TextureEffectGroup> {
    let path = path.as_ref();
    let group = {
        let input = InputBuffer::new_from_file(path)
            .chain_err(|| ErrorKind::OpenFailed(path.display().to_string()))?;
        TextureEffectGroup::from_bytes_with(input.bytes(), strictness)?
    };
    debug!("loaded effect group from {}", path.display());
    Ok(group)
}

/// Write an effect group to disk, creating any missing parent directories and replacing whatever
/// was there before.
pub fn save_effect_group<P: AsRef<Path>>(path: P, group: &TextureEffectGroup) -> Result<()> {
    let path = path.as_ref();
    // Encode first, so a group that can't be written doesn't clobber the old file
    let buffer = group.to_bytes()?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .chain_err(|| ErrorKind::OpenFailed(path.display().to_string()))?;
        }
    }
    let mut file = File::create(path)
        .chain_err(|| ErrorKind::OpenFailed(path.display().to_string()))?;
    file.write_all(&buffer)?;
    file.flush()?;

    debug!("saved effect group to {} ({} bytes)", path.display(), buffer.len());
    Ok(())
}


#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use ::effect_group::Stage;
    use ::errors::ErrorKind;

    fn sample_group() -> TextureEffectGroup {
        TextureEffectGroup{
            stages: [
                Stage::evaluated(1, "Scroll", &[0.25, 0.0, 0.0, 0.0, 0.0, 1.0]),
                Stage::overridden(1, 0),
            ],
        }
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("surface.fx");

        save_effect_group(&path, &sample_group()).unwrap();
        assert_eq!(load_effect_group(&path).unwrap(), sample_group());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("worlds").join("castle").join("floor.fx");

        save_effect_group(&path, &sample_group()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn save_truncates_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("surface.fx");
        fs::write(&path, vec![0xaa; 4096]).unwrap();

        let group = TextureEffectGroup::new();
        save_effect_group(&path, &group).unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), 16);
        assert_eq!(load_effect_group(&path).unwrap(), group);
    }

    #[test]
    fn unencodable_group_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("surface.fx");
        save_effect_group(&path, &sample_group()).unwrap();
        let before = fs::read(&path).unwrap();

        let script: String = ::std::iter::repeat('x').take(70000).collect();
        let group = TextureEffectGroup{ stages: [Stage::evaluated(0, script, &[]), Stage::Disabled] };
        assert!(save_effect_group(&path, &group).is_err());
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_effect_group(dir.path().join("missing.fx")).unwrap_err();
        match *err.kind() {
            ErrorKind::OpenFailed(ref path) => assert!(path.ends_with("missing.fx")),
            ref other => panic!("expected an open error, got {:?}", other),
        }
    }

    #[test]
    fn load_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.fx");
        fs::write(&path, b"").unwrap();

        let err = load_effect_group(&path).unwrap_err();
        match *err.kind() {
            ErrorKind::TruncatedData(_) => {}
            ref other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn load_strictly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("odd.fx");
        let mut bytes = Vec::new();
        for &b in [1u8, 0, 0, 0, 1, 0, 0, 0, 9, 0, 0, 0].iter() {
            bytes.push(b);
        }
        fs::write(&path, &bytes).unwrap();

        assert_eq!(load_effect_group(&path).unwrap(), TextureEffectGroup::new());
        assert!(load_effect_group_with(&path, Strictness::Strict).is_err());
    }
}
