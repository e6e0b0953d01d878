use crate::error::HddError;
use std::path::PathBuf;

const CACHE_DIR_NAME: &str = "heizgradtage_cache";

pub fn get_cache_dir() -> Result<PathBuf, HddError> {
    dirs::cache_dir()
        .map(|p| p.join(CACHE_DIR_NAME))
        .ok_or(HddError::CacheDirResolution)
}
