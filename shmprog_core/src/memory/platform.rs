// Cross-platform shared memory path abstraction
//
// Linux: /dev/shm/shmprog (tmpfs - RAM-backed)
// Other Unix: /tmp/shmprog
// Windows: %TEMP%\shmprog

use std::path::PathBuf;

/// Prefix of generated block names
pub const BLOCK_NAME_PREFIX: &str = "psm_";

/// Get the base directory holding named counter blocks
///
/// - Linux: `/dev/shm/shmprog` (tmpfs, never touches disk)
/// - macOS and other Unix: `/tmp/shmprog`
/// - Windows: `%TEMP%\shmprog`
pub fn shm_base_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/dev/shm/shmprog")
    }

    #[cfg(target_os = "windows")]
    {
        std::env::temp_dir().join("shmprog")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp/shmprog")
    }
}

/// Convert a block name into a safe file name
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Path of the backing file for a named block
pub fn block_path(name: &str) -> PathBuf {
    shm_base_dir().join(sanitize_name(name))
}

/// Generate a fresh, host-unique block name
pub fn generate_block_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", BLOCK_NAME_PREFIX, &id[..16])
}
