use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;

use rand::RngCore;

use crate::Error;
use crate::Result;
use crate::SystemError;

/// Random opaque credential, hex encoded.
pub fn rand_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Free-form host description published in this node's registry record.
pub fn host_info() -> String {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    format!(
        "OS:[{}],Arch:[{}],CPUS:[{}]",
        std::env::consts::OS,
        std::env::consts::ARCH,
        cpus
    )
}

pub fn open_file_for_append(path: PathBuf) -> Result<File> {
    create_parent_dir_if_not_exist(&path)?;
    let log_file = match OpenOptions::new().append(true).create(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            return Err(Error::System(SystemError::Io(e)));
        }
    };
    Ok(log_file)
}

fn create_parent_dir_if_not_exist(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(SystemError::Io)?;
        }
    }
    Ok(())
}
