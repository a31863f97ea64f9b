//! Mount points layered over the music database's storage backend. Only
//! the slice the state file needs (enumerate/identify mounts) lives here;
//! the actual filesystem/network backends are external.

use camino::Utf8PathBuf;

/// One database mount: a local relative path the mount is attached under,
/// and the backend URI it points at (e.g. `nfs://host/share`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub local_path: Utf8PathBuf,
    pub storage_uri: String,
}

pub trait CompositeStorage {
    fn mount(&mut self, local_path: Utf8PathBuf, storage_uri: String) -> bool;

    fn unmount(&mut self, local_path: &Utf8PathBuf) -> bool;

    fn is_mount_point(&self, local_path: &Utf8PathBuf) -> bool;

    fn is_mounted(&self, storage_uri: &str) -> bool;

    fn mounts(&self) -> Vec<Mount>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{CompositeStorage, Mount};
    use camino::Utf8PathBuf;

    #[derive(Debug, Default)]
    pub struct MockStorage {
        pub mounts: Vec<Mount>,
    }

    impl CompositeStorage for MockStorage {
        fn mount(&mut self, local_path: Utf8PathBuf, storage_uri: String) -> bool {
            if self.is_mount_point(&local_path) {
                return false;
            }
            self.mounts.push(Mount {
                local_path,
                storage_uri,
            });
            true
        }

        fn unmount(&mut self, local_path: &Utf8PathBuf) -> bool {
            let len_before = self.mounts.len();
            self.mounts.retain(|m| &m.local_path != local_path);
            self.mounts.len() != len_before
        }

        fn is_mount_point(&self, local_path: &Utf8PathBuf) -> bool {
            self.mounts.iter().any(|m| &m.local_path == local_path)
        }

        fn is_mounted(&self, storage_uri: &str) -> bool {
            self.mounts.iter().any(|m| m.storage_uri == storage_uri)
        }

        fn mounts(&self) -> Vec<Mount> {
            self.mounts.clone()
        }
    }
}
