use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use evlog::meta;

use crate::runtime::get_logger;
use crate::store::tree::Tree;
use crate::store::{Store, StoreError, Value};

/// Store backed by a YAML document on disk, laid out the way Bukkit's
/// `config.yml` is. The whole document is rewritten after each mutation.
#[derive(Debug)]
pub struct YamlStore {
    path: PathBuf,
    tree: Mutex<Tree>,
}

impl YamlStore {
    /// Loads `path`, or starts from an empty document if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let tree = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Tree::new(),
            Ok(contents) => Tree::from_yaml(serde_yaml::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                get_logger().info("Store file not found; starting empty.", meta! {
                    "Path" => path.display(),
                });
                Tree::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            tree: Mutex::new(tree),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn save(&self, tree: &Tree) -> Result<(), StoreError> {
        let encoded = serde_yaml::to_string(&tree.to_yaml())?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Store for YamlStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.tree().get(path))
    }

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let mut tree = self.tree();
        let previous = tree.clone();
        tree.set(path, value);

        if let Err(e) = self.save(&tree) {
            *tree = previous;
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self, path: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.tree().keys(path))
    }

    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        let mut tree = self.tree();
        let previous = tree.clone();
        if !tree.delete(path) {
            return Ok(false);
        }

        if let Err(e) = self.save(&tree) {
            *tree = previous;
            return Err(e);
        }
        Ok(true)
    }

    fn contains(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.tree().contains(path))
    }
}
