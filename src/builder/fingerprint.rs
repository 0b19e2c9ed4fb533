//! Cache keys for formula builds.
//!
//! A key captures every input that can change what a build installs: the
//! formula record itself, the options requested of it, and the install paths
//! of its dependencies. Dependency install paths are derived from their own
//! keys, so a change anywhere below a formula changes its key too.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::cache::CacheKey;
use crate::core::{Formula, Step};
use crate::util::hash::Fingerprint;

/// Compute the cache key for building `formula` against `deps`.
pub fn cache_key(
    formula: &Formula,
    options: &BTreeSet<String>,
    deps: &BTreeMap<String, PathBuf>,
) -> CacheKey {
    let mut fp = Fingerprint::new();

    fp.section("formula", 1)
        .update_str(formula.name())
        .update_opt(formula.version());

    match formula.source() {
        Some(source) => {
            fp.section("source", 1)
                .update_str(source.url.as_str())
                .update_str(&source.checksum.to_string());
        }
        None => {
            fp.section("source", 0);
        }
    }

    fp.section("install", formula.install_steps().len());
    for step in formula.install_steps() {
        hash_step(&mut fp, step);
    }

    match formula.test_step() {
        Some(step) => {
            fp.section("test", 1);
            hash_step(&mut fp, step);
        }
        None => {
            fp.section("test", 0);
        }
    }

    fp.section("options", options.len())
        .update_strs(options.iter().map(String::as_str));

    // BTreeMap iteration is sorted by dependency name.
    fp.section("deps", deps.len());
    for (name, path) in deps {
        fp.update_str(name).update_path(path);
    }

    CacheKey::new(fp.finish())
}

fn hash_step(fp: &mut Fingerprint, step: &Step) {
    match step {
        Step::ShellCommand(argv) => {
            fp.section("run", argv.len())
                .update_strs(argv.iter().map(String::as_str));
        }
        Step::Mkdir(path) => {
            fp.update_str("mkdir").update_path(path);
        }
        Step::Chdir(path) => {
            fp.update_str("chdir").update_path(path);
        }
    }
}

/// Install prefix for a formula build: `<cellar>/<name>/<key[..16]>`.
pub fn install_path(cellar: &Path, name: &str, key: &CacheKey) -> PathBuf {
    cellar.join(name).join(key.short())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eigen() -> Formula {
        Formula::new("eigen")
            .with_version("3.4.0")
            .with_step(Step::run(["cmake", "-DCMAKE_INSTALL_PREFIX={prefix}", "."]))
            .with_step(Step::run(["make", "install"]))
    }

    #[test]
    fn test_key_is_deterministic() {
        let deps = BTreeMap::from([("cmake".to_string(), PathBuf::from("/cellar/cmake/1"))]);
        let a = cache_key(&eigen(), &BTreeSet::new(), &deps);
        let b = cache_key(&eigen(), &BTreeSet::new(), &deps);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_key_changes_with_recipe() {
        let base = cache_key(&eigen(), &BTreeSet::new(), &BTreeMap::new());
        let changed = cache_key(
            &eigen().with_step(Step::run(["make", "check"])),
            &BTreeSet::new(),
            &BTreeMap::new(),
        );
        assert_ne!(base, changed);
    }

    #[test]
    fn test_key_changes_with_dependency_path() {
        let one = BTreeMap::from([("cmake".to_string(), PathBuf::from("/cellar/cmake/1"))]);
        let two = BTreeMap::from([("cmake".to_string(), PathBuf::from("/cellar/cmake/2"))]);
        assert_ne!(
            cache_key(&eigen(), &BTreeSet::new(), &one),
            cache_key(&eigen(), &BTreeSet::new(), &two)
        );
    }

    #[test]
    fn test_key_changes_with_options() {
        let opts = BTreeSet::from(["universal".to_string()]);
        assert_ne!(
            cache_key(&eigen(), &BTreeSet::new(), &BTreeMap::new()),
            cache_key(&eigen(), &opts, &BTreeMap::new())
        );
    }

    #[test]
    fn test_key_covers_self_test() {
        let plain = Formula::new("x");
        let tested = Formula::new("x").with_test(Step::run(["true"]));
        assert_ne!(
            cache_key(&plain, &BTreeSet::new(), &BTreeMap::new()),
            cache_key(&tested, &BTreeSet::new(), &BTreeMap::new())
        );
    }

    #[test]
    fn test_install_path_layout() {
        let key = CacheKey::new("0123456789abcdef0123456789abcdef");
        assert_eq!(
            install_path(Path::new("/cellar"), "pcl", &key),
            PathBuf::from("/cellar/pcl/0123456789abcdef")
        );
    }
}
