//! Formula records.
//!
//! A [`Formula`] is the immutable description of one installable package:
//! where its source lives, what it depends on, and the ordered steps that
//! build and install it.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::dependency::Dependency;
use crate::util::hash::{sha1_bytes, sha256_bytes};

/// A package formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Formula {
    /// Unique formula name
    name: String,

    /// Upstream version, if the source is pinned to one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,

    /// Project homepage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    homepage: Option<String>,

    /// One-line description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    /// Where to fetch the source from; `None` for recipe-only formulas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<SourceLocator>,

    /// Dependency declarations, in declaration order
    #[serde(default)]
    dependencies: Vec<Dependency>,

    /// Build and install steps
    #[serde(default)]
    install: Vec<Step>,

    /// Self-test run after a successful install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    test: Option<Step>,
}

impl Formula {
    /// Create an empty formula with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Formula {
            name: name.into(),
            version: None,
            homepage: None,
            description: None,
            source: None,
            dependencies: Vec::new(),
            install: Vec::new(),
            test: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_source(mut self, source: SourceLocator) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_dependency(mut self, dep: Dependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.install.push(step);
        self
    }

    pub fn with_test(mut self, step: Step) -> Self {
        self.test = Some(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn source(&self) -> Option<&SourceLocator> {
        self.source.as_ref()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Build and install steps in execution order.
    pub fn install_steps(&self) -> &[Step] {
        &self.install
    }

    pub fn test_step(&self) -> Option<&Step> {
        self.test.as_ref()
    }

    /// Display name including the version, e.g. `pcl 1.14.0`.
    pub fn display_name(&self) -> String {
        match self.version {
            Some(ref v) => format!("{} {}", self.name, v),
            None => self.name.clone(),
        }
    }

    /// Check structural validity of the record.
    ///
    /// Returns a human-readable reason for the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("formula name must not be empty".to_string());
        }
        if let Some(c) = self
            .name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '@')))
        {
            return Err(format!("formula name `{}` contains invalid character `{}`", self.name, c));
        }

        for (i, dep) in self.dependencies.iter().enumerate() {
            if self.dependencies[..i].iter().any(|d| d.name() == dep.name()) {
                return Err(format!("dependency `{}` declared more than once", dep.name()));
            }
        }

        for (i, step) in self.install.iter().chain(self.test.iter()).enumerate() {
            if let Step::ShellCommand(argv) = step {
                if argv.is_empty() || argv[0].is_empty() {
                    return Err(format!("step {} has an empty command", i));
                }
            }
        }

        Ok(())
    }
}

/// Where a formula's source comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceLocator {
    pub url: Url,

    #[serde(default, skip_serializing_if = "Checksum::is_unknown")]
    pub checksum: Checksum,
}

impl SourceLocator {
    pub fn new(url: Url) -> Self {
        SourceLocator {
            url,
            checksum: Checksum::Unknown,
        }
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = checksum;
        self
    }

    /// Last path segment of the URL, used to name non-archive downloads.
    pub fn file_name(&self) -> String {
        self.url
            .path_segments()
            .and_then(|mut segs| segs.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or("source")
            .to_string()
    }
}

/// Expected digest of a fetched source.
///
/// Written as `sha256:<hex>`, `sha1:<hex>`, or bare hex whose length picks
/// the algorithm. An empty string means the checksum is unknown and nothing
/// is verified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Checksum {
    #[default]
    Unknown,
    Sha256(String),
    Sha1(String),
}

impl Checksum {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Checksum::Unknown)
    }

    /// Digest of `data` with this checksum's algorithm, for comparison.
    pub fn digest_of(&self, data: &[u8]) -> Option<String> {
        match self {
            Checksum::Unknown => None,
            Checksum::Sha256(_) => Some(sha256_bytes(data)),
            Checksum::Sha1(_) => Some(sha1_bytes(data)),
        }
    }

    /// Expected hex digest, if any.
    pub fn expected(&self) -> Option<&str> {
        match self {
            Checksum::Unknown => None,
            Checksum::Sha256(hex) | Checksum::Sha1(hex) => Some(hex),
        }
    }
}

impl TryFrom<String> for Checksum {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Checksum::Unknown);
        }

        let (algo, hex) = match s.split_once(':') {
            Some((algo, hex)) => (algo, hex),
            None if s.len() == 40 => ("sha1", s),
            None => ("sha256", s),
        };

        let digits = match algo {
            "sha256" => 64,
            "sha1" => 40,
            other => {
                return Err(format!(
                    "unsupported checksum algorithm `{}` (expected sha256 or sha1)",
                    other
                ))
            }
        };
        if hex.len() != digits || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid {} digest `{}`", algo, hex));
        }

        let hex = hex.to_ascii_lowercase();
        Ok(match algo {
            "sha1" => Checksum::Sha1(hex),
            _ => Checksum::Sha256(hex),
        })
    }
}

impl From<Checksum> for String {
    fn from(c: Checksum) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checksum::Unknown => Ok(()),
            Checksum::Sha256(hex) => write!(f, "sha256:{}", hex),
            Checksum::Sha1(hex) => write!(f, "sha1:{}", hex),
        }
    }
}

/// One recipe step.
///
/// In formula files a step is a single-key table:
/// `{ run = ["cmake", ".."] }`, `{ mkdir = "build" }` or `{ chdir = "build" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Run a program with arguments (argv, no shell)
    #[serde(rename = "run", alias = "shell_command")]
    ShellCommand(Vec<String>),

    /// Create a directory relative to the current step directory
    Mkdir(PathBuf),

    /// Change the directory subsequent steps run in
    Chdir(PathBuf),
}

/// Discriminant of a [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    ShellCommand,
    Mkdir,
    Chdir,
}

impl Step {
    /// Convenience constructor for a command step.
    pub fn run<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Step::ShellCommand(argv.into_iter().map(Into::into).collect())
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Step::ShellCommand(_) => StepKind::ShellCommand,
            Step::Mkdir(_) => StepKind::Mkdir,
            Step::Chdir(_) => StepKind::Chdir,
        }
    }

    /// Stable textual form, used for fingerprints and logs.
    pub fn describe(&self) -> String {
        match self {
            Step::ShellCommand(argv) => format!("run {}", argv.join(" ")),
            Step::Mkdir(p) => format!("mkdir {}", p.display()),
            Step::Chdir(p) => format!("chdir {}", p.display()),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PCL: &str = r#"
name = "pcl"
homepage = "http://www.pointclouds.org"

dependencies = [
    "cmake",
    { name = "boost", options = ["universal"] },
    { name = "flann", options = ["enable-python"] },
    { name = "doxygen", optional = true },
]

install = [
    { mkdir = "build" },
    { chdir = "build" },
    { run = ["cmake", "..", "-DCMAKE_INSTALL_PREFIX={prefix}"] },
    { run = ["make"] },
    { run = ["make", "install"] },
]

test = { run = ["false"] }

[source]
url = "http://svn.pointclouds.org/pcl/trunk"
checksum = ""
"#;

    #[test]
    fn test_parse_formula() {
        let formula: Formula = toml::from_str(PCL).unwrap();
        assert_eq!(formula.name(), "pcl");
        assert_eq!(formula.homepage(), Some("http://www.pointclouds.org"));
        assert_eq!(formula.dependencies().len(), 4);
        assert_eq!(formula.install_steps().len(), 5);
        assert_eq!(formula.install_steps()[0], Step::Mkdir("build".into()));
        assert_eq!(formula.install_steps()[1].kind(), StepKind::Chdir);
        assert_eq!(formula.test_step(), Some(&Step::run(["false"])));
        assert!(formula.source().unwrap().checksum.is_unknown());
        assert!(formula.validate().is_ok());
    }

    #[test]
    fn test_checksum_parsing() {
        let hex = "a".repeat(64);
        assert_eq!(
            Checksum::try_from(format!("sha256:{}", hex)).unwrap(),
            Checksum::Sha256(hex.clone())
        );
        assert_eq!(
            Checksum::try_from(hex.to_uppercase()).unwrap(),
            Checksum::Sha256(hex)
        );
        assert_eq!(Checksum::try_from(String::new()).unwrap(), Checksum::Unknown);
        assert!(Checksum::try_from("sha1:abcd".to_string()).is_err());
        assert!(Checksum::try_from("sha256:xyz".to_string()).is_err());
        assert!(Checksum::try_from(format!("md5:{}", "a".repeat(32)))
            .unwrap_err()
            .contains("expected sha256 or sha1"));
    }

    #[test]
    fn test_sha1_checksum() {
        let hex = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
        let checksum = Checksum::try_from(format!("sha1:{}", hex.to_uppercase())).unwrap();
        assert_eq!(checksum, Checksum::Sha1(hex.to_string()));
        assert_eq!(Checksum::try_from(hex.to_string()).unwrap(), checksum);
        assert_eq!(checksum.digest_of(b"hello").as_deref(), Some(hex));
        assert_eq!(checksum.to_string(), format!("sha1:{}", hex));
    }

    #[test]
    fn test_validate_leaves_self_dependency_to_graph() {
        let formula = Formula::new("a").with_dependency(Dependency::required("a"));
        assert!(formula.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_command() {
        let formula = Formula::new("a").with_step(Step::ShellCommand(vec![]));
        assert!(formula.validate().is_err());
    }

    #[test]
    fn test_source_file_name() {
        let loc = SourceLocator::new(Url::parse("https://example.com/dl/zlib-1.3.tar.gz").unwrap());
        assert_eq!(loc.file_name(), "zlib-1.3.tar.gz");

        let trunk = SourceLocator::new(Url::parse("http://svn.example.org/pcl/trunk/").unwrap());
        assert_eq!(trunk.file_name(), "source");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(Formula::new("eigen").with_version("3.4.0").display_name(), "eigen 3.4.0");
        assert_eq!(Formula::new("eigen").display_name(), "eigen");
    }
}
