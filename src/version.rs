//! Build metadata stamped in by `build.rs`

use std::fmt;

/// Commit the binary was built from
#[derive(Debug, Clone)]
pub struct Commit {
    pub hash: &'static str,
    pub branch: &'static str,
    pub dirty: bool,
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub commit: Commit,
    pub built_at: &'static str,
    pub profile: &'static str,
    pub target: &'static str,
    pub host: &'static str,
    pub rustc: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            commit: Commit {
                hash: env!("WWC_GIT_HASH"),
                branch: env!("WWC_GIT_BRANCH"),
                dirty: env!("WWC_GIT_DIRTY") == "true",
            },
            built_at: env!("WWC_BUILD_TIMESTAMP"),
            profile: env!("WWC_PROFILE"),
            target: env!("WWC_TARGET"),
            host: env!("WWC_BUILD_HOST"),
            rustc: env!("WWC_RUSTC_VERSION"),
        }
    }

    /// `0.1.0+abc12345`, suffixed `.dirty` for uncommitted trees
    pub fn full_version(&self) -> String {
        let dirty = if self.commit.dirty { ".dirty" } else { "" };
        format!("{}+{}{}", self.version, self.commit.hash, dirty)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        let rows = [
            ("commit", self.commit.hash),
            ("branch", self.commit.branch),
            ("built", self.built_at),
            ("profile", self.profile),
            ("target", self.target),
            ("host", self.host),
            ("rustc", self.rustc),
        ];
        for (label, value) in rows {
            writeln!(f, "  {:<8} {}", label, value)?;
        }
        Ok(())
    }
}

pub fn print_version() {
    print!("{}", BuildInfo::current());
}
