use flow_kernel::FlowError;
use flow_kernel::topology::{BranchTypeConfig, MergeStrategy, Topology};

pub const DEFAULT_REMOTE: &str = "origin";

/// Built-in branch layouts offered by `init`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Preset {
    /// develop/main with feature, bugfix, release, hotfix and support topics.
    #[default]
    Classic,
    /// A single trunk with short-lived feature branches.
    Github,
    /// production <- staging <- main, cascading downstream.
    Gitlab,
}

impl Preset {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "classic" | "gitflow" => Some(Self::Classic),
            "github" => Some(Self::Github),
            "gitlab" => Some(Self::Gitlab),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Classic => "classic",
            Preset::Github => "github",
            Preset::Gitlab => "gitlab",
        }
    }

    pub fn all() -> [Preset; 3] {
        [Preset::Classic, Preset::Github, Preset::Gitlab]
    }

    pub fn entries(&self) -> Vec<BranchTypeConfig> {
        use MergeStrategy::{Merge, Rebase};

        match self {
            Preset::Classic => vec![
                BranchTypeConfig::base("main", None),
                BranchTypeConfig::base("develop", Some("main"))
                    .with_strategies(Merge, Merge)
                    .with_auto_update(true),
                BranchTypeConfig::topic("feature", "develop", "feature/"),
                BranchTypeConfig::topic("bugfix", "develop", "bugfix/"),
                BranchTypeConfig::topic("release", "main", "release/")
                    .with_strategies(Merge, Merge)
                    .with_starting_point("develop")
                    .with_tag(""),
                BranchTypeConfig::topic("hotfix", "main", "hotfix/")
                    .with_strategies(Merge, Merge)
                    .with_tag(""),
                BranchTypeConfig::topic("support", "main", "support/")
                    .with_strategies(MergeStrategy::None, MergeStrategy::None),
            ],
            Preset::Github => vec![
                BranchTypeConfig::base("main", None),
                BranchTypeConfig::topic("feature", "main", "feature/")
                    .with_strategies(Merge, Rebase),
            ],
            Preset::Gitlab => vec![
                BranchTypeConfig::base("production", None),
                BranchTypeConfig::base("staging", Some("production"))
                    .with_strategies(Merge, Merge)
                    .with_auto_update(true),
                BranchTypeConfig::base("main", Some("staging"))
                    .with_strategies(Merge, Merge)
                    .with_auto_update(true),
                BranchTypeConfig::topic("feature", "main", "feature/"),
                BranchTypeConfig::topic("hotfix", "production", "hotfix/")
                    .with_strategies(Merge, Merge)
                    .with_tag(""),
            ],
        }
    }

    pub fn topology(&self) -> Result<Topology, FlowError> {
        Topology::new(self.entries())
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| format!("unknown preset `{value}`"))
    }
}
