// ABOUTME: Capability probe for the CLI-driven backend, based on the tool's help output.
// ABOUTME: A heuristic: any introspection failure leaves the feature unsupported.

use crate::exec::{CommandLine, CommandRunner, ExecError};
use std::collections::BTreeSet;
use std::fmt;

/// Optional operations whose availability differs between backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    ContainerExec,
    ContainerAttach,
    ContainerTop,
    ContainerPause,
    EventsStream,
    Stats,
    ImageHistory,
    ImagePrune,
    ImageRemove,
    VolumePrune,
    VolumeCreate,
    NetworkPrune,
    ContainerPrune,
    BuildPlatform,
    RunPlatform,
    SshAgentForward,
    Services,
}

impl Feature {
    pub const ALL: [Feature; 17] = [
        Feature::ContainerExec,
        Feature::ContainerAttach,
        Feature::ContainerTop,
        Feature::ContainerPause,
        Feature::EventsStream,
        Feature::Stats,
        Feature::ImageHistory,
        Feature::ImagePrune,
        Feature::ImageRemove,
        Feature::VolumePrune,
        Feature::VolumeCreate,
        Feature::NetworkPrune,
        Feature::ContainerPrune,
        Feature::BuildPlatform,
        Feature::RunPlatform,
        Feature::SshAgentForward,
        Feature::Services,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::ContainerExec => "container-exec",
            Feature::ContainerAttach => "container-attach",
            Feature::ContainerTop => "container-top",
            Feature::ContainerPause => "container-pause",
            Feature::EventsStream => "events-stream",
            Feature::Stats => "stats",
            Feature::ImageHistory => "image-history",
            Feature::ImagePrune => "image-prune",
            Feature::ImageRemove => "image-remove",
            Feature::VolumePrune => "volume-prune",
            Feature::VolumeCreate => "volume-create",
            Feature::NetworkPrune => "network-prune",
            Feature::ContainerPrune => "container-prune",
            Feature::BuildPlatform => "build-platform",
            Feature::RunPlatform => "run-platform",
            Feature::SshAgentForward => "ssh-agent-forward",
            Feature::Services => "services",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a help text could not be read. Only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Command(#[from] ExecError),

    #[error("`{command}` printed no help text")]
    EmptyHelp { command: String },
}

/// Help output for each namespace the probe inspects. Missing text is empty.
#[derive(Debug, Clone, Default)]
pub struct HelpTexts {
    pub root: String,
    pub images: String,
    pub volume: String,
    pub network: String,
    pub container: String,
    pub build: String,
    pub run: String,
    pub exec: String,
}

/// Immutable set of supported features.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    enabled: BTreeSet<Feature>,
}

impl FeatureSet {
    /// Everything enabled except compose services.
    pub fn all() -> Self {
        Feature::ALL
            .into_iter()
            .filter(|f| *f != Feature::Services)
            .collect()
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.enabled.contains(&feature)
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.enabled.iter().copied()
    }

    /// Decide features from already-collected help texts.
    pub fn from_help(help: &HelpTexts) -> Self {
        let mut set = BTreeSet::new();
        let mut flag = |feature: Feature, present: bool| {
            if present {
                set.insert(feature);
            }
        };

        flag(Feature::ContainerExec, has_command(&help.root, "exec"));
        flag(Feature::ContainerAttach, has_command(&help.root, "attach"));
        flag(Feature::ContainerTop, has_command(&help.root, "top"));
        flag(Feature::ContainerPause, has_command(&help.root, "pause"));
        flag(Feature::EventsStream, has_command(&help.root, "events"));
        flag(Feature::Stats, has_command(&help.root, "stats"));

        flag(Feature::ImageHistory, has_command(&help.images, "history"));
        flag(Feature::ImagePrune, has_command(&help.images, "prune"));
        flag(
            Feature::ImageRemove,
            help.images.contains(" rm ") || help.images.contains(" remove "),
        );

        flag(Feature::VolumePrune, help.volume.contains(" prune "));
        flag(Feature::VolumeCreate, has_command(&help.volume, "create"));
        flag(Feature::NetworkPrune, help.network.contains(" prune "));
        flag(Feature::ContainerPrune, help.container.contains(" prune "));

        flag(Feature::BuildPlatform, has_platform_flag(&help.build));
        flag(Feature::RunPlatform, has_platform_flag(&help.run));
        flag(
            Feature::SshAgentForward,
            help.exec.contains(" --ssh ") || help.run.contains(" --ssh "),
        );

        // The tool has no compose equivalent.
        set.remove(&Feature::Services);

        Self { enabled: set }
    }

    /// Run `<binary> [namespace] --help` for every namespace and decide.
    pub async fn probe(runner: &dyn CommandRunner, binary: &str) -> Self {
        let help = HelpTexts {
            root: help_text(runner, binary, None).await,
            images: help_text(runner, binary, Some("images")).await,
            volume: help_text(runner, binary, Some("volume")).await,
            network: help_text(runner, binary, Some("network")).await,
            container: help_text(runner, binary, Some("container")).await,
            build: help_text(runner, binary, Some("build")).await,
            run: help_text(runner, binary, Some("run")).await,
            exec: help_text(runner, binary, Some("exec")).await,
        };
        let features = Self::from_help(&help);
        tracing::debug!(
            binary,
            features = ?features.iter().map(|f| f.as_str()).collect::<Vec<_>>(),
            "probed CLI capabilities"
        );
        features
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            enabled: iter.into_iter().collect(),
        }
    }
}

fn has_command(help: &str, word: &str) -> bool {
    help.contains(&format!(" {word} ")) || help.contains(&format!("\n{word} "))
}

fn has_platform_flag(help: &str) -> bool {
    help.contains(" --platform ") || help.contains(" --os ") || help.contains(" --arch ")
}

async fn help_text(runner: &dyn CommandRunner, binary: &str, namespace: Option<&str>) -> String {
    match try_help_text(runner, binary, namespace).await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(binary, namespace, "help probe failed: {}", e);
            String::new()
        }
    }
}

async fn try_help_text(
    runner: &dyn CommandRunner,
    binary: &str,
    namespace: Option<&str>,
) -> Result<String, ProbeError> {
    let command = CommandLine::new(binary).args(namespace).arg("--help");
    let text = runner.run(&command).await?;
    if text.trim().is_empty() {
        return Err(ProbeError::EmptyHelp {
            command: command.to_string(),
        });
    }
    Ok(text)
}
