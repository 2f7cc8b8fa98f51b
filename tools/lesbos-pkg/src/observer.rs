///
/// Install progress reporting.
///
/// The installer never prints. It reports to an `InstallObserver` and the
/// caller decides where events go: the CLI prints them, `TracingObserver`
/// forwards them to `tracing`, `RecordingObserver` keeps them for inspection.
///

use std::fmt;
use std::sync::Mutex;

use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    Fetching { name: String, version: String },
    Recursing { name: String, count: usize },
    Warning(InstallWarning),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallWarning {
    MissingCore { package: String },
    InvalidDependency { reason: String },
    DependencyCycle { cycle: Vec<String> },
}

impl fmt::Display for InstallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallEvent::Fetching { name, version } => write!(f, "fetching {} v{}", name, version),
            InstallEvent::Recursing { name, count } => {
                write!(f, "{} declares {} dependencies, installing them", name, count)
            }
            InstallEvent::Warning(warning) => write!(f, "{}", warning),
        }
    }
}

impl fmt::Display for InstallWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallWarning::MissingCore { package } => {
                write!(f, "package '{}' has no 'core' feature", package)
            }
            InstallWarning::InvalidDependency { reason } => {
                write!(f, "skipping invalid dependency: {}", reason)
            }
            InstallWarning::DependencyCycle { cycle } => {
                write!(f, "dependency cycle detected: {}", cycle.join(" -> "))
            }
        }
    }
}

pub trait InstallObserver {
    fn on_event(&self, event: &InstallEvent);
}

impl<O: InstallObserver + ?Sized> InstallObserver for &O {
    fn on_event(&self, event: &InstallEvent) {
        (**self).on_event(event)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl InstallObserver for TracingObserver {
    fn on_event(&self, event: &InstallEvent) {
        match event {
            InstallEvent::Warning(warning) => warn!("{}", warning),
            other => info!("{}", other),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<InstallEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InstallEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<InstallWarning> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                InstallEvent::Warning(warning) => Some(warning),
                _ => None,
            })
            .collect()
    }
}

impl InstallObserver for RecordingObserver {
    fn on_event(&self, event: &InstallEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
