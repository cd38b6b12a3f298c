use std::fmt;

/// A stage that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetching,
    Patching,
    Compiling,
}

/// Linear progress of one pipeline run.
///
/// `Fetching -> Patching -> Compiling -> Done`, or `Failed` from any of the
/// first three. There are no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Patching,
    Compiling,
    Done,
    Failed(Step),
}

impl Stage {
    /// The step in progress, if the run is still active.
    pub fn step(self) -> Option<Step> {
        match self {
            Stage::Fetching => Some(Step::Fetching),
            Stage::Patching => Some(Step::Patching),
            Stage::Compiling => Some(Step::Compiling),
            Stage::Done | Stage::Failed(_) => None,
        }
    }

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Fetching => Some(Stage::Patching),
            Stage::Patching => Some(Stage::Compiling),
            Stage::Compiling => Some(Stage::Done),
            Stage::Done | Stage::Failed(_) => None,
        }
    }

    /// The failed state reachable from here. Terminal stages stay as they are.
    pub fn fail(self) -> Stage {
        match self.step() {
            Some(step) => Stage::Failed(step),
            None => self,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetching => write!(f, "fetching plain spec"),
            Stage::Patching => write!(f, "patching"),
            Stage::Compiling => write!(f, "compiling raw spec"),
            Stage::Done => write!(f, "done"),
            Stage::Failed(step) => write!(f, "failed while {:?}", step),
        }
    }
}
