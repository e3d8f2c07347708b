// ── Resolution history ──
//
// Append-only log of resolver attempts for one top-level resolution.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::api::ApiHandle;
use crate::uri::Uri;

/// What a single resolver produced for a single Uri.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Same as the step's source when the resolver passed through.
    pub uri: Uri,
    #[serde(rename = "resolved", serialize_with = "serialize_api_flag")]
    pub api: Option<ApiHandle>,
}

/// One resolver's outcome for one Uri.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionStep {
    pub source_uri: Uri,
    pub resolver: String,
    pub result: StepResult,
}

impl ResolutionStep {
    /// A step counts towards the resolution path when it moved the Uri or
    /// produced an Api.
    pub fn is_effectual(&self) -> bool {
        self.source_uri != self.result.uri || self.result.api.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ResolutionHistory {
    steps: Vec<ResolutionStep>,
}

impl ResolutionHistory {
    pub(crate) fn push(&mut self, step: ResolutionStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ResolutionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the resolvers consulted, in order.
    pub fn resolvers(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.resolver.as_str()).collect()
    }

    /// Every Uri that appeared as a result, first occurrence only.
    pub fn uris(&self) -> Vec<&Uri> {
        let mut seen: Vec<&Uri> = Vec::new();
        for step in &self.steps {
            if !seen.contains(&&step.result.uri) {
                seen.push(&step.result.uri);
            }
        }
        seen
    }

    /// The steps that redirected or resolved; pass-through steps dropped.
    pub fn resolution_path(&self) -> ResolutionHistory {
        ResolutionHistory {
            steps: self
                .steps
                .iter()
                .filter(|s| s.is_effectual())
                .cloned()
                .collect(),
        }
    }
}

impl fmt::Display for ResolutionHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("(empty)");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{} -[{}]-> {}",
                step.source_uri, step.resolver, step.result.uri
            )?;
            if step.result.api.is_some() {
                f.write_str(" (api)")?;
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ResolutionHistory {
    type Item = &'a ResolutionStep;
    type IntoIter = std::slice::Iter<'a, ResolutionStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[allow(clippy::ref_option)]
fn serialize_api_flag<S: Serializer>(api: &Option<ApiHandle>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_bool(api.is_some())
}
