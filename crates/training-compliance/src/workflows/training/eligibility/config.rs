use serde::{Deserialize, Serialize};

use crate::config::CertificationSettings;

/// Rubric configuration for document+score certification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityConfig {
    /// Minimum final score (percentage, inclusive) that passes.
    pub pass_threshold: u8,
}

impl From<&CertificationSettings> for EligibilityConfig {
    fn from(settings: &CertificationSettings) -> Self {
        Self {
            pass_threshold: settings.pass_threshold,
        }
    }
}
