//! Restriction limits

/// Limits enforced on caller properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestrictionLimits {
    /// Maximum property name length, in characters
    pub max_name_length: usize,
    /// Maximum string value length, in characters
    pub max_value_length: usize,
}

impl Default for RestrictionLimits {
    fn default() -> Self {
        Self {
            max_name_length: 150,
            max_value_length: 1024,
        }
    }
}

impl RestrictionLimits {
    pub fn with_max_name_length(mut self, max: usize) -> Self {
        self.max_name_length = max;
        self
    }

    pub fn with_max_value_length(mut self, max: usize) -> Self {
        self.max_value_length = max;
        self
    }

    /// Both limits must leave room for the truncation suffix
    pub fn validate(&self) -> Result<(), String> {
        let min = super::TRUNCATION_SUFFIX.len();
        if self.max_name_length <= min {
            return Err(format!("max_name_length must be greater than {min}"));
        }
        if self.max_value_length <= min {
            return Err(format!("max_value_length must be greater than {min}"));
        }
        Ok(())
    }
}
