// ai
//! 🏷️ Object name templates — `/sample/hw%OBJECTNUM.txt` becomes `sample/hw0.txt`,
//! then `sample/hw1.txt`, then... you get it. Counting. We're counting.
//!
//! 🧠 Knowledge graph:
//! - `%OBJECTNUM` must appear exactly once. Zero means every object collides, two means
//!   someone is confused. Both are rejected at construction.
//! - `%TIME` may appear any number of times and expands to the UTC rollover timestamp.
//! - A leading `/` is tolerated (people love absolute paths) and stripped from the key.

use chrono::{DateTime, Utc};

use crate::error::ConfigurationError;

/// 🔢 The rollover counter placeholder.
pub const OBJECTNUM_PLACEHOLDER: &str = "%OBJECTNUM";

/// 🕰️ The rollover timestamp placeholder.
pub const TIME_PLACEHOLDER: &str = "%TIME";

/// 🏷️ A validated object name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectNameTemplate {
    template: String,
}

impl ObjectNameTemplate {
    /// ✅ Validate the template. Exactly one `%OBJECTNUM` or bust.
    pub fn parse(template: &str) -> Result<Self, ConfigurationError> {
        let found = template.matches(OBJECTNUM_PLACEHOLDER).count();
        if found != 1 {
            return Err(ConfigurationError::InvalidTemplate {
                template: template.to_string(),
                placeholder: OBJECTNUM_PLACEHOLDER,
                found,
            });
        }
        let trimmed = template.trim_start_matches('/');
        // -- a trailing slash names a directory, not an object
        if trimmed.ends_with('/') {
            return Err(ConfigurationError::InvalidTemplate {
                template: template.to_string(),
                placeholder: OBJECTNUM_PLACEHOLDER,
                found,
            });
        }
        Ok(Self {
            template: trimmed.to_string(),
        })
    }

    /// 🖨️ Render the key for the given counter value and rollover time.
    pub fn render(&self, object_num: u64, at: DateTime<Utc>) -> String {
        let with_num = self
            .template
            .replace(OBJECTNUM_PLACEHOLDER, &object_num.to_string());
        if with_num.contains(TIME_PLACEHOLDER) {
            with_num.replace(TIME_PLACEHOLDER, &at.format("%Y%m%d_%H%M%S").to_string())
        } else {
            with_num
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl std::fmt::Display for ObjectNameTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.template)
    }
}
