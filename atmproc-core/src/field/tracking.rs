use crate::errors::{AtmError, AtmResult};
use crate::time::TimeStamp;

/// Mutable bookkeeping attached to a field.
///
/// Tracks when the field was last written and which processes write
/// (providers) and read (customers) it.
#[derive(Debug, Clone, Default)]
pub struct FieldTracking {
    time_stamp: Option<TimeStamp>,
    providers: Vec<String>,
    customers: Vec<String>,
    groups: Vec<String>,
}

impl FieldTracking {
    /// Time of the last update, `None` until the field is first written.
    pub fn time_stamp(&self) -> Option<TimeStamp> {
        self.time_stamp
    }

    /// Advance the time stamp.
    ///
    /// Time may not move backwards; an equal time stamp is accepted.
    pub fn update_time_stamp(&mut self, field_name: &str, t: TimeStamp) -> AtmResult<()> {
        if let Some(current) = self.time_stamp {
            if t < current {
                return Err(AtmError::NonMonotonicTime {
                    field: field_name.to_string(),
                    current: current.to_string(),
                    requested: t.to_string(),
                });
            }
        }
        self.time_stamp = Some(t);
        Ok(())
    }

    pub fn add_provider(&mut self, name: &str) {
        if !self.is_provider(name) {
            self.providers.push(name.to_string());
        }
    }

    pub fn add_customer(&mut self, name: &str) {
        if !self.is_customer(name) {
            self.customers.push(name.to_string());
        }
    }

    pub fn add_to_group(&mut self, group: &str) {
        if !self.groups.iter().any(|g| g == group) {
            self.groups.push(group.to_string());
        }
    }

    pub fn is_provider(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p == name)
    }

    pub fn is_customer(&self, name: &str) -> bool {
        self.customers.iter().any(|c| c == name)
    }

    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    pub fn customers(&self) -> &[String] {
        &self.customers
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }
}
