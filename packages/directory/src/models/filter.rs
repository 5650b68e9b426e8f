use serde::Deserialize;

use super::employee::Employee;

/// In-memory search criteria applied to a full scan.
///
/// Every criterion that is set must match (AND). `query` matches when it is a
/// case-insensitive substring of the first name, last name, full name or
/// email (OR). `department` and `position` are case-insensitive equality.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeFilter {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl EmployeeFilter {
    pub fn is_empty(&self) -> bool {
        criterion(&self.query).is_none()
            && criterion(&self.department).is_none()
            && criterion(&self.position).is_none()
    }

    pub fn matches(&self, employee: &Employee) -> bool {
        if let Some(query) = criterion(&self.query) {
            let query = query.to_lowercase();
            let hit = [
                employee.first_name.as_str(),
                employee.last_name.as_str(),
                employee.full_name().as_str(),
                employee.email.as_str(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&query));
            if !hit {
                return false;
            }
        }
        if let Some(department) = criterion(&self.department)
            && department.to_lowercase() != employee.department.to_lowercase()
        {
            return false;
        }
        if let Some(position) = criterion(&self.position)
            && position.to_lowercase() != employee.position.to_lowercase()
        {
            return false;
        }
        true
    }
}

/// Blank criteria are treated as unset.
fn criterion(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
