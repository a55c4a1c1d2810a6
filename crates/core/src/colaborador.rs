//! Tracked workers.

use chrono::NaiveDate;
use exames_types::NonEmptyText;
use serde::{Deserialize, Serialize};

fn default_active() -> bool {
    true
}

/// A worker whose exams are tracked. Belongs to exactly one tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Colaborador {
    pub id: String,
    pub tenant_id: String,
    pub name: NonEmptyText,
    pub admission_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    /// Inactive colaboradores keep their history but are left out of dashboards and alerts.
    #[serde(default = "default_active")]
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_defaults_to_true() {
        let yaml = r#"
id: c1
tenant_id: acme
name: Maria Souza
admission_date: 2020-03-02
sector: Manutenção
"#;
        let colaborador: Colaborador = serde_yaml::from_str(yaml).unwrap();
        assert!(colaborador.active);
        assert_eq!(colaborador.sector.as_deref(), Some("Manutenção"));
        assert_eq!(colaborador.role, None);
    }

    #[test]
    fn rejects_blank_name() {
        let yaml = r#"
id: c1
tenant_id: acme
name: "  "
admission_date: 2020-03-02
"#;
        assert!(serde_yaml::from_str::<Colaborador>(yaml).is_err());
    }
}
