//! Tenants (empresas) and their notification recipients.

use exames_types::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};

/// A company owning colaboradores and their exam records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tenant {
    pub id: String,
    pub name: NonEmptyText,
}

/// An address that receives a tenant's expiry alerts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipient {
    pub id: String,
    pub tenant_id: String,
    pub email: EmailAddress,
}
