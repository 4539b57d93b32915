//! Actor reference records (clients, agencies, IOBs, TCCs, financial
//! institutions). These are master data owned by the backend; the only local
//! rule is that a record sent for create/update has a code and a name.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorKind {
    Client,
    Agence,
    Iob,
    Tcc,
    FinancialInstitution,
}

impl ActorKind {
    pub const ALL: [ActorKind; 5] = [
        ActorKind::Client,
        ActorKind::Agence,
        ActorKind::Iob,
        ActorKind::Tcc,
        ActorKind::FinancialInstitution,
    ];

    /// Path segment under `/api/v1/`.
    pub fn path_segment(self) -> &'static str {
        match self {
            ActorKind::Client => "client",
            ActorKind::Agence => "agence",
            ActorKind::Iob => "iob",
            ActorKind::Tcc => "tcc",
            ActorKind::FinancialInstitution => "financial-institution",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.path_segment().eq_ignore_ascii_case(s.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub fax: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Flat record shared by every actor kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRecord {
    pub code: String,
    pub libelle: String,
    #[serde(flatten)]
    pub address: Address,
    #[serde(flatten)]
    pub contact: Contact,
    #[serde(default)]
    pub status: ActorStatus,
    /// Code of the parent financial institution or agence.
    #[serde(default)]
    pub parent_code: Option<String>,
}

impl ActorRecord {
    pub fn validate(&self) -> Result<(), ActorValidationError> {
        if self.code.trim().is_empty() {
            return Err(ActorValidationError::MissingCode);
        }
        if self.libelle.trim().is_empty() {
            return Err(ActorValidationError::MissingLibelle);
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == ActorStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorValidationError {
    MissingCode,
    MissingLibelle,
}

impl std::fmt::Display for ActorValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorValidationError::MissingCode => write!(f, "actor code is required"),
            ActorValidationError::MissingLibelle => write!(f, "actor libelle is required"),
        }
    }
}

impl std::error::Error for ActorValidationError {}
