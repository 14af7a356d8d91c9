use core::fmt::{self, Display};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    FullName,
    Phone,
    Address,
}

impl Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FullName => "Full name",
            Self::Phone => "Phone",
            Self::Address => "Address",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDetails {
    #[serde(default, alias = "full_name", deserialize_with = "blank_if_null")]
    pub full_name: String,
    #[serde(default, deserialize_with = "blank_if_null")]
    pub phone: String,
    #[serde(default, deserialize_with = "blank_if_null")]
    pub email: String,
    #[serde(default, deserialize_with = "blank_if_null")]
    pub address: String,
}

/// Absent and `null` fields are left to [`MemberDetails::validate`].
fn blank_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl MemberDetails {
    /// Checks name, phone and address in form order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        [
            (RequiredField::FullName, &self.full_name),
            (RequiredField::Phone, &self.phone),
            (RequiredField::Address, &self.address),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map_or(Ok(()), |(field, _)| {
            Err(ValidationError::MissingRequiredField(field))
        })
    }
}

/// Strips whitespace and dashes so `0170 123-45` matches `017012345`.
#[must_use]
pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}
