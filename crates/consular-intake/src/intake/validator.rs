use std::collections::BTreeMap;

use super::domain::{Applicant, IntakeRequest, Submission};
use super::schema::{FieldRequirement, ServiceRegistry};

/// Identity keys lifted out of the raw field map into [`Applicant`].
const FIELD_FULL_NAME: &str = "full_name";
const FIELD_EMAIL: &str = "email";
const FIELD_TELEPHONE: &str = "telephone";

/// Errors a user can fix in the form. Nothing network-facing happens before
/// these are resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("consent must be given before submitting")]
    ConsentRequired,
    #[error("required field '{field}' is missing or empty")]
    MissingField { field: String },
    #[error("field 'email' does not look like an email address")]
    InvalidEmail,
}

impl ValidationError {
    /// The form field the error points at, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::ConsentRequired => None,
            ValidationError::MissingField { field } => Some(field),
            ValidationError::InvalidEmail => Some(FIELD_EMAIL),
        }
    }
}

/// Pure validator over raw form state. Fails fast on the first unmet rule,
/// walking the schema in form order so the surfaced error is the one
/// closest to the top of the form. Attachments are out of its remit.
#[derive(Debug, Clone)]
pub struct SubmissionValidator {
    registry: ServiceRegistry,
}

impl SubmissionValidator {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Validate a raw request into the immutable [`Submission`] (with the
    /// attachment slots still empty; the codec fills those).
    pub fn validate(&self, request: &IntakeRequest) -> Result<Submission, ValidationError> {
        if !request.consent {
            return Err(ValidationError::ConsentRequired);
        }

        let applicant = self.validate_applicant(&request.fields)?;

        let schema = self.registry.schema(request.service);
        let mut details = BTreeMap::new();
        for rule in &schema.rules {
            let value = trimmed(&request.fields, rule.name);
            let required = match rule.requirement {
                FieldRequirement::Always => true,
                FieldRequirement::When { field, equals } => trimmed(&request.fields, field)
                    .is_some_and(|v| v.eq_ignore_ascii_case(equals)),
            };

            match value {
                Some(value) => {
                    details.insert(rule.name.to_string(), value.to_string());
                }
                None if required => {
                    return Err(ValidationError::MissingField {
                        field: rule.name.to_string(),
                    });
                }
                None => {}
            }
        }

        Ok(Submission {
            service: request.service,
            applicant,
            details,
            attachments: Vec::new(),
            locale: request.locale.trim().to_string(),
        })
    }

    fn validate_applicant(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<Applicant, ValidationError> {
        let full_name = require(fields, FIELD_FULL_NAME)?;
        let email = require(fields, FIELD_EMAIL)?;
        // Deliberately shallow: the record-keeping backend re-validates, and
        // over-strict client rules were a support burden on the old forms.
        if !email.contains('@') {
            return Err(ValidationError::InvalidEmail);
        }
        let telephone = require(fields, FIELD_TELEPHONE)?;

        Ok(Applicant {
            full_name,
            email,
            telephone,
        })
    }
}

fn trimmed<'a>(fields: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn require(fields: &BTreeMap<String, String>, name: &str) -> Result<String, ValidationError> {
    trimmed(fields, name)
        .map(str::to_string)
        .ok_or_else(|| ValidationError::MissingField {
            field: name.to_string(),
        })
}
