use std::collections::BTreeMap;

use super::domain::ServiceKind;

/// When a field must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRequirement {
    Always,
    /// Required only when another (trimmed) field equals the given value,
    /// e.g. partner details when marital status is "married".
    When {
        field: &'static str,
        equals: &'static str,
    },
}

/// One rule of a service form, in the order the field appears on the form.
/// Order matters: the validator fails fast on the first unmet rule so the
/// user is pointed at the topmost problem.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub requirement: FieldRequirement,
}

impl FieldRule {
    pub const fn always(name: &'static str) -> Self {
        Self {
            name,
            requirement: FieldRequirement::Always,
        }
    }

    pub const fn when(name: &'static str, field: &'static str, equals: &'static str) -> Self {
        Self {
            name,
            requirement: FieldRequirement::When { field, equals },
        }
    }
}

/// Field vocabulary and attachment policy for one service's form.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub service: ServiceKind,
    pub rules: Vec<FieldRule>,
    /// Per-service attachment cap override; `None` uses the registry cap.
    pub attachment_cap_bytes: Option<u64>,
}

/// The single source of per-service shape. Every form used to hand-roll its
/// own copy of the submit lifecycle; here only the schema varies and the
/// saga engine exists once.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    schemas: BTreeMap<ServiceKind, FieldSchema>,
    default_attachment_cap_bytes: u64,
}

impl ServiceRegistry {
    /// The production schema set.
    pub fn standard(default_attachment_cap_bytes: u64) -> Self {
        let mut schemas = BTreeMap::new();
        for service in ServiceKind::ALL {
            schemas.insert(service, standard_schema(service));
        }
        Self {
            schemas,
            default_attachment_cap_bytes,
        }
    }

    pub fn schema(&self, service: ServiceKind) -> &FieldSchema {
        // `standard` seeds every variant, so the lookup is total.
        &self.schemas[&service]
    }

    pub fn attachment_cap_bytes(&self, service: ServiceKind) -> u64 {
        self.schema(service)
            .attachment_cap_bytes
            .unwrap_or(self.default_attachment_cap_bytes)
    }

    /// The largest cap any service allows. The HTTP layer sizes its
    /// request-body limit from this so an attachment at the cap still
    /// reaches the codec.
    pub fn max_attachment_cap_bytes(&self) -> u64 {
        self.schemas
            .keys()
            .map(|&service| self.attachment_cap_bytes(service))
            .max()
            .unwrap_or(self.default_attachment_cap_bytes)
    }
}

const MARRIED_PARTNER_RULES: [FieldRule; 2] = [
    FieldRule::when("partner_full_name", "marital_status", "married"),
    FieldRule::when("partner_date_of_birth", "marital_status", "married"),
];

fn standard_schema(service: ServiceKind) -> FieldSchema {
    let rules = match service {
        ServiceKind::Passport => {
            let mut rules = vec![
                FieldRule::always("date_of_birth"),
                FieldRule::always("place_of_birth"),
                FieldRule::always("residence_address"),
                FieldRule::always("marital_status"),
            ];
            rules.extend(MARRIED_PARTNER_RULES);
            rules
        }
        ServiceKind::IdCard => vec![
            FieldRule::always("date_of_birth"),
            FieldRule::always("place_of_birth"),
            FieldRule::always("residence_address"),
        ],
        ServiceKind::Visa => vec![
            FieldRule::always("passport_number"),
            FieldRule::always("travel_purpose"),
            FieldRule::always("arrival_date"),
            FieldRule::always("departure_date"),
        ],
        ServiceKind::Benefits => vec![
            FieldRule::always("fiscal_code"),
            FieldRule::always("benefit_type"),
            FieldRule::always("household_size"),
        ],
        ServiceKind::Housing => vec![
            FieldRule::always("fiscal_code"),
            FieldRule::always("current_address"),
            FieldRule::always("household_size"),
            FieldRule::always("income_band"),
        ],
        ServiceKind::Citizenship => {
            let mut rules = vec![
                FieldRule::always("date_of_birth"),
                FieldRule::always("place_of_birth"),
                FieldRule::always("marital_status"),
            ];
            rules.extend(MARRIED_PARTNER_RULES);
            rules.push(FieldRule::always("multiple_citizenships"));
            rules.push(FieldRule::when(
                "citizenship_list",
                "multiple_citizenships",
                "yes",
            ));
            rules
        }
        ServiceKind::AireRegistration => {
            let mut rules = vec![
                FieldRule::always("date_of_birth"),
                FieldRule::always("place_of_birth"),
                FieldRule::always("foreign_address"),
                FieldRule::always("marital_status"),
            ];
            rules.extend(MARRIED_PARTNER_RULES);
            rules.push(FieldRule::always("multiple_citizenships"));
            rules.push(FieldRule::when(
                "citizenship_list",
                "multiple_citizenships",
                "yes",
            ));
            rules
        }
    };

    FieldSchema {
        service,
        rules,
        attachment_cap_bytes: None,
    }
}
